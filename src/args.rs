use clap::{Parser, Subcommand};

/// This is a peer rating survey: team members rate the peers of their subgroup on five criteria,
/// and the organizer ranks and exports the results.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The JSON file describing the survey: criteria, score range, roster and
    /// location of the responses. Built-in defaults are used when not provided.
    #[clap(short, long, value_parser, global = true)]
    pub config: Option<String>,

    /// (file path, optional) The CSV file holding the responses. Setting this option overrides the
    /// path that may be specified with the --config option.
    #[clap(short, long, value_parser, global = true)]
    pub store: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false, global = true)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Lists the subgroups, or the peers a given rater has to score.
    Roster {
        /// (name, optional) The rater whose peers should be listed.
        #[clap(short, long, value_parser)]
        rater: Option<String>,
    },
    /// Rates the peers of your subgroup. Without --score, the form is filled interactively.
    Submit {
        /// (name) Who is rating.
        #[clap(short, long, value_parser)]
        rater: String,
        /// (repeatable) The scores of one peer, in criteria order: "Name=4,5,3,4,5".
        /// A blank value counts as a missing score.
        #[clap(long, value_parser)]
        score: Vec<String>,
    },
    /// Shows the organizer dashboard: the ranking of each subgroup and the overall ranking.
    Report {
        /// (name, optional) Only show the ranking of this subgroup.
        #[clap(long, value_parser)]
        subgroup: Option<String>,
        /// (file path, 'stdout' or empty) If specified, the report will be written in JSON format to
        /// the given location.
        #[clap(short, long, value_parser)]
        out: Option<String>,
        /// (file path) A reference JSON report. If provided, the computed report is checked against it.
        #[clap(short, long, value_parser)]
        reference: Option<String>,
    },
    /// Exports a ranking as a CSV or XLSX file.
    Export {
        /// (file path) Where to write the export.
        #[clap(short, long, value_parser)]
        out: String,
        /// (csv or xlsx, optional) The format of the export. Guessed from the extension by default.
        #[clap(long, value_parser)]
        format: Option<String>,
        /// (name, optional) Export the ranking of this subgroup instead of the overall ranking.
        #[clap(long, value_parser)]
        subgroup: Option<String>,
    },
    /// Shows the raw responses, or writes them to a CSV or XLSX file.
    Responses {
        /// (file path, optional) Where to write the responses.
        #[clap(short, long, value_parser)]
        out: Option<String>,
        /// (csv or xlsx, optional) The format of the file. Guessed from the extension by default.
        #[clap(long, value_parser)]
        format: Option<String>,
    },
}
