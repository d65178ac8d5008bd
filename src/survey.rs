use log::{debug, info, warn};

use peer_rating::builder::ScoreSheet;
use peer_rating::store::{submit, RatingStore, SubmitError};
use peer_rating::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::io;

use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::{Args, Command};
use crate::survey::io_common::now_timestamp;
use crate::survey::io_export::{export_ranking, export_responses, write_export, ExportFormat};
use crate::survey::io_store::CsvStore;
use crate::survey::settings::{load_settings, Settings};

pub mod form;
pub mod io_common;
pub mod io_export;
pub mod io_roster;
pub mod io_store;
pub mod render;
pub mod settings;

#[derive(Debug, Snafu)]
pub enum SurveyError {
    #[snafu(display("Error opening file {path}: {source}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON: {source}"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error opening Excel file {path}: {source}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("The Excel file {path} has no worksheet named {sheet}"))]
    MissingWorksheet { path: String, sheet: String },
    #[snafu(display("The Excel file {path} is empty"))]
    EmptyExcel { path: String },
    #[snafu(display("Could not understand the cell at line {lineno}: {content}"))]
    ExcelWrongCellType { lineno: u64, content: String },
    #[snafu(display("Error opening CSV file {path}: {source}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error parsing line {lineno} of {path}: {source}"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: u64,
    },
    #[snafu(display("Line {lineno} of {path} is too short"))]
    CsvLineTooShort { path: String, lineno: u64 },
    #[snafu(display("Could not save the responses to {path}, please retry: {source}"))]
    StoreWrite {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Could not read the responses from {path}: {source}"))]
    StoreRead { source: csv::Error, path: String },
    #[snafu(display("{path} is not a response file (header: {found})"))]
    StoreSchema { path: String, found: String },
    #[snafu(display("{source}"))]
    Rejected { source: RatingErrors },
    #[snafu(display("Invalid roster: {source}"))]
    InvalidRoster { source: RatingErrors },
    #[snafu(display("Invalid settings: {message}"))]
    InvalidSettings { message: String },
    #[snafu(display("Invalid score {arg:?}: expected \"Name=s1,s2,s3,s4,s5\""))]
    ScoreArgument { arg: String },
    #[snafu(display("Unknown format {format:?}: expected csv or xlsx"))]
    UnknownFormat { format: String },
    #[snafu(display("Error writing Excel data: {source}"))]
    WritingExcel { source: rust_xlsxwriter::XlsxError },
    #[snafu(display("Error writing CSV data: {source}"))]
    WritingCsv { source: csv::Error },
    #[snafu(display("Error writing file {path}: {source}"))]
    WritingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error in the form input: {source}"))]
    FormIo { source: std::io::Error },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

impl SurveyError {
    /// 2 when the rater has to fix the submission, 1 for everything else.
    pub fn exit_code(&self) -> i32 {
        match self {
            SurveyError::Rejected { .. } => 2,
            _ => 1,
        }
    }
}

pub type SurveyResult<T> = Result<T, SurveyError>;

pub fn run(args: &Args) -> SurveyResult<()> {
    let settings = load_settings(args.config.as_deref(), args.store.as_deref())?;
    info!(
        "Survey {:?}: {} subgroup(s), responses in {:?}",
        settings.name,
        settings.roster.subgroups().len(),
        settings.store_path
    );
    match &args.command {
        Command::Roster { rater } => run_roster(&settings, rater.as_deref()),
        Command::Submit { rater, score } => run_submit(&settings, rater, score),
        Command::Report {
            subgroup,
            out,
            reference,
        } => run_report(
            &settings,
            subgroup.as_deref(),
            out.as_deref(),
            reference.as_deref(),
        ),
        Command::Export {
            out,
            format,
            subgroup,
        } => run_export(&settings, out, format.as_deref(), subgroup.as_deref()),
        Command::Responses { out, format } => {
            run_responses(&settings, out.as_deref(), format.as_deref())
        }
    }
}

fn run_roster(settings: &Settings, rater: Option<&str>) -> SurveyResult<()> {
    let txt = match rater {
        Some(r) => render::render_peers(&settings.roster, r)?,
        None => render::render_roster(&settings.roster),
    };
    print!("{}", txt);
    Ok(())
}

fn run_submit(settings: &Settings, rater: &str, scores: &[String]) -> SurveyResult<()> {
    let mut sheet = ScoreSheet::new(&settings.roster, rater).context(RejectedSnafu {})?;
    if scores.is_empty() {
        let stdin = io::stdin();
        let stdout = io::stdout();
        let confirmed = form::fill_sheet(
            &mut sheet,
            settings,
            &mut stdin.lock(),
            &mut stdout.lock(),
        )?;
        if !confirmed {
            println!("Nothing was submitted.");
            return Ok(());
        }
    } else {
        for arg in scores.iter() {
            let (ratee, values) = form::parse_score_arg(arg)?;
            sheet.set_scores(&ratee, &values).context(RejectedSnafu {})?;
        }
    }

    let mut store = CsvStore::new(&settings.store_path);
    let timestamp = now_timestamp();
    match submit(&mut store, &sheet, settings.range, &timestamp) {
        Ok(count) => {
            println!(
                "Thank you {}: {} rating(s) saved. You can close the form.",
                sheet.rater(),
                count
            );
            Ok(())
        }
        Err(SubmitError::Rejected(e)) => {
            warn!("Submission from {} rejected: {}", sheet.rater(), e);
            Err(SurveyError::Rejected { source: e })
        }
        Err(SubmitError::Store(e)) => Err(e),
    }
}

/// Reads the store. A store that cannot be read is shown as an empty one.
fn read_records_or_empty(settings: &Settings) -> Vec<RatingRecord> {
    let store = CsvStore::new(&settings.store_path);
    match store.read_all() {
        Ok(records) => records,
        Err(e) => {
            warn!("Could not read the responses, showing empty rankings: {}", e);
            eprintln!("Warning: {}", e);
            Vec::new()
        }
    }
}

fn run_report(
    settings: &Settings,
    subgroup: Option<&str>,
    out: Option<&str>,
    reference: Option<&str>,
) -> SurveyResult<()> {
    let records = read_records_or_empty(settings);
    let report = build_report(&records, &settings.roster, subgroup);
    if let Some(s) = subgroup {
        if report.subgroups.is_empty() {
            warn!("No subgroup named {:?}", s);
        }
    }
    print!("{}", render::render_report(&report, &settings.criteria));

    let report_js = render::report_to_json(settings, &report);
    let pretty_report = serde_json::to_string_pretty(&report_js).context(ParsingJsonSnafu {})?;
    match out {
        Some("stdout") => println!("{}", pretty_report),
        Some(path) => {
            fs::write(path, pretty_report.as_bytes()).context(WritingFileSnafu { path })?;
            info!("Report written to {}", path);
        }
        None => {}
    }

    // The reference report, if provided for comparison
    if let Some(ref_path) = reference {
        let reference_js = read_reference(ref_path)?;
        let pretty_reference =
            serde_json::to_string_pretty(&reference_js).context(ParsingJsonSnafu {})?;
        if pretty_reference != pretty_report {
            warn!("Found differences with the reference report");
            print_diff(pretty_reference.as_str(), pretty_report.as_str(), "\n");
            whatever!("Difference detected between the computed report and the reference report")
        }
        info!("The report matches the reference {}", ref_path);
    }
    Ok(())
}

fn read_reference(path: &str) -> SurveyResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    debug!("read_reference: {} byte(s)", contents.len());
    serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})
}

fn run_export(
    settings: &Settings,
    out: &str,
    format: Option<&str>,
    subgroup: Option<&str>,
) -> SurveyResult<()> {
    let export_format = ExportFormat::resolve(format, out)?;
    let records = read_records_or_empty(settings);
    let report = build_report(&records, &settings.roster, subgroup);
    let ranking: Ranking = match subgroup {
        Some(s) => report.subgroup(s).cloned().unwrap_or_else(|| {
            warn!("No subgroup named {:?}, exporting an empty ranking", s);
            Ranking {
                scope: RankingScope::Subgroup(s.to_string()),
                entries: Vec::new(),
            }
        }),
        None => report.overall,
    };
    let data = export_ranking(&ranking, &settings.criteria, export_format)?;
    write_export(out, &data)?;
    println!("Exported {} ranked row(s) to {}", ranking.len(), out);
    Ok(())
}

fn run_responses(settings: &Settings, out: Option<&str>, format: Option<&str>) -> SurveyResult<()> {
    let records = read_records_or_empty(settings);
    match out {
        Some(path) => {
            let export_format = ExportFormat::resolve(format, path)?;
            let data = export_responses(&records, export_format)?;
            write_export(path, &data)?;
            println!("Exported {} response(s) to {}", records.len(), path);
        }
        None => print!("{}", render::render_responses(&records, &settings.criteria)),
    }
    Ok(())
}
