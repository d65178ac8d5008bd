use crate::survey::*;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use peer_rating::roster::{Roster, Subgroup};
use serde::{Deserialize, Serialize};

use crate::survey::io_common::resolve_path;
use crate::survey::io_roster::{read_roster_file, roster_from_settings};

pub const DEFAULT_SURVEY_NAME: &str = "ATSR - Regular sprint";
pub const DEFAULT_STORE_PATH: &str = "atsr_responses.csv";

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RangeSettings {
    pub min: u32,
    pub max: u32,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SubgroupSettings {
    pub name: String,
    pub members: Vec<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RosterFile {
    /// csv, xlsx or json
    pub provider: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "worksheetName")]
    pub worksheet_name: Option<String>,
}

/// The content of the JSON configuration file. Every entry is optional.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct SurveyConfig {
    #[serde(rename = "surveyName")]
    pub survey_name: Option<String>,
    #[serde(rename = "storePath")]
    pub store_path: Option<String>,
    pub criteria: Option<Vec<String>>,
    #[serde(rename = "scoreRange")]
    pub score_range: Option<RangeSettings>,
    pub subgroups: Option<Vec<SubgroupSettings>>,
    #[serde(rename = "rosterFile")]
    pub roster_file: Option<RosterFile>,
}

/// The resolved settings of a survey.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Settings {
    pub name: String,
    pub store_path: PathBuf,
    /// Always NUM_CRITERIA labels.
    pub criteria: Vec<String>,
    pub range: ScoreRange,
    pub roster: Roster,
}

pub fn default_subgroups() -> Vec<Subgroup> {
    vec![
        Subgroup::new(
            "Subgroup 01",
            &["Artur Prazeres", "Filipe Correia", "Thiago Carvalho", "Walter Maia"],
        ),
        Subgroup::new(
            "Subgroup 02",
            &["João Carlos", "João Patriota", "João Pessôa", "Mateus Dornellas"],
        ),
        Subgroup::new(
            "Subgroup 03",
            &["Antônio Manoel", "Breno Santiago", "Gabriel Ribeiro", "João Henrique"],
        ),
    ]
}

pub fn read_config(path: &str) -> SurveyResult<SurveyConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: SurveyConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    debug!("read_config: {:?}", config);
    Ok(config)
}

fn resolve_criteria(criteria: Option<Vec<String>>) -> SurveyResult<Vec<String>> {
    let labels: Vec<String> = match criteria {
        None => return Ok(DEFAULT_CRITERIA.iter().map(|c| c.to_string()).collect()),
        Some(labels) => labels.iter().map(|l| l.trim().to_string()).collect(),
    };
    ensure!(
        labels.len() == NUM_CRITERIA,
        InvalidSettingsSnafu {
            message: format!(
                "expected {} criteria, found {}: {:?}",
                NUM_CRITERIA,
                labels.len(),
                labels
            ),
        }
    );
    ensure!(
        labels.iter().all(|l| !l.is_empty()),
        InvalidSettingsSnafu {
            message: "criteria labels must not be empty",
        }
    );
    // Labels key the criterion means in the reports.
    let mut seen: HashSet<&str> = HashSet::new();
    for l in labels.iter() {
        ensure!(
            seen.insert(l.as_str()),
            InvalidSettingsSnafu {
                message: format!("criterion {:?} is listed twice", l),
            }
        );
    }
    Ok(labels)
}

/// Turns a configuration into settings.
///
/// Relative paths are resolved against `root`, the directory of the configuration file.
/// `store_override` is taken as is.
pub fn resolve_settings(
    config: SurveyConfig,
    root: &Path,
    store_override: Option<&str>,
) -> SurveyResult<Settings> {
    let range = match &config.score_range {
        Some(r) => ScoreRange::new(r.min, r.max).map_err(|e| SurveyError::InvalidSettings {
            message: e.to_string(),
        })?,
        None => ScoreRange::DEFAULT,
    };

    let roster = match (&config.subgroups, &config.roster_file) {
        (Some(_), Some(_)) => {
            return InvalidSettingsSnafu {
                message: "use either subgroups or rosterFile, not both",
            }
            .fail()
        }
        (Some(sgs), None) => roster_from_settings(sgs)?,
        (None, Some(rf)) => read_roster_file(root, rf)?,
        (None, None) => Roster::new(default_subgroups()).context(InvalidRosterSnafu {})?,
    };

    let store_path = match (store_override, &config.store_path) {
        (Some(p), _) => PathBuf::from(p),
        (None, Some(p)) => resolve_path(root, p),
        (None, None) => resolve_path(root, DEFAULT_STORE_PATH),
    };

    Ok(Settings {
        name: config
            .survey_name
            .unwrap_or_else(|| DEFAULT_SURVEY_NAME.to_string()),
        store_path,
        criteria: resolve_criteria(config.criteria)?,
        range,
        roster,
    })
}

pub fn load_settings(config_path: Option<&str>, store_override: Option<&str>) -> SurveyResult<Settings> {
    match config_path {
        Some(path) => {
            info!("Reading the configuration from {:?}", path);
            let config = read_config(path)?;
            let root = Path::new(path).parent().unwrap_or_else(|| Path::new(""));
            resolve_settings(config, root, store_override)
        }
        None => resolve_settings(SurveyConfig::default(), Path::new(""), store_override),
    }
}
