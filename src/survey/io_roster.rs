// Reading the roster from side files.

use crate::survey::*;

use std::path::{Path, PathBuf};

use calamine::{open_workbook, DataType, Reader, Xlsx};
use peer_rating::roster::{Roster, Subgroup};

use crate::survey::io_common::resolve_path;
use crate::survey::settings::{RosterFile, SubgroupSettings};

pub fn roster_from_settings(subgroups: &[SubgroupSettings]) -> SurveyResult<Roster> {
    let sgs: Vec<Subgroup> = subgroups
        .iter()
        .map(|sg| Subgroup {
            name: sg.name.clone(),
            members: sg.members.clone(),
        })
        .collect();
    Roster::new(sgs).context(InvalidRosterSnafu {})
}

pub fn read_roster_file(root: &Path, rf: &RosterFile) -> SurveyResult<Roster> {
    let p: PathBuf = resolve_path(root, &rf.file_path);
    let path = p.display().to_string();
    info!("Attempting to read roster file {:?}", path);
    let pairs = match rf.provider.as_str() {
        "csv" => read_csv_pairs(&path)?,
        "xlsx" => read_excel_pairs(&path, rf.worksheet_name.as_deref())?,
        "json" => {
            let contents = fs::read_to_string(&path).context(OpeningJsonSnafu { path })?;
            let sgs: Vec<SubgroupSettings> =
                serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
            return roster_from_settings(&sgs);
        }
        x => whatever!("Roster provider not implemented {:?}", x),
    };
    assemble_roster(&pairs)
}

/// Builds a roster out of (subgroup, member) pairs. Subgroups keep the order of their first appearance.
pub fn assemble_roster(pairs: &[(String, String)]) -> SurveyResult<Roster> {
    let mut sgs: Vec<Subgroup> = Vec::new();
    for (subgroup, member) in pairs.iter() {
        match sgs.iter_mut().find(|sg| sg.name == *subgroup) {
            Some(sg) => sg.members.push(member.clone()),
            None => sgs.push(Subgroup {
                name: subgroup.clone(),
                members: vec![member.clone()],
            }),
        }
    }
    debug!("assemble_roster: {:?}", sgs);
    Roster::new(sgs).context(InvalidRosterSnafu {})
}

// Reads the first two columns after the header line. Blank lines are skipped.
fn read_csv_pairs(path: &str) -> SurveyResult<Vec<(String, String)>> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;
    let mut res: Vec<(String, String)> = Vec::new();
    for (idx, line_r) in rdr.into_records().enumerate() {
        // The header is line 1.
        let lineno = (idx + 2) as u64;
        let line = line_r.context(CsvLineParseSnafu { path, lineno })?;
        if line.iter().all(|s| s.trim().is_empty()) {
            continue;
        }
        let subgroup = line.get(0).context(CsvLineTooShortSnafu { path, lineno })?;
        let member = line.get(1).context(CsvLineTooShortSnafu { path, lineno })?;
        res.push((subgroup.trim().to_string(), member.trim().to_string()));
    }
    Ok(res)
}

fn read_excel_pairs(path: &str, worksheet: Option<&str>) -> SurveyResult<Vec<(String, String)>> {
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;
    let wrange = match worksheet {
        Some(name) => workbook
            .worksheet_range(name)
            .context(MissingWorksheetSnafu { path, sheet: name })?
            .context(OpeningExcelSnafu { path })?,
        None => workbook
            .worksheet_range_at(0)
            .context(EmptyExcelSnafu { path })?
            .context(OpeningExcelSnafu { path })?,
    };

    let mut iter = wrange.rows();
    let header = iter.next().context(EmptyExcelSnafu { path })?;
    debug!("read_excel_pairs: header: {:?}", header);

    let mut res: Vec<(String, String)> = Vec::new();
    for (idx, row) in iter.enumerate() {
        let lineno = (idx + 2) as u64;
        let subgroup = read_name_cell(row.get(0), lineno)?;
        let member = read_name_cell(row.get(1), lineno)?;
        match (subgroup, member) {
            (None, None) => continue,
            (Some(s), Some(m)) => res.push((s, m)),
            _ => {
                return ExcelWrongCellTypeSnafu {
                    lineno,
                    content: format!("{:?}", row),
                }
                .fail()
            }
        }
    }
    Ok(res)
}

fn read_name_cell(cell: Option<&DataType>, lineno: u64) -> SurveyResult<Option<String>> {
    match cell {
        None | Some(DataType::Empty) => Ok(None),
        Some(DataType::String(s)) if s.trim().is_empty() => Ok(None),
        Some(DataType::String(s)) => Ok(Some(s.trim().to_string())),
        // Subgroups are sometimes plain numbers.
        Some(DataType::Int(i)) => Ok(Some(i.to_string())),
        Some(DataType::Float(f)) if f.fract() == 0.0 => Ok(Some((*f as i64).to_string())),
        Some(c) => ExcelWrongCellTypeSnafu {
            lineno,
            content: format!("{:?}", c),
        }
        .fail(),
    }
}
