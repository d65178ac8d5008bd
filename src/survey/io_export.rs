// Export artifacts: rankings and raw responses as CSV or XLSX, built in memory.

use crate::survey::*;

use std::path::Path;

use rust_xlsxwriter::{Format, Workbook};

use crate::survey::io_common::{round2, simplify_file_name};
use crate::survey::io_store::{records_to_csv, STORE_HEADER};

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum ExportFormat {
    Csv,
    Xlsx,
}

impl ExportFormat {
    /// Uses the explicit format if given, otherwise the extension of the output path.
    pub fn resolve(format: Option<&str>, out: &str) -> SurveyResult<ExportFormat> {
        let f = match format {
            Some(f) => f.to_lowercase(),
            None => Path::new(out)
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("")
                .to_lowercase(),
        };
        match f.as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "xlsx" => Ok(ExportFormat::Xlsx),
            _ => UnknownFormatSnafu { format: f }.fail(),
        }
    }
}

pub fn ranking_header(criteria: &[String]) -> Vec<String> {
    let mut res: Vec<String> = vec![
        "rank".to_string(),
        "subgroup".to_string(),
        "ratee".to_string(),
        "ratings".to_string(),
    ];
    res.extend(criteria.iter().cloned());
    res.push("composite".to_string());
    res
}

/// Excel limits the names of the worksheets to 31 characters, without []:*?/\
pub fn sheet_name(scope: &RankingScope) -> String {
    match scope {
        RankingScope::Overall => "ATSR".to_string(),
        RankingScope::Subgroup(name) => {
            let cleaned: String = name
                .chars()
                .filter(|c| !matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
                .take(31)
                .collect();
            if cleaned.trim().is_empty() {
                "ATSR".to_string()
            } else {
                cleaned
            }
        }
    }
}

pub fn ranking_to_csv(ranking: &Ranking, criteria: &[String]) -> SurveyResult<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(ranking_header(criteria))
        .context(WritingCsvSnafu {})?;
    for e in ranking.entries.iter() {
        let mut line: Vec<String> = vec![
            e.rank.to_string(),
            e.subgroup.clone(),
            e.ratee.clone(),
            e.num_ratings.to_string(),
        ];
        line.extend(e.criteria_means.iter().map(|m| format!("{:.2}", m)));
        line.push(format!("{:.2}", e.composite));
        wtr.write_record(&line).context(WritingCsvSnafu {})?;
    }
    wtr.into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
        .context(WritingCsvSnafu {})
}

pub fn ranking_to_xlsx(ranking: &Ranking, criteria: &[String]) -> SurveyResult<Vec<u8>> {
    let bold = Format::new().set_bold();
    let decimals = Format::new().set_num_format("0.00");
    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet
            .set_name(sheet_name(&ranking.scope))
            .context(WritingExcelSnafu {})?;
        for (col, h) in ranking_header(criteria).iter().enumerate() {
            sheet
                .write_string_with_format(0, col as u16, h, &bold)
                .context(WritingExcelSnafu {})?;
        }
        sheet.set_column_width(2, 24).context(WritingExcelSnafu {})?;
        for (idx, e) in ranking.entries.iter().enumerate() {
            let row = idx as u32 + 1;
            sheet
                .write_number(row, 0, e.rank)
                .context(WritingExcelSnafu {})?;
            sheet
                .write_string(row, 1, &e.subgroup)
                .context(WritingExcelSnafu {})?;
            sheet
                .write_string(row, 2, &e.ratee)
                .context(WritingExcelSnafu {})?;
            sheet
                .write_number(row, 3, e.num_ratings as f64)
                .context(WritingExcelSnafu {})?;
            for (c, m) in e.criteria_means.iter().enumerate() {
                sheet
                    .write_number_with_format(row, (4 + c) as u16, round2(*m), &decimals)
                    .context(WritingExcelSnafu {})?;
            }
            sheet
                .write_number_with_format(row, (4 + NUM_CRITERIA) as u16, round2(e.composite), &decimals)
                .context(WritingExcelSnafu {})?;
        }
    }
    workbook.save_to_buffer().context(WritingExcelSnafu {})
}

pub fn responses_to_xlsx(records: &[RatingRecord]) -> SurveyResult<Vec<u8>> {
    let bold = Format::new().set_bold();
    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Responses").context(WritingExcelSnafu {})?;
        for (col, h) in STORE_HEADER.iter().enumerate() {
            sheet
                .write_string_with_format(0, col as u16, *h, &bold)
                .context(WritingExcelSnafu {})?;
        }
        for (idx, r) in records.iter().enumerate() {
            let row = idx as u32 + 1;
            sheet.write_string(row, 0, &r.rater).context(WritingExcelSnafu {})?;
            sheet.write_string(row, 1, &r.subgroup).context(WritingExcelSnafu {})?;
            sheet.write_string(row, 2, &r.ratee).context(WritingExcelSnafu {})?;
            for (c, s) in r.scores.iter().enumerate() {
                sheet
                    .write_number(row, (3 + c) as u16, *s)
                    .context(WritingExcelSnafu {})?;
            }
            sheet
                .write_string(row, (3 + NUM_CRITERIA) as u16, &r.timestamp)
                .context(WritingExcelSnafu {})?;
        }
    }
    workbook.save_to_buffer().context(WritingExcelSnafu {})
}

pub fn export_ranking(
    ranking: &Ranking,
    criteria: &[String],
    format: ExportFormat,
) -> SurveyResult<Vec<u8>> {
    debug!(
        "export_ranking: {:?} with {} row(s) as {:?}",
        ranking.scope,
        ranking.len(),
        format
    );
    match format {
        ExportFormat::Csv => ranking_to_csv(ranking, criteria),
        ExportFormat::Xlsx => ranking_to_xlsx(ranking, criteria),
    }
}

pub fn export_responses(records: &[RatingRecord], format: ExportFormat) -> SurveyResult<Vec<u8>> {
    match format {
        ExportFormat::Csv => records_to_csv(records, true),
        ExportFormat::Xlsx => responses_to_xlsx(records),
    }
}

pub fn write_export(path: &str, data: &[u8]) -> SurveyResult<()> {
    fs::write(path, data).context(WritingFileSnafu { path })?;
    info!(
        "Wrote {} byte(s) to {}",
        data.len(),
        simplify_file_name(Path::new(path))
    );
    Ok(())
}
