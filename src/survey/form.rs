// The rating form, on a terminal or any other line-based input.

use crate::survey::*;

use std::io::{BufRead, Write};

use peer_rating::builder::ScoreSheet;

use crate::survey::settings::Settings;

/// Parses a "Name=4,5,3,4,5" argument. Blank values are missing scores.
pub fn parse_score_arg(arg: &str) -> SurveyResult<(String, Vec<Option<u32>>)> {
    let (name, values) = arg.rsplit_once('=').context(ScoreArgumentSnafu { arg })?;
    let name = name.trim();
    ensure!(!name.is_empty(), ScoreArgumentSnafu { arg });
    let mut scores: Vec<Option<u32>> = Vec::new();
    for v in values.split(',') {
        let v = v.trim();
        if v.is_empty() {
            scores.push(None);
        } else {
            let s = v.parse::<u32>().ok().context(ScoreArgumentSnafu { arg })?;
            scores.push(Some(s));
        }
    }
    ensure!(scores.len() <= NUM_CRITERIA, ScoreArgumentSnafu { arg });
    Ok((name.to_string(), scores))
}

fn read_answer<R: BufRead>(input: &mut R) -> SurveyResult<Option<String>> {
    let mut buf = String::new();
    let n = input.read_line(&mut buf).context(FormIoSnafu {})?;
    if n == 0 {
        Ok(None)
    } else {
        Ok(Some(buf.trim().to_string()))
    }
}

/// Asks for every score of the sheet, then for a confirmation.
///
/// An empty answer leaves the score missing. Returns false when the rater
/// does not confirm or when the input ends before the form is done.
pub fn fill_sheet<R: BufRead, W: Write>(
    sheet: &mut ScoreSheet,
    settings: &Settings,
    input: &mut R,
    output: &mut W,
) -> SurveyResult<bool> {
    let range = settings.range;
    writeln!(output, "# {}", settings.name).context(FormIoSnafu {})?;
    writeln!(
        output,
        "{}, you are in {}. Rate each peer on {} criteria, from {} to {}.",
        sheet.rater(),
        sheet.subgroup(),
        NUM_CRITERIA,
        range.min,
        range.max
    )
    .context(FormIoSnafu {})?;

    for peer in sheet.peers().to_vec() {
        writeln!(output, "\nRate: {}", peer).context(FormIoSnafu {})?;
        for (criterion, label) in settings.criteria.iter().enumerate() {
            loop {
                write!(output, "  {} [{}-{}]: ", label, range.min, range.max)
                    .context(FormIoSnafu {})?;
                output.flush().context(FormIoSnafu {})?;
                let answer = match read_answer(input)? {
                    Some(a) => a,
                    None => {
                        writeln!(output, "\nForm abandoned.").context(FormIoSnafu {})?;
                        return Ok(false);
                    }
                };
                if answer.is_empty() {
                    break;
                }
                match answer.parse::<u32>() {
                    Ok(score) if range.contains(score) => {
                        sheet
                            .set_score(&peer, criterion, score)
                            .context(RejectedSnafu {})?;
                        break;
                    }
                    _ => {
                        writeln!(
                            output,
                            "  Please enter a whole number between {} and {}.",
                            range.min, range.max
                        )
                        .context(FormIoSnafu {})?;
                    }
                }
            }
        }
        if let Some(mean) = sheet.running_mean(&peer) {
            writeln!(output, "  Mean ({} criteria) for {}: {:.2}", NUM_CRITERIA, peer, mean)
                .context(FormIoSnafu {})?;
        }
    }

    let missing = sheet.missing().len();
    if missing > 0 {
        writeln!(output, "\n{} score(s) are still missing.", missing).context(FormIoSnafu {})?;
    }
    write!(output, "\nSubmit your ratings? [y/N]: ").context(FormIoSnafu {})?;
    output.flush().context(FormIoSnafu {})?;
    let confirmed = matches!(
        read_answer(input)?.map(|a| a.to_lowercase()).as_deref(),
        Some("y") | Some("yes")
    );
    debug!("fill_sheet: {} confirmed: {}", sheet.rater(), confirmed);
    Ok(confirmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::survey::settings::{resolve_settings, SubgroupSettings, SurveyConfig};
    use std::io::Cursor;
    use std::path::Path;

    fn settings() -> Settings {
        let config = SurveyConfig {
            subgroups: Some(vec![SubgroupSettings {
                name: "G1".to_string(),
                members: vec!["Ana".to_string(), "Bruno".to_string(), "Carla".to_string()],
            }]),
            ..SurveyConfig::default()
        };
        resolve_settings(config, Path::new(""), None).unwrap()
    }

    fn run_form(rater: &str, answers: &str) -> (ScoreSheet, bool, String) {
        let s = settings();
        let mut sheet = ScoreSheet::new(&s.roster, rater).unwrap();
        let mut input = Cursor::new(answers.as_bytes().to_vec());
        let mut output: Vec<u8> = Vec::new();
        let confirmed = fill_sheet(&mut sheet, &s, &mut input, &mut output).unwrap();
        (sheet, confirmed, String::from_utf8(output).unwrap())
    }

    #[test]
    fn score_arguments() {
        assert_eq!(
            parse_score_arg("Filipe Correia=4,5,3,4,5").unwrap(),
            (
                "Filipe Correia".to_string(),
                vec![Some(4), Some(5), Some(3), Some(4), Some(5)]
            )
        );
        assert_eq!(
            parse_score_arg(" Ana = 1, ,3").unwrap(),
            ("Ana".to_string(), vec![Some(1), None, Some(3)])
        );
        assert!(parse_score_arg("Ana").is_err());
        assert!(parse_score_arg("=1,2,3,4,5").is_err());
        assert!(parse_score_arg("Ana=1,2,x,4,5").is_err());
        assert!(parse_score_arg("Ana=1,2,3,4,5,6").is_err());
    }

    #[test]
    fn complete_form() {
        let answers = "5\n4\n3\n4\n5\n2\n2\n2\n2\n2\ny\n";
        let (sheet, confirmed, out) = run_form("Bruno", answers);
        assert!(confirmed);
        assert!(sheet.is_complete());
        assert_eq!(sheet.scores_of("Ana").unwrap()[0], Some(5));
        assert_eq!(sheet.scores_of("Carla").unwrap()[4], Some(2));
        assert!(out.contains("Rate: Ana"));
        assert!(out.contains("Mean (5 criteria) for Ana: 4.20"));
        assert!(!out.contains("Rate: Bruno"));
    }

    #[test]
    fn invalid_answers_are_asked_again() {
        let answers = "9\nfive\n5\n4\n3\n4\n5\n2\n2\n2\n2\n2\nn\n";
        let (sheet, confirmed, out) = run_form("Bruno", answers);
        assert!(!confirmed);
        assert!(sheet.is_complete());
        assert_eq!(out.matches("Please enter a whole number between 1 and 5.").count(), 2);
    }

    #[test]
    fn blank_answers_stay_missing() {
        let answers = "5\n\n3\n4\n5\n2\n2\n2\n2\n2\ny\n";
        let (sheet, confirmed, out) = run_form("Bruno", answers);
        assert!(confirmed);
        assert_eq!(sheet.missing(), vec![("Ana".to_string(), 1)]);
        assert!(out.contains("1 score(s) are still missing."));
        assert!(sheet
            .finish(ScoreRange::DEFAULT, "t0")
            .unwrap_err()
            .is_incomplete());
    }

    #[test]
    fn end_of_input_abandons_the_form() {
        let (sheet, confirmed, out) = run_form("Ana", "3\n3\n");
        assert!(!confirmed);
        assert!(!sheet.is_complete());
        assert!(out.contains("Form abandoned."));
    }
}
