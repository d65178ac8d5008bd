// The organizer dashboard, as text and as JSON.

use crate::survey::*;

use std::fmt::Write;

use peer_rating::roster::Roster;
use serde_json::json;
use serde_json::Map as JSMap;

use crate::survey::io_common::round2;
use crate::survey::settings::Settings;

pub fn render_roster(roster: &Roster) -> String {
    let mut s = String::new();
    for sg in roster.subgroups().iter() {
        let _ = writeln!(s, "{}", sg.name);
        for m in sg.members.iter() {
            let _ = writeln!(s, "  - {}", m);
        }
    }
    s
}

pub fn render_peers(roster: &Roster, rater: &str) -> SurveyResult<String> {
    let sg = roster
        .subgroup_of(rater)
        .ok_or_else(|| RatingErrors::UnknownRater(rater.to_string()))
        .context(RejectedSnafu {})?;
    let peers = roster.peers(&sg.name, rater).context(RejectedSnafu {})?;
    let mut s = String::new();
    let _ = writeln!(s, "{} is in {}. Peers to rate:", rater, sg.name);
    for p in peers.iter() {
        let _ = writeln!(s, "  - {}", p);
    }
    Ok(s)
}

fn scope_title(scope: &RankingScope) -> String {
    match scope {
        RankingScope::Subgroup(name) => name.clone(),
        RankingScope::Overall => "Overall ranking".to_string(),
    }
}

/// A ranking as a text table. Criteria are shown as C1..C5, see `render_legend`.
pub fn render_ranking(ranking: &Ranking) -> String {
    let mut s = String::new();
    let _ = writeln!(s, "## {}", scope_title(&ranking.scope));
    if ranking.is_empty() {
        let _ = writeln!(s, "(no ratings yet)");
        return s;
    }
    let name_w = ranking
        .entries
        .iter()
        .map(|e| e.ratee.chars().count())
        .max()
        .unwrap_or(0)
        .max(4);
    let sg_w = ranking
        .entries
        .iter()
        .map(|e| e.subgroup.chars().count())
        .max()
        .unwrap_or(0)
        .max(8);
    let _ = write!(
        s,
        "{:>3}  {:<sg_w$}  {:<name_w$}  {:>3}",
        "#",
        "Subgroup",
        "Name",
        "n",
        sg_w = sg_w,
        name_w = name_w
    );
    for c in 1..=NUM_CRITERIA {
        let _ = write!(s, "  {:>5}", format!("C{}", c));
    }
    let _ = writeln!(s, "  {:>5}", "Score");
    for e in ranking.entries.iter() {
        let _ = write!(
            s,
            "{:>3}  {:<sg_w$}  {:<name_w$}  {:>3}",
            e.rank,
            e.subgroup,
            e.ratee,
            e.num_ratings,
            sg_w = sg_w,
            name_w = name_w
        );
        for m in e.criteria_means.iter() {
            let _ = write!(s, "  {:>5.2}", m);
        }
        let _ = writeln!(s, "  {:>5.2}", e.composite);
    }
    s
}

pub fn render_legend(criteria: &[String]) -> String {
    let mut s = String::new();
    for (idx, c) in criteria.iter().enumerate() {
        let _ = writeln!(s, "C{}: {}", idx + 1, c);
    }
    s
}

pub fn render_report(report: &RankingReport, criteria: &[String]) -> String {
    let mut s = String::new();
    let _ = writeln!(s, "# Organizer dashboard ({} response(s))", report.num_records);
    s.push_str(&render_legend(criteria));
    for r in report.subgroups.iter() {
        s.push('\n');
        s.push_str(&render_ranking(r));
    }
    s.push('\n');
    s.push_str(&render_ranking(&report.overall));
    if !report.pending_raters.is_empty() {
        let _ = writeln!(
            s,
            "\nNo submission yet from: {}",
            report.pending_raters.join(", ")
        );
    }
    s
}

pub fn render_responses(records: &[RatingRecord], criteria: &[String]) -> String {
    let mut s = String::new();
    let _ = writeln!(s, "# Responses ({})", records.len());
    s.push_str(&render_legend(criteria));
    for r in records.iter() {
        let scores: Vec<String> = r.scores.iter().map(|x| x.to_string()).collect();
        let _ = writeln!(
            s,
            "{}  {} -> {} ({})  {}",
            r.timestamp,
            r.rater,
            r.ratee,
            r.subgroup,
            scores.join(" ")
        );
    }
    s
}

fn ranking_to_json(ranking: &Ranking, criteria: &[String]) -> Vec<JSValue> {
    let mut l: Vec<JSValue> = Vec::new();
    for e in ranking.entries.iter() {
        let mut means: JSMap<String, JSValue> = JSMap::new();
        for (label, m) in criteria.iter().zip(e.criteria_means.iter()) {
            means.insert(label.clone(), json!(round2(*m)));
        }
        l.push(json!({
            "rank": e.rank,
            "subgroup": e.subgroup,
            "name": e.ratee,
            "ratings": e.num_ratings,
            "criteria": means,
            "composite": round2(e.composite),
        }));
    }
    l
}

/// The report in JSON. It only depends on the settings and the responses, so
/// it can be compared with a reference report.
pub fn report_to_json(settings: &Settings, report: &RankingReport) -> JSValue {
    let subgroups: Vec<JSValue> = report
        .subgroups
        .iter()
        .map(|r| {
            json!({
                "subgroup": scope_title(&r.scope),
                "ranking": ranking_to_json(r, &settings.criteria),
            })
        })
        .collect();
    json!({
        "config": {
            "surveyName": settings.name,
            "criteria": settings.criteria,
            "scoreRange": {"min": settings.range.min, "max": settings.range.max},
        },
        "responses": report.num_records,
        "subgroups": subgroups,
        "overall": ranking_to_json(&report.overall, &settings.criteria),
        "pendingRaters": report.pending_raters,
    })
}
