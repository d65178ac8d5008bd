mod config;
pub mod builder;
pub mod roster;
pub mod store;

use log::{debug, info, warn};

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};

pub use crate::config::*;
use crate::roster::Roster;

// **** Private structures ****

// Running sums for one ratee (in one scope).
#[derive(PartialEq, Debug, Clone)]
struct Accumulator {
    subgroup: String,
    criteria_sums: [u64; NUM_CRITERIA],
    composite_sum: f64,
    count: u64,
}

impl Accumulator {
    fn new(subgroup: &str) -> Accumulator {
        Accumulator {
            subgroup: subgroup.to_string(),
            criteria_sums: [0; NUM_CRITERIA],
            composite_sum: 0.0,
            count: 0,
        }
    }

    fn add(&mut self, record: &RatingRecord) {
        for (sum, s) in self.criteria_sums.iter_mut().zip(record.scores.iter()) {
            *sum += *s as u64;
        }
        self.composite_sum += record.composite();
        self.count += 1;
    }

    fn means(&self) -> [f64; NUM_CRITERIA] {
        let mut res = [0.0; NUM_CRITERIA];
        for (m, sum) in res.iter_mut().zip(self.criteria_sums.iter()) {
            *m = *sum as f64 / self.count as f64;
        }
        res
    }

    fn composite(&self) -> f64 {
        self.composite_sum / self.count as f64
    }
}

// Groups records by ratee, keeping the order in which the ratees were first seen.
#[derive(Debug, Default)]
struct Groups {
    order: Vec<String>,
    by_ratee: HashMap<String, Accumulator>,
}

impl Groups {
    fn add(&mut self, subgroup: &str, record: &RatingRecord) {
        if !self.by_ratee.contains_key(&record.ratee) {
            self.order.push(record.ratee.clone());
        }
        self.by_ratee
            .entry(record.ratee.clone())
            .or_insert_with(|| Accumulator::new(subgroup))
            .add(record);
    }

    fn into_ranking(self, scope: RankingScope) -> Ranking {
        let mut entries: Vec<RankedEntry> = Vec::new();
        for ratee in self.order.iter() {
            if let Some(acc) = self.by_ratee.get(ratee) {
                entries.push(RankedEntry {
                    rank: 0,
                    subgroup: acc.subgroup.clone(),
                    ratee: ratee.clone(),
                    num_ratings: acc.count,
                    criteria_means: acc.means(),
                    composite: acc.composite(),
                });
            }
        }
        entries.sort_by(compare_entries);
        for (idx, e) in entries.iter_mut().enumerate() {
            e.rank = idx as u32 + 1;
        }
        Ranking { scope, entries }
    }
}

// Highest composite first. Ties are resolved by subgroup, then by name, so that
// rankings are reproducible.
fn compare_entries(a: &RankedEntry, b: &RankedEntry) -> Ordering {
    b.composite
        .total_cmp(&a.composite)
        .then_with(|| a.subgroup.cmp(&b.subgroup))
        .then_with(|| a.ratee.cmp(&b.ratee))
}

fn is_self_rating(record: &RatingRecord) -> bool {
    if record.rater == record.ratee {
        warn!(
            "Ignoring a self rating from {} ({}) at {}",
            record.rater, record.subgroup, record.timestamp
        );
        true
    } else {
        false
    }
}

/// Ranks the members of one subgroup against each other.
///
/// Only the records submitted inside the subgroup are considered. When the
/// roster knows the subgroup, ratees that are not members of it are left out.
pub fn rank_subgroup(records: &[RatingRecord], roster: &Roster, subgroup: &str) -> Ranking {
    let members = roster.subgroup(subgroup);
    let mut groups = Groups::default();
    for r in records.iter().filter(|r| r.subgroup == subgroup) {
        if is_self_rating(r) {
            continue;
        }
        if let Some(sg) = members {
            if !sg.contains(&r.ratee) {
                debug!(
                    "rank_subgroup: {}: skipping ratee {} outside of the subgroup",
                    subgroup, r.ratee
                );
                continue;
            }
        }
        groups.add(subgroup, r);
    }
    groups.into_ranking(RankingScope::Subgroup(subgroup.to_string()))
}

/// Ranks every rated person against the whole population.
pub fn rank_overall(records: &[RatingRecord], roster: &Roster) -> Ranking {
    let mut groups = Groups::default();
    for r in records.iter() {
        if is_self_rating(r) {
            continue;
        }
        let subgroup = roster
            .subgroup_of(&r.ratee)
            .map(|sg| sg.name.as_str())
            .unwrap_or(r.subgroup.as_str());
        groups.add(subgroup, r);
    }
    groups.into_ranking(RankingScope::Overall)
}

/// The subgroups to report on: the roster ones first, then the ones only found in the records.
fn subgroup_names(records: &[RatingRecord], roster: &Roster) -> Vec<String> {
    let mut res: Vec<String> = roster.subgroups().iter().map(|sg| sg.name.clone()).collect();
    let known: HashSet<&str> = res.iter().map(|s| s.as_str()).collect();
    let extra: BTreeSet<String> = records
        .iter()
        .filter(|r| !known.contains(r.subgroup.as_str()))
        .map(|r| r.subgroup.clone())
        .collect();
    if !extra.is_empty() {
        info!("Subgroups found in the responses but not in the roster: {:?}", extra);
    }
    res.extend(extra);
    res
}

/// Computes the rankings of every subgroup and the overall ranking.
///
/// Arguments:
/// * `records` all the records of the store
/// * `roster` the current roster, used for the subgroup order and membership
/// * `subgroup_filter` if provided, only this subgroup is ranked (the overall
///   ranking still covers everybody)
pub fn build_report(
    records: &[RatingRecord],
    roster: &Roster,
    subgroup_filter: Option<&str>,
) -> RankingReport {
    info!("Processing {} rating record(s)", records.len());
    let subgroups: Vec<Ranking> = subgroup_names(records, roster)
        .iter()
        .filter(|name| subgroup_filter.map_or(true, |f| f == name.as_str()))
        .map(|name| rank_subgroup(records, roster, name))
        .collect();

    let raters: HashSet<&str> = records.iter().map(|r| r.rater.as_str()).collect();
    let pending_raters: Vec<String> = roster
        .subgroups()
        .iter()
        .filter(|sg| subgroup_filter.map_or(true, |f| f == sg.name))
        .flat_map(|sg| sg.members.iter())
        .filter(|m| !raters.contains(m.as_str()))
        .cloned()
        .collect();

    let overall = rank_overall(records, roster);
    debug!(
        "build_report: {} subgroup ranking(s), {} ratee(s) overall, pending: {:?}",
        subgroups.len(),
        overall.len(),
        pending_raters
    );
    RankingReport {
        subgroups,
        overall,
        num_records: records.len(),
        pending_raters,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::Subgroup;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn rec(rater: &str, subgroup: &str, ratee: &str, scores: Scores) -> RatingRecord {
        RatingRecord {
            rater: rater.to_string(),
            subgroup: subgroup.to_string(),
            ratee: ratee.to_string(),
            scores,
            timestamp: "2024-05-02T10:00:00".to_string(),
        }
    }

    fn roster() -> Roster {
        Roster::new(vec![
            Subgroup::new("G1", &["A", "B", "C"]),
            Subgroup::new("G2", &["D", "E"]),
        ])
        .unwrap()
    }

    fn names(r: &Ranking) -> Vec<&str> {
        r.entries.iter().map(|e| e.ratee.as_str()).collect()
    }

    #[test]
    fn composite_is_the_mean_of_the_ratings() {
        init_logger();
        let records = vec![
            rec("A", "G1", "B", [5, 5, 5, 5, 5]),
            rec("C", "G1", "B", [3, 3, 3, 3, 3]),
            rec("B", "G1", "A", [5, 4, 5, 4, 5]),
        ];
        let ranking = rank_subgroup(&records, &roster(), "G1");
        assert_eq!(names(&ranking), vec!["A", "B"]);
        let b = &ranking.entries[1];
        assert_eq!(b.composite, 4.0);
        assert_eq!(b.criteria_means, [4.0; NUM_CRITERIA]);
        assert_eq!(b.num_ratings, 2);
        assert_eq!(b.rank, 2);
        assert_eq!(ranking.entries[0].composite, 4.6);
    }

    #[test]
    fn criterion_means() {
        let records = vec![
            rec("D", "G2", "E", [1, 2, 3, 4, 5]),
            rec("D", "G2", "E", [3, 2, 1, 4, 5]),
        ];
        let ranking = rank_subgroup(&records, &roster(), "G2");
        assert_eq!(ranking.entries[0].criteria_means, [2.0, 2.0, 2.0, 4.0, 5.0]);
        assert_eq!(ranking.entries[0].composite, 3.0);
    }

    #[test]
    fn ties_are_broken_by_name() {
        let records = vec![
            rec("A", "G1", "C", [4, 4, 4, 4, 4]),
            rec("A", "G1", "B", [4, 4, 4, 4, 4]),
        ];
        let ranking = rank_subgroup(&records, &roster(), "G1");
        assert_eq!(names(&ranking), vec!["B", "C"]);
        assert_eq!(ranking.entries[0].rank, 1);
        assert_eq!(ranking.entries[1].rank, 2);
    }

    #[test]
    fn overall_ranking_across_subgroups() {
        let records = vec![
            rec("A", "G1", "B", [3, 3, 3, 3, 3]),
            rec("D", "G2", "E", [5, 5, 5, 5, 5]),
            rec("E", "G2", "D", [3, 3, 3, 3, 3]),
        ];
        let ranking = rank_overall(&records, &roster());
        assert_eq!(ranking.scope, RankingScope::Overall);
        assert_eq!(names(&ranking), vec!["E", "B", "D"]);
        // Equal composites: G1 comes before G2.
        assert_eq!(ranking.entries[1].subgroup, "G1");
        assert_eq!(ranking.entries[2].subgroup, "G2");
    }

    #[test]
    fn subgroup_ranking_ignores_other_subgroups() {
        let records = vec![
            rec("A", "G1", "B", [2, 2, 2, 2, 2]),
            // Submitted under G2 but about a G1 member.
            rec("D", "G2", "B", [5, 5, 5, 5, 5]),
            rec("D", "G2", "E", [4, 4, 4, 4, 4]),
        ];
        let g1 = rank_subgroup(&records, &roster(), "G1");
        assert_eq!(g1.entries.len(), 1);
        assert_eq!(g1.entries[0].composite, 2.0);
        let g2 = rank_subgroup(&records, &roster(), "G2");
        assert_eq!(names(&g2), vec!["E"]);
        // The overall view counts every rating.
        let overall = rank_overall(&records, &roster());
        let b = overall.entries.iter().find(|e| e.ratee == "B").unwrap();
        assert_eq!(b.composite, 3.5);
    }

    #[test]
    fn self_ratings_are_ignored() {
        let records = vec![
            rec("A", "G1", "A", [5, 5, 5, 5, 5]),
            rec("B", "G1", "A", [1, 1, 1, 1, 1]),
        ];
        let ranking = rank_overall(&records, &roster());
        assert_eq!(ranking.entries.len(), 1);
        assert_eq!(ranking.entries[0].composite, 1.0);
    }

    #[test]
    fn report_lists_subgroups_in_roster_order() {
        let records = vec![
            rec("D", "G2", "E", [4, 4, 4, 4, 4]),
            rec("X", "G9", "Y", [4, 4, 4, 4, 4]),
            rec("A", "G1", "B", [4, 4, 4, 4, 4]),
        ];
        let report = build_report(&records, &roster(), None);
        let scopes: Vec<RankingScope> = report.subgroups.iter().map(|r| r.scope.clone()).collect();
        assert_eq!(
            scopes,
            vec![
                RankingScope::Subgroup("G1".to_string()),
                RankingScope::Subgroup("G2".to_string()),
                RankingScope::Subgroup("G9".to_string()),
            ]
        );
        assert_eq!(report.num_records, 3);
        assert_eq!(report.pending_raters, vec!["B", "C", "E"]);
        assert_eq!(report.overall.len(), 3);
        assert_eq!(report.subgroup("G9").map(|r| r.len()), Some(1));
    }

    #[test]
    fn report_with_filter() {
        let records = vec![
            rec("D", "G2", "E", [4, 4, 4, 4, 4]),
            rec("A", "G1", "B", [4, 4, 4, 4, 4]),
        ];
        let report = build_report(&records, &roster(), Some("G2"));
        assert_eq!(report.subgroups.len(), 1);
        assert!(report.subgroup("G1").is_none());
        assert_eq!(report.pending_raters, vec!["E"]);
        assert_eq!(report.overall.len(), 2);
    }

    #[test]
    fn report_is_idempotent() {
        let records = vec![
            rec("A", "G1", "B", [4, 2, 4, 5, 4]),
            rec("C", "G1", "B", [1, 3, 4, 2, 4]),
            rec("B", "G1", "C", [4, 4, 3, 4, 4]),
            rec("E", "G2", "D", [2, 4, 5, 4, 1]),
        ];
        let first = build_report(&records, &roster(), None);
        let second = build_report(&records, &roster(), None);
        assert_eq!(first, second);
    }

    #[test]
    fn empty_store() {
        let report = build_report(&[], &roster(), None);
        assert!(report.overall.is_empty());
        assert!(report.subgroups.iter().all(|r| r.is_empty()));
        assert_eq!(report.pending_raters.len(), 5);
    }
}
