use log::debug;

pub use crate::config::*;
use crate::roster::Roster;

/// The form filled by one rater: one score per criterion for every peer of the subgroup.
///
/// ```
/// use peer_rating::builder::ScoreSheet;
/// use peer_rating::roster::{Roster, Subgroup};
/// use peer_rating::{RatingErrors, ScoreRange};
///
/// let roster = Roster::new(vec![Subgroup::new("G1", &["Ana", "Bruno"])])?;
/// let mut sheet = ScoreSheet::new(&roster, "Ana")?;
/// sheet.set_scores("Bruno", &[Some(4), Some(5), Some(3), Some(4), Some(5)])?;
/// let records = sheet.finish(ScoreRange::DEFAULT, "2024-05-02T10:00:00")?;
/// assert_eq!(records.len(), 1);
///
/// # Ok::<(), RatingErrors>(())
/// ```
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ScoreSheet {
    rater: String,
    subgroup: String,
    peers: Vec<String>,
    // Parallel to `peers`.
    scores: Vec<[Option<u32>; NUM_CRITERIA]>,
}

impl ScoreSheet {
    pub fn new(roster: &Roster, rater: &str) -> Result<ScoreSheet, RatingErrors> {
        let rater = rater.trim();
        if rater.is_empty() {
            return Err(RatingErrors::EmptyIdentifier("rater"));
        }
        let subgroup = roster
            .subgroup_of(rater)
            .ok_or_else(|| RatingErrors::UnknownRater(rater.to_string()))?
            .name
            .clone();
        let peers = roster.peers(&subgroup, rater)?;
        debug!(
            "ScoreSheet::new: rater {:?} subgroup {:?} peers {:?}",
            rater, subgroup, peers
        );
        Ok(ScoreSheet {
            rater: rater.to_string(),
            subgroup,
            scores: vec![[None; NUM_CRITERIA]; peers.len()],
            peers,
        })
    }

    pub fn rater(&self) -> &str {
        &self.rater
    }

    pub fn subgroup(&self) -> &str {
        &self.subgroup
    }

    pub fn peers(&self) -> &[String] {
        &self.peers
    }

    /// The scores entered so far for a peer.
    pub fn scores_of(&self, ratee: &str) -> Option<&[Option<u32>; NUM_CRITERIA]> {
        self.peers
            .iter()
            .position(|p| p == ratee)
            .map(|idx| &self.scores[idx])
    }

    /// The mean of the scores entered so far for a peer, if any.
    pub fn running_mean(&self, ratee: &str) -> Option<f64> {
        let filled: Vec<u64> = self
            .scores_of(ratee)?
            .iter()
            .flatten()
            .map(|s| *s as u64)
            .collect();
        if filled.is_empty() {
            None
        } else {
            Some(filled.iter().sum::<u64>() as f64 / filled.len() as f64)
        }
    }

    fn peer_index(&self, ratee: &str) -> Result<usize, RatingErrors> {
        if ratee == self.rater {
            return Err(RatingErrors::SelfRatingAttempt(ratee.to_string()));
        }
        self.peers
            .iter()
            .position(|p| p == ratee)
            .ok_or_else(|| RatingErrors::NotInSubgroup {
                name: ratee.to_string(),
                subgroup: self.subgroup.clone(),
            })
    }

    pub fn set_score(
        &mut self,
        ratee: &str,
        criterion: usize,
        score: u32,
    ) -> Result<(), RatingErrors> {
        let idx = self.peer_index(ratee)?;
        let slot = self.scores[idx]
            .get_mut(criterion)
            .ok_or(RatingErrors::InvalidCriterion(criterion))?;
        *slot = Some(score);
        Ok(())
    }

    /// Sets the scores of a peer, criterion after criterion.
    ///
    /// A `None` clears the slot. Fewer values than criteria leave the remaining
    /// slots untouched.
    pub fn set_scores(&mut self, ratee: &str, scores: &[Option<u32>]) -> Result<(), RatingErrors> {
        let idx = self.peer_index(ratee)?;
        if scores.len() > NUM_CRITERIA {
            return Err(RatingErrors::InvalidCriterion(scores.len() - 1));
        }
        for (criterion, s) in scores.iter().enumerate() {
            self.scores[idx][criterion] = *s;
        }
        Ok(())
    }

    /// The (peer, criterion) slots that still have no score.
    pub fn missing(&self) -> Vec<(String, usize)> {
        let mut res: Vec<(String, usize)> = Vec::new();
        for (peer, scores) in self.peers.iter().zip(self.scores.iter()) {
            for (criterion, s) in scores.iter().enumerate() {
                if s.is_none() {
                    res.push((peer.clone(), criterion));
                }
            }
        }
        res
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    /// Validates the sheet and produces one record per peer.
    ///
    /// Either all the records are returned or none: a missing or out-of-range
    /// score rejects the whole sheet.
    pub fn finish(
        &self,
        range: ScoreRange,
        timestamp: &str,
    ) -> Result<Vec<RatingRecord>, RatingErrors> {
        let missing = self.missing();
        if !missing.is_empty() {
            return Err(RatingErrors::IncompleteSubmission { missing });
        }
        let mut res: Vec<RatingRecord> = Vec::new();
        for (peer, scores) in self.peers.iter().zip(self.scores.iter()) {
            let mut checked: Scores = [0; NUM_CRITERIA];
            for (criterion, s) in scores.iter().enumerate() {
                // All the slots are filled at this point.
                let score = s.unwrap_or_default();
                if !range.contains(score) {
                    return Err(RatingErrors::ScoreOutOfRange {
                        ratee: peer.clone(),
                        criterion,
                        score,
                        range,
                    });
                }
                checked[criterion] = score;
            }
            res.push(RatingRecord {
                rater: self.rater.clone(),
                subgroup: self.subgroup.clone(),
                ratee: peer.clone(),
                scores: checked,
                timestamp: timestamp.to_string(),
            });
        }
        Ok(res)
    }
}
