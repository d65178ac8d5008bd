// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

/// The number of criteria every peer is rated on.
pub const NUM_CRITERIA: usize = 5;

/// The labels of the criteria, in the order of the score columns.
pub const DEFAULT_CRITERIA: [&str; NUM_CRITERIA] = [
    "Communication",
    "Efficiency during the process",
    "Participation and presence",
    "Creative process and insights",
    "Responsibility and precedence",
];

/// One integer score per criterion, in the order of `DEFAULT_CRITERIA`.
pub type Scores = [u32; NUM_CRITERIA];

/// The inclusive range of the accepted scores.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct ScoreRange {
    pub min: u32,
    pub max: u32,
}

impl ScoreRange {
    pub const DEFAULT: ScoreRange = ScoreRange { min: 1, max: 5 };

    pub fn new(min: u32, max: u32) -> Result<ScoreRange, RatingErrors> {
        if min > max {
            return Err(RatingErrors::InvalidScoreRange { min, max });
        }
        Ok(ScoreRange { min, max })
    }

    pub fn contains(&self, score: u32) -> bool {
        self.min <= score && score <= self.max
    }
}

impl Default for ScoreRange {
    fn default() -> Self {
        ScoreRange::DEFAULT
    }
}

impl Display for ScoreRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

/// A rating of one peer by one rater, as persisted in a store.
///
/// Records are created once at submission time and never modified afterwards.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RatingRecord {
    pub rater: String,
    /// The subgroup of the rater. The ratee always belongs to the same subgroup.
    pub subgroup: String,
    pub ratee: String,
    pub scores: Scores,
    /// Submission time, ISO-8601. All the records of one submission share it.
    pub timestamp: String,
}

impl RatingRecord {
    /// The mean of the five scores.
    pub fn composite(&self) -> f64 {
        let total: u64 = self.scores.iter().map(|s| *s as u64).sum();
        total as f64 / NUM_CRITERIA as f64
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum RatingErrors {
    EmptyIdentifier(&'static str),
    /// The rater is not listed in any subgroup.
    UnknownRater(String),
    NotInSubgroup {
        name: String,
        subgroup: String,
    },
    SelfRatingAttempt(String),
    /// Every (ratee, criterion index) slot that was left empty.
    IncompleteSubmission {
        missing: Vec<(String, usize)>,
    },
    ScoreOutOfRange {
        ratee: String,
        criterion: usize,
        score: u32,
        range: ScoreRange,
    },
    InvalidCriterion(usize),
    InvalidRoster(String),
    InvalidScoreRange {
        min: u32,
        max: u32,
    },
}

impl RatingErrors {
    /// True when the submission lacks a score or holds one outside the range.
    pub fn is_incomplete(&self) -> bool {
        matches!(
            self,
            RatingErrors::IncompleteSubmission { .. } | RatingErrors::ScoreOutOfRange { .. }
        )
    }
}

impl Error for RatingErrors {}

impl Display for RatingErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RatingErrors::EmptyIdentifier(field) => write!(f, "the {} must not be empty", field),
            RatingErrors::UnknownRater(name) => {
                write!(f, "{} is not listed in any subgroup", name)
            }
            RatingErrors::NotInSubgroup { name, subgroup } => {
                write!(f, "{} is not a member of {}", name, subgroup)
            }
            RatingErrors::SelfRatingAttempt(name) => {
                write!(f, "{} cannot rate themselves", name)
            }
            RatingErrors::IncompleteSubmission { missing } => {
                let mut peers: Vec<&str> = missing.iter().map(|(p, _)| p.as_str()).collect();
                peers.dedup();
                write!(
                    f,
                    "incomplete submission: {} score(s) missing for {}",
                    missing.len(),
                    peers.join(", ")
                )
            }
            RatingErrors::ScoreOutOfRange {
                ratee,
                criterion,
                score,
                range,
            } => write!(
                f,
                "score {} for {} (criterion {}) is outside of {}",
                score,
                ratee,
                criterion + 1,
                range
            ),
            RatingErrors::InvalidCriterion(idx) => write!(
                f,
                "criterion {} does not exist (there are {} criteria)",
                idx + 1,
                NUM_CRITERIA
            ),
            RatingErrors::InvalidRoster(msg) => write!(f, "invalid roster: {}", msg),
            RatingErrors::InvalidScoreRange { min, max } => {
                write!(f, "invalid score range: min {} is above max {}", min, max)
            }
        }
    }
}

// ******** Output data structures *********

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum RankingScope {
    Subgroup(String),
    Overall,
}

/// One line of a ranking.
#[derive(PartialEq, Debug, Clone)]
pub struct RankedEntry {
    /// 1-based position in the ranking.
    pub rank: u32,
    pub subgroup: String,
    pub ratee: String,
    /// The number of records that contributed to the means.
    pub num_ratings: u64,
    pub criteria_means: [f64; NUM_CRITERIA],
    pub composite: f64,
}

#[derive(PartialEq, Debug, Clone)]
pub struct Ranking {
    pub scope: RankingScope,
    pub entries: Vec<RankedEntry>,
}

impl Ranking {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct RankingReport {
    /// One ranking per subgroup, in roster order.
    pub subgroups: Vec<Ranking>,
    pub overall: Ranking,
    pub num_records: usize,
    /// Roster members that have not submitted anything yet.
    pub pending_raters: Vec<String>,
}

impl RankingReport {
    pub fn empty() -> RankingReport {
        RankingReport {
            subgroups: Vec::new(),
            overall: Ranking {
                scope: RankingScope::Overall,
                entries: Vec::new(),
            },
            num_records: 0,
            pending_raters: Vec::new(),
        }
    }

    pub fn subgroup(&self, name: &str) -> Option<&Ranking> {
        self.subgroups
            .iter()
            .find(|r| matches!(&r.scope, RankingScope::Subgroup(s) if s == name))
    }
}
