use std::convert::Infallible;
use std::error::Error;
use std::fmt::Display;

use log::{debug, info};

use crate::builder::ScoreSheet;
use crate::config::*;

/// The system of record for the ratings.
///
/// Stores are append-only: records are never updated nor deleted through this interface.
pub trait RatingStore {
    type Error: Error;

    /// Appends a batch of records. Either the whole batch is stored or nothing is.
    fn append(&mut self, records: &[RatingRecord]) -> Result<(), Self::Error>;

    /// All the records, in insertion order.
    fn read_all(&self) -> Result<Vec<RatingRecord>, Self::Error>;
}

/// A store that only lives in memory.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct MemoryStore {
    records: Vec<RatingRecord>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RatingStore for MemoryStore {
    type Error = Infallible;

    fn append(&mut self, records: &[RatingRecord]) -> Result<(), Infallible> {
        self.records.extend_from_slice(records);
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<RatingRecord>, Infallible> {
        Ok(self.records.clone())
    }
}

#[derive(Debug)]
pub enum SubmitError<E> {
    /// The sheet was not valid. Nothing was written.
    Rejected(RatingErrors),
    /// The store could not take the batch. Nothing was written, the submission can be retried.
    Store(E),
}

impl<E: Error> Error for SubmitError<E> {}

impl<E: Display> Display for SubmitError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitError::Rejected(e) => write!(f, "submission rejected: {}", e),
            SubmitError::Store(e) => write!(f, "could not save the submission, please retry: {}", e),
        }
    }
}

/// Validates a score sheet and appends its records to the store as one batch.
///
/// Returns the number of records written.
pub fn submit<S: RatingStore>(
    store: &mut S,
    sheet: &ScoreSheet,
    range: ScoreRange,
    timestamp: &str,
) -> Result<usize, SubmitError<S::Error>> {
    let records = sheet.finish(range, timestamp).map_err(SubmitError::Rejected)?;
    debug!("submit: {:?}", records);
    store.append(&records).map_err(SubmitError::Store)?;
    info!(
        "Saved {} rating(s) from {} ({})",
        records.len(),
        sheet.rater(),
        sheet.subgroup()
    );
    Ok(records.len())
}
