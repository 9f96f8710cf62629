use crate::augment::Augmenter;
use crate::query::StreamQuery;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use streamhub_common::{Record, Result, StreamHubError};
use tracing::{debug, warn};

/// per-record decision of the filter
#[derive(Debug)]
pub enum Outcome {
    Accept(Record),
    Reject,
    Failed(StreamHubError),
}

impl Outcome {
    pub fn is_accept(&self) -> bool {
        matches!(self, Outcome::Accept(_))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterStats {
    pub accepted: u64,
    pub rejected: u64,
    pub failed: u64,
}

impl FilterStats {
    pub fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Accept(_) => self.accepted += 1,
            Outcome::Reject => self.rejected += 1,
            Outcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.accepted + self.rejected + self.failed
    }
}

/// Augments raw records and routes them through a parsed query.
#[derive(Debug, Clone)]
pub struct StreamFilter {
    query: StreamQuery,
    augmenter: Augmenter,
}

impl StreamFilter {
    pub fn new(query: StreamQuery, augmenter: Augmenter) -> Self {
        Self { query, augmenter }
    }

    pub fn query(&self) -> &StreamQuery {
        &self.query
    }

    pub fn process_record(&self, record: Record) -> Outcome {
        let record = self.augmenter.augment(record);
        match self.query.evaluate(&record) {
            Ok(true) => Outcome::Accept(record),
            Ok(false) => Outcome::Reject,
            Err(e) => {
                warn!(error = %e, "record could not be evaluated, rejecting");
                Outcome::Failed(e)
            }
        }
    }

    /// one NDJSON line; blank lines are rejected without being counted as failures
    pub fn process_line(&self, line: &str) -> Outcome {
        let line = line.trim();
        if line.is_empty() {
            debug!("skipping blank line");
            return Outcome::Reject;
        }
        match Record::from_json_str(line) {
            Ok(record) => self.process_record(record),
            Err(e) => {
                warn!(error = %e, "malformed input record, rejecting");
                Outcome::Failed(e)
            }
        }
    }

    /// evaluate already-augmented records in parallel over the shared tree
    pub fn filter_batch(&self, records: &[Record]) -> Vec<Result<bool>> {
        records.par_iter().map(|r| self.query.evaluate(r)).collect()
    }
}
