//! Sourcing outcome reporting.

use serde::{Deserialize, Serialize};

/// Summary of one sourcing run, logged so callers can see exactly why a
/// run produced the count it did.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcingReport {
    /// Candidates the run aimed for.
    pub requested: usize,
    /// Candidates that passed both gates and were retained.
    pub accepted: usize,
    /// Candidates dropped by the aspect-ratio / resolution check.
    pub rejected_geometry: usize,
    /// Candidates dropped by the relevance gate.
    pub rejected_relevance: usize,
    /// Candidates dropped as duplicates of an already-accepted source.
    pub duplicates: usize,
    /// Provider queries issued.
    pub attempts: usize,
    /// Whether a quota-exhaustion signal was observed.
    pub quota_exhausted: bool,
}

impl SourcingReport {
    /// Start a report for a run targeting `requested` candidates.
    pub fn new(requested: usize) -> Self {
        Self {
            requested,
            ..Default::default()
        }
    }

    /// Whether the accepted count clears the partial-success threshold.
    pub fn met(&self, required: usize) -> bool {
        self.accepted >= required
    }
}
