//! Run summary counts.

use crate::claim::{ClaimResult, ResultKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::AddAssign;

/// Aggregate counts for a run, a behavior, or a single example.
///
/// Counts only ever grow. Claim counts come from leaf results; composite
/// groupings are structure and never counted themselves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Behaviors entered
    pub behaviors: usize,
    /// Examples entered, whether validated or skipped
    pub examples: usize,
    /// Leaf claims that held
    pub valid: usize,
    /// Leaf claims that failed
    pub invalid: usize,
    /// Leaf claims that did not run
    pub skipped: usize,
    /// Examples ended early by a context failure
    pub aborted: usize,
}

impl Summary {
    /// Create an empty summary
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count the leaves of one claim result
    pub fn add_result(&mut self, result: &ClaimResult) {
        result.for_each_leaf(&mut |leaf| match leaf.kind {
            ResultKind::Valid => self.valid += 1,
            ResultKind::Invalid { .. } => self.invalid += 1,
            ResultKind::Skipped => self.skipped += 1,
        });
    }

    /// Total leaf claims counted
    #[must_use]
    pub const fn claims(&self) -> usize {
        self.valid + self.invalid + self.skipped
    }

    /// Whether nothing failed and no example was aborted
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.invalid == 0 && self.aborted == 0
    }
}

impl AddAssign for Summary {
    fn add_assign(&mut self, other: Self) {
        self.behaviors += other.behaviors;
        self.examples += other.examples;
        self.valid += other.valid;
        self.invalid += other.invalid;
        self.skipped += other.skipped;
        self.aborted += other.aborted;
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} behaviors, {} examples: {} valid, {} invalid, {} skipped",
            self.behaviors, self.examples, self.valid, self.invalid, self.skipped
        )?;
        if self.aborted > 0 {
            write!(f, ", {} aborted", self.aborted)?;
        }
        Ok(())
    }
}
