//! Behaviors group examples under one description.

use crate::example::{Example, RunMode};

/// A described group of examples.
#[derive(Debug)]
pub struct Behavior {
    description: String,
    mode: RunMode,
    examples: Vec<Example>,
}

impl Behavior {
    /// Create a behavior from its examples
    #[must_use]
    pub fn new(description: impl Into<String>, examples: Vec<Example>) -> Self {
        Self {
            description: description.into(),
            mode: RunMode::Normal,
            examples,
        }
    }

    /// Pick every example in this behavior (examples marked skipped stay skipped)
    #[must_use]
    pub fn picked(mut self) -> Self {
        self.mode = RunMode::Picked;
        self
    }

    /// Skip every example in this behavior
    #[must_use]
    pub fn skipped(mut self) -> Self {
        self.mode = RunMode::Skipped;
        self
    }

    /// Behavior description
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Declared run mode
    #[must_use]
    pub const fn mode(&self) -> RunMode {
        self.mode
    }

    /// Examples in declaration order
    #[must_use]
    pub fn examples(&self) -> &[Example] {
        &self.examples
    }

    /// Whether the behavior or any of its examples is picked.
    ///
    /// Picks inside a skipped behavior do not count; the skip dominates.
    #[must_use]
    pub fn has_picked(&self) -> bool {
        match self.mode {
            RunMode::Skipped => false,
            RunMode::Picked => true,
            RunMode::Normal => self
                .examples
                .iter()
                .any(|example| example.mode() == RunMode::Picked),
        }
    }
}

/// Create a behavior from its examples
#[must_use]
pub fn behavior(description: impl Into<String>, examples: Vec<Example>) -> Behavior {
    Behavior::new(description, examples)
}
