//! Reporter - Run Event Sink
//!
//! The runner narrates a run as a stream of events. A [`Reporter`] receives
//! them in order:
//!
//! ```text
//! start(order)
//!   start_behavior(description)
//!     start_example(description)
//!       record_valid | record_invalid | record_skipped   (one per top-level claim)
//!       bail_out                                          (context failures)
//!     end_example
//!   end_behavior
//! end(summary)
//! ```
//!
//! Claim results arrive as soon as they are known, each carrying its full
//! subsumed tree. Two reporters ship with the crate: [`RecordingReporter`]
//! keeps every event for inspection or JSON export, and [`TracingReporter`]
//! forwards events to `tracing`.

use crate::claim::{ClaimResult, ResultKind};
use crate::order::OrderProvider;
use crate::result::{ComprobarError, ComprobarResult};
use crate::summary::Summary;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Receives the events of a run.
pub trait Reporter {
    /// The run begins; `order` identifies how behaviors will be ordered
    fn start(&mut self, order: &OrderProvider);

    /// A behavior begins
    fn start_behavior(&mut self, description: &str);

    /// The current behavior ends
    fn end_behavior(&mut self);

    /// An example begins
    fn start_example(&mut self, description: Option<&str>);

    /// The current example ends
    fn end_example(&mut self);

    /// A top-level claim held
    fn record_valid(&mut self, result: &ClaimResult);

    /// A top-level claim failed
    fn record_invalid(&mut self, result: &ClaimResult);

    /// A top-level claim did not run
    fn record_skipped(&mut self, result: &ClaimResult);

    /// A context failed to initialize or tear down
    fn bail_out(&mut self, error: &ComprobarError);

    /// The run ends
    fn end(&mut self, summary: &Summary);
}

/// Routes results to a reporter while counting them.
pub(crate) struct Recorder<'r> {
    reporter: &'r mut dyn Reporter,
    summary: Summary,
}

impl<'r> Recorder<'r> {
    pub(crate) fn new(reporter: &'r mut dyn Reporter) -> Self {
        Self {
            reporter,
            summary: Summary::default(),
        }
    }

    pub(crate) fn record(&mut self, result: &ClaimResult) {
        self.summary.add_result(result);
        match result.kind {
            ResultKind::Valid => self.reporter.record_valid(result),
            ResultKind::Invalid { .. } => self.reporter.record_invalid(result),
            ResultKind::Skipped => self.reporter.record_skipped(result),
        }
    }

    pub(crate) const fn summary(&self) -> Summary {
        self.summary
    }
}

/// Reporter that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Silent;

impl Reporter for Silent {
    fn start(&mut self, _order: &OrderProvider) {}
    fn start_behavior(&mut self, _description: &str) {}
    fn end_behavior(&mut self) {}
    fn start_example(&mut self, _description: Option<&str>) {}
    fn end_example(&mut self) {}
    fn record_valid(&mut self, _result: &ClaimResult) {}
    fn record_invalid(&mut self, _result: &ClaimResult) {}
    fn record_skipped(&mut self, _result: &ClaimResult) {}
    fn bail_out(&mut self, _error: &ComprobarError) {}
    fn end(&mut self, _summary: &Summary) {}
}

// ============================================================================
// Recording
// ============================================================================

/// One event seen by a [`RecordingReporter`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReportEvent {
    /// Run started
    Start {
        /// Order description
        order: String,
    },
    /// Behavior started
    StartBehavior {
        /// Behavior description
        description: String,
    },
    /// Behavior ended
    EndBehavior,
    /// Example started
    StartExample {
        /// Example description
        description: Option<String>,
    },
    /// Example ended
    EndExample,
    /// Top-level claim held
    Valid {
        /// The result
        result: ClaimResult,
    },
    /// Top-level claim failed
    Invalid {
        /// The result
        result: ClaimResult,
    },
    /// Top-level claim skipped
    Skipped {
        /// The result
        result: ClaimResult,
    },
    /// Context failure
    BailOut {
        /// Rendered error
        reason: String,
    },
    /// Run ended
    End {
        /// Final counts
        summary: Summary,
    },
}

/// Reporter that keeps every event in memory.
#[derive(Debug, Clone, Default)]
pub struct RecordingReporter {
    events: Vec<ReportEvent>,
}

impl RecordingReporter {
    /// Create an empty recording
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events in arrival order
    #[must_use]
    pub fn events(&self) -> &[ReportEvent] {
        &self.events
    }

    /// Top-level claim results in arrival order
    pub fn results(&self) -> impl Iterator<Item = &ClaimResult> {
        self.events.iter().filter_map(|event| match event {
            ReportEvent::Valid { result }
            | ReportEvent::Invalid { result }
            | ReportEvent::Skipped { result } => Some(result),
            _ => None,
        })
    }

    /// Descriptions of the behaviors reported, in order
    #[must_use]
    pub fn behaviors(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ReportEvent::StartBehavior { description } => Some(description.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Rendered bail-out reasons, in order
    #[must_use]
    pub fn bail_outs(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ReportEvent::BailOut { reason } => Some(reason.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Summary passed to `end`, once the run has finished
    #[must_use]
    pub fn summary(&self) -> Option<&Summary> {
        self.events.iter().rev().find_map(|event| match event {
            ReportEvent::End { summary } => Some(summary),
            _ => None,
        })
    }

    /// Export the recording as JSON
    pub fn to_json(&self) -> ComprobarResult<String> {
        Ok(serde_json::to_string_pretty(&self.events)?)
    }

    /// Write the JSON export to a file
    pub fn save_json(&self, path: &Path) -> ComprobarResult<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

impl Reporter for RecordingReporter {
    fn start(&mut self, order: &OrderProvider) {
        self.events.push(ReportEvent::Start {
            order: order.description(),
        });
    }

    fn start_behavior(&mut self, description: &str) {
        self.events.push(ReportEvent::StartBehavior {
            description: description.to_string(),
        });
    }

    fn end_behavior(&mut self) {
        self.events.push(ReportEvent::EndBehavior);
    }

    fn start_example(&mut self, description: Option<&str>) {
        self.events.push(ReportEvent::StartExample {
            description: description.map(str::to_string),
        });
    }

    fn end_example(&mut self) {
        self.events.push(ReportEvent::EndExample);
    }

    fn record_valid(&mut self, result: &ClaimResult) {
        self.events.push(ReportEvent::Valid {
            result: result.clone(),
        });
    }

    fn record_invalid(&mut self, result: &ClaimResult) {
        self.events.push(ReportEvent::Invalid {
            result: result.clone(),
        });
    }

    fn record_skipped(&mut self, result: &ClaimResult) {
        self.events.push(ReportEvent::Skipped {
            result: result.clone(),
        });
    }

    fn bail_out(&mut self, error: &ComprobarError) {
        self.events.push(ReportEvent::BailOut {
            reason: error.to_string(),
        });
    }

    fn end(&mut self, summary: &Summary) {
        self.events.push(ReportEvent::End { summary: *summary });
    }
}

// ============================================================================
// Tracing
// ============================================================================

/// Reporter that emits every event through `tracing`.
///
/// Valid and skipped claims log at `info`, failures and bail-outs at `warn`.
#[derive(Debug, Clone, Default)]
pub struct TracingReporter {
    behavior: Option<String>,
    example: Option<String>,
}

impl TracingReporter {
    /// Create a tracing reporter
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn behavior(&self) -> &str {
        self.behavior.as_deref().unwrap_or("")
    }

    fn example(&self) -> &str {
        self.example.as_deref().unwrap_or("")
    }
}

impl Reporter for TracingReporter {
    fn start(&mut self, order: &OrderProvider) {
        tracing::info!(order = %order.description(), "validating behaviors");
    }

    fn start_behavior(&mut self, description: &str) {
        tracing::info!(behavior = description, "behavior");
        self.behavior = Some(description.to_string());
    }

    fn end_behavior(&mut self) {
        self.behavior = None;
    }

    fn start_example(&mut self, description: Option<&str>) {
        tracing::debug!(behavior = self.behavior(), example = ?description, "example");
        self.example = description.map(str::to_string);
    }

    fn end_example(&mut self) {
        self.example = None;
    }

    fn record_valid(&mut self, result: &ClaimResult) {
        tracing::info!(
            behavior = self.behavior(),
            example = self.example(),
            claim = %result.description,
            duration_ms = result.duration_ms.unwrap_or(0.0),
            "valid"
        );
    }

    fn record_invalid(&mut self, result: &ClaimResult) {
        let mut failures = Vec::new();
        result.for_each_leaf(&mut |leaf| {
            if let Some(error) = leaf.error() {
                failures.push(format!("{}: {error}", leaf.description));
            }
        });
        tracing::warn!(
            behavior = self.behavior(),
            example = self.example(),
            claim = %result.description,
            failures = ?failures,
            "invalid"
        );
    }

    fn record_skipped(&mut self, result: &ClaimResult) {
        tracing::info!(
            behavior = self.behavior(),
            example = self.example(),
            claim = %result.description,
            "skipped"
        );
    }

    fn bail_out(&mut self, error: &ComprobarError) {
        tracing::warn!(
            behavior = self.behavior(),
            example = self.example(),
            %error,
            "bail out"
        );
    }

    fn end(&mut self, summary: &Summary) {
        if summary.is_success() {
            tracing::info!(%summary, "run complete");
        } else {
            tracing::warn!(%summary, "run complete with failures");
        }
    }
}
