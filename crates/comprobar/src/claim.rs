//! Claims and Claim Results
//!
//! A [`Claim`] is the smallest unit of verification: a precondition, an
//! action, or an observation. Simple claims wrap a user callback; composite
//! claims group child claims and subsume their results.
//!
//! # Short circuit
//!
//! Composite claims validate children strictly in order. Once a child is
//! invalid, every remaining child is skipped (not validated), and the
//! composite itself is invalid. Skipped children still appear in the result
//! tree so a report lists what would have run.
//!
//! ```ignore
//! let sign_in = procedure("sign in", vec![
//!     step("open the form", |page: &mut Page| page.open("/login")),
//!     step("submit", |page: &mut Page| page.submit()),
//! ]);
//! ```

use crate::timer::TimerFactory;
use futures::future::{ready, LocalBoxFuture};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, Location};

/// Future returned by a claim action
pub type ClaimFuture<'a> = LocalBoxFuture<'a, Result<(), ClaimError>>;

type Action<C> = Box<dyn for<'a> Fn(&'a mut C) -> ClaimFuture<'a>>;

fn boxed_action<C, F>(action: F) -> Action<C>
where
    F: for<'a> Fn(&'a mut C) -> ClaimFuture<'a> + 'static,
{
    Box::new(action)
}

// ============================================================================
// Failure payload
// ============================================================================

/// Failure payload carried by an invalid claim.
///
/// Every field is optional; assertion mechanisms fill in what they know.
/// Any `std::error::Error` converts into a `ClaimError`, so `?` works inside
/// claim bodies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimError {
    /// Human readable failure message
    pub message: Option<String>,
    /// Comparison operator, e.g. "equals"
    pub operator: Option<String>,
    /// Expected value, rendered as text
    pub expected: Option<String>,
    /// Actual value, rendered as text
    pub actual: Option<String>,
    /// Stack or backtrace text
    pub stack: Option<String>,
    /// Source location (<file:line>)
    pub location: Option<String>,
}

impl ClaimError {
    /// Create a failure with a message, recording the caller's location
    #[must_use]
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            location: Some(caller_location()),
            ..Self::default()
        }
    }

    /// Create a comparison failure
    #[must_use]
    #[track_caller]
    pub fn mismatch(
        operator: impl Into<String>,
        expected: impl fmt::Debug,
        actual: impl fmt::Debug,
    ) -> Self {
        Self {
            operator: Some(operator.into()),
            expected: Some(format!("{expected:?}")),
            actual: Some(format!("{actual:?}")),
            location: Some(caller_location()),
            ..Self::default()
        }
    }

    /// Set the message
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Set the operator
    #[must_use]
    pub fn with_operator(mut self, operator: impl Into<String>) -> Self {
        self.operator = Some(operator.into());
        self
    }

    /// Set the expected value
    #[must_use]
    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    /// Set the actual value
    #[must_use]
    pub fn with_actual(mut self, actual: impl Into<String>) -> Self {
        self.actual = Some(actual.into());
        self
    }

    /// Set the stack text
    #[must_use]
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Build a payload from a caught panic
    #[must_use]
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "claim panicked".to_string());
        Self {
            message: Some(message),
            ..Self::default()
        }
    }
}

#[track_caller]
fn caller_location() -> String {
    let location = Location::caller();
    format!("{}:{}", location.file(), location.line())
}

impl<E: std::error::Error> From<E> for ClaimError {
    #[track_caller]
    fn from(error: E) -> Self {
        let mut stack = String::new();
        let mut source = error.source();
        while let Some(cause) = source {
            if !stack.is_empty() {
                stack.push('\n');
            }
            stack.push_str("caused by: ");
            stack.push_str(&cause.to_string());
            source = cause.source();
        }
        Self {
            message: Some(error.to_string()),
            stack: (!stack.is_empty()).then_some(stack),
            location: Some(caller_location()),
            ..Self::default()
        }
    }
}

impl fmt::Display for ClaimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.message, &self.expected, &self.actual) {
            (Some(message), _, _) => write!(f, "{message}"),
            (None, Some(expected), Some(actual)) => write!(
                f,
                "expected {expected}, got {actual} ({})",
                self.operator.as_deref().unwrap_or("equals")
            ),
            _ => write!(f, "claim failed"),
        }
    }
}

// ============================================================================
// Results
// ============================================================================

/// Outcome of a claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResultKind {
    /// The claim held
    Valid,
    /// The claim failed; composites carry no payload of their own
    Invalid {
        /// Failure payload
        error: Option<ClaimError>,
    },
    /// The claim did not run
    Skipped,
}

/// Result of validating or skipping a claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimResult {
    /// Claim description
    pub description: String,
    /// Outcome
    pub kind: ResultKind,
    /// Elapsed time in milliseconds. Skipped leaves report `0.0`;
    /// composite groupings carry `None`.
    pub duration_ms: Option<f64>,
    /// Whether the claim was a composite grouping
    pub composite: bool,
    /// Child results, in declaration order
    pub subsumed: Vec<ClaimResult>,
}

impl ClaimResult {
    /// Create a valid leaf result
    #[must_use]
    pub fn valid(description: impl Into<String>, duration_ms: f64) -> Self {
        Self::leaf(description, ResultKind::Valid, Some(duration_ms))
    }

    /// Create an invalid leaf result
    #[must_use]
    pub fn invalid(description: impl Into<String>, duration_ms: f64, error: ClaimError) -> Self {
        Self::leaf(
            description,
            ResultKind::Invalid { error: Some(error) },
            Some(duration_ms),
        )
    }

    /// Create a skipped leaf result
    #[must_use]
    pub fn skipped(description: impl Into<String>) -> Self {
        Self::leaf(description, ResultKind::Skipped, Some(0.0))
    }

    fn leaf(description: impl Into<String>, kind: ResultKind, duration_ms: Option<f64>) -> Self {
        Self {
            description: description.into(),
            kind,
            duration_ms,
            composite: false,
            subsumed: Vec::new(),
        }
    }

    /// Fold child results into a composite result.
    ///
    /// The composite is invalid iff any child is invalid.
    #[must_use]
    pub fn subsume(description: impl Into<String>, subsumed: Vec<ClaimResult>) -> Self {
        let kind = if subsumed.iter().any(ClaimResult::is_invalid) {
            ResultKind::Invalid { error: None }
        } else {
            ResultKind::Valid
        };
        Self {
            description: description.into(),
            kind,
            duration_ms: None,
            composite: true,
            subsumed,
        }
    }

    fn skipped_group(description: impl Into<String>, subsumed: Vec<ClaimResult>) -> Self {
        Self {
            description: description.into(),
            kind: ResultKind::Skipped,
            duration_ms: None,
            composite: true,
            subsumed,
        }
    }

    /// Whether the claim held
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self.kind, ResultKind::Valid)
    }

    /// Whether the claim failed
    #[must_use]
    pub const fn is_invalid(&self) -> bool {
        matches!(self.kind, ResultKind::Invalid { .. })
    }

    /// Whether the claim was skipped
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self.kind, ResultKind::Skipped)
    }

    /// Failure payload, if this result carries one
    #[must_use]
    pub fn error(&self) -> Option<&ClaimError> {
        match &self.kind {
            ResultKind::Invalid { error } => error.as_ref(),
            ResultKind::Valid | ResultKind::Skipped => None,
        }
    }

    /// Visit every leaf result depth-first; composite containers are not visited
    pub fn for_each_leaf(&self, visit: &mut impl FnMut(&ClaimResult)) {
        if self.composite {
            for child in &self.subsumed {
                child.for_each_leaf(visit);
            }
        } else {
            visit(self);
        }
    }
}

// ============================================================================
// Execution mode
// ============================================================================

/// Whether the next claim should be validated or skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    Validate,
    Skip,
}

impl Mode {
    /// Mode for the next sibling once `result` is known
    pub(crate) const fn after(self, result: &ClaimResult) -> Self {
        match self {
            Self::Skip => Self::Skip,
            Self::Validate if result.is_invalid() => Self::Skip,
            Self::Validate => Self::Validate,
        }
    }
}

// ============================================================================
// Claims
// ============================================================================

/// A verification unit evaluated against a context of type `C`.
pub enum Claim<C> {
    /// Wraps a single user action
    Simple(Fact<C>),
    /// Groups child claims
    Composite(Composite<C>),
}

/// A claim that wraps one user action.
pub struct Fact<C> {
    description: String,
    action: Action<C>,
    timers: TimerFactory,
}

/// A claim that groups child claims.
pub struct Composite<C> {
    description: String,
    claims: Vec<Claim<C>>,
}

impl<C> Claim<C> {
    /// Create a claim from an asynchronous action.
    ///
    /// ```ignore
    /// Claim::new("the server responds", |server: &mut Server| {
    ///     Box::pin(async move { server.ping().await.map_err(ClaimError::from) })
    /// })
    /// ```
    pub fn new<F>(description: impl Into<String>, action: F) -> Self
    where
        F: for<'a> Fn(&'a mut C) -> ClaimFuture<'a> + 'static,
    {
        Self::timed(description, TimerFactory::default(), action)
    }

    /// Create a claim from an asynchronous action, measured with `timers`
    pub fn timed<F>(description: impl Into<String>, timers: TimerFactory, action: F) -> Self
    where
        F: for<'a> Fn(&'a mut C) -> ClaimFuture<'a> + 'static,
    {
        Self::Simple(Fact {
            description: description.into(),
            action: boxed_action(action),
            timers,
        })
    }

    /// Create a claim from a synchronous action
    pub fn sync<F>(description: impl Into<String>, action: F) -> Self
    where
        F: Fn(&mut C) -> Result<(), ClaimError> + 'static,
    {
        Self::sync_timed(description, TimerFactory::default(), action)
    }

    /// Create a claim from a synchronous action, measured with `timers`
    pub fn sync_timed<F>(description: impl Into<String>, timers: TimerFactory, action: F) -> Self
    where
        F: Fn(&mut C) -> Result<(), ClaimError> + 'static,
    {
        Self::Simple(Fact {
            description: description.into(),
            action: boxed_action(move |context| Box::pin(ready(action(context)))),
            timers,
        })
    }

    /// Create a composite claim
    pub fn group(description: impl Into<String>, claims: Vec<Claim<C>>) -> Self {
        Self::Composite(Composite {
            description: description.into(),
            claims,
        })
    }

    /// Measure every simple claim in this tree with `timers`
    #[must_use]
    pub fn with_timer(self, timers: TimerFactory) -> Self {
        match self {
            Self::Simple(fact) => Self::Simple(Fact { timers, ..fact }),
            Self::Composite(group) => Self::Composite(Composite {
                description: group.description,
                claims: group
                    .claims
                    .into_iter()
                    .map(|claim| claim.with_timer(timers.clone()))
                    .collect(),
            }),
        }
    }

    /// Claim description
    #[must_use]
    pub fn description(&self) -> &str {
        match self {
            Self::Simple(fact) => &fact.description,
            Self::Composite(group) => &group.description,
        }
    }

    /// Validate the claim. Never fails: errors and panics become invalid results.
    pub fn validate<'a>(&'a self, context: &'a mut C) -> LocalBoxFuture<'a, ClaimResult> {
        match self {
            Self::Simple(fact) => fact.validate(context),
            Self::Composite(group) => group.validate(context),
        }
    }

    /// Convert to a skipped result without running anything
    #[must_use]
    pub fn skip(&self) -> ClaimResult {
        match self {
            Self::Simple(fact) => ClaimResult::skipped(&fact.description),
            Self::Composite(group) => ClaimResult::skipped_group(
                &group.description,
                group.claims.iter().map(Claim::skip).collect(),
            ),
        }
    }
}

impl<C> Fact<C> {
    fn validate<'a>(&'a self, context: &'a mut C) -> LocalBoxFuture<'a, ClaimResult> {
        Box::pin(async move {
            let mut timer = self.timers.timer();
            timer.start();
            let outcome = AssertUnwindSafe(async { (self.action)(context).await })
                .catch_unwind()
                .await;
            timer.stop();
            let elapsed = timer.duration_in_millis();

            match outcome {
                Ok(Ok(())) => ClaimResult::valid(&self.description, elapsed),
                Ok(Err(error)) => ClaimResult::invalid(&self.description, elapsed, error),
                Err(payload) => ClaimResult::invalid(
                    &self.description,
                    elapsed,
                    ClaimError::from_panic(payload.as_ref()),
                ),
            }
        })
    }
}

impl<C> Composite<C> {
    fn validate<'a>(&'a self, context: &'a mut C) -> LocalBoxFuture<'a, ClaimResult> {
        Box::pin(async move {
            let mut mode = Mode::Validate;
            let mut subsumed = Vec::with_capacity(self.claims.len());
            for claim in &self.claims {
                let result = match mode {
                    Mode::Validate => claim.validate(context).await,
                    Mode::Skip => claim.skip(),
                };
                mode = mode.after(&result);
                subsumed.push(result);
            }
            ClaimResult::subsume(&self.description, subsumed)
        })
    }
}

impl<C> fmt::Debug for Claim<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple(fact) => fact.fmt(f),
            Self::Composite(group) => group.fmt(f),
        }
    }
}

impl<C> fmt::Debug for Fact<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fact")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl<C> fmt::Debug for Composite<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Composite")
            .field("description", &self.description)
            .field("claims", &self.claims)
            .finish()
    }
}

// ============================================================================
// Vocabulary
// ============================================================================

/// A precondition that should hold before the example acts
pub fn fact<C, F>(description: impl Into<String>, check: F) -> Claim<C>
where
    F: Fn(&mut C) -> Result<(), ClaimError> + 'static,
{
    Claim::sync(description, check)
}

/// An action performed by the example
pub fn step<C, F>(description: impl Into<String>, action: F) -> Claim<C>
where
    F: Fn(&mut C) -> Result<(), ClaimError> + 'static,
{
    Claim::sync(description, action)
}

/// An observable consequence verified after acting
pub fn effect<C, F>(description: impl Into<String>, check: F) -> Claim<C>
where
    F: Fn(&mut C) -> Result<(), ClaimError> + 'static,
{
    Claim::sync(description, check)
}

/// A named group of facts
pub fn situation<C>(description: impl Into<String>, facts: Vec<Claim<C>>) -> Claim<C> {
    Claim::group(description, facts)
}

/// A named sequence of steps
pub fn procedure<C>(description: impl Into<String>, steps: Vec<Claim<C>>) -> Claim<C> {
    Claim::group(description, steps)
}

/// A named group of effects
pub fn outcome<C>(description: impl Into<String>, effects: Vec<Claim<C>>) -> Claim<C> {
    Claim::group(description, effects)
}
