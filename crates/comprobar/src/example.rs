//! Examples
//!
//! An [`Example`] pairs a [`Context`] with one or more [`Script`]s. Each run
//! initializes a fresh context graph, validates the scripts against the
//! root value, and tears the graph down again whatever happened in between.
//!
//! The context type is erased behind a boxed body so behaviors can hold
//! examples over different context types.

use crate::context::{Context, ContextSession};
use crate::reporter::Recorder;
use crate::result::ComprobarError;
use crate::script::{self, Script};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How an example or behavior takes part in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Validated unless something else skips it
    #[default]
    Normal,
    /// Selected; when anything is picked, only picked examples run
    Picked,
    /// Never validated; reported as skipped
    Skipped,
}

impl RunMode {
    /// Effective mode of an example declared inside a behavior with mode
    /// `behavior`. Skipped wins over picked, picked wins over normal.
    #[must_use]
    pub const fn within(self, behavior: Self) -> Self {
        match (self, behavior) {
            (Self::Skipped, _) | (_, Self::Skipped) => Self::Skipped,
            (Self::Picked, _) | (_, Self::Picked) => Self::Picked,
            (Self::Normal, Self::Normal) => Self::Normal,
        }
    }
}

/// Type-erased example body.
#[async_trait(?Send)]
pub(crate) trait ExampleBody {
    /// Initialize the context, run the scripts, tear the context down.
    ///
    /// Returns every context failure met along the way. When the context
    /// cannot be initialized the claims are reported as skipped.
    async fn validate(&self, recorder: &mut Recorder<'_>) -> Vec<ComprobarError>;

    /// Report every claim as skipped; the context is never touched
    fn skip(&self, recorder: &mut Recorder<'_>);
}

struct Scripted<C> {
    context: Context<C>,
    scripts: Vec<Script<C>>,
}

#[async_trait(?Send)]
impl<C: 'static> ExampleBody for Scripted<C> {
    async fn validate(&self, recorder: &mut Recorder<'_>) -> Vec<ComprobarError> {
        let mut session = ContextSession::new();
        let mut failures = Vec::new();

        match self.context.initialize(&mut session).await {
            Ok(mut value) => {
                tracing::trace!(
                    context = self.context.label(),
                    upstream = session.len(),
                    "context ready"
                );
                script::execute(&self.scripts, &mut value, recorder).await;
                if let Err(error) = self.context.teardown_value(value).await {
                    failures.push(error);
                }
            }
            Err(error) => {
                script::skip_all(&self.scripts, recorder);
                failures.push(error);
            }
        }

        failures.extend(session.teardown().await);
        failures
    }

    fn skip(&self, recorder: &mut Recorder<'_>) {
        script::skip_all(&self.scripts, recorder);
    }
}

/// A context plus the scripts validated against it.
pub struct Example {
    description: Option<String>,
    mode: RunMode,
    body: Box<dyn ExampleBody>,
}

impl Example {
    /// Start building an example over `context`
    #[must_use]
    pub fn new<C: 'static>(context: Context<C>) -> ExampleBuilder<C> {
        ExampleBuilder {
            description: None,
            context,
            scripts: Vec::new(),
        }
    }

    /// Select this example; when anything is picked only picked examples run
    #[must_use]
    pub fn picked(mut self) -> Self {
        self.mode = RunMode::Picked;
        self
    }

    /// Skip this example
    #[must_use]
    pub fn skipped(mut self) -> Self {
        self.mode = RunMode::Skipped;
        self
    }

    /// Example description
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Declared run mode
    #[must_use]
    pub const fn mode(&self) -> RunMode {
        self.mode
    }

    pub(crate) async fn validate(&self, recorder: &mut Recorder<'_>) -> Vec<ComprobarError> {
        self.body.validate(recorder).await
    }

    pub(crate) fn skip(&self, recorder: &mut Recorder<'_>) {
        self.body.skip(recorder);
    }
}

impl fmt::Debug for Example {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Example")
            .field("description", &self.description)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Example`].
///
/// ```ignore
/// let example = example(cart_context)
///     .description("adding a book")
///     .script(Script::new().perform(vec![...]).observe(vec![...]))
///     .and_then(Script::new().perform(vec![...]))
///     .build();
/// ```
pub struct ExampleBuilder<C> {
    description: Option<String>,
    context: Context<C>,
    scripts: Vec<Script<C>>,
}

impl<C: 'static> ExampleBuilder<C> {
    /// Describe the example
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add the first script
    #[must_use]
    pub fn script(mut self, script: Script<C>) -> Self {
        self.scripts.push(script);
        self
    }

    /// Add a script that runs after the previous ones, against the same value
    #[must_use]
    pub fn and_then(self, script: Script<C>) -> Self {
        self.script(script)
    }

    /// Finish the example
    #[must_use]
    pub fn build(self) -> Example {
        Example {
            description: self.description,
            mode: RunMode::Normal,
            body: Box::new(Scripted {
                context: self.context,
                scripts: self.scripts,
            }),
        }
    }

    /// Finish the example as picked
    #[must_use]
    pub fn picked(self) -> Example {
        self.build().picked()
    }

    /// Finish the example as skipped
    #[must_use]
    pub fn skipped(self) -> Example {
        self.build().skipped()
    }
}

impl<C: 'static> From<ExampleBuilder<C>> for Example {
    fn from(builder: ExampleBuilder<C>) -> Self {
        builder.build()
    }
}

impl<C> fmt::Debug for ExampleBuilder<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExampleBuilder")
            .field("description", &self.description)
            .field("context", &self.context)
            .field("scripts", &self.scripts.len())
            .finish()
    }
}

/// Start building an example over `context`
#[must_use]
pub fn example<C: 'static>(context: Context<C>) -> ExampleBuilder<C> {
    Example::new(context)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::claim::{effect, step, ClaimError};
    use crate::reporter::RecordingReporter;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    fn counter(log: &Log) -> Context<u32> {
        let init_log = Rc::clone(log);
        let teardown_log = Rc::clone(log);
        Context::sync(move || {
            init_log.borrow_mut().push("init".to_string());
            Ok(0)
        })
        .named("counter")
        .with_sync_teardown(move |value| {
            teardown_log.borrow_mut().push(format!("teardown {value}"));
            Ok(())
        })
    }

    fn increment() -> Script<u32> {
        Script::new().perform(vec![step("increment", |n: &mut u32| {
            *n += 1;
            Ok(())
        })])
    }

    mod mode_tests {
        use super::*;

        #[test]
        fn test_within_precedence() {
            use RunMode::{Normal, Picked, Skipped};
            assert_eq!(Normal.within(Normal), Normal);
            assert_eq!(Normal.within(Picked), Picked);
            assert_eq!(Picked.within(Normal), Picked);
            assert_eq!(Picked.within(Skipped), Skipped);
            assert_eq!(Skipped.within(Picked), Skipped);
        }

        #[test]
        fn test_modifiers() {
            let log = Log::default();
            let picked = example(counter(&log)).script(increment()).picked();
            assert_eq!(picked.mode(), RunMode::Picked);
            let skipped = example(counter(&log)).description("x").skipped();
            assert_eq!(skipped.mode(), RunMode::Skipped);
            assert_eq!(skipped.description(), Some("x"));
        }
    }

    mod lifecycle_tests {
        use super::*;

        #[tokio::test]
        async fn test_scripts_share_one_value() {
            let log = Log::default();
            let example = example(counter(&log))
                .script(increment())
                .and_then(increment())
                .and_then(Script::new().observe(vec![effect("counted twice", |n: &mut u32| {
                    if *n == 2 {
                        Ok(())
                    } else {
                        Err(ClaimError::mismatch("equals", 2, *n))
                    }
                })]))
                .build();

            let mut reporter = RecordingReporter::new();
            let mut recorder = Recorder::new(&mut reporter);
            let failures = example.validate(&mut recorder).await;
            assert!(failures.is_empty());
            assert_eq!(recorder.summary().valid, 3);
            assert_eq!(*log.borrow(), vec!["init", "teardown 2"]);
        }

        #[tokio::test]
        async fn test_fresh_context_per_run() {
            let log = Log::default();
            let example = example(counter(&log)).script(increment()).build();
            let mut reporter = RecordingReporter::new();
            let mut recorder = Recorder::new(&mut reporter);
            example.validate(&mut recorder).await;
            example.validate(&mut recorder).await;
            assert_eq!(
                *log.borrow(),
                vec!["init", "teardown 1", "init", "teardown 1"]
            );
        }

        #[tokio::test]
        async fn test_init_failure_skips_claims() {
            let broken: Context<u32> =
                Context::sync(|| Err(ClaimError::new("no counter"))).named("broken");
            let example = example(broken).script(increment()).build();
            let mut reporter = RecordingReporter::new();
            let mut recorder = Recorder::new(&mut reporter);
            let failures = example.validate(&mut recorder).await;
            assert_eq!(failures.len(), 1);
            assert!(failures[0].is_context_failure());
            assert_eq!(recorder.summary().skipped, 1);
            assert_eq!(recorder.summary().claims(), 1);
        }

        #[tokio::test]
        async fn test_teardown_runs_after_invalid_claim() {
            let log = Log::default();
            let example = example(counter(&log))
                .script(Script::new().perform(vec![step("fails", |_: &mut u32| {
                    Err(ClaimError::new("nope"))
                })]))
                .build();
            let mut reporter = RecordingReporter::new();
            let mut recorder = Recorder::new(&mut reporter);
            let failures = example.validate(&mut recorder).await;
            assert!(failures.is_empty());
            assert_eq!(recorder.summary().invalid, 1);
            assert_eq!(*log.borrow(), vec!["init", "teardown 0"]);
        }

        #[test]
        fn test_skip_never_initializes() {
            let log = Log::default();
            let example = example(counter(&log)).script(increment()).build();
            let mut reporter = RecordingReporter::new();
            let mut recorder = Recorder::new(&mut reporter);
            example.skip(&mut recorder);
            assert_eq!(recorder.summary().skipped, 1);
            assert!(log.borrow().is_empty());
        }
    }
}
