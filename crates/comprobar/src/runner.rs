//! Runner - Behavior Orchestration
//!
//! [`validate`] walks behaviors and their examples in the configured order
//! and decides, per example, whether to validate it, skip it visibly, or skip
//! it silently. That decision belongs to a [`RunnerKind`]:
//!
//! ```text
//! ┌──────────────┐  any example picked   ┌──────────────┐
//! │   Standard   │ ────────────────────▶ │  PickedOnly  │
//! └──────────────┘                       └──────────────┘
//!        │ behavior marked skipped
//!        ▼
//! ┌──────────────┐
//! │     Skip     │  examples reported as skipped
//! └──────────────┘
//!
//! FailFast(inner) ── example invalid or bailed out ──▶ Silent
//! ```
//!
//! Runner kinds are values; a failure produces the next runner instead of
//! mutating shared state.
//!
//! Behavior headers are emitted lazily: a behavior whose examples are all
//! silent never reaches the reporter. Under the standard runner every
//! behavior is announced, even one with no examples.

use crate::behavior::Behavior;
use crate::config::RunOptions;
use crate::example::{Example, RunMode};
use crate::order::OrderProvider;
use crate::reporter::{Recorder, Reporter, Silent};
use crate::result::ComprobarResult;
use crate::summary::Summary;

/// Example scheduling policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerKind {
    /// Validate everything not marked skipped
    Standard,
    /// Validate picked examples only; everything else is silent
    PickedOnly,
    /// Report every example as skipped
    Skip,
    /// Skip every example without reporting it
    Silent,
    /// Run `inner` until the first failing example, then go silent
    FailFast(Box<RunnerKind>),
}

/// What happens to one example
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExamplePlan {
    /// Initialize the context and validate the claims
    Validate,
    /// Report the claims as skipped
    Skip,
    /// Count the claims as skipped without reporting them
    Silent,
}

impl RunnerKind {
    /// Choose the runner for a run.
    ///
    /// Picked-only applies when requested or when anything is picked.
    #[must_use]
    pub fn select(options: &RunOptions, behaviors: &[Behavior]) -> Self {
        let picked_only = options.run_picked_only || behaviors.iter().any(Behavior::has_picked);
        let base = if picked_only {
            Self::PickedOnly
        } else {
            Self::Standard
        };
        if options.fail_fast {
            Self::FailFast(Box::new(base))
        } else {
            base
        }
    }

    /// Runner for the examples of a behavior declared with `mode`
    #[must_use]
    pub fn for_behavior(&self, mode: RunMode) -> Self {
        match (self, mode) {
            (Self::Standard, RunMode::Skipped) => Self::Skip,
            (Self::FailFast(inner), _) => Self::FailFast(Box::new(inner.for_behavior(mode))),
            _ => self.clone(),
        }
    }

    /// Plan for an example whose effective mode is `mode`
    #[must_use]
    pub fn plan(&self, mode: RunMode) -> ExamplePlan {
        match self {
            Self::Standard => match mode {
                RunMode::Skipped => ExamplePlan::Skip,
                RunMode::Normal | RunMode::Picked => ExamplePlan::Validate,
            },
            Self::PickedOnly => match mode {
                RunMode::Picked => ExamplePlan::Validate,
                RunMode::Normal | RunMode::Skipped => ExamplePlan::Silent,
            },
            Self::Skip => ExamplePlan::Skip,
            Self::Silent => ExamplePlan::Silent,
            Self::FailFast(inner) => inner.plan(mode),
        }
    }

    /// Runner for the next example, given whether this one failed
    #[must_use]
    pub fn after_example(self, failed: bool) -> Self {
        match self {
            Self::FailFast(_) if failed => Self::Silent,
            other => other,
        }
    }

    /// Whether behaviors are announced before any example is reported
    #[must_use]
    pub fn announces_behaviors(&self) -> bool {
        match self {
            Self::Standard | Self::Skip => true,
            Self::PickedOnly | Self::Silent => false,
            Self::FailFast(inner) => inner.announces_behaviors(),
        }
    }
}

/// Validate `behaviors`, reporting every event to `reporter`.
///
/// Invalid claims and context failures are recorded in the returned summary.
/// `Err` is returned only for engine errors that are not context failures.
pub async fn validate(
    behaviors: &[Behavior],
    reporter: &mut dyn Reporter,
    options: &RunOptions,
) -> ComprobarResult<Summary> {
    let runner = RunnerKind::select(options, behaviors);
    tracing::debug!(
        order = %options.order.description(),
        ?runner,
        behaviors = behaviors.len(),
        "starting run"
    );

    let mut run = Run {
        reporter,
        order: options.order,
        runner,
        summary: Summary::default(),
    };
    run.reporter.start(&run.order);
    for behavior in options.order.order(behaviors) {
        run.behavior(behavior).await?;
    }
    run.reporter.end(&run.summary);

    tracing::debug!(summary = %run.summary, "run finished");
    Ok(run.summary)
}

struct Run<'r> {
    reporter: &'r mut dyn Reporter,
    order: OrderProvider,
    runner: RunnerKind,
    summary: Summary,
}

/// Lazily emitted behavior header
struct Header<'b> {
    description: &'b str,
    open: bool,
}

impl<'b> Header<'b> {
    const fn new(description: &'b str) -> Self {
        Self {
            description,
            open: false,
        }
    }

    fn open(&mut self, reporter: &mut dyn Reporter) {
        if !self.open {
            reporter.start_behavior(self.description);
            self.open = true;
        }
    }

    fn close(self, reporter: &mut dyn Reporter) {
        if self.open {
            reporter.end_behavior();
        }
    }
}

#[derive(Debug, Default)]
struct ExampleOutcome {
    invalid: bool,
    bailed_out: bool,
}

impl Run<'_> {
    async fn behavior(&mut self, behavior: &Behavior) -> ComprobarResult<()> {
        self.summary.behaviors += 1;
        tracing::debug!(behavior = behavior.description(), "behavior");

        let mut header = Header::new(behavior.description());
        if self.runner.announces_behaviors() {
            header.open(self.reporter);
        }

        let mut abandoned = false;
        for example in self.order.order(behavior.examples()) {
            let mode = example.mode().within(behavior.mode());
            let mut plan = self.runner.for_behavior(behavior.mode()).plan(mode);
            if abandoned && plan == ExamplePlan::Validate {
                plan = ExamplePlan::Skip;
            }

            let outcome = self.example(example, plan, &mut header).await?;
            abandoned |= outcome.bailed_out;

            let failed = outcome.invalid || outcome.bailed_out;
            let runner = std::mem::replace(&mut self.runner, RunnerKind::Silent);
            self.runner = runner.after_example(failed);
            if failed && self.runner == RunnerKind::Silent {
                tracing::info!("fail fast: remaining examples will not run");
            }
        }

        header.close(self.reporter);
        Ok(())
    }

    async fn example(
        &mut self,
        example: &Example,
        plan: ExamplePlan,
        header: &mut Header<'_>,
    ) -> ComprobarResult<ExampleOutcome> {
        self.summary.examples += 1;
        tracing::trace!(example = ?example.description(), ?plan, "example");

        match plan {
            ExamplePlan::Silent => {
                let mut silent = Silent;
                let mut recorder = Recorder::new(&mut silent);
                example.skip(&mut recorder);
                self.summary += recorder.summary();
                Ok(ExampleOutcome::default())
            }
            ExamplePlan::Skip => {
                header.open(self.reporter);
                self.reporter.start_example(example.description());
                let mut recorder = Recorder::new(&mut *self.reporter);
                example.skip(&mut recorder);
                self.summary += recorder.summary();
                self.reporter.end_example();
                Ok(ExampleOutcome::default())
            }
            ExamplePlan::Validate => {
                header.open(self.reporter);
                self.reporter.start_example(example.description());
                let (counts, mut failures) = {
                    let mut recorder = Recorder::new(&mut *self.reporter);
                    let failures = example.validate(&mut recorder).await;
                    (recorder.summary(), failures)
                };
                self.summary += counts;

                if let Some(fatal) = failures.iter().position(|e| !e.is_context_failure()) {
                    return Err(failures.swap_remove(fatal));
                }
                for failure in &failures {
                    tracing::warn!(error = %failure, "context failure");
                    self.reporter.bail_out(failure);
                }
                let bailed_out = !failures.is_empty();
                if bailed_out {
                    self.summary.aborted += 1;
                }
                self.reporter.end_example();

                Ok(ExampleOutcome {
                    invalid: counts.invalid > 0,
                    bailed_out,
                })
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::behavior::behavior;
    use crate::context::Context;
    use crate::example::example;

    fn plain() -> Example {
        example(Context::none()).build()
    }

    mod select_tests {
        use super::*;

        #[test]
        fn test_default_is_standard() {
            let behaviors = vec![behavior("a", vec![plain()])];
            assert_eq!(
                RunnerKind::select(&RunOptions::new(), &behaviors),
                RunnerKind::Standard
            );
        }

        #[test]
        fn test_any_pick_selects_picked_only() {
            let behaviors = vec![
                behavior("a", vec![plain()]),
                behavior("b", vec![plain().picked()]),
            ];
            assert_eq!(
                RunnerKind::select(&RunOptions::new(), &behaviors),
                RunnerKind::PickedOnly
            );
        }

        #[test]
        fn test_pick_in_skipped_behavior_keeps_standard() {
            let behaviors = vec![
                behavior("parked", vec![plain().picked()]).skipped(),
                behavior("live", vec![plain()]),
            ];
            assert_eq!(
                RunnerKind::select(&RunOptions::new(), &behaviors),
                RunnerKind::Standard
            );
        }

        #[test]
        fn test_option_selects_picked_only_without_picks() {
            let options = RunOptions::new().with_run_picked_only(true);
            assert_eq!(RunnerKind::select(&options, &[]), RunnerKind::PickedOnly);
        }

        #[test]
        fn test_fail_fast_wraps() {
            let options = RunOptions::new().with_fail_fast(true);
            assert_eq!(
                RunnerKind::select(&options, &[]),
                RunnerKind::FailFast(Box::new(RunnerKind::Standard))
            );
        }
    }

    mod plan_tests {
        use super::*;

        #[test]
        fn test_standard_plans() {
            let runner = RunnerKind::Standard;
            assert_eq!(runner.plan(RunMode::Normal), ExamplePlan::Validate);
            assert_eq!(runner.plan(RunMode::Picked), ExamplePlan::Validate);
            assert_eq!(runner.plan(RunMode::Skipped), ExamplePlan::Skip);
        }

        #[test]
        fn test_picked_only_plans() {
            let runner = RunnerKind::PickedOnly;
            assert_eq!(runner.plan(RunMode::Picked), ExamplePlan::Validate);
            assert_eq!(runner.plan(RunMode::Normal), ExamplePlan::Silent);
            assert_eq!(runner.plan(RunMode::Skipped), ExamplePlan::Silent);
        }

        #[test]
        fn test_skipped_behavior_uses_skip_runner() {
            let runner = RunnerKind::Standard.for_behavior(RunMode::Skipped);
            assert_eq!(runner, RunnerKind::Skip);
            assert_eq!(runner.plan(RunMode::Picked), ExamplePlan::Skip);
            assert_eq!(
                RunnerKind::PickedOnly.for_behavior(RunMode::Skipped),
                RunnerKind::PickedOnly
            );
        }

        #[test]
        fn test_fail_fast_delegates_until_tripped() {
            let runner = RunnerKind::FailFast(Box::new(RunnerKind::Standard));
            assert_eq!(runner.plan(RunMode::Normal), ExamplePlan::Validate);
            let runner = runner.after_example(false);
            assert!(matches!(runner, RunnerKind::FailFast(_)));
            let runner = runner.after_example(true);
            assert_eq!(runner, RunnerKind::Silent);
            assert_eq!(runner.plan(RunMode::Picked), ExamplePlan::Silent);
        }

        #[test]
        fn test_failures_without_fail_fast_change_nothing() {
            assert_eq!(
                RunnerKind::Standard.after_example(true),
                RunnerKind::Standard
            );
        }

        #[test]
        fn test_announcement() {
            assert!(RunnerKind::Standard.announces_behaviors());
            assert!(!RunnerKind::PickedOnly.announces_behaviors());
            assert!(!RunnerKind::Silent.announces_behaviors());
            assert!(RunnerKind::FailFast(Box::new(RunnerKind::Standard)).announces_behaviors());
        }
    }
}
