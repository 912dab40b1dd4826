//! Scripts
//!
//! A [`Script`] is a three-phase sequence of claims run against one context
//! value:
//!
//! ```text
//! prepare ──▶ perform ──▶ observe
//!   (facts)    (steps)     (effects)
//! ```
//!
//! Prepare and perform claims run strictly in order; the first invalid one
//! skips everything after it in the example. Observations are independent of
//! each other: every observation of a script runs even when a sibling
//! observation fails, but any failure skips the scripts that follow.
//!
//! An example is an ordered list of scripts sharing one context value, so
//! `execute` threads a [`Mode`] from script to script.

use crate::claim::{Claim, Mode};
use crate::reporter::Recorder;

/// Prepare, perform, and observe claims for one example step.
///
/// ```ignore
/// let script = Script::new()
///     .prepare(vec![fact("the cart is empty", |cart: &mut Cart| ...)])
///     .perform(vec![step("add a book", |cart: &mut Cart| ...)])
///     .observe(vec![effect("the cart holds one item", |cart: &mut Cart| ...)]);
/// ```
pub struct Script<C> {
    prepare: Vec<Claim<C>>,
    perform: Vec<Claim<C>>,
    observe: Vec<Claim<C>>,
}

impl<C> Default for Script<C> {
    fn default() -> Self {
        Self {
            prepare: Vec::new(),
            perform: Vec::new(),
            observe: Vec::new(),
        }
    }
}

impl<C> std::fmt::Debug for Script<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Script")
            .field("prepare", &self.prepare)
            .field("perform", &self.perform)
            .field("observe", &self.observe)
            .finish()
    }
}

impl<C> Script<C> {
    /// Create an empty script
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append preconditions
    #[must_use]
    pub fn prepare(mut self, claims: Vec<Claim<C>>) -> Self {
        self.prepare.extend(claims);
        self
    }

    /// Append actions
    #[must_use]
    pub fn perform(mut self, claims: Vec<Claim<C>>) -> Self {
        self.perform.extend(claims);
        self
    }

    /// Append observations
    #[must_use]
    pub fn observe(mut self, claims: Vec<Claim<C>>) -> Self {
        self.observe.extend(claims);
        self
    }

    /// Every claim in phase order
    pub fn claims(&self) -> impl Iterator<Item = &Claim<C>> {
        self.prepare
            .iter()
            .chain(&self.perform)
            .chain(&self.observe)
    }

    /// Number of top-level claims
    #[must_use]
    pub fn len(&self) -> usize {
        self.prepare.len() + self.perform.len() + self.observe.len()
    }

    /// Whether the script has no claims
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn execute(&self, context: &mut C, mode: Mode, recorder: &mut Recorder<'_>) -> Mode {
        let mut mode = mode;
        for claim in self.prepare.iter().chain(&self.perform) {
            let result = match mode {
                Mode::Validate => claim.validate(context).await,
                Mode::Skip => claim.skip(),
            };
            mode = mode.after(&result);
            recorder.record(&result);
        }

        let observing = mode;
        for claim in &self.observe {
            let result = match observing {
                Mode::Validate => claim.validate(context).await,
                Mode::Skip => claim.skip(),
            };
            mode = mode.after(&result);
            recorder.record(&result);
        }
        mode
    }

    fn skip(&self, recorder: &mut Recorder<'_>) {
        for claim in self.claims() {
            recorder.record(&claim.skip());
        }
    }
}

/// Run an example's scripts in order against one context value
pub(crate) async fn execute<C>(scripts: &[Script<C>], context: &mut C, recorder: &mut Recorder<'_>) {
    let mut mode = Mode::Validate;
    for script in scripts {
        mode = script.execute(context, mode, recorder).await;
    }
    if mode == Mode::Skip {
        tracing::debug!("example stopped validating after an invalid claim");
    }
}

/// Report every claim of an example as skipped without touching a context
pub(crate) fn skip_all<C>(scripts: &[Script<C>], recorder: &mut Recorder<'_>) {
    for script in scripts {
        script.skip(recorder);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::claim::{effect, fact, procedure, step, ClaimError};
    use crate::reporter::RecordingReporter;

    #[derive(Debug, Default)]
    struct Journal {
        ran: Vec<&'static str>,
    }

    fn ok(name: &'static str) -> Claim<Journal> {
        step(name, move |journal: &mut Journal| {
            journal.ran.push(name);
            Ok(())
        })
    }

    fn bad(name: &'static str) -> Claim<Journal> {
        effect(name, move |journal: &mut Journal| {
            journal.ran.push(name);
            Err(ClaimError::new(format!("{name} failed")))
        })
    }

    async fn run(scripts: &[Script<Journal>]) -> (Journal, RecordingReporter, crate::Summary) {
        let mut journal = Journal::default();
        let mut reporter = RecordingReporter::new();
        let summary = {
            let mut recorder = Recorder::new(&mut reporter);
            execute(scripts, &mut journal, &mut recorder).await;
            recorder.summary()
        };
        (journal, reporter, summary)
    }

    fn kinds(reporter: &RecordingReporter) -> Vec<(String, &'static str)> {
        reporter
            .results()
            .map(|result| {
                let kind = if result.is_valid() {
                    "valid"
                } else if result.is_invalid() {
                    "invalid"
                } else {
                    "skipped"
                };
                (result.description.clone(), kind)
            })
            .collect()
    }

    mod phase_tests {
        use super::*;

        #[tokio::test]
        async fn test_all_phases_run_in_order() {
            let script = Script::new()
                .observe(vec![ok("observe")])
                .prepare(vec![ok("prepare")])
                .perform(vec![ok("perform")]);
            let (journal, _, summary) = run(&[script]).await;
            assert_eq!(journal.ran, vec!["prepare", "perform", "observe"]);
            assert_eq!(summary.valid, 3);
        }

        #[tokio::test]
        async fn test_prepare_failure_skips_rest_of_example() {
            let first = Script::new()
                .prepare(vec![bad("precondition")])
                .perform(vec![ok("act")])
                .observe(vec![ok("look")]);
            let second = Script::new().perform(vec![ok("again")]);
            let (journal, reporter, summary) = run(&[first, second]).await;

            assert_eq!(journal.ran, vec!["precondition"]);
            assert_eq!(
                kinds(&reporter),
                vec![
                    ("precondition".to_string(), "invalid"),
                    ("act".to_string(), "skipped"),
                    ("look".to_string(), "skipped"),
                    ("again".to_string(), "skipped"),
                ]
            );
            assert_eq!((summary.invalid, summary.skipped), (1, 3));
        }

        #[tokio::test]
        async fn test_observations_do_not_stop_siblings() {
            let first = Script::new()
                .perform(vec![ok("act")])
                .observe(vec![bad("look one"), ok("look two")]);
            let second = Script::new().perform(vec![ok("act again")]);
            let (journal, reporter, _) = run(&[first, second]).await;

            assert_eq!(journal.ran, vec!["act", "look one", "look two"]);
            assert_eq!(
                kinds(&reporter),
                vec![
                    ("act".to_string(), "valid"),
                    ("look one".to_string(), "invalid"),
                    ("look two".to_string(), "valid"),
                    ("act again".to_string(), "skipped"),
                ]
            );
        }

        #[tokio::test]
        async fn test_failed_observation_keeps_its_payload() {
            let script = Script::new()
                .prepare(vec![ok("ready")])
                .observe(vec![
                    effect("x", |_: &mut Journal| Err(ClaimError::mismatch("equals", "a", "b"))),
                    ok("y"),
                ]);
            let (_, reporter, _) = run(&[script]).await;
            let results: Vec<_> = reporter.results().collect();
            assert!(results[0].is_valid());
            assert!(results[2].is_valid());
            let error = results[1].error().unwrap();
            assert_eq!(results[1].description, "x");
            assert_eq!(error.expected.as_deref(), Some("\"a\""));
            assert_eq!(error.actual.as_deref(), Some("\"b\""));
        }

        #[tokio::test]
        async fn test_valid_observations_continue_to_next_script() {
            let first = Script::new().observe(vec![ok("a")]);
            let second = Script::new().prepare(vec![fact("b", |j: &mut Journal| {
                j.ran.push("b");
                Ok(())
            })]);
            let (journal, _, _) = run(&[first, second]).await;
            assert_eq!(journal.ran, vec!["a", "b"]);
        }

        #[tokio::test]
        async fn test_group_failure_counts_leaves() {
            let script = Script::new().perform(vec![
                procedure("checkout", vec![ok("pay"), bad("ship"), ok("email")]),
                ok("after"),
            ]);
            let (_, reporter, summary) = run(&[script]).await;
            assert_eq!(reporter.results().count(), 2);
            assert_eq!((summary.valid, summary.invalid, summary.skipped), (1, 1, 2));
        }
    }

    mod skip_tests {
        use super::*;

        #[test]
        fn test_skip_all_reports_every_claim() {
            let scripts = vec![
                Script::new().prepare(vec![ok("a")]).observe(vec![ok("b")]),
                Script::new().perform(vec![ok("c")]),
            ];
            let mut reporter = RecordingReporter::new();
            let mut recorder = Recorder::new(&mut reporter);
            skip_all(&scripts, &mut recorder);
            assert_eq!(recorder.summary().skipped, 3);
            assert_eq!(scripts[0].len(), 2);
            assert!(!scripts[1].is_empty());
        }
    }
}
