//! Comprobar: Executable Behavior Engine
//!
//! Comprobar (Spanish: "to verify") validates behaviors written as
//! executable examples. A [`Behavior`] groups [`Example`]s; each example
//! runs one or more [`Script`]s of claims against a value supplied by a
//! [`Context`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  validate(behaviors, reporter, options)                          │
//! │                                                                  │
//! │  OrderProvider ──▶ Behavior ──▶ Example ──▶ Script ──▶ Claim     │
//! │   (seeded)          │            │           prepare              │
//! │                     │            │           perform              │
//! │  RunnerKind ────────┘            │           observe              │
//! │   standard / picked / fail fast  │                                │
//! │                                  ▼                                │
//! │                         Context graph (per example)              │
//! │                         init once, teardown in reverse           │
//! │                                                                  │
//! │  Reporter ◀── results, bail-outs, summary                        │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use comprobar::prelude::*;
//!
//! let cart = Context::sync(|| Ok(Vec::<String>::new()));
//! let behaviors = vec![behavior("a shopping cart", vec![
//!     example(cart)
//!         .description("adding a book")
//!         .script(Script::new()
//!             .perform(vec![step("add a book", |cart: &mut Vec<String>| {
//!                 cart.push("book".into());
//!                 Ok(())
//!             })])
//!             .observe(vec![effect("the cart has one item", |cart: &mut Vec<String>| {
//!                 if cart.len() == 1 { Ok(()) } else { Err(ClaimError::mismatch("equals", 1, cart.len())) }
//!             })]))
//!         .build(),
//! ])];
//!
//! let mut reporter = TracingReporter::new();
//! let summary = validate(&behaviors, &mut reporter, &RunOptions::default()).await?;
//! assert!(summary.is_success());
//! ```

#![warn(missing_docs)]

mod behavior;
mod claim;
mod config;
mod context;
mod example;
pub mod logging;
mod order;
mod reporter;
mod result;
mod runner;
mod script;
mod summary;
mod timer;

pub use behavior::{behavior, Behavior};
pub use claim::{
    effect, fact, outcome, procedure, situation, step, Claim, ClaimError, ClaimFuture,
    ClaimResult, Composite, Fact, ResultKind,
};
pub use config::RunOptions;
pub use context::{Context, ContextMap, InitFuture, TeardownFuture, Upstream};
pub use example::{example, Example, ExampleBuilder, RunMode};
pub use order::{OrderProvider, Seed};
pub use reporter::{RecordingReporter, ReportEvent, Reporter, TracingReporter};
pub use result::{ComprobarError, ComprobarResult};
pub use runner::{validate, ExamplePlan, RunnerKind};
pub use script::Script;
pub use summary::Summary;
pub use timer::{FixedTimer, MonotonicTimer, Timer, TimerFactory};

/// Everything needed to write and run behaviors
pub mod prelude {
    pub use super::{
        behavior, effect, example, fact, outcome, procedure, situation, step, validate,
        Behavior, Claim, ClaimError, ClaimResult, ComprobarError, ComprobarResult, Context,
        Example, OrderProvider, RecordingReporter, Reporter, RunMode, RunOptions, Script, Seed,
        Summary, TracingReporter, Upstream,
    };
}
