//! Context Composition
//!
//! A [`Context`] supplies the value an example's claims run against. Contexts
//! can depend on other contexts, forming a graph that is walked fresh for
//! every example run:
//!
//! - Each node initializes at most once per example, however many dependents
//!   reach it. The memo lives in a per-example `ContextSession` and is never
//!   shared across examples.
//! - Teardown runs in reverse initialization order, so dependents are torn down
//!   before the upstream value they share.
//! - Nodes that are never reached neither initialize nor tear down.
//! - If an initializer fails, every node that did initialize is still torn
//!   down.
//!
//! Upstream values are handed to dependents as `Rc<U>`. The example's own
//! value is owned by the runner and handed to claims as `&mut T`.
//!
//! # Example
//!
//! ```ignore
//! let server = Context::sync(|| Ok(FakeServer::start()))
//!     .named("server")
//!     .with_sync_teardown(|server| server.stop());
//! let client = Context::derived(&server, |server| {
//!     Box::pin(async move { Ok(Client::connect(&server.url()).await?) })
//! });
//! ```

use crate::claim::ClaimError;
use crate::result::{ComprobarError, ComprobarResult};
use futures::future::{ready, LocalBoxFuture};
use std::any::{type_name, Any};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Future returned by a context initializer
pub type InitFuture<T> = LocalBoxFuture<'static, Result<T, ClaimError>>;

/// Future returned by a context teardown
pub type TeardownFuture = LocalBoxFuture<'static, Result<(), ClaimError>>;

type InitFn<T> =
    Rc<dyn for<'s> Fn(&'s mut ContextSession) -> LocalBoxFuture<'s, Result<T, InitError>>>;
type TeardownFn<T> = Rc<dyn Fn(T) -> TeardownFuture>;
type EntryTeardown = Box<dyn FnOnce(Rc<dyn Any>) -> LocalBoxFuture<'static, ComprobarResult<()>>>;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

fn next_node_id() -> u64 {
    NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed)
}

fn init_fn<T, F>(init: F) -> InitFn<T>
where
    F: for<'s> Fn(&'s mut ContextSession) -> LocalBoxFuture<'s, Result<T, InitError>> + 'static,
{
    Rc::new(init)
}

/// Failure while initializing one node
enum InitError {
    /// This node's own initializer failed
    Own(ClaimError),
    /// An upstream node failed; already labelled
    Upstream(ComprobarError),
}

// ============================================================================
// Session
// ============================================================================

/// Memo of initialized upstream values for one example run.
#[derive(Default)]
pub(crate) struct ContextSession {
    entries: Vec<SessionEntry>,
}

struct SessionEntry {
    id: u64,
    label: String,
    value: Rc<dyn Any>,
    teardown: EntryTeardown,
}

impl ContextSession {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Number of memoized upstream values
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    fn memoized<T: 'static>(&self, id: u64) -> Option<ComprobarResult<Rc<T>>> {
        self.entries.iter().find(|entry| entry.id == id).map(|entry| {
            Rc::clone(&entry.value).downcast::<T>().map_err(|_| {
                ComprobarError::invariant(format!(
                    "context '{}' memoized with a different type",
                    entry.label
                ))
            })
        })
    }

    /// Tear down every memoized value in reverse initialization order.
    ///
    /// Every entry is attempted; the errors are returned in teardown order.
    pub(crate) async fn teardown(&mut self) -> Vec<ComprobarError> {
        let mut errors = Vec::new();
        while let Some(entry) = self.entries.pop() {
            tracing::trace!(context = %entry.label, "tearing down upstream context");
            if let Err(error) = (entry.teardown)(entry.value).await {
                tracing::warn!(context = %entry.label, %error, "context teardown failed");
                errors.push(error);
            }
        }
        errors
    }
}

impl fmt::Debug for ContextSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextSession")
            .field(
                "entries",
                &self.entries.iter().map(|e| &e.label).collect::<Vec<_>>(),
            )
            .finish()
    }
}

// ============================================================================
// Context
// ============================================================================

/// Lazily initialized value supplied to an example's claims.
pub struct Context<T> {
    node: Rc<Node<T>>,
}

struct Node<T> {
    id: u64,
    label: String,
    init: InitFn<T>,
    teardown: Option<TeardownFn<T>>,
}

impl<T> Clone for Context<T> {
    fn clone(&self) -> Self {
        Self {
            node: Rc::clone(&self.node),
        }
    }
}

impl<T> fmt::Debug for Context<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("label", &self.node.label)
            .field("has_teardown", &self.node.teardown.is_some())
            .finish()
    }
}

impl Context<()> {
    /// Context for examples that need no state
    #[must_use]
    pub fn none() -> Self {
        Self::sync(|| Ok(())).named("none")
    }
}

impl<T: 'static> Context<T> {
    fn from_init(init: InitFn<T>) -> Self {
        Self {
            node: Rc::new(Node {
                id: next_node_id(),
                label: type_name::<T>().to_string(),
                init,
                teardown: None,
            }),
        }
    }

    /// Create a context from an asynchronous initializer
    pub fn new<F>(init: F) -> Self
    where
        F: Fn() -> InitFuture<T> + 'static,
    {
        let init = Rc::new(init);
        Self::from_init(init_fn(move |_session| {
            let init = Rc::clone(&init);
            Box::pin(async move { init().await.map_err(InitError::Own) })
        }))
    }

    /// Create a context from a synchronous initializer
    pub fn sync<F>(init: F) -> Self
    where
        F: Fn() -> Result<T, ClaimError> + 'static,
    {
        Self::new(move || Box::pin(ready(init())))
    }

    /// Create a context built from one upstream context's value
    pub fn derived<U, F>(upstream: &Context<U>, init: F) -> Self
    where
        U: 'static,
        F: Fn(Rc<U>) -> InitFuture<T> + 'static,
    {
        let upstream = upstream.clone();
        let init = Rc::new(init);
        Self::from_init(init_fn(move |session| {
            let upstream = upstream.clone();
            let init = Rc::clone(&init);
            Box::pin(async move {
                let value = upstream
                    .resolve(session)
                    .await
                    .map_err(InitError::Upstream)?;
                init(value).await.map_err(InitError::Own)
            })
        }))
    }

    /// Label used in logs and bail-out reports
    #[must_use]
    pub fn named(self, label: impl Into<String>) -> Self {
        self.rebuild(Some(label.into()), self.node.teardown.clone())
    }

    /// Tear the value down asynchronously after the example
    #[must_use]
    pub fn with_teardown<F>(self, teardown: F) -> Self
    where
        F: Fn(T) -> TeardownFuture + 'static,
    {
        let teardown: TeardownFn<T> = Rc::new(teardown);
        self.rebuild(None, Some(teardown))
    }

    /// Tear the value down synchronously after the example
    #[must_use]
    pub fn with_sync_teardown<F>(self, teardown: F) -> Self
    where
        F: Fn(T) -> Result<(), ClaimError> + 'static,
    {
        self.with_teardown(move |value| Box::pin(ready(teardown(value))))
    }

    /// Context label
    #[must_use]
    pub fn label(&self) -> &str {
        &self.node.label
    }

    fn rebuild(&self, label: Option<String>, teardown: Option<TeardownFn<T>>) -> Self {
        Self {
            node: Rc::new(Node {
                id: next_node_id(),
                label: label.unwrap_or_else(|| self.node.label.clone()),
                init: Rc::clone(&self.node.init),
                teardown,
            }),
        }
    }

    fn label_error(&self, error: InitError) -> ComprobarError {
        match error {
            InitError::Own(cause) => ComprobarError::ContextInit {
                context: self.node.label.clone(),
                cause,
            },
            InitError::Upstream(error) => error,
        }
    }

    /// Initialize this node as the root of an example's graph.
    ///
    /// The root is not memoized: the runner owns the returned value and tears
    /// it down with [`Context::teardown_value`].
    pub(crate) fn initialize<'s>(
        &self,
        session: &'s mut ContextSession,
    ) -> LocalBoxFuture<'s, ComprobarResult<T>> {
        let this = self.clone();
        Box::pin(async move {
            tracing::trace!(context = %this.node.label, "initializing context");
            (this.node.init)(session)
                .await
                .map_err(|error| this.label_error(error))
        })
    }

    /// Tear down a root value produced by [`Context::initialize`]
    pub(crate) fn teardown_value(&self, value: T) -> LocalBoxFuture<'static, ComprobarResult<()>> {
        let node = Rc::clone(&self.node);
        Box::pin(async move {
            let Some(teardown) = node.teardown.clone() else {
                return Ok(());
            };
            tracing::trace!(context = %node.label, "tearing down context");
            teardown(value)
                .await
                .map_err(|cause| ComprobarError::ContextTeardown {
                    context: node.label.clone(),
                    cause,
                })
        })
    }

    /// Resolve this node as an upstream dependency, initializing it at most
    /// once per session.
    fn resolve<'s>(
        &self,
        session: &'s mut ContextSession,
    ) -> LocalBoxFuture<'s, ComprobarResult<Rc<T>>> {
        let this = self.clone();
        Box::pin(async move {
            if let Some(memoized) = session.memoized::<T>(this.node.id) {
                return memoized;
            }

            tracing::trace!(context = %this.node.label, "initializing upstream context");
            let value = (this.node.init)(session)
                .await
                .map_err(|error| this.label_error(error))?;
            let value = Rc::new(value);

            session.entries.push(SessionEntry {
                id: this.node.id,
                label: this.node.label.clone(),
                value: Rc::clone(&value) as Rc<dyn Any>,
                teardown: this.entry_teardown(),
            });
            Ok(value)
        })
    }

    fn entry_teardown(&self) -> EntryTeardown {
        let node = Rc::clone(&self.node);
        Box::new(
            move |value: Rc<dyn Any>| -> LocalBoxFuture<'static, ComprobarResult<()>> {
                Box::pin(async move {
                    let value = value.downcast::<T>().map_err(|_| {
                        ComprobarError::invariant(format!(
                            "context '{}' memoized with a different type",
                            node.label
                        ))
                    })?;
                    let Some(teardown) = node.teardown.clone() else {
                        return Ok(());
                    };
                    let value = Rc::try_unwrap(value).map_err(|_| ComprobarError::ContextShared {
                        context: node.label.clone(),
                    })?;
                    teardown(value)
                        .await
                        .map_err(|cause| ComprobarError::ContextTeardown {
                            context: node.label.clone(),
                            cause,
                        })
                })
            },
        )
    }
}

// ============================================================================
// Named composition
// ============================================================================

trait ResolveAny {
    fn resolve_any<'s>(
        &self,
        session: &'s mut ContextSession,
    ) -> LocalBoxFuture<'s, ComprobarResult<Rc<dyn Any>>>;
}

impl<T: 'static> ResolveAny for Context<T> {
    fn resolve_any<'s>(
        &self,
        session: &'s mut ContextSession,
    ) -> LocalBoxFuture<'s, ComprobarResult<Rc<dyn Any>>> {
        let resolving = self.resolve(session);
        Box::pin(async move { resolving.await.map(|value| value as Rc<dyn Any>) })
    }
}

/// Builder composing named upstream contexts into one [`Upstream`] value.
///
/// ```ignore
/// let both = Context::map()
///     .with("server", &server)
///     .with("database", &database)
///     .build();
/// let app = Context::derived(&both, |up| {
///     Box::pin(async move { Ok(App::new(up.get::<Server>("server")?, up.get::<Db>("database")?)) })
/// });
/// ```
#[derive(Default)]
pub struct ContextMap {
    upstream: Vec<(String, Rc<dyn ResolveAny>)>,
}

impl fmt::Debug for ContextMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextMap")
            .field(
                "names",
                &self.upstream.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ContextMap {
    /// Add a named upstream context; initialized in insertion order
    #[must_use]
    pub fn with<U: 'static>(mut self, name: impl Into<String>, context: &Context<U>) -> Self {
        self.upstream.push((name.into(), Rc::new(context.clone())));
        self
    }

    /// Finish the composition
    #[must_use]
    pub fn build(self) -> Context<Upstream> {
        let label = format!(
            "map({})",
            self.upstream
                .iter()
                .map(|(name, _)| name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        let upstream = Rc::new(self.upstream);
        Context::from_init(init_fn(move |session| {
            let upstream = Rc::clone(&upstream);
            Box::pin(async move {
                let mut values = Vec::with_capacity(upstream.len());
                for (name, context) in upstream.iter() {
                    let value = context
                        .resolve_any(session)
                        .await
                        .map_err(InitError::Upstream)?;
                    values.push((name.clone(), value));
                }
                Ok(Upstream { values })
            })
        }))
        .named(label)
    }
}

impl Context<Upstream> {
    /// Start a named composition of upstream contexts
    #[must_use]
    pub fn map() -> ContextMap {
        ContextMap::default()
    }
}

/// Values of named upstream contexts.
pub struct Upstream {
    values: Vec<(String, Rc<dyn Any>)>,
}

impl Upstream {
    /// Fetch the value of the upstream context registered as `name`
    pub fn get<U: 'static>(&self, name: &str) -> ComprobarResult<Rc<U>> {
        self.values
            .iter()
            .find(|(candidate, _)| candidate == name)
            .and_then(|(_, value)| Rc::clone(value).downcast::<U>().ok())
            .ok_or_else(|| ComprobarError::MissingUpstream {
                name: name.to_string(),
            })
    }

    /// Names available, in composition order
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.values.iter().map(|(name, _)| name.as_str()).collect()
    }
}

impl fmt::Debug for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upstream")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    type Log = Rc<RefCell<Vec<String>>>;

    fn logged(log: &Log, label: &'static str) -> Context<String> {
        let init_log = Rc::clone(log);
        let teardown_log = Rc::clone(log);
        Context::sync(move || {
            init_log.borrow_mut().push(format!("init {label}"));
            Ok(label.to_string())
        })
        .named(label)
        .with_sync_teardown(move |_| {
            teardown_log.borrow_mut().push(format!("teardown {label}"));
            Ok(())
        })
    }

    fn dependent(log: &Log, upstream: &Context<String>, label: &'static str) -> Context<String> {
        let init_log = Rc::clone(log);
        let teardown_log = Rc::clone(log);
        Context::derived(upstream, move |value: Rc<String>| {
            init_log.borrow_mut().push(format!("init {label}"));
            let text = format!("{label}<{value}>");
            Box::pin(ready(Ok(text)))
        })
        .named(label)
        .with_sync_teardown(move |_| {
            teardown_log.borrow_mut().push(format!("teardown {label}"));
            Ok(())
        })
    }

    async fn run_root(root: &Context<String>) -> (ComprobarResult<String>, Vec<ComprobarError>) {
        let mut session = ContextSession::new();
        let value = root.initialize(&mut session).await;
        let mut errors = Vec::new();
        if let Ok(v) = &value {
            if let Err(e) = root.teardown_value(v.clone()).await {
                errors.push(e);
            }
        }
        errors.extend(session.teardown().await);
        (value, errors)
    }

    mod lifecycle_tests {
        use super::*;

        #[tokio::test]
        async fn test_leaf_init_and_teardown() {
            let log = Log::default();
            let root = logged(&log, "db");
            let (value, errors) = run_root(&root).await;
            assert_eq!(value.unwrap(), "db");
            assert!(errors.is_empty());
            assert_eq!(*log.borrow(), vec!["init db", "teardown db"]);
        }

        #[tokio::test]
        async fn test_shared_upstream_initialized_once() {
            let log = Log::default();
            let shared = logged(&log, "shared");
            let left = dependent(&log, &shared, "left");
            let right = dependent(&log, &shared, "right");
            let root = Context::map()
                .with("left", &left)
                .with("right", &right)
                .build();

            let mut session = ContextSession::new();
            let upstream = root.initialize(&mut session).await.unwrap();
            assert_eq!(*upstream.get::<String>("left").unwrap(), "left<shared>");
            assert_eq!(*upstream.get::<String>("right").unwrap(), "right<shared>");
            assert_eq!(session.len(), 3);
            drop(upstream);
            assert!(session.teardown().await.is_empty());

            assert_eq!(
                *log.borrow(),
                vec![
                    "init shared",
                    "init left",
                    "init right",
                    "teardown right",
                    "teardown left",
                    "teardown shared",
                ]
            );
        }

        #[tokio::test]
        async fn test_memo_is_per_session() {
            let log = Log::default();
            let shared = logged(&log, "shared");
            let root = dependent(&log, &shared, "root");
            run_root(&root).await;
            run_root(&root).await;
            let inits = log
                .borrow()
                .iter()
                .filter(|entry| *entry == "init shared")
                .count();
            assert_eq!(inits, 2);
        }

        #[tokio::test]
        async fn test_unreached_context_never_initializes() {
            let log = Log::default();
            let _unused = logged(&log, "unused");
            let root = logged(&log, "used");
            run_root(&root).await;
            assert!(log.borrow().iter().all(|entry| !entry.contains("unused")));
        }
    }

    mod failure_tests {
        use super::*;

        #[tokio::test]
        async fn test_failed_init_tears_down_upstream() {
            let log = Log::default();
            let shared = logged(&log, "shared");
            let failing: Context<String> =
                Context::derived(&shared, |_| Box::pin(ready(Err(ClaimError::new("no port")))))
                    .named("server");

            let (value, errors) = run_root(&failing).await;
            let error = value.unwrap_err();
            assert!(matches!(
                &error,
                ComprobarError::ContextInit { context, .. } if context == "server"
            ));
            assert!(errors.is_empty());
            assert_eq!(*log.borrow(), vec!["init shared", "teardown shared"]);
        }

        #[tokio::test]
        async fn test_upstream_failure_keeps_its_label() {
            let broken: Context<String> =
                Context::sync(|| Err(ClaimError::new("refused"))).named("database");
            let root = Context::derived(&broken, |value: Rc<String>| {
                Box::pin(ready(Ok(value.len())))
            });
            let mut session = ContextSession::new();
            let error = root.initialize(&mut session).await.unwrap_err();
            assert!(matches!(
                error,
                ComprobarError::ContextInit { context, .. } if context == "database"
            ));
            assert_eq!(session.len(), 0);
        }

        #[tokio::test]
        async fn test_teardown_error_is_reported() {
            let root: Context<u8> = Context::sync(|| Ok(1))
                .named("flaky")
                .with_sync_teardown(|_| Err(ClaimError::new("stuck")));
            let mut session = ContextSession::new();
            let value = root.initialize(&mut session).await.unwrap();
            let error = root.teardown_value(value).await.unwrap_err();
            assert!(matches!(error, ComprobarError::ContextTeardown { .. }));
        }

        #[tokio::test]
        async fn test_missing_upstream_name() {
            let only = Context::sync(|| Ok(5_u32));
            let root = Context::map().with("only", &only).build();
            let mut session = ContextSession::new();
            let upstream = root.initialize(&mut session).await.unwrap();
            assert!(upstream.get::<u32>("only").is_ok());
            assert!(matches!(
                upstream.get::<u32>("other"),
                Err(ComprobarError::MissingUpstream { .. })
            ));
            assert!(upstream.get::<String>("only").is_err());
        }
    }

    mod naming_tests {
        use super::*;

        #[test]
        fn test_default_label_is_type_name() {
            let context = Context::sync(|| Ok(3_u16));
            assert_eq!(context.label(), "u16");
        }

        #[test]
        fn test_map_label_lists_names() {
            let a = Context::sync(|| Ok(1_u8));
            let b = Context::sync(|| Ok(2_u8));
            let map = Context::map().with("a", &a).with("b", &b).build();
            assert_eq!(map.label(), "map(a, b)");
        }
    }
}
