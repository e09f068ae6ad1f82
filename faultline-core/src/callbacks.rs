//! Ordered hook chains for events, breadcrumbs and sessions.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::logger::{DisplayPanic, Logger};
use crate::protocol::{Breadcrumb, Event, Session};

/// A hook receiving exclusive access to a value for its turn.
///
/// Returning `false` vetoes the value: no further hooks run and the value is
/// discarded.
pub type Callback<T> = Arc<dyn Fn(&mut T) -> bool + Send + Sync>;

/// A hook run against every event before delivery.
pub type OnErrorCallback = Callback<Event>;

/// A hook run against every breadcrumb before it is stored.
pub type OnBreadcrumbCallback = Callback<Breadcrumb>;

/// A hook run against every session before it starts.
pub type OnSessionCallback = Callback<Session>;

/// The kind of a hook.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum HookKind {
    /// Runs against events.
    OnError,
    /// Runs against breadcrumbs.
    OnBreadcrumb,
    /// Runs against sessions.
    OnSession,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HookKind::OnError => "on_error",
            HookKind::OnBreadcrumb => "on_breadcrumb",
            HookKind::OnSession => "on_session",
        })
    }
}

/// A hook to register on a client.
#[derive(Clone)]
pub enum Hook {
    /// An event hook.
    OnError(OnErrorCallback),
    /// A breadcrumb hook.
    OnBreadcrumb(OnBreadcrumbCallback),
    /// A session hook.
    OnSession(OnSessionCallback),
}

impl Hook {
    /// Creates an event hook.
    pub fn on_error<F>(f: F) -> Hook
    where
        F: Fn(&mut Event) -> bool + Send + Sync + 'static,
    {
        Hook::OnError(Arc::new(f))
    }

    /// Creates a breadcrumb hook.
    pub fn on_breadcrumb<F>(f: F) -> Hook
    where
        F: Fn(&mut Breadcrumb) -> bool + Send + Sync + 'static,
    {
        Hook::OnBreadcrumb(Arc::new(f))
    }

    /// Creates a session hook.
    pub fn on_session<F>(f: F) -> Hook
    where
        F: Fn(&mut Session) -> bool + Send + Sync + 'static,
    {
        Hook::OnSession(Arc::new(f))
    }

    /// The kind of this hook.
    pub fn kind(&self) -> HookKind {
        match self {
            Hook::OnError(_) => HookKind::OnError,
            Hook::OnBreadcrumb(_) => HookKind::OnBreadcrumb,
            Hook::OnSession(_) => HookKind::OnSession,
        }
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hook({})", self.kind())
    }
}

/// Identifies a registered hook so it can be removed again.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct HookId {
    kind: HookKind,
    id: u64,
}

impl HookId {
    /// The kind of the registered hook.
    pub fn kind(&self) -> HookKind {
        self.kind
    }
}

/// The result of running a chain.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct ChainOutcome {
    /// Whether a hook vetoed the value.
    pub vetoed: bool,
}

/// An ordered list of hooks of one kind.
///
/// Hooks run in registration order.  The same hook may be registered twice
/// and then runs twice.
pub struct CallbackChain<T> {
    kind: HookKind,
    next_id: AtomicU64,
    hooks: Mutex<Vec<(u64, Callback<T>)>>,
}

impl<T> CallbackChain<T> {
    /// Creates an empty chain.
    pub fn new(kind: HookKind) -> CallbackChain<T> {
        CallbackChain {
            kind,
            next_id: AtomicU64::new(0),
            hooks: Mutex::new(Vec::new()),
        }
    }

    /// Appends a hook to the chain.
    pub fn register(&self, hook: Callback<T>) -> HookId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, hook));
        HookId {
            kind: self.kind,
            id,
        }
    }

    /// Removes a hook.  Returns `false` if it was not registered here.
    pub fn remove(&self, id: HookId) -> bool {
        if id.kind != self.kind {
            return false;
        }
        let mut hooks = self.hooks.lock().unwrap_or_else(PoisonError::into_inner);
        let before = hooks.len();
        hooks.retain(|(hook_id, _)| *hook_id != id.id);
        hooks.len() != before
    }

    /// The number of registered hooks.
    pub fn len(&self) -> usize {
        self.hooks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` if no hooks are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs all hooks against `value` until one vetoes.
    ///
    /// The chain is copied before running so hooks may register further
    /// hooks; those only run on the next invocation.
    pub fn run(&self, value: &mut T, logger: &dyn Logger) -> ChainOutcome {
        let hooks: Vec<Callback<T>> = self
            .hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, hook)| hook.clone())
            .collect();

        for hook in hooks.iter() {
            if !run_hook(self.kind, &**hook, value, logger) {
                return ChainOutcome { vetoed: true };
            }
        }
        ChainOutcome { vetoed: false }
    }
}

impl<T> fmt::Debug for CallbackChain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackChain")
            .field("kind", &self.kind)
            .field("hooks", &self.len())
            .finish()
    }
}

/// Runs a single hook, containing panics.
///
/// A panicking hook is logged and counts as "keep".  Whatever it changed on
/// `value` before panicking stays changed.
pub(crate) fn run_hook<T: ?Sized>(
    kind: HookKind,
    hook: &(dyn Fn(&mut T) -> bool + Send + Sync),
    value: &mut T,
    logger: &dyn Logger,
) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(|| hook(value))) {
        Ok(keep) => keep,
        Err(payload) => {
            logger.error(&format!(
                "{} callback panicked: {}",
                kind,
                DisplayPanic(&*payload)
            ));
            true
        }
    }
}
