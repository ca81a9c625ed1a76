//! Caller-side handle of one subscription.

use std::cell::Cell;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::engine::CancelToken;
use crate::node::NodeId;

/// Registry key of a live subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(crate) u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

thread_local! {
    /// Depth of subscription callbacks running on this thread.
    static IN_CALLBACK: Cell<u32> = const { Cell::new(0) };
}

struct CallbackScope;

impl CallbackScope {
    fn enter() -> Self {
        IN_CALLBACK.with(|depth| depth.set(depth.get() + 1));
        CallbackScope
    }

    fn active() -> bool {
        IN_CALLBACK.with(|depth| depth.get() > 0)
    }
}

impl Drop for CallbackScope {
    fn drop(&mut self) {
        IN_CALLBACK.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// One-shot "set once, wait for it" flag.
#[derive(Debug, Default)]
pub(crate) struct Latch(CancelToken);

impl Latch {
    pub(crate) fn set(&self) {
        self.0.cancel();
    }

    pub(crate) fn is_set(&self) -> bool {
        self.0.is_cancelled()
    }

    pub(crate) async fn wait(&self) {
        self.0.cancelled().await
    }
}

/// State shared by the handle and the delivery task.
///
/// Every callback runs while holding `gate`, after checking `token`. An
/// unsubscribe flips `token` and then takes `gate` once, so it cannot
/// return while a callback that passed the check is still running.
/// Unsubscribes issued from inside any subscription callback skip the
/// wait: waiting there could block on the caller's own gate, or on a
/// subscription whose callback is waiting for the caller in turn.
pub(crate) struct Shared {
    pub(crate) id: SubscriptionId,
    pub(crate) node: NodeId,
    pub(crate) token: CancelToken,
    pub(crate) finished: Latch,
    gate: Mutex<()>,
}

impl Shared {
    pub(crate) fn new(id: SubscriptionId, node: NodeId) -> Self {
        Self {
            id,
            node,
            token: CancelToken::new(),
            finished: Latch::default(),
            gate: Mutex::new(()),
        }
    }

    fn gate(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` unless the subscription was cancelled. Returns false if cancelled.
    pub(crate) fn deliver<F: FnOnce()>(&self, f: F) -> bool {
        let _gate = self.gate();
        if self.token.is_cancelled() {
            return false;
        }
        let _scope = CallbackScope::enter();
        f();
        true
    }

    pub(crate) fn cancel(&self) -> bool {
        let first = self.token.cancel();
        if !CallbackScope::active() {
            // Wait out a callback that passed its check before the flip.
            drop(self.gate());
        }
        first
    }
}

/// Handle returned by [`SubscriptionManager::subscribe`](super::SubscriptionManager::subscribe).
///
/// Clones refer to the same subscription.
#[derive(Clone)]
pub struct SubscriptionHandle {
    pub(crate) shared: Arc<Shared>,
}

impl SubscriptionHandle {
    pub fn id(&self) -> SubscriptionId {
        self.shared.id
    }

    /// Node the stream was opened against.
    pub fn node(&self) -> &NodeId {
        &self.shared.node
    }

    /// Stop delivery. Returns true only for the call that cancelled.
    ///
    /// Once this returns, no new `on_item` or `on_error` call starts for
    /// this subscription, and one already running has finished. Called from
    /// inside a subscription callback (this one's or another's) it does not
    /// wait, so a callback of a different subscription may still be
    /// finishing when it returns.
    pub fn unsubscribe(&self) -> bool {
        let first = self.shared.cancel();
        if first {
            tracing::debug!(subscription = %self.shared.id, "unsubscribed");
        }
        first
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.token.is_cancelled()
    }

    /// True once the delivery task has exited.
    pub fn is_finished(&self) -> bool {
        self.shared.finished.is_set()
    }

    /// Wait until the delivery task has exited.
    pub async fn finished(&self) {
        self.shared.finished.wait().await
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.shared.id)
            .field("node", &self.shared.node)
            .field("cancelled", &self.is_cancelled())
            .field("finished", &self.is_finished())
            .finish()
    }
}
