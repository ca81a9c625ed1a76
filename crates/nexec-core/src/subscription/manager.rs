//! Opening subscriptions and running their delivery tasks.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::StreamExt;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::chunk::{ChunkAssembler, Message};
use crate::node::NodeDirectory;
use crate::request::Request;
use crate::transport::{ItemStream, Transport};

use super::error::SubscribeError;
use super::handle::{Shared, SubscriptionHandle, SubscriptionId};

type Registry = Arc<Mutex<HashMap<SubscriptionId, SubscriptionHandle>>>;

fn lock(registry: &Registry) -> MutexGuard<'_, HashMap<SubscriptionId, SubscriptionHandle>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Opens streams through a [`Transport`] and tracks every live subscription.
pub struct SubscriptionManager<T> {
    transport: Arc<T>,
    directory: Arc<NodeDirectory>,
    registry: Registry,
    next_id: AtomicU64,
    seed: Option<u64>,
}

impl<T: Transport> SubscriptionManager<T> {
    pub fn new(transport: Arc<T>, directory: Arc<NodeDirectory>) -> Self {
        Self {
            transport,
            directory,
            registry: Arc::default(),
            next_id: AtomicU64::new(1),
            seed: None,
        }
    }

    /// Make node choice reproducible.
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Subscriptions whose delivery task is still running.
    pub fn active_count(&self) -> usize {
        lock(&self.registry).len()
    }

    /// Handles of every live subscription.
    pub fn active(&self) -> Vec<SubscriptionHandle> {
        lock(&self.registry).values().cloned().collect()
    }

    /// Open a stream for `request` on one node and start delivering.
    ///
    /// `on_item` receives complete messages in stream order, one at a time.
    /// `on_error` runs at most once, when the stream fails before the
    /// caller unsubscribed. A stream that simply ends calls neither.
    pub async fn subscribe<I, E>(
        &self,
        request: Request,
        on_item: I,
        on_error: E,
    ) -> Result<SubscriptionHandle, SubscribeError>
    where
        I: FnMut(Message) + Send + 'static,
        E: FnOnce(SubscribeError) + Send + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let node = {
            let mut rng = match self.seed {
                Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(id.0)),
                None => StdRng::from_entropy(),
            };
            self.directory.pick_node(&HashSet::new(), &mut rng)?
        };

        let stream = match self.transport.open_stream(&node, &request).await {
            Ok(stream) => {
                node.health().record_success();
                stream
            }
            Err(source) => {
                node.health().record_failure();
                warn!(node = %node.id(), "failed to open subscription: {}", source);
                return Err(SubscribeError::Open {
                    node: node.id().clone(),
                    source,
                });
            }
        };

        let shared = Arc::new(Shared::new(id, node.id().clone()));
        let handle = SubscriptionHandle {
            shared: Arc::clone(&shared),
        };
        lock(&self.registry).insert(id, handle.clone());
        info!(subscription = %id, node = %node.id(), request = %request.id(), "subscription opened");

        tokio::spawn(deliver(
            shared,
            stream,
            Arc::clone(&self.registry),
            on_item,
            on_error,
        ));
        Ok(handle)
    }

    /// Unsubscribe every live subscription. Returns how many were cancelled
    /// by this call.
    pub fn close_all(&self) -> usize {
        let handles = self.active();
        let cancelled = handles.iter().filter(|h| h.unsubscribe()).count();
        if cancelled > 0 {
            info!(cancelled, "closed subscriptions");
        }
        cancelled
    }
}

/// Untracks the subscription and marks it finished when the task exits,
/// including by panic in a callback.
struct Exit {
    shared: Arc<Shared>,
    registry: Registry,
}

impl Drop for Exit {
    fn drop(&mut self) {
        lock(&self.registry).remove(&self.shared.id);
        self.shared.finished.set();
        debug!(subscription = %self.shared.id, "subscription ended");
    }
}

async fn deliver<I, E>(
    shared: Arc<Shared>,
    mut stream: ItemStream,
    registry: Registry,
    mut on_item: I,
    on_error: E,
) where
    I: FnMut(Message) + Send + 'static,
    E: FnOnce(SubscribeError) + Send + 'static,
{
    let _exit = Exit {
        shared: Arc::clone(&shared),
        registry,
    };
    let mut assembler = ChunkAssembler::new();
    let mut delivered = 0u64;

    let failure = loop {
        let next = tokio::select! {
            biased;
            _ = shared.token.cancelled() => break None,
            next = stream.next() => next,
        };
        match next {
            None => break None,
            Some(Err(e)) => break Some(SubscribeError::Stream(e)),
            Some(Ok(item)) => match assembler.push(item) {
                Ok(Some(message)) => {
                    if !shared.deliver(|| on_item(message)) {
                        break None;
                    }
                    delivered += 1;
                }
                Ok(None) => {}
                Err(e) => break Some(e.into()),
            },
        }
    };
    drop(stream);

    debug!(subscription = %shared.id, delivered, pending = assembler.pending(), "delivery stopped");
    if let Some(err) = failure {
        warn!(subscription = %shared.id, node = %shared.node, "subscription failed: {}", err);
        shared.deliver(move || on_error(err));
    }
}
