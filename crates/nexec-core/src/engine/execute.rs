//! The retry loop: pick node, send, classify, retry / fail over / stop.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use bytes::Bytes;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::node::{NodeDirectory, NodeHandle, NodeId};
use crate::request::{ChunkInfo, Request};
use crate::retry::{classify, AttemptBudget, Failure, FailureKind, Response, RetryNodePolicy};
use crate::transport::{RawOutcome, Transport, TransportError};

use super::cancel::CancelToken;
use super::error::ExecuteError;
use super::settings::ExecutorSettings;

/// Successful end of one execution.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// Node that produced the success reply.
    pub node: NodeId,
    /// Attempts used, including the successful one.
    pub attempts: u32,
    pub chunk: Option<ChunkInfo>,
    pub payload: Bytes,
}

/// Executes requests against a node network through a [`Transport`].
///
/// Cheap to share behind an `Arc`; every call to [`Executor::execute`] is an
/// independent execution with its own budget and exclusion set.
pub struct Executor<T> {
    transport: Arc<T>,
    directory: Arc<NodeDirectory>,
    settings: ExecutorSettings,
    executions: AtomicU64,
}

impl<T: Transport> Executor<T> {
    pub fn new(transport: Arc<T>, directory: Arc<NodeDirectory>, settings: ExecutorSettings) -> Self {
        Self {
            transport,
            directory,
            settings,
            executions: AtomicU64::new(0),
        }
    }

    /// Build an executor and its node directory from the client configuration.
    pub fn from_config(transport: Arc<T>, cfg: &ClientConfig) -> Result<Self> {
        let directory = Arc::new(NodeDirectory::from_config(cfg)?);
        Ok(Self::new(transport, directory, ExecutorSettings::from_config(cfg)?))
    }

    pub fn directory(&self) -> &Arc<NodeDirectory> {
        &self.directory
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// Random source for one execution: derived from the configured seed so
    /// runs are reproducible, or from OS entropy.
    pub fn rng(&self) -> StdRng {
        let n = self.executions.fetch_add(1, Ordering::Relaxed);
        match self.settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(n)),
            None => StdRng::from_entropy(),
        }
    }

    /// Execute with a fresh budget from the retry policy.
    pub async fn execute(&self, request: &Request) -> Result<Completion, ExecuteError> {
        self.execute_cancellable(request, &CancelToken::new()).await
    }

    /// Execute; `cancel` may stop the execution between attempts.
    pub async fn execute_cancellable(
        &self,
        request: &Request,
        cancel: &CancelToken,
    ) -> Result<Completion, ExecuteError> {
        let mut budget = self.settings.retry.budget();
        let mut rng = self.rng();
        self.execute_with(request, &mut budget, cancel, &mut rng).await
    }

    /// The retry loop proper.
    ///
    /// Each attempt performs exactly one network call. `ServerError` excludes
    /// the node for the rest of this execution; when every node has been
    /// excluded the set is cleared so small networks can still be retried.
    /// `Retry` keeps or rotates the node per [`RetryNodePolicy`].
    pub async fn execute_with(
        &self,
        request: &Request,
        budget: &mut AttemptBudget,
        cancel: &CancelToken,
        rng: &mut StdRng,
    ) -> Result<Completion, ExecuteError> {
        let deadline = self.settings.request_timeout.map(|t| Instant::now() + t);
        let mut excluded: HashSet<NodeId> = HashSet::new();
        let mut sticky: Option<NodeHandle> = None;

        loop {
            if cancel.is_cancelled() {
                return Err(ExecuteError::Cancelled {
                    attempts: budget.attempts_used(),
                });
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(ExecuteError::Timeout {
                    attempts: budget.attempts_used(),
                    last: budget.take_last_failure(),
                });
            }
            let Some(attempt) = budget.begin_attempt() else {
                return Err(ExecuteError::MaxAttemptsExceeded {
                    attempts: budget.attempts_used(),
                    last: budget.take_last_failure(),
                });
            };

            let node = match sticky.take() {
                Some(node) if self.directory.contains(node.id()) => node,
                _ => self.select_node(&mut excluded, rng)?,
            };
            debug!(
                node = %node.id(),
                attempt,
                request = %request.idempotency_key(),
                "sending request"
            );

            let outcome = self.send(&node, request).await;
            let response = classify(&outcome);
            let state = response.state();

            match response {
                Response::Success(payload) => {
                    node.health().record_success();
                    debug!(node = %node.id(), attempt, "request succeeded");
                    return Ok(Completion {
                        node: node.id().clone(),
                        attempts: attempt,
                        chunk: request.chunk_info(),
                        payload,
                    });
                }
                Response::RequestError(status) => {
                    node.health().record_success();
                    warn!(node = %node.id(), attempt, "request rejected: {}", status);
                    return Err(ExecuteError::Request(Failure {
                        node: node.id().clone(),
                        attempt,
                        kind: FailureKind::Status(status),
                    }));
                }
                Response::ServerError(kind) => {
                    node.health().record_failure();
                    warn!(
                        node = %node.id(),
                        attempt,
                        "problem submitting request, retrying with another node: {}",
                        kind
                    );
                    excluded.insert(node.id().clone());
                    budget.record_failure(Failure {
                        node: node.id().clone(),
                        attempt,
                        kind,
                    });
                }
                Response::Retry(status) => {
                    node.health().record_success();
                    debug!(node = %node.id(), attempt, "result not ready: {}", status);
                    match self.settings.retry.node_policy {
                        RetryNodePolicy::SameNode => sticky = Some(Arc::clone(&node)),
                        RetryNodePolicy::Rotate => {
                            excluded.insert(node.id().clone());
                        }
                    }
                    budget.record_failure(Failure {
                        node: node.id().clone(),
                        attempt,
                        kind: FailureKind::Status(status),
                    });
                }
            }

            // Exhaustion wins over a deadline or cancel that lands during the last send.
            if budget.is_exhausted() {
                return Err(ExecuteError::MaxAttemptsExceeded {
                    attempts: budget.attempts_used(),
                    last: budget.take_last_failure(),
                });
            }
            let delay = self.settings.retry.backoff.delay(attempt);
            debug!(node = %node.id(), attempt, ?delay, %state, "backing off");
            if !cancel.sleep(delay).await {
                return Err(ExecuteError::Cancelled {
                    attempts: budget.attempts_used(),
                });
            }
        }
    }

    fn select_node(
        &self,
        excluded: &mut HashSet<NodeId>,
        rng: &mut StdRng,
    ) -> Result<NodeHandle, ExecuteError> {
        match self.directory.pick_node(excluded, rng) {
            Ok(node) => Ok(node),
            Err(_) if !excluded.is_empty() => {
                debug!(
                    excluded = excluded.len(),
                    "every node already tried; clearing exclusions"
                );
                excluded.clear();
                Ok(self.directory.pick_node(excluded, rng)?)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn send(&self, node: &NodeHandle, request: &Request) -> RawOutcome {
        let call = self.transport.send(node, request);
        match self.settings.attempt_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(outcome) => outcome,
                Err(_) => RawOutcome::Transport(TransportError::Timeout),
            },
            None => call.await,
        }
    }
}
