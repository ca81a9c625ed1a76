//! One-stop client: an executor and a subscription manager over the same
//! transport and node directory.

use std::sync::Arc;

use anyhow::Result;
use bytes::Bytes;

use crate::chunk::{ChunkedError, Message};
use crate::config::ClientConfig;
use crate::engine::{CancelToken, Completion, ExecuteError, Executor};
use crate::node::NodeDirectory;
use crate::request::{LogicalRequestId, Request};
use crate::subscription::{SubscribeError, SubscriptionHandle, SubscriptionManager};
use crate::transport::Transport;

pub struct Client<T> {
    executor: Executor<T>,
    subscriptions: SubscriptionManager<T>,
}

impl<T: Transport> Client<T> {
    pub fn from_config(transport: Arc<T>, cfg: &ClientConfig) -> Result<Self> {
        cfg.validate()?;
        let executor = Executor::from_config(Arc::clone(&transport), cfg)?;
        let subscriptions =
            SubscriptionManager::new(transport, Arc::clone(executor.directory())).with_seed(cfg.seed);
        Ok(Self {
            executor,
            subscriptions,
        })
    }

    pub fn executor(&self) -> &Executor<T> {
        &self.executor
    }

    pub fn subscriptions(&self) -> &SubscriptionManager<T> {
        &self.subscriptions
    }

    pub fn directory(&self) -> &Arc<NodeDirectory> {
        self.executor.directory()
    }

    /// Fresh logical id from the client's random source.
    pub fn new_request_id(&self) -> LogicalRequestId {
        LogicalRequestId::generate(&mut self.executor.rng())
    }

    pub async fn execute(&self, request: &Request) -> Result<Completion, ExecuteError> {
        self.executor.execute(request).await
    }

    pub async fn execute_cancellable(
        &self,
        request: &Request,
        cancel: &CancelToken,
    ) -> Result<Completion, ExecuteError> {
        self.executor.execute_cancellable(request, cancel).await
    }

    /// Submit `payload`, chunked if it exceeds the configured chunk size.
    pub async fn submit(&self, payload: impl Into<Bytes>) -> Result<Vec<Completion>, ChunkedError> {
        self.executor.plan_and_execute(payload).await
    }

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
        self.subscriptions.subscribe(request, on_item, on_error).await
    }

    /// Cancel every live subscription. Returns how many were cancelled.
    pub fn close(&self) -> usize {
        self.subscriptions.close_all()
    }
}
