//! Submitting a planned payload chunk by chunk.

use bytes::Bytes;
use tracing::{info, warn};

use crate::engine::{CancelToken, Completion, ExecuteError, Executor};
use crate::request::{LogicalRequestId, Request};
use crate::transport::Transport;

use super::plan::{plan, PlanError};

/// Failure of a chunked submission.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChunkedError {
    /// The payload could not be planned; nothing was sent.
    #[error(transparent)]
    Plan(#[from] PlanError),
    /// A chunk failed after `completed` earlier chunks succeeded. The
    /// remaining chunks were not submitted.
    #[error("chunk {} of {total} failed after {completed} succeeded", .completed + 1)]
    Partial {
        completed: usize,
        total: usize,
        responses: Vec<Completion>,
        #[source]
        source: ExecuteError,
    },
}

impl ChunkedError {
    /// Chunks that went through before the failure.
    pub fn completed(&self) -> usize {
        match self {
            ChunkedError::Plan(_) => 0,
            ChunkedError::Partial { completed, .. } => *completed,
        }
    }
}

impl<T: Transport> Executor<T> {
    /// Plan `payload` under the configured chunk limits and submit it under
    /// a freshly generated logical id.
    pub async fn plan_and_execute(
        &self,
        payload: impl Into<Bytes>,
    ) -> Result<Vec<Completion>, ChunkedError> {
        let id = LogicalRequestId::generate(&mut self.rng());
        self.plan_and_execute_with(id, payload.into(), &CancelToken::new())
            .await
    }

    /// Submit every chunk of `payload` in index order, one full execution
    /// per chunk. Chunk `i + 1` is sent only after chunk `i` succeeded.
    pub async fn plan_and_execute_with(
        &self,
        id: LogicalRequestId,
        payload: Bytes,
        cancel: &CancelToken,
    ) -> Result<Vec<Completion>, ChunkedError> {
        let plan = plan(&payload, id, self.settings().chunking)?;
        let total = plan.total();
        info!(request = %id, size = payload.len(), chunks = total, "submitting chunked request");

        let mut responses = Vec::with_capacity(total);
        for chunk in plan.into_chunks() {
            let request: Request = chunk.into_request();
            match self.execute_cancellable(&request, cancel).await {
                Ok(done) => responses.push(done),
                Err(source) => {
                    let completed = responses.len();
                    warn!(
                        request = %id,
                        completed,
                        total,
                        "chunked request aborted: {}",
                        source
                    );
                    return Err(ChunkedError::Partial {
                        completed,
                        total,
                        responses,
                        source,
                    });
                }
            }
        }
        Ok(responses)
    }
}
