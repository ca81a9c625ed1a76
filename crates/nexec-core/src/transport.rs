//! Transport seam.
//!
//! The engine never speaks a wire protocol itself; it hands opaque
//! [`Request`]s to a [`Transport`] and gets back a [`RawOutcome`] that the
//! classifier interprets. Connection management, TLS and encoding all live
//! behind this trait.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::node::Node;
use crate::request::{ChunkInfo, Request};

/// Failure below the application layer: the node never produced a
/// well-formed reply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connection refused: {0}")]
    ConnectionRefused(String),
    #[error("timed out waiting for node")]
    Timeout,
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("stream closed by peer")]
    Closed,
    #[error("transport error: {0}")]
    Other(String),
}

/// Application status carried by a well-formed reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// Request processed; payload holds the result.
    Ok,
    /// Accepted, but the result is not available yet.
    Pending,
    /// Node cannot serve the request right now (busy, not active).
    Busy(String),
    /// Request failed validation.
    Invalid(String),
    /// Caller is not allowed to perform the request.
    Unauthorized(String),
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Ok => write!(f, "OK"),
            Status::Pending => write!(f, "PENDING"),
            Status::Busy(msg) => write!(f, "BUSY ({})", msg),
            Status::Invalid(msg) => write!(f, "INVALID ({})", msg),
            Status::Unauthorized(msg) => write!(f, "UNAUTHORIZED ({})", msg),
        }
    }
}

/// What one send produced, before classification.
#[derive(Debug, Clone, PartialEq)]
pub enum RawOutcome {
    Reply { status: Status, payload: Bytes },
    Transport(TransportError),
}

impl RawOutcome {
    pub fn ok(payload: impl Into<Bytes>) -> Self {
        RawOutcome::Reply {
            status: Status::Ok,
            payload: payload.into(),
        }
    }

    pub fn pending() -> Self {
        RawOutcome::Reply {
            status: Status::Pending,
            payload: Bytes::new(),
        }
    }

    pub fn busy(msg: impl Into<String>) -> Self {
        RawOutcome::Reply {
            status: Status::Busy(msg.into()),
            payload: Bytes::new(),
        }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        RawOutcome::Reply {
            status: Status::Invalid(msg.into()),
            payload: Bytes::new(),
        }
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        RawOutcome::Reply {
            status: Status::Unauthorized(msg.into()),
            payload: Bytes::new(),
        }
    }
}

impl From<TransportError> for RawOutcome {
    fn from(e: TransportError) -> Self {
        RawOutcome::Transport(e)
    }
}

/// One raw item delivered on a stream. Items of a chunked message carry
/// their [`ChunkInfo`].
#[derive(Debug, Clone, PartialEq)]
pub struct StreamItem {
    pub chunk: Option<ChunkInfo>,
    pub payload: Bytes,
}

impl StreamItem {
    pub fn single(payload: impl Into<Bytes>) -> Self {
        Self {
            chunk: None,
            payload: payload.into(),
        }
    }
}

pub type ItemStream = BoxStream<'static, Result<StreamItem, TransportError>>;

/// Sends requests to nodes. Implementations own connections and encoding.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Perform exactly one network call against `node`.
    async fn send(&self, node: &Node, request: &Request) -> RawOutcome;

    /// Open a long-lived stream against `node`. Dropping the returned
    /// stream cancels the call.
    async fn open_stream(&self, node: &Node, request: &Request)
        -> Result<ItemStream, TransportError>;
}
