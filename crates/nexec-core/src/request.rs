//! Logical request identifiers, chunk metadata and the physical request
//! handed to a node.
//!
//! A caller-visible operation is named by a [`LogicalRequestId`]. When the
//! payload is too large for one message it is split into chunks that all
//! carry the same id plus a [`ChunkInfo`] giving their position.

use std::fmt;

use bytes::Bytes;
use rand::Rng;

/// Identifies one caller-visible operation. Stable across every chunk
/// produced for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogicalRequestId([u8; 16]);

impl LogicalRequestId {
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Draw a fresh id from the given random source.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 16];
        rng.fill(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse the 32-character hex form produced by [`Self::to_hex`].
    pub fn from_hex(s: &str) -> Option<Self> {
        let raw = hex::decode(s).ok()?;
        let bytes: [u8; 16] = raw.try_into().ok()?;
        Some(Self(bytes))
    }
}

impl fmt::Display for LogicalRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Position of one chunk within a chunked logical request.
///
/// For a given `initial_request_id` the indices form the contiguous range
/// `[0, total)`; `total` is fixed when the payload is planned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkInfo {
    pub initial_request_id: LogicalRequestId,
    pub total: u32,
    pub index: u32,
}

impl ChunkInfo {
    pub fn is_last(&self) -> bool {
        self.index + 1 == self.total
    }
}

/// One physical request sent to a node.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    id: LogicalRequestId,
    chunk: Option<ChunkInfo>,
    payload: Bytes,
}

impl Request {
    /// A single, unchunked request.
    pub fn new(id: LogicalRequestId, payload: impl Into<Bytes>) -> Self {
        Self {
            id,
            chunk: None,
            payload: payload.into(),
        }
    }

    /// One chunk of a chunked logical request.
    pub fn for_chunk(info: ChunkInfo, payload: impl Into<Bytes>) -> Self {
        Self {
            id: info.initial_request_id,
            chunk: Some(info),
            payload: payload.into(),
        }
    }

    pub fn id(&self) -> LogicalRequestId {
        self.id
    }

    pub fn chunk_info(&self) -> Option<ChunkInfo> {
        self.chunk
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Key a node can use to drop duplicate submissions:
    /// `<id>` for plain requests, `<id>/<index>` for chunks.
    pub fn idempotency_key(&self) -> String {
        match self.chunk {
            Some(info) => format!("{}/{}", self.id, info.index),
            None => self.id.to_hex(),
        }
    }
}
