//! Reassembly of chunked stream items.

use std::collections::{HashMap, VecDeque};

use bytes::{Bytes, BytesMut};

use crate::request::{ChunkInfo, LogicalRequestId};
use crate::transport::StreamItem;

use super::bitmap::ChunkBitmap;

/// One complete message delivered to a subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Logical id of a chunked message; `None` for plain items.
    pub id: Option<LogicalRequestId>,
    /// Number of chunks the message arrived in.
    pub chunks: u32,
    pub payload: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssembleError {
    #[error("chunk {index} out of range for message {id} with {total} chunks")]
    IndexOutOfRange {
        id: LogicalRequestId,
        index: u32,
        total: u32,
    },
    #[error("chunk of message {id} claims {got} chunks, earlier chunks claimed {expected}")]
    TotalMismatch {
        id: LogicalRequestId,
        expected: u32,
        got: u32,
    },
}

struct Pending {
    received: ChunkBitmap,
    parts: Vec<Bytes>,
}

/// Incomplete messages kept per assembler before the oldest is dropped.
pub const DEFAULT_MAX_PENDING: usize = 64;

/// Buffers chunks per logical id until every index has arrived, then emits
/// the joined message. Chunks may arrive in any order; repeats are dropped.
///
/// At most `max_pending` incomplete messages are held; starting another
/// one evicts the oldest, whose chunks are discarded.
pub struct ChunkAssembler {
    pending: HashMap<LogicalRequestId, Pending>,
    order: VecDeque<LogicalRequestId>,
    max_pending: usize,
}

impl Default for ChunkAssembler {
    fn default() -> Self {
        Self::with_max_pending(DEFAULT_MAX_PENDING)
    }
}

impl ChunkAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_pending(max_pending: usize) -> Self {
        Self {
            pending: HashMap::new(),
            order: VecDeque::new(),
            max_pending: max_pending.max(1),
        }
    }

    fn start(&mut self, id: LogicalRequestId, total: u32) -> &mut Pending {
        if !self.pending.contains_key(&id) {
            while self.pending.len() >= self.max_pending {
                let Some(oldest) = self.order.pop_front() else {
                    break;
                };
                if let Some(dropped) = self.pending.remove(&oldest) {
                    tracing::warn!(
                        message = %oldest,
                        received = dropped.received.count(),
                        total = dropped.received.total(),
                        "dropping incomplete chunked message"
                    );
                }
            }
            self.order.push_back(id);
        }
        self.pending.entry(id).or_insert_with(|| Pending {
            received: ChunkBitmap::new(total as usize),
            parts: vec![Bytes::new(); total as usize],
        })
    }

    /// Messages still waiting for chunks.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Feed one item. Returns the message once it is complete.
    pub fn push(&mut self, item: StreamItem) -> Result<Option<Message>, AssembleError> {
        let info = match item.chunk {
            Some(info) if info.total > 1 => info,
            Some(ChunkInfo {
                initial_request_id,
                total,
                index,
            }) => {
                if index >= total {
                    return Err(AssembleError::IndexOutOfRange {
                        id: initial_request_id,
                        index,
                        total,
                    });
                }
                return Ok(Some(Message {
                    id: Some(initial_request_id),
                    chunks: 1,
                    payload: item.payload,
                }));
            }
            None => {
                return Ok(Some(Message {
                    id: None,
                    chunks: 1,
                    payload: item.payload,
                }))
            }
        };

        let id = info.initial_request_id;
        if info.index >= info.total {
            return Err(AssembleError::IndexOutOfRange {
                id,
                index: info.index,
                total: info.total,
            });
        }
        let entry = self.start(id, info.total);
        let expected = entry.received.total();
        if expected != info.total as usize {
            return Err(AssembleError::TotalMismatch {
                id,
                expected: expected as u32,
                got: info.total,
            });
        }
        if !entry.received.set(info.index as usize) {
            tracing::debug!(message = %id, index = info.index, "duplicate chunk ignored");
            return Ok(None);
        }
        entry.parts[info.index as usize] = item.payload;
        if !entry.received.is_complete() {
            return Ok(None);
        }

        let Some(done) = self.pending.remove(&id) else {
            return Ok(None);
        };
        self.order.retain(|pending| *pending != id);
        let len = done.parts.iter().map(Bytes::len).sum();
        let mut joined = BytesMut::with_capacity(len);
        for part in &done.parts {
            joined.extend_from_slice(part);
        }
        Ok(Some(Message {
            id: Some(id),
            chunks: info.total,
            payload: joined.freeze(),
        }))
    }
}
