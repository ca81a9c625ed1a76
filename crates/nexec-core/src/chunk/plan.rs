//! Chunk planning.

use bytes::Bytes;

use crate::request::{ChunkInfo, LogicalRequestId, Request};

/// Size limits applied when planning chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLimits {
    /// Largest payload carried by one chunk, in bytes.
    pub max_chunk_size: usize,
    /// Most chunks one logical request may be split into.
    pub max_chunk_count: usize,
}

impl Default for ChunkLimits {
    fn default() -> Self {
        Self {
            max_chunk_size: 1024,
            max_chunk_count: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,
    #[error(
        "payload of {size} bytes requires {required} chunks of {chunk_size} bytes \
         but at most {max_chunks} are allowed"
    )]
    PayloadTooLarge {
        size: usize,
        chunk_size: usize,
        required: usize,
        max_chunks: usize,
    },
}

/// One planned chunk: its position and its slice of the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub info: ChunkInfo,
    pub payload: Bytes,
}

impl Chunk {
    pub fn into_request(self) -> Request {
        Request::for_chunk(self.info, self.payload)
    }
}

/// Ordered chunks of one logical request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    id: LogicalRequestId,
    chunks: Vec<Chunk>,
}

impl ChunkPlan {
    pub fn id(&self) -> LogicalRequestId {
        self.id
    }

    pub fn total(&self) -> usize {
        self.chunks.len()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn into_chunks(self) -> Vec<Chunk> {
        self.chunks
    }
}

/// Number of chunks needed for `len` bytes. An empty payload still takes one chunk.
pub fn required_chunks(len: usize, chunk_size: usize) -> usize {
    if len == 0 || chunk_size == 0 {
        return 1;
    }
    len / chunk_size + usize::from(len % chunk_size != 0)
}

/// Split `payload` into chunks of at most `limits.max_chunk_size` bytes.
///
/// Every chunk but the last is exactly `max_chunk_size` long, and the
/// chunks concatenate back to `payload`. Slices share the payload buffer.
pub fn plan(
    payload: &Bytes,
    id: LogicalRequestId,
    limits: ChunkLimits,
) -> Result<ChunkPlan, PlanError> {
    let size = limits.max_chunk_size;
    if size == 0 {
        return Err(PlanError::ZeroChunkSize);
    }
    let required = required_chunks(payload.len(), size);
    let too_large = PlanError::PayloadTooLarge {
        size: payload.len(),
        chunk_size: size,
        required,
        max_chunks: limits.max_chunk_count,
    };
    if required > limits.max_chunk_count {
        return Err(too_large);
    }
    let total = u32::try_from(required).map_err(|_| too_large)?;

    let chunks = (0..total)
        .map(|index| {
            let start = index as usize * size;
            let end = (start + size).min(payload.len());
            Chunk {
                info: ChunkInfo {
                    initial_request_id: id,
                    total,
                    index,
                },
                payload: payload.slice(start..end),
            }
        })
        .collect();

    Ok(ChunkPlan { id, chunks })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> LogicalRequestId {
        LogicalRequestId::from_bytes([7; 16])
    }

    fn limits(size: usize, count: usize) -> ChunkLimits {
        ChunkLimits {
            max_chunk_size: size,
            max_chunk_count: count,
        }
    }

    #[test]
    fn plan_9000_bytes_in_4096_chunks() {
        let payload = Bytes::from(vec![1u8; 9000]);
        let p = plan(&payload, id(), limits(4096, 20)).unwrap();
        let sizes: Vec<usize> = p.chunks().iter().map(|c| c.payload.len()).collect();
        assert_eq!(sizes, vec![4096, 4096, 808]);
        for (i, c) in p.chunks().iter().enumerate() {
            assert_eq!(c.info.total, 3);
            assert_eq!(c.info.index as usize, i);
            assert_eq!(c.info.initial_request_id, id());
        }
    }

    #[test]
    fn plan_preserves_bytes_and_sizes() {
        let payload: Bytes = (0u8..=255).cycle().take(10_007).collect::<Vec<u8>>().into();
        for size in [1, 7, 100, 1024, 10_006, 10_007, 20_000] {
            let p = plan(&payload, id(), limits(size, usize::MAX)).unwrap();
            assert_eq!(p.total(), (payload.len() + size - 1) / size);
            let mut joined = Vec::new();
            for (i, c) in p.chunks().iter().enumerate() {
                if i + 1 < p.total() {
                    assert_eq!(c.payload.len(), size);
                } else {
                    assert!(c.payload.len() <= size && !c.payload.is_empty());
                }
                joined.extend_from_slice(&c.payload);
            }
            assert_eq!(joined, payload);
        }
    }

    #[test]
    fn plan_exact_multiple() {
        let payload = Bytes::from(vec![0u8; 2048]);
        let p = plan(&payload, id(), limits(1024, 20)).unwrap();
        assert_eq!(p.total(), 2);
        assert!(p.chunks()[1].info.is_last());
    }

    #[test]
    fn empty_payload_is_one_empty_chunk() {
        let p = plan(&Bytes::new(), id(), limits(1024, 20)).unwrap();
        assert_eq!(p.total(), 1);
        assert_eq!(p.chunks()[0].info.total, 1);
        assert!(p.chunks()[0].payload.is_empty());
    }

    #[test]
    fn too_many_chunks_rejected() {
        let payload = Bytes::from(vec![0u8; 21 * 1024 + 1]);
        match plan(&payload, id(), limits(1024, 21)) {
            Err(PlanError::PayloadTooLarge {
                required,
                max_chunks,
                ..
            }) => {
                assert_eq!(required, 22);
                assert_eq!(max_chunks, 21);
            }
            other => panic!("expected PayloadTooLarge, got {other:?}"),
        }
    }

    #[test]
    fn zero_chunk_size_rejected() {
        assert_eq!(
            plan(&Bytes::from_static(b"abc"), id(), limits(0, 20)),
            Err(PlanError::ZeroChunkSize)
        );
    }

    #[test]
    fn chunk_into_request_carries_info() {
        let p = plan(&Bytes::from_static(b"abcdef"), id(), limits(4, 20)).unwrap();
        let reqs: Vec<Request> = p.into_chunks().into_iter().map(Chunk::into_request).collect();
        assert_eq!(reqs.len(), 2);
        assert_eq!(&reqs[1].payload()[..], b"ef");
        assert_eq!(reqs[1].chunk_info().map(|c| c.index), Some(1));
    }
}
