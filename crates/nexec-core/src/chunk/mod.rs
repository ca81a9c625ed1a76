//! Payload chunking.
//!
//! Splits an oversized logical request into ordered sub-requests sharing
//! one [`LogicalRequestId`](crate::request::LogicalRequestId), submits them
//! one at a time through the executor, and on the receiving side puts
//! chunked stream items back together.

mod assemble;
mod bitmap;
mod plan;
mod submit;

pub use assemble::{AssembleError, ChunkAssembler, Message, DEFAULT_MAX_PENDING};
pub use bitmap::ChunkBitmap;
pub use plan::{plan, required_chunks, Chunk, ChunkLimits, ChunkPlan, PlanError};
pub use submit::ChunkedError;
