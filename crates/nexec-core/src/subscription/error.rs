use crate::chunk::AssembleError;
use crate::node::{NoAvailableNode, NodeId};
use crate::transport::TransportError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscribeError {
    #[error(transparent)]
    NoAvailableNode(#[from] NoAvailableNode),
    /// The stream could not be established.
    #[error("failed to open stream on node {node}")]
    Open {
        node: NodeId,
        #[source]
        source: TransportError,
    },
    /// The stream failed after it was established.
    #[error("stream failed: {0}")]
    Stream(TransportError),
    #[error("bad chunked message: {0}")]
    Assembly(#[from] AssembleError),
}
