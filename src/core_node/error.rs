use thiserror::Error;

/// Failures of the master-side storage node contract.
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("No storage node available")]
    NoAvailableNode,

    #[error("Node {node} unreachable: {message}")]
    Unreachable { node: String, message: String },

    #[error("Remote call to node {node} timed out")]
    CallTimeout { node: String },

    #[error("Remote call to node {node} failed: {message}")]
    RemoteCallFailure { node: String, message: String },

    #[error("Node {node} desynchronized: {message}")]
    Desync { node: String, message: String },

    #[error("Node {node} refused the request: {message}")]
    Refused { node: String, message: String },

    #[error("Node {node} has no file {path}")]
    RemoteFileMissing { node: String, path: String },
}

impl NodeError {
    /// True for transport-level failures after which the node should be
    /// considered unavailable until the monitor sees it again.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            NodeError::Unreachable { .. }
                | NodeError::CallTimeout { .. }
                | NodeError::RemoteCallFailure { .. }
        )
    }

    /// Maps the failure onto the control-channel reply sent to the client.
    pub fn to_ftp_response(&self) -> String {
        match self {
            NodeError::NoAvailableNode => "530 No storage node available.".to_string(),
            NodeError::Unreachable { .. } => {
                "450 Storage node unavailable; try again later.".to_string()
            }
            NodeError::CallTimeout { .. } => "426 Storage node timed out.".to_string(),
            NodeError::RemoteCallFailure { .. } => {
                "426 Storage node communication failed.".to_string()
            }
            NodeError::Desync { .. } => {
                "426 Transfer failed; storage node desynchronized.".to_string()
            }
            NodeError::Refused { .. } => "450 Storage node refused the transfer.".to_string(),
            NodeError::RemoteFileMissing { .. } => {
                "550 File not found on storage node.".to_string()
            }
        }
    }
}
