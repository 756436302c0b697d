use thiserror::Error;

use crate::core_node::error::NodeError;
use crate::core_tls::TlsError;
use crate::core_vfs::VfsError;

/// Failures of the data-channel negotiation state machine. Every variant
/// maps onto exactly one control-channel reply; nothing here is retried.
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Malformed argument: {0}")]
    SyntaxError(String),

    #[error("Command out of sequence: {0}")]
    SequenceError(String),

    #[error("No data channel negotiated")]
    NotNegotiated,

    #[error("Passive port pool exhausted")]
    NoPortsAvailable,

    #[error("Failed to bind passive socket: {0}")]
    BindError(String),

    #[error("Data connection failed: {0}")]
    ConnectFailed(String),

    #[error("Timed out waiting for {0}")]
    TimeoutError(&'static str),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("File name not allowed: {0}")]
    NameNotAllowed(String),

    #[error("No such file: {0}")]
    NotFound(String),

    #[error("Not a plain file: {0}")]
    NotAPlainFile(String),

    #[error(transparent)]
    Tls(#[from] TlsError),

    #[error(transparent)]
    Node(#[from] NodeError),
}

impl From<VfsError> for ChannelError {
    fn from(err: VfsError) -> Self {
        match err {
            VfsError::NotFound(p) => ChannelError::NotFound(p),
            VfsError::NotAPlainFile(p) => ChannelError::NotAPlainFile(p),
            VfsError::NotADirectory(p) => ChannelError::NotFound(p),
            VfsError::AlreadyExists(p) => ChannelError::NameNotAllowed(p),
            VfsError::NameNotAllowed(p) => ChannelError::NameNotAllowed(p),
            VfsError::AccessDenied(p) => ChannelError::AccessDenied(p),
        }
    }
}

impl ChannelError {
    /// Maps the failure onto the control-channel reply sent to the client.
    pub fn to_ftp_response(&self) -> String {
        match self {
            ChannelError::SyntaxError(_) => {
                "501 Syntax error in parameters or arguments.".to_string()
            }
            ChannelError::SequenceError(msg) => format!("503 {}.", msg),
            ChannelError::NotNegotiated => "503 Use PORT, PASV or PRET first.".to_string(),
            ChannelError::NoPortsAvailable => {
                "425 No free passive port available; try again later.".to_string()
            }
            ChannelError::BindError(_) => "550 Failed to open passive socket.".to_string(),
            ChannelError::ConnectFailed(_) => "425 Can't open data connection.".to_string(),
            ChannelError::TimeoutError(what) => format!("425 Timed out waiting for {}.", what),
            ChannelError::AccessDenied(_) => "530 Access denied.".to_string(),
            ChannelError::NameNotAllowed(_) => "553 File name not allowed.".to_string(),
            ChannelError::NotFound(_) => "550 File not found.".to_string(),
            ChannelError::NotAPlainFile(_) => "550 Not a plain file.".to_string(),
            ChannelError::Tls(e) => e.to_ftp_response(),
            ChannelError::Node(e) => e.to_ftp_response(),
        }
    }
}
