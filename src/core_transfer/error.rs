use crate::core_accounting::AccountError;
use crate::core_channel::ChannelError;
use crate::core_node::NodeError;
use crate::core_vfs::VfsError;
use thiserror::Error;

/// Everything that can stop a RETR or STOR before, during, or after the
/// remote byte exchange. Variants wrap the lower layers so one mapping
/// produces the control-channel reply.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Encrypted data channel required")]
    PolicyViolation,

    #[error("{0} is not implemented")]
    NotImplemented(&'static str),

    #[error(transparent)]
    Vfs(#[from] VfsError),

    #[error(transparent)]
    Account(#[from] AccountError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Node(#[from] NodeError),
}

impl TransferError {
    pub fn to_ftp_response(&self) -> String {
        match self {
            TransferError::PolicyViolation => {
                "530 Encrypted data channel required; issue PROT P first.".to_string()
            }
            TransferError::NotImplemented(what) => format!("502 {} not implemented.", what),
            TransferError::Vfs(e) => e.to_ftp_response(),
            TransferError::Account(e) => e.to_ftp_response(),
            TransferError::Channel(e) => e.to_ftp_response(),
            TransferError::Node(e) => e.to_ftp_response(),
        }
    }
}
