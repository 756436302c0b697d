use thiserror::Error;

/// Failures raised by catalog lookups and mutations.
#[derive(Error, Debug)]
pub enum VfsError {
    #[error("No such path: {0}")]
    NotFound(String),

    #[error("Not a plain file: {0}")]
    NotAPlainFile(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Path already exists: {0}")]
    AlreadyExists(String),

    #[error("Illegal file name: {0}")]
    NameNotAllowed(String),

    #[error("Permission denied: {0}")]
    AccessDenied(String),
}

impl VfsError {
    pub fn to_ftp_response(&self) -> String {
        match self {
            VfsError::NotFound(_) => "550 File not found.".to_string(),
            VfsError::NotAPlainFile(_) => "550 Not a plain file.".to_string(),
            VfsError::NotADirectory(_) => "550 Not a directory.".to_string(),
            VfsError::AlreadyExists(_) => "553 File already exists.".to_string(),
            VfsError::NameNotAllowed(_) => "553 File name not allowed.".to_string(),
            VfsError::AccessDenied(_) => "530 Access denied.".to_string(),
        }
    }
}
