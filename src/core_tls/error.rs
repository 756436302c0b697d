use thiserror::Error;

#[derive(Error, Debug)]
pub enum TlsError {
    #[error("Failed to load SSL certificate: {0}")]
    CertificateLoadError(String),

    #[error("Failed to load SSL private key: {0}")]
    PrivateKeyLoadError(String),

    #[error("TLS configuration error: {0}")]
    TlsConfigError(String),

    #[error("TLS handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("TLS not configured")]
    TlsNotConfigured,
}

impl TlsError {
    /// Maps the failure onto the control-channel reply sent to the client.
    pub fn to_ftp_response(&self) -> String {
        match self {
            TlsError::TlsNotConfigured => {
                "500 TLS is not configured on this server.".to_string()
            }
            TlsError::HandshakeFailed(_) => "425 TLS handshake failed.".to_string(),
            _ => "451 Requested action aborted. Local error in processing.".to_string(),
        }
    }
}
