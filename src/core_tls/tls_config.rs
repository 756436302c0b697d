use crate::core_tls::error::TlsError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Whether AUTH TLS and PROT P are offered at all.
    pub enabled: bool,

    /// Server certificate chain, PEM.
    pub cert_file: PathBuf,

    /// Server private key, PEM (PKCS#8 or RSA).
    pub key_file: PathBuf,

    /// CA bundle used to verify storage nodes that speak TLS on their
    /// control link. Required when any node has `tls = true`.
    pub node_ca_file: Option<PathBuf>,

    /// When set, RETR/STOR are refused unless the session negotiated an
    /// encrypted data channel with PROT P.
    pub require_data_protection: bool,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cert_file: PathBuf::from("etc/ssl/cert.pem"),
            key_file: PathBuf::from("etc/ssl/key.pem"),
            node_ca_file: None,
            require_data_protection: false,
        }
    }
}

impl TlsConfig {
    /// Checks that every file the configuration points at exists.
    pub fn validate(&self) -> Result<(), TlsError> {
        if self.enabled {
            if !self.cert_file.exists() {
                return Err(TlsError::CertificateLoadError(format!(
                    "Certificate file not found: {:?}",
                    self.cert_file
                )));
            }

            if !self.key_file.exists() {
                return Err(TlsError::PrivateKeyLoadError(format!(
                    "Private key file not found: {:?}",
                    self.key_file
                )));
            }
        }

        if let Some(ca) = &self.node_ca_file {
            if !ca.exists() {
                return Err(TlsError::CertificateLoadError(format!(
                    "Node CA file not found: {:?}",
                    ca
                )));
            }
        }

        Ok(())
    }
}
