use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use log::info;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use rustls::RootCertStore;
use tokio::net::TcpStream;
use tokio_rustls::{client, server, TlsAcceptor, TlsConnector};

use crate::core_tls::error::TlsError;
use crate::core_tls::tls_config::TlsConfig;

/// Holds the optional TLS material used to upgrade control and data sockets
/// on demand. Constructed once at startup and passed by reference into the
/// negotiator and the node links; never global state.
pub struct ChannelSecurity {
    acceptor: Option<TlsAcceptor>,
    connector: Option<TlsConnector>,
}

impl ChannelSecurity {
    /// Builds the security context from configuration. A disabled TLS
    /// section yields a context where every handshake attempt fails with
    /// `TlsNotConfigured`; it never falls back to plaintext silently.
    pub fn from_config(config: &TlsConfig) -> Result<Self, TlsError> {
        let acceptor = if config.enabled {
            let certs = load_certs(&config.cert_file)?;
            let key = load_private_key(&config.key_file)?;
            let server_config = rustls::ServerConfig::builder()
                .with_no_client_auth()
                .with_single_cert(certs, key)
                .map_err(|e| TlsError::TlsConfigError(e.to_string()))?;
            info!("TLS enabled, certificate loaded from {:?}", config.cert_file);
            Some(TlsAcceptor::from(Arc::new(server_config)))
        } else {
            None
        };

        let connector = match &config.node_ca_file {
            Some(ca_file) => {
                let mut roots = RootCertStore::empty();
                for cert in load_certs(ca_file)? {
                    roots
                        .add(cert)
                        .map_err(|e| TlsError::CertificateLoadError(e.to_string()))?;
                }
                let client_config = rustls::ClientConfig::builder()
                    .with_root_certificates(roots)
                    .with_no_client_auth();
                Some(TlsConnector::from(Arc::new(client_config)))
            }
            None => None,
        };

        Ok(Self {
            acceptor,
            connector,
        })
    }

    /// Context with no TLS material at all.
    pub fn disabled() -> Self {
        Self {
            acceptor: None,
            connector: None,
        }
    }

    pub fn has_tls(&self) -> bool {
        self.acceptor.is_some()
    }

    /// Performs the server-role handshake over an established socket. Used
    /// for the AUTH TLS control upgrade and for encrypted data connections;
    /// the master is the TLS server on the data channel no matter which side
    /// opened the TCP connection.
    pub async fn accept(
        &self,
        stream: TcpStream,
    ) -> Result<server::TlsStream<TcpStream>, TlsError> {
        let acceptor = self.acceptor.as_ref().ok_or(TlsError::TlsNotConfigured)?;
        acceptor
            .accept(stream)
            .await
            .map_err(|e| TlsError::HandshakeFailed(e.to_string()))
    }

    /// Performs the client-role handshake, used on TLS-flagged node links.
    pub async fn connect(
        &self,
        server_name: &str,
        stream: TcpStream,
    ) -> Result<client::TlsStream<TcpStream>, TlsError> {
        let connector = self.connector.as_ref().ok_or(TlsError::TlsNotConfigured)?;
        let name = ServerName::try_from(server_name.to_string())
            .map_err(|e| TlsError::TlsConfigError(format!("bad server name: {}", e)))?;
        connector
            .connect(name, stream)
            .await
            .map_err(|e| TlsError::HandshakeFailed(e.to_string()))
    }
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let file = File::open(path)
        .map_err(|e| TlsError::CertificateLoadError(format!("{:?}: {}", path, e)))?;
    let mut reader = BufReader::new(file);
    let certs: Result<Vec<_>, _> = rustls_pemfile::certs(&mut reader).collect();
    let certs = certs.map_err(|e| TlsError::CertificateLoadError(e.to_string()))?;
    if certs.is_empty() {
        return Err(TlsError::CertificateLoadError(format!(
            "no certificates in {:?}",
            path
        )));
    }
    Ok(certs)
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    let file = File::open(path)
        .map_err(|e| TlsError::PrivateKeyLoadError(format!("{:?}: {}", path, e)))?;
    let mut reader = BufReader::new(file);
    if let Some(key) = rustls_pemfile::pkcs8_private_keys(&mut reader)
        .next()
        .transpose()
        .map_err(|e| TlsError::PrivateKeyLoadError(e.to_string()))?
    {
        return Ok(PrivateKeyDer::from(key));
    }

    // PKCS#8 not found, retry the file as an RSA key.
    let file = File::open(path)
        .map_err(|e| TlsError::PrivateKeyLoadError(format!("{:?}: {}", path, e)))?;
    let mut reader = BufReader::new(file);
    let key = rustls_pemfile::rsa_private_keys(&mut reader)
        .next()
        .transpose()
        .map_err(|e| TlsError::PrivateKeyLoadError(e.to_string()))?;
    match key {
        Some(key) => Ok(PrivateKeyDer::from(key)),
        None => Err(TlsError::PrivateKeyLoadError(format!(
            "no private key in {:?}",
            path
        ))),
    }
}
