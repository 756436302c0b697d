// SSL/TLS support for rouillehubd

pub mod error;
pub mod security;
pub mod tls_config;

pub use error::TlsError;
pub use security::ChannelSecurity;
pub use tls_config::TlsConfig;
