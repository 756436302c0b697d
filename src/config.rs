use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core_tls::TlsConfig;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub listen_port: u16,
    /// Address advertised in PASV replies for master-bound listeners.
    pub pasv_address: String,
    /// Inclusive port range handed out to master-bound passive listeners.
    pub pasv_port_min: u16,
    pub pasv_port_max: u16,
    pub greeting: String,
    pub users_file: String,
    /// Seconds between node availability probes.
    pub monitor_interval_secs: u64,
    /// Upper bound on a single remote transfer call.
    pub transfer_deadline_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_port: 21,
            pasv_address: String::from("127.0.0.1"),
            pasv_port_min: 30000,
            pasv_port_max: 30099,
            greeting: String::from("rouillehubd ready."),
            users_file: String::from("etc/users.toml"),
            monitor_interval_secs: 30,
            transfer_deadline_secs: 3600,
        }
    }
}

/// One remote storage node the master may delegate transfers to.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NodeConfig {
    pub name: String,
    /// host:port of the node's control endpoint.
    pub address: String,
    #[serde(default)]
    pub tls: bool,
    /// Server name presented during the TLS handshake; defaults to the host
    /// part of `address`.
    #[serde(default)]
    pub tls_name: Option<String>,
    #[serde(default = "default_true")]
    pub accepts_uploads: bool,
}

fn default_true() -> bool {
    true
}

/// Shape of the virtual tree the master presents to clients.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VfsConfig {
    /// Directories created at startup.
    pub sections: Vec<String>,
    /// Prefixes under which uploads are permitted.
    pub upload_allow: Vec<String>,
    /// Prefixes from which downloads are refused.
    pub download_deny: Vec<String>,
}

impl Default for VfsConfig {
    fn default() -> Self {
        Self {
            sections: vec![String::from("/incoming")],
            upload_allow: vec![String::from("/incoming")],
            download_deny: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub tls: TlsConfig,
    #[serde(default)]
    pub vfs: VfsConfig,
    #[serde(default, rename = "node")]
    pub nodes: Vec<NodeConfig>,
}

impl Config {
    pub fn load_from_file(path: &str) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path))?;
        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse configuration file: {}", path))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations the runtime cannot honor.
    pub fn validate(&self) -> Result<()> {
        self.server
            .pasv_address
            .parse::<std::net::Ipv4Addr>()
            .with_context(|| {
                format!(
                    "pasv_address must be an IPv4 address, got: {}",
                    self.server.pasv_address
                )
            })?;
        if self.server.pasv_port_min > self.server.pasv_port_max {
            anyhow::bail!(
                "pasv port range is empty: {}-{}",
                self.server.pasv_port_min,
                self.server.pasv_port_max
            );
        }
        self.tls.validate().context("TLS configuration invalid")?;
        Ok(())
    }
}
