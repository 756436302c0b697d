use crate::config::NodeConfig;
use crate::constants::{NODE_CALL_TIMEOUT_SECS, NODE_CONNECT_TIMEOUT_SECS};
use crate::core_node::error::NodeError;
use crate::core_node::proto::{
    self, NodeFault, NodeRequest, NodeResponse, NodeStatus, TransferInstruction, TransferReport,
};
use crate::core_tls::ChannelSecurity;
use log::{info, warn};
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client;

/// Last known state of a storage node, refreshed by pings and transfers.
#[derive(Debug, Clone, Copy)]
pub struct NodeHealth {
    pub online: bool,
    pub free_bytes: u64,
    pub active_transfers: u32,
}

impl Default for NodeHealth {
    fn default() -> Self {
        // Nodes start optimistically online so a freshly loaded config can
        // serve transfers before the first monitor round completes.
        NodeHealth {
            online: true,
            free_bytes: 0,
            active_transfers: 0,
        }
    }
}

/// Master-side handle to one storage node.
///
/// Every remote call opens a fresh connection, so concurrent transfers
/// against the same node never share a control exchange.
pub struct NodeHandle {
    name: String,
    address: String,
    tls: bool,
    tls_name: Option<String>,
    accepts_uploads: bool,
    security: Arc<ChannelSecurity>,
    health: Mutex<NodeHealth>,
}

enum NodeStream {
    Plain(TcpStream),
    Secure(Box<client::TlsStream<TcpStream>>),
}

impl NodeHandle {
    pub fn from_config(cfg: &NodeConfig, security: Arc<ChannelSecurity>) -> Self {
        NodeHandle {
            name: cfg.name.clone(),
            address: cfg.address.clone(),
            tls: cfg.tls,
            tls_name: cfg.tls_name.clone(),
            accepts_uploads: cfg.accepts_uploads,
            security,
            health: Mutex::new(NodeHealth::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn accepts_uploads(&self) -> bool {
        self.accepts_uploads
    }

    pub fn health(&self) -> NodeHealth {
        *self.health.lock().unwrap()
    }

    pub fn is_online(&self) -> bool {
        self.health.lock().unwrap().online
    }

    pub fn mark_online(&self, status: NodeStatus) {
        let mut health = self.health.lock().unwrap();
        if !health.online {
            info!("Node {} is back online", self.name);
        }
        health.online = true;
        health.free_bytes = status.free_bytes;
        health.active_transfers = status.active_transfers;
    }

    pub fn mark_offline(&self, reason: &str) {
        let mut health = self.health.lock().unwrap();
        if health.online {
            warn!("Node {} marked offline: {}", self.name, reason);
        }
        health.online = false;
    }

    /// Records a call failure; transport-level failures take the node out of
    /// selection until the monitor reaches it again.
    pub fn handle_failure(&self, err: &NodeError) {
        if err.is_transport() {
            self.mark_offline(&err.to_string());
        }
    }

    async fn open_stream(&self) -> Result<NodeStream, NodeError> {
        let connect = TcpStream::connect(&self.address);
        let tcp = tokio::time::timeout(Duration::from_secs(NODE_CONNECT_TIMEOUT_SECS), connect)
            .await
            .map_err(|_| NodeError::Unreachable {
                node: self.name.clone(),
                message: "connect timed out".to_string(),
            })?
            .map_err(|e| NodeError::Unreachable {
                node: self.name.clone(),
                message: e.to_string(),
            })?;
        if self.tls {
            let server_name = self
                .tls_name
                .clone()
                .unwrap_or_else(|| self.address.split(':').next().unwrap_or_default().to_string());
            let secured = self
                .security
                .connect(&server_name, tcp)
                .await
                .map_err(|e| NodeError::Unreachable {
                    node: self.name.clone(),
                    message: e.to_string(),
                })?;
            Ok(NodeStream::Secure(Box::new(secured)))
        } else {
            Ok(NodeStream::Plain(tcp))
        }
    }

    /// One request, one response, one connection. The deadline covers the
    /// whole exchange, so transfer calls pass the transfer deadline here.
    pub async fn call(
        &self,
        request: NodeRequest,
        deadline: Duration,
    ) -> Result<NodeResponse, NodeError> {
        let exchange = async {
            let mut stream = self.open_stream().await?;
            proto::write_frame(&mut stream, &request)
                .await
                .map_err(|e| NodeError::RemoteCallFailure {
                    node: self.name.clone(),
                    message: e.to_string(),
                })?;
            proto::read_frame::<_, NodeResponse>(&mut stream)
                .await
                .map_err(|e| NodeError::RemoteCallFailure {
                    node: self.name.clone(),
                    message: e.to_string(),
                })
        };
        let response = tokio::time::timeout(deadline, exchange)
            .await
            .map_err(|_| NodeError::CallTimeout {
                node: self.name.clone(),
            })??;
        match response {
            NodeResponse::Fault { kind, message } => Err(self.fault_error(kind, message)),
            other => Ok(other),
        }
    }

    fn fault_error(&self, kind: NodeFault, message: String) -> NodeError {
        match kind {
            NodeFault::Io => NodeError::RemoteCallFailure {
                node: self.name.clone(),
                message,
            },
            NodeFault::UnexpectedFile => NodeError::Desync {
                node: self.name.clone(),
                message,
            },
            NodeFault::MissingFile => NodeError::RemoteFileMissing {
                node: self.name.clone(),
                path: message,
            },
            NodeFault::Refused => NodeError::Refused {
                node: self.name.clone(),
                message,
            },
        }
    }

    fn short_deadline() -> Duration {
        Duration::from_secs(NODE_CALL_TIMEOUT_SECS)
    }

    pub async fn ping(&self) -> Result<NodeStatus, NodeError> {
        match self.call(NodeRequest::Ping, Self::short_deadline()).await? {
            NodeResponse::Pong(status) => {
                self.mark_online(status);
                Ok(status)
            }
            other => Err(self.unexpected(other)),
        }
    }

    /// Asks the node to open a passive data listener. The node expires the
    /// listener on its own if no transfer claims it.
    pub async fn open_listener(&self, encrypted: bool) -> Result<(u64, SocketAddr), NodeError> {
        let request = NodeRequest::OpenListener { encrypted };
        match self.call(request, Self::short_deadline()).await? {
            NodeResponse::ListenerOpen {
                listener_id,
                external,
            } => Ok((listener_id, external)),
            other => Err(self.unexpected(other)),
        }
    }

    pub async fn transfer(
        &self,
        instruction: TransferInstruction,
        deadline: Duration,
    ) -> Result<TransferReport, NodeError> {
        match self.call(NodeRequest::Transfer(instruction), deadline).await? {
            NodeResponse::Transferred(report) => Ok(report),
            other => Err(self.unexpected(other)),
        }
    }

    pub async fn delete(&self, path: &str) -> Result<(), NodeError> {
        let request = NodeRequest::Delete {
            path: path.to_string(),
        };
        match self.call(request, Self::short_deadline()).await? {
            NodeResponse::Deleted => Ok(()),
            other => Err(self.unexpected(other)),
        }
    }

    /// Pulls a small control file off the node over the command link.
    pub async fn read_file(&self, path: &str, max_bytes: u64) -> Result<Vec<u8>, NodeError> {
        let request = NodeRequest::ReadFile {
            path: path.to_string(),
            max_bytes,
        };
        match self.call(request, Self::short_deadline()).await? {
            NodeResponse::FileData(data) => Ok(data),
            other => Err(self.unexpected(other)),
        }
    }

    fn unexpected(&self, response: NodeResponse) -> NodeError {
        NodeError::RemoteCallFailure {
            node: self.name.clone(),
            message: format!("unexpected response: {:?}", response),
        }
    }
}

impl AsyncRead for NodeStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            NodeStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            NodeStream::Secure(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for NodeStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            NodeStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            NodeStream::Secure(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            NodeStream::Plain(s) => Pin::new(s).poll_flush(cx),
            NodeStream::Secure(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            NodeStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            NodeStream::Secure(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}
