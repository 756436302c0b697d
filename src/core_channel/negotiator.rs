//! Per-session data channel negotiation.
//!
//! Each control connection owns one [`ChannelState`]. PORT, PASV, PRET,
//! REST, TYPE and PROT mutate it; a transfer command consumes it. The state
//! is never shared across sessions, so no locking happens here. The one
//! cross-session resource, the passive port pool, hands out RAII guards
//! that release the port no matter which exit path runs.

use crate::constants::{
    ACTIVE_CONNECT_TIMEOUT_SECS, PASSIVE_ACCEPT_TIMEOUT_SECS, PASSIVE_BIND_TIMEOUT_SECS,
};
use crate::core_channel::error::ChannelError;
use crate::core_channel::port_pool::{PassivePortPool, PooledPort};
use crate::core_network::stream::DataStream;
use crate::core_node::error::NodeError;
use crate::core_node::registry::NodeRegistry;
use crate::core_node::selector::NodeSelector;
use crate::core_tls::ChannelSecurity;
use crate::core_vfs::VfsCatalog;
use log::{debug, info};
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

/// Representation type agreed via TYPE. Sticky across transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReprType {
    Ascii,
    Image,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    Download,
    Upload,
}

/// Outcome of a PRET negotiation, consumed by at most one transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreSelection {
    /// The master itself will serve a directory listing.
    Listing,
    /// A storage node was reserved for one transfer of `path`.
    Transfer {
        node: String,
        direction: TransferDirection,
        path: String,
    },
}

/// Parsed PRET argument, with the target path already made absolute.
#[derive(Debug, Clone)]
pub enum PretRequest {
    Listing,
    Download(String),
    Upload(String),
}

/// What the PRET reply should announce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PretGrant {
    Listing,
    Node(String),
}

/// Verdict of a PORT command; a suspect address still gets a 200 reply,
/// just with an advisory comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveAdvice {
    Clean,
    PrivateAddress,
}

enum ChannelMode {
    None,
    Active {
        peer: SocketAddr,
    },
    /// Master-bound listener, only ever used to serve listings.
    PassiveMaster {
        listener: TcpListener,
        port: PooledPort,
    },
    /// Listener opened on a storage node; the node accepts, not the master.
    PassiveNode {
        node: String,
        listener_id: u64,
    },
}

/// Read-only view of the negotiated channel for transfer planning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiatedChannel {
    None,
    Active { peer: SocketAddr },
    MasterListener,
    NodeListener { node: String, listener_id: u64 },
}

pub struct ChannelState {
    mode: ChannelMode,
    pre_selection: Option<PreSelection>,
    resume_offset: u64,
    /// Sticky until the next PROT command.
    pub encrypt_data: bool,
    /// Sticky until the next TYPE command.
    pub repr_type: ReprType,
}

impl Default for ChannelState {
    fn default() -> Self {
        ChannelState::new()
    }
}

impl ChannelState {
    pub fn new() -> Self {
        ChannelState {
            mode: ChannelMode::None,
            pre_selection: None,
            resume_offset: 0,
            encrypt_data: false,
            repr_type: ReprType::Ascii,
        }
    }

    /// Returns to the idle sub-state. Dropping a master-bound listener
    /// releases its pooled port, so calling this twice releases nothing
    /// twice. TYPE and PROT settings survive.
    pub fn reset(&mut self) {
        self.mode = ChannelMode::None;
        self.pre_selection = None;
        self.resume_offset = 0;
    }

    pub fn negotiated(&self) -> NegotiatedChannel {
        match &self.mode {
            ChannelMode::None => NegotiatedChannel::None,
            ChannelMode::Active { peer } => NegotiatedChannel::Active { peer: *peer },
            ChannelMode::PassiveMaster { .. } => NegotiatedChannel::MasterListener,
            ChannelMode::PassiveNode { node, listener_id } => NegotiatedChannel::NodeListener {
                node: node.clone(),
                listener_id: *listener_id,
            },
        }
    }

    pub fn pre_selection(&self) -> Option<&PreSelection> {
        self.pre_selection.as_ref()
    }

    /// PORT. Cancels any earlier negotiation, then records where the client
    /// wants outbound data connections to go. A private-range address that
    /// does not match the control connection's peer is accepted with an
    /// advisory, never refused.
    pub fn set_active(&mut self, control_peer: IpAddr, peer: SocketAddrV4) -> ActiveAdvice {
        self.reset();
        let suspect = peer.ip().is_private()
            && match control_peer {
                IpAddr::V4(control) => *peer.ip() != control,
                IpAddr::V6(_) => true,
            };
        self.mode = ChannelMode::Active {
            peer: SocketAddr::V4(peer),
        };
        if suspect {
            ActiveAdvice::PrivateAddress
        } else {
            ActiveAdvice::Clean
        }
    }

    /// PRET. Cancels any earlier negotiation, then resolves and reserves
    /// whatever the announced follow-up command will need.
    pub fn pre_transfer_negotiate(
        &mut self,
        request: PretRequest,
        catalog: &VfsCatalog,
        selector: &NodeSelector,
    ) -> Result<PretGrant, ChannelError> {
        self.reset();
        match request {
            PretRequest::Listing => {
                self.pre_selection = Some(PreSelection::Listing);
                Ok(PretGrant::Listing)
            }
            PretRequest::Download(path) => {
                let meta = catalog.lookup_plain_file(&path)?;
                catalog.may_download(&path)?;
                let node = selector.select_for_download(&meta)?;
                debug!("PRET reserved node {} for download of {}", node.name(), path);
                self.pre_selection = Some(PreSelection::Transfer {
                    node: node.name().to_string(),
                    direction: TransferDirection::Download,
                    path,
                });
                Ok(PretGrant::Node(node.name().to_string()))
            }
            PretRequest::Upload(path) => {
                catalog.legal_upload_name(&path)?;
                let (dir, _) = VfsCatalog::parent_and_name(&path);
                catalog.ensure_dir(&dir)?;
                catalog.may_upload(&dir)?;
                let node = selector.select_for_upload()?;
                debug!("PRET reserved node {} for upload of {}", node.name(), path);
                self.pre_selection = Some(PreSelection::Transfer {
                    node: node.name().to_string(),
                    direction: TransferDirection::Upload,
                    path,
                });
                Ok(PretGrant::Node(node.name().to_string()))
            }
        }
    }

    /// PASV. Requires a prior PRET in this session. Binds on the master for
    /// a listing, or asks the reserved node to open a listener, and returns
    /// the endpoint the 227 reply should advertise.
    pub async fn begin_passive(
        &mut self,
        pool: &Arc<PassivePortPool>,
        pasv_ip: Ipv4Addr,
        registry: &NodeRegistry,
    ) -> Result<SocketAddrV4, ChannelError> {
        let selection = self
            .pre_selection
            .clone()
            .ok_or_else(|| ChannelError::SequenceError("PRET required before PASV".to_string()))?;
        // Drop any listener from an earlier unconsumed negotiation.
        self.mode = ChannelMode::None;
        match selection {
            PreSelection::Listing => {
                let bound = timeout(
                    Duration::from_secs(PASSIVE_BIND_TIMEOUT_SECS),
                    bind_master_listener(pool),
                )
                .await
                .map_err(|_| ChannelError::TimeoutError("a passive socket"))??;
                let (listener, port) = bound;
                info!("Passive listener bound on master port {}", port.port());
                let external = SocketAddrV4::new(pasv_ip, port.port());
                self.mode = ChannelMode::PassiveMaster { listener, port };
                Ok(external)
            }
            PreSelection::Transfer { ref node, .. } => {
                let handle = registry
                    .get(node)
                    .ok_or(ChannelError::Node(NodeError::NoAvailableNode))?;
                let (listener_id, external) = handle
                    .open_listener(self.encrypt_data)
                    .await
                    .map_err(|e| {
                        handle.handle_failure(&e);
                        ChannelError::Node(e)
                    })?;
                let external = match external {
                    SocketAddr::V4(v4) => v4,
                    SocketAddr::V6(_) => {
                        return Err(ChannelError::BindError(
                            "node returned a non-IPv4 endpoint".to_string(),
                        ))
                    }
                };
                info!(
                    "Passive listener {} opened on node {} at {}",
                    listener_id, node, external
                );
                self.mode = ChannelMode::PassiveNode {
                    node: node.clone(),
                    listener_id,
                };
                Ok(external)
            }
        }
    }

    /// REST. The offset applies to the next transfer only.
    pub fn set_restart_offset(&mut self, offset: u64) {
        self.resume_offset = offset;
    }

    pub fn resume_offset(&self) -> u64 {
        self.resume_offset
    }

    pub fn take_resume_offset(&mut self) -> u64 {
        std::mem::replace(&mut self.resume_offset, 0)
    }

    /// Resolves a master-held data socket: connects out in active mode, or
    /// accepts one connection on the master-bound passive listener. Both
    /// wait a bounded time. The listener and its pooled port are consumed
    /// on every path through here, success or failure.
    pub async fn accept_or_connect(
        &mut self,
        security: &ChannelSecurity,
    ) -> Result<DataStream, ChannelError> {
        let mode = std::mem::replace(&mut self.mode, ChannelMode::None);
        match mode {
            ChannelMode::None => Err(ChannelError::NotNegotiated),
            ChannelMode::Active { peer } => {
                let tcp = timeout(
                    Duration::from_secs(ACTIVE_CONNECT_TIMEOUT_SECS),
                    TcpStream::connect(peer),
                )
                .await
                .map_err(|_| ChannelError::TimeoutError("the outbound data connection"))?
                .map_err(|e| ChannelError::ConnectFailed(e.to_string()))?;
                self.secure_if_required(security, tcp).await
            }
            ChannelMode::PassiveMaster { listener, port } => {
                let accepted = timeout(
                    Duration::from_secs(PASSIVE_ACCEPT_TIMEOUT_SECS),
                    listener.accept(),
                )
                .await
                .map_err(|_| ChannelError::TimeoutError("the client data connection"))?
                .map_err(|e| ChannelError::ConnectFailed(e.to_string()));
                drop(listener);
                drop(port);
                let (tcp, peer) = accepted?;
                debug!("Accepted data connection from {}", peer);
                self.secure_if_required(security, tcp).await
            }
            ChannelMode::PassiveNode { .. } => Err(ChannelError::SequenceError(
                "Data channel is hosted on a storage node".to_string(),
            )),
        }
    }

    async fn secure_if_required(
        &self,
        security: &ChannelSecurity,
        tcp: TcpStream,
    ) -> Result<DataStream, ChannelError> {
        if self.encrypt_data {
            let tls = security.accept(tcp).await?;
            Ok(DataStream::Secure(Box::new(tls)))
        } else {
            Ok(DataStream::Plain(tcp))
        }
    }
}

async fn bind_master_listener(
    pool: &Arc<PassivePortPool>,
) -> Result<(TcpListener, PooledPort), ChannelError> {
    let mut last_in_use = None;
    for _ in 0..pool.capacity() {
        let guard = pool.acquire()?;
        match TcpListener::bind(("0.0.0.0", guard.port())).await {
            Ok(listener) => return Ok((listener, guard)),
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                // Something outside the pool owns this port; move on.
                last_in_use = Some(e);
            }
            Err(e) => return Err(ChannelError::BindError(e.to_string())),
        }
    }
    match last_in_use {
        Some(e) => Err(ChannelError::BindError(e.to_string())),
        None => Err(ChannelError::NoPortsAvailable),
    }
}
