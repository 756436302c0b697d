//! Startup wiring and the control-connection accept loop.

use crate::config::Config;
use crate::core_accounting::AccountRegistry;
use crate::core_channel::PassivePortPool;
use crate::core_event::EventBus;
use crate::core_network::network;
use crate::core_node::{NodeRegistry, NodeSelector};
use crate::core_tls::ChannelSecurity;
use crate::core_transfer::TransferOrchestrator;
use crate::core_vfs::VfsCatalog;
use anyhow::{Context, Result};
use log::{info, warn};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;

/// Everything a command handler can reach. Built once at startup and
/// shared by every session task.
pub struct ServerContext {
    pub config: Arc<Config>,
    pub security: Arc<ChannelSecurity>,
    pub catalog: Arc<VfsCatalog>,
    pub accounts: Arc<AccountRegistry>,
    pub registry: Arc<NodeRegistry>,
    pub selector: NodeSelector,
    pub pool: Arc<PassivePortPool>,
    pub events: Arc<EventBus>,
    pub orchestrator: TransferOrchestrator,
    /// Address advertised in 227 replies for master-bound listeners.
    pub pasv_ip: Ipv4Addr,
}

impl ServerContext {
    pub fn new(config: Config) -> Result<Arc<Self>> {
        let security = Arc::new(ChannelSecurity::from_config(&config.tls)?);
        let catalog = Arc::new(VfsCatalog::new(&config.vfs));
        let accounts = Arc::new(AccountRegistry::load_from_file(&config.server.users_file)?);
        let registry = Arc::new(NodeRegistry::from_config(
            &config.nodes,
            Arc::clone(&security),
        ));
        if registry.is_empty() {
            warn!("No storage nodes configured; every transfer will be refused");
        }
        let pool = Arc::new(PassivePortPool::new(
            config.server.pasv_port_min,
            config.server.pasv_port_max,
        ));
        let events = Arc::new(EventBus::new());
        let pasv_ip: Ipv4Addr = config
            .server
            .pasv_address
            .parse()
            .context("pasv_address is not an IPv4 address")?;
        let orchestrator = TransferOrchestrator::new(
            Arc::clone(&catalog),
            Arc::clone(&registry),
            Arc::clone(&accounts),
            Arc::clone(&events),
            config.tls.require_data_protection,
            Duration::from_secs(config.server.transfer_deadline_secs),
        );

        Ok(Arc::new(ServerContext {
            selector: NodeSelector::new(Arc::clone(&registry)),
            config: Arc::new(config),
            security,
            catalog,
            accounts,
            registry,
            pool,
            events,
            orchestrator,
            pasv_ip,
        }))
    }
}

/// Accepts control connections forever. One task per session; sessions
/// share nothing but the context.
pub async fn run(ctx: Arc<ServerContext>) -> Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", ctx.config.server.listen_port))
        .await
        .with_context(|| {
            format!(
                "failed to bind control port {}",
                ctx.config.server.listen_port
            )
        })?;
    info!(
        "Control listener on port {}, {} node(s) configured",
        ctx.config.server.listen_port,
        ctx.registry.all().len()
    );

    spawn_event_logger(&ctx);

    loop {
        let (socket, peer) = listener.accept().await?;
        info!("Control connection from {}", peer);
        let ctx = Arc::clone(&ctx);
        tokio::spawn(async move {
            if let Err(e) = network::handle_connection(ctx, socket, peer).await {
                warn!("Session {} ended with error: {}", peer, e);
            }
            info!("Control connection from {} closed", peer);
        });
    }
}

/// Mirrors the transfer event stream into the log. Other subscribers can
/// attach to the same bus without touching this one.
fn spawn_event_logger(ctx: &Arc<ServerContext>) {
    let mut rx = ctx.events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => info!(
                    "Transfer {:?} {} user={} node={} bytes={} success={} clean={}",
                    ev.direction, ev.path, ev.username, ev.node, ev.bytes, ev.success, ev.clean
                ),
                Err(RecvError::Lagged(missed)) => {
                    warn!("Event logger lagged, {} event(s) dropped", missed)
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}
