use crate::core_node::registry::NodeRegistry;
use log::debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Background health sweep over every configured node.
///
/// A successful ping refreshes the node's status; a failed one marks it
/// offline so the selector stops routing transfers to it.
pub fn spawn(registry: Arc<NodeRegistry>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            for node in registry.all() {
                match node.ping().await {
                    Ok(status) => debug!(
                        "Node {} alive, {} active transfers, {} bytes free",
                        node.name(),
                        status.active_transfers,
                        status.free_bytes
                    ),
                    Err(e) => node.mark_offline(&e.to_string()),
                }
            }
        }
    })
}
