use crate::core_node::error::NodeError;
use crate::core_node::node::NodeHandle;
use crate::core_node::registry::NodeRegistry;
use crate::core_vfs::catalog::FileMeta;
use rand::seq::SliceRandom;
use std::sync::Arc;

/// Picks the storage node serving a transfer.
///
/// Downloads only consider nodes that hold a replica; uploads only consider
/// nodes accepting new files. Among eligible online nodes the least loaded
/// wins, with random tie-breaking so parallel sessions spread out.
pub struct NodeSelector {
    registry: Arc<NodeRegistry>,
}

impl NodeSelector {
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        NodeSelector { registry }
    }

    pub fn select_for_download(&self, file: &FileMeta) -> Result<Arc<NodeHandle>, NodeError> {
        let candidates: Vec<Arc<NodeHandle>> = self
            .registry
            .all()
            .iter()
            .filter(|n| n.is_online() && file.nodes.iter().any(|name| name == n.name()))
            .cloned()
            .collect();
        Self::pick_least_loaded(candidates)
    }

    pub fn select_for_upload(&self) -> Result<Arc<NodeHandle>, NodeError> {
        let candidates: Vec<Arc<NodeHandle>> = self
            .registry
            .all()
            .iter()
            .filter(|n| n.is_online() && n.accepts_uploads())
            .cloned()
            .collect();
        Self::pick_least_loaded(candidates)
    }

    fn pick_least_loaded(candidates: Vec<Arc<NodeHandle>>) -> Result<Arc<NodeHandle>, NodeError> {
        let min_load = candidates
            .iter()
            .map(|n| n.health().active_transfers)
            .min()
            .ok_or(NodeError::NoAvailableNode)?;
        let quietest: Vec<Arc<NodeHandle>> = candidates
            .into_iter()
            .filter(|n| n.health().active_transfers == min_load)
            .collect();
        quietest
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or(NodeError::NoAvailableNode)
    }
}
