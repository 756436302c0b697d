use crate::config::NodeConfig;
use crate::core_node::node::NodeHandle;
use crate::core_tls::ChannelSecurity;
use std::sync::Arc;

/// All configured storage nodes. The set is fixed at startup; per-node
/// health lives inside each handle.
pub struct NodeRegistry {
    nodes: Vec<Arc<NodeHandle>>,
}

impl NodeRegistry {
    pub fn from_config(configs: &[NodeConfig], security: Arc<ChannelSecurity>) -> Self {
        let nodes = configs
            .iter()
            .map(|cfg| Arc::new(NodeHandle::from_config(cfg, Arc::clone(&security))))
            .collect();
        NodeRegistry { nodes }
    }

    #[cfg(test)]
    pub fn from_handles(nodes: Vec<Arc<NodeHandle>>) -> Self {
        NodeRegistry { nodes }
    }

    pub fn get(&self, name: &str) -> Option<Arc<NodeHandle>> {
        self.nodes.iter().find(|n| n.name() == name).cloned()
    }

    pub fn all(&self) -> &[Arc<NodeHandle>] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
