//! Post-transfer integrity step.
//!
//! After the node reports a transfer done, the reconciler compares the
//! reported CRC32 against the catalog's cached value and against the
//! directory's SFV manifest, then hands back a verdict. Download mismatches
//! only warn; an upload contradicting the manifest is deleted on the spot
//! and its verdict blocks credit and statistics updates.

use crate::constants::MAX_MANIFEST_BYTES;
use crate::core_channel::negotiator::TransferDirection;
use crate::core_node::error::NodeError;
use crate::core_node::registry::NodeRegistry;
use crate::core_transfer::sfv::SfvManifest;
use crate::core_vfs::catalog::{FileMeta, VfsCatalog};
use log::warn;
use std::sync::Arc;

#[derive(Debug)]
pub struct ReconcileReport {
    pub clean: bool,
    pub comments: Vec<String>,
    /// True when an upload was removed for contradicting the manifest.
    pub deleted: bool,
}

impl ReconcileReport {
    fn clean_with(comments: Vec<String>) -> Self {
        ReconcileReport {
            clean: true,
            comments,
            deleted: false,
        }
    }
}

pub struct Reconciler {
    catalog: Arc<VfsCatalog>,
    registry: Arc<NodeRegistry>,
}

impl Reconciler {
    pub fn new(catalog: Arc<VfsCatalog>, registry: Arc<NodeRegistry>) -> Self {
        Reconciler { catalog, registry }
    }

    pub async fn reconcile(
        &self,
        direction: TransferDirection,
        reported_crc: u32,
        path: &str,
    ) -> ReconcileReport {
        match direction {
            TransferDirection::Download => self.reconcile_download(reported_crc, path).await,
            TransferDirection::Upload => self.reconcile_upload(reported_crc, path).await,
        }
    }

    async fn reconcile_download(&self, reported_crc: u32, path: &str) -> ReconcileReport {
        let mut comments = Vec::new();
        if reported_crc == 0 {
            comments.push("CRC32 check skipped; node reports none.".to_string());
            return ReconcileReport::clean_with(comments);
        }
        match self.catalog.cache_checksum(path, reported_crc) {
            Ok(Some(prior)) if prior != reported_crc => comments.push(format!(
                "Warning: cached CRC32 {:08X} does not match reported {:08X}.",
                prior, reported_crc
            )),
            _ => {}
        }
        let (dir, name) = VfsCatalog::parent_and_name(path);
        if let Some((manifest_path, manifest_meta)) = self.catalog.manifest_in(&dir) {
            if manifest_path != path {
                match self.fetch_manifest(&manifest_path, &manifest_meta).await {
                    Ok(manifest) => match manifest.lookup(&name) {
                        Some(expected) if expected != reported_crc => comments.push(format!(
                            "Warning: SFV lists {:08X}, node reported {:08X}.",
                            expected, reported_crc
                        )),
                        Some(_) => comments.push("SFV check OK.".to_string()),
                        None => {}
                    },
                    Err(_) => comments.push(
                        "Warning: manifest node unavailable; SFV check skipped.".to_string(),
                    ),
                }
            }
        }
        ReconcileReport::clean_with(comments)
    }

    async fn reconcile_upload(&self, reported_crc: u32, path: &str) -> ReconcileReport {
        let (dir, name) = VfsCatalog::parent_and_name(path);
        if name.to_ascii_lowercase().ends_with(".sfv") {
            return ReconcileReport::clean_with(vec!["Manifest file registered.".to_string()]);
        }
        let Some((manifest_path, manifest_meta)) = self.catalog.manifest_in(&dir) else {
            return ReconcileReport::clean_with(vec!["No manifest present; accepted.".to_string()]);
        };
        let manifest = match self.fetch_manifest(&manifest_path, &manifest_meta).await {
            Ok(manifest) => manifest,
            Err(_) => {
                return ReconcileReport::clean_with(vec![
                    "Manifest node unavailable; accepted without verification.".to_string(),
                ])
            }
        };
        match manifest.lookup(&name) {
            None => {
                ReconcileReport::clean_with(vec!["No manifest entry for this file.".to_string()])
            }
            Some(_) if reported_crc == 0 => {
                ReconcileReport::clean_with(vec!["CRC32 match: disabled.".to_string()])
            }
            Some(expected) if expected == reported_crc => ReconcileReport::clean_with(vec![
                format!("CRC32 {:08X} matches the manifest.", expected),
            ]),
            Some(expected) => {
                warn!(
                    "Upload {} contradicts manifest (expected {:08X}, node reported {:08X}); removing",
                    path, expected, reported_crc
                );
                self.delete_everywhere(path).await;
                ReconcileReport {
                    clean: false,
                    comments: vec![format!(
                        "CRC32 mismatch: manifest lists {:08X}, node reported {:08X}. File removed.",
                        expected, reported_crc
                    )],
                    deleted: true,
                }
            }
        }
    }

    /// Drops the file from the catalog and, best effort, from every node
    /// that holds it. Node-side failures are logged, never surfaced.
    pub async fn delete_everywhere(&self, path: &str) {
        let Ok(meta) = self.catalog.remove_file(path) else {
            return;
        };
        for node_name in &meta.nodes {
            if let Some(node) = self.registry.get(node_name) {
                if let Err(e) = node.delete(path).await {
                    warn!("Failed to delete {} from node {}: {}", path, node_name, e);
                }
            }
        }
    }

    async fn fetch_manifest(
        &self,
        path: &str,
        meta: &FileMeta,
    ) -> Result<SfvManifest, NodeError> {
        let mut last = NodeError::NoAvailableNode;
        for node_name in &meta.nodes {
            let Some(node) = self.registry.get(node_name) else {
                continue;
            };
            if !node.is_online() {
                continue;
            }
            match node.read_file(path, MAX_MANIFEST_BYTES).await {
                Ok(raw) => return Ok(SfvManifest::parse(&raw)),
                Err(e) => {
                    node.handle_failure(&e);
                    last = e;
                }
            }
        }
        Err(last)
    }
}
