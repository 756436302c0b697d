//! Drives one RETR or STOR end to end.
//!
//! The orchestrator validates preconditions, binds the storage node, tells
//! it to move the bytes, then reconciles the result with the catalog and
//! the user's credits. Whatever happens, the session's channel state is
//! reset before the final reply goes out.

use crate::core_accounting::AccountRegistry;
use crate::core_channel::negotiator::{
    NegotiatedChannel, PreSelection, ReprType, TransferDirection,
};
use crate::core_channel::ChannelError;
use crate::core_event::{EventBus, TransferEvent};
use crate::core_network::stream::ControlStream;
use crate::core_node::error::NodeError;
use crate::core_node::node::NodeHandle;
use crate::core_node::proto::{ChannelSpec, TransferAction, TransferInstruction};
use crate::core_node::registry::NodeRegistry;
use crate::core_node::selector::NodeSelector;
use crate::core_transfer::error::TransferError;
use crate::core_transfer::outcome::TransferOutcome;
use crate::core_transfer::reconciler::Reconciler;
use crate::core_vfs::catalog::VfsCatalog;
use crate::helpers::send_response;
use crate::session::Session;
use log::{error, warn};
use std::io;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferCommand {
    Retr,
    Stor,
    Appe,
}

impl TransferCommand {
    pub fn direction(self) -> TransferDirection {
        match self {
            TransferCommand::Retr => TransferDirection::Download,
            TransferCommand::Stor | TransferCommand::Appe => TransferDirection::Upload,
        }
    }
}

pub struct TransferOrchestrator {
    catalog: Arc<VfsCatalog>,
    registry: Arc<NodeRegistry>,
    selector: NodeSelector,
    accounts: Arc<AccountRegistry>,
    reconciler: Reconciler,
    events: Arc<EventBus>,
    require_protected_data: bool,
    transfer_deadline: Duration,
}

impl TransferOrchestrator {
    pub fn new(
        catalog: Arc<VfsCatalog>,
        registry: Arc<NodeRegistry>,
        accounts: Arc<AccountRegistry>,
        events: Arc<EventBus>,
        require_protected_data: bool,
        transfer_deadline: Duration,
    ) -> Self {
        TransferOrchestrator {
            selector: NodeSelector::new(Arc::clone(&registry)),
            reconciler: Reconciler::new(Arc::clone(&catalog), Arc::clone(&registry)),
            catalog,
            registry,
            accounts,
            events,
            require_protected_data,
            transfer_deadline,
        }
    }

    /// Runs the whole transfer and writes every control reply itself: the
    /// 150 once preconditions pass, then exactly one final reply.
    pub async fn execute(
        &self,
        writer: &mut ControlStream,
        session: &mut Session,
        command: TransferCommand,
        argument: &str,
    ) -> io::Result<()> {
        let path = VfsCatalog::resolve(&session.current_dir, argument);
        let direction = command.direction();
        let reply = match self.prepare(session, command, direction, &path) {
            Err(e) => self.failure_reply(session, direction, &path, None, e),
            Ok(node) => {
                send_response(writer, b"150 Opening data connection.\r\n").await?;
                let offset = session.channel.take_resume_offset();
                match self.invoke(session, direction, &path, &node, offset).await {
                    Err(e) => {
                        self.failure_reply(session, direction, &path, Some(node.name()), e)
                    }
                    Ok(outcome) => {
                        self.settle(session, direction, &path, &node, offset, outcome)
                            .await
                    }
                }
            }
        };
        session.channel.reset();
        send_response(writer, reply.as_bytes()).await
    }

    /// Steps that run before any byte moves: policy, target resolution,
    /// authorization, credit, and node binding. Nothing here mutates state.
    fn prepare(
        &self,
        session: &Session,
        command: TransferCommand,
        direction: TransferDirection,
        path: &str,
    ) -> Result<Arc<NodeHandle>, TransferError> {
        if self.require_protected_data && !session.channel.encrypt_data {
            return Err(TransferError::PolicyViolation);
        }
        if command == TransferCommand::Appe {
            return Err(TransferError::NotImplemented("APPE"));
        }
        let download_meta = match direction {
            TransferDirection::Download => {
                let meta = self.catalog.lookup_plain_file(path)?;
                self.catalog.may_download(path)?;
                self.accounts
                    .check_download_credit(&session.username, meta.size)?;
                Some(meta)
            }
            TransferDirection::Upload => {
                self.catalog.legal_upload_name(path)?;
                let (dir, _) = VfsCatalog::parent_and_name(path);
                self.catalog.ensure_dir(&dir)?;
                self.catalog.may_upload(&dir)?;
                let offset = session.channel.resume_offset();
                if offset == 0 {
                    self.catalog.ensure_absent(path)?;
                } else {
                    // Resuming may only continue an interrupted upload right
                    // where it stopped.
                    let meta = self.catalog.lookup_plain_file(path)?;
                    if meta.size != offset {
                        return Err(ChannelError::SequenceError(
                            "Restart offset does not match the stored size".to_string(),
                        )
                        .into());
                    }
                }
                None
            }
        };
        let node = match session.channel.pre_selection() {
            Some(PreSelection::Listing) => {
                return Err(ChannelError::SequenceError(
                    "PRET negotiation was for a listing".to_string(),
                )
                .into())
            }
            Some(PreSelection::Transfer {
                node,
                direction: pre_direction,
                path: pre_path,
            }) => {
                if *pre_direction != direction || pre_path != path {
                    return Err(ChannelError::SequenceError(
                        "PRET negotiation does not match this transfer".to_string(),
                    )
                    .into());
                }
                if let Some(meta) = &download_meta {
                    if !meta.nodes.iter().any(|n| n == node) {
                        return Err(ChannelError::SequenceError(
                            "Pre-selected node no longer hosts the file".to_string(),
                        )
                        .into());
                    }
                }
                self.registry.get(node).ok_or(NodeError::NoAvailableNode)?
            }
            None => match &download_meta {
                Some(meta) => self.selector.select_for_download(meta)?,
                None => self.selector.select_for_upload()?,
            },
        };
        Ok(node)
    }

    /// Materializes the upload placeholder, then performs the remote call.
    /// A failure after the placeholder exists removes it again, so a broken
    /// upload never lingers in listings. A resumed upload continues an
    /// entry that already exists, so no placeholder is created and nothing
    /// is deleted on failure.
    async fn invoke(
        &self,
        session: &Session,
        direction: TransferDirection,
        path: &str,
        node: &Arc<NodeHandle>,
        offset: u64,
    ) -> Result<TransferOutcome, TransferError> {
        let fresh_upload = direction == TransferDirection::Upload && offset == 0;
        if fresh_upload {
            self.catalog
                .register_pending(path, &session.username, node.name())?;
        }
        let result = self.run_remote(session, direction, path, node, offset).await;
        if result.is_err() && fresh_upload {
            self.reconciler.delete_everywhere(path).await;
        }
        result
    }

    async fn run_remote(
        &self,
        session: &Session,
        direction: TransferDirection,
        path: &str,
        node: &Arc<NodeHandle>,
        offset: u64,
    ) -> Result<TransferOutcome, TransferError> {
        let channel = match session.channel.negotiated() {
            NegotiatedChannel::Active { peer } => ChannelSpec::Connect {
                peer,
                encrypted: session.channel.encrypt_data,
            },
            NegotiatedChannel::NodeListener {
                node: listener_node,
                listener_id,
            } => {
                if listener_node != node.name() {
                    return Err(ChannelError::SequenceError(
                        "Passive listener is on a different node".to_string(),
                    )
                    .into());
                }
                ChannelSpec::Accept { listener_id }
            }
            NegotiatedChannel::MasterListener => {
                return Err(ChannelError::SequenceError(
                    "Passive channel was negotiated for a listing".to_string(),
                )
                .into())
            }
            NegotiatedChannel::None => return Err(ChannelError::NotNegotiated.into()),
        };
        let instruction = TransferInstruction {
            action: match direction {
                TransferDirection::Download => TransferAction::Send,
                TransferDirection::Upload => TransferAction::Receive,
            },
            path: path.to_string(),
            offset,
            ascii: session.channel.repr_type == ReprType::Ascii,
            channel,
        };
        let report = node
            .transfer(instruction, self.transfer_deadline)
            .await
            .map_err(|e| {
                node.handle_failure(&e);
                match e {
                    // The catalog said this node holds the file; the node
                    // disagrees. That is a desync, not a plain 550.
                    NodeError::RemoteFileMissing { node, path }
                        if direction == TransferDirection::Download =>
                    {
                        NodeError::Desync {
                            node,
                            message: format!("file {} missing where the catalog expects it", path),
                        }
                    }
                    other => other,
                }
            })?;
        Ok(TransferOutcome {
            direction,
            path: path.to_string(),
            node: node.name().to_string(),
            bytes: report.bytes,
            elapsed: Duration::from_millis(report.elapsed_ms),
            crc32: report.crc32,
            peer: report.peer,
        })
    }

    /// Post-transfer side effects: catalog finalization, reconciliation,
    /// credits, and the completion event. Returns the final reply text.
    async fn settle(
        &self,
        session: &Session,
        direction: TransferDirection,
        path: &str,
        node: &Arc<NodeHandle>,
        offset: u64,
        outcome: TransferOutcome,
    ) -> String {
        if direction == TransferDirection::Upload {
            // A resumed upload's checksum covers only the tail, so it is
            // not worth caching.
            let cached = if offset == 0 && outcome.crc32 != 0 {
                Some(outcome.crc32)
            } else {
                None
            };
            if let Err(e) =
                self.catalog
                    .finalize_upload(path, offset + outcome.bytes, cached, outcome.elapsed)
            {
                warn!("Failed to finalize upload {}: {}", path, e);
            }
        }
        let report = self.reconciler.reconcile(direction, outcome.crc32, path).await;
        if report.clean {
            match direction {
                TransferDirection::Upload => {
                    self.accounts.apply_upload(&session.username, outcome.bytes)
                }
                TransferDirection::Download => self
                    .accounts
                    .apply_download(&session.username, outcome.bytes),
            }
        }
        self.events.publish(TransferEvent {
            direction,
            path: path.to_string(),
            username: session.username.clone(),
            node: node.name().to_string(),
            peer: Some(outcome.peer),
            repr_type: session.channel.repr_type,
            bytes: outcome.bytes,
            success: true,
            clean: report.clean,
        });
        if report.clean {
            outcome.reply(&report.comments)
        } else {
            let mut text = String::new();
            for comment in &report.comments {
                text.push_str(&format!("550-{}\r\n", comment));
            }
            text.push_str("550 Upload rejected; checksum did not match the manifest.\r\n");
            text
        }
    }

    fn failure_reply(
        &self,
        session: &Session,
        direction: TransferDirection,
        path: &str,
        node: Option<&str>,
        err: TransferError,
    ) -> String {
        if let TransferError::Node(NodeError::Desync { node, message }) = &err {
            error!(
                "Data integrity alarm: node {} desynchronized on {}: {}",
                node, path, message
            );
        } else {
            warn!("{:?} of {} failed: {}", direction, path, err);
        }
        self.events.publish(TransferEvent {
            direction,
            path: path.to_string(),
            username: session.username.clone(),
            node: node.unwrap_or_default().to_string(),
            peer: None,
            repr_type: session.channel.repr_type,
            bytes: 0,
            success: false,
            clean: false,
        });
        format!("{}\r\n", err.to_ftp_response())
    }
}
