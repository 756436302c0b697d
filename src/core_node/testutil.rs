//! In-process storage node used by the test suites.

use crate::core_node::proto::{
    self, ChannelSpec, NodeFault, NodeRequest, NodeResponse, NodeStatus, TransferAction,
    TransferInstruction, TransferReport,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Bitwise CRC-32 (IEEE), enough for test-sized payloads.
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xEDB8_8320 & mask);
        }
    }
    !crc
}

#[derive(Default)]
struct FakeState {
    files: Mutex<HashMap<String, Vec<u8>>>,
    listeners: Mutex<HashMap<u64, TcpListener>>,
    refuse_all: AtomicBool,
    skew_crc: AtomicBool,
    next_listener: AtomicU64,
}

/// A storage node running inside the test process. It speaks the real wire
/// protocol over loopback and keeps its files in memory.
pub struct FakeNode {
    pub address: SocketAddr,
    state: Arc<FakeState>,
}

impl FakeNode {
    pub async fn start() -> FakeNode {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let state = Arc::new(FakeState::default());
        let accept_state = Arc::clone(&state);
        tokio::spawn(async move {
            loop {
                let Ok((conn, _)) = listener.accept().await else {
                    break;
                };
                let state = Arc::clone(&accept_state);
                tokio::spawn(async move {
                    let _ = serve_one(conn, state).await;
                });
            }
        });
        FakeNode { address, state }
    }

    pub fn insert_file(&self, path: &str, data: &[u8]) {
        self.state
            .files
            .lock()
            .unwrap()
            .insert(path.to_string(), data.to_vec());
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state.files.lock().unwrap().get(path).cloned()
    }

    /// Every subsequent request is answered with a refusal fault.
    pub fn refuse_everything(&self) {
        self.state.refuse_all.store(true, Ordering::SeqCst);
    }

    /// Future transfer reports carry a deliberately wrong checksum.
    pub fn skew_checksums(&self) {
        self.state.skew_crc.store(true, Ordering::SeqCst);
    }
}

async fn serve_one(mut conn: TcpStream, state: Arc<FakeState>) -> std::io::Result<()> {
    let request: NodeRequest = proto::read_frame(&mut conn).await?;
    if state.refuse_all.load(Ordering::SeqCst) {
        let response = NodeResponse::Fault {
            kind: NodeFault::Refused,
            message: "node draining".to_string(),
        };
        return proto::write_frame(&mut conn, &response).await;
    }
    let response = match request {
        NodeRequest::Ping => NodeResponse::Pong(NodeStatus {
            free_bytes: 1 << 30,
            active_transfers: 0,
        }),
        NodeRequest::OpenListener { .. } => {
            let data_listener = TcpListener::bind("127.0.0.1:0").await?;
            let external = data_listener.local_addr()?;
            let listener_id = state.next_listener.fetch_add(1, Ordering::SeqCst);
            state
                .listeners
                .lock()
                .unwrap()
                .insert(listener_id, data_listener);
            NodeResponse::ListenerOpen {
                listener_id,
                external,
            }
        }
        NodeRequest::Transfer(instruction) => run_transfer(&state, instruction).await,
        NodeRequest::Delete { path } => {
            if state.files.lock().unwrap().remove(&path).is_some() {
                NodeResponse::Deleted
            } else {
                NodeResponse::Fault {
                    kind: NodeFault::MissingFile,
                    message: path,
                }
            }
        }
        NodeRequest::ReadFile { path, max_bytes } => {
            match state.files.lock().unwrap().get(&path) {
                Some(data) => {
                    let take = data.len().min(max_bytes as usize);
                    NodeResponse::FileData(data[..take].to_vec())
                }
                None => NodeResponse::Fault {
                    kind: NodeFault::MissingFile,
                    message: path,
                },
            }
        }
    };
    proto::write_frame(&mut conn, &response).await
}

async fn open_data_channel(
    state: &FakeState,
    channel: ChannelSpec,
) -> Result<(TcpStream, SocketAddr), NodeResponse> {
    match channel {
        ChannelSpec::Connect { peer, .. } => match TcpStream::connect(peer).await {
            Ok(stream) => Ok((stream, peer)),
            Err(e) => Err(NodeResponse::Fault {
                kind: NodeFault::Io,
                message: e.to_string(),
            }),
        },
        ChannelSpec::Accept { listener_id } => {
            let listener = state.listeners.lock().unwrap().remove(&listener_id);
            match listener {
                Some(listener) => match listener.accept().await {
                    Ok((stream, peer)) => Ok((stream, peer)),
                    Err(e) => Err(NodeResponse::Fault {
                        kind: NodeFault::Io,
                        message: e.to_string(),
                    }),
                },
                None => Err(NodeResponse::Fault {
                    kind: NodeFault::Io,
                    message: "unknown listener".to_string(),
                }),
            }
        }
    }
}

async fn run_transfer(state: &Arc<FakeState>, instruction: TransferInstruction) -> NodeResponse {
    if instruction.action == TransferAction::Receive
        && instruction.offset == 0
        && state
            .files
            .lock()
            .unwrap()
            .contains_key(&instruction.path)
    {
        return NodeResponse::Fault {
            kind: NodeFault::UnexpectedFile,
            message: format!("{} already exists", instruction.path),
        };
    }
    let started = Instant::now();
    let (mut data, peer) = match open_data_channel(state, instruction.channel).await {
        Ok(ok) => ok,
        Err(fault) => return fault,
    };
    match instruction.action {
        TransferAction::Send => {
            let payload = {
                let files = state.files.lock().unwrap();
                match files.get(&instruction.path) {
                    Some(content) => {
                        let from = (instruction.offset as usize).min(content.len());
                        content[from..].to_vec()
                    }
                    None => {
                        return NodeResponse::Fault {
                            kind: NodeFault::MissingFile,
                            message: instruction.path,
                        }
                    }
                }
            };
            if let Err(e) = data.write_all(&payload).await {
                return NodeResponse::Fault {
                    kind: NodeFault::Io,
                    message: e.to_string(),
                };
            }
            let _ = data.shutdown().await;
            NodeResponse::Transferred(report(state, &payload, started, peer))
        }
        TransferAction::Receive => {
            let mut received = Vec::new();
            if let Err(e) = data.read_to_end(&mut received).await {
                return NodeResponse::Fault {
                    kind: NodeFault::Io,
                    message: e.to_string(),
                };
            }
            {
                let mut files = state.files.lock().unwrap();
                let entry = files.entry(instruction.path).or_default();
                entry.resize(instruction.offset as usize, 0);
                entry.extend_from_slice(&received);
            }
            NodeResponse::Transferred(report(state, &received, started, peer))
        }
    }
}

fn report(state: &FakeState, payload: &[u8], started: Instant, peer: SocketAddr) -> TransferReport {
    let mut checksum = crc32(payload);
    if state.skew_crc.load(Ordering::SeqCst) {
        checksum = checksum.wrapping_add(1);
    }
    TransferReport {
        bytes: payload.len() as u64,
        elapsed_ms: started.elapsed().as_millis().max(1) as u64,
        crc32: checksum,
        peer,
    }
}
