//! Wire protocol between the master and its storage nodes.
//!
//! Every exchange is one request frame followed by one response frame on a
//! fresh connection. A frame is a 4-byte big-endian payload length followed
//! by the bincode-encoded message.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on a single frame, generous enough for manifest payloads.
pub const MAX_FRAME_BYTES: u32 = 4 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NodeRequest {
    Ping,
    /// Open a data listener on the node and report its external endpoint.
    OpenListener { encrypted: bool },
    Transfer(TransferInstruction),
    Delete { path: String },
    /// Fetch a small control file (manifests) without a data channel.
    ReadFile { path: String, max_bytes: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferAction {
    /// Node reads the file and writes it to the data channel.
    Send,
    /// Node reads the data channel and writes the file.
    Receive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferInstruction {
    pub action: TransferAction,
    pub path: String,
    /// Byte offset to resume from; appends are receives with a nonzero offset.
    pub offset: u64,
    pub ascii: bool,
    pub channel: ChannelSpec,
}

/// How the node reaches the client's data endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChannelSpec {
    /// Node dials out to the given peer.
    Connect { peer: SocketAddr, encrypted: bool },
    /// Node accepts one connection on a listener it opened earlier.
    Accept { listener_id: u64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NodeResponse {
    Pong(NodeStatus),
    ListenerOpen { listener_id: u64, external: SocketAddr },
    Transferred(TransferReport),
    Deleted,
    FileData(Vec<u8>),
    Fault { kind: NodeFault, message: String },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NodeStatus {
    pub free_bytes: u64,
    pub active_transfers: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferReport {
    pub bytes: u64,
    pub elapsed_ms: u64,
    /// CRC32 of the bytes moved, zero when checksumming is off on the node.
    pub crc32: u32,
    pub peer: SocketAddr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeFault {
    /// Local I/O failed on the node.
    Io,
    /// A file exists where the master expected none.
    UnexpectedFile,
    /// A file is missing where the master expected one.
    MissingFile,
    /// The node declined the request outright.
    Refused,
}

pub async fn write_frame<S, T>(stream: &mut S, msg: &T) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = bincode::serialize(msg)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    if payload.len() > MAX_FRAME_BYTES as usize {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "frame exceeds protocol maximum",
        ));
    }
    stream.write_u32(payload.len() as u32).await?;
    stream.write_all(&payload).await?;
    stream.flush().await
}

pub async fn read_frame<S, T>(stream: &mut S) -> io::Result<T>
where
    S: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let len = stream.read_u32().await?;
    if len > MAX_FRAME_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "frame exceeds protocol maximum",
        ));
    }
    let mut payload = vec![0u8; len as usize];
    stream.read_exact(&mut payload).await?;
    bincode::deserialize(&payload).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
