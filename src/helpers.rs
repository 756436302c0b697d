use crate::core_network::stream::ControlStream;
use log::trace;
use std::io;
use tokio::io::AsyncWriteExt;

/// Writes one reply to the control channel. The caller supplies the full
/// text including the CRLF terminator, matching the wire byte-for-byte.
pub async fn send_response(stream: &mut ControlStream, message: &[u8]) -> io::Result<()> {
    trace!("-> {}", String::from_utf8_lossy(message).trim_end());
    stream.write_all(message).await?;
    stream.flush().await
}
