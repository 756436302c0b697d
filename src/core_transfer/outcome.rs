use crate::core_channel::negotiator::TransferDirection;
use std::net::SocketAddr;
use std::time::Duration;

/// What one completed remote transfer reported back. Produced once per
/// attempt, consumed by the reconciler and the reply formatter.
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub direction: TransferDirection,
    pub path: String,
    pub node: String,
    /// Bytes moved by this attempt; excludes any resume offset.
    pub bytes: u64,
    pub elapsed: Duration,
    pub crc32: u32,
    pub peer: SocketAddr,
}

impl TransferOutcome {
    pub fn rate_kbs(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64().max(0.001);
        self.bytes as f64 / 1024.0 / secs
    }

    /// Formats the success reply, with any reconciler comments folded in as
    /// continuation lines.
    pub fn reply(&self, comments: &[String]) -> String {
        let mut text = String::new();
        for comment in comments {
            text.push_str(&format!("226-{}\r\n", comment));
        }
        text.push_str(&format!(
            "226 Transfer complete. {} bytes in {:.1} s ({:.1} KB/s), CRC32 {:08X}.\r\n",
            self.bytes,
            self.elapsed.as_secs_f64(),
            self.rate_kbs(),
            self.crc32
        ));
        text
    }
}
