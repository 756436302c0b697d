use crate::core_channel::negotiator::ChannelState;
use std::net::SocketAddr;

/// Per-connection state. One session is driven by one task; nothing in
/// here is shared, so commands mutate it directly.
pub struct Session {
    /// Peer address of the control connection, used to sanity-check PORT.
    pub control_peer: SocketAddr,
    pub username: String,
    pub is_authenticated: bool,
    /// Current working directory, always absolute.
    pub current_dir: String,
    /// Data channel negotiation state, consumed per transfer.
    pub channel: ChannelState,
    /// Set by QUIT; the connection loop drains and closes.
    pub closing: bool,
}

impl Session {
    pub fn new(control_peer: SocketAddr) -> Self {
        Session {
            control_peer,
            username: String::new(),
            is_authenticated: false,
            current_dir: "/".to_string(),
            channel: ChannelState::new(),
            closing: false,
        }
    }
}
