// src/constants.rs

pub const USERNAME_REGEX: &str = r"^[a-zA-Z0-9]{1,32}$";

/// Names a client may give to an uploaded file. Anything else is refused
/// with 553 before a node is ever contacted.
pub const FILE_NAME_REGEX: &str = r"^[A-Za-z0-9][A-Za-z0-9._\-+()\[\]&#~]{0,254}$";

/// Seconds to wait for an outbound active-mode data connection.
pub const ACTIVE_CONNECT_TIMEOUT_SECS: u64 = 15;

/// Seconds a master-bound passive listener waits for the client to connect.
pub const PASSIVE_ACCEPT_TIMEOUT_SECS: u64 = 15;

/// Seconds allowed to bind a passive listener, locally or on a node.
pub const PASSIVE_BIND_TIMEOUT_SECS: u64 = 60;

/// Seconds to wait when opening the control link to a storage node.
pub const NODE_CONNECT_TIMEOUT_SECS: u64 = 15;

/// Seconds allowed for a short node call (ping, open listener, delete).
pub const NODE_CALL_TIMEOUT_SECS: u64 = 60;

/// Largest manifest (SFV) file the master will fetch from a node.
pub const MAX_MANIFEST_BYTES: u64 = 1024 * 1024;

/// Capacity of the transfer event broadcast channel.
pub const EVENT_BUS_CAPACITY: usize = 64;

/// Longest control-connection command line accepted before the session is
/// dropped as misbehaving.
pub const MAX_COMMAND_BYTES: usize = 4096;
