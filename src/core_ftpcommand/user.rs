use crate::constants::USERNAME_REGEX;
use crate::core_network::stream::ControlStream;
use crate::helpers::send_response;
use crate::server::ServerContext;
use crate::session::Session;
use log::{debug, warn};
use regex::Regex;
use std::io;
use std::sync::Arc;

/// Handles the USER FTP command.
///
/// Records the claimed name and asks for the password. Whether the account
/// exists is not revealed here; PASS answers the same way for an unknown
/// user and a wrong password.
pub async fn handle_user_command(
    stream: &mut ControlStream,
    _ctx: &Arc<ServerContext>,
    session: &mut Session,
    arg: String,
) -> io::Result<()> {
    let name = arg.trim();
    let pattern = Regex::new(USERNAME_REGEX).expect("valid username pattern");
    if !pattern.is_match(name) {
        warn!("Rejected malformed username {:?}", name);
        return send_response(stream, b"501 Syntax: USER username.\r\n").await;
    }

    session.username = name.to_string();
    session.is_authenticated = false;
    debug!("USER {} from {}", name, session.control_peer);
    send_response(stream, b"331 User name okay, need password.\r\n").await
}
