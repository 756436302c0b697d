use crate::core_network::stream::ControlStream;
use crate::helpers::send_response;
use crate::server::ServerContext;
use crate::session::Session;
use log::info;
use std::io;
use std::sync::Arc;

/// Handles the QUIT FTP command. The connection loop closes the socket once
/// the farewell is on the wire.
pub async fn handle_quit_command(
    stream: &mut ControlStream,
    _ctx: &Arc<ServerContext>,
    session: &mut Session,
    _arg: String,
) -> io::Result<()> {
    info!("Session from {} signing off", session.control_peer);
    session.closing = true;
    send_response(stream, b"221 Service closing control connection.\r\n").await
}
