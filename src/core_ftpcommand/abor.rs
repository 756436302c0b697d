use crate::core_network::stream::ControlStream;
use crate::helpers::send_response;
use crate::server::ServerContext;
use crate::session::Session;
use log::debug;
use std::io;
use std::sync::Arc;

/// Handles the ABOR FTP command.
///
/// Transfers run to completion on the node once started; the control
/// connection only sees ABOR between commands, so there is never anything
/// in flight to kill. Pending negotiation state is dropped, which closes
/// any unconsumed passive listener.
pub async fn handle_abor_command(
    stream: &mut ControlStream,
    _ctx: &Arc<ServerContext>,
    session: &mut Session,
    _arg: String,
) -> io::Result<()> {
    debug!("Session {} aborted its data channel", session.control_peer);
    session.channel.reset();
    send_response(stream, b"226 No transfer in progress; data channel cleared.\r\n").await
}
