use crate::core_network::stream::ControlStream;
use crate::helpers::send_response;
use crate::server::ServerContext;
use crate::session::Session;
use std::io;
use std::sync::Arc;

/// Handles the NOOP FTP command.
pub async fn handle_noop_command(
    stream: &mut ControlStream,
    _ctx: &Arc<ServerContext>,
    _session: &mut Session,
    _arg: String,
) -> io::Result<()> {
    send_response(stream, b"200 NOOP command successful.\r\n").await
}
