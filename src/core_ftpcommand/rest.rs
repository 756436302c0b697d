use crate::core_network::stream::ControlStream;
use crate::helpers::send_response;
use crate::server::ServerContext;
use crate::session::Session;
use std::io;
use std::sync::Arc;

/// Handles the REST FTP command.
///
/// A well-formed offset arms the next RETR or STOR; a malformed one gets
/// 501 and leaves any previously armed offset in place.
pub async fn handle_rest_command(
    stream: &mut ControlStream,
    _ctx: &Arc<ServerContext>,
    session: &mut Session,
    arg: String,
) -> io::Result<()> {
    match arg.trim().parse::<u64>() {
        Ok(offset) => {
            session.channel.set_restart_offset(offset);
            let reply = format!(
                "350 Restarting at {}. Send RETR or STOR to resume.\r\n",
                offset
            );
            send_response(stream, reply.as_bytes()).await
        }
        Err(_) => send_response(stream, b"501 Syntax error in parameters or arguments.\r\n").await,
    }
}
