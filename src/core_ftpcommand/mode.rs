use crate::core_network::stream::ControlStream;
use crate::helpers::send_response;
use crate::server::ServerContext;
use crate::session::Session;
use std::io;
use std::sync::Arc;

/// Handles the MODE FTP command. Stream is the only transfer mode the
/// nodes speak, so everything else is refused.
pub async fn handle_mode_command(
    stream: &mut ControlStream,
    _ctx: &Arc<ServerContext>,
    _session: &mut Session,
    arg: String,
) -> io::Result<()> {
    let response: &[u8] = if arg.trim().eq_ignore_ascii_case("S") {
        b"200 Mode set to S.\r\n"
    } else {
        b"504 Only stream mode is supported.\r\n"
    };
    send_response(stream, response).await
}
