use crate::core_network::stream::ControlStream;
use crate::helpers::send_response;
use crate::server::ServerContext;
use crate::session::Session;
use std::io;
use std::sync::Arc;

/// Handles the STRU FTP command. File structure only.
pub async fn handle_stru_command(
    stream: &mut ControlStream,
    _ctx: &Arc<ServerContext>,
    _session: &mut Session,
    arg: String,
) -> io::Result<()> {
    let response: &[u8] = if arg.trim().eq_ignore_ascii_case("F") {
        b"200 Structure set to F.\r\n"
    } else {
        b"504 Only file structure is supported.\r\n"
    };
    send_response(stream, response).await
}
