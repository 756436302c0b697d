use crate::core_network::stream::ControlStream;
use crate::helpers::send_response;
use crate::server::ServerContext;
use crate::session::Session;
use std::io;
use std::sync::Arc;

/// Handles the PWD FTP command.
pub async fn handle_pwd_command(
    stream: &mut ControlStream,
    _ctx: &Arc<ServerContext>,
    session: &mut Session,
    _arg: String,
) -> io::Result<()> {
    let reply = format!("257 \"{}\" is the current directory.\r\n", session.current_dir);
    send_response(stream, reply.as_bytes()).await
}
