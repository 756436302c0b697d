use crate::core_network::stream::ControlStream;
use crate::core_transfer::TransferCommand;
use crate::helpers::send_response;
use crate::server::ServerContext;
use crate::session::Session;
use std::io;
use std::sync::Arc;

/// Handles the STOR FTP command.
pub async fn handle_stor_command(
    stream: &mut ControlStream,
    ctx: &Arc<ServerContext>,
    session: &mut Session,
    arg: String,
) -> io::Result<()> {
    let target = arg.trim();
    if target.is_empty() {
        return send_response(stream, b"501 Syntax: STOR filename.\r\n").await;
    }
    ctx.orchestrator
        .execute(stream, session, TransferCommand::Stor, target)
        .await
}
