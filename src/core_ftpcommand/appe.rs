use crate::core_network::stream::ControlStream;
use crate::core_transfer::TransferCommand;
use crate::helpers::send_response;
use crate::server::ServerContext;
use crate::session::Session;
use std::io;
use std::sync::Arc;

/// Handles the APPE FTP command. Appending to a remote file cannot be
/// reconciled with the manifest checks, so the orchestrator answers 502;
/// routing it through there keeps the channel-reset guarantee.
pub async fn handle_appe_command(
    stream: &mut ControlStream,
    ctx: &Arc<ServerContext>,
    session: &mut Session,
    arg: String,
) -> io::Result<()> {
    let target = arg.trim();
    if target.is_empty() {
        return send_response(stream, b"501 Syntax: APPE filename.\r\n").await;
    }
    ctx.orchestrator
        .execute(stream, session, TransferCommand::Appe, target)
        .await
}
