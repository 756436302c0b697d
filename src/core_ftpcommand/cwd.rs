use crate::core_network::stream::ControlStream;
use crate::core_vfs::VfsCatalog;
use crate::helpers::send_response;
use crate::server::ServerContext;
use crate::session::Session;
use log::debug;
use std::io;
use std::sync::Arc;

/// Handles the CWD FTP command.
///
/// Changing directory abandons any half-done data channel negotiation; a
/// PRET grant refers to paths resolved against the old working directory.
pub async fn handle_cwd_command(
    stream: &mut ControlStream,
    ctx: &Arc<ServerContext>,
    session: &mut Session,
    arg: String,
) -> io::Result<()> {
    let target = VfsCatalog::resolve(&session.current_dir, arg.trim());
    if !ctx.catalog.is_dir(&target) {
        let reply = format!("550 {}: No such directory.\r\n", target);
        return send_response(stream, reply.as_bytes()).await;
    }

    session.channel.reset();
    session.current_dir = target;
    debug!(
        "Session {} changed directory to {}",
        session.control_peer, session.current_dir
    );
    let reply = format!("250 Directory changed to {}.\r\n", session.current_dir);
    send_response(stream, reply.as_bytes()).await
}
