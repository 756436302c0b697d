use crate::core_network::stream::ControlStream;
use crate::helpers::send_response;
use crate::server::ServerContext;
use crate::session::Session;
use log::{info, warn};
use std::io;
use std::sync::Arc;

/// Handles the PASS FTP command.
///
/// Verifies the password for the name given with USER. An unknown user and
/// a bad password produce the identical 530.
pub async fn handle_pass_command(
    stream: &mut ControlStream,
    ctx: &Arc<ServerContext>,
    session: &mut Session,
    arg: String,
) -> io::Result<()> {
    if session.username.is_empty() {
        return send_response(stream, b"503 Login with USER first.\r\n").await;
    }
    if session.is_authenticated {
        return send_response(stream, b"503 Already logged in.\r\n").await;
    }

    match ctx.accounts.authenticate(&session.username, arg.trim()) {
        Ok(()) => {
            session.is_authenticated = true;
            let group = ctx
                .accounts
                .get(&session.username)
                .map(|a| a.group)
                .unwrap_or_default();
            info!(
                "User {} ({}) logged in from {}",
                session.username, group, session.control_peer
            );
            send_response(stream, b"230 User logged in, proceed.\r\n").await
        }
        Err(e) => {
            warn!(
                "Failed login for {:?} from {}",
                session.username, session.control_peer
            );
            let reply = format!("{}\r\n", e.to_ftp_response());
            send_response(stream, reply.as_bytes()).await
        }
    }
}
