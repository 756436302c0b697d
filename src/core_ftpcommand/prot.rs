use crate::core_network::stream::ControlStream;
use crate::core_tls::TlsError;
use crate::helpers::send_response;
use crate::server::ServerContext;
use crate::session::Session;
use log::debug;
use std::io;
use std::sync::Arc;

/// Handles the PROT FTP command.
///
/// P and C are the only levels with a meaning here. The setting is sticky:
/// it survives channel resets and applies to every subsequent data
/// connection, wherever it terminates.
pub async fn handle_prot_command(
    stream: &mut ControlStream,
    ctx: &Arc<ServerContext>,
    session: &mut Session,
    arg: String,
) -> io::Result<()> {
    if !ctx.security.has_tls() {
        let reply = format!("{}\r\n", TlsError::TlsNotConfigured.to_ftp_response());
        return send_response(stream, reply.as_bytes()).await;
    }

    let response: &[u8] = match arg.trim().to_ascii_uppercase().as_str() {
        "P" => {
            session.channel.encrypt_data = true;
            debug!("Session {} set data protection to private", session.control_peer);
            b"200 Data channel protection level set to P.\r\n"
        }
        "C" => {
            session.channel.encrypt_data = false;
            debug!("Session {} set data protection to clear", session.control_peer);
            b"200 Data channel protection level set to C.\r\n"
        }
        "S" | "E" => b"536 Requested protection level not supported.\r\n",
        _ => b"501 Syntax: PROT P|C.\r\n",
    };
    send_response(stream, response).await
}
