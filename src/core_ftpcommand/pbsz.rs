use crate::core_network::stream::ControlStream;
use crate::core_tls::TlsError;
use crate::helpers::send_response;
use crate::server::ServerContext;
use crate::session::Session;
use std::io;
use std::sync::Arc;

/// Handles the PBSZ FTP command. TLS frames its own records, so the only
/// acceptable protection buffer size is zero.
pub async fn handle_pbsz_command(
    stream: &mut ControlStream,
    ctx: &Arc<ServerContext>,
    _session: &mut Session,
    arg: String,
) -> io::Result<()> {
    if !ctx.security.has_tls() {
        let reply = format!("{}\r\n", TlsError::TlsNotConfigured.to_ftp_response());
        return send_response(stream, reply.as_bytes()).await;
    }
    let response: &[u8] = if arg.trim() == "0" {
        b"200 PBSZ=0\r\n"
    } else {
        b"501 PBSZ must be 0.\r\n"
    };
    send_response(stream, response).await
}
