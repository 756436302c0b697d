use crate::core_network::stream::ControlStream;
use crate::core_tls::TlsError;
use crate::helpers::send_response;
use crate::server::ServerContext;
use crate::session::Session;
use log::{error, info};
use std::io;
use std::sync::Arc;

/// Handles the AUTH FTP command.
///
/// The 234 goes out in plaintext, then the same socket is handed to the
/// TLS acceptor and put back into the session secured. If the handshake
/// dies the socket is unusable, so the error propagates and the
/// connection loop drops the session.
pub async fn handle_auth_command(
    stream: &mut ControlStream,
    ctx: &Arc<ServerContext>,
    session: &mut Session,
    arg: String,
) -> io::Result<()> {
    let mechanism = arg.trim().to_ascii_uppercase();
    if mechanism != "TLS" && mechanism != "SSL" {
        return send_response(stream, b"504 Only AUTH TLS is supported.\r\n").await;
    }
    if !ctx.security.has_tls() {
        let reply = format!("{}\r\n", TlsError::TlsNotConfigured.to_ftp_response());
        return send_response(stream, reply.as_bytes()).await;
    }
    if stream.is_secure() {
        return send_response(stream, b"503 Control connection is already protected.\r\n").await;
    }

    send_response(stream, b"234 AUTH TLS successful; proceed with handshake.\r\n").await?;

    match std::mem::replace(stream, ControlStream::Upgrading) {
        ControlStream::Plain(tcp) => match ctx.security.accept(tcp).await {
            Ok(tls) => {
                *stream = ControlStream::Secure(Box::new(tls));
                info!("Control connection from {} upgraded to TLS", session.control_peer);
                Ok(())
            }
            Err(e) => {
                error!(
                    "TLS upgrade failed for {}: {}",
                    session.control_peer, e
                );
                Err(io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
            }
        },
        other => {
            // is_secure() was checked above; put whatever it was back.
            *stream = other;
            send_response(stream, b"503 Control connection is already protected.\r\n").await
        }
    }
}
