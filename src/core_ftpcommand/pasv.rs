use crate::core_network::stream::ControlStream;
use crate::helpers::send_response;
use crate::server::ServerContext;
use crate::session::Session;
use log::debug;
use std::io;
use std::sync::Arc;

/// Handles the PASV FTP command.
///
/// PASV only works after PRET: the listener must open on whichever machine
/// will actually move the bytes, and only the PRET grant says which one
/// that is. The advertised address is the master's configured public
/// address for listings, or the node's external address for transfers.
pub async fn handle_pasv_command(
    stream: &mut ControlStream,
    ctx: &Arc<ServerContext>,
    session: &mut Session,
    _arg: String,
) -> io::Result<()> {
    match session
        .channel
        .begin_passive(&ctx.pool, ctx.pasv_ip, &ctx.registry)
        .await
    {
        Ok(endpoint) => {
            debug!(
                "Session {} passive endpoint {}",
                session.control_peer, endpoint
            );
            let octets = endpoint.ip().octets();
            let port = endpoint.port();
            let reply = format!(
                "227 Entering Passive Mode ({},{},{},{},{},{})\r\n",
                octets[0],
                octets[1],
                octets[2],
                octets[3],
                port >> 8,
                port & 0xff
            );
            send_response(stream, reply.as_bytes()).await
        }
        Err(e) => {
            let reply = format!("{}\r\n", e.to_ftp_response());
            send_response(stream, reply.as_bytes()).await
        }
    }
}
