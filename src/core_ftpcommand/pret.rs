use crate::core_channel::negotiator::{PretGrant, PretRequest};
use crate::core_network::stream::ControlStream;
use crate::core_vfs::VfsCatalog;
use crate::helpers::send_response;
use crate::server::ServerContext;
use crate::session::Session;
use log::debug;
use std::io;
use std::sync::Arc;

/// Handles the PRET FTP command.
///
/// PRET names the transfer the client is about to run so the master can
/// pick the storage node before PASV has to open a listener somewhere.
/// The argument is the upcoming command line, e.g. `PRET RETR a.bin`.
pub async fn handle_pret_command(
    stream: &mut ControlStream,
    ctx: &Arc<ServerContext>,
    session: &mut Session,
    arg: String,
) -> io::Result<()> {
    let trimmed = arg.trim();
    let (keyword, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((k, r)) => (k, r.trim()),
        None => (trimmed, ""),
    };

    let request = match keyword.to_ascii_uppercase().as_str() {
        "LIST" | "NLST" => PretRequest::Listing,
        "RETR" if !rest.is_empty() => {
            PretRequest::Download(VfsCatalog::resolve(&session.current_dir, rest))
        }
        "STOR" if !rest.is_empty() => {
            PretRequest::Upload(VfsCatalog::resolve(&session.current_dir, rest))
        }
        "APPE" => {
            return send_response(stream, b"502 APPE is not implemented.\r\n").await;
        }
        _ => {
            return send_response(stream, b"501 Syntax: PRET LIST|RETR path|STOR path.\r\n").await;
        }
    };

    match session
        .channel
        .pre_transfer_negotiate(request, &ctx.catalog, &ctx.selector)
    {
        Ok(PretGrant::Listing) => {
            debug!("Session {} pre-negotiated a listing", session.control_peer);
            send_response(
                stream,
                b"200 PRET accepted; the master will serve this listing.\r\n",
            )
            .await
        }
        Ok(PretGrant::Node(name)) => {
            let reply = format!("200 PRET accepted; node {} will handle the transfer.\r\n", name);
            send_response(stream, reply.as_bytes()).await
        }
        Err(e) => {
            let reply = format!("{}\r\n", e.to_ftp_response());
            send_response(stream, reply.as_bytes()).await
        }
    }
}
