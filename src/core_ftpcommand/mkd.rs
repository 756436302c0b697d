use crate::core_network::stream::ControlStream;
use crate::core_vfs::VfsCatalog;
use crate::helpers::send_response;
use crate::server::ServerContext;
use crate::session::Session;
use log::info;
use std::io;
use std::sync::Arc;

/// Handles the MKD FTP command.
///
/// Directories live only in the catalog; nodes never hear about them.
/// Creation is limited to areas where uploads are permitted.
pub async fn handle_mkd_command(
    stream: &mut ControlStream,
    ctx: &Arc<ServerContext>,
    session: &mut Session,
    arg: String,
) -> io::Result<()> {
    let path = VfsCatalog::resolve(&session.current_dir, arg.trim());

    let created = ctx
        .catalog
        .legal_upload_name(&path)
        .and_then(|_| {
            let (parent, _) = VfsCatalog::parent_and_name(&path);
            ctx.catalog.may_upload(&parent)
        })
        .and_then(|_| ctx.catalog.make_dir(&path, &session.username));

    match created {
        Ok(()) => {
            info!("{} created directory {}", session.username, path);
            let reply = format!("257 \"{}\" directory created.\r\n", path);
            send_response(stream, reply.as_bytes()).await
        }
        Err(e) => {
            let reply = format!("{}\r\n", e.to_ftp_response());
            send_response(stream, reply.as_bytes()).await
        }
    }
}
