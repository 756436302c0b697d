use crate::core_channel::ChannelError;
use crate::core_network::stream::ControlStream;
use crate::core_tls::ChannelSecurity;
use crate::core_vfs::{ListingRow, VfsCatalog};
use crate::helpers::send_response;
use crate::server::ServerContext;
use crate::session::Session;
use log::{debug, warn};
use std::io;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

/// Handles the LIST FTP command.
///
/// Listings are the only data the master serves itself; files always move
/// between the client and a storage node. The listing text comes straight
/// out of the catalog, so no node is contacted here.
pub async fn handle_list_command(
    stream: &mut ControlStream,
    ctx: &Arc<ServerContext>,
    session: &mut Session,
    arg: String,
) -> io::Result<()> {
    let trimmed = arg.trim();
    // "LIST -la" style options change nothing in the output.
    let target = if trimmed.is_empty() || trimmed.starts_with('-') {
        session.current_dir.clone()
    } else {
        VfsCatalog::resolve(&session.current_dir, trimmed)
    };

    let rows = match ctx.catalog.list_dir(&target) {
        Ok(rows) => rows,
        Err(e) => {
            session.channel.reset();
            let reply = format!("{}\r\n", e.to_ftp_response());
            return send_response(stream, reply.as_bytes()).await;
        }
    };

    send_response(
        stream,
        b"150 Opening data connection for directory listing.\r\n",
    )
    .await?;

    let sent = send_listing(&ctx.security, session, &rows).await;
    session.channel.reset();
    match sent {
        Ok(()) => {
            debug!("Sent {} listing rows for {}", rows.len(), target);
            send_response(stream, b"226 Transfer complete.\r\n").await
        }
        Err(e) => {
            warn!("Listing of {} failed: {}", target, e);
            let reply = format!("{}\r\n", e.to_ftp_response());
            send_response(stream, reply.as_bytes()).await
        }
    }
}

async fn send_listing(
    security: &ChannelSecurity,
    session: &mut Session,
    rows: &[ListingRow],
) -> Result<(), ChannelError> {
    let mut data = session.channel.accept_or_connect(security).await?;
    let mut text = String::new();
    for row in rows {
        text.push_str(&format_row(row));
    }
    data.write_all(text.as_bytes())
        .await
        .map_err(|e| ChannelError::ConnectFailed(e.to_string()))?;
    data.shutdown()
        .await
        .map_err(|e| ChannelError::ConnectFailed(e.to_string()))?;
    Ok(())
}

fn format_row(row: &ListingRow) -> String {
    let mode = if row.is_dir {
        "drwxr-xr-x"
    } else {
        "-rw-r--r--"
    };
    format!(
        "{} 1 {:<12} hub {:>12} {} {}\r\n",
        mode,
        row.owner,
        row.size,
        row.modified.format("%b %d %H:%M"),
        row.name
    )
}
