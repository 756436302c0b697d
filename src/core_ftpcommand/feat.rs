use crate::core_network::stream::ControlStream;
use crate::helpers::send_response;
use crate::server::ServerContext;
use crate::session::Session;
use std::io;
use std::sync::Arc;

/// Handles the FEAT FTP command.
///
/// PRET is always advertised so distribution-aware clients negotiate
/// through it. The TLS features only appear when a certificate is loaded.
pub async fn handle_feat_command(
    stream: &mut ControlStream,
    ctx: &Arc<ServerContext>,
    _session: &mut Session,
    _arg: String,
) -> io::Result<()> {
    let mut reply = String::from("211-Extensions supported:\r\n PRET\r\n");
    if ctx.security.has_tls() {
        reply.push_str(" AUTH SSL\r\n PBSZ\r\n");
    }
    reply.push_str("211 End.\r\n");
    send_response(stream, reply.as_bytes()).await
}
