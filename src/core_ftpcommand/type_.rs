use crate::core_channel::negotiator::ReprType;
use crate::core_network::stream::ControlStream;
use crate::helpers::send_response;
use crate::server::ServerContext;
use crate::session::Session;
use std::io;
use std::sync::Arc;

/// Handles the TYPE FTP command.
///
/// Only ASCII and Image survive; the exotic RFC 959 types get 504. The
/// chosen type is sticky and is forwarded to the node with each transfer.
pub async fn handle_type_command(
    stream: &mut ControlStream,
    _ctx: &Arc<ServerContext>,
    session: &mut Session,
    arg: String,
) -> io::Result<()> {
    let response: &[u8] = match arg.trim().to_ascii_uppercase().as_str() {
        "A" | "A N" => {
            session.channel.repr_type = ReprType::Ascii;
            b"200 Type set to A.\r\n"
        }
        "I" | "L 8" => {
            session.channel.repr_type = ReprType::Image;
            b"200 Type set to I.\r\n"
        }
        _ => b"504 Command not implemented for that parameter.\r\n",
    };
    send_response(stream, response).await
}
