use crate::core_channel::negotiator::ActiveAdvice;
use crate::core_network::stream::ControlStream;
use crate::helpers::send_response;
use crate::server::ServerContext;
use crate::session::Session;
use log::debug;
use std::io;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::Arc;

/// Handles the PORT FTP command.
///
/// The address is taken as given even when it looks wrong for this control
/// connection. A private target behind a different public address almost
/// always means a NATed client that forgot PASV, so the reply says as much
/// while still accepting the command.
pub async fn handle_port_command(
    stream: &mut ControlStream,
    _ctx: &Arc<ServerContext>,
    session: &mut Session,
    arg: String,
) -> io::Result<()> {
    let Some(peer) = parse_port_argument(&arg) else {
        return send_response(stream, b"501 Syntax: PORT h1,h2,h3,h4,p1,p2.\r\n").await;
    };

    debug!("Session {} requests active mode to {}", session.control_peer, peer);
    match session.channel.set_active(session.control_peer.ip(), peer) {
        ActiveAdvice::Clean => send_response(stream, b"200 PORT command successful.\r\n").await,
        ActiveAdvice::PrivateAddress => {
            let reply = format!(
                "200 PORT accepted, but {} is a private address; the data connection may fail.\r\n",
                peer.ip()
            );
            send_response(stream, reply.as_bytes()).await
        }
    }
}

fn parse_port_argument(arg: &str) -> Option<SocketAddrV4> {
    let fields: Vec<u8> = arg
        .trim()
        .split(',')
        .map(|f| f.trim().parse::<u8>())
        .collect::<Result<_, _>>()
        .ok()?;
    if fields.len() != 6 {
        return None;
    }
    let ip = Ipv4Addr::new(fields[0], fields[1], fields[2], fields[3]);
    let port = u16::from(fields[4]) << 8 | u16::from(fields[5]);
    if port == 0 {
        return None;
    }
    Some(SocketAddrV4::new(ip, port))
}
