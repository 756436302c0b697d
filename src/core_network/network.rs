//! Per-connection command loop.

use crate::constants::MAX_COMMAND_BYTES;
use crate::core_ftpcommand::ftpcommand::FtpCommand;
use crate::core_ftpcommand::handlers::initialize_command_handlers;
use crate::core_network::stream::ControlStream;
use crate::helpers::send_response;
use crate::server::ServerContext;
use crate::session::Session;
use log::trace;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

/// Runs one control connection to completion. Replies are written by the
/// handlers; this loop only reads lines, gates on login, and dispatches.
pub async fn handle_connection(
    ctx: Arc<ServerContext>,
    socket: TcpStream,
    peer: SocketAddr,
) -> io::Result<()> {
    let mut stream = ControlStream::Plain(socket);
    let mut session = Session::new(peer);

    let greeting = format!("220 {}\r\n", ctx.config.server.greeting);
    send_response(&mut stream, greeting.as_bytes()).await?;

    let handlers = initialize_command_handlers();
    let mut carry: Vec<u8> = Vec::new();

    loop {
        let line = match read_command_line(&mut stream, &mut carry).await? {
            Some(line) => line,
            None => break, // EOF
        };
        let (keyword, argument) = split_command(&line);
        if keyword.is_empty() {
            continue;
        }
        trace!(
            "{} -> {} {}",
            peer,
            keyword,
            if keyword.eq_ignore_ascii_case("PASS") {
                "****"
            } else {
                argument
            }
        );

        match FtpCommand::from_str(keyword) {
            None => {
                send_response(&mut stream, b"502 Command not implemented.\r\n").await?;
            }
            Some(command) if !session.is_authenticated && !command.allowed_before_login() => {
                send_response(&mut stream, b"530 Please log in with USER and PASS.\r\n").await?;
            }
            Some(command) => {
                // Registered for every FtpCommand variant.
                if let Some(handler) = handlers.get(&command) {
                    handler(&mut stream, &ctx, &mut session, argument.to_string()).await?;
                }
            }
        }

        if session.closing {
            break;
        }
    }
    Ok(())
}

/// Reads up to the next LF, tolerating commands split across reads and
/// multiple pipelined commands in one segment. Returns `None` on EOF.
async fn read_command_line(
    stream: &mut ControlStream,
    carry: &mut Vec<u8>,
) -> io::Result<Option<String>> {
    loop {
        if let Some(pos) = carry.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = carry.drain(..=pos).collect();
            while matches!(line.last(), Some(b'\r') | Some(b'\n')) {
                line.pop();
            }
            return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
        }
        if carry.len() > MAX_COMMAND_BYTES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "command line too long",
            ));
        }
        let mut buf = [0u8; 1024];
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        carry.extend_from_slice(&buf[..n]);
    }
}

fn split_command(line: &str) -> (&str, &str) {
    match line.split_once(' ') {
        Some((keyword, rest)) => (keyword.trim(), rest.trim()),
        None => (line.trim(), ""),
    }
}
