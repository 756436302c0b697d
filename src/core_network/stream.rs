use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::server;

/// The control connection as seen by command handlers. Starts out plain and
/// is swapped for the TLS variant in place when AUTH TLS succeeds.
pub enum ControlStream {
    Plain(TcpStream),
    Secure(Box<server::TlsStream<TcpStream>>),
    /// Placeholder left behind while an AUTH upgrade owns the inner socket.
    Upgrading,
}

impl ControlStream {
    pub fn is_secure(&self) -> bool {
        matches!(self, ControlStream::Secure(_))
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        match self {
            ControlStream::Plain(s) => s.peer_addr(),
            ControlStream::Secure(s) => s.get_ref().0.peer_addr(),
            ControlStream::Upgrading => Err(detached()),
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        match self {
            ControlStream::Plain(s) => s.local_addr(),
            ControlStream::Secure(s) => s.get_ref().0.local_addr(),
            ControlStream::Upgrading => Err(detached()),
        }
    }
}

fn detached() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "control stream detached")
}

impl AsyncRead for ControlStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            ControlStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            ControlStream::Secure(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
            ControlStream::Upgrading => Poll::Ready(Err(detached())),
        }
    }
}

impl AsyncWrite for ControlStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            ControlStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            ControlStream::Secure(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
            ControlStream::Upgrading => Poll::Ready(Err(detached())),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            ControlStream::Plain(s) => Pin::new(s).poll_flush(cx),
            ControlStream::Secure(s) => Pin::new(s.as_mut()).poll_flush(cx),
            ControlStream::Upgrading => Poll::Ready(Err(detached())),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            ControlStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            ControlStream::Secure(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
            ControlStream::Upgrading => Poll::Ready(Err(detached())),
        }
    }
}

/// A master-held data connection, plain or wrapped per PROT. Only listings
/// flow through here; file bytes travel between node and client directly.
#[derive(Debug)]
pub enum DataStream {
    Plain(TcpStream),
    Secure(Box<server::TlsStream<TcpStream>>),
}

impl DataStream {
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        match self {
            DataStream::Plain(s) => s.peer_addr(),
            DataStream::Secure(s) => s.get_ref().0.peer_addr(),
        }
    }
}

impl AsyncRead for DataStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            DataStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            DataStream::Secure(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for DataStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            DataStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            DataStream::Secure(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            DataStream::Plain(s) => Pin::new(s).poll_flush(cx),
            DataStream::Secure(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            DataStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            DataStream::Secure(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}
