//! TCP socket operations consumed by the modem (spec §6): non-blocking
//! connect/send/recv/close behind a trait, so the modem's dial/listen/answer
//! logic can be exercised without a real socket.
//!
//! Generalized from a one-shot blocking `TcpStream::connect` into the
//! non-blocking, error-kind-aware shape the modem's tick pump needs.

use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};

use log::warn;

/// Outcome of a non-blocking socket operation that may legitimately have
/// nothing to report yet.
#[derive(Debug)]
pub enum IoOutcome<T> {
    /// The operation produced a value.
    Ready(T),
    /// Nothing available right now; not an error.
    WouldBlock,
    /// A fatal socket error; the caller should treat the connection as dead.
    Fatal(std::io::Error),
}

/// Non-blocking TCP operations, as consumed by [`crate::modem::device::ModemDevice`].
pub trait TcpSocketOps {
    /// Concrete connected-socket handle type.
    type Socket;
    /// Concrete listening-socket handle type.
    type Listener;

    /// Start a non-blocking connect to `host:port`. Connection completion is
    /// observed via a subsequent [`TcpSocketOps::take_connected`] or a write
    /// attempt; implementations may also connect synchronously and report it
    /// immediately via `Ready`.
    fn connect(&mut self, host: &str, port: u16) -> IoOutcome<Self::Socket>;

    /// Bind a listener on `port`.
    fn listen(&mut self, port: u16) -> std::io::Result<Self::Listener>;

    /// Non-blocking accept; `WouldBlock` if nothing pending.
    fn accept(&mut self, listener: &mut Self::Listener) -> IoOutcome<Self::Socket>;

    /// Non-blocking read into `buf`. `Ready(n)` with `n == 0` means EOF.
    fn recv(&mut self, socket: &mut Self::Socket, buf: &mut [u8]) -> IoOutcome<usize>;

    /// Best-effort write; returns bytes actually written.
    fn send(&mut self, socket: &mut Self::Socket, buf: &[u8]) -> IoOutcome<usize>;

    /// Tear down a connected socket.
    fn close(&mut self, socket: Self::Socket);
}

/// Real [`TcpSocketOps`] over [`std::net::TcpStream`]/[`std::net::TcpListener`].
#[derive(Debug, Default)]
pub struct StdTcpSocketOps;

fn classify_io_error<T>(e: std::io::Error) -> IoOutcome<T> {
    if e.kind() == ErrorKind::WouldBlock {
        IoOutcome::WouldBlock
    } else {
        IoOutcome::Fatal(e)
    }
}

impl TcpSocketOps for StdTcpSocketOps {
    type Socket = TcpStream;
    type Listener = TcpListener;

    fn connect(&mut self, host: &str, port: u16) -> IoOutcome<Self::Socket> {
        let addr: SocketAddr = match (host, port).to_socket_addrs().ok().and_then(|mut a| a.next()) {
            Some(addr) => addr,
            None => {
                warn!("modem dial: could not resolve {host}:{port}");
                return IoOutcome::Fatal(std::io::Error::new(ErrorKind::NotFound, "unresolvable host"));
            }
        };
        match TcpStream::connect(addr) {
            Ok(stream) => {
                if let Err(e) = stream.set_nonblocking(true) {
                    return IoOutcome::Fatal(e);
                }
                IoOutcome::Ready(stream)
            }
            Err(e) => classify_io_error(e),
        }
    }

    fn listen(&mut self, port: u16) -> std::io::Result<Self::Listener> {
        let listener = TcpListener::bind(("0.0.0.0", port))?;
        listener.set_nonblocking(true)?;
        Ok(listener)
    }

    fn accept(&mut self, listener: &mut Self::Listener) -> IoOutcome<Self::Socket> {
        match listener.accept() {
            Ok((stream, _addr)) => match stream.set_nonblocking(true) {
                Ok(()) => IoOutcome::Ready(stream),
                Err(e) => IoOutcome::Fatal(e),
            },
            Err(e) => classify_io_error(e),
        }
    }

    fn recv(&mut self, socket: &mut Self::Socket, buf: &mut [u8]) -> IoOutcome<usize> {
        match socket.read(buf) {
            Ok(n) => IoOutcome::Ready(n),
            Err(e) => classify_io_error(e),
        }
    }

    fn send(&mut self, socket: &mut Self::Socket, buf: &[u8]) -> IoOutcome<usize> {
        match socket.write(buf) {
            Ok(n) => IoOutcome::Ready(n),
            Err(e) => classify_io_error(e),
        }
    }

    fn close(&mut self, socket: Self::Socket) {
        let _ = socket.shutdown(std::net::Shutdown::Both);
        drop(socket);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_to_closed_port_is_fatal_not_would_block() {
        let mut ops = StdTcpSocketOps;
        // Port 0 is never listening; connect should fail fast (refused or
        // unreachable), never silently hang as WouldBlock.
        match ops.connect("127.0.0.1", 1) {
            IoOutcome::Fatal(_) => {}
            other => panic!("expected a fatal connect error, got {other:?}"),
        }
    }

    #[test]
    fn listen_then_accept_with_nothing_pending_would_block() {
        let mut ops = StdTcpSocketOps;
        let mut listener = ops.listen(0).expect("bind ephemeral port");
        match ops.accept(&mut listener) {
            IoOutcome::WouldBlock => {}
            other => panic!("expected WouldBlock with no pending connection, got {other:?}"),
        }
    }
}
