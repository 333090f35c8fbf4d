//! Ownership of the underlying stream socket.

use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use tracing::trace;

/// Owns exactly one stream socket and releases it exactly once.
///
/// The handle is released when the `Transport` is dropped, so callers
/// get scoped acquisition/release for free; `close` exists for the
/// cases where the release point should be explicit. Consuming `self`
/// makes a second close unrepresentable.
#[derive(Debug)]
pub struct Transport {
    socket: Socket,
}

impl Transport {
    /// Allocate a fresh IPv4 stream socket.
    pub fn new() -> io::Result<Self> {
        trace!("creating stream socket");
        let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))?;
        Ok(Self { socket })
    }

    /// Adopt an already-open socket, e.g. one handed off by `accept`.
    pub fn adopt(socket: Socket) -> Self {
        trace!("adopting accepted socket");
        Self { socket }
    }

    pub(crate) fn socket(&self) -> &Socket {
        &self.socket
    }

    pub(crate) fn socket_mut(&mut self) -> &mut Socket {
        &mut self.socket
    }

    /// Release the socket handle.
    pub fn close(self) {
        trace!("releasing socket");
        drop(self.socket);
    }
}
