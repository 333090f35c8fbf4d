//! Server-side socket: bind, listen, accept.

use std::io;
use std::net::SocketAddr;
use tracing::debug;

use super::connection::Connection;
use super::transport::Transport;
use super::{resolve_ipv4, NetError};

/// A listening socket producing one `Connection` per accepted peer.
///
/// The listener never sends or receives application data itself.
pub struct Listener {
    transport: Transport,
}

impl Listener {
    /// Create an unbound listener with a fresh socket.
    ///
    /// `SO_REUSEADDR` is set so a restart does not trip over sockets
    /// still in TIME_WAIT.
    pub fn new() -> Result<Self, NetError> {
        let transport = Transport::new()?;
        transport.socket().set_reuse_address(true)?;
        Ok(Self { transport })
    }

    /// Bind to the given host and port.
    pub fn bind(&self, host: &str, port: u16) -> Result<(), NetError> {
        let addr = resolve_ipv4(host, port)?;
        self.transport
            .socket()
            .bind(&addr.into())
            .map_err(|e| match e.kind() {
                io::ErrorKind::AddrInUse => NetError::AddressInUse(addr),
                io::ErrorKind::AddrNotAvailable | io::ErrorKind::InvalidInput => {
                    NetError::AddressInvalid(format!("{host}:{port}"))
                }
                _ => NetError::Io(e),
            })?;
        debug!(%addr, "bound");
        Ok(())
    }

    /// Start listening with the given pending-connection backlog.
    pub fn listen(&self, backlog: i32) -> Result<(), NetError> {
        self.transport.socket().listen(backlog)?;
        debug!(backlog, "listening");
        Ok(())
    }

    /// One-step bring-up: fresh socket, bind, listen.
    pub fn bind_and_listen(host: &str, port: u16, backlog: i32) -> Result<Self, NetError> {
        let listener = Self::new()?;
        listener.bind(host, port)?;
        listener.listen(backlog)?;
        Ok(listener)
    }

    /// Block until a peer connects, returning a connection that owns the
    /// accepted socket.
    pub fn accept(&self) -> Result<Connection, NetError> {
        debug!("accepting");
        let (socket, peer) = self.transport.socket().accept()?;
        debug!(peer = ?peer.as_socket(), "accepted");
        Ok(Connection::from_accepted(Transport::adopt(socket)))
    }

    /// The address actually bound, useful when port 0 was requested.
    pub fn local_addr(&self) -> Result<SocketAddr, NetError> {
        let addr = self.transport.socket().local_addr()?;
        addr.as_socket()
            .ok_or_else(|| NetError::AddressInvalid("listener address".to_string()))
    }

    /// Release the listening socket.
    pub fn close(self) {
        self.transport.close();
    }
}
