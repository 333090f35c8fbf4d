//! Blocking TCP transport with half-close framing.
//!
//! A message is transmitted in bounded chunks and terminated by shutting
//! down the write half of the connection; the receiver reads until EOF.
//! There is no length prefix or header on the wire — one connection
//! carries exactly one request/response exchange.

mod connection;
mod listener;
mod transport;

pub use connection::Connection;
pub use listener::Listener;

use std::fmt;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};

/// Size of one transmit/receive slice.
pub const CHUNK_SIZE: usize = 1024;

/// Errors surfaced by the transport layer.
#[derive(Debug)]
pub enum NetError {
    /// A send call accepted zero bytes for a non-empty chunk.
    ConnectionBroken,
    /// The requested bind address is already taken.
    AddressInUse(SocketAddr),
    /// The host/port pair did not resolve to a usable IPv4 address.
    AddressInvalid(String),
    /// The remote peer did not accept the connection.
    PeerUnreachable(String, io::Error),
    /// Any other socket-level failure.
    Io(io::Error),
}

impl fmt::Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetError::ConnectionBroken => {
                write!(f, "Socket connection broken: peer accepted zero bytes")
            }
            NetError::AddressInUse(addr) => write!(f, "Address {addr} already in use"),
            NetError::AddressInvalid(addr) => {
                write!(f, "Invalid or unresolvable address '{addr}'")
            }
            NetError::PeerUnreachable(addr, e) => {
                write!(f, "Failed to connect to {addr}: {e}")
            }
            NetError::Io(e) => write!(f, "Socket error: {e}"),
        }
    }
}

impl std::error::Error for NetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NetError::PeerUnreachable(_, e) | NetError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for NetError {
    fn from(e: io::Error) -> Self {
        NetError::Io(e)
    }
}

/// Resolve `host:port` to the first IPv4 address it names.
pub(crate) fn resolve_ipv4(host: &str, port: u16) -> Result<SocketAddr, NetError> {
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|_| NetError::AddressInvalid(format!("{host}:{port}")))?;

    addrs
        .find(|addr| addr.is_ipv4())
        .ok_or_else(|| NetError::AddressInvalid(format!("{host}:{port}")))
}
