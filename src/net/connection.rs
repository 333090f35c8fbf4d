//! One request/response exchange over a single connection.
//!
//! `send` transmits the message in `CHUNK_SIZE` slices and then
//! half-closes the write direction; that half-close is the only message
//! delimiter on the wire. `receive` mirrors it by reading until EOF and
//! concatenating every chunk seen.

use bytes::BytesMut;
use std::io::{self, Read};
use std::net::Shutdown;
use tracing::{debug, trace};

use super::transport::Transport;
use super::{resolve_ipv4, NetError, CHUNK_SIZE};

/// A connection used for one send/receive exchange.
///
/// Created either by actively connecting to a remote host/port, or by a
/// `Listener` accepting an inbound peer.
#[derive(Debug)]
pub struct Connection {
    transport: Transport,
    /// Set once the write half has been shut down, so `shutdown` and
    /// `end` stay safe to call after `send`.
    write_closed: bool,
}

impl Connection {
    /// Open a connection to a remote host and port.
    pub fn connect(host: &str, port: u16) -> Result<Self, NetError> {
        let addr = resolve_ipv4(host, port)?;
        let transport = Transport::new()?;
        transport
            .socket()
            .connect(&addr.into())
            .map_err(|e| NetError::PeerUnreachable(format!("{host}:{port}"), e))?;
        debug!(peer = %addr, "connected");

        Ok(Self {
            transport,
            write_closed: false,
        })
    }

    /// Wrap a socket accepted by a `Listener`.
    pub(crate) fn from_accepted(transport: Transport) -> Self {
        Self {
            transport,
            write_closed: false,
        }
    }

    /// Send one message and half-close the write direction.
    ///
    /// The half-close is what lets the peer's `receive` terminate, so it
    /// happens before this returns — releasing the handle is a separate,
    /// later step.
    pub fn send(&mut self, message: &str) -> Result<(), NetError> {
        let payload = message.as_bytes();
        debug!(bytes = payload.len(), "sending message");
        send_chunked(payload, |chunk| self.transport.socket().send(chunk))?;
        self.shutdown()?;
        debug!("all chunks sent");
        Ok(())
    }

    /// Read until the peer half-closes, then decode the whole message.
    ///
    /// An immediate EOF yields the empty string, not an error.
    pub fn receive(&mut self) -> Result<String, NetError> {
        let buf = recv_until_eof(|chunk| self.transport.socket_mut().read(chunk))?;
        let text = String::from_utf8(buf.to_vec())
            .map_err(|e| NetError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        debug!(bytes = text.len(), "message received");
        Ok(text)
    }

    /// Half-close the write direction. The peer can still drain buffered
    /// data but will then see EOF.
    pub fn shutdown(&mut self) -> Result<(), NetError> {
        if self.write_closed {
            return Ok(());
        }
        self.transport.socket().shutdown(Shutdown::Write)?;
        self.write_closed = true;
        trace!("write half closed");
        Ok(())
    }

    /// Release the underlying socket.
    pub fn close(self) {
        self.transport.close();
    }

    /// Half-close, then release the socket. The usual way to finish a
    /// one-shot exchange.
    pub fn end(mut self) -> Result<(), NetError> {
        self.shutdown()?;
        self.close();
        Ok(())
    }
}

/// Transmit `payload` in `CHUNK_SIZE` slices via `send`.
///
/// A send call that accepts zero bytes of a non-empty chunk means the
/// connection is gone; that fails immediately rather than retrying.
fn send_chunked<F>(payload: &[u8], mut send: F) -> Result<(), NetError>
where
    F: FnMut(&[u8]) -> io::Result<usize>,
{
    let mut sent = 0;
    while sent < payload.len() {
        let end = usize::min(sent + CHUNK_SIZE, payload.len());
        let accepted = send(&payload[sent..end])?;
        if accepted == 0 {
            return Err(NetError::ConnectionBroken);
        }
        sent += accepted;
        trace!(sent, total = payload.len(), "chunk sent");
    }
    Ok(())
}

/// Read `CHUNK_SIZE` slices via `recv` until EOF, concatenating every
/// chunk in arrival order.
fn recv_until_eof<F>(mut recv: F) -> Result<BytesMut, NetError>
where
    F: FnMut(&mut [u8]) -> io::Result<usize>,
{
    let mut message = BytesMut::with_capacity(CHUNK_SIZE);
    let mut chunk = [0u8; CHUNK_SIZE];

    loop {
        let n = recv(&mut chunk)?;
        if n == 0 {
            trace!(total = message.len(), "eof");
            break;
        }
        message.extend_from_slice(&chunk[..n]);
        trace!(received = n, "chunk received");
    }

    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::Listener;
    use std::collections::VecDeque;
    use std::thread;

    #[test]
    fn test_send_chunked_bounds_each_call() {
        let payload = vec![7u8; CHUNK_SIZE * 2 + 100];
        let mut calls = Vec::new();

        send_chunked(&payload, |chunk| {
            calls.push(chunk.len());
            Ok(chunk.len())
        })
        .unwrap();

        assert_eq!(calls, vec![CHUNK_SIZE, CHUNK_SIZE, 100]);
    }

    #[test]
    fn test_send_chunked_handles_partial_accepts() {
        let payload = vec![1u8; 10];
        let mut total = 0;

        // One byte accepted per call; the loop must still terminate with
        // every byte sent.
        send_chunked(&payload, |_| {
            total += 1;
            Ok(1)
        })
        .unwrap();

        assert_eq!(total, 10);
    }

    #[test]
    fn test_send_chunked_zero_accept_is_broken_connection() {
        let payload = vec![1u8; 10];
        let mut calls = 0;

        let err = send_chunked(&payload, |_| {
            calls += 1;
            Ok(0)
        })
        .unwrap_err();

        assert!(matches!(err, NetError::ConnectionBroken));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_send_chunked_empty_payload_sends_nothing() {
        send_chunked(&[], |_| panic!("send called for empty payload")).unwrap();
    }

    #[test]
    fn test_recv_until_eof_concatenates_in_order() {
        let mut script: VecDeque<&[u8]> = VecDeque::from([&b"abc"[..], &b"def"[..], &b""[..]]);

        let message = recv_until_eof(|buf| {
            let chunk = script.pop_front().unwrap();
            buf[..chunk.len()].copy_from_slice(chunk);
            Ok(chunk.len())
        })
        .unwrap();

        assert_eq!(&message[..], b"abcdef");
    }

    #[test]
    fn test_recv_until_eof_immediate_eof_is_empty() {
        let message = recv_until_eof(|_| Ok(0)).unwrap();
        assert!(message.is_empty());
    }

    fn echo_once(listener: Listener) -> thread::JoinHandle<String> {
        thread::spawn(move || {
            let mut conn = listener.accept().unwrap();
            let message = conn.receive().unwrap();
            conn.send(&message).unwrap();
            conn.end().unwrap();
            message
        })
    }

    fn round_trip(len: usize) {
        let listener = Listener::bind_and_listen("127.0.0.1", 0, 5).unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = echo_once(listener);

        let message: String = (0..len).map(|i| (b'a' + (i % 26) as u8) as char).collect();

        let mut conn = Connection::connect("127.0.0.1", port).unwrap();
        conn.send(&message).unwrap();
        let reply = conn.receive().unwrap();
        conn.end().unwrap();

        assert_eq!(reply, message);
        assert_eq!(server.join().unwrap(), message);
    }

    #[test]
    fn test_round_trip_empty() {
        round_trip(0);
    }

    #[test]
    fn test_round_trip_single_byte() {
        round_trip(1);
    }

    #[test]
    fn test_round_trip_exactly_one_chunk() {
        round_trip(CHUNK_SIZE);
    }

    #[test]
    fn test_round_trip_one_chunk_plus_one() {
        round_trip(CHUNK_SIZE + 1);
    }

    #[test]
    fn test_round_trip_many_chunks() {
        round_trip(CHUNK_SIZE * 4 + 321);
    }

    #[test]
    fn test_receive_after_peer_sends_nothing() {
        let listener = Listener::bind_and_listen("127.0.0.1", 0, 5).unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let conn = listener.accept().unwrap();
            // Half-close without sending a single byte.
            conn.end().unwrap();
        });

        let mut conn = Connection::connect("127.0.0.1", port).unwrap();
        assert_eq!(conn.receive().unwrap(), "");
        conn.close();
        server.join().unwrap();
    }

    #[test]
    fn test_end_after_send_is_safe() {
        let listener = Listener::bind_and_listen("127.0.0.1", 0, 5).unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let mut conn = listener.accept().unwrap();
            conn.receive().unwrap()
        });

        let mut conn = Connection::connect("127.0.0.1", port).unwrap();
        conn.send("hi").unwrap();
        // send already half-closed; end must not fail on the second
        // shutdown.
        conn.end().unwrap();
        assert_eq!(server.join().unwrap(), "hi");
    }
}
