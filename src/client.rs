//! Interactive chat client.
//!
//! Each line of input becomes one connection-worth of exchange: connect,
//! send, receive, end, print the reply. An input line equal to the end
//! command (empty by default) stops the loop, as does end of input.

use std::io::{BufRead, Write};
use tracing::debug;

use crate::net::{Connection, NetError};

/// Client side of the one-message-per-connection protocol.
pub struct ChatClient {
    host: String,
    port: u16,
}

impl ChatClient {
    pub fn new(host: String, port: u16) -> Self {
        Self { host, port }
    }

    /// One full request/response exchange on a fresh connection.
    pub fn send_message(&self, message: &str) -> Result<String, NetError> {
        let mut conn = Connection::connect(&self.host, self.port)?;
        conn.send(message)?;
        let reply = conn.receive()?;
        conn.end()?;
        Ok(reply)
    }

    /// Read lines from `input` and exchange each one with the server
    /// until the end command (or end of input) is seen.
    ///
    /// Transport failures are terminal for the whole session — there is
    /// no retry.
    pub fn chat_loop<R, W>(&self, input: R, mut output: W, end_command: &str) -> Result<(), NetError>
    where
        R: BufRead,
        W: Write,
    {
        for line in input.lines() {
            let message = line?;
            if message == end_command {
                debug!("end command received, leaving chat");
                break;
            }

            let reply = self.send_message(&message)?;
            writeln!(output, "{reply}")?;
        }

        Ok(())
    }
}
