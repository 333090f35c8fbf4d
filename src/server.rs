//! Accept loop for the chat-gate server.
//!
//! Connections are handled one at a time: receive the single request,
//! run it through the gate, send the single reply, release the
//! connection. A shutdown-phrase request half-closes without a reply and
//! ends the loop. There is no per-connection error isolation — a
//! transport failure during one exchange is fatal to the whole loop.

use tracing::info;

use crate::config::Config;
use crate::net::{Listener, NetError};
use crate::session::{Gate, Verdict};

/// Server instance holding the bound listener and the gate.
pub struct Server {
    listener: Listener,
    gate: Gate,
}

impl Server {
    /// Bind and listen on the configured address.
    pub fn bind(config: &Config) -> Result<Self, NetError> {
        let listener = Listener::bind_and_listen(&config.host, config.port, config.backlog)?;
        let gate = Gate::new(
            config.password.clone(),
            config.shutdown_phrase.clone(),
            config.session_policy,
        );

        Ok(Server { listener, gate })
    }

    /// The address actually bound, useful when port 0 was requested.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, NetError> {
        self.listener.local_addr()
    }

    /// Accept and answer connections until the shutdown phrase arrives.
    pub fn run(mut self) -> Result<(), NetError> {
        info!(addr = %self.local_addr()?, "Server listening");

        loop {
            let mut conn = self.listener.accept()?;
            self.gate.begin_connection();

            let request = conn.receive()?;
            info!(%request, "request received");

            match self.gate.handle(&request) {
                Verdict::Reply(reply) => {
                    conn.send(reply)?;
                    conn.end()?;
                }
                Verdict::Shutdown => {
                    conn.end()?;
                    info!("shutdown phrase received, stopping");
                    break;
                }
            }
        }

        self.listener.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::Connection;
    use crate::session::{Reply, SessionPolicy};
    use std::thread;

    fn test_config(policy: SessionPolicy) -> Config {
        Config {
            host: "127.0.0.1".to_string(),
            port: 0,
            backlog: 5,
            password: "password1".to_string(),
            shutdown_phrase: "asdf".to_string(),
            session_policy: policy,
            end_command: String::new(),
            log_level: "info".to_string(),
        }
    }

    fn exchange(port: u16, message: &str) -> String {
        let mut conn = Connection::connect("127.0.0.1", port).unwrap();
        conn.send(message).unwrap();
        let reply = conn.receive().unwrap();
        conn.end().unwrap();
        reply
    }

    #[test]
    fn test_authenticate_command_and_shutdown() {
        let server = Server::bind(&test_config(SessionPolicy::ProcessWide)).unwrap();
        let port = server.local_addr().unwrap().port();
        let handle = thread::spawn(move || server.run());

        assert_eq!(exchange(port, "wrong"), Reply::DECLINED);
        assert_eq!(exchange(port, "password1"), Reply::APPROVED);
        assert_eq!(exchange(port, "ls"), Reply::COMMAND_PROMPT);
        // The shutdown phrase gets no reply, just the half-close.
        assert_eq!(exchange(port, "asdf"), "");

        handle.join().unwrap().unwrap();
    }

    #[test]
    fn test_per_connection_policy_forgets_authentication() {
        let server = Server::bind(&test_config(SessionPolicy::PerConnection)).unwrap();
        let port = server.local_addr().unwrap().port();
        // Under this policy the shutdown state is unreachable, so the
        // loop never exits; leave the thread parked in accept.
        thread::spawn(move || server.run());

        assert_eq!(exchange(port, "password1"), Reply::APPROVED);
        assert_eq!(exchange(port, "ls"), Reply::DECLINED);
    }
}
