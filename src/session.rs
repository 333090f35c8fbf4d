//! The authentication gate driven by the server's accept loop.
//!
//! Each accepted connection carries exactly one request, and the gate
//! decides the single reply (or the shutdown) from the current state:
//!
//! | state           | request         | reply           | next state      |
//! |-----------------|-----------------|-----------------|-----------------|
//! | unauthenticated | password        | approved prompt | authenticated   |
//! | unauthenticated | anything else   | declined        | unauthenticated |
//! | authenticated   | shutdown phrase | none, stop      | —               |
//! | authenticated   | anything else   | command prompt  | authenticated   |

use clap::ValueEnum;
use serde::Deserialize;
use tracing::info;

/// Server reply vocabulary, defined in one place and sent verbatim.
pub struct Reply;

impl Reply {
    pub const COMMAND_PROMPT: &'static str = "Please send command: ";
    pub const APPROVED: &'static str = "Approved. Please send command: ";
    pub const DECLINED: &'static str = "Declined";
}

/// Whether one successful authentication outlives its connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionPolicy {
    /// Every accepted connection starts unauthenticated.
    PerConnection,
    /// The first correct password flips a process-wide gate; later
    /// connections start out authenticated.
    ProcessWide,
}

/// What the accept loop should do with the current connection.
#[derive(Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Send this reply, then move on to the next connection.
    Reply(&'static str),
    /// Send nothing, half-close, and stop accepting.
    Shutdown,
}

/// The two-state authentication machine.
pub struct Gate {
    password: String,
    shutdown_phrase: String,
    policy: SessionPolicy,
    authenticated: bool,
}

impl Gate {
    pub fn new(password: String, shutdown_phrase: String, policy: SessionPolicy) -> Self {
        Self {
            password,
            shutdown_phrase,
            policy,
            authenticated: false,
        }
    }

    /// Reset state at the start of an accepted connection, per policy.
    pub fn begin_connection(&mut self) {
        if self.policy == SessionPolicy::PerConnection {
            self.authenticated = false;
        }
    }

    /// Decide the verdict for one inbound request.
    pub fn handle(&mut self, request: &str) -> Verdict {
        if !self.authenticated {
            if request == self.password {
                self.authenticated = true;
                info!("user authenticated");
                Verdict::Reply(Reply::APPROVED)
            } else {
                Verdict::Reply(Reply::DECLINED)
            }
        } else if request == self.shutdown_phrase {
            Verdict::Shutdown
        } else {
            Verdict::Reply(Reply::COMMAND_PROMPT)
        }
    }
}
