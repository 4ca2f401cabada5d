//! Static user directory served by the fingerd binary.

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt::Write as _;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use fingerd::{Handler, Query};

/// One `[[users]]` entry from the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct UserEntry {
    pub name: String,
    #[serde(default)]
    pub full_name: String,
    pub plan: Option<String>,
}

/// Answers queries from a fixed list of users. Relay requests are refused.
pub struct Directory {
    users: Vec<UserEntry>,
}

impl Directory {
    pub fn new(users: Vec<UserEntry>) -> Self {
        Self { users }
    }

    /// Render the reply for `query`. Lines end with CRLF.
    pub fn reply(&self, query: &Query) -> String {
        let mut out = String::new();

        if query.is_relay() {
            out.push_str("finger: forwarding service denied.\r\n");
            return out;
        }

        if query.username.is_empty() {
            let _ = write!(out, "{:<16}{}\r\n", "Login", "Name");
            for user in &self.users {
                let _ = write!(out, "{:<16}{}\r\n", user.name, user.full_name);
            }
            return out;
        }

        match self.users.iter().find(|u| u.name == query.username) {
            Some(user) => {
                let _ = write!(out, "Login: {:<24}Name: {}\r\n", user.name, user.full_name);
                match &user.plan {
                    Some(plan) => {
                        out.push_str("Plan:\r\n");
                        for line in plan.lines() {
                            out.push_str(line);
                            out.push_str("\r\n");
                        }
                    }
                    None => out.push_str("No Plan.\r\n"),
                }
            }
            None => {
                let _ = write!(out, "finger: {}: no such user.\r\n", query.username);
            }
        }

        out
    }
}

#[async_trait]
impl Handler for Directory {
    async fn serve_finger(&self, w: &mut (dyn AsyncWrite + Send + Unpin), query: &Query) {
        let reply = self.reply(query);
        if let Err(e) = w.write_all(reply.as_bytes()).await {
            debug!(error = %e, user = %query.username, "Failed to write reply");
        }
    }
}
