// SPDX-License-Identifier: AGPL-3.0-or-later

//! Facade owning zero-or-more [`Session`]s, grounded in the teacher's
//! `Pool` (a `DashMap` keyed registry reached through an `Arc`, exposing a
//! `stats`-style summary instead of raw internals).

use std::net::SocketAddr;

use dashmap::DashMap;
use tracing::info;

use crate::{
    cfg::config::Config,
    error::{IpmiError, Result},
    session::{Session, SessionHandle},
};

#[derive(Debug, Clone)]
pub struct SessionStats {
    pub target: SocketAddr,
    pub tag: u64,
    pub observers: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ClientStats {
    pub sessions: Vec<SessionStats>,
}

/// Registry of live sessions. Holding a `Client` does not keep a session's
/// task alive by itself — each `Session` handle does that — but it gives a
/// single point to enumerate and tear down everything a caller opened.
#[derive(Default)]
pub struct Client {
    sessions: DashMap<SessionHandle, Session>,
}

impl Client {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn open(&self, target_host: &str, tag: u64, cfg: Config) -> Result<SessionHandle> {
        let session = Session::open(target_host, tag, cfg).await?;
        let handle = session.handle;
        info!(target = %handle.target, tag = handle.tag, "session opened");
        self.sessions.insert(handle, session);
        Ok(handle)
    }

    pub fn get(&self, handle: SessionHandle) -> Option<Session> {
        self.sessions.get(&handle).map(|s| s.clone())
    }

    pub async fn close(&self, handle: SessionHandle) -> Result<()> {
        let (_, session) = self.sessions.remove(&handle).ok_or(IpmiError::NoSession)?;
        session.close().await
    }

    pub fn stats(&self) -> ClientStats {
        let sessions = self
            .sessions
            .iter()
            .map(|entry| {
                let session = entry.value();
                SessionStats {
                    target: session.handle.target,
                    tag: session.handle.tag,
                    observers: session.subscribe_count(),
                }
            })
            .collect();
        ClientStats { sessions }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_client_reports_no_sessions() {
        let client = Client::new();
        let stats = client.stats();
        assert!(stats.sessions.is_empty());
    }

    #[test]
    fn close_on_unknown_handle_errors() {
        let client = Client::new();
        let handle = SessionHandle {
            target: "127.0.0.1:623".parse().unwrap(),
            tag: 1,
        };
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let result = rt.block_on(client.close(handle));
        assert!(result.is_err());
    }
}
