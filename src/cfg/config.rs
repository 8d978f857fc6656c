// SPDX-License-Identifier: AGPL-3.0-or-later

//! Typed configuration, built the way the upstream `Config`/`LoginConfig`
//! pair is built: a struct with enumerated `with_*` setters and a single
//! `validate_and_normalize` pass, rather than an unordered option bag. No
//! file loader lives here — config-file parsing is out of scope — so the
//! struct carries no `serde` derive.

use std::{fmt, time::Duration};

use crate::error::{IpmiError, Result};

pub const DEFAULT_PORT: u16 = 623;
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_RQ_ADDR: u8 = 0x81;
pub const DEFAULT_INITIAL_OUTBOUND_SEQ_NR: u32 = 0x1337;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    Callback,
    User,
    Operator,
    Administrator,
}

impl Privilege {
    pub fn raw(self) -> u8 {
        match self {
            Privilege::Callback => 0x01,
            Privilege::User => 0x02,
            Privilege::Operator => 0x03,
            Privilege::Administrator => 0x04,
        }
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Privilege::Callback => "callback",
            Privilege::User => "user",
            Privilege::Operator => "operator",
            Privilege::Administrator => "administrator",
        })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub timeout: Duration,
    pub user: String,
    pub password: Vec<u8>,
    pub privilege: Privilege,
    pub rq_addr: u8,
    pub initial_outbound_seq_nr: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            user: String::new(),
            password: Vec::new(),
            privilege: Privilege::Administrator,
            rq_addr: DEFAULT_RQ_ADDR,
            initial_outbound_seq_nr: DEFAULT_INITIAL_OUTBOUND_SEQ_NR,
        }
    }
}

impl Config {
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn with_password(mut self, password: impl Into<Vec<u8>>) -> Self {
        self.password = password.into();
        self
    }

    pub fn with_privilege(mut self, privilege: Privilege) -> Self {
        self.privilege = privilege;
        self
    }

    pub fn with_rq_addr(mut self, rq_addr: u8) -> Self {
        self.rq_addr = rq_addr;
        self
    }

    pub fn with_initial_outbound_seq_nr(mut self, seq: u32) -> Self {
        self.initial_outbound_seq_nr = seq;
        self
    }

    /// Rejects out-of-range values the way the upstream
    /// `Config::validate_and_normalize` rejects bad negotiation settings.
    pub fn validate_and_normalize(&self) -> Result<()> {
        if self.user.as_bytes().len() > 16 {
            return Err(IpmiError::InvalidConfig(
                "user must be at most 16 bytes".into(),
            ));
        }
        if self.password.len() > 16 {
            return Err(IpmiError::InvalidConfig(
                "password must be at most 16 bytes".into(),
            ));
        }
        if !(0x81..=0x8D).contains(&self.rq_addr) {
            return Err(IpmiError::InvalidConfig(
                "rq_addr must be in 0x81..=0x8D".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_table() {
        let cfg = Config::default();
        assert_eq!(cfg.port, 623);
        assert_eq!(cfg.timeout, Duration::from_millis(1000));
        assert_eq!(cfg.rq_addr, 0x81);
        assert_eq!(cfg.initial_outbound_seq_nr, 0x1337);
        assert_eq!(cfg.privilege, Privilege::Administrator);
        cfg.validate_and_normalize().unwrap();
    }

    #[test]
    fn rejects_oversized_password() {
        let cfg = Config::default().with_password(vec![0u8; 17]);
        assert!(cfg.validate_and_normalize().is_err());
    }

    #[test]
    fn rejects_rq_addr_out_of_range() {
        let cfg = Config::default().with_rq_addr(0x01);
        assert!(cfg.validate_and_normalize().is_err());
    }

    #[test]
    fn builder_chains_apply_in_order() {
        let cfg = Config::default()
            .with_port(6230)
            .with_user("admin")
            .with_privilege(Privilege::Operator);
        assert_eq!(cfg.port, 6230);
        assert_eq!(cfg.user, "admin");
        assert_eq!(cfg.privilege, Privilege::Operator);
    }
}
