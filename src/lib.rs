// SPDX-License-Identifier: AGPL-3.0-or-later

//! A pure-Rust client for IPMI-over-LAN (v1.5): discovery, session setup,
//! request/response correlation, and the FRU/SEL readers built on top.

pub mod cfg;
pub mod client;
pub mod codec;
pub mod discovery;
pub mod error;
pub mod events;
pub mod fru;
pub mod registry;
pub mod sel;
pub mod session;
pub mod transport;
pub mod utils;
