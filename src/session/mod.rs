// SPDX-License-Identifier: AGPL-3.0-or-later

//! The Session: coordination point owning one Transport and one in-flight
//! registry, driven through its lifecycle states (§4.2).

pub mod session;
pub mod setup;
pub mod state;

pub use session::{Session, SessionHandle};
