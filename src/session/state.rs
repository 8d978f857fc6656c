// SPDX-License-Identifier: AGPL-3.0-or-later

//! The Session's top-level lifecycle phase (§4.2). Setup sub-steps are
//! modeled separately in [`super::setup`]; this enum only tracks where the
//! Session itself sits: before, during, or after setup.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Closed,
    SettingUp,
    Active,
    Closing,
}
