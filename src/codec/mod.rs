// SPDX-License-Identifier: AGPL-3.0-or-later

//! Total-function encode/decode between byte buffers and typed RMCP, ASF,
//! and IPMI LAN frames. Decoders never panic on malformed input; every
//! failure is reported as a [`crate::error::IpmiError::DecodeError`].

pub mod asf;
pub mod message;
pub mod rmcp;
pub mod session;

use crate::error::{DecodeErrorKind, IpmiError, Result};

/// Pull `n` bytes at `offset`, bounds-checked, reported as `bad_length`
/// rather than a panic on short buffers.
pub(crate) fn take<'a>(buf: &'a [u8], offset: usize, n: usize) -> Result<&'a [u8]> {
    buf.get(offset..offset + n).ok_or(IpmiError::DecodeError {
        reason: DecodeErrorKind::BadLength,
    })
}
