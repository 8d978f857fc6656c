// SPDX-License-Identifier: AGPL-3.0-or-later

//! IPMI v1.5 session header: the layer between the RMCP envelope and the
//! IPMI LAN message, carrying the session id/sequence and (for
//! authenticated sessions) a 16-byte auth code.

use md2::{Digest as _, Md2};
use md5::Md5;

use crate::error::{DecodeErrorKind, IpmiError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthType {
    None,
    Md2,
    Md5,
    Straight,
}

impl AuthType {
    pub fn raw(self) -> u8 {
        match self {
            AuthType::None => 0x00,
            AuthType::Md2 => 0x01,
            AuthType::Md5 => 0x02,
            AuthType::Straight => 0x04,
        }
    }

    pub fn from_raw(v: u8) -> Result<Self> {
        match v {
            0x00 => Ok(AuthType::None),
            0x01 => Ok(AuthType::Md2),
            0x02 => Ok(AuthType::Md5),
            0x04 => Ok(AuthType::Straight),
            _ => Err(IpmiError::DecodeError {
                reason: DecodeErrorKind::BadVersion,
            }),
        }
    }

    pub fn has_auth_code(self) -> bool {
        !matches!(self, AuthType::None)
    }
}

/// Right-pads `password` to 16 bytes, as used both by straight-password
/// auth and as an input to the MD2/MD5 digest.
fn pad_password(password: &[u8]) -> [u8; 16] {
    let mut padded = [0u8; 16];
    let n = password.len().min(16);
    padded[..n].copy_from_slice(&password[..n]);
    padded
}

/// Computes the 16-byte auth code for a session packet per the auth type.
/// `session_id` and `session_seq` are little-endian on the wire; digests
/// are taken over `session-id || password || payload || session-seq ||
/// password`.
pub fn compute_auth_code(
    auth_type: AuthType,
    session_id: u32,
    password: &[u8],
    payload: &[u8],
    session_seq: u32,
) -> Option<[u8; 16]> {
    match auth_type {
        AuthType::None => None,
        AuthType::Straight => Some(pad_password(password)),
        AuthType::Md5 => {
            let padded = pad_password(password);
            let mut hasher = Md5::new();
            hasher.update(session_id.to_le_bytes());
            hasher.update(padded);
            hasher.update(payload);
            hasher.update(session_seq.to_le_bytes());
            hasher.update(padded);
            let digest = hasher.finalize();
            let mut out = [0u8; 16];
            out.copy_from_slice(&digest);
            Some(out)
        },
        AuthType::Md2 => {
            let padded = pad_password(password);
            let mut hasher = Md2::new();
            hasher.update(session_id.to_le_bytes());
            hasher.update(padded);
            hasher.update(payload);
            hasher.update(session_seq.to_le_bytes());
            hasher.update(padded);
            let digest = hasher.finalize();
            let mut out = [0u8; 16];
            out.copy_from_slice(&digest);
            Some(out)
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHeader {
    pub auth_type: AuthType,
    pub session_seq: u32,
    pub session_id: u32,
    pub auth_code: Option<[u8; 16]>,
    pub payload_length: u8,
}

impl SessionHeader {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(11 + 16);
        out.push(self.auth_type.raw());
        out.extend_from_slice(&self.session_seq.to_le_bytes());
        out.extend_from_slice(&self.session_id.to_le_bytes());
        if self.auth_type.has_auth_code() {
            out.extend_from_slice(&self.auth_code.unwrap_or([0u8; 16]));
        }
        out.push(self.payload_length);
        out
    }

    pub fn decode(buf: &[u8]) -> Result<(Self, &[u8])> {
        let auth_type = AuthType::from_raw(*buf.first().ok_or(IpmiError::DecodeError {
            reason: DecodeErrorKind::BadLength,
        })?)?;
        let session_seq =
            u32::from_le_bytes(super::take(buf, 1, 4)?.try_into().expect("len checked"));
        let session_id =
            u32::from_le_bytes(super::take(buf, 5, 4)?.try_into().expect("len checked"));

        let mut offset = 9;
        let auth_code = if auth_type.has_auth_code() {
            let bytes = super::take(buf, offset, 16)?;
            let mut code = [0u8; 16];
            code.copy_from_slice(bytes);
            offset += 16;
            Some(code)
        } else {
            None
        };

        let payload_length = *super::take(buf, offset, 1)?.first().expect("len checked");
        offset += 1;

        Ok((
            Self {
                auth_type,
                session_seq,
                session_id,
                auth_code,
                payload_length,
            },
            &buf[offset..],
        ))
    }
}
