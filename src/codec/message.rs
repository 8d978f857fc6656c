// SPDX-License-Identifier: AGPL-3.0-or-later

//! IPMI LAN message: the request/response layer riding inside the session
//! payload, addressed by (net-fn, LUN) and correlated by a 6-bit wrapping
//! requestor sequence.
//!
//! ```text
//! responder-addr  netfn:6/resp-lun:2  checksum1
//! requestor-addr  reqseq:6/req-lun:2  command  data...  checksum2
//! ```
//!
//! `checksum1` covers the two preceding bytes; `checksum2` covers every
//! byte from `requestor-addr` to the end of `data`. Both are two's
//! complement sums verified by summing to zero mod 256.

use crate::{
    error::{DecodeErrorKind, IpmiError, Result},
    utils::{checksum, checksum_valid},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lun {
    Zero,
    One,
    Two,
    Three,
}

impl Lun {
    pub fn value(self) -> u8 {
        match self {
            Lun::Zero => 0,
            Lun::One => 1,
            Lun::Two => 2,
            Lun::Three => 3,
        }
    }

    pub fn from_value(v: u8) -> Self {
        match v & 0b11 {
            0 => Lun::Zero,
            1 => Lun::One,
            2 => Lun::Two,
            _ => Lun::Three,
        }
    }
}

/// Net-fn/LUN byte: net-fn in bits 7..2, LUN in bits 1..0. A response
/// net-fn is always the paired request net-fn with bit 0 set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetFn(u8);

impl NetFn {
    pub const fn new(v: u8) -> Self {
        Self(v & 0x3F)
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    pub const fn is_response(self) -> bool {
        self.0 & 1 != 0
    }

    pub const fn response(self) -> Self {
        Self(self.0 | 1)
    }

    pub const fn request(self) -> Self {
        Self(self.0 & !1)
    }

    fn pack(self, lun: Lun) -> u8 {
        (self.0 << 2) | lun.value()
    }

    fn unpack(byte: u8) -> (Self, Lun) {
        (Self((byte >> 2) & 0x3F), Lun::from_value(byte))
    }
}

pub const NETFN_APP: NetFn = NetFn::new(0x06);
pub const NETFN_STORAGE: NetFn = NetFn::new(0x0A);
pub const NETFN_TRANSPORT: NetFn = NetFn::new(0x0C);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanMessage {
    pub responder_addr: u8,
    pub netfn: NetFn,
    pub responder_lun: Lun,
    pub requestor_addr: u8,
    pub requestor_seq: u8,
    pub requestor_lun: Lun,
    pub command: u8,
    pub data: Vec<u8>,
}

impl LanMessage {
    pub fn encode(&self) -> Vec<u8> {
        let head = [self.responder_addr, self.netfn.pack(self.responder_lun)];
        let checksum1 = checksum(&head);

        let mut tail =
            Vec::with_capacity(3 + self.data.len() + 1);
        tail.push(self.requestor_addr);
        tail.push((self.requestor_seq << 2) | self.requestor_lun.value());
        tail.push(self.command);
        tail.extend_from_slice(&self.data);
        let checksum2 = checksum(&tail);

        let mut out = Vec::with_capacity(head.len() + 1 + tail.len() + 1);
        out.extend_from_slice(&head);
        out.push(checksum1);
        out.extend_from_slice(&tail);
        out.push(checksum2);
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < 6 {
            return Err(IpmiError::DecodeError {
                reason: DecodeErrorKind::BadLength,
            });
        }
        if !checksum_valid(&buf[0..3]) {
            return Err(IpmiError::DecodeError {
                reason: DecodeErrorKind::BadChecksum,
            });
        }
        if !checksum_valid(&buf[3..]) {
            return Err(IpmiError::DecodeError {
                reason: DecodeErrorKind::BadChecksum,
            });
        }

        let responder_addr = buf[0];
        let (netfn, responder_lun) = NetFn::unpack(buf[1]);
        let requestor_addr = buf[3];
        let requestor_seq = buf[4] >> 2;
        let requestor_lun = Lun::from_value(buf[4]);
        let command = buf[5];
        let data = buf[6..buf.len() - 1].to_vec();

        Ok(Self {
            responder_addr,
            netfn,
            responder_lun,
            requestor_addr,
            requestor_seq,
            requestor_lun,
            command,
            data,
        })
    }

    /// The command's completion code is the first data byte of every IPMI
    /// response.
    pub fn completion_code(&self) -> Option<u8> {
        self.data.first().copied()
    }

    pub fn response_data(&self) -> &[u8] {
        self.data.get(1..).unwrap_or(&[])
    }
}
