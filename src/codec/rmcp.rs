// SPDX-License-Identifier: AGPL-3.0-or-later

//! The 4-byte RMCP envelope that wraps both ASF and IPMI payloads.
//!
//! ```text
//!  byte 0   byte 1    byte 2     byte 3
//! +--------+--------+----------+-----------+
//! |version |reserved|sequence  |class      |
//! +--------+--------+----------+-----------+
//! ```
//!
//! The class byte's high bit marks an ACK frame (empty payload, no class
//! body); the low 7 bits select ASF (0x06) or IPMI (0x07).

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::{DecodeErrorKind, IpmiError, Result};

pub const RMCP_VERSION: u8 = 0x06;
const ACK_BIT: u8 = 0b1000_0000;
const CLASS_MASK: u8 = 0b0111_1111;

pub const NO_ACK_SEQUENCE: u8 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RmcpClass {
    Asf,
    Ipmi,
}

impl RmcpClass {
    fn raw(self) -> u8 {
        match self {
            RmcpClass::Asf => 0x06,
            RmcpClass::Ipmi => 0x07,
        }
    }

    fn from_raw(v: u8) -> Result<Self> {
        match v {
            0x06 => Ok(RmcpClass::Asf),
            0x07 => Ok(RmcpClass::Ipmi),
            _ => Err(IpmiError::DecodeError {
                reason: DecodeErrorKind::UnexpectedClass,
            }),
        }
    }
}

/// Wire-safe, zero-copy class byte: bit 7 is the ACK flag, bits 0..6 select
/// [`RmcpClass`].
#[repr(transparent)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct RawClassByte(u8);

impl RawClassByte {
    pub const fn raw(&self) -> u8 {
        self.0
    }

    pub const fn is_ack(&self) -> bool {
        (self.0 & ACK_BIT) != 0
    }

    pub fn class(&self) -> Result<RmcpClass> {
        RmcpClass::from_raw(self.0 & CLASS_MASK)
    }

    pub fn data(class: RmcpClass) -> Self {
        Self(class.raw())
    }

    pub fn ack(class: RmcpClass) -> Self {
        Self(class.raw() | ACK_BIT)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RmcpHeader {
    pub sequence: u8,
    pub class: RawClassByte,
}

impl RmcpHeader {
    pub const LEN: usize = 4;

    pub fn data(class: RmcpClass) -> Self {
        Self {
            sequence: NO_ACK_SEQUENCE,
            class: RawClassByte::data(class),
        }
    }

    pub fn data_with_ack(class: RmcpClass, sequence: u8) -> Self {
        Self {
            sequence,
            class: RawClassByte::data(class),
        }
    }

    pub fn ack(class: RmcpClass, sequence: u8) -> Self {
        Self {
            sequence,
            class: RawClassByte::ack(class),
        }
    }

    /// `true` when an ACK must be sent back for this frame (non-suppressed
    /// sequence and not itself an ACK).
    pub fn wants_ack(&self) -> bool {
        self.sequence != NO_ACK_SEQUENCE && !self.class.is_ack()
    }

    pub fn encode(&self) -> [u8; Self::LEN] {
        [RMCP_VERSION, 0x00, self.sequence, self.class.raw()]
    }

    pub fn decode(buf: &[u8]) -> Result<(Self, &[u8])> {
        let head = super::take(buf, 0, Self::LEN)?;
        if head[0] != RMCP_VERSION {
            return Err(IpmiError::DecodeError {
                reason: DecodeErrorKind::BadVersion,
            });
        }
        let class = RawClassByte(head[3]);
        // validate the class is recognized even if this frame is an ACK
        class.class()?;
        let header = Self {
            sequence: head[2],
            class,
        };
        Ok((header, &buf[Self::LEN..]))
    }
}
