// SPDX-License-Identifier: AGPL-3.0-or-later

//! ASF (Alert Standard Format) presence ping/pong, carried as the payload
//! of an RMCP class-0x06 frame.
//!
//! ```text
//! iana-enterprise:32-BE  message-type:8  message-tag:8  reserved:8  data-len:8  data...
//! ```

use bitflags::bitflags;

use crate::error::{DecodeErrorKind, IpmiError, Result};

pub const IANA_ENTERPRISE: u32 = 4542;

const TYPE_PING: u8 = 0x80;
const TYPE_PONG: u8 = 0x40;

bitflags! {
    /// "Supported entities" byte of an ASF pong payload.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SupportedEntities: u8 {
        const IPMI = 0b1000_0000;
    }
}

impl SupportedEntities {
    pub fn supports_ipmi(self) -> bool {
        self.contains(SupportedEntities::IPMI)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PongPayload {
    pub oem_iana: u32,
    pub oem_specific: u32,
    pub supported_entities: SupportedEntities,
    pub supported_interactions: u8,
}

impl PongPayload {
    pub const LEN: usize = 16;

    pub fn encode(&self) -> [u8; Self::LEN] {
        let mut buf = [0u8; Self::LEN];
        buf[0..4].copy_from_slice(&self.oem_iana.to_le_bytes());
        buf[4..8].copy_from_slice(&self.oem_specific.to_le_bytes());
        buf[8] = self.supported_entities.bits();
        buf[9] = self.supported_interactions;
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let buf = super::take(buf, 0, Self::LEN)?;
        Ok(Self {
            oem_iana: u32::from_le_bytes(buf[0..4].try_into().expect("len checked")),
            oem_specific: u32::from_le_bytes(buf[4..8].try_into().expect("len checked")),
            supported_entities: SupportedEntities::from_bits_truncate(buf[8]),
            supported_interactions: buf[9],
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsfMessageType {
    Ping,
    Pong(PongPayload),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsfMessage {
    pub message_tag: u8,
    pub message_type: AsfMessageType,
}

impl AsfMessage {
    pub fn ping(message_tag: u8) -> Self {
        Self {
            message_tag,
            message_type: AsfMessageType::Ping,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let (ty, data): (u8, Vec<u8>) = match &self.message_type {
            AsfMessageType::Ping => (TYPE_PING, Vec::new()),
            AsfMessageType::Pong(p) => (TYPE_PONG, p.encode().to_vec()),
        };
        let mut out = Vec::with_capacity(8 + data.len());
        out.extend_from_slice(&IANA_ENTERPRISE.to_be_bytes());
        out.push(ty);
        out.push(self.message_tag);
        out.push(0x00); // reserved
        out.push(data.len() as u8);
        out.extend_from_slice(&data);
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let head = super::take(buf, 0, 8)?;
        let iana = u32::from_be_bytes(head[0..4].try_into().expect("len checked"));
        if iana != IANA_ENTERPRISE {
            return Err(IpmiError::DecodeError {
                reason: DecodeErrorKind::BadVersion,
            });
        }
        let ty = head[4];
        let message_tag = head[5];
        let data_len = head[7] as usize;
        let data = super::take(buf, 8, data_len)?;

        let message_type = match ty {
            TYPE_PING => AsfMessageType::Ping,
            TYPE_PONG => AsfMessageType::Pong(PongPayload::decode(data)?),
            _ => {
                return Err(IpmiError::DecodeError {
                    reason: DecodeErrorKind::UnexpectedClass,
                });
            },
        };

        Ok(Self {
            message_tag,
            message_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_round_trips() {
        let msg = AsfMessage::ping(0xC8);
        let bytes = msg.encode();
        let decoded = AsfMessage::decode(&bytes).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn pong_ipmi_supported_bit() {
        let pong = PongPayload {
            oem_iana: IANA_ENTERPRISE,
            oem_specific: 0,
            supported_entities: SupportedEntities::from_bits_truncate(0x81),
            supported_interactions: 0,
        };
        assert!(pong.supported_entities.supports_ipmi());

        let msg = AsfMessage {
            message_tag: 0xC8,
            message_type: AsfMessageType::Pong(pong),
        };
        let bytes = msg.encode();
        let decoded = AsfMessage::decode(&bytes).unwrap();
        match decoded.message_type {
            AsfMessageType::Pong(p) => assert!(p.supported_entities.supports_ipmi()),
            _ => panic!("expected pong"),
        }
    }

    #[test]
    fn pong_without_ipmi_bit() {
        let pong = PongPayload {
            oem_iana: IANA_ENTERPRISE,
            oem_specific: 0,
            supported_entities: SupportedEntities::from_bits_truncate(0x01),
            supported_interactions: 0,
        };
        assert!(!pong.supported_entities.supports_ipmi());
    }

    #[test]
    fn bad_enterprise_rejected() {
        let mut bytes = AsfMessage::ping(1).encode();
        bytes[0] = 0xFF;
        assert!(AsfMessage::decode(&bytes).is_err());
    }
}
