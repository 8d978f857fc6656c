// SPDX-License-Identifier: AGPL-3.0-or-later

//! System Event Log reader: reserve, iterate, optionally clear (§4.5).

use crate::{
    codec::message::{LanMessage, NETFN_STORAGE},
    error::{CompletionCode, IpmiError, Result},
    session::Session,
};

const CMD_RESERVE_SEL: u8 = 0x42;
const CMD_GET_SEL_ENTRY: u8 = 0x43;
const CMD_CLEAR_SEL: u8 = 0x47;

const LAST_RECORD_ID: u16 = 0xFFFF;
const FIRST_RECORD_ID: u16 = 0x0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventDirection(pub bool);

#[derive(Debug, Clone)]
pub struct SelEntry {
    pub record_id: u16,
    pub record_type: u8,
    pub timestamp: u32,
    pub generator_id: u16,
    pub evm_rev: u8,
    pub sensor_type: u8,
    pub sensor_number: u8,
    pub event_direction: EventDirection,
    pub event_type: u8,
    pub event_data: [u8; 3],
}

impl SelEntry {
    /// Decodes the fixed 16-byte record per IPMI v1.5 §31.6. The leading two
    /// bytes (record id) are expected to already have been stripped by the
    /// caller, which needs them to drive iteration before the record itself
    /// is parsed.
    fn decode(record_id: u16, buf: &[u8]) -> Option<Self> {
        if buf.len() < 14 {
            return None;
        }
        let record_type = buf[0];
        let timestamp = u32::from_le_bytes([buf[1], buf[2], buf[3], buf[4]]);
        let generator_id = u16::from_le_bytes([buf[5], buf[6]]);
        let evm_rev = buf[7];
        let sensor_type = buf[8];
        let sensor_number = buf[9];
        let event_direction = EventDirection(buf[10] & 0x80 != 0);
        let event_type = buf[10] & 0x7F;
        let event_data = [buf[11], buf[12], buf[13]];

        Some(SelEntry {
            record_id,
            record_type,
            timestamp,
            generator_id,
            evm_rev,
            sensor_type,
            sensor_number,
            event_direction,
            event_type,
            event_data,
        })
    }
}

pub async fn read(session: &Session, clear: bool) -> Result<Vec<SelEntry>> {
    let reservation_id = reserve(session).await?;

    let mut entries = Vec::new();
    let mut record_id = FIRST_RECORD_ID;
    loop {
        let (next_id, entry) = get_entry(session, reservation_id, record_id).await?;
        if let Some(entry) = entry {
            entries.push(entry);
        }
        if next_id == LAST_RECORD_ID {
            break;
        }
        record_id = next_id;
    }

    if clear {
        clear_sel(session, reservation_id).await?;
    }

    Ok(entries)
}

async fn reserve(session: &Session) -> Result<u16> {
    let resp = session.request(NETFN_STORAGE, CMD_RESERVE_SEL, Vec::new()).await?;
    bmc_ok(&resp)?;
    let data = resp.response_data();
    if data.len() < 2 {
        return Err(IpmiError::UnsupportedFruData);
    }
    Ok(u16::from_le_bytes([data[0], data[1]]))
}

async fn get_entry(
    session: &Session,
    reservation_id: u16,
    record_id: u16,
) -> Result<(u16, Option<SelEntry>)> {
    let mut data = reservation_id.to_le_bytes().to_vec();
    data.extend_from_slice(&record_id.to_le_bytes());
    data.push(0x00); // offset into record
    data.push(0xFF); // bytes to read: 0xFF == entire record

    let resp = session.request(NETFN_STORAGE, CMD_GET_SEL_ENTRY, data).await?;
    bmc_ok(&resp)?;
    let body = resp.response_data();
    if body.len() < 2 {
        return Err(IpmiError::UnsupportedFruData);
    }
    let next_id = u16::from_le_bytes([body[0], body[1]]);
    let entry = SelEntry::decode(record_id, &body[2..]);
    Ok((next_id, entry))
}

async fn clear_sel(session: &Session, reservation_id: u16) -> Result<()> {
    let mut data = reservation_id.to_le_bytes().to_vec();
    data.extend_from_slice(b"CLR");
    data.push(0xAA); // initiate erase
    let resp = session.request(NETFN_STORAGE, CMD_CLEAR_SEL, data).await?;
    bmc_ok(&resp)
}

fn bmc_ok(resp: &LanMessage) -> Result<()> {
    match resp.completion_code() {
        Some(0x00) => Ok(()),
        Some(code) => Err(IpmiError::BmcError {
            code: CompletionCode::from_byte(code),
        }),
        None => Err(IpmiError::UnsupportedFruData),
    }
}
