// SPDX-License-Identifier: AGPL-3.0-or-later

//! FRU (Field Replaceable Unit) inventory reader: chunked reads of the
//! inventory area followed by lenient, per-section decoding (§4.4).

use crate::{
    codec::message::NETFN_STORAGE,
    error::{CompletionCode, IpmiError, Result},
    session::Session,
    utils::checksum_valid,
};

const CMD_GET_FRU_INVENTORY_AREA_INFO: u8 = 0x10;
const CMD_READ_FRU_DATA: u8 = 0x11;
const MAX_READ_BLOCK: usize = 23;

const SENTINEL: u8 = 0xC1;

#[derive(Debug, Clone, Default)]
pub struct FruInfo {
    pub chassis_area: Option<ChassisArea>,
    pub board_area: Option<BoardArea>,
    pub product_area: Option<ProductArea>,
    pub multi_records: Vec<MultiRecord>,
}

#[derive(Debug, Clone)]
pub struct ChassisArea {
    pub chassis_type: u8,
    pub part_number: Option<String>,
    pub serial_number: Option<String>,
    pub custom: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct BoardArea {
    pub language: u8,
    pub manufacturing_date: u32,
    pub manufacturer: Option<String>,
    pub name: Option<String>,
    pub serial_number: Option<String>,
    pub part_number: Option<String>,
    pub fru_file_id: Option<String>,
    pub custom: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ProductArea {
    pub language: u8,
    pub manufacturer: Option<String>,
    pub name: Option<String>,
    pub part_number: Option<String>,
    pub version: Option<String>,
    pub serial_number: Option<String>,
    pub asset_tag: Option<String>,
    pub fru_file_id: Option<String>,
    pub custom: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum MultiRecord {
    PowerSupply(PowerSupplyRecord),
    DcOutput(DcOutputRecord),
    DcLoad(DcLoadRecord),
    ManagementAccess(Vec<u8>),
    BaseCompatibility(CompatibilityRecord),
    ExtendedCompatibility(CompatibilityRecord),
}

/// `None` reads as "unspecified" per the sentinel values named in §4.4.
fn unspecified_u16(v: u16) -> Option<u16> {
    if v == 0 || v == 0xFFFF { None } else { Some(v) }
}

#[derive(Debug, Clone)]
pub struct PowerSupplyRecord {
    pub overall_capacity_watts: u16,
    pub peak_va: Option<u16>,
    pub nominal_voltage_centivolts: u16,
}

#[derive(Debug, Clone)]
pub struct DcOutputRecord {
    pub output_number: u8,
    pub nominal_voltage_centivolts: i16,
    pub max_current_milliamps: Option<u16>,
}

#[derive(Debug, Clone)]
pub struct DcLoadRecord {
    pub output_number: u8,
    pub nominal_voltage_centivolts: i16,
    pub min_current_milliamps: Option<u16>,
}

#[derive(Debug, Clone)]
pub struct CompatibilityRecord {
    pub manufacturer_id: u32,
    pub entity_id: u8,
    pub compatibility_base: u8,
    pub code_start: u8,
    pub compatible_codes: Vec<u8>,
}

pub async fn read(session: &Session, fru_id: u8) -> Result<Option<FruInfo>> {
    let area_info = match get_inventory_area_info(session, fru_id).await {
        Ok(info) => info,
        Err(IpmiError::BmcError {
            code: CompletionCode::ParameterOutOfRange,
        }) => return Ok(None),
        Err(e) => return Err(e),
    };

    let data = read_all(session, fru_id, area_info).await?;
    Ok(Some(decode(&data)?))
}

struct AreaInfo {
    size_units: u16,
    access_by_words: bool,
}

async fn get_inventory_area_info(session: &Session, fru_id: u8) -> Result<AreaInfo> {
    let resp = session
        .request(NETFN_STORAGE, CMD_GET_FRU_INVENTORY_AREA_INFO, vec![fru_id])
        .await?;
    bmc_ok(&resp)?;
    let data = resp.response_data();
    if data.len() < 3 {
        return Err(IpmiError::UnsupportedFruData);
    }
    let size_units = u16::from_le_bytes([data[0], data[1]]);
    let access_by_words = data[2] & 0x01 != 0;
    Ok(AreaInfo {
        size_units,
        access_by_words,
    })
}

fn bmc_ok(resp: &crate::codec::message::LanMessage) -> Result<()> {
    match resp.completion_code() {
        Some(0x00) => Ok(()),
        Some(code) => Err(IpmiError::BmcError {
            code: CompletionCode::from_byte(code),
        }),
        None => Err(IpmiError::UnsupportedFruData),
    }
}

async fn read_all(session: &Session, fru_id: u8, area: AreaInfo) -> Result<Vec<u8>> {
    let size_bytes = if area.access_by_words {
        area.size_units as usize * 2
    } else {
        area.size_units as usize
    };
    let block = if area.access_by_words {
        MAX_READ_BLOCK / 2
    } else {
        MAX_READ_BLOCK
    };

    let mut out = Vec::with_capacity(size_bytes);
    let mut offset = 0usize;
    while offset < size_bytes {
        let want = block.min(size_bytes - offset);
        let (offset_field, count_field) = if area.access_by_words {
            ((offset / 2) as u16, want as u16 / 2)
        } else {
            (offset as u16, want as u16)
        };

        let mut data = vec![fru_id];
        data.extend_from_slice(&offset_field.to_le_bytes());
        data.push(count_field as u8);

        let resp = session.request(NETFN_STORAGE, CMD_READ_FRU_DATA, data).await?;
        bmc_ok(&resp)?;
        let body = resp.response_data();
        let count_returned = *body.first().ok_or(IpmiError::UnsupportedFruData)? as usize;
        let bytes = body.get(1..1 + count_returned).ok_or(IpmiError::UnsupportedFruData)?;
        if bytes.is_empty() {
            break;
        }
        out.extend_from_slice(bytes);
        offset += bytes.len();
    }
    Ok(out)
}

pub fn decode(buf: &[u8]) -> Result<FruInfo> {
    if buf.len() < 8 {
        return Err(IpmiError::IncorrectHeaderChecksum);
    }
    let header = &buf[0..8];
    if !checksum_valid(header) {
        return Err(IpmiError::IncorrectHeaderChecksum);
    }

    let offsets = [header[1], header[2], header[3], header[4], header[5]];
    let mut info = FruInfo::default();

    let sorted_nonzero: Vec<usize> = {
        let mut v: Vec<usize> = offsets.iter().filter(|o| **o != 0).map(|o| *o as usize).collect();
        v.sort_unstable();
        v
    };

    let area_bytes = |offset_units: usize| -> Option<&[u8]> {
        if offset_units == 0 {
            return None;
        }
        let start = offset_units * 8;
        let end = sorted_nonzero
            .iter()
            .find(|o| **o > offset_units)
            .map(|o| o * 8)
            .unwrap_or(buf.len());
        buf.get(start..end.min(buf.len()))
    };

    if let Some(area) = area_bytes(offsets[1] as usize) {
        if checksum_valid(area) {
            info.chassis_area = decode_chassis(area).ok();
        }
    }
    if let Some(area) = area_bytes(offsets[2] as usize) {
        if checksum_valid(area) {
            info.board_area = decode_board(area).ok();
        }
    }
    if let Some(area) = area_bytes(offsets[3] as usize) {
        if checksum_valid(area) {
            info.product_area = decode_product(area).ok();
        }
    }
    if let Some(area) = area_bytes(offsets[4] as usize) {
        info.multi_records = decode_multi_records(area);
    }

    Ok(info)
}

/// Decodes one type/length-encoded field list starting at `buf[0]`, honoring
/// the `0xC1` sentinel (property 6). Returns the decoded fields and the
/// number of bytes consumed, including the sentinel byte.
fn decode_fields(buf: &[u8], language: u8) -> (Vec<Option<String>>, usize) {
    let mut fields = Vec::new();
    let mut offset = 0;
    while offset < buf.len() {
        let type_len = buf[offset];
        if type_len == SENTINEL {
            offset += 1;
            break;
        }
        let field_type = type_len >> 6;
        let len = (type_len & 0x3F) as usize;
        offset += 1;
        let Some(bytes) = buf.get(offset..offset + len) else {
            break;
        };
        offset += len;

        if len == 0 {
            fields.push(None);
        } else {
            fields.push(Some(decode_field_text(field_type, bytes, language)));
        }
    }
    (fields, offset)
}

fn decode_field_text(field_type: u8, bytes: &[u8], language: u8) -> String {
    match field_type {
        0 => bytes.iter().map(|b| format!("{b:02x}")).collect(),
        1 => bytes
            .iter()
            .flat_map(|b| [b >> 4, b & 0x0F])
            .map(bcd_plus_char)
            .collect(),
        2 => decode_six_bit_ascii(bytes),
        3 => {
            if language == 0 || language == 25 {
                String::from_utf8_lossy(bytes).into_owned()
            } else {
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|c| u16::from_le_bytes([c[0], c[1]]))
                    .collect();
                String::from_utf16_lossy(&units)
            }
        },
        _ => unreachable!("field_type is masked to 2 bits"),
    }
}

fn bcd_plus_char(nibble: u8) -> char {
    match nibble {
        0x0..=0x9 => (b'0' + nibble) as char,
        0xA => ' ',
        0xB => '-',
        0xC => '.',
        _ => '?',
    }
}

fn decode_six_bit_ascii(bytes: &[u8]) -> String {
    let mut out = String::new();
    for chunk in bytes.chunks(3) {
        let mut buf = [0u8; 3];
        buf[..chunk.len()].copy_from_slice(chunk);
        let packed = (buf[2] as u32) << 16 | (buf[1] as u32) << 8 | buf[0] as u32;
        for i in 0..4 {
            let six = ((packed >> (i * 6)) & 0x3F) as u8;
            out.push((six + 0x20) as char);
        }
    }
    out.truncate((bytes.len() * 8).div_ceil(6));
    out
}

fn decode_chassis(area: &[u8]) -> Result<ChassisArea> {
    if area.len() < 4 {
        return Err(IpmiError::UnsupportedFruData);
    }
    let chassis_type = area[2];
    let (fields, _) = decode_fields(&area[3..area.len() - 1], 0);
    let mut it = fields.into_iter();
    let part_number = it.next().flatten();
    let serial_number = it.next().flatten();
    let custom = it.flatten().collect();

    Ok(ChassisArea {
        chassis_type,
        part_number,
        serial_number,
        custom,
    })
}

fn decode_board(area: &[u8]) -> Result<BoardArea> {
    if area.len() < 7 {
        return Err(IpmiError::UnsupportedFruData);
    }
    let language = area[2];
    let manufacturing_date =
        u32::from(area[3]) | (u32::from(area[4]) << 8) | (u32::from(area[5]) << 16);
    let (fields, _) = decode_fields(&area[6..area.len() - 1], language);
    let mut it = fields.into_iter();
    let manufacturer = it.next().flatten();
    let name = it.next().flatten();
    let serial_number = it.next().flatten();
    let part_number = it.next().flatten();
    let fru_file_id = it.next().flatten();
    let custom = it.flatten().collect();

    Ok(BoardArea {
        language,
        manufacturing_date,
        manufacturer,
        name,
        serial_number,
        part_number,
        fru_file_id,
        custom,
    })
}

fn decode_product(area: &[u8]) -> Result<ProductArea> {
    if area.len() < 4 {
        return Err(IpmiError::UnsupportedFruData);
    }
    let language = area[2];
    let (fields, _) = decode_fields(&area[3..area.len() - 1], language);
    let mut it = fields.into_iter();
    let manufacturer = it.next().flatten();
    let name = it.next().flatten();
    let part_number = it.next().flatten();
    let version = it.next().flatten();
    let serial_number = it.next().flatten();
    let asset_tag = it.next().flatten();
    let fru_file_id = it.next().flatten();
    let custom = it.flatten().collect();

    Ok(ProductArea {
        language,
        manufacturer,
        name,
        part_number,
        version,
        serial_number,
        asset_tag,
        fru_file_id,
        custom,
    })
}

fn decode_multi_records(mut buf: &[u8]) -> Vec<MultiRecord> {
    let mut records = Vec::new();
    loop {
        if buf.len() < 5 {
            break;
        }
        let record_type = buf[0];
        let end_of_list = buf[1] & 0x80 != 0;
        let len = buf[2] as usize;
        let payload_checksum = buf[3];
        let header = &buf[0..4];

        if !checksum_valid(&[header, &[buf[4]]].concat()) {
            // bad header checksum: subsequent offsets are unreliable
            break;
        }

        let Some(payload) = buf.get(5..5 + len) else {
            break;
        };
        let mut payload_with_checksum = payload.to_vec();
        payload_with_checksum.push(payload_checksum);

        if checksum_valid(&payload_with_checksum) {
            if let Some(record) = decode_record(record_type, payload) {
                records.push(record);
            }
        }

        if end_of_list {
            break;
        }
        buf = &buf[5 + len..];
    }
    records
}

fn decode_record(record_type: u8, payload: &[u8]) -> Option<MultiRecord> {
    match record_type {
        0x00 if payload.len() >= 4 => Some(MultiRecord::PowerSupply(PowerSupplyRecord {
            overall_capacity_watts: u16::from_le_bytes([payload[0], payload[1]]),
            peak_va: unspecified_u16(u16::from_le_bytes([payload[2], payload[3]])),
            nominal_voltage_centivolts: payload.get(4..6).map_or(0, |b| u16::from_le_bytes([b[0], b[1]])),
        })),
        0x01 if payload.len() >= 5 => Some(MultiRecord::DcOutput(DcOutputRecord {
            output_number: payload[0] & 0x0F,
            nominal_voltage_centivolts: i16::from_le_bytes([payload[1], payload[2]]),
            max_current_milliamps: unspecified_u16(u16::from_le_bytes([payload[3], payload[4]])),
        })),
        0x02 if payload.len() >= 5 => Some(MultiRecord::DcLoad(DcLoadRecord {
            output_number: payload[0] & 0x0F,
            nominal_voltage_centivolts: i16::from_le_bytes([payload[1], payload[2]]),
            min_current_milliamps: unspecified_u16(u16::from_le_bytes([payload[3], payload[4]])),
        })),
        0x03 => Some(MultiRecord::ManagementAccess(payload.to_vec())),
        0x04 if payload.len() >= 6 => {
            Some(MultiRecord::BaseCompatibility(decode_compatibility(payload)))
        },
        0x05 if payload.len() >= 6 => Some(MultiRecord::ExtendedCompatibility(decode_compatibility(
            payload,
        ))),
        _ => None,
    }
}

/// Compatibility code bitmap expansion (property tested by seed S6): the
/// code-start value is itself always compatible; each set bit then
/// contributes `code_start + byte_index*8 + bit_position + 1`, preserving
/// MSB-first enumeration within a byte. `compatibility_base` identifies the
/// entity the codes apply to and plays no part in the arithmetic.
fn decode_compatibility(payload: &[u8]) -> CompatibilityRecord {
    let manufacturer_id =
        u32::from(payload[0]) | (u32::from(payload[1]) << 8) | (u32::from(payload[2]) << 16);
    let entity_id = payload[3];
    let compatibility_base = payload[4];
    let code_start = payload[5];
    let bitmap = &payload[6..];

    let mut codes = vec![code_start];
    for (byte_idx, byte) in bitmap.iter().enumerate() {
        for bit_position in 0..8u32 {
            if byte & (1 << bit_position) != 0 {
                codes.push(code_start.wrapping_add((byte_idx as u32 * 8 + bit_position + 1) as u8));
            }
        }
    }

    CompatibilityRecord {
        manufacturer_id,
        entity_id,
        compatibility_base,
        code_start,
        compatible_codes: codes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::checksum;

    fn with_checksum(mut bytes: Vec<u8>) -> Vec<u8> {
        let c = checksum(&bytes);
        bytes.push(c);
        bytes
    }

    #[test]
    fn common_header_checksum_validated() {
        let header = [0x01, 0, 0, 0, 1, 0, 0, 0xFE];
        assert!(checksum_valid(&header));
    }

    #[test]
    fn sentinel_terminates_field_list_immediately() {
        let buf = [0xC1, 0xAA, 0xBB];
        let (fields, consumed) = decode_fields(&buf, 0);
        assert!(fields.is_empty());
        assert_eq!(consumed, 1);
    }

    #[test]
    fn zero_length_field_is_omitted() {
        let buf = [0b11_000000, 0xC1];
        let (fields, _) = decode_fields(&buf, 0);
        assert_eq!(fields, vec![None]);
    }

    #[test]
    fn s5_fru_decode_scenario() {
        // common header: version=1, internal=0, chassis=0, board=1, product=0,
        // multi=0, pad=0, checksum
        let header = with_checksum(vec![0x01, 0, 0, 1, 0, 0, 0]);
        assert_eq!(header.len(), 8);

        // board area at offset 1*8: version, length placeholder, language=25,
        // mfg date (3 bytes) = 1, then TLV "ACME", "X42", sentinel, pad,
        // checksum.
        let manufacturer = [0b11_000100, b'A', b'C', b'M', b'E'];
        let name = [0b11_000011, b'X', b'4', b'2'];
        let mut board_body = vec![0x01, 0x00, 25, 0x01, 0x00, 0x00];
        board_body.extend_from_slice(&manufacturer);
        board_body.extend_from_slice(&name);
        board_body.push(SENTINEL);
        while (board_body.len() + 1) % 8 != 0 {
            board_body.push(0x00);
        }
        let board_area = with_checksum(board_body);

        let mut buf = header;
        buf.extend_from_slice(&board_area);

        let info = decode(&buf).unwrap();
        let board = info.board_area.expect("board area decoded");
        assert_eq!(board.manufacturer.as_deref(), Some("ACME"));
        assert_eq!(board.name.as_deref(), Some("X42"));
        assert_eq!(board.manufacturing_date, 1);
    }

    #[test]
    fn s6_compatibility_bitmap_scenario() {
        let mut payload = vec![0x22, 0x11, 0x00, 0x01, 42, 10];
        payload.extend_from_slice(&[0x3F, 0x18]);
        let record = decode_compatibility(&payload);
        assert_eq!(record.compatibility_base, 42);
        assert_eq!(record.code_start, 10);
        let mut expected = vec![10u8, 11, 12, 13, 14, 15, 16, 22, 23];
        expected.sort_unstable();
        let mut actual = record.compatible_codes.clone();
        actual.sort_unstable();
        assert_eq!(actual, expected);
    }

    #[test]
    fn chassis_checksum_leniency_preserves_board_area() {
        // internal=0, chassis=unit 1, board=unit 2, product=0, multi=0
        let header = with_checksum(vec![0x01, 0, 1, 2, 0, 0, 0]);
        let mut bad_chassis = vec![0x01, 0x00, 0x00, SENTINEL];
        while bad_chassis.len() < 7 {
            bad_chassis.push(0x00);
        }
        bad_chassis.push(0x00); // wrong checksum on purpose, area is exactly one unit
        let mut good_board = vec![0x01, 0x00, 0, 0, 0, 0];
        good_board.push(SENTINEL);
        while (good_board.len() + 1) % 8 != 0 {
            good_board.push(0x00);
        }
        let good_board = with_checksum(good_board);

        let mut buf = header;
        buf.extend_from_slice(&bad_chassis);
        buf.extend_from_slice(&good_board);

        let info = decode(&buf).unwrap();
        assert!(info.chassis_area.is_none());
        assert!(info.board_area.is_some());
    }
}
