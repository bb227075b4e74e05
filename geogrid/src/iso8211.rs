//! Minimal ISO/IEC 8211 record reader.
//!
//! Every record is a 24 byte leader, a directory of `(tag, length,
//! position)` entries terminated by [FIELD_TERMINATOR], and a field
//! area. Entry widths come from the leader's entry map. A record
//! length of zero means the record runs to the end of the file.

use crate::{error::slice, GridError};
use std::str;

pub const LEADER_LEN: usize = 24;
pub const FIELD_TERMINATOR: u8 = 0x1E;
pub const UNIT_SEPARATOR: u8 = 0x1F;

/// Leader identifier of the data descriptive record.
const DESCRIPTIVE_LEADER_ID: u8 = b'L';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field<'a> {
    pub tag: &'a str,
    /// Field contents without the trailing terminator.
    pub data: &'a [u8],
}

impl<'a> Field<'a> {
    /// Splits the field on unit separators.
    pub fn subfields(&self) -> impl Iterator<Item = &'a [u8]> {
        self.data.split(|&b| b == UNIT_SEPARATOR)
    }

    /// Returns the `n`th subfield as trimmed text.
    pub fn text(&self, n: usize) -> Option<&'a str> {
        self.subfields()
            .nth(n)
            .and_then(|raw| str::from_utf8(raw).ok())
            .map(str::trim)
    }
}

#[derive(Debug)]
pub struct Record<'a> {
    leader_id: u8,
    fields: Vec<Field<'a>>,
}

impl<'a> Record<'a> {
    /// True for the data descriptive record that opens a file.
    pub fn is_descriptive(&self) -> bool {
        self.leader_id == DESCRIPTIVE_LEADER_ID
    }

    pub fn fields(&self) -> &[Field<'a>] {
        &self.fields
    }

    pub fn field(&self, tag: &str) -> Option<&Field<'a>> {
        self.fields.iter().find(|field| field.tag == tag)
    }
}

/// Parses the record starting at `offset`, returning it along with
/// its length in bytes.
pub fn parse_record(bytes: &[u8], offset: usize) -> Result<(Record<'_>, usize), GridError> {
    let leader = slice(bytes, offset, LEADER_LEN)?;
    let record_len = match digits("record length", &leader[0..5])? {
        // Open-ended, as used by image records too large for the field.
        0 => bytes.len() - offset,
        len => len,
    };
    let base: usize = digits("base address", &leader[12..17])?;
    let len_width: usize = digits("field length width", &leader[20..21])?;
    let pos_width: usize = digits("field position width", &leader[21..22])?;
    let tag_width: usize = digits("field tag width", &leader[23..24])?;
    let entry_len = tag_width + len_width + pos_width;
    if record_len < LEADER_LEN || base < LEADER_LEN || base > record_len || entry_len == 0 {
        return Err(GridError::header(
            "leader",
            String::from_utf8_lossy(leader).into_owned(),
        ));
    }
    let record = slice(bytes, offset, record_len)?;

    let mut fields = Vec::new();
    let mut cursor = LEADER_LEN;
    while record.get(cursor).map_or(false, |&b| b != FIELD_TERMINATOR) {
        let entry = slice(record, cursor, entry_len)?;
        let tag = str::from_utf8(&entry[..tag_width])
            .map_err(|_| GridError::header("field tag", "non-ASCII"))?;
        let len: usize = digits("field length", &entry[tag_width..tag_width + len_width])?;
        let pos: usize = digits("field position", &entry[tag_width + len_width..])?;
        let mut data = slice(record, base + pos, len)?;
        if let Some((&FIELD_TERMINATOR, rest)) = data.split_last() {
            data = rest;
        }
        fields.push(Field { tag, data });
        cursor += entry_len;
    }

    Ok((
        Record {
            leader_id: leader[6],
            fields,
        },
        record_len,
    ))
}

/// Parses every record in `bytes`.
pub fn parse_records(bytes: &[u8]) -> Result<Vec<Record<'_>>, GridError> {
    let mut records = Vec::new();
    let mut offset = 0;
    while offset < bytes.len() {
        let (record, len) = parse_record(bytes, offset)?;
        records.push(record);
        offset += len;
    }
    Ok(records)
}

/// Returns the first field tagged `tag` in any data record.
pub fn find_field<'r, 'a>(records: &'r [Record<'a>], tag: &str) -> Option<&'r Field<'a>> {
    records
        .iter()
        .filter(|record| !record.is_descriptive())
        .find_map(|record| record.field(tag))
}

fn digits(field: &'static str, raw: &[u8]) -> Result<usize, GridError> {
    let text = str::from_utf8(raw).map_err(|_| GridError::header(field, "non-ASCII"))?;
    crate::parse_field(field, text)
}

/// Encodes one record with the default 3/4/0/3 entry map.
#[cfg(test)]
pub(crate) fn encode_record(leader_id: u8, fields: &[(&str, &[u8])]) -> Vec<u8> {
    let mut directory = Vec::new();
    let mut area = Vec::new();
    for (tag, data) in fields {
        let len = data.len() + 1;
        directory.extend(format!("{tag}{len:03}{:04}", area.len()).into_bytes());
        area.extend_from_slice(data);
        area.push(FIELD_TERMINATOR);
    }
    directory.push(FIELD_TERMINATOR);
    let base = LEADER_LEN + directory.len();
    let record_len = base + area.len();
    let mut record =
        format!("{record_len:05}3{}     {base:05}   3403", leader_id as char).into_bytes();
    assert_eq!(record.len(), LEADER_LEN);
    record.extend(directory);
    record.extend(area);
    record
}

#[cfg(test)]
mod tests {
    use super::{encode_record, find_field, parse_record, parse_records, UNIT_SEPARATOR};
    use crate::GridError;

    #[test]
    fn test_parse_record() {
        let gin = [b"-072.5".as_slice(), b"44.25".as_slice()].join(&UNIT_SEPARATOR);
        let bytes = encode_record(b'D', &[("001", b"1".as_slice()), ("GIN", gin.as_slice())]);
        let (record, len) = parse_record(&bytes, 0).unwrap();
        assert_eq!(len, bytes.len());
        assert!(!record.is_descriptive());
        assert_eq!(record.fields().len(), 2);
        let field = record.field("GIN").unwrap();
        assert_eq!(field.text(0), Some("-072.5"));
        assert_eq!(field.text(1), Some("44.25"));
        assert_eq!(field.text(2), None);
        assert!(record.field("TIM").is_none());
    }

    #[test]
    fn test_skips_descriptive_record() {
        let mut bytes = encode_record(b'L', &[("GIN", b"descriptor".as_slice())]);
        bytes.extend(encode_record(b'D', &[("GIN", b"data".as_slice())]));
        let records = parse_records(&bytes).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].is_descriptive());
        assert_eq!(find_field(&records, "GIN").unwrap().data, b"data");
    }

    #[test]
    fn test_truncated() {
        let bytes = encode_record(b'D', &[("IMG", [7u8; 40].as_slice())]);
        assert!(matches!(
            parse_record(&bytes[..bytes.len() - 1], 0),
            Err(GridError::ShortRead { .. })
        ));
        let mut garbled = bytes.clone();
        garbled[0] = b'x';
        assert!(matches!(
            parse_record(&garbled, 0),
            Err(GridError::Header { .. })
        ));
    }

    #[test]
    fn test_binary_field_keeps_separators() {
        let payload = [1u8, UNIT_SEPARATOR, 0x1E, 4];
        let bytes = encode_record(b'D', &[("IMG", payload.as_slice())]);
        let (record, _) = parse_record(&bytes, 0).unwrap();
        assert_eq!(record.field("IMG").unwrap().data, payload);
    }
}
