//! Connector records: the polymorphic heart of the VCTP catalog.
//!
//! A [`Connector`] is parsed in two passes, mirroring SPEC_FULL.md §3's
//! "raw-then-derive" lifecycle: [`parse_record`] first locates the record's
//! byte span (from the fixed 4-byte header's `length` field) and slices
//! `raw_bytes` out of the input, then dispatches on `type_tag` to decode the
//! variant-specific payload and, if `HasLabel` is set, runs label discovery
//! over the tail.

pub mod reference;
pub mod types;
pub mod variant;

use std::io::{self, Cursor};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::label::{self, DEFAULT_LABEL_WINDOW};
use crate::version::LvVersion;

pub use types::{ConnectorFlags, FullType, MainType};
pub use variant::Payload;

/// Sentinel `index` value for a connector owned inline by its parent
/// (TypeDef's sub-connector) rather than addressed by catalog position.
pub const NESTED_INDEX: i64 = -1;

/// Lazy raw/parsed reconciliation state (SPEC_FULL.md §9, replacing the
/// upstream `raw_data_updated`/`parsed_data_updated` pair of booleans with
/// an explicit three-state tag).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectorState {
    /// `raw_bytes` is authoritative; `payload` has not been derived from it
    /// (or is stale).
    RawOnly,
    /// `payload`/`label`/`flags` are authoritative; `raw_bytes` has not been
    /// synthesized from them (or is stale).
    ParsedOnly,
    /// Both representations agree; this is the state immediately after a
    /// successful parse or a successful `synthesize()`.
    Both,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connector {
    pub index: i64,
    pub flags: ConnectorFlags,
    pub type_tag: u8,
    #[serde(default, with = "crate::text::hex_option")]
    pub label: Option<Vec<u8>>,
    #[serde(with = "hex::serde")]
    pub raw_bytes: Vec<u8>,
    pub payload: Payload,
    pub state: ConnectorState,
}

impl Connector {
    pub fn main_type(&self) -> Result<MainType, Error> {
        MainType::from_tag(self.type_tag)
    }

    pub fn full_type(&self) -> FullType {
        FullType::from_tag(self.type_tag)
    }

    /// Re-synthesizes `raw_bytes` from `payload`/`label`/`flags`, moving the
    /// connector's state to `Both`. This is the `synthesize()` transition of
    /// SPEC_FULL.md §9.
    pub fn synthesize(&mut self, version: LvVersion) -> Result<(), Error> {
        self.raw_bytes = emit_record(self, version)?;
        self.state = ConnectorState::Both;
        Ok(())
    }

    /// Re-derives `payload`/`label`/`flags` from `raw_bytes`, moving the
    /// connector's state to `Both`. This is the `derive()` transition of
    /// SPEC_FULL.md §9.
    pub fn derive(&mut self, version: LvVersion) -> Result<Vec<String>, Error> {
        let (connector, warnings, _consumed) = parse_record(&self.raw_bytes, 0, self.index, version)?;
        *self = connector;
        Ok(warnings)
    }
}

fn pad_emitted(buf: &mut Vec<u8>) {
    label::pad_to_even(buf);
}

/// Parses one connector record out of `data[offset..]`.
///
/// Returns the connector, any sanity/label warnings collected while parsing
/// it, and the number of bytes consumed (`raw_bytes.len()`).
pub fn parse_record(
    data: &[u8],
    offset: usize,
    index: i64,
    version: LvVersion,
) -> Result<(Connector, Vec<String>, usize), Error> {
    if data.len() < offset + 4 {
        return Err(Error::MalformedHeader(format!(
            "record at offset {offset} too short for a header"
        )));
    }
    let mut header_cur = Cursor::new(&data[offset..offset + 4]);
    let length = header_cur.read_u16::<BigEndian>()? as usize;
    let flags = ConnectorFlags(header_cur.read_u8()?);
    let type_tag = header_cur.read_u8()?;

    if length < 4 || offset + length > data.len() {
        return Err(Error::MalformedHeader(format!(
            "record at offset {offset} claims length {length}, which is out of bounds"
        )));
    }

    let raw_bytes = data[offset..offset + length].to_vec();
    let body = &raw_bytes[4..];
    let mut warnings = Vec::new();

    let full = FullType::from_tag(type_tag);
    let mut cursor = Cursor::new(body);
    let payload_result = read_payload(&mut cursor, full, flags, version, index);
    let (payload, payload_end_in_body) = match payload_result {
        Ok((payload, consumed)) => (payload, consumed),
        Err(e) => {
            warnings.push(format!("payload parse failed, kept opaque: {e}"));
            (Payload::Opaque(body.to_vec()), body.len())
        }
    };

    let payload_end = 4 + payload_end_in_body;
    let label = if flags.has_label() {
        let res = label::discover_label_in_record(&raw_bytes, payload_end, DEFAULT_LABEL_WINDOW);
        if res.missing {
            warnings.push("HasLabel set but no valid label found in search window".to_string());
        }
        Some(res.label)
    } else {
        None
    };

    let connector = Connector {
        index,
        flags,
        type_tag,
        label,
        raw_bytes,
        payload,
        state: ConnectorState::Both,
    };
    warnings.extend(check_sanity(&connector, index));
    Ok((connector, warnings, length))
}

/// Dispatches on `full` to decode the variant-specific payload. Returns the
/// payload and the number of body bytes (i.e. bytes after the 4-byte
/// header) its fixed grammar consumed — this is the `payload_end` the label
/// search anchors to.
fn read_payload(
    cursor: &mut Cursor<&[u8]>,
    full: FullType,
    flags: ConnectorFlags,
    version: LvVersion,
    _index: i64,
) -> Result<(Payload, usize), Error> {
    use variant::*;
    let payload = match full {
        FullType::Void
        | FullType::NumInt8
        | FullType::NumInt16
        | FullType::NumInt32
        | FullType::NumInt64
        | FullType::NumUInt8
        | FullType::NumUInt16
        | FullType::NumUInt32
        | FullType::NumUInt64
        | FullType::NumFloat32
        | FullType::NumFloat64
        | FullType::NumFloatExt
        | FullType::NumComplex64
        | FullType::NumComplex128
        | FullType::NumComplexExt
        | FullType::BooleanU16
        | FullType::Boolean
        | FullType::LVVariant
        | FullType::BlobCString
        | FullType::BlobPasString
        | FullType::Ptr => Payload::Void,
        FullType::UnitUInt8 | FullType::UnitUInt16 | FullType::UnitUInt32 => {
            read_numeric(cursor, true)?
        }
        FullType::UnitFloat32
        | FullType::UnitFloat64
        | FullType::UnitFloatExt
        | FullType::UnitComplex64
        | FullType::UnitComplex128
        | FullType::UnitComplexExt => read_numeric(cursor, false)?,
        FullType::BlobString
        | FullType::BlobPath
        | FullType::BlobPicture
        | FullType::BlobSubString
        | FullType::PolyVI
        | FullType::Block => read_blob(cursor)?,
        FullType::Tag => read_tag(cursor, version)?,
        FullType::Array | FullType::ArrayDataPtr | FullType::SubArray => read_array(cursor)?,
        FullType::Cluster => read_cluster(cursor)?,
        FullType::MeasureData => read_measure_data(cursor)?,
        FullType::ComplexFixedPoint | FullType::FixedPoint => read_fixed_point(cursor)?,
        FullType::TypeBlock | FullType::VoidBlock | FullType::AlignmentMarker | FullType::PtrTo => {
            read_single_container(cursor)?
        }
        FullType::AlignedBlock | FullType::RepeatedBlock => read_repeated_block(cursor)?,
        FullType::Refnum => read_reference(cursor)?,
        FullType::Function => read_function(cursor, version)?,
        FullType::TypeDef => {
            let (flag1, labels) = read_typedef_labels(cursor)?;
            let nested_pos = cursor.position() as usize;
            let body: &[u8] = *cursor.get_ref();
            if body.len() < nested_pos + 4 {
                return Err(Error::MalformedRecord(
                    "typedef nested connector header out of bounds".into(),
                ));
            }
            let nested_len_biased = u16::from_be_bytes([body[nested_pos], body[nested_pos + 1]]) as usize;
            if nested_len_biased < 4 {
                return Err(Error::MalformedRecord(
                    "typedef nested connector length bias underflow".into(),
                ));
            }
            let corrected_len = nested_len_biased - 4;
            let mut patched = body[nested_pos..].to_vec();
            patched[0..2].copy_from_slice(&(corrected_len as u16).to_be_bytes());
            // Nested-connector sanity warnings are re-derived by
            // `check_sanity`'s TypeDef arm rather than threaded through
            // here, since `read_payload` has no warnings channel of its
            // own.
            let (nested, _nested_warnings, consumed) =
                parse_record(&patched, 0, NESTED_INDEX, version)?;
            cursor.set_position((nested_pos + consumed) as u64);
            Payload::TypeDef { flag1, labels, nested: Box::new(nested) }
        }
        FullType::Unknown(_) => {
            let mut rest = Vec::new();
            io::Read::read_to_end(cursor, &mut rest)?;
            Payload::Opaque(rest)
        }
    };
    let _ = flags;
    Ok((payload, cursor.position() as usize))
}

/// Re-synthesizes a connector's full on-disk byte form, including the
/// 4-byte header and trailing (optional) label, per SPEC_FULL.md §4.2 and
/// §4.5 (for TypeDef's nested length bias).
pub fn emit_record(connector: &Connector, version: LvVersion) -> Result<Vec<u8>, Error> {
    let mut body = Vec::new();
    write_payload(&mut body, connector, version)?;

    if let Some(label) = &connector.label {
        body.extend_from_slice(&label::encode_label(label)?);
    }
    pad_emitted(&mut body);

    let total_len = 4 + body.len();
    let mut out = Vec::with_capacity(total_len);
    out.write_u16::<BigEndian>(total_len as u16)?;
    out.write_u8(connector.flags.0)?;
    out.write_u8(connector.type_tag)?;
    out.extend_from_slice(&body);
    Ok(out)
}

fn write_payload(body: &mut Vec<u8>, connector: &Connector, version: LvVersion) -> Result<(), Error> {
    use variant::*;
    match &connector.payload {
        Payload::Void => {}
        Payload::NumericEnum { .. } | Payload::NumericUnits { .. } => write_numeric(body, &connector.payload)?,
        Payload::Blob { prop1 } => write_blob(body, *prop1)?,
        Payload::Array { dims, client_index } => write_array(body, dims, *client_index)?,
        Payload::Cluster { client_indices } => write_cluster(body, client_indices)?,
        Payload::MeasureData { cluster_fmt } => write_measure_data(body, *cluster_fmt)?,
        Payload::FixedPoint { flags, field1e, field20, ranges } => {
            write_fixed_point(body, *flags, *field1e, *field20, ranges)?
        }
        Payload::SingleContainer { client_index } => write_single_container(body, *client_index)?,
        Payload::RepeatedBlock { prop1, prop2 } => write_repeated_block(body, *prop1, *prop2)?,
        Payload::Tag { prop1, tag_type, variant, ident } => write_tag(body, *prop1, *tag_type, variant, ident)?,
        Payload::Reference(r) => write_reference(body, r)?,
        Payload::Function(f) => write_function(body, f, version)?,
        Payload::TypeDef { flag1, labels, nested } => {
            write_typedef_labels(body, *flag1, labels)?;
            let mut nested_buf = emit_record(nested, version)?;
            // Apply the +4 length bias in-place: nested_buf[0..2] currently
            // holds the nested record's real length.
            let real_len = u16::from_be_bytes([nested_buf[0], nested_buf[1]]);
            let biased = real_len
                .checked_add(4)
                .ok_or_else(|| Error::MalformedRecord("typedef nested length overflow".into()))?;
            nested_buf[0..2].copy_from_slice(&biased.to_be_bytes());
            body.extend_from_slice(&nested_buf);
        }
        Payload::Opaque(bytes) => body.extend_from_slice(bytes),
    }
    Ok(())
}

/// Sanity checks (SPEC_FULL.md §4.11, §3 invariants). Returns human-readable
/// warnings; never an `Error` — sanity failures are downgraded diagnostics.
pub fn check_sanity(connector: &Connector, owner_index: i64) -> Vec<String> {
    let mut warnings = Vec::new();
    let expected_len = connector.raw_bytes.len();
    if expected_len < 4 {
        warnings.push("record shorter than the minimum 4-byte header".to_string());
    }

    match &connector.payload {
        Payload::Array { dims, client_index } => {
            if dims.len() > 64 {
                warnings.push(format!("array dimension count {} exceeds 64", dims.len()));
            }
            if let Some(dim0) = dims.first() {
                if dim0.flags & variant::ArrayDim::FLAG_VARIABLE == 0 {
                    warnings.push("array dimension 0 missing the 0x80 flag bit".to_string());
                }
            }
            if owner_index >= 0 && *client_index as i64 >= owner_index {
                warnings.push(format!(
                    "array client index {client_index} is not strictly less than owning index {owner_index}"
                ));
            }
        }
        Payload::Function(f) => {
            if f.clients.len() > 125 {
                warnings.push(format!("function client count {} exceeds 125", f.clients.len()));
            }
        }
        Payload::TypeDef { nested, .. } => {
            if nested.index != NESTED_INDEX {
                warnings.push("typedef nested connector index is not the sentinel".to_string());
            }
            for w in check_sanity(nested, NESTED_INDEX) {
                warnings.push(format!("nested: {w}"));
            }
        }
        Payload::Cluster { client_indices } => {
            if client_indices.len() > 500 {
                warnings.push(format!("cluster client count {} exceeds 500", client_indices.len()));
            }
        }
        Payload::Blob { prop1 } => {
            if *prop1 != 0xFFFF_FFFF {
                warnings.push(format!("blob prop1 expected 0xFFFFFFFF, got 0x{prop1:08X}"));
            }
        }
        Payload::Tag { prop1, .. } => {
            if *prop1 != 0xFFFF_FFFF {
                warnings.push(format!("tag prop1 expected 0xFFFFFFFF, got 0x{prop1:08X}"));
            }
        }
        Payload::NumericEnum { entries, prop1 } => {
            if entries.is_empty() {
                warnings.push("numeric enum table is empty".to_string());
            }
            if *prop1 != 0 {
                warnings.push(format!("numeric prop1 expected 0, got {prop1}"));
            }
        }
        Payload::NumericUnits { entries, prop1 } => {
            if entries.is_empty() {
                warnings.push("numeric unit table is empty".to_string());
            }
            if *prop1 != 0 {
                warnings.push(format!("numeric prop1 expected 0, got {prop1}"));
            }
        }
        Payload::Reference(r) => {
            for client in &r.clients {
                if owner_index >= 0 && client.index as i64 >= owner_index {
                    warnings.push(format!(
                        "reference client index {} is not strictly less than owning index {owner_index}",
                        client.index
                    ));
                }
            }
        }
        _ => {}
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::Stage;

    fn default_version() -> LvVersion {
        LvVersion::new(7, 0, 0, Stage::Release)
    }

    #[test]
    fn void_with_label_round_trips_scenario_s1() {
        let bytes: Vec<u8> = vec![0x00, 0x0A, 0x40, 0x00, 0x05, 0x48, 0x65, 0x6C, 0x6C, 0x6F];
        let (connector, warnings, consumed) = parse_record(&bytes, 0, 0, default_version()).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(consumed, 10);
        assert_eq!(connector.type_tag, 0x00);
        assert_eq!(connector.flags.0, 0x40);
        assert_eq!(connector.label.as_deref(), Some(&b"Hello"[..]));

        let emitted = emit_record(&connector, default_version()).unwrap();
        assert_eq!(emitted, bytes);
    }

    #[test]
    fn typedef_nested_void_matches_scenario_s5() {
        let bytes: Vec<u8> = vec![
            0x00, 0x0E, 0x00, 0xF1, // header: length=14, flags=0, tag=TypeDef
            0x00, 0x00, 0x00, 0x00, // flag1
            0x00, 0x00, 0x00, 0x01, // label_count=1
            0x01, 0x58, // label "X"
            0x00, 0x08, 0x00, 0x00, // nested header: length=8 (4 real + 4 bias), flags=0, tag=Void
        ];
        let (connector, warnings, consumed) = parse_record(&bytes, 0, 0, default_version()).unwrap();
        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(consumed, bytes.len());
        match &connector.payload {
            Payload::TypeDef { flag1, labels, nested } => {
                assert_eq!(*flag1, 0);
                assert_eq!(labels, &vec![b"X".to_vec()]);
                assert_eq!(nested.index, NESTED_INDEX);
                assert_eq!(nested.raw_bytes.len(), 4);
            }
            other => panic!("expected TypeDef, got {other:?}"),
        }

        let emitted = emit_record(&connector, default_version()).unwrap();
        assert_eq!(emitted, bytes);
    }

    #[test]
    fn typedef_nested_function_round_trips() {
        let bytes: Vec<u8> = vec![
            0x00, 0x1E, 0x00, 0xF1, // header: length=30, flags=0, tag=TypeDef
            0x00, 0x00, 0x00, 0x00, // flag1
            0x00, 0x00, 0x00, 0x00, // label_count=0
            0x00, 0x16, 0x00, 0xF0, // nested header: length=22 (18 real + 4 bias), flags=0, tag=Function
            0x00, 0x02, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x41, 0x00, 0x00, 0x00, 0x00,
        ];
        let (connector, warnings, consumed) = parse_record(&bytes, 0, 0, default_version()).unwrap();
        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(consumed, bytes.len());
        match &connector.payload {
            Payload::TypeDef { nested, .. } => match &nested.payload {
                Payload::Function(body) => {
                    assert_eq!(body.clients.len(), 2);
                    assert_eq!(body.pattern, 0x0041);
                }
                other => panic!("expected nested Function, got {other:?}"),
            },
            other => panic!("expected TypeDef, got {other:?}"),
        }

        let emitted = emit_record(&connector, default_version()).unwrap();
        assert_eq!(emitted, bytes);
    }

    #[test]
    fn array_reference_direction_is_checked() {
        let dims = vec![variant::ArrayDim { flags: 0x80, fixed_size: 0 }];
        let connector = Connector {
            index: 0,
            flags: ConnectorFlags(0),
            type_tag: FullType::Array.tag(),
            label: None,
            raw_bytes: vec![0, 8, 0, 0x40],
            payload: Payload::Array { dims, client_index: 5 },
            state: ConnectorState::ParsedOnly,
        };
        let warnings = check_sanity(&connector, 0);
        assert!(warnings.iter().any(|w| w.contains("not strictly less than")));
    }
}
