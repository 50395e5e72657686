//! Per-tag payload grammars (SPEC_FULL.md §4.4-§4.10): the bulk of the
//! system. Each `read_*`/`write_*` pair operates over an in-memory byte
//! cursor and knows nothing about the record header, label, or catalog —
//! those are orchestrated by [`crate::connector`].

use std::io::{self, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use serde::{Deserialize, Serialize};

use crate::cursor::{read_u2p2, write_u2p2};
use crate::error::Error;
use crate::version::{has_thrall_field, tag_carries_ident, tag_carries_variant, thrall_offset_by_one, wide_client_flags, LvVersion};

use super::reference::{read_client, write_client, resolve, ReferenceBody};

/// One dimension of an Array record: top byte is flags, low three bytes are
/// the fixed size (`(flags << 24) | fixed_size`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ArrayDim {
    pub flags: u8,
    pub fixed_size: u32,
}

impl ArrayDim {
    pub const FLAG_VARIABLE: u8 = 0x80;

    fn from_packed(packed: u32) -> Self {
        ArrayDim {
            flags: (packed >> 24) as u8,
            fixed_size: packed & 0x00FF_FFFF,
        }
    }

    fn to_packed(self) -> u32 {
        ((self.flags as u32) << 24) | (self.fixed_size & 0x00FF_FFFF)
    }
}

/// A FixedPoint "range" record; shape depends on `rangeFormat`/`field1E`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FixedRange {
    Plain(f64),
    Extended { prop1: u16, prop2: u16, prop3: i32, value: f64 },
}

/// Unpacked view of FixedPoint's `field1C` bitfield (SPEC_FULL.md §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FixedPointFlags {
    pub data_version: u8,
    pub range_format: u8,
    pub data_encoding: u8,
    pub data_endianness: u8,
    pub data_unit: u8,
    pub alloc_ov: u8,
    pub leftover_flags: u8,
}

impl FixedPointFlags {
    pub fn unpack(field1c: u16) -> Self {
        FixedPointFlags {
            data_version: (field1c & 0xF) as u8,
            range_format: ((field1c >> 4) & 0x3) as u8,
            data_encoding: ((field1c >> 6) & 0x1) as u8,
            data_endianness: ((field1c >> 7) & 0x1) as u8,
            data_unit: ((field1c >> 8) & 0x7) as u8,
            alloc_ov: ((field1c >> 11) & 0x1) as u8,
            leftover_flags: ((field1c >> 12) & 0xF) as u8,
        }
    }

    pub fn pack(self) -> u16 {
        (self.data_version as u16 & 0xF)
            | ((self.range_format as u16 & 0x3) << 4)
            | ((self.data_encoding as u16 & 0x1) << 6)
            | ((self.data_endianness as u16 & 0x1) << 7)
            | ((self.data_unit as u16 & 0x7) << 8)
            | ((self.alloc_ov as u16 & 0x1) << 11)
            | ((self.leftover_flags as u16 & 0xF) << 12)
    }
}

/// Function variant clients: index plus per-client flags and thrall
/// sources.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FunctionClient {
    pub index: u32,
    pub flags: u32,
    pub thrall_sources: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FunctionBody {
    pub clients: Vec<FunctionClient>,
    pub fflags: u16,
    pub pattern: u16,
    pub field6: Option<u32>,
    pub field7: Option<u32>,
    /// Present iff `fflags & 0x8000`; kept separate from `clients` because
    /// it is serialized last, after the thrall/field6-7 sections.
    pub extra_client: Option<FunctionClient>,
}

impl FunctionBody {
    pub const FFLAG_HAS_FIELDS_6_7: u16 = 0x0800;
    pub const FFLAG_HAS_EXTRA_CLIENT: u16 = 0x8000;
}

/// The parsed shape of exactly one connector's variant-specific payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    /// Void and every variant that shares its (empty) shape: Boolean,
    /// LVVariant, NumberPointer's `Ptr`, numeric primitives, PasString,
    /// CString.
    Void,
    NumericEnum {
        entries: Vec<Vec<u8>>,
        prop1: u8,
    },
    NumericUnits {
        entries: Vec<(u16, u16)>,
        prop1: u8,
    },
    Blob {
        prop1: u32,
    },
    Array {
        dims: Vec<ArrayDim>,
        client_index: u32,
    },
    Cluster {
        client_indices: Vec<u16>,
    },
    MeasureData {
        cluster_fmt: u16,
    },
    FixedPoint {
        flags: FixedPointFlags,
        field1e: u16,
        field20: u32,
        ranges: [FixedRange; 3],
    },
    SingleContainer {
        client_index: u32,
    },
    RepeatedBlock {
        prop1: u32,
        prop2: u16,
    },
    Tag {
        prop1: u32,
        tag_type: u16,
        variant: Option<Vec<u8>>,
        ident: Option<Vec<u8>>,
    },
    Reference(ReferenceBody),
    Function(FunctionBody),
    TypeDef {
        flag1: u32,
        labels: Vec<Vec<u8>>,
        nested: Box<super::Connector>,
    },
    /// Unknown tag, or a tag whose shape this crate does not model
    /// concretely: preserved byte-for-byte.
    Opaque(Vec<u8>),
}

pub const TAG_TYPE_USER_DEFINED: u16 = 5;

fn read_pascal_bytes<R: Read>(reader: &mut R) -> Result<Vec<u8>, Error> {
    let len = reader.read_u8()? as usize;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

fn write_pascal_bytes<W: Write>(writer: &mut W, bytes: &[u8]) -> Result<(), Error> {
    if bytes.len() > 0xFF {
        return Err(Error::MalformedRecord("pascal string exceeds 255 bytes".into()));
    }
    writer.write_u8(bytes.len() as u8)?;
    writer.write_all(bytes)?;
    Ok(())
}

/// Numeric-with-units payload (tags 0x15..0x1E): reads the enum or
/// physical-unit table selected by `is_enum`, then the trailing `prop1`.
pub fn read_numeric(reader: &mut impl Read, is_enum: bool) -> Result<Payload, Error> {
    let count = reader.read_u16::<BigEndian>()?;
    if is_enum {
        let mut entries = Vec::with_capacity(count as usize);
        let mut table_len = 2usize;
        for _ in 0..count {
            let entry = read_pascal_bytes(reader)?;
            table_len += 1 + entry.len();
            entries.push(entry);
        }
        if table_len % 2 != 0 {
            let _ = reader.read_u8()?; // pad byte, expected zero
        }
        let prop1 = reader.read_u8()?;
        Ok(Payload::NumericEnum { entries, prop1 })
    } else {
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let a = reader.read_u16::<BigEndian>()?;
            let b = reader.read_u16::<BigEndian>()?;
            entries.push((a, b));
        }
        let prop1 = reader.read_u8()?;
        Ok(Payload::NumericUnits { entries, prop1 })
    }
}

pub fn write_numeric(writer: &mut impl Write, payload: &Payload) -> Result<(), Error> {
    match payload {
        Payload::NumericEnum { entries, prop1 } => {
            writer.write_u16::<BigEndian>(entries.len() as u16)?;
            let mut table_len = 2usize;
            for entry in entries {
                write_pascal_bytes(writer, entry)?;
                table_len += 1 + entry.len();
            }
            if table_len % 2 != 0 {
                writer.write_u8(0)?;
            }
            writer.write_u8(*prop1)?;
            Ok(())
        }
        Payload::NumericUnits { entries, prop1 } => {
            writer.write_u16::<BigEndian>(entries.len() as u16)?;
            for (a, b) in entries {
                writer.write_u16::<BigEndian>(*a)?;
                writer.write_u16::<BigEndian>(*b)?;
            }
            writer.write_u8(*prop1)?;
            Ok(())
        }
        _ => Err(Error::MalformedRecord("not a numeric payload".into())),
    }
}

pub fn read_blob(reader: &mut impl Read) -> Result<Payload, Error> {
    Ok(Payload::Blob {
        prop1: reader.read_u32::<BigEndian>()?,
    })
}

pub fn write_blob(writer: &mut impl Write, prop1: u32) -> Result<(), Error> {
    writer.write_u32::<BigEndian>(prop1)?;
    Ok(())
}

pub fn read_array(reader: &mut impl Read) -> Result<Payload, Error> {
    let ndim = reader.read_u16::<BigEndian>()?;
    let mut dims = Vec::with_capacity(ndim as usize);
    for _ in 0..ndim {
        dims.push(ArrayDim::from_packed(reader.read_u32::<BigEndian>()?));
    }
    let client_index = read_u2p2(reader)?;
    Ok(Payload::Array { dims, client_index })
}

pub fn write_array(writer: &mut impl Write, dims: &[ArrayDim], client_index: u32) -> Result<(), Error> {
    writer.write_u16::<BigEndian>(dims.len() as u16)?;
    for dim in dims {
        writer.write_u32::<BigEndian>(dim.to_packed())?;
    }
    write_u2p2(writer, client_index)?;
    Ok(())
}

pub fn read_cluster(reader: &mut impl Read) -> Result<Payload, Error> {
    let n = reader.read_u16::<BigEndian>()?;
    let mut client_indices = Vec::with_capacity(n as usize);
    for _ in 0..n {
        client_indices.push(reader.read_u16::<BigEndian>()?);
    }
    Ok(Payload::Cluster { client_indices })
}

pub fn write_cluster(writer: &mut impl Write, client_indices: &[u16]) -> Result<(), Error> {
    writer.write_u16::<BigEndian>(client_indices.len() as u16)?;
    for idx in client_indices {
        writer.write_u16::<BigEndian>(*idx)?;
    }
    Ok(())
}

pub fn read_measure_data(reader: &mut impl Read) -> Result<Payload, Error> {
    Ok(Payload::MeasureData {
        cluster_fmt: reader.read_u16::<BigEndian>()?,
    })
}

pub fn write_measure_data(writer: &mut impl Write, cluster_fmt: u16) -> Result<(), Error> {
    writer.write_u16::<BigEndian>(cluster_fmt)?;
    Ok(())
}

pub fn read_fixed_point(reader: &mut impl Read) -> Result<Payload, Error> {
    let field1c = reader.read_u16::<BigEndian>()?;
    let flags = FixedPointFlags::unpack(field1c);
    let field1e = reader.read_u16::<BigEndian>()?;
    let field20 = reader.read_u32::<BigEndian>()?;

    let extended = flags.range_format == 1 && (field1e > 0x40 || flags.data_version > 0);
    let mut read_one = |reader: &mut dyn Read| -> Result<FixedRange, Error> {
        if flags.range_format == 0 {
            Ok(FixedRange::Plain(reader.read_f64::<BigEndian>()?))
        } else if extended {
            let prop1 = reader.read_u16::<BigEndian>()?;
            let prop2 = reader.read_u16::<BigEndian>()?;
            let prop3 = reader.read_i32::<BigEndian>()?;
            let value = reader.read_f64::<BigEndian>()?;
            Ok(FixedRange::Extended { prop1, prop2, prop3, value })
        } else {
            Ok(FixedRange::Plain(reader.read_f64::<BigEndian>()?))
        }
    };
    let ranges = [read_one(reader)?, read_one(reader)?, read_one(reader)?];
    Ok(Payload::FixedPoint { flags, field1e, field20, ranges })
}

pub fn write_fixed_point(
    writer: &mut impl Write,
    flags: FixedPointFlags,
    field1e: u16,
    field20: u32,
    ranges: &[FixedRange; 3],
) -> Result<(), Error> {
    writer.write_u16::<BigEndian>(flags.pack())?;
    writer.write_u16::<BigEndian>(field1e)?;
    writer.write_u32::<BigEndian>(field20)?;
    for range in ranges {
        match range {
            FixedRange::Plain(v) => writer.write_f64::<BigEndian>(*v)?,
            FixedRange::Extended { prop1, prop2, prop3, value } => {
                writer.write_u16::<BigEndian>(*prop1)?;
                writer.write_u16::<BigEndian>(*prop2)?;
                writer.write_i32::<BigEndian>(*prop3)?;
                writer.write_f64::<BigEndian>(*value)?;
            }
        }
    }
    Ok(())
}

pub fn read_single_container(reader: &mut impl Read) -> Result<Payload, Error> {
    Ok(Payload::SingleContainer {
        client_index: read_u2p2(reader)?,
    })
}

pub fn write_single_container(writer: &mut impl Write, client_index: u32) -> Result<(), Error> {
    write_u2p2(writer, client_index)
}

pub fn read_repeated_block(reader: &mut impl Read) -> Result<Payload, Error> {
    Ok(Payload::RepeatedBlock {
        prop1: reader.read_u32::<BigEndian>()?,
        prop2: reader.read_u16::<BigEndian>()?,
    })
}

pub fn write_repeated_block(writer: &mut impl Write, prop1: u32, prop2: u16) -> Result<(), Error> {
    writer.write_u32::<BigEndian>(prop1)?;
    writer.write_u16::<BigEndian>(prop2)?;
    Ok(())
}

pub fn read_tag(reader: &mut impl Read, version: LvVersion) -> Result<Payload, Error> {
    let prop1 = reader.read_u32::<BigEndian>()?;
    let tag_type = reader.read_u16::<BigEndian>()?;
    let variant = if tag_carries_variant(version) {
        // Opaque nested LVVariant: this crate does not decode its interior,
        // only keeps the byte span the caller tells us about via a length
        // prefix mirrored from the envelope (see DESIGN.md).
        let len = reader.read_u32::<BigEndian>()? as usize;
        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf)?;
        Some(buf)
    } else {
        None
    };
    let ident = if tag_type == TAG_TYPE_USER_DEFINED && tag_carries_ident(version) {
        let s = read_pascal_bytes(reader)?;
        if (s.len() + 1) % 2 != 0 {
            let _ = reader.read_u8()?;
        }
        Some(s)
    } else {
        None
    };
    Ok(Payload::Tag { prop1, tag_type, variant, ident })
}

pub fn write_tag(
    writer: &mut impl Write,
    prop1: u32,
    tag_type: u16,
    variant: &Option<Vec<u8>>,
    ident: &Option<Vec<u8>>,
) -> Result<(), Error> {
    writer.write_u32::<BigEndian>(prop1)?;
    writer.write_u16::<BigEndian>(tag_type)?;
    if let Some(v) = variant {
        writer.write_u32::<BigEndian>(v.len() as u32)?;
        writer.write_all(v)?;
    }
    if let Some(ident) = ident {
        write_pascal_bytes(writer, ident)?;
        if (ident.len() + 1) % 2 != 0 {
            writer.write_u8(0)?;
        }
    }
    Ok(())
}

/// Reads the TypeDef label table: `u32 flag1`, `u32 label_count`, then that
/// many Pascal-byte labels with no inter-label padding. Does not touch the
/// nested sub-connector that follows; that is the caller's job (it needs
/// the enclosing catalog/version context to recurse).
pub fn read_typedef_labels(reader: &mut impl Read) -> Result<(u32, Vec<Vec<u8>>), Error> {
    let flag1 = reader.read_u32::<BigEndian>()?;
    let count = reader.read_u32::<BigEndian>()?;
    let mut labels = Vec::with_capacity(count as usize);
    for _ in 0..count {
        labels.push(read_pascal_bytes(reader)?);
    }
    Ok((flag1, labels))
}

pub fn write_typedef_labels(writer: &mut impl Write, flag1: u32, labels: &[Vec<u8>]) -> Result<(), Error> {
    writer.write_u32::<BigEndian>(flag1)?;
    writer.write_u32::<BigEndian>(labels.len() as u32)?;
    for label in labels {
        write_pascal_bytes(writer, label)?;
    }
    Ok(())
}

/// Reads a Reference record body: `reftype`, handler-specific payload,
/// client list, item list, and auxiliary variant list.
///
/// The client/item/variant lists are each prefixed by a `u16` count; this is
/// this crate's own framing for the otherwise reftype-owned trailing data,
/// chosen so the generic reader does not need to know each reftype's exact
/// trailer shape (see DESIGN.md).
pub fn read_reference(reader: &mut impl Read) -> Result<Payload, Error> {
    let reftype = reader.read_u16::<BigEndian>()?;
    let handler = resolve(reftype);
    let payload_len = reader.read_u32::<BigEndian>()? as usize;
    let mut payload_buf = vec![0u8; payload_len];
    reader.read_exact(&mut payload_buf)?;
    let payload = handler.parse_payload(&payload_buf)?;

    let client_count = reader.read_u16::<BigEndian>()?;
    let mut clients = Vec::with_capacity(client_count as usize);
    for _ in 0..client_count {
        clients.push(read_client(reader, handler.as_ref())?);
    }

    let item_count = reader.read_u16::<BigEndian>()?;
    let mut items = Vec::with_capacity(item_count as usize);
    for _ in 0..item_count {
        let index = read_u2p2(reader)?;
        let len = reader.read_u32::<BigEndian>()? as usize;
        let mut data = vec![0u8; len];
        reader.read_exact(&mut data)?;
        items.push(super::reference::RefItem { index, data });
    }

    let variant_count = reader.read_u16::<BigEndian>()?;
    let mut variants = Vec::with_capacity(variant_count as usize);
    for _ in 0..variant_count {
        let len = reader.read_u32::<BigEndian>()? as usize;
        let mut data = vec![0u8; len];
        reader.read_exact(&mut data)?;
        variants.push(data);
    }

    Ok(Payload::Reference(ReferenceBody {
        reftype,
        payload,
        clients,
        items,
        variants,
    }))
}

pub fn write_reference(writer: &mut impl Write, body: &ReferenceBody) -> Result<(), Error> {
    let handler = resolve(body.reftype);
    writer.write_u16::<BigEndian>(body.reftype)?;
    let mut payload_buf = Vec::new();
    handler.emit_payload(&body.payload, &mut payload_buf)?;
    writer.write_u32::<BigEndian>(payload_buf.len() as u32)?;
    writer.write_all(&payload_buf)?;

    writer.write_u16::<BigEndian>(body.clients.len() as u16)?;
    for client in &body.clients {
        write_client(writer, client, handler.as_ref())?;
    }

    writer.write_u16::<BigEndian>(body.items.len() as u16)?;
    for item in &body.items {
        write_u2p2(writer, item.index)?;
        writer.write_u32::<BigEndian>(item.data.len() as u32)?;
        writer.write_all(&item.data)?;
    }

    writer.write_u16::<BigEndian>(body.variants.len() as u16)?;
    for v in &body.variants {
        writer.write_u32::<BigEndian>(v.len() as u32)?;
        writer.write_all(v)?;
    }
    Ok(())
}

pub fn read_function(reader: &mut impl Read, version: LvVersion) -> Result<Payload, Error> {
    let count = read_u2p2(reader)?;
    let mut indices = Vec::with_capacity(count as usize);
    for _ in 0..count {
        indices.push(read_u2p2(reader)?);
    }
    let fflags = reader.read_u16::<BigEndian>()?;
    let pattern = reader.read_u16::<BigEndian>()?;

    let wide = wide_client_flags(version);
    let mut clients: Vec<FunctionClient> = indices
        .into_iter()
        .map(|index| -> Result<FunctionClient, Error> {
            let flags = if wide {
                reader.read_u32::<BigEndian>()?
            } else {
                reader.read_u16::<BigEndian>()? as u32
            };
            Ok(FunctionClient { index, flags, thrall_sources: Vec::new() })
        })
        .collect::<Result<_, _>>()?;

    if has_thrall_field(version) {
        let has_thrall = reader.read_u16::<BigEndian>()?;
        if has_thrall != 0 {
            let offset = thrall_offset_by_one(version);
            for client in clients.iter_mut() {
                let mut sources = Vec::new();
                loop {
                    let b = reader.read_u8()?;
                    if b == 0 {
                        break;
                    }
                    sources.push(if offset { b - 1 } else { b });
                }
                client.thrall_sources = sources;
            }
        }
    }

    let (field6, field7) = if fflags & FunctionBody::FFLAG_HAS_FIELDS_6_7 != 0 {
        (Some(reader.read_u32::<BigEndian>()?), Some(reader.read_u32::<BigEndian>()?))
    } else {
        (None, None)
    };

    let extra_client = if fflags & FunctionBody::FFLAG_HAS_EXTRA_CLIENT != 0 {
        let index = read_u2p2(reader)?;
        Some(FunctionClient { index, flags: 0, thrall_sources: Vec::new() })
    } else {
        None
    };

    Ok(Payload::Function(FunctionBody {
        clients,
        fflags,
        pattern,
        field6,
        field7,
        extra_client,
    }))
}

pub fn write_function(writer: &mut impl Write, body: &FunctionBody, version: LvVersion) -> Result<(), Error> {
    write_u2p2(writer, body.clients.len() as u32)?;
    for client in &body.clients {
        write_u2p2(writer, client.index)?;
    }
    writer.write_u16::<BigEndian>(body.fflags)?;
    writer.write_u16::<BigEndian>(body.pattern)?;

    let wide = wide_client_flags(version);
    for client in &body.clients {
        if wide {
            writer.write_u32::<BigEndian>(client.flags)?;
        } else {
            writer.write_u16::<BigEndian>(client.flags as u16)?;
        }
    }

    if has_thrall_field(version) {
        let any_thrall = body.clients.iter().any(|c| !c.thrall_sources.is_empty());
        writer.write_u16::<BigEndian>(if any_thrall { 1 } else { 0 })?;
        if any_thrall {
            let offset = thrall_offset_by_one(version);
            for client in &body.clients {
                for &src in &client.thrall_sources {
                    writer.write_u8(if offset { src + 1 } else { src })?;
                }
                writer.write_u8(0)?;
            }
        }
    }

    if body.fflags & FunctionBody::FFLAG_HAS_FIELDS_6_7 != 0 {
        writer.write_u32::<BigEndian>(body.field6.unwrap_or(0))?;
        writer.write_u32::<BigEndian>(body.field7.unwrap_or(0))?;
    }

    if body.fflags & FunctionBody::FFLAG_HAS_EXTRA_CLIENT != 0 {
        if let Some(extra) = &body.extra_client {
            write_u2p2(writer, extra.index)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn numeric_enum_round_trip_matches_scenario_s2() {
        let payload = Payload::NumericEnum {
            entries: vec![b"A".to_vec(), b"BB".to_vec()],
            prop1: 0,
        };
        let mut buf = Vec::new();
        write_numeric(&mut buf, &payload).unwrap();
        assert_eq!(buf, vec![0x00, 0x02, 0x01, 0x41, 0x02, 0x42, 0x42, 0x00, 0x00]);
        let mut cur = Cursor::new(buf);
        let back = read_numeric(&mut cur, true).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn array_round_trip_matches_scenario_s3() {
        let dims = vec![ArrayDim { flags: 0x80, fixed_size: 0 }];
        let mut buf = Vec::new();
        write_array(&mut buf, &dims, 0).unwrap();
        assert_eq!(buf, vec![0x00, 0x01, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00]);
        let mut cur = Cursor::new(buf);
        match read_array(&mut cur).unwrap() {
            Payload::Array { dims: d, client_index } => {
                assert_eq!(d, dims);
                assert_eq!(client_index, 0);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn function_narrow_flags_matches_scenario_s4() {
        let body = FunctionBody {
            clients: vec![
                FunctionClient { index: 0, flags: 0, thrall_sources: vec![] },
                FunctionClient { index: 1, flags: 0, thrall_sources: vec![] },
            ],
            fflags: 0x0000,
            pattern: 0x0041,
            field6: None,
            field7: None,
            extra_client: None,
        };
        let version = LvVersion::new(7, 0, 0, crate::version::Stage::Release);
        let mut buf = Vec::new();
        write_function(&mut buf, &body, version).unwrap();
        assert_eq!(
            buf,
            vec![0x00, 0x02, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x41, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn function_wide_flags_for_ver_10_alpha() {
        let body = FunctionBody {
            clients: vec![
                FunctionClient { index: 0, flags: 0, thrall_sources: vec![] },
                FunctionClient { index: 1, flags: 0, thrall_sources: vec![] },
            ],
            fflags: 0x0000,
            pattern: 0x0041,
            field6: None,
            field7: None,
            extra_client: None,
        };
        let version = LvVersion::new(10, 0, 0, crate::version::Stage::Alpha);
        let mut buf = Vec::new();
        write_function(&mut buf, &body, version).unwrap();
        assert_eq!(
            buf,
            vec![
                0x00, 0x02, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x41, 0x00, 0x00, 0x00, 0x00,
                0x00, 0x00, 0x00, 0x00
            ]
        );
    }

    #[test]
    fn thrall_source_offset_by_one() {
        let body = FunctionBody {
            clients: vec![FunctionClient { index: 0, flags: 0, thrall_sources: vec![2] }],
            fflags: 0,
            pattern: 0,
            field6: None,
            field7: None,
            extra_client: None,
        };
        let version = LvVersion::new(8, 2, 0, crate::version::Stage::Beta);
        let mut buf = Vec::new();
        write_function(&mut buf, &body, version).unwrap();
        let mut cur = Cursor::new(buf);
        match read_function(&mut cur, version).unwrap() {
            Payload::Function(back) => assert_eq!(back.clients[0].thrall_sources, vec![2]),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn function_with_fields_6_7_and_extra_client_round_trips() {
        let body = FunctionBody {
            clients: vec![FunctionClient { index: 0, flags: 0, thrall_sources: vec![] }],
            fflags: 0x8800,
            pattern: 0x0001,
            field6: Some(0xAABBCCDD),
            field7: Some(0x11223344),
            extra_client: Some(FunctionClient { index: 2, flags: 0, thrall_sources: vec![] }),
        };
        let version = LvVersion::new(7, 0, 0, crate::version::Stage::Release);
        let mut buf = Vec::new();
        write_function(&mut buf, &body, version).unwrap();
        let mut cur = Cursor::new(buf);
        match read_function(&mut cur, version).unwrap() {
            Payload::Function(back) => {
                assert_eq!(back.fflags, 0x8800);
                assert_eq!(back.field6, Some(0xAABBCCDD));
                assert_eq!(back.field7, Some(0x11223344));
                assert_eq!(back.extra_client.map(|c| c.index), Some(2));
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn fixed_point_flags_pack_unpack_round_trip() {
        let flags = FixedPointFlags {
            data_version: 3,
            range_format: 1,
            data_encoding: 1,
            data_endianness: 0,
            data_unit: 5,
            alloc_ov: 1,
            leftover_flags: 0b1010,
        };
        assert_eq!(FixedPointFlags::unpack(flags.pack()), flags);
    }
}
