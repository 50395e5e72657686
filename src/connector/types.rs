//! Connector-level enums: flags, the full type tag, and its main-type
//! projection.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// The 8-bit flag set carried by every connector record header.
///
/// Only bit 6 (`HasLabel`) is named by the format; the rest are unknown but
/// must be preserved verbatim on round-trip (SPEC_FULL.md §9, open question
/// a).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnectorFlags(pub u8);

impl ConnectorFlags {
    pub const HAS_LABEL: u8 = 0x40;

    pub fn has_label(self) -> bool {
        self.0 & Self::HAS_LABEL != 0
    }

    pub fn with_has_label(self, set: bool) -> Self {
        if set {
            ConnectorFlags(self.0 | Self::HAS_LABEL)
        } else {
            ConnectorFlags(self.0 & !Self::HAS_LABEL)
        }
    }
}

impl From<u8> for ConnectorFlags {
    fn from(value: u8) -> Self {
        ConnectorFlags(value)
    }
}

impl From<ConnectorFlags> for u8 {
    fn from(value: ConnectorFlags) -> Self {
        value.0
    }
}

/// The full, exhaustive type tag (SPEC_FULL.md §4.3.1). Tags not named here
/// are preserved as `Unknown(u8)` and dispatched opaquely by main type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullType {
    Void,
    NumInt8,
    NumInt16,
    NumInt32,
    NumInt64,
    NumUInt8,
    NumUInt16,
    NumUInt32,
    NumUInt64,
    NumFloat32,
    NumFloat64,
    NumFloatExt,
    NumComplex64,
    NumComplex128,
    NumComplexExt,
    UnitUInt8,
    UnitUInt16,
    UnitUInt32,
    UnitFloat32,
    UnitFloat64,
    UnitFloatExt,
    UnitComplex64,
    UnitComplex128,
    UnitComplexExt,
    BooleanU16,
    Boolean,
    BlobString,
    BlobPath,
    BlobPicture,
    BlobCString,
    BlobPasString,
    Tag,
    BlobSubString,
    Array,
    ArrayDataPtr,
    SubArray,
    Cluster,
    LVVariant,
    MeasureData,
    ComplexFixedPoint,
    FixedPoint,
    Block,
    TypeBlock,
    VoidBlock,
    AlignedBlock,
    RepeatedBlock,
    AlignmentMarker,
    Refnum,
    Ptr,
    PtrTo,
    Function,
    TypeDef,
    PolyVI,
    Unknown(u8),
}

impl FullType {
    pub fn tag(self) -> u8 {
        use FullType::*;
        match self {
            Void => 0x00,
            NumInt8 => 0x01,
            NumInt16 => 0x02,
            NumInt32 => 0x03,
            NumInt64 => 0x04,
            NumUInt8 => 0x05,
            NumUInt16 => 0x06,
            NumUInt32 => 0x07,
            NumUInt64 => 0x08,
            NumFloat32 => 0x09,
            NumFloat64 => 0x0A,
            NumFloatExt => 0x0B,
            NumComplex64 => 0x0C,
            NumComplex128 => 0x0D,
            NumComplexExt => 0x0E,
            UnitUInt8 => 0x15,
            UnitUInt16 => 0x16,
            UnitUInt32 => 0x17,
            UnitFloat32 => 0x19,
            UnitFloat64 => 0x1A,
            UnitFloatExt => 0x1B,
            UnitComplex64 => 0x1C,
            UnitComplex128 => 0x1D,
            UnitComplexExt => 0x1E,
            BooleanU16 => 0x20,
            Boolean => 0x21,
            BlobString => 0x30,
            BlobPath => 0x32,
            BlobPicture => 0x33,
            BlobCString => 0x34,
            BlobPasString => 0x35,
            Tag => 0x37,
            BlobSubString => 0x3F,
            Array => 0x40,
            ArrayDataPtr => 0x41,
            SubArray => 0x4F,
            Cluster => 0x50,
            LVVariant => 0x53,
            MeasureData => 0x54,
            ComplexFixedPoint => 0x5E,
            FixedPoint => 0x5F,
            Block => 0x60,
            TypeBlock => 0x61,
            VoidBlock => 0x62,
            AlignedBlock => 0x63,
            RepeatedBlock => 0x64,
            AlignmentMarker => 0x65,
            Refnum => 0x70,
            Ptr => 0x80,
            PtrTo => 0x83,
            Function => 0xF0,
            TypeDef => 0xF1,
            PolyVI => 0xF2,
            Unknown(v) => v,
        }
    }

    /// Classifies a raw tag byte, never failing: unnamed tags become
    /// `Unknown(tag)` and are dispatched opaquely by the caller.
    pub fn from_tag(tag: u8) -> FullType {
        use FullType::*;
        match tag {
            0x00 => Void,
            0x01 => NumInt8,
            0x02 => NumInt16,
            0x03 => NumInt32,
            0x04 => NumInt64,
            0x05 => NumUInt8,
            0x06 => NumUInt16,
            0x07 => NumUInt32,
            0x08 => NumUInt64,
            0x09 => NumFloat32,
            0x0A => NumFloat64,
            0x0B => NumFloatExt,
            0x0C => NumComplex64,
            0x0D => NumComplex128,
            0x0E => NumComplexExt,
            0x15 => UnitUInt8,
            0x16 => UnitUInt16,
            0x17 => UnitUInt32,
            0x19 => UnitFloat32,
            0x1A => UnitFloat64,
            0x1B => UnitFloatExt,
            0x1C => UnitComplex64,
            0x1D => UnitComplex128,
            0x1E => UnitComplexExt,
            0x20 => BooleanU16,
            0x21 => Boolean,
            0x30 => BlobString,
            0x32 => BlobPath,
            0x33 => BlobPicture,
            0x34 => BlobCString,
            0x35 => BlobPasString,
            0x37 => Tag,
            0x3F => BlobSubString,
            0x40 => Array,
            0x41 => ArrayDataPtr,
            0x4F => SubArray,
            0x50 => Cluster,
            0x53 => LVVariant,
            0x54 => MeasureData,
            0x5E => ComplexFixedPoint,
            0x5F => FixedPoint,
            0x60 => Block,
            0x61 => TypeBlock,
            0x62 => VoidBlock,
            0x63 => AlignedBlock,
            0x64 => RepeatedBlock,
            0x65 => AlignmentMarker,
            0x70 => Refnum,
            0x80 => Ptr,
            0x83 => PtrTo,
            0xF0 => Function,
            0xF1 => TypeDef,
            0xF2 => PolyVI,
            other => Unknown(other),
        }
    }

    pub fn is_enum_numeric(self) -> bool {
        matches!(self, FullType::UnitUInt8 | FullType::UnitUInt16 | FullType::UnitUInt32)
    }

    pub fn is_physical_numeric(self) -> bool {
        matches!(
            self,
            FullType::UnitFloat32
                | FullType::UnitFloat64
                | FullType::UnitFloatExt
                | FullType::UnitComplex64
                | FullType::UnitComplex128
                | FullType::UnitComplexExt
        )
    }
}

/// The coarse classification derived from a tag's high nibble (SPEC_FULL.md
/// §3, "Main-type projection").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MainType {
    Number,
    Unit,
    Bool,
    Blob,
    Array,
    Cluster,
    Block,
    Ref,
    NumberPointer,
    Terminal,
    Void,
}

impl MainType {
    /// `tag == 0` is always Void; otherwise the high nibble selects the
    /// classification.
    pub fn from_tag(tag: u8) -> Result<MainType, Error> {
        if tag == 0x00 {
            return Ok(MainType::Void);
        }
        match tag >> 4 {
            0x0 => Ok(MainType::Number),
            0x1 => Ok(MainType::Unit),
            0x2 => Ok(MainType::Bool),
            0x3 => Ok(MainType::Blob),
            0x4 => Ok(MainType::Array),
            0x5 => Ok(MainType::Cluster),
            0x6 => Ok(MainType::Block),
            0x7 => Ok(MainType::Ref),
            0x8 => Ok(MainType::NumberPointer),
            0xF => Ok(MainType::Terminal),
            other => Err(Error::InvalidEnumValue(format!(
                "no main-type classification for high nibble 0x{:X}",
                other
            ))),
        }
    }
}
