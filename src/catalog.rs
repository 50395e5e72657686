//! The VCTP catalog: an ordered, append-only-then-frozen list of top-level
//! connector records, addressed by zero-based index (SPEC_FULL.md §3, §4.11,
//! §6 "VCTP wire format").

use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::connector::{self, Connector, ConnectorFlags, ConnectorState, Payload};
use crate::error::Error;
use crate::version::LvVersion;

/// A non-fatal, accumulated sanity-check finding attached to a specific
/// catalog record (SPEC_FULL.md §7, §11). The catalog keeps parsing after
/// recording one of these; an `Error` is reserved for failures that make
/// the enclosing record unreadable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub index: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    records: Vec<Connector>,
}

impl Catalog {
    pub fn new() -> Self {
        Catalog { records: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Connector> {
        self.records.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Connector> {
        self.records.iter()
    }

    /// Appends a connector, assigning it the next catalog index. Used by the
    /// text loader when reconstructing a catalog from a textual projection.
    pub fn push(&mut self, mut connector: Connector) {
        connector.index = self.records.len() as i64;
        self.records.push(connector);
    }

    /// Parses the VCTP wire format: `u32 catalog_count` followed by that
    /// many records (SPEC_FULL.md §6).
    pub fn parse(data: &[u8], version: LvVersion) -> Result<(Catalog, Vec<Diagnostic>), Error> {
        let mut header = Cursor::new(data);
        if data.len() < 4 {
            return Err(Error::MalformedHeader("VCTP block shorter than its count field".into()));
        }
        let count = header.read_u32::<BigEndian>()? as usize;

        let mut records = Vec::with_capacity(count);
        let mut diagnostics = Vec::new();
        let mut offset = 4usize;
        for i in 0..count {
            match connector::parse_record(data, offset, i as i64, version) {
                Ok((record, warnings, consumed)) => {
                    diagnostics.extend(warnings.into_iter().map(|message| Diagnostic { index: i, message }));
                    offset += consumed;
                    records.push(record);
                }
                Err(e) => {
                    diagnostics.push(Diagnostic {
                        index: i,
                        message: format!("structural failure, record kept raw: {e}"),
                    });
                    // This slot gets a raw placeholder so every index up to
                    // the failure still resolves to a record. Without a
                    // parseable header we cannot know this record's length,
                    // so the scan still aborts here rather than guess at a
                    // resync point (SPEC_FULL.md §7.1).
                    records.push(Connector {
                        index: i as i64,
                        flags: ConnectorFlags::default(),
                        type_tag: 0,
                        label: None,
                        raw_bytes: Vec::new(),
                        payload: Payload::Void,
                        state: ConnectorState::RawOnly,
                    });
                    break;
                }
            }
        }

        let catalog = Catalog { records };
        diagnostics.extend(catalog.cross_reference_sanity());
        Ok((catalog, diagnostics))
    }

    /// Checks invariants that need the whole catalog: every non-nested
    /// client index must address a real slot (SPEC_FULL.md §4.11a).
    fn cross_reference_sanity(&self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let len = self.records.len();
        for (i, record) in self.records.iter().enumerate() {
            let indices: Vec<u32> = match &record.payload {
                Payload::Array { client_index, .. } => vec![*client_index],
                Payload::SingleContainer { client_index } => vec![*client_index],
                Payload::Function(f) => f
                    .clients
                    .iter()
                    .chain(f.extra_client.iter())
                    .map(|c| c.index)
                    .collect(),
                Payload::Cluster { client_indices } => client_indices.iter().map(|&v| v as u32).collect(),
                Payload::Reference(r) => r.clients.iter().map(|c| c.index).collect(),
                _ => Vec::new(),
            };
            for idx in indices {
                if idx as usize >= len {
                    diagnostics.push(Diagnostic {
                        index: i,
                        message: format!("client index {idx} is out of catalog bounds (len {len})"),
                    });
                }
            }
        }
        diagnostics
    }

    /// Emits the VCTP wire format: `u32 catalog_count` followed by each
    /// record's re-synthesized bytes, in order.
    pub fn emit(&self, version: LvVersion) -> Result<Vec<u8>, Error> {
        let mut out = Vec::new();
        out.write_u32::<BigEndian>(self.records.len() as u32)?;
        for record in &self.records {
            if matches!(record.state, connector::ConnectorState::ParsedOnly) {
                let mut synthesized = record.clone();
                synthesized.synthesize(version)?;
                out.extend_from_slice(&synthesized.raw_bytes);
            } else {
                out.extend_from_slice(&record.raw_bytes);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::Stage;

    fn version() -> LvVersion {
        LvVersion::new(7, 0, 0, Stage::Release)
    }

    #[test]
    fn empty_catalog_round_trips() {
        let bytes = vec![0x00, 0x00, 0x00, 0x00];
        let (catalog, diagnostics) = Catalog::parse(&bytes, version()).unwrap();
        assert!(catalog.is_empty());
        assert!(diagnostics.is_empty());
        assert_eq!(catalog.emit(version()).unwrap(), bytes);
    }

    #[test]
    fn two_record_catalog_round_trips_and_checks_references() {
        let mut bytes = vec![0x00, 0x00, 0x00, 0x02];
        // index 0: NumInt32, no label
        bytes.extend_from_slice(&[0x00, 0x04, 0x00, FullTag::NUM_INT32]);
        // index 1: Array referencing index 0
        let mut array_record = vec![0x00, 0x00, 0x00, FullTag::ARRAY];
        array_record.extend_from_slice(&[0x00, 0x01, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00]);
        let len = array_record.len() as u16;
        array_record[0..2].copy_from_slice(&len.to_be_bytes());
        bytes.extend_from_slice(&array_record);

        let (catalog, diagnostics) = Catalog::parse(&bytes, version()).unwrap();
        assert_eq!(catalog.len(), 2);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        assert_eq!(catalog.emit(version()).unwrap(), bytes);
    }

    #[test]
    fn structural_failure_leaves_a_raw_placeholder_at_its_index() {
        let mut bytes = vec![0x00, 0x00, 0x00, 0x02];
        // index 0: NumInt32, no label
        bytes.extend_from_slice(&[0x00, 0x04, 0x00, FullTag::NUM_INT32]);
        // index 1: header claims more bytes than remain in the buffer
        bytes.extend_from_slice(&[0x00, 0x01]);

        let (catalog, diagnostics) = Catalog::parse(&bytes, version()).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get(1).unwrap().index, 1);
        assert_eq!(catalog.get(1).unwrap().state, ConnectorState::RawOnly);
        assert!(diagnostics.iter().any(|d| d.index == 1 && d.message.contains("structural failure")));
    }

    struct FullTag;
    impl FullTag {
        const NUM_INT32: u8 = 0x03;
        const ARRAY: u8 = 0x40;
    }
}
