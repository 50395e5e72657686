//! Textual projection: catalog <-> a generic attribute/children element tree
//! (SPEC_FULL.md §6, §10.3).
//!
//! Every connector projects in one of two formats. `inline` serializes the
//! parsed [`Payload`](crate::connector::Payload) as JSON onto the node
//! itself, so the field-level structure stays legible and diffable. `bin`
//! keeps the connector opaque, carrying only its raw bytes, either embedded
//! as hex or split into a sibling file when written through
//! [`write_text_tree`] — the same file-exists-or-embed choice the config
//! layer makes for opaque blobs.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::connector::{Connector, ConnectorFlags, ConnectorState, Payload};
use crate::error::Error;
use crate::version::LvVersion;

/// `Option<Vec<u8>>` via hex. The `hex` crate's own `serde` module only
/// covers bare `Vec<u8>`; this fills the gap for `Connector::label`.
pub mod hex_option {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_str(&hex::encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        let opt: Option<String> = Option::deserialize(deserializer)?;
        opt.map(|s| hex::decode(s).map_err(serde::de::Error::custom)).transpose()
    }
}

/// Per-connector projection format (SPEC_FULL.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Inline,
    Bin,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Format::Inline => "inline",
            Format::Bin => "bin",
        })
    }
}

impl FromStr for Format {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "inline" => Ok(Format::Inline),
            "bin" => Ok(Format::Bin),
            other => Err(Error::InvalidEnumValue(format!("unknown text format {other:?}"))),
        }
    }
}

/// A generic element-tree node: a tag name, string attributes, and children.
/// This is the wire shape of the textual projection — nothing below this
/// struct knows it is specifically VCTP.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TextNode {
    pub tag: String,
    pub attrs: BTreeMap<String, String>,
    pub children: Vec<TextNode>,
}

impl TextNode {
    fn leaf(tag: &str) -> Self {
        TextNode {
            tag: tag.to_string(),
            attrs: BTreeMap::new(),
            children: Vec::new(),
        }
    }
}

const TAG_CATALOG: &str = "VCTP";
const TAG_CONNECTOR: &str = "Connector";

/// Projects a whole catalog into an element tree. `format` picks the
/// default for connectors that have a usable `payload`; a connector whose
/// state is `RawOnly` (nothing derived yet) always falls back to `bin`,
/// since there is nothing to serialize as JSON.
pub fn catalog_to_text(catalog: &Catalog, format: Format) -> TextNode {
    let mut root = TextNode::leaf(TAG_CATALOG);
    root.attrs.insert("Count".into(), catalog.len().to_string());
    for connector in catalog.iter() {
        root.children.push(connector_to_text(connector, format));
    }
    root
}

fn connector_to_text(connector: &Connector, format: Format) -> TextNode {
    let mut node = TextNode::leaf(TAG_CONNECTOR);
    node.attrs.insert("Index".into(), connector.index.to_string());
    node.attrs.insert("Type".into(), format!("0x{:02X}", connector.type_tag));
    node.attrs.insert("Flags".into(), format!("0x{:02X}", u8::from(connector.flags)));
    if let Some(label) = &connector.label {
        node.attrs.insert("Label".into(), hex::encode(label));
    }

    let want_inline = matches!(format, Format::Inline) && !matches!(connector.state, ConnectorState::RawOnly);
    if want_inline {
        if let Ok(json) = serde_json::to_string(&connector.payload) {
            node.attrs.insert("Format".into(), Format::Inline.to_string());
            node.attrs.insert("Payload".into(), json);
            return node;
        }
    }
    node.attrs.insert("Format".into(), Format::Bin.to_string());
    node.attrs.insert("Data".into(), hex::encode(&connector.raw_bytes));
    node
}

/// Reconstructs a catalog from an element tree produced by
/// [`catalog_to_text`]. `bin`-format connectors are re-derived from their
/// raw bytes via [`Connector::derive`]; `inline`-format connectors are
/// trusted as already-parsed and left `ParsedOnly` until the caller calls
/// `synthesize`.
pub fn text_to_catalog(root: &TextNode, version: LvVersion) -> Result<Catalog, Error> {
    if root.tag != TAG_CATALOG {
        return Err(Error::UnexpectedTextTag(format!(
            "expected root tag {TAG_CATALOG:?}, got {:?}",
            root.tag
        )));
    }
    let mut catalog = Catalog::new();
    for child in &root.children {
        catalog.push(connector_from_text(child, version)?);
    }
    Ok(catalog)
}

fn connector_from_text(node: &TextNode, version: LvVersion) -> Result<Connector, Error> {
    if node.tag != TAG_CONNECTOR {
        return Err(Error::UnexpectedTextTag(format!(
            "expected tag {TAG_CONNECTOR:?}, got {:?}",
            node.tag
        )));
    }
    let index: i64 = node
        .attrs
        .get("Index")
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| Error::MalformedRecord("Connector node missing Index".into()))?;

    if let Some(data) = node.attrs.get("Data") {
        let raw_bytes = hex::decode(data).map_err(|e| Error::MalformedRecord(format!("bad hex in Data: {e}")))?;
        let mut connector = Connector {
            index,
            flags: ConnectorFlags::default(),
            type_tag: 0,
            label: None,
            raw_bytes,
            payload: Payload::Void,
            state: ConnectorState::RawOnly,
        };
        connector.derive(version)?;
        connector.index = index;
        return Ok(connector);
    }

    let payload_json = node
        .attrs
        .get("Payload")
        .ok_or_else(|| Error::MalformedRecord("Connector node has neither Data nor Payload".into()))?;
    let payload: Payload = serde_json::from_str(payload_json)?;
    let type_tag = node
        .attrs
        .get("Type")
        .and_then(|s| s.strip_prefix("0x"))
        .and_then(|s| u8::from_str_radix(s, 16).ok())
        .ok_or_else(|| Error::MalformedRecord("Connector node missing Type".into()))?;
    let flags = node
        .attrs
        .get("Flags")
        .and_then(|s| s.strip_prefix("0x"))
        .and_then(|s| u8::from_str_radix(s, 16).ok())
        .map(ConnectorFlags::from)
        .unwrap_or_default();
    let label = node
        .attrs
        .get("Label")
        .map(|s| hex::decode(s).map_err(|e| Error::MalformedRecord(format!("bad hex in Label: {e}"))))
        .transpose()?;

    Ok(Connector {
        index,
        flags,
        type_tag,
        label,
        raw_bytes: Vec::new(),
        payload,
        state: ConnectorState::ParsedOnly,
    })
}

/// Splits every `bin`-format connector's embedded `Data` attribute out into
/// a sibling file under `dir` (`connector_<index>.bin`), replacing it with a
/// `File` attribute that names the file.
pub fn write_text_tree(root: &mut TextNode, dir: &Path) -> Result<(), Error> {
    fs::create_dir_all(dir)?;
    for child in root.children.iter_mut() {
        if let Some(data) = child.attrs.remove("Data") {
            let index = child.attrs.get("Index").cloned().unwrap_or_default();
            let file_name = format!("connector_{index}.bin");
            let bytes = hex::decode(&data).map_err(|e| Error::MalformedRecord(format!("bad hex in Data: {e}")))?;
            fs::write(dir.join(&file_name), bytes)?;
            child.attrs.insert("File".into(), file_name);
        }
    }
    Ok(())
}

/// Inverse of [`write_text_tree`]: resolves `File` attributes back into
/// `Data` by reading the sibling file, so [`text_to_catalog`] can work the
/// same way regardless of how the tree reached memory.
pub fn read_text_tree(root: &mut TextNode, dir: &Path) -> Result<(), Error> {
    for child in root.children.iter_mut() {
        if let Some(file_name) = child.attrs.remove("File") {
            let bytes = fs::read(dir.join(&file_name))?;
            child.attrs.insert("Data".into(), hex::encode(bytes));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector;
    use crate::version::Stage;

    fn version() -> LvVersion {
        LvVersion::new(7, 0, 0, Stage::Release)
    }

    fn void_with_label() -> Connector {
        let bytes: Vec<u8> = vec![0x00, 0x0A, 0x40, 0x00, 0x05, 0x48, 0x65, 0x6C, 0x6C, 0x6F];
        connector::parse_record(&bytes, 0, 0, version()).unwrap().0
    }

    #[test]
    fn inline_round_trips_through_json_payload() {
        let catalog = {
            let mut c = Catalog::new();
            c.push(void_with_label());
            c
        };
        let tree = catalog_to_text(&catalog, Format::Inline);
        assert_eq!(tree.children[0].attrs.get("Format").map(String::as_str), Some("inline"));
        assert!(tree.children[0].attrs.contains_key("Payload"));

        let restored = text_to_catalog(&tree, version()).unwrap();
        assert_eq!(restored.len(), 1);
        assert_eq!(restored.get(0).unwrap().payload, catalog.get(0).unwrap().payload);
        assert_eq!(restored.get(0).unwrap().label, catalog.get(0).unwrap().label);
    }

    #[test]
    fn bin_round_trips_through_raw_bytes() {
        let catalog = {
            let mut c = Catalog::new();
            c.push(void_with_label());
            c
        };
        let tree = catalog_to_text(&catalog, Format::Bin);
        assert_eq!(tree.children[0].attrs.get("Format").map(String::as_str), Some("bin"));

        let restored = text_to_catalog(&tree, version()).unwrap();
        assert_eq!(restored.get(0).unwrap().raw_bytes, catalog.get(0).unwrap().raw_bytes);
    }

    #[test]
    fn raw_only_connector_falls_back_to_bin_even_when_inline_requested() {
        let mut connector = void_with_label();
        connector.state = ConnectorState::RawOnly;
        let node = connector_to_text(&connector, Format::Inline);
        assert_eq!(node.attrs.get("Format").map(String::as_str), Some("bin"));
    }
}
