//! Outer resource-file envelope: chained resource headers and the block
//! directory that names where the VCTP catalog lives inside a real file
//! (SPEC_FULL.md §6, §10.5).
//!
//! This module does not interpret any block kind other than locating one by
//! name — dispatch into the dozens of other block kinds a resource file can
//! carry is out of scope (see DESIGN.md).

use std::io::{self, Read, Seek, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::cursor::{BinarySize, FromStream, ToStream};
use crate::error::Error;

pub const MAGIC: &[u8; 6] = b"RSRC\r\n";
pub const LBVW: &[u8; 4] = b"LBVW";
pub const VERSION: u16 = 3;
pub const HEADER_LEN: usize = 32;

/// Recognized outer file-type tags and their conventional extensions.
pub const FILE_TYPES: &[([u8; 4], &str)] = &[
    (*b"LVIN", "vi"),
    (*b"LVCC", "ctl"),
    (*b"LVDL", "dlog"),
    (*b"CLIB", "lvclass"),
    (*b"LVPJ", "lvproj"),
    (*b"LIBR", "lvlib"),
    (*b"LVAR", "llb"),
    (*b"LMNU", "mnu"),
    (*b"sVCC", "ctt"),
    (*b"sVIN", "vit"),
    (*b"LVXC", "xctl"),
];

pub fn extension_for(file_type: [u8; 4]) -> Option<&'static str> {
    FILE_TYPES.iter().find(|(t, _)| *t == file_type).map(|(_, ext)| *ext)
}

/// One chained resource header: 32 bytes, always.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResourceHeader {
    pub file_type: [u8; 4],
    pub next_offset: u32,
    pub size: u32,
}

impl FromStream for ResourceHeader {
    fn read_from<R>(&mut self, reader: &mut R) -> Result<(), Error>
    where
        R: Read + Seek,
    {
        let mut magic = [0u8; 6];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(Error::MalformedHeader(format!("bad resource magic {magic:?}")));
        }
        let version = reader.read_u16::<BigEndian>()?;
        if version != VERSION {
            return Err(Error::MalformedHeader(format!("unsupported resource version {version}")));
        }
        reader.read_exact(&mut self.file_type)?;
        let mut lbvw = [0u8; 4];
        reader.read_exact(&mut lbvw)?;
        if &lbvw != LBVW {
            return Err(Error::MalformedHeader("missing LBVW marker".into()));
        }
        self.next_offset = reader.read_u32::<BigEndian>()?;
        self.size = reader.read_u32::<BigEndian>()?;
        Ok(())
    }
}

impl ToStream for ResourceHeader {
    fn write_to<W>(&self, writer: &mut W) -> Result<(), Error>
    where
        W: Write + Seek,
    {
        writer.write_all(MAGIC)?;
        writer.write_u16::<BigEndian>(VERSION)?;
        writer.write_all(&self.file_type)?;
        writer.write_all(LBVW)?;
        writer.write_u32::<BigEndian>(self.next_offset)?;
        writer.write_u32::<BigEndian>(self.size)?;
        Ok(())
    }
}

impl BinarySize for ResourceHeader {
    fn binary_size() -> usize {
        HEADER_LEN
    }
}

/// Seven `u32` fields whose individual roles the format never documents
/// beyond "data-set and block-info positions" (SPEC_FULL.md §6). Only the
/// last is load-bearing for this crate: the byte offset of the block
/// directory that follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockInfoListHeader {
    pub fields: [u32; 7],
}

impl BlockInfoListHeader {
    pub fn block_info_offset(&self) -> u32 {
        self.fields[6]
    }
}

impl FromStream for BlockInfoListHeader {
    fn read_from<R>(&mut self, reader: &mut R) -> Result<(), Error>
    where
        R: Read + Seek,
    {
        for field in self.fields.iter_mut() {
            *field = reader.read_u32::<BigEndian>()?;
        }
        Ok(())
    }
}

impl ToStream for BlockInfoListHeader {
    fn write_to<W>(&self, writer: &mut W) -> Result<(), Error>
    where
        W: Write + Seek,
    {
        for field in self.fields {
            writer.write_u32::<BigEndian>(field)?;
        }
        Ok(())
    }
}

impl BinarySize for BlockInfoListHeader {
    fn binary_size() -> usize {
        28
    }
}

/// One entry of the block directory: a 4-byte name, a payload count, and
/// the byte offset of its first payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockHeader {
    pub name: [u8; 4],
    pub count: u32,
    pub offset: u32,
}

impl FromStream for BlockHeader {
    fn read_from<R>(&mut self, reader: &mut R) -> Result<(), Error>
    where
        R: Read + Seek,
    {
        reader.read_exact(&mut self.name)?;
        self.count = reader.read_u32::<BigEndian>()?;
        self.offset = reader.read_u32::<BigEndian>()?;
        Ok(())
    }
}

impl ToStream for BlockHeader {
    fn write_to<W>(&self, writer: &mut W) -> Result<(), Error>
    where
        W: Write + Seek,
    {
        writer.write_all(&self.name)?;
        writer.write_u32::<BigEndian>(self.count)?;
        writer.write_u32::<BigEndian>(self.offset)?;
        Ok(())
    }
}

impl BinarySize for BlockHeader {
    fn binary_size() -> usize {
        12
    }
}

fn read_header_at(data: &[u8], offset: usize) -> Result<ResourceHeader, Error> {
    if offset + HEADER_LEN > data.len() {
        return Err(Error::MalformedHeader(format!(
            "resource header at offset {offset} runs past end of file"
        )));
    }
    let mut cursor = io::Cursor::new(&data[offset..offset + HEADER_LEN]);
    let mut header = ResourceHeader::default();
    header.read_from(&mut cursor)?;
    Ok(header)
}

/// Follows the resource header chain to its terminator (a header whose
/// `next_offset` points at itself), then reads the block directory that
/// immediately follows it.
pub fn read_block_directory(data: &[u8]) -> Result<(ResourceHeader, Vec<BlockHeader>), Error> {
    let mut offset = 0usize;
    let mut header = read_header_at(data, offset)?;
    let mut last = header;
    let mut hops = 0usize;
    while header.next_offset as usize != offset {
        offset = header.next_offset as usize;
        header = read_header_at(data, offset)?;
        last = header;
        hops += 1;
        if hops > 4096 {
            return Err(Error::MalformedHeader("resource header chain did not terminate".into()));
        }
    }

    let list_pos = offset + HEADER_LEN;
    if list_pos + BlockInfoListHeader::binary_size() > data.len() {
        return Err(Error::MalformedHeader("block-info list header runs past end of file".into()));
    }
    let mut list_cursor = io::Cursor::new(&data[list_pos..list_pos + BlockInfoListHeader::binary_size()]);
    let mut list = BlockInfoListHeader::default();
    list.read_from(&mut list_cursor)?;

    let dir_pos = list.block_info_offset() as usize;
    if dir_pos + 4 > data.len() {
        return Err(Error::MalformedHeader("block directory count out of bounds".into()));
    }
    let count = u32::from_be_bytes(data[dir_pos..dir_pos + 4].try_into().unwrap()) as usize + 1;

    let mut blocks = Vec::with_capacity(count);
    let mut pos = dir_pos + 4;
    for _ in 0..count {
        if pos + BlockHeader::binary_size() > data.len() {
            return Err(Error::MalformedHeader("block directory runs past end of file".into()));
        }
        let mut cursor = io::Cursor::new(&data[pos..pos + BlockHeader::binary_size()]);
        let mut block = BlockHeader::default();
        block.read_from(&mut cursor)?;
        pos += BlockHeader::binary_size();
        blocks.push(block);
    }
    Ok((last, blocks))
}

/// Locates the named block's byte span by reading the directory and taking
/// the gap to the next block's offset (or end of file) as its size, since
/// the directory entry itself only carries a payload count, not a length.
pub fn locate_block(data: &[u8], name: &[u8; 4]) -> Result<(usize, usize), Error> {
    let (_, blocks) = read_block_directory(data)?;
    let idx = blocks
        .iter()
        .position(|b| &b.name == name)
        .ok_or_else(|| Error::MalformedRecord(format!("block {:?} not present in directory", String::from_utf8_lossy(name))))?;
    let start = blocks[idx].offset as usize;
    let end = blocks
        .iter()
        .map(|b| b.offset as usize)
        .filter(|&o| o > start)
        .min()
        .unwrap_or(data.len());
    if start > data.len() || end > data.len() || start > end {
        return Err(Error::MalformedRecord(format!("block {name:?} offset out of bounds")));
    }
    Ok((start, end - start))
}

pub const VCTP_BLOCK_NAME: &[u8; 4] = b"VCTP";

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(file_type: &[u8; 4], next_offset: u32, size: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&VERSION.to_be_bytes());
        buf.extend_from_slice(file_type);
        buf.extend_from_slice(LBVW);
        buf.extend_from_slice(&next_offset.to_be_bytes());
        buf.extend_from_slice(&size.to_be_bytes());
        buf
    }

    #[test]
    fn single_header_terminates_on_itself() {
        let mut data = header_bytes(b"LVIN", 0, 0);
        // block-info list header: 7 u32s, last one points right after itself
        let list_pos = data.len();
        let dir_pos = (list_pos + 28) as u32;
        data.extend_from_slice(&[0u8; 24]); // first 6 fields unused
        data.extend_from_slice(&dir_pos.to_be_bytes());
        // directory: count_minus_one=0, one block named VCTP at offset X
        data.extend_from_slice(&0u32.to_be_bytes());
        let block_offset = (data.len() + 12) as u32;
        data.extend_from_slice(b"VCTP");
        data.extend_from_slice(&1u32.to_be_bytes());
        data.extend_from_slice(&block_offset.to_be_bytes());
        data.extend_from_slice(&[0xAB, 0xCD, 0xEF, 0x01]);

        let (start, len) = locate_block(&data, VCTP_BLOCK_NAME).unwrap();
        assert_eq!(start, block_offset as usize);
        assert_eq!(len, 4);
        assert_eq!(&data[start..start + len], &[0xAB, 0xCD, 0xEF, 0x01]);
    }

    #[test]
    fn extension_lookup_round_trips_known_types() {
        assert_eq!(extension_for(*b"LVIN"), Some("vi"));
        assert_eq!(extension_for(*b"ZZZZ"), None);
    }
}
