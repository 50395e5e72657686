//! Byte cursor: the streaming primitives every connector variant is built on.
//!
//! Everything in this crate's binary format is big-endian, so the read/write
//! traits below are thin, `BigEndian`-pinned wrappers over [`byteorder`].
//! On top of that sits one composite primitive, `U2p2`, used for catalog
//! indices and a handful of counts: a 16-bit value, widened to 32 bits via a
//! `0xFFFF` sentinel when it does not fit.

use std::io;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::Error;

/// A type that can be deserialized from a big-endian byte stream.
pub trait FromStream {
    fn read_from<R>(&mut self, reader: &mut R) -> Result<(), Error>
    where
        R: io::Read + io::Seek;
}

/// Reads a `T: FromStream + Default` out of `reader` in one call.
pub fn from_stream<R, T>(reader: &mut R) -> Result<T, Error>
where
    R: io::Read + io::Seek,
    T: FromStream + Default,
{
    let mut obj = T::default();
    obj.read_from(reader)?;
    Ok(obj)
}

/// A type that knows the exact size of its own serialized form.
///
/// Used to pre-size output buffers; not every type that implements
/// [`ToStream`] needs to implement this (variable-length payloads generally
/// don't bother).
pub trait BinarySize {
    fn binary_size() -> usize;
}

/// A type that can be serialized to a big-endian byte stream.
pub trait ToStream {
    fn write_to<W>(&self, writer: &mut W) -> Result<(), Error>
    where
        W: io::Write + io::Seek;
}

pub fn to_bytes<T>(obj: &T) -> Result<Vec<u8>, Error>
where
    T: ToStream,
{
    let mut buf = Vec::new();
    let mut cursor = io::Cursor::new(&mut buf);
    obj.write_to(&mut cursor)?;
    Ok(buf)
}

pub fn to_bytes_with_capacity<T>(obj: &T) -> Result<Vec<u8>, Error>
where
    T: ToStream + BinarySize,
{
    let mut buf = Vec::with_capacity(T::binary_size());
    let mut cursor = io::Cursor::new(&mut buf);
    obj.write_to(&mut cursor)?;
    Ok(buf)
}

/// The sentinel narrow value signalling a wide (32-bit) `U2p2` encoding.
pub const U2P2_SENTINEL: u16 = 0xFFFF;

/// Reads one U2p2-encoded unsigned integer: a 16-bit value, or, when that
/// value is `0xFFFF`, a following 32-bit value.
pub fn read_u2p2<R: io::Read>(reader: &mut R) -> Result<u32, Error> {
    let narrow = reader.read_u16::<BigEndian>()?;
    if narrow != U2P2_SENTINEL {
        Ok(narrow as u32)
    } else {
        Ok(reader.read_u32::<BigEndian>()?)
    }
}

/// Writes `value` as U2p2: narrow (2 bytes) whenever it fits below the
/// sentinel, wide (6 bytes, sentinel + u32) otherwise.
pub fn write_u2p2<W: io::Write>(writer: &mut W, value: u32) -> Result<(), Error> {
    if value < U2P2_SENTINEL as u32 {
        writer.write_u16::<BigEndian>(value as u16)?;
    } else {
        writer.write_u16::<BigEndian>(U2P2_SENTINEL)?;
        writer.write_u32::<BigEndian>(value)?;
    }
    Ok(())
}

/// Byte length that `write_u2p2` would emit for `value`, without writing it.
pub fn u2p2_size(value: u32) -> usize {
    if value < U2P2_SENTINEL as u32 {
        2
    } else {
        6
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u2p2_narrow_round_trip() {
        let mut buf = Vec::new();
        write_u2p2(&mut buf, 0x41).unwrap();
        assert_eq!(buf, vec![0x00, 0x41]);
        let mut cur = io::Cursor::new(buf);
        assert_eq!(read_u2p2(&mut cur).unwrap(), 0x41);
    }

    #[test]
    fn u2p2_wide_round_trip() {
        let mut buf = Vec::new();
        write_u2p2(&mut buf, 0x12345).unwrap();
        assert_eq!(buf, vec![0xFF, 0xFF, 0x00, 0x01, 0x23, 0x45]);
        let mut cur = io::Cursor::new(buf);
        assert_eq!(read_u2p2(&mut cur).unwrap(), 0x12345);
    }

    #[test]
    fn u2p2_threshold_at_sentinel() {
        let mut buf = Vec::new();
        write_u2p2(&mut buf, 0xFFFE).unwrap();
        assert_eq!(buf.len(), 2);
        let mut buf2 = Vec::new();
        write_u2p2(&mut buf2, 0xFFFF).unwrap();
        assert_eq!(buf2.len(), 6);
    }
}
