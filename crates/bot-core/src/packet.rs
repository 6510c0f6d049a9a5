//! Cursor-style packet I/O.
//!
//! `PacketReader` walks an immutable byte slice; every primitive read is bounds checked and a
//! short buffer surfaces as [`PacketError::OutOfBounds`], which is the only way truncated input
//! is detected. `PacketWriter` appends to a growable buffer.
//!
//! Unless a method says otherwise, multi-byte values are little-endian.

use std::io::Cursor;

use binrw::{BinRead, Endian};
use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use thiserror::Error;

use crate::world::movement::PackedGuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    #[error("read past end of packet at offset {position}: needed {needed} byte(s), {remaining} remaining")]
    OutOfBounds {
        position: usize,
        needed: usize,
        remaining: usize,
    },
    #[error("malformed structure: {0}")]
    Layout(String),
    #[error("unknown update type {0}")]
    UnknownUpdateType(u8),
    #[error("decompression failed: {0}")]
    Decompress(String),
}

pub type PacketResult<T> = Result<T, PacketError>;

pub struct PacketReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> PacketReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    pub fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    pub fn len(&self) -> usize {
        self.cursor.get_ref().len()
    }

    pub fn remaining(&self) -> usize {
        self.len().saturating_sub(self.position())
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn ensure(&self, needed: usize) -> PacketResult<()> {
        let remaining = self.remaining();
        if needed > remaining {
            return Err(PacketError::OutOfBounds {
                position: self.position(),
                needed,
                remaining,
            });
        }
        Ok(())
    }

    pub fn u8(&mut self) -> PacketResult<u8> {
        self.ensure(1)?;
        Ok(self.cursor.read_u8().unwrap_or_default())
    }

    pub fn u16_le(&mut self) -> PacketResult<u16> {
        self.ensure(2)?;
        Ok(self.cursor.read_u16::<LittleEndian>().unwrap_or_default())
    }

    pub fn u16_be(&mut self) -> PacketResult<u16> {
        self.ensure(2)?;
        Ok(self.cursor.read_u16::<BigEndian>().unwrap_or_default())
    }

    pub fn u32_le(&mut self) -> PacketResult<u32> {
        self.ensure(4)?;
        Ok(self.cursor.read_u32::<LittleEndian>().unwrap_or_default())
    }

    pub fn u64_le(&mut self) -> PacketResult<u64> {
        self.ensure(8)?;
        Ok(self.cursor.read_u64::<LittleEndian>().unwrap_or_default())
    }

    pub fn i64_le(&mut self) -> PacketResult<i64> {
        self.ensure(8)?;
        Ok(self.cursor.read_i64::<LittleEndian>().unwrap_or_default())
    }

    pub fn f32_le(&mut self) -> PacketResult<f32> {
        self.ensure(4)?;
        Ok(self.cursor.read_f32::<LittleEndian>().unwrap_or_default())
    }

    /// Borrows the next `len` bytes without copying.
    pub fn bytes(&mut self, len: usize) -> PacketResult<&'a [u8]> {
        self.ensure(len)?;
        let start = self.position();
        let data: &'a [u8] = self.cursor.get_ref();
        self.cursor.set_position((start + len) as u64);
        Ok(&data[start..start + len])
    }

    pub fn array<const N: usize>(&mut self) -> PacketResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    /// Reads a NUL-terminated string. A missing terminator ends the string at the end of the
    /// buffer instead of failing.
    pub fn cstring(&mut self) -> PacketResult<String> {
        let data: &'a [u8] = self.cursor.get_ref();
        let start = self.position().min(data.len());
        let rest = &data[start..];
        let (text, consumed) = match rest.iter().position(|b| *b == 0) {
            Some(end) => (&rest[..end], end + 1),
            None => (rest, rest.len()),
        };
        self.cursor.set_position((start + consumed) as u64);
        Ok(String::from_utf8_lossy(text).into_owned())
    }

    pub fn skip(&mut self, len: usize) -> PacketResult<()> {
        self.ensure(len)?;
        self.cursor.set_position((self.position() + len) as u64);
        Ok(())
    }

    pub fn packed_guid(&mut self) -> PacketResult<PackedGuid> {
        let mask = self.u8()?;
        let mut guid = 0u64;
        for i in 0..8 {
            if mask & (1 << i) != 0 {
                guid |= (self.u8()? as u64) << (i * 8);
            }
        }
        Ok(PackedGuid(guid))
    }

    /// Reads a `binrw` structure in little-endian order from the current position.
    pub fn read_layout<T>(&mut self) -> PacketResult<T>
    where
        T: for<'b> BinRead<Args<'b> = ()>,
    {
        let start = self.position();
        T::read_options(&mut self.cursor, Endian::Little, ()).map_err(|err| {
            if err.is_eof() {
                let remaining = self.len().saturating_sub(start);
                PacketError::OutOfBounds {
                    position: start,
                    // binrw does not report the full size of what it wanted.
                    needed: remaining + 1,
                    remaining,
                }
            } else {
                PacketError::Layout(err.to_string())
            }
        })
    }

    pub fn rest(&mut self) -> &'a [u8] {
        let data: &'a [u8] = self.cursor.get_ref();
        let start = self.position().min(data.len());
        self.cursor.set_position(data.len() as u64);
        &data[start..]
    }
}

#[derive(Debug, Default, Clone)]
pub struct PacketWriter {
    buf: Vec<u8>,
}

impl PacketWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn position(&self) -> usize {
        self.buf.len()
    }

    pub fn u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    pub fn u16_le(&mut self, value: u16) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn u16_be(&mut self, value: u16) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn u32_le(&mut self, value: u32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn u64_le(&mut self, value: u64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn i64_le(&mut self, value: i64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn f32_le(&mut self, value: f32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn bytes(&mut self, value: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(value);
        self
    }

    pub fn cstring(&mut self, value: &str) -> &mut Self {
        self.buf.extend_from_slice(value.as_bytes());
        self.buf.push(0);
        self
    }

    pub fn packed_guid(&mut self, guid: PackedGuid) -> &mut Self {
        self.buf.extend_from_slice(&guid.to_packed_bytes());
        self
    }

    /// Overwrites two bytes already written at `at`.
    pub fn patch_u16_le(&mut self, at: usize, value: u16) -> &mut Self {
        if let Some(slot) = self.buf.get_mut(at..at + 2) {
            slot.copy_from_slice(&value.to_le_bytes());
        }
        self
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn cstring_stops_at_nul_or_end() {
        let mut r = PacketReader::new(b"abc\0def");
        assert_eq!(r.cstring().unwrap(), "abc");
        assert_eq!(r.cstring().unwrap(), "def");
        assert!(r.is_empty());
        assert_eq!(r.cstring().unwrap(), "");
    }

    #[test]
    fn reading_past_end_fails_deterministically() {
        let mut r = PacketReader::new(&[1, 2, 3]);
        assert_eq!(r.u16_le().unwrap(), 0x0201);
        let err = r.u32_le().unwrap_err();
        assert_eq!(
            err,
            PacketError::OutOfBounds {
                position: 2,
                needed: 4,
                remaining: 1
            }
        );
        // A failed read does not move the cursor.
        assert_eq!(r.position(), 2);
        assert_eq!(r.u8().unwrap(), 3);
        assert!(r.skip(1).is_err());
    }

    #[test]
    fn packed_guid_only_carries_set_bytes() {
        let mut w = PacketWriter::new();
        w.packed_guid(PackedGuid(0x0102030405060708));
        assert_eq!(
            w.as_slice(),
            &[0xff, 0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]
        );

        let mut w = PacketWriter::new();
        w.packed_guid(PackedGuid(0xF130_0000_0000_002A));
        assert_eq!(w.as_slice(), &[0b1100_0001, 0x2A, 0x30, 0xF1]);

        let mut r = PacketReader::new(w.as_slice());
        let guid = r.packed_guid().unwrap();
        assert_eq!(guid.low(), 0x2A);
        assert_eq!(guid.high(), 0xF130_0000);
        assert!(r.is_empty());
    }

    #[test]
    fn big_endian_and_little_endian_u16_differ() {
        let mut w = PacketWriter::with_capacity(1);
        w.u16_be(0x1234).u16_le(0x1234);
        assert_eq!(w.as_slice(), &[0x12, 0x34, 0x34, 0x12]);
        let mut r = PacketReader::new(w.as_slice());
        assert_eq!(r.u16_be().unwrap(), 0x1234);
        assert_eq!(r.u16_le().unwrap(), 0x1234);
    }

    #[test]
    fn patch_backfills_size_fields() {
        let mut w = PacketWriter::new();
        w.u8(0).u16_le(0).bytes(b"payload");
        let size = (w.position() - 3) as u16;
        w.patch_u16_le(1, size);
        assert_eq!(&w.as_slice()[..3], &[0, 7, 0]);
    }

    proptest! {
        #[test]
        fn primitives_survive_growth(
            a in any::<u8>(),
            b in any::<u16>(),
            c in any::<u32>(),
            d in any::<u64>(),
            e in any::<f32>().prop_filter("nan", |v| !v.is_nan()),
            s in "[a-zA-Z0-9 ]{0,40}",
            raw in prop::collection::vec(any::<u8>(), 0..64),
        ) {
            // Start with a tiny buffer so every write path has to grow it.
            let mut w = PacketWriter::with_capacity(1);
            w.u8(a).u16_le(b).u16_be(b).u32_le(c).u64_le(d).f32_le(e).cstring(&s).bytes(&raw);

            let data = w.into_inner();
            let mut r = PacketReader::new(&data);
            prop_assert_eq!(r.u8().unwrap(), a);
            prop_assert_eq!(r.u16_le().unwrap(), b);
            prop_assert_eq!(r.u16_be().unwrap(), b);
            prop_assert_eq!(r.u32_le().unwrap(), c);
            prop_assert_eq!(r.u64_le().unwrap(), d);
            prop_assert_eq!(r.f32_le().unwrap(), e);
            prop_assert_eq!(r.cstring().unwrap(), s);
            prop_assert_eq!(r.bytes(raw.len()).unwrap(), &raw[..]);
            prop_assert!(r.is_empty());
            prop_assert!(r.u8().is_err());
        }

        #[test]
        fn packed_guid_matches_u64(guid in any::<u64>()) {
            let mut w = PacketWriter::new();
            w.packed_guid(PackedGuid(guid));
            let data = w.into_inner();
            prop_assert_eq!(data.len(), 1 + guid.to_le_bytes().iter().filter(|b| **b != 0).count());
            let mut r = PacketReader::new(&data);
            let decoded = r.packed_guid().unwrap();
            prop_assert_eq!(decoded.0, guid);
            prop_assert_eq!(((decoded.high() as u64) << 32) | decoded.low() as u64, guid);
        }
    }
}
