//! Wire primitives - little-endian packet reading and writing.
//!
//! Every outbound message and inbound cast request in the protocol is a
//! flat little-endian byte sequence. [`ByteReader`] walks an incoming
//! buffer and fails with a typed error instead of panicking when the
//! buffer is short or a value is malformed; [`ByteWriter`] is the inverse.

use std::fmt;

/// A wire-level decode failure. Carries the buffer offset at which the
/// failure occurred and a short description of what was expected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireError {
    pub offset: usize,
    pub expected: &'static str,
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wire decode failed at offset {}: {}", self.offset, self.expected)
    }
}

impl std::error::Error for WireError {}

pub type WireResult<T> = Result<T, WireError>;

/// Sequential little-endian reader over a borrowed byte buffer.
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize, expected: &'static str) -> WireResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(WireError {
                offset: self.pos,
                expected,
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn read_u8(&mut self) -> WireResult<u8> {
        Ok(self.take(1, "u8")?[0])
    }

    pub fn read_i8(&mut self) -> WireResult<i8> {
        Ok(self.take(1, "i8")?[0] as i8)
    }

    pub fn read_u16(&mut self) -> WireResult<u16> {
        let b = self.take(2, "u16")?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> WireResult<u32> {
        let b = self.take(4, "u32")?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_i32(&mut self) -> WireResult<i32> {
        let b = self.take(4, "i32")?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_u64(&mut self) -> WireResult<u64> {
        let b = self.take(8, "u64")?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    pub fn read_f32(&mut self) -> WireResult<f32> {
        let b = self.take(4, "f32")?;
        Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a GUID in packed form: a presence-mask byte followed by only
    /// the non-zero bytes of the 64-bit value.
    pub fn read_packed_u64(&mut self) -> WireResult<u64> {
        let mask = self.read_u8()?;
        let mut value = 0u64;
        for bit in 0..8 {
            if mask & (1 << bit) != 0 {
                let byte = self.take(1, "packed u64 byte")?[0];
                value |= (byte as u64) << (bit * 8);
            }
        }
        Ok(value)
    }

    /// Read a NUL-terminated UTF-8 string.
    pub fn read_cstring(&mut self) -> WireResult<String> {
        let start = self.pos;
        while self.pos < self.buf.len() && self.buf[self.pos] != 0 {
            self.pos += 1;
        }
        if self.pos == self.buf.len() {
            return Err(WireError {
                offset: start,
                expected: "NUL-terminated string",
            });
        }
        let raw = &self.buf[start..self.pos];
        self.pos += 1; // consume the terminator
        String::from_utf8(raw.to_vec()).map_err(|_| WireError {
            offset: start,
            expected: "UTF-8 string",
        })
    }
}

/// Growable little-endian writer.
#[derive(Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            buf: Vec::with_capacity(n),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_i8(&mut self, v: i8) {
        self.buf.push(v as u8);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Write a GUID in packed form, the inverse of
    /// [`ByteReader::read_packed_u64`].
    pub fn write_packed_u64(&mut self, v: u64) {
        let mask_pos = self.buf.len();
        self.buf.push(0);
        let mut mask = 0u8;
        for bit in 0..8 {
            let byte = ((v >> (bit * 8)) & 0xFF) as u8;
            if byte != 0 {
                mask |= 1 << bit;
                self.buf.push(byte);
            }
        }
        self.buf[mask_pos] = mask;
    }

    pub fn write_cstring(&mut self, s: &str) {
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_round_trip() {
        let mut w = ByteWriter::new();
        w.write_u8(0xAB);
        w.write_u16(0x1234);
        w.write_u32(0xDEADBEEF);
        w.write_i32(-77);
        w.write_u64(0x0102030405060708);
        w.write_f32(3.5);

        let bytes = w.into_inner();
        let mut r = ByteReader::new(&bytes);
        assert_eq!(r.read_u8().unwrap(), 0xAB);
        assert_eq!(r.read_u16().unwrap(), 0x1234);
        assert_eq!(r.read_u32().unwrap(), 0xDEADBEEF);
        assert_eq!(r.read_i32().unwrap(), -77);
        assert_eq!(r.read_u64().unwrap(), 0x0102030405060708);
        assert_eq!(r.read_f32().unwrap(), 3.5);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_short_buffer_is_error_not_panic() {
        let bytes = [1u8, 2, 3];
        let mut r = ByteReader::new(&bytes);
        assert!(r.read_u16().is_ok());
        let err = r.read_u32().unwrap_err();
        assert_eq!(err.offset, 2);
        assert_eq!(err.expected, "u32");
    }

    #[test]
    fn test_packed_u64_skips_zero_bytes() {
        let mut w = ByteWriter::new();
        w.write_packed_u64(0x00FF00000000AB00);
        // mask byte + two payload bytes only
        assert_eq!(w.len(), 3);

        let bytes = w.into_inner();
        let mut r = ByteReader::new(&bytes);
        assert_eq!(r.read_packed_u64().unwrap(), 0x00FF00000000AB00);
    }

    #[test]
    fn test_packed_zero() {
        let mut w = ByteWriter::new();
        w.write_packed_u64(0);
        assert_eq!(w.as_slice(), &[0]);
    }

    #[test]
    fn test_cstring() {
        let mut w = ByteWriter::new();
        w.write_cstring("arcanum");
        let bytes = w.into_inner();
        let mut r = ByteReader::new(&bytes);
        assert_eq!(r.read_cstring().unwrap(), "arcanum");

        let unterminated = b"oops";
        let mut r = ByteReader::new(unterminated);
        assert!(r.read_cstring().is_err());
    }
}
