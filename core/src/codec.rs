//! Primitive encodings shared by both store files.
//!
//! Varints are little-endian base-128 with the high bit marking continuation.
//! Term keys are a single length byte (1..=255) followed by the term bytes.

use crate::error::{IndexError, Result};
use crate::index::MAX_TERM_LEN;

pub fn put_varint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

pub fn put_term_key(out: &mut Vec<u8>, term: &[u8]) {
    debug_assert!(!term.is_empty() && term.len() <= MAX_TERM_LEN);
    out.push(term.len() as u8);
    out.extend_from_slice(term);
}

pub fn put_f32(out: &mut Vec<u8>, value: f32) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Cursor over a borrowed byte view. Running off the end is corruption.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn at(buf: &'a [u8], pos: usize) -> Self {
        Self { buf, pos }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(IndexError::corrupt(format!(
                "truncated: wanted {n} bytes at offset {}, {} left",
                self.pos,
                self.remaining()
            )));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u32_le(&mut self) -> Result<u32> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_u64_le(&mut self) -> Result<u64> {
        let b = self.read_bytes(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(b);
        Ok(u64::from_le_bytes(arr))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        let b = self.read_bytes(4)?;
        Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_varint(&mut self) -> Result<u64> {
        let mut result: u64 = 0;
        let mut shift = 0u32;
        loop {
            let byte = self.read_u8()?;
            if shift == 63 && byte > 1 {
                return Err(IndexError::corrupt("varint overflow"));
            }
            result |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
            if shift > 63 {
                return Err(IndexError::corrupt("varint overflow"));
            }
        }
    }

    pub fn read_varint_u32(&mut self) -> Result<u32> {
        let v = self.read_varint()?;
        u32::try_from(v).map_err(|_| IndexError::corrupt(format!("varint {v} exceeds u32")))
    }

    pub fn read_len(&mut self) -> Result<usize> {
        let v = self.read_varint()?;
        usize::try_from(v).map_err(|_| IndexError::corrupt(format!("length {v} exceeds usize")))
    }

    pub fn read_term_key(&mut self) -> Result<&'a [u8]> {
        let prefix = self.read_u8()?;
        if prefix == 0 {
            return Err(IndexError::corrupt("empty term key"));
        }
        self.read_bytes(prefix as usize)
    }
}
