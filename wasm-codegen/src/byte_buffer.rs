//! Growable byte buffer with LEB128 encoding, backing every WASM section.

use crate::errors::CodegenError;

/// Doubling growth, same as `Vec`'s own; the hard ceiling exists because a
/// malformed or runaway codegen pass (e.g. an infinite monomorphization
/// loop) should fail loudly instead of exhausting memory.
const MAX_CAPACITY: usize = 256 * 1024 * 1024;

#[derive(Debug, Default, Clone)]
pub struct ByteBuffer {
    bytes: Vec<u8>,
}

impl ByteBuffer {
    #[must_use]
    pub fn new() -> Self {
        ByteBuffer { bytes: Vec::new() }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn push(&mut self, byte: u8) -> Result<(), CodegenError> {
        self.check_capacity(1)?;
        self.bytes.push(byte);
        Ok(())
    }

    pub fn extend_from_slice(&mut self, slice: &[u8]) -> Result<(), CodegenError> {
        self.check_capacity(slice.len())?;
        self.bytes.extend_from_slice(slice);
        Ok(())
    }

    pub fn write_u32_leb(&mut self, value: u32) -> Result<(), CodegenError> {
        leb128::write::unsigned(&mut self.bytes, u64::from(value))
            .map_err(|_| CodegenError::BufferOverflow)?;
        Ok(())
    }

    pub fn write_u64_leb(&mut self, value: u64) -> Result<(), CodegenError> {
        leb128::write::unsigned(&mut self.bytes, value).map_err(|_| CodegenError::BufferOverflow)?;
        Ok(())
    }

    pub fn write_i32_sleb(&mut self, value: i32) -> Result<(), CodegenError> {
        leb128::write::signed(&mut self.bytes, i64::from(value))
            .map_err(|_| CodegenError::BufferOverflow)?;
        Ok(())
    }

    pub fn write_i64_sleb(&mut self, value: i64) -> Result<(), CodegenError> {
        leb128::write::signed(&mut self.bytes, value).map_err(|_| CodegenError::BufferOverflow)?;
        Ok(())
    }

    pub fn write_f32(&mut self, value: f32) -> Result<(), CodegenError> {
        self.extend_from_slice(&value.to_le_bytes())
    }

    pub fn write_f64(&mut self, value: f64) -> Result<(), CodegenError> {
        self.extend_from_slice(&value.to_le_bytes())
    }

    /// Writes a UTF-8 name as a length-prefixed byte vector, the encoding
    /// WASM uses for import/export names.
    pub fn write_name(&mut self, name: &str) -> Result<(), CodegenError> {
        self.write_u32_leb(u32::try_from(name.len()).unwrap_or(u32::MAX))?;
        self.extend_from_slice(name.as_bytes())
    }

    /// Writes `body` preceded by its own LEB128-encoded byte length, the
    /// pattern every WASM section and every code-section function entry
    /// uses.
    pub fn write_len_prefixed(&mut self, body: &[u8]) -> Result<(), CodegenError> {
        self.write_u32_leb(u32::try_from(body.len()).unwrap_or(u32::MAX))?;
        self.extend_from_slice(body)
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.bytes
    }

    fn check_capacity(&self, additional: usize) -> Result<(), CodegenError> {
        if self.bytes.len().saturating_add(additional) > MAX_CAPACITY {
            return Err(CodegenError::BufferOverflow);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leb128_roundtrip_small_values() {
        let mut buf = ByteBuffer::new();
        buf.write_u32_leb(0).unwrap();
        buf.write_u32_leb(127).unwrap();
        buf.write_u32_leb(128).unwrap();
        assert_eq!(buf.as_slice(), &[0x00, 0x7f, 0x80, 0x01]);
    }

    #[test]
    fn signed_leb128_negative_value() {
        let mut buf = ByteBuffer::new();
        buf.write_i32_sleb(-1).unwrap();
        assert_eq!(buf.as_slice(), &[0x7f]);
    }

    #[test]
    fn write_name_length_prefixes_utf8_bytes() {
        let mut buf = ByteBuffer::new();
        buf.write_name("ok").unwrap();
        assert_eq!(buf.as_slice(), &[0x02, b'o', b'k']);
    }
}
