//! Thin wrapper over [`ByteBuffer`] with one method per WASM opcode this
//! codegen emits. Keeping opcode bytes in one place avoids scattering magic
//! numbers through `codegen.rs`.

use crate::byte_buffer::ByteBuffer;
use crate::errors::CodegenError;

#[derive(Default)]
pub(crate) struct CodeBuilder {
    buf: ByteBuffer,
}

impl CodeBuilder {
    pub(crate) fn new() -> Self {
        CodeBuilder::default()
    }

    pub(crate) fn finish(mut self) -> Result<Vec<u8>, CodegenError> {
        self.buf.push(0x0b)?; // end
        Ok(self.buf.into_vec())
    }

    pub(crate) fn local_get(&mut self, idx: u32) -> Result<(), CodegenError> {
        self.buf.push(0x20)?;
        self.buf.write_u32_leb(idx)
    }

    pub(crate) fn local_set(&mut self, idx: u32) -> Result<(), CodegenError> {
        self.buf.push(0x21)?;
        self.buf.write_u32_leb(idx)
    }

    pub(crate) fn local_tee(&mut self, idx: u32) -> Result<(), CodegenError> {
        self.buf.push(0x22)?;
        self.buf.write_u32_leb(idx)
    }

    pub(crate) fn global_get(&mut self, idx: u32) -> Result<(), CodegenError> {
        self.buf.push(0x23)?;
        self.buf.write_u32_leb(idx)
    }

    pub(crate) fn global_set(&mut self, idx: u32) -> Result<(), CodegenError> {
        self.buf.push(0x24)?;
        self.buf.write_u32_leb(idx)
    }

    pub(crate) fn i32_const(&mut self, v: i32) -> Result<(), CodegenError> {
        self.buf.push(0x41)?;
        self.buf.write_i32_sleb(v)
    }

    pub(crate) fn i64_const(&mut self, v: i64) -> Result<(), CodegenError> {
        self.buf.push(0x42)?;
        self.buf.write_i64_sleb(v)
    }

    pub(crate) fn f32_const(&mut self, v: f32) -> Result<(), CodegenError> {
        self.buf.push(0x43)?;
        self.buf.write_f32(v)
    }

    pub(crate) fn f64_const(&mut self, v: f64) -> Result<(), CodegenError> {
        self.buf.push(0x44)?;
        self.buf.write_f64(v)
    }

    pub(crate) fn call(&mut self, func_index: u32) -> Result<(), CodegenError> {
        self.buf.push(0x10)?;
        self.buf.write_u32_leb(func_index)
    }

    pub(crate) fn call_ref(&mut self, type_index: u32) -> Result<(), CodegenError> {
        self.buf.push(0x14)?;
        self.buf.write_u32_leb(type_index)
    }

    pub(crate) fn ref_func(&mut self, func_index: u32) -> Result<(), CodegenError> {
        self.buf.push(0xd2)?;
        self.buf.write_u32_leb(func_index)
    }

    pub(crate) fn ref_null(&mut self, type_index: i32) -> Result<(), CodegenError> {
        self.buf.push(0xd0)?;
        self.buf.write_i32_sleb(type_index)
    }

    pub(crate) fn ref_test(&mut self, type_index: u32) -> Result<(), CodegenError> {
        self.buf.push(0xfb)?;
        self.buf.write_u32_leb(20)?;
        self.buf.write_u32_leb(type_index)
    }

    pub(crate) fn struct_new(&mut self, type_index: u32) -> Result<(), CodegenError> {
        self.buf.push(0xfb)?;
        self.buf.write_u32_leb(0)?;
        self.buf.write_u32_leb(type_index)
    }

    pub(crate) fn struct_get(&mut self, type_index: u32, field_index: u32) -> Result<(), CodegenError> {
        self.buf.push(0xfb)?;
        self.buf.write_u32_leb(2)?;
        self.buf.write_u32_leb(type_index)?;
        self.buf.write_u32_leb(field_index)
    }

    pub(crate) fn struct_set(&mut self, type_index: u32, field_index: u32) -> Result<(), CodegenError> {
        self.buf.push(0xfb)?;
        self.buf.write_u32_leb(5)?;
        self.buf.write_u32_leb(type_index)?;
        self.buf.write_u32_leb(field_index)
    }

    pub(crate) fn array_new(&mut self, type_index: u32) -> Result<(), CodegenError> {
        self.buf.push(0xfb)?;
        self.buf.write_u32_leb(6)?;
        self.buf.write_u32_leb(type_index)
    }

    pub(crate) fn array_new_fixed(&mut self, type_index: u32, count: u32) -> Result<(), CodegenError> {
        self.buf.push(0xfb)?;
        self.buf.write_u32_leb(8)?;
        self.buf.write_u32_leb(type_index)?;
        self.buf.write_u32_leb(count)
    }

    /// `array.new_default`: pops a length, pushes a new array of that length
    /// filled with the element type's default value (zero for numeric types).
    pub(crate) fn array_new_default(&mut self, type_index: u32) -> Result<(), CodegenError> {
        self.buf.push(0xfb)?;
        self.buf.write_u32_leb(7)?;
        self.buf.write_u32_leb(type_index)
    }

    /// `array.copy $dst $src`: pops `(dst, dst_offset, src, src_offset, len)`
    /// and copies `len` elements from `src` into `dst`.
    pub(crate) fn array_copy(&mut self, dst_type: u32, src_type: u32) -> Result<(), CodegenError> {
        self.buf.push(0xfb)?;
        self.buf.write_u32_leb(17)?;
        self.buf.write_u32_leb(dst_type)?;
        self.buf.write_u32_leb(src_type)
    }

    pub(crate) fn array_get(&mut self, type_index: u32) -> Result<(), CodegenError> {
        self.buf.push(0xfb)?;
        self.buf.write_u32_leb(11)?;
        self.buf.write_u32_leb(type_index)
    }

    pub(crate) fn array_set(&mut self, type_index: u32) -> Result<(), CodegenError> {
        self.buf.push(0xfb)?;
        self.buf.write_u32_leb(14)?;
        self.buf.write_u32_leb(type_index)
    }

    pub(crate) fn array_len(&mut self) -> Result<(), CodegenError> {
        self.buf.push(0xfb)?;
        self.buf.write_u32_leb(15)
    }

    pub(crate) fn if_start(&mut self) -> Result<(), CodegenError> {
        self.buf.push(0x04)?;
        self.buf.push(0x40) // blocktype void; result type threaded through stack pops handled by caller
    }

    pub(crate) fn if_start_result(&mut self, result_type_byte: u8) -> Result<(), CodegenError> {
        self.buf.push(0x04)?;
        self.buf.push(result_type_byte)
    }

    pub(crate) fn else_branch(&mut self) -> Result<(), CodegenError> {
        self.buf.push(0x05)
    }

    pub(crate) fn end(&mut self) -> Result<(), CodegenError> {
        self.buf.push(0x0b)
    }

    pub(crate) fn drop(&mut self) -> Result<(), CodegenError> {
        self.buf.push(0x1a)
    }

    pub(crate) fn unreachable(&mut self) -> Result<(), CodegenError> {
        self.buf.push(0x00)
    }

    pub(crate) fn ret(&mut self) -> Result<(), CodegenError> {
        self.buf.push(0x0f)
    }

    pub(crate) fn binop(&mut self, opcode: u8) -> Result<(), CodegenError> {
        self.buf.push(opcode)
    }

    pub(crate) fn extend(&mut self, bytes: &[u8]) -> Result<(), CodegenError> {
        self.buf.extend_from_slice(bytes)
    }
}
