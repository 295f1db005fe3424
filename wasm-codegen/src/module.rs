//! WASM module builder: one `ByteBuffer`-backed section per WASM section
//! kind, assembled into the final binary by [`Module::to_bytes`].

use rustc_hash::FxHashMap;

use crate::byte_buffer::ByteBuffer;
use crate::errors::CodegenError;
use crate::wasm_types::{TypeShape, ValType};

const MAGIC: [u8; 4] = [0x00, 0x61, 0x73, 0x6d];
const VERSION: [u8; 4] = [0x01, 0x00, 0x00, 0x00];

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ExportKind {
    Func,
    Table,
    Memory,
    Global,
}

impl ExportKind {
    fn byte(self) -> u8 {
        match self {
            ExportKind::Func => 0x00,
            ExportKind::Table => 0x01,
            ExportKind::Memory => 0x02,
            ExportKind::Global => 0x03,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ImportKind {
    Func(u32),
}

/// A module builder. Index spaces for functions, globals, and types are
/// shared between imported and locally-defined items, imports first — the
/// ordering constraint §4.2 requires.
#[derive(Default)]
pub struct Module {
    type_shapes: Vec<TypeShape>,
    type_index: FxHashMap<TypeShape, u32>,

    imports: Vec<(String, String, ImportKind)>,
    functions: Vec<u32>,
    codes: Vec<(Vec<(u32, ValType)>, Vec<u8>)>,
    globals: Vec<(ValType, bool, Vec<u8>)>,
    exports: Vec<(String, ExportKind, u32)>,
    start: Option<u32>,

    next_func_index: u32,
    next_global_index: u32,
}

impl Module {
    #[must_use]
    pub fn new() -> Self {
        Module::default()
    }

    pub fn add_type(&mut self, params: Vec<ValType>, results: Vec<ValType>) -> u32 {
        self.intern_type(TypeShape::Func { params, results })
    }

    pub fn add_struct_type(&mut self, fields: Vec<(ValType, bool)>) -> u32 {
        self.intern_type(TypeShape::Struct { fields })
    }

    pub fn add_array_type(&mut self, element: ValType, mutable: bool) -> u32 {
        self.intern_type(TypeShape::Array { element, mutable })
    }

    fn intern_type(&mut self, shape: TypeShape) -> u32 {
        if let Some(idx) = self.type_index.get(&shape) {
            return *idx;
        }
        let idx = u32::try_from(self.type_shapes.len()).expect("type index overflow");
        self.type_index.insert(shape.clone(), idx);
        self.type_shapes.push(shape);
        idx
    }

    /// Registers an imported function, returning its index in the shared
    /// function index space (imports occupy the low indices).
    pub fn add_import(&mut self, module: &str, name: &str, type_index: u32) -> u32 {
        let idx = self.next_func_index;
        self.next_func_index += 1;
        self.imports
            .push((module.to_string(), name.to_string(), ImportKind::Func(type_index)));
        idx
    }

    /// Declares a locally-defined function with the given signature,
    /// returning its index in the shared function index space.
    pub fn add_function(&mut self, type_index: u32) -> u32 {
        let idx = self.next_func_index;
        self.next_func_index += 1;
        self.functions.push(type_index);
        idx
    }

    pub fn add_global(&mut self, ty: ValType, mutable: bool, init_bytes: Vec<u8>) -> u32 {
        let idx = self.next_global_index;
        self.next_global_index += 1;
        self.globals.push((ty, mutable, init_bytes));
        idx
    }

    /// Attaches a function body (locals grouped by type, then instruction
    /// bytes ending in the `end` opcode) to the function most recently
    /// returned by `add_function`. Code-section entries must be emitted in
    /// the same order functions were declared.
    pub fn add_code(&mut self, locals: Vec<(u32, ValType)>, body_bytes: Vec<u8>) {
        self.codes.push((locals, body_bytes));
    }

    pub fn add_export(&mut self, name: &str, kind: ExportKind, index: u32) {
        self.exports.push((name.to_string(), kind, index));
    }

    pub fn set_start(&mut self, func_index: u32) {
        self.start = Some(func_index);
    }

    #[must_use]
    pub fn next_func_index(&self) -> u32 {
        self.next_func_index
    }

    #[must_use]
    pub fn next_global_index(&self) -> u32 {
        self.next_global_index
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, CodegenError> {
        let mut out = ByteBuffer::new();
        out.extend_from_slice(&MAGIC)?;
        out.extend_from_slice(&VERSION)?;

        self.write_section(&mut out, 1, |buf| self.write_type_section(buf))?;
        self.write_section(&mut out, 2, |buf| self.write_import_section(buf))?;
        self.write_section(&mut out, 3, |buf| self.write_function_section(buf))?;
        // Table/memory sections: unused by this codegen (vtables are GC
        // structs of funcref fields, not WASM tables; no linear memory is
        // allocated since strings/arrays are GC objects), kept as
        // intentionally-empty slots to preserve canonical section order.
        self.write_section(&mut out, 6, |buf| self.write_global_section(buf))?;
        self.write_section(&mut out, 7, |buf| self.write_export_section(buf))?;
        self.write_section(&mut out, 8, |buf| self.write_start_section(buf))?;
        self.write_section(&mut out, 10, |buf| self.write_code_section(buf))?;

        Ok(out.into_vec())
    }

    fn write_section(
        &self,
        out: &mut ByteBuffer,
        id: u8,
        body_fn: impl FnOnce(&mut ByteBuffer) -> Result<(), CodegenError>,
    ) -> Result<(), CodegenError> {
        let mut body = ByteBuffer::new();
        body_fn(&mut body)?;
        if body.is_empty() {
            return Ok(());
        }
        out.push(id)?;
        out.write_len_prefixed(body.as_slice())
    }

    fn write_type_section(&self, buf: &mut ByteBuffer) -> Result<(), CodegenError> {
        if self.type_shapes.is_empty() {
            return Ok(());
        }
        buf.write_u32_leb(u32::try_from(self.type_shapes.len()).unwrap_or(u32::MAX))?;
        for shape in &self.type_shapes {
            match shape {
                TypeShape::Func { params, results } => {
                    buf.push(0x60)?;
                    buf.write_u32_leb(u32::try_from(params.len()).unwrap_or(u32::MAX))?;
                    for p in params {
                        p.encode(buf)?;
                    }
                    buf.write_u32_leb(u32::try_from(results.len()).unwrap_or(u32::MAX))?;
                    for r in results {
                        r.encode(buf)?;
                    }
                }
                TypeShape::Struct { fields } => {
                    buf.push(0x5f)?;
                    buf.write_u32_leb(u32::try_from(fields.len()).unwrap_or(u32::MAX))?;
                    for (ty, mutable) in fields {
                        ty.encode(buf)?;
                        buf.push(u8::from(*mutable))?;
                    }
                }
                TypeShape::Array { element, mutable } => {
                    buf.push(0x5e)?;
                    element.encode(buf)?;
                    buf.push(u8::from(*mutable))?;
                }
            }
        }
        Ok(())
    }

    fn write_import_section(&self, buf: &mut ByteBuffer) -> Result<(), CodegenError> {
        if self.imports.is_empty() {
            return Ok(());
        }
        buf.write_u32_leb(u32::try_from(self.imports.len()).unwrap_or(u32::MAX))?;
        for (module, name, kind) in &self.imports {
            buf.write_name(module)?;
            buf.write_name(name)?;
            match kind {
                ImportKind::Func(type_index) => {
                    buf.push(0x00)?;
                    buf.write_u32_leb(*type_index)?;
                }
            }
        }
        Ok(())
    }

    fn write_function_section(&self, buf: &mut ByteBuffer) -> Result<(), CodegenError> {
        if self.functions.is_empty() {
            return Ok(());
        }
        buf.write_u32_leb(u32::try_from(self.functions.len()).unwrap_or(u32::MAX))?;
        for type_index in &self.functions {
            buf.write_u32_leb(*type_index)?;
        }
        Ok(())
    }

    fn write_global_section(&self, buf: &mut ByteBuffer) -> Result<(), CodegenError> {
        if self.globals.is_empty() {
            return Ok(());
        }
        buf.write_u32_leb(u32::try_from(self.globals.len()).unwrap_or(u32::MAX))?;
        for (ty, mutable, init) in &self.globals {
            ty.encode(buf)?;
            buf.push(u8::from(*mutable))?;
            buf.extend_from_slice(init)?;
        }
        Ok(())
    }

    fn write_export_section(&self, buf: &mut ByteBuffer) -> Result<(), CodegenError> {
        if self.exports.is_empty() {
            return Ok(());
        }
        buf.write_u32_leb(u32::try_from(self.exports.len()).unwrap_or(u32::MAX))?;
        for (name, kind, index) in &self.exports {
            buf.write_name(name)?;
            buf.push(kind.byte())?;
            buf.write_u32_leb(*index)?;
        }
        Ok(())
    }

    fn write_start_section(&self, buf: &mut ByteBuffer) -> Result<(), CodegenError> {
        if let Some(idx) = self.start {
            buf.write_u32_leb(idx)?;
        }
        Ok(())
    }

    fn write_code_section(&self, buf: &mut ByteBuffer) -> Result<(), CodegenError> {
        if self.codes.is_empty() {
            return Ok(());
        }
        buf.write_u32_leb(u32::try_from(self.codes.len()).unwrap_or(u32::MAX))?;
        for (locals, body) in &self.codes {
            let mut entry = ByteBuffer::new();
            entry.write_u32_leb(u32::try_from(locals.len()).unwrap_or(u32::MAX))?;
            for (count, ty) in locals {
                entry.write_u32_leb(*count)?;
                ty.encode(&mut entry)?;
            }
            entry.extend_from_slice(body)?;
            buf.write_len_prefixed(entry.as_slice())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_wasm_magic_and_version() {
        let module = Module::new();
        let bytes = module.to_bytes().unwrap();
        assert_eq!(&bytes[0..4], &MAGIC);
        assert_eq!(&bytes[4..8], &VERSION);
    }

    #[test]
    fn add_type_deduplicates_identical_signatures() {
        let mut module = Module::new();
        let a = module.add_type(vec![ValType::I32], vec![ValType::I32]);
        let b = module.add_type(vec![ValType::I32], vec![ValType::I32]);
        let c = module.add_type(vec![ValType::I64], vec![ValType::I32]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn empty_sections_are_omitted_from_output() {
        let module = Module::new();
        let bytes = module.to_bytes().unwrap();
        assert_eq!(bytes.len(), 8);
    }

    #[test]
    fn import_precedes_local_function_in_shared_index_space() {
        let mut module = Module::new();
        let ty = module.add_type(vec![], vec![]);
        let imported = module.add_import("env", "log", ty);
        let local = module.add_function(ty);
        assert_eq!(imported, 0);
        assert_eq!(local, 1);
    }
}
