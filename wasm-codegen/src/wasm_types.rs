//! WASM value types and the structural shapes used to deduplicate type
//! section entries.

use crate::byte_buffer::ByteBuffer;
use crate::errors::CodegenError;

/// A WASM value type, extended with the GC reference types this codegen
/// needs (`structref`/`arrayref` specialised per declared struct/array
/// type index, and nullable `ref null` variants for optional references).
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum ValType {
    I32,
    I64,
    F32,
    F64,
    /// Non-nullable reference to the struct/array/function type at this index.
    Ref(u32),
    /// Nullable reference to the struct/array/function type at this index.
    RefNull(u32),
    /// `anyref`, used for interface object references and generic slots.
    AnyRef,
    /// `funcref`, used for vtable entries and closure function pointers.
    FuncRef,
}

impl ValType {
    pub(crate) fn encode(self, buf: &mut ByteBuffer) -> Result<(), CodegenError> {
        match self {
            ValType::I32 => buf.push(0x7f),
            ValType::I64 => buf.push(0x7e),
            ValType::F32 => buf.push(0x7d),
            ValType::F64 => buf.push(0x7c),
            ValType::AnyRef => buf.push(0x6e),
            ValType::FuncRef => buf.push(0x70),
            ValType::Ref(idx) => {
                buf.push(0x64)?;
                buf.write_u32_leb(idx)
            }
            ValType::RefNull(idx) => {
                buf.push(0x63)?;
                buf.write_u32_leb(idx)
            }
        }
    }
}

/// The shape of a type-section entry, compared structurally so the emitter
/// can deduplicate identical signatures and struct/array layouts instead of
/// emitting a fresh type index per use.
#[derive(Clone, PartialEq, Eq, Debug, Hash)]
pub enum TypeShape {
    Func {
        params: Vec<ValType>,
        results: Vec<ValType>,
    },
    Struct {
        fields: Vec<(ValType, bool)>,
    },
    Array {
        element: ValType,
        mutable: bool,
    },
}
