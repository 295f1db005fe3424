#![warn(clippy::pedantic)]

mod byte_buffer;
mod codegen;
mod context;
mod errors;
mod instr;
mod module;
mod wasm_types;

use ember_type_checker::typed_context::TypedContext;
use tracing::instrument;

pub use errors::CodegenError;
pub use module::ExportKind;
pub use wasm_types::ValType;

/// Generates a WASM-GC binary module from a fully type-checked program.
///
/// # Errors
///
/// Returns an error if the typed tree references a construct this codegen
/// does not support, or if an internal invariant (an unresolved symbol, a
/// duplicate type registration) is violated — both indicate a checker/
/// codegen mismatch rather than a user-fixable source error.
#[instrument(skip_all)]
pub fn codegen(typed: &TypedContext) -> anyhow::Result<Vec<u8>> {
    let bytes = codegen::generate(typed)?;
    tracing::debug!(bytes = bytes.len(), "emitted wasm module");
    Ok(bytes)
}
