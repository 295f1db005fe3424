//! Type checking and inference for Ember.
//!
//! Bidirectional-ish checking over an already-parsed [`Arena`]: types are
//! inferred bottom-up from literals and declarations, and checked top-down
//! against expected types at call sites, return positions, and variable
//! declarations with an explicit annotation.
//!
//! ## Entry point
//!
//! ```ignore
//! let arena = parser.parse_source_file()?.0;
//! let typed_context = TypeCheckerBuilder::build_typed_context(arena)?.typed_context();
//! ```
//!
//! ## Phases
//!
//! 1. `process_directives` — collect raw `import` statements per source file.
//! 2. `register_types` — register class/interface/mixin/enum/type-alias declarations.
//! 3. `resolve_imports` — bind imported names to symbols registered across the arena.
//! 4. `collect_function_and_constant_definitions` — register top-level functions.
//! 5. `infer_variables` — walk function bodies, assigning a `TypeInfo` to every
//!    expression node and checking it against its context.
//!
//! ## Modules
//!
//! - [`errors`] — diagnostic taxonomy
//! - [`type_info`] — `TypeInfo`/`TypeInfoKind`
//! - [`typed_context`] — per-node type side-table

use std::marker::PhantomData;

use ember_ast::arena::Arena;

use crate::{type_checker::TypeChecker, typed_context::TypedContext};

pub mod errors;
mod symbol_table;
mod type_checker;
pub mod type_info;
pub mod typed_context;

/// Marker state: builder has not yet run type checking.
pub struct TypeCheckerInitState;

/// Marker state: type checking is complete and the context is ready.
pub struct TypeCheckerCompleteState;

pub type CompletedTypeCheckerBuilder = TypeCheckerBuilder<TypeCheckerCompleteState>;

/// Typestate builder: checking must complete before the typed context can
/// be extracted, enforced at compile time rather than by a runtime flag.
pub struct TypeCheckerBuilder<S> {
    typed_context: TypedContext,
    _state: PhantomData<S>,
}

impl Default for TypeCheckerBuilder<TypeCheckerInitState> {
    fn default() -> Self {
        TypeCheckerBuilder::new()
    }
}

impl TypeCheckerBuilder<TypeCheckerInitState> {
    #[must_use]
    pub fn new() -> Self {
        TypeCheckerBuilder {
            typed_context: TypedContext::default(),
            _state: PhantomData,
        }
    }

    /// Runs the full five-phase pipeline over `arena`.
    ///
    /// # Errors
    ///
    /// Returns the accumulated diagnostics as a single `anyhow::Error` if
    /// any phase finds a problem.
    #[must_use = "returns builder with typed context, extract with .typed_context()"]
    pub fn build_typed_context(
        arena: Arena,
    ) -> anyhow::Result<TypeCheckerBuilder<TypeCheckerCompleteState>> {
        let mut ctx = TypedContext::new(arena);
        let mut checker = TypeChecker::default();
        checker.infer_types(&mut ctx)?;

        debug_assert!(
            {
                let untyped = ctx.find_untyped_expressions();
                if !untyped.is_empty() {
                    for m in &untyped {
                        tracing::error!(id = m.id, kind = %m.kind, location = %m.location, "expression without TypeInfo after checking");
                    }
                }
                untyped.is_empty()
            },
            "all expressions should have TypeInfo after type checking"
        );

        Ok(TypeCheckerBuilder {
            typed_context: ctx,
            _state: PhantomData,
        })
    }
}

impl TypeCheckerBuilder<TypeCheckerCompleteState> {
    #[must_use = "consumes builder and returns the typed context"]
    pub fn typed_context(self) -> TypedContext {
        self.typed_context
    }
}
