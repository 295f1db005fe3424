//! Code generation diagnostics.
//!
//! Unlike [`crate::type_checker`]-stage errors (which accumulate across a
//! whole module), a codegen error aborts the pass immediately: by the time
//! codegen runs, the program has already passed type checking, so a codegen
//! failure indicates either an unsupported construct or an internal
//! inconsistency rather than a user-fixable mistake.

use thiserror::Error;

use ember_ast::nodes::Location;

#[derive(Debug, Error, Clone, PartialEq)]
#[must_use = "errors must not be silently ignored"]
pub enum CodegenError {
    #[error("internal buffer exceeded the 256 MiB capacity ceiling")]
    BufferOverflow,

    #[error("unresolved symbol {name:?} at {location} reached codegen unchecked")]
    UnresolvedSymbol { name: String, location: Location },

    #[error("class {name:?} struct type registered more than once")]
    DuplicateStructDefinition { name: String },

    #[error("no local slot allocated for variable {name:?} at {location}")]
    MissingLocalSlot { name: String, location: Location },

    #[error("operator method {method:?} not found on class {class:?} at {location}")]
    MissingOperatorMethod {
        method: String,
        class: String,
        location: Location,
    },

    #[error("match expression at {location} has no matching arm and no trailing wildcard")]
    NonExhaustiveMatch { location: Location },

    #[error("generic function/class {name:?} could not be monomorphised for arguments {args}")]
    MonomorphizationFailure { name: String, args: String },

    #[error("unsupported construct reached codegen: {detail} at {location}")]
    Unsupported { detail: String, location: Location },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> Location {
        Location {
            offset_start: 0,
            offset_end: 1,
            start_line: 1,
            start_column: 1,
        }
    }

    #[test]
    fn buffer_overflow_message() {
        assert_eq!(
            CodegenError::BufferOverflow.to_string(),
            "internal buffer exceeded the 256 MiB capacity ceiling"
        );
    }

    #[test]
    fn duplicate_struct_definition_message() {
        let err = CodegenError::DuplicateStructDefinition {
            name: "Dog".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "class \"Dog\" struct type registered more than once"
        );
    }

    #[test]
    fn missing_operator_method_message() {
        let err = CodegenError::MissingOperatorMethod {
            method: "operator+".to_string(),
            class: "Vec2".to_string(),
            location: loc(),
        };
        assert_eq!(
            err.to_string(),
            "operator method \"operator+\" not found on class \"Vec2\" at 1:1"
        );
    }

    #[test]
    fn non_exhaustive_match_message() {
        let err = CodegenError::NonExhaustiveMatch { location: loc() };
        assert_eq!(
            err.to_string(),
            "match expression at 1:1 has no matching arm and no trailing wildcard"
        );
    }
}
