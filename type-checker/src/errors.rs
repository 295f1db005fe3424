//! Type-checking diagnostics.
//!
//! The checker accumulates errors rather than aborting on the first one
//! (unlike the lexer/parser) so a single run reports as many problems as
//! possible; [`crate::type_checker::TypeChecker::infer_types`] collects them
//! into one `anyhow::Error` only once checking of the whole arena is done.

use thiserror::Error;

use ember_ast::nodes::Location;

#[derive(Debug, Error, Clone, PartialEq)]
#[must_use = "errors must not be silently ignored"]
pub enum TypeCheckError {
    #[error("undefined variable {name:?} at {location}")]
    UndefinedVariable { name: String, location: Location },

    #[error("undefined type {name:?} at {location}")]
    UndefinedType { name: String, location: Location },

    #[error("undefined function {name:?} at {location}")]
    UndefinedFunction { name: String, location: Location },

    #[error("undefined field {field:?} on type {ty} at {location}")]
    UndefinedField {
        field: String,
        ty: String,
        location: Location,
    },

    #[error("undefined method {method:?} on type {ty} at {location}")]
    UndefinedMethod {
        method: String,
        ty: String,
        location: Location,
    },

    #[error("type mismatch at {location}: expected {expected}, found {found}")]
    TypeMismatch {
        expected: String,
        found: String,
        location: Location,
    },

    #[error("value of type {found} is not assignable to {expected} at {location}")]
    NotAssignable {
        expected: String,
        found: String,
        location: Location,
    },

    #[error("expected {expected} argument(s), found {found} at {location}")]
    ArgumentCountMismatch {
        expected: usize,
        found: usize,
        location: Location,
    },

    #[error("bitwise operator {op} is not defined on floating-point operands at {location}")]
    BitwiseOnFloat { op: String, location: Location },

    #[error("{name:?} is already declared in this scope at {location}")]
    RedeclaredVariable { name: String, location: Location },

    #[error("duplicate declaration of {name:?} at {location}")]
    DuplicateDeclaration { name: String, location: Location },

    #[error("class {class:?} does not implement {member:?} required by interface {interface:?} at {location}")]
    InterfaceMissingMember {
        class: String,
        interface: String,
        member: String,
        location: Location,
    },

    #[error("{name:?} cannot extend itself or its own subclass at {location}")]
    CyclicInheritance { name: String, location: Location },

    #[error("`this` used before `super(...)` call completes at {location}")]
    ThisBeforeSuper { location: Location },

    #[error("constructor of {class:?} must call `super(...)` at {location}")]
    MissingSuperCall { class: String, location: Location },

    #[error("union type at {location} is invalid: {detail}")]
    UnionInvalid { detail: String, location: Location },

    #[error("match expression at {location} is not exhaustive: missing {detail}")]
    NonExhaustiveMatch { detail: String, location: Location },

    #[error("cannot apply operator {op} to operands of types {lhs} and {rhs} at {location}")]
    InvalidOperator {
        op: String,
        lhs: String,
        rhs: String,
        location: Location,
    },

    #[error("module {spec:?} has no export named {name:?} at {location}")]
    UnresolvedImport {
        spec: String,
        name: String,
        location: Location,
    },

    #[error("cannot assign to immutable variable {name:?} at {location}")]
    AssignToImmutable { name: String, location: Location },

    #[error("generic type parameter {name:?} does not satisfy bound {bound} at {location}")]
    UnsatisfiedBound {
        name: String,
        bound: String,
        location: Location,
    },
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
    fn undefined_variable_message() {
        let err = TypeCheckError::UndefinedVariable {
            name: "x".to_string(),
            location: loc(),
        };
        assert_eq!(err.to_string(), "undefined variable \"x\" at 1:1");
    }

    #[test]
    fn argument_count_mismatch_message() {
        let err = TypeCheckError::ArgumentCountMismatch {
            expected: 2,
            found: 1,
            location: loc(),
        };
        assert_eq!(err.to_string(), "expected 2 argument(s), found 1 at 1:1");
    }

    #[test]
    fn interface_missing_member_message() {
        let err = TypeCheckError::InterfaceMissingMember {
            class: "Dog".to_string(),
            interface: "Animal".to_string(),
            member: "speak".to_string(),
            location: loc(),
        };
        assert_eq!(
            err.to_string(),
            "class \"Dog\" does not implement \"speak\" required by interface \"Animal\" at 1:1"
        );
    }

    #[test]
    fn this_before_super_message() {
        let err = TypeCheckError::ThisBeforeSuper { location: loc() };
        assert_eq!(
            err.to_string(),
            "`this` used before `super(...)` call completes at 1:1"
        );
    }

    #[test]
    fn bitwise_on_float_message() {
        let err = TypeCheckError::BitwiseOnFloat {
            op: "&".to_string(),
            location: loc(),
        };
        assert_eq!(
            err.to_string(),
            "bitwise operator & is not defined on floating-point operands at 1:1"
        );
    }
}
