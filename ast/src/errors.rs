//! Lexer and parser error types.
//!
//! Both stages fail fast: the first error aborts that module's compilation
//! (further tokens/nodes would be noise derived from a broken prefix).

use thiserror::Error;

use crate::token::Span;

#[derive(Debug, Error, Clone, PartialEq)]
#[must_use = "errors must not be silently ignored"]
pub enum LexError {
    #[error("unexpected character {ch:?} at {span}")]
    UnexpectedChar { ch: char, span: Span },

    #[error("unterminated string literal starting at {span}")]
    UnterminatedString { span: Span },

    #[error("unterminated template literal starting at {span}")]
    UnterminatedTemplate { span: Span },

    #[error("invalid numeric literal {text:?} at {span}")]
    InvalidNumber { text: String, span: Span },

    #[error("invalid escape sequence \\{ch} at {span}")]
    InvalidEscape { ch: char, span: Span },
}

#[derive(Debug, Error, Clone, PartialEq)]
#[must_use = "errors must not be silently ignored"]
pub enum ParseError {
    #[error("unexpected token {found:?} at {span}, expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: String,
        span: Span,
    },

    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEof { expected: String },

    #[error("imports must appear at the top of the module, found at {span}")]
    MisplacedImport { span: Span },

    #[error("ambiguous generic argument list at {span}")]
    AmbiguousGenericArgs { span: Span },

    #[error("logical OR pattern arms bind different names: {detail} at {span}")]
    OrPatternBindingMismatch { detail: String, span: Span },

    #[error("duplicate binding {name:?} in logical AND pattern at {span}")]
    DuplicatePatternBinding { name: String, span: Span },

    #[error(transparent)]
    Lex(#[from] LexError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span() -> Span {
        Span {
            start: 0,
            end: 1,
            line: 1,
            column: 1,
        }
    }

    #[test]
    fn unexpected_char_message() {
        let err = LexError::UnexpectedChar { ch: '$', span: span() };
        assert_eq!(err.to_string(), "unexpected character '$' at 1:1");
    }

    #[test]
    fn unterminated_string_message() {
        let err = LexError::UnterminatedString { span: span() };
        assert_eq!(err.to_string(), "unterminated string literal starting at 1:1");
    }

    #[test]
    fn unexpected_token_message() {
        let err = ParseError::UnexpectedToken {
            found: "}".to_string(),
            expected: "expression".to_string(),
            span: span(),
        };
        assert_eq!(
            err.to_string(),
            "unexpected token \"}\" at 1:1, expected expression"
        );
    }

    #[test]
    fn misplaced_import_message() {
        let err = ParseError::MisplacedImport { span: span() };
        assert_eq!(
            err.to_string(),
            "imports must appear at the top of the module, found at 1:1"
        );
    }

    #[test]
    fn lex_error_propagates_through_parse_error() {
        let err: ParseError = LexError::InvalidEscape { ch: 'q', span: span() }.into();
        assert_eq!(err.to_string(), "invalid escape sequence \\q at 1:1");
    }
}
