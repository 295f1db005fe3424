//! Implementation methods for AST enum types.
//!
//! This module provides convenience methods for commonly-used type checks
//! and queries on AST enum variants.

use rustc_hash::FxHashSet;

use crate::nodes::{Expression, Pattern};

impl Expression {
    #[must_use]
    pub fn as_identifier_name(&self) -> Option<&str> {
        match self {
            Expression::Identifier(identifier) => Some(&identifier.name),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Expression::Wildcard(_))
    }
}

impl Pattern {
    /// Names bound by this pattern, used to check that logical OR arms bind
    /// identical names (§4.5.6) and that logical AND arms don't duplicate a
    /// binding.
    #[must_use]
    pub fn bound_names(&self) -> FxHashSet<String> {
        let mut names = FxHashSet::default();
        self.collect_bound_names(&mut names);
        names
    }

    fn collect_bound_names(&self, out: &mut FxHashSet<String>) {
        match self {
            Pattern::Identifier(p) => {
                out.insert(p.name.clone());
            }
            Pattern::As(p) => {
                out.insert(p.name.clone());
                p.pattern.collect_bound_names(out);
            }
            Pattern::Tuple(p) => {
                for element in &p.elements {
                    element.collect_bound_names(out);
                }
            }
            Pattern::Record(p) => {
                for (_, pattern) in &p.fields {
                    pattern.collect_bound_names(out);
                }
            }
            Pattern::ClassShape(p) => {
                for (_, pattern) in &p.fields {
                    pattern.collect_bound_names(out);
                }
            }
            Pattern::And(p) => {
                p.left.collect_bound_names(out);
                p.right.collect_bound_names(out);
            }
            Pattern::Or(p) => {
                // Both arms bind the identical set by construction (checked
                // at parse time); either side suffices.
                p.left.collect_bound_names(out);
            }
            Pattern::Literal(_) | Pattern::Wildcard(_) | Pattern::Range(_) => {}
        }
    }
}
