//! The side-table mapping AST node ids to their inferred [`TypeInfo`].
//!
//! Holds the original [`Arena`] alongside the per-node type map so later
//! stages (codegen) can walk the same tree the checker walked without the
//! checker having mutated it (invariant: the AST is immutable after parsing).

use std::rc::Rc;

use rustc_hash::FxHashMap;

use ember_ast::arena::Arena;
use ember_ast::nodes::{AstNode, Expression, Location, SourceFile};

use crate::symbol_table::SymbolTable;
use crate::type_info::TypeInfo;

#[derive(Default)]
pub struct TypedContext {
    pub(crate) symbol_table: SymbolTable,
    node_types: FxHashMap<u32, TypeInfo>,
    arena: Arena,
}

impl TypedContext {
    pub(crate) fn new(arena: Arena) -> Self {
        TypedContext {
            symbol_table: SymbolTable::default(),
            node_types: FxHashMap::default(),
            arena,
        }
    }

    #[must_use]
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    #[must_use]
    pub fn source_files(&self) -> Vec<Rc<SourceFile>> {
        self.arena.source_files()
    }

    #[must_use]
    pub fn get_node_typeinfo(&self, node_id: u32) -> Option<TypeInfo> {
        self.node_types.get(&node_id).cloned()
    }

    #[must_use]
    pub fn get_parent_node(&self, id: u32) -> Option<AstNode> {
        self.arena
            .find_parent_node(id)
            .and_then(|parent_id| self.arena.find_node(parent_id))
    }

    pub(crate) fn set_node_typeinfo(&mut self, node_id: u32, type_info: TypeInfo) {
        self.node_types.insert(node_id, type_info);
    }

    /// Verifies every value expression in the arena received a `TypeInfo`.
    /// An empty result means the checker visited every value position; a
    /// non-empty one is a checker bug, not a user-facing diagnostic.
    #[must_use]
    pub fn find_untyped_expressions(&self) -> Vec<MissingExpressionType> {
        self.arena
            .filter_nodes(|node| matches!(node, AstNode::Expression(_)))
            .into_iter()
            .filter_map(|node| {
                let AstNode::Expression(expr) = &node else {
                    return None;
                };
                let id = expr.id();
                if self.node_types.contains_key(&id) {
                    return None;
                }
                Some(MissingExpressionType {
                    id,
                    kind: expression_kind_name(expr),
                    location: expr.location(),
                })
            })
            .collect()
    }
}

fn expression_kind_name(expr: &Expression) -> String {
    match expr {
        Expression::Number(_) => "Number",
        Expression::String(_) => "String",
        Expression::Bool(_) => "Bool",
        Expression::Null(_) => "Null",
        Expression::Template(_) => "Template",
        Expression::Identifier(_) => "Identifier",
        Expression::Binary(_) => "Binary",
        Expression::Unary(_) => "Unary",
        Expression::Call(_) => "Call",
        Expression::New(_) => "New",
        Expression::Member(_) => "Member",
        Expression::Index(_) => "Index",
        Expression::Record(_) => "Record",
        Expression::Tuple(_) => "Tuple",
        Expression::Array(_) => "Array",
        Expression::Function(_) => "Function",
        Expression::If(_) => "If",
        Expression::Match(_) => "Match",
        Expression::Throw(_) => "Throw",
        Expression::Super(_) => "Super",
        Expression::This(_) => "This",
        Expression::Cast(_) => "Cast",
        Expression::TypeTest(_) => "TypeTest",
        Expression::Range(_) => "Range",
        Expression::Spread(_) => "Spread",
        Expression::SymbolRef(_) => "SymbolRef",
        Expression::Wildcard(_) => "Wildcard",
    }
    .to_string()
}

#[derive(Debug)]
pub struct MissingExpressionType {
    pub id: u32,
    pub kind: String,
    pub location: Location,
}
