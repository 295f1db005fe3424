//! Node storage for a parsed module.
//!
//! The AST is immutable after parsing (invariant P2 / §3.6.1); rather than
//! owning a tree of `Box<Node>`, the parser inserts every node into this
//! arena keyed by its `u32` id and records parent/child edges separately in
//! [`NodeRoute`]. Later stages (the semantic context, codegen) key their own
//! side-tables by the same id instead of touching the tree.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::nodes::{Ast, AstNode, Declaration, Expression, SourceFile};

#[derive(Default, Clone)]
pub struct Arena {
    pub(crate) nodes: FxHashMap<u32, AstNode>,
    pub(crate) node_routes: Vec<NodeRoute>,
    next_id: u32,
}

impl Arena {
    /// Allocates the next sequential node id. Id `0` is reserved for
    /// "invalid/uninitialized"; ids start at `1`.
    pub fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    #[must_use]
    pub fn source_files(&self) -> Vec<Rc<SourceFile>> {
        self.list_nodes_cmp(|node| {
            if let AstNode::Ast(Ast::SourceFile(source_file)) = node {
                Some(source_file.clone())
            } else {
                None
            }
        })
        .collect()
    }

    #[must_use]
    pub fn top_level_declarations(&self) -> Vec<Declaration> {
        self.source_files()
            .iter()
            .flat_map(|source_file| source_file.statements.clone())
            .filter_map(|statement| match statement {
                crate::nodes::Statement::Declaration(d) => Some(d.declaration.clone()),
                crate::nodes::Statement::Export(e) => Some(e.declaration.clone()),
                _ => None,
            })
            .collect()
    }

    /// Adds a node to the arena and records its parent-child relationship.
    ///
    /// # Panics
    ///
    /// Panics if `node.id()` is zero or if a node with the same id already
    /// exists in the arena.
    pub fn add_node(&mut self, node: AstNode, parent_id: u32) {
        assert!(node.id() != 0, "node id must be non-zero");
        assert!(
            !self.nodes.contains_key(&node.id()),
            "node with id {} already exists in the arena",
            node.id()
        );
        let id = node.id();
        self.nodes.insert(node.id(), node);
        self.add_storage_node(
            NodeRoute {
                id,
                parent: Some(parent_id),
                children: vec![],
            },
            parent_id,
        );
    }

    #[must_use]
    pub fn find_node(&self, id: u32) -> Option<AstNode> {
        self.nodes.get(&id).cloned()
    }

    #[must_use]
    pub fn find_expression(&self, id: u32) -> Option<Expression> {
        match self.find_node(id) {
            Some(AstNode::Expression(e)) => Some(e),
            _ => None,
        }
    }

    #[must_use]
    pub fn find_parent_node(&self, id: u32) -> Option<u32> {
        self.node_routes
            .iter()
            .find(|n| n.id == id)
            .and_then(|node| node.parent)
    }

    pub fn filter_nodes<T: Fn(&AstNode) -> bool>(&self, predicate: T) -> Vec<AstNode> {
        self.nodes.values().filter(predicate).cloned().collect()
    }

    fn add_storage_node(&mut self, node: NodeRoute, parent: u32) {
        if let Some(parent_node) = self.node_routes.iter_mut().find(|n| n.id == parent) {
            parent_node.children.push(node.id);
        }
        self.node_routes.push(node);
    }

    fn list_nodes_cmp<'a, T, F>(&'a self, cmp: F) -> impl Iterator<Item = T> + 'a
    where
        F: Fn(&AstNode) -> Option<T> + Clone + 'a,
        T: Clone + 'static,
    {
        self.nodes.iter().filter_map(move |(_, node)| cmp(node))
    }
}

#[derive(Clone, Default)]
pub struct NodeRoute {
    pub id: u32,
    parent: Option<u32>,
    children: Vec<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{Location, NullLiteral};

    fn null_expr(id: u32) -> AstNode {
        AstNode::Expression(Expression::Null(Rc::new(NullLiteral {
            id,
            location: Location::default(),
        })))
    }

    #[test]
    fn add_node_and_find_node_round_trip() {
        let mut arena = Arena::default();
        arena.add_node(null_expr(1), 0);
        assert!(arena.find_node(1).is_some());
        assert!(arena.find_node(2).is_none());
    }

    #[test]
    fn tracks_parent_child_relationship() {
        let mut arena = Arena::default();
        arena.add_node(null_expr(1), 0);
        arena.add_node(null_expr(2), 1);
        assert_eq!(arena.find_parent_node(2), Some(1));
    }

    #[test]
    #[should_panic(expected = "already exists")]
    fn duplicate_id_panics() {
        let mut arena = Arena::default();
        arena.add_node(null_expr(1), 0);
        arena.add_node(null_expr(1), 0);
    }

    #[test]
    fn next_id_starts_at_one_and_is_monotonic() {
        let mut arena = Arena::default();
        assert_eq!(arena.next_id(), 1);
        assert_eq!(arena.next_id(), 2);
    }
}
