//! Tree-based symbol table for scopes and declarations during checking.
//!
//! Scopes form a tree; each scope can have children and a parent. Variable
//! lookup walks up from the current scope to the root. Class/interface/
//! mixin/enum/function declarations are registered into a flat global table
//! keyed by name (Ember has no nested namespaces) rather than into a scope,
//! since they're visible module-wide regardless of declaration order.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::type_info::TypeInfo;

pub(crate) type ScopeRef = Rc<RefCell<Scope>>;

#[derive(Debug, Clone)]
pub(crate) struct FuncInfo {
    pub(crate) name: String,
    pub(crate) type_params: Vec<String>,
    pub(crate) param_types: Vec<TypeInfo>,
    pub(crate) return_type: TypeInfo,
}

#[derive(Debug, Clone)]
pub(crate) struct FieldInfo {
    pub(crate) name: String,
    pub(crate) type_info: TypeInfo,
    pub(crate) mutable: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct MethodInfo {
    pub(crate) signature: FuncInfo,
    pub(crate) is_final: bool,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ClassInfo {
    pub(crate) name: String,
    pub(crate) type_params: Vec<String>,
    pub(crate) super_class: Option<String>,
    pub(crate) implements: Vec<String>,
    pub(crate) fields: FxHashMap<String, FieldInfo>,
    pub(crate) methods: FxHashMap<String, MethodInfo>,
    pub(crate) is_final: bool,
}

impl ClassInfo {
    /// Looks up a method by name, walking the `super_class` chain.
    pub(crate) fn resolve_method<'a>(
        &'a self,
        name: &str,
        classes: &'a FxHashMap<String, ClassInfo>,
    ) -> Option<&'a MethodInfo> {
        if let Some(m) = self.methods.get(name) {
            return Some(m);
        }
        let parent = self.super_class.as_ref()?;
        classes.get(parent)?.resolve_method(name, classes)
    }

    pub(crate) fn resolve_field<'a>(
        &'a self,
        name: &str,
        classes: &'a FxHashMap<String, ClassInfo>,
    ) -> Option<&'a FieldInfo> {
        if let Some(f) = self.fields.get(name) {
            return Some(f);
        }
        let parent = self.super_class.as_ref()?;
        classes.get(parent)?.resolve_field(name, classes)
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct InterfaceInfo {
    pub(crate) name: String,
    pub(crate) parent: Option<String>,
    pub(crate) methods: FxHashMap<String, FuncInfo>,
    pub(crate) fields: FxHashMap<String, TypeInfo>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct MixinInfo {
    pub(crate) name: String,
    pub(crate) fields: FxHashMap<String, FieldInfo>,
    pub(crate) methods: FxHashMap<String, MethodInfo>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct EnumInfo {
    pub(crate) name: String,
    pub(crate) variants: Vec<String>,
}

#[derive(Default)]
pub(crate) struct SymbolTable {
    pub(crate) classes: FxHashMap<String, ClassInfo>,
    pub(crate) interfaces: FxHashMap<String, InterfaceInfo>,
    pub(crate) mixins: FxHashMap<String, MixinInfo>,
    pub(crate) enums: FxHashMap<String, EnumInfo>,
    pub(crate) functions: FxHashMap<String, FuncInfo>,
    pub(crate) type_aliases: FxHashMap<String, TypeInfo>,
    pub(crate) root_scope: ScopeRef,
}

impl SymbolTable {
    pub(crate) fn class_implements(&self, class_name: &str, interface_name: &str) -> bool {
        let Some(class) = self.classes.get(class_name) else {
            return false;
        };
        if class.implements.iter().any(|i| i == interface_name) {
            return true;
        }
        match &class.super_class {
            Some(parent) => self.class_implements(parent, interface_name),
            None => false,
        }
    }

    pub(crate) fn class_extends(&self, class_name: &str, other: &str) -> bool {
        if class_name == other {
            return true;
        }
        match self.classes.get(class_name).and_then(|c| c.super_class.as_deref()) {
            Some(parent) => self.class_extends(parent, other),
            None => false,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Scope {
    pub(crate) id: u32,
    pub(crate) parent: Option<ScopeRef>,
    pub(crate) variables: FxHashMap<String, TypeInfo>,
}

impl Scope {
    pub(crate) fn child(parent: &ScopeRef, id: u32) -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            id,
            parent: Some(parent.clone()),
            variables: FxHashMap::default(),
        }))
    }

    pub(crate) fn root(id: u32) -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            id,
            parent: None,
            variables: FxHashMap::default(),
        }))
    }

    pub(crate) fn declare(&mut self, name: String, ty: TypeInfo) {
        self.variables.insert(name, ty);
    }

    /// Looks up a variable by walking from this scope up to the root.
    pub(crate) fn lookup(scope: &ScopeRef, name: &str) -> Option<TypeInfo> {
        if let Some(ty) = scope.borrow().variables.get(name) {
            return Some(ty.clone());
        }
        let parent = scope.borrow().parent.clone()?;
        Scope::lookup(&parent, name)
    }

    /// True when `name` is declared in this exact scope (not an ancestor) —
    /// used to reject redeclaration within one block.
    pub(crate) fn declared_locally(scope: &ScopeRef, name: &str) -> bool {
        scope.borrow().variables.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::type_info::TypeInfoKind;

    #[test]
    fn lookup_walks_up_the_scope_chain() {
        let root = Scope::root(0);
        root.borrow_mut().declare("x".to_string(), TypeInfo::new(TypeInfoKind::Bool));
        let child = Scope::child(&root, 1);
        assert_eq!(
            Scope::lookup(&child, "x").map(|t| t.kind),
            Some(TypeInfoKind::Bool)
        );
    }

    #[test]
    fn declared_locally_does_not_see_parent_bindings() {
        let root = Scope::root(0);
        root.borrow_mut().declare("x".to_string(), TypeInfo::new(TypeInfoKind::Bool));
        let child = Scope::child(&root, 1);
        assert!(!Scope::declared_locally(&child, "x"));
    }

    #[test]
    fn class_extends_follows_super_chain() {
        let mut table = SymbolTable::default();
        table.classes.insert(
            "Base".to_string(),
            ClassInfo {
                name: "Base".to_string(),
                ..Default::default()
            },
        );
        table.classes.insert(
            "Mid".to_string(),
            ClassInfo {
                name: "Mid".to_string(),
                super_class: Some("Base".to_string()),
                ..Default::default()
            },
        );
        assert!(table.class_extends("Mid", "Base"));
        assert!(!table.class_extends("Base", "Mid"));
    }
}
