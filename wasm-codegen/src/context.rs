//! Per-module state threaded through every codegen pass: index-space
//! counters, deferred body generators, queued helpers, and the scope stack
//! for locals — the codegen analogue of the type checker's `Scope`/
//! `SymbolTable` pair, but tracking local slots instead of types.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;

use ember_type_checker::typed_context::TypedContext;

use crate::errors::CodegenError;
use crate::module::Module;
use crate::wasm_types::ValType;

/// Layout of one class: its struct type index, the index of the global
/// holding its vtable, the field-name → (struct slot, type) map (slot 0 is
/// always the vtable reference), and the method-name → vtable slot map.
#[derive(Clone, Debug, Default)]
pub(crate) struct ClassLayout {
    pub(crate) struct_type: u32,
    pub(crate) vtable_type: u32,
    pub(crate) vtable_global: u32,
    pub(crate) field_slots: FxHashMap<String, (u32, ValType)>,
    /// method name -> (vtable slot, concrete function index). The function
    /// index is needed alongside the slot because building the vtable
    /// global's init expression emits one `ref.func <function index>` per
    /// slot, in slot order.
    pub(crate) method_slots: FxHashMap<String, (u32, u32)>,
    /// `interface name -> vtable global` for each interface this class
    /// implements, per the two-reference-pair representation (§4.6 open
    /// question resolution: object ref + interface vtable ref).
    pub(crate) interface_vtables: FxHashMap<String, u32>,
}

/// Layout of one interface: its vtable struct type and fixed method slot
/// order, shared by every implementing class's per-interface vtable.
#[derive(Clone, Debug, Default)]
pub(crate) struct InterfaceLayout {
    pub(crate) vtable_type: u32,
    pub(crate) method_slots: FxHashMap<String, u32>,
    pub(crate) method_order: Vec<String>,
}

/// A single lexical scope of local variable slots, mirroring
/// `type_checker::symbol_table::Scope` but mapping names to WASM local
/// indices instead of `TypeInfo`.
#[derive(Default)]
pub(crate) struct LocalScope {
    pub(crate) slots: FxHashMap<String, u32>,
}

pub(crate) type PendingBody = Box<dyn FnOnce(&mut CodegenContext) -> Result<(), CodegenError>>;

pub(crate) struct CodegenContext<'a> {
    pub(crate) typed: &'a TypedContext,
    pub(crate) module: Module,
    pub(crate) classes: FxHashMap<String, ClassLayout>,
    pub(crate) interfaces: FxHashMap<String, InterfaceLayout>,
    pub(crate) functions: FxHashMap<String, (u32, u32)>, // name -> (func_index, type_index)
    pub(crate) globals: FxHashMap<String, u32>,
    /// A FIFO queue, not a stack: code-section entries must be emitted in
    /// the same order their functions were declared, and a thunk can
    /// itself enqueue more work (a closure encountered mid-body) that must
    /// run after everything already queued, never before.
    pub(crate) pending_bodies: VecDeque<PendingBody>,
    pub(crate) helper_functions: FxHashMap<&'static str, u32>,
    scope_stack: Vec<LocalScope>,
    next_local_index: u32,
    local_types: Vec<ValType>,
    string_type: Option<(u32, u32)>,
    record_types: FxHashMap<usize, (u32, u32)>,
}

impl<'a> CodegenContext<'a> {
    pub(crate) fn new(typed: &'a TypedContext) -> Self {
        CodegenContext {
            typed,
            module: Module::new(),
            classes: FxHashMap::default(),
            interfaces: FxHashMap::default(),
            functions: FxHashMap::default(),
            globals: FxHashMap::default(),
            pending_bodies: VecDeque::new(),
            helper_functions: FxHashMap::default(),
            scope_stack: Vec::new(),
            next_local_index: 0,
            local_types: Vec::new(),
            string_type: None,
            record_types: FxHashMap::default(),
        }
    }

    /// Lazily registers the `(bytes: array<i8>, length: i32)` struct/array
    /// pair every string literal and array literal lowers through, caching
    /// it so repeated string literals share one pair of type indices.
    pub(crate) fn string_type(&mut self) -> (u32, u32) {
        if let Some(pair) = self.string_type {
            return pair;
        }
        let array_type = self.module.add_array_type(ValType::I32, false);
        let struct_type = self
            .module
            .add_struct_type(vec![(ValType::RefNull(array_type), false), (ValType::I32, false)]);
        self.string_type = Some((array_type, struct_type));
        (array_type, struct_type)
    }

    /// Lazily registers a structural struct type for a tuple/record/range
    /// literal of `field_count` `anyref` fields, keyed by field count since
    /// structural types with the same shape are interchangeable.
    pub(crate) fn record_type(&mut self, field_count: usize) -> (u32, u32) {
        if let Some(pair) = self.record_types.get(&field_count) {
            return *pair;
        }
        let fields = vec![(ValType::AnyRef, false); field_count];
        let struct_type = self.module.add_struct_type(fields);
        self.record_types.insert(field_count, (0, struct_type));
        (0, struct_type)
    }

    /// Resets the local-variable bookkeeping for the start of a new
    /// function body; the parameter count seeds the first local indices,
    /// matching WASM's rule that parameters occupy the low local indices.
    pub(crate) fn begin_function(&mut self, param_types: &[ValType]) {
        self.scope_stack.clear();
        self.scope_stack.push(LocalScope::default());
        self.local_types = param_types.to_vec();
        self.next_local_index = u32::try_from(param_types.len()).unwrap_or(u32::MAX);
    }

    pub(crate) fn push_scope(&mut self) {
        self.scope_stack.push(LocalScope::default());
    }

    pub(crate) fn pop_scope(&mut self) {
        self.scope_stack.pop();
    }

    pub(crate) fn declare_local(&mut self, name: &str, ty: ValType) -> u32 {
        let idx = self.next_local_index;
        self.next_local_index += 1;
        self.local_types.push(ty);
        self.scope_stack
            .last_mut()
            .expect("at least one scope active during codegen")
            .slots
            .insert(name.to_string(), idx);
        idx
    }

    pub(crate) fn lookup_local(&self, name: &str) -> Option<u32> {
        self.scope_stack
            .iter()
            .rev()
            .find_map(|scope| scope.slots.get(name).copied())
    }

    /// Locals declared beyond the parameter count, grouped by type for the
    /// code entry's locals vector (consecutive same-type runs collapse into
    /// one `(count, type)` pair, the encoding WASM expects).
    pub(crate) fn extra_locals_grouped(&self, param_count: usize) -> Vec<(u32, ValType)> {
        let mut grouped: Vec<(u32, ValType)> = Vec::new();
        for ty in &self.local_types[param_count..] {
            match grouped.last_mut() {
                Some((count, last_ty)) if *last_ty == *ty => *count += 1,
                _ => grouped.push((1, *ty)),
            }
        }
        grouped
    }
}
