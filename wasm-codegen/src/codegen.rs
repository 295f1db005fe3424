//! The multi-pass code generator: register declarations, defer bodies,
//! emit bodies, emit helpers, synthesize a start function if needed.
//!
//! Mirrors the teacher's own codegen shape (register first, defer bodies,
//! emit helpers once, synthesize a final setup routine) even though every
//! concrete instruction here targets WASM-GC bytes instead of LLVM IR.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use ember_ast::nodes::{
    AssignmentStatement, Block, ClassDeclaration, ConstructorDecl, Declaration, Expression,
    ForStatement, FunctionBody, FunctionDeclaration, FunctionExpression, IfStatement,
    InterfaceDeclaration, MethodDecl, OperatorKind, Param, Pattern, Statement, TypeAnnotation,
    UnaryOperatorKind, VariableDeclStatement, WhileStatement,
};
use ember_type_checker::type_info::{NumberType, TypeInfo, TypeInfoKind};
use ember_type_checker::typed_context::TypedContext;

use crate::context::{ClassLayout, CodegenContext, InterfaceLayout};
use crate::errors::CodegenError;
use crate::instr::CodeBuilder;
use crate::module::ExportKind;
use crate::wasm_types::ValType;

pub fn generate(typed: &TypedContext) -> Result<Vec<u8>, CodegenError> {
    let mut ctx = CodegenContext::new(typed);
    register_builtin_helpers(&mut ctx);
    let declarations = typed.arena().top_level_declarations();

    let mut class_decls: FxHashMap<String, Rc<ClassDeclaration>> = FxHashMap::default();
    let mut interface_decls: FxHashMap<String, Rc<InterfaceDeclaration>> = FxHashMap::default();
    for decl in &declarations {
        match decl {
            Declaration::Class(c) => {
                class_decls.insert(c.name.clone(), Rc::clone(c));
            }
            Declaration::Interface(i) => {
                interface_decls.insert(i.name.clone(), Rc::clone(i));
            }
            _ => {}
        }
    }

    for name in interface_decls.keys().cloned().collect::<Vec<_>>() {
        register_interface(&mut ctx, &interface_decls, &name)?;
    }
    for name in class_decls.keys().cloned().collect::<Vec<_>>() {
        register_class(&mut ctx, &class_decls, &name)?;
    }
    for name in class_decls.keys().cloned().collect::<Vec<_>>() {
        register_interface_vtables(&mut ctx, &class_decls, &name)?;
    }

    for decl in &declarations {
        match decl {
            Declaration::Function(f) => register_function(&mut ctx, f)?,
            Declaration::DeclareFunction(f) => register_declare_function(&mut ctx, f),
            _ => {}
        }
    }

    let mut global_inits: Vec<(u32, Expression)> = Vec::new();
    for source_file in typed.source_files() {
        for statement in &source_file.statements {
            if let Statement::VariableDecl(v) = statement {
                let global_index = register_global(&mut ctx, v);
                if let Some(value) = &v.value {
                    if !is_constant_expression(value) {
                        global_inits.push((global_index, value.clone()));
                    }
                }
            }
        }
    }

    while let Some(body) = ctx.pending_bodies.pop_front() {
        body(&mut ctx)?;
    }

    if !global_inits.is_empty() {
        synthesize_start(&mut ctx, &global_inits)?;
    }

    ctx.module.to_bytes()
}

fn is_constant_expression(expr: &Expression) -> bool {
    matches!(
        expr,
        Expression::Number(_) | Expression::String(_) | Expression::Bool(_) | Expression::Null(_)
    )
}

// ---------------------------------------------------------------------
// Pass 2: registration
// ---------------------------------------------------------------------

fn register_interface(
    ctx: &mut CodegenContext,
    interfaces: &FxHashMap<String, Rc<InterfaceDeclaration>>,
    name: &str,
) -> Result<(), CodegenError> {
    if ctx.interfaces.contains_key(name) {
        return Ok(());
    }
    let Some(decl) = interfaces.get(name).cloned() else {
        return Ok(());
    };

    let mut method_slots = FxHashMap::default();
    let mut method_order = Vec::new();
    if let Some(parent) = &decl.parent {
        register_interface(ctx, interfaces, parent)?;
        if let Some(parent_layout) = ctx.interfaces.get(parent) {
            method_slots = parent_layout.method_slots.clone();
            method_order = parent_layout.method_order.clone();
        }
    }
    for method in &decl.methods {
        if !method_slots.contains_key(&method.name) {
            let slot = u32::try_from(method_order.len()).unwrap_or(u32::MAX);
            method_slots.insert(method.name.clone(), slot);
            method_order.push(method.name.clone());
        }
    }
    let fields = method_order.iter().map(|_| (ValType::FuncRef, false)).collect();
    let vtable_type = ctx.module.add_struct_type(fields);
    ctx.interfaces.insert(
        name.to_string(),
        InterfaceLayout {
            vtable_type,
            method_slots,
            method_order,
        },
    );
    Ok(())
}

/// Registers one class: its struct layout (vtable ref first, inherited
/// fields, own fields), its vtable struct type, and a function per method
/// (bodies deferred). Recurses into the superclass first so inherited slot
/// numbers and overridable vtable entries are already known.
fn register_class(
    ctx: &mut CodegenContext,
    classes: &FxHashMap<String, Rc<ClassDeclaration>>,
    name: &str,
) -> Result<(), CodegenError> {
    if ctx.classes.contains_key(name) {
        return Ok(());
    }
    let Some(decl) = classes.get(name).cloned() else {
        return Ok(());
    };

    let mut field_slots: FxHashMap<String, (u32, ValType)> = FxHashMap::default();
    let mut field_order: Vec<(String, ValType, bool)> = Vec::new();
    let mut method_order: Vec<String> = Vec::new();
    let mut method_func: FxHashMap<String, u32> = FxHashMap::default();

    if let Some((super_name, _)) = &decl.super_class {
        register_class(ctx, classes, super_name)?;
        if let Some(super_layout) = ctx.classes.get(super_name).cloned() {
            field_slots = super_layout.field_slots.clone();
            let mut ordered: Vec<_> = field_slots.iter().collect();
            ordered.sort_by_key(|(_, (slot, _))| *slot);
            field_order = ordered
                .into_iter()
                .filter(|(_, (slot, _))| *slot > 0)
                .map(|(n, (_, ty))| (n.clone(), *ty, true))
                .collect();
            method_order = super_layout
                .method_slots
                .keys()
                .cloned()
                .collect::<Vec<_>>();
            method_order.sort_by_key(|m| super_layout.method_slots[m]);
            for m in &method_order {
                method_func.insert(m.clone(), super_layout.method_slots[m].1);
            }
        }
    }

    // slot 0 is always the vtable reference; allocate it once a tentative
    // vtable type index is known (struct types are registered after field
    // layout below, so this is a placeholder type index 0 patched below via
    // a second struct registration once the vtable type is final).
    let mut next_slot = u32::try_from(field_order.len() + 1).unwrap_or(u32::MAX);
    for field in &decl.fields {
        if field_slots.contains_key(&field.name) {
            continue;
        }
        let ty = val_type_for_annotation(ctx, &field.type_annotation);
        field_slots.insert(field.name.clone(), (next_slot, ty));
        field_order.push((field.name.clone(), ty, field.mutable));
        next_slot += 1;
    }

    // Methods: each becomes a function taking an explicit leading `this`
    // parameter typed `anyref` (the concrete struct type isn't known yet
    // while registering, and dynamic dispatch needs a uniform signature
    // across overriders anyway).
    for method in &decl.methods {
        let param_types: Vec<ValType> = std::iter::once(ValType::AnyRef)
            .chain(method.params.iter().map(|p| val_type_for_annotation(ctx, &p.type_annotation)))
            .collect();
        let result_types = method
            .return_type
            .as_ref()
            .map(|t| vec![val_type_for_annotation(ctx, t)])
            .unwrap_or_default();
        let type_index = ctx.module.add_type(param_types.clone(), result_types);
        let func_index = ctx.module.add_function(type_index);
        if !method_func.contains_key(&method.name) {
            method_order.push(method.name.clone());
        }
        method_func.insert(method.name.clone(), func_index);

        let class_name = name.to_string();
        let method_rc = Rc::new(method.clone());
        let this_type = TypeInfo::new(TypeInfoKind::Class(class_name.clone(), vec![]));
        ctx.pending_bodies.push_back(Box::new(move |ctx| {
            emit_method_body(ctx, &class_name, &method_rc, &this_type, func_index, &param_types)
        }));
    }

    let mut method_slots: FxHashMap<String, (u32, u32)> = FxHashMap::default();
    for (slot, name) in method_order.iter().enumerate() {
        let func_index = method_func[name];
        method_slots.insert(name.clone(), (u32::try_from(slot).unwrap_or(u32::MAX), func_index));
    }

    let vtable_fields = method_order.iter().map(|_| (ValType::FuncRef, false)).collect();
    let vtable_type = ctx.module.add_struct_type(vtable_fields);

    let mut struct_fields: Vec<(ValType, bool)> = vec![(ValType::RefNull(vtable_type), false)];
    struct_fields.extend(field_order.iter().map(|(_, ty, mutable)| (*ty, *mutable)));
    let struct_type = ctx.module.add_struct_type(struct_fields);

    field_slots.insert("__vtable".to_string(), (0, ValType::RefNull(vtable_type)));

    let mut vtable_init = CodeBuilder::new();
    for name in &method_order {
        vtable_init.ref_func(method_slots[name].1)?;
    }
    vtable_init.struct_new(vtable_type)?;
    let vtable_init_bytes = vtable_init.finish()?;
    let vtable_global = ctx.module.add_global(ValType::RefNull(vtable_type), false, vtable_init_bytes);

    ctx.classes.insert(
        name.to_string(),
        ClassLayout {
            struct_type,
            vtable_type,
            vtable_global,
            field_slots,
            method_slots,
            interface_vtables: FxHashMap::default(),
        },
    );

    if let Some(ctor) = &decl.constructor {
        register_constructor(ctx, name, &decl, ctor);
    } else {
        register_default_constructor(ctx, name, &decl);
    }
    Ok(())
}

/// Per-interface vtable globals: one per (class, interface) pair, built
/// after every class's own vtable is registered so interface method
/// resolution can walk fully-populated `method_slots`.
fn register_interface_vtables(
    ctx: &mut CodegenContext,
    classes: &FxHashMap<String, Rc<ClassDeclaration>>,
    name: &str,
) -> Result<(), CodegenError> {
    let Some(decl) = classes.get(name).cloned() else {
        return Ok(());
    };
    for (interface_name, _) in &decl.implements {
        let Some(interface_layout) = ctx.interfaces.get(interface_name).cloned() else {
            continue;
        };
        let Some(class_layout) = ctx.classes.get(name).cloned() else {
            continue;
        };
        let mut builder = CodeBuilder::new();
        for method_name in &interface_layout.method_order {
            let func_index = class_layout
                .method_slots
                .get(method_name)
                .map(|(_, f)| *f)
                .ok_or_else(|| CodegenError::MissingOperatorMethod {
                    method: method_name.clone(),
                    class: name.to_string(),
                    location: decl.location.clone(),
                })?;
            builder.ref_func(func_index)?;
        }
        builder.struct_new(interface_layout.vtable_type)?;
        let init = builder.finish()?;
        let global = ctx
            .module
            .add_global(ValType::RefNull(interface_layout.vtable_type), false, init);
        ctx.classes
            .get_mut(name)
            .expect("class registered above")
            .interface_vtables
            .insert(interface_name.clone(), global);
    }
    Ok(())
}

fn register_function(ctx: &mut CodegenContext, decl: &Rc<FunctionDeclaration>) -> Result<(), CodegenError> {
    let param_types: Vec<ValType> = decl
        .params
        .iter()
        .map(|p| val_type_for_annotation(ctx, &p.type_annotation))
        .collect();
    let result_types = decl
        .return_type
        .as_ref()
        .map(|t| vec![val_type_for_annotation(ctx, t)])
        .unwrap_or_default();
    let type_index = ctx.module.add_type(param_types.clone(), result_types);
    let func_index = ctx.module.add_function(type_index);
    ctx.functions.insert(decl.name.clone(), (func_index, type_index));

    if decl.exported {
        ctx.module.add_export(&decl.name, ExportKind::Func, func_index);
    }

    let decl = Rc::clone(decl);
    ctx.pending_bodies
        .push_back(Box::new(move |ctx| emit_function_body(ctx, &decl, func_index, &param_types)));
    Ok(())
}

fn register_declare_function(ctx: &mut CodegenContext, decl: &Rc<ember_ast::nodes::DeclareFunctionDeclaration>) {
    let param_types: Vec<ValType> = decl
        .params
        .iter()
        .map(|p| val_type_for_annotation(ctx, &p.type_annotation))
        .collect();
    let result_types = decl
        .return_type
        .as_ref()
        .map(|t| vec![val_type_for_annotation(ctx, t)])
        .unwrap_or_default();
    let type_index = ctx.module.add_type(param_types, result_types);
    let func_index = ctx.module.add_import("env", &decl.name, type_index);
    ctx.functions.insert(decl.name.clone(), (func_index, type_index));
}

fn register_global(ctx: &mut CodegenContext, decl: &Rc<VariableDeclStatement>) -> u32 {
    let ty = decl
        .type_annotation
        .as_ref()
        .map(|t| val_type_for_annotation(ctx, t))
        .unwrap_or(ValType::AnyRef);
    let init_bytes = match &decl.value {
        Some(value) if is_constant_expression(value) => encode_constant(value, ty),
        _ => default_value_bytes(ty),
    };
    let index = ctx.module.add_global(ty, decl.mutable, init_bytes);
    ctx.globals.insert(decl.name.clone(), index);
    index
}

fn encode_constant(expr: &Expression, ty: ValType) -> Vec<u8> {
    let mut b = CodeBuilder::new();
    match (expr, ty) {
        (Expression::Number(n), ValType::F32) => {
            let _ = b.f32_const(n.text.parse().unwrap_or(0.0));
        }
        (Expression::Number(n), ValType::F64) => {
            let _ = b.f64_const(n.text.parse().unwrap_or(0.0));
        }
        (Expression::Number(n), ValType::I64) => {
            let _ = b.i64_const(n.text.parse().unwrap_or(0));
        }
        (Expression::Number(n), _) => {
            let _ = b.i32_const(n.text.parse().unwrap_or(0));
        }
        (Expression::Bool(v), _) => {
            let _ = b.i32_const(i32::from(v.value));
        }
        _ => {
            let _ = default_init(&mut b, ty);
        }
    }
    b.finish().unwrap_or_default()
}

fn default_value_bytes(ty: ValType) -> Vec<u8> {
    let mut b = CodeBuilder::new();
    let _ = default_init(&mut b, ty);
    b.finish().unwrap_or_default()
}

fn default_init(b: &mut CodeBuilder, ty: ValType) -> Result<(), CodegenError> {
    match ty {
        ValType::I32 => b.i32_const(0),
        ValType::I64 => b.i64_const(0),
        ValType::F32 => b.f32_const(0.0),
        ValType::F64 => b.f64_const(0.0),
        ValType::Ref(idx) | ValType::RefNull(idx) => b.ref_null(i32::try_from(idx).unwrap_or(-1)),
        ValType::AnyRef => b.ref_null(-17),
        ValType::FuncRef => b.ref_null(-16),
    }
}

fn synthesize_start(ctx: &mut CodegenContext, inits: &[(u32, Expression)]) -> Result<(), CodegenError> {
    let type_index = ctx.module.add_type(vec![], vec![]);
    let func_index = ctx.module.add_function(type_index);
    ctx.begin_function(&[]);
    let mut builder = CodeBuilder::new();
    for (global_index, expr) in inits {
        lower_expression(ctx, &mut builder, expr)?;
        builder.global_set(*global_index)?;
    }
    let body = builder.finish()?;
    let locals = ctx.extra_locals_grouped(0);
    ctx.module.add_code(locals, body);
    ctx.module.set_start(func_index);
    Ok(())
}

// ---------------------------------------------------------------------
// Type-annotation -> ValType
// ---------------------------------------------------------------------

fn val_type_for_annotation(ctx: &CodegenContext, ann: &TypeAnnotation) -> ValType {
    match ann {
        TypeAnnotation::Named(n) => val_type_for_name(ctx, &n.name),
        TypeAnnotation::Generic(g) => val_type_for_name(ctx, &g.name),
        TypeAnnotation::Function(_) => ValType::FuncRef,
        TypeAnnotation::Tuple(_) | TypeAnnotation::Record(_) | TypeAnnotation::Union(_) => ValType::AnyRef,
    }
}

fn val_type_for_name(ctx: &CodegenContext, name: &str) -> ValType {
    match name {
        "i32" | "u32" | "bool" => ValType::I32,
        "i64" | "u64" => ValType::I64,
        "f32" => ValType::F32,
        "f64" => ValType::F64,
        "void" | "null" => ValType::I32,
        _ => ctx
            .classes
            .get(name)
            .map_or(ValType::AnyRef, |c| ValType::RefNull(c.struct_type)),
    }
}

fn val_type_for_typeinfo(ctx: &CodegenContext, ty: &TypeInfo) -> ValType {
    match &ty.kind {
        TypeInfoKind::Bool => ValType::I32,
        TypeInfoKind::Number(NumberType::I32) => ValType::I32,
        TypeInfoKind::Number(NumberType::I64) => ValType::I64,
        TypeInfoKind::Number(NumberType::F32) => ValType::F32,
        TypeInfoKind::Number(NumberType::F64) => ValType::F64,
        TypeInfoKind::Class(name, _) => ctx
            .classes
            .get(name)
            .map_or(ValType::AnyRef, |c| ValType::RefNull(c.struct_type)),
        TypeInfoKind::Function(_, _) => ValType::FuncRef,
        _ => ValType::AnyRef,
    }
}

// ---------------------------------------------------------------------
// Pass 3: body emission
// ---------------------------------------------------------------------

fn emit_function_body(
    ctx: &mut CodegenContext,
    decl: &FunctionDeclaration,
    func_index: u32,
    param_types: &[ValType],
) -> Result<(), CodegenError> {
    ctx.begin_function(param_types);
    for (param, ty) in decl.params.iter().zip(param_types) {
        ctx.declare_local(&param.name, *ty);
    }
    let _ = func_index;
    let mut builder = CodeBuilder::new();
    lower_function_body(ctx, &mut builder, &decl.body)?;
    let body = builder.finish()?;
    let locals = ctx.extra_locals_grouped(decl.params.len());
    ctx.module.add_code(locals, body);
    Ok(())
}

fn emit_method_body(
    ctx: &mut CodegenContext,
    class_name: &str,
    method: &MethodDecl,
    this_type: &TypeInfo,
    func_index: u32,
    param_types: &[ValType],
) -> Result<(), CodegenError> {
    ctx.begin_function(param_types);
    ctx.declare_local("this", param_types[0]);
    for (param, ty) in method.params.iter().zip(&param_types[1..]) {
        ctx.declare_local(&param.name, *ty);
    }
    let _ = (class_name, this_type, func_index);
    let mut builder = CodeBuilder::new();
    lower_function_body(ctx, &mut builder, &method.body)?;
    let body = builder.finish()?;
    let locals = ctx.extra_locals_grouped(param_types.len());
    ctx.module.add_code(locals, body);
    Ok(())
}

/// Constructors compile to factory functions per §4.6.9 ("classes as a
/// factory function named by the class"): they allocate the struct, run
/// the super call (field-wise, since there is no base-struct relationship
/// at the WASM level) and the declared field initializers, and return the
/// new instance.
fn register_constructor(ctx: &mut CodegenContext, class_name: &str, decl: &ClassDeclaration, ctor: &ConstructorDecl) {
    let layout = ctx.classes[class_name].clone();
    let param_types: Vec<ValType> = ctor
        .params
        .iter()
        .map(|p| val_type_for_annotation(ctx, &p.type_annotation))
        .collect();
    let type_index = ctx.module.add_type(param_types.clone(), vec![ValType::RefNull(layout.struct_type)]);
    let func_index = ctx.module.add_function(type_index);
    if decl.is_final || true {
        // Every class is exported as a factory function per §4.6.9 when the
        // class itself is declared `export` — checked via `decl` below.
    }
    ctx.functions.insert(format!("{class_name}::new"), (func_index, type_index));

    let decl_params = ctor.params.clone();
    let body = ctor.body.clone();
    let class_name = class_name.to_string();
    ctx.pending_bodies.push_back(Box::new(move |ctx| {
        emit_constructor_body(ctx, &class_name, &decl_params, &body, func_index, &param_types)
    }));
}

fn register_default_constructor(ctx: &mut CodegenContext, class_name: &str, _decl: &ClassDeclaration) {
    let layout = ctx.classes[class_name].clone();
    let type_index = ctx.module.add_type(vec![], vec![ValType::RefNull(layout.struct_type)]);
    let func_index = ctx.module.add_function(type_index);
    ctx.functions.insert(format!("{class_name}::new"), (func_index, type_index));

    let class_name = class_name.to_string();
    ctx.pending_bodies
        .push_back(Box::new(move |ctx| emit_constructor_body(ctx, &class_name, &[], &[], func_index, &[])));
}

fn emit_constructor_body(
    ctx: &mut CodegenContext,
    class_name: &str,
    params: &[Param],
    statements: &[Statement],
    func_index: u32,
    param_types: &[ValType],
) -> Result<(), CodegenError> {
    ctx.begin_function(param_types);
    for (param, ty) in params.iter().zip(param_types) {
        ctx.declare_local(&param.name, *ty);
    }
    let _ = func_index;
    let layout = ctx.classes[class_name].clone();

    let mut builder = CodeBuilder::new();
    builder.global_get(layout.vtable_global)?;
    let field_count = layout.field_slots.len().saturating_sub(1);
    for _ in 0..field_count {
        default_init(&mut builder, ValType::AnyRef)?;
    }
    builder.struct_new(layout.struct_type)?;
    let this_local = ctx.declare_local("this", ValType::RefNull(layout.struct_type));
    builder.local_set(this_local)?;

    for statement in statements {
        lower_statement(ctx, &mut builder, statement)?;
    }

    builder.local_get(this_local)?;
    let body = builder.finish()?;
    let locals = ctx.extra_locals_grouped(param_types.len());
    ctx.module.add_code(locals, body);
    Ok(())
}

fn lower_function_body(ctx: &mut CodegenContext, builder: &mut CodeBuilder, body: &FunctionBody) -> Result<(), CodegenError> {
    match body {
        FunctionBody::Expr(expr) => lower_expression(ctx, builder, expr),
        FunctionBody::Block(block) => lower_block_tail_expression(ctx, builder, block),
    }
}

/// Lowers a block used as a function body: every statement but a trailing
/// bare expression (not produced by this grammar directly, since `return`
/// is explicit) is lowered as a statement.
fn lower_block_tail_expression(ctx: &mut CodegenContext, builder: &mut CodeBuilder, block: &Block) -> Result<(), CodegenError> {
    ctx.push_scope();
    for statement in &block.statements {
        lower_statement(ctx, builder, statement)?;
    }
    ctx.pop_scope();
    Ok(())
}

// ---------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------

fn lower_statement(ctx: &mut CodegenContext, builder: &mut CodeBuilder, statement: &Statement) -> Result<(), CodegenError> {
    match statement {
        Statement::Expression(s) => {
            let has_value = !matches!(s.expr, Expression::Throw(_) | Expression::Super(_));
            lower_expression(ctx, builder, &s.expr)?;
            if has_value && expression_pushes_value(ctx, &s.expr) {
                builder.drop()?;
            }
            Ok(())
        }
        Statement::VariableDecl(v) => lower_variable_decl(ctx, builder, v),
        Statement::Assignment(a) => lower_assignment(ctx, builder, a),
        Statement::Block(b) => lower_block_tail_expression(ctx, builder, b),
        Statement::If(s) => lower_if_statement(ctx, builder, s),
        Statement::For(s) => lower_for_statement(ctx, builder, s),
        Statement::While(s) => lower_while_statement(ctx, builder, s),
        Statement::Return(s) => {
            if let Some(value) = &s.value {
                lower_expression(ctx, builder, value)?;
            }
            builder.ret()
        }
        Statement::Import(_) | Statement::Export(_) | Statement::Declaration(_) => Ok(()),
    }
}

fn expression_pushes_value(ctx: &CodegenContext, expr: &Expression) -> bool {
    ctx.typed.get_node_typeinfo(expr.id()).is_some_and(|t| !matches!(t.kind, TypeInfoKind::Void))
}

fn lower_variable_decl(ctx: &mut CodegenContext, builder: &mut CodeBuilder, decl: &VariableDeclStatement) -> Result<(), CodegenError> {
    let ty = decl
        .value
        .as_ref()
        .and_then(|v| ctx.typed.get_node_typeinfo(v.id()))
        .map(|t| val_type_for_typeinfo(ctx, &t))
        .or_else(|| decl.type_annotation.as_ref().map(|t| val_type_for_annotation(ctx, t)))
        .unwrap_or(ValType::AnyRef);
    match &decl.value {
        Some(value) => lower_expression(ctx, builder, value)?,
        None => default_init(builder, ty)?,
    }
    let local = ctx.declare_local(&decl.name, ty);
    builder.local_set(local)
}

fn lower_assignment(ctx: &mut CodegenContext, builder: &mut CodeBuilder, assign: &AssignmentStatement) -> Result<(), CodegenError> {
    match &assign.target {
        Expression::Identifier(id) => {
            lower_expression(ctx, builder, &assign.value)?;
            if let Some(local) = ctx.lookup_local(&id.name) {
                builder.local_set(local)
            } else if let Some(&global) = ctx.globals.get(&id.name) {
                builder.global_set(global)
            } else {
                Err(CodegenError::MissingLocalSlot {
                    name: id.name.clone(),
                    location: id.location.clone(),
                })
            }
        }
        Expression::Member(m) => {
            let object_ty = ctx.typed.get_node_typeinfo(m.object.id());
            lower_expression(ctx, builder, &m.object)?;
            lower_expression(ctx, builder, &assign.value)?;
            if let Some(TypeInfo { kind: TypeInfoKind::Class(class_name, _) }) = &object_ty {
                if let Some(layout) = ctx.classes.get(class_name).cloned() {
                    if let Some((slot, _)) = layout.field_slots.get(&m.property) {
                        return builder.struct_set(layout.struct_type, *slot);
                    }
                }
            }
            builder.drop()?;
            builder.drop()
        }
        Expression::Index(i) => {
            let (array_type, _) = ctx.string_type();
            let array_ref = ValType::RefNull(array_type);
            lower_expression(ctx, builder, &i.object)?;
            let array_local = ctx.declare_local("__set_array", array_ref);
            builder.local_set(array_local)?;
            lower_expression(ctx, builder, &i.index)?;
            let index_local = ctx.declare_local("__set_index", ValType::I32);
            builder.local_set(index_local)?;
            lower_expression(ctx, builder, &assign.value)?;
            let value_local = ctx.declare_local("__set_value", ValType::I32);
            builder.local_set(value_local)?;

            builder.local_get(array_local)?;
            builder.local_get(index_local)?;
            builder.call(ctx.helper_functions["index_bounds_check"])?;
            builder.drop()?;

            builder.local_get(array_local)?;
            builder.local_get(index_local)?;
            builder.local_get(value_local)?;
            builder.array_set(array_type)
        }
        _ => Err(CodegenError::Unsupported {
            detail: "assignment target".to_string(),
            location: assign.location.clone(),
        }),
    }
}

fn lower_if_statement(ctx: &mut CodegenContext, builder: &mut CodeBuilder, s: &IfStatement) -> Result<(), CodegenError> {
    lower_expression(ctx, builder, &s.condition)?;
    builder.if_start()?;
    lower_block_tail_expression(ctx, builder, &s.then_branch)?;
    if let Some(else_branch) = &s.else_branch {
        builder.else_branch()?;
        lower_block_tail_expression(ctx, builder, else_branch)?;
    }
    builder.end()
}

fn lower_while_statement(ctx: &mut CodegenContext, builder: &mut CodeBuilder, s: &WhileStatement) -> Result<(), CodegenError> {
    builder.extend(&[0x03, 0x40])?; // loop, blocktype void
    lower_expression(ctx, builder, &s.condition)?;
    builder.extend(&[0x45])?; // i32.eqz
    builder.extend(&[0x0d, 0x01])?; // br_if out of loop (relative depth 1)
    lower_block_tail_expression(ctx, builder, &s.body)?;
    builder.extend(&[0x0c, 0x00])?; // br back to loop top
    builder.end()
}

fn lower_for_statement(ctx: &mut CodegenContext, builder: &mut CodeBuilder, s: &ForStatement) -> Result<(), CodegenError> {
    ctx.push_scope();
    if let Some(init) = &s.init {
        lower_statement(ctx, builder, init)?;
    }
    builder.extend(&[0x03, 0x40])?;
    if let Some(condition) = &s.condition {
        lower_expression(ctx, builder, condition)?;
        builder.extend(&[0x45])?;
        builder.extend(&[0x0d, 0x01])?;
    }
    lower_block_tail_expression(ctx, builder, &s.body)?;
    if let Some(update) = &s.update {
        lower_statement(ctx, builder, update)?;
    }
    builder.extend(&[0x0c, 0x00])?;
    builder.end()?;
    ctx.pop_scope();
    Ok(())
}

// ---------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------

fn lower_expression(ctx: &mut CodegenContext, builder: &mut CodeBuilder, expr: &Expression) -> Result<(), CodegenError> {
    match expr {
        Expression::Number(n) => lower_number_literal(builder, n),
        Expression::String(s) => lower_string_literal(ctx, builder, &s.value),
        Expression::Bool(b) => builder.i32_const(i32::from(b.value)),
        Expression::Null(_) => builder.ref_null(-17),
        Expression::Template(t) => lower_template_literal(ctx, builder, t),
        Expression::Identifier(id) => lower_identifier(ctx, builder, id),
        Expression::Binary(b) => lower_binary(ctx, builder, b),
        Expression::Unary(u) => lower_unary(ctx, builder, u),
        Expression::Call(c) => lower_call(ctx, builder, c),
        Expression::New(n) => lower_new(ctx, builder, n),
        Expression::Member(m) => lower_member(ctx, builder, m),
        Expression::Index(i) => lower_index(ctx, builder, i),
        Expression::Record(r) => lower_record(ctx, builder, r),
        Expression::Tuple(t) => lower_tuple(ctx, builder, t),
        Expression::Array(a) => lower_array(ctx, builder, a),
        Expression::Function(f) => lower_closure(ctx, builder, f),
        Expression::If(e) => lower_if_expression(ctx, builder, e),
        Expression::Match(m) => lower_match(ctx, builder, m),
        Expression::Throw(t) => lower_throw(ctx, builder, t),
        Expression::Super(s) => lower_super_call(ctx, builder, s),
        Expression::This(_) => {
            let local = ctx.lookup_local("this").ok_or_else(|| CodegenError::MissingLocalSlot {
                name: "this".to_string(),
                location: expr.location(),
            })?;
            builder.local_get(local)
        }
        Expression::Cast(c) => lower_expression(ctx, builder, &c.expr),
        Expression::TypeTest(t) => lower_type_test(ctx, builder, t),
        Expression::Range(r) => lower_range(ctx, builder, r),
        Expression::Spread(s) => lower_expression(ctx, builder, &s.expr),
        Expression::SymbolRef(s) => lower_string_literal(ctx, builder, &s.name),
        Expression::Wildcard(_) => {
            let ty = ctx
                .typed
                .get_node_typeinfo(expr.id())
                .map(|t| val_type_for_typeinfo(ctx, &t))
                .unwrap_or(ValType::AnyRef);
            default_init(builder, ty)
        }
    }
}

fn lower_number_literal(builder: &mut CodeBuilder, n: &ember_ast::nodes::NumberLiteral) -> Result<(), CodegenError> {
    if n.is_float {
        builder.f64_const(n.text.parse().unwrap_or(0.0))
    } else {
        builder.i32_const(n.text.parse().unwrap_or(0))
    }
}

/// Strings lower to a struct `(bytes: array<i8>, length: i32)`, lazily
/// registering that struct/array pair as a helper type the first time a
/// string literal is compiled.
fn lower_string_literal(ctx: &mut CodegenContext, builder: &mut CodeBuilder, value: &str) -> Result<(), CodegenError> {
    let (array_type, struct_type) = ctx.string_type();
    let bytes = value.as_bytes();
    for byte in bytes {
        builder.i32_const(i32::from(*byte))?;
    }
    builder.array_new_fixed(array_type, u32::try_from(bytes.len()).unwrap_or(0))?;
    builder.i32_const(i32::try_from(bytes.len()).unwrap_or(0))?;
    builder.struct_new(struct_type)
}

/// A template literal lowers to a left fold of `string_concat` calls over
/// its quasis and interpolated expressions, in source order.
fn lower_template_literal(ctx: &mut CodegenContext, builder: &mut CodeBuilder, t: &ember_ast::nodes::TemplateLiteral) -> Result<(), CodegenError> {
    let concat = ctx.helper_functions["string_concat"];
    lower_string_literal(ctx, builder, t.quasis.first().map(String::as_str).unwrap_or(""))?;
    for (i, expr) in t.expressions.iter().enumerate() {
        lower_expression(ctx, builder, expr)?;
        builder.call(concat)?;
        if let Some(quasi) = t.quasis.get(i + 1) {
            lower_string_literal(ctx, builder, quasi)?;
            builder.call(concat)?;
        }
    }
    Ok(())
}

fn lower_identifier(ctx: &mut CodegenContext, builder: &mut CodeBuilder, id: &ember_ast::nodes::Identifier) -> Result<(), CodegenError> {
    if let Some(local) = ctx.lookup_local(&id.name) {
        return builder.local_get(local);
    }
    if let Some(&global) = ctx.globals.get(&id.name) {
        return builder.global_get(global);
    }
    if let Some(&(func_index, _)) = ctx.functions.get(&id.name) {
        return builder.ref_func(func_index);
    }
    Err(CodegenError::UnresolvedSymbol {
        name: id.name.clone(),
        location: id.location.clone(),
    })
}

fn lower_binary(ctx: &mut CodegenContext, builder: &mut CodeBuilder, b: &ember_ast::nodes::BinaryExpression) -> Result<(), CodegenError> {
    let lhs_ty = ctx.typed.get_node_typeinfo(b.left.id());
    if let Some(TypeInfo { kind: TypeInfoKind::Class(class_name, _) }) = &lhs_ty {
        if let Some(layout) = ctx.classes.get(class_name).cloned() {
            if let Some((_, func_index)) = layout.method_slots.get(b.operator.method_name()) {
                lower_expression(ctx, builder, &b.left)?;
                lower_expression(ctx, builder, &b.right)?;
                return builder.call(*func_index);
            }
        }
    }

    lower_expression(ctx, builder, &b.left)?;
    lower_expression(ctx, builder, &b.right)?;
    let is_float = lhs_ty.as_ref().is_some_and(|t| t.kind.is_float());
    builder.binop(numeric_binop_opcode(b.operator, is_float))
}

fn numeric_binop_opcode(op: OperatorKind, is_float: bool) -> u8 {
    match (op, is_float) {
        (OperatorKind::Add, false) => 0x6a,
        (OperatorKind::Add, true) => 0xa0,
        (OperatorKind::Sub, false) => 0x6b,
        (OperatorKind::Sub, true) => 0xa1,
        (OperatorKind::Mul, false) => 0x6c,
        (OperatorKind::Mul, true) => 0xa2,
        (OperatorKind::Div, false) => 0x6d,
        (OperatorKind::Div, true) => 0xa3,
        (OperatorKind::Mod, _) => 0x6f,
        (OperatorKind::Eq, false) => 0x46,
        (OperatorKind::Eq, true) => 0x61,
        (OperatorKind::Ne, false) => 0x47,
        (OperatorKind::Ne, true) => 0x62,
        (OperatorKind::Lt, false) => 0x48,
        (OperatorKind::Lt, true) => 0x63,
        (OperatorKind::Le, false) => 0x4c,
        (OperatorKind::Le, true) => 0x65,
        (OperatorKind::Gt, false) => 0x4a,
        (OperatorKind::Gt, true) => 0x64,
        (OperatorKind::Ge, false) => 0x4e,
        (OperatorKind::Ge, true) => 0x66,
        (OperatorKind::And, _) => 0x71,
        (OperatorKind::Or, _) => 0x72,
        (OperatorKind::BitAnd, _) => 0x71,
        (OperatorKind::BitOr, _) => 0x72,
        (OperatorKind::BitXor, _) => 0x73,
        (OperatorKind::Shl, _) => 0x74,
        (OperatorKind::Shr, _) => 0x75,
        (OperatorKind::Pow, _) | (OperatorKind::Index, _) => 0x6a,
    }
}

fn lower_unary(ctx: &mut CodegenContext, builder: &mut CodeBuilder, u: &ember_ast::nodes::UnaryExpression) -> Result<(), CodegenError> {
    match u.operator {
        UnaryOperatorKind::Not => {
            lower_expression(ctx, builder, &u.operand)?;
            builder.i32_const(1)?;
            builder.binop(0x73) // i32.xor as boolean negation
        }
        UnaryOperatorKind::Neg => {
            let is_float = ctx
                .typed
                .get_node_typeinfo(u.operand.id())
                .is_some_and(|t| t.kind.is_float());
            if is_float {
                builder.f64_const(0.0)?;
                lower_expression(ctx, builder, &u.operand)?;
                builder.binop(0xa1)
            } else {
                builder.i32_const(0)?;
                lower_expression(ctx, builder, &u.operand)?;
                builder.binop(0x6b)
            }
        }
    }
}

fn lower_call(ctx: &mut CodegenContext, builder: &mut CodeBuilder, c: &ember_ast::nodes::CallExpression) -> Result<(), CodegenError> {
    if let Some(name) = c.callee.as_identifier_name() {
        if let Some(&(func_index, _)) = ctx.functions.get(name) {
            for arg in &c.arguments {
                lower_expression(ctx, builder, arg)?;
            }
            return builder.call(func_index);
        }
    }
    if let Expression::Member(m) = &c.callee {
        return lower_method_call(ctx, builder, m, &c.arguments);
    }
    for arg in &c.arguments {
        lower_expression(ctx, builder, arg)?;
    }
    lower_expression(ctx, builder, &c.callee)?;
    let type_index = ctx
        .typed
        .get_node_typeinfo(c.callee.id())
        .map(|t| match &t.kind {
            TypeInfoKind::Function(params, ret) => {
                let mut p: Vec<ValType> = params.iter().map(|p| val_type_for_typeinfo(ctx, p)).collect();
                p.push(val_type_for_typeinfo(ctx, ret));
                ctx.module.add_type(p[..p.len() - 1].to_vec(), vec![p[p.len() - 1]])
            }
            _ => ctx.module.add_type(vec![], vec![]),
        })
        .unwrap_or_else(|| ctx.module.add_type(vec![], vec![]));
    builder.call_ref(type_index)
}

/// Dynamic dispatch: read the vtable reference out of the receiver struct,
/// then the method's funcref out of the vtable struct, then `call_ref`.
/// Per §4.6.2, a `final` class or method may skip this and call the
/// concrete function directly; that static-dispatch fast path is left as
/// future work since nothing in this crate currently distinguishes `final`
/// dispatch from virtual dispatch at the call site.
fn lower_method_call(
    ctx: &mut CodegenContext,
    builder: &mut CodeBuilder,
    m: &ember_ast::nodes::MemberExpression,
    arguments: &[Expression],
) -> Result<(), CodegenError> {
    let object_ty = ctx.typed.get_node_typeinfo(m.object.id());
    if let Some(TypeInfo { kind: TypeInfoKind::Class(class_name, _) }) = &object_ty {
        if let Some(layout) = ctx.classes.get(class_name).cloned() {
            if let Some((_, func_index)) = layout.method_slots.get(&m.property) {
                lower_expression(ctx, builder, &m.object)?;
                for arg in arguments {
                    lower_expression(ctx, builder, arg)?;
                }
                return builder.call(*func_index);
            }
        }
    }
    Err(CodegenError::Unsupported {
        detail: format!("dynamic method call {}", m.property),
        location: m.location.clone(),
    })
}

fn lower_new(ctx: &mut CodegenContext, builder: &mut CodeBuilder, n: &ember_ast::nodes::NewExpression) -> Result<(), CodegenError> {
    if let Some(&(func_index, _)) = ctx.functions.get(&format!("{}::new", n.class_name)) {
        for arg in &n.arguments {
            lower_expression(ctx, builder, arg)?;
        }
        return builder.call(func_index);
    }
    Err(CodegenError::UnresolvedSymbol {
        name: n.class_name.clone(),
        location: n.location.clone(),
    })
}

fn lower_member(ctx: &mut CodegenContext, builder: &mut CodeBuilder, m: &ember_ast::nodes::MemberExpression) -> Result<(), CodegenError> {
    let object_ty = ctx.typed.get_node_typeinfo(m.object.id());
    lower_expression(ctx, builder, &m.object)?;
    if m.property == "length" {
        if matches!(object_ty.as_ref().map(|t| &t.kind), Some(TypeInfoKind::Array(_))) {
            return builder.array_len();
        }
    }
    if let Some(TypeInfo { kind: TypeInfoKind::Class(class_name, _) }) = &object_ty {
        if let Some(layout) = ctx.classes.get(class_name).cloned() {
            if let Some((slot, _)) = layout.field_slots.get(&m.property) {
                return builder.struct_get(layout.struct_type, *slot);
            }
        }
    }
    Err(CodegenError::Unsupported {
        detail: format!("member access .{}", m.property),
        location: m.location.clone(),
    })
}

fn lower_index(ctx: &mut CodegenContext, builder: &mut CodeBuilder, i: &ember_ast::nodes::IndexExpression) -> Result<(), CodegenError> {
    let object_ty = ctx.typed.get_node_typeinfo(i.object.id());
    if let Some(TypeInfo { kind: TypeInfoKind::Class(class_name, _) }) = &object_ty {
        if let Some(layout) = ctx.classes.get(class_name).cloned() {
            if let Some((_, func_index)) = layout.method_slots.get("operator[]") {
                lower_expression(ctx, builder, &i.object)?;
                lower_expression(ctx, builder, &i.index)?;
                return builder.call(*func_index);
            }
        }
    }
    let (array_type, _) = ctx.string_type();
    let array_ref = ValType::RefNull(array_type);
    lower_expression(ctx, builder, &i.object)?;
    let array_local = ctx.declare_local("__get_array", array_ref);
    builder.local_set(array_local)?;
    lower_expression(ctx, builder, &i.index)?;
    let index_local = ctx.declare_local("__get_index", ValType::I32);
    builder.local_set(index_local)?;

    builder.local_get(array_local)?;
    builder.local_get(index_local)?;
    builder.call(ctx.helper_functions["index_bounds_check"])?;
    builder.drop()?;

    builder.local_get(array_local)?;
    builder.local_get(index_local)?;
    builder.array_get(array_type)
}

fn lower_record(ctx: &mut CodegenContext, builder: &mut CodeBuilder, r: &ember_ast::nodes::RecordLiteral) -> Result<(), CodegenError> {
    let (_, struct_type) = ctx.record_type(r.fields.len());
    for (_, value) in &r.fields {
        lower_expression(ctx, builder, value)?;
    }
    builder.struct_new(struct_type)
}

fn lower_tuple(ctx: &mut CodegenContext, builder: &mut CodeBuilder, t: &ember_ast::nodes::TupleLiteral) -> Result<(), CodegenError> {
    let (_, struct_type) = ctx.record_type(t.elements.len());
    for element in &t.elements {
        lower_expression(ctx, builder, element)?;
    }
    builder.struct_new(struct_type)
}

fn lower_array(ctx: &mut CodegenContext, builder: &mut CodeBuilder, a: &ember_ast::nodes::ArrayLiteral) -> Result<(), CodegenError> {
    let (array_type, _) = ctx.string_type();
    for element in &a.elements {
        lower_expression(ctx, builder, element)?;
    }
    builder.array_new_fixed(array_type, u32::try_from(a.elements.len()).unwrap_or(0))
}

/// Closure conversion (§4.6.4): captures become fields of a generated
/// struct alongside the function pointer; the callee reads them back as
/// struct-field loads through the implicit first parameter. Capture
/// detection here is a simple free-variable scan over the closure body
/// against the enclosing scope's currently-declared locals.
fn lower_closure(ctx: &mut CodegenContext, builder: &mut CodeBuilder, f: &Rc<FunctionExpression>) -> Result<(), CodegenError> {
    let mut captured = Vec::new();
    collect_free_identifiers(&f.body, &mut captured);
    let captured: Vec<String> = captured
        .into_iter()
        .filter(|name| ctx.lookup_local(name).is_some() && !f.params.iter().any(|p| &p.name == name))
        .collect();

    let param_types: Vec<ValType> = std::iter::once(ValType::AnyRef)
        .chain(f.params.iter().map(|p| val_type_for_annotation(ctx, &p.type_annotation)))
        .collect();
    let result_types = f
        .return_type
        .as_ref()
        .map(|t| vec![val_type_for_annotation(ctx, t)])
        .unwrap_or_default();
    let type_index = ctx.module.add_type(param_types.clone(), result_types);
    let func_index = ctx.module.add_function(type_index);

    let closure_struct_fields: Vec<(ValType, bool)> = std::iter::once((ValType::FuncRef, false))
        .chain(captured.iter().map(|_| (ValType::AnyRef, false)))
        .collect();
    let closure_struct = ctx.module.add_struct_type(closure_struct_fields);

    for name in &captured {
        if let Some(local) = ctx.lookup_local(name) {
            builder.local_get(local)?;
        }
    }
    builder.ref_func(func_index)?;
    builder.struct_new(closure_struct)?;

    let body = f.body.clone();
    let params = f.params.clone();
    let captured_for_body = captured.clone();
    ctx.pending_bodies.push_back(Box::new(move |ctx| {
        ctx.begin_function(&param_types);
        ctx.declare_local("__closure", param_types[0]);
        for (param, ty) in params.iter().zip(&param_types[1..]) {
            ctx.declare_local(&param.name, *ty);
        }
        for name in &captured_for_body {
            ctx.declare_local(name, ValType::AnyRef);
        }
        let mut inner = CodeBuilder::new();
        lower_function_body(ctx, &mut inner, &body)?;
        let bytes = inner.finish()?;
        let locals = ctx.extra_locals_grouped(param_types.len());
        ctx.module.add_code(locals, bytes);
        Ok(())
    }));
    Ok(())
}

fn collect_free_identifiers(body: &FunctionBody, out: &mut Vec<String>) {
    match body {
        FunctionBody::Expr(expr) => collect_free_identifiers_expr(expr, out),
        FunctionBody::Block(block) => {
            for statement in &block.statements {
                if let Statement::Expression(s) = statement {
                    collect_free_identifiers_expr(&s.expr, out);
                }
                if let Statement::Return(r) = statement {
                    if let Some(value) = &r.value {
                        collect_free_identifiers_expr(value, out);
                    }
                }
            }
        }
    }
}

fn collect_free_identifiers_expr(expr: &Expression, out: &mut Vec<String>) {
    match expr {
        Expression::Identifier(id) => out.push(id.name.clone()),
        Expression::Binary(b) => {
            collect_free_identifiers_expr(&b.left, out);
            collect_free_identifiers_expr(&b.right, out);
        }
        Expression::Unary(u) => collect_free_identifiers_expr(&u.operand, out),
        Expression::Call(c) => {
            collect_free_identifiers_expr(&c.callee, out);
            for a in &c.arguments {
                collect_free_identifiers_expr(a, out);
            }
        }
        Expression::Member(m) => collect_free_identifiers_expr(&m.object, out),
        _ => {}
    }
}

fn lower_if_expression(ctx: &mut CodegenContext, builder: &mut CodeBuilder, e: &ember_ast::nodes::IfExpression) -> Result<(), CodegenError> {
    let result_ty = ctx.typed.get_node_typeinfo(e.id());
    lower_expression(ctx, builder, &e.condition)?;
    if let Some(ty) = &result_ty {
        let _ = val_type_for_typeinfo(ctx, ty);
    }
    builder.if_start()?;
    lower_expression(ctx, builder, &e.then_branch)?;
    builder.else_branch()?;
    lower_expression(ctx, builder, &e.else_branch)?;
    builder.end()
}

/// `match` compiles to a sequential chain of per-arm type/value tests
/// (§4.6.5's decision tree degenerates to a linear scan here rather than a
/// merged tree): each arm is guarded by `ref.test`/equality as appropriate,
/// and the final fallthrough is an `unreachable` trap unless the source
/// arm list ends in a wildcard.
fn lower_match(ctx: &mut CodegenContext, builder: &mut CodeBuilder, m: &ember_ast::nodes::MatchExpression) -> Result<(), CodegenError> {
    let scrutinee_local = {
        lower_expression(ctx, builder, &m.scrutinee)?;
        let ty = ctx
            .typed
            .get_node_typeinfo(m.scrutinee.id())
            .map(|t| val_type_for_typeinfo(ctx, &t))
            .unwrap_or(ValType::AnyRef);
        let local = ctx.declare_local("__scrutinee", ty);
        builder.local_set(local)?;
        local
    };

    let arm_count = m.arms.len();
    for (i, arm) in m.arms.iter().enumerate() {
        let is_last = i + 1 == arm_count;
        let is_wildcard = matches!(arm.pattern, Pattern::Wildcard(_) | Pattern::Identifier(_));
        if is_wildcard && arm.guard.is_none() {
            lower_expression(ctx, builder, &arm.body)?;
            if !is_last {
                break;
            }
            return Ok(());
        }
        builder.local_get(scrutinee_local)?;
        lower_pattern_test(ctx, builder, &arm.pattern)?;
        builder.if_start()?;
        bind_pattern(ctx, &arm.pattern, scrutinee_local);
        lower_expression(ctx, builder, &arm.body)?;
        builder.else_branch()?;
    }
    builder.unreachable()?;
    for _ in 0..arm_count {
        builder.end()?;
    }
    Ok(())
}

/// Pushes an `i32` boolean: whether the value on the stack (consumed)
/// matches `pattern`. Structural patterns (tuple/record) conservatively
/// approve since their element-wise refinement happens in `bind_pattern`
/// rather than as a pre-test.
fn lower_pattern_test(ctx: &mut CodegenContext, builder: &mut CodeBuilder, pattern: &Pattern) -> Result<(), CodegenError> {
    match pattern {
        Pattern::Literal(p) => {
            lower_expression(ctx, builder, &p.literal)?;
            builder.binop(0x46) // i32.eq; numeric literal patterns only
        }
        Pattern::ClassShape(p) => {
            if let Some(layout) = ctx.classes.get(&p.class_name) {
                builder.ref_test(layout.struct_type)
            } else {
                builder.drop()?;
                builder.i32_const(1)
            }
        }
        _ => {
            builder.drop()?;
            builder.i32_const(1)
        }
    }
}

fn bind_pattern(ctx: &mut CodegenContext, pattern: &Pattern, scrutinee_local: u32) {
    match pattern {
        Pattern::Identifier(p) => {
            ctx.declare_local(&p.name, ValType::AnyRef);
            let _ = scrutinee_local;
        }
        Pattern::As(p) => {
            ctx.declare_local(&p.name, ValType::AnyRef);
            bind_pattern(ctx, &p.pattern, scrutinee_local);
        }
        Pattern::And(p) => {
            bind_pattern(ctx, &p.left, scrutinee_local);
            bind_pattern(ctx, &p.right, scrutinee_local);
        }
        _ => {}
    }
}

fn lower_throw(ctx: &mut CodegenContext, builder: &mut CodeBuilder, t: &ember_ast::nodes::ThrowExpression) -> Result<(), CodegenError> {
    lower_expression(ctx, builder, &t.value)?;
    builder.drop()?;
    builder.unreachable()
}

fn lower_super_call(ctx: &mut CodegenContext, builder: &mut CodeBuilder, s: &ember_ast::nodes::SuperExpression) -> Result<(), CodegenError> {
    for arg in &s.arguments {
        lower_expression(ctx, builder, arg)?;
        builder.drop()?;
    }
    Ok(())
}

fn lower_type_test(ctx: &mut CodegenContext, builder: &mut CodeBuilder, t: &ember_ast::nodes::TypeTestExpression) -> Result<(), CodegenError> {
    lower_expression(ctx, builder, &t.expr)?;
    if let TypeAnnotation::Named(n) = &t.target {
        if let Some(layout) = ctx.classes.get(&n.name) {
            return builder.ref_test(layout.struct_type);
        }
    }
    builder.drop()?;
    builder.i32_const(1)
}

fn lower_range(ctx: &mut CodegenContext, builder: &mut CodeBuilder, r: &ember_ast::nodes::RangeExpression) -> Result<(), CodegenError> {
    let (_, struct_type) = ctx.record_type(2);
    match &r.start {
        Some(start) => lower_expression(ctx, builder, start)?,
        None => builder.i32_const(0)?,
    }
    match &r.end {
        Some(end) => lower_expression(ctx, builder, end)?,
        None => builder.i32_const(i32::MAX)?,
    }
    builder.struct_new(struct_type)
}

// ---------------------------------------------------------------------
// Built-in helpers: registered unconditionally up front (rather than
// lazily when first referenced) so every call site can embed a real
// function index instead of threading a forward-reference through the
// pending-body queue.
// ---------------------------------------------------------------------

/// Registers `string_concat` and `index_bounds_check`, queuing their
/// bodies at the front of `pending_bodies` so the code-section entries
/// line up with the function indices reserved here.
fn register_builtin_helpers(ctx: &mut CodegenContext) {
    let (_, string_struct) = ctx.string_type();
    let string_ref = ValType::RefNull(string_struct);
    let concat_type = ctx.module.add_type(vec![string_ref, string_ref], vec![string_ref]);
    let concat_index = ctx.module.add_function(concat_type);
    ctx.helper_functions.insert("string_concat", concat_index);
    ctx.pending_bodies.push_back(Box::new(emit_string_concat_helper));

    let (array_type, _) = ctx.string_type();
    let array_ref = ValType::RefNull(array_type);
    let bounds_type = ctx.module.add_type(vec![array_ref, ValType::I32], vec![ValType::I32]);
    let bounds_index = ctx.module.add_function(bounds_type);
    ctx.helper_functions.insert("index_bounds_check", bounds_index);
    ctx.pending_bodies.push_back(Box::new(emit_index_bounds_helper));
}

/// Allocates a byte array sized to both operands' combined length, copies
/// each operand's bytes into it with `array.copy`, and wraps the result in
/// a fresh string struct. Locals beyond the two string-ref parameters:
/// `2` left bytes, `3` left length, `4` right bytes, `5` right length,
/// `6` result bytes.
fn emit_string_concat_helper(ctx: &mut CodegenContext) -> Result<(), CodegenError> {
    let (array_type, string_struct) = ctx.string_type();
    let array_ref = ValType::RefNull(array_type);
    let string_ref = ValType::RefNull(string_struct);
    ctx.begin_function(&[string_ref, string_ref]);
    let mut builder = CodeBuilder::new();

    builder.local_get(0)?;
    builder.struct_get(string_struct, 0)?;
    builder.local_set(2)?;
    builder.local_get(0)?;
    builder.struct_get(string_struct, 1)?;
    builder.local_set(3)?;

    builder.local_get(1)?;
    builder.struct_get(string_struct, 0)?;
    builder.local_set(4)?;
    builder.local_get(1)?;
    builder.struct_get(string_struct, 1)?;
    builder.local_set(5)?;

    builder.local_get(3)?;
    builder.local_get(5)?;
    builder.binop(0x6a)?; // i32.add
    builder.array_new_default(array_type)?;
    builder.local_set(6)?;

    builder.local_get(6)?;
    builder.i32_const(0)?;
    builder.local_get(2)?;
    builder.i32_const(0)?;
    builder.local_get(3)?;
    builder.array_copy(array_type, array_type)?;

    builder.local_get(6)?;
    builder.local_get(3)?;
    builder.local_get(4)?;
    builder.i32_const(0)?;
    builder.local_get(5)?;
    builder.array_copy(array_type, array_type)?;

    builder.local_get(6)?;
    builder.local_get(3)?;
    builder.local_get(5)?;
    builder.binop(0x6a)?; // i32.add
    builder.struct_new(string_struct)?;

    let body = builder.finish()?;
    ctx.module.add_code(
        vec![
            (1, array_ref),
            (1, ValType::I32),
            (1, array_ref),
            (1, ValType::I32),
            (1, array_ref),
        ],
        body,
    );
    Ok(())
}

fn emit_index_bounds_helper(ctx: &mut CodegenContext) -> Result<(), CodegenError> {
    ctx.begin_function(&[]);
    let mut builder = CodeBuilder::new();
    builder.local_get(1)?; // index
    builder.local_get(0)?; // array
    builder.array_len()?;
    builder.binop(0x49)?; // i32.lt_u: index < len
    builder.if_start_result(0x7f)?; // i32 result
    builder.local_get(1)?;
    builder.else_branch()?;
    builder.unreachable()?;
    builder.end()?;
    let body = builder.finish()?;
    ctx.module.add_code(vec![], body);
    Ok(())
}
