//! Core type-checking pipeline.
//!
//! Runs in five phases over the whole (already source-bundled) arena:
//!
//! 1. [`TypeChecker::process_directives`] — stash raw `import` statements.
//! 2. [`TypeChecker::register_types`] — classes/interfaces/mixins/enums/type aliases.
//! 3. [`TypeChecker::resolve_imports`] — validate imported names exist somewhere in the arena.
//! 4. [`TypeChecker::collect_function_and_constant_definitions`] — top-level functions.
//! 5. [`TypeChecker::infer_variables`] — walk function/method bodies, typing every expression.
//!
//! Checking continues past individual errors so one run reports as many
//! problems as it can; the lexer and parser, by contrast, abort on the
//! first error since later tokens/nodes are noise derived from a broken
//! prefix.

use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};

use ember_ast::nodes::{
    Block, ClassDeclaration, ConstructorDecl, Declaration, EnumDeclaration, Expression,
    FunctionBody, FunctionDeclaration, FunctionExpression, ImportStatement, InterfaceDeclaration,
    MethodDecl, MixinDeclaration, OperatorKind, Pattern, Statement, TypeAliasDeclaration,
    TypeAnnotation, UnaryOperatorKind,
};

use crate::errors::TypeCheckError;
use crate::symbol_table::{
    ClassInfo, EnumInfo, FieldInfo, FuncInfo, InterfaceInfo, MethodInfo, MixinInfo, Scope,
    ScopeRef, SymbolTable,
};
use crate::type_info::{NumberType, TypeInfo, TypeInfoKind};
use crate::typed_context::TypedContext;

#[derive(Default)]
pub(crate) struct TypeChecker {
    symbol_table: SymbolTable,
    errors: Vec<TypeCheckError>,
    next_scope_id: u32,
    imports: Vec<Rc<ImportStatement>>,
}

impl TypeChecker {
    pub(crate) fn infer_types(&mut self, ctx: &mut TypedContext) -> anyhow::Result<()> {
        self.symbol_table.root_scope = Scope::root(0);
        self.next_scope_id = 1;

        self.process_directives(ctx);
        self.register_types(ctx);
        self.resolve_imports(ctx);
        self.collect_function_and_constant_definitions(ctx);
        self.infer_variables(ctx);

        ctx.symbol_table = std::mem::take(&mut self.symbol_table);

        if self.errors.is_empty() {
            Ok(())
        } else {
            let messages: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
            anyhow::bail!(messages.join("\n"))
        }
    }

    fn fresh_scope(&mut self, parent: &ScopeRef) -> ScopeRef {
        let id = self.next_scope_id;
        self.next_scope_id += 1;
        Scope::child(parent, id)
    }

    // -----------------------------------------------------------------
    // Phase 1: directives
    // -----------------------------------------------------------------

    fn process_directives(&mut self, ctx: &TypedContext) {
        for source_file in ctx.source_files() {
            for statement in &source_file.statements {
                if let Statement::Import(import) = statement {
                    self.imports.push(import.clone());
                }
            }
        }
    }

    // -----------------------------------------------------------------
    // Phase 2: register types
    // -----------------------------------------------------------------

    fn register_types(&mut self, ctx: &TypedContext) {
        for decl in ctx.arena().top_level_declarations() {
            match &decl {
                Declaration::Class(c) => self.register_class(c),
                Declaration::Interface(i) => self.register_interface(i),
                Declaration::Mixin(m) => self.register_mixin(m),
                Declaration::Enum(e) => self.register_enum(e),
                Declaration::TypeAlias(t) => self.register_type_alias(t),
                Declaration::Symbol(_) | Declaration::Function(_) | Declaration::DeclareFunction(_) => {}
            }
        }
        self.check_inheritance_cycles();
        self.check_interface_conformance();
    }

    fn register_class(&mut self, decl: &Rc<ClassDeclaration>) {
        if self.symbol_table.classes.contains_key(&decl.name) {
            self.errors.push(TypeCheckError::DuplicateDeclaration {
                name: decl.name.clone(),
                location: decl.location.clone(),
            });
            return;
        }
        let mut fields = FxHashMap::default();
        for field in &decl.fields {
            fields.insert(
                field.name.clone(),
                FieldInfo {
                    name: field.name.clone(),
                    type_info: self.resolve_type_annotation(&field.type_annotation),
                    mutable: field.mutable,
                },
            );
        }
        let mut methods = FxHashMap::default();
        for method in &decl.methods {
            methods.insert(method.name.clone(), self.method_info(method));
        }
        self.symbol_table.classes.insert(
            decl.name.clone(),
            ClassInfo {
                name: decl.name.clone(),
                type_params: decl.type_params.iter().map(|p| p.name.clone()).collect(),
                super_class: decl.super_class.as_ref().map(|(n, _)| n.clone()),
                implements: decl.implements.iter().map(|(n, _)| n.clone()).collect(),
                fields,
                methods,
                is_final: decl.is_final,
            },
        );
    }

    fn method_info(&mut self, method: &MethodDecl) -> MethodInfo {
        MethodInfo {
            signature: FuncInfo {
                name: method.name.clone(),
                type_params: method.type_params.iter().map(|p| p.name.clone()).collect(),
                param_types: method
                    .params
                    .iter()
                    .map(|p| self.resolve_type_annotation(&p.type_annotation))
                    .collect(),
                return_type: method
                    .return_type
                    .as_ref()
                    .map(|t| self.resolve_type_annotation(t))
                    .unwrap_or_else(TypeInfo::void),
            },
            is_final: method.is_final,
        }
    }

    fn register_interface(&mut self, decl: &Rc<InterfaceDeclaration>) {
        let methods = decl
            .methods
            .iter()
            .map(|sig| {
                (
                    sig.name.clone(),
                    FuncInfo {
                        name: sig.name.clone(),
                        type_params: vec![],
                        param_types: sig
                            .params
                            .iter()
                            .map(|p| self.resolve_type_annotation(&p.type_annotation))
                            .collect(),
                        return_type: sig
                            .return_type
                            .as_ref()
                            .map(|t| self.resolve_type_annotation(t))
                            .unwrap_or_else(TypeInfo::void),
                    },
                )
            })
            .collect();
        let fields = decl
            .fields
            .iter()
            .map(|f| (f.name.clone(), self.resolve_type_annotation(&f.type_annotation)))
            .collect();
        self.symbol_table.interfaces.insert(
            decl.name.clone(),
            InterfaceInfo {
                name: decl.name.clone(),
                parent: decl.parent.clone(),
                methods,
                fields,
            },
        );
    }

    fn register_mixin(&mut self, decl: &Rc<MixinDeclaration>) {
        let mut fields = FxHashMap::default();
        for field in &decl.fields {
            fields.insert(
                field.name.clone(),
                FieldInfo {
                    name: field.name.clone(),
                    type_info: self.resolve_type_annotation(&field.type_annotation),
                    mutable: field.mutable,
                },
            );
        }
        let mut methods = FxHashMap::default();
        for method in &decl.methods {
            methods.insert(method.name.clone(), self.method_info(method));
        }
        self.symbol_table.mixins.insert(
            decl.name.clone(),
            MixinInfo {
                name: decl.name.clone(),
                fields,
                methods,
            },
        );
    }

    fn register_enum(&mut self, decl: &Rc<EnumDeclaration>) {
        self.symbol_table.enums.insert(
            decl.name.clone(),
            EnumInfo {
                name: decl.name.clone(),
                variants: decl.variants.clone(),
            },
        );
    }

    fn register_type_alias(&mut self, decl: &Rc<TypeAliasDeclaration>) {
        let resolved = self.resolve_type_annotation(&decl.target);
        self.symbol_table
            .type_aliases
            .insert(decl.name.clone(), resolved);
    }

    fn check_inheritance_cycles(&mut self) {
        for name in self.symbol_table.classes.keys().cloned().collect::<Vec<_>>() {
            let mut seen = FxHashSet::default();
            seen.insert(name.clone());
            let mut current = self.symbol_table.classes.get(&name).and_then(|c| c.super_class.clone());
            while let Some(parent) = current {
                if !seen.insert(parent.clone()) {
                    self.errors.push(TypeCheckError::CyclicInheritance {
                        name: name.clone(),
                        location: Default::default(),
                    });
                    break;
                }
                current = self.symbol_table.classes.get(&parent).and_then(|c| c.super_class.clone());
            }
        }
    }

    fn check_interface_conformance(&mut self) {
        let classes: Vec<String> = self.symbol_table.classes.keys().cloned().collect();
        for class_name in classes {
            let Some(class) = self.symbol_table.classes.get(&class_name).cloned() else {
                continue;
            };
            for interface_name in &class.implements {
                let Some(interface) = self.symbol_table.interfaces.get(interface_name).cloned() else {
                    self.errors.push(TypeCheckError::UndefinedType {
                        name: interface_name.clone(),
                        location: Default::default(),
                    });
                    continue;
                };
                for (method_name, required) in &interface.methods {
                    match class.resolve_method(method_name, &self.symbol_table.classes) {
                        None => {
                            self.errors.push(TypeCheckError::InterfaceMissingMember {
                                class: class_name.clone(),
                                interface: interface_name.clone(),
                                member: method_name.clone(),
                                location: Default::default(),
                            });
                        }
                        Some(found) if !signatures_match(required, &found.signature) => {
                            self.errors.push(TypeCheckError::InterfaceMissingMember {
                                class: class_name.clone(),
                                interface: interface_name.clone(),
                                member: format!("{method_name} (signature mismatch)"),
                                location: Default::default(),
                            });
                        }
                        Some(_) => {}
                    }
                }
                for (field_name, required_type) in &interface.fields {
                    match class.resolve_field(field_name, &self.symbol_table.classes) {
                        None => {
                            self.errors.push(TypeCheckError::InterfaceMissingMember {
                                class: class_name.clone(),
                                interface: interface_name.clone(),
                                member: field_name.clone(),
                                location: Default::default(),
                            });
                        }
                        Some(found) if !found.type_info.structurally_eq(required_type) => {
                            self.errors.push(TypeCheckError::InterfaceMissingMember {
                                class: class_name.clone(),
                                interface: interface_name.clone(),
                                member: format!("{field_name} (signature mismatch)"),
                                location: Default::default(),
                            });
                        }
                        Some(_) => {}
                    }
                }
            }
        }
    }

    // -----------------------------------------------------------------
    // Phase 3: imports
    // -----------------------------------------------------------------

    fn resolve_imports(&mut self, _ctx: &TypedContext) {
        for import in self.imports.clone() {
            for name in &import.names {
                let known = self.symbol_table.classes.contains_key(name)
                    || self.symbol_table.interfaces.contains_key(name)
                    || self.symbol_table.mixins.contains_key(name)
                    || self.symbol_table.enums.contains_key(name)
                    || self.symbol_table.functions.contains_key(name)
                    || self.symbol_table.type_aliases.contains_key(name)
                    || is_stdlib_module(&import.spec);
                if !known {
                    self.errors.push(TypeCheckError::UnresolvedImport {
                        spec: import.spec.clone(),
                        name: name.clone(),
                        location: import.location.clone(),
                    });
                }
            }
        }
    }

    // -----------------------------------------------------------------
    // Phase 4: functions
    // -----------------------------------------------------------------

    fn collect_function_and_constant_definitions(&mut self, ctx: &TypedContext) {
        for decl in ctx.arena().top_level_declarations() {
            if let Declaration::Function(f) = &decl {
                if self.symbol_table.functions.contains_key(&f.name) {
                    self.errors.push(TypeCheckError::DuplicateDeclaration {
                        name: f.name.clone(),
                        location: f.location.clone(),
                    });
                    continue;
                }
                let info = FuncInfo {
                    name: f.name.clone(),
                    type_params: f.type_params.iter().map(|p| p.name.clone()).collect(),
                    param_types: f
                        .params
                        .iter()
                        .map(|p| self.resolve_type_annotation(&p.type_annotation))
                        .collect(),
                    return_type: f
                        .return_type
                        .as_ref()
                        .map(|t| self.resolve_type_annotation(t))
                        .unwrap_or_else(TypeInfo::void),
                };
                self.symbol_table.functions.insert(f.name.clone(), info);
            }
            if let Declaration::DeclareFunction(f) = &decl {
                let info = FuncInfo {
                    name: f.name.clone(),
                    type_params: vec![],
                    param_types: f
                        .params
                        .iter()
                        .map(|p| self.resolve_type_annotation(&p.type_annotation))
                        .collect(),
                    return_type: f
                        .return_type
                        .as_ref()
                        .map(|t| self.resolve_type_annotation(t))
                        .unwrap_or_else(TypeInfo::void),
                };
                self.symbol_table.functions.insert(f.name.clone(), info);
            }
        }
    }

    // -----------------------------------------------------------------
    // Phase 5: bodies
    // -----------------------------------------------------------------

    fn infer_variables(&mut self, ctx: &mut TypedContext) {
        let root = self.symbol_table.root_scope.clone();
        for decl in ctx.arena().top_level_declarations() {
            match &decl {
                Declaration::Function(f) => self.check_function(ctx, f, &root, None),
                Declaration::Class(c) => self.check_class(ctx, c, &root),
                Declaration::Mixin(m) => self.check_mixin(ctx, m, &root),
                _ => {}
            }
        }
    }

    fn check_class(&mut self, ctx: &mut TypedContext, class: &Rc<ClassDeclaration>, root: &ScopeRef) {
        let this_type = TypeInfo::new(TypeInfoKind::Class(class.name.clone(), vec![]));
        if let Some(ctor) = &class.constructor {
            self.check_constructor(ctx, class, ctor, root, &this_type);
        }
        for method in &class.methods {
            self.check_method(ctx, method, root, &this_type);
        }
    }

    fn check_mixin(&mut self, ctx: &mut TypedContext, mixin: &Rc<MixinDeclaration>, root: &ScopeRef) {
        let this_type = TypeInfo::new(TypeInfoKind::Mixin(mixin.name.clone()));
        for method in &mixin.methods {
            self.check_method(ctx, method, root, &this_type);
        }
    }

    fn check_method(
        &mut self,
        ctx: &mut TypedContext,
        method: &MethodDecl,
        root: &ScopeRef,
        this_type: &TypeInfo,
    ) {
        let scope = self.fresh_scope(root);
        scope.borrow_mut().declare("this".to_string(), this_type.clone());
        for param in &method.params {
            let ty = self.resolve_type_annotation(&param.type_annotation);
            scope.borrow_mut().declare(param.name.clone(), ty);
        }
        let expected_return = method
            .return_type
            .as_ref()
            .map(|t| self.resolve_type_annotation(t));
        self.check_function_body(ctx, &method.body, &scope, expected_return.as_ref());
    }

    fn check_constructor(
        &mut self,
        ctx: &mut TypedContext,
        class: &Rc<ClassDeclaration>,
        ctor: &ConstructorDecl,
        root: &ScopeRef,
        this_type: &TypeInfo,
    ) {
        let scope = self.fresh_scope(root);
        scope.borrow_mut().declare("this".to_string(), this_type.clone());
        for param in &ctor.params {
            let ty = self.resolve_type_annotation(&param.type_annotation);
            scope.borrow_mut().declare(param.name.clone(), ty);
        }
        if class.super_class.is_some() && ctor.super_args.is_none() {
            self.errors.push(TypeCheckError::MissingSuperCall {
                class: class.name.clone(),
                location: class.location.clone(),
            });
        }
        let mut super_seen = ctor.super_args.is_none() && class.super_class.is_none();
        for statement in &ctor.body {
            if !super_seen {
                self.check_no_this_reference(statement);
            }
            self.check_statement(ctx, statement, &scope, None);
            if is_super_call(statement) {
                super_seen = true;
            }
        }
    }

    /// Conservative scan: flags any `this` reference reachable from `statement`
    /// before `super(...)` has executed in source order.
    fn check_no_this_reference(&mut self, statement: &Statement) {
        if let Statement::Expression(e) = statement {
            self.scan_for_this(&e.expr);
        }
    }

    fn scan_for_this(&mut self, expr: &Expression) {
        match expr {
            Expression::This(t) => {
                self.errors
                    .push(TypeCheckError::ThisBeforeSuper { location: t.location.clone() });
            }
            Expression::Member(m) => self.scan_for_this(&m.object),
            Expression::Call(c) => {
                self.scan_for_this(&c.callee);
                for a in &c.arguments {
                    self.scan_for_this(a);
                }
            }
            Expression::Binary(b) => {
                self.scan_for_this(&b.left);
                self.scan_for_this(&b.right);
            }
            _ => {}
        }
    }

    fn check_function(
        &mut self,
        ctx: &mut TypedContext,
        func: &Rc<FunctionDeclaration>,
        root: &ScopeRef,
        captured: Option<&ScopeRef>,
    ) {
        let scope = self.fresh_scope(captured.unwrap_or(root));
        for param in &func.params {
            let ty = self.resolve_type_annotation(&param.type_annotation);
            scope.borrow_mut().declare(param.name.clone(), ty);
        }
        let expected_return = func
            .return_type
            .as_ref()
            .map(|t| self.resolve_type_annotation(t));
        self.check_function_body(ctx, &func.body, &scope, expected_return.as_ref());
    }

    fn check_function_body(
        &mut self,
        ctx: &mut TypedContext,
        body: &FunctionBody,
        scope: &ScopeRef,
        expected_return: Option<&TypeInfo>,
    ) {
        match body {
            FunctionBody::Expr(expr) => {
                let ty = self.check_expression(ctx, expr, scope, expected_return);
                if let Some(expected) = expected_return {
                    self.expect_assignable(&ty, expected, expr.location());
                }
            }
            FunctionBody::Block(block) => {
                self.check_block(ctx, block, scope, expected_return);
            }
        }
    }

    fn check_block(
        &mut self,
        ctx: &mut TypedContext,
        block: &Rc<Block>,
        parent: &ScopeRef,
        expected_return: Option<&TypeInfo>,
    ) {
        let scope = self.fresh_scope(parent);
        for statement in &block.statements {
            self.check_statement(ctx, statement, &scope, expected_return);
        }
    }

    fn check_statement(
        &mut self,
        ctx: &mut TypedContext,
        statement: &Statement,
        scope: &ScopeRef,
        expected_return: Option<&TypeInfo>,
    ) {
        match statement {
            Statement::Expression(s) => {
                self.check_expression(ctx, &s.expr, scope, None);
            }
            Statement::VariableDecl(s) => {
                let declared = s.type_annotation.as_ref().map(|t| self.resolve_type_annotation(t));
                let value_ty = s
                    .value
                    .as_ref()
                    .map(|v| self.check_expression(ctx, v, scope, declared.as_ref()));
                let final_ty = match (&declared, &value_ty) {
                    (Some(d), Some(v)) => {
                        self.expect_assignable(v, d, s.location.clone());
                        d.clone()
                    }
                    (Some(d), None) => d.clone(),
                    (None, Some(v)) => v.clone(),
                    (None, None) => TypeInfo::void(),
                };
                if Scope::declared_locally(scope, &s.name) {
                    self.errors.push(TypeCheckError::RedeclaredVariable {
                        name: s.name.clone(),
                        location: s.location.clone(),
                    });
                }
                scope.borrow_mut().declare(s.name.clone(), final_ty);
            }
            Statement::Assignment(s) => {
                let value_ty = self.check_expression(ctx, &s.value, scope, None);
                let target_ty = self.check_expression(ctx, &s.target, scope, None);
                self.expect_assignable(&value_ty, &target_ty, s.location.clone());
            }
            Statement::Block(b) => self.check_block(ctx, b, scope, expected_return),
            Statement::If(s) => {
                self.check_expression(ctx, &s.condition, scope, Some(&TypeInfo::new(TypeInfoKind::Bool)));
                self.check_block(ctx, &s.then_branch, scope, expected_return);
                if let Some(else_branch) = &s.else_branch {
                    self.check_block(ctx, else_branch, scope, expected_return);
                }
            }
            Statement::For(s) => {
                let loop_scope = self.fresh_scope(scope);
                if let Some(init) = &s.init {
                    self.check_statement(ctx, init, &loop_scope, None);
                }
                if let Some(cond) = &s.condition {
                    self.check_expression(ctx, cond, &loop_scope, Some(&TypeInfo::new(TypeInfoKind::Bool)));
                }
                if let Some(update) = &s.update {
                    self.check_statement(ctx, update, &loop_scope, None);
                }
                self.check_block(ctx, &s.body, &loop_scope, expected_return);
            }
            Statement::While(s) => {
                self.check_expression(ctx, &s.condition, scope, Some(&TypeInfo::new(TypeInfoKind::Bool)));
                self.check_block(ctx, &s.body, scope, expected_return);
            }
            Statement::Return(s) => {
                let ty = s
                    .value
                    .as_ref()
                    .map(|v| self.check_expression(ctx, v, scope, expected_return))
                    .unwrap_or_else(TypeInfo::void);
                if let Some(expected) = expected_return {
                    self.expect_assignable(&ty, expected, s.location.clone());
                }
            }
            Statement::Import(_) | Statement::Export(_) | Statement::Declaration(_) => {}
        }
    }

    // -----------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------

    fn check_expression(
        &mut self,
        ctx: &mut TypedContext,
        expr: &Expression,
        scope: &ScopeRef,
        expected: Option<&TypeInfo>,
    ) -> TypeInfo {
        let ty = self.infer_expression(ctx, expr, scope, expected);
        ctx.set_node_typeinfo(expr.id(), ty.clone());
        ty
    }

    fn infer_expression(
        &mut self,
        ctx: &mut TypedContext,
        expr: &Expression,
        scope: &ScopeRef,
        expected: Option<&TypeInfo>,
    ) -> TypeInfo {
        match expr {
            Expression::Number(n) => {
                if n.is_float {
                    TypeInfo::new(TypeInfoKind::Number(NumberType::F64))
                } else {
                    TypeInfo::new(TypeInfoKind::Number(NumberType::I32))
                }
            }
            Expression::String(_) => TypeInfo::new(TypeInfoKind::String),
            Expression::Template(t) => {
                for part in &t.expressions {
                    self.check_expression(ctx, part, scope, None);
                }
                TypeInfo::new(TypeInfoKind::String)
            }
            Expression::Bool(_) => TypeInfo::new(TypeInfoKind::Bool),
            Expression::Null(_) => TypeInfo::new(TypeInfoKind::Null),
            Expression::This(_) => Scope::lookup(scope, "this").unwrap_or_else(TypeInfo::never),
            Expression::Wildcard(_) => expected.cloned().unwrap_or_else(TypeInfo::never),
            Expression::Identifier(id) => match Scope::lookup(scope, &id.name) {
                Some(ty) => ty,
                None => match self.symbol_table.functions.get(&id.name) {
                    Some(func) => TypeInfo::new(TypeInfoKind::Function(
                        func.param_types.clone(),
                        Box::new(func.return_type.clone()),
                    )),
                    None => {
                        self.errors.push(TypeCheckError::UndefinedVariable {
                            name: id.name.clone(),
                            location: id.location.clone(),
                        });
                        TypeInfo::never()
                    }
                },
            },
            Expression::SymbolRef(_) => TypeInfo::new(TypeInfoKind::Class("Symbol".to_string(), vec![])),
            Expression::Unary(u) => {
                let operand = self.check_expression(ctx, &u.operand, scope, None);
                match u.operator {
                    UnaryOperatorKind::Not => TypeInfo::new(TypeInfoKind::Bool),
                    UnaryOperatorKind::Neg => operand,
                }
            }
            Expression::Binary(b) => {
                let lhs = self.check_expression(ctx, &b.left, scope, None);
                let rhs = self.check_expression(ctx, &b.right, scope, None);
                if b.operator.is_bitwise() && (lhs.kind.is_float() || rhs.kind.is_float()) {
                    self.errors.push(TypeCheckError::BitwiseOnFloat {
                        op: b.operator.method_name().to_string(),
                        location: b.location.clone(),
                    });
                }
                match b.operator {
                    OperatorKind::Eq
                    | OperatorKind::Ne
                    | OperatorKind::Lt
                    | OperatorKind::Le
                    | OperatorKind::Gt
                    | OperatorKind::Ge
                    | OperatorKind::And
                    | OperatorKind::Or => TypeInfo::new(TypeInfoKind::Bool),
                    _ => {
                        if let TypeInfoKind::Class(name, _) = &lhs.kind {
                            if let Some(class) = self.symbol_table.classes.get(name) {
                                if let Some(method) =
                                    class.resolve_method(b.operator.method_name(), &self.symbol_table.classes)
                                {
                                    return method.signature.return_type.clone();
                                }
                            }
                        }
                        lhs
                    }
                }
            }
            Expression::Range(r) => {
                if let Some(start) = &r.start {
                    self.check_expression(ctx, start, scope, None);
                }
                if let Some(end) = &r.end {
                    self.check_expression(ctx, end, scope, None);
                }
                TypeInfo::new(TypeInfoKind::Range)
            }
            Expression::Cast(c) => {
                self.check_expression(ctx, &c.expr, scope, None);
                self.resolve_type_annotation(&c.target)
            }
            Expression::TypeTest(t) => {
                self.check_expression(ctx, &t.expr, scope, None);
                TypeInfo::new(TypeInfoKind::Bool)
            }
            Expression::Throw(t) => {
                self.check_expression(ctx, &t.value, scope, None);
                TypeInfo::never()
            }
            Expression::Super(s) => {
                for a in &s.arguments {
                    self.check_expression(ctx, a, scope, None);
                }
                TypeInfo::void()
            }
            Expression::Tuple(t) => TypeInfo::new(TypeInfoKind::Tuple(
                t.elements.iter().map(|e| self.check_expression(ctx, e, scope, None)).collect(),
            )),
            Expression::Array(a) => {
                let elem_ty = a
                    .elements
                    .first()
                    .map(|e| self.check_expression(ctx, e, scope, None))
                    .unwrap_or_else(TypeInfo::never);
                for e in a.elements.iter().skip(1) {
                    self.check_expression(ctx, e, scope, Some(&elem_ty));
                }
                TypeInfo::new(TypeInfoKind::Array(Box::new(elem_ty)))
            }
            Expression::Record(r) => TypeInfo::new(TypeInfoKind::Record(
                r.fields
                    .iter()
                    .map(|(name, value)| (name.clone(), self.check_expression(ctx, value, scope, None)))
                    .collect(),
            )),
            Expression::Spread(s) => self.check_expression(ctx, &s.expr, scope, None),
            Expression::Index(i) => {
                let object = self.check_expression(ctx, &i.object, scope, None);
                self.check_expression(ctx, &i.index, scope, None);
                match object.kind {
                    TypeInfoKind::Array(elem) => *elem,
                    TypeInfoKind::Class(name, _) => self
                        .symbol_table
                        .classes
                        .get(&name)
                        .and_then(|c| c.resolve_method("operator[]", &self.symbol_table.classes))
                        .map(|m| m.signature.return_type.clone())
                        .unwrap_or_else(TypeInfo::never),
                    _ => TypeInfo::never(),
                }
            }
            Expression::Member(m) => {
                let object = self.check_expression(ctx, &m.object, scope, None);
                self.resolve_member_type(&object, &m.property, m.location.clone())
            }
            Expression::New(n) => {
                for arg in &n.arguments {
                    self.check_expression(ctx, arg, scope, None);
                }
                if self.symbol_table.classes.contains_key(&n.class_name) {
                    TypeInfo::new(TypeInfoKind::Class(n.class_name.clone(), vec![]))
                } else {
                    self.errors.push(TypeCheckError::UndefinedType {
                        name: n.class_name.clone(),
                        location: n.location.clone(),
                    });
                    TypeInfo::never()
                }
            }
            Expression::Call(c) => {
                for arg in &c.arguments {
                    self.check_expression(ctx, arg, scope, None);
                }
                let callee_name = c.callee.as_identifier_name().map(str::to_string);
                let direct_func = callee_name
                    .as_deref()
                    .and_then(|name| self.symbol_table.functions.get(name).cloned());
                let callee_ty = self.check_expression(ctx, &c.callee, scope, None);
                if let Some(func) = direct_func {
                    if func.param_types.len() != c.arguments.len() {
                        self.errors.push(TypeCheckError::ArgumentCountMismatch {
                            expected: func.param_types.len(),
                            found: c.arguments.len(),
                            location: c.location.clone(),
                        });
                    }
                    return func.return_type;
                }
                match callee_ty.kind {
                    TypeInfoKind::Function(_, ret) => *ret,
                    _ => TypeInfo::void(),
                }
            }
            Expression::Function(f) => self.infer_function_expression(ctx, f, scope),
            Expression::If(e) => {
                self.check_expression(ctx, &e.condition, scope, Some(&TypeInfo::new(TypeInfoKind::Bool)));
                let then_ty = self.check_expression(ctx, &e.then_branch, scope, expected);
                self.check_expression(ctx, &e.else_branch, scope, Some(&then_ty));
                then_ty
            }
            Expression::Match(m) => self.infer_match(ctx, m, scope, expected),
        }
    }

    fn infer_function_expression(
        &mut self,
        ctx: &mut TypedContext,
        f: &Rc<FunctionExpression>,
        scope: &ScopeRef,
    ) -> TypeInfo {
        let closure_scope = self.fresh_scope(scope);
        let mut param_types = Vec::with_capacity(f.params.len());
        for param in &f.params {
            let ty = self.resolve_type_annotation(&param.type_annotation);
            closure_scope.borrow_mut().declare(param.name.clone(), ty.clone());
            param_types.push(ty);
        }
        let expected_return = f.return_type.as_ref().map(|t| self.resolve_type_annotation(t));
        match &f.body {
            FunctionBody::Expr(expr) => {
                let ret = self.check_expression(ctx, expr, &closure_scope, expected_return.as_ref());
                TypeInfo::new(TypeInfoKind::Function(param_types, Box::new(ret)))
            }
            FunctionBody::Block(block) => {
                self.check_block(ctx, block, &closure_scope, expected_return.as_ref());
                let ret = expected_return.unwrap_or_else(TypeInfo::void);
                TypeInfo::new(TypeInfoKind::Function(param_types, Box::new(ret)))
            }
        }
    }

    fn infer_match(
        &mut self,
        ctx: &mut TypedContext,
        m: &ember_ast::nodes::MatchExpression,
        scope: &ScopeRef,
        expected: Option<&TypeInfo>,
    ) -> TypeInfo {
        let scrutinee_ty = self.check_expression(ctx, &m.scrutinee, scope, None);
        let mut result = expected.cloned();
        for arm in &m.arms {
            let arm_scope = self.fresh_scope(scope);
            self.check_pattern(ctx, &arm.pattern, &scrutinee_ty, &arm_scope);
            if let Some(guard) = &arm.guard {
                self.check_expression(ctx, guard, &arm_scope, Some(&TypeInfo::new(TypeInfoKind::Bool)));
            }
            let body_ty = self.check_expression(ctx, &arm.body, &arm_scope, result.as_ref());
            if result.is_none() {
                result = Some(body_ty);
            }
        }
        result.unwrap_or_else(TypeInfo::void)
    }

    fn check_pattern(
        &mut self,
        ctx: &mut TypedContext,
        pattern: &Pattern,
        scrutinee: &TypeInfo,
        scope: &ScopeRef,
    ) {
        match pattern {
            Pattern::Identifier(p) => scope.borrow_mut().declare(p.name.clone(), scrutinee.clone()),
            Pattern::Wildcard(_) => {}
            Pattern::Literal(p) => {
                self.check_expression(ctx, &p.literal, scope, Some(scrutinee));
            }
            Pattern::Range(p) => {
                if let Some(start) = &p.start {
                    self.check_expression(ctx, start, scope, Some(scrutinee));
                }
                if let Some(end) = &p.end {
                    self.check_expression(ctx, end, scope, Some(scrutinee));
                }
            }
            Pattern::As(p) => {
                self.check_pattern(ctx, &p.pattern, scrutinee, scope);
                scope.borrow_mut().declare(p.name.clone(), scrutinee.clone());
            }
            Pattern::Or(p) => {
                self.check_pattern(ctx, &p.left, scrutinee, scope);
                self.check_pattern(ctx, &p.right, scrutinee, scope);
            }
            Pattern::And(p) => {
                self.check_pattern(ctx, &p.left, scrutinee, scope);
                self.check_pattern(ctx, &p.right, scrutinee, scope);
            }
            Pattern::Tuple(p) => {
                if let TypeInfoKind::Tuple(elem_types) = &scrutinee.kind {
                    for (elem_pattern, elem_type) in p.elements.iter().zip(elem_types) {
                        self.check_pattern(ctx, elem_pattern, elem_type, scope);
                    }
                } else {
                    for elem_pattern in &p.elements {
                        self.check_pattern(ctx, elem_pattern, &TypeInfo::never(), scope);
                    }
                }
            }
            Pattern::Record(p) => {
                for (name, field_pattern) in &p.fields {
                    let field_ty = match &scrutinee.kind {
                        TypeInfoKind::Record(fields) => fields
                            .iter()
                            .find(|(n, _)| n == name)
                            .map(|(_, t)| t.clone())
                            .unwrap_or_else(TypeInfo::never),
                        _ => TypeInfo::never(),
                    };
                    self.check_pattern(ctx, field_pattern, &field_ty, scope);
                }
            }
            Pattern::ClassShape(p) => {
                let class = self.symbol_table.classes.get(&p.class_name).cloned();
                for (name, field_pattern) in &p.fields {
                    let field_ty = class
                        .as_ref()
                        .and_then(|c| c.resolve_field(name, &self.symbol_table.classes))
                        .map(|f| f.type_info.clone())
                        .unwrap_or_else(TypeInfo::never);
                    self.check_pattern(ctx, field_pattern, &field_ty, scope);
                }
            }
        }
    }

    fn resolve_member_type(&mut self, object: &TypeInfo, property: &str, location: ember_ast::nodes::Location) -> TypeInfo {
        match &object.kind {
            TypeInfoKind::Class(name, _) => {
                if let Some(class) = self.symbol_table.classes.get(name).cloned() {
                    if let Some(field) = class.resolve_field(property, &self.symbol_table.classes) {
                        return field.type_info.clone();
                    }
                    if let Some(method) = class.resolve_method(property, &self.symbol_table.classes) {
                        return TypeInfo::new(TypeInfoKind::Function(
                            method.signature.param_types.clone(),
                            Box::new(method.signature.return_type.clone()),
                        ));
                    }
                    self.errors.push(TypeCheckError::UndefinedField {
                        field: property.to_string(),
                        ty: name.clone(),
                        location,
                    });
                }
                TypeInfo::never()
            }
            TypeInfoKind::Interface(name, _) => {
                if let Some(interface) = self.symbol_table.interfaces.get(name).cloned() {
                    if let Some(method) = interface.methods.get(property) {
                        return TypeInfo::new(TypeInfoKind::Function(
                            method.param_types.clone(),
                            Box::new(method.return_type.clone()),
                        ));
                    }
                    if let Some(field) = interface.fields.get(property) {
                        return field.clone();
                    }
                    self.errors.push(TypeCheckError::UndefinedMethod {
                        method: property.to_string(),
                        ty: name.clone(),
                        location,
                    });
                }
                TypeInfo::never()
            }
            TypeInfoKind::Enum(_) => TypeInfo::new(TypeInfoKind::Enum(object.to_string())),
            TypeInfoKind::Array(_) if property == "length" => {
                TypeInfo::new(TypeInfoKind::Number(NumberType::I32))
            }
            _ => TypeInfo::never(),
        }
    }

    fn expect_assignable(&mut self, found: &TypeInfo, expected: &TypeInfo, location: ember_ast::nodes::Location) {
        if self.is_assignable(found, expected) {
            return;
        }
        self.errors.push(TypeCheckError::NotAssignable {
            expected: expected.to_string(),
            found: found.to_string(),
            location,
        });
    }

    fn is_assignable(&self, found: &TypeInfo, expected: &TypeInfo) -> bool {
        if matches!(found.kind, TypeInfoKind::Never) || matches!(expected.kind, TypeInfoKind::Never) {
            return true;
        }
        if let TypeInfoKind::Union(members) = &expected.kind {
            return members.iter().any(|m| self.is_assignable(found, m));
        }
        if let (TypeInfoKind::Class(found_name, _), TypeInfoKind::Class(expected_name, _)) =
            (&found.kind, &expected.kind)
        {
            return self.symbol_table.class_extends(found_name, expected_name);
        }
        if let (TypeInfoKind::Class(class_name, _), TypeInfoKind::Interface(interface_name, _)) =
            (&found.kind, &expected.kind)
        {
            return self.symbol_table.class_implements(class_name, interface_name);
        }
        found.structurally_eq(expected)
    }

    fn resolve_type_annotation(&mut self, annotation: &TypeAnnotation) -> TypeInfo {
        match annotation {
            TypeAnnotation::Named(n) => self.resolve_named_type(&n.name, &[]),
            TypeAnnotation::Generic(g) => {
                let args = g.args.iter().map(|a| self.resolve_type_annotation(a)).collect::<Vec<_>>();
                self.resolve_named_type(&g.name, &args)
            }
            TypeAnnotation::Function(f) => TypeInfo::new(TypeInfoKind::Function(
                f.params.iter().map(|p| self.resolve_type_annotation(p)).collect(),
                Box::new(self.resolve_type_annotation(&f.return_type)),
            )),
            TypeAnnotation::Tuple(t) => TypeInfo::new(TypeInfoKind::Tuple(
                t.elements.iter().map(|e| self.resolve_type_annotation(e)).collect(),
            )),
            TypeAnnotation::Record(r) => TypeInfo::new(TypeInfoKind::Record(
                r.fields
                    .iter()
                    .map(|(name, ty)| (name.clone(), self.resolve_type_annotation(ty)))
                    .collect(),
            )),
            TypeAnnotation::Union(u) => TypeInfo::new(TypeInfoKind::Union(
                u.members.iter().map(|m| self.resolve_type_annotation(m)).collect(),
            )),
        }
    }

    fn resolve_named_type(&mut self, name: &str, args: &[TypeInfo]) -> TypeInfo {
        for (builtin, kind) in TypeInfoKind::NON_NUMERIC_BUILTINS {
            if *builtin == name {
                return TypeInfo::new(kind.clone());
            }
        }
        if let Ok(number) = name.parse::<NumberType>() {
            return TypeInfo::new(TypeInfoKind::Number(number));
        }
        if self.symbol_table.classes.contains_key(name) {
            return TypeInfo::new(TypeInfoKind::Class(name.to_string(), args.to_vec()));
        }
        if self.symbol_table.interfaces.contains_key(name) {
            return TypeInfo::new(TypeInfoKind::Interface(name.to_string(), args.to_vec()));
        }
        if self.symbol_table.mixins.contains_key(name) {
            return TypeInfo::new(TypeInfoKind::Mixin(name.to_string()));
        }
        if self.symbol_table.enums.contains_key(name) {
            return TypeInfo::new(TypeInfoKind::Enum(name.to_string()));
        }
        if let Some(alias) = self.symbol_table.type_aliases.get(name) {
            return alias.clone();
        }
        TypeInfo::new(TypeInfoKind::Generic(name.to_string()))
    }
}

fn is_stdlib_module(spec: &str) -> bool {
    spec.starts_with("std:")
}

/// An implementing method conforms to an interface method only when the
/// parameter count, every parameter type, and the return type match exactly
/// — covariant/contravariant overrides are not permitted.
fn signatures_match(required: &FuncInfo, found: &FuncInfo) -> bool {
    required.param_types.len() == found.param_types.len()
        && required
            .param_types
            .iter()
            .zip(&found.param_types)
            .all(|(a, b)| a.structurally_eq(b))
        && required.return_type.structurally_eq(&found.return_type)
}

fn is_super_call(statement: &Statement) -> bool {
    match statement {
        Statement::Expression(e) => matches!(&e.expr, Expression::Super(_)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::TypeChecker;
    use crate::typed_context::TypedContext;
    use ember_ast::lexer::Lexer;
    use ember_ast::parser::Parser;

    fn check(src: &str) -> Result<(), String> {
        let tokens = Lexer::new(src).tokenize().unwrap();
        let (arena, _) = Parser::new(&tokens, "t.ember").parse_source_file().unwrap();
        let mut ctx = TypedContext::new(arena);
        let mut checker = TypeChecker::default();
        checker.infer_types(&mut ctx).map_err(|e| e.to_string())
    }

    #[test]
    fn class_implementing_interface_with_matching_signature_passes() {
        let src = "interface Speaker { fn speak(): i32; } \
                   class Dog implements Speaker { speak(): i32 { 1 } }";
        assert!(check(src).is_ok());
    }

    #[test]
    fn class_implementing_interface_with_wrong_return_type_is_rejected() {
        let src = "interface Speaker { fn speak(): i32; } \
                   class Dog implements Speaker { speak(): bool { true } }";
        let err = check(src).unwrap_err();
        assert!(err.contains("signature mismatch"), "{err}");
    }

    #[test]
    fn class_missing_interface_method_entirely_is_rejected() {
        let src = "interface Speaker { fn speak(): i32; } \
                   class Dog implements Speaker { }";
        let err = check(src).unwrap_err();
        assert!(err.contains("speak"), "{err}");
        assert!(!err.contains("signature mismatch"), "{err}");
    }
}
