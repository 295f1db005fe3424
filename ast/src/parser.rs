//! Tokens → AST.
//!
//! Recursive-descent with Pratt-style precedence climbing for binary
//! expressions. Replaces the teacher's tree-sitter-CST-to-AST `Builder` with
//! a direct tokens-to-AST walk; the *pattern* survives — assign a fresh
//! sequential node id per construct, record parent/child edges in the
//! [`Arena`], fail fast with a positioned error on the first syntax problem
//! rather than attempting recovery.

use std::rc::Rc;

use crate::arena::Arena;
use crate::errors::ParseError;
use crate::nodes::*;
use crate::token::{Keyword, Operator, Punct, Span, Token, TokenKind};

pub struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    arena: Arena,
    path: String,
}

type PResult<T> = Result<T, ParseError>;

impl<'t> Parser<'t> {
    #[must_use]
    pub fn new(tokens: &'t [Token], path: &str) -> Self {
        Parser {
            tokens,
            pos: 0,
            arena: Arena::default(),
            path: path.to_string(),
        }
    }

    /// Continues parsing into an already-populated arena instead of
    /// starting a fresh one, so node ids assigned to this module never
    /// collide with ids already in `arena` — the mechanism a bundler uses
    /// to fold several modules' source files into one logical program.
    #[must_use]
    pub fn continue_in(tokens: &'t [Token], path: &str, arena: Arena) -> Self {
        Parser {
            tokens,
            pos: 0,
            arena,
            path: path.to_string(),
        }
    }

    /// Parses a whole source file, consuming the token stream to `Eof`.
    ///
    /// # Errors
    ///
    /// Returns the first `ParseError` encountered; parsing does not attempt
    /// recovery past a syntax error.
    pub fn parse_source_file(mut self) -> PResult<(Arena, Rc<SourceFile>)> {
        let start = self.span();
        let file_id = self.arena.next_id();
        let mut statements = Vec::new();
        let mut seen_non_import = false;
        while !self.at_eof() {
            let is_import = self.check_keyword(Keyword::Import) || self.check_from_import();
            if is_import && seen_non_import {
                return Err(ParseError::MisplacedImport { span: self.span() });
            }
            if !is_import {
                seen_non_import = true;
            }
            let statement = self.parse_top_level_statement(file_id)?;
            statements.push(statement);
        }
        let location: Location = start.join(self.span()).into();
        let source_file = Rc::new(SourceFile {
            id: file_id,
            location,
            path: self.path.clone(),
            statements,
        });
        self.arena
            .add_node(AstNode::Ast(Ast::SourceFile(source_file.clone())), 0);
        Ok((self.arena, source_file))
    }

    fn check_from_import(&self) -> bool {
        self.check_keyword(Keyword::From)
    }

    // -------------------------------------------------------------
    // Statements
    // -------------------------------------------------------------

    fn parse_top_level_statement(&mut self, parent: u32) -> PResult<Statement> {
        if self.check_keyword(Keyword::Import) || self.check_from_import() {
            return self.parse_import_statement(parent);
        }
        if self.eat_keyword(Keyword::Export) {
            let id = self.arena.next_id();
            let start = self.span();
            let declaration = self.parse_declaration(id)?;
            let location: Location = start.join(self.span()).into();
            let node = Rc::new(ExportStatement { id, location, declaration });
            self.arena
                .add_node(AstNode::Statement(Statement::Export(node.clone())), parent);
            return Ok(Statement::Export(node));
        }
        self.parse_statement(parent)
    }

    fn parse_import_statement(&mut self, parent: u32) -> PResult<Statement> {
        let id = self.arena.next_id();
        let start = self.span();
        let (names, spec) = if self.eat_keyword(Keyword::From) {
            let spec = self.expect_string()?;
            self.expect_keyword(Keyword::Import)?;
            let names = self.parse_brace_name_list()?;
            (names, spec)
        } else {
            self.expect_keyword(Keyword::Import)?;
            let names = self.parse_brace_name_list()?;
            self.expect_keyword(Keyword::From)?;
            let spec = self.expect_string()?;
            (names, spec)
        };
        self.eat_punct(Punct::Semicolon);
        let location: Location = start.join(self.span()).into();
        let node = Rc::new(ImportStatement { id, location, names, spec });
        self.arena
            .add_node(AstNode::Statement(Statement::Import(node.clone())), parent);
        Ok(Statement::Import(node))
    }

    fn parse_brace_name_list(&mut self) -> PResult<Vec<String>> {
        self.expect_punct(Punct::LBrace)?;
        let mut names = Vec::new();
        if !self.check_punct(Punct::RBrace) {
            loop {
                names.push(self.expect_identifier()?);
                if !self.eat_punct(Punct::Comma) {
                    break;
                }
            }
        }
        self.expect_punct(Punct::RBrace)?;
        Ok(names)
    }

    fn parse_statement(&mut self, parent: u32) -> PResult<Statement> {
        if self.check_keyword(Keyword::Let) || self.check_keyword(Keyword::Var) {
            return self.parse_variable_decl(parent);
        }
        if self.check_keyword(Keyword::If) {
            return self.parse_if_statement(parent);
        }
        if self.check_keyword(Keyword::For) {
            return self.parse_for_statement(parent);
        }
        if self.check_keyword(Keyword::While) {
            return self.parse_while_statement(parent);
        }
        if self.check_keyword(Keyword::Return) {
            return self.parse_return_statement(parent);
        }
        if self.check_punct(Punct::LBrace) {
            let block = self.parse_block(parent)?;
            return Ok(Statement::Block(block));
        }
        if self.is_declaration_start() {
            let id = self.arena.next_id();
            let start = self.span();
            let declaration = self.parse_declaration(id)?;
            let location: Location = start.join(self.span()).into();
            let node = Rc::new(DeclarationStatement { id, location, declaration });
            self.arena.add_node(
                AstNode::Statement(Statement::Declaration(node.clone())),
                parent,
            );
            return Ok(Statement::Declaration(node));
        }
        self.parse_expression_or_assignment_statement(parent)
    }

    fn is_declaration_start(&self) -> bool {
        self.check_keyword(Keyword::Class)
            || self.check_keyword(Keyword::Interface)
            || self.check_keyword(Keyword::Mixin)
            || self.check_keyword(Keyword::Enum)
            || self.check_keyword(Keyword::Symbol)
            || self.check_keyword(Keyword::Type)
            || self.check_keyword(Keyword::Fn)
            || self.check_keyword(Keyword::Declare)
            || self.check_punct(Punct::At)
    }

    fn parse_variable_decl(&mut self, parent: u32) -> PResult<Statement> {
        let id = self.arena.next_id();
        let start = self.span();
        let mutable = self.eat_keyword(Keyword::Var);
        if !mutable {
            self.expect_keyword(Keyword::Let)?;
        }
        let name = self.expect_identifier()?;
        let type_annotation = if self.eat_punct(Punct::Colon) {
            Some(self.parse_type_annotation()?)
        } else {
            None
        };
        let value = if self.eat_operator(Operator::Assign) {
            Some(self.parse_expression(parent)?)
        } else {
            None
        };
        self.eat_punct(Punct::Semicolon);
        let location: Location = start.join(self.span()).into();
        let node = Rc::new(VariableDeclStatement {
            id,
            location,
            name,
            mutable,
            type_annotation,
            value,
        });
        self.arena.add_node(
            AstNode::Statement(Statement::VariableDecl(node.clone())),
            parent,
        );
        Ok(Statement::VariableDecl(node))
    }

    fn parse_if_statement(&mut self, parent: u32) -> PResult<Statement> {
        let id = self.arena.next_id();
        let start = self.span();
        self.expect_keyword(Keyword::If)?;
        self.expect_punct(Punct::LParen)?;
        let condition = self.parse_expression(id)?;
        self.expect_punct(Punct::RParen)?;
        let then_branch = self.parse_block(id)?;
        let else_branch = if self.eat_keyword(Keyword::Else) {
            Some(self.parse_block(id)?)
        } else {
            None
        };
        let location: Location = start.join(self.span()).into();
        let node = Rc::new(IfStatement {
            id,
            location,
            condition,
            then_branch,
            else_branch,
        });
        self.arena
            .add_node(AstNode::Statement(Statement::If(node.clone())), parent);
        Ok(Statement::If(node))
    }

    fn parse_for_statement(&mut self, parent: u32) -> PResult<Statement> {
        let id = self.arena.next_id();
        let start = self.span();
        self.expect_keyword(Keyword::For)?;
        self.expect_punct(Punct::LParen)?;
        let init = if self.check_punct(Punct::Semicolon) {
            None
        } else {
            Some(Box::new(self.parse_statement(id)?))
        };
        if !matches!(init, Some(_)) {
            self.eat_punct(Punct::Semicolon);
        }
        let condition = if self.check_punct(Punct::Semicolon) {
            None
        } else {
            Some(self.parse_expression(id)?)
        };
        self.expect_punct(Punct::Semicolon)?;
        let update = if self.check_punct(Punct::RParen) {
            None
        } else {
            Some(Box::new(self.parse_expression_or_assignment_statement(id)?))
        };
        self.expect_punct(Punct::RParen)?;
        let body = self.parse_block(id)?;
        let location: Location = start.join(self.span()).into();
        let node = Rc::new(ForStatement {
            id,
            location,
            init,
            condition,
            update,
            body,
        });
        self.arena
            .add_node(AstNode::Statement(Statement::For(node.clone())), parent);
        Ok(Statement::For(node))
    }

    fn parse_while_statement(&mut self, parent: u32) -> PResult<Statement> {
        let id = self.arena.next_id();
        let start = self.span();
        self.expect_keyword(Keyword::While)?;
        self.expect_punct(Punct::LParen)?;
        let condition = self.parse_expression(id)?;
        self.expect_punct(Punct::RParen)?;
        let body = self.parse_block(id)?;
        let location: Location = start.join(self.span()).into();
        let node = Rc::new(WhileStatement {
            id,
            location,
            condition,
            body,
        });
        self.arena
            .add_node(AstNode::Statement(Statement::While(node.clone())), parent);
        Ok(Statement::While(node))
    }

    fn parse_return_statement(&mut self, parent: u32) -> PResult<Statement> {
        let id = self.arena.next_id();
        let start = self.span();
        self.expect_keyword(Keyword::Return)?;
        let value = if self.check_punct(Punct::Semicolon) || self.check_punct(Punct::RBrace) {
            None
        } else {
            Some(self.parse_expression(id)?)
        };
        self.eat_punct(Punct::Semicolon);
        let location: Location = start.join(self.span()).into();
        let node = Rc::new(ReturnStatement { id, location, value });
        self.arena
            .add_node(AstNode::Statement(Statement::Return(node.clone())), parent);
        Ok(Statement::Return(node))
    }

    fn parse_expression_or_assignment_statement(&mut self, parent: u32) -> PResult<Statement> {
        let id = self.arena.next_id();
        let start = self.span();
        let expr = self.parse_expression(id)?;
        if self.eat_operator(Operator::Assign) {
            let value = self.parse_expression(id)?;
            self.eat_punct(Punct::Semicolon);
            let location: Location = start.join(self.span()).into();
            let node = Rc::new(AssignmentStatement {
                id,
                location,
                target: expr,
                value,
            });
            self.arena.add_node(
                AstNode::Statement(Statement::Assignment(node.clone())),
                parent,
            );
            return Ok(Statement::Assignment(node));
        }
        self.eat_punct(Punct::Semicolon);
        let location: Location = start.join(self.span()).into();
        let node = Rc::new(ExpressionStatement { id, location, expr });
        self.arena.add_node(
            AstNode::Statement(Statement::Expression(node.clone())),
            parent,
        );
        Ok(Statement::Expression(node))
    }

    fn parse_block(&mut self, parent: u32) -> PResult<Rc<Block>> {
        let id = self.arena.next_id();
        let start = self.span();
        self.expect_punct(Punct::LBrace)?;
        let mut statements = Vec::new();
        while !self.check_punct(Punct::RBrace) && !self.at_eof() {
            statements.push(self.parse_statement(id)?);
        }
        self.expect_punct(Punct::RBrace)?;
        let location: Location = start.join(self.span()).into();
        let node = Rc::new(Block { id, location, statements });
        self.arena
            .add_node(AstNode::Statement(Statement::Block(node.clone())), parent);
        Ok(node)
    }

    // -------------------------------------------------------------
    // Declarations
    // -------------------------------------------------------------

    fn parse_decorators(&mut self, parent: u32) -> PResult<Vec<Decorator>> {
        let mut decorators = Vec::new();
        while self.eat_punct(Punct::At) {
            let name = self.expect_identifier()?;
            let mut args = Vec::new();
            if self.eat_punct(Punct::LParen) {
                if !self.check_punct(Punct::RParen) {
                    loop {
                        args.push(self.parse_expression(parent)?);
                        if !self.eat_punct(Punct::Comma) {
                            break;
                        }
                    }
                }
                self.expect_punct(Punct::RParen)?;
            }
            decorators.push(Decorator { name, args });
        }
        Ok(decorators)
    }

    fn parse_declaration(&mut self, id: u32) -> PResult<Declaration> {
        let start = self.span();
        let decorators = self.parse_decorators(id)?;
        if self.check_keyword(Keyword::Declare) {
            return self.parse_declare_function(id, start);
        }
        if self.check_keyword(Keyword::Class) {
            return self.parse_class_declaration(id, start, decorators);
        }
        if self.check_keyword(Keyword::Interface) {
            return self.parse_interface_declaration(id, start);
        }
        if self.check_keyword(Keyword::Mixin) {
            return self.parse_mixin_declaration(id, start);
        }
        if self.check_keyword(Keyword::Enum) {
            return self.parse_enum_declaration(id, start);
        }
        if self.check_keyword(Keyword::Symbol) {
            return self.parse_symbol_declaration(id, start);
        }
        if self.check_keyword(Keyword::Type) {
            return self.parse_type_alias_declaration(id, start);
        }
        if self.check_keyword(Keyword::Fn) {
            return self.parse_function_declaration(id, start);
        }
        Err(self.unexpected("declaration"))
    }

    fn parse_type_params(&mut self) -> PResult<Vec<TypeParam>> {
        let mut params = Vec::new();
        if self.eat_operator(Operator::Lt) {
            loop {
                let name = self.expect_identifier()?;
                let bound = if self.eat_keyword(Keyword::Extends) {
                    Some(self.parse_type_annotation()?)
                } else {
                    None
                };
                params.push(TypeParam { name, bound });
                if !self.eat_punct(Punct::Comma) {
                    break;
                }
            }
            self.expect_operator(Operator::Gt)?;
        }
        Ok(params)
    }

    fn parse_params(&mut self) -> PResult<Vec<Param>> {
        self.expect_punct(Punct::LParen)?;
        let mut params = Vec::new();
        if !self.check_punct(Punct::RParen) {
            loop {
                let name = self.expect_identifier()?;
                self.expect_punct(Punct::Colon)?;
                let type_annotation = self.parse_type_annotation()?;
                params.push(Param { name, type_annotation });
                if !self.eat_punct(Punct::Comma) {
                    break;
                }
            }
        }
        self.expect_punct(Punct::RParen)?;
        Ok(params)
    }

    fn parse_return_type(&mut self) -> PResult<Option<TypeAnnotation>> {
        if self.eat_operator(Operator::Arrow) {
            return Ok(Some(self.parse_type_annotation()?));
        }
        if self.eat_punct(Punct::Colon) {
            return Ok(Some(self.parse_type_annotation()?));
        }
        Ok(None)
    }

    fn parse_function_body(&mut self, parent: u32) -> PResult<FunctionBody> {
        if self.check_punct(Punct::LBrace) {
            Ok(FunctionBody::Block(self.parse_block(parent)?))
        } else {
            Ok(FunctionBody::Expr(Box::new(self.parse_expression(parent)?)))
        }
    }

    fn parse_function_declaration(&mut self, id: u32, start: Span) -> PResult<Declaration> {
        self.expect_keyword(Keyword::Fn)?;
        let name = self.expect_identifier()?;
        let type_params = self.parse_type_params()?;
        let params = self.parse_params()?;
        let return_type = self.parse_return_type()?;
        let body = self.parse_function_body(id)?;
        let location: Location = start.join(self.span()).into();
        Ok(Declaration::Function(Rc::new(FunctionDeclaration {
            id,
            location,
            name,
            type_params,
            params,
            return_type,
            body,
            exported: false,
        })))
    }

    fn parse_declare_function(&mut self, id: u32, start: Span) -> PResult<Declaration> {
        self.expect_keyword(Keyword::Declare)?;
        self.expect_keyword(Keyword::Fn)?;
        let name = self.expect_identifier()?;
        let params = self.parse_params()?;
        let return_type = self.parse_return_type()?;
        self.eat_punct(Punct::Semicolon);
        let location: Location = start.join(self.span()).into();
        Ok(Declaration::DeclareFunction(Rc::new(
            DeclareFunctionDeclaration {
                id,
                location,
                name,
                params,
                return_type,
            },
        )))
    }

    fn parse_class_declaration(
        &mut self,
        id: u32,
        start: Span,
        decorators: Vec<Decorator>,
    ) -> PResult<Declaration> {
        self.expect_keyword(Keyword::Class)?;
        let is_final = false; // `final` is modelled as a decorator (`@final`) at parse time
        let name = self.expect_identifier()?;
        let type_params = self.parse_type_params()?;
        let super_class = if self.eat_keyword(Keyword::Extends) {
            Some(self.parse_named_type_with_args()?)
        } else {
            None
        };
        let mut implements = Vec::new();
        if self.eat_keyword(Keyword::Implements) {
            loop {
                implements.push(self.parse_named_type_with_args()?);
                if !self.eat_punct(Punct::Comma) {
                    break;
                }
            }
        }
        self.expect_punct(Punct::LBrace)?;
        let mut fields = Vec::new();
        let mut methods = Vec::new();
        let mut constructor = None;
        while !self.check_punct(Punct::RBrace) && !self.at_eof() {
            let member_decorators = self.parse_decorators(id)?;
            if self.check_identifier_text("constructor") {
                constructor = Some(self.parse_constructor(id)?);
                continue;
            }
            if self.check_keyword(Keyword::Fn) {
                methods.push(self.parse_method(id, member_decorators)?);
                continue;
            }
            fields.push(self.parse_field()?);
        }
        self.expect_punct(Punct::RBrace)?;
        let is_final = is_final || decorators.iter().any(|d| d.name == "final");
        let location: Location = start.join(self.span()).into();
        Ok(Declaration::Class(Rc::new(ClassDeclaration {
            id,
            location,
            name,
            type_params,
            super_class,
            implements,
            fields,
            methods,
            constructor,
            is_final,
            decorators,
        })))
    }

    fn parse_named_type_with_args(&mut self) -> PResult<(String, Vec<TypeAnnotation>)> {
        let name = self.expect_identifier()?;
        let mut args = Vec::new();
        if self.eat_operator(Operator::Lt) {
            loop {
                args.push(self.parse_type_annotation()?);
                if !self.eat_punct(Punct::Comma) {
                    break;
                }
            }
            self.expect_operator(Operator::Gt)?;
        }
        Ok((name, args))
    }

    fn parse_field(&mut self) -> PResult<FieldDecl> {
        let mutable = self.eat_keyword(Keyword::Var) || !self.eat_keyword(Keyword::Let);
        let name = self.expect_identifier()?;
        self.expect_punct(Punct::Colon)?;
        let type_annotation = self.parse_type_annotation()?;
        self.eat_punct(Punct::Semicolon);
        Ok(FieldDecl {
            name,
            type_annotation,
            mutable,
        })
    }

    fn parse_method(&mut self, parent: u32, decorators: Vec<Decorator>) -> PResult<MethodDecl> {
        self.expect_keyword(Keyword::Fn)?;
        let name = self.expect_identifier()?;
        let operator = operator_method_name(&name);
        let type_params = self.parse_type_params()?;
        let params = self.parse_params()?;
        let return_type = self.parse_return_type()?;
        let body = self.parse_function_body(parent)?;
        let is_final = decorators.iter().any(|d| d.name == "final");
        Ok(MethodDecl {
            name,
            type_params,
            params,
            return_type,
            body,
            is_final,
            decorators,
            operator,
        })
    }

    fn parse_constructor(&mut self, parent: u32) -> PResult<ConstructorDecl> {
        self.expect_identifier()?; // "constructor"
        let params = self.parse_params()?;
        self.expect_punct(Punct::LBrace)?;
        let mut body = Vec::new();
        let mut super_args = None;
        while !self.check_punct(Punct::RBrace) && !self.at_eof() {
            if self.check_keyword(Keyword::Super) {
                let stmt_id = self.arena.next_id();
                let expr_id = self.arena.next_id();
                let start = self.span();
                self.expect_keyword(Keyword::Super)?;
                let args = self.parse_call_arguments(stmt_id)?;
                self.eat_punct(Punct::Semicolon);
                let location: Location = start.join(self.span()).into();
                let super_expr = Rc::new(SuperExpression {
                    id: expr_id,
                    location: location.clone(),
                    arguments: args.clone(),
                });
                self.arena.add_node(
                    AstNode::Expression(Expression::Super(super_expr.clone())),
                    stmt_id,
                );
                let node = Rc::new(ExpressionStatement {
                    id: stmt_id,
                    location,
                    expr: Expression::Super(super_expr),
                });
                self.arena.add_node(
                    AstNode::Statement(Statement::Expression(node.clone())),
                    parent,
                );
                body.push(Statement::Expression(node));
                super_args = Some(args);
                continue;
            }
            body.push(self.parse_statement(parent)?);
        }
        self.expect_punct(Punct::RBrace)?;
        Ok(ConstructorDecl {
            params,
            super_args,
            body,
        })
    }

    fn parse_interface_declaration(&mut self, id: u32, start: Span) -> PResult<Declaration> {
        self.expect_keyword(Keyword::Interface)?;
        let name = self.expect_identifier()?;
        let type_params = self.parse_type_params()?;
        let parent = if self.eat_keyword(Keyword::Extends) {
            Some(self.expect_identifier()?)
        } else {
            None
        };
        self.expect_punct(Punct::LBrace)?;
        let mut methods = Vec::new();
        let mut fields = Vec::new();
        while !self.check_punct(Punct::RBrace) && !self.at_eof() {
            if self.eat_keyword(Keyword::Fn) {
                let name = self.expect_identifier()?;
                let params = self.parse_params()?;
                let return_type = self.parse_return_type()?;
                self.eat_punct(Punct::Semicolon);
                methods.push(MethodSignature {
                    name,
                    params,
                    return_type,
                });
            } else {
                let name = self.expect_identifier()?;
                self.expect_punct(Punct::Colon)?;
                let type_annotation = self.parse_type_annotation()?;
                self.eat_punct(Punct::Semicolon);
                fields.push(FieldSignature {
                    name,
                    type_annotation,
                });
            }
        }
        self.expect_punct(Punct::RBrace)?;
        let location: Location = start.join(self.span()).into();
        Ok(Declaration::Interface(Rc::new(InterfaceDeclaration {
            id,
            location,
            name,
            type_params,
            parent,
            methods,
            fields,
        })))
    }

    fn parse_mixin_declaration(&mut self, id: u32, start: Span) -> PResult<Declaration> {
        self.expect_keyword(Keyword::Mixin)?;
        let name = self.expect_identifier()?;
        self.expect_punct(Punct::LBrace)?;
        let mut fields = Vec::new();
        let mut methods = Vec::new();
        while !self.check_punct(Punct::RBrace) && !self.at_eof() {
            if self.check_keyword(Keyword::Fn) {
                methods.push(self.parse_method(id, vec![])?);
            } else {
                fields.push(self.parse_field()?);
            }
        }
        self.expect_punct(Punct::RBrace)?;
        let location: Location = start.join(self.span()).into();
        Ok(Declaration::Mixin(Rc::new(MixinDeclaration {
            id,
            location,
            name,
            fields,
            methods,
        })))
    }

    fn parse_enum_declaration(&mut self, id: u32, start: Span) -> PResult<Declaration> {
        self.expect_keyword(Keyword::Enum)?;
        let name = self.expect_identifier()?;
        self.expect_punct(Punct::LBrace)?;
        let mut variants = Vec::new();
        if !self.check_punct(Punct::RBrace) {
            loop {
                variants.push(self.expect_identifier()?);
                if !self.eat_punct(Punct::Comma) {
                    break;
                }
            }
        }
        self.expect_punct(Punct::RBrace)?;
        let location: Location = start.join(self.span()).into();
        Ok(Declaration::Enum(Rc::new(EnumDeclaration {
            id,
            location,
            name,
            variants,
        })))
    }

    fn parse_symbol_declaration(&mut self, id: u32, start: Span) -> PResult<Declaration> {
        self.expect_keyword(Keyword::Symbol)?;
        let name = self.expect_identifier()?;
        self.eat_punct(Punct::Semicolon);
        let location: Location = start.join(self.span()).into();
        Ok(Declaration::Symbol(Rc::new(SymbolDeclaration {
            id,
            location,
            name,
        })))
    }

    fn parse_type_alias_declaration(&mut self, id: u32, start: Span) -> PResult<Declaration> {
        self.expect_keyword(Keyword::Type)?;
        let is_distinct = self.eat_keyword(Keyword::Distinct);
        let name = self.expect_identifier()?;
        let type_params = self.parse_type_params()?;
        self.expect_operator(Operator::Assign)?;
        let target = self.parse_type_annotation()?;
        self.eat_punct(Punct::Semicolon);
        let location: Location = start.join(self.span()).into();
        Ok(Declaration::TypeAlias(Rc::new(TypeAliasDeclaration {
            id,
            location,
            name,
            type_params,
            target,
            is_distinct,
        })))
    }

    // -------------------------------------------------------------
    // Type annotations
    // -------------------------------------------------------------

    fn parse_type_annotation(&mut self) -> PResult<TypeAnnotation> {
        let mut ty = self.parse_type_primary()?;
        if self.check_operator(Operator::Pipe) {
            let mut members = vec![ty];
            while self.eat_operator(Operator::Pipe) {
                members.push(self.parse_type_primary()?);
            }
            ty = TypeAnnotation::Union(Rc::new(UnionTypeAnnotation {
                id: 0,
                location: Location::default(),
                members,
            }));
        }
        Ok(ty)
    }

    fn parse_type_primary(&mut self) -> PResult<TypeAnnotation> {
        if self.check_punct(Punct::LParen) {
            return self.parse_tuple_or_function_type();
        }
        if self.check_punct(Punct::LBrace) {
            return self.parse_record_type();
        }
        let name = self.expect_identifier()?;
        if self.eat_operator(Operator::Lt) {
            let mut args = Vec::new();
            loop {
                args.push(self.parse_type_annotation()?);
                if !self.eat_punct(Punct::Comma) {
                    break;
                }
            }
            self.expect_operator(Operator::Gt)?;
            return Ok(TypeAnnotation::Generic(Rc::new(GenericTypeAnnotation {
                id: 0,
                location: Location::default(),
                name,
                args,
            })));
        }
        Ok(TypeAnnotation::Named(Rc::new(NamedType {
            id: 0,
            location: Location::default(),
            name,
        })))
    }

    fn parse_tuple_or_function_type(&mut self) -> PResult<TypeAnnotation> {
        self.expect_punct(Punct::LParen)?;
        let mut elements = Vec::new();
        if !self.check_punct(Punct::RParen) {
            loop {
                elements.push(self.parse_type_annotation()?);
                if !self.eat_punct(Punct::Comma) {
                    break;
                }
            }
        }
        self.expect_punct(Punct::RParen)?;
        if self.eat_operator(Operator::Arrow) {
            let return_type = Box::new(self.parse_type_annotation()?);
            return Ok(TypeAnnotation::Function(Rc::new(FunctionTypeAnnotation {
                id: 0,
                location: Location::default(),
                params: elements,
                return_type,
            })));
        }
        Ok(TypeAnnotation::Tuple(Rc::new(TupleTypeAnnotation {
            id: 0,
            location: Location::default(),
            elements,
        })))
    }

    fn parse_record_type(&mut self) -> PResult<TypeAnnotation> {
        self.expect_punct(Punct::LBrace)?;
        let mut fields = Vec::new();
        if !self.check_punct(Punct::RBrace) {
            loop {
                let name = self.expect_identifier()?;
                self.expect_punct(Punct::Colon)?;
                let type_annotation = self.parse_type_annotation()?;
                fields.push((name, type_annotation));
                if !self.eat_punct(Punct::Comma) {
                    break;
                }
            }
        }
        self.expect_punct(Punct::RBrace)?;
        Ok(TypeAnnotation::Record(Rc::new(RecordTypeAnnotation {
            id: 0,
            location: Location::default(),
            fields,
        })))
    }

    // -------------------------------------------------------------
    // Expressions (Pratt precedence climbing)
    //
    // Lowest to highest: `||`, `&&`, `|`, `^`, `&`, equality, relational
    // (including `is`/`as`), range `..`, shift, additive, multiplicative,
    // `**` (right-assoc), unary, postfix. `&` binds tighter than `==`, so
    // `a & b == c` parses as `a & (b == c)`.
    // -------------------------------------------------------------

    fn parse_expression(&mut self, parent: u32) -> PResult<Expression> {
        self.parse_binary(parent, 0)
    }

    fn parse_binary(&mut self, parent: u32, min_prec: u8) -> PResult<Expression> {
        let start = self.span();
        let mut left = self.parse_range(parent)?;
        loop {
            let Some((op, prec, right_assoc)) = self.peek_binary_operator() else {
                break;
            };
            if prec < min_prec {
                break;
            }
            self.advance();
            let next_min = if right_assoc { prec } else { prec + 1 };
            let right = self.parse_binary(parent, next_min)?;
            let id = self.arena.next_id();
            let location: Location = start.join(self.span()).into();
            let node = Rc::new(BinaryExpression {
                id,
                location: location.clone(),
                left,
                operator: op,
                right,
            });
            self.arena
                .add_node(AstNode::Expression(Expression::Binary(node.clone())), parent);
            left = Expression::Binary(node);
        }
        Ok(left)
    }

    /// Precedence table; higher binds tighter. `||`=1 `&&`=2 `|`=3 `^`=4
    /// `&`=5 equality=6 relational=7 shift=9 additive=10 multiplicative=11.
    /// Range (`..`) sits between relational and shift and is handled
    /// outside this table by `parse_range`.
    fn peek_binary_operator(&self) -> Option<(OperatorKind, u8, bool)> {
        let op = match self.peek_kind() {
            TokenKind::Operator(o) => *o,
            _ => return None,
        };
        Some(match op {
            Operator::OrOr => (OperatorKind::Or, 1, false),
            Operator::AndAnd => (OperatorKind::And, 2, false),
            Operator::Pipe => (OperatorKind::BitOr, 3, false),
            Operator::Caret => (OperatorKind::BitXor, 4, false),
            Operator::Amp => (OperatorKind::BitAnd, 5, false),
            Operator::Eq => (OperatorKind::Eq, 6, false),
            Operator::Ne => (OperatorKind::Ne, 6, false),
            Operator::Lt => (OperatorKind::Lt, 7, false),
            Operator::Le => (OperatorKind::Le, 7, false),
            Operator::Gt => (OperatorKind::Gt, 7, false),
            Operator::Ge => (OperatorKind::Ge, 7, false),
            Operator::Shl => (OperatorKind::Shl, 9, false),
            Operator::Shr => (OperatorKind::Shr, 9, false),
            Operator::Plus => (OperatorKind::Add, 10, false),
            Operator::Minus => (OperatorKind::Sub, 10, false),
            Operator::Star => (OperatorKind::Mul, 11, false),
            Operator::Slash => (OperatorKind::Div, 11, false),
            Operator::Percent => (OperatorKind::Mod, 11, false),
            Operator::StarStar => (OperatorKind::Pow, 12, true),
            _ => return None,
        })
    }

    fn parse_range(&mut self, parent: u32) -> PResult<Expression> {
        let start = self.span();
        if self.check_operator(Operator::DotDot) {
            let id = self.arena.next_id();
            self.advance();
            let end = if self.starts_expression() {
                Some(self.parse_unary(parent)?)
            } else {
                None
            };
            let location: Location = start.join(self.span()).into();
            let node = Rc::new(RangeExpression {
                id,
                location: location.clone(),
                start: None,
                end,
            });
            self.arena
                .add_node(AstNode::Expression(Expression::Range(node.clone())), parent);
            return Ok(Expression::Range(node));
        }
        let left = self.parse_unary(parent)?;
        if self.check_operator(Operator::DotDot) {
            let id = self.arena.next_id();
            self.advance();
            let end = if self.starts_expression() {
                Some(self.parse_unary(parent)?)
            } else {
                None
            };
            let location: Location = start.join(self.span()).into();
            let node = Rc::new(RangeExpression {
                id,
                location: location.clone(),
                start: Some(left),
                end,
            });
            self.arena
                .add_node(AstNode::Expression(Expression::Range(node.clone())), parent);
            return Ok(Expression::Range(node));
        }
        if self.eat_keyword(Keyword::Is) {
            let id = self.arena.next_id();
            let target = self.parse_type_annotation()?;
            let location: Location = start.join(self.span()).into();
            let node = Rc::new(TypeTestExpression {
                id,
                location: location.clone(),
                expr: left,
                target,
            });
            self.arena.add_node(
                AstNode::Expression(Expression::TypeTest(node.clone())),
                parent,
            );
            return Ok(Expression::TypeTest(node));
        }
        if self.eat_keyword(Keyword::As) {
            let id = self.arena.next_id();
            let target = self.parse_type_annotation()?;
            let location: Location = start.join(self.span()).into();
            let node = Rc::new(CastExpression {
                id,
                location: location.clone(),
                expr: left,
                target,
            });
            self.arena
                .add_node(AstNode::Expression(Expression::Cast(node.clone())), parent);
            return Ok(Expression::Cast(node));
        }
        Ok(left)
    }

    fn starts_expression(&self) -> bool {
        !matches!(
            self.peek_kind(),
            TokenKind::Punct(Punct::RParen | Punct::RBracket | Punct::RBrace | Punct::Comma | Punct::Semicolon)
                | TokenKind::Eof
        )
    }

    fn parse_unary(&mut self, parent: u32) -> PResult<Expression> {
        let start = self.span();
        let op = if self.eat_operator(Operator::Bang) {
            Some(UnaryOperatorKind::Not)
        } else if self.eat_operator(Operator::Minus) {
            Some(UnaryOperatorKind::Neg)
        } else {
            None
        };
        let operand = self.parse_postfix(parent)?;
        match op {
            None => Ok(operand),
            Some(operator) => {
                let id = self.arena.next_id();
                let location: Location = start.join(self.span()).into();
                let node = Rc::new(UnaryExpression {
                    id,
                    location: location.clone(),
                    operator,
                    operand,
                });
                self.arena
                    .add_node(AstNode::Expression(Expression::Unary(node.clone())), parent);
                Ok(Expression::Unary(node))
            }
        }
    }

    fn parse_postfix(&mut self, parent: u32) -> PResult<Expression> {
        let start = self.span();
        let mut expr = self.parse_primary(parent)?;
        loop {
            if self.eat_punct(Punct::Dot) {
                let property = self.expect_identifier()?;
                let id = self.arena.next_id();
                let location: Location = start.join(self.span()).into();
                let node = Rc::new(MemberExpression {
                    id,
                    location: location.clone(),
                    object: expr,
                    property,
                });
                self.arena.add_node(
                    AstNode::Expression(Expression::Member(node.clone())),
                    parent,
                );
                expr = Expression::Member(node);
                continue;
            }
            if self.check_punct(Punct::LBracket) {
                self.advance();
                let index = self.parse_expression(parent)?;
                self.expect_punct(Punct::RBracket)?;
                let id = self.arena.next_id();
                let location: Location = start.join(self.span()).into();
                let node = Rc::new(IndexExpression {
                    id,
                    location: location.clone(),
                    object: expr,
                    index,
                });
                self.arena.add_node(
                    AstNode::Expression(Expression::Index(node.clone())),
                    parent,
                );
                expr = Expression::Index(node);
                continue;
            }
            if self.check_punct(Punct::LParen) {
                let arguments = self.parse_call_arguments(parent)?;
                let id = self.arena.next_id();
                let location: Location = start.join(self.span()).into();
                let node = Rc::new(CallExpression {
                    id,
                    location: location.clone(),
                    callee: expr,
                    type_args: vec![],
                    arguments,
                });
                self.arena
                    .add_node(AstNode::Expression(Expression::Call(node.clone())), parent);
                expr = Expression::Call(node);
                continue;
            }
            break;
        }
        Ok(expr)
    }

    fn parse_call_arguments(&mut self, parent: u32) -> PResult<Vec<Expression>> {
        self.expect_punct(Punct::LParen)?;
        let mut args = Vec::new();
        if !self.check_punct(Punct::RParen) {
            loop {
                args.push(self.parse_expression(parent)?);
                if !self.eat_punct(Punct::Comma) {
                    break;
                }
            }
        }
        self.expect_punct(Punct::RParen)?;
        Ok(args)
    }

    fn parse_primary(&mut self, parent: u32) -> PResult<Expression> {
        let start = self.span();
        match self.peek_kind().clone() {
            TokenKind::Integer { text, .. } => {
                self.advance();
                self.new_node_expr(
                    parent,
                    start,
                    |id, location| {
                        Expression::Number(Rc::new(NumberLiteral {
                            id,
                            location,
                            text,
                            is_float: false,
                        }))
                    },
                )
            }
            TokenKind::Float { text, .. } => {
                self.advance();
                self.new_node_expr(
                    parent,
                    start,
                    |id, location| {
                        Expression::Number(Rc::new(NumberLiteral {
                            id,
                            location,
                            text,
                            is_float: true,
                        }))
                    },
                )
            }
            TokenKind::String(value) => {
                self.advance();
                self.new_node_expr(parent, start, |id, location| {
                    Expression::String(Rc::new(StringLiteral { id, location, value }))
                })
            }
            TokenKind::NoSubstitutionTemplate(value) => {
                self.advance();
                self.new_node_expr(parent, start, |id, location| {
                    Expression::Template(Rc::new(TemplateLiteral {
                        id,
                        location,
                        quasis: vec![value],
                        expressions: vec![],
                    }))
                })
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                self.new_node_expr(parent, start, |id, location| {
                    Expression::Bool(Rc::new(BoolLiteral {
                        id,
                        location,
                        value: true,
                    }))
                })
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                self.new_node_expr(parent, start, |id, location| {
                    Expression::Bool(Rc::new(BoolLiteral {
                        id,
                        location,
                        value: false,
                    }))
                })
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.advance();
                self.new_node_expr(parent, start, |id, location| {
                    Expression::Null(Rc::new(NullLiteral { id, location }))
                })
            }
            TokenKind::Keyword(Keyword::This) => {
                self.advance();
                self.new_node_expr(parent, start, |id, location| {
                    Expression::This(Rc::new(ThisExpression { id, location }))
                })
            }
            TokenKind::Keyword(Keyword::Throw) => {
                self.advance();
                let value = self.parse_expression(parent)?;
                self.new_node_expr(parent, start, |id, location| {
                    Expression::Throw(Rc::new(ThrowExpression { id, location, value }))
                })
            }
            TokenKind::Keyword(Keyword::New) => {
                self.advance();
                let class_name = self.expect_identifier()?;
                let type_args = self.parse_optional_generic_args()?;
                let arguments = self.parse_call_arguments(parent)?;
                self.new_node_expr(parent, start, |id, location| {
                    Expression::New(Rc::new(NewExpression {
                        id,
                        location,
                        class_name,
                        type_args,
                        arguments,
                    }))
                })
            }
            TokenKind::Keyword(Keyword::If) => self.parse_if_expression(parent, start),
            TokenKind::Keyword(Keyword::Match) => self.parse_match_expression(parent, start),
            TokenKind::Keyword(Keyword::Fn) => self.parse_function_expression(parent, start),
            TokenKind::SymbolRef(name) => {
                self.advance();
                self.new_node_expr(parent, start, |id, location| {
                    Expression::SymbolRef(Rc::new(SymbolRefExpression { id, location, name }))
                })
            }
            TokenKind::Punct(Punct::Underscore) => {
                self.advance();
                self.new_node_expr(parent, start, |id, location| {
                    Expression::Wildcard(Rc::new(WildcardExpression { id, location }))
                })
            }
            TokenKind::Identifier(_) => self.parse_identifier_or_lambda(parent, start),
            TokenKind::Punct(Punct::LParen) => self.parse_parenthesized_or_tuple_or_lambda(parent, start),
            TokenKind::Punct(Punct::LBracket) => self.parse_array_literal(parent, start),
            TokenKind::Punct(Punct::LBrace) => self.parse_record_literal(parent, start),
            TokenKind::Operator(Operator::DotDot) => {
                // handled in parse_range, but `..` can also begin a primary
                // (e.g. as the argument of a call): treat as a full range.
                self.parse_range(parent)
            }
            other => Err(ParseError::UnexpectedToken {
                found: format!("{other:?}"),
                expected: "expression".to_string(),
                span: self.span(),
            }),
        }
    }

    fn new_node_expr(
        &mut self,
        parent: u32,
        start: Span,
        build: impl FnOnce(u32, Location) -> Expression,
    ) -> PResult<Expression> {
        let id = self.arena.next_id();
        let location: Location = start.join(self.span()).into();
        let expr = build(id, location);
        self.arena
            .add_node(AstNode::Expression(expr.clone()), parent);
        Ok(expr)
    }

    fn parse_optional_generic_args(&mut self) -> PResult<Vec<TypeAnnotation>> {
        // `new Foo<T>(...)`: only treated as generic args when immediately
        // followed eventually by `(`, disambiguating from `<` as a
        // comparison — safe here because `new` always expects a call.
        if !self.eat_operator(Operator::Lt) {
            return Ok(vec![]);
        }
        let mut args = Vec::new();
        loop {
            args.push(self.parse_type_annotation()?);
            if !self.eat_punct(Punct::Comma) {
                break;
            }
        }
        self.expect_operator(Operator::Gt)?;
        Ok(args)
    }

    fn parse_identifier_or_lambda(&mut self, parent: u32, start: Span) -> PResult<Expression> {
        let name = self.expect_identifier()?;
        if self.check_operator(Operator::Arrow) {
            // `x => expr` single-parameter lambda sugar.
            self.advance();
            let id = self.arena.next_id();
            let param = Param {
                name,
                type_annotation: TypeAnnotation::Named(Rc::new(NamedType {
                    id: 0,
                    location: Location::default(),
                    name: "_infer".to_string(),
                })),
            };
            let body = self.parse_function_body(id)?;
            let location: Location = start.join(self.span()).into();
            let node = Rc::new(FunctionExpression {
                id,
                location: location.clone(),
                params: vec![param],
                return_type: None,
                body,
            });
            self.arena.add_node(
                AstNode::Expression(Expression::Function(node.clone())),
                parent,
            );
            return Ok(Expression::Function(node));
        }
        let id = self.arena.next_id();
        let location: Location = start.join(self.span()).into();
        let node = Rc::new(Identifier { id, location, name });
        self.arena.add_node(
            AstNode::Expression(Expression::Identifier(node.clone())),
            parent,
        );
        Ok(Expression::Identifier(node))
    }

    fn parse_parenthesized_or_tuple_or_lambda(
        &mut self,
        parent: u32,
        start: Span,
    ) -> PResult<Expression> {
        let save = self.pos;
        if let Ok(params) = self.try_parse_lambda_params() {
            if self.eat_operator(Operator::Arrow) {
                let id = self.arena.next_id();
                let body = self.parse_function_body(id)?;
                let location: Location = start.join(self.span()).into();
                let node = Rc::new(FunctionExpression {
                    id,
                    location: location.clone(),
                    params,
                    return_type: None,
                    body,
                });
                self.arena.add_node(
                    AstNode::Expression(Expression::Function(node.clone())),
                    parent,
                );
                return Ok(Expression::Function(node));
            }
        }
        self.pos = save;
        self.expect_punct(Punct::LParen)?;
        let mut elements = Vec::new();
        if !self.check_punct(Punct::RParen) {
            loop {
                elements.push(self.parse_expression(parent)?);
                if !self.eat_punct(Punct::Comma) {
                    break;
                }
            }
        }
        self.expect_punct(Punct::RParen)?;
        if elements.len() == 1 {
            return Ok(elements.into_iter().next().expect("checked len == 1"));
        }
        let id = self.arena.next_id();
        let location: Location = start.join(self.span()).into();
        let node = Rc::new(TupleLiteral {
            id,
            location: location.clone(),
            elements,
        });
        self.arena
            .add_node(AstNode::Expression(Expression::Tuple(node.clone())), parent);
        Ok(Expression::Tuple(node))
    }

    /// Speculatively parses `(a: T, b: U)` lambda parameters; on failure the
    /// caller rewinds `self.pos` and reparses as a parenthesized/tuple
    /// expression instead.
    fn try_parse_lambda_params(&mut self) -> PResult<Vec<Param>> {
        self.expect_punct(Punct::LParen)?;
        let mut params = Vec::new();
        if !self.check_punct(Punct::RParen) {
            loop {
                let name = self.expect_identifier()?;
                self.expect_punct(Punct::Colon)?;
                let type_annotation = self.parse_type_annotation()?;
                params.push(Param { name, type_annotation });
                if !self.eat_punct(Punct::Comma) {
                    break;
                }
            }
        }
        self.expect_punct(Punct::RParen)?;
        Ok(params)
    }

    fn parse_array_literal(&mut self, parent: u32, start: Span) -> PResult<Expression> {
        self.expect_punct(Punct::LBracket)?;
        let mut elements = Vec::new();
        if !self.check_punct(Punct::RBracket) {
            loop {
                elements.push(self.parse_expression(parent)?);
                if !self.eat_punct(Punct::Comma) {
                    break;
                }
            }
        }
        self.expect_punct(Punct::RBracket)?;
        self.new_node_expr(parent, start, |id, location| {
            Expression::Array(Rc::new(ArrayLiteral { id, location, elements }))
        })
    }

    fn parse_record_literal(&mut self, parent: u32, start: Span) -> PResult<Expression> {
        self.expect_punct(Punct::LBrace)?;
        let mut fields = Vec::new();
        if !self.check_punct(Punct::RBrace) {
            loop {
                let name = self.expect_identifier()?;
                self.expect_punct(Punct::Colon)?;
                let value = self.parse_expression(parent)?;
                fields.push((name, value));
                if !self.eat_punct(Punct::Comma) {
                    break;
                }
            }
        }
        self.expect_punct(Punct::RBrace)?;
        self.new_node_expr(parent, start, |id, location| {
            Expression::Record(Rc::new(RecordLiteral { id, location, fields }))
        })
    }

    fn parse_if_expression(&mut self, parent: u32, start: Span) -> PResult<Expression> {
        self.expect_keyword(Keyword::If)?;
        self.expect_punct(Punct::LParen)?;
        let id = self.arena.next_id();
        let condition = self.parse_expression(id)?;
        self.expect_punct(Punct::RParen)?;
        self.expect_punct(Punct::LBrace)?;
        let then_branch = self.parse_expression(id)?;
        self.expect_punct(Punct::RBrace)?;
        self.expect_keyword(Keyword::Else)?;
        self.expect_punct(Punct::LBrace)?;
        let else_branch = self.parse_expression(id)?;
        self.expect_punct(Punct::RBrace)?;
        let location: Location = start.join(self.span()).into();
        let node = Rc::new(IfExpression {
            id,
            location: location.clone(),
            condition,
            then_branch,
            else_branch,
        });
        self.arena
            .add_node(AstNode::Expression(Expression::If(node.clone())), parent);
        Ok(Expression::If(node))
    }

    fn parse_match_expression(&mut self, parent: u32, start: Span) -> PResult<Expression> {
        self.expect_keyword(Keyword::Match)?;
        let id = self.arena.next_id();
        self.expect_punct(Punct::LParen)?;
        let scrutinee = self.parse_expression(id)?;
        self.expect_punct(Punct::RParen)?;
        self.expect_punct(Punct::LBrace)?;
        let mut arms = Vec::new();
        while self.eat_keyword(Keyword::Case) {
            let pattern = self.parse_pattern(id)?;
            let guard = if self.eat_keyword(Keyword::If) {
                Some(self.parse_expression(id)?)
            } else {
                None
            };
            self.expect_punct(Punct::Colon)?;
            let body = self.parse_expression(id)?;
            arms.push(MatchArm { pattern, guard, body });
        }
        self.expect_punct(Punct::RBrace)?;
        let location: Location = start.join(self.span()).into();
        let node = Rc::new(MatchExpression {
            id,
            location: location.clone(),
            scrutinee,
            arms,
        });
        self.arena
            .add_node(AstNode::Expression(Expression::Match(node.clone())), parent);
        Ok(Expression::Match(node))
    }

    fn parse_function_expression(&mut self, parent: u32, start: Span) -> PResult<Expression> {
        self.expect_keyword(Keyword::Fn)?;
        let id = self.arena.next_id();
        let params = self.parse_params()?;
        let return_type = self.parse_return_type()?;
        let body = self.parse_function_body(id)?;
        let location: Location = start.join(self.span()).into();
        let node = Rc::new(FunctionExpression {
            id,
            location: location.clone(),
            params,
            return_type,
            body,
        });
        self.arena.add_node(
            AstNode::Expression(Expression::Function(node.clone())),
            parent,
        );
        Ok(Expression::Function(node))
    }

    // -------------------------------------------------------------
    // Patterns
    // -------------------------------------------------------------

    fn parse_pattern(&mut self, parent: u32) -> PResult<Pattern> {
        let mut pattern = self.parse_pattern_primary(parent)?;
        loop {
            if self.eat_keyword(Keyword::As) {
                let name = self.expect_identifier()?;
                let id = self.arena.next_id();
                let location: Location = self.span().into();
                let node = Rc::new(AsPattern {
                    id,
                    location,
                    pattern,
                    name,
                });
                self.arena
                    .add_node(AstNode::Pattern(Pattern::As(node.clone())), parent);
                pattern = Pattern::As(node);
                continue;
            }
            if self.eat_operator(Operator::Pipe) {
                let right = self.parse_pattern_primary(parent)?;
                let left_names = pattern.bound_names();
                let right_names = right.bound_names();
                if left_names != right_names {
                    return Err(ParseError::OrPatternBindingMismatch {
                        detail: format!("{left_names:?} != {right_names:?}"),
                        span: self.span(),
                    });
                }
                let id = self.arena.next_id();
                let location: Location = self.span().into();
                let node = Rc::new(OrPattern {
                    id,
                    location,
                    left: pattern,
                    right,
                });
                self.arena
                    .add_node(AstNode::Pattern(Pattern::Or(node.clone())), parent);
                pattern = Pattern::Or(node);
                continue;
            }
            if self.eat_operator(Operator::Amp) {
                let right = self.parse_pattern_primary(parent)?;
                let left_names = pattern.bound_names();
                let right_names = right.bound_names();
                if let Some(dup) = left_names.intersection(&right_names).next() {
                    return Err(ParseError::DuplicatePatternBinding {
                        name: dup.clone(),
                        span: self.span(),
                    });
                }
                let id = self.arena.next_id();
                let location: Location = self.span().into();
                let node = Rc::new(AndPattern {
                    id,
                    location,
                    left: pattern,
                    right,
                });
                self.arena
                    .add_node(AstNode::Pattern(Pattern::And(node.clone())), parent);
                pattern = Pattern::And(node);
                continue;
            }
            break;
        }
        Ok(pattern)
    }

    fn parse_pattern_primary(&mut self, parent: u32) -> PResult<Pattern> {
        let start = self.span();
        if self.eat_punct(Punct::Underscore) {
            let id = self.arena.next_id();
            let location: Location = start.join(self.span()).into();
            let node = Rc::new(WildcardPattern { id, location });
            self.arena
                .add_node(AstNode::Pattern(Pattern::Wildcard(node.clone())), parent);
            return Ok(Pattern::Wildcard(node));
        }
        if self.check_punct(Punct::LParen) {
            self.advance();
            let mut elements = Vec::new();
            if !self.check_punct(Punct::RParen) {
                loop {
                    elements.push(self.parse_pattern(parent)?);
                    if !self.eat_punct(Punct::Comma) {
                        break;
                    }
                }
            }
            self.expect_punct(Punct::RParen)?;
            let id = self.arena.next_id();
            let location: Location = start.join(self.span()).into();
            let node = Rc::new(TuplePattern {
                id,
                location: location.clone(),
                elements,
            });
            self.arena
                .add_node(AstNode::Pattern(Pattern::Tuple(node.clone())), parent);
            return Ok(Pattern::Tuple(node));
        }
        if self.check_operator(Operator::DotDot) {
            self.advance();
            let id = self.arena.next_id();
            let end = Some(self.parse_unary(parent)?);
            let location: Location = start.join(self.span()).into();
            let node = Rc::new(RangePattern {
                id,
                location: location.clone(),
                start: None,
                end,
            });
            self.arena
                .add_node(AstNode::Pattern(Pattern::Range(node.clone())), parent);
            return Ok(Pattern::Range(node));
        }
        if self.check_punct(Punct::LBrace) {
            self.advance();
            let mut fields = Vec::new();
            if !self.check_punct(Punct::RBrace) {
                loop {
                    let field_name = self.expect_identifier()?;
                    let field_pattern = if self.eat_punct(Punct::Colon) {
                        self.parse_pattern(parent)?
                    } else {
                        let id = self.arena.next_id();
                        let location: Location = self.span().into();
                        let shorthand = Rc::new(IdentifierPattern {
                            id,
                            location: location.clone(),
                            name: field_name.clone(),
                        });
                        self.arena.add_node(
                            AstNode::Pattern(Pattern::Identifier(shorthand.clone())),
                            parent,
                        );
                        Pattern::Identifier(shorthand)
                    };
                    fields.push((field_name, field_pattern));
                    if !self.eat_punct(Punct::Comma) {
                        break;
                    }
                }
            }
            self.expect_punct(Punct::RBrace)?;
            let id = self.arena.next_id();
            let location: Location = start.join(self.span()).into();
            let node = Rc::new(RecordPattern {
                id,
                location: location.clone(),
                fields,
            });
            self.arena
                .add_node(AstNode::Pattern(Pattern::Record(node.clone())), parent);
            return Ok(Pattern::Record(node));
        }
        if let TokenKind::Identifier(_) = self.peek_kind() {
            let name = self.expect_identifier()?;
            if self.check_punct(Punct::LBrace) {
                self.advance();
                let mut fields = Vec::new();
                if !self.check_punct(Punct::RBrace) {
                    loop {
                        let field_name = self.expect_identifier()?;
                        let field_pattern = if self.eat_punct(Punct::Colon) {
                            self.parse_pattern(parent)?
                        } else {
                            let id = self.arena.next_id();
                            let location: Location = self.span().into();
                            let shorthand = Rc::new(IdentifierPattern {
                                id,
                                location: location.clone(),
                                name: field_name.clone(),
                            });
                            self.arena.add_node(
                                AstNode::Pattern(Pattern::Identifier(shorthand.clone())),
                                parent,
                            );
                            Pattern::Identifier(shorthand)
                        };
                        fields.push((field_name, field_pattern));
                        if !self.eat_punct(Punct::Comma) {
                            break;
                        }
                    }
                }
                self.expect_punct(Punct::RBrace)?;
                let id = self.arena.next_id();
                let location: Location = start.join(self.span()).into();
                let node = Rc::new(ClassShapePattern {
                    id,
                    location: location.clone(),
                    class_name: name,
                    fields,
                });
                self.arena
                    .add_node(AstNode::Pattern(Pattern::ClassShape(node.clone())), parent);
                return Ok(Pattern::ClassShape(node));
            }
            let id = self.arena.next_id();
            let location: Location = start.join(self.span()).into();
            let node = Rc::new(IdentifierPattern { id, location, name });
            self.arena
                .add_node(AstNode::Pattern(Pattern::Identifier(node.clone())), parent);
            return Ok(Pattern::Identifier(node));
        }
        // Literal pattern: reuse expression parsing for numbers/strings/bool/null.
        let literal = self.parse_unary(parent)?;
        if self.check_operator(Operator::DotDot) {
            self.advance();
            let id = self.arena.next_id();
            let end = if self.starts_expression() {
                Some(self.parse_unary(parent)?)
            } else {
                None
            };
            let location: Location = start.join(self.span()).into();
            let node = Rc::new(RangePattern {
                id,
                location: location.clone(),
                start: Some(literal),
                end,
            });
            self.arena
                .add_node(AstNode::Pattern(Pattern::Range(node.clone())), parent);
            return Ok(Pattern::Range(node));
        }
        let id = self.arena.next_id();
        let location: Location = start.join(self.span()).into();
        let node = Rc::new(LiteralPattern {
            id,
            location: location.clone(),
            literal,
        });
        self.arena
            .add_node(AstNode::Pattern(Pattern::Literal(node.clone())), parent);
        Ok(Pattern::Literal(node))
    }

    // -------------------------------------------------------------
    // Token stream helpers
    // -------------------------------------------------------------

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn span(&self) -> Span {
        self.peek().span
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    fn advance(&mut self) -> &Token {
        let tok = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn check_keyword(&self, kw: Keyword) -> bool {
        matches!(self.peek_kind(), TokenKind::Keyword(k) if *k == kw)
    }

    fn eat_keyword(&mut self, kw: Keyword) -> bool {
        if self.check_keyword(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, kw: Keyword) -> PResult<()> {
        if self.eat_keyword(kw) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("{kw:?}")))
        }
    }

    fn check_punct(&self, p: Punct) -> bool {
        matches!(self.peek_kind(), TokenKind::Punct(x) if *x == p)
    }

    fn eat_punct(&mut self, p: Punct) -> bool {
        if self.check_punct(p) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: Punct) -> PResult<()> {
        if self.eat_punct(p) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("{p:?}")))
        }
    }

    fn check_operator(&self, op: Operator) -> bool {
        matches!(self.peek_kind(), TokenKind::Operator(x) if *x == op)
    }

    fn eat_operator(&mut self, op: Operator) -> bool {
        if self.check_operator(op) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_operator(&mut self, op: Operator) -> PResult<()> {
        if self.eat_operator(op) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("{op:?}")))
        }
    }

    fn check_identifier_text(&self, text: &str) -> bool {
        matches!(self.peek_kind(), TokenKind::Identifier(s) if s == text)
    }

    fn expect_identifier(&mut self) -> PResult<String> {
        match self.peek_kind().clone() {
            TokenKind::Identifier(s) => {
                self.advance();
                Ok(s)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn expect_string(&mut self) -> PResult<String> {
        match self.peek_kind().clone() {
            TokenKind::String(s) => {
                self.advance();
                Ok(s)
            }
            _ => Err(self.unexpected("string literal")),
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        if self.at_eof() {
            return ParseError::UnexpectedEof {
                expected: expected.to_string(),
            };
        }
        ParseError::UnexpectedToken {
            found: format!("{:?}", self.peek_kind()),
            expected: expected.to_string(),
            span: self.span(),
        }
    }
}

fn operator_method_name(name: &str) -> Option<OperatorKind> {
    if let Some(symbol) = name.strip_prefix("operator") {
        return match symbol {
            "+" => Some(OperatorKind::Add),
            "-" => Some(OperatorKind::Sub),
            "*" => Some(OperatorKind::Mul),
            "/" => Some(OperatorKind::Div),
            "%" => Some(OperatorKind::Mod),
            "**" => Some(OperatorKind::Pow),
            "==" => Some(OperatorKind::Eq),
            "!=" => Some(OperatorKind::Ne),
            "<" => Some(OperatorKind::Lt),
            "<=" => Some(OperatorKind::Le),
            ">" => Some(OperatorKind::Gt),
            ">=" => Some(OperatorKind::Ge),
            "[]" => Some(OperatorKind::Index),
            _ => None,
        };
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(src: &str) -> (Arena, Rc<SourceFile>) {
        let tokens = Lexer::new(src).tokenize().unwrap();
        Parser::new(&tokens, "test.ember")
            .parse_source_file()
            .unwrap()
    }

    #[test]
    fn parses_empty_source_file() {
        let (_, file) = parse("");
        assert!(file.statements.is_empty());
    }

    #[test]
    fn parses_let_binding() {
        let (_, file) = parse("let x = 10;");
        assert_eq!(file.statements.len(), 1);
    }

    #[test]
    fn parses_closure_capture_scenario() {
        let src = "export let run = () => { let x = 10; let f = () => x + 1; f() };";
        let (_, file) = parse(src);
        assert_eq!(file.statements.len(), 1);
    }

    #[test]
    fn bitwise_and_binds_tighter_than_equality() {
        // a & b == c  =>  a & (b == c)
        let (_, file) = parse("let r = a & b == c;");
        let Statement::VariableDecl(decl) = &file.statements[0] else {
            panic!("expected variable decl");
        };
        let Some(Expression::Binary(bin)) = &decl.value else {
            panic!("expected binary expression");
        };
        assert_eq!(bin.operator, OperatorKind::BitAnd);
        assert!(matches!(bin.right, Expression::Binary(_)));
    }

    #[test]
    fn parses_class_with_super_and_method() {
        let src = "class A { speak(): i32 { 1 } } class B extends A { speak(): i32 { 2 } }";
        let (_, file) = parse(src);
        assert_eq!(file.statements.len(), 2);
    }

    #[test]
    fn parses_match_expression() {
        let src = "export let run = () => match (Color.Green) { case Color.Red: 1 case Color.Green: 2 };";
        let (_, _file) = parse(src);
    }

    #[test]
    fn misplaced_import_after_declaration_is_rejected() {
        let tokens = Lexer::new("class A {} import { x } from \"m\";")
            .tokenize()
            .unwrap();
        let err = Parser::new(&tokens, "t.ember").parse_source_file();
        assert!(matches!(err, Err(ParseError::MisplacedImport { .. })));
    }

    #[test]
    fn or_pattern_with_mismatched_bindings_is_rejected() {
        let src = "export let run = () => match (x) { case A { n } | B { m }: n };";
        let tokens = Lexer::new(src).tokenize().unwrap();
        let err = Parser::new(&tokens, "t.ember").parse_source_file();
        assert!(matches!(
            err,
            Err(ParseError::OrPatternBindingMismatch { .. })
        ));
    }
}
