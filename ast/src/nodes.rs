//! AST node definitions.
//!
//! Nodes are plain data: `~80` variants grouped into expressions, statements,
//! declarations, patterns and type annotations. Every node carries a `u32` id
//! assigned at parse time and a source [`Location`]; nodes are compared by
//! that id, never structurally, so that later side-tables (the semantic
//! context, codegen's per-node bookkeeping) stay valid across the immutable
//! tree.

use core::fmt;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Location {
    pub offset_start: u32,
    pub offset_end: u32,
    pub start_line: u32,
    pub start_column: u32,
}

impl From<crate::token::Span> for Location {
    fn from(span: crate::token::Span) -> Self {
        Location {
            offset_start: span.start,
            offset_end: span.end,
            start_line: span.line,
            start_column: span.column,
        }
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.start_line, self.start_column)
    }
}

macro_rules! ast_node {
    (
        $(#[$outer:meta])*
        $struct_vis:vis struct $name:ident {
            $(
                $(#[$field_attr:meta])*
                $field_vis:vis $field_name:ident : $field_ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Clone, Debug)]
        $struct_vis struct $name {
            pub id: u32,
            pub location: $crate::nodes::Location,
            $(
                $(#[$field_attr])*
                $field_vis $field_name : $field_ty,
            )*
        }
    };
}

macro_rules! ast_nodes {
    ($(
        $(#[$outer:meta])*
        $struct_vis:vis struct $name:ident { $($fields:tt)* }
    )+) => {
        $(
            ast_node! {
                $(#[$outer])*
                $struct_vis struct $name { $($fields)* }
            }
        )+
    };
}

macro_rules! ast_enum {
    (
        $(#[$outer:meta])*
        $enum_vis:vis enum $name:ident {
            $($arm:ident($inner:ty),)*
        }
    ) => {
        $(#[$outer])*
        #[derive(Clone, Debug)]
        $enum_vis enum $name {
            $($arm(Rc<$inner>),)*
        }

        impl $name {
            #[must_use]
            pub fn id(&self) -> u32 {
                match self {
                    $($name::$arm(n) => n.id,)*
                }
            }

            #[must_use]
            pub fn location(&self) -> Location {
                match self {
                    $($name::$arm(n) => n.location.clone(),)*
                }
            }
        }
    };
}

// ---------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum OperatorKind {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Index,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum UnaryOperatorKind {
    Not,
    Neg,
}

// ---------------------------------------------------------------------
// Type annotations
// ---------------------------------------------------------------------

ast_nodes! {
    pub struct NamedType { pub name: String }
    pub struct GenericTypeAnnotation { pub name: String, pub args: Vec<TypeAnnotation> }
    pub struct FunctionTypeAnnotation { pub params: Vec<TypeAnnotation>, pub return_type: Box<TypeAnnotation> }
    pub struct TupleTypeAnnotation { pub elements: Vec<TypeAnnotation> }
    pub struct RecordTypeAnnotation { pub fields: Vec<(String, TypeAnnotation)> }
    pub struct UnionTypeAnnotation { pub members: Vec<TypeAnnotation> }
}

ast_enum! {
    pub enum TypeAnnotation {
        Named(NamedType),
        Generic(GenericTypeAnnotation),
        Function(FunctionTypeAnnotation),
        Tuple(TupleTypeAnnotation),
        Record(RecordTypeAnnotation),
        Union(UnionTypeAnnotation),
    }
}

#[derive(Clone, Debug)]
pub struct TypeParam {
    pub name: String,
    pub bound: Option<TypeAnnotation>,
}

// ---------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------

ast_nodes! {
    pub struct NumberLiteral { pub text: String, pub is_float: bool }
    pub struct StringLiteral { pub value: String }
    pub struct BoolLiteral { pub value: bool }
    pub struct NullLiteral {}
    pub struct TemplateLiteral { pub quasis: Vec<String>, pub expressions: Vec<Expression> }
    pub struct Identifier { pub name: String }
    pub struct BinaryExpression { pub left: Expression, pub operator: OperatorKind, pub right: Expression }
    pub struct UnaryExpression { pub operator: UnaryOperatorKind, pub operand: Expression }
    pub struct CallExpression { pub callee: Expression, pub type_args: Vec<TypeAnnotation>, pub arguments: Vec<Expression> }
    pub struct NewExpression { pub class_name: String, pub type_args: Vec<TypeAnnotation>, pub arguments: Vec<Expression> }
    pub struct MemberExpression { pub object: Expression, pub property: String }
    pub struct IndexExpression { pub object: Expression, pub index: Expression }
    pub struct RecordLiteral { pub fields: Vec<(String, Expression)> }
    pub struct TupleLiteral { pub elements: Vec<Expression> }
    pub struct ArrayLiteral { pub elements: Vec<Expression> }
    pub struct FunctionExpression { pub params: Vec<Param>, pub return_type: Option<TypeAnnotation>, pub body: FunctionBody }
    pub struct IfExpression { pub condition: Expression, pub then_branch: Expression, pub else_branch: Expression }
    pub struct MatchExpression { pub scrutinee: Expression, pub arms: Vec<MatchArm> }
    pub struct ThrowExpression { pub value: Expression }
    pub struct SuperExpression { pub arguments: Vec<Expression> }
    pub struct ThisExpression {}
    pub struct CastExpression { pub expr: Expression, pub target: TypeAnnotation }
    pub struct TypeTestExpression { pub expr: Expression, pub target: TypeAnnotation }
    pub struct RangeExpression { pub start: Option<Expression>, pub end: Option<Expression> }
    pub struct SpreadExpression { pub expr: Expression }
    pub struct SymbolRefExpression { pub name: String }
    pub struct WildcardExpression {}
}

ast_enum! {
    pub enum Expression {
        Number(NumberLiteral),
        String(StringLiteral),
        Bool(BoolLiteral),
        Null(NullLiteral),
        Template(TemplateLiteral),
        Identifier(Identifier),
        Binary(BinaryExpression),
        Unary(UnaryExpression),
        Call(CallExpression),
        New(NewExpression),
        Member(MemberExpression),
        Index(IndexExpression),
        Record(RecordLiteral),
        Tuple(TupleLiteral),
        Array(ArrayLiteral),
        Function(FunctionExpression),
        If(IfExpression),
        Match(MatchExpression),
        Throw(ThrowExpression),
        Super(SuperExpression),
        This(ThisExpression),
        Cast(CastExpression),
        TypeTest(TypeTestExpression),
        Range(RangeExpression),
        Spread(SpreadExpression),
        SymbolRef(SymbolRefExpression),
        Wildcard(WildcardExpression),
    }
}

#[derive(Clone, Debug)]
pub struct Param {
    pub name: String,
    pub type_annotation: TypeAnnotation,
}

#[derive(Clone, Debug)]
pub enum FunctionBody {
    Expr(Box<Expression>),
    Block(Rc<Block>),
}

#[derive(Clone, Debug)]
pub struct MatchArm {
    pub pattern: Pattern,
    pub guard: Option<Expression>,
    pub body: Expression,
}

// ---------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------

ast_nodes! {
    pub struct IdentifierPattern { pub name: String }
    pub struct LiteralPattern { pub literal: Expression }
    pub struct TuplePattern { pub elements: Vec<Pattern> }
    pub struct RecordPattern { pub fields: Vec<(String, Pattern)> }
    pub struct ClassShapePattern { pub class_name: String, pub fields: Vec<(String, Pattern)> }
    pub struct WildcardPattern {}
    pub struct OrPattern { pub left: Pattern, pub right: Pattern }
    pub struct AndPattern { pub left: Pattern, pub right: Pattern }
    pub struct AsPattern { pub pattern: Pattern, pub name: String }
    pub struct RangePattern { pub start: Option<Expression>, pub end: Option<Expression> }
}

ast_enum! {
    pub enum Pattern {
        Identifier(IdentifierPattern),
        Literal(LiteralPattern),
        Tuple(TuplePattern),
        Record(RecordPattern),
        ClassShape(ClassShapePattern),
        Wildcard(WildcardPattern),
        Or(OrPattern),
        And(AndPattern),
        As(AsPattern),
        Range(RangePattern),
    }
}

// ---------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------

ast_nodes! {
    pub struct ExpressionStatement { pub expr: Expression }
    pub struct VariableDeclStatement { pub name: String, pub mutable: bool, pub type_annotation: Option<TypeAnnotation>, pub value: Option<Expression> }
    pub struct AssignmentStatement { pub target: Expression, pub value: Expression }
    pub struct Block { pub statements: Vec<Statement> }
    pub struct IfStatement { pub condition: Expression, pub then_branch: Rc<Block>, pub else_branch: Option<Rc<Block>> }
    pub struct ForStatement { pub init: Option<Box<Statement>>, pub condition: Option<Expression>, pub update: Option<Box<Statement>>, pub body: Rc<Block> }
    pub struct WhileStatement { pub condition: Expression, pub body: Rc<Block> }
    pub struct ReturnStatement { pub value: Option<Expression> }
    pub struct ImportStatement { pub names: Vec<String>, pub spec: String }
    pub struct ExportStatement { pub declaration: Declaration }
    pub struct DeclarationStatement { pub declaration: Declaration }
}

ast_enum! {
    pub enum Statement {
        Expression(ExpressionStatement),
        VariableDecl(VariableDeclStatement),
        Assignment(AssignmentStatement),
        Block(Block),
        If(IfStatement),
        For(ForStatement),
        While(WhileStatement),
        Return(ReturnStatement),
        Import(ImportStatement),
        Export(ExportStatement),
        Declaration(DeclarationStatement),
    }
}

// ---------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Decorator {
    pub name: String,
    pub args: Vec<Expression>,
}

#[derive(Clone, Debug)]
pub struct FieldDecl {
    pub name: String,
    pub type_annotation: TypeAnnotation,
    pub mutable: bool,
}

#[derive(Clone, Debug)]
pub struct MethodDecl {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub params: Vec<Param>,
    pub return_type: Option<TypeAnnotation>,
    pub body: FunctionBody,
    pub is_final: bool,
    pub decorators: Vec<Decorator>,
    pub operator: Option<OperatorKind>,
}

#[derive(Clone, Debug)]
pub struct MethodSignature {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Option<TypeAnnotation>,
}

#[derive(Clone, Debug)]
pub struct FieldSignature {
    pub name: String,
    pub type_annotation: TypeAnnotation,
}

#[derive(Clone, Debug)]
pub struct ConstructorDecl {
    pub params: Vec<Param>,
    pub super_args: Option<Vec<Expression>>,
    pub body: Vec<Statement>,
}

ast_nodes! {
    pub struct ClassDeclaration {
        pub name: String,
        pub type_params: Vec<TypeParam>,
        pub super_class: Option<(String, Vec<TypeAnnotation>)>,
        pub implements: Vec<(String, Vec<TypeAnnotation>)>,
        pub fields: Vec<FieldDecl>,
        pub methods: Vec<MethodDecl>,
        pub constructor: Option<ConstructorDecl>,
        pub is_final: bool,
        pub decorators: Vec<Decorator>,
    }
    pub struct InterfaceDeclaration {
        pub name: String,
        pub type_params: Vec<TypeParam>,
        pub parent: Option<String>,
        pub methods: Vec<MethodSignature>,
        pub fields: Vec<FieldSignature>,
    }
    pub struct MixinDeclaration {
        pub name: String,
        pub fields: Vec<FieldDecl>,
        pub methods: Vec<MethodDecl>,
    }
    pub struct FunctionDeclaration {
        pub name: String,
        pub type_params: Vec<TypeParam>,
        pub params: Vec<Param>,
        pub return_type: Option<TypeAnnotation>,
        pub body: FunctionBody,
        pub exported: bool,
    }
    pub struct DeclareFunctionDeclaration {
        pub name: String,
        pub params: Vec<Param>,
        pub return_type: Option<TypeAnnotation>,
    }
    pub struct TypeAliasDeclaration {
        pub name: String,
        pub type_params: Vec<TypeParam>,
        pub target: TypeAnnotation,
        pub is_distinct: bool,
    }
    pub struct SymbolDeclaration { pub name: String }
    pub struct EnumDeclaration { pub name: String, pub variants: Vec<String> }
}

ast_enum! {
    pub enum Declaration {
        Class(ClassDeclaration),
        Interface(InterfaceDeclaration),
        Mixin(MixinDeclaration),
        Function(FunctionDeclaration),
        DeclareFunction(DeclareFunctionDeclaration),
        TypeAlias(TypeAliasDeclaration),
        Symbol(SymbolDeclaration),
        Enum(EnumDeclaration),
    }
}

// ---------------------------------------------------------------------
// Source file
// ---------------------------------------------------------------------

ast_nodes! {
    pub struct SourceFile { pub path: String, pub statements: Vec<Statement> }
}

ast_enum! {
    pub enum Ast {
        SourceFile(SourceFile),
    }
}

#[derive(Clone, Debug)]
pub enum AstNode {
    Ast(Ast),
    Expression(Expression),
    Statement(Statement),
    Declaration(Declaration),
    Pattern(Pattern),
    Type(TypeAnnotation),
}

impl AstNode {
    #[must_use]
    pub fn id(&self) -> u32 {
        match self {
            AstNode::Ast(n) => n.id(),
            AstNode::Expression(n) => n.id(),
            AstNode::Statement(n) => n.id(),
            AstNode::Declaration(n) => n.id(),
            AstNode::Pattern(n) => n.id(),
            AstNode::Type(n) => n.id(),
        }
    }

    #[must_use]
    pub fn location(&self) -> Location {
        match self {
            AstNode::Ast(n) => n.location(),
            AstNode::Expression(n) => n.location(),
            AstNode::Statement(n) => n.location(),
            AstNode::Declaration(n) => n.location(),
            AstNode::Pattern(n) => n.location(),
            AstNode::Type(n) => n.location(),
        }
    }
}
