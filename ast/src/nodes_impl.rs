//! Convenience accessors on AST node structs, kept separate from the data
//! definitions in `nodes.rs`.

use crate::nodes::{
    ClassDeclaration, Declaration, EnumDeclaration, FunctionDeclaration, InterfaceDeclaration,
    MixinDeclaration, OperatorKind,
};

impl ClassDeclaration {
    #[must_use]
    pub fn name(&self) -> String {
        self.name.clone()
    }
}

impl InterfaceDeclaration {
    #[must_use]
    pub fn name(&self) -> String {
        self.name.clone()
    }
}

impl MixinDeclaration {
    #[must_use]
    pub fn name(&self) -> String {
        self.name.clone()
    }
}

impl FunctionDeclaration {
    #[must_use]
    pub fn name(&self) -> String {
        self.name.clone()
    }
}

impl EnumDeclaration {
    #[must_use]
    pub fn name(&self) -> String {
        self.name.clone()
    }
}

impl Declaration {
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Declaration::Class(d) => d.name(),
            Declaration::Interface(d) => d.name(),
            Declaration::Mixin(d) => d.name(),
            Declaration::Function(d) => d.name(),
            Declaration::DeclareFunction(d) => d.name.clone(),
            Declaration::TypeAlias(d) => d.name.clone(),
            Declaration::Symbol(d) => d.name.clone(),
            Declaration::Enum(d) => d.name(),
        }
    }
}

impl OperatorKind {
    /// The method name operator overloading resolves to, per the class of
    /// the left-hand operand (or the indexed object, for `Index`).
    #[must_use]
    pub fn method_name(self) -> &'static str {
        match self {
            OperatorKind::Add => "operator+",
            OperatorKind::Sub => "operator-",
            OperatorKind::Mul => "operator*",
            OperatorKind::Div => "operator/",
            OperatorKind::Mod => "operator%",
            OperatorKind::Pow => "operator**",
            OperatorKind::Eq => "operator==",
            OperatorKind::Ne => "operator!=",
            OperatorKind::Lt => "operator<",
            OperatorKind::Le => "operator<=",
            OperatorKind::Gt => "operator>",
            OperatorKind::Ge => "operator>=",
            OperatorKind::And => "operator&&",
            OperatorKind::Or => "operator||",
            OperatorKind::BitAnd => "operator&",
            OperatorKind::BitOr => "operator|",
            OperatorKind::BitXor => "operator^",
            OperatorKind::Shl => "operator<<",
            OperatorKind::Shr => "operator>>",
            OperatorKind::Index => "operator[]",
        }
    }

    /// True for operators forbidden on floating-point operands (§4.5.2:
    /// "bitwise operators forbid floats").
    #[must_use]
    pub fn is_bitwise(self) -> bool {
        matches!(
            self,
            OperatorKind::BitAnd
                | OperatorKind::BitOr
                | OperatorKind::BitXor
                | OperatorKind::Shl
                | OperatorKind::Shr
        )
    }
}
