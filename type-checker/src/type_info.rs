//! Type representation used throughout the checker.
//!
//! Primitives are structural; classes, interfaces, mixins and enums are
//! nominal (identity by declaration name — Ember has no structural subtyping
//! between user-declared nominal types); tuples, records and unions are
//! structural and compared by shape.

use core::fmt;
use std::fmt::{Display, Formatter};

use rustc_hash::FxHashMap;

#[derive(Debug, Eq, PartialEq, Clone, Copy, Hash)]
pub enum NumberType {
    I32,
    I64,
    F32,
    F64,
}

impl NumberType {
    pub const ALL: &'static [NumberType] = &[
        NumberType::I32,
        NumberType::I64,
        NumberType::F32,
        NumberType::F64,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            NumberType::I32 => "i32",
            NumberType::I64 => "i64",
            NumberType::F32 => "f32",
            NumberType::F64 => "f64",
        }
    }

    #[must_use]
    pub const fn is_float(self) -> bool {
        matches!(self, NumberType::F32 | NumberType::F64)
    }
}

impl std::str::FromStr for NumberType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|nt| nt.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or(())
    }
}

/// The shape of a type. Compound kinds (`Tuple`/`Record`/`Union`) hash and
/// compare structurally; `Class`/`Interface`/`Mixin`/`Enum` compare by name
/// plus type arguments (nominal identity).
#[derive(Debug, Clone, PartialEq)]
pub enum TypeInfoKind {
    Void,
    Bool,
    String,
    Null,
    Never,
    Number(NumberType),
    Array(Box<TypeInfo>),
    Tuple(Vec<TypeInfo>),
    Record(Vec<(String, TypeInfo)>),
    Union(Vec<TypeInfo>),
    Function(Vec<TypeInfo>, Box<TypeInfo>),
    Class(String, Vec<TypeInfo>),
    Interface(String, Vec<TypeInfo>),
    Mixin(String),
    Enum(String),
    Generic(String),
    Range,
}

impl Display for TypeInfoKind {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            TypeInfoKind::Void => write!(f, "void"),
            TypeInfoKind::Bool => write!(f, "bool"),
            TypeInfoKind::String => write!(f, "string"),
            TypeInfoKind::Null => write!(f, "null"),
            TypeInfoKind::Never => write!(f, "never"),
            TypeInfoKind::Number(n) => write!(f, "{}", n.as_str()),
            TypeInfoKind::Array(elem) => write!(f, "[{elem}]"),
            TypeInfoKind::Tuple(elems) => {
                write!(f, "(")?;
                for (i, e) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, ")")
            }
            TypeInfoKind::Record(fields) => {
                write!(f, "{{")?;
                for (i, (name, ty)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {ty}")?;
                }
                write!(f, "}}")
            }
            TypeInfoKind::Union(members) => {
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{m}")?;
                }
                Ok(())
            }
            TypeInfoKind::Function(params, ret) => {
                write!(f, "(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ") -> {ret}")
            }
            TypeInfoKind::Class(name, args) | TypeInfoKind::Interface(name, args) => {
                write!(f, "{name}")?;
                if !args.is_empty() {
                    write!(f, "<")?;
                    for (i, a) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{a}")?;
                    }
                    write!(f, ">")?;
                }
                Ok(())
            }
            TypeInfoKind::Mixin(name) | TypeInfoKind::Enum(name) => write!(f, "{name}"),
            TypeInfoKind::Generic(name) => write!(f, "{name}'"),
            TypeInfoKind::Range => write!(f, "range"),
        }
    }
}

impl TypeInfoKind {
    #[must_use]
    pub fn is_number(&self) -> bool {
        matches!(self, TypeInfoKind::Number(_))
    }

    #[must_use]
    pub fn is_float(&self) -> bool {
        matches!(self, TypeInfoKind::Number(n) if n.is_float())
    }

    /// Non-numeric primitive builtin names (case-insensitive).
    pub const NON_NUMERIC_BUILTINS: &'static [(&'static str, TypeInfoKind)] = &[
        ("void", TypeInfoKind::Void),
        ("bool", TypeInfoKind::Bool),
        ("string", TypeInfoKind::String),
        ("null", TypeInfoKind::Null),
    ];

    #[must_use]
    pub fn as_builtin_str(&self) -> Option<&'static str> {
        match self {
            TypeInfoKind::Void => Some("void"),
            TypeInfoKind::Bool => Some("bool"),
            TypeInfoKind::String => Some("string"),
            TypeInfoKind::Null => Some("null"),
            TypeInfoKind::Number(n) => Some(n.as_str()),
            _ => None,
        }
    }

    /// Structural hash key for `Tuple`/`Record`/`Union`, used by [`TypeInfo::structural_key`]
    /// to dedup equivalent compound types without allocating a fresh nominal slot per use.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            TypeInfoKind::Tuple(_) | TypeInfoKind::Record(_) | TypeInfoKind::Union(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeInfo {
    pub kind: TypeInfoKind,
}

impl TypeInfo {
    #[must_use]
    pub fn new(kind: TypeInfoKind) -> Self {
        TypeInfo { kind }
    }

    #[must_use]
    pub fn void() -> Self {
        TypeInfo::new(TypeInfoKind::Void)
    }

    #[must_use]
    pub fn never() -> Self {
        TypeInfo::new(TypeInfoKind::Never)
    }

    /// Structural equality used for assignability of tuples/records/unions;
    /// nominal types must match by name exactly (no subtyping beyond
    /// declared `extends`/`implements` relationships, checked elsewhere).
    #[must_use]
    pub fn structurally_eq(&self, other: &TypeInfo) -> bool {
        match (&self.kind, &other.kind) {
            (TypeInfoKind::Tuple(a), TypeInfoKind::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.structurally_eq(y))
            }
            (TypeInfoKind::Record(a), TypeInfoKind::Record(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(name, ty)| {
                        b.iter()
                            .any(|(n2, t2)| n2 == name && ty.structurally_eq(t2))
                    })
            }
            (TypeInfoKind::Union(a), TypeInfoKind::Union(b)) => {
                a.len() == b.len() && a.iter().all(|x| b.iter().any(|y| x.structurally_eq(y)))
            }
            (TypeInfoKind::Function(pa, ra), TypeInfoKind::Function(pb, rb)) => {
                pa.len() == pb.len()
                    && pa.iter().zip(pb).all(|(x, y)| x.structurally_eq(y))
                    && ra.structurally_eq(rb)
            }
            (TypeInfoKind::Array(a), TypeInfoKind::Array(b)) => a.structurally_eq(b),
            (TypeInfoKind::Class(na, aa), TypeInfoKind::Class(nb, ab))
            | (TypeInfoKind::Interface(na, aa), TypeInfoKind::Interface(nb, ab)) => {
                na == nb
                    && aa.len() == ab.len()
                    && aa.iter().zip(ab).all(|(x, y)| x.structurally_eq(y))
            }
            _ => self.kind == other.kind,
        }
    }
}

impl Display for TypeInfo {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

/// Cache of structurally-deduped compound types, keyed by their `Display`
/// rendering — two tuples/records/unions with the same shape share one
/// cache slot so downstream passes can compare by key instead of deep-diffing.
#[derive(Default)]
pub struct StructuralTypeCache {
    cache: FxHashMap<String, TypeInfo>,
}

impl StructuralTypeCache {
    pub fn intern(&mut self, ty: TypeInfo) -> TypeInfo {
        if !ty.kind.is_structural() {
            return ty;
        }
        let key = ty.to_string();
        self.cache.entry(key).or_insert(ty).clone()
    }
}
