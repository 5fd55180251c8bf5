//! Type expressions

use super::{Expression, QualifiedName};
use crate::span::FileRange;
use crate::types::{FloatKind, NativeKind};

#[derive(Debug, Clone, PartialEq)]
pub struct TypeExpr {
    pub kind: TypeExprKind,
    pub range: FileRange,
}

impl TypeExpr {
    pub fn new(kind: TypeExprKind, range: FileRange) -> Self {
        Self { kind, range }
    }
}

/// Owner written inside a mark type, e.g. `mark:[u8, heap]`
#[derive(Debug, Clone, PartialEq)]
pub enum MarkOwnerSpec {
    Anonymous,
    Heap,
    Type(Box<TypeExpr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeExprKind {
    /// `i<bits>`
    Integer(u32),
    /// `u<bits>`
    Unsigned(u32),
    Float(FloatKind),
    Bool,
    Char,
    Void,
    /// `str`
    StringSlice,
    Native(NativeKind),
    Named(QualifiedName),
    Mark {
        subtype: Box<TypeExpr>,
        is_variable: bool,
        owner: MarkOwnerSpec,
        is_nullable: bool,
        is_slice: bool,
    },
    Reference {
        subtype: Box<TypeExpr>,
        is_variable: bool,
    },
    /// Length is a prerun expression
    Array {
        element: Box<TypeExpr>,
        length: Box<Expression>,
    },
    Vector {
        element: Box<TypeExpr>,
        count: u32,
        is_scalable: bool,
    },
    Tuple {
        members: Vec<TypeExpr>,
        is_packed: bool,
    },
    Function {
        return_type: Box<TypeExpr>,
        args: Vec<TypeExpr>,
        is_variadic: bool,
    },
    Future {
        subtype: Box<TypeExpr>,
        is_packed: bool,
    },
    Maybe(Box<TypeExpr>),
    /// `type:[T]`, the type of type values
    Typed(Box<TypeExpr>),
}
