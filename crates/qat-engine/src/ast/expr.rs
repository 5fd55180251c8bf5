//! Expressions

use super::{QualifiedName, TypeExpr};
use crate::span::{FileRange, Identifier};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExprKind,
    pub range: FileRange,
}

impl Expression {
    pub fn new(kind: ExprKind, range: FileRange) -> Self {
        Self { kind, range }
    }

    /// Whether the expression takes its type from the surrounding context
    /// rather than carrying one of its own.
    pub fn needs_inference(&self) -> bool {
        match &self.kind {
            ExprKind::IntegerLiteral { suffix, .. } | ExprKind::FloatLiteral { suffix, .. } => {
                suffix.is_none()
            }
            ExprKind::NullPointer | ExprKind::Default | ExprKind::None => true,
            _ => false,
        }
    }

    /// Whether the expression is an explicit `'copy` or `'move`
    pub fn is_copy_or_move(&self) -> bool {
        matches!(self.kind, ExprKind::Copy(_) | ExprKind::Move(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    IntegerLiteral {
        value: u128,
        suffix: Option<TypeExpr>,
    },
    FloatLiteral {
        value: f64,
        suffix: Option<TypeExpr>,
    },
    BooleanLiteral(bool),
    CharLiteral(char),
    StringLiteral(String),
    /// `null`, a mark whose type comes from context
    NullPointer,
    /// `default`, the default value of the inferred type
    Default,
    /// `none`, an empty maybe value
    None,
    /// `some(value)`
    Some(Box<Expression>),
    TupleLiteral(Vec<Expression>),
    ArrayLiteral(Vec<Expression>),
    Entity(QualifiedName),
    /// `''`, the instance inside a member function
    SelfInstance,
    /// `''name`, a field or method of the instance
    SelfMember(Identifier),
    Member {
        instance: Box<Expression>,
        name: Identifier,
    },
    Index {
        instance: Box<Expression>,
        index: Box<Expression>,
    },
    Unary {
        op: UnaryOperator,
        operand: Box<Expression>,
    },
    /// `@value`, reads through a mark
    Dereference(Box<Expression>),
    /// `'mark value`, address of an addressable value as a mark
    AddressOf {
        place: Box<Expression>,
        is_variable: bool,
    },
    Copy(Box<Expression>),
    Move(Box<Expression>),
    Binary {
        op: BinaryOperator,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    Call {
        callee: Box<Expression>,
        args: Vec<Expression>,
    },
    MethodCall {
        instance: Box<Expression>,
        name: Identifier,
        args: Vec<Expression>,
        is_variation: bool,
    },
    /// `T(args)`; a call through `T::from` lands here as well
    ConstructorCall {
        ty: TypeExpr,
        args: Vec<Expression>,
    },
    /// `T from { a = x, b = y }` or positional `T from { x, y }`
    PlainInitializer {
        ty: TypeExpr,
        fields: Option<Vec<Identifier>>,
        values: Vec<Expression>,
    },
    /// `T::Variant` or `T::Variant(value)` for mix and choice types
    VariantInitializer {
        ty: TypeExpr,
        variant: Identifier,
        value: Option<Box<Expression>>,
    },
    HeapGet {
        ty: TypeExpr,
        count: Option<Box<Expression>>,
    },
    HeapPut(Box<Expression>),
    HeapGrow {
        ty: TypeExpr,
        pointer: Box<Expression>,
        count: Box<Expression>,
    },
    /// `value 'to T`
    Cast {
        value: Box<Expression>,
        target: TypeExpr,
    },
    Await(Box<Expression>),
    InlineAssembly {
        template: String,
        constraints: String,
        args: Vec<Expression>,
        return_type: TypeExpr,
        is_volatile: bool,
    },
    If {
        condition: Box<Expression>,
        then_value: Box<Expression>,
        else_value: Box<Expression>,
    },
    SizeOf(TypeExpr),
    /// `type'(T)`, a type used as a compile-time value
    TypeValue(TypeExpr),
    MetaTodo(Option<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Rem => "%",
            BinaryOperator::BitAnd => "&",
            BinaryOperator::BitOr => "|",
            BinaryOperator::BitXor => "^",
            BinaryOperator::Shl => "<<",
            BinaryOperator::Shr => ">>",
            BinaryOperator::Eq => "==",
            BinaryOperator::NotEq => "!=",
            BinaryOperator::Lt => "<",
            BinaryOperator::LtEq => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::GtEq => ">=",
            BinaryOperator::And => "&&",
            BinaryOperator::Or => "||",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOperator::Eq
                | BinaryOperator::NotEq
                | BinaryOperator::Lt
                | BinaryOperator::LtEq
                | BinaryOperator::Gt
                | BinaryOperator::GtEq
        )
    }

    pub fn is_equality(self) -> bool {
        matches!(self, BinaryOperator::Eq | BinaryOperator::NotEq)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOperator::And | BinaryOperator::Or)
    }

    pub fn is_bitwise(self) -> bool {
        matches!(
            self,
            BinaryOperator::BitAnd
                | BinaryOperator::BitOr
                | BinaryOperator::BitXor
                | BinaryOperator::Shl
                | BinaryOperator::Shr
        )
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    Negate,
    Not,
    BitNot,
}

impl UnaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOperator::Negate => "-",
            UnaryOperator::Not => "!",
            UnaryOperator::BitNot => "~",
        }
    }
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
