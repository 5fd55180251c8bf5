//! Sentences (statements)

use super::{BinaryOperator, Expression, TypeExpr};
use crate::span::{FileRange, Identifier};

#[derive(Debug, Clone, PartialEq)]
pub struct Sentence {
    pub kind: SentenceKind,
    pub range: FileRange,
}

impl Sentence {
    pub fn new(kind: SentenceKind, range: FileRange) -> Self {
        Self { kind, range }
    }
}

/// `new [var] [ref] name [: T] [= value]`
#[derive(Debug, Clone, PartialEq)]
pub struct LocalDeclaration {
    pub name: Identifier,
    pub ty: Option<TypeExpr>,
    pub value: Option<Expression>,
    /// For value declarations: the local can be reassigned or moved out of.
    /// For reference declarations: the referred value can be changed.
    pub is_variable: bool,
    pub is_reference: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfBranch {
    pub condition: Expression,
    pub body: Vec<Sentence>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SentenceKind {
    LocalDeclaration(LocalDeclaration),
    Assignment {
        lhs: Expression,
        rhs: Expression,
    },
    /// `lhs op= rhs`
    OperatorAssignment {
        op: BinaryOperator,
        lhs: Expression,
        rhs: Expression,
    },
    Expression(Expression),
    If {
        branches: Vec<IfBranch>,
        otherwise: Option<Vec<Sentence>>,
    },
    LoopWhile {
        condition: Expression,
        body: Vec<Sentence>,
        tag: Option<Identifier>,
    },
    LoopTimes {
        count: Expression,
        index: Option<Identifier>,
        body: Vec<Sentence>,
        tag: Option<Identifier>,
    },
    LoopInfinite {
        body: Vec<Sentence>,
        tag: Option<Identifier>,
    },
    LoopIn {
        iterable: Expression,
        item: Identifier,
        index: Option<Identifier>,
        body: Vec<Sentence>,
        tag: Option<Identifier>,
    },
    Break(Option<Identifier>),
    Continue(Option<Identifier>),
    Give(Option<Expression>),
    Block(Vec<Sentence>),
    MetaTodo(Option<String>),
}
