//! Syntax tree builders shared by the integration tests
//!
//! The engine consumes trees produced by the front end, so tests build them
//! directly. Every node gets its own range, which keeps diagnostic labels
//! distinguishable.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};

use qat_engine::ast::*;
use qat_engine::types::NativeKind;
use qat_engine::{
    compile, CompileFailure, CompileOptions, CompileOutput, FileId, FileRange, Identifier,
};

static NEXT_OFFSET: AtomicU32 = AtomicU32::new(0);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn range() -> FileRange {
    let start = NEXT_OFFSET.fetch_add(4, Ordering::Relaxed);
    FileRange::new(FileId(0), start, start + 3)
}

pub fn ident(name: &str) -> Identifier {
    Identifier::new(name, range())
}

/// `a::b::c`
pub fn path(name: &str) -> QualifiedName {
    QualifiedName::new(name.split("::").map(ident).collect(), range())
}

// ============================================================================
// Types
// ============================================================================

pub fn ty(kind: TypeExprKind) -> TypeExpr {
    TypeExpr::new(kind, range())
}

pub fn int_ty(bits: u32) -> TypeExpr {
    ty(TypeExprKind::Integer(bits))
}

pub fn uint_ty(bits: u32) -> TypeExpr {
    ty(TypeExprKind::Unsigned(bits))
}

pub fn bool_ty() -> TypeExpr {
    ty(TypeExprKind::Bool)
}

pub fn str_ty() -> TypeExpr {
    ty(TypeExprKind::StringSlice)
}

pub fn named_ty(name: &str) -> TypeExpr {
    ty(TypeExprKind::Named(path(name)))
}

pub fn reference_ty(subtype: TypeExpr, is_variable: bool) -> TypeExpr {
    ty(TypeExprKind::Reference {
        subtype: Box::new(subtype),
        is_variable,
    })
}

pub fn maybe_ty(subtype: TypeExpr) -> TypeExpr {
    ty(TypeExprKind::Maybe(Box::new(subtype)))
}

pub fn array_ty(element: TypeExpr, length: u128) -> TypeExpr {
    ty(TypeExprKind::Array {
        element: Box::new(element),
        length: Box::new(int(length)),
    })
}

/// `multi:[T]`, a mark carrying its length
pub fn slice_ty(subtype: TypeExpr) -> TypeExpr {
    ty(TypeExprKind::Mark {
        subtype: Box::new(subtype),
        is_variable: false,
        owner: MarkOwnerSpec::Anonymous,
        is_nullable: false,
        is_slice: true,
    })
}

pub fn vector_ty(element: TypeExpr, count: u32) -> TypeExpr {
    ty(TypeExprKind::Vector {
        element: Box::new(element),
        count,
        is_scalable: false,
    })
}

pub fn cstring_ty() -> TypeExpr {
    ty(TypeExprKind::Native(NativeKind::CString))
}

// ============================================================================
// Expressions
// ============================================================================

pub fn expr(kind: ExprKind) -> Expression {
    Expression::new(kind, range())
}

pub fn int(value: u128) -> Expression {
    expr(ExprKind::IntegerLiteral { value, suffix: None })
}

pub fn boolean(value: bool) -> Expression {
    expr(ExprKind::BooleanLiteral(value))
}

pub fn string(value: &str) -> Expression {
    expr(ExprKind::StringLiteral(value.to_string()))
}

pub fn entity(name: &str) -> Expression {
    expr(ExprKind::Entity(path(name)))
}

pub fn binary(op: BinaryOperator, lhs: Expression, rhs: Expression) -> Expression {
    expr(ExprKind::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    })
}

pub fn construct(type_name: &str, args: Vec<Expression>) -> Expression {
    expr(ExprKind::ConstructorCall {
        ty: named_ty(type_name),
        args,
    })
}

pub fn plain(type_name: &str, values: Vec<Expression>) -> Expression {
    expr(ExprKind::PlainInitializer {
        ty: named_ty(type_name),
        fields: None,
        values,
    })
}

pub fn move_out(value: Expression) -> Expression {
    expr(ExprKind::Move(Box::new(value)))
}

pub fn cast(value: Expression, target: TypeExpr) -> Expression {
    expr(ExprKind::Cast {
        value: Box::new(value),
        target,
    })
}

pub fn call(name: &str, args: Vec<Expression>) -> Expression {
    expr(ExprKind::Call {
        callee: Box::new(entity(name)),
        args,
    })
}

/// `T::Variant` or `T::Variant(value)`
pub fn variant(type_name: &str, name: &str, value: Option<Expression>) -> Expression {
    expr(ExprKind::VariantInitializer {
        ty: named_ty(type_name),
        variant: ident(name),
        value: value.map(Box::new),
    })
}

// ============================================================================
// Sentences
// ============================================================================

pub fn sentence(kind: SentenceKind) -> Sentence {
    Sentence::new(kind, range())
}

pub fn local(
    name: &str,
    ty: Option<TypeExpr>,
    value: Option<Expression>,
    is_variable: bool,
) -> Sentence {
    sentence(SentenceKind::LocalDeclaration(LocalDeclaration {
        name: ident(name),
        ty,
        value,
        is_variable,
        is_reference: false,
    }))
}

pub fn give(value: Option<Expression>) -> Sentence {
    sentence(SentenceKind::Give(value))
}

pub fn todo(message: Option<&str>) -> Sentence {
    sentence(SentenceKind::MetaTodo(message.map(str::to_string)))
}

pub fn eval(value: Expression) -> Sentence {
    sentence(SentenceKind::Expression(value))
}

/// `lhs op= rhs`
pub fn update(op: BinaryOperator, lhs: Expression, rhs: Expression) -> Sentence {
    sentence(SentenceKind::OperatorAssignment { op, lhs, rhs })
}

pub fn loop_while(condition: Expression, body: Vec<Sentence>) -> Sentence {
    sentence(SentenceKind::LoopWhile {
        condition,
        body,
        tag: None,
    })
}

pub fn loop_times(count: Expression, index: Option<&str>, body: Vec<Sentence>) -> Sentence {
    sentence(SentenceKind::LoopTimes {
        count,
        index: index.map(ident),
        body,
        tag: None,
    })
}

pub fn loop_in(iterable: Expression, item: &str, body: Vec<Sentence>) -> Sentence {
    sentence(SentenceKind::LoopIn {
        iterable,
        item: ident(item),
        index: None,
        body,
        tag: None,
    })
}

// ============================================================================
// Declarations
// ============================================================================

pub fn arg(name: &str, ty: TypeExpr) -> Argument {
    Argument {
        name: ident(name),
        ty: Some(ty),
        is_variable: false,
        is_member_arg: false,
        range: range(),
    }
}

/// `''name`, stored straight into the field of the same name
pub fn member_arg(name: &str) -> Argument {
    Argument {
        name: ident(name),
        ty: None,
        is_variable: false,
        is_member_arg: true,
        range: range(),
    }
}

pub fn decl(kind: DeclKind) -> Decl {
    Decl::new(kind, range())
}

pub fn function(
    name: &str,
    args: Vec<Argument>,
    return_type: Option<TypeExpr>,
    body: Vec<Sentence>,
) -> Decl {
    decl(DeclKind::Function(FunctionDecl {
        name: ident(name),
        visibility: VisibilitySpec::Public,
        args,
        return_type,
        is_variadic: false,
        body: Some(body),
    }))
}

pub fn field(name: &str, ty: TypeExpr) -> FieldDecl {
    FieldDecl {
        name: ident(name),
        ty,
        is_variable: true,
        visibility: VisibilitySpec::Public,
    }
}

pub fn member(kind: MemberDeclKind, args: Vec<Argument>, body: Vec<Sentence>) -> MemberDecl {
    MemberDecl {
        kind,
        visibility: VisibilitySpec::Public,
        args,
        return_type: None,
        body,
        range: range(),
    }
}

pub fn structure(name: &str, fields: Vec<FieldDecl>, members: Vec<MemberDecl>) -> Decl {
    decl(DeclKind::Struct(StructDecl {
        name: ident(name),
        visibility: VisibilitySpec::Public,
        fields,
        members,
    }))
}

/// Choice with optional explicit variant values
pub fn choice(name: &str, variants: Vec<(&str, Option<u128>)>) -> Decl {
    decl(DeclKind::Choice(ChoiceDecl {
        name: ident(name),
        visibility: VisibilitySpec::Public,
        variants: variants
            .into_iter()
            .map(|(variant, value)| ChoiceVariantDecl {
                name: ident(variant),
                value: value.map(int),
            })
            .collect(),
        underlying: None,
        default_variant: None,
    }))
}

pub fn prerun_function(
    name: &str,
    args: Vec<Argument>,
    return_type: Option<TypeExpr>,
    body: Vec<Sentence>,
) -> Decl {
    decl(DeclKind::PrerunFunction(PrerunFunctionDecl {
        name: ident(name),
        visibility: VisibilitySpec::Public,
        args,
        return_type,
        body,
    }))
}

pub fn global(name: &str, value: Expression) -> Decl {
    decl(DeclKind::Global(GlobalDecl {
        name: ident(name),
        visibility: VisibilitySpec::Public,
        ty: None,
        value,
        is_variable: false,
    }))
}

/// Mix with an optional payload type per variant
pub fn mix(name: &str, variants: Vec<(&str, Option<TypeExpr>)>) -> Decl {
    decl(DeclKind::Mix(MixDecl {
        name: ident(name),
        visibility: VisibilitySpec::Public,
        variants: variants
            .into_iter()
            .map(|(variant, payload)| MixVariantDecl {
                name: ident(variant),
                payload,
            })
            .collect(),
        default_variant: None,
        is_packed: false,
    }))
}

/// Members added to `target` outside its declaration
pub fn do_skill(target: &str, members: Vec<MemberDecl>) -> Decl {
    decl(DeclKind::DoSkill(DoSkillDecl {
        skill: None,
        target: named_ty(target),
        members,
        range: range(),
    }))
}

pub fn prerun_global(name: &str, value: Expression) -> Decl {
    decl(DeclKind::PrerunGlobal(PrerunGlobalDecl {
        name: ident(name),
        visibility: VisibilitySpec::Public,
        ty: None,
        value,
    }))
}

pub fn bring(name: &str) -> Decl {
    decl(DeclKind::Bring(BringDecl {
        visibility: VisibilitySpec::Private,
        items: vec![BringItem::Path {
            path: path(name),
            alias: None,
        }],
    }))
}

pub fn lib(name: &str, decls: Vec<Decl>) -> Decl {
    decl(DeclKind::Lib(LibDecl {
        name: ident(name),
        visibility: VisibilitySpec::Public,
        decls,
    }))
}

// ============================================================================
// Compilation
// ============================================================================

/// A program of one file module named `main`
pub fn program(decls: Vec<Decl>) -> Program {
    Program::new(vec![SourceModule::file("main", FileId(0), decls)])
}

pub fn compile_ok(program: &Program, options: &CompileOptions) -> CompileOutput {
    init_tracing();
    match compile(program, options) {
        Ok(output) => output,
        Err(failure) => panic!(
            "compilation failed: {} ({:?})",
            failure,
            failure.diagnostic().and_then(|d| d.code())
        ),
    }
}

pub fn compile_err(program: &Program, options: &CompileOptions) -> CompileFailure {
    init_tracing();
    match compile(program, options) {
        Ok(_) => panic!("compilation succeeded, but an error was expected"),
        Err(failure) => failure,
    }
}

/// Code of the fatal diagnostic of a failed compilation
pub fn error_code(failure: &CompileFailure) -> &'static str {
    failure
        .diagnostic()
        .and_then(|d| d.code())
        .map(|c| c.0)
        .unwrap_or("internal")
}
