//! Top-level declarations
//!
//! Each [`Decl`] becomes one entity in the dependency engine, except `lib`
//! blocks which become child modules.

use super::{
    BinaryOperator, Expression, QualifiedName, Sentence, TypeExpr, UnaryOperator, VisibilitySpec,
};
use crate::span::{FileRange, Identifier};

#[derive(Debug, Clone, PartialEq)]
pub struct Decl {
    pub kind: DeclKind,
    /// Prerun condition deciding whether the declaration exists at all
    pub guard: Option<Expression>,
    pub range: FileRange,
}

impl Decl {
    pub fn new(kind: DeclKind, range: FileRange) -> Self {
        Self {
            kind,
            guard: None,
            range,
        }
    }

    pub fn with_guard(mut self, guard: Expression) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Declared name, if the declaration introduces one
    pub fn name(&self) -> Option<&Identifier> {
        match &self.kind {
            DeclKind::Function(d) => Some(&d.name),
            DeclKind::Struct(d) => Some(&d.name),
            DeclKind::Mix(d) => Some(&d.name),
            DeclKind::Choice(d) => Some(&d.name),
            DeclKind::Global(d) => Some(&d.name),
            DeclKind::PrerunGlobal(d) => Some(&d.name),
            DeclKind::PrerunFunction(d) => Some(&d.name),
            DeclKind::TypeDefinition(d) => Some(&d.name),
            DeclKind::Skill(d) => Some(&d.name),
            DeclKind::Lib(d) => Some(&d.name),
            DeclKind::DoSkill(_) | DeclKind::Bring(_) => None,
        }
    }

    pub fn visibility(&self) -> VisibilitySpec {
        match &self.kind {
            DeclKind::Function(d) => d.visibility,
            DeclKind::Struct(d) => d.visibility,
            DeclKind::Mix(d) => d.visibility,
            DeclKind::Choice(d) => d.visibility,
            DeclKind::Global(d) => d.visibility,
            DeclKind::PrerunGlobal(d) => d.visibility,
            DeclKind::PrerunFunction(d) => d.visibility,
            DeclKind::TypeDefinition(d) => d.visibility,
            DeclKind::Skill(d) => d.visibility,
            DeclKind::Lib(d) => d.visibility,
            DeclKind::Bring(d) => d.visibility,
            DeclKind::DoSkill(_) => VisibilitySpec::Public,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeclKind {
    Function(FunctionDecl),
    Struct(StructDecl),
    Mix(MixDecl),
    Choice(ChoiceDecl),
    Global(GlobalDecl),
    PrerunGlobal(PrerunGlobalDecl),
    PrerunFunction(PrerunFunctionDecl),
    TypeDefinition(TypeDefinitionDecl),
    Skill(SkillDecl),
    DoSkill(DoSkillDecl),
    Bring(BringDecl),
    Lib(LibDecl),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: Identifier,
    /// `None` only for member arguments, which take the field's type
    pub ty: Option<TypeExpr>,
    pub is_variable: bool,
    /// `''name`: the argument is stored straight into the field `name`
    pub is_member_arg: bool,
    pub range: FileRange,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: Identifier,
    pub visibility: VisibilitySpec,
    pub args: Vec<Argument>,
    /// `None` means `void`
    pub return_type: Option<TypeExpr>,
    pub is_variadic: bool,
    /// `None` declares an external function
    pub body: Option<Vec<Sentence>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: Identifier,
    pub ty: TypeExpr,
    pub is_variable: bool,
    pub visibility: VisibilitySpec,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MemberDeclKind {
    Method { name: Identifier, is_variation: bool },
    Static { name: Identifier },
    DefaultConstructor,
    Constructor,
    FromConvertor,
    ToConvertor,
    BinaryOperator { op: BinaryOperator, is_variation: bool },
    UnaryOperator { op: UnaryOperator },
    CopyConstructor,
    MoveConstructor,
    CopyAssignment,
    MoveAssignment,
    Destructor,
}

/// A member function of an expanded type or done skill
#[derive(Debug, Clone, PartialEq)]
pub struct MemberDecl {
    pub kind: MemberDeclKind,
    pub visibility: VisibilitySpec,
    pub args: Vec<Argument>,
    pub return_type: Option<TypeExpr>,
    pub body: Vec<Sentence>,
    pub range: FileRange,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDecl {
    pub name: Identifier,
    pub visibility: VisibilitySpec,
    pub fields: Vec<FieldDecl>,
    pub members: Vec<MemberDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MixVariantDecl {
    pub name: Identifier,
    pub payload: Option<TypeExpr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MixDecl {
    pub name: Identifier,
    pub visibility: VisibilitySpec,
    pub variants: Vec<MixVariantDecl>,
    pub default_variant: Option<Identifier>,
    pub is_packed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceVariantDecl {
    pub name: Identifier,
    /// Prerun integer; absent values continue from the previous variant
    pub value: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceDecl {
    pub name: Identifier,
    pub visibility: VisibilitySpec,
    pub variants: Vec<ChoiceVariantDecl>,
    pub underlying: Option<TypeExpr>,
    pub default_variant: Option<Identifier>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalDecl {
    pub name: Identifier,
    pub visibility: VisibilitySpec,
    pub ty: Option<TypeExpr>,
    pub value: Expression,
    pub is_variable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrerunGlobalDecl {
    pub name: Identifier,
    pub visibility: VisibilitySpec,
    pub ty: Option<TypeExpr>,
    pub value: Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrerunFunctionDecl {
    pub name: Identifier,
    pub visibility: VisibilitySpec,
    pub args: Vec<Argument>,
    pub return_type: Option<TypeExpr>,
    pub body: Vec<Sentence>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeDefinitionDecl {
    pub name: Identifier,
    pub visibility: VisibilitySpec,
    pub subtype: TypeExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkillPrototypeDecl {
    pub name: Identifier,
    pub is_variation: bool,
    pub args: Vec<Argument>,
    pub return_type: Option<TypeExpr>,
    pub range: FileRange,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkillDecl {
    pub name: Identifier,
    pub visibility: VisibilitySpec,
    pub prototypes: Vec<SkillPrototypeDecl>,
}

/// `do skill S for T { ... }`, or `do type T { ... }` when `skill` is absent
#[derive(Debug, Clone, PartialEq)]
pub struct DoSkillDecl {
    pub skill: Option<QualifiedName>,
    pub target: TypeExpr,
    pub members: Vec<MemberDecl>,
    pub range: FileRange,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BroughtName {
    pub name: Identifier,
    pub alias: Option<Identifier>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BringItem {
    /// `bring a::b`: a module, or an entity when the path does not name a module
    Path {
        path: QualifiedName,
        alias: Option<Identifier>,
    },
    /// `bring a::b::{x, y as z}`
    Members {
        module: QualifiedName,
        names: Vec<BroughtName>,
    },
    /// `bring "path/to/file.qat"`; without an alias the module is brought anonymously
    File {
        path: String,
        alias: Option<Identifier>,
        range: FileRange,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BringDecl {
    pub visibility: VisibilitySpec,
    pub items: Vec<BringItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LibDecl {
    pub name: Identifier,
    pub visibility: VisibilitySpec,
    pub decls: Vec<Decl>,
}
