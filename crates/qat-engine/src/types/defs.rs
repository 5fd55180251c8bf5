//! Definitions behind nominal types
//!
//! Expanded (struct), mix and choice types are interned by identity: the
//! `Type` only holds an id into the definition tables of the
//! [`TypeContext`](super::TypeContext). Definitions are filled in over
//! several entity phases, so an expanded type can exist as a skeleton
//! (usable behind marks and references) before its fields are known.

use crate::ast::{BinaryOperator, UnaryOperator};
use crate::ir::FunctionId;
use crate::module::{ModId, VisibilityInfo};
use crate::span::{FileRange, Identifier};

use super::ty::TypeId;

macro_rules! def_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u32);

        impl $name {
            pub fn as_u32(self) -> u32 {
                self.0
            }

            pub(crate) fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

def_id!(
    /// Identifier of an expanded type definition
    StructId
);
def_id!(
    /// Identifier of a mix type definition
    MixId
);
def_id!(
    /// Identifier of a choice type definition
    ChoiceId
);
def_id!(
    /// Identifier of a skill
    SkillId
);
def_id!(
    /// Identifier of a done skill (an implementation block for a type)
    DoneSkillId
);

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: Identifier,
    pub ty: TypeId,
    pub is_variable: bool,
    pub visibility: VisibilityInfo,
}

/// What a member function is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Method,
    VariationMethod,
    Static,
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

impl MemberKind {
    /// Whether the function receives the instance as its first argument
    pub fn has_self(self) -> bool {
        !matches!(self, MemberKind::Static)
    }

    /// Whether the instance is mutable inside the body
    pub fn is_variation(self) -> bool {
        match self {
            MemberKind::Method
            | MemberKind::Static
            | MemberKind::ToConvertor
            | MemberKind::UnaryOperator { .. } => false,
            MemberKind::BinaryOperator { is_variation, .. } => is_variation,
            _ => true,
        }
    }

    /// Whether member arguments (`''field`) may appear in the signature
    pub fn allows_member_args(self) -> bool {
        matches!(
            self,
            MemberKind::VariationMethod
                | MemberKind::Constructor
                | MemberKind::FromConvertor
                | MemberKind::BinaryOperator { is_variation: true, .. }
        )
    }

    pub fn describe(self) -> &'static str {
        match self {
            MemberKind::Method => "method",
            MemberKind::VariationMethod => "variation method",
            MemberKind::Static => "static function",
            MemberKind::DefaultConstructor => "default constructor",
            MemberKind::Constructor => "constructor",
            MemberKind::FromConvertor => "from convertor",
            MemberKind::ToConvertor => "to convertor",
            MemberKind::BinaryOperator { .. } => "operator",
            MemberKind::UnaryOperator { .. } => "unary operator",
            MemberKind::CopyConstructor => "copy constructor",
            MemberKind::MoveConstructor => "move constructor",
            MemberKind::CopyAssignment => "copy assignment",
            MemberKind::MoveAssignment => "move assignment",
            MemberKind::Destructor => "destructor",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberArg {
    pub name: Identifier,
    pub ty: TypeId,
    pub is_variable: bool,
    /// Index of the field a member argument is stored into
    pub member_field: Option<usize>,
}

/// A member function of an expanded type or of a done skill
#[derive(Debug, Clone, PartialEq)]
pub struct MemberFunction {
    pub kind: MemberKind,
    /// Method name, or a synthesized name for special members
    pub name: String,
    pub function: FunctionId,
    /// The type this member belongs to
    pub parent: TypeId,
    /// Arguments, not counting the instance
    pub args: Vec<MemberArg>,
    pub return_type: TypeId,
    pub visibility: VisibilityInfo,
    pub range: FileRange,
}

impl MemberFunction {
    pub fn arg_types(&self) -> Vec<TypeId> {
        self.args.iter().map(|a| a.ty).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDef {
    pub name: Identifier,
    pub full_name: String,
    pub module: ModId,
    pub visibility: VisibilityInfo,
    /// `None` while only the skeleton exists
    pub fields: Option<Vec<FieldDef>>,
    pub members: Vec<MemberFunction>,
}

impl StructDef {
    pub fn new(
        name: Identifier,
        full_name: String,
        module: ModId,
        visibility: VisibilityInfo,
    ) -> Self {
        Self {
            name,
            full_name,
            module,
            visibility,
            fields: None,
            members: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.fields.is_some()
    }

    pub fn fields(&self) -> &[FieldDef] {
        self.fields.as_deref().unwrap_or(&[])
    }

    pub fn field(&self, name: &str) -> Option<(usize, &FieldDef)> {
        self.fields()
            .iter()
            .enumerate()
            .find(|(_, f)| f.name.value == name)
    }

    pub fn has_member(&self, kind: MemberKind) -> bool {
        self.members.iter().any(|m| m.kind == kind)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MixVariant {
    pub name: Identifier,
    pub payload: Option<TypeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MixDef {
    pub name: Identifier,
    pub full_name: String,
    pub module: ModId,
    pub visibility: VisibilityInfo,
    /// `None` while only the skeleton exists
    pub variants: Option<Vec<MixVariant>>,
    pub default_variant: Option<usize>,
    pub is_packed: bool,
}

impl MixDef {
    pub fn variants(&self) -> &[MixVariant] {
        self.variants.as_deref().unwrap_or(&[])
    }

    pub fn variant(&self, name: &str) -> Option<(usize, &MixVariant)> {
        self.variants()
            .iter()
            .enumerate()
            .find(|(_, v)| v.name.value == name)
    }

    /// Bits needed to tell every variant apart
    pub fn tag_bits(&self) -> u32 {
        bits_for_count(self.variants().len())
    }
}

/// Smallest bit count able to hold `count` distinct values (at least 1)
pub fn bits_for_count(count: usize) -> u32 {
    let mut bits = 1;
    while (1usize << bits) < count {
        bits += 1;
    }
    bits
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceVariant {
    pub name: Identifier,
    pub value: i128,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceDef {
    pub name: Identifier,
    pub full_name: String,
    pub module: ModId,
    pub visibility: VisibilityInfo,
    pub variants: Vec<ChoiceVariant>,
    /// Integer type holding the variant values
    pub underlying: TypeId,
    pub default_variant: Option<usize>,
}

impl ChoiceDef {
    pub fn variant(&self, name: &str) -> Option<(usize, &ChoiceVariant)> {
        self.variants
            .iter()
            .enumerate()
            .find(|(_, v)| v.name.value == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkillPrototype {
    pub name: Identifier,
    pub is_variation: bool,
    pub args: Vec<TypeId>,
    pub return_type: TypeId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkillDef {
    pub name: Identifier,
    pub full_name: String,
    pub module: ModId,
    pub visibility: VisibilityInfo,
    pub prototypes: Vec<SkillPrototype>,
}

/// Members added to a type by `do skill S for T` or `do type T`
#[derive(Debug, Clone, PartialEq)]
pub struct DoneSkill {
    pub skill: Option<SkillId>,
    pub target: TypeId,
    pub module: ModId,
    pub members: Vec<MemberFunction>,
    pub range: FileRange,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_for_count() {
        assert_eq!(bits_for_count(0), 1);
        assert_eq!(bits_for_count(2), 1);
        assert_eq!(bits_for_count(3), 2);
        assert_eq!(bits_for_count(4), 2);
        assert_eq!(bits_for_count(5), 3);
        assert_eq!(bits_for_count(256), 8);
    }

    #[test]
    fn test_member_kind_variation() {
        assert!(!MemberKind::Method.is_variation());
        assert!(MemberKind::VariationMethod.is_variation());
        assert!(MemberKind::FromConvertor.is_variation());
        assert!(!MemberKind::Static.has_self());
        assert!(MemberKind::Constructor.allows_member_args());
        assert!(!MemberKind::Method.allows_member_args());
    }
}
