//! Type-kind model
//!
//! Every type of the language is a [`Type`] value interned in a
//! [`TypeContext`]. Nominal definitions (expanded types, mixes, choices,
//! skills and done skills) live in side tables of the same context.

pub mod context;
pub mod defs;
pub mod ty;

pub use context::{IntInfo, Layout, TypeContext};
pub use defs::{
    bits_for_count, ChoiceDef, ChoiceId, ChoiceVariant, DoneSkill, DoneSkillId, FieldDef, MemberArg,
    MemberFunction, MemberKind, MixDef, MixId, MixVariant, SkillDef, SkillId, SkillPrototype,
    StructDef, StructId,
};
pub use ty::{
    ArrayType, FloatKind, FunctionType, FutureType, MarkOwner, MarkType, NativeKind, NativeRepr,
    ReferenceType, TupleType, Type, TypeId, VectorType,
};
