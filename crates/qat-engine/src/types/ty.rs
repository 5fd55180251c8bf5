//! Type representation
//!
//! `Type` is a closed sum over every type kind of the language. Types are
//! never compared structurally after creation: the [`TypeContext`] interns
//! each distinct `Type` once and hands out a [`TypeId`], so two types are the
//! same type exactly when their ids are equal.
//!
//! [`TypeContext`]: super::TypeContext

use std::fmt;

use super::defs::{ChoiceId, MixId, StructId};

/// Unique identifier for an interned type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub(crate) u32);

impl TypeId {
    pub fn as_u32(self) -> u32 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type{}", self.0)
    }
}

/// Floating point kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FloatKind {
    Half,
    Brain,
    F32,
    F64,
    F80,
    F128,
}

impl FloatKind {
    pub fn bitwidth(self) -> u32 {
        match self {
            FloatKind::Half | FloatKind::Brain => 16,
            FloatKind::F32 => 32,
            FloatKind::F64 => 64,
            FloatKind::F80 => 80,
            FloatKind::F128 => 128,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FloatKind::Half => "f16",
            FloatKind::Brain => "fbrain",
            FloatKind::F32 => "f32",
            FloatKind::F64 => "f64",
            FloatKind::F80 => "f80",
            FloatKind::F128 => "f128",
        }
    }

    /// Name of the type in the emitted IR
    pub fn ir_name(self) -> &'static str {
        match self {
            FloatKind::Half => "half",
            FloatKind::Brain => "bfloat",
            FloatKind::F32 => "float",
            FloatKind::F64 => "double",
            FloatKind::F80 => "x86_fp80",
            FloatKind::F128 => "fp128",
        }
    }
}

/// Host-ABI primitive kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeKind {
    Bool,
    Char,
    UnsignedChar,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    Long,
    UnsignedLong,
    LongLong,
    UnsignedLongLong,
    Usize,
    Isize,
    Float,
    Double,
    /// Null terminated C string, a pointer to `u8`
    CString,
}

/// Layout class of a native kind once the target is known
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeRepr {
    Signed(u32),
    Unsigned(u32),
    Float(FloatKind),
    Pointer,
}

impl NativeKind {
    pub fn name(self) -> &'static str {
        match self {
            NativeKind::Bool => "cBool",
            NativeKind::Char => "cChar",
            NativeKind::UnsignedChar => "cUChar",
            NativeKind::Short => "cShort",
            NativeKind::UnsignedShort => "cUShort",
            NativeKind::Int => "cInt",
            NativeKind::UnsignedInt => "cUInt",
            NativeKind::Long => "cLong",
            NativeKind::UnsignedLong => "cULong",
            NativeKind::LongLong => "cLongLong",
            NativeKind::UnsignedLongLong => "cULongLong",
            NativeKind::Usize => "usize",
            NativeKind::Isize => "isize",
            NativeKind::Float => "cFloat",
            NativeKind::Double => "cDouble",
            NativeKind::CString => "cStr",
        }
    }

    /// Layout on a target with the given pointer width (LP64 style for 64 bit)
    pub fn repr(self, pointer_width: u32) -> NativeRepr {
        let long = if pointer_width == 64 { 64 } else { 32 };
        match self {
            NativeKind::Bool => NativeRepr::Unsigned(1),
            NativeKind::Char => NativeRepr::Signed(8),
            NativeKind::UnsignedChar => NativeRepr::Unsigned(8),
            NativeKind::Short => NativeRepr::Signed(16),
            NativeKind::UnsignedShort => NativeRepr::Unsigned(16),
            NativeKind::Int => NativeRepr::Signed(32),
            NativeKind::UnsignedInt => NativeRepr::Unsigned(32),
            NativeKind::Long => NativeRepr::Signed(long),
            NativeKind::UnsignedLong => NativeRepr::Unsigned(long),
            NativeKind::LongLong => NativeRepr::Signed(64),
            NativeKind::UnsignedLongLong => NativeRepr::Unsigned(64),
            NativeKind::Usize => NativeRepr::Unsigned(pointer_width),
            NativeKind::Isize => NativeRepr::Signed(pointer_width),
            NativeKind::Float => NativeRepr::Float(FloatKind::F32),
            NativeKind::Double => NativeRepr::Float(FloatKind::F64),
            NativeKind::CString => NativeRepr::Pointer,
        }
    }
}

/// Who owns the memory a mark points to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkOwner {
    Anonymous,
    Heap,
    /// Owned by instances of a type
    Type(TypeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkType {
    pub subtype: TypeId,
    pub owner: MarkOwner,
    pub is_nullable: bool,
    /// A slice is a pointer together with a length
    pub is_slice: bool,
    pub is_subtype_variable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReferenceType {
    pub subtype: TypeId,
    pub is_subtype_variable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArrayType {
    pub element: TypeId,
    pub length: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VectorType {
    pub element: TypeId,
    pub count: u32,
    pub is_scalable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TupleType {
    pub members: Vec<TypeId>,
    pub is_packed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionType {
    pub return_type: TypeId,
    pub args: Vec<TypeId>,
    pub is_variadic: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FutureType {
    pub subtype: TypeId,
    pub is_packed: bool,
}

/// A type of the language
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Integer { bits: u32 },
    Unsigned { bits: u32 },
    Float(FloatKind),
    /// Unicode scalar value, laid out as `u32`
    Char,
    Bool,
    Void,
    /// `str`: pointer to UTF-8 bytes with a length
    StringSlice,
    Mark(MarkType),
    Reference(ReferenceType),
    Array(ArrayType),
    Vector(VectorType),
    Tuple(TupleType),
    Struct(StructId),
    Mix(MixId),
    Choice(ChoiceId),
    Function(FunctionType),
    Future(FutureType),
    Maybe(TypeId),
    /// Type of a type used as a compile-time value
    Typed(TypeId),
    Native(NativeKind),
}

impl Type {
    pub fn is_integer(&self) -> bool {
        matches!(self, Type::Integer { .. })
    }

    pub fn is_unsigned(&self) -> bool {
        matches!(self, Type::Unsigned { .. })
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Type::Float(_))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    pub fn as_reference(&self) -> Option<&ReferenceType> {
        match self {
            Type::Reference(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_mark(&self) -> Option<&MarkType> {
        match self {
            Type::Mark(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionType> {
        match self {
            Type::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<StructId> {
        match self {
            Type::Struct(id) => Some(*id),
            _ => None,
        }
    }
}
