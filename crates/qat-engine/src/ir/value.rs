//! IR values: virtual registers and constants

use std::fmt;

use super::instr::{FunctionId, GlobalId, StringId};
use crate::types::TypeId;

/// Virtual register identifier, unique inside one function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegisterId(pub u32);

impl RegisterId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

/// A virtual register together with the type of the value it holds
///
/// Addresses are typed as marks (`mark:[var T]`), so a register of a mark
/// type may be used as a pointer operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Register {
    pub id: RegisterId,
    pub ty: TypeId,
}

impl Register {
    pub fn new(id: RegisterId, ty: TypeId) -> Self {
        Self { id, ty }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.id.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConstantKind {
    /// Integers, characters and choice values, already wrapped to the type's width
    Int(i128),
    Float(f64),
    Bool(bool),
    Null,
    /// All bits zero, used for default values and moved-from storage
    Zero,
    Undef,
    /// Struct, tuple, array or vector built from constant members
    Aggregate(Vec<IrConstant>),
    /// A `str` slice pointing at interned string data
    Str(StringId),
    GlobalAddr(GlobalId),
    FunctionAddr(FunctionId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IrConstant {
    pub ty: TypeId,
    pub kind: ConstantKind,
}

impl IrConstant {
    pub fn new(ty: TypeId, kind: ConstantKind) -> Self {
        Self { ty, kind }
    }

    pub fn int(ty: TypeId, value: i128) -> Self {
        Self::new(ty, ConstantKind::Int(value))
    }

    pub fn bool(ty: TypeId, value: bool) -> Self {
        Self::new(ty, ConstantKind::Bool(value))
    }

    pub fn zero(ty: TypeId) -> Self {
        Self::new(ty, ConstantKind::Zero)
    }

    pub fn as_int(&self) -> Option<i128> {
        match self.kind {
            ConstantKind::Int(v) => Some(v),
            ConstantKind::Bool(b) => Some(b as i128),
            _ => None,
        }
    }
}

impl fmt::Display for IrConstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ConstantKind::Int(v) => write!(f, "{}", v),
            ConstantKind::Float(v) => write!(f, "{:?}", v),
            ConstantKind::Bool(b) => write!(f, "{}", b),
            ConstantKind::Null => write!(f, "null"),
            ConstantKind::Zero => write!(f, "zeroinitializer"),
            ConstantKind::Undef => write!(f, "undef"),
            ConstantKind::Aggregate(members) => {
                write!(f, "{{")?;
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", member)?;
                }
                write!(f, "}}")
            }
            ConstantKind::Str(id) => write!(f, "str({})", id),
            ConstantKind::GlobalAddr(id) => write!(f, "{}", id),
            ConstantKind::FunctionAddr(id) => write!(f, "{}", id),
        }
    }
}

/// Operand of an instruction
#[derive(Debug, Clone, PartialEq)]
pub enum IrValue {
    Register(Register),
    Constant(IrConstant),
}

impl IrValue {
    pub fn ty(&self) -> TypeId {
        match self {
            IrValue::Register(r) => r.ty,
            IrValue::Constant(c) => c.ty,
        }
    }

    pub fn as_register(&self) -> Option<Register> {
        match self {
            IrValue::Register(r) => Some(*r),
            IrValue::Constant(_) => None,
        }
    }

    pub fn as_constant(&self) -> Option<&IrConstant> {
        match self {
            IrValue::Constant(c) => Some(c),
            IrValue::Register(_) => None,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, IrValue::Constant(_))
    }
}

impl From<Register> for IrValue {
    fn from(reg: Register) -> Self {
        IrValue::Register(reg)
    }
}

impl From<IrConstant> for IrValue {
    fn from(constant: IrConstant) -> Self {
        IrValue::Constant(constant)
    }
}

impl fmt::Display for IrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrValue::Register(r) => write!(f, "{}", r),
            IrValue::Constant(c) => write!(f, "{}", c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeContext;

    #[test]
    fn test_register_display() {
        let reg = Register::new(RegisterId::new(3), TypeContext::I32);
        assert_eq!(reg.to_string(), "%3");
    }

    #[test]
    fn test_value_type() {
        let value = IrValue::from(IrConstant::int(TypeContext::I32, 7));
        assert_eq!(value.ty(), TypeContext::I32);
        assert!(value.is_constant());
        assert_eq!(value.as_constant().and_then(|c| c.as_int()), Some(7));
        assert_eq!(value.to_string(), "7");
    }
}
