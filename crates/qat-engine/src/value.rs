//! Values produced by lowering
//!
//! A [`Value`] is either a plain IR value (`Storage::Temporary`) or the
//! address of memory holding a value of `ty`. Addressable values that are
//! not typed as references are ghost references: a local, a global or a
//! fresh slot can be assigned to, borrowed or moved out of without a
//! reference type ever being involved. Compile-time known values keep their
//! [`PrerunValue`] alongside the IR constant.

use std::fmt;

use crate::ir::{IrConstant, IrValue};
use crate::prerun::PrerunValue;
use crate::span::FileRange;
use crate::types::{TypeContext, TypeId};

/// Identity of a local variable inside the function being lowered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalId(pub(crate) u32);

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "local{}", self.0)
    }
}

/// Where the value lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    /// Not addressable; `ir` is the value itself
    Temporary,
    /// A slot created for an intermediate result, owned by nobody
    TempSlot,
    /// A local variable or argument slot
    Stack,
    Global,
    /// Memory reached through a mark
    Pointee,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    /// The value for `Temporary` storage, its address otherwise
    pub ir: IrValue,
    pub ty: TypeId,
    pub is_variable: bool,
    pub storage: Storage,
    pub prerun: Option<PrerunValue>,
    pub local: Option<LocalId>,
    pub range: FileRange,
}

impl Value {
    pub fn temporary(ir: impl Into<IrValue>, ty: TypeId, range: FileRange) -> Self {
        Self {
            ir: ir.into(),
            ty,
            is_variable: false,
            storage: Storage::Temporary,
            prerun: None,
            local: None,
            range,
        }
    }

    /// A value in memory at `address`
    pub fn at(
        address: impl Into<IrValue>,
        ty: TypeId,
        is_variable: bool,
        storage: Storage,
        range: FileRange,
    ) -> Self {
        Self {
            ir: address.into(),
            ty,
            is_variable,
            storage,
            prerun: None,
            local: None,
            range,
        }
    }

    pub fn constant(constant: IrConstant, prerun: PrerunValue, range: FileRange) -> Self {
        let ty = prerun.ty;
        Self {
            ir: IrValue::Constant(constant),
            ty,
            is_variable: false,
            storage: Storage::Temporary,
            prerun: Some(prerun),
            local: None,
            range,
        }
    }

    pub fn with_local(mut self, local: LocalId) -> Self {
        self.local = Some(local);
        self
    }

    /// Addressable without being typed as a reference
    pub fn is_ghost_reference(&self) -> bool {
        self.storage != Storage::Temporary
    }

    pub fn is_reference(&self, types: &TypeContext) -> bool {
        types.is_reference(self.ty)
    }

    pub fn is_prerun(&self) -> bool {
        self.prerun.is_some()
    }

    /// A slot no one else refers to, so its contents can be taken freely
    pub fn is_temp_slot(&self) -> bool {
        self.storage == Storage::TempSlot
    }

    /// Whether the memory behind the value may be changed. For references
    /// this is the variability of the referred value.
    pub fn is_mutable(&self, types: &TypeContext) -> bool {
        match types.reference_info(self.ty) {
            Some(reference) => reference.is_subtype_variable,
            None => self.is_ghost_reference() && self.is_variable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Register, RegisterId};

    #[test]
    fn test_ghost_reference_follows_storage() {
        let reg = Register::new(RegisterId::new(0), TypeContext::I32);
        let temp = Value::temporary(reg, TypeContext::I32, FileRange::default());
        assert!(!temp.is_ghost_reference());

        let slot = Value::at(reg, TypeContext::I32, true, Storage::Stack, FileRange::default());
        assert!(slot.is_ghost_reference());
        assert!(slot.is_mutable(&TypeContext::new()));
    }

    #[test]
    fn test_reference_mutability_comes_from_subtype() {
        let mut types = TypeContext::new();
        let immutable_ref = types.reference(TypeContext::I32, false);
        let reg = Register::new(RegisterId::new(0), immutable_ref);
        let mut value = Value::temporary(reg, immutable_ref, FileRange::default());
        value.is_variable = true;
        assert!(value.is_reference(&types));
        assert!(!value.is_mutable(&types));
    }
}
