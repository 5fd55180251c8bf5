//! Prerun: compile-time evaluation
//!
//! Prerun values are constants known while compiling. They come from
//! literals, prerun globals, choice variants and calls to prerun functions,
//! which run in the interpreter in [`eval`]. Control flow inside that
//! interpreter is carried by [`Flow`].

pub mod call;
pub mod eval;
pub mod fold;
pub mod value;

pub use call::{Flow, PrerunArg, PrerunCallState, PrerunFunction, PrerunLocal};
pub use fold::{fold_binary, fold_cast, fold_unary, wrap_int, FoldError};
pub use value::{ConstData, PrerunValue};

use crate::ir::{ConstantKind, IrConstant, IrModule};
use crate::types::{Type, TypeContext, TypeId};

/// Turn a prerun value into an IR constant of the same type
pub fn to_ir_constant(
    types: &mut TypeContext,
    ir: &mut IrModule,
    value: &PrerunValue,
) -> IrConstant {
    data_to_ir(types, ir, &value.data, value.ty)
}

fn data_to_ir(
    types: &mut TypeContext,
    ir: &mut IrModule,
    data: &ConstData,
    ty: TypeId,
) -> IrConstant {
    let kind = match data {
        ConstData::Int(v) => ConstantKind::Int(*v),
        ConstData::Char(c) => ConstantKind::Int(i128::from(u32::from(*c))),
        ConstData::Float(f) => ConstantKind::Float(*f),
        ConstData::Bool(b) => ConstantKind::Bool(*b),
        ConstData::Str(s) => ConstantKind::Str(ir.intern_string(s)),
        ConstData::Null => ConstantKind::Null,
        ConstData::Void | ConstData::Type(_) => ConstantKind::Undef,
        ConstData::Array(items) => {
            let element = match types.get(ty) {
                Type::Array(a) => a.element,
                Type::Vector(v) => v.element,
                _ => return IrConstant::new(ty, ConstantKind::Undef),
            };
            ConstantKind::Aggregate(
                items
                    .iter()
                    .map(|i| data_to_ir(types, ir, i, element))
                    .collect(),
            )
        }
        ConstData::Tuple(items) | ConstData::Struct(items) => {
            let members: Vec<TypeId> = match types.get(ty) {
                Type::Tuple(t) => t.members.clone(),
                Type::Struct(_) => types
                    .struct_of(ty)
                    .map(|d| d.fields().iter().map(|f| f.ty).collect())
                    .unwrap_or_default(),
                _ => return IrConstant::new(ty, ConstantKind::Undef),
            };
            ConstantKind::Aggregate(
                items
                    .iter()
                    .zip(members)
                    .map(|(item, member)| data_to_ir(types, ir, item, member))
                    .collect(),
            )
        }
        ConstData::Maybe(inner) => {
            let sub = match types.get(ty) {
                Type::Maybe(sub) => *sub,
                _ => return IrConstant::new(ty, ConstantKind::Undef),
            };
            let payload = match inner {
                Some(inner) => data_to_ir(types, ir, inner, sub),
                None => IrConstant::zero(sub),
            };
            ConstantKind::Aggregate(vec![
                IrConstant::bool(TypeContext::BOOL, inner.is_some()),
                payload,
            ])
        }
        ConstData::Mix { variant, payload } => {
            let Some(def) = types.mix_of(ty) else {
                return IrConstant::new(ty, ConstantKind::Undef);
            };
            let tag_bits = def.tag_bits();
            let payload_ty = def.variants().get(*variant).and_then(|v| v.payload);
            let tag_ty = types.unsigned(tag_bits);
            let mut members = vec![IrConstant::int(tag_ty, *variant as i128)];
            if let (Some(payload), Some(payload_ty)) = (payload, payload_ty) {
                members.push(data_to_ir(types, ir, payload, payload_ty));
            }
            ConstantKind::Aggregate(members)
        }
    };
    IrConstant::new(ty, kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_constants_are_interned() {
        let mut types = TypeContext::new();
        let mut ir = IrModule::new("test");
        let value = PrerunValue::new(ConstData::Str("hello".into()), TypeContext::STR);
        let first = to_ir_constant(&mut types, &mut ir, &value);
        let second = to_ir_constant(&mut types, &mut ir, &value);
        assert_eq!(first, second);
        assert!(matches!(first.kind, ConstantKind::Str(_)));
    }

    #[test]
    fn test_tuple_constant_members_are_typed() {
        let mut types = TypeContext::new();
        let mut ir = IrModule::new("test");
        let tuple = types.tuple(vec![TypeContext::I32, TypeContext::BOOL], false);
        let value = PrerunValue::new(
            ConstData::Tuple(vec![ConstData::Int(4), ConstData::Bool(true)]),
            tuple,
        );
        let constant = to_ir_constant(&mut types, &mut ir, &value);
        match constant.kind {
            ConstantKind::Aggregate(members) => {
                assert_eq!(members[0], IrConstant::int(TypeContext::I32, 4));
                assert_eq!(members[1], IrConstant::bool(TypeContext::BOOL, true));
            }
            other => panic!("unexpected constant {:?}", other),
        }
    }
}
