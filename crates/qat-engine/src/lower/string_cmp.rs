//! `str` equality
//!
//! Two known slices fold to a constant. Otherwise the lengths are compared
//! first and the bytes are then compared one by one:
//!
//! ```text
//! str.cmp.length -> str.cmp.cond -> str.cmp.body -> str.cmp.next -> str.cmp.cond
//!        |               |               |
//!        v               v               v
//!   str.cmp.end <- str.cmp.true     str.cmp.end
//! ```

use crate::ast::BinaryOperator;
use crate::error::CompileResult;
use crate::ir::{BinaryOp, CmpPredicate, IrConstant, IrInstr, IrValue};
use crate::prerun::PrerunValue;
use crate::span::FileRange;
use crate::types::TypeContext;
use crate::value::Value;

use super::Lowerer;

impl<'a> Lowerer<'a> {
    pub(crate) fn lower_string_equality(
        &mut self,
        op: BinaryOperator,
        left: Value,
        right: Value,
        range: FileRange,
    ) -> CompileResult<Value> {
        let negate = op == BinaryOperator::NotEq;
        if let (Some(l), Some(r)) = (
            left.prerun.as_ref().and_then(PrerunValue::as_str),
            right.prerun.as_ref().and_then(PrerunValue::as_str),
        ) {
            let equal = l == r;
            let known = PrerunValue::bool(TypeContext::BOOL, equal != negate);
            return Ok(self.constant_value(known, range));
        }

        let (lhs_data, lhs_len) = self.str_parts(left.ir)?;
        let (rhs_data, rhs_len) = self.str_parts(right.ir)?;

        let result = self.alloca(TypeContext::BOOL, Some("str.cmp.result"))?;
        let index = self.alloca(TypeContext::USIZE, Some("str.cmp.index"))?;
        self.store(IrConstant::bool(TypeContext::BOOL, false).into(), result.into())?;
        self.store(IrConstant::int(TypeContext::USIZE, 0).into(), index.into())?;

        let length_block = self.new_block(Some("str.cmp.length"))?;
        let cond_block = self.new_block(Some("str.cmp.cond"))?;
        let body_block = self.new_block(Some("str.cmp.body"))?;
        let next_block = self.new_block(Some("str.cmp.next"))?;
        let true_block = self.new_block(Some("str.cmp.true"))?;
        let end_block = self.new_block(Some("str.cmp.end"))?;
        self.jump(length_block)?;

        self.switch_to(length_block)?;
        let same_length = self.fresh_register(TypeContext::BOOL)?;
        self.emit(IrInstr::Compare {
            dest: same_length,
            pred: CmpPredicate::Eq,
            lhs: lhs_len.clone(),
            rhs: rhs_len,
        })?;
        self.branch(same_length.into(), cond_block, end_block)?;

        self.switch_to(cond_block)?;
        let position = self.load(index.into(), TypeContext::USIZE)?;
        let in_range = self.fresh_register(TypeContext::BOOL)?;
        self.emit(IrInstr::Compare {
            dest: in_range,
            pred: CmpPredicate::UnsignedLt,
            lhs: position.into(),
            rhs: lhs_len,
        })?;
        self.branch(in_range.into(), body_block, true_block)?;

        self.switch_to(body_block)?;
        let position = self.load(index.into(), TypeContext::USIZE)?;
        let lhs_byte = self.byte_at(lhs_data, position.into())?;
        let rhs_byte = self.byte_at(rhs_data, position.into())?;
        let same_byte = self.fresh_register(TypeContext::BOOL)?;
        self.emit(IrInstr::Compare {
            dest: same_byte,
            pred: CmpPredicate::Eq,
            lhs: lhs_byte,
            rhs: rhs_byte,
        })?;
        self.branch(same_byte.into(), next_block, end_block)?;

        self.switch_to(next_block)?;
        let position = self.load(index.into(), TypeContext::USIZE)?;
        let advanced = self.fresh_register(TypeContext::USIZE)?;
        self.emit(IrInstr::Binary {
            dest: advanced,
            op: BinaryOp::Add,
            lhs: position.into(),
            rhs: IrConstant::int(TypeContext::USIZE, 1).into(),
        })?;
        self.store(advanced.into(), index.into())?;
        self.jump(cond_block)?;

        self.switch_to(true_block)?;
        self.store(IrConstant::bool(TypeContext::BOOL, true).into(), result.into())?;
        self.jump(end_block)?;

        self.switch_to(end_block)?;
        let equal = self.load(result.into(), TypeContext::BOOL)?;
        if !negate {
            return Ok(Value::temporary(equal, TypeContext::BOOL, range));
        }
        let differs = self.fresh_register(TypeContext::BOOL)?;
        self.emit(IrInstr::Binary {
            dest: differs,
            op: BinaryOp::Xor,
            lhs: equal.into(),
            rhs: IrConstant::bool(TypeContext::BOOL, true).into(),
        })?;
        Ok(Value::temporary(differs, TypeContext::BOOL, range))
    }

    /// Data pointer and length of a `str` value
    pub(crate) fn str_parts(&mut self, value: IrValue) -> CompileResult<(IrValue, IrValue)> {
        let data_ty = self.types.mark_to(TypeContext::U8, false);
        let data = self.fresh_register(data_ty)?;
        self.emit(IrInstr::ExtractValue {
            dest: data,
            aggregate: value.clone(),
            index: 0,
        })?;
        let length = self.fresh_register(TypeContext::USIZE)?;
        self.emit(IrInstr::ExtractValue {
            dest: length,
            aggregate: value,
            index: 1,
        })?;
        Ok((data.into(), length.into()))
    }

    fn byte_at(&mut self, data: IrValue, position: IrValue) -> CompileResult<IrValue> {
        let ptr_ty = self.types.mark_to(TypeContext::U8, false);
        let ptr = self.fresh_register(ptr_ty)?;
        self.emit(IrInstr::ElementPtr {
            dest: ptr,
            base: data,
            element: TypeContext::U8,
            index: position,
        })?;
        Ok(self.load(ptr.into(), TypeContext::U8)?.into())
    }
}
