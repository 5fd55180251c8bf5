//! Unary operators, dereference and address binding

use crate::ast::{ExprKind, Expression, UnaryOperator};
use crate::ctx::EmitCtx;
use crate::error::{codes, CompileError, CompileResult};
use crate::ir::{BinaryOp, IrConstant, IrInstr};
use crate::prerun::eval::fold_error;
use crate::prerun::{fold_unary, wrap_int};
use crate::span::FileRange;
use crate::types::{MemberFunction, MemberKind, Type, TypeContext};
use crate::value::{Storage, Value};

use super::{Expect, Lowerer};

impl<'a> Lowerer<'a> {
    pub(crate) fn lower_unary(
        &mut self,
        ctx: &EmitCtx,
        op: UnaryOperator,
        operand: &Expression,
        expect: Expect,
        range: FileRange,
    ) -> CompileResult<Value> {
        if let (UnaryOperator::Negate, ExprKind::IntegerLiteral { value, suffix }) =
            (op, &operand.kind)
        {
            let literal = self.int_literal(ctx, *value, true, suffix.as_ref(), expect.ty, range)?;
            return Ok(self.constant_value(literal, range));
        }

        let value = self.lower_expr(ctx, operand, expect.hint())?;
        let ty = self.types.non_reference(value.ty);
        let overload: Option<MemberFunction> = self
            .types
            .members_of(ty)
            .into_iter()
            .find(|m| m.kind == MemberKind::UnaryOperator { op })
            .cloned();
        if let Some(member) = overload {
            let instance = self.into_place(value)?;
            return self.call_member(&member, Some(instance.ir), Vec::new(), range);
        }

        let value = self.to_rvalue(value)?;
        if let Some(known) = &value.prerun {
            let folded = fold_unary(&self.types, op, known).map_err(|e| fold_error(e, range))?;
            return Ok(self.constant_value(folded, range));
        }

        let unsupported = |this: &Self| {
            CompileError::at(
                codes::UNSUPPORTED_OPERATOR,
                format!("Operator `{}` is not supported for `{}`", op, this.type_name(ty)),
                range,
            )
        };
        let int_info = self.types.int_info(ty);
        let is_float = self.types.float_kind(ty).is_some();
        let dest = self.fresh_register(ty)?;
        let instr = match op {
            UnaryOperator::Negate if is_float => IrInstr::FloatNegate {
                dest,
                operand: value.ir,
            },
            UnaryOperator::Negate if int_info.is_some_and(|info| info.is_signed) => {
                IrInstr::Binary {
                    dest,
                    op: BinaryOp::Sub,
                    lhs: IrConstant::int(ty, 0).into(),
                    rhs: value.ir,
                }
            }
            UnaryOperator::Not if ty == TypeContext::BOOL => IrInstr::Binary {
                dest,
                op: BinaryOp::Xor,
                lhs: value.ir,
                rhs: IrConstant::bool(ty, true).into(),
            },
            UnaryOperator::BitNot => match int_info {
                Some(info) => IrInstr::Binary {
                    dest,
                    op: BinaryOp::Xor,
                    lhs: value.ir,
                    rhs: IrConstant::int(ty, wrap_int(-1, info)).into(),
                },
                None => return Err(unsupported(self)),
            },
            _ => return Err(unsupported(self)),
        };
        self.emit(instr)?;
        Ok(Value::temporary(dest, ty, range))
    }

    /// `@mark`: the memory a mark points to
    pub(crate) fn lower_dereference(
        &mut self,
        ctx: &EmitCtx,
        operand: &Expression,
        range: FileRange,
    ) -> CompileResult<Value> {
        let pointer = self.lower_rvalue(ctx, operand, Expect::none())?;
        match self.types.get(pointer.ty).clone() {
            Type::Mark(mark) if mark.is_slice => Err(CompileError::at(
                codes::TYPE_MISMATCH,
                format!(
                    "`{}` is a slice and cannot be dereferenced; index into it instead",
                    self.type_name(pointer.ty)
                ),
                operand.range,
            )),
            Type::Mark(mark) => Ok(Value::at(
                pointer.ir,
                mark.subtype,
                mark.is_subtype_variable,
                Storage::Pointee,
                range,
            )),
            _ => Err(CompileError::at(
                codes::TYPE_MISMATCH,
                format!(
                    "Only marks can be dereferenced, but this value is of type `{}`",
                    self.type_name(pointer.ty)
                ),
                operand.range,
            )),
        }
    }

    /// Address of an addressable value, as a mark when one is expected and
    /// as a reference otherwise
    pub(crate) fn lower_address_of(
        &mut self,
        ctx: &EmitCtx,
        place: &Expression,
        is_variable: bool,
        expect: Expect,
        range: FileRange,
    ) -> CompileResult<Value> {
        let value = self.lower_expr(ctx, place, Expect::none())?;
        let place_value = self.as_place(value)?.ok_or_else(|| {
            CompileError::at(
                codes::NOT_ADDRESSABLE,
                "Only values that live in memory can be bound by address",
                place.range,
            )
        })?;
        if is_variable && !place_value.is_mutable(&self.types) {
            return Err(CompileError::at(
                codes::VARIABILITY_WIDENED,
                format!(
                    "Cannot get variable access to a value of type `{}` that is not variable",
                    self.type_name(place_value.ty)
                ),
                place.range,
            ));
        }

        let expected_mark = expect
            .ty
            .and_then(|ty| self.types.get(ty).as_mark().copied())
            .filter(|mark| !mark.is_slice && mark.subtype == place_value.ty);
        if let Some(mark) = expected_mark {
            if mark.is_subtype_variable && !place_value.is_mutable(&self.types) {
                return Err(CompileError::at(
                    codes::VARIABILITY_WIDENED,
                    format!(
                        "A variable mark cannot point to a value of type `{}` that is not variable",
                        self.type_name(place_value.ty)
                    ),
                    place.range,
                ));
            }
            let ty = self.types.mark(mark);
            return Ok(Value::temporary(place_value.ir, ty, range));
        }

        let ty = self.types.reference(place_value.ty, is_variable);
        let mut reference = Value::temporary(place_value.ir, ty, range);
        reference.local = place_value.local;
        Ok(reference)
    }
}
