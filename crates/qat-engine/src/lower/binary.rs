//! Binary operators
//!
//! Operands are lowered with bidirectional inference: when the left side
//! carries no type of its own (an unsuffixed literal, `null`, `default`) the
//! right side is lowered first and lends its type. Expanded types dispatch to
//! their operator members; everything else selects a native instruction from
//! the operand type.

use tracing::trace;

use crate::ast::{BinaryOperator, Expression};
use crate::ctx::EmitCtx;
use crate::error::{codes, CompileError, CompileResult};
use crate::ir::{BasicBlockId, BinaryOp, CmpPredicate, IrConstant, IrInstr, IrValue};
use crate::prerun::eval::fold_error;
use crate::prerun::{fold_binary, PrerunValue};
use crate::span::FileRange;
use crate::types::{MemberFunction, MemberKind, Type, TypeContext, TypeId};
use crate::value::Value;

use super::{Expect, Lowerer};

/// How the operands of a native operator are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OperandClass {
    Signed,
    Unsigned,
    Float,
    Bool,
    /// Characters and choice values: integers that only compare
    Ordinal,
    Pointer,
}

impl<'a> Lowerer<'a> {
    /// Check that two operand types may meet in `op`
    ///
    /// Integers of different widths never widen silently. A choice value
    /// may meet its underlying integer type in bitwise operators.
    pub(crate) fn check_operand_types(
        &self,
        op: BinaryOperator,
        lhs: TypeId,
        rhs: TypeId,
        range: FileRange,
    ) -> CompileResult<()> {
        if lhs == rhs {
            return Ok(());
        }
        if let (Some(l), Some(r)) = (self.types.int_info(lhs), self.types.int_info(rhs)) {
            if l.bits != r.bits {
                return Err(CompileError::at(
                    codes::BITWIDTH_MISMATCH,
                    format!(
                        "Operator `{}` cannot be used between `{}` ({} bits) and `{}` ({} bits); convert one side with `'to`",
                        op,
                        self.type_name(lhs),
                        l.bits,
                        self.type_name(rhs),
                        r.bits
                    ),
                    range,
                ));
            }
            if l == r {
                return Ok(());
            }
        }
        if op.is_bitwise() {
            let underlying = |ty: TypeId| self.types.choice_of(ty).map(|c| c.underlying);
            if underlying(lhs) == Some(rhs) || underlying(rhs) == Some(lhs) {
                return Ok(());
            }
        }
        Err(CompileError::at(
            codes::TYPE_MISMATCH,
            format!(
                "Operator `{}` cannot be used between `{}` and `{}`",
                op,
                self.type_name(lhs),
                self.type_name(rhs)
            ),
            range,
        ))
    }

    pub(crate) fn lower_binary(
        &mut self,
        ctx: &EmitCtx,
        op: BinaryOperator,
        lhs: &Expression,
        rhs: &Expression,
        range: FileRange,
    ) -> CompileResult<Value> {
        if op.is_logical() {
            return self.lower_logical(ctx, op, lhs, rhs, range);
        }

        let (left, right) = if lhs.needs_inference() && !rhs.needs_inference() {
            let right = self.lower_expr(ctx, rhs, Expect::none())?;
            let hint = self.types.non_reference(right.ty);
            let left = self.lower_expr(ctx, lhs, Expect::of(hint))?;
            (left, right)
        } else {
            let left = self.lower_expr(ctx, lhs, Expect::none())?;
            let hint = self.types.non_reference(left.ty);
            let right = self.lower_expr(ctx, rhs, Expect::of(hint))?;
            (left, right)
        };

        let left_ty = self.types.non_reference(left.ty);
        if self.types.struct_of(left_ty).is_some()
            || !self.operator_members(left_ty, op).is_empty()
        {
            return self.lower_operator_call(op, left, right, range);
        }

        let left = self.to_rvalue(left)?;
        let right = self.to_rvalue(right)?;
        if left.ty == TypeContext::STR && right.ty == TypeContext::STR && op.is_equality() {
            return self.lower_string_equality(op, left, right, range);
        }
        self.check_operand_types(op, left.ty, right.ty, range)?;

        if let (Some(l), Some(r)) = (&left.prerun, &right.prerun) {
            let folded = fold_binary(&self.types, op, l, r).map_err(|e| fold_error(e, range))?;
            return Ok(self.constant_value(folded, range));
        }
        self.native_binary(op, left, right, range)
    }

    /// Native operator over two rvalues of compatible types
    pub(crate) fn native_binary(
        &mut self,
        op: BinaryOperator,
        left: Value,
        right: Value,
        range: FileRange,
    ) -> CompileResult<Value> {
        let unsupported = |this: &Self| {
            CompileError::at(
                codes::UNSUPPORTED_OPERATOR,
                format!("Operator `{}` is not supported for `{}`", op, this.type_name(left.ty)),
                range,
            )
        };
        // A choice meeting its underlying type computes in the underlying type
        let operand_ty = match self.types.choice_of(left.ty) {
            Some(def) if right.ty == def.underlying => def.underlying,
            _ => left.ty,
        };
        let class = self.operand_class(operand_ty).ok_or_else(|| unsupported(self))?;

        if op.is_comparison() {
            let pred = comparison(op, class).ok_or_else(|| unsupported(self))?;
            let dest = self.fresh_register(TypeContext::BOOL)?;
            self.emit(IrInstr::Compare {
                dest,
                pred,
                lhs: left.ir,
                rhs: right.ir,
            })?;
            return Ok(Value::temporary(dest, TypeContext::BOOL, range));
        }

        let instr_op = arithmetic(op, class).ok_or_else(|| unsupported(self))?;
        let result_ty = match self.types.get(left.ty) {
            Type::Choice(_) if op.is_bitwise() => left.ty,
            _ => operand_ty,
        };
        let dest = self.fresh_register(result_ty)?;
        self.emit(IrInstr::Binary {
            dest,
            op: instr_op,
            lhs: left.ir,
            rhs: right.ir,
        })?;
        Ok(Value::temporary(dest, result_ty, range))
    }

    fn operand_class(&self, ty: TypeId) -> Option<OperandClass> {
        if let Some(info) = self.types.int_info(ty) {
            return Some(if info.is_signed {
                OperandClass::Signed
            } else {
                OperandClass::Unsigned
            });
        }
        if self.types.float_kind(ty).is_some() {
            return Some(OperandClass::Float);
        }
        match self.types.get(ty) {
            Type::Bool => Some(OperandClass::Bool),
            Type::Char | Type::Choice(_) => Some(OperandClass::Ordinal),
            Type::Mark(mark) if !mark.is_slice => Some(OperandClass::Pointer),
            Type::Native(_) if self.types.is_cstring(ty) => Some(OperandClass::Pointer),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Logical operators
    // ------------------------------------------------------------------

    fn lower_logical(
        &mut self,
        ctx: &EmitCtx,
        op: BinaryOperator,
        lhs: &Expression,
        rhs: &Expression,
        range: FileRange,
    ) -> CompileResult<Value> {
        let left = self.lower_bool(ctx, lhs)?;
        let short_value = op == BinaryOperator::Or;

        if let Some(known) = left.prerun.as_ref().and_then(PrerunValue::as_bool) {
            if known == short_value {
                return Ok(self.constant_value(PrerunValue::bool(TypeContext::BOOL, known), range));
            }
            return self.lower_bool(ctx, rhs);
        }

        let from = self.current_block()?;
        let rhs_block = self.new_block(Some("logic.rhs"))?;
        let end = self.new_block(Some("logic.end"))?;
        match op {
            BinaryOperator::And => self.branch(left.ir, rhs_block, end)?,
            _ => self.branch(left.ir, end, rhs_block)?,
        }

        self.switch_to(rhs_block)?;
        let right = self.lower_bool(ctx, rhs)?;
        let rhs_end = self.current_block()?;
        self.jump(end)?;

        self.switch_to(end)?;
        let incoming: Vec<(IrValue, BasicBlockId)> = vec![
            (IrConstant::bool(TypeContext::BOOL, short_value).into(), from),
            (right.ir, rhs_end),
        ];
        let dest = self.fresh_register(TypeContext::BOOL)?;
        self.emit(IrInstr::Phi { dest, incoming })?;
        Ok(Value::temporary(dest, TypeContext::BOOL, range))
    }

    /// Lower a condition and require it to be `bool`
    pub(crate) fn lower_bool(&mut self, ctx: &EmitCtx, expr: &Expression) -> CompileResult<Value> {
        let value = self.lower_expr(ctx, expr, Expect::of(TypeContext::BOOL))?;
        let value = self.to_rvalue(value)?;
        if value.ty != TypeContext::BOOL {
            return Err(self.mismatch(TypeContext::BOOL, value.ty, expr.range));
        }
        Ok(value)
    }

    // ------------------------------------------------------------------
    // Operator members
    // ------------------------------------------------------------------

    pub(crate) fn operator_members(&self, ty: TypeId, op: BinaryOperator) -> Vec<MemberFunction> {
        self.types
            .members_of(ty)
            .into_iter()
            .filter(|m| matches!(m.kind, MemberKind::BinaryOperator { op: o, .. } if o == op))
            .cloned()
            .collect()
    }

    /// Call the operator member of the left operand's type that accepts the
    /// right operand. Normal operators win over variation operators.
    pub(crate) fn lower_operator_call(
        &mut self,
        op: BinaryOperator,
        left: Value,
        right: Value,
        range: FileRange,
    ) -> CompileResult<Value> {
        let ty = self.types.non_reference(left.ty);
        let right_ty = self.types.non_reference(right.ty);
        let candidates: Vec<MemberFunction> = self
            .operator_members(ty, op)
            .into_iter()
            .filter(|m| m.args.len() == 1 && self.arg_accepts(m.args[0].ty, &right))
            .collect();

        let lhs_mutable = left.is_mutable(&self.types);
        let member = match candidates.iter().find(|m| !m.kind.is_variation()) {
            Some(member) => member.clone(),
            None => match candidates.first() {
                Some(member) if lhs_mutable => member.clone(),
                Some(_) => {
                    return Err(CompileError::at(
                        codes::NOT_VARIABLE,
                        format!(
                            "The only operator `{}` of `{}` accepting `{}` is a variation operator, but the left-hand side is not variable",
                            op,
                            self.type_name(ty),
                            self.type_name(right_ty)
                        ),
                        range,
                    ))
                }
                None => {
                    return Err(CompileError::at(
                        codes::UNSUPPORTED_OPERATOR,
                        format!(
                            "No operator `{}` of `{}` accepts a right-hand side of type `{}`",
                            op,
                            self.type_name(ty),
                            self.type_name(right_ty)
                        ),
                        range,
                    ))
                }
            },
        };
        trace!(
            operator = op.symbol(),
            ty = %self.type_name(ty),
            variation = member.kind.is_variation(),
            "operator overload chosen"
        );

        let instance = self.into_place(left)?;
        let arg = self.pass_value(right, member.args[0].ty, range)?;
        self.call_member(&member, Some(instance.ir), vec![arg], range)
    }
}

fn comparison(op: BinaryOperator, class: OperandClass) -> Option<CmpPredicate> {
    use BinaryOperator as B;
    use CmpPredicate as P;
    use OperandClass as C;
    Some(match (op, class) {
        (B::Eq, C::Float) => P::FloatEq,
        (B::NotEq, C::Float) => P::FloatNe,
        (B::Eq, _) => P::Eq,
        (B::NotEq, _) => P::Ne,
        (B::Lt, C::Signed) => P::SignedLt,
        (B::LtEq, C::Signed) => P::SignedLe,
        (B::Gt, C::Signed) => P::SignedGt,
        (B::GtEq, C::Signed) => P::SignedGe,
        (B::Lt, C::Unsigned | C::Ordinal) => P::UnsignedLt,
        (B::LtEq, C::Unsigned | C::Ordinal) => P::UnsignedLe,
        (B::Gt, C::Unsigned | C::Ordinal) => P::UnsignedGt,
        (B::GtEq, C::Unsigned | C::Ordinal) => P::UnsignedGe,
        (B::Lt, C::Float) => P::FloatLt,
        (B::LtEq, C::Float) => P::FloatLe,
        (B::Gt, C::Float) => P::FloatGt,
        (B::GtEq, C::Float) => P::FloatGe,
        _ => return None,
    })
}

fn arithmetic(op: BinaryOperator, class: OperandClass) -> Option<BinaryOp> {
    use BinaryOperator as B;
    use OperandClass as C;
    Some(match (op, class) {
        (B::Add, C::Signed | C::Unsigned) => BinaryOp::Add,
        (B::Sub, C::Signed | C::Unsigned) => BinaryOp::Sub,
        (B::Mul, C::Signed | C::Unsigned) => BinaryOp::Mul,
        (B::Div, C::Signed) => BinaryOp::SignedDiv,
        (B::Div, C::Unsigned) => BinaryOp::UnsignedDiv,
        (B::Rem, C::Signed) => BinaryOp::SignedRem,
        (B::Rem, C::Unsigned) => BinaryOp::UnsignedRem,
        (B::Add, C::Float) => BinaryOp::FloatAdd,
        (B::Sub, C::Float) => BinaryOp::FloatSub,
        (B::Mul, C::Float) => BinaryOp::FloatMul,
        (B::Div, C::Float) => BinaryOp::FloatDiv,
        (B::Rem, C::Float) => BinaryOp::FloatRem,
        (B::BitAnd, C::Signed | C::Unsigned | C::Bool | C::Ordinal) => BinaryOp::And,
        (B::BitOr, C::Signed | C::Unsigned | C::Bool | C::Ordinal) => BinaryOp::Or,
        (B::BitXor, C::Signed | C::Unsigned | C::Bool | C::Ordinal) => BinaryOp::Xor,
        (B::Shl, C::Signed | C::Unsigned) => BinaryOp::Shl,
        (B::Shr, C::Signed) => BinaryOp::ArithmeticShr,
        (B::Shr, C::Unsigned) => BinaryOp::LogicalShr,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signedness_selects_instruction() {
        assert_eq!(
            arithmetic(BinaryOperator::Div, OperandClass::Signed),
            Some(BinaryOp::SignedDiv)
        );
        assert_eq!(
            arithmetic(BinaryOperator::Shr, OperandClass::Unsigned),
            Some(BinaryOp::LogicalShr)
        );
        assert_eq!(
            comparison(BinaryOperator::Lt, OperandClass::Float),
            Some(CmpPredicate::FloatLt)
        );
        assert_eq!(
            comparison(BinaryOperator::GtEq, OperandClass::Unsigned),
            Some(CmpPredicate::UnsignedGe)
        );
    }

    #[test]
    fn test_unsupported_combinations() {
        assert_eq!(arithmetic(BinaryOperator::Add, OperandClass::Bool), None);
        assert_eq!(arithmetic(BinaryOperator::Shl, OperandClass::Float), None);
        assert_eq!(comparison(BinaryOperator::Lt, OperandClass::Bool), None);
        assert_eq!(comparison(BinaryOperator::Eq, OperandClass::Pointer), Some(CmpPredicate::Eq));
    }
}
