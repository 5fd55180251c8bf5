//! Assignment and operator assignment

use tracing::trace;

use crate::ast::{BinaryOperator, Expression};
use crate::ctx::EmitCtx;
use crate::error::{codes, CompileError, CompileResult};
use crate::prerun::eval::fold_error;
use crate::prerun::fold_binary;
use crate::span::FileRange;
use crate::types::{MemberFunction, MemberKind};
use crate::value::{Storage, Value};

use super::{Expect, Lowerer};

impl<'a> Lowerer<'a> {
    /// The variable memory an assignment writes to
    fn assignment_target(&mut self, ctx: &EmitCtx, lhs: &Expression) -> CompileResult<Value> {
        let target = self.lower_expr(ctx, lhs, Expect::none())?;
        let place = self.as_place(target)?.ok_or_else(|| {
            CompileError::at(
                codes::NOT_ADDRESSABLE,
                "Only values that live in memory can be assigned to",
                lhs.range,
            )
        })?;
        if !place.is_mutable(&self.types) {
            return Err(CompileError::at(
                codes::NOT_VARIABLE,
                format!(
                    "Cannot assign to this value of type `{}` as it is not variable",
                    self.type_name(place.ty)
                ),
                lhs.range,
            ));
        }
        Ok(place)
    }

    pub(crate) fn lower_assignment(
        &mut self,
        ctx: &EmitCtx,
        lhs: &Expression,
        rhs: &Expression,
        range: FileRange,
    ) -> CompileResult<()> {
        let place = self.assignment_target(ctx, lhs)?;
        let ty = place.ty;
        let value = self.lower_expr(ctx, rhs, Expect::of(ty))?;
        if self.types.non_reference(value.ty) != ty {
            return Err(self.mismatch(ty, value.ty, rhs.range));
        }

        if !self.types.has_simple_copy(ty) {
            let from_place = self.types.is_reference(value.ty)
                || (value.storage != Storage::Temporary && !value.is_temp_slot());
            let kind = if from_place {
                MemberKind::CopyAssignment
            } else {
                MemberKind::MoveAssignment
            };
            if let Some(member) = self.lifecycle_member(ty, kind) {
                trace!(
                    ty = %self.type_name(ty),
                    kind = kind.describe(),
                    "assignment member chosen"
                );
                let source = self.into_place(value)?;
                self.call_member(&member, Some(place.ir), vec![source.ir], range)?;
                return Ok(());
            }
        }
        let operand = self.pass_value(value, ty, rhs.range)?;
        self.store(operand, place.ir)
    }

    /// `lhs op= rhs`: a variation operator of the left type, or the native
    /// operator followed by a store
    pub(crate) fn lower_operator_assignment(
        &mut self,
        ctx: &EmitCtx,
        op: BinaryOperator,
        lhs: &Expression,
        rhs: &Expression,
        range: FileRange,
    ) -> CompileResult<()> {
        let place = self.assignment_target(ctx, lhs)?;
        let ty = place.ty;

        let variations: Vec<MemberFunction> = self
            .operator_members(ty, op)
            .into_iter()
            .filter(|m| m.kind.is_variation() && m.args.len() == 1)
            .collect();
        if !variations.is_empty() {
            let hint = match variations.as_slice() {
                [only] => Some(self.types.non_reference(only.args[0].ty)),
                _ => None,
            };
            let value = self.lower_expr(ctx, rhs, Expect::maybe(hint))?;
            let member = variations
                .iter()
                .find(|m| self.arg_accepts(m.args[0].ty, &value))
                .cloned()
                .ok_or_else(|| {
                    CompileError::at(
                        codes::UNSUPPORTED_OPERATOR,
                        format!(
                            "No variation operator `{}` of `{}` accepts a right-hand side of type `{}`",
                            op,
                            self.type_name(ty),
                            self.type_name(value.ty)
                        ),
                        range,
                    )
                })?;
            let arg = self.pass_value(value, member.args[0].ty, rhs.range)?;
            self.call_member(&member, Some(place.ir), vec![arg], range)?;
            return Ok(());
        }
        if self.types.struct_of(ty).is_some() {
            return Err(CompileError::at(
                codes::UNSUPPORTED_OPERATOR,
                format!("Type `{}` has no variation operator `{}`", self.type_name(ty), op),
                range,
            ));
        }

        let current = self.to_rvalue(place.clone())?;
        let right = self.lower_rvalue(ctx, rhs, Expect::of(ty))?;
        self.check_operand_types(op, current.ty, right.ty, range)?;
        let result = match (&current.prerun, &right.prerun) {
            (Some(l), Some(r)) => {
                let folded = fold_binary(&self.types, op, l, r).map_err(|e| fold_error(e, range))?;
                self.constant_value(folded, range)
            }
            _ => self.native_binary(op, current, right, range)?,
        };
        if result.ty != ty {
            return Err(self.mismatch(ty, result.ty, range));
        }
        self.store(result.ir, place.ir)
    }
}
