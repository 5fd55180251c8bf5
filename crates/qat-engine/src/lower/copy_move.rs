//! Passing values, `'copy` and `'move`
//!
//! A value in memory may only be copied implicitly when its type has a
//! simple copy. Everything else needs an explicit `'copy` or `'move`. A
//! simple move of a type without a simple copy resets the source to zero,
//! which is reported as a warning.

use tracing::trace;

use crate::ast::Expression;
use crate::ctx::EmitCtx;
use crate::diagnostic::Diagnostic;
use crate::error::{codes, CompileError, CompileResult};
use crate::ir::{IrConstant, IrValue};
use crate::span::FileRange;
use crate::types::{MemberFunction, MemberKind, TypeId};
use crate::value::{Storage, Value};

use super::{Expect, Lowerer};

impl<'a> Lowerer<'a> {
    /// Turn `value` into an operand of type `target`
    ///
    /// Reference targets receive the address of the value; value targets
    /// receive the value itself.
    pub(crate) fn pass_value(
        &mut self,
        value: Value,
        target: TypeId,
        range: FileRange,
    ) -> CompileResult<IrValue> {
        if let Some(reference) = self.types.reference_info(target) {
            if let Some(source) = self.types.reference_info(value.ty) {
                if source.subtype != reference.subtype {
                    return Err(self.mismatch(target, value.ty, range));
                }
                if reference.is_subtype_variable && !source.is_subtype_variable {
                    return Err(self.widened(reference.subtype, range));
                }
                return Ok(self.reference_address(value)?.ir);
            }
            if value.ty != reference.subtype {
                return Err(self.mismatch(target, value.ty, range));
            }
            let place = self.as_place(value)?.ok_or_else(|| {
                CompileError::at(
                    codes::NOT_ADDRESSABLE,
                    "A temporary value cannot be bound to a reference",
                    range,
                )
            })?;
            if reference.is_subtype_variable && !place.is_mutable(&self.types) {
                return Err(self.widened(reference.subtype, range));
            }
            return Ok(place.ir);
        }

        if self.types.non_reference(value.ty) != target {
            return Err(self.mismatch(target, value.ty, range));
        }
        if value.storage == Storage::Temporary && !self.types.is_reference(value.ty) {
            return Ok(value.ir);
        }
        if value.is_temp_slot() || self.types.has_simple_copy(target) {
            return Ok(self.to_rvalue(value)?.ir);
        }
        Err(CompileError::fatal(
            Diagnostic::error(format!(
                "A value of type `{}` cannot be copied implicitly",
                self.type_name(target)
            ))
            .with_code(codes::NON_TRIVIAL_COPY)
            .with_primary_label(range, "")
            .with_help("use 'copy or 'move"),
        ))
    }

    fn widened(&self, ty: TypeId, range: FileRange) -> CompileError {
        CompileError::at(
            codes::VARIABILITY_WIDENED,
            format!(
                "Cannot get variable access to a value of type `{}` that is not variable",
                self.type_name(ty)
            ),
            range,
        )
    }

    pub(crate) fn lifecycle_member(&self, ty: TypeId, kind: MemberKind) -> Option<MemberFunction> {
        self.types
            .members_of(ty)
            .into_iter()
            .find(|m| m.kind == kind)
            .cloned()
    }

    /// Slot a constructing expression writes into: the expected slot when
    /// its type matches, else a fresh one
    pub(crate) fn target_slot(
        &mut self,
        ty: TypeId,
        expect: &Expect,
        range: FileRange,
    ) -> CompileResult<Value> {
        match &expect.create_in {
            Some(slot) if slot.ty == ty => {
                trace!(ty = %self.type_name(ty), "constructing in place");
                Ok(slot.clone())
            }
            _ => self.temp_slot(ty, range),
        }
    }

    pub(crate) fn lower_copy(
        &mut self,
        ctx: &EmitCtx,
        inner: &Expression,
        expect: Expect,
        range: FileRange,
    ) -> CompileResult<Value> {
        let value = self.lower_expr(ctx, inner, expect.hint())?;
        let Some(place) = self.as_place(value.clone())? else {
            return Ok(value);
        };
        let ty = place.ty;
        if self.types.has_simple_copy(ty) {
            return self.to_rvalue(place);
        }
        match self.lifecycle_member(ty, MemberKind::CopyConstructor) {
            Some(member) => {
                let slot = self.target_slot(ty, &expect, range)?;
                self.call_member(&member, Some(slot.ir.clone()), vec![place.ir], range)?;
                Ok(slot)
            }
            None => Err(CompileError::at(
                codes::NON_TRIVIAL_COPY,
                format!(
                    "Type `{}` has no copy constructor and cannot be copied",
                    self.type_name(ty)
                ),
                range,
            )),
        }
    }

    pub(crate) fn lower_move(
        &mut self,
        ctx: &EmitCtx,
        inner: &Expression,
        expect: Expect,
        range: FileRange,
    ) -> CompileResult<Value> {
        let value = self.lower_expr(ctx, inner, expect.hint())?;
        if value.is_temp_slot() {
            return Ok(value);
        }
        let Some(place) = self.as_place(value.clone())? else {
            return Ok(value);
        };
        if !place.is_mutable(&self.types) {
            return Err(CompileError::at(
                codes::NOT_VARIABLE,
                format!(
                    "Cannot move out of a value of type `{}` that is not variable",
                    self.type_name(place.ty)
                ),
                inner.range,
            ));
        }
        let ty = place.ty;

        if self.types.has_simple_move(ty) {
            let loaded = self.load(place.ir.clone(), ty)?;
            if !self.types.has_simple_copy(ty) {
                self.store(IrConstant::zero(ty).into(), place.ir)?;
                trace!(ty = %self.type_name(ty), "trivial move resets the source");
                self.warn(
                    Diagnostic::warning(format!(
                        "Moving this value of type `{}` resets its storage to zero",
                        self.type_name(ty)
                    ))
                    .with_code(codes::TRIVIAL_MOVE)
                    .with_primary_label(inner.range, "moved out here"),
                );
            }
            return Ok(Value::temporary(loaded, ty, range));
        }
        match self.lifecycle_member(ty, MemberKind::MoveConstructor) {
            Some(member) => {
                let slot = self.target_slot(ty, &expect, range)?;
                self.call_member(&member, Some(slot.ir.clone()), vec![place.ir], range)?;
                Ok(slot)
            }
            None => Err(CompileError::at(
                codes::NON_TRIVIAL_COPY,
                format!(
                    "Type `{}` has no move constructor and cannot be moved",
                    self.type_name(ty)
                ),
                range,
            )),
        }
    }
}
