//! Local declarations
//!
//! A value local owns one stack slot. When the initializer constructs a
//! value it is built straight into that slot; a fresh temporary produced
//! without a declared type is adopted as the slot instead of copied.

use tracing::trace;

use crate::ast::LocalDeclaration;
use crate::ctx::EmitCtx;
use crate::diagnostic::Diagnostic;
use crate::error::{codes, CompileError, CompileResult};
use crate::ir::IrValue;
use crate::span::FileRange;
use crate::types::{Type, TypeContext, TypeId};
use crate::value::{Storage, Value};

use super::{Expect, LocalVar, Lowerer};

impl<'a> Lowerer<'a> {
    pub(crate) fn lower_local(
        &mut self,
        ctx: &EmitCtx,
        decl: &LocalDeclaration,
        range: FileRange,
    ) -> CompileResult<()> {
        let declared = match &decl.ty {
            Some(ty) => Some(self.resolve_type(ctx, ty)?),
            None => None,
        };
        if decl.is_reference {
            return self.lower_reference_local(ctx, decl, declared, range);
        }
        if let Some(ty) = declared.filter(|ty| self.types.is_reference(*ty)) {
            return Err(CompileError::at(
                codes::TYPE_MISMATCH,
                format!(
                    "Local `{}` has the reference type `{}`; declare it with `ref` instead",
                    decl.name,
                    self.type_name(ty)
                ),
                range,
            ));
        }

        let (address, ty, prerun) = match &decl.value {
            Some(expr) => {
                let slot = match declared {
                    Some(ty) => {
                        self.require_sized(ty, range)?;
                        let slot = self.alloca(ty, Some(decl.name.as_str()))?;
                        Some(Value::at(slot, ty, true, Storage::TempSlot, range))
                    }
                    None => None,
                };
                let expect = match &slot {
                    Some(slot) => Expect::in_slot(slot.clone()),
                    None => Expect::none(),
                };
                let value = self.lower_expr(ctx, expr, expect)?;
                let ty = match declared {
                    Some(ty) => ty,
                    None => self.types.non_reference(value.ty),
                };
                if self.types.non_reference(value.ty) != ty {
                    return Err(self.mismatch(ty, value.ty, expr.range));
                }
                self.check_local_type(decl, ty, range)?;

                let prerun = value
                    .prerun
                    .clone()
                    .filter(|_| !value.is_variable && !decl.is_variable);
                let address = match slot {
                    Some(slot) if value.ir == slot.ir && value.storage != Storage::Temporary => {
                        trace!(local = %decl.name, "local constructed in place");
                        slot.ir
                    }
                    None if value.is_temp_slot() && !self.types.is_reference(value.ty) => {
                        trace!(local = %decl.name, "local adopts a temporary slot");
                        value.ir
                    }
                    Some(slot) => {
                        let operand = self.pass_value(value, ty, expr.range)?;
                        self.store(operand, slot.ir.clone())?;
                        slot.ir
                    }
                    None => {
                        let slot: IrValue = self.alloca(ty, Some(decl.name.as_str()))?.into();
                        let operand = self.pass_value(value, ty, expr.range)?;
                        self.store(operand, slot.clone())?;
                        slot
                    }
                };
                (address, ty, prerun)
            }
            None => {
                let ty = declared.ok_or_else(|| {
                    CompileError::at(
                        codes::MISSING_VALUE,
                        format!("Local `{}` needs either a type or a value", decl.name),
                        range,
                    )
                })?;
                self.check_local_type(decl, ty, range)?;
                if matches!(self.types.get(ty), Type::Maybe(_)) && !decl.is_variable {
                    self.warn(
                        Diagnostic::warning(format!(
                            "Local `{}` of type `{}` starts empty and is not variable, so it can never hold a value",
                            decl.name,
                            self.type_name(ty)
                        ))
                        .with_code(codes::MAYBE_UNUSABLE)
                        .with_primary_label(decl.name.range, ""),
                    );
                }
                let slot = self.alloca(ty, Some(decl.name.as_str()))?;
                let slot_value = Value::at(slot, ty, true, Storage::TempSlot, range);
                let value =
                    self.lower_default(ctx, ty, Expect::in_slot(slot_value.clone()), range)?;
                let prerun = value.prerun.clone().filter(|_| !decl.is_variable);
                if value.ir != slot_value.ir {
                    let operand = self.pass_value(value, ty, range)?;
                    self.store(operand, slot_value.ir.clone())?;
                }
                (slot_value.ir, ty, prerun)
            }
        };

        self.declare_local(LocalVar {
            name: decl.name.clone(),
            address,
            ty,
            is_variable: decl.is_variable,
            is_reference: false,
            prerun,
        })?;
        Ok(())
    }

    fn check_local_type(
        &self,
        decl: &LocalDeclaration,
        ty: TypeId,
        range: FileRange,
    ) -> CompileResult<()> {
        if ty == TypeContext::VOID {
            return Err(CompileError::at(
                codes::TYPE_MISMATCH,
                format!("Local `{}` cannot hold a value of type `void`", decl.name),
                range,
            ));
        }
        self.require_sized(ty, range)
    }

    /// `new ref x = place`: binds the address, never copies
    fn lower_reference_local(
        &mut self,
        ctx: &EmitCtx,
        decl: &LocalDeclaration,
        declared: Option<TypeId>,
        range: FileRange,
    ) -> CompileResult<()> {
        let expr = decl.value.as_ref().ok_or_else(|| {
            CompileError::at(
                codes::MISSING_VALUE,
                format!("Reference `{}` needs a value to refer to", decl.name),
                range,
            )
        })?;
        let hint = declared.map(|ty| self.types.non_reference(ty));
        let value = self.lower_expr(ctx, expr, Expect::maybe(hint))?;
        let subtype = self.types.non_reference(value.ty);
        if let Some(expected) = hint {
            if expected != subtype {
                return Err(self.mismatch(expected, value.ty, expr.range));
            }
        }
        let ty = self.types.reference(subtype, decl.is_variable);
        let address = self.pass_value(value, ty, expr.range)?;
        self.declare_local(LocalVar {
            name: decl.name.clone(),
            address,
            ty,
            is_variable: decl.is_variable,
            is_reference: true,
            prerun: None,
        })?;
        Ok(())
    }
}
