//! Constructors, plain initializers, variants and `default`
//!
//! Every constructing expression writes into [`Lowerer::target_slot`], so
//! a local declared from a constructor call owns the only slot involved.

use tracing::trace;

use crate::ast::Expression;
use crate::ctx::EmitCtx;
use crate::diagnostic::Diagnostic;
use crate::error::{codes, CompileError, CompileResult};
use crate::ir::{IrConstant, IrInstr, IrValue};
use crate::prerun::{ConstData, PrerunValue};
use crate::span::{FileRange, Identifier};
use crate::types::{MemberFunction, MemberKind, TypeId};
use crate::value::Value;

use super::{Expect, Lowerer};

impl<'a> Lowerer<'a> {
    /// `T(args)` and `T::from(arg)`
    ///
    /// No arguments means the default value. A single argument prefers a
    /// `from` convertor over a one-argument constructor.
    pub(crate) fn construct(
        &mut self,
        ctx: &EmitCtx,
        ty: TypeId,
        args: &[Expression],
        expect: Expect,
        range: FileRange,
    ) -> CompileResult<Value> {
        let ty = self.types.non_reference(ty);
        if args.is_empty() {
            return self.lower_default(ctx, ty, expect, range);
        }

        let candidates: Vec<MemberFunction> = {
            let mut found: Vec<MemberFunction> = self
                .types
                .members_of(ty)
                .into_iter()
                .filter(|m| {
                    m.args.len() == args.len()
                        && match m.kind {
                            MemberKind::FromConvertor => args.len() == 1,
                            MemberKind::Constructor => true,
                            _ => false,
                        }
                })
                .cloned()
                .collect();
            found.sort_by_key(|m| m.kind != MemberKind::FromConvertor);
            found
        };

        if candidates.is_empty() {
            if let ([only], false) = (args, self.types.struct_of(ty).is_some()) {
                let value = self.lower_expr(ctx, only, Expect::of(ty))?;
                if self.types.non_reference(value.ty) == ty {
                    return self.to_rvalue(value);
                }
            }
            return Err(CompileError::at(
                codes::MISSING_CONSTRUCTOR,
                format!(
                    "Type `{}` has no constructor or convertor taking {} argument{}",
                    self.type_name(ty),
                    args.len(),
                    if args.len() == 1 { "" } else { "s" }
                ),
                range,
            ));
        }

        // With a single candidate its parameter types guide literal inference
        let hints: Vec<Option<TypeId>> = match candidates.as_slice() {
            [only] => only.args.iter().map(|a| Some(self.types.non_reference(a.ty))).collect(),
            _ => vec![None; args.len()],
        };
        let mut values = Vec::with_capacity(args.len());
        for (arg, hint) in args.iter().zip(hints) {
            values.push(self.lower_expr(ctx, arg, Expect::maybe(hint))?);
        }

        let chosen = candidates
            .iter()
            .find(|m| {
                m.args
                    .iter()
                    .zip(&values)
                    .all(|(param, value)| self.arg_accepts(param.ty, value))
            })
            .cloned();
        let Some(member) = chosen else {
            let given: Vec<String> = values
                .iter()
                .map(|v| format!("`{}`", self.type_name(v.ty)))
                .collect();
            return Err(Diagnostic::error(format!(
                "Type `{}` has no constructor or convertor accepting arguments of type {}",
                self.type_name(ty),
                given.join(", ")
            ))
            .with_code(codes::MISSING_CONSTRUCTOR)
            .with_primary_label(range, "")
            .with_secondary_label(
                candidates[0].range,
                "a candidate with the same number of arguments",
            )
            .into());
        };
        if !self.modules.is_accessible(&member.visibility, &ctx.access()) {
            return Err(CompileError::at(
                codes::NOT_ACCESSIBLE,
                format!(
                    "The {} of `{}` is {} and not accessible here",
                    member.kind.describe(),
                    self.type_name(ty),
                    member.visibility.describe()
                ),
                range,
            ));
        }

        let mut operands = Vec::with_capacity(values.len());
        for (value, param) in values.into_iter().zip(&member.args) {
            let at = value.range;
            operands.push(self.pass_value(value, param.ty, at)?);
        }
        let slot = self.target_slot(ty, &expect, range)?;
        trace!(ty = %self.type_name(ty), kind = member.kind.describe(), "constructor chosen");
        self.call_member(&member, Some(slot.ir.clone()), operands, range)?;
        Ok(slot)
    }

    /// `T from { a = x, b = y }` or `T from { x, y }`
    pub(crate) fn lower_plain_initializer(
        &mut self,
        ctx: &EmitCtx,
        ty: TypeId,
        fields: Option<&[Identifier]>,
        values: &[Expression],
        expect: Expect,
        range: FileRange,
    ) -> CompileResult<Value> {
        let ty = self.types.non_reference(ty);
        let order = self.plain_field_order(ctx, ty, fields, values.len(), range)?;
        let field_types: Vec<TypeId> = self
            .types
            .struct_of(ty)
            .map(|def| def.fields().iter().map(|f| f.ty).collect())
            .unwrap_or_default();

        let mut lowered = Vec::with_capacity(values.len());
        for (value, index) in values.iter().zip(&order) {
            let field_ty = field_types[*index];
            let result = self.lower_expr(ctx, value, Expect::of(field_ty))?;
            if self.types.non_reference(result.ty) != field_ty {
                return Err(self.mismatch(field_ty, result.ty, value.range));
            }
            lowered.push(result);
        }

        if self.types.can_be_prerun(ty) {
            let mut items: Vec<Option<ConstData>> = vec![None; field_types.len()];
            for (value, index) in lowered.iter().zip(&order) {
                items[*index] = value
                    .prerun
                    .as_ref()
                    .filter(|_| !value.is_variable)
                    .map(|p| p.data.clone());
            }
            if let Some(items) = items.into_iter().collect::<Option<Vec<_>>>() {
                let known = PrerunValue::new(ConstData::Struct(items), ty);
                return Ok(self.constant_value(known, range));
            }
        }

        let slot = self.target_slot(ty, &expect, range)?;
        for (value, index) in lowered.into_iter().zip(order) {
            let field_ty = field_types[index];
            let at = value.range;
            let operand = self.pass_value(value, field_ty, at)?;
            let ptr = self.field_ptr(slot.ir.clone(), ty, index, field_ty)?;
            self.store(operand, ptr)?;
        }
        Ok(slot)
    }

    pub(crate) fn field_ptr(
        &mut self,
        base: IrValue,
        aggregate: TypeId,
        index: usize,
        member: TypeId,
    ) -> CompileResult<IrValue> {
        let ptr_ty = self.types.mark_to(member, true);
        let dest = self.fresh_register(ptr_ty)?;
        self.emit(IrInstr::FieldPtr {
            dest,
            base,
            aggregate,
            index: index as u32,
        })?;
        Ok(dest.into())
    }

    /// `T::Variant` and `T::Variant(value)` of choice and mix types
    pub(crate) fn lower_variant(
        &mut self,
        ctx: &EmitCtx,
        ty: TypeId,
        variant: &Identifier,
        value: Option<&Expression>,
        expect: Expect,
        range: FileRange,
    ) -> CompileResult<Value> {
        let ty = self.types.non_reference(ty);
        let mix = self.types.mix_of(ty).map(|def| {
            let found = def.variant(variant.as_str()).map(|(index, v)| (index, v.payload));
            (found, def.tag_bits())
        });
        let Some((found, tag_bits)) = mix else {
            if self.types.choice_of(ty).is_none() {
                return Err(CompileError::at(
                    codes::INVALID_VARIANT,
                    format!(
                        "`{}` is neither a mix nor a choice type, so it has no variant `{}`",
                        self.type_name(ty),
                        variant
                    ),
                    variant.range,
                ));
            }
            if let Some(value) = value {
                return Err(CompileError::at(
                    codes::INVALID_VARIANT,
                    format!("Variants of choice type `{}` do not carry values", self.type_name(ty)),
                    value.range,
                ));
            }
            let known = self.prerun_variant(ty, variant, None)?;
            return Ok(self.constant_value(known, range));
        };

        let (index, payload_ty) = found.ok_or_else(|| {
            CompileError::at(
                codes::INVALID_VARIANT,
                format!("Type `{}` has no variant named `{}`", self.type_name(ty), variant),
                variant.range,
            )
        })?;
        let (payload_ty, value) = match (payload_ty, value) {
            (Some(payload_ty), Some(value)) => (payload_ty, value),
            (None, Some(value)) => {
                return Err(CompileError::at(
                    codes::INVALID_VARIANT,
                    format!(
                        "Variant `{}` of `{}` does not carry a value",
                        variant,
                        self.type_name(ty)
                    ),
                    value.range,
                ));
            }
            (_, None) => {
                let known = self.prerun_variant(ty, variant, None)?;
                return Ok(self.constant_value(known, range));
            }
        };

        let payload = self.lower_expr(ctx, value, Expect::of(payload_ty))?;
        if self.types.non_reference(payload.ty) != payload_ty {
            return Err(self.mismatch(payload_ty, payload.ty, value.range));
        }
        if let (Some(known), false) = (payload.prerun.clone(), payload.is_variable) {
            if self.types.can_be_prerun(ty) {
                let folded = self.prerun_variant(ty, variant, Some(known))?;
                return Ok(self.constant_value(folded, range));
            }
        }

        let operand = self.pass_value(payload, payload_ty, value.range)?;
        let slot = self.target_slot(ty, &expect, range)?;
        let tag_ty = self.types.unsigned(tag_bits);
        let tag_ptr = self.field_ptr(slot.ir.clone(), ty, 0, tag_ty)?;
        self.store(IrConstant::int(tag_ty, index as i128).into(), tag_ptr)?;
        let payload_ptr = self.field_ptr(slot.ir.clone(), ty, 1, payload_ty)?;
        self.store(operand, payload_ptr)?;
        Ok(slot)
    }

    /// The default value of `ty`: its default constructor, a compile-time
    /// default, or zeroed memory
    pub(crate) fn lower_default(
        &mut self,
        ctx: &EmitCtx,
        ty: TypeId,
        expect: Expect,
        range: FileRange,
    ) -> CompileResult<Value> {
        let constructor: Option<MemberFunction> = self
            .types
            .members_of(ty)
            .into_iter()
            .find(|m| m.kind == MemberKind::DefaultConstructor)
            .cloned();
        if let Some(member) = constructor {
            if !self.modules.is_accessible(&member.visibility, &ctx.access()) {
                return Err(CompileError::at(
                    codes::NOT_ACCESSIBLE,
                    format!(
                        "The default constructor of `{}` is {} and not accessible here",
                        self.type_name(ty),
                        member.visibility.describe()
                    ),
                    range,
                ));
            }
            let slot = self.target_slot(ty, &expect, range)?;
            self.call_member(&member, Some(slot.ir.clone()), Vec::new(), range)?;
            return Ok(slot);
        }

        match self.default_prerun(ty, range) {
            Ok(known) => Ok(self.constant_value(known, range)),
            Err(error) => {
                let zeroable = self.types.struct_of(ty).is_some()
                    && self.types.is_type_sized(ty)
                    && !self.types.has_member(ty, MemberKind::Constructor)
                    && !self.types.has_member(ty, MemberKind::FromConvertor);
                if !zeroable {
                    return Err(error);
                }
                trace!(ty = %self.type_name(ty), "default value is zeroed memory");
                let slot = self.target_slot(ty, &expect, range)?;
                self.store(IrConstant::zero(ty).into(), slot.ir.clone())?;
                Ok(slot)
            }
        }
    }
}
