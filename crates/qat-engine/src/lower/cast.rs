//! `value'to T`

use tracing::trace;

use crate::ast::{Expression, TypeExpr};
use crate::ctx::EmitCtx;
use crate::error::{codes, CompileError, CompileResult};
use crate::ir::{CastKind, CmpPredicate, IrConstant, IrInstr, IrValue};
use crate::prerun::fold_cast;
use crate::span::FileRange;
use crate::types::{IntInfo, MemberFunction, MemberKind, Type, TypeContext, TypeId};
use crate::value::Value;

use super::{Expect, Lowerer};

impl<'a> Lowerer<'a> {
    pub(crate) fn emit_cast(
        &mut self,
        kind: CastKind,
        value: IrValue,
        target: TypeId,
    ) -> CompileResult<IrValue> {
        let dest = self.fresh_register(target)?;
        self.emit(IrInstr::Cast { dest, kind, value })?;
        Ok(dest.into())
    }

    /// Integer width of the values a type is represented by
    fn int_repr(&self, ty: TypeId) -> Option<IntInfo> {
        match self.types.get(ty) {
            Type::Char => Some(IntInfo {
                bits: 32,
                is_signed: false,
            }),
            Type::Bool => Some(IntInfo {
                bits: 1,
                is_signed: false,
            }),
            Type::Choice(id) => self.types.int_info(self.types.choice_def(*id).underlying),
            _ => self.types.int_info(ty),
        }
    }

    /// Resize an integer value to another integer type
    pub(crate) fn convert_int(&mut self, value: Value, target: TypeId) -> CompileResult<Value> {
        if value.ty == target {
            return Ok(value);
        }
        let range = value.range;
        let (Some(from), Some(to)) = (self.int_repr(value.ty), self.int_repr(target)) else {
            return Err(self.mismatch(target, value.ty, range));
        };
        if let Some(known) = &value.prerun {
            if let Ok(folded) = fold_cast(&self.types, known, target) {
                return Ok(self.constant_value(folded, range));
            }
        }
        let kind = resize_kind(from, to);
        let result = self.emit_cast(kind, value.ir, target)?;
        Ok(Value::temporary(result, target, range))
    }

    pub(crate) fn lower_cast(
        &mut self,
        ctx: &EmitCtx,
        value: &Expression,
        target: &TypeExpr,
        range: FileRange,
    ) -> CompileResult<Value> {
        let target = self.resolve_type(ctx, target)?;
        let source = self.lower_expr(ctx, value, Expect::none())?;
        let from = self.types.non_reference(source.ty);

        let convertor: Option<MemberFunction> = self
            .types
            .members_of(from)
            .into_iter()
            .find(|m| m.kind == MemberKind::ToConvertor && m.return_type == target)
            .cloned();
        if let Some(member) = convertor {
            if !self.modules.is_accessible(&member.visibility, &ctx.access()) {
                return Err(CompileError::at(
                    codes::NOT_ACCESSIBLE,
                    format!(
                        "The convertor of `{}` to `{}` is {} and not accessible here",
                        self.type_name(from),
                        self.type_name(target),
                        member.visibility.describe()
                    ),
                    range,
                ));
            }
            trace!(
                from = %self.type_name(from),
                to = %self.type_name(target),
                "to convertor chosen"
            );
            let instance = self.into_place(source)?;
            return self.call_member(&member, Some(instance.ir), Vec::new(), range);
        }

        let source = self.to_rvalue(source)?;
        if from == target {
            return Ok(source);
        }
        if let Some(known) = &source.prerun {
            if let Ok(folded) = fold_cast(&self.types, known, target) {
                return Ok(self.constant_value(folded, range));
            }
        }

        let invalid = |this: &Self| {
            CompileError::at(
                codes::INVALID_CAST,
                format!(
                    "Cannot cast a value of type `{}` to `{}`",
                    this.type_name(from),
                    this.type_name(target)
                ),
                range,
            )
        };

        if target == TypeContext::BOOL {
            if self.types.int_info(from).is_none() {
                return Err(invalid(self));
            }
            let dest = self.fresh_register(TypeContext::BOOL)?;
            self.emit(IrInstr::Compare {
                dest,
                pred: CmpPredicate::Ne,
                lhs: source.ir,
                rhs: IrConstant::int(from, 0).into(),
            })?;
            return Ok(Value::temporary(dest, TypeContext::BOOL, range));
        }
        if self.types.choice_of(target).is_some() {
            // Only known values can be checked against the variants
            return Err(invalid(self));
        }

        let kind = self.runtime_cast_kind(from, target).ok_or_else(|| invalid(self))?;
        let operand = match self.types.get(from) {
            Type::StringSlice => self.str_parts(source.ir)?.0,
            _ => source.ir,
        };
        let result = self.emit_cast(kind, operand, target)?;
        Ok(Value::temporary(result, target, range))
    }

    fn runtime_cast_kind(&self, from: TypeId, to: TypeId) -> Option<CastKind> {
        let pointer_width = self.types.pointer_width();
        let from_mark = self.types.get(from).as_mark().copied().filter(|m| !m.is_slice);
        let to_mark = self.types.get(to).as_mark().copied().filter(|m| !m.is_slice);
        let to_is_char = *self.types.get(to) == Type::Char;

        if let (Some(source), Some(info)) = (self.int_repr(from), self.types.int_info(to)) {
            return Some(resize_kind(source, info));
        }
        if let (Some(source), true) = (self.types.int_info(from), to_is_char) {
            return Some(resize_kind(source, IntInfo { bits: 32, is_signed: false }));
        }
        if let (Some(source), Some(_)) = (self.int_repr(from), self.types.float_kind(to)) {
            return Some(if source.is_signed {
                CastKind::SignedToFloat
            } else {
                CastKind::UnsignedToFloat
            });
        }
        if let (Some(_), Some(info)) = (self.types.float_kind(from), self.types.int_info(to)) {
            return Some(if info.is_signed {
                CastKind::FloatToSigned
            } else {
                CastKind::FloatToUnsigned
            });
        }
        if let (Some(source), Some(target)) =
            (self.types.float_kind(from), self.types.float_kind(to))
        {
            return Some(match source.bitwidth().cmp(&target.bitwidth()) {
                std::cmp::Ordering::Greater => CastKind::FloatTrunc,
                std::cmp::Ordering::Less => CastKind::FloatExtend,
                std::cmp::Ordering::Equal => CastKind::Bitcast,
            });
        }

        let is_byte_mark = |mark: Option<crate::types::MarkType>| {
            mark.is_some_and(|m| m.subtype == TypeContext::U8)
        };
        match (from_mark, to_mark) {
            (Some(_), Some(_)) => return Some(CastKind::Bitcast),
            (Some(_), None) if self.types.is_cstring(to) => return Some(CastKind::Bitcast),
            (None, Some(_)) if self.types.is_cstring(from) && is_byte_mark(to_mark) => {
                return Some(CastKind::Bitcast)
            }
            (None, Some(_))
                if self
                    .types
                    .int_info(from)
                    .is_some_and(|i| i.bits == pointer_width) =>
            {
                return Some(CastKind::IntToPointer)
            }
            _ => {}
        }
        if from_mark.is_some() && self.types.int_info(to).is_some_and(|i| i.bits == pointer_width) {
            return Some(CastKind::PointerToInt);
        }
        if *self.types.get(from) == Type::StringSlice && self.types.is_cstring(to) {
            return Some(CastKind::Bitcast);
        }
        None
    }
}

fn resize_kind(from: IntInfo, to: IntInfo) -> CastKind {
    match from.bits.cmp(&to.bits) {
        std::cmp::Ordering::Greater => CastKind::Trunc,
        std::cmp::Ordering::Less if from.is_signed => CastKind::SignExtend,
        std::cmp::Ordering::Less => CastKind::ZeroExtend,
        std::cmp::Ordering::Equal => CastKind::Bitcast,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_kind() {
        let i8_info = IntInfo { bits: 8, is_signed: true };
        let u8_info = IntInfo { bits: 8, is_signed: false };
        let i32_info = IntInfo { bits: 32, is_signed: true };
        assert_eq!(resize_kind(i8_info, i32_info), CastKind::SignExtend);
        assert_eq!(resize_kind(u8_info, i32_info), CastKind::ZeroExtend);
        assert_eq!(resize_kind(i32_info, u8_info), CastKind::Trunc);
        assert_eq!(resize_kind(i8_info, u8_info), CastKind::Bitcast);
    }
}
