//! Member and index access

use crate::ast::Expression;
use crate::ctx::EmitCtx;
use crate::error::{codes, CompileError, CompileResult};
use crate::ir::{IrInstr, IrValue, Register};
use crate::prerun::{ConstData, PrerunValue};
use crate::span::{FileRange, Identifier};
use crate::types::{Type, TypeContext, TypeId};
use crate::value::{Storage, Value};

use super::{Expect, Lowerer};

impl<'a> Lowerer<'a> {
    /// `instance.name`: a field, a tuple member or the length of a sequence
    pub(crate) fn lower_member(
        &mut self,
        ctx: &EmitCtx,
        instance: Value,
        name: &Identifier,
        range: FileRange,
    ) -> CompileResult<Value> {
        let ty = self.types.non_reference(instance.ty);
        let no_member = |this: &Self| {
            CompileError::at(
                codes::NO_MEMBER,
                format!("Type `{}` has no member named `{}`", this.type_name(ty), name),
                name.range,
            )
        };

        match self.types.get(ty).clone() {
            Type::Array(array) if name.as_str() == "length" => Ok(self.constant_value(
                PrerunValue::int(TypeContext::USIZE, i128::from(array.length)),
                range,
            )),
            Type::StringSlice if name.as_str() == "length" => {
                let value = self.to_rvalue(instance)?;
                if let Some(known) = value.prerun.as_ref().and_then(PrerunValue::as_str) {
                    let length = PrerunValue::int(TypeContext::USIZE, known.len() as i128);
                    return Ok(self.constant_value(length, range));
                }
                let (_, length) = self.str_parts(value.ir)?;
                Ok(Value::temporary(length, TypeContext::USIZE, range))
            }
            Type::Mark(mark) if mark.is_slice && name.as_str() == "length" => {
                let value = self.to_rvalue(instance)?;
                let length = self.fresh_register(TypeContext::USIZE)?;
                self.emit(IrInstr::ExtractValue {
                    dest: length,
                    aggregate: value.ir,
                    index: 1,
                })?;
                Ok(Value::temporary(length, TypeContext::USIZE, range))
            }
            Type::Struct(_) => {
                let (index, field_ty, field_variable, visibility, owner) = {
                    let def = self.types.struct_of(ty).ok_or_else(|| no_member(self))?;
                    let (index, field) = def.field(name.as_str()).ok_or_else(|| no_member(self))?;
                    (
                        index,
                        field.ty,
                        field.is_variable,
                        field.visibility.clone(),
                        def.full_name.clone(),
                    )
                };
                if !self.modules.is_accessible(&visibility, &ctx.access()) {
                    return Err(CompileError::at(
                        codes::NOT_ACCESSIBLE,
                        format!(
                            "Field `{}` of `{}` is {} and not accessible here",
                            name,
                            owner,
                            visibility.describe()
                        ),
                        name.range,
                    ));
                }
                self.member_at(instance, ty, index, field_ty, field_variable, range)
            }
            Type::Tuple(tuple) => {
                let index: usize = name.as_str().parse().map_err(|_| no_member(self))?;
                let member_ty = *tuple.members.get(index).ok_or_else(|| no_member(self))?;
                self.member_at(instance, ty, index, member_ty, true, range)
            }
            _ => Err(no_member(self)),
        }
    }

    /// Member `index` of an aggregate, as an address when the aggregate lives in memory
    fn member_at(
        &mut self,
        instance: Value,
        aggregate: TypeId,
        index: usize,
        member_ty: TypeId,
        member_variable: bool,
        range: FileRange,
    ) -> CompileResult<Value> {
        let known = match instance.prerun.as_ref().map(|p| &p.data) {
            Some(ConstData::Struct(items)) | Some(ConstData::Tuple(items))
                if !instance.is_variable =>
            {
                items.get(index).cloned()
            }
            _ => None,
        };
        if let Some(known) = known {
            return Ok(self.constant_value(PrerunValue::new(known, member_ty), range));
        }

        match self.as_place(instance.clone())? {
            Some(place) => {
                let is_variable = place.is_variable && member_variable;
                let ptr_ty = self.types.mark_to(member_ty, is_variable);
                let dest = self.fresh_register(ptr_ty)?;
                self.emit(IrInstr::FieldPtr {
                    dest,
                    base: place.ir,
                    aggregate,
                    index: index as u32,
                })?;
                let storage = match place.storage {
                    Storage::TempSlot => Storage::TempSlot,
                    _ => Storage::Pointee,
                };
                let mut member = Value::at(dest, member_ty, is_variable, storage, range);
                member.local = place.local;
                Ok(member)
            }
            None => {
                let dest = self.fresh_register(member_ty)?;
                self.emit(IrInstr::ExtractValue {
                    dest,
                    aggregate: instance.ir,
                    index: index as u32,
                })?;
                Ok(Value::temporary(dest, member_ty, range))
            }
        }
    }

    /// `instance[index]` over arrays, slices, marks, strings and tuples
    pub(crate) fn lower_index(
        &mut self,
        ctx: &EmitCtx,
        instance: &Expression,
        index: &Expression,
        range: FileRange,
    ) -> CompileResult<Value> {
        let target = self.lower_expr(ctx, instance, Expect::none())?;
        let ty = self.types.non_reference(target.ty);

        if let Type::Tuple(tuple) = self.types.get(ty).clone() {
            let position = self.prerun_expr(ctx, index, Some(TypeContext::USIZE))?;
            let member = position
                .as_int()
                .and_then(|i| usize::try_from(i).ok())
                .filter(|i| *i < tuple.members.len())
                .ok_or_else(|| {
                    CompileError::at(
                        codes::PRERUN_FAILURE,
                        format!(
                            "Index {} is out of range for a tuple of {} members",
                            position,
                            tuple.members.len()
                        ),
                        index.range,
                    )
                })?;
            return self.member_at(target, ty, member, tuple.members[member], true, range);
        }

        let position = self.lower_rvalue(ctx, index, Expect::of(TypeContext::USIZE))?;
        if !self.types.is_integral(position.ty) {
            return Err(self.mismatch(TypeContext::USIZE, position.ty, index.range));
        }

        match self.types.get(ty).clone() {
            Type::Array(array) => {
                if let Some(at) = position.prerun.as_ref().and_then(PrerunValue::as_int) {
                    if at < 0 || at as u128 >= u128::from(array.length) {
                        return Err(CompileError::at(
                            codes::PRERUN_FAILURE,
                            format!(
                                "Index {} is out of range for an array of length {}",
                                at, array.length
                            ),
                            index.range,
                        ));
                    }
                    let item = match target.prerun.as_ref().map(|p| &p.data) {
                        Some(ConstData::Array(items)) if !target.is_variable => {
                            items.get(at as usize).cloned()
                        }
                        _ => None,
                    };
                    if let Some(item) = item {
                        let known = PrerunValue::new(item, array.element);
                        return Ok(self.constant_value(known, range));
                    }
                }
                let place = self.into_place(target)?;
                let ptr =
                    self.element_ptr(place.ir, array.element, place.is_variable, position.ir)?;
                let storage = match place.storage {
                    Storage::TempSlot => Storage::TempSlot,
                    _ => Storage::Pointee,
                };
                Ok(Value::at(ptr, array.element, place.is_variable, storage, range))
            }
            Type::Vector(vector) => {
                let place = self.into_place(target)?;
                let ptr =
                    self.element_ptr(place.ir, vector.element, place.is_variable, position.ir)?;
                Ok(Value::at(ptr, vector.element, place.is_variable, Storage::Pointee, range))
            }
            Type::Mark(mark) => {
                let pointer = self.to_rvalue(target)?;
                let data = if mark.is_slice {
                    let data_ty = self.types.mark_to(mark.subtype, mark.is_subtype_variable);
                    let data = self.fresh_register(data_ty)?;
                    self.emit(IrInstr::ExtractValue {
                        dest: data,
                        aggregate: pointer.ir,
                        index: 0,
                    })?;
                    data.into()
                } else {
                    pointer.ir
                };
                let ptr =
                    self.element_ptr(data, mark.subtype, mark.is_subtype_variable, position.ir)?;
                Ok(Value::at(
                    ptr,
                    mark.subtype,
                    mark.is_subtype_variable,
                    Storage::Pointee,
                    range,
                ))
            }
            Type::StringSlice => {
                let value = self.to_rvalue(target)?;
                if let (Some(text), Some(at)) = (
                    value.prerun.as_ref().and_then(PrerunValue::as_str),
                    position.prerun.as_ref().and_then(PrerunValue::as_int),
                ) {
                    let byte = usize::try_from(at)
                        .ok()
                        .and_then(|i| text.as_bytes().get(i))
                        .copied();
                    let byte = byte.ok_or_else(|| {
                        CompileError::at(
                            codes::PRERUN_FAILURE,
                            format!(
                                "Index {} is out of range for a string of length {}",
                                at,
                                text.len()
                            ),
                            index.range,
                        )
                    })?;
                    let known = PrerunValue::int(TypeContext::U8, i128::from(byte));
                    return Ok(self.constant_value(known, range));
                }
                let (data, _) = self.str_parts(value.ir)?;
                let ptr = self.element_ptr(data, TypeContext::U8, false, position.ir)?;
                let byte = self.load(ptr.into(), TypeContext::U8)?;
                Ok(Value::temporary(byte, TypeContext::U8, range))
            }
            Type::Native(_) if self.types.is_cstring(ty) => {
                let pointer = self.to_rvalue(target)?;
                let ptr = self.element_ptr(pointer.ir, TypeContext::U8, false, position.ir)?;
                let byte = self.load(ptr.into(), TypeContext::U8)?;
                Ok(Value::temporary(byte, TypeContext::U8, range))
            }
            _ => Err(CompileError::at(
                codes::TYPE_MISMATCH,
                format!("Values of type `{}` cannot be indexed", self.type_name(ty)),
                instance.range,
            )),
        }
    }

    pub(crate) fn element_ptr(
        &mut self,
        base: IrValue,
        element: TypeId,
        is_variable: bool,
        index: IrValue,
    ) -> CompileResult<Register> {
        let ptr_ty = self.types.mark_to(element, is_variable);
        let dest = self.fresh_register(ptr_ty)?;
        self.emit(IrInstr::ElementPtr {
            dest,
            base,
            element,
            index,
        })?;
        Ok(dest)
    }
}
