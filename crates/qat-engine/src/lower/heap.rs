//! `heap'get`, `heap'put` and `heap'grow`
//!
//! Heap marks are backed by the C allocator. A slice carries its element
//! count next to the data pointer.

use tracing::debug;

use crate::ast::{Expression, TypeExpr};
use crate::ctx::EmitCtx;
use crate::error::{codes, CompileError, CompileResult};
use crate::ir::{BinaryOp, Callee, CastKind, IrConstant, IrInstr, IrValue};
use crate::span::FileRange;
use crate::types::{MarkOwner, MarkType, TypeContext, TypeId};
use crate::value::Value;

use super::{Expect, Lowerer};

impl<'a> Lowerer<'a> {
    fn byte_pointer(&mut self) -> TypeId {
        self.types.mark_to(TypeContext::U8, true)
    }

    fn heap_mark(&mut self, element: TypeId, is_slice: bool) -> TypeId {
        self.types.mark(MarkType {
            subtype: element,
            owner: MarkOwner::Heap,
            is_nullable: false,
            is_slice,
            is_subtype_variable: true,
        })
    }

    /// Element size as a `usize` operand
    fn element_size(&mut self, element: TypeId, range: FileRange) -> CompileResult<u64> {
        self.require_sized(element, range)?;
        self.types.size_in_bytes(element).ok_or_else(|| {
            CompileError::internal(format!("sized type `{}` has no size", self.type_name(element)))
        })
    }

    /// An element count converted to `usize`
    fn lower_count(&mut self, ctx: &EmitCtx, count: &Expression) -> CompileResult<Value> {
        let value = self.lower_rvalue(ctx, count, Expect::of(TypeContext::USIZE))?;
        if !self.types.is_integral(value.ty) {
            return Err(self.mismatch(TypeContext::USIZE, value.ty, count.range));
        }
        self.convert_int(value, TypeContext::USIZE)
    }

    fn byte_count(&mut self, count: &Value, size: u64) -> CompileResult<IrValue> {
        let size_constant = IrConstant::int(TypeContext::USIZE, i128::from(size));
        if let Some(known) = count.prerun.as_ref().and_then(|p| p.as_int()) {
            return Ok(IrConstant::int(TypeContext::USIZE, known * i128::from(size)).into());
        }
        let dest = self.fresh_register(TypeContext::USIZE)?;
        self.emit(IrInstr::Binary {
            dest,
            op: BinaryOp::Mul,
            lhs: count.ir.clone(),
            rhs: size_constant.into(),
        })?;
        Ok(dest.into())
    }

    fn call_allocator(
        &mut self,
        name: &str,
        params: &[TypeId],
        ret: TypeId,
        args: Vec<IrValue>,
    ) -> CompileResult<Option<IrValue>> {
        let function = self.ir.declare_external(name, params, ret, false);
        let dest = if ret == TypeContext::VOID {
            None
        } else {
            Some(self.fresh_register(ret)?)
        };
        self.emit(IrInstr::Call {
            dest,
            callee: Callee::Function(function),
            args,
        })?;
        Ok(dest.map(IrValue::from))
    }

    /// Heap mark of `element` built from a raw byte pointer
    fn finish_heap_mark(
        &mut self,
        raw: IrValue,
        element: TypeId,
        count: Option<IrValue>,
        range: FileRange,
    ) -> CompileResult<Value> {
        let single = self.heap_mark(element, false);
        let data = self.emit_cast(CastKind::Bitcast, raw, single)?;
        match count {
            None => Ok(Value::temporary(data, single, range)),
            Some(count) => {
                let slice = self.heap_mark(element, true);
                self.build_aggregate(slice, [data, count], range)
            }
        }
    }

    pub(crate) fn lower_heap_get(
        &mut self,
        ctx: &EmitCtx,
        ty: &TypeExpr,
        count: Option<&Expression>,
        range: FileRange,
    ) -> CompileResult<Value> {
        let element = self.resolve_type(ctx, ty)?;
        let size = self.element_size(element, ty.range)?;
        let count = match count {
            Some(count) => Some(self.lower_count(ctx, count)?),
            None => None,
        };
        let bytes = match &count {
            Some(count) => self.byte_count(count, size)?,
            None => IrConstant::int(TypeContext::USIZE, i128::from(size)).into(),
        };
        debug!(element = %self.type_name(element), slice = count.is_some(), "heap allocation");
        let byte_ptr = self.byte_pointer();
        let raw = self
            .call_allocator("malloc", &[TypeContext::USIZE], byte_ptr, vec![bytes])?
            .ok_or_else(|| CompileError::internal("malloc gave no value"))?;
        self.finish_heap_mark(raw, element, count.map(|c| c.ir), range)
    }

    /// Data pointer and element type of a heap mark
    fn heap_data(
        &mut self,
        pointer: &Value,
        range: FileRange,
    ) -> CompileResult<(IrValue, MarkType)> {
        let mark = self
            .types
            .get(pointer.ty)
            .as_mark()
            .copied()
            .filter(|m| m.owner == MarkOwner::Heap)
            .ok_or_else(|| {
                CompileError::at(
                    codes::TYPE_MISMATCH,
                    format!(
                        "Expected a heap mark, but the provided value is of type `{}`",
                        self.type_name(pointer.ty)
                    ),
                    range,
                )
            })?;
        if !mark.is_slice {
            return Ok((pointer.ir.clone(), mark));
        }
        let data_ty = self.types.mark_to(mark.subtype, mark.is_subtype_variable);
        let data = self.fresh_register(data_ty)?;
        self.emit(IrInstr::ExtractValue {
            dest: data,
            aggregate: pointer.ir.clone(),
            index: 0,
        })?;
        Ok((data.into(), mark))
    }

    pub(crate) fn lower_heap_put(
        &mut self,
        ctx: &EmitCtx,
        pointer: &Expression,
        range: FileRange,
    ) -> CompileResult<Value> {
        let value = self.lower_rvalue(ctx, pointer, Expect::none())?;
        let (data, _) = self.heap_data(&value, pointer.range)?;
        let byte_ptr = self.byte_pointer();
        let raw = self.emit_cast(CastKind::Bitcast, data, byte_ptr)?;
        self.call_allocator("free", &[byte_ptr], TypeContext::VOID, vec![raw])?;
        Ok(Self::void_value(range))
    }

    pub(crate) fn lower_heap_grow(
        &mut self,
        ctx: &EmitCtx,
        ty: &TypeExpr,
        pointer: &Expression,
        count: &Expression,
        range: FileRange,
    ) -> CompileResult<Value> {
        let element = self.resolve_type(ctx, ty)?;
        let size = self.element_size(element, ty.range)?;
        let value = self.lower_rvalue(ctx, pointer, Expect::none())?;
        let (data, mark) = self.heap_data(&value, pointer.range)?;
        if mark.subtype != element {
            let expected = self.heap_mark(element, mark.is_slice);
            return Err(self.mismatch(expected, value.ty, pointer.range));
        }
        let count = self.lower_count(ctx, count)?;
        let bytes = self.byte_count(&count, size)?;

        let byte_ptr = self.byte_pointer();
        let raw = self.emit_cast(CastKind::Bitcast, data, byte_ptr)?;
        let grown = self
            .call_allocator("realloc", &[byte_ptr, TypeContext::USIZE], byte_ptr, vec![raw, bytes])?
            .ok_or_else(|| CompileError::internal("realloc gave no value"))?;
        debug!(element = %self.type_name(element), "heap reallocation");
        self.finish_heap_mark(grown, element, Some(count.ir), range)
    }
}
