//! Loops
//!
//! Counted loops keep their index in a stack slot and are laid out as
//! init, condition, body, increment and the rest of the function.

use tracing::trace;

use crate::ast::{Expression, Sentence};
use crate::ctx::EmitCtx;
use crate::diagnostic::Diagnostic;
use crate::error::{codes, CompileError, CompileResult};
use crate::ir::{BasicBlockId, BinaryOp, CmpPredicate, IrConstant, IrInstr, IrValue};
use crate::span::{FileRange, Identifier};
use crate::types::{Type, TypeContext, TypeId};

use super::control_flow::LoopContext;
use super::{Expect, LocalVar, Lowerer};

/// How a `loop in` knows it is done
enum Bound {
    Count(IrValue),
    /// Stops at the first zero byte
    Sentinel,
}

/// What a `loop in` walks over
struct Sequence {
    base: IrValue,
    element: TypeId,
    is_variable: bool,
    bound: Bound,
}

impl<'a> Lowerer<'a> {
    fn enter_loop(
        &mut self,
        tag: &Option<Identifier>,
        break_block: BasicBlockId,
        continue_block: BasicBlockId,
    ) -> CompileResult<()> {
        let state = self.state_mut()?;
        if let Some(tag) = tag {
            let existing = state
                .loops
                .find_by_tag(tag.as_str())
                .and_then(|l| l.tag.clone());
            if let Some(existing) = existing {
                return Err(Diagnostic::error(format!(
                    "A loop tagged `{}` already encloses this loop",
                    tag
                ))
                .with_code(codes::DUPLICATE_NAME)
                .with_primary_label(tag.range, "")
                .with_secondary_label(existing.range, "the existing tag was found here")
                .into());
            }
        }
        state
            .loops
            .push(LoopContext::tagged(break_block, continue_block, tag.clone()));
        Ok(())
    }

    fn exit_loop(&mut self) -> CompileResult<()> {
        self.state_mut()?.loops.pop();
        Ok(())
    }

    /// Body of a loop in its own scope
    fn loop_body(
        &mut self,
        ctx: &EmitCtx,
        body: &[Sentence],
        locals: Vec<LocalVar>,
    ) -> CompileResult<()> {
        self.push_scope()?;
        for local in locals {
            self.declare_local(local)?;
        }
        let result = self.lower_sentences(ctx, body);
        self.pop_scope()?;
        result
    }

    pub(crate) fn lower_loop_while(
        &mut self,
        ctx: &EmitCtx,
        condition: &Expression,
        body: &[Sentence],
        tag: &Option<Identifier>,
    ) -> CompileResult<()> {
        let cond_block = self.new_block(Some("while.cond"))?;
        let body_block = self.new_block(Some("while.body"))?;
        let end_block = self.new_block(Some("while.end"))?;
        self.jump(cond_block)?;

        self.switch_to(cond_block)?;
        let cond = self.lower_bool(ctx, condition)?;
        self.branch(cond.ir, body_block, end_block)?;

        self.switch_to(body_block)?;
        self.enter_loop(tag, end_block, cond_block)?;
        let result = self.loop_body(ctx, body, Vec::new());
        self.exit_loop()?;
        result?;
        self.jump(cond_block)?;

        self.switch_to(end_block)
    }

    pub(crate) fn lower_loop_infinite(
        &mut self,
        ctx: &EmitCtx,
        body: &[Sentence],
        tag: &Option<Identifier>,
    ) -> CompileResult<()> {
        let body_block = self.new_block(Some("loop.body"))?;
        let end_block = self.new_block(Some("loop.end"))?;
        self.jump(body_block)?;

        self.switch_to(body_block)?;
        self.enter_loop(tag, end_block, body_block)?;
        let result = self.loop_body(ctx, body, Vec::new());
        self.exit_loop()?;
        result?;
        self.jump(body_block)?;

        self.switch_to(end_block)
    }

    pub(crate) fn lower_loop_times(
        &mut self,
        ctx: &EmitCtx,
        count: &Expression,
        index: &Option<Identifier>,
        body: &[Sentence],
        tag: &Option<Identifier>,
        range: FileRange,
    ) -> CompileResult<()> {
        let count_value = self.lower_rvalue(ctx, count, Expect::of(TypeContext::USIZE))?;
        let info = self
            .types
            .int_info(count_value.ty)
            .ok_or_else(|| self.mismatch(TypeContext::USIZE, count_value.ty, count.range))?;
        let ty = count_value.ty;
        let predicate = if info.is_signed {
            CmpPredicate::SignedLt
        } else {
            CmpPredicate::UnsignedLt
        };
        self.counted_loop(ctx, ty, index, body, tag, range, |this, current| {
            let dest = this.fresh_register(TypeContext::BOOL)?;
            this.emit(IrInstr::Compare {
                dest,
                pred: predicate,
                lhs: current,
                rhs: count_value.ir.clone(),
            })?;
            Ok(dest.into())
        }, |_, _| Ok(Vec::new()))
    }

    /// Shared skeleton of `loop times` and `loop in`
    #[allow(clippy::too_many_arguments)]
    fn counted_loop(
        &mut self,
        ctx: &EmitCtx,
        ty: TypeId,
        index: &Option<Identifier>,
        body: &[Sentence],
        tag: &Option<Identifier>,
        range: FileRange,
        condition: impl FnOnce(&mut Self, IrValue) -> CompileResult<IrValue>,
        locals: impl FnOnce(&mut Self, IrValue) -> CompileResult<Vec<LocalVar>>,
    ) -> CompileResult<()> {
        let slot_name = index.as_ref().map_or("loop.index", |i| i.as_str());
        let slot: IrValue = self.alloca(ty, Some(slot_name))?.into();
        self.store(IrConstant::int(ty, 0).into(), slot.clone())?;

        let cond_block = self.new_block(Some("loop.cond"))?;
        let body_block = self.new_block(Some("loop.body"))?;
        let incr_block = self.new_block(Some("loop.incr"))?;
        let rest_block = self.new_block(Some("loop.rest"))?;
        self.jump(cond_block)?;

        self.switch_to(cond_block)?;
        let current = self.load(slot.clone(), ty)?;
        let cond = condition(self, current.into())?;
        self.branch(cond, body_block, rest_block)?;

        self.switch_to(body_block)?;
        let current = self.load(slot.clone(), ty)?;
        let mut body_locals = locals(self, current.into())?;
        if let Some(index) = index {
            body_locals.push(LocalVar {
                name: index.clone(),
                address: slot.clone(),
                ty,
                is_variable: false,
                is_reference: false,
                prerun: None,
            });
        }
        self.enter_loop(tag, rest_block, incr_block)?;
        let result = self.loop_body(ctx, body, body_locals);
        self.exit_loop()?;
        result?;
        self.jump(incr_block)?;

        self.switch_to(incr_block)?;
        let current = self.load(slot.clone(), ty)?;
        let next = self.fresh_register(ty)?;
        self.emit(IrInstr::Binary {
            dest: next,
            op: BinaryOp::Add,
            lhs: current.into(),
            rhs: IrConstant::int(ty, 1).into(),
        })?;
        self.store(next.into(), slot)?;
        self.jump(cond_block)?;

        trace!(index = ?index.as_ref().map(|i| i.as_str()), at = %range, "counted loop");
        self.switch_to(rest_block)
    }

    fn loop_sequence(&mut self, ctx: &EmitCtx, iterable: &Expression) -> CompileResult<Sequence> {
        let value = self.lower_expr(ctx, iterable, Expect::none())?;
        let ty = self.types.non_reference(value.ty);
        let not_iterable = |this: &Self| {
            CompileError::at(
                codes::TYPE_MISMATCH,
                format!("Values of type `{}` cannot be looped over", this.type_name(ty)),
                iterable.range,
            )
        };
        Ok(match self.types.get(ty).clone() {
            Type::Array(array) => {
                let place = self.into_place(value)?;
                Sequence {
                    base: place.ir.clone(),
                    element: array.element,
                    is_variable: place.is_mutable(&self.types),
                    bound: Bound::Count(
                        IrConstant::int(TypeContext::USIZE, i128::from(array.length)).into(),
                    ),
                }
            }
            Type::Vector(vector) if !vector.is_scalable => {
                let place = self.into_place(value)?;
                Sequence {
                    base: place.ir.clone(),
                    element: vector.element,
                    is_variable: place.is_mutable(&self.types),
                    bound: Bound::Count(
                        IrConstant::int(TypeContext::USIZE, i128::from(vector.count)).into(),
                    ),
                }
            }
            Type::Mark(mark) if mark.is_slice => {
                let slice = self.to_rvalue(value)?;
                let data_ty = self.types.mark_to(mark.subtype, mark.is_subtype_variable);
                let data = self.fresh_register(data_ty)?;
                self.emit(IrInstr::ExtractValue {
                    dest: data,
                    aggregate: slice.ir.clone(),
                    index: 0,
                })?;
                let length = self.fresh_register(TypeContext::USIZE)?;
                self.emit(IrInstr::ExtractValue {
                    dest: length,
                    aggregate: slice.ir,
                    index: 1,
                })?;
                Sequence {
                    base: data.into(),
                    element: mark.subtype,
                    is_variable: mark.is_subtype_variable,
                    bound: Bound::Count(length.into()),
                }
            }
            Type::StringSlice => {
                let text = self.to_rvalue(value)?;
                let (data, length) = self.str_parts(text.ir)?;
                Sequence {
                    base: data,
                    element: TypeContext::U8,
                    is_variable: false,
                    bound: Bound::Count(length),
                }
            }
            Type::Native(_) if self.types.is_cstring(ty) => {
                let pointer = self.to_rvalue(value)?;
                Sequence {
                    base: pointer.ir,
                    element: TypeContext::U8,
                    is_variable: false,
                    bound: Bound::Sentinel,
                }
            }
            _ => return Err(not_iterable(self)),
        })
    }

    /// `loop item in sequence`: `item` refers to each element in turn
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn lower_loop_in(
        &mut self,
        ctx: &EmitCtx,
        iterable: &Expression,
        item: &Identifier,
        index: &Option<Identifier>,
        body: &[Sentence],
        tag: &Option<Identifier>,
        range: FileRange,
    ) -> CompileResult<()> {
        let sequence = self.loop_sequence(ctx, iterable)?;
        let Sequence {
            base,
            element,
            is_variable,
            bound,
        } = sequence;
        let condition_base = base.clone();
        let item_ty = self.types.reference(element, is_variable);
        let item = item.clone();

        self.counted_loop(
            ctx,
            TypeContext::USIZE,
            index,
            body,
            tag,
            range,
            move |this, current| {
                let dest = this.fresh_register(TypeContext::BOOL)?;
                let instr = match bound {
                    Bound::Count(length) => IrInstr::Compare {
                        dest,
                        pred: CmpPredicate::UnsignedLt,
                        lhs: current,
                        rhs: length,
                    },
                    Bound::Sentinel => {
                        let ptr =
                            this.element_ptr(condition_base, TypeContext::U8, false, current)?;
                        let byte = this.load(ptr.into(), TypeContext::U8)?;
                        IrInstr::Compare {
                            dest,
                            pred: CmpPredicate::Ne,
                            lhs: byte.into(),
                            rhs: IrConstant::int(TypeContext::U8, 0).into(),
                        }
                    }
                };
                this.emit(instr)?;
                Ok(dest.into())
            },
            move |this, current| {
                let ptr = this.element_ptr(base, element, is_variable, current)?;
                Ok(vec![LocalVar {
                    name: item,
                    address: ptr.into(),
                    ty: item_ty,
                    is_variable,
                    is_reference: true,
                    prerun: None,
                }])
            },
        )
    }
}
