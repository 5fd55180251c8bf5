//! `await`
//!
//! A future points to shared state laid out as `(done flag, result)`.
//! Awaiting spins on the flag and then reads the result.

use crate::ast::Expression;
use crate::ctx::EmitCtx;
use crate::error::{codes, CompileError, CompileResult};
use crate::span::FileRange;
use crate::types::{Type, TypeContext, TypeId};
use crate::value::Value;

use super::{Expect, Lowerer};

impl<'a> Lowerer<'a> {
    /// Layout of the state behind a future of `subtype`
    pub(crate) fn future_state(&mut self, subtype: TypeId, is_packed: bool) -> TypeId {
        if subtype == TypeContext::VOID {
            self.types.tuple(vec![TypeContext::BOOL], is_packed)
        } else {
            self.types.tuple(vec![TypeContext::BOOL, subtype], is_packed)
        }
    }

    pub(crate) fn lower_await(
        &mut self,
        ctx: &EmitCtx,
        inner: &Expression,
        range: FileRange,
    ) -> CompileResult<Value> {
        let future = self.lower_rvalue(ctx, inner, Expect::none())?;
        let Type::Future(info) = self.types.get(future.ty).clone() else {
            return Err(CompileError::at(
                codes::TYPE_MISMATCH,
                format!(
                    "Only futures can be awaited, but this value is of type `{}`",
                    self.type_name(future.ty)
                ),
                inner.range,
            ));
        };
        let state = self.future_state(info.subtype, info.is_packed);

        let poll = self.new_block(Some("await.poll"))?;
        let done = self.new_block(Some("await.done"))?;
        self.jump(poll)?;

        self.switch_to(poll)?;
        let flag_ptr = self.field_ptr(future.ir.clone(), state, 0, TypeContext::BOOL)?;
        let flag = self.load(flag_ptr, TypeContext::BOOL)?;
        self.branch(flag.into(), done, poll)?;

        self.switch_to(done)?;
        if info.subtype == TypeContext::VOID {
            return Ok(Self::void_value(range));
        }
        let result_ptr = self.field_ptr(future.ir, state, 1, info.subtype)?;
        let result = self.load(result_ptr, info.subtype)?;
        Ok(Value::temporary(result, info.subtype, range))
    }
}
