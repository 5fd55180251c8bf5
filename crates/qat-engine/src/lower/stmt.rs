//! Sentence lowering

use crate::ast::{Expression, IfBranch, Sentence, SentenceKind};
use crate::ctx::EmitCtx;
use crate::error::{codes, CompileError, CompileResult};
use crate::ir::Terminator;
use crate::prerun::PrerunValue;
use crate::span::{FileRange, Identifier};
use crate::types::TypeContext;

use super::{Expect, Lowerer};

impl<'a> Lowerer<'a> {
    /// Lower sentences until one of them ends the current block
    pub(crate) fn lower_sentences(
        &mut self,
        ctx: &EmitCtx,
        body: &[Sentence],
    ) -> CompileResult<()> {
        for sentence in body {
            if self.current_block_is_terminated() {
                break;
            }
            self.lower_sentence(ctx, sentence)?;
        }
        Ok(())
    }

    fn lower_scoped(&mut self, ctx: &EmitCtx, body: &[Sentence]) -> CompileResult<()> {
        self.push_scope()?;
        let result = self.lower_sentences(ctx, body);
        self.pop_scope()?;
        result
    }

    pub(crate) fn lower_sentence(
        &mut self,
        ctx: &EmitCtx,
        sentence: &Sentence,
    ) -> CompileResult<()> {
        let range = sentence.range;
        match &sentence.kind {
            SentenceKind::LocalDeclaration(decl) => self.lower_local(ctx, decl, range),
            SentenceKind::Assignment { lhs, rhs } => self.lower_assignment(ctx, lhs, rhs, range),
            SentenceKind::OperatorAssignment { op, lhs, rhs } => {
                self.lower_operator_assignment(ctx, *op, lhs, rhs, range)
            }
            SentenceKind::Expression(expr) => {
                self.lower_expr(ctx, expr, Expect::none())?;
                Ok(())
            }
            SentenceKind::If { branches, otherwise } => {
                self.lower_if(ctx, branches, otherwise.as_deref())
            }
            SentenceKind::LoopWhile { condition, body, tag } => {
                self.lower_loop_while(ctx, condition, body, tag)
            }
            SentenceKind::LoopTimes {
                count,
                index,
                body,
                tag,
            } => self.lower_loop_times(ctx, count, index, body, tag, range),
            SentenceKind::LoopInfinite { body, tag } => self.lower_loop_infinite(ctx, body, tag),
            SentenceKind::LoopIn {
                iterable,
                item,
                index,
                body,
                tag,
            } => self.lower_loop_in(ctx, iterable, item, index, body, tag, range),
            SentenceKind::Break(tag) => self.lower_break_continue(tag.as_ref(), true, range),
            SentenceKind::Continue(tag) => self.lower_break_continue(tag.as_ref(), false, range),
            SentenceKind::Give(value) => self.lower_give(ctx, value.as_ref(), range),
            SentenceKind::Block(body) => self.lower_scoped(ctx, body),
            SentenceKind::MetaTodo(message) => self.meta_todo(message.as_deref(), range),
        }
    }

    /// `if`/`else if`/`else`; branches with a known condition are chosen
    /// while compiling
    fn lower_if(
        &mut self,
        ctx: &EmitCtx,
        branches: &[IfBranch],
        otherwise: Option<&[Sentence]>,
    ) -> CompileResult<()> {
        let end_block = self.new_block(Some("if.end"))?;
        for branch in branches {
            let cond = self.lower_bool(ctx, &branch.condition)?;
            match cond.prerun.as_ref().and_then(PrerunValue::as_bool) {
                Some(true) => {
                    self.lower_scoped(ctx, &branch.body)?;
                    self.jump(end_block)?;
                    return self.switch_to(end_block);
                }
                Some(false) => continue,
                None => {}
            }
            let then_block = self.new_block(Some("if.then"))?;
            let next_block = self.new_block(Some("if.else"))?;
            self.branch(cond.ir, then_block, next_block)?;

            self.switch_to(then_block)?;
            self.lower_scoped(ctx, &branch.body)?;
            self.jump(end_block)?;
            self.switch_to(next_block)?;
        }
        if let Some(otherwise) = otherwise {
            self.lower_scoped(ctx, otherwise)?;
        }
        self.jump(end_block)?;
        self.switch_to(end_block)
    }

    fn lower_break_continue(
        &mut self,
        tag: Option<&Identifier>,
        is_break: bool,
        range: FileRange,
    ) -> CompileResult<()> {
        let word = if is_break { "break" } else { "continue" };
        let loops = &self.state()?.loops;
        let target = match tag {
            Some(tag) if is_break => loops.break_target(Some(tag.as_str())),
            Some(tag) => loops.continue_target(Some(tag.as_str())),
            None if is_break => loops.break_target(None),
            None => loops.continue_target(None),
        };
        let target = target.ok_or_else(|| {
            let message = match tag {
                Some(tag) => format!(
                    "`{}` names the loop tag `{}`, but no enclosing loop has it",
                    word, tag
                ),
                None => format!("`{}` can only be used inside a loop", word),
            };
            CompileError::at(codes::CONTROL_FLOW, message, range)
        })?;
        self.jump(target)
    }

    fn lower_give(
        &mut self,
        ctx: &EmitCtx,
        value: Option<&Expression>,
        range: FileRange,
    ) -> CompileResult<()> {
        let return_type = self.state()?.return_type;
        let Some(expr) = value else {
            if return_type != TypeContext::VOID {
                return Err(CompileError::at(
                    codes::MISSING_GIVE,
                    format!(
                        "This function should give a value of type `{}`, but nothing is given here",
                        self.type_name(return_type)
                    ),
                    range,
                ));
            }
            return self.set_terminator(Terminator::Return(None));
        };
        if return_type == TypeContext::VOID {
            return Err(CompileError::at(
                codes::TYPE_MISMATCH,
                "This function gives `void`, so `give` cannot carry a value",
                expr.range,
            ));
        }
        let expected = self.types.non_reference(return_type);
        let result = self.lower_expr(ctx, expr, Expect::of(expected))?;
        if self.types.non_reference(result.ty) != expected {
            return Err(self.mismatch(return_type, result.ty, expr.range));
        }
        let operand = self.pass_value(result, return_type, expr.range)?;
        self.set_terminator(Terminator::Return(Some(operand)))
    }
}
