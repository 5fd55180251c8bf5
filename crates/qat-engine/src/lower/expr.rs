//! Expression lowering
//!
//! [`Lowerer::lower_expr`] dispatches on the expression kind. Values that
//! live in memory come back as places (see [`Value`]); callers that need the
//! value itself go through [`Lowerer::to_rvalue`]. Only constructing
//! expressions honour [`Expect::create_in`]; every other node passes the
//! inference hint alone to its operands.

use crate::ast::{ExprKind, Expression, QualifiedName};
use crate::ctx::EmitCtx;
use crate::error::{codes, CompileError, CompileResult};
use crate::ir::{ConstantKind, IrConstant, IrInstr, IrValue};
use crate::module::{ResolveError, Resolved};
use crate::prerun::{ConstData, PrerunValue};
use crate::span::FileRange;
use crate::types::{Type, TypeContext, TypeId};
use crate::value::{Storage, Value};

use super::{Expect, Lowerer, Symbol};

impl<'a> Lowerer<'a> {
    pub(crate) fn lower_expr(
        &mut self,
        ctx: &EmitCtx,
        expr: &Expression,
        expect: Expect,
    ) -> CompileResult<Value> {
        let range = expr.range;
        match &expr.kind {
            ExprKind::IntegerLiteral { .. }
            | ExprKind::FloatLiteral { .. }
            | ExprKind::BooleanLiteral(_)
            | ExprKind::CharLiteral(_)
            | ExprKind::StringLiteral(_)
            | ExprKind::NullPointer
            | ExprKind::None
            | ExprKind::SizeOf(_)
            | ExprKind::TypeValue(_) => {
                let value = self.prerun_expr(ctx, expr, expect.ty)?;
                Ok(self.constant_value(value, range))
            }
            ExprKind::Default => {
                let ty = expect.ty.ok_or_else(|| {
                    CompileError::at(
                        codes::INVALID_EXPRESSION,
                        "The type of `default` could not be inferred",
                        range,
                    )
                })?;
                let ty = self.types.non_reference(ty);
                self.lower_default(ctx, ty, expect, range)
            }
            ExprKind::Some(inner) => self.lower_some(ctx, inner, expect, range),
            ExprKind::TupleLiteral(items) => self.lower_tuple(ctx, items, expect, range),
            ExprKind::ArrayLiteral(items) => self.lower_array(ctx, items, expect, range),
            ExprKind::Entity(name) => self.lower_entity(ctx, name, expect),
            ExprKind::SelfInstance => self.self_value(range),
            ExprKind::SelfMember(name) => {
                let this = self.self_value(range)?;
                self.lower_member(ctx, this, name, range)
            }
            ExprKind::Member { instance, name } => {
                let instance = self.lower_expr(ctx, instance, Expect::none())?;
                self.lower_member(ctx, instance, name, range)
            }
            ExprKind::Index { instance, index } => self.lower_index(ctx, instance, index, range),
            ExprKind::Unary { op, operand } => self.lower_unary(ctx, *op, operand, expect, range),
            ExprKind::Dereference(operand) => self.lower_dereference(ctx, operand, range),
            ExprKind::AddressOf { place, is_variable } => {
                self.lower_address_of(ctx, place, *is_variable, expect, range)
            }
            ExprKind::Copy(inner) => self.lower_copy(ctx, inner, expect, range),
            ExprKind::Move(inner) => self.lower_move(ctx, inner, expect, range),
            ExprKind::Binary { op, lhs, rhs } => self.lower_binary(ctx, *op, lhs, rhs, range),
            ExprKind::Call { callee, args } => self.lower_call(ctx, callee, args, expect, range),
            ExprKind::MethodCall {
                instance,
                name,
                args,
                is_variation,
            } => {
                let instance = self.lower_expr(ctx, instance, Expect::none())?;
                self.lower_method_call(ctx, instance, name, args, *is_variation, range)
            }
            ExprKind::ConstructorCall { ty, args } => {
                let ty = self.resolve_type(ctx, ty)?;
                self.construct(ctx, ty, args, expect, range)
            }
            ExprKind::PlainInitializer { ty, fields, values } => {
                let ty = self.resolve_type(ctx, ty)?;
                self.lower_plain_initializer(ctx, ty, fields.as_deref(), values, expect, range)
            }
            ExprKind::VariantInitializer { ty, variant, value } => {
                let ty = self.resolve_type(ctx, ty)?;
                self.lower_variant(ctx, ty, variant, value.as_deref(), expect, range)
            }
            ExprKind::HeapGet { ty, count } => {
                self.lower_heap_get(ctx, ty, count.as_deref(), range)
            }
            ExprKind::HeapPut(pointer) => self.lower_heap_put(ctx, pointer, range),
            ExprKind::HeapGrow { ty, pointer, count } => {
                self.lower_heap_grow(ctx, ty, pointer, count, range)
            }
            ExprKind::Cast { value, target } => self.lower_cast(ctx, value, target, range),
            ExprKind::Await(inner) => self.lower_await(ctx, inner, range),
            ExprKind::InlineAssembly {
                template,
                constraints,
                args,
                return_type,
                is_volatile,
            } => self.lower_inline_asm(
                ctx,
                template,
                constraints,
                args,
                return_type,
                *is_volatile,
                range,
            ),
            ExprKind::If {
                condition,
                then_value,
                else_value,
            } => self.lower_if_expr(ctx, condition, then_value, else_value, expect, range),
            ExprKind::MetaTodo(message) => {
                self.meta_todo(message.as_deref(), range)?;
                Ok(Self::void_value(range))
            }
        }
    }

    /// Lower an expression and load it
    pub(crate) fn lower_rvalue(
        &mut self,
        ctx: &EmitCtx,
        expr: &Expression,
        expect: Expect,
    ) -> CompileResult<Value> {
        let value = self.lower_expr(ctx, expr, expect)?;
        self.to_rvalue(value)
    }

    // ------------------------------------------------------------------
    // Names
    // ------------------------------------------------------------------

    fn lower_entity(
        &mut self,
        ctx: &EmitCtx,
        name: &QualifiedName,
        expect: Expect,
    ) -> CompileResult<Value> {
        let range = name.range;
        if name.is_single() {
            if let Some(id) = name.last().and_then(|n| self.find_local(n.as_str())) {
                return self.local_value(id, range);
            }
        }
        let not_a_value = |what: &str| {
            CompileError::at(
                codes::INVALID_EXPRESSION,
                format!("`{}` is {}, not a value", name, what),
                range,
            )
        };

        match self.resolve_name(ctx, name) {
            Ok(Resolved::Item(item)) => match self.symbol(item.entity, range)?.clone() {
                Symbol::Function { id, ty } => Ok(Value::temporary(
                    IrConstant::new(ty, ConstantKind::FunctionAddr(id)),
                    ty,
                    range,
                )),
                Symbol::Global {
                    id,
                    ty,
                    is_variable,
                    value,
                } => {
                    let ptr_ty = self.types.mark_to(ty, is_variable);
                    let address = IrConstant::new(ptr_ty, ConstantKind::GlobalAddr(id));
                    let mut global = Value::at(address, ty, is_variable, Storage::Global, range);
                    if !is_variable {
                        global.prerun = Some(value);
                    }
                    Ok(global)
                }
                Symbol::PrerunGlobal(value) => Ok(self.constant_value(value, range)),
                Symbol::Type(ty) => {
                    let typed = self.types.typed(ty);
                    Ok(self.constant_value(PrerunValue::new(ConstData::Type(ty), typed), range))
                }
                Symbol::PrerunFunction(_) => Err(not_a_value("a prerun function")),
                Symbol::Skill(_) => Err(not_a_value("a skill")),
                Symbol::DoneSkill(_) | Symbol::Bring => Err(not_a_value("a declaration")),
            },
            Ok(Resolved::Module(_)) => Err(not_a_value("a module")),
            Err(ResolveError::NotAModule { .. }) if name.segments.len() > 1 => {
                let (ty, member) = self.split_type_member(ctx, name)?;
                self.lower_variant(ctx, ty, member, None, expect, range)
            }
            Err(error @ ResolveError::NotFound { .. }) if name.is_single() => {
                let key = name.last().map(|l| l.as_str()).unwrap_or_default();
                let options = self.options;
                match options.defines.get(key) {
                    Some(define) => {
                        let value = self.define_value(define, expect.ty);
                        Ok(self.constant_value(value, range))
                    }
                    None => Err(error.into()),
                }
            }
            Err(error) => Err(error.into()),
        }
    }

    // ------------------------------------------------------------------
    // Aggregate literals
    // ------------------------------------------------------------------

    fn lower_some(
        &mut self,
        ctx: &EmitCtx,
        inner: &Expression,
        expect: Expect,
        range: FileRange,
    ) -> CompileResult<Value> {
        let hint = expect.ty.and_then(|ty| match self.types.get(self.types.non_reference(ty)) {
            Type::Maybe(sub) => Some(*sub),
            _ => None,
        });
        let value = self.lower_expr(ctx, inner, Expect::maybe(hint))?;
        let sub = self.types.non_reference(value.ty);
        let maybe_ty = self.types.maybe(sub);
        if let (Some(known), false) = (&value.prerun, value.is_variable) {
            let data = ConstData::Maybe(Some(Box::new(known.data.clone())));
            return Ok(self.constant_value(PrerunValue::new(data, maybe_ty), range));
        }
        let payload = self.pass_value(value, sub, range)?;
        let members = [
            IrConstant::bool(TypeContext::BOOL, true).into(),
            payload,
        ];
        self.build_aggregate(maybe_ty, members, range)
    }

    fn lower_tuple(
        &mut self,
        ctx: &EmitCtx,
        items: &[Expression],
        expect: Expect,
        range: FileRange,
    ) -> CompileResult<Value> {
        let expected = expect
            .ty
            .map(|ty| self.types.get(self.types.non_reference(ty)).clone());
        let (hints, is_packed) = match expected {
            Some(Type::Tuple(tuple)) => (tuple.members, tuple.is_packed),
            _ => (Vec::new(), false),
        };
        let mut values = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let hint = hints.get(i).copied();
            values.push(self.lower_expr(ctx, item, Expect::maybe(hint))?);
        }
        let members: Vec<TypeId> = values.iter().map(|v| self.types.non_reference(v.ty)).collect();
        let ty = self.types.tuple(members.clone(), is_packed);
        self.finish_aggregate(ty, values, &members, ConstData::Tuple, range)
    }

    fn lower_array(
        &mut self,
        ctx: &EmitCtx,
        items: &[Expression],
        expect: Expect,
        range: FileRange,
    ) -> CompileResult<Value> {
        let mut element = expect
            .ty
            .and_then(|ty| match self.types.get(self.types.non_reference(ty)) {
                Type::Array(array) => Some(array.element),
                _ => None,
            });
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            let value = self.lower_expr(ctx, item, Expect::maybe(element))?;
            let item_ty = self.types.non_reference(value.ty);
            match element {
                Some(el) if el != item_ty => return Err(self.mismatch(el, item_ty, item.range)),
                _ => element = Some(item_ty),
            }
            values.push(value);
        }
        let element = element.ok_or_else(|| {
            CompileError::at(
                codes::INVALID_EXPRESSION,
                "The element type of an empty array could not be inferred",
                range,
            )
        })?;
        let ty = self.types.array(element, values.len() as u64);
        let members = vec![element; values.len()];
        self.finish_aggregate(ty, values, &members, ConstData::Array, range)
    }

    /// Fold the members into a constant when all are known, else insert
    /// them one by one
    fn finish_aggregate(
        &mut self,
        ty: TypeId,
        values: Vec<Value>,
        members: &[TypeId],
        constant: impl FnOnce(Vec<ConstData>) -> ConstData,
        range: FileRange,
    ) -> CompileResult<Value> {
        let known: Option<Vec<ConstData>> = values
            .iter()
            .map(|v| v.prerun.as_ref().filter(|_| !v.is_variable).map(|p| p.data.clone()))
            .collect();
        if let Some(known) = known {
            return Ok(self.constant_value(PrerunValue::new(constant(known), ty), range));
        }
        let mut irs = Vec::with_capacity(values.len());
        for (value, member) in values.into_iter().zip(members) {
            irs.push(self.pass_value(value, *member, range)?);
        }
        self.build_aggregate(ty, irs, range)
    }

    pub(crate) fn build_aggregate(
        &mut self,
        ty: TypeId,
        members: impl IntoIterator<Item = IrValue>,
        range: FileRange,
    ) -> CompileResult<Value> {
        let mut aggregate: IrValue = IrConstant::new(ty, ConstantKind::Undef).into();
        for (index, member) in members.into_iter().enumerate() {
            let dest = self.fresh_register(ty)?;
            self.emit(IrInstr::InsertValue {
                dest,
                aggregate,
                value: member,
                index: index as u32,
            })?;
            aggregate = dest.into();
        }
        Ok(Value::temporary(aggregate, ty, range))
    }

    // ------------------------------------------------------------------
    // Conditional values
    // ------------------------------------------------------------------

    fn lower_if_expr(
        &mut self,
        ctx: &EmitCtx,
        condition: &Expression,
        then_value: &Expression,
        else_value: &Expression,
        expect: Expect,
        range: FileRange,
    ) -> CompileResult<Value> {
        let cond = self.lower_bool(ctx, condition)?;
        if let Some(known) = cond.prerun.as_ref().and_then(PrerunValue::as_bool) {
            let chosen = if known { then_value } else { else_value };
            return self.lower_rvalue(ctx, chosen, expect.hint());
        }

        let then_block = self.new_block(Some("if.then"))?;
        let else_block = self.new_block(Some("if.else"))?;
        let end_block = self.new_block(Some("if.end"))?;
        self.branch(cond.ir, then_block, else_block)?;

        self.switch_to(then_block)?;
        let then_result = self.lower_rvalue(ctx, then_value, expect.hint())?;
        let then_end = self.current_block()?;
        self.jump(end_block)?;

        self.switch_to(else_block)?;
        let else_result = self.lower_rvalue(ctx, else_value, Expect::of(then_result.ty))?;
        if else_result.ty != then_result.ty {
            return Err(self.mismatch(then_result.ty, else_result.ty, else_value.range));
        }
        let else_end = self.current_block()?;
        self.jump(end_block)?;

        self.switch_to(end_block)?;
        if then_result.ty == TypeContext::VOID {
            return Ok(Self::void_value(range));
        }
        let dest = self.fresh_register(then_result.ty)?;
        self.emit(IrInstr::Phi {
            dest,
            incoming: vec![(then_result.ir, then_end), (else_result.ir, else_end)],
        })?;
        Ok(Value::temporary(dest, then_result.ty, range))
    }
}
