//! Compile-time interpreter
//!
//! Evaluates expressions and the bodies of prerun functions over
//! [`PrerunValue`]s. Sentences report how they finished through [`Flow`];
//! loops and calls consume the `break`, `continue` and `give` meant for
//! them and pass everything else outwards.

use crate::ast::{
    BinaryOperator, ExprKind, Expression, LocalDeclaration, QualifiedName, Sentence, SentenceKind,
    TypeExpr, UnaryOperator,
};
use crate::config::DefineValue;
use crate::ctx::EmitCtx;
use crate::error::{codes, CompileError, CompileResult};
use crate::lower::{Lowerer, Symbol};
use crate::module::{ResolveError, Resolved};
use crate::span::{FileRange, Identifier};
use crate::types::{IntInfo, MemberKind, Type, TypeContext, TypeId};

use super::call::{Flow, PrerunCallState, PrerunFunction};
use super::fold::{fold_binary, fold_cast, fold_unary, FoldError};
use super::value::{ConstData, PrerunValue};

/// Whether `value` can be represented by an integer of shape `info`
pub fn int_fits(value: i128, info: IntInfo) -> bool {
    if info.bits >= 128 {
        return info.is_signed || value >= 0;
    }
    if info.is_signed {
        let max = (1i128 << (info.bits - 1)) - 1;
        value >= -max - 1 && value <= max
    } else {
        value >= 0 && value < (1i128 << info.bits)
    }
}

fn not_prerun(what: &str, range: FileRange) -> CompileError {
    CompileError::at(
        codes::NOT_PRERUN,
        format!("{} cannot be evaluated at compile time", what),
        range,
    )
}

pub(crate) fn fold_error(error: FoldError, range: FileRange) -> CompileError {
    let code = match error {
        FoldError::Unsupported { .. } => codes::UNSUPPORTED_OPERATOR,
        FoldError::InvalidCast { .. } => codes::INVALID_CAST,
        FoldError::DivisionByZero | FoldError::ShiftOutOfRange { .. } => codes::PRERUN_FAILURE,
    };
    CompileError::at(code, error.to_string(), range)
}

impl<'a> Lowerer<'a> {
    /// Type of an integer literal: its suffix, else the expected numeric
    /// type, else `i32`
    pub(crate) fn int_literal_type(
        &mut self,
        ctx: &EmitCtx,
        suffix: Option<&TypeExpr>,
        expected: Option<TypeId>,
    ) -> CompileResult<TypeId> {
        if let Some(suffix) = suffix {
            let ty = self.resolve_type(ctx, suffix)?;
            if self.types.int_info(ty).is_none() && self.types.float_kind(ty).is_none() {
                return Err(CompileError::at(
                    codes::TYPE_MISMATCH,
                    format!("`{}` is not a numeric type", self.type_name(ty)),
                    suffix.range,
                ));
            }
            return Ok(ty);
        }
        if let Some(expected) = expected {
            let expected = self.types.non_reference(expected);
            let is_number = self.types.int_info(expected).is_some()
                || self.types.float_kind(expected).is_some();
            if is_number {
                return Ok(expected);
            }
        }
        Ok(TypeContext::I32)
    }

    pub(crate) fn int_literal(
        &mut self,
        ctx: &EmitCtx,
        value: u128,
        negative: bool,
        suffix: Option<&TypeExpr>,
        expected: Option<TypeId>,
        range: FileRange,
    ) -> CompileResult<PrerunValue> {
        let ty = self.int_literal_type(ctx, suffix, expected)?;
        if self.types.float_kind(ty).is_some() {
            let float = if negative { -(value as f64) } else { value as f64 };
            return Ok(PrerunValue::new(ConstData::Float(float), ty));
        }
        let too_large = || {
            CompileError::at(
                codes::TYPE_MISMATCH,
                format!(
                    "The integer literal {}{} does not fit in type `{}`",
                    if negative { "-" } else { "" },
                    value,
                    self.type_name(ty)
                ),
                range,
            )
        };
        let raw = i128::try_from(value).map_err(|_| too_large())?;
        let raw = if negative { -raw } else { raw };
        let info = self.types.int_info(ty).ok_or_else(too_large)?;
        if !int_fits(raw, info) {
            return Err(too_large());
        }
        Ok(PrerunValue::int(ty, raw))
    }

    /// Evaluate a guard or other compile-time condition
    pub(crate) fn prerun_condition(
        &mut self,
        ctx: &EmitCtx,
        expr: &Expression,
    ) -> CompileResult<bool> {
        let value = self.prerun_expr(ctx, expr, Some(TypeContext::BOOL))?;
        value
            .as_bool()
            .filter(|_| value.ty == TypeContext::BOOL)
            .ok_or_else(|| self.mismatch(TypeContext::BOOL, value.ty, expr.range))
    }

    pub(crate) fn prerun_expr(
        &mut self,
        ctx: &EmitCtx,
        expr: &Expression,
        expected: Option<TypeId>,
    ) -> CompileResult<PrerunValue> {
        let range = expr.range;
        match &expr.kind {
            ExprKind::IntegerLiteral { value, suffix } => {
                self.int_literal(ctx, *value, false, suffix.as_ref(), expected, range)
            }
            ExprKind::FloatLiteral { value, suffix } => {
                let ty = match suffix {
                    Some(suffix) => self.resolve_type(ctx, suffix)?,
                    None => expected
                        .map(|e| self.types.non_reference(e))
                        .filter(|e| self.types.float_kind(*e).is_some())
                        .unwrap_or(TypeContext::F64),
                };
                if self.types.float_kind(ty).is_none() {
                    return Err(self.mismatch(TypeContext::F64, ty, range));
                }
                Ok(PrerunValue::new(ConstData::Float(*value), ty))
            }
            ExprKind::BooleanLiteral(b) => Ok(PrerunValue::bool(TypeContext::BOOL, *b)),
            ExprKind::CharLiteral(c) => {
                Ok(PrerunValue::new(ConstData::Char(*c), TypeContext::CHAR))
            }
            ExprKind::StringLiteral(s) => {
                Ok(PrerunValue::new(ConstData::Str(s.clone()), TypeContext::STR))
            }
            ExprKind::NullPointer => {
                let ty = expected
                    .filter(|e| matches!(self.types.get(*e), Type::Mark(_)))
                    .ok_or_else(|| {
                        CompileError::at(
                            codes::INVALID_EXPRESSION,
                            "The mark type of `null` could not be inferred",
                            range,
                        )
                    })?;
                Ok(PrerunValue::new(ConstData::Null, ty))
            }
            ExprKind::Default => {
                let ty = expected.ok_or_else(|| {
                    CompileError::at(
                        codes::INVALID_EXPRESSION,
                        "The type of `default` could not be inferred",
                        range,
                    )
                })?;
                self.default_prerun(ty, range)
            }
            ExprKind::None => {
                let ty = expected
                    .filter(|e| matches!(self.types.get(*e), Type::Maybe(_)))
                    .ok_or_else(|| {
                        CompileError::at(
                            codes::INVALID_EXPRESSION,
                            "The maybe type of `none` could not be inferred",
                            range,
                        )
                    })?;
                Ok(PrerunValue::new(ConstData::Maybe(None), ty))
            }
            ExprKind::Some(inner) => {
                let sub = expected.and_then(|e| match self.types.get(e) {
                    Type::Maybe(sub) => Some(*sub),
                    _ => None,
                });
                let value = self.prerun_expr(ctx, inner, sub)?;
                let ty = self.types.maybe(value.ty);
                Ok(PrerunValue::new(ConstData::Maybe(Some(Box::new(value.data))), ty))
            }
            ExprKind::TupleLiteral(items) => {
                let hints: Vec<TypeId> = match expected.map(|e| self.types.get(e).clone()) {
                    Some(Type::Tuple(t)) => t.members,
                    _ => Vec::new(),
                };
                let mut data = Vec::with_capacity(items.len());
                let mut members = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    let value = self.prerun_expr(ctx, item, hints.get(i).copied())?;
                    members.push(value.ty);
                    data.push(value.data);
                }
                let ty = self.types.tuple(members, false);
                Ok(PrerunValue::new(ConstData::Tuple(data), ty))
            }
            ExprKind::ArrayLiteral(items) => {
                let hint = expected.and_then(|e| match self.types.get(e) {
                    Type::Array(a) => Some(a.element),
                    _ => None,
                });
                let mut element = hint;
                let mut data = Vec::with_capacity(items.len());
                for item in items {
                    let value = self.prerun_expr(ctx, item, element)?;
                    match element {
                        Some(el) if el != value.ty => {
                            return Err(self.mismatch(el, value.ty, item.range))
                        }
                        _ => element = Some(value.ty),
                    }
                    data.push(value.data);
                }
                let element = element.ok_or_else(|| {
                    CompileError::at(
                        codes::INVALID_EXPRESSION,
                        "The element type of an empty array could not be inferred",
                        range,
                    )
                })?;
                let ty = self.types.array(element, data.len() as u64);
                Ok(PrerunValue::new(ConstData::Array(data), ty))
            }
            ExprKind::Entity(name) => self.prerun_entity(ctx, name, expected),
            ExprKind::Unary { op, operand } => {
                if let (UnaryOperator::Negate, ExprKind::IntegerLiteral { value, suffix }) =
                    (op, &operand.kind)
                {
                    return self.int_literal(ctx, *value, true, suffix.as_ref(), expected, range);
                }
                let value = self.prerun_expr(ctx, operand, expected)?;
                fold_unary(&self.types, *op, &value).map_err(|e| fold_error(e, range))
            }
            ExprKind::Binary { op, lhs, rhs } => self.prerun_binary(ctx, *op, lhs, rhs, range),
            ExprKind::Index { instance, index } => {
                let instance = self.prerun_expr(ctx, instance, None)?;
                let position = self.prerun_expr(ctx, index, Some(TypeContext::USIZE))?;
                let at = position
                    .as_int()
                    .ok_or_else(|| self.mismatch(TypeContext::USIZE, position.ty, range))?;
                let out_of_range = |len: usize| {
                    CompileError::at(
                        codes::PRERUN_FAILURE,
                        format!("Index {} is out of range for a length of {}", at, len),
                        range,
                    )
                };
                match (&instance.data, self.types.get(instance.ty).clone()) {
                    (ConstData::Array(items), Type::Array(array)) => usize::try_from(at)
                        .ok()
                        .and_then(|i| items.get(i))
                        .map(|item| PrerunValue::new(item.clone(), array.element))
                        .ok_or_else(|| out_of_range(items.len())),
                    (ConstData::Str(s), _) => usize::try_from(at)
                        .ok()
                        .and_then(|i| s.as_bytes().get(i))
                        .map(|byte| PrerunValue::int(TypeContext::U8, i128::from(*byte)))
                        .ok_or_else(|| out_of_range(s.len())),
                    _ => Err(not_prerun("Indexing this value", range)),
                }
            }
            ExprKind::Member { instance, name } => {
                let instance = self.prerun_expr(ctx, instance, None)?;
                self.prerun_member(&instance, name)
            }
            ExprKind::Call { callee, args } => {
                let function = match &callee.kind {
                    ExprKind::Entity(name) => self.prerun_function_named(ctx, name)?,
                    _ => None,
                };
                let function = function.ok_or_else(|| not_prerun("This call", range))?;
                if args.len() != function.args.len() {
                    return Err(CompileError::at(
                        codes::ARGUMENT_COUNT,
                        format!(
                            "Prerun function `{}` expects {} arguments, but {} were provided",
                            function.full_name,
                            function.args.len(),
                            args.len()
                        ),
                        range,
                    ));
                }
                let mut values = Vec::with_capacity(args.len());
                for (arg, param) in args.iter().zip(&function.args) {
                    values.push(self.prerun_expr(ctx, arg, Some(param.ty))?);
                }
                self.call_prerun(function, values, range)
            }
            ExprKind::Cast { value, target } => {
                let target = self.resolve_type(ctx, target)?;
                let value = self.prerun_expr(ctx, value, None)?;
                fold_cast(&self.types, &value, target).map_err(|e| fold_error(e, range))
            }
            ExprKind::If {
                condition,
                then_value,
                else_value,
            } => {
                if self.prerun_condition(ctx, condition)? {
                    self.prerun_expr(ctx, then_value, expected)
                } else {
                    self.prerun_expr(ctx, else_value, expected)
                }
            }
            ExprKind::SizeOf(ty) => {
                let ty = self.resolve_type(ctx, ty)?;
                let size = self.types.size_in_bytes(ty).ok_or_else(|| {
                    CompileError::at(
                        codes::NOT_SIZED,
                        format!("Type `{}` is not sized", self.type_name(ty)),
                        range,
                    )
                })?;
                Ok(PrerunValue::int(TypeContext::USIZE, i128::from(size)))
            }
            ExprKind::TypeValue(ty) => {
                let ty = self.resolve_type(ctx, ty)?;
                let typed = self.types.typed(ty);
                Ok(PrerunValue::new(ConstData::Type(ty), typed))
            }
            ExprKind::VariantInitializer { ty, variant, value } => {
                let ty = self.resolve_type(ctx, ty)?;
                let payload = match value {
                    Some(value) => {
                        let payload_ty = self
                            .types
                            .mix_of(ty)
                            .and_then(|def| def.variant(variant.as_str()))
                            .and_then(|(_, v)| v.payload);
                        Some(self.prerun_expr(ctx, value, payload_ty)?)
                    }
                    None => None,
                };
                self.prerun_variant(ty, variant, payload)
            }
            ExprKind::PlainInitializer { ty, fields, values } => {
                let ty = self.resolve_type(ctx, ty)?;
                if !self.types.can_be_prerun(ty) {
                    let what = format!("A value of type `{}`", self.type_name(ty));
                    return Err(not_prerun(&what, range));
                }
                let order =
                    self.plain_field_order(ctx, ty, fields.as_deref(), values.len(), range)?;
                let field_types: Vec<TypeId> = self
                    .types
                    .struct_of(ty)
                    .map(|d| d.fields().iter().map(|f| f.ty).collect())
                    .unwrap_or_default();
                let mut data: Vec<Option<ConstData>> = vec![None; field_types.len()];
                for (value, field) in values.iter().zip(order) {
                    let field_ty = field_types[field];
                    let value = self.prerun_expr(ctx, value, Some(field_ty))?;
                    if value.ty != field_ty {
                        return Err(self.mismatch(field_ty, value.ty, range));
                    }
                    data[field] = Some(value.data);
                }
                let data: Option<Vec<ConstData>> = data.into_iter().collect();
                let data = data.ok_or_else(|| {
                    CompileError::at(codes::MISSING_VALUE, "Every field needs a value", range)
                })?;
                Ok(PrerunValue::new(ConstData::Struct(data), ty))
            }
            ExprKind::MetaTodo(message) => {
                self.meta_todo(message.as_deref(), range)?;
                Ok(PrerunValue::new(ConstData::Void, TypeContext::VOID))
            }
            _ => Err(not_prerun("This expression", range)),
        }
    }

    fn prerun_binary(
        &mut self,
        ctx: &EmitCtx,
        op: BinaryOperator,
        lhs: &Expression,
        rhs: &Expression,
        range: FileRange,
    ) -> CompileResult<PrerunValue> {
        if op.is_logical() {
            let left = self.prerun_condition(ctx, lhs)?;
            let short = match op {
                BinaryOperator::And => !left,
                _ => left,
            };
            if short {
                return Ok(PrerunValue::bool(TypeContext::BOOL, left));
            }
            let right = self.prerun_condition(ctx, rhs)?;
            return Ok(PrerunValue::bool(TypeContext::BOOL, right));
        }
        let (left, right) = if lhs.needs_inference() && !rhs.needs_inference() {
            let right = self.prerun_expr(ctx, rhs, None)?;
            let left = self.prerun_expr(ctx, lhs, Some(right.ty))?;
            (left, right)
        } else {
            let left = self.prerun_expr(ctx, lhs, None)?;
            let right = self.prerun_expr(ctx, rhs, Some(left.ty))?;
            (left, right)
        };
        self.check_operand_types(op, left.ty, right.ty, range)?;
        fold_binary(&self.types, op, &left, &right).map_err(|e| fold_error(e, range))
    }

    fn prerun_member(
        &mut self,
        instance: &PrerunValue,
        name: &Identifier,
    ) -> CompileResult<PrerunValue> {
        let missing = || {
            CompileError::at(
                codes::NO_MEMBER,
                format!(
                    "Compile-time value of type `{}` has no member named `{}`",
                    self.type_name(instance.ty),
                    name
                ),
                name.range,
            )
        };
        match &instance.data {
            ConstData::Array(items) if name.as_str() == "length" => {
                Ok(PrerunValue::int(TypeContext::USIZE, items.len() as i128))
            }
            ConstData::Str(s) if name.as_str() == "length" => {
                Ok(PrerunValue::int(TypeContext::USIZE, s.len() as i128))
            }
            ConstData::Struct(fields) => {
                let def = self.types.struct_of(instance.ty).ok_or_else(missing)?;
                let (index, field) = def.field(name.as_str()).ok_or_else(missing)?;
                let ty = field.ty;
                fields
                    .get(index)
                    .map(|data| PrerunValue::new(data.clone(), ty))
                    .ok_or_else(missing)
            }
            _ => Err(missing()),
        }
    }

    /// Choice or mix variant as a compile-time value
    pub(crate) fn prerun_variant(
        &mut self,
        ty: TypeId,
        variant: &Identifier,
        payload: Option<PrerunValue>,
    ) -> CompileResult<PrerunValue> {
        let invalid = |this: &Self| {
            CompileError::at(
                codes::INVALID_VARIANT,
                format!("Type `{}` has no variant named `{}`", this.type_name(ty), variant),
                variant.range,
            )
        };
        if let Some(def) = self.types.choice_of(ty) {
            if payload.is_some() {
                return Err(CompileError::at(
                    codes::INVALID_VARIANT,
                    format!("Variants of choice type `{}` do not carry values", def.full_name),
                    variant.range,
                ));
            }
            let (_, found) = def.variant(variant.as_str()).ok_or_else(|| invalid(self))?;
            return Ok(PrerunValue::int(ty, found.value));
        }
        if let Some(def) = self.types.mix_of(ty) {
            let (index, found) = def.variant(variant.as_str()).ok_or_else(|| invalid(self))?;
            let expected = found.payload;
            return match (expected, payload) {
                (None, None) => Ok(PrerunValue::new(
                    ConstData::Mix {
                        variant: index,
                        payload: None,
                    },
                    ty,
                )),
                (Some(expected), Some(payload)) if payload.ty == expected => Ok(PrerunValue::new(
                    ConstData::Mix {
                        variant: index,
                        payload: Some(Box::new(payload.data)),
                    },
                    ty,
                )),
                (Some(expected), Some(payload)) => {
                    Err(self.mismatch(expected, payload.ty, variant.range))
                }
                (Some(expected), None) => Err(CompileError::at(
                    codes::MISSING_VALUE,
                    format!(
                        "Variant `{}` of `{}` needs a value of type `{}`",
                        variant,
                        self.type_name(ty),
                        self.type_name(expected)
                    ),
                    variant.range,
                )),
                (None, Some(_)) => Err(CompileError::at(
                    codes::INVALID_VARIANT,
                    format!(
                        "Variant `{}` of `{}` does not carry a value",
                        variant,
                        self.type_name(ty)
                    ),
                    variant.range,
                )),
            };
        }
        Err(invalid(self))
    }

    /// Compile-time default value of `ty`
    pub(crate) fn default_prerun(
        &mut self,
        ty: TypeId,
        range: FileRange,
    ) -> CompileResult<PrerunValue> {
        let no_default = |this: &Self| {
            CompileError::at(
                codes::MISSING_CONSTRUCTOR,
                format!("Type `{}` has no default value", this.type_name(ty)),
                range,
            )
        };
        let data = match self.types.get(ty).clone() {
            Type::Integer { .. } | Type::Unsigned { .. } => ConstData::Int(0),
            Type::Native(_) if self.types.int_info(ty).is_some() => ConstData::Int(0),
            Type::Float(_) | Type::Native(_) if self.types.float_kind(ty).is_some() => {
                ConstData::Float(0.0)
            }
            Type::Bool => ConstData::Bool(false),
            Type::Char => ConstData::Char('\0'),
            Type::StringSlice => ConstData::Str(String::new()),
            Type::Maybe(_) => ConstData::Maybe(None),
            Type::Mark(mark) if mark.is_nullable => ConstData::Null,
            Type::Choice(id) => {
                let def = self.types.choice_def(id);
                let variant = def
                    .default_variant
                    .and_then(|i| def.variants.get(i))
                    .ok_or_else(|| {
                        CompileError::at(
                            codes::MISSING_CONSTRUCTOR,
                            format!("Choice type `{}` has no default variant", def.full_name),
                            range,
                        )
                    })?;
                ConstData::Int(variant.value)
            }
            Type::Mix(id) => {
                let def = self.types.mix_def(id);
                let index = def.default_variant.ok_or_else(|| {
                    CompileError::at(
                        codes::MISSING_CONSTRUCTOR,
                        format!("Mix type `{}` has no default variant", def.full_name),
                        range,
                    )
                })?;
                let payload = def.variants().get(index).and_then(|v| v.payload);
                let payload = match payload {
                    Some(payload) => Some(Box::new(self.default_prerun(payload, range)?.data)),
                    None => None,
                };
                ConstData::Mix {
                    variant: index,
                    payload,
                }
            }
            Type::Tuple(tuple) => {
                let mut items = Vec::with_capacity(tuple.members.len());
                for member in tuple.members {
                    items.push(self.default_prerun(member, range)?.data);
                }
                ConstData::Tuple(items)
            }
            Type::Array(array) => {
                let item = self.default_prerun(array.element, range)?.data;
                ConstData::Array(vec![item; array.length as usize])
            }
            Type::Struct(_) => {
                if self.types.has_member(ty, MemberKind::DefaultConstructor)
                    || !self.types.can_be_prerun(ty)
                {
                    return Err(no_default(self));
                }
                let fields: Vec<TypeId> = self
                    .types
                    .struct_of(ty)
                    .map(|d| d.fields().iter().map(|f| f.ty).collect())
                    .unwrap_or_default();
                let mut items = Vec::with_capacity(fields.len());
                for field in fields {
                    items.push(self.default_prerun(field, range)?.data);
                }
                ConstData::Struct(items)
            }
            _ => return Err(no_default(self)),
        };
        Ok(PrerunValue::new(data, ty))
    }

    pub(crate) fn define_value(
        &mut self,
        value: &DefineValue,
        expected: Option<TypeId>,
    ) -> PrerunValue {
        match value {
            DefineValue::Bool(b) => PrerunValue::bool(TypeContext::BOOL, *b),
            DefineValue::Str(s) => PrerunValue::new(ConstData::Str(s.clone()), TypeContext::STR),
            DefineValue::Int(i) => {
                let raw = i128::from(*i);
                let ty = expected
                    .filter(|e| self.types.int_info(*e).is_some_and(|info| int_fits(raw, info)))
                    .unwrap_or_else(|| self.types.integer(64));
                PrerunValue::int(ty, raw)
            }
        }
    }

    fn prerun_entity(
        &mut self,
        ctx: &EmitCtx,
        name: &QualifiedName,
        expected: Option<TypeId>,
    ) -> CompileResult<PrerunValue> {
        if name.is_single() {
            if let Some(last) = name.last() {
                if let Some(frame) = self.prerun_frames.last() {
                    if let Some(local) = frame.get(last.as_str()) {
                        return Ok(local.value.clone());
                    }
                }
                if let Some(id) = self.find_local(last.as_str()) {
                    let local = self.local(id)?;
                    return local
                        .prerun
                        .clone()
                        .filter(|_| !local.is_variable)
                        .ok_or_else(|| not_prerun(&format!("Local `{}`", last), name.range));
                }
            }
        }

        match self.resolve_name(ctx, name) {
            Ok(Resolved::Item(item)) => match self.symbol(item.entity, name.range)?.clone() {
                Symbol::PrerunGlobal(value) => Ok(value),
                Symbol::Global {
                    is_variable: false,
                    value,
                    ..
                } => Ok(value),
                Symbol::Type(ty) => {
                    let typed = self.types.typed(ty);
                    Ok(PrerunValue::new(ConstData::Type(ty), typed))
                }
                _ => Err(not_prerun(&format!("`{}`", name), name.range)),
            },
            Ok(Resolved::Module(_)) => Err(CompileError::at(
                codes::INVALID_EXPRESSION,
                format!("`{}` is a module, not a value", name),
                name.range,
            )),
            Err(ResolveError::NotAModule { .. }) if name.segments.len() > 1 => {
                let (parent, member) = self.split_type_member(ctx, name)?;
                self.prerun_variant(parent, member, None)
            }
            Err(error @ ResolveError::NotFound { .. }) if name.is_single() => {
                let key = name.last().map(|l| l.as_str()).unwrap_or_default();
                match self.options.defines.get(key) {
                    Some(define) => Ok(self.define_value(define, expected)),
                    None => Err(error.into()),
                }
            }
            Err(error) => Err(error.into()),
        }
    }

    /// The prerun function a name denotes, if it denotes one
    fn prerun_function_named(
        &mut self,
        ctx: &EmitCtx,
        name: &QualifiedName,
    ) -> CompileResult<Option<PrerunFunction<'a>>> {
        match self.resolve_name(ctx, name)? {
            Resolved::Item(item) => match self.symbol(item.entity, name.range)? {
                Symbol::PrerunFunction(function) => Ok(Some(function.clone())),
                _ => Ok(None),
            },
            Resolved::Module(_) => Ok(None),
        }
    }

    /// Run a prerun function over already evaluated arguments
    pub(crate) fn call_prerun(
        &mut self,
        function: PrerunFunction<'a>,
        args: Vec<PrerunValue>,
        range: FileRange,
    ) -> CompileResult<PrerunValue> {
        if self.prerun_frames.len() >= self.options.prerun_call_depth {
            return Err(CompileError::at(
                codes::PRERUN_FAILURE,
                format!(
                    "Compile-time calls nest deeper than {} while calling `{}`",
                    self.options.prerun_call_depth, function.full_name
                ),
                range,
            ));
        }
        let mut frame = PrerunCallState::new(function.full_name.clone(), function.return_type);
        for (param, value) in function.args.iter().zip(args) {
            if value.ty != param.ty {
                return Err(CompileError::at(
                    codes::ARGUMENT_TYPE,
                    format!(
                        "Argument `{}` of `{}` has type `{}`, but the provided value is of type `{}`",
                        param.name,
                        function.full_name,
                        self.type_name(param.ty),
                        self.type_name(value.ty)
                    ),
                    range,
                ));
            }
            frame.declare(param.name.as_str(), value, param.is_variable);
        }

        let ctx = EmitCtx::new(function.module);
        self.prerun_frames.push(frame);
        let result = self.prerun_sentences(&ctx, function.body);
        self.prerun_frames.pop();

        match result? {
            Flow::Give(Some(value)) => {
                if value.ty != function.return_type {
                    return Err(self.mismatch(function.return_type, value.ty, range));
                }
                Ok(value)
            }
            Flow::Normal | Flow::Give(None) if function.return_type == TypeContext::VOID => {
                Ok(PrerunValue::new(ConstData::Void, TypeContext::VOID))
            }
            Flow::Normal | Flow::Give(None) => Err(CompileError::at(
                codes::MISSING_GIVE,
                format!(
                    "Prerun function `{}` finished without giving a value of type `{}`",
                    function.full_name,
                    self.type_name(function.return_type)
                ),
                range,
            )),
            Flow::Break(_) | Flow::Continue(_) => Err(CompileError::at(
                codes::CONTROL_FLOW,
                format!("`break` or `continue` escaped the body of `{}`", function.full_name),
                function.range,
            )),
        }
    }

    fn frame_mut(&mut self) -> CompileResult<&mut PrerunCallState> {
        self.prerun_frames
            .last_mut()
            .ok_or_else(|| CompileError::internal("prerun sentence outside of a prerun call"))
    }

    pub(crate) fn prerun_sentences(
        &mut self,
        ctx: &EmitCtx,
        body: &[Sentence],
    ) -> CompileResult<Flow> {
        self.frame_mut()?.push_scope();
        let mut flow = Ok(Flow::Normal);
        for sentence in body {
            flow = self.prerun_sentence(ctx, sentence);
            if !matches!(flow, Ok(Flow::Normal)) {
                break;
            }
        }
        self.frame_mut()?.pop_scope();
        flow
    }

    fn prerun_sentence(&mut self, ctx: &EmitCtx, sentence: &Sentence) -> CompileResult<Flow> {
        let range = sentence.range;
        match &sentence.kind {
            SentenceKind::LocalDeclaration(decl) => {
                self.prerun_local(ctx, decl, range)?;
                Ok(Flow::Normal)
            }
            SentenceKind::Assignment { lhs, rhs } => {
                let name = self.prerun_target(lhs)?;
                let ty = self.prerun_assignable(&name)?;
                let value = self.prerun_expr(ctx, rhs, Some(ty))?;
                if value.ty != ty {
                    return Err(self.mismatch(ty, value.ty, rhs.range));
                }
                self.prerun_set(&name, value)?;
                Ok(Flow::Normal)
            }
            SentenceKind::OperatorAssignment { op, lhs, rhs } => {
                let name = self.prerun_target(lhs)?;
                let ty = self.prerun_assignable(&name)?;
                let current = self.prerun_expr(ctx, lhs, None)?;
                let value = self.prerun_expr(ctx, rhs, Some(ty))?;
                self.check_operand_types(*op, current.ty, value.ty, range)?;
                let result = fold_binary(&self.types, *op, &current, &value)
                    .map_err(|e| fold_error(e, range))?;
                if result.ty != ty {
                    return Err(self.mismatch(ty, result.ty, range));
                }
                self.prerun_set(&name, result)?;
                Ok(Flow::Normal)
            }
            SentenceKind::Expression(expr) => {
                self.prerun_expr(ctx, expr, None)?;
                Ok(Flow::Normal)
            }
            SentenceKind::If { branches, otherwise } => {
                for branch in branches {
                    if self.prerun_condition(ctx, &branch.condition)? {
                        return self.prerun_sentences(ctx, &branch.body);
                    }
                }
                match otherwise {
                    Some(body) => self.prerun_sentences(ctx, body),
                    None => Ok(Flow::Normal),
                }
            }
            SentenceKind::LoopWhile { condition, body, tag } => {
                let tag = tag.as_ref().map(|t| t.as_str());
                let mut iterations = 0u64;
                loop {
                    self.count_iteration(&mut iterations, range)?;
                    if !self.prerun_condition(ctx, condition)? {
                        return Ok(Flow::Normal);
                    }
                    match self.prerun_sentences(ctx, body)? {
                        Flow::Break(t) if Flow::targets(&t, tag) => return Ok(Flow::Normal),
                        Flow::Continue(t) if Flow::targets(&t, tag) => continue,
                        Flow::Normal => {}
                        other => return Ok(other),
                    }
                }
            }
            SentenceKind::LoopInfinite { body, tag } => {
                let tag = tag.as_ref().map(|t| t.as_str());
                let mut iterations = 0u64;
                loop {
                    self.count_iteration(&mut iterations, range)?;
                    match self.prerun_sentences(ctx, body)? {
                        Flow::Break(t) if Flow::targets(&t, tag) => return Ok(Flow::Normal),
                        Flow::Continue(t) if Flow::targets(&t, tag) => continue,
                        Flow::Normal => {}
                        other => return Ok(other),
                    }
                }
            }
            SentenceKind::LoopTimes {
                count,
                index,
                body,
                tag,
            } => {
                let count = self.prerun_expr(ctx, count, Some(TypeContext::USIZE))?;
                let ty = count.ty;
                let total = count
                    .as_int()
                    .filter(|_| self.types.int_info(ty).is_some())
                    .ok_or_else(|| self.mismatch(TypeContext::USIZE, ty, range))?;
                let items = (0..total.max(0)).map(move |i| PrerunValue::int(ty, i));
                self.prerun_iterate(ctx, items, None, index.as_ref(), body, tag.as_ref(), range)
            }
            SentenceKind::LoopIn {
                iterable,
                item,
                index,
                body,
                tag,
            } => {
                let iterable = self.prerun_expr(ctx, iterable, None)?;
                let items: Vec<PrerunValue> = match (&iterable.data, self.types.get(iterable.ty)) {
                    (ConstData::Array(items), Type::Array(array)) => {
                        let element = array.element;
                        items.iter().map(|i| PrerunValue::new(i.clone(), element)).collect()
                    }
                    (ConstData::Str(s), _) => s
                        .bytes()
                        .map(|b| PrerunValue::int(TypeContext::U8, i128::from(b)))
                        .collect(),
                    _ => return Err(not_prerun("Looping over this value", range)),
                };
                self.prerun_iterate(
                    ctx,
                    items,
                    Some(item),
                    index.as_ref(),
                    body,
                    tag.as_ref(),
                    range,
                )
            }
            SentenceKind::Break(tag) => Ok(Flow::Break(tag.as_ref().map(|t| t.value.clone()))),
            SentenceKind::Continue(tag) => {
                Ok(Flow::Continue(tag.as_ref().map(|t| t.value.clone())))
            }
            SentenceKind::Give(value) => {
                let return_type = self.frame_mut()?.return_type;
                match value {
                    Some(value) => {
                        let value = self.prerun_expr(ctx, value, Some(return_type))?;
                        Ok(Flow::Give(Some(value)))
                    }
                    None => Ok(Flow::Give(None)),
                }
            }
            SentenceKind::Block(body) => self.prerun_sentences(ctx, body),
            SentenceKind::MetaTodo(message) => {
                self.meta_todo(message.as_deref(), range)?;
                Ok(Flow::Normal)
            }
        }
    }

    fn count_iteration(&self, iterations: &mut u64, range: FileRange) -> CompileResult<()> {
        *iterations += 1;
        if *iterations > self.options.prerun_loop_limit {
            return Err(CompileError::at(
                codes::PRERUN_FAILURE,
                format!(
                    "Compile-time loop ran more than {} times",
                    self.options.prerun_loop_limit
                ),
                range,
            ));
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn prerun_iterate(
        &mut self,
        ctx: &EmitCtx,
        items: impl IntoIterator<Item = PrerunValue>,
        item: Option<&Identifier>,
        index: Option<&Identifier>,
        body: &[Sentence],
        tag: Option<&Identifier>,
        range: FileRange,
    ) -> CompileResult<Flow> {
        let tag = tag.map(|t| t.as_str());
        let mut iterations = 0u64;
        for (position, value) in items.into_iter().enumerate() {
            self.count_iteration(&mut iterations, range)?;
            let frame = self.frame_mut()?;
            frame.push_scope();
            if let Some(item) = item {
                frame.declare(item.as_str(), value.clone(), false);
            }
            if let Some(index) = index {
                let index_value = if item.is_some() {
                    PrerunValue::int(TypeContext::USIZE, position as i128)
                } else {
                    value
                };
                frame.declare(index.as_str(), index_value, false);
            }
            let flow = self.prerun_sentences(ctx, body);
            self.frame_mut()?.pop_scope();
            match flow? {
                Flow::Break(t) if Flow::targets(&t, tag) => return Ok(Flow::Normal),
                Flow::Continue(t) if Flow::targets(&t, tag) => continue,
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn prerun_local(
        &mut self,
        ctx: &EmitCtx,
        decl: &LocalDeclaration,
        range: FileRange,
    ) -> CompileResult<()> {
        if decl.is_reference {
            return Err(not_prerun("A reference local", range));
        }
        let declared = match &decl.ty {
            Some(ty) => Some(self.resolve_type(ctx, ty)?),
            None => None,
        };
        let value = match (&decl.value, declared) {
            (Some(value), _) => self.prerun_expr(ctx, value, declared)?,
            (None, Some(ty)) => self.default_prerun(ty, range)?,
            (None, None) => {
                return Err(CompileError::at(
                    codes::MISSING_VALUE,
                    format!("Local `{}` needs a type or a value", decl.name),
                    decl.name.range,
                ))
            }
        };
        if let Some(ty) = declared {
            if value.ty != ty {
                return Err(self.mismatch(ty, value.ty, range));
            }
        }
        if !self.frame_mut()?.declare(decl.name.as_str(), value, decl.is_variable) {
            return Err(CompileError::at(
                codes::DUPLICATE_NAME,
                format!("A local named `{}` already exists in this scope", decl.name),
                decl.name.range,
            ));
        }
        Ok(())
    }

    fn prerun_target(&self, lhs: &Expression) -> CompileResult<Identifier> {
        match &lhs.kind {
            ExprKind::Entity(name) if name.is_single() => name
                .last()
                .cloned()
                .ok_or_else(|| CompileError::internal("empty name")),
            _ => Err(not_prerun("Assigning to this expression", lhs.range)),
        }
    }

    /// Type of an assignable prerun local
    fn prerun_assignable(&mut self, name: &Identifier) -> CompileResult<TypeId> {
        let frame = self.frame_mut()?;
        match frame.get(name.as_str()) {
            Some(local) if local.is_variable => Ok(local.value.ty),
            Some(_) => Err(CompileError::at(
                codes::NOT_VARIABLE,
                format!("Local `{}` is not variable and cannot be assigned to", name),
                name.range,
            )),
            None => Err(not_prerun(&format!("Assigning to `{}`", name), name.range)),
        }
    }

    fn prerun_set(&mut self, name: &Identifier, value: PrerunValue) -> CompileResult<()> {
        let local = self
            .frame_mut()?
            .get_mut(name.as_str())
            .ok_or_else(|| not_prerun(&format!("Assigning to `{}`", name), name.range))?;
        local.value = value;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_fits() {
        let i8 = IntInfo {
            bits: 8,
            is_signed: true,
        };
        let u8 = IntInfo {
            bits: 8,
            is_signed: false,
        };
        assert!(int_fits(127, i8));
        assert!(int_fits(-128, i8));
        assert!(!int_fits(128, i8));
        assert!(int_fits(255, u8));
        assert!(!int_fits(256, u8));
        assert!(!int_fits(-1, u8));
    }
}
