//! Calls: functions, function values, prerun functions, static and
//! instance members

use tracing::trace;

use crate::ast::{ExprKind, Expression, QualifiedName};
use crate::ctx::EmitCtx;
use crate::error::{codes, CompileError, CompileResult};
use crate::ir::{Callee, IrInstr, IrValue};
use crate::module::{ResolveError, Resolved};
use crate::span::{FileRange, Identifier};
use crate::types::{MemberFunction, MemberKind, Type, TypeId};
use crate::value::{Storage, Value};

use super::{Expect, Lowerer, Symbol};

impl<'a> Lowerer<'a> {
    /// Whether `value` can be passed where `param` is expected without
    /// an explicit conversion
    pub(crate) fn arg_accepts(&self, param: TypeId, value: &Value) -> bool {
        if param == value.ty || param == self.types.non_reference(value.ty) {
            return true;
        }
        match (self.types.reference_info(param), self.types.reference_info(value.ty)) {
            (Some(wanted), Some(given)) => {
                wanted.subtype == given.subtype
                    && (!wanted.is_subtype_variable || given.is_subtype_variable)
            }
            (Some(wanted), None) => {
                wanted.subtype == value.ty
                    && value.storage != Storage::Temporary
                    && (!wanted.is_subtype_variable || value.is_mutable(&self.types))
            }
            _ => false,
        }
    }

    /// Emit a call of a member function; the instance goes first
    pub(crate) fn call_member(
        &mut self,
        member: &MemberFunction,
        instance: Option<IrValue>,
        args: Vec<IrValue>,
        range: FileRange,
    ) -> CompileResult<Value> {
        let mut operands = Vec::with_capacity(args.len() + 1);
        if member.kind.has_self() {
            let instance = instance.ok_or_else(|| {
                CompileError::internal(format!(
                    "{} `{}` called without an instance",
                    member.kind.describe(),
                    member.name
                ))
            })?;
            operands.push(instance);
        }
        operands.extend(args);
        trace!(member = %member.name, kind = member.kind.describe(), "member call");
        self.emit_call(Callee::Function(member.function), operands, member.return_type, range)
    }

    fn emit_call(
        &mut self,
        callee: Callee,
        args: Vec<IrValue>,
        return_type: TypeId,
        range: FileRange,
    ) -> CompileResult<Value> {
        let dest = if return_type == crate::types::TypeContext::VOID {
            None
        } else {
            Some(self.fresh_register(return_type)?)
        };
        self.emit(IrInstr::Call { dest, callee, args })?;
        Ok(match dest {
            Some(dest) => Value::temporary(dest, return_type, range),
            None => Self::void_value(range),
        })
    }

    /// Lower call arguments against the parameter types of `what`
    pub(crate) fn lower_args(
        &mut self,
        ctx: &EmitCtx,
        what: &str,
        params: &[TypeId],
        is_variadic: bool,
        args: &[Expression],
        range: FileRange,
    ) -> CompileResult<Vec<IrValue>> {
        if args.len() < params.len() || (!is_variadic && args.len() > params.len()) {
            return Err(CompileError::at(
                codes::ARGUMENT_COUNT,
                format!(
                    "{} expects {}{} arguments, but {} were provided",
                    what,
                    if is_variadic { "at least " } else { "" },
                    params.len(),
                    args.len()
                ),
                range,
            ));
        }

        let mut lowered = Vec::with_capacity(args.len());
        for (index, arg) in args.iter().enumerate() {
            let Some(param) = params.get(index).copied() else {
                let extra = self.lower_rvalue(ctx, arg, Expect::none())?;
                lowered.push(extra.ir);
                continue;
            };
            let wanted = self.types.non_reference(param);
            let value = self.lower_expr(ctx, arg, Expect::of(wanted))?;
            if self.types.non_reference(value.ty) != wanted {
                return Err(CompileError::at(
                    codes::ARGUMENT_TYPE,
                    format!(
                        "Argument {} of {} expects a value of type `{}`, but the provided value is of type `{}`",
                        index + 1,
                        what,
                        self.type_name(param),
                        self.type_name(value.ty)
                    ),
                    arg.range,
                ));
            }
            lowered.push(self.pass_value(value, param, arg.range)?);
        }
        Ok(lowered)
    }

    pub(crate) fn lower_call(
        &mut self,
        ctx: &EmitCtx,
        callee: &Expression,
        args: &[Expression],
        expect: Expect,
        range: FileRange,
    ) -> CompileResult<Value> {
        let ExprKind::Entity(name) = &callee.kind else {
            let function = self.lower_rvalue(ctx, callee, Expect::none())?;
            return self.call_value(ctx, function, "This value", args, range);
        };
        if name.is_single() && name.last().is_some_and(|n| self.find_local(n.as_str()).is_some()) {
            let function = self.lower_rvalue(ctx, callee, Expect::none())?;
            return self.call_value(ctx, function, &format!("Local `{}`", name), args, range);
        }

        match self.resolve_name(ctx, name) {
            Ok(Resolved::Item(item)) => match self.symbol(item.entity, name.range)?.clone() {
                Symbol::Function { id, ty } => {
                    let signature = self.types.get(ty).as_function().cloned();
                    let signature = signature.ok_or_else(|| {
                        CompileError::internal(format!(
                            "function `{}` has a non-function type",
                            name
                        ))
                    })?;
                    let what = format!("Function `{}`", name);
                    let operands = self.lower_args(
                        ctx,
                        &what,
                        &signature.args,
                        signature.is_variadic,
                        args,
                        range,
                    )?;
                    self.emit_call(Callee::Function(id), operands, signature.return_type, range)
                }
                Symbol::PrerunFunction(function) => {
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
                    let result = self.call_prerun(function, values, range)?;
                    Ok(self.constant_value(result, range))
                }
                Symbol::Type(ty) => self.construct(ctx, ty, args, expect, range),
                Symbol::Global { .. } => {
                    let function = self.lower_rvalue(ctx, callee, Expect::none())?;
                    self.call_value(ctx, function, &format!("Global `{}`", name), args, range)
                }
                _ => Err(not_callable(name, range)),
            },
            Ok(Resolved::Module(_)) => Err(not_callable(name, range)),
            Err(ResolveError::NotAModule { .. }) if name.segments.len() > 1 => {
                let (ty, member) = self.split_type_member(ctx, name)?;
                self.lower_static_call(ctx, ty, member, args, expect, range)
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Call through a value of function type
    fn call_value(
        &mut self,
        ctx: &EmitCtx,
        function: Value,
        what: &str,
        args: &[Expression],
        range: FileRange,
    ) -> CompileResult<Value> {
        let Some(signature) = self.types.get(function.ty).as_function().cloned() else {
            return Err(CompileError::at(
                codes::NOT_CALLABLE,
                format!(
                    "{} is of type `{}` and cannot be called",
                    what,
                    self.type_name(function.ty)
                ),
                range,
            ));
        };
        let operands = self.lower_args(
            ctx,
            what,
            &signature.args,
            signature.is_variadic,
            args,
            range,
        )?;
        self.emit_call(Callee::Indirect(function.ir), operands, signature.return_type, range)
    }

    /// `T::name(args)`: a static function, a `from` convertor or a mix
    /// variant carrying a value
    fn lower_static_call(
        &mut self,
        ctx: &EmitCtx,
        ty: TypeId,
        name: &Identifier,
        args: &[Expression],
        expect: Expect,
        range: FileRange,
    ) -> CompileResult<Value> {
        if name.as_str() == "from" {
            return self.construct(ctx, ty, args, expect, range);
        }
        let member: Option<MemberFunction> = self
            .types
            .members_of(ty)
            .into_iter()
            .find(|m| m.kind == MemberKind::Static && m.name == name.value)
            .cloned();
        if let Some(member) = member {
            self.check_member_access(ctx, &member, name)?;
            let what = format!("Static function `{}::{}`", self.type_name(ty), name);
            let operands = self.lower_args(ctx, &what, &member.arg_types(), false, args, range)?;
            return self.call_member(&member, None, operands, range);
        }
        let is_variant = self
            .types
            .mix_of(ty)
            .is_some_and(|def| def.variant(name.as_str()).is_some());
        if is_variant && args.len() == 1 {
            return self.lower_variant(ctx, ty, name, args.first(), expect, range);
        }
        Err(CompileError::at(
            codes::NO_MEMBER,
            format!("Type `{}` has no static function named `{}`", self.type_name(ty), name),
            name.range,
        ))
    }

    pub(crate) fn check_member_access(
        &self,
        ctx: &EmitCtx,
        member: &MemberFunction,
        name: &Identifier,
    ) -> CompileResult<()> {
        if self.modules.is_accessible(&member.visibility, &ctx.access()) {
            return Ok(());
        }
        Err(CompileError::at(
            codes::NOT_ACCESSIBLE,
            format!(
                "{} `{}` of `{}` is {} and not accessible here",
                capitalized(member.kind.describe()),
                member.name,
                self.type_name(member.parent),
                member.visibility.describe()
            ),
            name.range,
        ))
    }

    /// `instance.name(args)`
    pub(crate) fn lower_method_call(
        &mut self,
        ctx: &EmitCtx,
        instance: Value,
        name: &Identifier,
        args: &[Expression],
        is_variation: bool,
        range: FileRange,
    ) -> CompileResult<Value> {
        let mut instance = instance;
        let mut ty = self.types.non_reference(instance.ty);
        if self.find_method(ty, name).is_none() {
            if let Type::Mark(mark) = self.types.get(ty).clone() {
                if !mark.is_slice {
                    let pointer = self.to_rvalue(instance)?;
                    instance = Value::at(
                        pointer.ir,
                        mark.subtype,
                        mark.is_subtype_variable,
                        Storage::Pointee,
                        range,
                    );
                    ty = mark.subtype;
                }
            }
        }
        let member = self.find_method(ty, name).ok_or_else(|| {
            CompileError::at(
                codes::NO_MEMBER,
                format!("Type `{}` has no method named `{}`", self.type_name(ty), name),
                name.range,
            )
        })?;
        self.check_member_access(ctx, &member, name)?;

        let is_variation_method = member.kind == MemberKind::VariationMethod;
        if is_variation != is_variation_method {
            return Err(CompileError::at(
                codes::INVALID_EXPRESSION,
                if is_variation_method {
                    format!(
                        "`{}` is a variation method of `{}` and must be called as one",
                        name,
                        self.type_name(ty)
                    )
                } else {
                    format!("`{}` is not a variation method of `{}`", name, self.type_name(ty))
                },
                name.range,
            ));
        }

        let place = if is_variation_method {
            let place = self.as_place(instance)?.filter(|p| p.is_mutable(&self.types));
            place.ok_or_else(|| {
                CompileError::at(
                    codes::NOT_VARIABLE,
                    format!(
                        "Variation method `{}` needs a variable instance of `{}`",
                        name,
                        self.type_name(ty)
                    ),
                    range,
                )
            })?
        } else {
            self.into_place(instance)?
        };

        let what = format!("Method `{}` of `{}`", name, self.type_name(ty));
        let operands = self.lower_args(ctx, &what, &member.arg_types(), false, args, range)?;
        self.call_member(&member, Some(place.ir), operands, range)
    }

    fn find_method(&self, ty: TypeId, name: &Identifier) -> Option<MemberFunction> {
        self.types
            .members_of(ty)
            .into_iter()
            .find(|m| {
                matches!(m.kind, MemberKind::Method | MemberKind::VariationMethod)
                    && m.name == name.value
            })
            .cloned()
    }
}

fn not_callable(name: &QualifiedName, range: FileRange) -> CompileError {
    CompileError::at(
        codes::NOT_CALLABLE,
        format!("`{}` cannot be called", name),
        range,
    )
}

fn capitalized(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::capitalized;

    #[test]
    fn test_capitalized() {
        assert_eq!(capitalized("variation method"), "Variation method");
        assert_eq!(capitalized(""), "");
    }
}
