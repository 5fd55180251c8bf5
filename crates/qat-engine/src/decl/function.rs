//! Functions
//!
//! Phase 1 declares the prototype so calls can be lowered anywhere; phase 3
//! lowers the body. A function without a body is external and keeps its
//! plain name so it links against C code.

use tracing::debug;

use crate::ast::{Argument, FunctionDecl, TypeExpr};
use crate::ctx::EmitCtx;
use crate::entity::{DependType, DependencyCollector, EmitPhase, EntityId};
use crate::error::{codes, CompileError, CompileResult};
use crate::ir::{FunctionId, IrFunction, Register};
use crate::lower::{LocalVar, Lowerer, Symbol};
use crate::span::{FileRange, Identifier};
use crate::types::{TypeContext, TypeId};

use super::check_unique;

pub(super) fn dependencies(collector: &mut DependencyCollector<'_>, decl: &FunctionDecl) {
    collector.args(&decl.args, DependType::Partial, EmitPhase::Phase1);
    if let Some(ret) = &decl.return_type {
        collector.type_expr(ret, DependType::Partial, EmitPhase::Phase1);
    }
    if let Some(body) = &decl.body {
        collector.args(&decl.args, DependType::Complete, EmitPhase::Phase3);
        if let Some(ret) = &decl.return_type {
            collector.type_expr(ret, DependType::Complete, EmitPhase::Phase3);
        }
        collector.declare_args(&decl.args);
        collector.sentences(body, EmitPhase::Phase3);
    }
}

impl<'a> Lowerer<'a> {
    /// Argument types of a function that is not a member
    pub(super) fn resolve_params(
        &mut self,
        ctx: &EmitCtx,
        args: &[Argument],
        owner: &str,
    ) -> CompileResult<Vec<TypeId>> {
        check_unique(args.iter().map(|a| &a.name), "Argument")?;
        let mut params = Vec::with_capacity(args.len());
        for arg in args {
            if arg.is_member_arg {
                return Err(CompileError::at(
                    codes::MEMBER_ARGUMENT,
                    format!(
                        "Member argument `''{}` can only be used in member functions",
                        arg.name
                    ),
                    arg.range,
                ));
            }
            let ty = arg.ty.as_ref().ok_or_else(|| {
                CompileError::at(
                    codes::MISSING_VALUE,
                    format!("Argument `{}` of {} needs a type", arg.name, owner),
                    arg.range,
                )
            })?;
            let ty = self.resolve_type(ctx, ty)?;
            if ty == TypeContext::VOID {
                return Err(CompileError::at(
                    codes::TYPE_MISMATCH,
                    format!("Argument `{}` cannot be of type `void`", arg.name),
                    arg.range,
                ));
            }
            params.push(ty);
        }
        Ok(params)
    }

    pub(super) fn return_type_of(
        &mut self,
        ctx: &EmitCtx,
        ty: Option<&TypeExpr>,
    ) -> CompileResult<TypeId> {
        match ty {
            Some(ty) => self.resolve_type(ctx, ty),
            None => Ok(TypeContext::VOID),
        }
    }

    /// Make an incoming parameter available as a local
    ///
    /// Reference parameters already hold the address they refer to. Value
    /// parameters get a stack slot so they can be addressed and, when
    /// variable, assigned.
    pub(super) fn bind_param(
        &mut self,
        name: &Identifier,
        register: Register,
        ty: TypeId,
        is_variable: bool,
    ) -> CompileResult<()> {
        if let Some(reference) = self.types.reference_info(ty) {
            self.declare_local(LocalVar {
                name: name.clone(),
                address: register.into(),
                ty,
                is_variable: reference.is_subtype_variable,
                is_reference: true,
                prerun: None,
            })?;
            return Ok(());
        }
        self.require_sized(ty, name.range)?;
        let slot = self.alloca(ty, Some(name.as_str()))?;
        self.store(register.into(), slot.into())?;
        self.declare_local(LocalVar {
            name: name.clone(),
            address: slot.into(),
            ty,
            is_variable,
            is_reference: false,
            prerun: None,
        })?;
        Ok(())
    }

    pub(super) fn function_params(&self, function: FunctionId) -> CompileResult<Vec<Register>> {
        self.ir
            .get_function(function)
            .map(|f| f.params.clone())
            .ok_or_else(|| CompileError::internal(format!("missing prototype for {}", function)))
    }

    pub(super) fn function_prototype(
        &mut self,
        ctx: &EmitCtx,
        id: EntityId,
        decl: &FunctionDecl,
        range: FileRange,
    ) -> CompileResult<()> {
        let what = format!("function `{}`", decl.name);
        let param_types = self.resolve_params(ctx, &decl.args, &what)?;
        let return_type = self.return_type_of(ctx, decl.return_type.as_ref())?;

        let function = match decl.body {
            None => self
                .ir
                .declare_external(decl.name.as_str(), &param_types, return_type, decl.is_variadic),
            Some(_) => {
                if decl.is_variadic {
                    return Err(CompileError::at(
                        codes::INVALID_EXPRESSION,
                        format!("Function `{}` has a body, so it cannot be variadic", decl.name),
                        range,
                    ));
                }
                let mut function = IrFunction::new(
                    self.modules.full_name_of(ctx.module, decl.name.as_str()),
                    &param_types,
                    return_type,
                );
                function.range = range;
                self.ir.add_function(function)
            }
        };
        let ty = self.types.function(return_type, param_types, decl.is_variadic);
        self.symbols.insert(id, Symbol::Function { id: function, ty });
        debug!(
            function = %decl.name,
            %function,
            external = decl.body.is_none(),
            "function prototype"
        );
        Ok(())
    }

    pub(super) fn function_body(
        &mut self,
        ctx: &EmitCtx,
        id: EntityId,
        decl: &FunctionDecl,
        range: FileRange,
    ) -> CompileResult<()> {
        let Some(body) = &decl.body else {
            return Ok(());
        };
        let (function, ty) = match self.symbol(id, decl.name.range)? {
            Symbol::Function { id, ty } => (*id, *ty),
            _ => return Err(CompileError::internal(format!("`{}` has no prototype", decl.name))),
        };
        let return_type = self
            .types
            .get(ty)
            .as_function()
            .map(|f| f.return_type)
            .unwrap_or(TypeContext::VOID);
        let registers = self.function_params(function)?;
        let ctx = ctx.with_function(function);

        self.begin_function(function, return_type, None)?;
        for (arg, register) in decl.args.iter().zip(registers) {
            self.bind_param(&arg.name, register, register.ty, arg.is_variable)?;
        }
        self.lower_sentences(&ctx, body)?;
        self.finish_function(range)?;
        debug!(function = %decl.name, "function body lowered");
        Ok(())
    }
}
