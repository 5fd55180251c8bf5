//! Prerun globals and prerun functions
//!
//! Both only exist while compiling. A prerun function keeps a borrow of its
//! body, which the interpreter walks on every call.

use tracing::debug;

use crate::ast::{PrerunFunctionDecl, PrerunGlobalDecl};
use crate::ctx::EmitCtx;
use crate::entity::{DependType, DependencyCollector, EmitPhase, EntityId};
use crate::error::{codes, CompileError, CompileResult};
use crate::lower::{Lowerer, Symbol};
use crate::prerun::{PrerunArg, PrerunFunction};
use crate::span::FileRange;
use crate::types::{TypeContext, TypeId};

use super::check_unique;

pub(super) fn global_dependencies(
    collector: &mut DependencyCollector<'_>,
    decl: &PrerunGlobalDecl,
) {
    if let Some(ty) = &decl.ty {
        collector.type_expr(ty, DependType::Complete, EmitPhase::Phase1);
    }
    collector.expr(&decl.value, EmitPhase::Phase1);
}

pub(super) fn function_dependencies(
    collector: &mut DependencyCollector<'_>,
    decl: &PrerunFunctionDecl,
) {
    collector.args(&decl.args, DependType::Complete, EmitPhase::Phase1);
    if let Some(ret) = &decl.return_type {
        collector.type_expr(ret, DependType::Complete, EmitPhase::Phase1);
    }
    collector.declare_args(&decl.args);
    collector.sentences(&decl.body, EmitPhase::Phase1);
}

impl<'a> Lowerer<'a> {
    fn require_prerun_type(&self, ty: TypeId, what: &str, range: FileRange) -> CompileResult<()> {
        if self.types.can_be_prerun(ty) {
            return Ok(());
        }
        Err(CompileError::at(
            codes::NOT_PRERUN,
            format!("{} is of type `{}`, which has no prerun values", what, self.type_name(ty)),
            range,
        ))
    }

    pub(super) fn prerun_global(
        &mut self,
        ctx: &EmitCtx,
        id: EntityId,
        decl: &PrerunGlobalDecl,
    ) -> CompileResult<()> {
        let declared = match &decl.ty {
            Some(ty) => Some(self.resolve_type(ctx, ty)?),
            None => None,
        };
        let value = self.prerun_expr(ctx, &decl.value, declared)?;
        if let Some(declared) = declared {
            if declared != value.ty {
                return Err(self.mismatch(declared, value.ty, decl.value.range));
            }
        }
        let what = format!("Prerun global `{}`", decl.name);
        self.require_prerun_type(value.ty, &what, decl.value.range)?;
        debug!(global = %decl.name, ty = %self.type_name(value.ty), "prerun global evaluated");
        self.symbols.insert(id, Symbol::PrerunGlobal(value));
        Ok(())
    }

    pub(super) fn prerun_function(
        &mut self,
        ctx: &EmitCtx,
        id: EntityId,
        decl: &'a PrerunFunctionDecl,
        range: FileRange,
    ) -> CompileResult<()> {
        check_unique(decl.args.iter().map(|a| &a.name), "Argument")?;
        let mut args = Vec::with_capacity(decl.args.len());
        for arg in &decl.args {
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
                    format!(
                        "Argument `{}` of prerun function `{}` needs a type",
                        arg.name, decl.name
                    ),
                    arg.range,
                )
            })?;
            let ty = self.resolve_type(ctx, ty)?;
            self.require_prerun_type(ty, &format!("Argument `{}`", arg.name), arg.range)?;
            args.push(PrerunArg {
                name: arg.name.clone(),
                ty,
                is_variable: arg.is_variable,
            });
        }
        let return_type = match &decl.return_type {
            Some(ret) => {
                let ty = self.resolve_type(ctx, ret)?;
                if ty != TypeContext::VOID {
                    let what = format!("The result of `{}`", decl.name);
                    self.require_prerun_type(ty, &what, ret.range)?;
                }
                ty
            }
            None => TypeContext::VOID,
        };

        let function = PrerunFunction {
            full_name: self.modules.full_name_of(ctx.module, decl.name.as_str()),
            module: ctx.module,
            args,
            return_type,
            body: &decl.body,
            range,
        };
        debug!(function = %function.full_name, "prerun function declared");
        self.symbols.insert(id, Symbol::PrerunFunction(function));
        Ok(())
    }
}
