//! Runtime globals
//!
//! The initializer is evaluated while compiling and becomes the constant
//! initial value of the IR global. Globals that are not variable keep the
//! value around, so prerun code can read them too.

use tracing::debug;

use crate::ast::GlobalDecl;
use crate::ctx::EmitCtx;
use crate::entity::{DependType, DependencyCollector, EmitPhase, EntityId};
use crate::error::{codes, CompileError, CompileResult};
use crate::ir::IrGlobal;
use crate::lower::{Lowerer, Symbol};
use crate::prerun;
use crate::types::TypeContext;

pub(super) fn dependencies(collector: &mut DependencyCollector<'_>, decl: &GlobalDecl) {
    if let Some(ty) = &decl.ty {
        collector.type_expr(ty, DependType::Complete, EmitPhase::Phase2);
    }
    collector.expr(&decl.value, EmitPhase::Phase2);
}

impl<'a> Lowerer<'a> {
    pub(super) fn global(
        &mut self,
        ctx: &EmitCtx,
        id: EntityId,
        decl: &GlobalDecl,
    ) -> CompileResult<()> {
        let declared = match &decl.ty {
            Some(ty) => Some(self.resolve_type(ctx, ty)?),
            None => None,
        };
        let value = self.prerun_expr(ctx, &decl.value, declared)?;
        let ty = match declared {
            Some(declared) if declared != value.ty => {
                return Err(self.mismatch(declared, value.ty, decl.value.range));
            }
            Some(declared) => declared,
            None => value.ty,
        };
        if ty == TypeContext::VOID || self.types.is_reference(ty) {
            let range = decl.ty.as_ref().map_or(decl.value.range, |t| t.range);
            return Err(CompileError::at(
                codes::TYPE_MISMATCH,
                format!("Global `{}` cannot be of type `{}`", decl.name, self.type_name(ty)),
                range,
            ));
        }
        self.require_sized(ty, decl.name.range)?;

        let initializer = prerun::to_ir_constant(&mut self.types, &mut self.ir, &value);
        let global = self.ir.add_global(IrGlobal {
            name: self.modules.full_name_of(ctx.module, decl.name.as_str()),
            ty,
            initializer,
            is_variable: decl.is_variable,
        });
        self.symbols.insert(
            id,
            Symbol::Global {
                id: global,
                ty,
                is_variable: decl.is_variable,
                value,
            },
        );
        debug!(global = %decl.name, %global, "global defined");
        Ok(())
    }
}
