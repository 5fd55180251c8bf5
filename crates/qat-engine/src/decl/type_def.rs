//! Type definitions
//!
//! `type Name = Subtype` makes `Name` another name for `Subtype`. The alias
//! is usable as soon as the subtype exists; it only counts as complete once
//! the subtype does, which is what its second phase waits for.

use tracing::trace;

use crate::ast::TypeDefinitionDecl;
use crate::ctx::EmitCtx;
use crate::entity::{DependType, DependencyCollector, EmitPhase, EntityId};
use crate::error::CompileResult;
use crate::lower::{Lowerer, Symbol};

pub(super) fn dependencies(collector: &mut DependencyCollector<'_>, decl: &TypeDefinitionDecl) {
    collector.type_expr(&decl.subtype, DependType::Partial, EmitPhase::Phase1);
    collector.type_expr(&decl.subtype, DependType::Complete, EmitPhase::Phase2);
}

impl<'a> Lowerer<'a> {
    pub(super) fn type_definition(
        &mut self,
        ctx: &EmitCtx,
        id: EntityId,
        decl: &TypeDefinitionDecl,
    ) -> CompileResult<()> {
        let ty = self.resolve_type(ctx, &decl.subtype)?;
        self.symbols.insert(id, Symbol::Type(ty));
        trace!(alias = %decl.name, ty = %self.type_name(ty), "type definition");
        Ok(())
    }

    pub(super) fn check_type_definition(
        &mut self,
        id: EntityId,
        decl: &TypeDefinitionDecl,
    ) -> CompileResult<()> {
        let ty = self.type_symbol(id, decl.name.range)?;
        trace!(
            alias = %decl.name,
            sized = self.types.is_type_sized(ty),
            "type definition complete"
        );
        Ok(())
    }
}
