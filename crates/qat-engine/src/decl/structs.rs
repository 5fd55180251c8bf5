//! Expanded types
//!
//! Phase 1 creates the nominal type, so marks and references to it work
//! before its layout is known. Phase 2 lays out the fields and declares
//! every member prototype; phase 3 lowers the member bodies.

use tracing::debug;

use crate::ast::StructDecl;
use crate::ctx::{EmitCtx, MemberParent};
use crate::diagnostic::Diagnostic;
use crate::entity::{DependType, DependencyCollector, EmitPhase, EntityId};
use crate::error::{codes, CompileError, CompileResult};
use crate::lower::{Lowerer, Symbol};
use crate::types::{FieldDef, StructDef, StructId, TypeContext, TypeId};

use super::member;

pub(super) fn dependencies(collector: &mut DependencyCollector<'_>, decl: &StructDecl) {
    for field in &decl.fields {
        collector.type_expr(&field.ty, DependType::Complete, EmitPhase::Phase2);
    }
    member::dependencies(collector, &decl.members, EmitPhase::Phase2);
}

impl<'a> Lowerer<'a> {
    fn struct_id(&self, id: EntityId, decl: &StructDecl) -> CompileResult<(TypeId, StructId)> {
        let ty = self.type_symbol(id, decl.name.range)?;
        let sid = self
            .types
            .get(ty)
            .as_struct()
            .ok_or_else(|| {
                CompileError::internal(format!("`{}` is not an expanded type", decl.name))
            })?;
        Ok((ty, sid))
    }

    pub(super) fn struct_skeleton(
        &mut self,
        ctx: &EmitCtx,
        id: EntityId,
        decl: &StructDecl,
    ) -> CompileResult<()> {
        let full_name = self.modules.full_name_of(ctx.module, decl.name.as_str());
        let visibility = self.modules.visibility_for(decl.visibility, ctx.module, None);
        let ty = self
            .types
            .create_struct(StructDef::new(decl.name.clone(), full_name, ctx.module, visibility));
        self.symbols.insert(id, Symbol::Type(ty));
        debug!(ty = %decl.name, "expanded type created");
        Ok(())
    }

    pub(super) fn struct_layout(
        &mut self,
        ctx: &EmitCtx,
        id: EntityId,
        decl: &StructDecl,
    ) -> CompileResult<()> {
        let (ty, sid) = self.struct_id(id, decl)?;

        let mut fields: Vec<FieldDef> = Vec::with_capacity(decl.fields.len());
        for field in &decl.fields {
            if let Some(existing) = fields.iter().find(|f| f.name.value == field.name.value) {
                return Err(Diagnostic::error(format!(
                    "Type `{}` already has a field named `{}`",
                    decl.name, field.name
                ))
                .with_code(codes::DUPLICATE_FIELD)
                .with_primary_label(field.name.range, "")
                .with_secondary_label(existing.name.range, "the existing field was found here")
                .into());
            }
            let field_ty = self.resolve_type(ctx, &field.ty)?;
            if field_ty == TypeContext::VOID || self.types.is_reference(field_ty) {
                return Err(CompileError::at(
                    codes::TYPE_MISMATCH,
                    format!(
                        "Field `{}` cannot be of type `{}`",
                        field.name,
                        self.type_name(field_ty)
                    ),
                    field.ty.range,
                ));
            }
            if field_ty == ty {
                return Err(CompileError::at(
                    codes::NOT_SIZED,
                    format!(
                        "Field `{}` has the type `{}` it belongs to, so the type would have infinite size",
                        field.name, decl.name
                    ),
                    field.ty.range,
                ));
            }
            self.require_sized(field_ty, field.ty.range)?;
            fields.push(FieldDef {
                name: field.name.clone(),
                ty: field_ty,
                is_variable: field.is_variable,
                visibility: self.modules.visibility_for(field.visibility, ctx.module, Some(ty)),
            });
        }
        self.types.struct_def_mut(sid).fields = Some(fields);

        let prefix = self.types.struct_def(sid).full_name.clone();
        let member_ctx = ctx.with_member_parent(MemberParent { ty, done_skill: None });
        for (position, member) in decl.members.iter().enumerate() {
            let prototype = self.member_prototype(&member_ctx, ty, &prefix, position, member)?;
            self.types.struct_def_mut(sid).members.push(prototype);
        }
        debug!(
            ty = %decl.name,
            fields = decl.fields.len(),
            members = decl.members.len(),
            "expanded type laid out"
        );
        Ok(())
    }

    pub(super) fn struct_bodies(
        &mut self,
        ctx: &EmitCtx,
        id: EntityId,
        decl: &StructDecl,
    ) -> CompileResult<()> {
        let (_, sid) = self.struct_id(id, decl)?;
        let members = self.types.struct_def(sid).members.clone();
        for (member, member_decl) in members.iter().zip(&decl.members) {
            self.member_body(ctx, member, member_decl, None)?;
        }
        Ok(())
    }
}
