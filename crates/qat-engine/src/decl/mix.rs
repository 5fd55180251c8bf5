//! Mix types
//!
//! A mix holds one of its variants at a time, each with an optional
//! payload. The skeleton exists after phase 1; variants are resolved in
//! phase 2 so payloads can refer to types declared later.

use tracing::debug;

use crate::ast::MixDecl;
use crate::ctx::EmitCtx;
use crate::diagnostic::Diagnostic;
use crate::entity::{DependType, DependencyCollector, EmitPhase, EntityId};
use crate::error::{codes, CompileError, CompileResult};
use crate::lower::{Lowerer, Symbol};
use crate::types::{MixDef, MixVariant, Type, TypeContext};

pub(super) fn dependencies(collector: &mut DependencyCollector<'_>, decl: &MixDecl) {
    for variant in &decl.variants {
        if let Some(payload) = &variant.payload {
            collector.type_expr(payload, DependType::Complete, EmitPhase::Phase2);
        }
    }
}

impl<'a> Lowerer<'a> {
    pub(super) fn mix_skeleton(
        &mut self,
        ctx: &EmitCtx,
        id: EntityId,
        decl: &MixDecl,
    ) -> CompileResult<()> {
        let ty = self.types.create_mix(MixDef {
            name: decl.name.clone(),
            full_name: self.modules.full_name_of(ctx.module, decl.name.as_str()),
            module: ctx.module,
            visibility: self.modules.visibility_for(decl.visibility, ctx.module, None),
            variants: None,
            default_variant: None,
            is_packed: decl.is_packed,
        });
        self.symbols.insert(id, Symbol::Type(ty));
        Ok(())
    }

    pub(super) fn mix_variants(
        &mut self,
        ctx: &EmitCtx,
        id: EntityId,
        decl: &MixDecl,
    ) -> CompileResult<()> {
        let ty = self.type_symbol(id, decl.name.range)?;
        let mix = match self.types.get(ty) {
            Type::Mix(mix) => *mix,
            _ => return Err(CompileError::internal(format!("`{}` is not a mix type", decl.name))),
        };

        let mut variants: Vec<MixVariant> = Vec::with_capacity(decl.variants.len());
        for variant in &decl.variants {
            if let Some(existing) = variants.iter().find(|v| v.name.value == variant.name.value) {
                return Err(Diagnostic::error(format!(
                    "Mix type `{}` has two variants named `{}`",
                    decl.name, variant.name
                ))
                .with_code(codes::DUPLICATE_VARIANT)
                .with_primary_label(variant.name.range, "")
                .with_secondary_label(existing.name.range, "the first variant was found here")
                .into());
            }
            let payload = match &variant.payload {
                Some(payload) => {
                    let payload_ty = self.resolve_type(ctx, payload)?;
                    if payload_ty == TypeContext::VOID || payload_ty == ty {
                        return Err(CompileError::at(
                            codes::TYPE_MISMATCH,
                            format!(
                                "Variant `{}` cannot carry a value of type `{}`",
                                variant.name,
                                self.type_name(payload_ty)
                            ),
                            payload.range,
                        ));
                    }
                    self.require_sized(payload_ty, payload.range)?;
                    Some(payload_ty)
                }
                None => None,
            };
            variants.push(MixVariant {
                name: variant.name.clone(),
                payload,
            });
        }

        let default_variant = match &decl.default_variant {
            Some(name) => Some(
                variants
                    .iter()
                    .position(|v| v.name.value == name.value)
                    .ok_or_else(|| {
                        CompileError::at(
                            codes::INVALID_VARIANT,
                            format!("Mix type `{}` has no variant named `{}`", decl.name, name),
                            name.range,
                        )
                    })?,
            ),
            None => None,
        };
        if let Some(index) = default_variant {
            if variants[index].payload.is_some() {
                return Err(CompileError::at(
                    codes::INVALID_VARIANT,
                    format!(
                        "The default variant of `{}` carries a value, so it cannot be created without one",
                        decl.name
                    ),
                    variants[index].name.range,
                ));
            }
        }

        let count = variants.len();
        let def = self.types.mix_def_mut(mix);
        def.variants = Some(variants);
        def.default_variant = default_variant;
        debug!(ty = %decl.name, variants = count, "mix variants resolved");
        Ok(())
    }
}
