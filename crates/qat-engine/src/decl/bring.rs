//! Bring declarations
//!
//! A bring makes modules or entities of other modules visible in its own
//! module. Until it ran, names that cannot be resolved elsewhere wait on
//! it; afterwards those waiting entities collect their dependencies again.

use tracing::{debug, trace};

use crate::ast::{BringDecl, BringItem, QualifiedName};
use crate::ctx::EmitCtx;
use crate::diagnostic::Diagnostic;
use crate::entity::{DependType, DependencyCollector, EmitPhase, EntityId};
use crate::error::{codes, CompileError, CompileResult};
use crate::lower::{Lowerer, Symbol};
use crate::module::{BroughtEntity, BroughtMod, ModId, ResolveError, Resolved, VisibilityInfo};
use crate::span::{FileRange, Identifier};

use super::duplicate_name;

fn member_path(module: &QualifiedName, name: &Identifier) -> QualifiedName {
    let mut segments = module.segments.clone();
    segments.push(name.clone());
    QualifiedName {
        relative: module.relative,
        segments,
        range: name.range,
    }
}

pub(super) fn dependencies(collector: &mut DependencyCollector<'_>, decl: &BringDecl) {
    for item in &decl.items {
        match item {
            BringItem::Path { path, .. } => {
                collector.name(path, DependType::Partial, EmitPhase::Phase1)
            }
            BringItem::Members { module, names } => {
                for brought in names {
                    let path = member_path(module, &brought.name);
                    collector.name(&path, DependType::Partial, EmitPhase::Phase1);
                }
            }
            BringItem::File { .. } => {}
        }
    }
}

/// Names that cannot be brought are reported as unresolved brings
fn unresolved_bring(error: ResolveError) -> CompileError {
    match error {
        ResolveError::NotFound { .. } => Diagnostic::error(error.to_string())
            .with_code(codes::BRING_UNRESOLVED)
            .with_primary_label(error.range(), "this could not be brought")
            .into(),
        other => other.into(),
    }
}

impl<'a> Lowerer<'a> {
    pub(super) fn bring(
        &mut self,
        ctx: &EmitCtx,
        id: EntityId,
        decl: &BringDecl,
    ) -> CompileResult<()> {
        let visibility = self.modules.visibility_for(decl.visibility, ctx.module, None);
        let access = ctx.access();
        for item in &decl.items {
            match item {
                BringItem::Path { path, alias } => {
                    let resolved = self
                        .modules
                        .resolve(ctx.module, path, &access)
                        .map_err(unresolved_bring)?;
                    let name = alias.as_ref().or(path.last()).cloned().ok_or_else(|| {
                        CompileError::at(
                            codes::INVALID_PATH,
                            "An empty path cannot be brought",
                            path.range,
                        )
                    })?;
                    let range = path.range;
                    self.bring_resolved(ctx.module, resolved, name, visibility.clone(), range)?;
                }
                BringItem::Members { module, names } => {
                    let target = self
                        .modules
                        .resolve_module(ctx.module, module, &access)
                        .map_err(unresolved_bring)?;
                    for brought in names {
                        let found = self
                            .modules
                            .find_in(target, &brought.name, &access)
                            .map_err(unresolved_bring)?;
                        let resolved = found.ok_or_else(|| {
                            unresolved_bring(ResolveError::NotFound {
                                name: brought.name.value.clone(),
                                module: self.modules.full_name(target),
                                range: brought.name.range,
                            })
                        })?;
                        let name = brought.alias.clone().unwrap_or_else(|| brought.name.clone());
                        let range = brought.name.range;
                        self.bring_resolved(ctx.module, resolved, name, visibility.clone(), range)?;
                    }
                }
                BringItem::File { path, alias, range } => {
                    let target = self.modules.module_by_path(path).ok_or_else(|| {
                        CompileError::at(
                            codes::BRING_UNRESOLVED,
                            format!("No module was found for the file `{}`", path),
                            *range,
                        )
                    })?;
                    self.modules.add_brought_module(
                        ctx.module,
                        BroughtMod {
                            module: target,
                            alias: alias.clone(),
                            visibility: visibility.clone(),
                            range: *range,
                        },
                    );
                    trace!(file = %path, "file brought");
                }
            }
        }
        self.symbols.insert(id, Symbol::Bring);
        self.settle_bring(id)
    }

    fn bring_resolved(
        &mut self,
        module: ModId,
        resolved: Resolved,
        name: Identifier,
        visibility: VisibilityInfo,
        range: FileRange,
    ) -> CompileResult<()> {
        match resolved {
            Resolved::Module(target) => {
                trace!(module = %self.modules.full_name(target), alias = %name, "module brought");
                self.modules.add_brought_module(
                    module,
                    BroughtMod {
                        module: target,
                        alias: Some(name),
                        visibility,
                        range,
                    },
                );
                Ok(())
            }
            Resolved::Item(item) => {
                trace!(entity = %item.name, alias = %name, "entity brought");
                let brought = BroughtEntity {
                    name: name.clone(),
                    item,
                    visibility,
                };
                self.modules
                    .add_brought_entity(module, brought)
                    .map_err(|duplicate| duplicate_name(&name, &duplicate))
            }
        }
    }

    /// Stop making entities wait on `id` and let those that did look again
    fn settle_bring(&mut self, id: EntityId) -> CompileResult<()> {
        for pending in self.pending_brings.values_mut() {
            pending.retain(|b| *b != id);
        }
        let waiting: Vec<EntityId> = self
            .entities
            .iter()
            .filter(|state| !state.is_finished() && state.id != id)
            .filter(|state| state.dependencies.iter().any(|d| d.entity == id))
            .map(|state| state.id)
            .collect();
        for entity in &waiting {
            self.collect_dependencies(*entity)?;
        }
        debug!(bring = %id, recollected = waiting.len(), "bring settled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_path_appends_name() {
        let range = FileRange::default();
        let segments = vec![Identifier::new("std", range), Identifier::new("io", range)];
        let module = QualifiedName::new(segments, range)
            .with_relative(1);
        let path = member_path(&module, &Identifier::new("print", range));
        assert_eq!(path.relative, 1);
        let names: Vec<&str> = path.segments.iter().map(|s| s.as_str()).collect();
        assert_eq!(names, ["std", "io", "print"]);
    }

    #[test]
    fn test_only_missing_names_become_unresolved_brings() {
        let range = FileRange::default();
        let missing = unresolved_bring(ResolveError::NotFound {
            name: "x".to_string(),
            module: "m".to_string(),
            range,
        });
        assert_eq!(missing.code(), Some(codes::BRING_UNRESOLVED));
        let private = unresolved_bring(ResolveError::NotAccessible {
            name: "x".to_string(),
            module: "m".to_string(),
            range,
            declared: range,
        });
        assert_eq!(private.code(), Some(codes::NOT_ACCESSIBLE));
    }
}
