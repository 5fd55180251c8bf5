//! Declarations as entities
//!
//! Registration walks the program once before scheduling: it builds the
//! module tree, creates one entity per declaration, registers every
//! unguarded name and collects the dependencies of each entity. The
//! scheduler then drives the [`Lowerer`] through [`EntityHost::run_phase`],
//! which dispatches on the kind of declaration.
//!
//! Names a declaration uses but that cannot be found yet make it wait for
//! the `bring` declarations of its module and of the enclosing modules.
//! Once a bring ran, everything still waiting on it collects its
//! dependencies again, so the names it brought in are depended on directly.

mod bring;
mod choice;
mod function;
mod global;
mod member;
mod mix;
mod prerun;
mod skill;
mod structs;
mod type_def;

use tracing::{debug, trace};

use crate::ast::{Decl, DeclKind, LibDecl, SourceKind};
use crate::ctx::EmitCtx;
use crate::diagnostic::Diagnostic;
use crate::entity::{
    DependencyCollector, EmitPhase, EntityGraph, EntityHost, EntityId, EntityType, UnresolvedReport,
};
use crate::error::{codes, CompileError, CompileResult};
use crate::lower::{EntitySite, Lowerer, Symbol};
use crate::module::{AccessInfo, DuplicateName, ModId, ModItem, ModKind};
use crate::span::{FileRange, Identifier};
use crate::types::TypeId;

/// Entity kind of a declaration; `lib` blocks become modules instead
fn entity_kind(kind: &DeclKind) -> Option<EntityType> {
    Some(match kind {
        DeclKind::Function(_) => EntityType::Function,
        DeclKind::Struct(_) => EntityType::Struct,
        DeclKind::Mix(_) => EntityType::Mix,
        DeclKind::Choice(_) => EntityType::Choice,
        DeclKind::Global(_) => EntityType::Global,
        DeclKind::PrerunGlobal(_) => EntityType::PrerunGlobal,
        DeclKind::PrerunFunction(_) => EntityType::PrerunFunction,
        DeclKind::TypeDefinition(_) => EntityType::TypeDefinition,
        DeclKind::Skill(_) => EntityType::Skill,
        DeclKind::DoSkill(_) => EntityType::DoSkill,
        DeclKind::Bring(_) => EntityType::BringEntity,
        DeclKind::Lib(_) => return None,
    })
}

pub(crate) fn duplicate_name(name: &Identifier, duplicate: &DuplicateName) -> CompileError {
    Diagnostic::error(format!("`{}` is already declared in this scope", name))
        .with_code(codes::DUPLICATE_NAME)
        .with_primary_label(name.range, "")
        .with_secondary_label(duplicate.existing, "the existing declaration was found here")
        .into()
}

/// Fail when two names in one list are the same
pub(crate) fn check_unique<'n>(
    names: impl IntoIterator<Item = &'n Identifier>,
    what: &str,
) -> CompileResult<()> {
    let mut seen: Vec<&Identifier> = Vec::new();
    for name in names {
        if let Some(existing) = seen.iter().find(|n| n.value == name.value) {
            return Err(Diagnostic::error(format!("{} `{}` is declared more than once", what, name))
                .with_code(codes::DUPLICATE_NAME)
                .with_primary_label(name.range, "")
                .with_secondary_label(existing.range, "the existing declaration was found here")
                .into());
        }
        seen.push(name);
    }
    Ok(())
}

impl<'a> Lowerer<'a> {
    /// Build the module tree and one entity per declaration
    pub(crate) fn register_program(&mut self) -> CompileResult<()> {
        let program = self.program;
        let mut ids: Vec<Option<ModId>> = vec![None; program.modules.len()];
        for index in 0..program.modules.len() {
            self.source_module(index, &mut ids, 0)?;
        }
        for (source, id) in program.modules.iter().zip(ids) {
            let module = id.ok_or_else(|| {
                CompileError::internal(format!("module `{}` was not created", source.name))
            })?;
            self.register_decls(module, &source.decls)?;
        }

        let all: Vec<EntityId> = self.entities.ids().collect();
        for id in all {
            self.collect_dependencies(id)?;
        }
        debug!(
            modules = self.modules.len(),
            entities = self.entities.len(),
            "declarations registered"
        );
        Ok(())
    }

    /// Module of a source file or folder, creating its parents first
    fn source_module(
        &mut self,
        index: usize,
        ids: &mut [Option<ModId>],
        depth: usize,
    ) -> CompileResult<ModId> {
        let program = self.program;
        let source = program
            .modules
            .get(index)
            .ok_or_else(|| CompileError::internal(format!("no source module at index {}", index)))?;
        if let Some(Some(id)) = ids.get(index) {
            return Ok(*id);
        }
        if depth > program.modules.len() {
            return Err(CompileError::internal("folder modules contain each other"));
        }
        let parent = match source.parent {
            Some(parent) => Some(self.source_module(parent, ids, depth + 1)?),
            None => None,
        };
        let kind = match source.kind {
            SourceKind::File => ModKind::File,
            SourceKind::Folder => ModKind::Folder,
        };
        let name = Identifier::new(source.name.clone(), FileRange::new(source.file, 0, 0));
        let id = self
            .modules
            .add_module(name, kind, parent, source.file, source.path.clone());
        ids[index] = Some(id);
        Ok(id)
    }

    fn register_decls(&mut self, module: ModId, decls: &'a [Decl]) -> CompileResult<()> {
        for decl in decls {
            let Some(kind) = entity_kind(&decl.kind) else {
                if let DeclKind::Lib(lib) = &decl.kind {
                    self.register_lib(module, decl, lib)?;
                }
                continue;
            };
            let id = self.entities.add(decl.name().cloned(), kind, module, decl.range);
            self.sites.push(EntitySite { decl, module });

            if kind == EntityType::BringEntity {
                self.pending_brings.entry(module).or_default().push(id);
            }
            if let Some(name) = decl.name() {
                if decl.guard.is_some() {
                    self.modules.add_guarded(module, name.as_str(), id);
                } else {
                    self.register_name(id)?;
                }
            }
            trace!(entity = %self.entities.get(id).display_name(), %module, "entity created");
        }
        Ok(())
    }

    fn register_lib(
        &mut self,
        parent: ModId,
        decl: &'a Decl,
        lib: &'a LibDecl,
    ) -> CompileResult<()> {
        if let Some(guard) = &decl.guard {
            return Err(CompileError::at(
                codes::INVALID_EXPRESSION,
                format!("lib `{}` cannot be guarded", lib.name),
                guard.range,
            ));
        }
        let existing = {
            let m = self.modules.get(parent);
            m.item(lib.name.as_str())
                .map(|i| i.name.range)
                .or_else(|| {
                    m.submodules
                        .iter()
                        .map(|s| self.modules.get(*s))
                        .find(|s| s.name.value == lib.name.value)
                        .map(|s| s.name.range)
                })
        };
        if let Some(existing) = existing {
            return Err(duplicate_name(
                &lib.name,
                &DuplicateName {
                    name: lib.name.value.clone(),
                    existing,
                },
            ));
        }
        let file = self.modules.get(parent).file;
        let path = self.modules.get(parent).path.clone();
        let module = self
            .modules
            .add_module(lib.name.clone(), ModKind::Lib, Some(parent), file, path);
        let visibility = self.modules.visibility_for(lib.visibility, parent, None);
        self.modules.get_mut(module).visibility = visibility;
        self.register_decls(module, &lib.decls)
    }

    /// Make the name of an entity visible in its module
    fn register_name(&mut self, id: EntityId) -> CompileResult<()> {
        let site = self.site(id)?;
        let Some(name) = site.decl.name() else {
            return Ok(());
        };
        let item = ModItem {
            name: name.clone(),
            entity: id,
            kind: self.entities.get(id).kind,
            visibility: self
                .modules
                .visibility_for(site.decl.visibility(), site.module, None),
        };
        self.modules
            .add_item(site.module, item)
            .map_err(|duplicate| duplicate_name(name, &duplicate))
    }

    pub(crate) fn site(&self, id: EntityId) -> CompileResult<EntitySite<'a>> {
        self.sites
            .get(id.index())
            .copied()
            .ok_or_else(|| CompileError::internal(format!("no declaration for {}", id)))
    }

    /// Brings that may still provide names to `module`; a bring only waits
    /// for brings registered before it
    fn visible_pending_brings(&self, module: ModId, id: EntityId) -> Vec<EntityId> {
        let is_bring = self.entities.get(id).kind == EntityType::BringEntity;
        let mut brings = Vec::new();
        let mut current = Some(module);
        while let Some(m) = current {
            if let Some(pending) = self.pending_brings.get(&m) {
                brings.extend(pending.iter().copied().filter(|b| !is_bring || *b < id));
            }
            current = self.modules.parent(m);
        }
        brings
    }

    pub(crate) fn collect_dependencies(&mut self, id: EntityId) -> CompileResult<()> {
        let site = self.site(id)?;
        let decl: &'a Decl = site.decl;
        let first = self.entities.get(id).kind.first_phase();
        let brings = self.visible_pending_brings(site.module, id);

        let deps = {
            let access = AccessInfo::new(site.module);
            let mut collector = DependencyCollector::new(&self.modules, site.module, access)
                .with_pending_brings(brings);
            if let Some(guard) = &decl.guard {
                collector.expr(guard, first);
            }
            match &decl.kind {
                DeclKind::Function(d) => function::dependencies(&mut collector, d),
                DeclKind::Struct(d) => structs::dependencies(&mut collector, d),
                DeclKind::Mix(d) => mix::dependencies(&mut collector, d),
                DeclKind::Choice(d) => choice::dependencies(&mut collector, d),
                DeclKind::Global(d) => global::dependencies(&mut collector, d),
                DeclKind::PrerunGlobal(d) => prerun::global_dependencies(&mut collector, d),
                DeclKind::PrerunFunction(d) => prerun::function_dependencies(&mut collector, d),
                DeclKind::TypeDefinition(d) => type_def::dependencies(&mut collector, d),
                DeclKind::Skill(d) => skill::dependencies(&mut collector, d),
                DeclKind::DoSkill(d) => skill::done_dependencies(&mut collector, d),
                DeclKind::Bring(d) => bring::dependencies(&mut collector, d),
                DeclKind::Lib(_) => {}
            }
            collector.into_dependencies()
        };

        let state = self.entities.get_mut(id);
        for dep in deps {
            state.add_dependency(dep);
        }
        Ok(())
    }

    /// Type an entity defined in an earlier phase
    pub(crate) fn type_symbol(&self, id: EntityId, range: FileRange) -> CompileResult<TypeId> {
        match self.symbol(id, range)? {
            Symbol::Type(ty) => Ok(*ty),
            _ => Err(CompileError::internal(format!(
                "{} does not define a type",
                self.entities.get(id).display_name()
            ))),
        }
    }
}

impl<'a> EntityHost for Lowerer<'a> {
    type Error = CompileError;

    fn entities(&self) -> &EntityGraph {
        &self.entities
    }

    fn entities_mut(&mut self) -> &mut EntityGraph {
        &mut self.entities
    }

    fn run_phase(&mut self, id: EntityId, phase: EmitPhase) -> CompileResult<()> {
        self.phase_log.push((id, phase));
        let site = self.site(id)?;
        let decl: &'a Decl = site.decl;
        let ctx = EmitCtx::for_entity(site.module, id);

        if phase == self.entities.get(id).kind.first_phase() {
            if let Some(guard) = &decl.guard {
                if !self.prerun_condition(&ctx, guard)? {
                    debug!(
                        entity = %self.entities.get(id).display_name(),
                        "guard is false, declaration skipped"
                    );
                    self.entities.get_mut(id).complete_manually();
                    return Ok(());
                }
                self.register_name(id)?;
            }
        }

        use EmitPhase::*;
        match (&decl.kind, phase) {
            (DeclKind::Function(d), Phase1) => self.function_prototype(&ctx, id, d, decl.range),
            (DeclKind::Function(d), _) => self.function_body(&ctx, id, d, decl.range),
            (DeclKind::Struct(d), Phase1) => self.struct_skeleton(&ctx, id, d),
            (DeclKind::Struct(d), Phase2) => self.struct_layout(&ctx, id, d),
            (DeclKind::Struct(d), Phase3) => self.struct_bodies(&ctx, id, d),
            (DeclKind::Mix(d), Phase1) => self.mix_skeleton(&ctx, id, d),
            (DeclKind::Mix(d), _) => self.mix_variants(&ctx, id, d),
            (DeclKind::Choice(d), _) => self.choice_type(&ctx, id, d),
            (DeclKind::Global(d), _) => self.global(&ctx, id, d),
            (DeclKind::PrerunGlobal(d), _) => self.prerun_global(&ctx, id, d),
            (DeclKind::PrerunFunction(d), _) => self.prerun_function(&ctx, id, d, decl.range),
            (DeclKind::TypeDefinition(d), Phase1) => self.type_definition(&ctx, id, d),
            (DeclKind::TypeDefinition(d), _) => self.check_type_definition(id, d),
            (DeclKind::Skill(d), _) => self.skill(&ctx, id, d),
            (DeclKind::DoSkill(d), Phase2) => self.done_skill_prototypes(&ctx, id, d),
            (DeclKind::DoSkill(d), _) => self.done_skill_bodies(&ctx, id, d),
            (DeclKind::Bring(d), _) => self.bring(&ctx, id, d),
            (DeclKind::Lib(_), _) => {
                Err(CompileError::internal("lib blocks are modules, not entities"))
            }
        }
    }

    fn unresolved(&self, report: UnresolvedReport) -> CompileError {
        let name_of = |id: EntityId| self.entities.get(id).display_name();
        let count = report.stuck.len();
        let mut diagnostic = Diagnostic::error(format!(
            "{} declaration{} could not be resolved in {}",
            count,
            if count == 1 { "" } else { "s" },
            report.phase
        ))
        .with_code(codes::UNRESOLVED_DEPENDENCY);

        if let Some(first) = report.stuck.first() {
            diagnostic = diagnostic
                .with_primary_label(first.range, format!("{} is waiting here", first.name));
            if let Some(dep) = first.missing.first() {
                diagnostic = diagnostic.with_secondary_label(
                    self.entities.get(dep.entity).range,
                    format!("{} is not ready", name_of(dep.entity)),
                );
            }
        }
        for stuck in &report.stuck {
            let missing: Vec<String> = stuck.missing.iter().map(|d| name_of(d.entity)).collect();
            let note = if missing.is_empty() {
                format!("{} cannot run {}", stuck.name, stuck.phase)
            } else {
                format!("{} waits for {}", stuck.name, missing.join(", "))
            };
            diagnostic = diagnostic.with_note(note);
        }
        if let Some(cycle) = &report.cycle {
            let mut names: Vec<String> = cycle.iter().map(|id| name_of(*id)).collect();
            if let Some(first) = names.first().cloned() {
                names.push(first);
            }
            diagnostic = diagnostic.with_note(format!("dependency cycle: {}", names.join(" -> ")));
        }
        diagnostic.into()
    }
}
