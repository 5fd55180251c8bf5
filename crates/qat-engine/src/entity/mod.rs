//! Entity dependency engine
//!
//! Every top-level declaration becomes an [`EntityState`]. Entities declare
//! which other entities they need, at which phase and how far resolved; the
//! [`scheduler`] then runs the phases of every entity in an order that
//! satisfies those dependencies.

pub mod deps;
pub mod scheduler;

pub use deps::DependencyCollector;
pub use scheduler::{run_phases, EntityHost, SchedulerStats, StuckEntity, UnresolvedReport};

use std::fmt;

use crate::module::ModId;
use crate::span::{FileRange, Identifier};

/// Identifier of an entity in the [`EntityGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub(crate) u32);

impl EntityId {
    pub fn as_u32(self) -> u32 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity{}", self.0)
    }
}

/// Ordered stages of entity resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EmitPhase {
    /// Skeletons, prototypes, choices, prerun entities
    Phase1,
    /// Layouts, member prototypes, globals, done skills
    Phase2,
    /// Function and member bodies
    Phase3,
}

impl EmitPhase {
    pub const ALL: [EmitPhase; 3] = [EmitPhase::Phase1, EmitPhase::Phase2, EmitPhase::Phase3];

    pub fn number(self) -> u8 {
        match self {
            EmitPhase::Phase1 => 1,
            EmitPhase::Phase2 => 2,
            EmitPhase::Phase3 => 3,
        }
    }
}

impl fmt::Display for EmitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "phase_{}", self.number())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityType {
    Function,
    Struct,
    Mix,
    Choice,
    Skill,
    DoSkill,
    Global,
    PrerunFunction,
    PrerunGlobal,
    TypeDefinition,
    BringEntity,
}

impl EntityType {
    /// Phases this kind of entity runs, in order
    pub fn phases(self) -> &'static [EmitPhase] {
        use EmitPhase::*;
        match self {
            EntityType::Struct => &[Phase1, Phase2, Phase3],
            EntityType::Function => &[Phase1, Phase3],
            EntityType::Mix | EntityType::TypeDefinition => &[Phase1, Phase2],
            EntityType::DoSkill => &[Phase2, Phase3],
            EntityType::Global => &[Phase2],
            EntityType::Choice
            | EntityType::Skill
            | EntityType::PrerunFunction
            | EntityType::PrerunGlobal
            | EntityType::BringEntity => &[Phase1],
        }
    }

    /// Phase after which the entity's skeleton is usable
    pub fn partial_after(self) -> EmitPhase {
        self.phases()[0]
    }

    /// Phase after which the entity counts as complete
    pub fn complete_after(self) -> EmitPhase {
        match self {
            EntityType::Struct => EmitPhase::Phase2,
            _ => {
                let phases = self.phases();
                phases[phases.len() - 1]
            }
        }
    }

    pub fn first_phase(self) -> EmitPhase {
        self.phases()[0]
    }

    pub fn name(self) -> &'static str {
        match self {
            EntityType::Function => "function",
            EntityType::Struct => "struct type",
            EntityType::Mix => "mix type",
            EntityType::Choice => "choice type",
            EntityType::Skill => "skill",
            EntityType::DoSkill => "skill implementation",
            EntityType::Global => "global",
            EntityType::PrerunFunction => "prerun function",
            EntityType::PrerunGlobal => "prerun global",
            EntityType::TypeDefinition => "type definition",
            EntityType::BringEntity => "bring",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityStatus {
    Pending,
    /// Skeleton usable by partial dependents
    Partial,
    Complete,
}

/// How far a dependency must be resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DependType {
    Partial,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityDependency {
    pub entity: EntityId,
    pub kind: DependType,
    /// Phase of the dependent before which this must hold
    pub phase: EmitPhase,
}

#[derive(Debug, Clone)]
pub struct EntityState {
    pub id: EntityId,
    pub name: Option<Identifier>,
    pub kind: EntityType,
    pub module: ModId,
    pub status: EntityStatus,
    /// Index into `kind.phases()` of the next phase to run
    next_phase: usize,
    pub dependencies: Vec<EntityDependency>,
    pub range: FileRange,
}

impl EntityState {
    pub fn new(
        id: EntityId,
        name: Option<Identifier>,
        kind: EntityType,
        module: ModId,
        range: FileRange,
    ) -> Self {
        Self {
            id,
            name,
            kind,
            module,
            status: EntityStatus::Pending,
            next_phase: 0,
            dependencies: Vec::new(),
            range,
        }
    }

    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => format!("{} `{}`", self.kind, name),
            None => self.kind.name().to_string(),
        }
    }

    /// Next phase to run, `None` once every phase ran
    pub fn next_phase(&self) -> Option<EmitPhase> {
        self.kind.phases().get(self.next_phase).copied()
    }

    pub fn is_finished(&self) -> bool {
        self.next_phase().is_none()
    }

    pub fn is_complete(&self) -> bool {
        self.status == EntityStatus::Complete
    }

    /// Add a dependency, keeping only the strongest requirement per target
    pub fn add_dependency(&mut self, dep: EntityDependency) {
        if dep.entity == self.id {
            return;
        }
        if let Some(existing) = self
            .dependencies
            .iter_mut()
            .find(|d| d.entity == dep.entity && d.phase == dep.phase)
        {
            existing.kind = existing.kind.max(dep.kind);
            return;
        }
        self.dependencies.push(dep);
    }

    /// Record that `phase` ran and update the status
    pub fn finish_phase(&mut self, phase: EmitPhase) {
        if self.next_phase() == Some(phase) {
            self.next_phase += 1;
        }
        if phase >= self.kind.complete_after() {
            self.status = EntityStatus::Complete;
        } else if phase >= self.kind.partial_after() && self.status == EntityStatus::Pending {
            self.status = EntityStatus::Partial;
        }
    }

    /// Mark the entity done without running its remaining phases
    pub fn complete_manually(&mut self) {
        self.status = EntityStatus::Complete;
        self.next_phase = self.kind.phases().len();
    }
}

#[derive(Debug, Clone, Default)]
pub struct EntityGraph {
    entities: Vec<EntityState>,
}

impl EntityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        name: Option<Identifier>,
        kind: EntityType,
        module: ModId,
        range: FileRange,
    ) -> EntityId {
        let id = EntityId(self.entities.len() as u32);
        self.entities.push(EntityState::new(id, name, kind, module, range));
        id
    }

    pub fn get(&self, id: EntityId) -> &EntityState {
        &self.entities[id.index()]
    }

    pub fn get_mut(&mut self, id: EntityId) -> &mut EntityState {
        &mut self.entities[id.index()]
    }

    pub fn ids(&self) -> impl Iterator<Item = EntityId> {
        (0..self.entities.len() as u32).map(EntityId)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityState> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn is_satisfied(&self, dep: &EntityDependency) -> bool {
        match (self.get(dep.entity).status, dep.kind) {
            (EntityStatus::Complete, _) => true,
            (EntityStatus::Partial, DependType::Partial) => true,
            _ => false,
        }
    }

    /// Dependencies that must hold before `id` runs `phase` but do not yet
    pub fn unmet(&self, id: EntityId, phase: EmitPhase) -> Vec<EntityDependency> {
        self.get(id)
            .dependencies
            .iter()
            .filter(|d| d.phase <= phase && !self.is_satisfied(d))
            .copied()
            .collect()
    }

    pub fn is_ready(&self, id: EntityId, phase: EmitPhase) -> bool {
        self.get(id)
            .dependencies
            .iter()
            .filter(|d| d.phase <= phase)
            .all(|d| self.is_satisfied(d))
    }

    pub fn all_finished(&self) -> bool {
        self.entities.iter().all(|e| e.is_finished())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_struct_status_progression() {
        let mut graph = EntityGraph::new();
        let id = graph.add(None, EntityType::Struct, ModId(0), FileRange::default());
        let state = graph.get_mut(id);
        assert_eq!(state.next_phase(), Some(EmitPhase::Phase1));
        state.finish_phase(EmitPhase::Phase1);
        assert_eq!(state.status, EntityStatus::Partial);
        state.finish_phase(EmitPhase::Phase2);
        assert_eq!(state.status, EntityStatus::Complete);
        assert_eq!(state.next_phase(), Some(EmitPhase::Phase3));
        state.finish_phase(EmitPhase::Phase3);
        assert!(state.is_finished());
    }

    #[test]
    fn test_dependency_satisfaction() {
        let mut graph = EntityGraph::new();
        let a = graph.add(None, EntityType::Function, ModId(0), FileRange::default());
        let b = graph.add(None, EntityType::Function, ModId(0), FileRange::default());
        graph.get_mut(a).add_dependency(EntityDependency {
            entity: b,
            kind: DependType::Partial,
            phase: EmitPhase::Phase3,
        });
        assert!(graph.is_ready(a, EmitPhase::Phase1));
        assert!(!graph.is_ready(a, EmitPhase::Phase3));
        graph.get_mut(b).finish_phase(EmitPhase::Phase1);
        assert!(graph.is_ready(a, EmitPhase::Phase3));
    }

    #[test]
    fn test_strongest_dependency_kept() {
        let mut graph = EntityGraph::new();
        let a = graph.add(None, EntityType::Struct, ModId(0), FileRange::default());
        let b = graph.add(None, EntityType::Struct, ModId(0), FileRange::default());
        let state = graph.get_mut(a);
        state.add_dependency(EntityDependency {
            entity: b,
            kind: DependType::Partial,
            phase: EmitPhase::Phase2,
        });
        state.add_dependency(EntityDependency {
            entity: b,
            kind: DependType::Complete,
            phase: EmitPhase::Phase2,
        });
        state.add_dependency(EntityDependency {
            entity: a,
            kind: DependType::Complete,
            phase: EmitPhase::Phase2,
        });
        assert_eq!(state.dependencies.len(), 1);
        assert_eq!(state.dependencies[0].kind, DependType::Complete);
    }

    #[test]
    fn test_complete_manually() {
        let mut graph = EntityGraph::new();
        let id = graph.add(None, EntityType::Function, ModId(0), FileRange::default());
        graph.get_mut(id).complete_manually();
        assert!(graph.get(id).is_complete());
        assert!(graph.all_finished());
    }
}
