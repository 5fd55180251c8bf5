//! Phase fixpoint scheduler
//!
//! Phases run in increasing order. Within a phase every entity whose next
//! phase is the current one is attempted in registration order, as soon as
//! all of its dependencies tagged with this or an earlier phase are
//! satisfied. Passes repeat until one advances nothing. Anything still
//! waiting for the phase at that point can never run, which is reported
//! together with a dependency cycle when one exists.

use rustc_hash::FxHashSet;
use tracing::{debug, debug_span};

use super::{EmitPhase, EntityDependency, EntityGraph, EntityId, EntityType};
use crate::span::FileRange;

/// The side of the compiler that does the actual work of each phase
pub trait EntityHost {
    type Error;

    fn entities(&self) -> &EntityGraph;

    fn entities_mut(&mut self) -> &mut EntityGraph;

    /// Run one phase of one entity. Status bookkeeping is left to the
    /// scheduler, but the host may complete the entity manually.
    fn run_phase(&mut self, id: EntityId, phase: EmitPhase) -> Result<(), Self::Error>;

    /// Turn a failed fixpoint into the host's error
    fn unresolved(&self, report: UnresolvedReport) -> Self::Error;
}

/// An entity that could not run a phase
#[derive(Debug, Clone)]
pub struct StuckEntity {
    pub id: EntityId,
    pub name: String,
    pub kind: EntityType,
    pub phase: EmitPhase,
    pub missing: Vec<EntityDependency>,
    pub range: FileRange,
}

#[derive(Debug, Clone)]
pub struct UnresolvedReport {
    pub phase: EmitPhase,
    pub stuck: Vec<StuckEntity>,
    /// Entities waiting on each other in a loop, if such a loop exists
    pub cycle: Option<Vec<EntityId>>,
}

impl UnresolvedReport {
    pub fn contains(&self, id: EntityId) -> bool {
        self.stuck.iter().any(|s| s.id == id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Fixpoint passes over all entities, summed over phases
    pub passes: usize,
    /// `run_phase` calls made
    pub phase_runs: usize,
}

/// Drive every entity of the host through all of its phases
pub fn run_phases<H: EntityHost>(host: &mut H) -> Result<SchedulerStats, H::Error> {
    let mut stats = SchedulerStats::default();

    for phase in EmitPhase::ALL {
        let _span = debug_span!("phase", ?phase).entered();
        loop {
            stats.passes += 1;
            let mut advanced = 0usize;
            let ids: Vec<EntityId> = host.entities().ids().collect();

            for id in ids {
                let state = host.entities().get(id);
                if state.next_phase() != Some(phase) || !host.entities().is_ready(id, phase) {
                    continue;
                }
                debug!(entity = %state.display_name(), kind = %state.kind, %phase, "running phase");
                host.run_phase(id, phase)?;
                host.entities_mut().get_mut(id).finish_phase(phase);
                stats.phase_runs += 1;
                advanced += 1;
            }

            debug!(%phase, advanced, "fixpoint pass");
            if advanced == 0 {
                break;
            }
        }

        let report = stuck_report(host.entities(), phase);
        if !report.stuck.is_empty() {
            return Err(host.unresolved(report));
        }
    }

    Ok(stats)
}

fn stuck_report(graph: &EntityGraph, phase: EmitPhase) -> UnresolvedReport {
    let stuck: Vec<StuckEntity> = graph
        .iter()
        .filter(|e| e.next_phase().is_some_and(|p| p <= phase))
        .map(|e| {
            let waiting = e.next_phase().unwrap_or(phase);
            StuckEntity {
                id: e.id,
                name: e.display_name(),
                kind: e.kind,
                phase: waiting,
                missing: graph.unmet(e.id, waiting),
                range: e.range,
            }
        })
        .collect();

    let cycle = find_cycle(&stuck);
    UnresolvedReport {
        phase,
        stuck,
        cycle,
    }
}

/// Depth-first search for a loop in the "waits on" relation of stuck entities
fn find_cycle(stuck: &[StuckEntity]) -> Option<Vec<EntityId>> {
    let waits_on = |id: EntityId| -> Vec<EntityId> {
        stuck
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.missing.iter().map(|d| d.entity).collect())
            .unwrap_or_default()
    };

    let mut finished = FxHashSet::default();
    for start in stuck {
        let mut path: Vec<EntityId> = Vec::new();
        let mut stack: Vec<(EntityId, usize)> = vec![(start.id, 0)];
        while let Some((node, next_edge)) = stack.pop() {
            if next_edge == 0 {
                if let Some(pos) = path.iter().position(|p| *p == node) {
                    return Some(path[pos..].to_vec());
                }
                if finished.contains(&node) {
                    continue;
                }
                path.push(node);
            }
            let edges = waits_on(node);
            if next_edge < edges.len() {
                stack.push((node, next_edge + 1));
                stack.push((edges[next_edge], 0));
            } else {
                finished.insert(node);
                path.pop();
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{DependType, EntityStatus};
    use crate::module::ModId;

    /// Host recording the order phases ran in
    struct RecordingHost {
        graph: EntityGraph,
        log: Vec<(EntityId, EmitPhase)>,
        skip: FxHashSet<EntityId>,
    }

    impl RecordingHost {
        fn new() -> Self {
            Self {
                graph: EntityGraph::new(),
                log: Vec::new(),
                skip: FxHashSet::default(),
            }
        }

        fn add(&mut self, kind: EntityType) -> EntityId {
            self.graph.add(None, kind, ModId(0), FileRange::default())
        }

        fn depend(&mut self, from: EntityId, to: EntityId, kind: DependType, phase: EmitPhase) {
            self.graph.get_mut(from).add_dependency(EntityDependency {
                entity: to,
                kind,
                phase,
            });
        }

        fn position(&self, id: EntityId, phase: EmitPhase) -> Option<usize> {
            self.log.iter().position(|entry| *entry == (id, phase))
        }
    }

    impl EntityHost for RecordingHost {
        type Error = UnresolvedReport;

        fn entities(&self) -> &EntityGraph {
            &self.graph
        }

        fn entities_mut(&mut self) -> &mut EntityGraph {
            &mut self.graph
        }

        fn run_phase(&mut self, id: EntityId, phase: EmitPhase) -> Result<(), Self::Error> {
            if self.skip.contains(&id) {
                self.graph.get_mut(id).complete_manually();
            }
            self.log.push((id, phase));
            Ok(())
        }

        fn unresolved(&self, report: UnresolvedReport) -> Self::Error {
            report
        }
    }

    #[test]
    fn test_dependencies_run_first() {
        let mut host = RecordingHost::new();
        let user = host.add(EntityType::Struct);
        let field = host.add(EntityType::Struct);
        host.depend(user, field, DependType::Complete, EmitPhase::Phase2);

        let stats = run_phases(&mut host).unwrap();
        assert!(host.graph.all_finished());
        assert!(
            host.position(field, EmitPhase::Phase2).unwrap()
                < host.position(user, EmitPhase::Phase2).unwrap()
        );
        assert_eq!(stats.phase_runs, 6);
    }

    #[test]
    fn test_partial_dependency_allows_mutual_pointers() {
        let mut host = RecordingHost::new();
        let a = host.add(EntityType::Struct);
        let b = host.add(EntityType::Struct);
        host.depend(a, b, DependType::Partial, EmitPhase::Phase2);
        host.depend(b, a, DependType::Partial, EmitPhase::Phase2);
        assert!(run_phases(&mut host).is_ok());
        assert_eq!(host.graph.get(a).status, EntityStatus::Complete);
    }

    #[test]
    fn test_cycle_is_reported() {
        let mut host = RecordingHost::new();
        let a = host.add(EntityType::Struct);
        let b = host.add(EntityType::Struct);
        let free = host.add(EntityType::Function);
        host.depend(a, b, DependType::Complete, EmitPhase::Phase2);
        host.depend(b, a, DependType::Complete, EmitPhase::Phase2);

        let report = run_phases(&mut host).unwrap_err();
        assert_eq!(report.phase, EmitPhase::Phase2);
        assert!(report.contains(a) && report.contains(b));
        assert!(!report.contains(free));
        let cycle = report.cycle.unwrap();
        assert!(cycle.contains(&a) && cycle.contains(&b));
    }

    #[test]
    fn test_missing_dependency_without_cycle() {
        let mut host = RecordingHost::new();
        let a = host.add(EntityType::Global);
        let never = host.add(EntityType::Function);
        host.depend(never, a, DependType::Complete, EmitPhase::Phase1);
        let report = run_phases(&mut host).unwrap_err();
        assert_eq!(report.phase, EmitPhase::Phase1);
        assert!(report.contains(never));
        assert!(report.cycle.is_none());
    }

    #[test]
    fn test_manual_completion_satisfies_dependents() {
        let mut host = RecordingHost::new();
        let guarded = host.add(EntityType::Function);
        let user = host.add(EntityType::Function);
        host.depend(user, guarded, DependType::Complete, EmitPhase::Phase1);
        host.skip.insert(guarded);
        assert!(run_phases(&mut host).is_ok());
        assert_eq!(host.position(guarded, EmitPhase::Phase3), None);
        assert!(host.position(user, EmitPhase::Phase3).is_some());
    }
}
