//! Compilation entry point
//!
//! [`compile`] registers every declaration of a [`Program`], drives the
//! entities through their phases and hands back the IR module together with
//! the tables that describe it.

use thiserror::Error;
use tracing::{debug, info, info_span};

use crate::ast::Program;
use crate::config::CompileOptions;
use crate::diagnostic::Diagnostic;
use crate::entity::{self, EmitPhase, EntityGraph, EntityId, SchedulerStats};
use crate::error::CompileError;
use crate::ir::IrModule;
use crate::lower::Lowerer;
use crate::module::ModuleTree;
use crate::types::TypeContext;

/// Everything a successful compilation produced
#[derive(Debug)]
pub struct CompileOutput {
    pub ir: IrModule,
    pub types: TypeContext,
    pub modules: ModuleTree,
    pub entities: EntityGraph,
    /// Warnings, in the order they were raised
    pub diagnostics: Vec<Diagnostic>,
    pub stats: SchedulerStats,
    /// Every phase run, in order
    pub phase_log: Vec<(EntityId, EmitPhase)>,
}

impl CompileOutput {
    /// Name of an entity as it appears in diagnostics
    pub fn entity_name(&self, id: EntityId) -> String {
        self.entities.get(id).display_name()
    }
}

/// A failed compilation
#[derive(Debug, Error)]
#[error("{error}")]
pub struct CompileFailure {
    #[source]
    pub error: CompileError,
    /// Warnings raised before the error
    pub warnings: Vec<Diagnostic>,
}

impl CompileFailure {
    /// The fatal diagnostic, unless the failure was internal
    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        self.error.diagnostic()
    }
}

/// Compile a whole program into one IR module
pub fn compile(
    program: &Program,
    options: &CompileOptions,
) -> Result<CompileOutput, CompileFailure> {
    let span = info_span!("compile", module = %options.name);
    let _guard = span.enter();

    let mut lowerer = Lowerer::new(program, options);
    let result = lowerer
        .register_program()
        .and_then(|()| entity::run_phases(&mut lowerer));

    let stats = match result {
        Ok(stats) => stats,
        Err(error) => {
            debug!(%error, "compilation failed");
            return Err(CompileFailure {
                error,
                warnings: lowerer.diagnostics.into_vec(),
            });
        }
    };
    info!(
        entities = lowerer.entities.len(),
        functions = lowerer.ir.functions.len(),
        passes = stats.passes,
        phase_runs = stats.phase_runs,
        warnings = lowerer.diagnostics.len(),
        "compilation finished"
    );

    Ok(CompileOutput {
        ir: lowerer.ir,
        types: lowerer.types,
        modules: lowerer.modules,
        entities: lowerer.entities,
        diagnostics: lowerer.diagnostics.into_vec(),
        stats,
        phase_log: lowerer.phase_log,
    })
}
