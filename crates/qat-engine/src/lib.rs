//! Qat Compiler Engine
//!
//! This crate holds the semantic core of the Qat compiler:
//! - **Entities**: every top-level declaration is an entity that runs in up
//!   to three phases once its dependencies are satisfied (`entity` module)
//! - **Modules**: files, folders and `lib` blocks with visibility-checked
//!   name lookup (`module` module)
//! - **Types**: the interned type model with expanded, mix and choice types
//!   and skills (`types` module)
//! - **Prerun**: compile-time evaluation of constants and prerun functions
//!   (`prerun` module)
//! - **Lowering**: AST to native IR, one function body at a time (`ir`
//!   module holds the output)
//!
//! # Example
//!
//! ```rust,ignore
//! use qat_engine::{compile, CompileOptions, Program};
//!
//! let program = Program::new(vec![root_module]);
//! let output = compile(&program, &CompileOptions::default())?;
//! println!("{}", output.ir.with_types(&output.types));
//! ```

#![warn(rust_2018_idioms)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::new_without_default)]

// ============================================================================
// Core Modules
// ============================================================================

/// Syntax tree handed over by the parser
pub mod ast;

/// Compilation entry point
pub mod compiler;

/// Compile options loaded from TOML
pub mod config;

/// Where lowering currently happens
pub mod ctx;

/// Diagnostics with source labels
pub mod diagnostic;

/// Entity graph and phase scheduler
pub mod entity;

/// Fatal errors and error codes
pub mod error;

/// Native IR produced by lowering
pub mod ir;

/// Module tree, visibility and name lookup
pub mod module;

/// Compile-time evaluation
pub mod prerun;

/// Source ranges and identifiers
pub mod span;

/// Type model
pub mod types;

/// Values flowing through lowering
pub mod value;

mod decl;
mod lower;

// ============================================================================
// Re-exports
// ============================================================================

pub use ast::{Decl, DeclKind, Program, SourceKind, SourceModule};
pub use compiler::{compile, CompileFailure, CompileOutput};
pub use config::{BuildMode, CompileOptions, ConfigError, DefineValue};
pub use diagnostic::{Diagnostic, Diagnostics, ErrorCode};
pub use entity::{EmitPhase, EntityId, EntityType, SchedulerStats};
pub use error::{codes, CompileError, CompileResult};
pub use ir::{IrFunction, IrModule, PrettyPrint, WriteIr};
pub use module::{ModId, ModuleTree, VisibilityInfo};
pub use span::{FileId, FileRange, Identifier};
pub use types::{Type, TypeContext, TypeId};
