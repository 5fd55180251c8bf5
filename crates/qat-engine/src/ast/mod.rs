//! Abstract syntax tree consumed by the engine
//!
//! The front end (lexer and parser) produces a [`Program`]: one
//! [`SourceModule`] per file or folder, each holding its top-level
//! declarations. The engine never parses text itself.

pub mod decl;
pub mod expr;
pub mod stmt;
pub mod types;

pub use decl::*;
pub use expr::*;
pub use stmt::*;
pub use types::*;

use crate::span::{FileId, FileRange, Identifier};
use std::fmt;
use std::path::PathBuf;

/// A possibly-qualified name such as `^^lib::Thing`.
///
/// `relative` counts the leading `^` markers, each of which moves the lookup
/// one module up before the segments are resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct QualifiedName {
    pub relative: u32,
    pub segments: Vec<Identifier>,
    pub range: FileRange,
}

impl QualifiedName {
    pub fn new(segments: Vec<Identifier>, range: FileRange) -> Self {
        Self {
            relative: 0,
            segments,
            range,
        }
    }

    pub fn single(name: Identifier) -> Self {
        let range = name.range;
        Self::new(vec![name], range)
    }

    pub fn with_relative(mut self, relative: u32) -> Self {
        self.relative = relative;
        self
    }

    pub fn is_single(&self) -> bool {
        self.relative == 0 && self.segments.len() == 1
    }

    pub fn last(&self) -> Option<&Identifier> {
        self.segments.last()
    }

    /// Every segment except the last one
    pub fn prefix(&self) -> &[Identifier] {
        match self.segments.split_last() {
            Some((_, rest)) => rest,
            None => &[],
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for _ in 0..self.relative {
            f.write_str("^")?;
        }
        if self.relative > 0 {
            f.write_str("::")?;
        }
        let names: Vec<&str> = self.segments.iter().map(|s| s.as_str()).collect();
        f.write_str(&names.join("::"))
    }
}

/// Visibility as written on a declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VisibilitySpec {
    /// No `pub`: visible inside the declaring module and its children
    #[default]
    Private,
    /// `pub`
    Public,
    /// `pub:lib`: visible inside the nearest enclosing lib
    Lib,
    /// `pub:file`
    File,
    /// `pub:folder`
    Folder,
    /// `pub:type`: visible to members of the parent type only
    Type,
}

/// Whether a source module is a single file or a folder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    File,
    Folder,
}

/// One file or folder module as produced by the front end
#[derive(Debug, Clone)]
pub struct SourceModule {
    pub name: String,
    pub kind: SourceKind,
    pub path: Option<PathBuf>,
    pub file: FileId,
    /// Index of the enclosing folder module in [`Program::modules`]
    pub parent: Option<usize>,
    pub decls: Vec<Decl>,
}

impl SourceModule {
    pub fn file(name: impl Into<String>, file: FileId, decls: Vec<Decl>) -> Self {
        Self {
            name: name.into(),
            kind: SourceKind::File,
            path: None,
            file,
            parent: None,
            decls,
        }
    }

    pub fn folder(name: impl Into<String>, file: FileId) -> Self {
        Self {
            name: name.into(),
            kind: SourceKind::Folder,
            path: None,
            file,
            parent: None,
            decls: Vec::new(),
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_parent(mut self, parent: usize) -> Self {
        self.parent = Some(parent);
        self
    }
}

/// A whole program: every module discovered by the front end
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub modules: Vec<SourceModule>,
}

impl Program {
    pub fn new(modules: Vec<SourceModule>) -> Self {
        Self { modules }
    }
}
