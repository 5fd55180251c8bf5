//! Name lookup through modules, libs and brought modules
//!
//! Inside one module a name is searched in this order:
//! 1. the module's own declarations and child modules
//! 2. modules brought in under an explicit name
//! 3. entities brought in by name, then the declarations of anonymously
//!    brought modules
//! 4. recursively, the modules those anonymous modules bring anonymously
//!
//! A name found but not accessible is an error, never skipped.

use rustc_hash::FxHashSet;
use thiserror::Error;

use super::{AccessInfo, ModId, ModItem, ModuleTree};
use crate::ast::QualifiedName;
use crate::diagnostic::{Diagnostic, ErrorCode};
use crate::entity::EntityId;
use crate::error::{codes, CompileError};
use crate::span::{FileRange, Identifier};

/// Target of a successful lookup
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Module(ModId),
    Item(ModItem),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResolveError {
    #[error("No recognisable entity named `{name}` found in module `{module}` or its submodules and brought modules")]
    NotFound {
        name: String,
        module: String,
        range: FileRange,
    },

    #[error("`{name}` found in module `{module}` is not accessible here")]
    NotAccessible {
        name: String,
        module: String,
        range: FileRange,
        declared: FileRange,
    },

    #[error("Module `{module}` has no parent module to move up to")]
    NoParent { module: String, range: FileRange },

    #[error("`{name}` is not a module, so `{member}` cannot be looked up inside it")]
    NotAModule {
        name: String,
        member: String,
        range: FileRange,
    },
}

impl ResolveError {
    pub fn range(&self) -> FileRange {
        match self {
            ResolveError::NotFound { range, .. }
            | ResolveError::NotAccessible { range, .. }
            | ResolveError::NoParent { range, .. }
            | ResolveError::NotAModule { range, .. } => *range,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ResolveError::NotFound { .. } => codes::NOT_FOUND,
            ResolveError::NotAccessible { .. } => codes::NOT_ACCESSIBLE,
            ResolveError::NoParent { .. } | ResolveError::NotAModule { .. } => codes::INVALID_PATH,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let diagnostic = Diagnostic::error(self.to_string())
            .with_code(self.code())
            .with_primary_label(self.range(), "");
        match self {
            ResolveError::NotAccessible { declared, .. } => {
                diagnostic.with_secondary_label(*declared, "declared here")
            }
            _ => diagnostic,
        }
    }
}

impl From<ResolveError> for CompileError {
    fn from(error: ResolveError) -> Self {
        CompileError::fatal(error.to_diagnostic())
    }
}

impl ModuleTree {
    fn check_item(
        &self,
        item: &ModItem,
        module: ModId,
        access: &AccessInfo,
        range: FileRange,
    ) -> Result<ModItem, ResolveError> {
        if self.is_accessible(&item.visibility, access) {
            Ok(item.clone())
        } else {
            Err(ResolveError::NotAccessible {
                name: item.name.value.clone(),
                module: self.full_name(module),
                range,
                declared: item.name.range,
            })
        }
    }

    fn check_module(
        &self,
        target: ModId,
        access: &AccessInfo,
        range: FileRange,
    ) -> Result<Resolved, ResolveError> {
        let m = self.get(target);
        if self.is_accessible(&m.visibility, access) {
            Ok(Resolved::Module(target))
        } else {
            Err(ResolveError::NotAccessible {
                name: m.name.value.clone(),
                module: m
                    .parent
                    .map(|p| self.full_name(p))
                    .unwrap_or_default(),
                range,
                declared: m.name.range,
            })
        }
    }

    /// Look `name` up inside `module` without climbing to enclosing modules
    pub fn find_in(
        &self,
        module: ModId,
        name: &Identifier,
        access: &AccessInfo,
    ) -> Result<Option<Resolved>, ResolveError> {
        let mut visited = FxHashSet::default();
        self.find_in_inner(module, name, access, &mut visited, true)
    }

    fn find_in_inner(
        &self,
        module: ModId,
        name: &Identifier,
        access: &AccessInfo,
        visited: &mut FxHashSet<ModId>,
        is_origin: bool,
    ) -> Result<Option<Resolved>, ResolveError> {
        if !visited.insert(module) {
            return Ok(None);
        }
        let m = self.get(module);
        let key = name.as_str();

        if let Some(item) = m.item(key) {
            return self
                .check_item(item, module, access, name.range)
                .map(|i| Some(Resolved::Item(i)));
        }
        if let Some(sub) = m.submodules.iter().find(|s| self.get(**s).name.value == key) {
            return self.check_module(*sub, access, name.range).map(Some);
        }

        let named = m
            .brought
            .iter()
            .find(|b| b.alias.as_ref().is_some_and(|a| a.value == key));
        if let Some(brought) = named {
            if is_origin || self.is_accessible(&brought.visibility, access) {
                return self.check_module(brought.module, access, name.range).map(Some);
            }
        }

        if let Some(brought) = m.brought_entity(key) {
            if is_origin || self.is_accessible(&brought.visibility, access) {
                return self
                    .check_item(&brought.item, module, access, name.range)
                    .map(|i| Some(Resolved::Item(i)));
            }
        }

        let anonymous: Vec<_> = m
            .brought
            .iter()
            .filter(|b| b.alias.is_none())
            .filter(|b| is_origin || self.is_accessible(&b.visibility, access))
            .map(|b| b.module)
            .collect();

        for target in &anonymous {
            let t = self.get(*target);
            if let Some(item) = t.item(key) {
                return self
                    .check_item(item, *target, access, name.range)
                    .map(|i| Some(Resolved::Item(i)));
            }
            if let Some(brought) = t.brought_entity(key) {
                if self.is_accessible(&brought.visibility, access) {
                    return self
                        .check_item(&brought.item, *target, access, name.range)
                        .map(|i| Some(Resolved::Item(i)));
                }
            }
        }

        for target in anonymous {
            if let Some(found) = self.find_in_inner(target, name, access, visited, false)? {
                return Ok(Some(found));
            }
        }

        Ok(None)
    }

    /// Look an unqualified name up in `module` and then in each enclosing module
    pub fn find_unqualified(
        &self,
        module: ModId,
        name: &Identifier,
        access: &AccessInfo,
    ) -> Result<Option<Resolved>, ResolveError> {
        let mut current = Some(module);
        while let Some(m) = current {
            if let Some(found) = self.find_in(m, name, access)? {
                return Ok(Some(found));
            }
            current = self.get(m).parent;
        }
        Ok(None)
    }

    /// Resolve a possibly qualified, possibly `^`-relative name from `from`
    pub fn resolve(
        &self,
        from: ModId,
        name: &QualifiedName,
        access: &AccessInfo,
    ) -> Result<Resolved, ResolveError> {
        let mut start = from;
        for _ in 0..name.relative {
            start = self.parent(start).ok_or_else(|| ResolveError::NoParent {
                module: self.full_name(start),
                range: name.range,
            })?;
        }

        let Some((first, rest)) = name.segments.split_first() else {
            return Ok(Resolved::Module(start));
        };

        let found = if name.relative == 0 {
            self.find_unqualified(start, first, access)?
        } else {
            self.find_in(start, first, access)?
        };
        let mut current = found.ok_or_else(|| ResolveError::NotFound {
            name: first.value.clone(),
            module: self.full_name(start),
            range: first.range,
        })?;

        let mut previous = first;
        for segment in rest {
            let module = match current {
                Resolved::Module(m) => m,
                Resolved::Item(_) => {
                    return Err(ResolveError::NotAModule {
                        name: previous.value.clone(),
                        member: segment.value.clone(),
                        range: segment.range,
                    })
                }
            };
            current = self
                .find_in(module, segment, access)?
                .ok_or_else(|| ResolveError::NotFound {
                    name: segment.value.clone(),
                    module: self.full_name(module),
                    range: segment.range,
                })?;
            previous = segment;
        }
        Ok(current)
    }

    /// Resolve a name that must denote a module
    pub fn resolve_module(
        &self,
        from: ModId,
        name: &QualifiedName,
        access: &AccessInfo,
    ) -> Result<ModId, ResolveError> {
        match self.resolve(from, name, access)? {
            Resolved::Module(m) => Ok(m),
            Resolved::Item(item) => Err(ResolveError::NotAModule {
                name: item.name.value.clone(),
                member: String::new(),
                range: name.range,
            }),
        }
    }

    /// Guarded declarations that could provide `name` once their guard is known
    pub fn guarded_candidates(
        &self,
        from: ModId,
        name: &QualifiedName,
        access: &AccessInfo,
    ) -> Vec<EntityId> {
        let Some(last) = name.last() else {
            return Vec::new();
        };
        if name.is_single() {
            let mut found = Vec::new();
            let mut current = Some(from);
            while let Some(m) = current {
                found.extend_from_slice(self.get(m).guarded(last.as_str()));
                current = self.get(m).parent;
            }
            return found;
        }
        let prefix = QualifiedName {
            relative: name.relative,
            segments: name.prefix().to_vec(),
            range: name.range,
        };
        match self.resolve(from, &prefix, access) {
            Ok(Resolved::Module(m)) => self.get(m).guarded(last.as_str()).to_vec(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::VisibilitySpec;
    use crate::entity::EntityType;
    use crate::module::{BroughtEntity, BroughtMod, ModKind, VisibilityInfo};
    use crate::span::FileId;

    fn ident(name: &str) -> Identifier {
        Identifier::new(name, FileRange::default())
    }

    fn path(parts: &[&str]) -> QualifiedName {
        QualifiedName::new(parts.iter().map(|p| ident(p)).collect(), FileRange::default())
    }

    fn item(name: &str, entity: u32, visibility: VisibilityInfo) -> ModItem {
        ModItem {
            name: ident(name),
            entity: EntityId(entity),
            kind: EntityType::Function,
            visibility,
        }
    }

    #[test]
    fn test_qualified_lookup_through_lib() {
        let mut tree = ModuleTree::new();
        let file = tree.add_module(ident("app"), ModKind::File, None, FileId(0), None);
        let lib = tree.add_module(ident("net"), ModKind::Lib, Some(file), FileId(0), None);
        tree.add_item(lib, item("connect", 0, VisibilityInfo::public())).unwrap();

        let access = AccessInfo::new(file);
        let found = tree.resolve(file, &path(&["net", "connect"]), &access).unwrap();
        assert!(matches!(found, Resolved::Item(i) if i.entity == EntityId(0)));
    }

    #[test]
    fn test_relative_lookup() {
        let mut tree = ModuleTree::new();
        let file = tree.add_module(ident("app"), ModKind::File, None, FileId(0), None);
        let lib = tree.add_module(ident("inner"), ModKind::Lib, Some(file), FileId(0), None);
        tree.add_item(file, item("top", 0, VisibilityInfo::public())).unwrap();

        let name = path(&["top"]).with_relative(1);
        let found = tree.resolve(lib, &name, &AccessInfo::new(lib)).unwrap();
        assert!(matches!(found, Resolved::Item(i) if i.name.value == "top"));

        let too_far = path(&["top"]).with_relative(2);
        assert!(matches!(
            tree.resolve(lib, &too_far, &AccessInfo::new(lib)),
            Err(ResolveError::NoParent { .. })
        ));
    }

    #[test]
    fn test_unqualified_climbs_to_enclosing_modules() {
        let mut tree = ModuleTree::new();
        let file = tree.add_module(ident("app"), ModKind::File, None, FileId(0), None);
        let lib = tree.add_module(ident("inner"), ModKind::Lib, Some(file), FileId(0), None);
        tree.add_item(file, item("helper", 0, VisibilityInfo::private(file))).unwrap();
        let found = tree.resolve(lib, &path(&["helper"]), &AccessInfo::new(lib)).unwrap();
        assert!(matches!(found, Resolved::Item(_)));
    }

    #[test]
    fn test_inaccessible_is_an_error() {
        let mut tree = ModuleTree::new();
        let a = tree.add_module(ident("a"), ModKind::File, None, FileId(0), None);
        let b = tree.add_module(ident("b"), ModKind::File, None, FileId(1), None);
        tree.add_item(a, item("secret", 0, VisibilityInfo::private(a))).unwrap();
        tree.add_brought_module(
            b,
            BroughtMod {
                module: a,
                alias: Some(ident("a")),
                visibility: VisibilityInfo::private(b),
                range: FileRange::default(),
            },
        );
        let err = tree
            .resolve(b, &path(&["a", "secret"]), &AccessInfo::new(b))
            .unwrap_err();
        assert!(matches!(err, ResolveError::NotAccessible { .. }));
        assert_eq!(err.code(), codes::NOT_ACCESSIBLE);
    }

    #[test]
    fn test_anonymous_brought_module_is_searched() {
        let mut tree = ModuleTree::new();
        let a = tree.add_module(ident("a"), ModKind::File, None, FileId(0), None);
        let b = tree.add_module(ident("b"), ModKind::File, None, FileId(1), None);
        let c = tree.add_module(ident("c"), ModKind::File, None, FileId(2), None);
        tree.add_item(c, item("deep", 7, VisibilityInfo::public())).unwrap();
        let public = tree.visibility_for(VisibilitySpec::Public, b, None);
        tree.add_brought_module(
            b,
            BroughtMod {
                module: c,
                alias: None,
                visibility: public,
                range: FileRange::default(),
            },
        );
        tree.add_brought_module(
            a,
            BroughtMod {
                module: b,
                alias: None,
                visibility: VisibilityInfo::private(a),
                range: FileRange::default(),
            },
        );
        let found = tree.resolve(a, &path(&["deep"]), &AccessInfo::new(a)).unwrap();
        assert!(matches!(found, Resolved::Item(i) if i.entity == EntityId(7)));
    }

    #[test]
    fn test_brought_entity_alias() {
        let mut tree = ModuleTree::new();
        let a = tree.add_module(ident("a"), ModKind::File, None, FileId(0), None);
        let b = tree.add_module(ident("b"), ModKind::File, None, FileId(1), None);
        let target = item("original", 3, VisibilityInfo::public());
        tree.add_item(b, target.clone()).unwrap();
        tree.add_brought_entity(
            a,
            BroughtEntity {
                name: ident("renamed"),
                item: target,
                visibility: VisibilityInfo::private(a),
            },
        )
        .unwrap();
        let found = tree.resolve(a, &path(&["renamed"]), &AccessInfo::new(a)).unwrap();
        assert!(matches!(found, Resolved::Item(i) if i.entity == EntityId(3)));
    }

    #[test]
    fn test_not_found_message() {
        let mut tree = ModuleTree::new();
        let file = tree.add_module(ident("app"), ModKind::File, None, FileId(0), None);
        let lib = tree.add_module(ident("util"), ModKind::Lib, Some(file), FileId(0), None);
        let _ = lib;
        let err = tree
            .resolve(file, &path(&["util", "missing"]), &AccessInfo::new(file))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "No recognisable entity named `missing` found in module `app::util` or its submodules and brought modules"
        );
    }
}
