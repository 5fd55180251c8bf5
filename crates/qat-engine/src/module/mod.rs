//! Module tree and namespace resolution
//!
//! Files, folders and `lib` blocks all become [`Mod`]s in one
//! [`ModuleTree`]. A module owns its submodules and its items. Brought
//! modules and brought entities are back references into other parts of the
//! tree, so the bring graph may contain cycles while ownership stays a tree.

pub mod access;
pub mod resolve;

pub use access::{AccessInfo, VisibilityInfo, VisibilityKind};
pub use resolve::{ResolveError, Resolved};

use std::fmt;
use std::path::PathBuf;

use rustc_hash::FxHashMap;

use crate::ast::VisibilitySpec;
use crate::entity::{EntityId, EntityType};
use crate::span::{FileId, FileRange, Identifier};
use crate::types::TypeId;

/// Identifier of a module in the [`ModuleTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModId(pub(crate) u32);

impl ModId {
    pub fn as_u32(self) -> u32 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ModId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mod{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModKind {
    File,
    Folder,
    Lib,
}

/// A named declaration registered in a module
#[derive(Debug, Clone, PartialEq)]
pub struct ModItem {
    pub name: Identifier,
    pub entity: EntityId,
    pub kind: EntityType,
    pub visibility: VisibilityInfo,
}

/// A module brought into another one
#[derive(Debug, Clone, PartialEq)]
pub struct BroughtMod {
    pub module: ModId,
    /// Without an alias the module's contents are searched anonymously
    pub alias: Option<Identifier>,
    pub visibility: VisibilityInfo,
    pub range: FileRange,
}

/// An entity brought in by name, possibly renamed
#[derive(Debug, Clone, PartialEq)]
pub struct BroughtEntity {
    pub name: Identifier,
    pub item: ModItem,
    pub visibility: VisibilityInfo,
}

#[derive(Debug, Clone)]
pub struct Mod {
    pub name: Identifier,
    pub kind: ModKind,
    pub parent: Option<ModId>,
    pub visibility: VisibilityInfo,
    pub file: FileId,
    pub path: Option<PathBuf>,
    pub submodules: Vec<ModId>,
    pub brought: Vec<BroughtMod>,
    brought_entities: FxHashMap<String, BroughtEntity>,
    items: FxHashMap<String, ModItem>,
    /// Guarded declarations whose names are registered once their guard holds
    guarded: FxHashMap<String, Vec<EntityId>>,
}

impl Mod {
    pub fn item(&self, name: &str) -> Option<&ModItem> {
        self.items.get(name)
    }

    pub fn items(&self) -> impl Iterator<Item = &ModItem> {
        self.items.values()
    }

    pub fn brought_entity(&self, name: &str) -> Option<&BroughtEntity> {
        self.brought_entities.get(name)
    }

    pub fn guarded(&self, name: &str) -> &[EntityId] {
        self.guarded.get(name).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn is_lib(&self) -> bool {
        self.kind == ModKind::Lib
    }
}

/// Error when a name clashes with an existing one in the same module
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateName {
    pub name: String,
    pub existing: FileRange,
}

#[derive(Debug, Clone, Default)]
pub struct ModuleTree {
    modules: Vec<Mod>,
}

impl ModuleTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_module(
        &mut self,
        name: Identifier,
        kind: ModKind,
        parent: Option<ModId>,
        file: FileId,
        path: Option<PathBuf>,
    ) -> ModId {
        let id = ModId(self.modules.len() as u32);
        self.modules.push(Mod {
            name,
            kind,
            parent,
            visibility: VisibilityInfo::public(),
            file,
            path,
            submodules: Vec::new(),
            brought: Vec::new(),
            brought_entities: FxHashMap::default(),
            items: FxHashMap::default(),
            guarded: FxHashMap::default(),
        });
        if let Some(parent) = parent {
            self.modules[parent.index()].submodules.push(id);
        }
        id
    }

    pub fn get(&self, id: ModId) -> &Mod {
        &self.modules[id.index()]
    }

    pub fn get_mut(&mut self, id: ModId) -> &mut Mod {
        &mut self.modules[id.index()]
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = ModId> {
        (0..self.modules.len() as u32).map(ModId)
    }

    pub fn parent(&self, id: ModId) -> Option<ModId> {
        self.get(id).parent
    }

    /// `a::b::c` built from the names of the module and its ancestors
    pub fn full_name(&self, id: ModId) -> String {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(module) = current {
            names.push(self.get(module).name.value.clone());
            current = self.get(module).parent;
        }
        names.reverse();
        names.join("::")
    }

    /// Full name of an entity declared in `module`
    pub fn full_name_of(&self, module: ModId, name: &str) -> String {
        format!("{}::{}", self.full_name(module), name)
    }

    /// Whether `id` is `ancestor` or lies below it
    pub fn is_within(&self, id: ModId, ancestor: ModId) -> bool {
        let mut current = Some(id);
        while let Some(module) = current {
            if module == ancestor {
                return true;
            }
            current = self.get(module).parent;
        }
        false
    }

    /// Closest module of `kind` starting from `id` itself
    pub fn nearest(&self, id: ModId, kind: ModKind) -> Option<ModId> {
        let mut current = Some(id);
        while let Some(module) = current {
            if self.get(module).kind == kind {
                return Some(module);
            }
            current = self.get(module).parent;
        }
        None
    }

    /// File module enclosing `id`, or `id` itself for folders
    pub fn file_of(&self, id: ModId) -> ModId {
        self.nearest(id, ModKind::File).unwrap_or(id)
    }

    pub fn module_by_path(&self, path: &str) -> Option<ModId> {
        self.ids().find(|id| {
            self.get(*id)
                .path
                .as_ref()
                .is_some_and(|p| p.to_string_lossy() == path)
        })
    }

    /// Visibility of a declaration written with `declared` inside `module`
    pub fn visibility_for(
        &self,
        declared: VisibilitySpec,
        module: ModId,
        parent_type: Option<TypeId>,
    ) -> VisibilityInfo {
        match declared {
            VisibilitySpec::Public => VisibilityInfo::public(),
            VisibilitySpec::Private => VisibilityInfo::private(module),
            VisibilitySpec::Lib => VisibilityInfo::scoped(
                VisibilityKind::Lib,
                self.nearest(module, ModKind::Lib)
                    .unwrap_or_else(|| self.file_of(module)),
            ),
            VisibilitySpec::File => {
                VisibilityInfo::scoped(VisibilityKind::File, self.file_of(module))
            }
            VisibilitySpec::Folder => {
                let file = self.file_of(module);
                let folder = self.nearest(file, ModKind::Folder).unwrap_or(file);
                VisibilityInfo::scoped(VisibilityKind::Folder, folder)
            }
            VisibilitySpec::Type => match parent_type {
                Some(ty) => VisibilityInfo::of_type(ty),
                None => VisibilityInfo::private(module),
            },
        }
    }

    pub fn is_accessible(&self, visibility: &VisibilityInfo, access: &AccessInfo) -> bool {
        match visibility.kind {
            VisibilityKind::Public => true,
            VisibilityKind::Type => {
                visibility.ty.is_some() && access.member_parent == visibility.ty
            }
            _ => visibility
                .module
                .is_some_and(|scope| self.is_within(access.module, scope)),
        }
    }

    /// Register a named item, failing on a clash in the same module
    pub fn add_item(&mut self, module: ModId, item: ModItem) -> Result<(), DuplicateName> {
        let existing = {
            let m = self.get(module);
            m.items
                .get(&item.name.value)
                .map(|i| i.name.range)
                .or_else(|| m.brought_entities.get(&item.name.value).map(|b| b.name.range))
                .or_else(|| {
                    m.submodules
                        .iter()
                        .map(|s| self.get(*s))
                        .find(|s| s.kind == ModKind::Lib && s.name.value == item.name.value)
                        .map(|s| s.name.range)
                })
        };
        if let Some(existing) = existing {
            return Err(DuplicateName {
                name: item.name.value.clone(),
                existing,
            });
        }
        self.get_mut(module)
            .items
            .insert(item.name.value.clone(), item);
        Ok(())
    }

    pub fn add_guarded(&mut self, module: ModId, name: &str, entity: EntityId) {
        self.get_mut(module)
            .guarded
            .entry(name.to_string())
            .or_default()
            .push(entity);
    }

    pub fn add_brought_module(&mut self, module: ModId, brought: BroughtMod) {
        let m = self.get_mut(module);
        if !m.brought.iter().any(|b| b.module == brought.module && b.alias == brought.alias) {
            m.brought.push(brought);
        }
    }

    pub fn add_brought_entity(
        &mut self,
        module: ModId,
        brought: BroughtEntity,
    ) -> Result<(), DuplicateName> {
        let existing = {
            let m = self.get(module);
            m.items
                .get(&brought.name.value)
                .map(|i| i.name.range)
                .or_else(|| m.brought_entities.get(&brought.name.value).map(|b| b.name.range))
        };
        if let Some(existing) = existing {
            return Err(DuplicateName {
                name: brought.name.value.clone(),
                existing,
            });
        }
        self.get_mut(module)
            .brought_entities
            .insert(brought.name.value.clone(), brought);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Identifier {
        Identifier::new(name, FileRange::default())
    }

    fn tree() -> (ModuleTree, ModId, ModId, ModId) {
        let mut tree = ModuleTree::new();
        let folder = tree.add_module(ident("pkg"), ModKind::Folder, None, FileId(0), None);
        let file = tree.add_module(ident("app"), ModKind::File, Some(folder), FileId(1), None);
        let lib = tree.add_module(ident("net"), ModKind::Lib, Some(file), FileId(1), None);
        (tree, folder, file, lib)
    }

    #[test]
    fn test_full_names() {
        let (tree, _, file, lib) = tree();
        assert_eq!(tree.full_name(lib), "pkg::app::net");
        assert_eq!(tree.full_name_of(file, "main"), "pkg::app::main");
    }

    #[test]
    fn test_private_visibility_covers_descendants() {
        let (tree, folder, file, lib) = tree();
        let private = tree.visibility_for(VisibilitySpec::Private, file, None);
        assert!(tree.is_accessible(&private, &AccessInfo::new(lib)));
        assert!(tree.is_accessible(&private, &AccessInfo::new(file)));
        assert!(!tree.is_accessible(&private, &AccessInfo::new(folder)));
    }

    #[test]
    fn test_scoped_visibility_targets() {
        let (tree, folder, file, lib) = tree();
        assert_eq!(
            tree.visibility_for(VisibilitySpec::Lib, lib, None).module,
            Some(lib)
        );
        assert_eq!(
            tree.visibility_for(VisibilitySpec::File, lib, None).module,
            Some(file)
        );
        assert_eq!(
            tree.visibility_for(VisibilitySpec::Folder, lib, None).module,
            Some(folder)
        );
    }

    #[test]
    fn test_type_visibility() {
        let (tree, _, file, _) = tree();
        let ty = crate::types::TypeContext::I32;
        let vis = tree.visibility_for(VisibilitySpec::Type, file, Some(ty));
        assert!(!tree.is_accessible(&vis, &AccessInfo::new(file)));
        assert!(tree.is_accessible(&vis, &AccessInfo::new(file).with_member_parent(Some(ty))));
    }

    #[test]
    fn test_duplicate_item() {
        let (mut tree, _, file, _) = tree();
        let item = ModItem {
            name: ident("thing"),
            entity: EntityId(0),
            kind: EntityType::Function,
            visibility: VisibilityInfo::public(),
        };
        assert!(tree.add_item(file, item.clone()).is_ok());
        let err = tree.add_item(file, item).unwrap_err();
        assert_eq!(err.name, "thing");

        let clash = ModItem {
            name: ident("net"),
            entity: EntityId(1),
            kind: EntityType::Function,
            visibility: VisibilityInfo::public(),
        };
        assert!(tree.add_item(file, clash).is_err());
    }
}
