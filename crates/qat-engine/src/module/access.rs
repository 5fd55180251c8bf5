//! Visibility of declarations and access checks
//!
//! Every visibility other than `pub` and `pub:type` restricts access to the
//! subtree of one module: the declaring module, the nearest lib, file or
//! folder. A requester is allowed in when its module lies inside that
//! subtree.

use super::ModId;
use crate::types::TypeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisibilityKind {
    Public,
    /// Declaring module and its descendants
    Private,
    Lib,
    File,
    Folder,
    /// Members of one type
    Type,
}

/// Resolved visibility of a declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VisibilityInfo {
    pub kind: VisibilityKind,
    /// Root of the subtree allowed in, for module-scoped kinds
    pub module: Option<ModId>,
    /// Owner type for `pub:type`
    pub ty: Option<TypeId>,
}

impl VisibilityInfo {
    pub fn public() -> Self {
        Self {
            kind: VisibilityKind::Public,
            module: None,
            ty: None,
        }
    }

    pub fn private(module: ModId) -> Self {
        Self::scoped(VisibilityKind::Private, module)
    }

    pub fn scoped(kind: VisibilityKind, module: ModId) -> Self {
        Self {
            kind,
            module: Some(module),
            ty: None,
        }
    }

    pub fn of_type(ty: TypeId) -> Self {
        Self {
            kind: VisibilityKind::Type,
            module: None,
            ty: Some(ty),
        }
    }

    pub fn is_public(&self) -> bool {
        self.kind == VisibilityKind::Public
    }

    pub fn describe(&self) -> &'static str {
        match self.kind {
            VisibilityKind::Public => "public",
            VisibilityKind::Private => "private",
            VisibilityKind::Lib => "visible inside its lib",
            VisibilityKind::File => "visible inside its file",
            VisibilityKind::Folder => "visible inside its folder",
            VisibilityKind::Type => "visible to its parent type",
        }
    }
}

/// Who is asking for access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessInfo {
    pub module: ModId,
    /// Type whose member is being emitted, if any
    pub member_parent: Option<TypeId>,
}

impl AccessInfo {
    pub fn new(module: ModId) -> Self {
        Self {
            module,
            member_parent: None,
        }
    }

    pub fn with_member_parent(mut self, ty: Option<TypeId>) -> Self {
        self.member_parent = ty;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility_constructors() {
        assert!(VisibilityInfo::public().is_public());
        let private = VisibilityInfo::private(ModId(3));
        assert_eq!(private.kind, VisibilityKind::Private);
        assert_eq!(private.module, Some(ModId(3)));
        assert_eq!(private.describe(), "private");
    }
}
