//! Emission context
//!
//! An [`EmitCtx`] says where lowering currently happens: the module whose
//! names are visible, the entity being emitted, the function receiving
//! instructions and the type whose member is being lowered. It is cheap to
//! copy and passed by reference through every lowering call; mutable state
//! (the function under construction, loop stack, prerun frames) lives in
//! the lowerer.

use crate::entity::EntityId;
use crate::ir::FunctionId;
use crate::module::{AccessInfo, ModId};
use crate::types::{DoneSkillId, TypeId};

/// Type whose member function is being lowered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberParent {
    pub ty: TypeId,
    /// Set when the member comes from a done skill
    pub done_skill: Option<DoneSkillId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmitCtx {
    pub module: ModId,
    pub entity: Option<EntityId>,
    pub function: Option<FunctionId>,
    pub member_parent: Option<MemberParent>,
}

impl EmitCtx {
    pub fn new(module: ModId) -> Self {
        Self {
            module,
            entity: None,
            function: None,
            member_parent: None,
        }
    }

    pub fn for_entity(module: ModId, entity: EntityId) -> Self {
        Self {
            entity: Some(entity),
            ..Self::new(module)
        }
    }

    pub fn with_function(mut self, function: FunctionId) -> Self {
        self.function = Some(function);
        self
    }

    pub fn with_member_parent(mut self, parent: MemberParent) -> Self {
        self.member_parent = Some(parent);
        self
    }

    /// Who is asking, for visibility checks
    pub fn access(&self) -> AccessInfo {
        AccessInfo::new(self.module).with_member_parent(self.member_parent.map(|p| p.ty))
    }

    pub fn parent_type(&self) -> Option<TypeId> {
        self.member_parent.map(|p| p.ty)
    }

    pub fn is_in_function(&self) -> bool {
        self.function.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeContext;

    #[test]
    fn test_access_carries_member_parent() {
        let ctx = EmitCtx::new(ModId(3)).with_member_parent(MemberParent {
            ty: TypeContext::I32,
            done_skill: None,
        });
        let access = ctx.access();
        assert_eq!(access.module, ModId(3));
        assert_eq!(access.member_parent, Some(TypeContext::I32));
        assert!(!ctx.is_in_function());
    }
}
