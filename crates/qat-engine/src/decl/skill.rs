//! Skills and done skills
//!
//! A skill lists method prototypes. `do skill S for T` adds members to `T`
//! and must provide every method `S` lists with the same signature;
//! `do type T` adds members without a skill to check against.

use tracing::debug;

use crate::ast::{DoSkillDecl, SkillDecl};
use crate::ctx::{EmitCtx, MemberParent};
use crate::diagnostic::Diagnostic;
use crate::entity::{DependType, DependencyCollector, EmitPhase, EntityId};
use crate::error::{codes, CompileError, CompileResult};
use crate::lower::{Lowerer, Symbol};
use crate::module::Resolved;
use crate::types::{
    DoneSkill, DoneSkillId, MemberFunction, MemberKind, SkillDef, SkillId, SkillPrototype,
    TypeContext, TypeId,
};

use super::{check_unique, member};

pub(super) fn dependencies(collector: &mut DependencyCollector<'_>, decl: &SkillDecl) {
    for prototype in &decl.prototypes {
        collector.args(&prototype.args, DependType::Partial, EmitPhase::Phase1);
        if let Some(ret) = &prototype.return_type {
            collector.type_expr(ret, DependType::Partial, EmitPhase::Phase1);
        }
    }
}

pub(super) fn done_dependencies(collector: &mut DependencyCollector<'_>, decl: &DoSkillDecl) {
    if let Some(skill) = &decl.skill {
        collector.name(skill, DependType::Complete, EmitPhase::Phase2);
    }
    collector.type_expr(&decl.target, DependType::Complete, EmitPhase::Phase2);
    member::dependencies(collector, &decl.members, EmitPhase::Phase2);
}

/// The member of a done skill that provides a skill method
fn provided<'m>(
    members: &'m [MemberFunction],
    prototype: &SkillPrototype,
) -> Option<&'m MemberFunction> {
    members.iter().find(|m| {
        matches!(m.kind, MemberKind::Method | MemberKind::VariationMethod)
            && m.name == prototype.name.value
    })
}

fn matches_prototype(member: &MemberFunction, prototype: &SkillPrototype) -> bool {
    member.kind.is_variation() == prototype.is_variation
        && member.arg_types() == prototype.args
        && member.return_type == prototype.return_type
}

impl<'a> Lowerer<'a> {
    pub(super) fn skill(
        &mut self,
        ctx: &EmitCtx,
        id: EntityId,
        decl: &SkillDecl,
    ) -> CompileResult<()> {
        check_unique(decl.prototypes.iter().map(|p| &p.name), "Method")?;
        let mut prototypes = Vec::with_capacity(decl.prototypes.len());
        for prototype in &decl.prototypes {
            let what = format!("method `{}` of skill `{}`", prototype.name, decl.name);
            let args = self.resolve_params(ctx, &prototype.args, &what)?;
            let return_type = self.return_type_of(ctx, prototype.return_type.as_ref())?;
            prototypes.push(SkillPrototype {
                name: prototype.name.clone(),
                is_variation: prototype.is_variation,
                args,
                return_type,
            });
        }
        let skill = self.types.add_skill(SkillDef {
            name: decl.name.clone(),
            full_name: self.modules.full_name_of(ctx.module, decl.name.as_str()),
            module: ctx.module,
            visibility: self.modules.visibility_for(decl.visibility, ctx.module, None),
            prototypes,
        });
        self.symbols.insert(id, Symbol::Skill(skill));
        debug!(skill = %decl.name, methods = decl.prototypes.len(), "skill declared");
        Ok(())
    }

    fn done_skill_target(&mut self, ctx: &EmitCtx, decl: &DoSkillDecl) -> CompileResult<TypeId> {
        let target = self.resolve_type(ctx, &decl.target)?;
        if target == TypeContext::VOID || self.types.is_reference(target) {
            return Err(CompileError::at(
                codes::TYPE_MISMATCH,
                format!("Members cannot be added to the type `{}`", self.type_name(target)),
                decl.target.range,
            ));
        }
        Ok(target)
    }

    fn skill_named(&self, ctx: &EmitCtx, decl: &DoSkillDecl) -> CompileResult<Option<SkillId>> {
        let Some(name) = &decl.skill else {
            return Ok(None);
        };
        let not_a_skill = || {
            CompileError::at(
                codes::INVALID_EXPRESSION,
                format!("`{}` is not a skill", name),
                name.range,
            )
        };
        match self.resolve_name(ctx, name)? {
            Resolved::Item(item) => match self.symbol(item.entity, name.range)? {
                Symbol::Skill(skill) => Ok(Some(*skill)),
                _ => Err(not_a_skill()),
            },
            Resolved::Module(_) => Err(not_a_skill()),
        }
    }

    pub(super) fn done_skill_prototypes(
        &mut self,
        ctx: &EmitCtx,
        id: EntityId,
        decl: &DoSkillDecl,
    ) -> CompileResult<()> {
        let target = self.done_skill_target(ctx, decl)?;
        let skill = self.skill_named(ctx, decl)?;
        let done = self.types.add_done_skill(DoneSkill {
            skill,
            target,
            module: ctx.module,
            members: Vec::new(),
            range: decl.range,
        });
        self.symbols.insert(id, Symbol::DoneSkill(done));

        let prefix = match skill {
            Some(skill) => format!(
                "{}'{}",
                self.type_name(target),
                self.types.skill_def(skill).full_name
            ),
            None => format!("{}'do", self.type_name(target)),
        };
        let member_ctx = ctx.with_member_parent(MemberParent {
            ty: target,
            done_skill: Some(done),
        });
        for (position, member) in decl.members.iter().enumerate() {
            let prototype = self.member_prototype(&member_ctx, target, &prefix, position, member)?;
            self.types.done_skill_mut(done).members.push(prototype);
        }
        if let Some(skill) = skill {
            self.check_skill_provided(skill, done, decl)?;
        }
        debug!(ty = %self.type_name(target), members = decl.members.len(), "done skill declared");
        Ok(())
    }

    /// Every method of the skill must be provided with the same signature
    fn check_skill_provided(
        &self,
        skill: SkillId,
        done: DoneSkillId,
        decl: &DoSkillDecl,
    ) -> CompileResult<()> {
        let def = self.types.skill_def(skill);
        let members = &self.types.done_skill(done).members;
        let target = self.type_name(self.types.done_skill(done).target);
        for prototype in &def.prototypes {
            match provided(members, prototype) {
                None => {
                    return Err(Diagnostic::error(format!(
                        "Skill `{}` requires the method `{}`, but it is not provided for `{}`",
                        def.name, prototype.name, target
                    ))
                    .with_code(codes::NO_MEMBER)
                    .with_primary_label(decl.range, "")
                    .with_secondary_label(prototype.name.range, "required here")
                    .into());
                }
                Some(member) if !matches_prototype(member, prototype) => {
                    return Err(Diagnostic::error(format!(
                        "Method `{}` does not have the signature skill `{}` requires",
                        prototype.name, def.name
                    ))
                    .with_code(codes::TYPE_MISMATCH)
                    .with_primary_label(member.range, "")
                    .with_secondary_label(
                        prototype.name.range,
                        "the required signature is declared here",
                    )
                    .into());
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    pub(super) fn done_skill_bodies(
        &mut self,
        ctx: &EmitCtx,
        id: EntityId,
        decl: &DoSkillDecl,
    ) -> CompileResult<()> {
        let done = match self.symbol(id, decl.range)? {
            Symbol::DoneSkill(done) => *done,
            _ => return Err(CompileError::internal("skill implementation has no definition")),
        };
        let members = self.types.done_skill(done).members.clone();
        for (member, member_decl) in members.iter().zip(&decl.members) {
            self.member_body(ctx, member, member_decl, Some(done))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::FunctionId;
    use crate::module::VisibilityInfo;
    use crate::span::{FileRange, Identifier};

    fn method(name: &str, kind: MemberKind, return_type: TypeId) -> MemberFunction {
        MemberFunction {
            kind,
            name: name.to_string(),
            function: FunctionId(0),
            parent: TypeContext::I32,
            args: Vec::new(),
            return_type,
            visibility: VisibilityInfo::public(),
            range: FileRange::default(),
        }
    }

    fn prototype(name: &str, is_variation: bool, return_type: TypeId) -> SkillPrototype {
        SkillPrototype {
            name: Identifier::new(name, FileRange::default()),
            is_variation,
            args: Vec::new(),
            return_type,
        }
    }

    #[test]
    fn test_provided_methods_are_found_by_name() {
        let members = vec![
            method("new", MemberKind::Static, TypeContext::VOID),
            method("len", MemberKind::Method, TypeContext::USIZE),
        ];
        assert!(provided(&members, &prototype("len", false, TypeContext::USIZE)).is_some());
        assert!(provided(&members, &prototype("new", false, TypeContext::VOID)).is_none());
    }

    #[test]
    fn test_signature_must_match() {
        let len = method("len", MemberKind::Method, TypeContext::USIZE);
        assert!(matches_prototype(&len, &prototype("len", false, TypeContext::USIZE)));
        assert!(!matches_prototype(&len, &prototype("len", true, TypeContext::USIZE)));
        assert!(!matches_prototype(&len, &prototype("len", false, TypeContext::I32)));
    }
}
