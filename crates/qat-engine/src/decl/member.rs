//! Member functions of expanded types and done skills
//!
//! Every member that receives the instance takes its address as the first
//! IR parameter: a variable mark for variation members and constructors, a
//! plain mark otherwise. Constructors, convertors and the copy and move
//! members initialize or update the instance in place and give `void`;
//! `to` convertors give their target type.
//!
//! Copy and move members see the other instance through an implicit
//! reference argument named `other`.

use tracing::{debug, trace};

use crate::ast::{MemberDecl, MemberDeclKind};
use crate::ctx::{EmitCtx, MemberParent};
use crate::diagnostic::Diagnostic;
use crate::entity::{DependType, DependencyCollector, EmitPhase};
use crate::error::{codes, CompileError, CompileResult};
use crate::ir::IrFunction;
use crate::lower::{Lowerer, SelfValue};
use crate::span::Identifier;
use crate::types::{DoneSkillId, MemberArg, MemberFunction, MemberKind, TypeContext, TypeId};

use super::check_unique;

/// Name of the implicit argument of copy and move members
const OTHER: &str = "other";

pub(super) fn dependencies(
    collector: &mut DependencyCollector<'_>,
    members: &[MemberDecl],
    prototype_phase: EmitPhase,
) {
    for member in members {
        collector.args(&member.args, DependType::Partial, prototype_phase);
        if let Some(ret) = &member.return_type {
            collector.type_expr(ret, DependType::Partial, prototype_phase);
        }
    }
    for member in members {
        collector.args(&member.args, DependType::Complete, EmitPhase::Phase3);
        collector.push_scope();
        collector.declare_args(&member.args);
        collector.declare_local(OTHER);
        collector.sentences(&member.body, EmitPhase::Phase3);
        collector.pop_scope();
    }
}

fn member_kind(kind: &MemberDeclKind) -> MemberKind {
    match kind {
        MemberDeclKind::Method { is_variation: true, .. } => MemberKind::VariationMethod,
        MemberDeclKind::Method { .. } => MemberKind::Method,
        MemberDeclKind::Static { .. } => MemberKind::Static,
        MemberDeclKind::DefaultConstructor => MemberKind::DefaultConstructor,
        MemberDeclKind::Constructor => MemberKind::Constructor,
        MemberDeclKind::FromConvertor => MemberKind::FromConvertor,
        MemberDeclKind::ToConvertor => MemberKind::ToConvertor,
        MemberDeclKind::BinaryOperator { op, is_variation } => MemberKind::BinaryOperator {
            op: *op,
            is_variation: *is_variation,
        },
        MemberDeclKind::UnaryOperator { op } => MemberKind::UnaryOperator { op: *op },
        MemberDeclKind::CopyConstructor => MemberKind::CopyConstructor,
        MemberDeclKind::MoveConstructor => MemberKind::MoveConstructor,
        MemberDeclKind::CopyAssignment => MemberKind::CopyAssignment,
        MemberDeclKind::MoveAssignment => MemberKind::MoveAssignment,
        MemberDeclKind::Destructor => MemberKind::Destructor,
    }
}

fn member_name(kind: &MemberDeclKind) -> String {
    match kind {
        MemberDeclKind::Method { name, .. } | MemberDeclKind::Static { name } => name.value.clone(),
        MemberDeclKind::DefaultConstructor => "default".to_string(),
        MemberDeclKind::Constructor => "new".to_string(),
        MemberDeclKind::FromConvertor => "from".to_string(),
        MemberDeclKind::ToConvertor => "to".to_string(),
        MemberDeclKind::BinaryOperator { op, is_variation } => {
            format!("operator{}{}", op, if *is_variation { "=" } else { "" })
        }
        MemberDeclKind::UnaryOperator { op } => format!("operator{}", op),
        MemberDeclKind::CopyConstructor => "copy".to_string(),
        MemberDeclKind::MoveConstructor => "move".to_string(),
        MemberDeclKind::CopyAssignment => "copy=".to_string(),
        MemberDeclKind::MoveAssignment => "move=".to_string(),
        MemberDeclKind::Destructor => "end".to_string(),
    }
}

/// Number of explicit arguments a special member takes, when fixed
fn fixed_arity(kind: MemberKind) -> Option<usize> {
    match kind {
        MemberKind::FromConvertor | MemberKind::BinaryOperator { .. } => Some(1),
        MemberKind::DefaultConstructor
        | MemberKind::ToConvertor
        | MemberKind::UnaryOperator { .. }
        | MemberKind::CopyConstructor
        | MemberKind::MoveConstructor
        | MemberKind::CopyAssignment
        | MemberKind::MoveAssignment
        | MemberKind::Destructor => Some(0),
        MemberKind::Method
        | MemberKind::VariationMethod
        | MemberKind::Static
        | MemberKind::Constructor => None,
    }
}

/// Whether the member initializes or updates the instance instead of giving a value
fn gives_void(kind: MemberKind) -> bool {
    matches!(
        kind,
        MemberKind::DefaultConstructor
            | MemberKind::Constructor
            | MemberKind::FromConvertor
            | MemberKind::CopyConstructor
            | MemberKind::MoveConstructor
            | MemberKind::CopyAssignment
            | MemberKind::MoveAssignment
            | MemberKind::Destructor
    )
}

/// Whether two members of one type could not be told apart
fn clashes(a: &MemberFunction, b: &MemberFunction) -> bool {
    let named = |k: MemberKind| {
        matches!(
            k,
            MemberKind::Method | MemberKind::VariationMethod | MemberKind::Static
        )
    };
    if named(a.kind) || named(b.kind) {
        return named(a.kind) && named(b.kind) && a.name == b.name;
    }
    if a.kind != b.kind {
        return false;
    }
    match a.kind {
        MemberKind::Constructor | MemberKind::FromConvertor | MemberKind::BinaryOperator { .. } => {
            a.arg_types() == b.arg_types()
        }
        MemberKind::ToConvertor => a.return_type == b.return_type,
        _ => true,
    }
}

impl<'a> Lowerer<'a> {
    /// Declare the prototype of one member of `parent`
    ///
    /// `prefix` names the owner in the IR function name.
    pub(super) fn member_prototype(
        &mut self,
        ctx: &EmitCtx,
        parent: TypeId,
        prefix: &str,
        position: usize,
        member: &MemberDecl,
    ) -> CompileResult<MemberFunction> {
        let kind = member_kind(&member.kind);
        let name = member_name(&member.kind);

        if let Some(expected) = fixed_arity(kind) {
            if member.args.len() != expected {
                return Err(CompileError::at(
                    codes::ARGUMENT_COUNT,
                    format!(
                        "The {} of `{}` takes {} argument{}, but {} were declared",
                        kind.describe(),
                        self.type_name(parent),
                        expected,
                        if expected == 1 { "" } else { "s" },
                        member.args.len()
                    ),
                    member.range,
                ));
            }
        }
        check_unique(member.args.iter().map(|a| &a.name), "Argument")?;

        let mut args = Vec::with_capacity(member.args.len() + 1);
        for arg in &member.args {
            if arg.is_member_arg {
                if !kind.allows_member_args() {
                    return Err(CompileError::at(
                        codes::MEMBER_ARGUMENT,
                        format!(
                            "Member argument `''{}` cannot be used in a {}",
                            arg.name,
                            kind.describe()
                        ),
                        arg.range,
                    ));
                }
                let field = self
                    .types
                    .struct_of(parent)
                    .and_then(|def| def.field(arg.name.as_str()))
                    .map(|(index, field)| (index, field.ty));
                let (index, field_ty) = field.ok_or_else(|| {
                    CompileError::at(
                        codes::NO_MEMBER,
                        format!(
                            "Type `{}` has no field named `{}`",
                            self.type_name(parent),
                            arg.name
                        ),
                        arg.range,
                    )
                })?;
                if let Some(declared) = &arg.ty {
                    let declared = self.resolve_type(ctx, declared)?;
                    if declared != field_ty {
                        return Err(self.mismatch(field_ty, declared, arg.range));
                    }
                }
                args.push(MemberArg {
                    name: arg.name.clone(),
                    ty: field_ty,
                    is_variable: arg.is_variable,
                    member_field: Some(index),
                });
                continue;
            }
            let declared = arg.ty.as_ref().ok_or_else(|| {
                CompileError::at(
                    codes::MISSING_VALUE,
                    format!("Argument `{}` needs a type", arg.name),
                    arg.range,
                )
            })?;
            let ty = self.resolve_type(ctx, declared)?;
            if ty == TypeContext::VOID {
                return Err(CompileError::at(
                    codes::TYPE_MISMATCH,
                    format!("Argument `{}` cannot be of type `void`", arg.name),
                    arg.range,
                ));
            }
            args.push(MemberArg {
                name: arg.name.clone(),
                ty,
                is_variable: arg.is_variable,
                member_field: None,
            });
        }
        if let MemberKind::CopyConstructor
        | MemberKind::CopyAssignment
        | MemberKind::MoveConstructor
        | MemberKind::MoveAssignment = kind
        {
            let is_move = matches!(kind, MemberKind::MoveConstructor | MemberKind::MoveAssignment);
            args.push(MemberArg {
                name: Identifier::new(OTHER, member.range),
                ty: self.types.reference(parent, is_move),
                is_variable: is_move,
                member_field: None,
            });
        }

        let return_type = if gives_void(kind) {
            if let Some(ret) = &member.return_type {
                return Err(CompileError::at(
                    codes::TYPE_MISMATCH,
                    format!("A {} cannot give a value", kind.describe()),
                    ret.range,
                ));
            }
            TypeContext::VOID
        } else if kind == MemberKind::ToConvertor {
            let ret = member.return_type.as_ref().ok_or_else(|| {
                CompileError::at(
                    codes::INVALID_EXPRESSION,
                    "A `to` convertor must name the type it converts to",
                    member.range,
                )
            })?;
            self.resolve_type(ctx, ret)?
        } else {
            self.return_type_of(ctx, member.return_type.as_ref())?
        };

        let mut param_types = Vec::with_capacity(args.len() + 1);
        if kind.has_self() {
            let instance = self.types.mark_to(parent, kind.is_variation());
            param_types.push(instance);
        }
        param_types.extend(args.iter().map(|a| a.ty));
        let ir_name = format!("{}'{}.{}", prefix, name, position);
        let mut ir_function = IrFunction::new(ir_name, &param_types, return_type);
        ir_function.range = member.range;
        let function = self.ir.add_function(ir_function);

        let prototype = MemberFunction {
            kind,
            name,
            function,
            parent,
            args,
            return_type,
            visibility: self.modules.visibility_for(member.visibility, ctx.module, Some(parent)),
            range: member.range,
        };
        self.check_member_clash(&prototype)?;
        trace!(
            ty = %self.type_name(parent),
            member = %prototype.name,
            kind = kind.describe(),
            "member prototype"
        );
        Ok(prototype)
    }

    fn check_member_clash(&self, member: &MemberFunction) -> CompileResult<()> {
        let existing = self
            .types
            .members_of(member.parent)
            .into_iter()
            .find(|m| clashes(m, member))
            .map(|m| m.range);
        match existing {
            Some(existing) => Err(Diagnostic::error(format!(
                "`{}` already has a {} that cannot be told apart from this one",
                self.type_name(member.parent),
                member.kind.describe()
            ))
            .with_code(codes::DUPLICATE_NAME)
            .with_primary_label(member.range, "")
            .with_secondary_label(existing, "the existing member was found here")
            .into()),
            None => Ok(()),
        }
    }

    /// Lower the body of a member whose prototype was declared earlier
    pub(super) fn member_body(
        &mut self,
        ctx: &EmitCtx,
        member: &MemberFunction,
        decl: &MemberDecl,
        done_skill: Option<DoneSkillId>,
    ) -> CompileResult<()> {
        let ctx = ctx.with_function(member.function).with_member_parent(MemberParent {
            ty: member.parent,
            done_skill,
        });
        let registers = self.function_params(member.function)?;
        let (self_value, arg_registers) = match (member.kind.has_self(), registers.split_first()) {
            (true, Some((instance, rest))) => (
                Some(SelfValue {
                    address: (*instance).into(),
                    ty: member.parent,
                    is_variable: member.kind.is_variation(),
                }),
                rest.to_vec(),
            ),
            (true, None) => {
                return Err(CompileError::internal(format!(
                    "member `{}` lost its instance parameter",
                    member.name
                )))
            }
            (false, _) => (None, registers),
        };
        let instance = self_value.as_ref().map(|s| s.address.clone());

        self.begin_function(member.function, member.return_type, self_value)?;
        for (arg, register) in member.args.iter().zip(arg_registers) {
            match (arg.member_field, &instance) {
                (Some(field), Some(instance)) => {
                    let ptr = self.field_ptr(instance.clone(), member.parent, field, arg.ty)?;
                    self.store(register.into(), ptr)?;
                }
                _ => self.bind_param(&arg.name, register, arg.ty, arg.is_variable)?,
            }
        }
        self.lower_sentences(&ctx, &decl.body)?;
        self.finish_function(decl.range)?;
        debug!(ty = %self.type_name(member.parent), member = %member.name, "member body lowered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinaryOperator;
    use crate::ir::FunctionId;
    use crate::module::VisibilityInfo;
    use crate::span::FileRange;

    fn member(kind: MemberKind, name: &str, args: Vec<TypeId>) -> MemberFunction {
        MemberFunction {
            kind,
            name: name.to_string(),
            function: FunctionId(0),
            parent: TypeContext::I32,
            args: args
                .into_iter()
                .map(|ty| MemberArg {
                    name: Identifier::new("a", FileRange::default()),
                    ty,
                    is_variable: false,
                    member_field: None,
                })
                .collect(),
            return_type: TypeContext::VOID,
            visibility: VisibilityInfo::public(),
            range: FileRange::default(),
        }
    }

    #[test]
    fn test_methods_clash_by_name_only() {
        let a = member(MemberKind::Method, "len", vec![]);
        let b = member(MemberKind::Static, "len", vec![TypeContext::I32]);
        let c = member(MemberKind::VariationMethod, "push", vec![]);
        assert!(clashes(&a, &b));
        assert!(!clashes(&a, &c));
    }

    #[test]
    fn test_constructors_clash_by_argument_types() {
        let a = member(MemberKind::FromConvertor, "from", vec![TypeContext::I32]);
        let b = member(MemberKind::FromConvertor, "from", vec![TypeContext::BOOL]);
        let c = member(MemberKind::FromConvertor, "from", vec![TypeContext::I32]);
        assert!(!clashes(&a, &b));
        assert!(clashes(&a, &c));
    }

    #[test]
    fn test_operator_shapes() {
        let plus = MemberKind::BinaryOperator {
            op: BinaryOperator::Add,
            is_variation: false,
        };
        assert_eq!(fixed_arity(plus), Some(1));
        assert_eq!(fixed_arity(MemberKind::Destructor), Some(0));
        assert_eq!(fixed_arity(MemberKind::Constructor), None);
        assert!(gives_void(MemberKind::CopyAssignment));
        assert!(!gives_void(MemberKind::ToConvertor));
    }
}
