//! Dependency collection over declaration ASTs
//!
//! Walks types, expressions and sentences of a declaration and records a
//! dependency for every name that denotes another entity. Values of a type
//! need the type complete; marks, references and function types only need
//! its skeleton. Functions are only ever needed partially, since a call
//! needs the prototype and not the body.

use rustc_hash::FxHashSet;

use super::{DependType, EmitPhase, EntityDependency, EntityId, EntityType};
use crate::ast::{
    Argument, ExprKind, Expression, MarkOwnerSpec, QualifiedName, Sentence, SentenceKind, TypeExpr,
    TypeExprKind,
};
use crate::module::{AccessInfo, ModId, ModuleTree, ResolveError, Resolved};

pub struct DependencyCollector<'t> {
    tree: &'t ModuleTree,
    module: ModId,
    access: AccessInfo,
    scopes: Vec<FxHashSet<String>>,
    /// Bring entities of enclosing modules that have not run yet
    pending_brings: Vec<EntityId>,
    deps: Vec<EntityDependency>,
}

impl<'t> DependencyCollector<'t> {
    pub fn new(tree: &'t ModuleTree, module: ModId, access: AccessInfo) -> Self {
        Self {
            tree,
            module,
            access,
            scopes: vec![FxHashSet::default()],
            pending_brings: Vec::new(),
            deps: Vec::new(),
        }
    }

    pub fn with_pending_brings(mut self, brings: Vec<EntityId>) -> Self {
        self.pending_brings = brings;
        self
    }

    pub fn into_dependencies(self) -> Vec<EntityDependency> {
        self.deps
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(FxHashSet::default());
    }

    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn declare_local(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string());
        }
    }

    fn is_local(&self, name: &QualifiedName) -> bool {
        name.is_single()
            && name
                .last()
                .is_some_and(|n| self.scopes.iter().any(|s| s.contains(n.as_str())))
    }

    fn add(&mut self, entity: EntityId, kind: DependType, phase: EmitPhase) {
        self.deps.push(EntityDependency {
            entity,
            kind,
            phase,
        });
    }

    /// Strength needed for an entity of `target` kind when `requested` was asked for
    fn kind_for(target: EntityType, requested: DependType) -> DependType {
        match target {
            EntityType::Function => DependType::Partial,
            EntityType::Struct
            | EntityType::Mix
            | EntityType::Choice
            | EntityType::TypeDefinition => requested,
            _ => DependType::Complete,
        }
    }

    /// Record a dependency on whatever `name` denotes
    pub fn name(&mut self, name: &QualifiedName, kind: DependType, phase: EmitPhase) {
        if self.is_local(name) {
            return;
        }
        match self.tree.resolve(self.module, name, &self.access) {
            Ok(Resolved::Item(item)) => {
                let kind = Self::kind_for(item.kind, kind);
                self.add(item.entity, kind, phase);
            }
            Ok(Resolved::Module(_)) => {}
            Err(ResolveError::NotAModule { .. }) if name.segments.len() > 1 => {
                // `Type::member`: the type itself is the dependency
                let prefix = QualifiedName {
                    relative: name.relative,
                    segments: name.prefix().to_vec(),
                    range: name.range,
                };
                self.name(&prefix, DependType::Complete, phase);
            }
            Err(_) => {
                let candidates = self.tree.guarded_candidates(self.module, name, &self.access);
                for candidate in candidates {
                    self.add(candidate, kind, phase);
                }
                let brings = self.pending_brings.clone();
                for bring in brings {
                    self.add(bring, DependType::Complete, phase);
                }
            }
        }
    }

    pub fn type_expr(&mut self, ty: &TypeExpr, kind: DependType, phase: EmitPhase) {
        match &ty.kind {
            TypeExprKind::Named(name) => self.name(name, kind, phase),
            TypeExprKind::Mark { subtype, owner, .. } => {
                self.type_expr(subtype, DependType::Partial, phase);
                if let MarkOwnerSpec::Type(owner) = owner {
                    self.type_expr(owner, DependType::Partial, phase);
                }
            }
            TypeExprKind::Reference { subtype, .. } => {
                self.type_expr(subtype, DependType::Partial, phase)
            }
            TypeExprKind::Array { element, length } => {
                self.type_expr(element, kind, phase);
                self.expr(length, phase);
            }
            TypeExprKind::Vector { element, .. } => self.type_expr(element, kind, phase),
            TypeExprKind::Tuple { members, .. } => {
                for member in members {
                    self.type_expr(member, kind, phase);
                }
            }
            TypeExprKind::Function { return_type, args, .. } => {
                self.type_expr(return_type, DependType::Partial, phase);
                for arg in args {
                    self.type_expr(arg, DependType::Partial, phase);
                }
            }
            TypeExprKind::Future { subtype, .. } => self.type_expr(subtype, kind, phase),
            TypeExprKind::Maybe(subtype) => self.type_expr(subtype, kind, phase),
            TypeExprKind::Typed(subtype) => self.type_expr(subtype, DependType::Partial, phase),
            TypeExprKind::Integer(_)
            | TypeExprKind::Unsigned(_)
            | TypeExprKind::Float(_)
            | TypeExprKind::Bool
            | TypeExprKind::Char
            | TypeExprKind::Void
            | TypeExprKind::StringSlice
            | TypeExprKind::Native(_) => {}
        }
    }

    /// Argument types; `kind` is what the signature needs from them
    pub fn args(&mut self, args: &[Argument], kind: DependType, phase: EmitPhase) {
        for arg in args {
            if let Some(ty) = &arg.ty {
                self.type_expr(ty, kind, phase);
            }
        }
    }

    pub fn declare_args(&mut self, args: &[Argument]) {
        for arg in args {
            self.declare_local(arg.name.as_str());
        }
    }

    pub fn exprs(&mut self, exprs: &[Expression], phase: EmitPhase) {
        for expr in exprs {
            self.expr(expr, phase);
        }
    }

    pub fn expr(&mut self, expr: &Expression, phase: EmitPhase) {
        let complete = DependType::Complete;
        match &expr.kind {
            ExprKind::IntegerLiteral { suffix, .. } | ExprKind::FloatLiteral { suffix, .. } => {
                if let Some(ty) = suffix {
                    self.type_expr(ty, complete, phase);
                }
            }
            ExprKind::BooleanLiteral(_)
            | ExprKind::CharLiteral(_)
            | ExprKind::StringLiteral(_)
            | ExprKind::NullPointer
            | ExprKind::Default
            | ExprKind::None
            | ExprKind::SelfInstance
            | ExprKind::SelfMember(_)
            | ExprKind::MetaTodo(_) => {}
            ExprKind::Entity(name) => self.name(name, complete, phase),
            ExprKind::Some(inner)
            | ExprKind::Dereference(inner)
            | ExprKind::Copy(inner)
            | ExprKind::Move(inner)
            | ExprKind::HeapPut(inner)
            | ExprKind::Await(inner) => self.expr(inner, phase),
            ExprKind::Unary { operand, .. } => self.expr(operand, phase),
            ExprKind::AddressOf { place, .. } => self.expr(place, phase),
            ExprKind::TupleLiteral(values) | ExprKind::ArrayLiteral(values) => {
                self.exprs(values, phase)
            }
            ExprKind::Member { instance, .. } => self.expr(instance, phase),
            ExprKind::Index { instance, index } => {
                self.expr(instance, phase);
                self.expr(index, phase);
            }
            ExprKind::Binary { lhs, rhs, .. } => {
                self.expr(lhs, phase);
                self.expr(rhs, phase);
            }
            ExprKind::Call { callee, args } => {
                self.expr(callee, phase);
                self.exprs(args, phase);
            }
            ExprKind::MethodCall { instance, args, .. } => {
                self.expr(instance, phase);
                self.exprs(args, phase);
            }
            ExprKind::ConstructorCall { ty, args } => {
                self.type_expr(ty, complete, phase);
                self.exprs(args, phase);
            }
            ExprKind::PlainInitializer { ty, values, .. } => {
                self.type_expr(ty, complete, phase);
                self.exprs(values, phase);
            }
            ExprKind::VariantInitializer { ty, value, .. } => {
                self.type_expr(ty, complete, phase);
                if let Some(value) = value {
                    self.expr(value, phase);
                }
            }
            ExprKind::HeapGet { ty, count } => {
                self.type_expr(ty, complete, phase);
                if let Some(count) = count {
                    self.expr(count, phase);
                }
            }
            ExprKind::HeapGrow { ty, pointer, count } => {
                self.type_expr(ty, complete, phase);
                self.expr(pointer, phase);
                self.expr(count, phase);
            }
            ExprKind::Cast { value, target } => {
                self.expr(value, phase);
                self.type_expr(target, complete, phase);
            }
            ExprKind::InlineAssembly { args, return_type, .. } => {
                self.exprs(args, phase);
                self.type_expr(return_type, complete, phase);
            }
            ExprKind::If {
                condition,
                then_value,
                else_value,
            } => {
                self.expr(condition, phase);
                self.expr(then_value, phase);
                self.expr(else_value, phase);
            }
            ExprKind::SizeOf(ty) => self.type_expr(ty, complete, phase),
            ExprKind::TypeValue(ty) => self.type_expr(ty, DependType::Partial, phase),
        }
    }

    pub fn sentences(&mut self, body: &[Sentence], phase: EmitPhase) {
        self.push_scope();
        for sentence in body {
            self.sentence(sentence, phase);
        }
        self.pop_scope();
    }

    pub fn sentence(&mut self, sentence: &Sentence, phase: EmitPhase) {
        match &sentence.kind {
            SentenceKind::LocalDeclaration(decl) => {
                if let Some(ty) = &decl.ty {
                    let kind = if decl.is_reference {
                        DependType::Partial
                    } else {
                        DependType::Complete
                    };
                    self.type_expr(ty, kind, phase);
                }
                if let Some(value) = &decl.value {
                    self.expr(value, phase);
                }
                self.declare_local(decl.name.as_str());
            }
            SentenceKind::Assignment { lhs, rhs }
            | SentenceKind::OperatorAssignment { lhs, rhs, .. } => {
                self.expr(lhs, phase);
                self.expr(rhs, phase);
            }
            SentenceKind::Expression(expr) => self.expr(expr, phase),
            SentenceKind::If { branches, otherwise } => {
                for branch in branches {
                    self.expr(&branch.condition, phase);
                    self.sentences(&branch.body, phase);
                }
                if let Some(otherwise) = otherwise {
                    self.sentences(otherwise, phase);
                }
            }
            SentenceKind::LoopWhile { condition, body, .. } => {
                self.expr(condition, phase);
                self.sentences(body, phase);
            }
            SentenceKind::LoopTimes { count, index, body, .. } => {
                self.expr(count, phase);
                self.push_scope();
                if let Some(index) = index {
                    self.declare_local(index.as_str());
                }
                self.sentences(body, phase);
                self.pop_scope();
            }
            SentenceKind::LoopInfinite { body, .. } => self.sentences(body, phase),
            SentenceKind::LoopIn {
                iterable,
                item,
                index,
                body,
                ..
            } => {
                self.expr(iterable, phase);
                self.push_scope();
                self.declare_local(item.as_str());
                if let Some(index) = index {
                    self.declare_local(index.as_str());
                }
                self.sentences(body, phase);
                self.pop_scope();
            }
            SentenceKind::Give(Some(value)) => self.expr(value, phase),
            SentenceKind::Block(body) => self.sentences(body, phase),
            SentenceKind::Give(None)
            | SentenceKind::Break(_)
            | SentenceKind::Continue(_)
            | SentenceKind::MetaTodo(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::LocalDeclaration;
    use crate::module::{ModItem, ModKind, VisibilityInfo};
    use crate::span::{FileId, FileRange, Identifier};

    fn ident(name: &str) -> Identifier {
        Identifier::new(name, FileRange::default())
    }

    fn named(name: &str) -> TypeExpr {
        TypeExpr::new(
            TypeExprKind::Named(QualifiedName::single(ident(name))),
            FileRange::default(),
        )
    }

    fn setup() -> (ModuleTree, ModId) {
        let mut tree = ModuleTree::new();
        let file = tree.add_module(ident("app"), ModKind::File, None, FileId(0), None);
        for (i, (name, kind)) in [("Point", EntityType::Struct), ("helper", EntityType::Function)]
            .into_iter()
            .enumerate()
        {
            tree.add_item(
                file,
                ModItem {
                    name: ident(name),
                    entity: EntityId(i as u32),
                    kind,
                    visibility: VisibilityInfo::public(),
                },
            )
            .unwrap();
        }
        (tree, file)
    }

    #[test]
    fn test_pointer_needs_only_skeleton() {
        let (tree, file) = setup();
        let mut collector = DependencyCollector::new(&tree, file, AccessInfo::new(file));
        let mark = TypeExpr::new(
            TypeExprKind::Mark {
                subtype: Box::new(named("Point")),
                is_variable: false,
                owner: MarkOwnerSpec::Anonymous,
                is_nullable: false,
                is_slice: false,
            },
            FileRange::default(),
        );
        collector.type_expr(&mark, DependType::Complete, EmitPhase::Phase2);
        collector.type_expr(&named("Point"), DependType::Complete, EmitPhase::Phase2);
        let deps = collector.into_dependencies();
        assert_eq!(deps[0].kind, DependType::Partial);
        assert_eq!(deps[1].kind, DependType::Complete);
    }

    #[test]
    fn test_function_reference_is_partial_and_locals_are_skipped() {
        let (tree, file) = setup();
        let mut collector = DependencyCollector::new(&tree, file, AccessInfo::new(file));
        let body = vec![
            Sentence::new(
                SentenceKind::LocalDeclaration(LocalDeclaration {
                    name: ident("helper"),
                    ty: None,
                    value: Some(Expression::new(
                        ExprKind::Entity(QualifiedName::single(ident("helper"))),
                        FileRange::default(),
                    )),
                    is_variable: false,
                    is_reference: false,
                }),
                FileRange::default(),
            ),
            Sentence::new(
                SentenceKind::Expression(Expression::new(
                    ExprKind::Entity(QualifiedName::single(ident("helper"))),
                    FileRange::default(),
                )),
                FileRange::default(),
            ),
        ];
        collector.sentences(&body, EmitPhase::Phase3);
        let deps = collector.into_dependencies();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].entity, EntityId(1));
        assert_eq!(deps[0].kind, DependType::Partial);
    }

    #[test]
    fn test_unknown_name_waits_for_pending_brings() {
        let (tree, file) = setup();
        let mut collector =
            DependencyCollector::new(&tree, file, AccessInfo::new(file))
                .with_pending_brings(vec![EntityId(9)]);
        collector.type_expr(&named("Unknown"), DependType::Complete, EmitPhase::Phase1);
        let deps = collector.into_dependencies();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].entity, EntityId(9));
    }
}
