//! Type expressions and name lookup

use crate::ast::{MarkOwnerSpec, QualifiedName, TypeExpr, TypeExprKind};
use crate::ctx::EmitCtx;
use crate::diagnostic::Diagnostic;
use crate::error::{codes, CompileError, CompileResult};
use crate::module::{ResolveError, Resolved};
use crate::prerun::ConstData;
use crate::span::{FileRange, Identifier};
use crate::types::{MarkOwner, MarkType, TypeContext, TypeId};

use super::{Lowerer, Symbol};

impl<'a> Lowerer<'a> {
    /// Look a name up from the current module with the context's access rights
    pub fn resolve_name(
        &self,
        ctx: &EmitCtx,
        name: &QualifiedName,
    ) -> Result<Resolved, ResolveError> {
        self.modules.resolve(ctx.module, name, &ctx.access())
    }

    pub fn resolve_type(&mut self, ctx: &EmitCtx, ty: &TypeExpr) -> CompileResult<TypeId> {
        Ok(match &ty.kind {
            TypeExprKind::Integer(bits) => self.types.integer(*bits),
            TypeExprKind::Unsigned(bits) => self.types.unsigned(*bits),
            TypeExprKind::Float(kind) => self.types.float(*kind),
            TypeExprKind::Bool => TypeContext::BOOL,
            TypeExprKind::Char => TypeContext::CHAR,
            TypeExprKind::Void => TypeContext::VOID,
            TypeExprKind::StringSlice => TypeContext::STR,
            TypeExprKind::Native(kind) => self.types.native(*kind),
            TypeExprKind::Named(name) => self.resolve_named_type(ctx, name)?,
            TypeExprKind::Mark {
                subtype,
                is_variable,
                owner,
                is_nullable,
                is_slice,
            } => {
                let subtype = self.resolve_type(ctx, subtype)?;
                let owner = match owner {
                    MarkOwnerSpec::Anonymous => MarkOwner::Anonymous,
                    MarkOwnerSpec::Heap => MarkOwner::Heap,
                    MarkOwnerSpec::Type(owner) => MarkOwner::Type(self.resolve_type(ctx, owner)?),
                };
                self.types.mark(MarkType {
                    subtype,
                    owner,
                    is_nullable: *is_nullable,
                    is_slice: *is_slice,
                    is_subtype_variable: *is_variable,
                })
            }
            TypeExprKind::Reference { subtype, is_variable } => {
                let subtype = self.resolve_type(ctx, subtype)?;
                if self.types.is_reference(subtype) || subtype == TypeContext::VOID {
                    return Err(CompileError::at(
                        codes::TYPE_MISMATCH,
                        format!("Cannot create a reference to `{}`", self.type_name(subtype)),
                        ty.range,
                    ));
                }
                self.types.reference(subtype, *is_variable)
            }
            TypeExprKind::Array { element, length } => {
                let element = self.resolve_type(ctx, element)?;
                let length_value = self.prerun_expr(ctx, length, Some(TypeContext::USIZE))?;
                let length = length_value
                    .as_int()
                    .filter(|_| self.types.is_integral(length_value.ty))
                    .and_then(|l| u64::try_from(l).ok())
                    .ok_or_else(|| {
                        CompileError::at(
                            codes::TYPE_MISMATCH,
                            "The length of an array type must be a non-negative integer",
                            length.range,
                        )
                    })?;
                self.types.array(element, length)
            }
            TypeExprKind::Vector {
                element,
                count,
                is_scalable,
            } => {
                let element = self.resolve_type(ctx, element)?;
                if !self.types.is_numeric(element) && element != TypeContext::BOOL {
                    return Err(CompileError::at(
                        codes::TYPE_MISMATCH,
                        format!(
                            "Vector elements must be numbers or booleans, not `{}`",
                            self.type_name(element)
                        ),
                        ty.range,
                    ));
                }
                self.types.vector(element, *count, *is_scalable)
            }
            TypeExprKind::Tuple { members, is_packed } => {
                let mut resolved = Vec::with_capacity(members.len());
                for member in members {
                    resolved.push(self.resolve_type(ctx, member)?);
                }
                self.types.tuple(resolved, *is_packed)
            }
            TypeExprKind::Function {
                return_type,
                args,
                is_variadic,
            } => {
                let return_type = self.resolve_type(ctx, return_type)?;
                let mut resolved = Vec::with_capacity(args.len());
                for arg in args {
                    resolved.push(self.resolve_type(ctx, arg)?);
                }
                self.types.function(return_type, resolved, *is_variadic)
            }
            TypeExprKind::Future { subtype, is_packed } => {
                let subtype = self.resolve_type(ctx, subtype)?;
                self.types.future(subtype, *is_packed)
            }
            TypeExprKind::Maybe(subtype) => {
                let subtype = self.resolve_type(ctx, subtype)?;
                self.types.maybe(subtype)
            }
            TypeExprKind::Typed(subtype) => {
                let subtype = self.resolve_type(ctx, subtype)?;
                self.types.typed(subtype)
            }
        })
    }

    /// A named type: a type entity, or a compile-time value holding a type
    fn resolve_named_type(&mut self, ctx: &EmitCtx, name: &QualifiedName) -> CompileResult<TypeId> {
        let not_a_type = || {
            CompileError::at(
                codes::TYPE_MISMATCH,
                format!("`{}` is not a type", name),
                name.range,
            )
        };
        if name.is_single() {
            if let Some(frame) = self.prerun_frames.last() {
                if let Some(local) = name.last().and_then(|n| frame.get(n.as_str())) {
                    return local.value.as_type().ok_or_else(not_a_type);
                }
            }
        }
        match self.resolve_name(ctx, name)? {
            Resolved::Item(item) => match self.symbol(item.entity, name.range)? {
                Symbol::Type(ty) => Ok(*ty),
                Symbol::PrerunGlobal(value) => match value.data {
                    ConstData::Type(ty) => Ok(ty),
                    _ => Err(not_a_type()),
                },
                _ => Err(not_a_type()),
            },
            Resolved::Module(_) => Err(not_a_type()),
        }
    }

    /// Split `Type::member` into the type and the member name
    pub fn split_type_member<'n>(
        &mut self,
        ctx: &EmitCtx,
        name: &'n QualifiedName,
    ) -> CompileResult<(TypeId, &'n Identifier)> {
        let (member, prefix) = name
            .segments
            .split_last()
            .ok_or_else(|| CompileError::internal("empty qualified name"))?;
        let prefix = QualifiedName {
            relative: name.relative,
            segments: prefix.to_vec(),
            range: name.range,
        };
        let ty = self.resolve_named_type(ctx, &prefix)?;
        Ok((ty, member))
    }

    pub fn require_sized(&self, ty: TypeId, range: FileRange) -> CompileResult<()> {
        if self.types.is_type_sized(ty) {
            Ok(())
        } else {
            Err(CompileError::at(
                codes::NOT_SIZED,
                format!("Type `{}` is not sized and cannot be used here", self.type_name(ty)),
                range,
            ))
        }
    }

    /// Field index for each value of a plain initializer, in value order
    ///
    /// Every field of the type must receive exactly one value.
    pub fn plain_field_order(
        &self,
        ctx: &EmitCtx,
        ty: TypeId,
        names: Option<&[Identifier]>,
        count: usize,
        range: FileRange,
    ) -> CompileResult<Vec<usize>> {
        let def = self.types.struct_of(ty).ok_or_else(|| {
            CompileError::at(
                codes::TYPE_MISMATCH,
                format!(
                    "Plain initialization needs an expanded type, but `{}` is not one",
                    self.type_name(ty)
                ),
                range,
            )
        })?;
        if !def.is_complete() {
            return Err(CompileError::at(
                codes::NOT_SIZED,
                format!("The fields of `{}` are not known yet", def.full_name),
                range,
            ));
        }
        let fields = def.fields();

        let order: Vec<usize> = match names {
            None => {
                if count != fields.len() {
                    return Err(CompileError::at(
                        codes::ARGUMENT_COUNT,
                        format!(
                            "Type `{}` has {} fields, but {} values were provided",
                            def.full_name,
                            fields.len(),
                            count
                        ),
                        range,
                    ));
                }
                (0..count).collect()
            }
            Some(names) => {
                let mut order = Vec::with_capacity(names.len());
                for (position, name) in names.iter().enumerate() {
                    let (index, _) = def.field(name.as_str()).ok_or_else(|| {
                        CompileError::at(
                            codes::NO_MEMBER,
                            format!("Type `{}` has no field named `{}`", def.full_name, name),
                            name.range,
                        )
                    })?;
                    let previous = names[..position].iter().find(|n| n.value == name.value);
                    if let Some(previous) = previous {
                        return Err(Diagnostic::error(format!(
                            "Field `{}` is given a value more than once",
                            name
                        ))
                        .with_code(codes::DUPLICATE_FIELD)
                        .with_primary_label(name.range, "")
                        .with_secondary_label(previous.range, "the first value was given here")
                        .into());
                    }
                    order.push(index);
                }
                if let Some(missing) = fields.iter().enumerate().find(|(i, _)| !order.contains(i)) {
                    return Err(CompileError::at(
                        codes::MISSING_VALUE,
                        format!(
                            "Field `{}` of `{}` is not given a value",
                            missing.1.name, def.full_name
                        ),
                        range,
                    ));
                }
                order
            }
        };

        let access = ctx.access();
        for index in &order {
            let field = &fields[*index];
            if !self.modules.is_accessible(&field.visibility, &access) {
                return Err(CompileError::at(
                    codes::NOT_ACCESSIBLE,
                    format!("Field `{}` of `{}` is not accessible here", field.name, def.full_name),
                    range,
                ));
            }
        }
        Ok(order)
    }
}
