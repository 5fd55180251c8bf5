//! Choice types
//!
//! Variants without an explicit value continue counting from the previous
//! variant; the first one starts at zero. Without an explicit underlying
//! type the smallest integer holding every value is used: unsigned when no
//! value is negative, signed otherwise.

use tracing::debug;

use crate::ast::ChoiceDecl;
use crate::ctx::EmitCtx;
use crate::diagnostic::Diagnostic;
use crate::entity::{DependType, DependencyCollector, EmitPhase, EntityId};
use crate::error::{codes, CompileError, CompileResult};
use crate::lower::{Lowerer, Symbol};
use crate::prerun::eval::int_fits;
use crate::types::{ChoiceDef, ChoiceVariant, IntInfo};

pub(super) fn dependencies(collector: &mut DependencyCollector<'_>, decl: &ChoiceDecl) {
    if let Some(underlying) = &decl.underlying {
        collector.type_expr(underlying, DependType::Complete, EmitPhase::Phase1);
    }
    for variant in &decl.variants {
        if let Some(value) = &variant.value {
            collector.expr(value, EmitPhase::Phase1);
        }
    }
}

/// Values of every variant, given the explicit ones
fn number_variants(explicit: &[Option<i128>]) -> Vec<i128> {
    let mut next = 0i128;
    explicit
        .iter()
        .map(|value| {
            let value = value.unwrap_or(next);
            next = value.saturating_add(1);
            value
        })
        .collect()
}

/// First pair of variants sharing a value, as (earlier, later)
fn first_duplicate(values: &[i128]) -> Option<(usize, usize)> {
    values.iter().enumerate().find_map(|(later, value)| {
        values[..later]
            .iter()
            .position(|v| v == value)
            .map(|earlier| (earlier, later))
    })
}

/// Smallest integer shape that can hold every value
fn smallest_int(values: &[i128]) -> IntInfo {
    let is_signed = values.iter().any(|v| *v < 0);
    let mut info = IntInfo { bits: 1, is_signed };
    while info.bits < 128 && !values.iter().all(|v| int_fits(*v, info)) {
        info.bits += 1;
    }
    info
}

impl<'a> Lowerer<'a> {
    pub(super) fn choice_type(
        &mut self,
        ctx: &EmitCtx,
        id: EntityId,
        decl: &ChoiceDecl,
    ) -> CompileResult<()> {
        let underlying = match &decl.underlying {
            Some(ty) => {
                let ty_id = self.resolve_type(ctx, ty)?;
                let info = self.types.int_info(ty_id).ok_or_else(|| {
                    CompileError::at(
                        codes::TYPE_MISMATCH,
                        format!(
                            "The underlying type of a choice type must be an integer, not `{}`",
                            self.type_name(ty_id)
                        ),
                        ty.range,
                    )
                })?;
                Some((ty_id, info))
            }
            None => None,
        };

        let mut explicit = Vec::with_capacity(decl.variants.len());
        for variant in &decl.variants {
            let value = match &variant.value {
                Some(expr) => {
                    let value = self.prerun_expr(ctx, expr, underlying.map(|(ty, _)| ty))?;
                    let int = value
                        .as_int()
                        .filter(|_| self.types.is_integral(value.ty))
                        .ok_or_else(|| {
                            CompileError::at(
                                codes::TYPE_MISMATCH,
                                format!(
                                    "The value of variant `{}` must be an integer, but it is of type `{}`",
                                    variant.name,
                                    self.type_name(value.ty)
                                ),
                                expr.range,
                            )
                        })?;
                    Some(int)
                }
                None => None,
            };
            explicit.push(value);
        }
        super::check_unique(decl.variants.iter().map(|v| &v.name), "Variant")?;
        let values = number_variants(&explicit);

        if let Some((earlier, later)) = first_duplicate(&values) {
            let first = &decl.variants[earlier].name;
            let second = &decl.variants[later].name;
            return Err(Diagnostic::error(format!(
                "Variants `{}` and `{}` of choice type `{}` both have the value {}",
                first, second, decl.name, values[later]
            ))
            .with_code(codes::DUPLICATE_VARIANT)
            .with_primary_label(second.range, "")
            .with_secondary_label(first.range, "the first variant with this value")
            .into());
        }

        let underlying = match underlying {
            Some((ty, info)) => {
                let overflow = values.iter().position(|v| !int_fits(*v, info));
                if let Some(index) = overflow {
                    let variant = &decl.variants[index];
                    let range = variant.value.as_ref().map_or(variant.name.range, |v| v.range);
                    return Err(CompileError::at(
                        codes::BITWIDTH_MISMATCH,
                        format!(
                            "The value {} of variant `{}` does not fit in the underlying type `{}`",
                            values[index],
                            variant.name,
                            self.type_name(ty)
                        ),
                        range,
                    ));
                }
                ty
            }
            None => {
                let info = smallest_int(&values);
                if info.is_signed {
                    self.types.integer(info.bits)
                } else {
                    self.types.unsigned(info.bits)
                }
            }
        };

        let default_variant = match &decl.default_variant {
            Some(name) => Some(
                decl.variants
                    .iter()
                    .position(|v| v.name.value == name.value)
                    .ok_or_else(|| {
                        CompileError::at(
                            codes::INVALID_VARIANT,
                            format!("Choice type `{}` has no variant named `{}`", decl.name, name),
                            name.range,
                        )
                    })?,
            ),
            None => None,
        };

        let variants = decl
            .variants
            .iter()
            .zip(&values)
            .map(|(variant, value)| ChoiceVariant {
                name: variant.name.clone(),
                value: *value,
            })
            .collect();
        let ty = self.types.create_choice(ChoiceDef {
            name: decl.name.clone(),
            full_name: self.modules.full_name_of(ctx.module, decl.name.as_str()),
            module: ctx.module,
            visibility: self.modules.visibility_for(decl.visibility, ctx.module, None),
            variants,
            underlying,
            default_variant,
        });
        self.symbols.insert(id, Symbol::Type(ty));
        debug!(
            ty = %decl.name,
            underlying = %self.type_name(underlying),
            ?values,
            "choice type created"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbering_continues_after_explicit_value() {
        assert_eq!(number_variants(&[None, Some(10), None]), vec![0, 10, 11]);
        assert_eq!(number_variants(&[Some(-2), None, None]), vec![-2, -1, 0]);
        assert!(number_variants(&[]).is_empty());
    }

    #[test]
    fn test_duplicate_values_are_found() {
        assert_eq!(first_duplicate(&[0, 10, 11]), None);
        assert_eq!(first_duplicate(&[0, 11, 10, 11]), Some((1, 3)));
        // `A, B := 0` numbers both variants as zero
        assert_eq!(first_duplicate(&number_variants(&[None, Some(0)])), Some((0, 1)));
    }

    #[test]
    fn test_smallest_underlying_type() {
        let info = smallest_int(&[0, 1, 2]);
        assert_eq!((info.bits, info.is_signed), (2, false));
        let info = smallest_int(&[0, 10, 11]);
        assert_eq!((info.bits, info.is_signed), (4, false));
        let info = smallest_int(&[-1, 0]);
        assert_eq!((info.bits, info.is_signed), (1, true));
        let info = smallest_int(&[-3, 5]);
        assert_eq!((info.bits, info.is_signed), (4, true));
        let info = smallest_int(&[]);
        assert_eq!((info.bits, info.is_signed), (1, false));
    }
}
