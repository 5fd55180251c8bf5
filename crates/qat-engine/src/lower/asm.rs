//! Inline assembly

use crate::ast::{Expression, TypeExpr};
use crate::ctx::EmitCtx;
use crate::error::{codes, CompileError, CompileResult};
use crate::ir::IrInstr;
use crate::span::FileRange;
use crate::types::TypeContext;
use crate::value::Value;

use super::{Expect, Lowerer};

/// Input and output constraint counts, clobbers excluded
fn count_constraints(constraints: &str) -> (usize, usize) {
    constraints
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty() && !c.starts_with('~'))
        .fold((0, 0), |(inputs, outputs), c| {
            if c.starts_with('=') {
                (inputs, outputs + 1)
            } else {
                (inputs + 1, outputs)
            }
        })
}

impl<'a> Lowerer<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn lower_inline_asm(
        &mut self,
        ctx: &EmitCtx,
        template: &str,
        constraints: &str,
        args: &[Expression],
        return_type: &TypeExpr,
        is_volatile: bool,
        range: FileRange,
    ) -> CompileResult<Value> {
        let return_type = self.resolve_type(ctx, return_type)?;
        let (inputs, outputs) = count_constraints(constraints);
        if inputs != args.len() {
            return Err(CompileError::at(
                codes::ARGUMENT_COUNT,
                format!(
                    "The constraints of this assembly name {} inputs, but {} arguments were provided",
                    inputs,
                    args.len()
                ),
                range,
            ));
        }
        if return_type != TypeContext::VOID && outputs == 0 {
            return Err(CompileError::at(
                codes::INVALID_EXPRESSION,
                format!(
                    "Assembly giving a value of type `{}` needs an output constraint",
                    self.type_name(return_type)
                ),
                range,
            ));
        }

        let mut operands = Vec::with_capacity(args.len());
        for arg in args {
            let value = self.lower_rvalue(ctx, arg, Expect::none())?;
            self.require_sized(value.ty, arg.range)?;
            operands.push(value.ir);
        }

        let dest = if return_type == TypeContext::VOID {
            None
        } else {
            Some(self.fresh_register(return_type)?)
        };
        self.emit(IrInstr::InlineAsm {
            dest,
            template: template.to_string(),
            constraints: constraints.to_string(),
            args: operands,
            is_volatile,
        })?;
        Ok(match dest {
            Some(dest) => Value::temporary(dest, return_type, range),
            None => Self::void_value(range),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::count_constraints;

    #[test]
    fn test_count_constraints() {
        assert_eq!(count_constraints("=r,r,r,~{memory}"), (2, 1));
        assert_eq!(count_constraints(""), (0, 0));
        assert_eq!(count_constraints("r, i"), (2, 0));
    }
}
