//! Constant folding of operators and casts over prerun values
//!
//! Integer results wrap to the bit width of their type, so folding agrees
//! with what the emitted code would compute at runtime.

use thiserror::Error;

use super::value::{ConstData, PrerunValue};
use crate::ast::{BinaryOperator, UnaryOperator};
use crate::types::{FloatKind, IntInfo, Type, TypeContext, TypeId};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FoldError {
    #[error("Division by zero in a compile-time expression")]
    DivisionByZero,

    #[error("Shift by {amount} is out of range for a value of {bits} bits")]
    ShiftOutOfRange { amount: i128, bits: u32 },

    #[error("Operator `{op}` is not supported for compile-time values of type `{ty}`")]
    Unsupported { op: String, ty: String },

    #[error("Compile-time value of type `{from}` cannot be converted to `{to}`")]
    InvalidCast { from: String, to: String },
}

/// Wrap `value` to the width and signedness of `info`
pub fn wrap_int(value: i128, info: IntInfo) -> i128 {
    if info.bits >= 128 {
        return value;
    }
    let mask = (1u128 << info.bits) - 1;
    let bits = (value as u128) & mask;
    let sign_bit = 1u128 << (info.bits - 1);
    if info.is_signed && bits & sign_bit != 0 {
        (bits | !mask) as i128
    } else {
        bits as i128
    }
}

/// Integer shape of a type including choice types and `char`
fn int_shape(types: &TypeContext, ty: TypeId) -> Option<IntInfo> {
    match types.get(ty) {
        Type::Choice(id) => types.int_info(types.choice_def(*id).underlying),
        Type::Char => Some(IntInfo {
            bits: 32,
            is_signed: false,
        }),
        _ => types.int_info(ty),
    }
}

fn round_float(kind: Option<FloatKind>, value: f64) -> f64 {
    match kind {
        Some(FloatKind::F32 | FloatKind::Half | FloatKind::Brain) => value as f32 as f64,
        _ => value,
    }
}

fn unsupported(types: &TypeContext, op: impl ToString, ty: TypeId) -> FoldError {
    FoldError::Unsupported {
        op: op.to_string(),
        ty: types.type_name(ty),
    }
}

fn compare<T: PartialOrd>(op: BinaryOperator, lhs: T, rhs: T) -> Option<bool> {
    Some(match op {
        BinaryOperator::Eq => lhs == rhs,
        BinaryOperator::NotEq => lhs != rhs,
        BinaryOperator::Lt => lhs < rhs,
        BinaryOperator::LtEq => lhs <= rhs,
        BinaryOperator::Gt => lhs > rhs,
        BinaryOperator::GtEq => lhs >= rhs,
        _ => return None,
    })
}

pub fn fold_binary(
    types: &TypeContext,
    op: BinaryOperator,
    lhs: &PrerunValue,
    rhs: &PrerunValue,
) -> Result<PrerunValue, FoldError> {
    match (&lhs.data, &rhs.data) {
        (ConstData::Int(a), ConstData::Int(b)) => fold_int(types, op, lhs.ty, *a, *b),
        (ConstData::Float(a), ConstData::Float(b)) => {
            if op.is_comparison() {
                return compare(op, a, b)
                    .map(|r| PrerunValue::bool(TypeContext::BOOL, r))
                    .ok_or_else(|| unsupported(types, op, lhs.ty));
            }
            let result = match op {
                BinaryOperator::Add => a + b,
                BinaryOperator::Sub => a - b,
                BinaryOperator::Mul => a * b,
                BinaryOperator::Div => a / b,
                BinaryOperator::Rem => a % b,
                _ => return Err(unsupported(types, op, lhs.ty)),
            };
            let kind = types.float_kind(lhs.ty);
            Ok(PrerunValue::new(ConstData::Float(round_float(kind, result)), lhs.ty))
        }
        (ConstData::Bool(a), ConstData::Bool(b)) => {
            let result = match op {
                BinaryOperator::Eq => a == b,
                BinaryOperator::NotEq => a != b,
                BinaryOperator::And | BinaryOperator::BitAnd => *a && *b,
                BinaryOperator::Or | BinaryOperator::BitOr => *a || *b,
                BinaryOperator::BitXor => a != b,
                _ => return Err(unsupported(types, op, lhs.ty)),
            };
            Ok(PrerunValue::bool(TypeContext::BOOL, result))
        }
        (ConstData::Char(a), ConstData::Char(b)) => compare(op, a, b)
            .map(|r| PrerunValue::bool(TypeContext::BOOL, r))
            .ok_or_else(|| unsupported(types, op, lhs.ty)),
        (ConstData::Str(a), ConstData::Str(b)) => match op {
            BinaryOperator::Eq => Ok(PrerunValue::bool(TypeContext::BOOL, a == b)),
            BinaryOperator::NotEq => Ok(PrerunValue::bool(TypeContext::BOOL, a != b)),
            _ => Err(unsupported(types, op, lhs.ty)),
        },
        (ConstData::Type(a), ConstData::Type(b)) => match op {
            BinaryOperator::Eq => Ok(PrerunValue::bool(TypeContext::BOOL, a == b)),
            BinaryOperator::NotEq => Ok(PrerunValue::bool(TypeContext::BOOL, a != b)),
            _ => Err(unsupported(types, op, lhs.ty)),
        },
        _ if op.is_equality() && lhs.ty == rhs.ty => {
            let equal = lhs.data == rhs.data;
            let result = if op == BinaryOperator::Eq { equal } else { !equal };
            Ok(PrerunValue::bool(TypeContext::BOOL, result))
        }
        _ => Err(unsupported(types, op, lhs.ty)),
    }
}

fn fold_int(
    types: &TypeContext,
    op: BinaryOperator,
    ty: TypeId,
    a: i128,
    b: i128,
) -> Result<PrerunValue, FoldError> {
    if let Some(result) = compare(op, a, b) {
        return Ok(PrerunValue::bool(TypeContext::BOOL, result));
    }
    let info = int_shape(types, ty).ok_or_else(|| unsupported(types, op, ty))?;
    // Bitwise operations on a choice value give its underlying integer
    let result_ty = match types.get(ty) {
        Type::Choice(id) => types.choice_def(*id).underlying,
        _ => ty,
    };
    let raw = match op {
        BinaryOperator::Add => a.wrapping_add(b),
        BinaryOperator::Sub => a.wrapping_sub(b),
        BinaryOperator::Mul => a.wrapping_mul(b),
        BinaryOperator::Div => {
            if b == 0 {
                return Err(FoldError::DivisionByZero);
            }
            a.wrapping_div(b)
        }
        BinaryOperator::Rem => {
            if b == 0 {
                return Err(FoldError::DivisionByZero);
            }
            a.wrapping_rem(b)
        }
        BinaryOperator::BitAnd => a & b,
        BinaryOperator::BitOr => a | b,
        BinaryOperator::BitXor => a ^ b,
        BinaryOperator::Shl | BinaryOperator::Shr => {
            if b < 0 || b >= i128::from(info.bits) {
                return Err(FoldError::ShiftOutOfRange {
                    amount: b,
                    bits: info.bits,
                });
            }
            if op == BinaryOperator::Shl {
                a.wrapping_shl(b as u32)
            } else {
                // Unsigned values are stored non-negative, so this is a logical shift for them
                a >> b
            }
        }
        _ => return Err(unsupported(types, op, ty)),
    };
    Ok(PrerunValue::int(result_ty, wrap_int(raw, info)))
}

pub fn fold_unary(
    types: &TypeContext,
    op: UnaryOperator,
    operand: &PrerunValue,
) -> Result<PrerunValue, FoldError> {
    match (&operand.data, op) {
        (ConstData::Int(v), UnaryOperator::Negate) => {
            let info = types
                .int_info(operand.ty)
                .ok_or_else(|| unsupported(types, op, operand.ty))?;
            Ok(PrerunValue::int(operand.ty, wrap_int(v.wrapping_neg(), info)))
        }
        (ConstData::Int(v), UnaryOperator::BitNot) => {
            let info = types
                .int_info(operand.ty)
                .ok_or_else(|| unsupported(types, op, operand.ty))?;
            Ok(PrerunValue::int(operand.ty, wrap_int(!v, info)))
        }
        (ConstData::Float(v), UnaryOperator::Negate) => {
            Ok(PrerunValue::new(ConstData::Float(-v), operand.ty))
        }
        (ConstData::Bool(b), UnaryOperator::Not) => Ok(PrerunValue::bool(operand.ty, !b)),
        _ => Err(unsupported(types, op, operand.ty)),
    }
}

/// Convert a prerun value to `target`
pub fn fold_cast(
    types: &TypeContext,
    value: &PrerunValue,
    target: TypeId,
) -> Result<PrerunValue, FoldError> {
    if value.ty == target {
        return Ok(value.clone());
    }
    let invalid = || FoldError::InvalidCast {
        from: types.type_name(value.ty),
        to: types.type_name(target),
    };

    if let Type::Choice(id) = types.get(target) {
        let def = types.choice_def(*id);
        let raw = value.data.as_int().ok_or_else(invalid)?;
        return def
            .variants
            .iter()
            .find(|v| v.value == raw)
            .map(|_| PrerunValue::int(target, raw))
            .ok_or_else(invalid);
    }

    if let Some(info) = types.int_info(target) {
        let raw = match &value.data {
            ConstData::Int(v) => *v,
            ConstData::Bool(b) => i128::from(*b),
            ConstData::Char(c) => i128::from(u32::from(*c)),
            ConstData::Float(f) => *f as i128,
            _ => return Err(invalid()),
        };
        return Ok(PrerunValue::int(target, wrap_int(raw, info)));
    }

    if let Some(kind) = types.float_kind(target) {
        let raw = match &value.data {
            ConstData::Int(v) => *v as f64,
            ConstData::Float(f) => *f,
            _ => return Err(invalid()),
        };
        return Ok(PrerunValue::new(ConstData::Float(round_float(Some(kind), raw)), target));
    }

    match (types.get(target), &value.data) {
        (Type::Char, ConstData::Int(v)) => u32::try_from(*v)
            .ok()
            .and_then(char::from_u32)
            .map(|c| PrerunValue::new(ConstData::Char(c), target))
            .ok_or_else(invalid),
        (Type::Bool, ConstData::Int(v)) if types.choice_of(value.ty).is_none() => {
            Ok(PrerunValue::bool(target, *v != 0))
        }
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(types: &mut TypeContext, bits: u32, value: i128) -> PrerunValue {
        let ty = types.integer(bits);
        PrerunValue::int(ty, value)
    }

    #[test]
    fn test_wrap_int() {
        let i8_info = IntInfo { bits: 8, is_signed: true };
        let u8_info = IntInfo { bits: 8, is_signed: false };
        assert_eq!(wrap_int(127 + 1, i8_info), -128);
        assert_eq!(wrap_int(-1, u8_info), 255);
        assert_eq!(wrap_int(256, u8_info), 0);
        assert_eq!(wrap_int(-5, i8_info), -5);
    }

    #[test]
    fn test_integer_arithmetic_wraps() {
        let mut types = TypeContext::new();
        let a = int(&mut types, 8, 100);
        let b = int(&mut types, 8, 100);
        let sum = fold_binary(&types, BinaryOperator::Add, &a, &b).unwrap();
        assert_eq!(sum.as_int(), Some(-56));
        assert_eq!(sum.ty, types.integer(8));
    }

    #[test]
    fn test_division_by_zero() {
        let mut types = TypeContext::new();
        let a = int(&mut types, 32, 1);
        let zero = int(&mut types, 32, 0);
        assert_eq!(
            fold_binary(&types, BinaryOperator::Div, &a, &zero),
            Err(FoldError::DivisionByZero)
        );
    }

    #[test]
    fn test_comparisons_give_bool() {
        let mut types = TypeContext::new();
        let a = int(&mut types, 32, 3);
        let b = int(&mut types, 32, 4);
        let lt = fold_binary(&types, BinaryOperator::Lt, &a, &b).unwrap();
        assert_eq!(lt, PrerunValue::bool(TypeContext::BOOL, true));
    }

    #[test]
    fn test_string_equality() {
        let types = TypeContext::new();
        let a = PrerunValue::new(ConstData::Str("abc".into()), TypeContext::STR);
        let b = PrerunValue::new(ConstData::Str("abc".into()), TypeContext::STR);
        let c = PrerunValue::new(ConstData::Str("abd".into()), TypeContext::STR);
        assert_eq!(
            fold_binary(&types, BinaryOperator::Eq, &a, &b).unwrap().as_bool(),
            Some(true)
        );
        assert_eq!(
            fold_binary(&types, BinaryOperator::Eq, &a, &c).unwrap().as_bool(),
            Some(false)
        );
        assert!(fold_binary(&types, BinaryOperator::Add, &a, &b).is_err());
    }

    #[test]
    fn test_shift_out_of_range() {
        let mut types = TypeContext::new();
        let a = int(&mut types, 8, 1);
        let b = int(&mut types, 8, 8);
        assert!(matches!(
            fold_binary(&types, BinaryOperator::Shl, &a, &b),
            Err(FoldError::ShiftOutOfRange { bits: 8, .. })
        ));
    }

    #[test]
    fn test_unary() {
        let mut types = TypeContext::new();
        let a = int(&mut types, 32, 5);
        assert_eq!(fold_unary(&types, UnaryOperator::Negate, &a).unwrap().as_int(), Some(-5));
        assert_eq!(fold_unary(&types, UnaryOperator::BitNot, &a).unwrap().as_int(), Some(-6));
        let t = PrerunValue::bool(TypeContext::BOOL, true);
        assert_eq!(fold_unary(&types, UnaryOperator::Not, &t).unwrap().as_bool(), Some(false));
        assert!(fold_unary(&types, UnaryOperator::Not, &a).is_err());
    }

    #[test]
    fn test_casts() {
        let mut types = TypeContext::new();
        let u8_ty = types.unsigned(8);
        let big = int(&mut types, 32, 300);
        assert_eq!(fold_cast(&types, &big, u8_ty).unwrap().as_int(), Some(44));

        let as_float = fold_cast(&types, &big, TypeContext::F64).unwrap();
        assert_eq!(as_float.data, ConstData::Float(300.0));

        let s = PrerunValue::new(ConstData::Str("x".into()), TypeContext::STR);
        assert!(matches!(
            fold_cast(&types, &s, u8_ty),
            Err(FoldError::InvalidCast { .. })
        ));
    }
}
