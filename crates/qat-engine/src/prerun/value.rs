//! Compile-time values

use std::fmt;

use crate::types::TypeId;

/// Payload of a value known at compile time
#[derive(Debug, Clone, PartialEq)]
pub enum ConstData {
    /// Integers and choice values, wrapped to the width of their type.
    /// Unsigned values are stored non-negative.
    Int(i128),
    Float(f64),
    Bool(bool),
    Char(char),
    Str(String),
    Array(Vec<ConstData>),
    Tuple(Vec<ConstData>),
    /// Field values of an expanded type, in declaration order
    Struct(Vec<ConstData>),
    Mix {
        variant: usize,
        payload: Option<Box<ConstData>>,
    },
    Maybe(Option<Box<ConstData>>),
    Type(TypeId),
    Null,
    Void,
}

impl ConstData {
    pub fn as_int(&self) -> Option<i128> {
        match self {
            ConstData::Int(v) => Some(*v),
            ConstData::Char(c) => Some(*c as i128),
            ConstData::Bool(b) => Some(*b as i128),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConstData::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            ConstData::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConstData::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ConstData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(
            f: &mut fmt::Formatter<'_>,
            open: &str,
            close: &str,
            items: &[ConstData],
        ) -> fmt::Result {
            f.write_str(open)?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", item)?;
            }
            f.write_str(close)
        }
        match self {
            ConstData::Int(v) => write!(f, "{}", v),
            ConstData::Float(v) => write!(f, "{:?}", v),
            ConstData::Bool(b) => write!(f, "{}", b),
            ConstData::Char(c) => write!(f, "'{}'", c),
            ConstData::Str(s) => write!(f, "{:?}", s),
            ConstData::Array(items) => list(f, "[", "]", items),
            ConstData::Tuple(items) => list(f, "(", ")", items),
            ConstData::Struct(items) => list(f, "{", "}", items),
            ConstData::Mix { variant, payload } => match payload {
                Some(payload) => write!(f, "variant{}({})", variant, payload),
                None => write!(f, "variant{}", variant),
            },
            ConstData::Maybe(Some(inner)) => write!(f, "some({})", inner),
            ConstData::Maybe(None) => write!(f, "none"),
            ConstData::Type(ty) => write!(f, "{}", ty),
            ConstData::Null => write!(f, "null"),
            ConstData::Void => write!(f, "void"),
        }
    }
}

/// A value fully known at compile time, together with its type
#[derive(Debug, Clone, PartialEq)]
pub struct PrerunValue {
    pub data: ConstData,
    pub ty: TypeId,
}

impl PrerunValue {
    pub fn new(data: ConstData, ty: TypeId) -> Self {
        Self { data, ty }
    }

    pub fn int(ty: TypeId, value: i128) -> Self {
        Self::new(ConstData::Int(value), ty)
    }

    pub fn bool(ty: TypeId, value: bool) -> Self {
        Self::new(ConstData::Bool(value), ty)
    }

    pub fn as_int(&self) -> Option<i128> {
        self.data.as_int()
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.data.as_bool()
    }

    pub fn as_str(&self) -> Option<&str> {
        self.data.as_str()
    }

    pub fn as_type(&self) -> Option<TypeId> {
        match self.data {
            ConstData::Type(ty) => Some(ty),
            _ => None,
        }
    }

    /// Same type and same payload
    pub fn is_same(&self, other: &PrerunValue) -> bool {
        self.ty == other.ty && self.data == other.data
    }
}

impl fmt::Display for PrerunValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeContext;

    #[test]
    fn test_value_accessors() {
        let v = PrerunValue::int(TypeContext::I32, 42);
        assert_eq!(v.as_int(), Some(42));
        assert_eq!(v.as_bool(), None);
        assert!(v.is_same(&PrerunValue::int(TypeContext::I32, 42)));
        assert!(!v.is_same(&PrerunValue::int(TypeContext::U8, 42)));
    }

    #[test]
    fn test_display() {
        let tuple = ConstData::Tuple(vec![ConstData::Int(1), ConstData::Bool(true)]);
        assert_eq!(tuple.to_string(), "(1, true)");
        assert_eq!(ConstData::Maybe(None).to_string(), "none");
    }
}
