//! Compile-time functions and their call frames

use rustc_hash::FxHashMap;

use super::value::PrerunValue;
use crate::ast::Sentence;
use crate::module::ModId;
use crate::span::{FileRange, Identifier};
use crate::types::TypeId;

/// How a prerun sentence finished
///
/// `break`, `continue` and `give` unwind to the nearest loop or call as
/// ordinary return values; user errors travel separately as
/// [`CompileError`](crate::error::CompileError).
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal,
    Break(Option<String>),
    Continue(Option<String>),
    Give(Option<PrerunValue>),
}

impl Flow {
    pub fn is_normal(&self) -> bool {
        matches!(self, Flow::Normal)
    }

    /// Whether a `break`/`continue` with this tag targets a loop tagged `loop_tag`
    pub fn targets(tag: &Option<String>, loop_tag: Option<&str>) -> bool {
        match tag {
            None => true,
            Some(tag) => loop_tag == Some(tag.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrerunArg {
    pub name: Identifier,
    pub ty: TypeId,
    pub is_variable: bool,
}

/// A function evaluated only at compile time
#[derive(Debug, Clone)]
pub struct PrerunFunction<'a> {
    pub full_name: String,
    pub module: ModId,
    pub args: Vec<PrerunArg>,
    pub return_type: TypeId,
    pub body: &'a [Sentence],
    pub range: FileRange,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrerunLocal {
    pub value: PrerunValue,
    pub is_variable: bool,
}

/// Locals of one active compile-time call
#[derive(Debug, Clone)]
pub struct PrerunCallState {
    pub function: String,
    pub return_type: TypeId,
    scopes: Vec<FxHashMap<String, PrerunLocal>>,
}

impl PrerunCallState {
    pub fn new(function: impl Into<String>, return_type: TypeId) -> Self {
        Self {
            function: function.into(),
            return_type,
            scopes: vec![FxHashMap::default()],
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Declare a local in the innermost scope. Returns false if the name
    /// already exists in that scope.
    pub fn declare(&mut self, name: &str, value: PrerunValue, is_variable: bool) -> bool {
        let Some(scope) = self.scopes.last_mut() else {
            return false;
        };
        if scope.contains_key(name) {
            return false;
        }
        scope.insert(name.to_string(), PrerunLocal { value, is_variable });
        true
    }

    pub fn get(&self, name: &str) -> Option<&PrerunLocal> {
        self.scopes.iter().rev().find_map(|s| s.get(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut PrerunLocal> {
        self.scopes.iter_mut().rev().find_map(|s| s.get_mut(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeContext;

    #[test]
    fn test_scoped_locals() {
        let mut state = PrerunCallState::new("lib::compute", TypeContext::I32);
        assert!(state.declare("a", PrerunValue::int(TypeContext::I32, 1), true));
        assert!(!state.declare("a", PrerunValue::int(TypeContext::I32, 2), true));

        state.push_scope();
        assert!(state.declare("a", PrerunValue::int(TypeContext::I32, 3), false));
        assert_eq!(state.get("a").unwrap().value.as_int(), Some(3));
        state.pop_scope();
        assert_eq!(state.get("a").unwrap().value.as_int(), Some(1));

        state.get_mut("a").unwrap().value = PrerunValue::int(TypeContext::I32, 9);
        assert_eq!(state.get("a").unwrap().value.as_int(), Some(9));
    }

    #[test]
    fn test_flow_targets() {
        assert!(Flow::targets(&None, Some("outer")));
        assert!(Flow::targets(&Some("outer".into()), Some("outer")));
        assert!(!Flow::targets(&Some("outer".into()), None));
        assert!(Flow::Normal.is_normal());
    }
}
