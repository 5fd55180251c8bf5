//! IR Module
//!
//! Top-level container for everything emitted by one compilation.

use rustc_hash::FxHashMap;

use super::function::IrFunction;
use super::instr::{FunctionId, GlobalId, StringId};
use super::value::IrConstant;
use crate::types::TypeId;

/// A global variable with a constant initializer
#[derive(Debug, Clone)]
pub struct IrGlobal {
    pub name: String,
    pub ty: TypeId,
    pub initializer: IrConstant,
    pub is_variable: bool,
}

#[derive(Debug, Clone)]
pub struct IrModule {
    pub name: String,
    pub functions: Vec<IrFunction>,
    pub globals: Vec<IrGlobal>,
    /// Constant string data referenced by `str` constants
    pub strings: Vec<String>,
    function_map: FxHashMap<String, FunctionId>,
    string_map: FxHashMap<String, StringId>,
}

impl IrModule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: Vec::new(),
            globals: Vec::new(),
            strings: Vec::new(),
            function_map: FxHashMap::default(),
            string_map: FxHashMap::default(),
        }
    }

    pub fn add_function(&mut self, func: IrFunction) -> FunctionId {
        let id = FunctionId(self.functions.len() as u32);
        self.function_map.insert(func.name.clone(), id);
        self.functions.push(func);
        id
    }

    /// Declare an external function once; later declarations reuse it
    pub fn declare_external(
        &mut self,
        name: &str,
        param_types: &[TypeId],
        return_ty: TypeId,
        is_variadic: bool,
    ) -> FunctionId {
        if let Some(id) = self.function_map.get(name) {
            return *id;
        }
        self.add_function(IrFunction::external(name, param_types, return_ty, is_variadic))
    }

    pub fn get_function(&self, id: FunctionId) -> Option<&IrFunction> {
        self.functions.get(id.0 as usize)
    }

    pub fn get_function_mut(&mut self, id: FunctionId) -> Option<&mut IrFunction> {
        self.functions.get_mut(id.0 as usize)
    }

    pub fn get_function_by_name(&self, name: &str) -> Option<&IrFunction> {
        self.function_map
            .get(name)
            .and_then(|&id| self.get_function(id))
    }

    pub fn get_function_id(&self, name: &str) -> Option<FunctionId> {
        self.function_map.get(name).copied()
    }

    pub fn add_global(&mut self, global: IrGlobal) -> GlobalId {
        let id = GlobalId(self.globals.len() as u32);
        self.globals.push(global);
        id
    }

    pub fn get_global(&self, id: GlobalId) -> Option<&IrGlobal> {
        self.globals.get(id.0 as usize)
    }

    pub fn intern_string(&mut self, value: &str) -> StringId {
        if let Some(id) = self.string_map.get(value) {
            return *id;
        }
        let id = StringId(self.strings.len() as u32);
        self.strings.push(value.to_string());
        self.string_map.insert(value.to_string(), id);
        id
    }

    pub fn get_string(&self, id: StringId) -> Option<&str> {
        self.strings.get(id.0 as usize).map(|s| s.as_str())
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    pub fn validate(&self) -> Result<(), String> {
        self.functions.iter().try_for_each(|f| f.validate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeContext;

    #[test]
    fn test_module_functions() {
        let mut module = IrModule::new("app");
        let id = module.add_function(IrFunction::new("app::main", &[], TypeContext::VOID));
        assert_eq!(module.get_function_id("app::main"), Some(id));
        assert!(module.get_function_by_name("app::other").is_none());
    }

    #[test]
    fn test_external_declared_once() {
        let mut module = IrModule::new("app");
        let a = module.declare_external("free", &[TypeContext::USIZE], TypeContext::VOID, false);
        let b = module.declare_external("free", &[TypeContext::USIZE], TypeContext::VOID, false);
        assert_eq!(a, b);
        assert_eq!(module.function_count(), 1);
    }

    #[test]
    fn test_string_interning() {
        let mut module = IrModule::new("app");
        let a = module.intern_string("hello");
        let b = module.intern_string("hello");
        assert_eq!(a, b);
        assert_eq!(module.get_string(a), Some("hello"));
    }
}
