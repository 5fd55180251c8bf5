//! Pretty-printing for IR
//!
//! Provides human-readable output for debugging IR structures. Plain
//! `Display` prints interned type ids; [`WriteIr::with_types`] resolves them
//! to source-level names through a [`TypeContext`].

use std::fmt;

use super::block::BasicBlock;
use super::function::IrFunction;
use super::module::IrModule;
use crate::types::{TypeContext, TypeId};

/// Trait for pretty-printing IR constructs
pub trait PrettyPrint {
    fn pretty_print(&self) -> String;
}

impl<T: fmt::Display> PrettyPrint for T {
    fn pretty_print(&self) -> String {
        self.to_string()
    }
}

/// How types are spelled while printing
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeLabels<'a> {
    types: Option<&'a TypeContext>,
}

impl<'a> TypeLabels<'a> {
    /// Print raw interned ids such as `type5`
    pub fn ids() -> Self {
        Self { types: None }
    }

    pub fn names(types: &'a TypeContext) -> Self {
        Self { types: Some(types) }
    }

    pub fn label(&self, ty: TypeId) -> String {
        match self.types {
            Some(types) if ty.index() < types.len() => types.type_name(ty),
            _ => ty.to_string(),
        }
    }
}

/// IR constructs that can be printed with a choice of type spelling
pub trait WriteIr {
    fn write_ir(&self, f: &mut fmt::Formatter<'_>, labels: TypeLabels<'_>) -> fmt::Result;

    /// Display adapter spelling types by name
    fn with_types<'a>(&'a self, types: &'a TypeContext) -> WithTypes<'a, Self>
    where
        Self: Sized,
    {
        WithTypes { item: self, types }
    }
}

/// Returned by [`WriteIr::with_types`]
pub struct WithTypes<'a, T> {
    item: &'a T,
    types: &'a TypeContext,
}

impl<T: WriteIr> fmt::Display for WithTypes<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.item.write_ir(f, TypeLabels::names(self.types))
    }
}

impl fmt::Display for IrModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_ir(f, TypeLabels::ids())
    }
}

impl WriteIr for IrModule {
    fn write_ir(&self, f: &mut fmt::Formatter<'_>, labels: TypeLabels<'_>) -> fmt::Result {
        writeln!(f, "; module {}", self.name)?;
        writeln!(f)?;

        for (i, data) in self.strings.iter().enumerate() {
            writeln!(f, "@str{} = {:?}", i, data)?;
        }
        for (i, global) in self.globals.iter().enumerate() {
            writeln!(
                f,
                "@global{} = {} {} {} ; {}",
                i,
                if global.is_variable { "global" } else { "constant" },
                labels.label(global.ty),
                global.initializer,
                global.name
            )?;
        }
        if !self.strings.is_empty() || !self.globals.is_empty() {
            writeln!(f)?;
        }

        for func in &self.functions {
            func.write_ir(f, labels)?;
            writeln!(f)?;
        }
        Ok(())
    }
}

impl fmt::Display for IrFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_ir(f, TypeLabels::ids())
    }
}

impl WriteIr for IrFunction {
    fn write_ir(&self, f: &mut fmt::Formatter<'_>, labels: TypeLabels<'_>) -> fmt::Result {
        let mut params: Vec<String> = self
            .params
            .iter()
            .map(|p| format!("{}: {}", p, labels.label(p.ty)))
            .collect();
        if self.is_variadic {
            params.push("...".to_string());
        }
        let keyword = if self.is_external { "declare" } else { "fn" };
        write!(
            f,
            "{} {}({}) -> {}",
            keyword,
            self.name,
            params.join(", "),
            labels.label(self.return_ty)
        )?;
        if self.is_external {
            return writeln!(f);
        }
        writeln!(f, " {{")?;
        for block in &self.blocks {
            block.write_indented(f, labels, 2)?;
        }
        writeln!(f, "}}")
    }
}

impl BasicBlock {
    fn write_indented(
        &self,
        f: &mut fmt::Formatter<'_>,
        labels: TypeLabels<'_>,
        indent: usize,
    ) -> fmt::Result {
        let prefix = " ".repeat(indent);

        match &self.label {
            Some(label) => writeln!(f, "{}{}: ; {}", prefix, self.id, label)?,
            None => writeln!(f, "{}{}:", prefix, self.id)?,
        }
        for instr in &self.instructions {
            write!(f, "{}  ", prefix)?;
            instr.write_ir(f, labels)?;
            writeln!(f)?;
        }
        match &self.terminator {
            Some(term) => writeln!(f, "{}  {}", prefix, term),
            None => writeln!(f, "{}  ; <open>", prefix),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::block::{BasicBlockId, Terminator};
    use crate::ir::instr::{BinaryOp, IrInstr};
    use crate::ir::value::IrConstant;

    fn add_function() -> IrFunction {
        let int = TypeContext::I32;
        let mut func = IrFunction::new("app::add", &[int, int], int);
        let entry = func.new_block(Some("entry"));
        let dest = func.new_register(int);
        let lhs = func.params[0];
        let rhs = func.params[1];
        if let Some(block) = func.get_block_mut(entry) {
            block.add_instr(IrInstr::Binary {
                dest,
                op: BinaryOp::Add,
                lhs: lhs.into(),
                rhs: rhs.into(),
            });
            block.set_terminator(Terminator::Return(Some(dest.into())));
        }
        func
    }

    #[test]
    fn test_function_pretty_print() {
        let text = add_function().pretty_print();
        assert!(text.starts_with("fn app::add(%0: type5, %1: type5) -> type5 {"));
        assert!(text.contains("bb0: ; entry"));
        assert!(text.contains("%2 = add %0, %1"));
        assert!(text.contains("return %2"));
    }

    #[test]
    fn test_function_prints_type_names() {
        let types = TypeContext::new();
        let mut func = add_function();
        let slot = func.new_register(TypeContext::I32);
        if let Some(block) = func.get_block_mut(BasicBlockId(0)) {
            block.instructions.insert(
                0,
                IrInstr::Alloca {
                    dest: slot,
                    ty: TypeContext::BOOL,
                    name: Some("flag".to_string()),
                },
            );
        }

        let text = func.with_types(&types).to_string();
        assert!(text.starts_with("fn app::add(%0: i32, %1: i32) -> i32 {"));
        assert!(text.contains("%3 = alloca bool ; flag"));
        assert!(!text.contains("type"));
    }

    #[test]
    fn test_module_pretty_print() {
        let mut module = IrModule::new("app");
        module.intern_string("hi");
        module.add_global(crate::ir::module::IrGlobal {
            name: "app::limit".to_string(),
            ty: TypeContext::I32,
            initializer: IrConstant::int(TypeContext::I32, 10),
            is_variable: false,
        });
        module.declare_external("free", &[TypeContext::USIZE], TypeContext::VOID, false);

        let text = module.pretty_print();
        assert!(text.contains("@str0 = \"hi\""));
        assert!(text.contains("@global0 = constant type5 10 ; app::limit"));
        assert!(text.contains("declare free(%0: type4) -> type0"));

        let types = TypeContext::new();
        let named = module.with_types(&types).to_string();
        assert!(named.contains("@global0 = constant i32 10 ; app::limit"));
        assert!(named.contains("declare free(%0: usize) -> void"));
    }
}
