//! IR Functions
//!
//! A function owns its basic blocks and hands out virtual registers. An
//! external function has no blocks at all.

use rustc_hash::FxHashMap;

use super::block::{BasicBlock, BasicBlockId};
use super::instr::IrInstr;
use super::value::{Register, RegisterId};
use crate::span::FileRange;
use crate::types::TypeId;

#[derive(Debug, Clone)]
pub struct IrFunction {
    /// Fully qualified name
    pub name: String,
    pub params: Vec<Register>,
    pub return_ty: TypeId,
    pub is_variadic: bool,
    /// Declared without a body
    pub is_external: bool,
    pub blocks: Vec<BasicBlock>,
    pub entry_block: BasicBlockId,
    block_map: FxHashMap<BasicBlockId, usize>,
    next_register: u32,
    pub range: FileRange,
}

impl IrFunction {
    /// Create a function whose parameters take the first registers
    pub fn new(name: impl Into<String>, param_types: &[TypeId], return_ty: TypeId) -> Self {
        let params: Vec<Register> = param_types
            .iter()
            .enumerate()
            .map(|(i, ty)| Register::new(RegisterId::new(i as u32), *ty))
            .collect();
        Self {
            name: name.into(),
            next_register: params.len() as u32,
            params,
            return_ty,
            is_variadic: false,
            is_external: false,
            blocks: Vec::new(),
            entry_block: BasicBlockId(0),
            block_map: FxHashMap::default(),
            range: FileRange::default(),
        }
    }

    pub fn external(
        name: impl Into<String>,
        param_types: &[TypeId],
        return_ty: TypeId,
        is_variadic: bool,
    ) -> Self {
        let mut func = Self::new(name, param_types, return_ty);
        func.is_external = true;
        func.is_variadic = is_variadic;
        func
    }

    pub fn new_register(&mut self, ty: TypeId) -> Register {
        let reg = Register::new(RegisterId::new(self.next_register), ty);
        self.next_register += 1;
        reg
    }

    /// Append a new block and return its ID
    pub fn new_block(&mut self, label: Option<&str>) -> BasicBlockId {
        let id = BasicBlockId(self.blocks.len() as u32);
        let block = match label {
            Some(label) => BasicBlock::with_label(id, label),
            None => BasicBlock::new(id),
        };
        self.block_map.insert(id, self.blocks.len());
        self.blocks.push(block);
        id
    }

    pub fn get_block(&self, id: BasicBlockId) -> Option<&BasicBlock> {
        self.block_map.get(&id).map(|&idx| &self.blocks[idx])
    }

    pub fn get_block_mut(&mut self, id: BasicBlockId) -> Option<&mut BasicBlock> {
        self.block_map
            .get(&id)
            .copied()
            .map(|idx| &mut self.blocks[idx])
    }

    /// First block carrying the label
    pub fn block_by_label(&self, label: &str) -> Option<&BasicBlock> {
        self.blocks.iter().find(|b| b.label_is(label))
    }

    pub fn entry(&self) -> Option<&BasicBlock> {
        self.get_block(self.entry_block)
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn instructions(&self) -> impl Iterator<Item = &IrInstr> {
        self.blocks.iter().flat_map(|b| b.instructions.iter())
    }

    pub fn instruction_count(&self) -> usize {
        self.blocks.iter().map(|b| b.len()).sum()
    }

    pub fn count_instructions(&self, predicate: impl Fn(&IrInstr) -> bool) -> usize {
        self.instructions().filter(|i| predicate(i)).count()
    }

    /// Validate the function structure
    pub fn validate(&self) -> Result<(), String> {
        if self.is_external {
            return if self.blocks.is_empty() {
                Ok(())
            } else {
                Err(format!("External function {} has a body", self.name))
            };
        }
        if self.blocks.is_empty() {
            return Err(format!("Function {} has no blocks", self.name));
        }
        for block in &self.blocks {
            if !block.is_terminated() {
                return Err(format!("Block {} of {} is not terminated", block.id, self.name));
            }
            for succ in block.successors() {
                if self.get_block(succ).is_none() {
                    return Err(format!(
                        "Block {} jumps to missing block {}",
                        block.id, succ
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::block::Terminator;
    use crate::types::TypeContext;

    #[test]
    fn test_params_take_first_registers() {
        let mut func = IrFunction::new(
            "add",
            &[TypeContext::I32, TypeContext::I32],
            TypeContext::I32,
        );
        assert_eq!(func.param_count(), 2);
        let reg = func.new_register(TypeContext::I32);
        assert_eq!(reg.id.as_u32(), 2);
    }

    #[test]
    fn test_blocks_and_validation() {
        let mut func = IrFunction::new("main", &[], TypeContext::VOID);
        let entry = func.new_block(Some("entry"));
        let exit = func.new_block(None);
        assert!(func.validate().is_err());

        if let Some(block) = func.get_block_mut(entry) {
            block.set_terminator(Terminator::Jump(exit));
        }
        if let Some(block) = func.get_block_mut(exit) {
            block.set_terminator(Terminator::Return(None));
        }
        assert!(func.validate().is_ok());
        assert_eq!(func.block_by_label("entry").map(|b| b.id), Some(entry));
    }

    #[test]
    fn test_external_function() {
        let func = IrFunction::external("malloc", &[TypeContext::USIZE], TypeContext::VOID, false);
        assert!(func.is_external);
        assert!(func.validate().is_ok());
    }
}
