//! Basic Blocks and Control Flow
//!
//! Basic blocks are sequences of instructions with a single entry point
//! and a single exit point (the terminator).

use std::fmt;

use super::instr::IrInstr;
use super::value::IrValue;

/// Basic block identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BasicBlockId(pub u32);

impl BasicBlockId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for BasicBlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// A basic block: sequence of instructions with single entry and exit
#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub id: BasicBlockId,
    /// Name describing the block's role, e.g. `loop.cond`
    pub label: Option<String>,
    /// Instructions in this block (excluding terminator)
    pub instructions: Vec<IrInstr>,
    /// `None` until lowering closes the block
    pub terminator: Option<Terminator>,
}

impl BasicBlock {
    pub fn new(id: BasicBlockId) -> Self {
        Self {
            id,
            label: None,
            instructions: Vec::new(),
            terminator: None,
        }
    }

    pub fn with_label(id: BasicBlockId, label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::new(id)
        }
    }

    pub fn add_instr(&mut self, instr: IrInstr) {
        self.instructions.push(instr);
    }

    pub fn set_terminator(&mut self, term: Terminator) {
        self.terminator = Some(term);
    }

    pub fn successors(&self) -> Vec<BasicBlockId> {
        self.terminator
            .as_ref()
            .map(|t| t.successors())
            .unwrap_or_default()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminator.is_some()
    }

    pub fn label_is(&self, label: &str) -> bool {
        self.label.as_deref() == Some(label)
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// Control flow terminator (ends a basic block)
#[derive(Debug, Clone, PartialEq)]
pub enum Terminator {
    Jump(BasicBlockId),

    /// Conditional branch on a `bool` value
    Branch {
        cond: IrValue,
        then_block: BasicBlockId,
        else_block: BasicBlockId,
    },

    Return(Option<IrValue>),

    /// Multi-way branch on an integer value
    Switch {
        value: IrValue,
        cases: Vec<(i128, BasicBlockId)>,
        default: BasicBlockId,
    },

    Unreachable,
}

impl Terminator {
    pub fn successors(&self) -> Vec<BasicBlockId> {
        match self {
            Terminator::Jump(target) => vec![*target],
            Terminator::Branch {
                then_block,
                else_block,
                ..
            } => vec![*then_block, *else_block],
            Terminator::Return(_) | Terminator::Unreachable => vec![],
            Terminator::Switch { cases, default, .. } => {
                let mut succs: Vec<_> = cases.iter().map(|(_, block)| *block).collect();
                succs.push(*default);
                succs
            }
        }
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminator::Jump(target) => write!(f, "jump {}", target),
            Terminator::Branch {
                cond,
                then_block,
                else_block,
            } => write!(f, "branch {} ? {} : {}", cond, then_block, else_block),
            Terminator::Return(None) => write!(f, "return"),
            Terminator::Return(Some(value)) => write!(f, "return {}", value),
            Terminator::Switch {
                value,
                cases,
                default,
            } => {
                write!(f, "switch {} [", value)?;
                for (i, (val, block)) in cases.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} => {}", val, block)?;
                }
                write!(f, ", _ => {}]", default)
            }
            Terminator::Unreachable => write!(f, "unreachable"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::value::{IrConstant, Register, RegisterId};
    use crate::types::TypeContext;

    #[test]
    fn test_basic_block_new() {
        let block = BasicBlock::new(BasicBlockId(0));
        assert_eq!(block.id, BasicBlockId(0));
        assert!(block.instructions.is_empty());
        assert!(!block.is_terminated());
    }

    #[test]
    fn test_basic_block_with_label() {
        let block = BasicBlock::with_label(BasicBlockId(1), "loop.cond");
        assert!(block.label_is("loop.cond"));
    }

    #[test]
    fn test_terminator_successors() {
        let jump = Terminator::Jump(BasicBlockId(1));
        assert_eq!(jump.successors(), vec![BasicBlockId(1)]);

        let branch = Terminator::Branch {
            cond: IrConstant::bool(TypeContext::BOOL, true).into(),
            then_block: BasicBlockId(1),
            else_block: BasicBlockId(2),
        };
        assert_eq!(branch.successors(), vec![BasicBlockId(1), BasicBlockId(2)]);

        assert!(Terminator::Return(None).successors().is_empty());
    }

    #[test]
    fn test_terminator_display() {
        assert_eq!(Terminator::Jump(BasicBlockId(1)).to_string(), "jump bb1");
        assert_eq!(Terminator::Return(None).to_string(), "return");

        let reg = Register::new(RegisterId::new(0), TypeContext::I32);
        assert_eq!(Terminator::Return(Some(reg.into())).to_string(), "return %0");
    }
}
