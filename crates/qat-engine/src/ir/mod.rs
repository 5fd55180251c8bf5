//! Intermediate Representation (IR) emitted by lowering
//!
//! The IR mirrors the shape of LLVM IR so a backend can translate it one
//! instruction at a time. Registers carry language-level [`TypeId`]s;
//! addresses are typed as marks.
//!
//! # Structure
//!
//! - `IrModule` - Top-level container for a compilation
//! - `IrFunction` - A function with parameters and basic blocks
//! - `BasicBlock` - A sequence of instructions with a single entry and exit
//! - `IrInstr` - Instructions writing virtual registers
//!
//! [`TypeId`]: crate::types::TypeId

pub mod block;
pub mod function;
pub mod instr;
pub mod module;
pub mod pretty;
pub mod value;

pub use block::{BasicBlock, BasicBlockId, Terminator};
pub use function::IrFunction;
pub use instr::{BinaryOp, Callee, CastKind, CmpPredicate, FunctionId, GlobalId, IrInstr, StringId};
pub use module::{IrGlobal, IrModule};
pub use pretty::{PrettyPrint, TypeLabels, WithTypes, WriteIr};
pub use value::{ConstantKind, IrConstant, IrValue, Register, RegisterId};
