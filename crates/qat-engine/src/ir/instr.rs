//! IR instructions
//!
//! Instructions follow the shape of LLVM IR: memory is reached through
//! explicit `alloca`/`load`/`store`, aggregates through field and element
//! addresses, and every result lands in a fresh virtual register.

use std::fmt;

use super::block::BasicBlockId;
use super::pretty::{TypeLabels, WriteIr};
use super::value::{IrValue, Register};
use crate::types::TypeId;

/// Function identifier inside an [`IrModule`](super::IrModule)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(pub u32);

impl FunctionId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@fn{}", self.0)
    }
}

/// Global variable identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlobalId(pub u32);

impl fmt::Display for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@global{}", self.0)
    }
}

/// Interned string data identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StringId(pub u32);

impl fmt::Display for StringId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@str{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    SignedDiv,
    UnsignedDiv,
    SignedRem,
    UnsignedRem,
    FloatAdd,
    FloatSub,
    FloatMul,
    FloatDiv,
    FloatRem,
    And,
    Or,
    Xor,
    Shl,
    LogicalShr,
    ArithmeticShr,
}

impl BinaryOp {
    pub fn name(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::SignedDiv => "sdiv",
            BinaryOp::UnsignedDiv => "udiv",
            BinaryOp::SignedRem => "srem",
            BinaryOp::UnsignedRem => "urem",
            BinaryOp::FloatAdd => "fadd",
            BinaryOp::FloatSub => "fsub",
            BinaryOp::FloatMul => "fmul",
            BinaryOp::FloatDiv => "fdiv",
            BinaryOp::FloatRem => "frem",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
            BinaryOp::Shl => "shl",
            BinaryOp::LogicalShr => "lshr",
            BinaryOp::ArithmeticShr => "ashr",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpPredicate {
    Eq,
    Ne,
    SignedLt,
    SignedLe,
    SignedGt,
    SignedGe,
    UnsignedLt,
    UnsignedLe,
    UnsignedGt,
    UnsignedGe,
    FloatEq,
    FloatNe,
    FloatLt,
    FloatLe,
    FloatGt,
    FloatGe,
}

impl CmpPredicate {
    pub fn name(self) -> &'static str {
        match self {
            CmpPredicate::Eq => "eq",
            CmpPredicate::Ne => "ne",
            CmpPredicate::SignedLt => "slt",
            CmpPredicate::SignedLe => "sle",
            CmpPredicate::SignedGt => "sgt",
            CmpPredicate::SignedGe => "sge",
            CmpPredicate::UnsignedLt => "ult",
            CmpPredicate::UnsignedLe => "ule",
            CmpPredicate::UnsignedGt => "ugt",
            CmpPredicate::UnsignedGe => "uge",
            CmpPredicate::FloatEq => "oeq",
            CmpPredicate::FloatNe => "one",
            CmpPredicate::FloatLt => "olt",
            CmpPredicate::FloatLe => "ole",
            CmpPredicate::FloatGt => "ogt",
            CmpPredicate::FloatGe => "oge",
        }
    }

    pub fn is_float(self) -> bool {
        matches!(
            self,
            CmpPredicate::FloatEq
                | CmpPredicate::FloatNe
                | CmpPredicate::FloatLt
                | CmpPredicate::FloatLe
                | CmpPredicate::FloatGt
                | CmpPredicate::FloatGe
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    Trunc,
    ZeroExtend,
    SignExtend,
    FloatTrunc,
    FloatExtend,
    FloatToSigned,
    FloatToUnsigned,
    SignedToFloat,
    UnsignedToFloat,
    PointerToInt,
    IntToPointer,
    Bitcast,
}

impl CastKind {
    pub fn name(self) -> &'static str {
        match self {
            CastKind::Trunc => "trunc",
            CastKind::ZeroExtend => "zext",
            CastKind::SignExtend => "sext",
            CastKind::FloatTrunc => "fptrunc",
            CastKind::FloatExtend => "fpext",
            CastKind::FloatToSigned => "fptosi",
            CastKind::FloatToUnsigned => "fptoui",
            CastKind::SignedToFloat => "sitofp",
            CastKind::UnsignedToFloat => "uitofp",
            CastKind::PointerToInt => "ptrtoint",
            CastKind::IntToPointer => "inttoptr",
            CastKind::Bitcast => "bitcast",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Callee {
    Function(FunctionId),
    /// Call through a function pointer value
    Indirect(IrValue),
}

impl fmt::Display for Callee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callee::Function(id) => write!(f, "{}", id),
            Callee::Indirect(value) => write!(f, "{}", value),
        }
    }
}

/// A single IR instruction
#[derive(Debug, Clone, PartialEq)]
pub enum IrInstr {
    /// Stack slot for one value of `ty`; `dest` holds its address
    Alloca {
        dest: Register,
        ty: TypeId,
        name: Option<String>,
    },
    Load {
        dest: Register,
        ptr: IrValue,
    },
    Store {
        value: IrValue,
        ptr: IrValue,
    },
    Binary {
        dest: Register,
        op: BinaryOp,
        lhs: IrValue,
        rhs: IrValue,
    },
    FloatNegate {
        dest: Register,
        operand: IrValue,
    },
    Compare {
        dest: Register,
        pred: CmpPredicate,
        lhs: IrValue,
        rhs: IrValue,
    },
    Cast {
        dest: Register,
        kind: CastKind,
        value: IrValue,
    },
    /// Address of field `index` of the aggregate at `base`
    FieldPtr {
        dest: Register,
        base: IrValue,
        aggregate: TypeId,
        index: u32,
    },
    /// Address of element `index` counted from `base`
    ElementPtr {
        dest: Register,
        base: IrValue,
        element: TypeId,
        index: IrValue,
    },
    ExtractValue {
        dest: Register,
        aggregate: IrValue,
        index: u32,
    },
    InsertValue {
        dest: Register,
        aggregate: IrValue,
        value: IrValue,
        index: u32,
    },
    Call {
        dest: Option<Register>,
        callee: Callee,
        args: Vec<IrValue>,
    },
    Select {
        dest: Register,
        cond: IrValue,
        then_value: IrValue,
        else_value: IrValue,
    },
    Phi {
        dest: Register,
        incoming: Vec<(IrValue, BasicBlockId)>,
    },
    InlineAsm {
        dest: Option<Register>,
        template: String,
        constraints: String,
        args: Vec<IrValue>,
        is_volatile: bool,
    },
}

impl IrInstr {
    /// Register written by this instruction, if any
    pub fn dest(&self) -> Option<Register> {
        match self {
            IrInstr::Alloca { dest, .. }
            | IrInstr::Load { dest, .. }
            | IrInstr::Binary { dest, .. }
            | IrInstr::FloatNegate { dest, .. }
            | IrInstr::Compare { dest, .. }
            | IrInstr::Cast { dest, .. }
            | IrInstr::FieldPtr { dest, .. }
            | IrInstr::ElementPtr { dest, .. }
            | IrInstr::ExtractValue { dest, .. }
            | IrInstr::InsertValue { dest, .. }
            | IrInstr::Select { dest, .. }
            | IrInstr::Phi { dest, .. } => Some(*dest),
            IrInstr::Call { dest, .. } | IrInstr::InlineAsm { dest, .. } => *dest,
            IrInstr::Store { .. } => None,
        }
    }

    pub fn is_alloca(&self) -> bool {
        matches!(self, IrInstr::Alloca { .. })
    }

    pub fn is_call(&self) -> bool {
        matches!(self, IrInstr::Call { .. })
    }
}

fn join(values: &[IrValue]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for IrInstr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_ir(f, TypeLabels::ids())
    }
}

impl WriteIr for IrInstr {
    fn write_ir(&self, f: &mut fmt::Formatter<'_>, labels: TypeLabels<'_>) -> fmt::Result {
        match self {
            IrInstr::Alloca { dest, ty, name } => {
                write!(f, "{} = alloca {}", dest, labels.label(*ty))?;
                if let Some(name) = name {
                    write!(f, " ; {}", name)?;
                }
                Ok(())
            }
            IrInstr::Load { dest, ptr } => {
                write!(f, "{} = load {}, {}", dest, labels.label(dest.ty), ptr)
            }
            IrInstr::Store { value, ptr } => write!(f, "store {}, {}", value, ptr),
            IrInstr::Binary { dest, op, lhs, rhs } => {
                write!(f, "{} = {} {}, {}", dest, op.name(), lhs, rhs)
            }
            IrInstr::FloatNegate { dest, operand } => write!(f, "{} = fneg {}", dest, operand),
            IrInstr::Compare {
                dest,
                pred,
                lhs,
                rhs,
            } => {
                let prefix = if pred.is_float() { "fcmp" } else { "icmp" };
                write!(f, "{} = {} {} {}, {}", dest, prefix, pred.name(), lhs, rhs)
            }
            IrInstr::Cast { dest, kind, value } => {
                let target = labels.label(dest.ty);
                write!(f, "{} = {} {} to {}", dest, kind.name(), value, target)
            }
            IrInstr::FieldPtr {
                dest,
                base,
                aggregate,
                index,
            } => {
                let aggregate = labels.label(*aggregate);
                write!(f, "{} = fieldptr {}, {}, {}", dest, aggregate, base, index)
            }
            IrInstr::ElementPtr {
                dest,
                base,
                element,
                index,
            } => {
                let element = labels.label(*element);
                write!(f, "{} = elementptr {}, {}, {}", dest, element, base, index)
            }
            IrInstr::ExtractValue {
                dest,
                aggregate,
                index,
            } => write!(f, "{} = extractvalue {}, {}", dest, aggregate, index),
            IrInstr::InsertValue {
                dest,
                aggregate,
                value,
                index,
            } => write!(f, "{} = insertvalue {}, {}, {}", dest, aggregate, value, index),
            IrInstr::Call { dest, callee, args } => {
                if let Some(dest) = dest {
                    write!(f, "{} = ", dest)?;
                }
                write!(f, "call {}({})", callee, join(args))
            }
            IrInstr::Select {
                dest,
                cond,
                then_value,
                else_value,
            } => write!(f, "{} = select {}, {}, {}", dest, cond, then_value, else_value),
            IrInstr::Phi { dest, incoming } => {
                let incoming: Vec<String> = incoming
                    .iter()
                    .map(|(value, block)| format!("[{}, {}]", value, block))
                    .collect();
                write!(f, "{} = phi {}", dest, incoming.join(", "))
            }
            IrInstr::InlineAsm {
                dest,
                template,
                constraints,
                args,
                is_volatile,
            } => {
                if let Some(dest) = dest {
                    write!(f, "{} = ", dest)?;
                }
                write!(
                    f,
                    "asm{} {:?}, {:?}({})",
                    if *is_volatile { " volatile" } else { "" },
                    template,
                    constraints,
                    join(args)
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::value::{IrConstant, RegisterId};
    use crate::types::TypeContext;

    fn reg(id: u32) -> Register {
        Register::new(RegisterId::new(id), TypeContext::I32)
    }

    #[test]
    fn test_instr_dest() {
        let add = IrInstr::Binary {
            dest: reg(2),
            op: BinaryOp::Add,
            lhs: reg(0).into(),
            rhs: reg(1).into(),
        };
        assert_eq!(add.dest(), Some(reg(2)));

        let store = IrInstr::Store {
            value: IrConstant::int(TypeContext::I32, 1).into(),
            ptr: reg(0).into(),
        };
        assert_eq!(store.dest(), None);
    }

    #[test]
    fn test_instr_display() {
        let cmp = IrInstr::Compare {
            dest: reg(3),
            pred: CmpPredicate::SignedLt,
            lhs: reg(1).into(),
            rhs: IrConstant::int(TypeContext::I32, 10).into(),
        };
        assert_eq!(cmp.to_string(), "%3 = icmp slt %1, 10");

        let call = IrInstr::Call {
            dest: None,
            callee: Callee::Function(FunctionId(4)),
            args: vec![reg(0).into()],
        };
        assert_eq!(call.to_string(), "call @fn4(%0)");
    }
}
