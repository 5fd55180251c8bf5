//! AST to IR lowering
//!
//! The [`Lowerer`] owns every table of one compilation: types, modules,
//! entities, the IR under construction and the state of the function whose
//! body is being lowered. Declarations drive it through the entity
//! scheduler (see [`crate::decl`]); expressions and sentences are lowered by
//! the node-family files of this module.

mod access;
mod asm;
mod assign;
mod binary;
mod call;
mod cast;
mod construct;
pub mod control_flow;
mod copy_move;
mod expr;
mod future;
mod heap;
mod local;
mod loops;
mod stmt;
mod string_cmp;
mod types;
mod unary;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::ast::{Decl, Program};
use crate::config::CompileOptions;
use crate::diagnostic::{Diagnostic, Diagnostics};
use crate::entity::{EmitPhase, EntityGraph, EntityId};
use crate::error::{codes, CompileError, CompileResult};
use crate::ir::{
    BasicBlockId, ConstantKind, FunctionId, GlobalId, IrConstant, IrFunction, IrInstr, IrModule,
    IrValue, Register, Terminator,
};
use crate::module::{ModId, ModuleTree};
use crate::prerun::{self, PrerunCallState, PrerunFunction, PrerunValue};
use crate::span::{FileRange, Identifier};
use crate::types::{DoneSkillId, SkillId, TypeContext, TypeId};
use crate::value::{LocalId, Storage, Value};

use control_flow::LoopStack;

/// Where a declaration lives
#[derive(Debug, Clone, Copy)]
pub(crate) struct EntitySite<'a> {
    pub decl: &'a Decl,
    pub module: ModId,
}

/// What an entity produced, once the phase defining it ran
#[derive(Debug, Clone)]
pub(crate) enum Symbol<'a> {
    Function { id: FunctionId, ty: TypeId },
    /// Expanded, mix and choice types and type definitions
    Type(TypeId),
    Global {
        id: GlobalId,
        ty: TypeId,
        is_variable: bool,
        value: PrerunValue,
    },
    PrerunGlobal(PrerunValue),
    PrerunFunction(PrerunFunction<'a>),
    Skill(SkillId),
    DoneSkill(DoneSkillId),
    Bring,
}

/// The instance inside a member function
#[derive(Debug, Clone)]
pub(crate) struct SelfValue {
    /// Address of the instance
    pub address: IrValue,
    pub ty: TypeId,
    pub is_variable: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct LocalVar {
    pub name: Identifier,
    /// Slot of the local, or the referred address for reference locals
    pub address: IrValue,
    /// Declared type; the reference type itself for reference locals
    pub ty: TypeId,
    pub is_variable: bool,
    pub is_reference: bool,
    /// Known value of a local that can never change
    pub prerun: Option<PrerunValue>,
}

/// A function whose body is being lowered
///
/// The body is built in a copy of the prototype and written back into the
/// module when it is finished.
pub(crate) struct FunctionState {
    pub id: FunctionId,
    pub function: IrFunction,
    pub current: BasicBlockId,
    pub scopes: Vec<FxHashMap<String, LocalId>>,
    pub locals: Vec<LocalVar>,
    pub loops: LoopStack,
    pub return_type: TypeId,
    pub self_value: Option<SelfValue>,
}

/// What the surrounding code wants from an expression
#[derive(Debug, Clone, Default)]
pub(crate) struct Expect {
    /// Type used for inference of literals and `default`
    pub ty: Option<TypeId>,
    /// Slot the result should be constructed in
    pub create_in: Option<Value>,
}

impl Expect {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn of(ty: TypeId) -> Self {
        Self {
            ty: Some(ty),
            create_in: None,
        }
    }

    pub fn maybe(ty: Option<TypeId>) -> Self {
        Self { ty, create_in: None }
    }

    pub fn in_slot(slot: Value) -> Self {
        Self {
            ty: Some(slot.ty),
            create_in: Some(slot),
        }
    }

    /// Same inference hint, but no slot
    pub fn hint(&self) -> Self {
        Self::maybe(self.ty)
    }
}

pub(crate) struct Lowerer<'a> {
    pub program: &'a Program,
    pub options: &'a CompileOptions,
    pub types: TypeContext,
    pub modules: ModuleTree,
    pub entities: EntityGraph,
    /// Indexed by entity id
    pub sites: Vec<EntitySite<'a>>,
    pub symbols: FxHashMap<EntityId, Symbol<'a>>,
    pub ir: IrModule,
    pub func: Option<FunctionState>,
    pub prerun_frames: Vec<PrerunCallState>,
    pub diagnostics: Diagnostics,
    /// Bring entities per module that have not run yet
    pub pending_brings: FxHashMap<ModId, Vec<EntityId>>,
    pub phase_log: Vec<(EntityId, EmitPhase)>,
}

fn no_function() -> CompileError {
    CompileError::internal("no function is being lowered")
}

impl<'a> Lowerer<'a> {
    pub fn new(program: &'a Program, options: &'a CompileOptions) -> Self {
        Self {
            program,
            options,
            types: TypeContext::with_pointer_width(options.pointer_width),
            modules: ModuleTree::new(),
            entities: EntityGraph::new(),
            sites: Vec::new(),
            symbols: FxHashMap::default(),
            ir: IrModule::new(options.name.clone()),
            func: None,
            prerun_frames: Vec::new(),
            diagnostics: Diagnostics::new(),
            pending_brings: FxHashMap::default(),
            phase_log: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------

    pub fn type_name(&self, ty: TypeId) -> String {
        self.types.type_name(ty)
    }

    pub fn warn(&mut self, diagnostic: Diagnostic) {
        tracing::warn!(code = ?diagnostic.code(), "{}", diagnostic.message());
        self.diagnostics.push(diagnostic);
    }

    pub fn mismatch(&self, expected: TypeId, found: TypeId, range: FileRange) -> CompileError {
        CompileError::at(
            codes::TYPE_MISMATCH,
            format!(
                "Expected a value of type `{}`, but the provided value is of type `{}`",
                self.type_name(expected),
                self.type_name(found)
            ),
            range,
        )
    }

    /// A `todo` marker: a warning that ends the block in debug builds, an
    /// error in release builds
    pub fn meta_todo(&mut self, message: Option<&str>, range: FileRange) -> CompileResult<()> {
        let text = match message {
            Some(message) => format!("Reached a TODO: {}", message),
            None => "Reached a TODO".to_string(),
        };
        if self.options.mode.is_release() {
            return Err(CompileError::at(codes::META_TODO, text, range));
        }
        self.warn(
            Diagnostic::warning(text)
                .with_code(codes::TODO_WARNING)
                .with_primary_label(range, "code after this point is unreachable"),
        );
        if self.func.is_some() {
            self.set_terminator(Terminator::Unreachable)?;
            let dead = self.new_block(Some("todo.after"))?;
            self.switch_to(dead)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Symbols
    // ------------------------------------------------------------------

    pub fn symbol(&self, entity: EntityId, range: FileRange) -> CompileResult<&Symbol<'a>> {
        self.symbols.get(&entity).ok_or_else(|| {
            let state = self.entities.get(entity);
            CompileError::at(
                codes::ENTITY_NOT_READY,
                format!("{} is used before it is ready", state.display_name()),
                range,
            )
        })
    }

    // ------------------------------------------------------------------
    // Function state
    // ------------------------------------------------------------------

    pub fn state(&self) -> CompileResult<&FunctionState> {
        self.func.as_ref().ok_or_else(no_function)
    }

    pub fn state_mut(&mut self) -> CompileResult<&mut FunctionState> {
        self.func.as_mut().ok_or_else(no_function)
    }

    pub fn begin_function(
        &mut self,
        id: FunctionId,
        return_type: TypeId,
        self_value: Option<SelfValue>,
    ) -> CompileResult<()> {
        if self.func.is_some() {
            return Err(CompileError::internal("nested function lowering"));
        }
        let mut function = self
            .ir
            .get_function(id)
            .cloned()
            .ok_or_else(|| CompileError::internal(format!("missing prototype for {}", id)))?;
        let entry = function.new_block(Some("entry"));
        function.entry_block = entry;
        self.func = Some(FunctionState {
            id,
            function,
            current: entry,
            scopes: vec![FxHashMap::default()],
            locals: Vec::new(),
            loops: LoopStack::new(),
            return_type,
            self_value,
        });
        Ok(())
    }

    /// Terminate every open block and write the body back into the module
    pub fn finish_function(&mut self, range: FileRange) -> CompileResult<()> {
        let state = self.func.take().ok_or_else(no_function)?;
        let mut function = state.function;
        let reachable: FxHashSet<BasicBlockId> = function
            .blocks
            .iter()
            .flat_map(|b| b.successors())
            .collect();
        let is_void = state.return_type == TypeContext::VOID;
        let entry = function.entry_block;

        for block in function.blocks.iter_mut() {
            if block.is_terminated() {
                continue;
            }
            if is_void {
                block.set_terminator(Terminator::Return(None));
            } else if block.id != entry && !reachable.contains(&block.id) {
                block.set_terminator(Terminator::Unreachable);
            } else {
                return Err(CompileError::at(
                    codes::MISSING_GIVE,
                    format!(
                        "Function `{}` does not give a value of type `{}` on every path",
                        function.name,
                        self.type_name(state.return_type)
                    ),
                    range,
                ));
            }
        }

        let slot = self
            .ir
            .get_function_mut(state.id)
            .ok_or_else(|| CompileError::internal("function disappeared while lowering"))?;
        *slot = function;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Instructions and blocks
    // ------------------------------------------------------------------

    pub fn emit(&mut self, instr: IrInstr) -> CompileResult<()> {
        let state = self.state_mut()?;
        let current = state.current;
        state
            .function
            .get_block_mut(current)
            .ok_or_else(|| CompileError::internal("current block is missing"))?
            .add_instr(instr);
        Ok(())
    }

    pub fn fresh_register(&mut self, ty: TypeId) -> CompileResult<Register> {
        Ok(self.state_mut()?.function.new_register(ty))
    }

    /// Stack slot for a value of `ty`, placed with the other slots at the
    /// top of the entry block
    pub fn alloca(&mut self, ty: TypeId, name: Option<&str>) -> CompileResult<Register> {
        let ptr_ty = self.types.mark_to(ty, true);
        let state = self.state_mut()?;
        let dest = state.function.new_register(ptr_ty);
        let entry = state.function.entry_block;
        let block = state
            .function
            .get_block_mut(entry)
            .ok_or_else(|| CompileError::internal("entry block is missing"))?;
        let position = block.instructions.iter().take_while(|i| i.is_alloca()).count();
        block.instructions.insert(
            position,
            IrInstr::Alloca {
                dest,
                ty,
                name: name.map(str::to_string),
            },
        );
        Ok(dest)
    }

    pub fn new_block(&mut self, label: Option<&str>) -> CompileResult<BasicBlockId> {
        Ok(self.state_mut()?.function.new_block(label))
    }

    pub fn switch_to(&mut self, block: BasicBlockId) -> CompileResult<()> {
        self.state_mut()?.current = block;
        Ok(())
    }

    pub fn current_block(&self) -> CompileResult<BasicBlockId> {
        Ok(self.state()?.current)
    }

    /// Terminate the current block unless it already ends
    pub fn set_terminator(&mut self, terminator: Terminator) -> CompileResult<()> {
        let state = self.state_mut()?;
        let current = state.current;
        let block = state
            .function
            .get_block_mut(current)
            .ok_or_else(|| CompileError::internal("current block is missing"))?;
        if !block.is_terminated() {
            block.set_terminator(terminator);
        }
        Ok(())
    }

    pub fn current_block_is_terminated(&self) -> bool {
        self.func
            .as_ref()
            .and_then(|state| state.function.get_block(state.current))
            .is_some_and(|b| b.is_terminated())
    }

    pub fn jump(&mut self, target: BasicBlockId) -> CompileResult<()> {
        self.set_terminator(Terminator::Jump(target))
    }

    pub fn branch(
        &mut self,
        cond: IrValue,
        then_block: BasicBlockId,
        else_block: BasicBlockId,
    ) -> CompileResult<()> {
        self.set_terminator(Terminator::Branch {
            cond,
            then_block,
            else_block,
        })
    }

    // ------------------------------------------------------------------
    // Memory
    // ------------------------------------------------------------------

    pub fn load(&mut self, ptr: IrValue, ty: TypeId) -> CompileResult<Register> {
        let dest = self.fresh_register(ty)?;
        self.emit(IrInstr::Load { dest, ptr })?;
        Ok(dest)
    }

    pub fn store(&mut self, value: IrValue, ptr: IrValue) -> CompileResult<()> {
        self.emit(IrInstr::Store { value, ptr })
    }

    pub fn constant_value(&mut self, value: PrerunValue, range: FileRange) -> Value {
        let constant = prerun::to_ir_constant(&mut self.types, &mut self.ir, &value);
        Value::constant(constant, value, range)
    }

    /// Result of expressions that produce nothing
    pub fn void_value(range: FileRange) -> Value {
        Value::temporary(
            IrConstant::new(TypeContext::VOID, ConstantKind::Undef),
            TypeContext::VOID,
            range,
        )
    }

    /// A reference value as the address it refers to
    pub(crate) fn reference_address(&mut self, value: Value) -> CompileResult<Value> {
        if value.storage == Storage::Temporary {
            return Ok(value);
        }
        let ptr = self.load(value.ir.clone(), value.ty)?;
        Ok(Value::temporary(ptr, value.ty, value.range))
    }

    /// The value itself, loading it when it lives in memory
    pub fn to_rvalue(&mut self, value: Value) -> CompileResult<Value> {
        if let Some(reference) = self.types.reference_info(value.ty) {
            let range = value.range;
            let address = self.reference_address(value)?;
            let loaded = self.load(address.ir, reference.subtype)?;
            return Ok(Value::temporary(loaded, reference.subtype, range));
        }
        if value.storage == Storage::Temporary {
            return Ok(value);
        }
        if let (Some(known), false) = (&value.prerun, value.is_variable) {
            let known = known.clone();
            return Ok(self.constant_value(known, value.range));
        }
        let loaded = self.load(value.ir.clone(), value.ty)?;
        let mut result = Value::temporary(loaded, value.ty, value.range);
        result.prerun = value.prerun.filter(|_| !value.is_variable);
        Ok(result)
    }

    /// The memory a value lives in, if it is addressable
    pub fn as_place(&mut self, value: Value) -> CompileResult<Option<Value>> {
        if let Some(reference) = self.types.reference_info(value.ty) {
            let range = value.range;
            let local = value.local;
            let address = self.reference_address(value)?;
            let mut place = Value::at(
                address.ir,
                reference.subtype,
                reference.is_subtype_variable,
                Storage::Pointee,
                range,
            );
            place.local = local;
            return Ok(Some(place));
        }
        if value.storage == Storage::Temporary {
            return Ok(None);
        }
        Ok(Some(value))
    }

    /// The memory a value lives in, spilling temporaries into a fresh slot
    pub fn into_place(&mut self, value: Value) -> CompileResult<Value> {
        let range = value.range;
        let ty = value.ty;
        let prerun = value.prerun.clone();
        match self.as_place(value.clone())? {
            Some(place) => Ok(place),
            None => {
                let slot = self.alloca(ty, None)?;
                self.store(value.ir, slot.into())?;
                let mut place = Value::at(slot, ty, true, Storage::TempSlot, range);
                place.prerun = prerun;
                Ok(place)
            }
        }
    }

    /// A fresh slot to construct a value of `ty` in
    pub fn temp_slot(&mut self, ty: TypeId, range: FileRange) -> CompileResult<Value> {
        let slot = self.alloca(ty, None)?;
        Ok(Value::at(slot, ty, true, Storage::TempSlot, range))
    }

    // ------------------------------------------------------------------
    // Locals
    // ------------------------------------------------------------------

    pub fn push_scope(&mut self) -> CompileResult<()> {
        self.state_mut()?.scopes.push(FxHashMap::default());
        Ok(())
    }

    pub fn pop_scope(&mut self) -> CompileResult<()> {
        let state = self.state_mut()?;
        if state.scopes.len() > 1 {
            state.scopes.pop();
        }
        Ok(())
    }

    pub fn declare_local(&mut self, local: LocalVar) -> CompileResult<LocalId> {
        let state = self.state_mut()?;
        let name = local.name.clone();
        let existing = state
            .scopes
            .last()
            .and_then(|scope| scope.get(name.as_str()))
            .map(|id| state.locals[id.0 as usize].name.range);
        if let Some(existing) = existing {
            return Err(Diagnostic::error(format!(
                "A local named `{}` already exists in this scope",
                name
            ))
            .with_code(codes::DUPLICATE_NAME)
            .with_primary_label(name.range, "")
            .with_secondary_label(existing, "the existing local was found here")
            .into());
        }
        let id = LocalId(state.locals.len() as u32);
        state.locals.push(local);
        if let Some(scope) = state.scopes.last_mut() {
            scope.insert(name.value, id);
        }
        Ok(id)
    }

    pub fn find_local(&self, name: &str) -> Option<LocalId> {
        let state = self.func.as_ref()?;
        state.scopes.iter().rev().find_map(|s| s.get(name).copied())
    }

    pub fn local(&self, id: LocalId) -> CompileResult<&LocalVar> {
        self.state()?
            .locals
            .get(id.0 as usize)
            .ok_or_else(|| CompileError::internal(format!("unknown {}", id)))
    }

    pub fn local_value(&self, id: LocalId, range: FileRange) -> CompileResult<Value> {
        let local = self.local(id)?;
        let mut value = if local.is_reference {
            Value::temporary(local.address.clone(), local.ty, range)
        } else {
            Value::at(local.address.clone(), local.ty, local.is_variable, Storage::Stack, range)
        };
        value.prerun = local.prerun.clone();
        Ok(value.with_local(id))
    }

    pub fn self_value(&self, range: FileRange) -> CompileResult<Value> {
        let this = self
            .func
            .as_ref()
            .and_then(|state| state.self_value.as_ref())
            .ok_or_else(|| {
                CompileError::at(
                    codes::INVALID_EXPRESSION,
                    "`''` can only be used inside member functions",
                    range,
                )
            })?;
        Ok(Value::at(this.address.clone(), this.ty, this.is_variable, Storage::Pointee, range))
    }
}
