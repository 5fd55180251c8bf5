//! Type context for managing types and type interning

use rustc_hash::FxHashMap;

use super::defs::{
    ChoiceDef, ChoiceId, DoneSkill, DoneSkillId, MemberFunction, MemberKind, MixDef, MixId,
    SkillDef, SkillId, StructDef, StructId,
};
use super::ty::{
    ArrayType, FloatKind, FunctionType, FutureType, MarkOwner, MarkType, NativeKind, NativeRepr,
    ReferenceType, TupleType, Type, TypeId, VectorType,
};

/// Size and alignment of a sized type, in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub size: u64,
    pub align: u64,
}

impl Layout {
    pub fn new(size: u64, align: u64) -> Self {
        Self { size, align }
    }

    fn scalar(bits: u32) -> Self {
        let bytes = u64::from(bits).div_ceil(8).next_power_of_two();
        Self::new(bytes, bytes.min(16))
    }
}

fn align_to(offset: u64, align: u64) -> u64 {
    if align <= 1 {
        offset
    } else {
        offset.div_ceil(align) * align
    }
}

/// Integer shape of a type: bit width and signedness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntInfo {
    pub bits: u32,
    pub is_signed: bool,
}

/// Type context that manages all types of one compilation
///
/// Identical types always receive the same [`TypeId`], so type equality is
/// an id comparison. Nominal types (expanded, mix, choice) are interned by
/// the identity of their definition.
#[derive(Debug, Clone)]
pub struct TypeContext {
    types: Vec<Type>,
    type_to_id: FxHashMap<Type, TypeId>,
    structs: Vec<StructDef>,
    mixes: Vec<MixDef>,
    choices: Vec<ChoiceDef>,
    skills: Vec<SkillDef>,
    done_skills: Vec<DoneSkill>,
    done_by_target: FxHashMap<TypeId, Vec<DoneSkillId>>,
    pointer_width: u32,
}

impl Default for TypeContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeContext {
    pub const VOID: TypeId = TypeId(0);
    pub const BOOL: TypeId = TypeId(1);
    pub const CHAR: TypeId = TypeId(2);
    pub const STR: TypeId = TypeId(3);
    pub const USIZE: TypeId = TypeId(4);
    pub const I32: TypeId = TypeId(5);
    pub const U8: TypeId = TypeId(6);
    pub const F64: TypeId = TypeId(7);

    pub fn new() -> Self {
        Self::with_pointer_width(64)
    }

    pub fn with_pointer_width(pointer_width: u32) -> Self {
        let mut ctx = TypeContext {
            types: Vec::new(),
            type_to_id: FxHashMap::default(),
            structs: Vec::new(),
            mixes: Vec::new(),
            choices: Vec::new(),
            skills: Vec::new(),
            done_skills: Vec::new(),
            done_by_target: FxHashMap::default(),
            pointer_width,
        };

        // Order must match the associated constants above
        ctx.intern(Type::Void);
        ctx.intern(Type::Bool);
        ctx.intern(Type::Char);
        ctx.intern(Type::StringSlice);
        ctx.intern(Type::Native(NativeKind::Usize));
        ctx.intern(Type::Integer { bits: 32 });
        ctx.intern(Type::Unsigned { bits: 8 });
        ctx.intern(Type::Float(FloatKind::F64));

        ctx
    }

    pub fn pointer_width(&self) -> u32 {
        self.pointer_width
    }

    /// Intern a type, returning its TypeId
    ///
    /// If the type already exists, returns the existing TypeId.
    /// Otherwise, allocates a new TypeId and stores the type.
    pub fn intern(&mut self, ty: Type) -> TypeId {
        if let Some(&id) = self.type_to_id.get(&ty) {
            return id;
        }

        let id = TypeId(self.types.len() as u32);
        self.types.push(ty.clone());
        self.type_to_id.insert(ty, id);
        id
    }

    /// Look up a type's ID without interning
    pub fn lookup(&self, ty: &Type) -> Option<TypeId> {
        self.type_to_id.get(ty).copied()
    }

    /// Get a type by its TypeId
    ///
    /// Ids are only handed out by this context, so every id is valid here.
    pub fn get(&self, id: TypeId) -> &Type {
        &self.types[id.index()]
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn is_same(&self, a: TypeId, b: TypeId) -> bool {
        a == b
    }

    pub fn integer(&mut self, bits: u32) -> TypeId {
        self.intern(Type::Integer { bits })
    }

    pub fn unsigned(&mut self, bits: u32) -> TypeId {
        self.intern(Type::Unsigned { bits })
    }

    pub fn float(&mut self, kind: FloatKind) -> TypeId {
        self.intern(Type::Float(kind))
    }

    pub fn native(&mut self, kind: NativeKind) -> TypeId {
        self.intern(Type::Native(kind))
    }

    pub fn mark(&mut self, mark: MarkType) -> TypeId {
        self.intern(Type::Mark(mark))
    }

    /// Plain single, non-nullable, anonymous mark
    pub fn mark_to(&mut self, subtype: TypeId, is_subtype_variable: bool) -> TypeId {
        self.mark(MarkType {
            subtype,
            owner: MarkOwner::Anonymous,
            is_nullable: false,
            is_slice: false,
            is_subtype_variable,
        })
    }

    pub fn reference(&mut self, subtype: TypeId, is_subtype_variable: bool) -> TypeId {
        self.intern(Type::Reference(ReferenceType {
            subtype,
            is_subtype_variable,
        }))
    }

    pub fn array(&mut self, element: TypeId, length: u64) -> TypeId {
        self.intern(Type::Array(ArrayType { element, length }))
    }

    pub fn vector(&mut self, element: TypeId, count: u32, is_scalable: bool) -> TypeId {
        self.intern(Type::Vector(VectorType {
            element,
            count,
            is_scalable,
        }))
    }

    pub fn tuple(&mut self, members: Vec<TypeId>, is_packed: bool) -> TypeId {
        self.intern(Type::Tuple(TupleType { members, is_packed }))
    }

    pub fn function(
        &mut self,
        return_type: TypeId,
        args: Vec<TypeId>,
        is_variadic: bool,
    ) -> TypeId {
        self.intern(Type::Function(FunctionType {
            return_type,
            args,
            is_variadic,
        }))
    }

    pub fn future(&mut self, subtype: TypeId, is_packed: bool) -> TypeId {
        self.intern(Type::Future(FutureType { subtype, is_packed }))
    }

    pub fn maybe(&mut self, subtype: TypeId) -> TypeId {
        self.intern(Type::Maybe(subtype))
    }

    pub fn typed(&mut self, subtype: TypeId) -> TypeId {
        self.intern(Type::Typed(subtype))
    }

    pub fn create_struct(&mut self, def: StructDef) -> TypeId {
        let id = StructId(self.structs.len() as u32);
        self.structs.push(def);
        self.intern(Type::Struct(id))
    }

    pub fn struct_def(&self, id: StructId) -> &StructDef {
        &self.structs[id.index()]
    }

    pub fn struct_def_mut(&mut self, id: StructId) -> &mut StructDef {
        &mut self.structs[id.index()]
    }

    pub fn create_mix(&mut self, def: MixDef) -> TypeId {
        let id = MixId(self.mixes.len() as u32);
        self.mixes.push(def);
        self.intern(Type::Mix(id))
    }

    pub fn mix_def(&self, id: MixId) -> &MixDef {
        &self.mixes[id.index()]
    }

    pub fn mix_def_mut(&mut self, id: MixId) -> &mut MixDef {
        &mut self.mixes[id.index()]
    }

    pub fn create_choice(&mut self, def: ChoiceDef) -> TypeId {
        let id = ChoiceId(self.choices.len() as u32);
        self.choices.push(def);
        self.intern(Type::Choice(id))
    }

    pub fn choice_def(&self, id: ChoiceId) -> &ChoiceDef {
        &self.choices[id.index()]
    }

    pub fn add_skill(&mut self, def: SkillDef) -> SkillId {
        let id = SkillId(self.skills.len() as u32);
        self.skills.push(def);
        id
    }

    pub fn skill_def(&self, id: SkillId) -> &SkillDef {
        &self.skills[id.index()]
    }

    pub fn add_done_skill(&mut self, done: DoneSkill) -> DoneSkillId {
        let id = DoneSkillId(self.done_skills.len() as u32);
        self.done_by_target.entry(done.target).or_default().push(id);
        self.done_skills.push(done);
        id
    }

    pub fn done_skill(&self, id: DoneSkillId) -> &DoneSkill {
        &self.done_skills[id.index()]
    }

    pub fn done_skill_mut(&mut self, id: DoneSkillId) -> &mut DoneSkill {
        &mut self.done_skills[id.index()]
    }

    pub fn done_skills_for(&self, target: TypeId) -> &[DoneSkillId] {
        self.done_by_target
            .get(&target)
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
    }

    pub fn struct_of(&self, ty: TypeId) -> Option<&StructDef> {
        match self.get(ty) {
            Type::Struct(id) => Some(self.struct_def(*id)),
            _ => None,
        }
    }

    pub fn mix_of(&self, ty: TypeId) -> Option<&MixDef> {
        match self.get(ty) {
            Type::Mix(id) => Some(self.mix_def(*id)),
            _ => None,
        }
    }

    pub fn choice_of(&self, ty: TypeId) -> Option<&ChoiceDef> {
        match self.get(ty) {
            Type::Choice(id) => Some(self.choice_def(*id)),
            _ => None,
        }
    }

    /// Expanded, mix or choice type with the given full name
    pub fn find_named(&self, full_name: &str) -> Option<TypeId> {
        let nominal = self
            .structs
            .iter()
            .position(|d| d.full_name == full_name)
            .map(|i| Type::Struct(StructId(i as u32)))
            .or_else(|| {
                self.mixes
                    .iter()
                    .position(|d| d.full_name == full_name)
                    .map(|i| Type::Mix(MixId(i as u32)))
            })
            .or_else(|| {
                self.choices
                    .iter()
                    .position(|d| d.full_name == full_name)
                    .map(|i| Type::Choice(ChoiceId(i as u32)))
            })?;
        self.lookup(&nominal)
    }

    /// Every member function of `ty`: its own first, then done skills in
    /// declaration order
    pub fn members_of(&self, ty: TypeId) -> Vec<&MemberFunction> {
        let mut members: Vec<&MemberFunction> = Vec::new();
        if let Some(def) = self.struct_of(ty) {
            members.extend(def.members.iter());
        }
        for done in self.done_skills_for(ty) {
            members.extend(self.done_skill(*done).members.iter());
        }
        members
    }

    pub fn has_member(&self, ty: TypeId, kind: MemberKind) -> bool {
        self.members_of(ty).iter().any(|m| m.kind == kind)
    }

    pub fn is_reference(&self, ty: TypeId) -> bool {
        matches!(self.get(ty), Type::Reference(_))
    }

    pub fn reference_info(&self, ty: TypeId) -> Option<ReferenceType> {
        self.get(ty).as_reference().copied()
    }

    /// The referred type for references, the type itself otherwise
    pub fn non_reference(&self, ty: TypeId) -> TypeId {
        match self.get(ty) {
            Type::Reference(r) => r.subtype,
            _ => ty,
        }
    }

    pub fn int_info(&self, ty: TypeId) -> Option<IntInfo> {
        match self.get(ty) {
            Type::Integer { bits } => Some(IntInfo {
                bits: *bits,
                is_signed: true,
            }),
            Type::Unsigned { bits } => Some(IntInfo {
                bits: *bits,
                is_signed: false,
            }),
            Type::Native(kind) => match kind.repr(self.pointer_width) {
                NativeRepr::Signed(bits) => Some(IntInfo { bits, is_signed: true }),
                NativeRepr::Unsigned(bits) => Some(IntInfo {
                    bits,
                    is_signed: false,
                }),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn float_kind(&self, ty: TypeId) -> Option<FloatKind> {
        match self.get(ty) {
            Type::Float(kind) => Some(*kind),
            Type::Native(kind) => match kind.repr(self.pointer_width) {
                NativeRepr::Float(kind) => Some(kind),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn is_integral(&self, ty: TypeId) -> bool {
        self.int_info(ty).is_some()
    }

    pub fn is_numeric(&self, ty: TypeId) -> bool {
        self.int_info(ty).is_some() || self.float_kind(ty).is_some()
    }

    pub fn is_cstring(&self, ty: TypeId) -> bool {
        matches!(self.get(ty), Type::Native(NativeKind::CString))
    }

    pub fn bitwidth(&self, ty: TypeId) -> Option<u32> {
        match self.get(ty) {
            Type::Bool => Some(1),
            Type::Char => Some(32),
            Type::Float(kind) => Some(kind.bitwidth()),
            Type::Choice(id) => self.bitwidth(self.choice_def(*id).underlying),
            Type::Native(NativeKind::CString) => Some(self.pointer_width),
            _ => self
                .int_info(ty)
                .map(|info| info.bits)
                .or_else(|| self.float_kind(ty).map(|k| k.bitwidth())),
        }
    }

    /// Whether values of the type can exist at compile time
    pub fn can_be_prerun(&self, ty: TypeId) -> bool {
        match self.get(ty) {
            Type::Integer { .. }
            | Type::Unsigned { .. }
            | Type::Float(_)
            | Type::Char
            | Type::Bool
            | Type::StringSlice
            | Type::Choice(_)
            | Type::Typed(_) => true,
            Type::Native(kind) => *kind != NativeKind::CString,
            Type::Array(a) => self.can_be_prerun(a.element),
            Type::Vector(v) => !v.is_scalable && self.can_be_prerun(v.element),
            Type::Tuple(t) => t.members.iter().all(|m| self.can_be_prerun(*m)),
            Type::Maybe(sub) => self.can_be_prerun(*sub),
            Type::Struct(id) => {
                let def = self.struct_def(*id);
                def.is_complete()
                    && !self.has_custom_lifecycle(ty)
                    && def.fields().iter().all(|f| self.can_be_prerun(f.ty))
            }
            Type::Mix(id) => self
                .mix_def(*id)
                .variants()
                .iter()
                .all(|v| v.payload.map_or(true, |p| self.can_be_prerun(p))),
            Type::Void
            | Type::Mark(_)
            | Type::Reference(_)
            | Type::Function(_)
            | Type::Future(_) => false,
        }
    }

    /// Whether a user-defined copy, move or destructor exists
    fn has_custom_lifecycle(&self, ty: TypeId) -> bool {
        self.members_of(ty).iter().any(|m| {
            matches!(
                m.kind,
                MemberKind::CopyConstructor
                    | MemberKind::MoveConstructor
                    | MemberKind::CopyAssignment
                    | MemberKind::MoveAssignment
                    | MemberKind::Destructor
            )
        })
    }

    /// Whether a copy is a plain bitwise copy
    pub fn has_simple_copy(&self, ty: TypeId) -> bool {
        match self.get(ty) {
            Type::Mark(m) => m.owner != MarkOwner::Heap,
            Type::Future(_) => false,
            Type::Array(a) => self.has_simple_copy(a.element),
            Type::Vector(v) => self.has_simple_copy(v.element),
            Type::Tuple(t) => t.members.iter().all(|m| self.has_simple_copy(*m)),
            Type::Maybe(sub) => self.has_simple_copy(*sub),
            Type::Struct(id) => {
                !self.has_member(ty, MemberKind::CopyConstructor)
                    && !self.has_member(ty, MemberKind::Destructor)
                    && self
                        .struct_def(*id)
                        .fields()
                        .iter()
                        .all(|f| self.has_simple_copy(f.ty))
            }
            Type::Mix(id) => self
                .mix_def(*id)
                .variants()
                .iter()
                .all(|v| v.payload.map_or(true, |p| self.has_simple_copy(p))),
            _ => true,
        }
    }

    /// Whether a move is a plain bitwise copy followed by resetting the source
    pub fn has_simple_move(&self, ty: TypeId) -> bool {
        match self.get(ty) {
            Type::Future(_) => true,
            Type::Array(a) => self.has_simple_move(a.element),
            Type::Vector(v) => self.has_simple_move(v.element),
            Type::Tuple(t) => t.members.iter().all(|m| self.has_simple_move(*m)),
            Type::Maybe(sub) => self.has_simple_move(*sub),
            Type::Struct(id) => {
                !self.has_member(ty, MemberKind::MoveConstructor)
                    && !self.has_member(ty, MemberKind::Destructor)
                    && self
                        .struct_def(*id)
                        .fields()
                        .iter()
                        .all(|f| self.has_simple_move(f.ty))
            }
            Type::Mix(id) => self
                .mix_def(*id)
                .variants()
                .iter()
                .all(|v| v.payload.map_or(true, |p| self.has_simple_move(p))),
            _ => true,
        }
    }

    pub fn is_copy_constructible(&self, ty: TypeId) -> bool {
        self.has_simple_copy(ty) || self.has_member(ty, MemberKind::CopyConstructor)
    }

    pub fn is_move_constructible(&self, ty: TypeId) -> bool {
        self.has_simple_move(ty) || self.has_member(ty, MemberKind::MoveConstructor)
    }

    pub fn is_type_sized(&self, ty: TypeId) -> bool {
        self.layout(ty).is_some()
    }

    pub fn size_in_bytes(&self, ty: TypeId) -> Option<u64> {
        self.layout(ty).map(|l| l.size)
    }

    fn pointer_layout(&self) -> Layout {
        let bytes = u64::from(self.pointer_width / 8);
        Layout::new(bytes, bytes)
    }

    fn fat_pointer_layout(&self) -> Layout {
        let bytes = u64::from(self.pointer_width / 8);
        Layout::new(bytes * 2, bytes)
    }

    /// C-style layout of a sequence of members
    fn aggregate_layout(&self, members: &[TypeId], is_packed: bool) -> Option<Layout> {
        let mut offset = 0u64;
        let mut align = 1u64;
        for member in members {
            let layout = self.layout(*member)?;
            if !is_packed {
                offset = align_to(offset, layout.align);
                align = align.max(layout.align);
            }
            offset += layout.size;
        }
        Some(Layout::new(align_to(offset, align), align))
    }

    /// Largest payload of a mix, as (size, align); `(0, 1)` without payloads
    pub fn mix_payload_layout(&self, id: MixId) -> Option<Layout> {
        let mut result = Layout::new(0, 1);
        for variant in self.mix_def(id).variants() {
            if let Some(payload) = variant.payload {
                let layout = self.layout(payload)?;
                result.size = result.size.max(layout.size);
                result.align = result.align.max(layout.align);
            }
        }
        Some(result)
    }

    pub fn layout(&self, ty: TypeId) -> Option<Layout> {
        match self.get(ty) {
            Type::Void | Type::Function(_) | Type::Typed(_) => None,
            Type::Integer { bits } | Type::Unsigned { bits } => Some(Layout::scalar(*bits)),
            Type::Float(kind) => Some(match kind {
                FloatKind::F80 => Layout::new(16, 16),
                other => Layout::scalar(other.bitwidth()),
            }),
            Type::Char => Some(Layout::scalar(32)),
            Type::Bool => Some(Layout::scalar(1)),
            Type::StringSlice => Some(self.fat_pointer_layout()),
            Type::Mark(m) if m.is_slice => Some(self.fat_pointer_layout()),
            Type::Mark(_) | Type::Reference(_) | Type::Future(_) => Some(self.pointer_layout()),
            Type::Array(a) => {
                let element = self.layout(a.element)?;
                Some(Layout::new(element.size * a.length, element.align))
            }
            Type::Vector(v) => {
                let element = self.layout(v.element)?;
                let size = (element.size * u64::from(v.count)).next_power_of_two();
                Some(Layout::new(size, size.min(16)))
            }
            Type::Tuple(t) => self.aggregate_layout(&t.members, t.is_packed),
            Type::Struct(id) => {
                let def = self.struct_def(*id);
                let fields = def.fields.as_ref()?;
                let members: Vec<TypeId> = fields.iter().map(|f| f.ty).collect();
                self.aggregate_layout(&members, false)
            }
            Type::Mix(id) => {
                let def = self.mix_def(*id);
                def.variants.as_ref()?;
                let tag = Layout::scalar(def.tag_bits());
                let payload = self.mix_payload_layout(*id)?;
                if payload.size == 0 {
                    return Some(tag);
                }
                if def.is_packed {
                    return Some(Layout::new(tag.size + payload.size, 1));
                }
                let align = tag.align.max(payload.align);
                let offset = align_to(tag.size, payload.align);
                Some(Layout::new(align_to(offset + payload.size, align), align))
            }
            Type::Choice(id) => self.layout(self.choice_def(*id).underlying),
            Type::Maybe(sub) => {
                let sub = *sub;
                self.aggregate_layout(&[TypeContext::BOOL, sub], false)
            }
            Type::Native(kind) => Some(match kind.repr(self.pointer_width) {
                NativeRepr::Signed(bits) | NativeRepr::Unsigned(bits) => Layout::scalar(bits),
                NativeRepr::Float(kind) => Layout::scalar(kind.bitwidth()),
                NativeRepr::Pointer => self.pointer_layout(),
            }),
        }
    }

    /// Canonical source-level spelling of a type
    pub fn type_name(&self, ty: TypeId) -> String {
        match self.get(ty) {
            Type::Integer { bits } => format!("i{}", bits),
            Type::Unsigned { bits } => format!("u{}", bits),
            Type::Float(kind) => kind.name().to_string(),
            Type::Char => "char".to_string(),
            Type::Bool => "bool".to_string(),
            Type::Void => "void".to_string(),
            Type::StringSlice => "str".to_string(),
            Type::Mark(m) => {
                let mut out = String::from(if m.is_slice { "multi:[" } else { "mark:[" });
                if m.is_subtype_variable {
                    out.push_str("var ");
                }
                out.push_str(&self.type_name(m.subtype));
                match m.owner {
                    MarkOwner::Anonymous => {}
                    MarkOwner::Heap => out.push_str(", heap"),
                    MarkOwner::Type(owner) => {
                        out.push_str(&format!(", type({})", self.type_name(owner)))
                    }
                }
                out.push(']');
                if m.is_nullable {
                    out.push('?');
                }
                out
            }
            Type::Reference(r) => format!(
                "ref:[{}{}]",
                if r.is_subtype_variable { "var " } else { "" },
                self.type_name(r.subtype)
            ),
            Type::Array(a) => format!("{}[{}]", self.type_name(a.element), a.length),
            Type::Vector(v) => format!(
                "vec:[{}{}, {}]",
                if v.is_scalable { "?" } else { "" },
                v.count,
                self.type_name(v.element)
            ),
            Type::Tuple(t) => {
                let members: Vec<String> = t.members.iter().map(|m| self.type_name(*m)).collect();
                format!(
                    "{}({})",
                    if t.is_packed { "pack:" } else { "" },
                    members.join(", ")
                )
            }
            Type::Struct(id) => self.struct_def(*id).full_name.clone(),
            Type::Mix(id) => self.mix_def(*id).full_name.clone(),
            Type::Choice(id) => self.choice_def(*id).full_name.clone(),
            Type::Function(f) => {
                let mut args: Vec<String> = f.args.iter().map(|a| self.type_name(*a)).collect();
                if f.is_variadic {
                    args.push("...".to_string());
                }
                format!("fn({}) -> {}", args.join(", "), self.type_name(f.return_type))
            }
            Type::Future(f) => format!(
                "future:[{}{}]",
                if f.is_packed { "pack, " } else { "" },
                self.type_name(f.subtype)
            ),
            Type::Maybe(sub) => format!("maybe:[{}]", self.type_name(*sub)),
            Type::Typed(sub) => format!("type:[{}]", self.type_name(*sub)),
            Type::Native(kind) => kind.name().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{ModId, VisibilityInfo};
    use crate::span::{FileRange, Identifier};
    use crate::types::defs::{FieldDef, MixVariant};

    fn ident(name: &str) -> Identifier {
        Identifier::new(name, FileRange::default())
    }

    fn new_struct(
        ctx: &mut TypeContext,
        name: &str,
        fields: Option<Vec<(&str, TypeId)>>,
    ) -> TypeId {
        let mut def = StructDef::new(
            ident(name),
            name.to_string(),
            ModId(0),
            VisibilityInfo::public(),
        );
        def.fields = fields.map(|fields| {
            fields
                .into_iter()
                .map(|(n, ty)| FieldDef {
                    name: ident(n),
                    ty,
                    is_variable: true,
                    visibility: VisibilityInfo::public(),
                })
                .collect()
        });
        ctx.create_struct(def)
    }

    #[test]
    fn test_type_interning() {
        let mut ctx = TypeContext::new();
        let u8_ty = ctx.unsigned(8);
        assert_eq!(u8_ty, TypeContext::U8);
        let a = ctx.array(u8_ty, 4);
        let b = ctx.array(u8_ty, 4);
        assert_eq!(a, b);
        assert_ne!(a, ctx.array(u8_ty, 5));
    }

    #[test]
    fn test_reserved_ids() {
        let ctx = TypeContext::new();
        assert_eq!(ctx.get(TypeContext::VOID), &Type::Void);
        assert_eq!(ctx.get(TypeContext::BOOL), &Type::Bool);
        assert_eq!(ctx.get(TypeContext::STR), &Type::StringSlice);
        assert_eq!(ctx.get(TypeContext::I32), &Type::Integer { bits: 32 });
    }

    #[test]
    fn test_nominal_types_are_distinct() {
        let mut ctx = TypeContext::new();
        let a = new_struct(&mut ctx, "A", Some(vec![]));
        let b = new_struct(&mut ctx, "A", Some(vec![]));
        assert_ne!(a, b);
    }

    #[test]
    fn test_type_names() {
        let mut ctx = TypeContext::new();
        let i64_ty = ctx.integer(64);
        let var_ref = ctx.reference(i64_ty, true);
        assert_eq!(ctx.type_name(var_ref), "ref:[var i64]");

        let heap = ctx.mark(MarkType {
            subtype: TypeContext::U8,
            owner: MarkOwner::Heap,
            is_nullable: true,
            is_slice: true,
            is_subtype_variable: true,
        });
        assert_eq!(ctx.type_name(heap), "multi:[var u8, heap]?");

        let tuple = ctx.tuple(vec![TypeContext::BOOL, TypeContext::CHAR], false);
        assert_eq!(ctx.type_name(tuple), "(bool, char)");

        let func = ctx.function(TypeContext::VOID, vec![TypeContext::I32], true);
        assert_eq!(ctx.type_name(func), "fn(i32, ...) -> void");
    }

    #[test]
    fn test_layouts() {
        let mut ctx = TypeContext::new();
        let u16_ty = ctx.unsigned(16);
        let i64_ty = ctx.integer(64);
        let s = new_struct(
            &mut ctx,
            "S",
            Some(vec![("a", TypeContext::U8), ("b", i64_ty), ("c", u16_ty)]),
        );
        assert_eq!(ctx.layout(s), Some(Layout::new(24, 8)));

        let packed = ctx.tuple(vec![TypeContext::U8, i64_ty], true);
        assert_eq!(ctx.layout(packed), Some(Layout::new(9, 1)));

        assert_eq!(ctx.size_in_bytes(TypeContext::STR), Some(16));
        let arr = ctx.array(u16_ty, 3);
        assert_eq!(ctx.size_in_bytes(arr), Some(6));
        let i24 = ctx.integer(24);
        assert_eq!(ctx.size_in_bytes(i24), Some(4));
    }

    #[test]
    fn test_opaque_struct_is_not_sized() {
        let mut ctx = TypeContext::new();
        let s = new_struct(&mut ctx, "Opaque", None);
        assert!(!ctx.is_type_sized(s));
        let mark = ctx.mark_to(s, false);
        assert!(ctx.is_type_sized(mark));
        assert!(!ctx.is_type_sized(TypeContext::VOID));
    }

    #[test]
    fn test_mix_layout() {
        let mut ctx = TypeContext::new();
        let i64_ty = ctx.integer(64);
        let mix = ctx.create_mix(MixDef {
            name: ident("M"),
            full_name: "M".to_string(),
            module: ModId(0),
            visibility: VisibilityInfo::public(),
            variants: Some(vec![
                MixVariant {
                    name: ident("A"),
                    payload: Some(i64_ty),
                },
                MixVariant {
                    name: ident("B"),
                    payload: None,
                },
                MixVariant {
                    name: ident("C"),
                    payload: Some(TypeContext::U8),
                },
            ]),
            default_variant: None,
            is_packed: false,
        });
        assert_eq!(ctx.layout(mix), Some(Layout::new(16, 8)));
    }

    #[test]
    fn test_copy_and_move_predicates() {
        let mut ctx = TypeContext::new();
        let heap = ctx.mark(MarkType {
            subtype: TypeContext::U8,
            owner: MarkOwner::Heap,
            is_nullable: false,
            is_slice: false,
            is_subtype_variable: true,
        });
        assert!(!ctx.has_simple_copy(heap));
        assert!(ctx.has_simple_move(heap));

        let holder = new_struct(&mut ctx, "Holder", Some(vec![("data", heap)]));
        assert!(!ctx.has_simple_copy(holder));
        assert!(ctx.has_simple_move(holder));
        assert!(!ctx.is_copy_constructible(holder));

        let plain = ctx.mark_to(TypeContext::U8, false);
        assert!(ctx.has_simple_copy(plain));
    }

    #[test]
    fn test_prerun_capability() {
        let mut ctx = TypeContext::new();
        assert!(ctx.can_be_prerun(TypeContext::I32));
        assert!(ctx.can_be_prerun(TypeContext::STR));
        let mark = ctx.mark_to(TypeContext::U8, false);
        assert!(!ctx.can_be_prerun(mark));
        let arr = ctx.array(TypeContext::CHAR, 2);
        assert!(ctx.can_be_prerun(arr));
        let cstr = ctx.native(NativeKind::CString);
        assert!(!ctx.can_be_prerun(cstr));
    }

    #[test]
    fn test_native_types_follow_pointer_width() {
        let ctx = TypeContext::with_pointer_width(32);
        assert_eq!(ctx.bitwidth(TypeContext::USIZE), Some(32));
        assert_eq!(
            ctx.int_info(TypeContext::USIZE),
            Some(IntInfo {
                bits: 32,
                is_signed: false
            })
        );
    }
}
