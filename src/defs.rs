//! Dense, ID-indexed table of what each SPIR-V ID means.

use crate::context::Type;
use crate::spv::{self, spec};
use smallvec::SmallVec;
use std::ops::{Index, IndexMut};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum DefKind {
    #[default]
    None,
    Type,
    TypePointer,
    Variable,
    Constant,
    ExtInstImport,
}

/// What one SPIR-V ID was defined as, along with the decorations and debug
/// names this crate cares about.
///
/// Decorations and names normally precede the definition itself, so only the
/// `set_*` methods for the defining instruction touch `kind` and `ty`.
#[derive(Clone, Debug, Default)]
pub struct Definition {
    pub kind: DefKind,

    /// Debug name (also the linking key for stage interfaces), or the
    /// extended instruction set name for [`DefKind::ExtInstImport`].
    pub name: String,
    pub member_names: SmallVec<[String; 4]>,

    /// For types, the type itself (`None` for `void` and unsupported types).
    /// For pointers, the pointee type, for variables the type of the variable
    /// (not of the pointer to it), and for constants the type of the constant.
    pub ty: Option<Type>,

    pub storage_class: Option<spec::StorageClass>,
    pub builtin: Option<spec::BuiltIn>,
    pub location: Option<u32>,
    pub used: bool,

    /// First word of an `OpConstant`'s value.
    pub constant: u32,

    /// Explicit `Offset` member decorations (for struct types).
    pub member_offsets: SmallVec<[Option<u32>; 4]>,

    /// Explicit `ArrayStride` decoration (for array types).
    pub array_stride: Option<u32>,

    /// Whether this is an `OpTypeImage` with `Depth = 1`.
    pub depth_image: bool,
}

impl Definition {
    pub fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub fn set_member_name(&mut self, member: u32, name: String) {
        let member = member as usize;
        if member >= self.member_names.len() {
            self.member_names.resize(member + 1, String::new());
        }
        self.member_names[member] = name;
    }

    pub fn set_member_offset(&mut self, member: u32, offset: u32) {
        let member = member as usize;
        if member >= self.member_offsets.len() {
            self.member_offsets.resize(member + 1, None);
        }
        self.member_offsets[member] = Some(offset);
    }

    pub fn set_type(&mut self, ty: Option<Type>) {
        self.kind = DefKind::Type;
        self.ty = ty;
    }

    pub fn set_type_pointer(&mut self, storage_class: spec::StorageClass, pointee: Option<Type>) {
        self.kind = DefKind::TypePointer;
        self.storage_class = Some(storage_class);
        self.ty = pointee;
    }

    pub fn set_variable(&mut self, ty: Option<Type>, storage_class: spec::StorageClass) {
        self.kind = DefKind::Variable;
        self.ty = ty;
        self.storage_class = Some(storage_class);
    }

    pub fn set_constant(&mut self, ty: Option<Type>, value_words: &[u32]) {
        self.kind = DefKind::Constant;
        self.ty = ty;
        self.constant = value_words.first().copied().unwrap_or(0);
    }

    pub fn set_ext_inst_import(&mut self, name: String) {
        self.kind = DefKind::ExtInstImport;
        self.name = name;
    }

    pub fn mark_used(&mut self) {
        self.used = true;
    }

    /// Resets this definition, after its defining instruction was removed.
    pub fn clear(&mut self) {
        *self = Definition::default();
    }

    /// Whether this is a user-declared (i.e. not built-in) variable that lives
    /// in a location-assigned storage class (`Input`, `Output` or `UniformConstant`).
    pub fn is_interface_variable(&self) -> bool {
        self.kind == DefKind::Variable
            && self.builtin.is_none()
            && matches!(
                self.storage_class,
                Some(
                    spec::StorageClass::Input
                        | spec::StorageClass::Output
                        | spec::StorageClass::UniformConstant
                )
            )
    }
}

/// [`Definition`]s, indexed by [`spv::Id`].
///
/// Indexing with an ID beyond the table is a bug (malformed SPIR-V referring
/// to an ID past the header's bound), and panics.
#[derive(Clone, Debug, Default)]
pub struct Definitions {
    defs: Vec<Definition>,
}

impl Definitions {
    pub fn with_id_bound(id_bound: spv::Id) -> Self {
        Self { defs: vec![Definition::default(); id_bound as usize] }
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Grows the table to fit IDs below `id_bound` (e.g. after allocating new IDs).
    pub fn grow_to(&mut self, id_bound: spv::Id) {
        if self.defs.len() < id_bound as usize {
            self.defs.resize(id_bound as usize, Definition::default());
        }
    }

    pub fn get(&self, id: spv::Id) -> Option<&Definition> {
        self.defs.get(id as usize)
    }

    /// Iterates over `(id, definition)` pairs, in ascending ID order.
    pub fn iter(&self) -> impl Iterator<Item = (spv::Id, &Definition)> + '_ {
        self.defs.iter().enumerate().map(|(id, def)| (id as spv::Id, def))
    }
}

impl Index<spv::Id> for Definitions {
    type Output = Definition;

    #[track_caller]
    fn index(&self, id: spv::Id) -> &Definition {
        match self.defs.get(id as usize) {
            Some(def) => def,
            None => panic!("SPIR-V ID %{id} is out of bounds (bound is {})", self.defs.len()),
        }
    }
}

impl IndexMut<spv::Id> for Definitions {
    #[track_caller]
    fn index_mut(&mut self, id: spv::Id) -> &mut Definition {
        let bound = self.defs.len();
        match self.defs.get_mut(id as usize) {
            Some(def) => def,
            None => panic!("SPIR-V ID %{id} is out of bounds (bound is {bound})"),
        }
    }
}
