use crate::scalar::ScalarKind;
use crate::types::{TypeDef, TypeDisplay};
use elsa::sync::{FrozenMap, FrozenVec};
use std::convert::TryInto;
use std::hash::Hash;

/// Context object with the shader type registry.
///
/// Types are interned: structurally equal [`TypeDef`]s always produce the
/// same [`Type`] handle within one `Context`, so handles can be compared
/// directly instead of comparing definitions. Every compilation session
/// owns its own `Context`, shared between modules (and threads) by `Arc`.
#[derive(Debug)]
pub struct Context {
    types: Interner<TypeDef>,
}

/// Dispatch helper, to allow implementing interning logic on
/// the type passed to `cx.intern(...)`.
pub trait InternInCx {
    type Interned;

    fn intern_in_cx(self, cx: &Context) -> Self::Interned;
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Context { types: Interner::default() }
    }

    pub fn intern<T: InternInCx>(&self, x: T) -> T::Interned {
        x.intern_in_cx(self)
    }

    /// Returns a [`std::fmt::Display`] adapter, printing `ty` in GLSL-like syntax.
    pub fn display(&self, ty: Type) -> TypeDisplay<'_> {
        TypeDisplay { cx: self, ty }
    }
}

/// Append-only interner, usable from several threads at once.
///
/// `indices` is only written while holding its own lock (in `insert_with`),
/// so `values` always grows in the same order indices are handed out.
#[derive(Debug)]
struct Interner<T> {
    values: FrozenVec<Box<T>>,
    indices: FrozenMap<T, Box<u32>>,
}

impl<T: Eq + Hash> Default for Interner<T> {
    fn default() -> Self {
        Self { values: FrozenVec::new(), indices: FrozenMap::new() }
    }
}

impl<T: Clone + Eq + Hash> Interner<T> {
    #[track_caller]
    fn intern(&self, value: T) -> u32 {
        if let Some(&i) = self.indices.get(&value) {
            return i;
        }
        *self.indices.insert_with(value.clone(), || {
            let i = self.values.push_get_index(Box::new(value));
            Box::new(i.try_into().expect("interner overflowed u32"))
        })
    }

    #[track_caller]
    fn get(&self, i: u32) -> &T {
        self.values.get(i as usize).expect("handle from a different `Context`")
    }
}

/// Interned handle for a [`TypeDef`] (see [`Context`]).
//
// NOTE: `Ord` follows interning order, which is only meaningful within one
// `Context` (it is, however, a strict total order usable for map keys).
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Type(
    // FIXME(eddyb) figure out how to sneak niches into these types, to
    // allow e.g. `Option` around them to not increase the size.
    u32,
);

impl std::ops::Index<Type> for Context {
    type Output = TypeDef;

    fn index(&self, ty: Type) -> &TypeDef {
        self.types.get(ty.0)
    }
}

impl InternInCx for TypeDef {
    type Interned = Type;

    fn intern_in_cx(self, cx: &Context) -> Type {
        Type(cx.types.intern(self))
    }
}

impl InternInCx for ScalarKind {
    type Interned = Type;

    fn intern_in_cx(self, cx: &Context) -> Type {
        cx.intern(TypeDef::Scalar(self))
    }
}
