//! Analysis and rewriting of SPIR-V shader modules, for use by a renderer's
//! shader pipeline.
//!
//! A [`ShaderModule`] is built from a complete SPIR-V binary and its pipeline
//! [`Stage`]. Construction parses every instruction into a table of
//! definitions, flattens the `$Global` uniform block generated by HLSL
//! front-ends, assigns missing interface locations, reflects inputs, outputs
//! and uniform parameters (with the [`Capabilities`] the module requires),
//! and strips debuginfo. Stages are then linked (see [`ShaderModule::link_inputs`])
//! by matching each input to the previous stage's output of the same name.
//!
//! Types in reflection data are interned in a [`Context`], which is meant to
//! be owned by a compilation session and shared (by `Arc`) by its modules,
//! which are `Send + Sync`.

use std::hash::BuildHasherDefault;

mod context;
pub use context::{Context, InternInCx, Type};

pub mod caps;
pub mod defs;
pub mod module;
pub mod reflect;
pub mod scalar;
pub mod types;

pub mod passes {
    // NOTE: inline `mod` to avoid adding APIs here, it's just namespacing.

    pub mod flatten;
    pub mod link;
    pub mod locations;
}

pub mod spv;

pub use caps::Capabilities;
pub use module::{ModuleOptions, ShaderModule, Stage, Variable};
pub use scalar::ScalarKind;
pub use spv::parse::ParseError;
pub use types::{ImageAccess, StructDef, StructMember, TextureType, TypeDef};

pub type FxIndexMap<K, V> = indexmap::IndexMap<K, V, BuildHasherDefault<rustc_hash::FxHasher>>;
