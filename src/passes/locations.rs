//! Interface location assignment and remapping.

use crate::context::{Context, Type};
use crate::defs::Definitions;
use crate::module::Stage;
use crate::spv::parse::ParseError;
use crate::spv::spec::{self, Opcode};
use crate::spv::stream::InstStream;
use crate::spv;
use crate::FxIndexMap;
use bit_vec::BitVec;
use rustc_hash::FxHashMap;
use std::borrow::Cow;

/// Locations at or above this are never tracked (explicit ones are rejected
/// while parsing).
pub const MAX_LOCATIONS: u32 = 1 << 16;

/// Set of occupied locations (growable up to [`MAX_LOCATIONS`], all bits past
/// the end are free).
#[derive(Clone, Default)]
pub struct LocationSet {
    bits: BitVec,
}

impl LocationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, loc: u32) -> bool {
        self.bits.get(loc as usize).unwrap_or(false)
    }

    pub fn insert_range(&mut self, loc: u32, count: u32) {
        let end = loc.saturating_add(count).min(MAX_LOCATIONS) as usize;
        if self.bits.len() < end {
            self.bits.grow(end - self.bits.len(), false);
        }
        for i in (loc as usize)..end {
            self.bits.set(i, true);
        }
    }

    pub fn any_in_range(&self, loc: u32, count: u32) -> bool {
        let end = (loc.saturating_add(count) as usize).min(self.bits.len());
        ((loc as usize)..end).any(|i| self.bits[i])
    }

    /// Lowest free location that is `>= from`.
    pub fn lowest_free_from(&self, from: u32) -> u32 {
        (from..).find(|&i| !self.contains(i)).unwrap_or(u32::MAX)
    }

    /// Next location after `loc` that is occupied iff `loc` is free.
    fn next_different(&self, loc: u32) -> u32 {
        let occupied = self.contains(loc);
        let tail = (loc as usize + 1..self.bits.len()).find(|&i| self.bits[i] != occupied);
        match tail {
            Some(i) => i as u32,
            None => {
                assert!(occupied, "no occupied location past {loc}");
                self.bits.len() as u32
            }
        }
    }

    /// Lowest `loc >= from` such that `loc..loc + count` is entirely free.
    ///
    /// Skips over whole occupied runs instead of testing every location.
    pub fn find_free_run(&self, from: u32, count: u32) -> u32 {
        let mut loc = self.lowest_free_from(from);
        while self.any_in_range(loc, count) {
            let next_occupied = self.next_different(loc);
            loc = self.next_different(next_occupied);
        }
        loc
    }
}

/// Decorates every non-built-in `Input`, `Output` and `UniformConstant`
/// variable lacking a `Location` with the lowest free location(s) of its
/// storage class, in ascending ID order.
///
/// In the vertex stage, an input named like a vertex position (see
/// `position_input_names`) is preferred for location 0.
///
/// Returns the number of `OpDecorate` instructions inserted (`0` when every
/// variable already had a location, in which case `stream` is left untouched),
/// or [`ParseError::LocationsExhausted`] for a variable that doesn't fit below
/// [`MAX_LOCATIONS`] (`stream` may then be partially decorated).
pub fn assign_locations(
    cx: &Context,
    stream: &mut InstStream,
    defs: &mut Definitions,
    stage: Stage,
    position_input_names: &[Cow<'static, str>],
) -> Result<usize, ParseError> {
    let num_locations = |storage_class: spec::StorageClass, ty: Option<Type>| match ty {
        None => 1,
        Some(ty) if storage_class == spec::StorageClass::UniformConstant => {
            cx[ty].num_parameter_locations(cx)
        }
        Some(ty) => cx[ty].num_interface_locations(cx),
    };
    let is_position = |name: &str| position_input_names.iter().any(|p| p == name);

    let mut inputs = LocationSet::new();
    let mut outputs = LocationSet::new();
    let mut uniforms = LocationSet::new();
    let mut has_unassigned = false;
    let mut pending_position = false;

    for (_, def) in defs.iter().filter(|(_, def)| def.is_interface_variable()) {
        let (storage_class, set) = match def.storage_class {
            Some(sc @ spec::StorageClass::Input) => (sc, &mut inputs),
            Some(sc @ spec::StorageClass::Output) => (sc, &mut outputs),
            Some(sc @ spec::StorageClass::UniformConstant) => (sc, &mut uniforms),
            _ => unreachable!(),
        };
        match def.location {
            Some(loc) => set.insert_range(loc, num_locations(storage_class, def.ty)),
            None => {
                has_unassigned = true;
                if storage_class == spec::StorageClass::Input && is_position(&def.name) {
                    pending_position = true;
                }
            }
        }
    }

    if !has_unassigned {
        return Ok(0);
    }

    let prefer_position = stage == Stage::Vertex && pending_position && !inputs.contains(0);

    let mut count = 0;
    let mut cursor = stream.begin_annotations();
    for id in 0..defs.len() as spv::Id {
        let def = &defs[id];
        if !def.is_interface_variable() || def.location.is_some() {
            continue;
        }
        let (storage_class, kind, set) = match def.storage_class {
            Some(sc @ spec::StorageClass::Input) => (sc, "input", &mut inputs),
            Some(sc @ spec::StorageClass::Output) => (sc, "output", &mut outputs),
            Some(sc @ spec::StorageClass::UniformConstant) => (sc, "uniform", &mut uniforms),
            _ => unreachable!(),
        };
        let n = num_locations(storage_class, def.ty);

        // Location 0 stays reserved for the vertex position until it's assigned.
        let from = if prefer_position
            && storage_class == spec::StorageClass::Input
            && !set.contains(0)
            && !is_position(&def.name)
        {
            1
        } else {
            0
        };
        let loc = set.find_free_run(from, n);
        if loc.saturating_add(n) > MAX_LOCATIONS {
            return Err(ParseError::LocationsExhausted { id, count: n });
        }
        set.insert_range(loc, n);

        if n <= 1 {
            log::debug!("assigning {} to {kind} location {loc}", def.name);
        } else {
            log::debug!("assigning {} to {kind} locations {loc}..{}", def.name, loc + n - 1);
        }

        defs[id].location = Some(loc);
        cursor =
            stream.insert(cursor, Opcode::OpDecorate, &[id, spec::Decoration::Location.0, loc]);
        count += 1;
    }
    Ok(count)
}

/// Rewrites the `Location` decorations of `storage_class` variables in
/// `stream`, according to `remap` (locations missing from it are kept).
///
/// Only variables which already have a `Location` decoration are affected.
/// Returns the number of decorations rewritten.
pub fn remap_locations(
    stream: &mut InstStream,
    storage_class: spec::StorageClass,
    remap: &FxIndexMap<u32, u32>,
) -> usize {
    let mut decorations = FxHashMap::default();
    let mut targets = vec![];
    for (cursor, inst) in stream.iter() {
        match inst.opcode {
            Opcode::OpDecorate
                if inst.operands.len() >= 3
                    && spec::Decoration(inst.operands[1]) == spec::Decoration::Location =>
            {
                decorations.insert(inst.operands[0], cursor);
            }
            Opcode::OpVariable
                if inst.operands.len() >= 3
                    && spec::StorageClass(inst.operands[2]) == storage_class =>
            {
                if let Some(&decoration) = decorations.get(&inst.operands[1]) {
                    targets.push(decoration);
                }
            }
            _ => {}
        }
    }

    let mut count = 0;
    for decoration in targets {
        let inst = stream.get_mut(decoration);
        let (id, old) = (inst.operands[0], inst.operands[2]);
        if let Some(&new) = remap.get(&old) {
            log::debug!("remapping %{id} from {storage_class:?} location {old} to {new}");
            inst.operands[2] = new;
            count += 1;
        }
    }
    count
}
