//! Flattening of aggregate uniform blocks (e.g. the `$Global` block that
//! HLSL front-ends wrap loose uniforms in) into one variable per member.

use crate::context::{Context, Type};
use crate::defs::{DefKind, Definitions};
use crate::spv;
use crate::spv::parse::ParseError;
use crate::spv::spec::{self, Opcode};
use crate::spv::stream::{Cursor, InstStream};
use crate::types::TypeDef;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

/// Replaces every variable of the struct type `type_id` with one
/// `UniformConstant` variable per struct member, rewriting access chains and
/// loads that went through the aggregate.
///
/// Returns the IDs of the new member variables, in creation order.
///
/// The aggregate itself must only be accessed member-wise: loading or copying
/// it whole is rejected with [`ParseError::AggregateUsedWhole`].
pub fn flatten_struct(
    cx: &Context,
    stream: &mut InstStream,
    defs: &mut Definitions,
    type_id: spv::Id,
) -> Result<Vec<spv::Id>, ParseError> {
    let members: SmallVec<[(Type, String); 4]> = match defs[type_id].ty.map(|ty| &cx[ty]) {
        Some(TypeDef::Struct(def)) => {
            def.members.iter().map(|m| (m.ty, m.name.clone())).collect()
        }
        _ => {
            let name = &defs[type_id].name;
            log::warn!("not flattening %{type_id} ({name:?}), it's not a struct type");
            return Ok(vec![]);
        }
    };
    let member_type_ids: SmallVec<[spv::Id; 4]> = stream
        .iter()
        .find(|(_, inst)| inst.opcode == Opcode::OpTypeStruct && inst.operand(0) == Some(type_id))
        .map(|(_, inst)| inst.operands[1..].iter().copied().collect())
        .unwrap_or_default();
    assert_eq!(member_type_ids.len(), members.len());

    log::debug!(
        "flattening struct {:?} (%{type_id}) with {} members",
        defs[type_id].name,
        members.len()
    );

    let uniform_constant = spec::StorageClass::UniformConstant;

    // Deleted pointer types and aggregate variables.
    let mut deleted = FxHashSet::default();
    // Results of deleted single-index access chains, to the member they selected.
    let mut deleted_chains = FxHashMap::default();
    let mut member_vars: FxHashMap<spv::Id, SmallVec<[spv::Id; 4]>> = FxHashMap::default();
    let mut new_vars = vec![];

    let mut cursor = stream.begin();
    while !stream.is_end(cursor) {
        let inst = stream.get(cursor);
        let opcode = inst.opcode;
        let operands: SmallVec<[u32; 8]> = inst.operands.iter().copied().collect();

        match opcode {
            Opcode::OpName | Opcode::OpMemberName | Opcode::OpDecorate | Opcode::OpMemberDecorate
                if operands.first() == Some(&type_id) =>
            {
                cursor = stream.erase(cursor);
                continue;
            }

            Opcode::OpTypeStruct if operands.first() == Some(&type_id) => {
                defs[type_id].clear();
                cursor = stream.erase(cursor);
                continue;
            }

            Opcode::OpTypePointer if operands.len() >= 3 && operands[2] == type_id => {
                deleted.insert(operands[0]);
                defs[operands[0]].clear();
                cursor = stream.erase(cursor);
                continue;
            }

            Opcode::OpVariable if operands.len() >= 3 && deleted.contains(&operands[0]) => {
                let aggregate_id = operands[1];
                deleted.insert(aggregate_id);
                cursor = stream.erase(cursor);

                let aggregate_location = defs[aggregate_id].location;
                let aggregate_name = std::mem::take(&mut defs[aggregate_id].name);
                defs[aggregate_id].clear();

                let mut ids = SmallVec::new();
                for (i, ((member_ty, member_name), &member_type_id)) in
                    members.iter().zip(&member_type_ids).enumerate()
                {
                    let pointer_id = stream.allocate_id();
                    let var_id = stream.allocate_id();
                    defs.grow_to(stream.id_bound());

                    cursor = stream.insert(
                        cursor,
                        Opcode::OpTypePointer,
                        &[pointer_id, uniform_constant.0, member_type_id],
                    );
                    defs[pointer_id].set_type_pointer(uniform_constant, Some(*member_ty));

                    let var_operands = [pointer_id, var_id, uniform_constant.0];
                    cursor = stream.insert(cursor, Opcode::OpVariable, &var_operands);
                    let var = &mut defs[var_id];
                    var.name = if aggregate_name.is_empty() {
                        member_name.clone()
                    } else {
                        format!("{aggregate_name}.{member_name}")
                    };
                    var.location = aggregate_location.map(|loc| loc + i as u32);
                    var.set_variable(Some(*member_ty), uniform_constant);

                    log::debug!(
                        "flattened member {member_name:?} of %{aggregate_id} into %{var_id}"
                    );
                    ids.push(var_id);
                    new_vars.push(var_id);
                }
                member_vars.insert(aggregate_id, ids);
                continue;
            }

            _ if opcode.is_access_chain() && operands.len() >= 3 => {
                let (result_id, base) = (operands[1], operands[2]);
                if let Some(&member_var) = deleted_chains.get(&base) {
                    stream.get_mut(cursor).operands[2] = member_var;
                } else if deleted.contains(&base) {
                    let member_var = operands
                        .get(3)
                        .ok_or(ParseError::AggregateUsedWhole { id: base, opcode })
                        .and_then(|&index_id| {
                            let index = &defs[index_id];
                            let base_members = member_vars.get(&base);
                            (index.kind == DefKind::Constant)
                                .then(|| base_members?.get(index.constant as usize).copied())
                                .flatten()
                                .ok_or(ParseError::InvalidMemberIndex {
                                    id: base,
                                    chain: result_id,
                                    opcode,
                                })
                        })?;

                    if operands.len() > 4 {
                        stream.get_mut(cursor).operands[2] = member_var;
                        stream.erase_operand(cursor, 3);
                    } else {
                        deleted_chains.insert(result_id, member_var);
                        cursor = stream.erase(cursor);
                        continue;
                    }
                }
            }

            Opcode::OpLoad if operands.len() >= 3 => {
                substitute_pointer(stream, cursor, 2, &deleted, &deleted_chains)?;
            }
            Opcode::OpCopyMemory | Opcode::OpCopyMemorySized if operands.len() >= 2 => {
                substitute_pointer(stream, cursor, 0, &deleted, &deleted_chains)?;
                substitute_pointer(stream, cursor, 1, &deleted, &deleted_chains)?;
            }

            _ => {}
        }

        cursor = stream.next(cursor);
    }

    let mut cursor = stream.begin_annotations();
    for &var_id in &new_vars {
        if let Some(loc) = defs[var_id].location {
            let operands = [var_id, spec::Decoration::Location.0, loc];
            cursor = stream.insert(cursor, Opcode::OpDecorate, &operands);
        }
    }

    fix_entry_point_interfaces(stream, &deleted, &new_vars);

    if !deleted.is_empty() {
        let is_deleted = |id: spv::Id| deleted.contains(&id) || deleted_chains.contains_key(&id);
        let mut cursor = stream.begin();
        while !stream.is_end(cursor) {
            let inst = stream.get(cursor);
            let targets_deleted = matches!(
                inst.opcode,
                Opcode::OpName
                    | Opcode::OpMemberName
                    | Opcode::OpDecorate
                    | Opcode::OpMemberDecorate
            ) && inst.operand(0).is_some_and(is_deleted);
            cursor = if targets_deleted { stream.erase(cursor) } else { stream.next(cursor) };
        }
    }

    Ok(new_vars)
}

/// Replaces the pointer operand at `idx` if it was the result of a deleted
/// access chain, and rejects direct uses of deleted aggregates.
fn substitute_pointer(
    stream: &mut InstStream,
    cursor: Cursor,
    idx: usize,
    deleted: &FxHashSet<spv::Id>,
    deleted_chains: &FxHashMap<spv::Id, spv::Id>,
) -> Result<(), ParseError> {
    let inst = stream.get_mut(cursor);
    let pointer = inst.operands[idx];
    if let Some(&member_var) = deleted_chains.get(&pointer) {
        inst.operands[idx] = member_var;
    } else if deleted.contains(&pointer) {
        return Err(ParseError::AggregateUsedWhole { id: pointer, opcode: inst.opcode });
    }
    Ok(())
}

/// Removes deleted variables from `OpEntryPoint` interface lists, listing the
/// new member variables instead when the SPIR-V version requires interfaces
/// to include every global.
fn fix_entry_point_interfaces(
    stream: &mut InstStream,
    deleted: &FxHashSet<spv::Id>,
    new_vars: &[spv::Id],
) {
    let list_all_globals = stream.version() >= spec::VERSION_1_4;

    let entry_points: Vec<Cursor> = stream
        .iter()
        .filter(|(_, inst)| inst.opcode == Opcode::OpEntryPoint)
        .map(|(cursor, _)| cursor)
        .collect();

    // In reverse, as edits shift every later instruction.
    for &cursor in entry_points.iter().rev() {
        let operands = stream.get(cursor).operands;

        // Execution model, function, then the name (up to the word with a `\0`).
        let name_words = operands
            .get(2..)
            .and_then(|words| words.iter().position(|w| w.to_le_bytes().contains(&0)))
            .map_or(0, |pos| pos + 1);
        let interface_start = (2 + name_words).min(operands.len());

        let removed: SmallVec<[usize; 4]> = (interface_start..operands.len())
            .filter(|&i| deleted.contains(&operands[i]))
            .collect();
        if removed.is_empty() {
            continue;
        }
        for &i in removed.iter().rev() {
            stream.erase_operand(cursor, i);
        }
        if list_all_globals {
            for &var_id in new_vars {
                stream.push_operand(cursor, var_id);
            }
        }
    }
}
