//! Reflection extraction: stage interface variables and used capabilities.

use crate::caps::Capabilities;
use crate::context::Context;
use crate::defs::{DefKind, Definitions};
use crate::module::Variable;
use crate::scalar::ScalarKind;
use crate::spv::spec;

/// The public reflection surface of one module, in ascending ID order.
#[derive(Clone, Debug, Default)]
pub struct Reflection {
    pub inputs: Vec<Variable>,
    pub outputs: Vec<Variable>,
    pub parameters: Vec<Variable>,

    /// Capabilities implied by variables (built-ins used, integer interfaces),
    /// to be combined with those found while parsing.
    pub caps: Capabilities,
}

pub fn reflect(cx: &Context, defs: &Definitions) -> Reflection {
    let mut reflection = Reflection::default();

    for (id, def) in defs.iter() {
        if def.kind != DefKind::Variable {
            continue;
        }

        if let Some(builtin) = def.builtin {
            if def.used && def.storage_class == Some(spec::StorageClass::Input) {
                reflection.caps |= builtin_caps(builtin);
            }
            continue;
        }

        let list = match def.storage_class {
            Some(spec::StorageClass::Input) => &mut reflection.inputs,
            Some(spec::StorageClass::Output) => &mut reflection.outputs,
            Some(spec::StorageClass::UniformConstant) => &mut reflection.parameters,
            _ => continue,
        };

        let Some(ty) = def.ty else {
            log::warn!("ignoring variable {:?} (%{id}) of unsupported type", def.name);
            continue;
        };

        if cx[ty].contains_scalar(cx, ScalarKind::Int)
            || cx[ty].contains_scalar(cx, ScalarKind::Uint)
        {
            reflection.caps |= Capabilities::INTEGER;
        }

        list.push(Variable { ty, name: def.name.clone(), location: def.location });
    }

    reflection
}

fn builtin_caps(builtin: spec::BuiltIn) -> Capabilities {
    match builtin {
        spec::BuiltIn::VertexId | spec::BuiltIn::VertexIndex => Capabilities::VERTEX_ID,
        spec::BuiltIn::InstanceId | spec::BuiltIn::InstanceIndex => Capabilities::INSTANCE_ID,
        spec::BuiltIn::PrimitiveId => Capabilities::PRIMITIVE_ID,
        spec::BuiltIn::SampleId | spec::BuiltIn::SampleMask | spec::BuiltIn::SamplePosition => {
            Capabilities::SAMPLE_VARIABLES
        }
        _ => Capabilities::empty(),
    }
}
