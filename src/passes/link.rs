//! Stage linking: matching a stage's inputs with the previous stage's outputs.

use crate::module::{ShaderModule, Stage, Variable};
use crate::spv::spec;
use crate::FxIndexMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("stage {stage} cannot follow stage {previous}")]
    StageOrder { previous: Stage, stage: Stage },

    #[error("compute shaders cannot be linked with other stages")]
    ComputeStage,

    #[error("input {name:?} in stage {stage} does not match any output in stage {previous}")]
    MissingOutput { name: String, stage: Stage, previous: Stage },

    #[error("output {name:?} in stage {previous} has no output location")]
    MissingOutputLocation { name: String, previous: Stage },

    #[error("input {name:?} in stage {stage} has no input location")]
    MissingInputLocation { name: String, stage: Stage },
}

/// Computes the input location remapping (from input location to output
/// location) needed for `inputs` of `stage` to line up with the `outputs` of
/// `previous`, matching variables by name.
pub fn input_location_remap(
    stage: Stage,
    inputs: &[Variable],
    previous: Stage,
    outputs: &[Variable],
) -> Result<FxIndexMap<u32, u32>, LinkError> {
    if stage == Stage::Compute || previous == Stage::Compute {
        return Err(LinkError::ComputeStage);
    }
    if previous >= stage {
        return Err(LinkError::StageOrder { previous, stage });
    }

    let mut remap = FxIndexMap::default();
    for input in inputs {
        let output = outputs.iter().find(|output| output.name == input.name).ok_or_else(|| {
            LinkError::MissingOutput { name: input.name.clone(), stage, previous }
        })?;
        let output_location = output
            .location
            .ok_or_else(|| LinkError::MissingOutputLocation {
                name: input.name.clone(),
                previous,
            })?;
        let input_location = input
            .location
            .ok_or_else(|| LinkError::MissingInputLocation { name: input.name.clone(), stage })?;

        if input_location != output_location {
            log::debug!(
                "linking input {:?} ({stage} location {input_location}) \
                 to {previous} location {output_location}",
                input.name
            );
            remap.insert(input_location, output_location);
        }
    }
    Ok(remap)
}

/// Links `module` to `previous` (see [`ShaderModule::link_inputs`]).
pub fn link_inputs(module: &mut ShaderModule, previous: &ShaderModule) -> Result<(), LinkError> {
    let (stage, previous_stage) = (module.stage(), previous.stage());
    let remap = input_location_remap(stage, module.inputs(), previous_stage, previous.outputs())?;
    if !remap.is_empty() {
        module.remap_locations(spec::StorageClass::Input, &remap);
    }
    Ok(())
}
