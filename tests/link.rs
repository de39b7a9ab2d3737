mod common;

use common::{location_decorations, ShaderBuilder, FRAGMENT, VERTEX};
use spvmod::passes::link::LinkError;
use spvmod::spv::spec;
use spvmod::{Context, FxIndexMap, ShaderModule, Stage};
use std::sync::Arc;

const INPUT: spec::StorageClass = spec::StorageClass::Input;
const OUTPUT: spec::StorageClass = spec::StorageClass::Output;

/// Builds a module with `(name, location)` variables of `storage_class`.
fn module(
    cx: &Arc<Context>,
    stage: Stage,
    storage_class: spec::StorageClass,
    vars: &[(&str, Option<u32>)],
) -> ShaderModule {
    let mut b = ShaderBuilder::new();
    let vec4 = b.type_vec(4);
    for &(name, location) in vars {
        let id = b.named_var(name, storage_class, vec4);
        if let Some(location) = location {
            b.location(id, location);
        }
    }
    let execution_model = if stage == Stage::Vertex { VERTEX } else { FRAGMENT };
    ShaderModule::new(cx.clone(), stage, b.finish(execution_model)).unwrap()
}

fn locations(module: &ShaderModule) -> Vec<u32> {
    location_decorations(module.words()).iter().map(|&(_, loc)| loc).collect()
}

#[test]
fn inputs_take_matching_output_locations() {
    let cx = Arc::new(Context::new());
    let vertex = module(&cx, Stage::Vertex, OUTPUT, &[("color", None), ("worldPos", None)]);
    let mut fragment = module(&cx, Stage::Fragment, INPUT, &[("worldPos", None)]);
    assert_eq!(vertex.find_output("worldPos").unwrap().location, Some(1));
    assert_eq!(fragment.find_input("worldPos").unwrap().location, Some(0));

    fragment.link_inputs(&vertex).unwrap();
    assert_eq!(fragment.find_input("worldPos").unwrap().location, Some(1));
    assert_eq!(locations(&fragment), [1]);

    // Linking again is a no-op.
    let words = fragment.words().to_vec();
    fragment.link_inputs(&vertex).unwrap();
    assert_eq!(fragment.words(), &words[..]);
}

#[test]
fn swapped_locations() {
    let cx = Arc::new(Context::new());
    let vertex = module(&cx, Stage::Vertex, OUTPUT, &[("a", Some(0)), ("b", Some(1))]);
    let mut fragment = module(&cx, Stage::Fragment, INPUT, &[("b", Some(0)), ("a", Some(1))]);

    fragment.link_inputs(&vertex).unwrap();
    assert_eq!(fragment.find_input("a").unwrap().location, Some(0));
    assert_eq!(fragment.find_input("b").unwrap().location, Some(1));

    let mut sorted = locations(&fragment);
    sorted.sort();
    assert_eq!(sorted, [0, 1]);
}

#[test]
fn missing_output_is_an_error() {
    let cx = Arc::new(Context::new());
    let vertex = module(&cx, Stage::Vertex, OUTPUT, &[("color", None)]);
    let mut fragment = module(&cx, Stage::Fragment, INPUT, &[("missingVar", None)]);
    let words = fragment.words().to_vec();

    let err = fragment.link_inputs(&vertex).unwrap_err();
    assert!(matches!(err, LinkError::MissingOutput { ref name, .. } if name == "missingVar"));
    let message = err.to_string();
    assert!(
        ["missingVar", "vertex", "fragment"].iter().all(|part| message.contains(part)),
        "{message}"
    );
    assert_eq!(fragment.words(), &words[..]);
}

#[test]
fn stages_must_be_in_pipeline_order() {
    let cx = Arc::new(Context::new());
    let fragment = module(&cx, Stage::Fragment, OUTPUT, &[("color", None)]);
    let mut vertex = module(&cx, Stage::Vertex, INPUT, &[("color", None)]);
    assert!(matches!(
        vertex.link_inputs(&fragment),
        Err(LinkError::StageOrder { previous: Stage::Fragment, stage: Stage::Vertex })
    ));
}

#[test]
fn parameter_locations_can_be_remapped() {
    let cx = Arc::new(Context::new());
    let mut fragment = module(
        &cx,
        Stage::Fragment,
        spec::StorageClass::UniformConstant,
        &[("tint", Some(0)), ("scale", Some(1))],
    );
    let remap: FxIndexMap<u32, u32> = [(1, 7)].into_iter().collect();
    fragment.remap_parameter_locations(&remap);
    assert_eq!(fragment.find_parameter("tint").unwrap().location, Some(0));
    assert_eq!(fragment.find_parameter("scale").unwrap().location, Some(7));
}
