mod common;

use common::{ShaderBuilder, FRAGMENT, VERTEX};
use spvmod::spv::spec::{self, Opcode};
use spvmod::spv::stream::InstStream;
use spvmod::{Capabilities, Context, ModuleOptions, ParseError, ShaderModule, Stage, TypeDef};
use std::path::Path;
use std::sync::Arc;

#[test]
fn trivial_module() {
    let words = ShaderBuilder::new().finish(VERTEX);
    let module = ShaderModule::new(Arc::new(Context::new()), Stage::Vertex, words).unwrap();
    assert!(module.inputs().is_empty());
    assert!(module.outputs().is_empty());
    assert!(module.parameters().is_empty());
    assert_eq!(module.used_caps(), Capabilities::empty());
}

#[test]
fn inputs_outputs_and_parameters() {
    let mut b = ShaderBuilder::new();
    let vec4 = b.type_vec(4);
    let int = b.type_int();
    let tex = b.id();
    let float = b.type_float();
    b.global(Opcode::OpTypeImage, &[tex, float, 1, 0, 0, 0, 1, 0]);
    let sampled = b.id();
    b.global(Opcode::OpTypeSampledImage, &[sampled, tex]);

    let color = b.named_var("color", spec::StorageClass::Input, vec4);
    b.location(color, 2);
    b.named_var("flags", spec::StorageClass::Input, int);
    b.named_var("out_color", spec::StorageClass::Output, vec4);
    b.named_var("p3d_Texture0", spec::StorageClass::UniformConstant, sampled);
    b.load(vec4, color);

    let cx = Arc::new(Context::new());
    let module = ShaderModule::new(cx.clone(), Stage::Fragment, b.finish(FRAGMENT)).unwrap();

    let names: Vec<_> = module.inputs().iter().map(|var| var.name.as_str()).collect();
    assert_eq!(names, ["color", "flags"]);
    assert_eq!(module.find_input("color").unwrap().location, Some(2));
    assert_eq!(module.find_input("flags").unwrap().location, Some(0));
    assert_eq!(module.find_output("out_color").unwrap().location, Some(0));

    let texture = module.find_parameter("p3d_Texture0").unwrap();
    assert!(matches!(cx[texture.ty], TypeDef::SampledImage { shadow: false, .. }));
    assert_eq!(cx.display(texture.ty).to_string(), "sampler2D");

    assert!(module.find_input("out_color").is_none());
    assert_eq!(module.used_caps(), Capabilities::INTEGER);
}

#[test]
fn capabilities_from_opcodes_and_builtins() {
    let mut b = ShaderBuilder::new();
    b.capability(spec::Capability::ImageCubeArray);
    let glsl = b.ext_inst_import(spec::GLSL_STD_450);

    let uint = b.type_uint();
    let double = b.type_double();
    let vertex_index = b.named_var("gl_VertexIndex", spec::StorageClass::Input, uint);
    b.decorate(vertex_index, spec::Decoration::BuiltIn, &[spec::BuiltIn::VertexIndex.0]);
    let unused = b.named_var("gl_PrimitiveID", spec::StorageClass::Input, uint);
    b.decorate(unused, spec::Decoration::BuiltIn, &[spec::BuiltIn::PrimitiveId.0]);
    let weight = b.named_var("weight", spec::StorageClass::Input, double);
    b.location(weight, 0);

    b.load(uint, vertex_index);
    let w = b.load(double, weight);
    let rounded = b.id();
    b.inst(Opcode::OpExtInst, &[double, rounded, glsl, spec::GLSL_STD_450_ROUND_EVEN, w]);
    let bits = b.id();
    b.inst(Opcode::OpBitcast, &[uint, bits, w]);

    let words = b.finish(VERTEX);
    let module = ShaderModule::new(Arc::new(Context::new()), Stage::Vertex, words).unwrap();
    assert!(module.inputs().iter().all(|var| var.name == "weight"));
    assert_eq!(
        module.used_caps(),
        Capabilities::CUBE_MAP_ARRAY
            | Capabilities::VERTEX_ID
            | Capabilities::DOUBLE
            | Capabilities::ROUND_EVEN
            | Capabilities::BIT_ENCODING
    );
}

#[test]
fn stripped_module_is_valid() {
    let mut b = ShaderBuilder::new();
    let vec3 = b.type_vec(3);
    b.named_var("vertex", spec::StorageClass::Input, vec3);
    b.inst(Opcode::OpNop, &[]);
    let words = b.finish(VERTEX);

    let module = ShaderModule::new(Arc::new(Context::new()), Stage::Vertex, words.clone()).unwrap();
    let stream = InstStream::from_words(module.words().to_vec());
    assert!(stream.validate().is_ok());
    assert!(stream.iter().all(|(_, inst)| !inst.opcode.is_debuginfo()));
    assert_eq!(module.words()[..5], words[..5]);
}

#[test]
fn malformed_input() {
    let cx = Arc::new(Context::new());
    let err = ShaderModule::new(cx.clone(), Stage::Vertex, vec![0x0723_0203, 0, 0]).unwrap_err();
    assert!(matches!(err, ParseError::Read(_)), "{err}");

    let mut words = ShaderBuilder::new().finish(VERTEX);
    words[0] = 0xdead_beef;
    let err = ShaderModule::new(cx.clone(), Stage::Vertex, words).unwrap_err();
    assert_eq!(err.to_string(), "malformed SPIR-V (incorrect magic number 0xdeadbeef)");

    let err =
        ShaderModule::from_spv_bytes(cx, Stage::Vertex, &[3, 2, 0x23], &ModuleOptions::default())
        .unwrap_err();
    assert!(matches!(err, ParseError::Read(spvmod::spv::read::ReadError::NotWordAligned)));
}

#[test]
fn big_endian_bytes() {
    let mut b = ShaderBuilder::new();
    let vec2 = b.type_vec(2);
    b.named_var("uv", spec::StorageClass::Output, vec2);
    let words = b.finish(VERTEX);
    let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes()).collect();

    let cx = Arc::new(Context::new());
    let module =
        ShaderModule::from_spv_bytes(cx, Stage::Vertex, &bytes, &ModuleOptions::default()).unwrap();
    assert_eq!(module.find_output("uv").unwrap().location, Some(0));
}

#[test]
fn clones_are_independent() {
    let mut b = ShaderBuilder::new();
    let vec4 = b.type_vec(4);
    b.named_var("color", spec::StorageClass::Input, vec4);
    let words = b.finish(FRAGMENT);

    let vertex_words = {
        let mut b = ShaderBuilder::new();
        let vec4 = b.type_vec(4);
        let out = b.named_var("color", spec::StorageClass::Output, vec4);
        b.location(out, 5);
        b.finish(VERTEX)
    };

    let cx = Arc::new(Context::new());
    let original = ShaderModule::new(cx.clone(), Stage::Fragment, words).unwrap();
    let vertex = ShaderModule::new(cx, Stage::Vertex, vertex_words).unwrap();

    let mut copy = original.clone();
    copy.link_inputs(&vertex).unwrap();
    assert_eq!(copy.find_input("color").unwrap().location, Some(5));
    assert_eq!(original.find_input("color").unwrap().location, Some(0));
    assert_ne!(copy.words(), original.words());
}

#[test]
fn file_tracking() {
    let words = ShaderBuilder::new().finish(VERTEX);
    let options =
        ModuleOptions { source_filename: Some("shaders/main.vert".into()), ..Default::default() };
    let cx = Arc::new(Context::new());
    let mut module = ShaderModule::with_options(cx, Stage::Vertex, words, &options).unwrap();

    assert_eq!(module.name(), "shaders/main.vert");
    assert_eq!(module.add_included_file("shaders/common.glsl"), 2048);
    assert_eq!(module.add_included_file("shaders/lighting.glsl"), 2049);

    assert_eq!(module.filename_from_index(0), Path::new("shaders/main.vert"));
    assert_eq!(module.filename_from_index(2049), Path::new("shaders/lighting.glsl"));
    assert_eq!(module.filename_from_index(2050), Path::new("2050"));
    assert_eq!(module.filename_from_index(7), Path::new("7"));
}

#[test]
fn modules_are_shareable_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ShaderModule>();
    assert_send_sync::<Context>();

    let mut b = ShaderBuilder::new();
    let vec4 = b.type_vec(4);
    b.named_var("color", spec::StorageClass::Input, vec4);
    let cx = Arc::new(Context::new());
    let module = Arc::new(ShaderModule::new(cx, Stage::Fragment, b.finish(FRAGMENT)).unwrap());

    let readers: Vec<_> = (0..2)
        .map(|_| {
            let module = module.clone();
            std::thread::spawn(move || {
                let color = module.find_input("color").unwrap();
                (color.location, module.cx().display(color.ty).to_string())
            })
        })
        .collect();
    for reader in readers {
        assert_eq!(reader.join().unwrap(), (Some(0), "float4".to_string()));
    }
}
