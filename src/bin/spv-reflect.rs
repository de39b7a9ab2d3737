use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
struct VariableReport {
    name: String,
    #[serde(rename = "type")]
    ty: String,
    location: Option<u32>,
}

#[derive(Serialize)]
struct ModuleReport<'a> {
    name: &'a str,
    stage: spvmod::Stage,
    inputs: Vec<VariableReport>,
    outputs: Vec<VariableReport>,
    parameters: Vec<VariableReport>,
    capabilities: Vec<&'static str>,
}

fn report(module: &spvmod::ShaderModule) -> ModuleReport<'_> {
    let cx = module.cx_ref();
    let vars = |vars: &[spvmod::Variable]| -> Vec<VariableReport> {
        vars.iter()
            .map(|var| VariableReport {
                name: var.name.clone(),
                ty: cx.display(var.ty).to_string(),
                location: var.location,
            })
            .collect()
    };
    ModuleReport {
        name: module.name(),
        stage: module.stage(),
        inputs: vars(module.inputs()),
        outputs: vars(module.outputs()),
        parameters: vars(module.parameters()),
        capabilities: module.used_caps().iter_names().map(|(name, _)| name).collect(),
    }
}

fn main() -> std::io::Result<()> {
    match &std::env::args().collect::<Vec<_>>()[..] {
        [_, in_file, stage, out_file @ ..] if out_file.len() <= 1 => {
            let Some(stage) = spvmod::Stage::from_name(stage) else {
                eprintln!("error: unknown stage {stage:?}");
                std::process::exit(1);
            };

            let cx = Arc::new(spvmod::Context::new());
            let module = match spvmod::ShaderModule::from_spv_file(
                cx,
                stage,
                in_file,
                &spvmod::ModuleOptions::default(),
            ) {
                Ok(module) => module,
                Err(e) => {
                    eprintln!("error: {e}");
                    std::process::exit(1);
                }
            };

            let json = serde_json::to_string_pretty(&report(&module))?;
            println!("{json}");

            match out_file {
                [out_file] => module.write_to_spv_file(out_file),
                _ => Ok(()),
            }
        }
        args => {
            eprintln!("Usage: {} IN STAGE [OUT]", args[0]);
            eprintln!(
                "  STAGE: vertex, tess_control, tess_evaluation, geometry, fragment or compute"
            );
            std::process::exit(1);
        }
    }
}
