//! Shader modules: parsed, rewritten and reflected SPIR-V for one stage.

use crate::caps::Capabilities;
use crate::context::{Context, Type};
use crate::defs::DefKind;
use crate::passes::flatten::flatten_struct;
use crate::passes::link::{self, LinkError};
use crate::passes::locations::{assign_locations, remap_locations};
use crate::reflect::reflect;
use crate::spv::parse::{parse_definitions, ParseError};
use crate::spv::stream::InstStream;
use crate::spv::{self, read, spec};
use crate::FxIndexMap;
use serde::Serialize;
use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Pipeline stage, in pipeline order (which `Ord` follows).
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Vertex,
    TessControl,
    TessEvaluation,
    Geometry,
    Fragment,
    Compute,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::TessControl => "tess_control",
            Self::TessEvaluation => "tess_evaluation",
            Self::Geometry => "geometry",
            Self::Fragment => "fragment",
            Self::Compute => "compute",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [
            Self::Vertex,
            Self::TessControl,
            Self::TessEvaluation,
            Self::Geometry,
            Self::Fragment,
            Self::Compute,
        ]
        .into_iter()
        .find(|stage| stage.name() == name)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A stage input, output, or uniform parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Variable {
    pub ty: Type,
    pub name: String,
    pub location: Option<u32>,
}

/// Knobs for [`ShaderModule::with_options`].
#[derive(Clone, Debug)]
pub struct ModuleOptions {
    /// Name used in diagnostics (defaults to the source filename).
    pub name: Option<String>,

    /// Primary source file (file index `0`, see [`ShaderModule::filename_from_index`]).
    pub source_filename: Option<PathBuf>,

    /// Names of vertex stage inputs which prefer location 0.
    pub position_input_names: Vec<Cow<'static, str>>,

    /// Name of the struct type to flatten into individual uniforms.
    pub global_block_name: Cow<'static, str>,
}

impl Default for ModuleOptions {
    fn default() -> Self {
        Self {
            name: None,
            source_filename: None,
            position_input_names: vec!["vertex".into(), "p3d_Vertex".into(), "vtx_position".into()],
            global_block_name: "$Global".into(),
        }
    }
}

/// File indices returned by [`ShaderModule::add_included_file`] start here,
/// keeping them apart from the primary source (index `0`).
pub const INCLUDED_FILE_INDEX_BASE: u32 = 2048;

/// A SPIR-V module for one pipeline stage.
///
/// Construction parses the module, flattens the global uniform block (if
/// any), assigns missing locations, extracts reflection data, and finally
/// strips debuginfo. Afterwards, only linking (see [`link_inputs`](Self::link_inputs))
/// and location remapping can change the module (both need `&mut self`, so a
/// module shared between threads is read-only unless externally locked).
#[derive(Clone, Debug)]
pub struct ShaderModule {
    /// Context used for every type in this module's reflection data.
    ///
    /// Shared by every module of a compilation session, possibly across threads.
    cx: Arc<Context>,

    stage: Stage,
    name: String,
    source_filename: Option<PathBuf>,
    included_files: Vec<PathBuf>,

    stream: InstStream,

    pub(crate) inputs: Vec<Variable>,
    pub(crate) outputs: Vec<Variable>,
    pub(crate) parameters: Vec<Variable>,
    used_caps: Capabilities,
}

impl ShaderModule {
    pub fn new(cx: Arc<Context>, stage: Stage, words: Vec<u32>) -> Result<Self, ParseError> {
        Self::with_options(cx, stage, words, &ModuleOptions::default())
    }

    pub fn with_options(
        cx: Arc<Context>,
        stage: Stage,
        words: Vec<u32>,
        options: &ModuleOptions,
    ) -> Result<Self, ParseError> {
        let name = options.name.clone().unwrap_or_else(|| {
            options
                .source_filename
                .as_ref()
                .map_or_else(|| "<unnamed>".to_string(), |path| path.display().to_string())
        });

        let mut module = Self {
            cx,
            stage,
            name,
            source_filename: options.source_filename.clone(),
            included_files: vec![],
            stream: InstStream::from_words(words),
            inputs: vec![],
            outputs: vec![],
            parameters: vec![],
            used_caps: Capabilities::empty(),
        };
        match module.process(options) {
            Ok(()) => Ok(module),
            Err(e) => {
                log::error!("{}: failed to parse SPIR-V shader code: {e}", module.name);
                Err(e)
            }
        }
    }

    /// Like [`with_options`](Self::with_options), from SPIR-V bytes in either endianness.
    pub fn from_spv_bytes(
        cx: Arc<Context>,
        stage: Stage,
        spv_bytes: &[u8],
        options: &ModuleOptions,
    ) -> Result<Self, ParseError> {
        Self::with_options(cx, stage, read::words_from_spv_bytes(spv_bytes)?, options)
    }

    /// Reads a SPIR-V file, using `path` as the source filename (unless one
    /// was already given in `options`).
    pub fn from_spv_file(
        cx: Arc<Context>,
        stage: Stage,
        path: impl AsRef<Path>,
        options: &ModuleOptions,
    ) -> Result<Self, ParseError> {
        let path = path.as_ref();
        let words = read::read_spv_file(path)?;
        let mut options = options.clone();
        options.source_filename.get_or_insert_with(|| path.to_path_buf());
        Self::with_options(cx, stage, words, &options)
    }

    fn process(&mut self, options: &ModuleOptions) -> Result<(), ParseError> {
        let cx = &*self.cx;
        self.stream.validate()?;

        let (mut defs, mut caps) = parse_definitions(cx, &self.stream)?;

        // Only struct types can be flattened, the name alone doesn't say much.
        let global_blocks: Vec<spv::Id> = defs
            .iter()
            .filter(|(_, def)| def.kind == DefKind::Type && def.name == options.global_block_name)
            .map(|(id, _)| id)
            .collect();
        for type_id in global_blocks {
            flatten_struct(cx, &mut self.stream, &mut defs, type_id)?;
        }

        let position_names = &options.position_input_names;
        assign_locations(cx, &mut self.stream, &mut defs, self.stage, position_names)?;

        let reflection = reflect(cx, &defs);
        caps |= reflection.caps;
        self.inputs = reflection.inputs;
        self.outputs = reflection.outputs;
        self.parameters = reflection.parameters;
        self.used_caps = caps;

        self.stream = self.stream.strip();
        Ok(())
    }

    pub fn cx(&self) -> Arc<Context> {
        self.cx.clone()
    }

    pub fn cx_ref(&self) -> &Arc<Context> {
        &self.cx
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> &[Variable] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Variable] {
        &self.outputs
    }

    pub fn parameters(&self) -> &[Variable] {
        &self.parameters
    }

    pub fn find_input(&self, name: &str) -> Option<&Variable> {
        self.inputs.iter().find(|var| var.name == name)
    }

    pub fn find_output(&self, name: &str) -> Option<&Variable> {
        self.outputs.iter().find(|var| var.name == name)
    }

    pub fn find_parameter(&self, name: &str) -> Option<&Variable> {
        self.parameters.iter().find(|var| var.name == name)
    }

    pub fn used_caps(&self) -> Capabilities {
        self.used_caps
    }

    /// The (stripped) SPIR-V words of this module.
    pub fn words(&self) -> &[u32] {
        self.stream.words()
    }

    pub fn stream(&self) -> &InstStream {
        &self.stream
    }

    pub fn write_to_spv_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        spv::write::write_spv_file(path, self.words())
    }

    /// Records `path` as included by this module's source, returning the file
    /// index diagnostics can refer to it with.
    pub fn add_included_file(&mut self, path: impl Into<PathBuf>) -> u32 {
        let index = INCLUDED_FILE_INDEX_BASE + self.included_files.len() as u32;
        self.included_files.push(path.into());
        index
    }

    /// Resolves a file index (`0` for the primary source, or one returned by
    /// [`add_included_file`](Self::add_included_file)) back to a filename.
    ///
    /// Unknown indices are returned as-is, as a path made of the integer.
    pub fn filename_from_index(&self, index: u32) -> Cow<'_, Path> {
        let known = match index {
            0 => self.source_filename.as_deref(),
            _ => index
                .checked_sub(INCLUDED_FILE_INDEX_BASE)
                .and_then(|i| self.included_files.get(i as usize))
                .map(PathBuf::as_path),
        };
        match known {
            Some(path) => Cow::Borrowed(path),
            None => Cow::Owned(PathBuf::from(index.to_string())),
        }
    }

    /// Links this stage's inputs to the outputs of `previous` (an earlier
    /// stage), remapping input locations to match the outputs' locations.
    pub fn link_inputs(&mut self, previous: &ShaderModule) -> Result<(), LinkError> {
        link::link_inputs(self, previous).map_err(|e| {
            log::error!("{}: {e}", self.name);
            e
        })
    }

    /// Changes parameter locations according to `remap` (mapping old to new
    /// locations); locations missing from it are kept.
    pub fn remap_parameter_locations(&mut self, remap: &FxIndexMap<u32, u32>) {
        self.remap_locations(spec::StorageClass::UniformConstant, remap);
    }

    pub(crate) fn remap_locations(
        &mut self,
        storage_class: spec::StorageClass,
        remap: &FxIndexMap<u32, u32>,
    ) {
        remap_locations(&mut self.stream, storage_class, remap);

        let vars = match storage_class {
            spec::StorageClass::Input => &mut self.inputs,
            spec::StorageClass::Output => &mut self.outputs,
            spec::StorageClass::UniformConstant => &mut self.parameters,
            _ => unreachable!("no reflected variables for {storage_class:?}"),
        };
        for var in vars {
            if let Some(&new) = var.location.as_ref().and_then(|loc| remap.get(loc)) {
                var.location = Some(new);
            }
        }
    }
}
