//! Single-pass definition parsing (SPIR-V instructions -> [`Definitions`]).
//!
//! Every instruction goes through two independent steps, in stream order:
//! [`define`] records what IDs mean (types, pointers, variables, constants,
//! names and decorations), and [`track_usage`] marks used variables and
//! accumulates [`Capabilities`].

use crate::caps::Capabilities;
use crate::context::{Context, Type};
use crate::defs::{DefKind, Definitions};
use crate::passes::locations::MAX_LOCATIONS;
use crate::scalar::ScalarKind;
use crate::spv::spec::{self, Opcode};
use crate::spv::stream::InstStream;
use crate::spv::{self, read};
use crate::types::{ImageAccess, StructDef, TextureType, TypeDef};
use std::string::FromUtf8Error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error(transparent)]
    Read(#[from] read::ReadError),

    #[error("malformed SPIR-V (in {opcode}: missing operand {idx})")]
    MissingOperand { opcode: Opcode, idx: usize },

    #[error("malformed SPIR-V (in {opcode}: invalid UTF-8 in string literal)")]
    InvalidString {
        opcode: Opcode,
        #[source]
        source: FromUtf8Error,
    },

    #[error("malformed SPIR-V (variable with id %{id} should use pointer type)")]
    NonPointerVariableType { id: spv::Id },

    #[error("malformed SPIR-V (in {opcode}: %{operand} is not a valid operand type for %{id})")]
    InvalidTypeOperand { opcode: Opcode, id: spv::Id, operand: spv::Id },

    #[error("{0} shader inputs are not supported")]
    UnsupportedImageDim(&'static str),

    #[error("malformed SPIR-V (unknown image dimensionality {0:?} in OpTypeImage)")]
    UnknownImageDim(spec::Dim),

    #[error("malformed SPIR-V (invalid access qualifier {0:?} in OpTypeImage)")]
    InvalidAccessQualifier(spec::AccessQualifier),

    #[error("invalid SPIR-V shader: addressing model Logical must be used (found {0:?})")]
    UnsupportedAddressingModel(spec::AddressingModel),

    #[error("invalid SPIR-V shader: memory model GLSL450 must be used (found {0:?})")]
    UnsupportedMemoryModel(spec::MemoryModel),

    #[error("malformed SPIR-V (OpTypeSampledImage %{id} must refer to an image type)")]
    SampledImageOfNonImage { id: spv::Id },

    #[error("location {location} of %{id} is out of range (must be below {})", MAX_LOCATIONS)]
    LocationOutOfRange { id: spv::Id, location: u32 },

    #[error("no room for the {count} location(s) of %{id} (all must be below {})", MAX_LOCATIONS)]
    LocationsExhausted { id: spv::Id, count: u32 },

    #[error("cannot flatten %{id}: the aggregate is used as a whole by {opcode}")]
    AggregateUsedWhole { id: spv::Id, opcode: Opcode },

    #[error("cannot flatten %{id}: {opcode} %{chain} selects a nonexistent member")]
    InvalidMemberIndex { id: spv::Id, chain: spv::Id, opcode: Opcode },
}

/// Parses every instruction in `stream`, returning the definitions table for
/// all IDs below the ID bound, and the capabilities used along the way.
pub fn parse_definitions(
    cx: &Context,
    stream: &InstStream,
) -> Result<(Definitions, Capabilities), ParseError> {
    let mut defs = Definitions::with_id_bound(stream.id_bound());
    let mut caps = Capabilities::empty();
    for (_, inst) in stream.iter() {
        define(cx, &mut defs, inst)?;
        track_usage(cx, &mut defs, inst, &mut caps);
    }
    Ok((defs, caps))
}

/// Records the effects of `inst` on the definitions of the IDs it defines,
/// names or decorates.
pub fn define(cx: &Context, defs: &mut Definitions, inst: spv::Inst<'_>) -> Result<(), ParseError> {
    let opcode = inst.opcode;
    let arg = |idx| inst.operand(idx).ok_or(ParseError::MissingOperand { opcode, idx });
    let string = |idx| {
        inst.literal_string(idx).map_err(|source| ParseError::InvalidString { opcode, source })
    };

    match opcode {
        Opcode::OpExtInstImport => {
            defs[arg(0)?].set_ext_inst_import(string(1)?);
        }

        Opcode::OpMemoryModel => {
            let addressing_model = spec::AddressingModel(arg(0)?);
            if addressing_model != spec::AddressingModel::Logical {
                return Err(ParseError::UnsupportedAddressingModel(addressing_model));
            }
            let memory_model = spec::MemoryModel(arg(1)?);
            if memory_model != spec::MemoryModel::GLSL450 {
                return Err(ParseError::UnsupportedMemoryModel(memory_model));
            }
        }

        Opcode::OpName => defs[arg(0)?].set_name(string(1)?),
        Opcode::OpMemberName => defs[arg(0)?].set_member_name(arg(1)?, string(2)?),

        Opcode::OpDecorate => {
            let target = arg(0)?;
            match spec::Decoration(arg(1)?) {
                spec::Decoration::BuiltIn => defs[target].builtin = Some(spec::BuiltIn(arg(2)?)),
                spec::Decoration::Location => {
                    let location = arg(2)?;
                    if location >= MAX_LOCATIONS {
                        return Err(ParseError::LocationOutOfRange { id: target, location });
                    }
                    defs[target].location = Some(location);
                }
                spec::Decoration::ArrayStride => defs[target].array_stride = Some(arg(2)?),
                _ => {}
            }
        }
        Opcode::OpMemberDecorate => {
            if spec::Decoration(arg(2)?) == spec::Decoration::Offset {
                defs[arg(0)?].set_member_offset(arg(1)?, arg(3)?);
            }
        }

        Opcode::OpTypeVoid => define_type(cx, defs, arg(0)?, None),
        Opcode::OpTypeBool => {
            let ty = cx.intern(ScalarKind::Bool);
            define_type(cx, defs, arg(0)?, Some(ty));
        }
        Opcode::OpTypeInt => {
            let kind = if arg(2)? != 0 { ScalarKind::Int } else { ScalarKind::Uint };
            define_type(cx, defs, arg(0)?, Some(cx.intern(kind)));
        }
        Opcode::OpTypeFloat => {
            let kind = if arg(1)? >= 64 { ScalarKind::Double } else { ScalarKind::Float };
            define_type(cx, defs, arg(0)?, Some(cx.intern(kind)));
        }
        Opcode::OpTypeVector => {
            let (id, component_id) = (arg(0)?, arg(1)?);
            let scalar = match defs[component_id].ty.map(|ty| &cx[ty]) {
                Some(&TypeDef::Scalar(scalar)) => scalar,
                _ => {
                    return Err(ParseError::InvalidTypeOperand { opcode, id, operand: component_id })
                }
            };
            let ty = cx.intern(TypeDef::Vector { scalar, components: arg(2)? });
            define_type(cx, defs, id, Some(ty));
        }
        Opcode::OpTypeMatrix => {
            let (id, column_id) = (arg(0)?, arg(1)?);
            let (scalar, column_components) = match defs[column_id].ty.map(|ty| &cx[ty]) {
                Some(&TypeDef::Vector { scalar, components }) => (scalar, components),
                _ => return Err(ParseError::InvalidTypeOperand { opcode, id, operand: column_id }),
            };
            // NOTE: the SPIR-V column count is stored as `rows` (each column
            // vector takes up one interface location).
            let ty = cx.intern(TypeDef::Matrix {
                scalar,
                rows: arg(2)?,
                columns: column_components,
            });
            define_type(cx, defs, id, Some(ty));
        }
        Opcode::OpTypePointer => {
            let pointee = defs[arg(2)?].ty;
            defs[arg(0)?].set_type_pointer(spec::StorageClass(arg(1)?), pointee);
        }
        Opcode::OpTypeImage => {
            let id = arg(0)?;
            let arrayed = arg(4)? != 0;
            let texture_type = match spec::Dim(arg(2)?) {
                spec::Dim::Dim1D if arrayed => TextureType::Tex1DArray,
                spec::Dim::Dim1D => TextureType::Tex1D,
                spec::Dim::Dim2D if arrayed => TextureType::Tex2DArray,
                spec::Dim::Dim2D => TextureType::Tex2D,
                spec::Dim::Dim3D => TextureType::Tex3D,
                spec::Dim::Cube if arrayed => TextureType::CubeArray,
                spec::Dim::Cube => TextureType::Cube,
                spec::Dim::Buffer => TextureType::Buffer,
                spec::Dim::Rect => return Err(ParseError::UnsupportedImageDim("imageRect")),
                spec::Dim::SubpassData => {
                    return Err(ParseError::UnsupportedImageDim("subpassInput"))
                }
                dim => return Err(ParseError::UnknownImageDim(dim)),
            };

            let access = match inst.operand(8).map(spec::AccessQualifier) {
                None => ImageAccess::Unknown,
                Some(spec::AccessQualifier::ReadOnly) => ImageAccess::ReadOnly,
                Some(spec::AccessQualifier::WriteOnly) => ImageAccess::WriteOnly,
                Some(spec::AccessQualifier::ReadWrite) => ImageAccess::ReadWrite,
                Some(qualifier) => return Err(ParseError::InvalidAccessQualifier(qualifier)),
            };

            let sampled = match defs[arg(1)?].ty.map(|ty| &cx[ty]) {
                Some(&TypeDef::Scalar(scalar)) => scalar,
                _ => ScalarKind::Float,
            };

            let ty = cx.intern(TypeDef::Image { texture_type, sampled, access });
            define_type(cx, defs, id, Some(ty));
            defs[id].depth_image = arg(3)? == 1;
        }
        Opcode::OpTypeSampler => {
            let ty = cx.intern(TypeDef::Sampler);
            define_type(cx, defs, arg(0)?, Some(ty));
        }
        Opcode::OpTypeSampledImage => {
            let (id, image_id) = (arg(0)?, arg(1)?);
            let image = &defs[image_id];
            let ty = match image.ty.map(|ty| &cx[ty]) {
                Some(&TypeDef::Image { texture_type, sampled, .. }) => {
                    let shadow = image.depth_image;
                    cx.intern(TypeDef::SampledImage { texture_type, sampled, shadow })
                }
                _ => return Err(ParseError::SampledImageOfNonImage { id }),
            };
            define_type(cx, defs, id, Some(ty));
        }
        Opcode::OpTypeArray => {
            let id = arg(0)?;
            let len = defs[arg(2)?].constant;
            let ty = defs[arg(1)?].ty.map(|element| {
                cx.intern(TypeDef::Array { element, len, stride: defs[id].array_stride })
            });
            define_type(cx, defs, id, ty);
        }
        Opcode::OpTypeStruct => {
            let id = arg(0)?;
            let def = &defs[id];
            let mut struct_def = StructDef::default();
            let mut complete = true;
            for (i, &member_type_id) in inst.operands[1..].iter().enumerate() {
                let Some(member_ty) = defs[member_type_id].ty else {
                    complete = false;
                    break;
                };
                let name = def.member_names.get(i).cloned().unwrap_or_default();
                match def.member_offsets.get(i).copied().flatten() {
                    Some(offset) => struct_def.add_member_at(member_ty, name, offset),
                    None => struct_def.add_member(cx, member_ty, name),
                }
            }
            let ty = complete.then(|| cx.intern(TypeDef::Struct(struct_def)));
            define_type(cx, defs, id, ty);
        }

        Opcode::OpConstant => {
            let ty = defs[arg(0)?].ty;
            defs[arg(1)?].set_constant(ty, &inst.operands[2..]);
        }

        Opcode::OpVariable => {
            let (pointer_type_id, id) = (arg(0)?, arg(1)?);
            let pointer_type = &defs[pointer_type_id];
            if pointer_type.kind != DefKind::TypePointer {
                return Err(ParseError::NonPointerVariableType { id });
            }
            let ty = pointer_type.ty;
            let storage_class = spec::StorageClass(arg(2)?);
            defs[id].set_variable(ty, storage_class);

            if storage_class == spec::StorageClass::UniformConstant
                && log::log_enabled!(log::Level::Debug)
            {
                let def = &defs[id];
                let name = &def.name;
                let location =
                    def.location.map(|loc| format!(" (location {loc})")).unwrap_or_default();
                match ty {
                    Some(ty) => {
                        log::debug!("defined uniform {name}{location} with type {}", cx.display(ty))
                    }
                    None => log::debug!("defined uniform {name}{location} with unknown type"),
                }
            }
        }

        _ => {}
    }
    Ok(())
}

fn define_type(cx: &Context, defs: &mut Definitions, id: spv::Id, ty: Option<Type>) {
    match ty {
        Some(ty) => log::trace!("defined type %{id}: {}", cx.display(ty)),
        None => log::trace!("defined type %{id}: void (or unknown)"),
    }
    defs[id].set_type(ty);
}

/// Marks variables used by `inst`, and adds any [`Capabilities`] it requires.
pub fn track_usage(
    cx: &Context,
    defs: &mut Definitions,
    inst: spv::Inst<'_>,
    caps: &mut Capabilities,
) {
    match inst.opcode {
        Opcode::OpCapability => match inst.operand(0).map(spec::Capability) {
            Some(spec::Capability::Float64) => *caps |= Capabilities::DOUBLE,
            Some(spec::Capability::ImageCubeArray) => *caps |= Capabilities::CUBE_MAP_ARRAY,
            _ => {}
        },

        Opcode::OpExtInst => {
            if let (Some(set), Some(instruction)) = (inst.operand(2), inst.operand(3)) {
                let set = &defs[set];
                assert_eq!(
                    set.kind,
                    DefKind::ExtInstImport,
                    "OpExtInst of a non-OpExtInstImport set"
                );
                if set.name == spec::GLSL_STD_450 && instruction == spec::GLSL_STD_450_ROUND_EVEN {
                    *caps |= Capabilities::ROUND_EVEN;
                }
            }
        }

        Opcode::OpFunctionCall => {
            for &arg in inst.operands.get(3..).unwrap_or(&[]) {
                defs[arg].mark_used();
            }
        }

        Opcode::OpImageTexelPointer
        | Opcode::OpLoad
        | Opcode::OpAccessChain
        | Opcode::OpInBoundsAccessChain
        | Opcode::OpPtrAccessChain
        | Opcode::OpCopyObject
        | Opcode::OpAtomicLoad
        | Opcode::OpAtomicExchange
        | Opcode::OpAtomicCompareExchange
        | Opcode::OpAtomicCompareExchangeWeak
        | Opcode::OpAtomicIIncrement
        | Opcode::OpAtomicIDecrement
        | Opcode::OpAtomicIAdd
        | Opcode::OpAtomicISub
        | Opcode::OpAtomicSMin
        | Opcode::OpAtomicUMin
        | Opcode::OpAtomicSMax
        | Opcode::OpAtomicUMax
        | Opcode::OpAtomicAnd
        | Opcode::OpAtomicOr
        | Opcode::OpAtomicXor
        | Opcode::OpAtomicFlagTestAndSet => mark_pointer_used(cx, defs, inst.operand(2), caps),

        Opcode::OpCopyMemory | Opcode::OpCopyMemorySized => {
            mark_pointer_used(cx, defs, inst.operand(1), caps)
        }

        Opcode::OpImageRead | Opcode::OpImageWrite => *caps |= Capabilities::IMAGE_LOAD_STORE,
        Opcode::OpImageFetch | Opcode::OpImageQuerySizeLod | Opcode::OpImageQuerySize => {
            *caps |= Capabilities::TEXTURE_FETCH
        }
        Opcode::OpImageQueryLod => *caps |= Capabilities::TEXTURE_QUERY_LOD,
        Opcode::OpImageQueryLevels => *caps |= Capabilities::TEXTURE_QUERY_LEVELS,
        Opcode::OpImageQuerySamples => *caps |= Capabilities::TEXTURE_QUERY_SAMPLES,
        Opcode::OpBitcast => *caps |= Capabilities::BIT_ENCODING,
        Opcode::OpIAddCarry
        | Opcode::OpISubBorrow
        | Opcode::OpUMulExtended
        | Opcode::OpSMulExtended => {
            *caps |= Capabilities::EXTENDED_ARITHMETIC
        }
        Opcode::OpDPdxFine
        | Opcode::OpDPdyFine
        | Opcode::OpFwidthFine
        | Opcode::OpDPdxCoarse
        | Opcode::OpDPdyCoarse
        | Opcode::OpFwidthCoarse => *caps |= Capabilities::DERIVATIVE_CONTROL,

        _ => {}
    }
}

fn mark_pointer_used(
    cx: &Context,
    defs: &mut Definitions,
    pointer: Option<spv::Id>,
    caps: &mut Capabilities,
) {
    let Some(pointer) = pointer else { return };
    let def = &mut defs[pointer];
    def.mark_used();
    if def.ty.is_some_and(|ty| cx[ty].contains_scalar(cx, ScalarKind::Double)) {
        *caps |= Capabilities::DOUBLE;
    }
}
