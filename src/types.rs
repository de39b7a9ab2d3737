//! Shader-visible types (the definitions behind interned [`Type`] handles).
//!
//! Layout rules are deliberately simple: struct members without an explicit
//! `Offset` are packed C-style (each member rounded up to its own alignment),
//! and arrays without an explicit `ArrayStride` round their element size up
//! to 16 bytes (as in std140), regardless of the storage class they live in.

use crate::context::{Context, Type};
use crate::scalar::ScalarKind;
use itertools::Itertools;
use smallvec::SmallVec;
use std::fmt;

/// Texture shape of an image (or sampled image) type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TextureType {
    Tex1D,
    Tex2D,
    Tex3D,
    Tex2DArray,
    Cube,
    Buffer,
    CubeArray,
    Tex1DArray,
}

impl TextureType {
    /// Suffix used by GLSL sampler/image type names (e.g. `2DArray`).
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Tex1D => "1D",
            Self::Tex2D => "2D",
            Self::Tex3D => "3D",
            Self::Tex2DArray => "2DArray",
            Self::Cube => "Cube",
            Self::Buffer => "Buffer",
            Self::CubeArray => "CubeArray",
            Self::Tex1DArray => "1DArray",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ImageAccess {
    Unknown,
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StructMember {
    pub ty: Type,
    pub name: String,

    /// Byte offset from the start of the struct.
    pub offset: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StructDef {
    /// Members, in declaration order (which is also SPIR-V member index order).
    pub members: SmallVec<[StructMember; 4]>,
}

impl StructDef {
    /// Appends a member, placed right after the previous member, rounded up
    /// to the alignment of `ty`.
    pub fn add_member(&mut self, cx: &Context, ty: Type, name: impl Into<String>) {
        let end = self.members.last().map_or(0, |last| {
            last.offset.saturating_add(cx[last.ty].size_bytes(cx).unwrap_or(0))
        });
        let offset = end.checked_next_multiple_of(cx[ty].align_bytes(cx)).unwrap_or(end);
        self.members.push(StructMember { ty, name: name.into(), offset });
    }

    /// Appends a member with an explicit byte offset (e.g. from an `Offset`
    /// decoration), keeping declaration order.
    pub fn add_member_at(&mut self, ty: Type, name: impl Into<String>, offset: u32) {
        self.members.push(StructMember { ty, name: name.into(), offset });
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeDef {
    Scalar(ScalarKind),
    Vector {
        scalar: ScalarKind,
        components: u32,
    },
    Matrix {
        scalar: ScalarKind,
        rows: u32,
        columns: u32,
    },
    Struct(StructDef),
    Array {
        element: Type,
        len: u32,

        /// Explicit `ArrayStride`, if the module specified one.
        stride: Option<u32>,
    },
    Image {
        texture_type: TextureType,
        sampled: ScalarKind,
        access: ImageAccess,
    },
    Sampler,
    SampledImage {
        texture_type: TextureType,
        sampled: ScalarKind,
        shadow: bool,
    },
}

impl TypeDef {
    /// Size in bytes in memory, or `None` for opaque types (and `bool`), and
    /// for sizes that don't fit in a `u32`.
    pub fn size_bytes(&self, cx: &Context) -> Option<u32> {
        match *self {
            Self::Scalar(scalar) => scalar.size_bytes(),
            Self::Vector { scalar, components } => scalar.size_bytes()?.checked_mul(components),
            Self::Matrix { scalar, rows, columns } => {
                scalar.size_bytes()?.checked_mul(rows)?.checked_mul(columns)
            }
            Self::Struct(ref def) => def.members.iter().try_fold(0, |size, member| {
                Some(size.max(member.offset.checked_add(cx[member.ty].size_bytes(cx)?)?))
            }),
            Self::Array { len, .. } => self.array_stride_bytes(cx)?.checked_mul(len),
            Self::Image { .. } | Self::Sampler | Self::SampledImage { .. } => None,
        }
    }

    /// Alignment in bytes in memory (`1` for opaque types).
    pub fn align_bytes(&self, cx: &Context) -> u32 {
        match *self {
            Self::Scalar(scalar) => scalar.align_bytes(),
            Self::Vector { scalar, components } => {
                scalar.align_bytes() * if components == 3 { 4 } else { components }
            }
            // FIXME: copied from std140 column alignment, unverified for
            // non-square or row-major matrices.
            Self::Matrix { scalar, rows, .. } => {
                let row_align = if scalar == ScalarKind::Double { 32 } else { 16 };
                row_align * rows
            }
            Self::Struct(ref def) => {
                def.members.iter().map(|member| cx[member.ty].align_bytes(cx)).fold(16, u32::max)
            }
            Self::Array { .. } => self.array_stride_bytes(cx).unwrap_or(1),
            Self::Image { .. } | Self::Sampler | Self::SampledImage { .. } => 1,
        }
    }

    /// Byte stride between array elements (`None` for non-arrays, and arrays
    /// of opaque types without an explicit stride).
    pub fn array_stride_bytes(&self, cx: &Context) -> Option<u32> {
        match *self {
            Self::Array { stride: Some(stride), .. } => Some(stride),
            Self::Array { element, stride: None, .. } => {
                cx[element].size_bytes(cx)?.checked_next_multiple_of(16)
            }
            _ => None,
        }
    }

    /// Returns `true` if `scalar` is used anywhere in this type.
    pub fn contains_scalar(&self, cx: &Context, scalar: ScalarKind) -> bool {
        match *self {
            Self::Scalar(s) | Self::Vector { scalar: s, .. } | Self::Matrix { scalar: s, .. } => {
                s == scalar
            }
            Self::Struct(ref def) => {
                def.members.iter().any(|member| cx[member.ty].contains_scalar(cx, scalar))
            }
            Self::Array { element, .. } => cx[element].contains_scalar(cx, scalar),
            Self::Image { .. } | Self::Sampler | Self::SampledImage { .. } => false,
        }
    }

    /// Number of locations taken up by a stage input/output of this type.
    pub fn num_interface_locations(&self, cx: &Context) -> u32 {
        match *self {
            Self::Matrix { rows, .. } => rows,
            Self::Struct(ref def) => def
                .members
                .iter()
                .fold(0, |n, member| n.saturating_add(cx[member.ty].num_interface_locations(cx))),
            Self::Array { element, len, .. } => {
                cx[element].num_interface_locations(cx).saturating_mul(len)
            }
            _ => 1,
        }
    }

    /// Number of locations taken up by a uniform parameter of this type.
    pub fn num_parameter_locations(&self, cx: &Context) -> u32 {
        match *self {
            Self::Struct(ref def) => def
                .members
                .iter()
                .fold(0, |n, member| n.saturating_add(cx[member.ty].num_parameter_locations(cx))),
            Self::Array { element, len, .. } => {
                cx[element].num_parameter_locations(cx).saturating_mul(len)
            }
            _ => 1,
        }
    }
}

/// See [`Context::display`].
pub struct TypeDisplay<'a> {
    pub(crate) cx: &'a Context,
    pub(crate) ty: Type,
}

impl fmt::Display for TypeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cx = self.cx;
        let sampled_prefix = |sampled| match sampled {
            ScalarKind::Int => "i",
            ScalarKind::Uint => "u",
            _ => "",
        };
        match cx[self.ty] {
            TypeDef::Scalar(scalar) => write!(f, "{scalar}"),
            TypeDef::Vector { scalar, components } => write!(f, "{scalar}{components}"),
            TypeDef::Matrix { scalar, rows, columns } => write!(f, "{scalar}{rows}x{columns}"),
            TypeDef::Struct(ref def) => {
                let members = def.members.iter().format_with(" ", |member, f| {
                    f(&format_args!("{} {};", cx.display(member.ty), member.name))
                });
                if def.members.is_empty() {
                    f.write_str("struct { }")
                } else {
                    write!(f, "struct {{ {members} }}")
                }
            }
            TypeDef::Array { element, len, .. } => write!(f, "{}[{len}]", cx.display(element)),
            TypeDef::Image { texture_type, sampled, .. } => {
                write!(f, "{}image{}", sampled_prefix(sampled), texture_type.suffix())
            }
            TypeDef::Sampler => f.write_str("sampler"),
            TypeDef::SampledImage { texture_type, sampled, shadow } => write!(
                f,
                "{}sampler{}{}",
                sampled_prefix(sampled),
                texture_type.suffix(),
                if shadow { "Shadow" } else { "" }
            ),
        }
    }
}
