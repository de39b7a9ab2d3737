//! Scalar (`bool`, integer, and floating-point) component kinds.

use std::fmt;

// NOTE: the order of variants is observable through `Ord` (and therefore
// through the ordering of interned types), and must not be changed lightly.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScalarKind {
    Float,
    Double,
    Int,
    Uint,
    Bool,
}

impl ScalarKind {
    /// Size (and alignment) in bytes, or `None` for `bool`, which has no
    /// defined memory representation.
    pub const fn size_bytes(self) -> Option<u32> {
        match self {
            Self::Bool => None,
            Self::Double => Some(8),
            Self::Float | Self::Int | Self::Uint => Some(4),
        }
    }

    pub const fn align_bytes(self) -> u32 {
        match self {
            Self::Double => 8,
            _ => 4,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Double => "double",
            Self::Int => "int",
            Self::Uint => "uint",
            Self::Bool => "bool",
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
