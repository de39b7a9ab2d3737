//! SPIR-V constants (the subset of the Khronos grammar used by this crate).
//!
//! Enumerands are modelled as `u32`/`u16` newtypes with associated constants,
//! so that values this crate doesn't know about still round-trip untouched.

use lazy_static::lazy_static;
use rustc_hash::FxHashMap;
use std::fmt;

pub const HEADER_LEN: usize = 5;

/// Index of the ID bound in the module header.
pub const HEADER_BOUND_IDX: usize = 3;

/// Instruction header word layout: `(word_count << 16) | opcode`.
pub const WORD_COUNT_SHIFT: u32 = 16;
pub const OPCODE_MASK: u32 = 0xffff;

pub struct Spec {
    pub magic: u32,

    opcode_names: FxHashMap<Opcode, &'static str>,
}

impl Spec {
    /// Return the lazily-built [`Spec`] (only does significant work for the first call).
    #[inline(always)]
    #[must_use]
    pub fn get() -> &'static Spec {
        lazy_static! {
            static ref SPEC: Spec = Spec {
                magic: 0x0723_0203,
                opcode_names: ALL_OPCODES.iter().map(|&(name, opcode)| (opcode, name)).collect(),
            };
        }
        &SPEC
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Opcode(u16);

impl Opcode {
    pub const fn from_u16(opcode: u16) -> Self {
        Self(opcode)
    }

    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Lookup the name for this opcode, returning `None` for opcodes outside
    /// of the subset known to this crate.
    pub fn name(self) -> Option<&'static str> {
        Spec::get().opcode_names.get(&self).copied()
    }

    /// Debug/source instructions, removed by
    /// [`InstStream::strip`](super::stream::InstStream::strip).
    pub fn is_debuginfo(self) -> bool {
        [
            Self::OpNop,
            Self::OpSourceContinued,
            Self::OpSource,
            Self::OpSourceExtension,
            Self::OpName,
            Self::OpMemberName,
            Self::OpString,
            Self::OpLine,
            Self::OpNoLine,
            Self::OpModuleProcessed,
        ]
        .contains(&self)
    }

    /// Instructions which may only appear before the annotations section
    /// (see "Logical Layout of a Module" in the SPIR-V specification).
    pub fn is_preamble(self) -> bool {
        [
            Self::OpCapability,
            Self::OpExtension,
            Self::OpExtInstImport,
            Self::OpMemoryModel,
            Self::OpEntryPoint,
            Self::OpExecutionMode,
            Self::OpExecutionModeId,
        ]
        .contains(&self)
            || self.is_debuginfo()
    }

    pub fn is_access_chain(self) -> bool {
        [Self::OpAccessChain, Self::OpInBoundsAccessChain, Self::OpPtrAccessChain].contains(&self)
    }
}

impl fmt::Debug for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "Op#{}", self.0),
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

macro_rules! def_opcodes {
    ($($name:ident = $value:literal),+ $(,)?) => {
        #[allow(non_upper_case_globals)]
        impl Opcode {
            $(pub const $name: Opcode = Opcode($value);)+
        }

        const ALL_OPCODES: &[(&str, Opcode)] = &[$((stringify!($name), Opcode::$name)),+];
    };
}

def_opcodes! {
    OpNop = 0,
    OpUndef = 1,
    OpSourceContinued = 2,
    OpSource = 3,
    OpSourceExtension = 4,
    OpName = 5,
    OpMemberName = 6,
    OpString = 7,
    OpLine = 8,
    OpExtension = 10,
    OpExtInstImport = 11,
    OpExtInst = 12,
    OpMemoryModel = 14,
    OpEntryPoint = 15,
    OpExecutionMode = 16,
    OpCapability = 17,

    OpTypeVoid = 19,
    OpTypeBool = 20,
    OpTypeInt = 21,
    OpTypeFloat = 22,
    OpTypeVector = 23,
    OpTypeMatrix = 24,
    OpTypeImage = 25,
    OpTypeSampler = 26,
    OpTypeSampledImage = 27,
    OpTypeArray = 28,
    OpTypeRuntimeArray = 29,
    OpTypeStruct = 30,
    OpTypePointer = 32,
    OpTypeFunction = 33,

    OpConstantTrue = 41,
    OpConstantFalse = 42,
    OpConstant = 43,
    OpConstantComposite = 44,

    OpFunction = 54,
    OpFunctionParameter = 55,
    OpFunctionEnd = 56,
    OpFunctionCall = 57,
    OpVariable = 59,
    OpImageTexelPointer = 60,
    OpLoad = 61,
    OpStore = 62,
    OpCopyMemory = 63,
    OpCopyMemorySized = 64,
    OpAccessChain = 65,
    OpInBoundsAccessChain = 66,
    OpPtrAccessChain = 67,

    OpDecorate = 71,
    OpMemberDecorate = 72,

    OpCompositeConstruct = 80,
    OpCompositeExtract = 81,
    OpCopyObject = 83,
    OpSampledImage = 86,
    OpImageSampleImplicitLod = 87,
    OpImageFetch = 95,
    OpImageRead = 98,
    OpImageWrite = 99,
    OpImageQuerySizeLod = 103,
    OpImageQuerySize = 104,
    OpImageQueryLod = 105,
    OpImageQueryLevels = 106,
    OpImageQuerySamples = 107,

    OpBitcast = 124,
    OpFAdd = 129,
    OpFMul = 133,
    OpIAddCarry = 149,
    OpISubBorrow = 150,
    OpUMulExtended = 151,
    OpSMulExtended = 152,

    OpDPdxFine = 210,
    OpDPdyFine = 211,
    OpFwidthFine = 212,
    OpDPdxCoarse = 213,
    OpDPdyCoarse = 214,
    OpFwidthCoarse = 215,

    OpAtomicLoad = 227,
    OpAtomicStore = 228,
    OpAtomicExchange = 229,
    OpAtomicCompareExchange = 230,
    OpAtomicCompareExchangeWeak = 231,
    OpAtomicIIncrement = 232,
    OpAtomicIDecrement = 233,
    OpAtomicIAdd = 234,
    OpAtomicISub = 235,
    OpAtomicSMin = 236,
    OpAtomicUMin = 237,
    OpAtomicSMax = 238,
    OpAtomicUMax = 239,
    OpAtomicAnd = 240,
    OpAtomicOr = 241,
    OpAtomicXor = 242,

    OpLabel = 248,
    OpBranch = 249,
    OpReturn = 253,
    OpReturnValue = 254,

    OpNoLine = 317,
    OpAtomicFlagTestAndSet = 318,
    OpModuleProcessed = 330,
    OpExecutionModeId = 331,
}

macro_rules! def_enumerands {
    ($($(#[$attr:meta])* $kind:ident { $($name:ident = $value:literal),+ $(,)? })+) => {
        $(
            $(#[$attr])*
            #[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
            pub struct $kind(pub u32);

            #[allow(non_upper_case_globals)]
            impl $kind {
                $(pub const $name: $kind = $kind($value);)+

                pub fn name(self) -> Option<&'static str> {
                    match self.0 {
                        $($value => Some(stringify!($name)),)+
                        _ => None,
                    }
                }
            }

            impl fmt::Debug for $kind {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    match self.name() {
                        Some(name) => f.write_str(name),
                        None => write!(f, "{}({})", stringify!($kind), self.0),
                    }
                }
            }
        )+
    };
}

def_enumerands! {
    AddressingModel {
        Logical = 0,
        Physical32 = 1,
        Physical64 = 2,
    }

    MemoryModel {
        Simple = 0,
        GLSL450 = 1,
        OpenCL = 2,
        Vulkan = 3,
    }

    Capability {
        Matrix = 0,
        Shader = 1,
        Float64 = 10,
        ImageCubeArray = 34,
    }

    StorageClass {
        UniformConstant = 0,
        Input = 1,
        Uniform = 2,
        Output = 3,
        Workgroup = 4,
        CrossWorkgroup = 5,
        Private = 6,
        Function = 7,
        Generic = 8,
        PushConstant = 9,
        AtomicCounter = 10,
        Image = 11,
        StorageBuffer = 12,
    }

    Decoration {
        Block = 2,
        ArrayStride = 6,
        BuiltIn = 11,
        Location = 30,
        Binding = 33,
        DescriptorSet = 34,
        Offset = 35,
    }

    BuiltIn {
        Position = 0,
        PointSize = 1,
        VertexId = 5,
        InstanceId = 6,
        PrimitiveId = 7,
        FragCoord = 15,
        SampleId = 18,
        SamplePosition = 19,
        SampleMask = 20,
        FragDepth = 22,
        VertexIndex = 42,
        InstanceIndex = 43,
    }

    Dim {
        Dim1D = 0,
        Dim2D = 1,
        Dim3D = 2,
        Cube = 3,
        Rect = 4,
        Buffer = 5,
        SubpassData = 6,
    }

    AccessQualifier {
        ReadOnly = 0,
        WriteOnly = 1,
        ReadWrite = 2,
    }
}

/// Name of the standard GLSL extended instruction set.
pub const GLSL_STD_450: &str = "GLSL.std.450";

/// `RoundEven` in the `GLSL.std.450` extended instruction set.
pub const GLSL_STD_450_ROUND_EVEN: u32 = 2;

/// SPIR-V 1.4 (header version word), from which entry point interfaces list
/// every global variable, not just `Input`/`Output` ones.
pub const VERSION_1_4: u32 = 0x0001_0400;

#[test]
fn opcode_names_roundtrip() {
    assert_eq!(Opcode::OpVariable.name(), Some("OpVariable"));
    assert_eq!(Opcode::from_u16(59), Opcode::OpVariable);
    assert_eq!(Opcode::from_u16(9999).name(), None);
    assert_eq!(format!("{:?}", StorageClass(9999)), "StorageClass(9999)");
    assert!(Opcode::OpName.is_debuginfo());
    assert!(!Opcode::OpDecorate.is_preamble());
}
