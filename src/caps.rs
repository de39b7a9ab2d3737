use bitflags::bitflags;

bitflags! {
    /// Shader features used by a module, which downstream code maps to
    /// minimum target-profile requirements.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        const DOUBLE = 1 << 0;
        const CUBE_MAP_ARRAY = 1 << 1;
        const VERTEX_ID = 1 << 2;
        const INSTANCE_ID = 1 << 3;
        const PRIMITIVE_ID = 1 << 4;
        const SAMPLE_VARIABLES = 1 << 5;
        const IMAGE_LOAD_STORE = 1 << 6;
        const TEXTURE_FETCH = 1 << 7;
        const TEXTURE_QUERY_LOD = 1 << 8;
        const TEXTURE_QUERY_LEVELS = 1 << 9;
        const TEXTURE_QUERY_SAMPLES = 1 << 10;
        const BIT_ENCODING = 1 << 11;
        const EXTENDED_ARITHMETIC = 1 << 12;
        const DERIVATIVE_CONTROL = 1 << 13;
        const ROUND_EVEN = 1 << 14;

        /// Integer-typed inputs, outputs or parameters.
        const INTEGER = 1 << 15;
    }
}
