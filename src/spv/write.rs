//! Low-level emission of SPIR-V binary form.

use crate::spv::{self, spec};
use std::path::Path;
use std::{fs, io};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("in {opcode}: word count of SPIR-V instruction doesn't fit in 16 bits")]
    TooManyOperands { opcode: spec::Opcode },
}

pub struct ModuleEmitter {
    /// Output SPIR-V words.
    pub words: Vec<u32>,
}

impl ModuleEmitter {
    pub fn with_header(header: [u32; spec::HEADER_LEN]) -> Self {
        Self { words: header.into() }
    }

    /// Header for a module of the given `version` (e.g. `0x0001_0300`) and
    /// ID `bound`, with no generator magic.
    pub fn header(version: u32, bound: u32) -> [u32; spec::HEADER_LEN] {
        [spec::Spec::get().magic, version, 0, bound, 0]
    }

    pub fn push_inst(&mut self, opcode: spec::Opcode, operands: &[u32]) -> Result<(), WriteError> {
        let word_count = u16::try_from(1 + operands.len())
            .ok()
            .ok_or(WriteError::TooManyOperands { opcode })?;

        self.words.reserve(usize::from(word_count));
        self.words.push(spv::inst_header_word(opcode, word_count));
        self.words.extend_from_slice(operands);

        Ok(())
    }

    /// Like [`push_inst`](Self::push_inst), with a `LiteralString` spliced in
    /// between `before` and `after` operands (e.g. for `OpName`).
    pub fn push_inst_with_str(
        &mut self,
        opcode: spec::Opcode,
        before: &[u32],
        s: &str,
        after: &[u32],
    ) -> Result<(), WriteError> {
        let operands: Vec<u32> = before
            .iter()
            .copied()
            .chain(spv::encode_literal_string(s))
            .chain(after.iter().copied())
            .collect();
        self.push_inst(opcode, &operands)
    }

    pub fn write_to_spv_file(&self, path: impl AsRef<Path>) -> io::Result<()> {
        write_spv_file(path, &self.words)
    }
}

/// Writes `words` as a SPIR-V binary file (in native endianness).
pub fn write_spv_file(path: impl AsRef<Path>, words: &[u32]) -> io::Result<()> {
    fs::write(path, bytemuck::cast_slice::<u32, u8>(words))
}
