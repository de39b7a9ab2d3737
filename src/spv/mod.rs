//! SPIR-V support: reading, writing and in-place editing of binary modules.

// NOTE: all the modules are declared here, but they're documented "inside"
// (i.e. using inner doc comments).
pub mod parse;
pub mod read;
pub mod spec;
pub mod stream;
pub mod write;

use smallvec::SmallVec;
use std::iter;
use std::string::FromUtf8Error;

/// SPIR-V ID (`0` is never a valid ID, but is kept representable for
/// dense indexing, see [`Definitions`](crate::defs::Definitions)).
pub type Id = u32;

/// A view of one SPIR-V instruction, without its header word.
#[derive(Copy, Clone)]
pub struct Inst<'a> {
    pub opcode: spec::Opcode,

    /// All the words following the header word (result type, result, operands).
    pub operands: &'a [u32],
}

impl Inst<'_> {
    /// Returns the operand at `idx`, or `None` if the instruction is too short.
    pub fn operand(&self, idx: usize) -> Option<u32> {
        self.operands.get(idx).copied()
    }

    /// Decodes the `LiteralString` starting at operand `idx`.
    pub fn literal_string(&self, idx: usize) -> Result<String, FromUtf8Error> {
        extract_literal_string(self.operands.get(idx..).unwrap_or(&[]))
    }
}

/// Mutable counterpart of [`Inst`], allowing operands to be patched in place.
pub struct InstMut<'a> {
    pub opcode: spec::Opcode,
    pub operands: &'a mut [u32],
}

/// Encodes an instruction's header word.
pub fn inst_header_word(opcode: spec::Opcode, word_count: u16) -> u32 {
    (u32::from(word_count) << spec::WORD_COUNT_SHIFT) | u32::from(opcode.as_u16())
}

/// Splits an instruction's header word into `(opcode, word_count)`.
pub fn split_header_word(word: u32) -> (spec::Opcode, usize) {
    (
        spec::Opcode::from_u16((word & spec::OPCODE_MASK) as u16),
        (word >> spec::WORD_COUNT_SHIFT) as usize,
    )
}

/// Given the words of a `LiteralString` (possibly followed by other operands,
/// which are ignored), returns a Rust [`String`] if the literal is valid UTF-8.
///
/// A missing `\0` terminator is tolerated (the literal then extends to the
/// last word).
pub fn extract_literal_string(words: &[u32]) -> Result<String, FromUtf8Error> {
    let mut bytes = Vec::with_capacity(words.len() * 4);
    'words: for word in words {
        for byte in word.to_le_bytes() {
            if byte == 0 {
                break 'words;
            }
            bytes.push(byte);
        }
    }
    String::from_utf8(bytes)
}

// FIXME(eddyb) this shouldn't just panic when `s.contains('\0')`.
pub fn encode_literal_string(s: &str) -> SmallVec<[u32; 4]> {
    assert!(!s.contains('\0'), "LiteralString {s:?} contains a \\0");

    let bytes = s.as_bytes();

    let full_words = bytes.chunks_exact(4).map(|w| <[u8; 4]>::try_from(w).unwrap());

    let leftover_bytes = &bytes[full_words.len() * 4..];
    let mut last_word = [0; 4];
    last_word[..leftover_bytes.len()].copy_from_slice(leftover_bytes);

    full_words.chain(iter::once(last_word)).map(u32::from_le_bytes).collect()
}
