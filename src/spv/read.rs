//! Low-level checks and loading of SPIR-V binary form.

use crate::spv::{self, spec};
use std::path::Path;
use std::{fs, io};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("malformed SPIR-V (not a multiple of 4 bytes)")]
    NotWordAligned,

    #[error("malformed SPIR-V (too short: {0} words)")]
    TooShort(usize),

    #[error("malformed SPIR-V (incorrect magic number 0x{0:08x})")]
    BadMagic(u32),

    #[error("malformed SPIR-V (zero word count at word {offset})")]
    ZeroWordCount { offset: usize },

    #[error("malformed SPIR-V (in {opcode}: truncated instruction at word {offset})")]
    TruncatedInst { opcode: spec::Opcode, offset: usize },

    #[error("failed to read SPIR-V file: {0}")]
    Io(#[from] io::Error),
}

/// Checks that `words` starts with a complete header, with the right magic.
pub fn validate_header(words: &[u32]) -> Result<(), ReadError> {
    if words.len() < spec::HEADER_LEN {
        return Err(ReadError::TooShort(words.len()));
    }
    let magic = words[0];
    if magic != spec::Spec::get().magic {
        return Err(ReadError::BadMagic(magic));
    }
    Ok(())
}

/// Checks that every instruction after the header has a non-zero word count,
/// and fits entirely within `words`.
pub fn validate_framing(words: &[u32]) -> Result<(), ReadError> {
    let mut offset = spec::HEADER_LEN;
    while offset < words.len() {
        let (opcode, word_count) = spv::split_header_word(words[offset]);
        if word_count == 0 {
            return Err(ReadError::ZeroWordCount { offset });
        }
        if offset + word_count > words.len() {
            return Err(ReadError::TruncatedInst { opcode, offset });
        }
        offset += word_count;
    }
    Ok(())
}

pub fn read_spv_file(path: impl AsRef<Path>) -> Result<Vec<u32>, ReadError> {
    words_from_spv_bytes(&fs::read(path)?)
}

/// Converts bytes to native-endian words, swapping endianness of all words
/// if the magic number is found byte-reversed.
pub fn words_from_spv_bytes(spv_bytes: &[u8]) -> Result<Vec<u32>, ReadError> {
    let spv_spec = spec::Spec::get();

    if spv_bytes.len() % 4 != 0 {
        return Err(ReadError::NotWordAligned);
    }
    // `pod_collect_to_vec` copies, so the input doesn't need to be aligned.
    let mut spv_words: Vec<u32> = bytemuck::pod_collect_to_vec(spv_bytes);

    if spv_words.len() < spec::HEADER_LEN {
        return Err(ReadError::TooShort(spv_words.len()));
    }

    let magic = spv_words[0];
    if magic == spv_spec.magic {
        // Nothing to do, all words already match native endianness.
    } else if magic.swap_bytes() == spv_spec.magic {
        for word in &mut spv_words {
            *word = word.swap_bytes();
        }
    } else {
        return Err(ReadError::BadMagic(magic));
    }

    Ok(spv_words)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> Vec<u32> {
        vec![spec::Spec::get().magic, 0x0001_0000, 0, 8, 0]
    }

    #[test]
    fn header_checks() {
        assert!(matches!(validate_header(&[]), Err(ReadError::TooShort(0))));
        assert!(matches!(validate_header(&[1, 2, 3, 4, 5]), Err(ReadError::BadMagic(1))));
        assert!(validate_header(&header()).is_ok());
    }

    #[test]
    fn framing_checks() {
        let mut words = header();
        words.push(spv::inst_header_word(spec::Opcode::OpNop, 1));
        assert!(validate_framing(&words).is_ok());

        words.push(spv::inst_header_word(spec::Opcode::OpName, 3));
        words.push(1);
        assert!(matches!(
            validate_framing(&words),
            Err(ReadError::TruncatedInst { opcode: spec::Opcode::OpName, offset: 6 })
        ));

        let mut words = header();
        words.push(0);
        assert!(matches!(validate_framing(&words), Err(ReadError::ZeroWordCount { offset: 5 })));
    }

    #[test]
    fn byte_swapped_input() {
        let words = header();
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes()).collect();
        let native: Vec<u8> = words.iter().flat_map(|w| w.to_ne_bytes()).collect();
        assert_eq!(words_from_spv_bytes(&native).unwrap(), words);
        if cfg!(target_endian = "little") {
            assert_eq!(words_from_spv_bytes(&bytes).unwrap(), words);
        }
        assert!(matches!(words_from_spv_bytes(&native[..7]), Err(ReadError::NotWordAligned)));
    }
}
