//! Owned, editable SPIR-V instruction stream.
//!
//! Positions in the stream are [`Cursor`]s (word offsets of an instruction's
//! header word). All edits go through [`InstStream`] methods, which return a
//! cursor that stays meaningful after the edit; any *other* cursors pointing
//! after the edited instruction are invalidated by it.

use crate::spv::{self, read, spec};
use std::iter;

/// Position of an instruction in an [`InstStream`] (may also be the end).
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cursor(usize);

#[derive(Clone, Debug)]
pub struct InstStream {
    words: Vec<u32>,

    /// Next unused ID, kept in sync with the header's ID bound.
    next_id: spv::Id,
}

impl InstStream {
    /// Takes ownership of `words`, without validating them (see
    /// [`validate_header`](Self::validate_header) and [`validate`](Self::validate)).
    pub fn from_words(words: Vec<u32>) -> Self {
        let next_id = words.get(spec::HEADER_BOUND_IDX).copied().unwrap_or(0);
        Self { words, next_id }
    }

    pub fn validate_header(&self) -> Result<(), read::ReadError> {
        read::validate_header(&self.words)
    }

    /// Validates the header, and that every instruction is well-framed,
    /// which all other methods assume (and assert).
    pub fn validate(&self) -> Result<(), read::ReadError> {
        read::validate_header(&self.words)?;
        read::validate_framing(&self.words)
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub fn into_words(self) -> Vec<u32> {
        self.words
    }

    /// The SPIR-V version word from the header.
    pub fn version(&self) -> u32 {
        self.words[1]
    }

    /// One more than the largest ID in use (including allocated IDs).
    pub fn id_bound(&self) -> spv::Id {
        self.next_id
    }

    /// Returns a new ID, never used before in this stream.
    pub fn allocate_id(&mut self) -> spv::Id {
        let id = self.next_id;
        self.next_id = id.checked_add(1).expect("SPIR-V ID bound overflowed u32");
        self.words[spec::HEADER_BOUND_IDX] = self.next_id;
        id
    }

    pub fn begin(&self) -> Cursor {
        Cursor(spec::HEADER_LEN)
    }

    pub fn end(&self) -> Cursor {
        Cursor(self.words.len())
    }

    pub fn is_end(&self, cursor: Cursor) -> bool {
        cursor.0 >= self.words.len()
    }

    /// Position of the first instruction past the debug/preamble sections,
    /// i.e. where new `OpDecorate`s can be inserted.
    pub fn begin_annotations(&self) -> Cursor {
        self.iter()
            .find(|(_, inst)| !inst.opcode.is_preamble())
            .map_or(self.end(), |(cursor, _)| cursor)
    }

    pub fn get(&self, cursor: Cursor) -> spv::Inst<'_> {
        inst_at(&self.words, cursor.0).0
    }

    pub fn get_mut(&mut self, cursor: Cursor) -> spv::InstMut<'_> {
        let (opcode, word_count) = self.framing_at(cursor);
        spv::InstMut { opcode, operands: &mut self.words[cursor.0 + 1..cursor.0 + word_count] }
    }

    /// Cursor of the instruction following the one at `cursor`.
    pub fn next(&self, cursor: Cursor) -> Cursor {
        Cursor(cursor.0 + self.framing_at(cursor).1)
    }

    pub fn iter(&self) -> Insts<'_> {
        Insts { words: &self.words, pos: spec::HEADER_LEN }
    }

    /// Inserts a new instruction before the one at `at`, returning the cursor
    /// right after the inserted instruction (i.e. the instruction which was at
    /// `at`), so that repeated insertions keep their relative order.
    pub fn insert(&mut self, at: Cursor, opcode: spec::Opcode, operands: &[u32]) -> Cursor {
        let word_count =
            u16::try_from(1 + operands.len()).expect("instruction word count overflowed u16");
        assert!(at.0 >= spec::HEADER_LEN && at.0 <= self.words.len());

        self.words.splice(
            at.0..at.0,
            iter::once(spv::inst_header_word(opcode, word_count)).chain(operands.iter().copied()),
        );
        Cursor(at.0 + usize::from(word_count))
    }

    /// Removes the instruction at `at`, returning the cursor of the
    /// instruction which followed it (which is `at` itself).
    pub fn erase(&mut self, at: Cursor) -> Cursor {
        let (_, word_count) = self.framing_at(at);
        self.words.drain(at.0..at.0 + word_count);
        at
    }

    /// Removes the operand word at `operand_idx` (0 being the word right
    /// after the header), shrinking the instruction's word count.
    pub fn erase_operand(&mut self, at: Cursor, operand_idx: usize) {
        let (opcode, word_count) = self.framing_at(at);
        assert!(
            1 + operand_idx < word_count,
            "{opcode} has no operand {operand_idx} to erase"
        );
        self.words.remove(at.0 + 1 + operand_idx);
        self.words[at.0] = spv::inst_header_word(opcode, (word_count - 1) as u16);
    }

    /// Appends an operand word to the instruction at `at`.
    pub fn push_operand(&mut self, at: Cursor, word: u32) {
        let (opcode, word_count) = self.framing_at(at);
        let word_count =
            u16::try_from(word_count + 1).expect("instruction word count overflowed u16");
        self.words.insert(at.0 + usize::from(word_count) - 1, word);
        self.words[at.0] = spv::inst_header_word(opcode, word_count);
    }

    /// Returns a copy of this stream with all debuginfo removed (see
    /// [`Opcode::is_debuginfo`](spec::Opcode::is_debuginfo)).
    pub fn strip(&self) -> InstStream {
        let mut words = Vec::with_capacity(self.words.len());
        words.extend_from_slice(&self.words[..spec::HEADER_LEN]);

        let mut pos = spec::HEADER_LEN;
        while pos < self.words.len() {
            let (inst, word_count) = inst_at(&self.words, pos);
            if !inst.opcode.is_debuginfo() {
                words.extend_from_slice(&self.words[pos..pos + word_count]);
            }
            pos += word_count;
        }

        InstStream { words, next_id: self.next_id }
    }

    fn framing_at(&self, cursor: Cursor) -> (spec::Opcode, usize) {
        let (opcode, word_count) = spv::split_header_word(self.words[cursor.0]);
        assert!(word_count > 0, "corrupt SPIR-V: zero word count at word {}", cursor.0);
        (opcode, word_count)
    }
}

fn inst_at(words: &[u32], pos: usize) -> (spv::Inst<'_>, usize) {
    let (opcode, word_count) = spv::split_header_word(words[pos]);
    assert!(word_count > 0, "corrupt SPIR-V: zero word count at word {pos}");
    (spv::Inst { opcode, operands: &words[pos + 1..pos + word_count] }, word_count)
}

/// Iterator over `(Cursor, Inst)` pairs, in stream order.
pub struct Insts<'a> {
    words: &'a [u32],
    pos: usize,
}

impl<'a> Iterator for Insts<'a> {
    type Item = (Cursor, spv::Inst<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.words.len() {
            return None;
        }
        let cursor = Cursor(self.pos);
        let (inst, word_count) = inst_at(self.words, self.pos);
        self.pos += word_count;
        Some((cursor, inst))
    }
}
