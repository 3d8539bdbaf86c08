// SPDX-License-Identifier: GPL-3.0-or-later
//! Raw MIPS instruction words and their bitfields.
//!
//! Field layout (big-endian, MIPS III):
//!
//! | Field        | Bits  | Aliases          |
//! |--------------|-------|------------------|
//! | `opcode`     | 31-26 |                  |
//! | `rs`         | 25-21 | `base`, `fmt`    |
//! | `rt`         | 20-16 | `ft`             |
//! | `rd`         | 15-11 | `fs`             |
//! | `shift`      | 10-6  | `fd`             |
//! | `function`   | 5-0   |                  |
//! | `immediate`  | 15-0  |                  |
//! | `target`     | 25-0  |                  |

use byteorder::{BigEndian, ByteOrder};
use std::fmt;

const OPCODE_SHIFT: u32 = 26;
const RS_SHIFT: u32 = 21;
const RT_SHIFT: u32 = 16;
const RD_SHIFT: u32 = 11;
const SHAMT_SHIFT: u32 = 6;

const OPCODE_MASK: u32 = 0x3f;
const REG_MASK: u32 = 0x1f;
const FUNCTION_MASK: u32 = 0x3f;
const IMMEDIATE_MASK: u32 = 0xffff;
const TARGET_MASK: u32 = 0x03ff_ffff;

/// Segment bits preserved from the PC by `j`/`jal`.
const SEGMENT_MASK: u32 = 0xf000_0000;

/// Reach of a branch immediate, relative to the branch itself.
pub const MIN_BRANCH_OFFSET: i32 = i16::MIN as i32 * 4 + 4;
pub const MAX_BRANCH_OFFSET: i32 = i16::MAX as i32 * 4 + 4;

/// A single 32-bit MIPS instruction word.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstructionWord(u32);

/// Replace the bits selected by `mask << shift` with `value`.
const fn insert(word: u32, shift: u32, mask: u32, value: u32) -> u32 {
    (word & !(mask << shift)) | ((value & mask) << shift)
}

impl InstructionWord {
    pub const fn new(word: u32) -> Self {
        InstructionWord(word)
    }

    pub fn from_be_bytes(bytes: [u8; 4]) -> Self {
        InstructionWord(u32::from_be_bytes(bytes))
    }

    /// Read the word at `offset`, or `None` if fewer than 4 bytes remain.
    pub fn read(data: &[u8], offset: usize) -> Option<Self> {
        let bytes = data.get(offset..offset.checked_add(4)?)?;
        Some(InstructionWord(BigEndian::read_u32(bytes)))
    }

    pub const fn word(self) -> u32 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub const fn opcode(self) -> u32 {
        (self.0 >> OPCODE_SHIFT) & OPCODE_MASK
    }

    pub const fn rs(self) -> u32 {
        (self.0 >> RS_SHIFT) & REG_MASK
    }

    pub const fn rt(self) -> u32 {
        (self.0 >> RT_SHIFT) & REG_MASK
    }

    pub const fn rd(self) -> u32 {
        (self.0 >> RD_SHIFT) & REG_MASK
    }

    /// Base register of a load or store.
    pub const fn base(self) -> u32 {
        self.rs()
    }

    /// Floating-point format selector of a COP1 instruction.
    pub const fn fmt(self) -> u32 {
        self.rs()
    }

    pub const fn fs(self) -> u32 {
        self.rd()
    }

    pub const fn ft(self) -> u32 {
        self.rt()
    }

    pub const fn fd(self) -> u32 {
        self.shift_amount()
    }

    pub const fn shift_amount(self) -> u32 {
        (self.0 >> SHAMT_SHIFT) & REG_MASK
    }

    pub const fn function(self) -> u32 {
        self.0 & FUNCTION_MASK
    }

    /// Unsigned 16-bit immediate.
    pub const fn immediate(self) -> u16 {
        (self.0 & IMMEDIATE_MASK) as u16
    }

    pub const fn immediate_signed(self) -> i16 {
        self.immediate() as i16
    }

    /// Low 26 bits of a `j`/`jal`, in words.
    pub const fn jump_target_raw(self) -> u32 {
        self.0 & TARGET_MASK
    }

    /// Jump target within the current 256 MB segment, in bytes.
    pub const fn jump_target(self) -> u32 {
        self.jump_target_raw() << 2
    }

    /// Absolute `j`/`jal` destination. Keeps the top 4 bits of `pc`.
    pub const fn full_jump_target(self, pc: u32) -> u32 {
        (pc & SEGMENT_MASK) | self.jump_target()
    }

    /// Branch displacement relative to the branch itself. The architectural
    /// base is the delay slot, hence the extra 4.
    pub const fn branch_offset(self) -> i32 {
        (self.immediate_signed() as i32) * 4 + 4
    }

    pub const fn branch_target(self, pc: u32) -> u32 {
        pc.wrapping_add(self.branch_offset() as u32)
    }

    /// `break`/`syscall` code as GAS prints it: the upper 10 bits of the
    /// 20-bit code field.
    pub const fn break_code(self) -> u32 {
        (self.0 >> 16) & 0x3ff
    }

    /// Coprocessor number of a COPz instruction.
    pub const fn coprocessor(self) -> u32 {
        (self.0 >> OPCODE_SHIFT) & 0x3
    }

    pub const fn with_opcode(self, value: u32) -> Self {
        InstructionWord(insert(self.0, OPCODE_SHIFT, OPCODE_MASK, value))
    }

    pub const fn with_rs(self, value: u32) -> Self {
        InstructionWord(insert(self.0, RS_SHIFT, REG_MASK, value))
    }

    pub const fn with_rt(self, value: u32) -> Self {
        InstructionWord(insert(self.0, RT_SHIFT, REG_MASK, value))
    }

    pub const fn with_rd(self, value: u32) -> Self {
        InstructionWord(insert(self.0, RD_SHIFT, REG_MASK, value))
    }

    pub const fn with_shift_amount(self, value: u32) -> Self {
        InstructionWord(insert(self.0, SHAMT_SHIFT, REG_MASK, value))
    }

    pub const fn with_function(self, value: u32) -> Self {
        InstructionWord(insert(self.0, 0, FUNCTION_MASK, value))
    }

    pub const fn with_immediate(self, value: u16) -> Self {
        InstructionWord(insert(self.0, 0, IMMEDIATE_MASK, value as u32))
    }

    pub const fn with_jump_target_raw(self, value: u32) -> Self {
        InstructionWord(insert(self.0, 0, TARGET_MASK, value))
    }

    /// Inverse of [`branch_offset`](Self::branch_offset).
    ///
    /// `offset` must be word aligned and within the 16-bit immediate's reach.
    pub const fn with_branch_offset(self, offset: i32) -> Self {
        debug_assert!(Self::branch_offset_fits(offset));
        self.with_immediate(((offset - 4) / 4) as i16 as u16)
    }

    /// Like [`with_branch_offset`](Self::with_branch_offset), but `None` for
    /// offsets the immediate cannot encode.
    pub const fn checked_with_branch_offset(self, offset: i32) -> Option<Self> {
        if Self::branch_offset_fits(offset) {
            Some(self.with_immediate(((offset - 4) / 4) as i16 as u16))
        } else {
            None
        }
    }

    const fn branch_offset_fits(offset: i32) -> bool {
        offset % 4 == 0 && offset >= MIN_BRANCH_OFFSET && offset <= MAX_BRANCH_OFFSET
    }
}

impl From<u32> for InstructionWord {
    fn from(word: u32) -> Self {
        InstructionWord(word)
    }
}

impl From<InstructionWord> for u32 {
    fn from(insn: InstructionWord) -> Self {
        insn.0
    }
}

impl fmt::Display for InstructionWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// Split a big-endian byte buffer into instruction words. A trailing
/// partial word is ignored.
pub fn words_from_bytes(data: &[u8]) -> Vec<InstructionWord> {
    data.chunks_exact(4)
        .map(|chunk| InstructionWord(BigEndian::read_u32(chunk)))
        .collect()
}

pub fn words_to_bytes(words: &[InstructionWord]) -> Vec<u8> {
    let mut out = vec![0u8; words.len() * 4];
    for (chunk, insn) in out.chunks_exact_mut(4).zip(words) {
        BigEndian::write_u32(chunk, insn.0);
    }
    out
}

/// Drop zero words (`nop`) from the end of `words`.
pub fn remove_trailing_nops(words: &[InstructionWord]) -> &[InstructionWord] {
    let keep = words
        .iter()
        .rposition(|insn| !insn.is_zero())
        .map_or(0, |i| i + 1);
    &words[..keep]
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic spread of words covering every bit position.
    fn sample_words() -> impl Iterator<Item = u32> {
        let mut state: u32 = 0x1234_5678;
        (0..512).map(move |_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state
        })
    }

    #[test]
    fn field_extraction() {
        // addiu $t5, $zero, 4
        let insn = InstructionWord::new(0x240d_0004);
        assert_eq!(insn.opcode(), 9);
        assert_eq!(insn.rs(), 0);
        assert_eq!(insn.rt(), 13);
        assert_eq!(insn.immediate(), 4);
        assert_eq!(insn.immediate_signed(), 4);

        // add.s $f0, $f2, $f4
        let insn = InstructionWord::new(0x4604_1000);
        assert_eq!(insn.opcode(), 0x11);
        assert_eq!(insn.fmt(), 16);
        assert_eq!(insn.ft(), 4);
        assert_eq!(insn.fs(), 2);
        assert_eq!(insn.fd(), 0);
        assert_eq!(insn.function(), 0);
    }

    #[test]
    fn negative_immediate() {
        // addiu $sp, $sp, -0x18
        let insn = InstructionWord::new(0x27bd_ffe8);
        assert_eq!(insn.immediate(), 0xffe8);
        assert_eq!(insn.immediate_signed(), -0x18);
    }

    #[test]
    fn register_fields_round_trip() {
        for w in sample_words() {
            let insn = InstructionWord::new(w);
            let rebuilt = InstructionWord::default()
                .with_opcode(insn.opcode())
                .with_rs(insn.rs())
                .with_rt(insn.rt())
                .with_rd(insn.rd())
                .with_shift_amount(insn.shift_amount())
                .with_function(insn.function());
            assert_eq!(rebuilt, insn, "{w:#010x}");
        }
    }

    #[test]
    fn immediate_and_target_round_trip() {
        for w in sample_words() {
            let insn = InstructionWord::new(w);
            let itype = InstructionWord::default()
                .with_opcode(insn.opcode())
                .with_rs(insn.rs())
                .with_rt(insn.rt())
                .with_immediate(insn.immediate());
            assert_eq!(itype, insn, "{w:#010x}");

            let jtype = InstructionWord::default()
                .with_opcode(insn.opcode())
                .with_jump_target_raw(insn.jump_target_raw());
            assert_eq!(jtype, insn, "{w:#010x}");
        }
    }

    #[test]
    fn setters_mask_their_field() {
        let insn = InstructionWord::new(0).with_rt(0xff);
        assert_eq!(insn.word(), 0x001f_0000);
        let insn = InstructionWord::new(0xffff_ffff).with_jump_target_raw(0);
        assert_eq!(insn.word(), 0xfc00_0000);
    }

    #[test]
    fn full_jump_target_keeps_segment() {
        // jal 0x00800000
        let insn = InstructionWord::new((3 << 26) | (0x0080_0000 >> 2));
        assert_eq!(insn.jump_target(), 0x0080_0000);
        assert_eq!(insn.full_jump_target(0x8000_0000), 0x8080_0000);
        assert_eq!(insn.full_jump_target(0x8070_0000), 0x8080_0000);
        assert_eq!(insn.full_jump_target(0xa000_0000), 0xa080_0000);
        assert_eq!(insn.full_jump_target(0x0000_0000), 0x0080_0000);
    }

    #[test]
    fn branch_offset_is_relative_to_delay_slot() {
        // beq $zero, $zero, +0
        let insn = InstructionWord::new(0x1000_0000);
        assert_eq!(insn.branch_offset(), 4);
        assert_eq!(insn.branch_target(0x8000_0010), 0x8000_0014);

        // bne $t0, $zero, -2 words
        let insn = InstructionWord::new(0x1500_fffe);
        assert_eq!(insn.branch_offset(), -4);
        assert_eq!(insn.branch_target(0x8000_0010), 0x8000_000c);
    }

    #[test]
    fn branch_offset_setter_inverts_getter() {
        for offset in [MIN_BRANCH_OFFSET, -8, -4, 0, 4, 8, 0x1fffc, MAX_BRANCH_OFFSET] {
            let insn = InstructionWord::new(0x1000_0000).with_branch_offset(offset);
            assert_eq!(insn.branch_offset(), offset);
        }
    }

    #[test]
    fn checked_branch_offset_rejects_unencodable() {
        let insn = InstructionWord::new(0x1000_0000);
        for offset in [MIN_BRANCH_OFFSET - 4, MAX_BRANCH_OFFSET + 4, 2, -6] {
            assert_eq!(insn.checked_with_branch_offset(offset), None, "{offset:#x}");
        }
        assert_eq!(
            insn.checked_with_branch_offset(MIN_BRANCH_OFFSET).map(|i| i.immediate()),
            Some(0x8000)
        );
        assert_eq!(
            insn.checked_with_branch_offset(MAX_BRANCH_OFFSET).map(|i| i.immediate()),
            Some(0x7fff)
        );
    }

    #[test]
    fn break_code_uses_upper_ten_bits() {
        let insn = InstructionWord::new(0x03ff_000d);
        assert_eq!(insn.function(), 13);
        assert_eq!(insn.break_code(), 0x3ff);
    }

    #[test]
    fn li_fields_are_exposed() {
        // The `li $t5, 4` pseudo-op is addiu with rs == $zero.
        let insn = InstructionWord::new(0x240d_0004);
        assert_eq!((insn.opcode(), insn.rs()), (9, 0));
        assert_eq!(crate::mips::regs::gpr_name(insn.rt()), "$t5");
        assert_eq!(insn.immediate_signed(), 4);
    }

    #[test]
    fn read_bounds() {
        let data = [0x24, 0x0d, 0x00, 0x04, 0xff];
        assert_eq!(InstructionWord::read(&data, 0), Some(InstructionWord::new(0x240d_0004)));
        assert_eq!(InstructionWord::read(&data, 2), None);
        assert_eq!(InstructionWord::read(&data, usize::MAX), None);
    }

    #[test]
    fn byte_conversions() {
        let data = [0x03, 0xe0, 0x00, 0x08, 0x00, 0x00, 0x00, 0x00, 0xaa];
        let words = words_from_bytes(&data);
        assert_eq!(words, vec![InstructionWord::new(0x03e0_0008), InstructionWord::new(0)]);
        assert_eq!(words_to_bytes(&words), data[..8].to_vec());
    }

    #[test]
    fn trailing_nops() {
        let words: Vec<_> = [0x03e0_0008, 0, 0, 0].map(InstructionWord::new).into();
        assert_eq!(remove_trailing_nops(&words), &words[..1]);
        let zeros = [InstructionWord::new(0); 3];
        assert!(remove_trailing_nops(&zeros).is_empty());
    }
}
