// SPDX-License-Identifier: GPL-3.0-or-later
//! Position-independent form of an instruction stream.
//!
//! Zeroing every field a linker would patch lets two copies of one function,
//! linked at different addresses, produce identical bytes.

use super::classify::Classifier;
use super::insn::{InstructionWord, words_to_bytes};
use super::mnemonic::MnemonicId;

/// Copy of `instructions` with `j`/`jal` targets and `lui`/`addiu`-style
/// HI16/LO16 immediates zeroed.
///
/// A `lui` stays pending on its register until an `addiu` or load/store
/// uses that register as base, which zeroes both immediates. Any other
/// write to the register drops the pending `lui`. This is an approximation
/// of liveness, not a reaching-definitions analysis.
pub fn zero_relocated_copy(
    classifier: &Classifier,
    instructions: &[(u32, InstructionWord)],
) -> Vec<(u32, InstructionWord)> {
    let mut out = instructions.to_vec();
    let mut pending_hi: [Option<usize>; 32] = [None; 32];

    for i in 0..out.len() {
        let (_, insn) = out[i];
        let id = if classifier.is_load_or_store(insn) {
            MnemonicId::Addiu
        } else {
            classifier.mnemonic_of(insn)
        };

        match id {
            MnemonicId::J | MnemonicId::Jal => {
                out[i].1 = insn.with_jump_target_raw(0);
            }
            MnemonicId::Lui => {
                pending_hi[insn.rt() as usize] = Some(i);
            }
            MnemonicId::Addiu => {
                let base = insn.base() as usize;
                if let Some(hi) = pending_hi[base].take() {
                    out[hi].1 = out[hi].1.with_immediate(0);
                    out[i].1 = insn.with_immediate(0);
                }
                if let Some(dest) = classifier.destination_gpr(insn) {
                    pending_hi[dest as usize] = None;
                }
            }
            _ => {
                if let Some(dest) = classifier.destination_gpr(insn) {
                    pending_hi[dest as usize] = None;
                }
            }
        }
    }

    out
}

/// Big-endian bytes of [`zero_relocated_copy`], suitable for hashing.
pub fn normalized_bytes(classifier: &Classifier, instructions: &[(u32, InstructionWord)]) -> Vec<u8> {
    let words: Vec<InstructionWord> = zero_relocated_copy(classifier, instructions)
        .into_iter()
        .map(|(_, insn)| insn)
        .collect();
    words_to_bytes(&words)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(base: u32, words: &[u32]) -> Vec<(u32, InstructionWord)> {
        words
            .iter()
            .enumerate()
            .map(|(i, &w)| (base + 4 * i as u32, InstructionWord::new(w)))
            .collect()
    }

    fn words(stream: &[(u32, InstructionWord)]) -> Vec<u32> {
        stream.iter().map(|(_, insn)| insn.word()).collect()
    }

    #[test]
    fn zeroes_jump_targets() {
        let c = Classifier::global();
        let input = stream(0x8080_0000, &[0x0c20_0010, 0x0820_0040, 0x0000_0000]);
        let out = zero_relocated_copy(c, &input);
        assert_eq!(words(&out), vec![0x0c00_0000, 0x0800_0000, 0x0000_0000]);
        assert_eq!(out[1].0, 0x8080_0004);
    }

    #[test]
    fn zeroes_hi_lo_pairs() {
        let c = Classifier::global();
        let input = stream(
            0x8080_0000,
            &[
                0x3c04_8081, // lui   $a0, 0x8081
                0x2484_1234, // addiu $a0, $a0, 0x1234
                0x3c05_8082, // lui   $a1, 0x8082
                0x8ca5_fff0, // lw    $a1, -0x10($a1)
            ],
        );
        let out = zero_relocated_copy(c, &input);
        assert_eq!(
            words(&out),
            vec![0x3c04_0000, 0x2484_0000, 0x3c05_0000, 0x8ca5_0000]
        );
    }

    #[test]
    fn intervening_write_drops_pending_lui() {
        let c = Classifier::global();
        let input = stream(
            0x8080_0000,
            &[
                0x3c04_8081, // lui   $a0, 0x8081
                0x0000_2025, // or    $a0, $zero, $zero
                0x2484_1234, // addiu $a0, $a0, 0x1234
            ],
        );
        let out = zero_relocated_copy(c, &input);
        assert_eq!(words(&out), words(&input));
    }

    #[test]
    fn same_code_at_different_addresses_normalizes_identically() {
        let c = Classifier::global();
        let a = stream(0x8080_0000, &[0x3c04_8081, 0x2484_1234, 0x0c20_0010, 0x03e0_0008, 0]);
        let b = stream(0x8090_0000, &[0x3c04_8091, 0x2484_5678, 0x0c24_0010, 0x03e0_0008, 0]);
        assert_ne!(words(&a), words(&b));
        assert_eq!(normalized_bytes(c, &a), normalized_bytes(c, &b));
        assert_eq!(normalized_bytes(c, &a).len(), 20);
    }
}
