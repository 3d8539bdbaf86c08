// SPDX-License-Identifier: GPL-3.0-or-later
//! Branch, call and HI16/LO16 reference discovery over raw code.

use std::collections::HashSet;
use std::sync::OnceLock;

use crate::mips::{Category, Dispatcher, InstructionWord, MnemonicId, TotalDispatcher};

/// A `lui` and the instruction completing the address it started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HiLoPair {
    pub hi_pc: u32,
    pub lo_pc: u32,
    pub symbol_address: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PairEvent {
    /// Unknown word: forget everything.
    Reset,
    None,
    Hi { reg: u32, upper: u32 },
    Lo { reg: u32, offset: i16 },
}

fn branch_dispatcher() -> &'static TotalDispatcher<Option<u32>> {
    static BRANCHES: OnceLock<TotalDispatcher<Option<u32>>> = OnceLock::new();
    BRANCHES.get_or_init(|| {
        let mut builder = Dispatcher::builder();
        builder
            .register_category(Category::Branch, |pc, insn: InstructionWord| {
                Some(insn.branch_target(pc))
            })
            .register(MnemonicId::J, |pc, insn: InstructionWord| {
                Some(insn.full_jump_target(pc))
            });
        builder.build_with_default(|_, _| None)
    })
}

fn call_dispatcher() -> &'static TotalDispatcher<Option<u32>> {
    static CALLS: OnceLock<TotalDispatcher<Option<u32>>> = OnceLock::new();
    CALLS.get_or_init(|| {
        let mut builder = Dispatcher::builder();
        builder.register(MnemonicId::Jal, |pc, insn: InstructionWord| {
            Some(insn.full_jump_target(pc))
        });
        builder.build_with_default(|_, _| None)
    })
}

fn pair_dispatcher() -> &'static TotalDispatcher<PairEvent> {
    static PAIRS: OnceLock<TotalDispatcher<PairEvent>> = OnceLock::new();
    PAIRS.get_or_init(|| {
        let mut builder = Dispatcher::builder();
        builder
            .register_category(Category::AllValid, |_, _| PairEvent::None)
            .register_category(Category::LoadStore, |_, insn: InstructionWord| PairEvent::Lo {
                reg: insn.base(),
                offset: insn.immediate_signed(),
            })
            .register(MnemonicId::Lui, |_, insn: InstructionWord| PairEvent::Hi {
                reg: insn.rt(),
                upper: u32::from(insn.immediate()) << 16,
            })
            .register(MnemonicId::Addiu, |_, insn: InstructionWord| {
                if insn.rt() == insn.rs() {
                    PairEvent::Lo {
                        reg: insn.rs(),
                        offset: insn.immediate_signed(),
                    }
                } else {
                    PairEvent::None
                }
            });
        builder.build_with_default(|_, _| PairEvent::Reset)
    })
}

/// Apply `dispatcher` to every word and keep the distinct targets in
/// first-seen order.
fn collect_targets(
    dispatcher: &TotalDispatcher<Option<u32>>,
    words: &[InstructionWord],
    start_pc: u32,
) -> Vec<u32> {
    let mut seen = HashSet::new();
    words
        .iter()
        .enumerate()
        .filter_map(|(i, &insn)| dispatcher.dispatch(start_pc.wrapping_add(4 * i as u32), insn))
        .filter(|&target| seen.insert(target))
        .collect()
}

/// Distinct non-zero targets of conditional branches and `j`.
pub fn discover_branch_targets(words: &[InstructionWord], start_pc: u32) -> Vec<u32> {
    let mut targets = collect_targets(branch_dispatcher(), words, start_pc);
    targets.retain(|&target| target != 0);
    targets
}

/// Distinct `jal` targets.
pub fn discover_function_calls(words: &[InstructionWord], start_pc: u32) -> Vec<u32> {
    collect_targets(call_dispatcher(), words, start_pc)
}

/// Pair each `lui` with the next `addiu rX, rX, lo` or load/store based on
/// the same register.
pub fn discover_hi16_lo16_pairs(words: &[InstructionWord], start_pc: u32) -> Vec<HiLoPair> {
    let dispatcher = pair_dispatcher();
    let mut pending: [Option<(u32, u32)>; 32] = [None; 32];
    let mut pairs = Vec::new();

    for (i, &insn) in words.iter().enumerate() {
        let pc = start_pc.wrapping_add(4 * i as u32);
        match dispatcher.dispatch(pc, insn) {
            PairEvent::Reset => pending = [None; 32],
            PairEvent::None => {}
            PairEvent::Hi { reg, upper } => pending[reg as usize] = Some((pc, upper)),
            PairEvent::Lo { reg, offset } => {
                if let Some((hi_pc, upper)) = pending[reg as usize].take() {
                    pairs.push(HiLoPair {
                        hi_pc,
                        lo_pc: pc,
                        symbol_address: upper.wrapping_add(offset as i32 as u32),
                    });
                }
            }
        }
    }

    pairs
}
