// SPDX-License-Identifier: GPL-3.0-or-later
//! Function boundary recovery from an unannotated instruction stream.
//!
//! A function opens at the first valid instruction seen outside a function
//! (leading zero words are padding) and closes after the delay slot of a
//! `jr $ra` that no earlier branch reaches past. Functions that never
//! execute `jr $ra` are dropped.

use log::debug;
use std::fmt;
use std::sync::OnceLock;

use crate::mips::{Category, Dispatcher, InstructionWord, MnemonicId, REG_RA, TotalDispatcher};

/// Control-flow role of one instruction, as seen by the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Invalid,
    Plain,
    JumpRegister { rs: u32 },
    /// `j` or a conditional branch, with its absolute target.
    Transfer { target: u32 },
}

fn flow_dispatcher() -> &'static TotalDispatcher<Flow> {
    static FLOW: OnceLock<TotalDispatcher<Flow>> = OnceLock::new();
    FLOW.get_or_init(|| {
        let mut builder = Dispatcher::builder();
        builder
            .register_category(Category::AllValid, |_, _| Flow::Plain)
            .register(MnemonicId::Jr, |_, insn: InstructionWord| Flow::JumpRegister {
                rs: insn.rs(),
            })
            .register(MnemonicId::J, |pc, insn: InstructionWord| Flow::Transfer {
                target: insn.full_jump_target(pc),
            })
            .register_category(Category::Branch, |pc, insn: InstructionWord| {
                Flow::Transfer {
                    target: insn.branch_target(pc),
                }
            });
        builder.build_with_default(|_, _| Flow::Invalid)
    })
}

/// A recovered function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFunction {
    pub start_address: u32,
    /// Size in bytes, including the final delay slot.
    pub size: u32,
    /// Decoded instructions, without invalid words.
    pub instructions: Vec<(u32, InstructionWord)>,
}

impl DiscoveredFunction {
    fn new(start_address: u32) -> Self {
        DiscoveredFunction {
            start_address,
            size: 0,
            instructions: Vec::new(),
        }
    }

    /// Address one past the last byte.
    pub fn end_address(&self) -> u32 {
        self.start_address.wrapping_add(self.size)
    }

    pub fn contains(&self, addr: u32) -> bool {
        addr >= self.start_address && addr < self.end_address()
    }
}

impl fmt::Display for DiscoveredFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "0x{:08X} - 0x{:08X} ({} instructions)",
            self.start_address,
            self.end_address(),
            self.instructions.len()
        )
    }
}

/// Scanner state between instructions.
#[derive(Default)]
struct Scanner {
    current: Option<DiscoveredFunction>,
    /// Bytes consumed since the function start.
    current_extent: u32,
    /// Furthest forward transfer target, relative to the function start.
    max_extent: u32,
    in_final_delay_slot: bool,
    saw_return: bool,
    found: Vec<DiscoveredFunction>,
}

impl Scanner {
    fn step(&mut self, pc: u32, insn: InstructionWord, flow: Flow) {
        if self.current.is_none() && insn.is_zero() {
            return;
        }

        if flow != Flow::Invalid {
            let start = self
                .current
                .get_or_insert_with(|| DiscoveredFunction::new(pc))
                .start_address;

            self.current_extent += 4;
            let closing = std::mem::take(&mut self.in_final_delay_slot);

            match flow {
                Flow::JumpRegister { rs } if rs == REG_RA => {
                    self.saw_return = true;
                    if self.max_extent <= pc.wrapping_sub(start) {
                        self.in_final_delay_slot = true;
                    }
                }
                Flow::Transfer { target } => self.note_max_extent(target.wrapping_sub(start)),
                _ => {}
            }

            if let Some(function) = self.current.as_mut() {
                if closing {
                    function.size = self.current_extent;
                }
                function.instructions.push((pc, insn));
            }
        }

        let done = match &self.current {
            Some(function) => flow == Flow::Invalid || function.size != 0,
            None => false,
        };
        if done {
            self.close();
        }
    }

    /// Record a transfer `offset` bytes past the function start. Targets
    /// before the start do not extend the function.
    fn note_max_extent(&mut self, offset: u32) {
        if (offset as i32) >= 0 {
            self.max_extent = self.max_extent.max(offset);
        }
    }

    fn close(&mut self) {
        if let Some(mut function) = self.current.take() {
            function.size = self.current_extent;
            if self.saw_return {
                debug!("discovered function {}", function);
                self.found.push(function);
            } else {
                debug!("dropping fragment without jr $ra: {}", function);
            }
        }
        self.current_extent = 0;
        self.max_extent = 0;
        self.in_final_delay_slot = false;
        self.saw_return = false;
    }
}

/// Recover function boundaries from `words`, the first of which is at
/// `start_pc`. A trailing fragment that never closes is not reported.
pub fn discover_functions(words: &[InstructionWord], start_pc: u32) -> Vec<DiscoveredFunction> {
    let dispatcher = flow_dispatcher();
    let mut scanner = Scanner::default();

    for (i, &insn) in words.iter().enumerate() {
        let pc = start_pc.wrapping_add(4 * i as u32);
        scanner.step(pc, insn, dispatcher.dispatch(pc, insn));
    }

    scanner.found
}

#[cfg(test)]
mod tests {
    use super::*;

    const JR_RA: u32 = 0x03e0_0008;
    const NOP: u32 = 0x0000_0000;
    const ADDIU_SP_NEG: u32 = 0x27bd_ffe8; // addiu $sp, $sp, -0x18
    const ADDIU_SP_POS: u32 = 0x27bd_0018; // addiu $sp, $sp, 0x18
    const MOVE_V0: u32 = 0x0080_1025; // or $v0, $a0, $zero

    fn words(raw: &[u32]) -> Vec<InstructionWord> {
        raw.iter().copied().map(InstructionWord::new).collect()
    }

    #[test]
    fn skips_leading_zeros_and_splits_on_return() {
        let code = words(&[
            NOP, NOP, // padding
            ADDIU_SP_NEG, MOVE_V0, JR_RA, ADDIU_SP_POS, // 0x08..0x18
            MOVE_V0, JR_RA, NOP, // 0x18..0x24
        ]);
        let found = discover_functions(&code, 0x8080_0000);
        assert_eq!(found.len(), 2);

        assert_eq!(found[0].start_address, 0x8080_0008);
        assert_eq!(found[0].size, 16);
        assert_eq!(found[0].instructions.len(), 4);
        assert_eq!(found[0].instructions[3], (0x8080_0014, InstructionWord::new(ADDIU_SP_POS)));

        assert_eq!(found[1].start_address, 0x8080_0018);
        assert_eq!(found[1].end_address(), 0x8080_0024);
        assert_eq!(
            found[1].to_string(),
            "0x80800018 - 0x80800024 (3 instructions)"
        );
    }

    #[test]
    fn trailing_fragment_without_return_is_dropped() {
        let code = words(&[MOVE_V0, JR_RA, NOP, ADDIU_SP_NEG, MOVE_V0]);
        let found = discover_functions(&code, 0x8000_0000);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].size, 12);
    }

    #[test]
    fn return_without_delay_slot_is_dropped() {
        let code = words(&[MOVE_V0, JR_RA]);
        assert!(discover_functions(&code, 0x8000_0000).is_empty());
    }

    #[test]
    fn jump_through_other_register_does_not_close() {
        // jr $t9 ; nop ; jr $ra ; nop
        let code = words(&[0x0320_0008, NOP, JR_RA, NOP]);
        let found = discover_functions(&code, 0x8000_0000);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].size, 16);
    }

    #[test]
    fn forward_branch_past_return_extends_function() {
        let code = words(&[
            0x1080_0003, // 0x00: beqz $a0, 0x10
            NOP,         // 0x04
            JR_RA,       // 0x08: early return, branch reaches past it
            NOP,         // 0x0c
            MOVE_V0,     // 0x10
            JR_RA,       // 0x14
            NOP,         // 0x18
        ]);
        let found = discover_functions(&code, 0x8000_0000);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].size, 0x1c);
    }

    #[test]
    fn backward_branch_before_start_is_ignored() {
        let code = words(&[
            0x1000_fff0, // 0x00: b -0x3c
            NOP,
            JR_RA,
            NOP,
        ]);
        let found = discover_functions(&code, 0x8000_1000);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].size, 16);
    }

    #[test]
    fn invalid_word_ends_function_and_is_excluded() {
        let code = words(&[
            MOVE_V0, JR_RA, NOP, // complete function
            MOVE_V0, JR_RA, 0xec00_0000, // delay slot is not an instruction
        ]);
        let found = discover_functions(&code, 0x8000_0000);
        assert_eq!(found.len(), 2);
        assert_eq!(found[1].start_address, 0x8000_000c);
        assert_eq!(found[1].size, 8);
        assert_eq!(found[1].instructions.len(), 2);
    }

    #[test]
    fn invalid_words_outside_functions_are_skipped() {
        let code = words(&[0xec00_0000, 0xec00_0000, MOVE_V0, JR_RA, NOP]);
        let found = discover_functions(&code, 0x8000_0000);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].start_address, 0x8000_0008);
    }

    #[test]
    fn contains() {
        let code = words(&[MOVE_V0, JR_RA, NOP]);
        let found = discover_functions(&code, 0x8000_0000);
        assert!(found[0].contains(0x8000_0008));
        assert!(!found[0].contains(0x8000_000c));
    }
}
