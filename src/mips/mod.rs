// SPDX-License-Identifier: GPL-3.0-or-later
//! MIPS III instruction decoding and classification.

pub mod classify;
pub mod dispatch;
pub mod insn;
pub mod mnemonic;
pub mod normalize;
pub mod regs;

pub use classify::Classifier;
pub use dispatch::{Dispatcher, DispatcherBuilder, Handler, TotalDispatcher, slot_of};
pub use insn::{
    InstructionWord, MAX_BRANCH_OFFSET, MIN_BRANCH_OFFSET, remove_trailing_nops, words_from_bytes,
    words_to_bytes,
};
pub use mnemonic::{Category, MnemonicId, Slot, Table};
pub use normalize::{normalized_bytes, zero_relocated_copy};
pub use regs::*;
