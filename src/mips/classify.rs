// SPDX-License-Identifier: GPL-3.0-or-later
//! Semantic queries over instruction words.
//!
//! Each query is its own [`TotalDispatcher`] built from the same decode
//! tree, so "is a branch", "is a load" and "which mnemonic" can never
//! disagree about an encoding. Unknown words never error here: they are
//! simply not branches, not memory accesses and have the `Invalid` identity.

use std::sync::OnceLock;

use super::dispatch::{Dispatcher, TotalDispatcher};
use super::insn::InstructionWord;
use super::mnemonic::{Category, MnemonicId};
use super::regs::{REG_RA, REG_ZERO};
use crate::symbols::TypeHint;

/// Operand width of each memory access, as a symbol type hint.
const ACCESS_HINTS: &[(MnemonicId, TypeHint)] = &[
    (MnemonicId::Lb, TypeHint::BYTE),
    (MnemonicId::Sb, TypeHint::BYTE),
    (MnemonicId::Lbu, TypeHint::BYTE_UNSIGNED),
    (MnemonicId::Lh, TypeHint::HALF_WORD),
    (MnemonicId::Sh, TypeHint::HALF_WORD),
    (MnemonicId::Lhu, TypeHint::HALF_WORD_UNSIGNED),
    (MnemonicId::Lw, TypeHint::WORD),
    (MnemonicId::Sw, TypeHint::WORD),
    (MnemonicId::Lwl, TypeHint::WORD),
    (MnemonicId::Lwr, TypeHint::WORD),
    (MnemonicId::Swl, TypeHint::WORD),
    (MnemonicId::Swr, TypeHint::WORD),
    (MnemonicId::Ll, TypeHint::WORD),
    (MnemonicId::Sc, TypeHint::WORD),
    (MnemonicId::Lwu, TypeHint::WORD_UNSIGNED),
    (MnemonicId::Ld, TypeHint::DOUBLE_WORD),
    (MnemonicId::Sd, TypeHint::DOUBLE_WORD),
    (MnemonicId::Ldl, TypeHint::DOUBLE_WORD),
    (MnemonicId::Ldr, TypeHint::DOUBLE_WORD),
    (MnemonicId::Sdl, TypeHint::DOUBLE_WORD),
    (MnemonicId::Sdr, TypeHint::DOUBLE_WORD),
    (MnemonicId::Lld, TypeHint::DOUBLE_WORD),
    (MnemonicId::Scd, TypeHint::DOUBLE_WORD),
    (MnemonicId::Lwc1, TypeHint::SINGLE),
    (MnemonicId::Swc1, TypeHint::SINGLE),
    (MnemonicId::Ldc1, TypeHint::DOUBLE),
    (MnemonicId::Sdc1, TypeHint::DOUBLE),
    (MnemonicId::J, TypeHint::FUNCTION),
    (MnemonicId::Jal, TypeHint::FUNCTION),
];

/// Instructions whose destination GPR is `rd`.
const WRITES_RD: &[MnemonicId] = &[
    MnemonicId::Sll,
    MnemonicId::Srl,
    MnemonicId::Sra,
    MnemonicId::Sllv,
    MnemonicId::Srlv,
    MnemonicId::Srav,
    MnemonicId::Jalr,
    MnemonicId::Mfhi,
    MnemonicId::Mflo,
    MnemonicId::Dsllv,
    MnemonicId::Dsrlv,
    MnemonicId::Dsrav,
    MnemonicId::Add,
    MnemonicId::Addu,
    MnemonicId::Sub,
    MnemonicId::Subu,
    MnemonicId::And,
    MnemonicId::Or,
    MnemonicId::Xor,
    MnemonicId::Nor,
    MnemonicId::Slt,
    MnemonicId::Sltu,
    MnemonicId::Dadd,
    MnemonicId::Daddu,
    MnemonicId::Dsub,
    MnemonicId::Dsubu,
    MnemonicId::Dsll,
    MnemonicId::Dsrl,
    MnemonicId::Dsra,
    MnemonicId::Dsll32,
    MnemonicId::Dsrl32,
    MnemonicId::Dsra32,
];

/// Instructions whose destination GPR is `rt`.
const WRITES_RT: &[MnemonicId] = &[
    MnemonicId::Addi,
    MnemonicId::Addiu,
    MnemonicId::Slti,
    MnemonicId::Sltiu,
    MnemonicId::Andi,
    MnemonicId::Ori,
    MnemonicId::Xori,
    MnemonicId::Lui,
    MnemonicId::Daddi,
    MnemonicId::Daddiu,
    MnemonicId::Lb,
    MnemonicId::Lbu,
    MnemonicId::Lh,
    MnemonicId::Lhu,
    MnemonicId::Lw,
    MnemonicId::Lwu,
    MnemonicId::Lwl,
    MnemonicId::Lwr,
    MnemonicId::Ld,
    MnemonicId::Ldl,
    MnemonicId::Ldr,
    MnemonicId::Ll,
    MnemonicId::Lld,
    MnemonicId::Sc,
    MnemonicId::Scd,
    MnemonicId::Mfc0,
    MnemonicId::Dmfc0,
    MnemonicId::Mfc1,
    MnemonicId::Dmfc1,
    MnemonicId::Cfc1,
];

/// Instructions that implicitly write `$ra`.
const WRITES_RA: &[MnemonicId] = &[
    MnemonicId::Jal,
    MnemonicId::Bltzal,
    MnemonicId::Bgezal,
    MnemonicId::Bltzall,
    MnemonicId::Bgezall,
];

/// Read-only classification tables.
pub struct Classifier {
    branch: TotalDispatcher<bool>,
    load_store: TotalDispatcher<bool>,
    identity: TotalDispatcher<MnemonicId>,
    hint: TotalDispatcher<TypeHint>,
    destination: TotalDispatcher<Option<u32>>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier {
    pub fn new() -> Self {
        let mut branch = Dispatcher::builder();
        branch.register_category(Category::Branch, |_, _| true);

        let mut load_store = Dispatcher::builder();
        load_store.register_category(Category::LoadStore, |_, _| true);

        let mut identity = Dispatcher::builder();
        for &id in MnemonicId::ALL {
            identity.register(id, move |_, _| id);
        }

        let mut hint = Dispatcher::builder();
        for &(id, type_hint) in ACCESS_HINTS {
            hint.register(id, move |_, _| type_hint);
        }

        let mut destination = Dispatcher::builder();
        for &id in WRITES_RD {
            destination.register(id, |_, insn: InstructionWord| Some(insn.rd()));
        }
        for &id in WRITES_RT {
            destination.register(id, |_, insn: InstructionWord| Some(insn.rt()));
        }
        for &id in WRITES_RA {
            destination.register(id, |_, _| Some(REG_RA));
        }

        Classifier {
            branch: branch.build_with_default(|_, _| false),
            load_store: load_store.build_with_default(|_, _| false),
            identity: identity.build_with_default(|_, _| MnemonicId::Invalid),
            hint: hint.build_with_default(|_, _| TypeHint::empty()),
            destination: destination.build_with_default(|_, _| None),
        }
    }

    /// Process-wide instance, built on first use.
    pub fn global() -> &'static Classifier {
        static INSTANCE: OnceLock<Classifier> = OnceLock::new();
        INSTANCE.get_or_init(Classifier::new)
    }

    /// Conditional branch or branch-likely (not `j`, `jal` or the `*al` forms).
    pub fn is_branch(&self, insn: InstructionWord) -> bool {
        self.branch.dispatch(0, insn)
    }

    pub fn is_load_or_store(&self, insn: InstructionWord) -> bool {
        self.load_store.dispatch(0, insn)
    }

    pub fn mnemonic_of(&self, insn: InstructionWord) -> MnemonicId {
        self.identity.dispatch(0, insn)
    }

    /// Width/kind of the datum an instruction refers to through its
    /// relocated field.
    pub fn type_hint(&self, insn: InstructionWord) -> TypeHint {
        self.hint.dispatch(0, insn)
    }

    /// GPR written by `insn`. Writes to `$zero` are reported as `None`.
    pub fn destination_gpr(&self, insn: InstructionWord) -> Option<u32> {
        self.destination.dispatch(0, insn).filter(|&reg| reg != REG_ZERO)
    }
}
