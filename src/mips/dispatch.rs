// SPDX-License-Identifier: GPL-3.0-or-later
//! Table-driven decode and dispatch.
//!
//! A [`Dispatcher`] owns one handler array per [`Table`]. Handlers are
//! installed through a [`DispatcherBuilder`] and the tables are immutable
//! afterwards, so a built dispatcher can be shared freely between threads.
//!
//! Registration and execution walk the same decode tree ([`slot_of`]), which
//! keeps every consumer in agreement about which encoding belongs to which
//! mnemonic.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use super::insn::InstructionWord;
use super::mnemonic::{Category, MnemonicId, Slot, Table};
use crate::error::{Error, Result};

const OP_SPECIAL: u32 = 0;
const OP_REGIMM: u32 = 1;
const OP_COP0: u32 = 16;
const OP_COP1: u32 = 17;

const COP0_CO: u32 = 16;

const COP1_BC: u32 = 8;
const COP1_FMT_S: u32 = 16;
const COP1_FMT_D: u32 = 17;
const COP1_FMT_W: u32 = 20;
const COP1_FMT_L: u32 = 21;

/// A decode handler, invoked with the instruction's address and word.
pub type Handler<T> = Arc<dyn Fn(u32, InstructionWord) -> T + Send + Sync>;

/// Locate the decode-table entry for `insn`.
pub fn slot_of(insn: InstructionWord) -> Slot {
    let index = |value: u32| value as u8;
    match insn.opcode() {
        OP_SPECIAL => Slot::new(Table::Special, index(insn.function())),
        OP_REGIMM => Slot::new(Table::Regimm, index(insn.rt())),
        OP_COP0 => match insn.rs() {
            COP0_CO => Slot::new(Table::Cop0Tlb, index(insn.function())),
            rs => Slot::new(Table::Cop0, index(rs)),
        },
        OP_COP1 => match insn.fmt() {
            COP1_BC => Slot::new(Table::Cop1Bc, index(insn.rt() & 0x3)),
            COP1_FMT_S => Slot::new(Table::Cop1S, index(insn.function())),
            COP1_FMT_D => Slot::new(Table::Cop1D, index(insn.function())),
            COP1_FMT_W => Slot::new(Table::Cop1W, index(insn.function())),
            COP1_FMT_L => Slot::new(Table::Cop1L, index(insn.function())),
            rs => Slot::new(Table::Cop1, index(rs)),
        },
        op => Slot::new(Table::Main, index(op)),
    }
}

/// Reverse of [`MnemonicId::slot`], built on first use.
pub fn mnemonic_at(slot: Slot) -> MnemonicId {
    static BY_SLOT: OnceLock<HashMap<Slot, MnemonicId>> = OnceLock::new();
    BY_SLOT
        .get_or_init(|| {
            MnemonicId::ALL
                .iter()
                .filter_map(|&id| id.slot().map(|slot| (slot, id)))
                .collect()
        })
        .get(&slot)
        .copied()
        .unwrap_or(MnemonicId::Invalid)
}

struct Tables<T> {
    rows: Vec<Vec<Option<Handler<T>>>>,
}

impl<T> Tables<T> {
    fn new() -> Self {
        let rows = Table::ALL
            .iter()
            .map(|table| (0..table.len()).map(|_| None).collect())
            .collect();
        Tables { rows }
    }

    fn row(table: Table) -> usize {
        Table::ALL
            .iter()
            .position(|&t| t == table)
            .unwrap_or_default()
    }

    fn get(&self, slot: Slot) -> Option<&Handler<T>> {
        self.rows[Self::row(slot.table)]
            .get(slot.index as usize)
            .and_then(Option::as_ref)
    }

    fn set(&mut self, slot: Slot, handler: Handler<T>) {
        if let Some(entry) = self.rows[Self::row(slot.table)].get_mut(slot.index as usize) {
            *entry = Some(handler);
        }
    }
}

/// Collects handlers before freezing them into a [`Dispatcher`].
pub struct DispatcherBuilder<T> {
    tables: Tables<T>,
}

impl<T> Default for DispatcherBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DispatcherBuilder<T> {
    pub fn new() -> Self {
        DispatcherBuilder {
            tables: Tables::new(),
        }
    }

    /// Install `handler` in the single slot owned by `id`. Registering
    /// `Invalid` is a no-op. A later registration for the same mnemonic
    /// replaces an earlier one.
    pub fn register<F>(&mut self, id: MnemonicId, handler: F) -> &mut Self
    where
        F: Fn(u32, InstructionWord) -> T + Send + Sync + 'static,
    {
        self.register_handler(id, Arc::new(handler))
    }

    pub fn register_handler(&mut self, id: MnemonicId, handler: Handler<T>) -> &mut Self {
        if let Some(slot) = id.slot() {
            self.tables.set(slot, handler);
        }
        self
    }

    /// Install one shared `handler` for every member of `category`.
    pub fn register_category<F>(&mut self, category: Category, handler: F) -> &mut Self
    where
        F: Fn(u32, InstructionWord) -> T + Send + Sync + 'static,
    {
        let handler: Handler<T> = Arc::new(handler);
        for id in category.members() {
            self.register_handler(id, Arc::clone(&handler));
        }
        self
    }

    /// Freeze the tables. Unregistered slots fail with
    /// [`Error::UnhandledInstruction`].
    pub fn build(self) -> Dispatcher<T> {
        Dispatcher {
            tables: self.tables,
        }
    }

    /// Freeze the tables with a catch-all for every unregistered slot.
    pub fn build_with_default<F>(self, default: F) -> TotalDispatcher<T>
    where
        F: Fn(u32, InstructionWord) -> T + Send + Sync + 'static,
    {
        TotalDispatcher {
            inner: self.build(),
            default: Arc::new(default),
        }
    }
}

/// Fail-closed dispatcher.
pub struct Dispatcher<T> {
    tables: Tables<T>,
}

impl<T> Dispatcher<T> {
    pub fn builder() -> DispatcherBuilder<T> {
        DispatcherBuilder::new()
    }

    /// Handler installed for the slot `insn` decodes to, if any.
    pub fn handler_for(&self, insn: InstructionWord) -> Option<&Handler<T>> {
        self.tables.get(slot_of(insn))
    }

    pub fn decode_and_dispatch(&self, pc: u32, insn: InstructionWord) -> Result<T> {
        match self.handler_for(insn) {
            Some(handler) => Ok(handler(pc, insn)),
            None => Err(Error::UnhandledInstruction {
                pc,
                word: insn.word(),
            }),
        }
    }
}

/// Dispatcher with a catch-all handler; dispatch cannot fail.
pub struct TotalDispatcher<T> {
    inner: Dispatcher<T>,
    default: Handler<T>,
}

impl<T> TotalDispatcher<T> {
    pub fn dispatch(&self, pc: u32, insn: InstructionWord) -> T {
        match self.inner.handler_for(insn) {
            Some(handler) => handler(pc, insn),
            None => (self.default)(pc, insn),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORDS: &[(u32, MnemonicId)] = &[
        (0x03e0_0008, MnemonicId::Jr),
        (0x0000_0000, MnemonicId::Sll),
        (0x240d_0004, MnemonicId::Addiu),
        (0x3c04_8080, MnemonicId::Lui),
        (0x0c20_0010, MnemonicId::Jal),
        (0x0411_0004, MnemonicId::Bgezal),
        (0x0601_0004, MnemonicId::Bgez),
        (0x4080_6000, MnemonicId::Mtc0),
        (0x4200_0018, MnemonicId::Eret),
        (0x4200_0002, MnemonicId::Tlbwi),
        (0x4501_0004, MnemonicId::Bc1t),
        (0x4503_0004, MnemonicId::Bc1tl),
        (0x4604_1000, MnemonicId::AddS),
        (0x4624_1002, MnemonicId::MulD),
        (0x4600_0121, MnemonicId::CvtDS),
        (0x4680_0020, MnemonicId::CvtSW),
        (0x46a0_0021, MnemonicId::CvtDL),
        (0x4602_003c, MnemonicId::CLtS),
        (0x0004_203c, MnemonicId::Dsll32),
        (0x03ff_000d, MnemonicId::Break),
        (0xc7a4_0010, MnemonicId::Lwc1),
        (0xdfbf_0018, MnemonicId::Ld),
    ];

    fn identity() -> Dispatcher<MnemonicId> {
        let mut builder = Dispatcher::builder();
        for &id in MnemonicId::ALL {
            builder.register(id, move |_, _| id);
        }
        builder.build()
    }

    #[test]
    fn decode_tree_matches_registration() {
        let dispatcher = identity();
        for &(word, expected) in WORDS {
            let insn = InstructionWord::new(word);
            assert_eq!(dispatcher.decode_and_dispatch(0, insn).unwrap(), expected, "{word:#010x}");
            assert_eq!(mnemonic_at(slot_of(insn)), expected, "{word:#010x}");
        }
    }

    #[test]
    fn every_mnemonic_slot_is_reachable() {
        for &id in MnemonicId::ALL {
            let slot = id.slot().unwrap();
            assert_eq!(mnemonic_at(slot), id);
        }
    }

    #[test]
    fn unregistered_slot_fails_closed() {
        let dispatcher = identity();
        // opcode 0x3b is not a MIPS III instruction
        let err = dispatcher
            .decode_and_dispatch(0x8000_1234, InstructionWord::new(0xec00_0000))
            .unwrap_err();
        match err {
            Error::UnhandledInstruction { pc, word } => {
                assert_eq!(pc, 0x8000_1234);
                assert_eq!(word, 0xec00_0000);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn register_sets_exactly_one_slot() {
        let mut builder = Dispatcher::builder();
        builder.register(MnemonicId::Dsll, |_, _| "dsll");
        let dispatcher = builder.build();
        assert!(dispatcher.decode_and_dispatch(0, InstructionWord::new(0x0004_2038)).is_ok());
        assert!(dispatcher.decode_and_dispatch(0, InstructionWord::new(0x0004_203c)).is_err());
    }

    #[test]
    fn category_fans_out_and_mnemonic_overrides() {
        let mut builder = Dispatcher::builder();
        builder
            .register_category(Category::AllValid, |_, _| 1)
            .register(MnemonicId::Jr, |_, insn| insn.rs() as i32 + 100);
        let dispatcher = builder.build_with_default(|_, _| -1);

        assert_eq!(dispatcher.dispatch(0, InstructionWord::new(0x240d_0004)), 1);
        assert_eq!(dispatcher.dispatch(0, InstructionWord::new(0x03e0_0008)), 131);
        assert_eq!(dispatcher.dispatch(0, InstructionWord::new(0xec00_0000)), -1);
    }

    #[test]
    fn handler_receives_pc() {
        let mut builder = Dispatcher::builder();
        builder.register_category(Category::Branch, |pc, insn: InstructionWord| {
            insn.branch_target(pc)
        });
        let dispatcher = builder.build();
        // beq $zero, $zero, +3 words
        let target = dispatcher
            .decode_and_dispatch(0x8000_0100, InstructionWord::new(0x1000_0003))
            .unwrap();
        assert_eq!(target, 0x8000_0110);
    }
}
