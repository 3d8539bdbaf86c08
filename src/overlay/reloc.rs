// SPDX-License-Identifier: GPL-3.0-or-later
//! Relocation decoding and address resolution.
//!
//! Relocations live in an arena ([`RelocationTable`]) and refer to their
//! HI16/LO16 partner by index. Partners and resolved addresses are computed
//! on first use and cached per entry.

use log::debug;
use std::collections::HashMap;
use std::fmt;
use std::fmt::Write as _;
use std::sync::OnceLock;

use super::header::SECTION_NAMES;
use super::section::Section;
use crate::error::{Error, Result};
use crate::mips::{Classifier, InstructionWord, gpr_name};
use crate::symbols::TypeHint;

/// Top bits of every address in the overlay address space.
pub const KSEG0_BASE: u32 = 0x8000_0000;

const LOCATION_MASK: u32 = 0x00ff_ffff;
const KIND_SHIFT: u32 = 24;
const KIND_MASK: u32 = 0x3f;
const SECTION_SHIFT: u32 = 30;

/// Marker placed before the offending entry in a relocation dump.
const OFFENDING_MARKER: &str = " >> ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelocKind {
    /// `R_MIPS_32`: absolute word.
    Abs32,
    /// `R_MIPS_26`: `j`/`jal` target.
    Rel26,
    /// `R_MIPS_HI16`: upper half, normally a `lui`.
    Hi16,
    /// `R_MIPS_LO16`: lower half, an `addiu` or load/store.
    Lo16,
}

impl RelocKind {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            2 => Some(RelocKind::Abs32),
            4 => Some(RelocKind::Rel26),
            5 => Some(RelocKind::Hi16),
            6 => Some(RelocKind::Lo16),
            _ => None,
        }
    }

    pub const fn code(self) -> u32 {
        match self {
            RelocKind::Abs32 => 2,
            RelocKind::Rel26 => 4,
            RelocKind::Hi16 => 5,
            RelocKind::Lo16 => 6,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            RelocKind::Abs32 => "R_MIPS_32",
            RelocKind::Rel26 => "R_MIPS_26",
            RelocKind::Hi16 => "R_MIPS_HI16",
            RelocKind::Lo16 => "R_MIPS_LO16",
        }
    }

    pub fn is_hi_lo(self) -> bool {
        matches!(self, RelocKind::Hi16 | RelocKind::Lo16)
    }
}

impl fmt::Display for RelocKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// Pack a relocation word.
pub fn encode_relocation(section: usize, kind: RelocKind, location: u32) -> u32 {
    ((section as u32 + 1) << SECTION_SHIFT)
        | (kind.code() << KIND_SHIFT)
        | (location & LOCATION_MASK)
}

/// A decoded relocation entry together with the word it patches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocation {
    pub word: u32,
    /// Section index, `None` for the reserved encoding 0.
    pub section: Option<usize>,
    /// Decoded kind, `None` for unknown codes.
    pub kind: Option<RelocKind>,
    /// Section-relative byte offset.
    pub location: u32,
    section_start: u32,
    /// Patched word, `None` when the location is outside the section bytes.
    data: Option<u32>,
}

impl Relocation {
    /// Decode `word` against the laid-out `sections` of the blob `data`.
    pub fn decode(word: u32, sections: &[Section], data: &[u8]) -> Self {
        let section = ((word >> SECTION_SHIFT) as usize)
            .checked_sub(1)
            .filter(|&id| id < sections.len());
        let location = word & LOCATION_MASK;
        let (section_start, data) = match section.and_then(|id| sections.get(id)) {
            Some(s) => (
                s.start_address,
                InstructionWord::read(s.bytes(data), location as usize).map(InstructionWord::word),
            ),
            None => (0, None),
        };

        Relocation {
            word,
            section,
            kind: RelocKind::from_code((word >> KIND_SHIFT) & KIND_MASK),
            location,
            section_start,
            data,
        }
    }

    pub fn kind_code(&self) -> u32 {
        (self.word >> KIND_SHIFT) & KIND_MASK
    }

    pub fn section_name(&self) -> &'static str {
        self.section
            .and_then(|id| SECTION_NAMES.get(id).copied())
            .unwrap_or("<invalid>")
    }

    pub fn absolute_location(&self) -> u32 {
        self.section_start.wrapping_add(self.location)
    }

    /// The patched word at the relocation's location.
    pub fn data(&self) -> Option<u32> {
        self.data
    }

    pub fn instruction(&self) -> Option<InstructionWord> {
        self.data.map(InstructionWord::new)
    }

    fn is(&self, kind: RelocKind) -> bool {
        self.kind == Some(kind)
    }

    /// Data hint contributed by this relocation. Only code relocations carry
    /// one; data words say nothing about what they point at.
    pub fn type_hint(&self, classifier: &Classifier) -> TypeHint {
        match (self.section, self.instruction()) {
            (Some(0), Some(insn)) => classifier.type_hint(insn),
            _ => TypeHint::empty(),
        }
    }

    fn describe(&self, classifier: &Classifier) -> String {
        let Some(insn) = self.instruction() else {
            return "<outside section>".to_string();
        };
        match self.kind {
            Some(RelocKind::Abs32) => format!("0x{:08X}", insn.word()),
            Some(RelocKind::Hi16) => {
                format!("{:<7} {} [{}]", classifier.mnemonic_of(insn), insn, gpr_name(insn.rt()))
            }
            Some(RelocKind::Lo16) => {
                format!("{:<7} {} [{}]", classifier.mnemonic_of(insn), insn, gpr_name(insn.base()))
            }
            _ => format!("{:<7} {}", classifier.mnemonic_of(insn), insn),
        }
    }
}

impl fmt::Display for Relocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            Some(kind) => kind.name().to_string(),
            None => format!("R_UNKNOWN_{}", self.kind_code()),
        };
        write!(
            f,
            "[0x{:08X}/0x{:08X}] {:<11} {:<8} {}",
            self.location,
            self.absolute_location(),
            kind,
            self.section_name(),
            self.describe(Classifier::global())
        )
    }
}

/// Ordered relocation arena.
pub struct RelocationTable {
    entries: Vec<Relocation>,
    siblings: Vec<OnceLock<Option<usize>>>,
    addresses: Vec<OnceLock<u32>>,
    by_location: HashMap<u32, usize>,
}

impl RelocationTable {
    /// Build the arena. Entries are stable-sorted by section.
    pub fn new(mut entries: Vec<Relocation>) -> Self {
        entries.sort_by_key(|r| r.section);
        let by_location = entries
            .iter()
            .enumerate()
            .filter(|(_, r)| r.section.is_some())
            .map(|(i, r)| (r.absolute_location(), i))
            .collect();
        RelocationTable {
            siblings: (0..entries.len()).map(|_| OnceLock::new()).collect(),
            addresses: (0..entries.len()).map(|_| OnceLock::new()).collect(),
            entries,
            by_location,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Relocation> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relocation> {
        self.entries.iter()
    }

    /// Index of the relocation patching the instruction at `pc`.
    pub fn index_at(&self, pc: u32) -> Option<usize> {
        self.by_location.get(&pc).copied()
    }

    pub fn lookup(&self, pc: u32) -> Option<&Relocation> {
        self.index_at(pc).and_then(|i| self.entries.get(i))
    }

    /// HI16/LO16 partner of entry `index`.
    ///
    /// A LO16 pairs with the nearest preceding HI16 whose `rt` is the LO16's
    /// base register. A HI16 pairs with the first LO16 that pairs with it.
    pub fn sibling(&self, index: usize) -> Option<usize> {
        let entry = self.entries.get(index)?;
        *self.siblings[index].get_or_init(|| match entry.kind {
            Some(RelocKind::Lo16) => self.find_hi16_for(index),
            Some(RelocKind::Hi16) => self.find_lo16_for(index),
            _ => None,
        })
    }

    fn find_hi16_for(&self, lo: usize) -> Option<usize> {
        let base = self.entries[lo].instruction()?.base();
        (0..lo).rev().find(|&i| {
            let r = &self.entries[i];
            r.is(RelocKind::Hi16) && r.instruction().is_some_and(|insn| insn.rt() == base)
        })
    }

    fn find_lo16_for(&self, hi: usize) -> Option<usize> {
        let rt = self.entries[hi].instruction()?.rt();
        for i in hi + 1..self.entries.len() {
            let r = &self.entries[i];
            if r.is(RelocKind::Lo16) && self.sibling(i) == Some(hi) {
                return Some(i);
            }
            // A later LUI into the same register shadows this one.
            if r.is(RelocKind::Hi16) && r.instruction().is_some_and(|insn| insn.rt() == rt) {
                break;
            }
        }
        None
    }

    /// Resolved target address of entry `index`.
    pub fn address(&self, index: usize) -> Result<u32> {
        if let Some(&address) = self.addresses.get(index).and_then(OnceLock::get) {
            return Ok(address);
        }
        let address = self.compute_address(index)?;
        Ok(*self.addresses[index].get_or_init(|| address))
    }

    fn compute_address(&self, index: usize) -> Result<u32> {
        let Some(entry) = self.entries.get(index) else {
            return Err(self.error(format!("no relocation {index}"), None));
        };
        let Some(kind) = entry.kind else {
            return Err(self.error(
                format!("Relocation `{entry}` has unknown kind {}", entry.kind_code()),
                Some(index),
            ));
        };
        if entry.section.is_none() {
            return Err(self.error(
                format!("Relocation `{entry}` names reserved section 0"),
                Some(index),
            ));
        }
        let Some(insn) = entry.instruction() else {
            return Err(self.error(
                format!("Relocation `{entry}` points outside {}", entry.section_name()),
                Some(index),
            ));
        };

        match kind {
            RelocKind::Abs32 => Ok(insn.word()),
            RelocKind::Rel26 => Ok(insn.full_jump_target(entry.absolute_location())),
            RelocKind::Hi16 => match self.sibling(index) {
                Some(lo) => self.combine(index, lo),
                None => Err(self.error(
                    format!("Relocation `{entry}` has no following R_MIPS_LO16."),
                    Some(index),
                )),
            },
            RelocKind::Lo16 => match self.sibling(index) {
                Some(hi) => self.combine(hi, index),
                None => Err(self.error(
                    format!("Relocation `{entry}` has no preceding R_MIPS_HI16."),
                    Some(index),
                )),
            },
        }
    }

    fn combine(&self, hi: usize, lo: usize) -> Result<u32> {
        match (self.entries[hi].instruction(), self.entries[lo].instruction()) {
            (Some(hi_insn), Some(lo_insn)) => Ok((u32::from(hi_insn.immediate()) << 16)
                .wrapping_add(lo_insn.immediate_signed() as i32 as u32)),
            _ => Err(self.error(
                format!("Relocation pair {hi}/{lo} points outside its section"),
                Some(lo),
            )),
        }
    }

    /// Force every address, last entry first, so that bad input is reported
    /// up front instead of on first incidental use.
    pub fn resolve_all(&self) -> Result<()> {
        for index in (0..self.entries.len()).rev() {
            self.address(index)?;
        }
        debug!("resolved {} relocations", self.entries.len());
        Ok(())
    }

    /// Every entry with its resolved address. Requires [`resolve_all`](Self::resolve_all)
    /// to have succeeded to be complete.
    pub fn resolved(&self) -> impl Iterator<Item = (&Relocation, u32)> {
        self.entries
            .iter()
            .zip(&self.addresses)
            .filter_map(|(r, address)| address.get().map(|&a| (r, a)))
    }

    /// Full table, one entry per line, with `offending` marked.
    pub fn dump(&self, offending: Option<usize>) -> String {
        let mut out = String::new();
        for (i, r) in self.entries.iter().enumerate() {
            let marker = if Some(i) == offending {
                OFFENDING_MARKER
            } else {
                "    "
            };
            let _ = writeln!(out, "{marker}{i:4} {r}");
        }
        out
    }

    fn error(&self, message: String, offending: Option<usize>) -> Error {
        Error::UnpairedRelocation {
            message,
            offending,
            table: self.dump(offending),
        }
    }
}

/// Load address implied by the absolute relocation targets: the lowest
/// `R_MIPS_26`/`R_MIPS_32` target with the KSEG0 bit forced on.
pub fn infer_entry_point<I>(relocations: I) -> Option<u32>
where
    I: IntoIterator<Item = (RelocKind, u32)>,
{
    relocations
        .into_iter()
        .filter(|(kind, _)| matches!(kind, RelocKind::Rel26 | RelocKind::Abs32))
        .map(|(_, address)| address | KSEG0_BASE)
        .min()
}
