// SPDX-License-Identifier: GPL-3.0-or-later
//! Symbols recovered for an overlay and lookups over them.

mod hint;

pub use hint::TypeHint;

use log::warn;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::Range;

/// Whether a symbol is defined by the overlay itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SymbolKind {
    #[default]
    Internal,
    External,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub address: u32,
    pub name: String,
    pub type_hint: TypeHint,
    pub kind: SymbolKind,
}

impl Symbol {
    pub fn new(address: u32, name: impl Into<String>, type_hint: TypeHint) -> Self {
        Symbol {
            address,
            name: name.into(),
            type_hint,
            kind: SymbolKind::Internal,
        }
    }

    /// Symbol named after its hint and address, e.g. `i32_80801234`.
    pub fn generated(address: u32, type_hint: TypeHint) -> Self {
        Symbol::new(
            address,
            format!("{}_{:08X}", type_hint.prefix(), address),
            type_hint,
        )
    }

    pub fn external(address: u32, name: impl Into<String>, type_hint: TypeHint) -> Self {
        Symbol {
            kind: SymbolKind::External,
            ..Symbol::new(address, name, type_hint)
        }
    }

    pub fn is_function(&self) -> bool {
        self.type_hint.contains(TypeHint::FUNCTION)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X} {}", self.address, self.name)?;
        if !self.type_hint.is_empty() {
            write!(f, " ({})", self.type_hint)?;
        }
        Ok(())
    }
}

/// Symbol lookups used while rendering instruction operands.
pub trait SymbolRepository {
    fn lookup(&self, address: u32) -> Option<&Symbol>;

    fn lookup_name(&self, address: u32) -> Option<String> {
        self.lookup(address).map(|s| s.name.clone())
    }

    /// Name of the symbol referenced by the instruction at `pc`, if that
    /// instruction is half of a relocated HI16/LO16 pair.
    fn lookup_referenced_symbol_name_at(&self, pc: u32) -> Option<String>;
}

/// Repository with no symbols.
#[derive(Debug, Default)]
pub struct EmptySymbolRepository;

impl SymbolRepository for EmptySymbolRepository {
    fn lookup(&self, _address: u32) -> Option<&Symbol> {
        None
    }

    fn lookup_referenced_symbol_name_at(&self, _pc: u32) -> Option<String> {
        None
    }
}

/// Target of a relocated reference: a symbol plus a byte offset into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolRef {
    pub address: u32,
    pub offset: u32,
}

/// Deduplicated, address-ordered symbols plus the reference map from
/// instruction addresses to the symbol they materialize.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    symbols: BTreeMap<u32, Symbol>,
    references: HashMap<u32, SymbolRef>,
    oddities: Vec<String>,
}

impl SymbolTable {
    /// Build a table from `candidates` in priority order.
    ///
    /// At each address the first function-tagged candidate wins, otherwise
    /// the first candidate. `references` maps instruction addresses to the
    /// address they refer to. Symbols inside `text` that are not word
    /// aligned are folded into a word-aligned symbol plus an offset.
    pub fn build<I>(candidates: Vec<Symbol>, references: I, text: Range<u32>) -> Self
    where
        I: IntoIterator<Item = (u32, u32)>,
    {
        let mut symbols: BTreeMap<u32, Symbol> = BTreeMap::new();
        for candidate in candidates {
            match symbols.get(&candidate.address) {
                Some(existing) if existing.is_function() || !candidate.is_function() => {}
                _ => {
                    symbols.insert(candidate.address, candidate);
                }
            }
        }

        let mut table = SymbolTable {
            symbols,
            references: references
                .into_iter()
                .map(|(pc, address)| (pc, SymbolRef { address, offset: 0 }))
                .collect(),
            oddities: Vec::new(),
        };
        table.fold_misaligned(text);
        table
    }

    fn fold_misaligned(&mut self, text: Range<u32>) {
        if text.is_empty() {
            return;
        }
        let misaligned: Vec<u32> = self
            .symbols
            .range(text)
            .map(|(&address, _)| address)
            .filter(|address| address % 4 != 0)
            .collect();

        for address in misaligned {
            let Some(symbol) = self.symbols.remove(&address) else {
                continue;
            };
            let base = address & !3;
            let offset = address - base;

            let note = format!("{} in .text section but not 4-byte aligned", symbol.name);
            warn!("{}", note);
            self.oddities.push(note);

            self.symbols
                .entry(base)
                .or_insert_with(|| Symbol::new(base, format!("data_{:08X}", base), symbol.type_hint));

            for target in self.references.values_mut() {
                if target.address == address {
                    *target = SymbolRef {
                        address: base,
                        offset,
                    };
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Symbols in address order.
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }

    /// Last symbol strictly below `address`.
    pub fn preceding(&self, address: u32) -> Option<&Symbol> {
        self.symbols.range(..address).next_back().map(|(_, s)| s)
    }

    pub fn reference_at(&self, pc: u32) -> Option<SymbolRef> {
        self.references.get(&pc).copied()
    }

    /// Data anomalies found while building the table.
    pub fn oddities(&self) -> &[String] {
        &self.oddities
    }
}

impl SymbolRepository for SymbolTable {
    fn lookup(&self, address: u32) -> Option<&Symbol> {
        self.symbols.get(&address)
    }

    fn lookup_referenced_symbol_name_at(&self, pc: u32) -> Option<String> {
        let target = self.reference_at(pc)?;
        let symbol = self.lookup(target.address)?;
        Some(match target.offset {
            0 => symbol.name.clone(),
            offset => format!("{} + {}", symbol.name, offset),
        })
    }
}
