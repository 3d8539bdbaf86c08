// SPDX-License-Identifier: GPL-3.0-or-later
//! Relocatable overlays: sections, relocations and the symbol table built
//! over them.
//!
//! [`Overlay::new`] runs the whole pipeline up front. Every relocation is
//! resolved before any symbol is generated, so a malformed relocation table
//! is reported with full context and no partially symbolized overlay is
//! ever handed out.

pub mod header;
pub mod reloc;
pub mod section;

pub use header::{OverlayHeader, detect, load_overlay};
pub use reloc::{RelocKind, Relocation, RelocationTable, encode_relocation, infer_entry_point};
pub use section::{Section, layout_sections};

use log::{debug, info, warn};
use std::collections::{BTreeMap, HashMap};
use std::ops::Range;

use crate::cfg::{DiscoveredFunction, discover_branch_targets, discover_function_calls, discover_functions};
use crate::error::Result;
use crate::mips::{Classifier, InstructionWord, words_from_bytes};
use crate::symbols::{Symbol, SymbolRepository, SymbolTable, TypeHint};
use header::SECTION_TEXT;

/// Symbol naming knobs.
#[derive(Debug, Clone, Default)]
pub struct OverlayOptions {
    /// Name relocation symbols `{hint}_{index}` instead of `{hint}_{ADDR}`.
    pub number_symbols: bool,
    /// Externally known symbols, e.g. library entry points.
    pub extra_symbols: Vec<(u32, String)>,
}

/// A fully resolved and symbolized overlay.
pub struct Overlay {
    entry_point: u32,
    header: OverlayHeader,
    data: Vec<u8>,
    sections: Vec<Section>,
    relocations: RelocationTable,
    functions: Vec<DiscoveredFunction>,
    symbols: SymbolTable,
    linker_equates: Vec<String>,
}

fn decode_relocations(header: &OverlayHeader, sections: &[Section], data: &[u8]) -> RelocationTable {
    RelocationTable::new(
        header
            .relocation_words
            .iter()
            .map(|&word| Relocation::decode(word, sections, data))
            .collect(),
    )
}

impl Overlay {
    /// Load `data` at `entry_point`, resolve every relocation and build the
    /// symbol table.
    pub fn new(entry_point: u32, data: Vec<u8>, options: &OverlayOptions) -> Result<Self> {
        let header = OverlayHeader::parse(&data)?;
        let sections = layout_sections(&header, entry_point);
        let relocations = decode_relocations(&header, &sections, &data);
        relocations.resolve_all()?;

        let text = &sections[SECTION_TEXT];
        let words = words_from_bytes(text.bytes(&data));
        let functions = discover_functions(&words, entry_point);
        debug!("discovered {} functions in .text", functions.len());

        let mut overlay = Overlay {
            entry_point,
            header,
            data,
            sections,
            relocations,
            functions,
            symbols: SymbolTable::default(),
            linker_equates: Vec::new(),
        };

        let candidates = overlay.symbol_candidates(&words, options);
        let references = overlay.hi_lo_references();
        let text_range = overlay.text_range();

        let preliminary = SymbolTable::build(candidates.clone(), references.clone(), text_range.clone());
        let (renames, equates) = overlay.resolve_orphans(&preliminary);

        let candidates = candidates
            .into_iter()
            .map(|symbol| match renames.get(&symbol.name) {
                Some(name) => Symbol {
                    name: name.clone(),
                    ..symbol
                },
                None => symbol,
            })
            .collect();
        overlay.symbols = SymbolTable::build(candidates, references, text_range);
        overlay.linker_equates = equates;

        info!(
            "overlay at 0x{:08X}: {} relocations, {} functions, {} symbols, {} equates",
            overlay.entry_point,
            overlay.relocations.len(),
            overlay.functions.len(),
            overlay.symbols.len(),
            overlay.linker_equates.len()
        );
        Ok(overlay)
    }

    /// Load address implied by the relocations of `data`, or `None` if it
    /// has no absolute relocations.
    pub fn infer_entry_point(data: &[u8]) -> Result<Option<u32>> {
        let header = OverlayHeader::parse(data)?;
        let sections = layout_sections(&header, 0);
        let relocations = decode_relocations(&header, &sections, data);
        relocations.resolve_all()?;
        Ok(infer_entry_point(relocations.resolved().filter_map(
            |(r, address)| r.kind.map(|kind| (kind, address)),
        )))
    }

    fn text_range(&self) -> Range<u32> {
        let text = &self.sections[SECTION_TEXT];
        text.start_address..text.end_address()
    }

    /// Instruction address to target address, for every HI16/LO16 relocation.
    fn hi_lo_references(&self) -> Vec<(u32, u32)> {
        self.relocations
            .resolved()
            .filter(|(r, _)| r.kind.is_some_and(RelocKind::is_hi_lo))
            .map(|(r, address)| (r.absolute_location(), address))
            .collect()
    }

    /// All symbol sources in priority order: relocation targets, branch
    /// targets, external calls and caller-supplied symbols.
    fn symbol_candidates(&self, words: &[InstructionWord], options: &OverlayOptions) -> Vec<Symbol> {
        let classifier = Classifier::global();
        let mut symbols = Vec::new();

        let mut by_address: BTreeMap<u32, TypeHint> = BTreeMap::new();
        for (relocation, address) in self.relocations.resolved() {
            *by_address.entry(address).or_default() |= relocation.type_hint(classifier);
        }
        symbols.extend(by_address.into_iter().enumerate().map(|(i, (address, hint))| {
            if options.number_symbols {
                Symbol::new(address, format!("{}_{}", hint.prefix(), i), hint)
            } else {
                Symbol::generated(address, hint)
            }
        }));

        symbols.extend(self.branch_target_symbols(words));

        let end = self.end_address();
        symbols.extend(
            discover_function_calls(words, self.entry_point)
                .into_iter()
                .filter(|&target| target < self.entry_point || target >= end)
                .map(|target| {
                    Symbol::external(target, format!("external_func_{:08X}", target), TypeHint::FUNCTION)
                }),
        );

        symbols.extend(
            options
                .extra_symbols
                .iter()
                .map(|(address, name)| Symbol::external(*address, name.clone(), TypeHint::empty())),
        );
        symbols
    }

    /// `$L{function}_{n}` labels, numbered per enclosing function in order of
    /// first appearance.
    fn branch_target_symbols(&self, words: &[InstructionWord]) -> Vec<Symbol> {
        let mut groups: Vec<(u32, Vec<u32>)> = Vec::new();
        let mut orphans = Vec::new();
        for target in discover_branch_targets(words, self.entry_point) {
            let Some(function) = self.functions.iter().find(|f| f.contains(target)) else {
                warn!("branch target 0x{:08X} is not inside any function", target);
                orphans.push(target);
                continue;
            };
            match groups.iter_mut().find(|(start, _)| *start == function.start_address) {
                Some((_, targets)) => targets.push(target),
                None => groups.push((function.start_address, vec![target])),
            }
        }

        let labelled = groups.into_iter().enumerate().flat_map(|(group, (_, targets))| {
            targets.into_iter().enumerate().map(move |(i, target)| {
                Symbol::new(target, format!("$L{}_{}", group, i), TypeHint::BRANCH_TARGET)
            })
        });
        let unlabelled = orphans
            .into_iter()
            .map(|target| Symbol::new(target, format!("L_{:08X}", target), TypeHint::BRANCH_TARGET));
        labelled.chain(unlabelled).collect()
    }

    /// Symbols outside every section. Inside the overlay's address span they
    /// are renamed relative to the nearest preceding symbol; beyond it they
    /// become fixed-address equates.
    fn resolve_orphans(&self, table: &SymbolTable) -> (HashMap<String, String>, Vec<String>) {
        let end = self.end_address();
        let mut renames = HashMap::new();
        let mut equates = Vec::new();

        for symbol in table.iter() {
            if self.section_containing(symbol.address).is_some() {
                continue;
            }
            if symbol.address < self.entry_point || symbol.address > end {
                equates.push(format!("{} = 0x{:08X};", symbol.name, symbol.address));
                continue;
            }

            let expression = match table.preceding(symbol.address) {
                Some(base) => format!("{} + {}", base.name, symbol.address - base.address),
                None => format!("ADDRESS_START + {}", symbol.address - self.entry_point),
            };
            debug!("orphan {} becomes {}", symbol.name, expression);
            equates.push(format!("{} = {};", symbol.name, expression));
            renames.insert(symbol.name.clone(), expression);
        }
        (renames, equates)
    }

    pub fn entry_point(&self) -> u32 {
        self.entry_point
    }

    /// End of the overlay's logical span: every section plus the header.
    pub fn end_address(&self) -> u32 {
        self.header
            .section_sizes
            .iter()
            .fold(self.entry_point, |acc, &size| acc.wrapping_add(size))
            .wrapping_add(self.header.header_offset)
    }

    pub fn header(&self) -> &OverlayHeader {
        &self.header
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section_containing(&self, address: u32) -> Option<&Section> {
        self.sections.iter().find(|s| s.contains(address))
    }

    /// Raw contents of `section`.
    pub fn section_bytes(&self, section: &Section) -> &[u8] {
        section.bytes(&self.data)
    }

    pub fn relocations(&self) -> &RelocationTable {
        &self.relocations
    }

    /// Relocation patching the word at `pc`.
    pub fn relocation_at(&self, pc: u32) -> Option<&Relocation> {
        self.relocations.lookup(pc)
    }

    pub fn functions(&self) -> &[DiscoveredFunction] {
        &self.functions
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn oddities(&self) -> &[String] {
        self.symbols.oddities()
    }

    /// Equates for symbols outside every section, in address order.
    pub fn linker_equates(&self) -> &[String] {
        &self.linker_equates
    }
}

impl SymbolRepository for Overlay {
    fn lookup(&self, address: u32) -> Option<&Symbol> {
        self.symbols.lookup(address)
    }

    fn lookup_referenced_symbol_name_at(&self, pc: u32) -> Option<String> {
        self.symbols.lookup_referenced_symbol_name_at(pc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use header::{HEADER_SIZE, SECTION_DATA};

    const ENTRY: u32 = 0x8080_0000;

    fn blob(text: &[u32], data: &[u32], bss: u32, relocs: &[u32]) -> Vec<u8> {
        let mut out = Vec::new();
        for &w in text.iter().chain(data) {
            out.extend_from_slice(&w.to_be_bytes());
        }
        let header_offset = (HEADER_SIZE + 4 * relocs.len() + 4) as u32;
        let sizes = [4 * text.len() as u32, 4 * data.len() as u32, 0, bss];
        for w in sizes
            .into_iter()
            .chain([relocs.len() as u32])
            .chain(relocs.iter().copied())
            .chain([header_offset])
        {
            out.extend_from_slice(&w.to_be_bytes());
        }
        out
    }

    /// Two functions, a `lui`/`addiu` pair to an external address, a call and
    /// two data pointers.
    fn sample() -> Vec<u8> {
        blob(
            &[
                0x3c04_8081, // lui   $a0, 0x8081
                0x0c20_0006, // jal   0x80800018
                0x2484_0010, // addiu $a0, $a0, 0x10
                0x03e0_0008, // jr    $ra
                0x0000_0000,
                0x0000_0000,
                0x03e0_0008, // jr    $ra
                0x0000_0000,
            ],
            &[0x8080_0000, 0x8080_0018],
            0x10,
            &[
                encode_relocation(SECTION_TEXT, RelocKind::Hi16, 0),
                encode_relocation(SECTION_TEXT, RelocKind::Rel26, 4),
                encode_relocation(SECTION_TEXT, RelocKind::Lo16, 8),
                encode_relocation(SECTION_DATA, RelocKind::Abs32, 0),
                encode_relocation(SECTION_DATA, RelocKind::Abs32, 4),
            ],
        )
    }

    #[test]
    fn builds_symbols_and_equates() {
        let overlay = Overlay::new(ENTRY, sample(), &OverlayOptions::default()).unwrap();
        assert_eq!(overlay.functions().len(), 2);
        assert_eq!(overlay.lookup_name(0x8080_0000).as_deref(), Some("data_80800000"));
        assert_eq!(overlay.lookup_name(0x8080_0018).as_deref(), Some("func_80800018"));
        assert_eq!(
            overlay.lookup_referenced_symbol_name_at(0x8080_0008).as_deref(),
            Some("data_80810010")
        );
        assert_eq!(overlay.linker_equates(), ["data_80810010 = 0x80810010;"]);
        assert!(overlay.oddities().is_empty());
    }

    #[test]
    fn end_address_includes_header() {
        let overlay = Overlay::new(ENTRY, sample(), &OverlayOptions::default()).unwrap();
        // 0x20 text + 8 data + 0x10 bss + (20 + 5 * 4 + 4) header
        assert_eq!(overlay.end_address(), ENTRY + 0x20 + 8 + 0x10 + 44);
        assert_eq!(overlay.section_containing(ENTRY + 0x20).map(|s| s.name), Some(".data"));
        assert!(overlay.section_containing(ENTRY + 0x28).is_none());
    }

    #[test]
    fn numbered_symbols() {
        let options = OverlayOptions {
            number_symbols: true,
            ..Default::default()
        };
        let overlay = Overlay::new(ENTRY, sample(), &options).unwrap();
        let names: Vec<&str> = overlay.symbols().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["data_0", "func_1", "data_2"]);
    }

    #[test]
    fn extra_symbols_do_not_replace_functions() {
        let options = OverlayOptions {
            extra_symbols: vec![(0x8080_0018, "helper".into()), (0x8000_1000, "osSendMesg".into())],
            ..Default::default()
        };
        let overlay = Overlay::new(ENTRY, sample(), &options).unwrap();
        assert_eq!(overlay.lookup_name(0x8080_0018).as_deref(), Some("func_80800018"));
        assert_eq!(
            overlay.linker_equates(),
            ["osSendMesg = 0x80001000;", "data_80810010 = 0x80810010;"]
        );
    }

    #[test]
    fn infers_entry_point() {
        assert_eq!(Overlay::infer_entry_point(&sample()).unwrap(), Some(ENTRY));
    }

    #[test]
    fn unpaired_lo16_is_fatal() {
        let data = blob(
            &[0x2484_0010, 0x03e0_0008, 0],
            &[],
            0,
            &[encode_relocation(SECTION_TEXT, RelocKind::Lo16, 0)],
        );
        match Overlay::new(ENTRY, data, &OverlayOptions::default()) {
            Err(Error::UnpairedRelocation { offending, .. }) => assert_eq!(offending, Some(0)),
            other => panic!("expected unpaired relocation, got {:?}", other.err()),
        }
    }

    #[test]
    fn truncated_blob_is_malformed() {
        assert!(matches!(
            Overlay::new(ENTRY, vec![0, 0], &OverlayOptions::default()),
            Err(Error::MalformedOverlay(_))
        ));
    }
}
