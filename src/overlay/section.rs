// SPDX-License-Identifier: GPL-3.0-or-later
//! Section layout of a loaded overlay.

use std::fmt;
use std::ops::Range;

use super::header::{OverlayHeader, SECTION_BSS, SECTION_NAMES};

/// One of the four overlay sections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub id: usize,
    pub name: &'static str,
    pub start_address: u32,
    pub size: u32,
    /// Byte range inside the overlay blob. Empty for `.bss`.
    pub file_range: Range<usize>,
}

impl Section {
    pub fn end_address(&self) -> u32 {
        self.start_address.wrapping_add(self.size)
    }

    pub fn contains(&self, addr: u32) -> bool {
        addr >= self.start_address && addr < self.end_address()
    }

    /// Section contents within `data`, the whole overlay blob.
    pub fn bytes<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        data.get(self.file_range.clone()).unwrap_or(&[])
    }

    pub fn is_text(&self) -> bool {
        self.id == 0
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "0x{:08X} {} ({:.2} kB)",
            self.start_address,
            self.name,
            self.size as f64 / 1024.0
        )
    }
}

/// Place the sections of `header` at `entry_point`. Sections follow each
/// other in file order; `.bss` additionally skips the trailing header.
pub fn layout_sections(header: &OverlayHeader, entry_point: u32) -> Vec<Section> {
    let mut offset = 0u32;
    SECTION_NAMES
        .iter()
        .enumerate()
        .map(|(id, &name)| {
            let size = header.section_sizes[id];
            let (start_address, file_range) = if id == SECTION_BSS {
                let end = offset as usize;
                (
                    entry_point
                        .wrapping_add(offset)
                        .wrapping_add(header.header_offset),
                    end..end,
                )
            } else {
                (
                    entry_point.wrapping_add(offset),
                    offset as usize..(offset as usize + size as usize),
                )
            };
            offset = offset.wrapping_add(size);
            Section {
                id,
                name,
                start_address,
                size,
                file_range,
            }
        })
        .collect()
}
