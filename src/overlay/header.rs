// SPDX-License-Identifier: GPL-3.0-or-later
//! Trailing header parsing for relocatable overlays.
//!
//! An overlay is laid out as
//!
//! ```text
//! +-------+-------+---------+--------------------------------------------+
//! | .text | .data | .rodata | header: sizes[4], nrelocs, relocs[nrelocs] |
//! +-------+-------+---------+--------------------------------------------+
//!                                                    last word: header_offset
//! ```
//!
//! where `header_offset` is the distance from the start of the header to the
//! end of the blob. `.bss` occupies no bytes in the file.

use anyhow::{Context, Result as AnyResult};
use byteorder::{BigEndian, ByteOrder};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{Error, Result};

pub const SECTION_COUNT: usize = 4;

/// Section size words plus the relocation count.
pub const HEADER_SIZE: usize = 4 * SECTION_COUNT + 4;

pub const SECTION_TEXT: usize = 0;
pub const SECTION_DATA: usize = 1;
pub const SECTION_RODATA: usize = 2;
pub const SECTION_BSS: usize = 3;

pub const SECTION_NAMES: [&str; SECTION_COUNT] = [".text", ".data", ".rodata", ".bss"];

/// Header field offsets relative to the header start.
const HEADER_OFFSET_SIZES: usize = 0;
const HEADER_OFFSET_RELOC_COUNT: usize = 4 * SECTION_COUNT;
const HEADER_OFFSET_RELOCS: usize = HEADER_SIZE;

fn read_u32_at(data: &[u8], offset: usize) -> Option<u32> {
    data.get(offset..offset.checked_add(4)?)
        .map(BigEndian::read_u32)
}

fn malformed(reason: impl Into<String>) -> Error {
    Error::MalformedOverlay(reason.into())
}

/// Parsed overlay header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayHeader {
    /// Distance from the header start to the end of the blob.
    pub header_offset: u32,
    pub section_sizes: [u32; SECTION_COUNT],
    /// Raw relocation words, in file order.
    pub relocation_words: Vec<u32>,
}

impl OverlayHeader {
    /// Parse the trailing header of `data`. Fails if any header field points
    /// outside the buffer or the sections overlap the header.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let len = data.len();
        let header_offset = data
            .len()
            .checked_sub(4)
            .and_then(|offset| read_u32_at(data, offset))
            .ok_or_else(|| malformed(format!("{len} bytes is too short for a header")))?;

        let header_start = len
            .checked_sub(header_offset as usize)
            .filter(|start| start + HEADER_SIZE <= len)
            .ok_or_else(|| {
                malformed(format!("header offset {header_offset:#x} does not fit in {len:#x} bytes"))
            })?;

        let mut section_sizes = [0u32; SECTION_COUNT];
        for (i, size) in section_sizes.iter_mut().enumerate() {
            *size = read_u32_at(data, header_start + HEADER_OFFSET_SIZES + 4 * i)
                .ok_or_else(|| malformed("truncated section sizes"))?;
        }

        let loaded: u64 = section_sizes[..SECTION_BSS].iter().map(|&s| u64::from(s)).sum();
        if loaded > header_start as u64 {
            return Err(malformed(format!(
                "sections ({loaded:#x} bytes) overlap the header at {header_start:#x}"
            )));
        }

        let reloc_count = read_u32_at(data, header_start + HEADER_OFFSET_RELOC_COUNT)
            .ok_or_else(|| malformed("truncated relocation count"))?;
        let relocation_words = (0..reloc_count as usize)
            .map(|i| {
                read_u32_at(data, header_start + HEADER_OFFSET_RELOCS + 4 * i).ok_or_else(|| {
                    malformed(format!("relocation {i} of {reloc_count} lies past the end"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(OverlayHeader {
            header_offset,
            section_sizes,
            relocation_words,
        })
    }

    /// Bytes occupied by `.text`, `.data` and `.rodata`.
    pub fn loaded_size(&self) -> u32 {
        self.section_sizes[..SECTION_BSS]
            .iter()
            .fold(0u32, |acc, &size| acc.wrapping_add(size))
    }
}

impl fmt::Display for OverlayHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Overlay header:")?;
        writeln!(f, "  Header offset: {:#x}", self.header_offset)?;
        for (name, size) in SECTION_NAMES.iter().zip(self.section_sizes) {
            writeln!(f, "  {:<13}  {:#x} ({} bytes)", format!("{name}:"), size, size)?;
        }
        write!(f, "  Relocations:   {}", self.relocation_words.len())
    }
}

/// Cheap check that `data` carries a self-consistent trailing header:
/// the header offset is non-zero, word aligned and inside the blob, and the
/// loaded sections plus the header account for every byte.
pub fn detect(data: &[u8]) -> bool {
    let len = data.len();
    let Some(header_offset) = len.checked_sub(4).and_then(|offset| read_u32_at(data, offset))
    else {
        return false;
    };
    let header_offset = header_offset as usize;
    if header_offset == 0 || header_offset % 4 != 0 || header_offset >= len {
        return false;
    }

    let header_start = len - header_offset;
    let mut loaded = 0u64;
    for i in 0..SECTION_BSS {
        match read_u32_at(data, header_start + 4 * i) {
            Some(size) => loaded += u64::from(size),
            None => return false,
        }
    }

    loaded + header_offset as u64 == len as u64
}

/// Load an overlay blob from a file path.
pub fn load_overlay(path: &Path) -> AnyResult<Vec<u8>> {
    let mut data = Vec::new();
    File::open(path)
        .with_context(|| format!("Failed to open overlay file {:?}", path))?
        .read_to_end(&mut data)
        .context("Failed to read overlay file")?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal overlay: `text` words, `data` words, no rodata, given bss size
    /// and relocation words.
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

    #[test]
    fn parse_header() {
        let data = blob(&[0x03e0_0008, 0], &[0x8080_0000], 0x40, &[0x8200_0008]);
        let header = OverlayHeader::parse(&data).unwrap();
        assert_eq!(header.section_sizes, [8, 4, 0, 0x40]);
        assert_eq!(header.header_offset, 0x1c);
        assert_eq!(header.relocation_words, vec![0x8200_0008]);
        assert_eq!(header.loaded_size(), 12);
        assert!(header.to_string().contains("Relocations:   1"));
    }

    #[test]
    fn detect_accepts_consistent_blob() {
        assert!(detect(&blob(&[0x03e0_0008, 0], &[], 0, &[])));
        assert!(detect(&blob(&[0x03e0_0008, 0], &[], 0x100, &[0x8200_0000, 0x8400_0000])));
    }

    #[test]
    fn detect_rejects_header_only_blob() {
        // header offset equals the blob length
        assert!(!detect(&blob(&[], &[], 0x100, &[0x8200_0000, 0x8400_0000])));
    }

    #[test]
    fn detect_rejects_inconsistent_blobs() {
        assert!(!detect(&[]));
        assert!(!detect(&[0, 0, 0, 0]));

        let mut data = blob(&[0x03e0_0008, 0], &[], 0, &[]);
        data.insert(0, 0xff);
        assert!(!detect(&data));

        // header offset not word aligned
        let mut data = blob(&[0x03e0_0008], &[], 0, &[]);
        let n = data.len();
        data[n - 1] += 1;
        assert!(!detect(&data));

        // header offset larger than the blob
        let mut data = blob(&[], &[], 0, &[]);
        let n = data.len();
        data[n - 4..].copy_from_slice(&0x1000u32.to_be_bytes());
        assert!(!detect(&data));
    }

    #[test]
    fn parse_rejects_out_of_bounds_header() {
        assert!(matches!(OverlayHeader::parse(&[1, 2]), Err(Error::MalformedOverlay(_))));

        let mut data = blob(&[], &[], 0, &[]);
        let n = data.len();
        data[n - 4..].copy_from_slice(&0x1000u32.to_be_bytes());
        assert!(matches!(OverlayHeader::parse(&data), Err(Error::MalformedOverlay(_))));

        // relocation count runs past the end
        let mut data = blob(&[], &[], 0, &[]);
        data[16..20].copy_from_slice(&5u32.to_be_bytes());
        assert!(matches!(OverlayHeader::parse(&data), Err(Error::MalformedOverlay(_))));
    }

    #[test]
    fn parse_rejects_sections_overlapping_header() {
        let mut data = blob(&[0x03e0_0008], &[], 0, &[]);
        // claim 0x100 bytes of .text
        data[4..8].copy_from_slice(&0x100u32.to_be_bytes());
        assert!(OverlayHeader::parse(&data).is_err());
    }
}
