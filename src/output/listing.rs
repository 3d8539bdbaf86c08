// SPDX-License-Identifier: GPL-3.0-or-later
//! Human-readable summary of an analyzed overlay: section map, oddities,
//! symbol table and discovered functions.

use anyhow::Result;
use std::io::Write;
use std::path::Path;

use super::util::create_output_file;
use crate::overlay::Overlay;
use crate::overlay::header::SECTION_RODATA;

/// Write the listing for `overlay` to `w`.
pub fn write_listing<W: Write>(overlay: &Overlay, w: &mut W) -> Result<()> {
    writeln!(w, "# Sections")?;
    for section in overlay.sections() {
        writeln!(
            w,
            "#   {:<8} 0x{:08X} - 0x{:08X} ({:6.2} kB)",
            section.name,
            section.start_address,
            section.end_address(),
            section.size as f64 / 1024.0
        )?;
        if section.id == SECTION_RODATA {
            let header_offset = overlay.header().header_offset;
            writeln!(
                w,
                "#   {:<8} 0x{:08X} - 0x{:08X} ({:6.2} kB)",
                "[relocs]",
                section.end_address(),
                section.end_address().wrapping_add(header_offset),
                header_offset as f64 / 1024.0
            )?;
        }
    }

    if !overlay.oddities().is_empty() {
        writeln!(w, "#")?;
        writeln!(w, "# Oddities")?;
        for oddity in overlay.oddities() {
            writeln!(w, "#   - {}", oddity)?;
        }
    }

    writeln!(w)?;
    writeln!(w, "# Symbols ({})", overlay.symbols().len())?;
    for symbol in overlay.symbols().iter() {
        writeln!(w, "{:08X} {:<12} {}", symbol.address, symbol.type_hint, symbol.name)?;
    }

    writeln!(w)?;
    writeln!(w, "# Functions ({})", overlay.functions().len())?;
    for function in overlay.functions() {
        writeln!(w, "{}", function)?;
    }
    Ok(())
}

/// Write the listing for `overlay` to `output_path`.
pub fn generate_listing(overlay: &Overlay, output_path: &Path) -> Result<()> {
    let mut file = create_output_file(output_path, "symbol listing")?;
    write_listing(overlay, &mut file)
}
