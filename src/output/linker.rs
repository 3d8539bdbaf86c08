// SPDX-License-Identifier: GPL-3.0-or-later
//! Linker equates for an overlay.
//!
//! The script pins the load address and defines every symbol that lives
//! outside the overlay's sections:
//!
//! ```text
//! ADDRESS_START = 0x80800000;
//! ENTRY_POINT = ADDRESS_START;
//! osSendMesg = 0x80001000;
//! data_80800140 = data_8080013C + 4;
//! ```

use anyhow::Result;
use std::io::Write;
use std::path::Path;

use super::util::create_output_file;
use crate::overlay::Overlay;

/// Script text for an overlay loaded at `entry_point` with the given orphan
/// `equates`. Lines are newline separated, without a trailing newline.
pub fn generate_linker_equates(entry_point: u32, equates: &[String]) -> String {
    let mut lines = vec![
        format!("ADDRESS_START = 0x{:08X};", entry_point),
        "ENTRY_POINT = ADDRESS_START;".to_string(),
    ];
    lines.extend(equates.iter().cloned());
    lines.join("\n")
}

pub fn linker_script(overlay: &Overlay) -> String {
    generate_linker_equates(overlay.entry_point(), overlay.linker_equates())
}

/// Write the linker script for `overlay` to `output_path`.
pub fn generate_linker_script(overlay: &Overlay, output_path: &Path) -> Result<()> {
    let mut file = create_output_file(output_path, "linker script")?;
    writeln!(file, "{}", linker_script(overlay))?;
    Ok(())
}
