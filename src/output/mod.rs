// SPDX-License-Identifier: GPL-3.0-or-later
//! Output generation for linker scripts and symbol listings.

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::overlay::Overlay;

pub mod linker;
pub mod listing;
pub mod util;

pub use linker::{generate_linker_equates, generate_linker_script, linker_script};
pub use listing::{generate_listing, write_listing};
pub use util::{create_output_dir, create_output_file};

/// Generate every output file for `overlay` in `output_dir`.
/// Returns the list of generated file paths.
pub fn generate_overlay_outputs(overlay: &Overlay, output_dir: &Path) -> Result<Vec<PathBuf>> {
    create_output_dir(output_dir)?;
    let mut generated = Vec::new();

    let lds_file = output_dir.join("conf.ld");
    generate_linker_script(overlay, &lds_file)?;
    generated.push(lds_file);

    let listing_file = output_dir.join("symbols.txt");
    generate_listing(overlay, &listing_file)?;
    generated.push(listing_file);

    Ok(generated)
}
