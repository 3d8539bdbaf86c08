// SPDX-License-Identifier: GPL-3.0-or-later
//! Overlay probe
//!
//! Reports whether each file carries a valid overlay header and, if so, the
//! load address implied by its relocations.
//!
//! Usage:
//!   ovl-probe <files...>            Print one line per file
//!   ovl-probe --quiet <files...>    Only print overlays

use anyhow::{Result, bail};
use clap::Parser;
use log::warn;
use mips_ovl_analyzer::overlay::{Overlay, OverlayHeader, detect, load_overlay};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "ovl-probe")]
#[command(about = "Detect overlays and infer their load addresses")]
struct Args {
    /// Only print files that are overlays
    #[arg(short, long)]
    quiet: bool,

    /// Input files
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

/// Print what `path` is.
fn probe(path: &Path, quiet: bool) -> Result<()> {
    let data = load_overlay(path)?;
    if !detect(&data) {
        if !quiet {
            println!("{}: not an overlay", path.display());
        }
        return Ok(());
    }

    let header = OverlayHeader::parse(&data)?;
    let entry = match Overlay::infer_entry_point(&data) {
        Ok(Some(entry)) => format!("0x{:08X}", entry),
        Ok(None) => "unknown".to_string(),
        Err(e) => {
            warn!("{}: {}", path.display(), e);
            "unresolvable".to_string()
        }
    };
    println!(
        "{}: overlay, entry {}, {} bytes loaded, {} relocations",
        path.display(),
        entry,
        header.loaded_size(),
        header.relocation_words.len()
    );
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut failures = 0;
    for path in &args.files {
        if let Err(e) = probe(path, args.quiet) {
            eprintln!("{}: {:#}", path.display(), e);
            failures += 1;
        }
    }

    if failures > 0 {
        bail!("{} of {} files could not be read", failures, args.files.len());
    }
    Ok(())
}
