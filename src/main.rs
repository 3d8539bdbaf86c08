// SPDX-License-Identifier: GPL-3.0-or-later
use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::PathBuf;

use mips_ovl_analyzer::{
    annotations::{ExtraSymbols, parse_hex_addr},
    output::generate_overlay_outputs,
    overlay::{Overlay, OverlayOptions, detect, load_overlay},
};

#[derive(Parser)]
#[command(name = "mips-ovl-analyzer")]
#[command(about = "Resolve relocations and recover symbols of a MIPS overlay")]
struct Args {
    /// Path to the overlay blob
    overlay: PathBuf,

    /// Load address (hex); inferred from the relocations when omitted
    #[arg(short, long, value_parser = parse_entry)]
    entry: Option<u32>,

    /// Output directory for the linker script and symbol listing
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// JSON file with externally known symbols
    #[arg(short, long)]
    symbols: Option<PathBuf>,

    /// Name relocation symbols by index instead of by address
    #[arg(long)]
    number_symbols: bool,
}

fn parse_entry(s: &str) -> std::result::Result<u32, String> {
    parse_hex_addr(s).ok_or_else(|| format!("invalid hex address {:?}", s))
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let data = load_overlay(&args.overlay)?;
    println!("Loaded overlay: {} bytes ({:#x})", data.len(), data.len());
    if !detect(&data) {
        bail!("{:?} does not carry a valid overlay header", args.overlay);
    }

    let entry_point = match args.entry {
        Some(entry) => entry,
        None => {
            let entry = Overlay::infer_entry_point(&data)?
                .context("No absolute relocations to infer the entry point from, pass --entry")?;
            println!("Inferred entry point: 0x{:08X}", entry);
            entry
        }
    };

    let extra_symbols = match &args.symbols {
        Some(path) => {
            let symbols = ExtraSymbols::load_from_file(path)?;
            println!("Loaded {} extra symbols from {:?}", symbols.len(), path);
            symbols.into_sorted_vec()
        }
        None => Vec::new(),
    };

    let options = OverlayOptions {
        number_symbols: args.number_symbols,
        extra_symbols,
    };
    let overlay = Overlay::new(entry_point, data, &options)
        .with_context(|| format!("Failed to analyze {:?}", args.overlay))?;

    println!("{}\n", overlay.header());
    println!("Sections:");
    for section in overlay.sections() {
        println!("  {}", section);
    }
    println!(
        "\n{} relocations, {} functions, {} symbols",
        overlay.relocations().len(),
        overlay.functions().len(),
        overlay.symbols().len()
    );
    for oddity in overlay.oddities() {
        println!("  Oddity: {}", oddity);
    }

    for path in generate_overlay_outputs(&overlay, &args.output)? {
        println!("Generated: {:?}", path);
    }

    println!("\nDone!");
    Ok(())
}
