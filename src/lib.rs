// SPDX-License-Identifier: GPL-3.0-or-later
//! MIPS Overlay Analyzer Library
//!
//! This library decodes big-endian MIPS III code, recovers functions and
//! branch/call targets from it, and resolves the relocation table of
//! relocatable overlays into a symbol table and linker equates.

pub mod annotations;
pub mod cfg;
pub mod error;
pub mod mips;
pub mod output;
pub mod overlay;
pub mod symbols;
