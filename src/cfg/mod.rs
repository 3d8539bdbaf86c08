// SPDX-License-Identifier: GPL-3.0-or-later
//! Control-flow recovery for code without symbols.
//!
//! Everything here works on a flat slice of instruction words plus the
//! address of the first one. Nothing requires relocation data.

mod functions;
mod targets;

pub use functions::{DiscoveredFunction, discover_functions};
pub use targets::{HiLoPair, discover_branch_targets, discover_function_calls, discover_hi16_lo16_pairs};
