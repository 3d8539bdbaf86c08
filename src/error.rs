// SPDX-License-Identifier: GPL-3.0-or-later
//! Error types shared by the decode, relocation and symbol layers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A decode-table slot had no handler and the dispatcher has no default.
    #[error("unhandled instruction {word:#010x} at {pc:#010x}")]
    UnhandledInstruction { pc: u32, word: u32 },

    /// A relocation could not be resolved. `table` is the full relocation
    /// dump with the offending entry marked by ` >> `.
    #[error("{message}\nrelocation table:\n{table}")]
    UnpairedRelocation {
        message: String,
        offending: Option<usize>,
        table: String,
    },

    #[error("malformed overlay: {0}")]
    MalformedOverlay(String),
}

pub type Result<T> = std::result::Result<T, Error>;
