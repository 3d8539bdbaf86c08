// SPDX-License-Identifier: GPL-3.0-or-later
//! Inferred kind/width of the data behind a symbol.

use bitflags::bitflags;
use std::fmt;

bitflags! {
    /// Set of inferred uses of an address. Hints from several references to
    /// the same address are unioned.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TypeHint: u16 {
        const FUNCTION           = 1 << 0;
        const SINGLE             = 1 << 1;
        const DOUBLE             = 1 << 2;
        const BYTE               = 1 << 3;
        const BYTE_UNSIGNED      = 1 << 4;
        const HALF_WORD          = 1 << 5;
        const HALF_WORD_UNSIGNED = 1 << 6;
        const WORD               = 1 << 7;
        const WORD_UNSIGNED      = 1 << 8;
        const DOUBLE_WORD        = 1 << 9;
        const BRANCH_TARGET      = 1 << 10;
    }
}

/// Name prefixes in priority order; the first flag present wins.
const PREFIXES: &[(TypeHint, &str)] = &[
    (TypeHint::FUNCTION, "func"),
    (TypeHint::DOUBLE, "f64"),
    (TypeHint::SINGLE, "f32"),
    (TypeHint::BYTE, "i8"),
    (TypeHint::BYTE_UNSIGNED, "u8"),
    (TypeHint::HALF_WORD, "i16"),
    (TypeHint::HALF_WORD_UNSIGNED, "u16"),
    (TypeHint::WORD, "i32"),
    (TypeHint::WORD_UNSIGNED, "u32"),
    (TypeHint::DOUBLE_WORD, "i64"),
];

impl TypeHint {
    /// Prefix used for generated symbol names, `"data"` when nothing more
    /// specific is known.
    pub fn prefix(self) -> &'static str {
        PREFIXES
            .iter()
            .find(|(flag, _)| self.contains(*flag))
            .map_or("data", |(_, prefix)| prefix)
    }
}

impl fmt::Display for TypeHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.pad("-");
        }
        let names: Vec<&str> = self.iter_names().map(|(name, _)| name).collect();
        f.pad(&names.join("|").to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_priority() {
        assert_eq!(TypeHint::empty().prefix(), "data");
        assert_eq!(TypeHint::BRANCH_TARGET.prefix(), "data");
        assert_eq!(TypeHint::WORD.prefix(), "i32");
        assert_eq!((TypeHint::WORD | TypeHint::SINGLE).prefix(), "f32");
        assert_eq!((TypeHint::BYTE | TypeHint::FUNCTION).prefix(), "func");
        assert_eq!(TypeHint::HALF_WORD_UNSIGNED.prefix(), "u16");
    }

    #[test]
    fn display() {
        assert_eq!(TypeHint::empty().to_string(), "-");
        assert_eq!((TypeHint::FUNCTION | TypeHint::WORD).to_string(), "function|word");
    }
}
