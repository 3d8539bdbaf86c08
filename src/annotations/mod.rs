// SPDX-License-Identifier: GPL-3.0-or-later
//! Caller-supplied annotations: externally known symbols loaded from JSON.

use anyhow::{Context, Result};
use log::warn;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

/// Strip a "0x" or "0X" prefix from a string, if present.
pub fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// Parse a hex address string with optional 0x/0X prefix
pub fn parse_hex_addr(s: &str) -> Option<u32> {
    u32::from_str_radix(strip_hex_prefix(s), 16).ok()
}

/// Load and deserialize a JSON file with standardized error context.
fn load_json_file<T: serde::de::DeserializeOwned>(path: &Path, description: &str) -> Result<T> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open {} file {:?}", description, path))?;
    serde_json::from_reader(file)
        .with_context(|| format!("Failed to parse {} file {:?}", description, path))
}

/// Generic map from addresses to values, loaded from JSON.
/// JSON format: [{ "0xaddr": value }, ...]
#[derive(Debug, Default)]
pub struct AddrMap<T>(HashMap<u32, T>);

impl<T: serde::de::DeserializeOwned> AddrMap<T> {
    pub fn load(path: &Path, description: &str) -> Result<Self> {
        let json: Vec<HashMap<String, T>> = load_json_file(path, description)?;

        let mut map = HashMap::new();
        for entry in json {
            for (addr_str, value) in entry {
                match parse_hex_addr(&addr_str) {
                    Some(addr) => {
                        map.insert(addr, value);
                    }
                    None => warn!("{:?}: ignoring bad address {:?}", path, addr_str),
                }
            }
        }
        Ok(AddrMap(map))
    }
}

impl<T> AddrMap<T> {
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn get(&self, addr: u32) -> Option<&T> {
        self.0.get(&addr)
    }
    pub fn insert(&mut self, addr: u32, value: T) {
        self.0.insert(addr, value);
    }

    /// Entries ordered by address.
    pub fn into_sorted_vec(self) -> Vec<(u32, T)> {
        let mut entries: Vec<_> = self.0.into_iter().collect();
        entries.sort_by_key(|(addr, _)| *addr);
        entries
    }
}

/// Names for addresses outside the overlay, e.g. library entry points.
#[derive(Debug, Default)]
pub struct ExtraSymbols(AddrMap<String>);

impl ExtraSymbols {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        Ok(Self(AddrMap::load(path, "symbols")?))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, addr: u32) -> Option<&str> {
        self.0.get(addr).map(String::as_str)
    }

    pub fn into_sorted_vec(self) -> Vec<(u32, String)> {
        self.0.into_sorted_vec()
    }
}
