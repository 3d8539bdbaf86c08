// SPDX-License-Identifier: GPL-3.0-or-later
//! Shared helpers for writing output files.

use anyhow::{Context, Result};
use std::fs::File;
use std::path::Path;

/// Create an output file with a standardized error message.
pub fn create_output_file(path: &Path, description: &str) -> Result<File> {
    File::create(path).with_context(|| format!("Failed to create {} {:?}", description, path))
}

/// Create the output directory if it doesn't exist.
pub fn create_output_dir(output_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {:?}", output_dir))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_nested_dirs_and_files() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        create_output_dir(&nested).unwrap();
        create_output_file(&nested.join("out.txt"), "test file").unwrap();
        assert!(nested.join("out.txt").exists());
    }

    #[test]
    fn error_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = create_output_file(&dir.path().join("missing/out.txt"), "listing").unwrap_err();
        assert!(err.to_string().starts_with("Failed to create listing"));
    }
}
