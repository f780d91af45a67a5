//! Command implementations for covary CLI

pub mod filter;
pub mod inspect;
pub mod layout;
pub mod synth;

use anyhow::{Context, Result};
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

use crate::error::CliError;

/// Memory-map a binary input file.
pub fn map_file(path: &Path) -> Result<Mmap> {
    if !path.exists() {
        return Err(CliError::file_not_found(path.to_path_buf()).into());
    }
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    if file.metadata()?.len() == 0 {
        return Err(CliError::invalid_format(format!("{} is empty", path.display())).into());
    }

    // The file is only read while the map is alive.
    let mmap = unsafe { Mmap::map(&file) }
        .with_context(|| format!("Failed to memory map {}", path.display()))?;
    Ok(mmap)
}
