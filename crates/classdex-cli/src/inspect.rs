//! Dump class headers as JSON

use anyhow::{Context, Result};
use classdex_core::ClassHeader;
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize)]
pub struct InspectedClass {
    pub path: PathBuf,
    #[serde(flatten)]
    pub header: ClassHeader,
}

pub fn inspect_file(path: &Path) -> Result<InspectedClass> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let header = ClassHeader::read(BufReader::new(file))
        .with_context(|| format!("Failed to read class header from {}", path.display()))?;
    Ok(InspectedClass {
        path: path.to_path_buf(),
        header,
    })
}

/// Inspect every path, rendering a pretty JSON array
pub fn inspect_files(paths: &[PathBuf]) -> Result<String> {
    let inspected = paths
        .iter()
        .map(|path| inspect_file(path))
        .collect::<Result<Vec<_>>>()?;
    Ok(serde_json::to_string_pretty(&inspected)?)
}
