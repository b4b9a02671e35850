//! Batch input enumeration
//!
//! The asset directory is scanned once at run start. Only the file
//! extension decides how an input is treated: `.txt` goes through the
//! generative model, `.json`/`.jsonld` is taken as pre-structured. Reading
//! and parsing happen per item inside the batch loop so that one unreadable
//! file cannot abort the run.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};

/// How an input's payload should be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Unstructured text that requires model-driven normalization
    FreeText,
    /// A pre-structured JSON(-LD) document
    Structured,
}

impl SourceKind {
    /// Classify a file extension; `None` means the file is skipped
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "txt" => Some(SourceKind::FreeText),
            "json" | "jsonld" => Some(SourceKind::Structured),
            _ => None,
        }
    }
}

/// One enumerated input file, not yet read
#[derive(Debug, Clone)]
pub struct AssetFile {
    pub name: String,
    pub path: PathBuf,
    pub kind: SourceKind,
}

impl AssetFile {
    /// Read and parse the file into a raw input.
    ///
    /// Failures here are per-item: the batch records them and moves on.
    pub fn read(&self) -> Result<RawInput> {
        let contents = fs::read_to_string(&self.path).map_err(|e| {
            Error::Transform(self.name.clone(), format!("read error: {}", e))
        })?;

        let payload = match self.kind {
            SourceKind::FreeText => RawPayload::FreeText(contents),
            SourceKind::Structured => {
                let document: Value = serde_json::from_str(&contents).map_err(|e| {
                    Error::Transform(self.name.clone(), format!("parse error: {}", e))
                })?;
                RawPayload::Structured(document)
            }
        };

        Ok(RawInput {
            name: self.name.clone(),
            payload,
        })
    }
}

/// Payload of one raw input
#[derive(Debug, Clone)]
pub enum RawPayload {
    FreeText(String),
    Structured(Value),
}

/// One raw input, immutable once read
#[derive(Debug, Clone)]
pub struct RawInput {
    pub name: String,
    pub payload: RawPayload,
}

/// Enumerate publishable files in a directory, in name order.
///
/// Files with unrecognized extensions are skipped silently; a missing or
/// unreadable directory is a pre-run error.
pub fn enumerate_assets(dir: &Path) -> Result<Vec<AssetFile>> {
    let entries = fs::read_dir(dir).map_err(|e| {
        Error::Config(format!(
            "Failed to read assets directory {}: {}",
            dir.display(),
            e
        ))
    })?;

    let mut assets: Vec<AssetFile> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| {
            let path = entry.path();
            let kind = path
                .extension()
                .and_then(|ext| ext.to_str())
                .and_then(SourceKind::from_extension)?;
            let name = path.file_name()?.to_string_lossy().into_owned();
            Some(AssetFile { name, path, kind })
        })
        .collect();

    assets.sort_by(|a, b| a.name.cmp(&b.name));

    debug!(dir = %dir.display(), count = assets.len(), "Enumerated asset files");

    Ok(assets)
}
