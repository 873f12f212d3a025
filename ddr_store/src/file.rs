use crate::error::StoreError;
use ddr_types::Blob;
use std::path::{Path, PathBuf};

/* ============================================================================
   Blob file formats
   ============================================================================ */

/* On-disk encodings understood by the store, chosen by file extension */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobFormat {
    Yaml,
    Json,
}

impl BlobFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Some(BlobFormat::Yaml),
            Some("json") => Some(BlobFormat::Json),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            BlobFormat::Yaml => "yaml",
            BlobFormat::Json => "json",
        }
    }
}

/* Decode a blob from text in the given format */
pub fn parse_blob(contents: &str, format: BlobFormat, path: &Path) -> Result<Blob, StoreError> {
    let parsed = match format {
        BlobFormat::Yaml => serde_yml::from_str(contents).map_err(|e| e.to_string()),
        BlobFormat::Json => serde_json::from_str(contents).map_err(|e| e.to_string()),
    };
    parsed.map_err(|message| StoreError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

/* Encode a blob as text in the given format */
pub fn render_blob(blob: &Blob, format: BlobFormat, path: &Path) -> Result<String, StoreError> {
    let rendered = match format {
        BlobFormat::Yaml => serde_yml::to_string(blob).map_err(|e| e.to_string()),
        BlobFormat::Json => serde_json::to_string_pretty(blob)
            .map(|mut s| {
                s.push('\n');
                s
            })
            .map_err(|e| e.to_string()),
    };
    rendered.map_err(|message| StoreError::Serialize {
        path: path.to_path_buf(),
        message,
    })
}

/// Read one blob file, picking the decoder from its extension.
pub fn read_blob(path: &Path) -> Result<Blob, StoreError> {
    let format =
        BlobFormat::from_path(path).ok_or_else(|| StoreError::UnsupportedFormat(path.to_path_buf()))?;
    let contents = std::fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
    parse_blob(&contents, format, path)
}

/// Write one blob file. The file is left untouched when the encoded bytes
/// already match what is on disk.
pub fn write_blob(path: &Path, blob: &Blob) -> Result<bool, StoreError> {
    let format =
        BlobFormat::from_path(path).ok_or_else(|| StoreError::UnsupportedFormat(path.to_path_buf()))?;
    let rendered = render_blob(blob, format, path)?;
    if let Ok(existing) = std::fs::read(path) {
        if existing == rendered.as_bytes() {
            return Ok(false);
        }
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
    }
    std::fs::write(path, rendered).map_err(|e| StoreError::io(path, e))?;
    Ok(true)
}

/// Store key derived from a blob file name (`linux_x86-64.yaml` -> `linux_x86-64`).
pub fn key_for_path(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Blob files in a directory, in file-name order so that additions do not
/// depend on filesystem iteration order.
pub fn blob_files_in(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| StoreError::io(dir, e))? {
        let entry = entry.map_err(|e| StoreError::io(dir, e))?;
        let path = entry.path();
        if path.is_file() && BlobFormat::from_path(&path).is_some() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
