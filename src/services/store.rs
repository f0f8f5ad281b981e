use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::error::StoreError;

/// Reads a JSON file; `Ok(None)` when it does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    if !path.exists() {
        return Ok(None);
    }

    let data = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&data)?))
}

/// Like [`read_json`], but logs and falls back to the default on any error.
pub fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    match read_json(path) {
        Ok(Some(v)) => v,
        Ok(None) => T::default(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to load, using defaults");
            T::default()
        }
    }
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(value)?;
    write_atomic(path, json.as_bytes())
}

pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp = tmp_path(path);

    if let Some(parent) = tmp.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(&tmp, bytes)?;

    if path.exists() {
        fs::remove_file(path)?;
    }

    fs::rename(&tmp, path)?;

    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut p = path.to_path_buf();
    let file_name = match path.file_name().and_then(|s| s.to_str()) {
        Some(n) => n.to_string(),
        None => "data".to_string(),
    };
    p.set_file_name(format!("{file_name}.tmp"));
    p
}
