use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::model::settings::AppSettings;
use crate::services::ai::MAX_ATTEMPTS;
use crate::services::store;

pub const SETTINGS_FILE: &str = "settings.json";
pub const HOME_ENV: &str = "TIENICH_HOME";

/// `--data-dir`, else `TIENICH_HOME`, else `%LOCALAPPDATA%/TienIch`, else `./data`.
pub fn data_dir(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    if let Ok(home) = std::env::var(HOME_ENV) {
        if !home.trim().is_empty() {
            return PathBuf::from(home);
        }
    }
    if let Ok(local) = std::env::var("LOCALAPPDATA") {
        return PathBuf::from(local).join("TienIch");
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("data")
}

/// Missing file gives defaults; a corrupt one is an error.
pub fn load(dir: &Path) -> Result<AppSettings, StoreError> {
    Ok(store::read_json(&dir.join(SETTINGS_FILE))?.unwrap_or_default())
}

pub fn save(dir: &Path, mut settings: AppSettings) -> Result<AppSettings, StoreError> {
    if settings.provider.trim().is_empty() {
        settings.provider = AppSettings::default().provider;
    }
    settings.tabular_batch_size = settings.tabular_batch_size.max(1);
    settings.json_batch_size = settings.json_batch_size.max(1);
    settings.max_attempts = settings.max_attempts.clamp(1, MAX_ATTEMPTS);

    store::write_json(&dir.join(SETTINGS_FILE), &settings)?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_dir_wins() {
        let p = Path::new("/tmp/tienich-test");
        assert_eq!(data_dir(Some(p)), p);
    }

    #[test]
    fn save_clamps_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load(dir.path()).unwrap().tabular_batch_size, 100);

        let mut s = AppSettings::default();
        s.provider = "  ".into();
        s.tabular_batch_size = 0;
        s.model = "deepseek-chat".into();
        s.max_attempts = 34;

        let saved = save(dir.path(), s).unwrap();
        assert_eq!(saved.provider, "openai");
        assert_eq!(saved.tabular_batch_size, 1);
        assert_eq!(saved.max_attempts, MAX_ATTEMPTS);

        let back = load(dir.path()).unwrap();
        assert_eq!(back.model, "deepseek-chat");
        assert_eq!(back.tabular_batch_size, 1);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), "[1,").unwrap();
        assert!(load(dir.path()).is_err());
    }
}
