use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
};

use serde::{
    de::DeserializeOwned,
    Serialize,
};
use tracing::{
    debug,
    warn,
};

use crate::core::BookToCardsError;

const APP_NAME: &str = "booktocards";

pub fn get_app_data_dir() -> PathBuf {
    if let Some(data_dir) = dirs::data_local_dir() {
        data_dir.join(APP_NAME)
    } else {
        PathBuf::from(".")
    }
}

/// Locations of everything the tool reads and writes, below one root.
#[derive(Debug, Clone)]
pub struct AppPaths {
    root: PathBuf,
}

impl Default for AppPaths {
    fn default() -> Self {
        AppPaths::new(get_app_data_dir())
    }
}

impl AppPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        AppPaths { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn settings_file(&self) -> PathBuf {
        self.root.join("settings.json")
    }

    pub fn session_file(&self) -> PathBuf {
        self.root.join("session.json")
    }

    pub fn kb_dir(&self) -> PathBuf {
        self.root.join("kb")
    }

    pub fn cards_dir(&self) -> PathBuf {
        self.root.join("cards")
    }

    pub fn tokenizer_dict_dir(&self) -> PathBuf {
        self.root.join("dictionaries").join("tokenizer")
    }

    pub fn jmdict_dir(&self) -> PathBuf {
        self.root.join("dictionaries").join("jmdict")
    }

    pub fn sanseido_dir(&self) -> PathBuf {
        self.root.join("dictionaries").join("sanseido")
    }

    pub fn frequency_dict_dir(&self) -> PathBuf {
        self.root.join("dictionaries").join("frequency")
    }

    pub fn tatoeba_dir(&self) -> PathBuf {
        self.root.join("tatoeba")
    }
}

pub fn save_json<T: Serialize>(data: &T, file_path: &Path) -> Result<(), BookToCardsError> {
    if let Some(parent) = file_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(data)?;
    fs::write(file_path, json)?;
    debug!("Data saved to: {}", file_path.display());
    Ok(())
}

pub fn load_json<T: DeserializeOwned + Default>(file_path: &Path) -> Result<T, BookToCardsError> {
    if !file_path.exists() {
        return Ok(T::default());
    }

    let json = fs::read_to_string(file_path)?;
    let data: T = serde_json::from_str(&json)?;
    debug!("Data loaded from: {}", file_path.display());
    Ok(data)
}

pub fn load_json_or_default<T: DeserializeOwned + Default>(file_path: &Path) -> T {
    match load_json::<T>(file_path) {
        Ok(data) => data,
        Err(e) => {
            warn!("Failed to load {}: {}. Using defaults.", file_path.display(), e);
            T::default()
        }
    }
}

pub fn delete_data_file(file_path: &Path) -> Result<(), BookToCardsError> {
    if file_path.exists() {
        fs::remove_file(file_path)?;
        debug!("Deleted: {}", file_path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_roundtrip_and_missing_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("values.json");

        let missing: Vec<String> = load_json(&path).unwrap();
        assert!(missing.is_empty());

        save_json(&vec!["食べる".to_string()], &path).unwrap();
        let loaded: Vec<String> = load_json(&path).unwrap();
        assert_eq!(loaded, vec!["食べる".to_string()]);

        delete_data_file(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_corrupt_file_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        let loaded: Vec<u32> = load_json_or_default(&path);
        assert!(loaded.is_empty());
    }
}
