//! Durable key-value storage behind the progression store.
//!
//! `FileStorage` keeps one JSON file per key and replaces it atomically
//! (temp file + rename), so a crash mid-write leaves the previous record.
//! `MemoryStorage` lives as long as the process.

use std::{
  collections::HashMap,
  fs,
  io::Write,
  path::{Path, PathBuf},
  sync::Mutex,
};

use crate::error::StorageError;

pub trait Storage: Send + Sync {
  fn read(&self, key: &str) -> Result<Option<String>, StorageError>;
  fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;
  fn remove(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Clone)]
pub struct FileStorage {
  dir: PathBuf,
}

impl FileStorage {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }

  pub fn dir(&self) -> &Path { &self.dir }

  fn path_for(&self, key: &str) -> PathBuf {
    self.dir.join(format!("{key}.json"))
  }
}

impl Storage for FileStorage {
  fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
    match fs::read_to_string(self.path_for(key)) {
      Ok(s) => Ok(Some(s)),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(e.into()),
    }
  }

  fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
    fs::create_dir_all(&self.dir)?;
    let path = self.path_for(key);
    let tmp = self.dir.join(format!(".{key}.json.tmp"));
    {
      let mut f = fs::File::create(&tmp)?;
      f.write_all(value.as_bytes())?;
      f.sync_all()?;
    }
    fs::rename(&tmp, &path)?;
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<(), StorageError> {
    match fs::remove_file(self.path_for(key)) {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(e.into()),
    }
  }
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
  entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
  pub fn new() -> Self { Self::default() }

  fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StorageError> {
    self.entries.lock().map_err(|_| StorageError::Unavailable("memory storage lock poisoned".into()))
  }
}

impl Storage for MemoryStorage {
  fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
    Ok(self.entries()?.get(key).cloned())
  }

  fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
    self.entries()?.insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<(), StorageError> {
    self.entries()?.remove(key);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn file_storage_round_trip() {
    let dir = TempDir::new().unwrap();
    let storage = FileStorage::new(dir.path().join("nested"));
    assert_eq!(storage.read("k").unwrap(), None);

    storage.write("k", "{\"a\":1}").unwrap();
    assert_eq!(storage.read("k").unwrap().as_deref(), Some("{\"a\":1}"));
    assert!(storage.dir().join("k.json").exists());
    assert!(!storage.dir().join(".k.json.tmp").exists());

    storage.write("k", "{\"a\":2}").unwrap();
    assert_eq!(storage.read("k").unwrap().as_deref(), Some("{\"a\":2}"));

    storage.remove("k").unwrap();
    assert_eq!(storage.read("k").unwrap(), None);
    // removing twice is fine
    storage.remove("k").unwrap();
  }

  #[test]
  fn memory_storage_round_trip() {
    let storage = MemoryStorage::new();
    storage.write("k", "v").unwrap();
    assert_eq!(storage.read("k").unwrap().as_deref(), Some("v"));
    storage.remove("k").unwrap();
    assert_eq!(storage.read("k").unwrap(), None);
  }
}
