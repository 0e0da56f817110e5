//! Key-value storage for the session token, the counterpart of browser local storage.
//!
//! Two implementations are provided: [MemoryStorage], which lives as long as the process, and [FileStorage], which
//! keeps every key in a single JSON object on disk so a session survives restarts.

use std::{
    collections::HashMap,
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Mutex, RwLock},
};

use log::{debug, warn};
use serde::{de::DeserializeOwned, Serialize};
use tempfile::NamedTempFile;

use crate::error::Result;

/// Key the access token is stored under. Shared with the Spotify Web API browser SDK.
pub const TOKEN_STORAGE_KEY: &str = "spotify-sdk:AuthorizationCodeWithPKCEStrategy:token";

/// Key the pending PKCE verifier and state are stored under while the user is away at the authorize page.
pub const VERIFIER_STORAGE_KEY: &str = "spotify-sdk:verifier";

pub trait TokenStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;

    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}

/// Typed JSON access on top of any [TokenStorage].
pub trait JsonStorageExt: TokenStorage {
    fn get_json<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        match self.get(key)? {
            Some(value) => Ok(Some(serde_json::from_str(&value)?)),
            None => Ok(None),
        }
    }

    fn set_json<T>(&self, key: &str, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        self.set(key, &serde_json::to_string(value)?)
    }
}

impl<S> JsonStorageExt for S where S: TokenStorage + ?Sized {}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: RwLock<HashMap<String, String>>,
}

/// Stores all keys in one JSON object file.
///
/// Every change writes a new file next to the old one and renames it into place, so readers see either the old or the
/// new contents. A missing file reads as empty, as does an unreadable one, which the next change overwrites.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    // serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .values
            .read()
            .expect("memory storage rwlock poisoned")
            .get(key)
            .cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .write()
            .expect("memory storage rwlock poisoned")
            .insert(key.to_owned(), value.to_owned());

        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.values
            .write()
            .expect("memory storage rwlock poisoned")
            .remove(key);

        Ok(())
    }
}

impl FileStorage {
    pub fn new<P>(path: P) -> Self
    where
        P: Into<PathBuf>,
    {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<HashMap<String, String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(HashMap::new()),
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(values) => Ok(values),
                Err(err) => {
                    warn!("Ignoring unreadable storage file {}: {}", self.path.display(), err);
                    Ok(HashMap::new())
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(err) => Err(err.into()),
        }
    }

    fn write_all(&self, values: &HashMap<String, String>) -> Result<()> {
        let parent = match self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            Some(parent) => {
                fs::create_dir_all(parent)?;
                parent
            }
            None => Path::new("."),
        };

        debug!("Writing {} storage keys to {}", values.len(), self.path.display());

        let mut file = NamedTempFile::new_in(parent)?;
        file.write_all(serde_json::to_string_pretty(values)?.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(io::Error::from)?;

        Ok(())
    }

    fn modify<F>(&self, modify: F) -> Result<()>
    where
        F: FnOnce(&mut HashMap<String, String>),
    {
        let _guard = self.write_lock.lock().expect("file storage write lock poisoned");
        let mut values = self.read_all()?;
        modify(&mut values);
        self.write_all(&values)
    }
}

impl TokenStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.modify(|values| {
            values.insert(key.to_owned(), value.to_owned());
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.modify(|values| {
            values.remove(key);
        })
    }
}

impl<S> TokenStorage for std::sync::Arc<S>
where
    S: TokenStorage + ?Sized,
{
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::token::PendingAuthorization;

    #[test]
    fn memory_storage() {
        let storage = MemoryStorage::new();

        assert_eq!(storage.get(TOKEN_STORAGE_KEY).unwrap(), None);
        assert!(!storage.contains(TOKEN_STORAGE_KEY).unwrap());

        storage.set(TOKEN_STORAGE_KEY, "blob").unwrap();
        assert_eq!(storage.get(TOKEN_STORAGE_KEY).unwrap().as_deref(), Some("blob"));
        assert!(storage.contains(TOKEN_STORAGE_KEY).unwrap());

        storage.remove(TOKEN_STORAGE_KEY).unwrap();
        assert_eq!(storage.get(TOKEN_STORAGE_KEY).unwrap(), None);
    }

    #[test]
    fn file_storage_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("absent.json"));

        assert_eq!(storage.get(TOKEN_STORAGE_KEY).unwrap(), None);
    }

    #[test]
    fn file_storage_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        FileStorage::new(&path).set(TOKEN_STORAGE_KEY, "blob").unwrap();
        FileStorage::new(&path).set(VERIFIER_STORAGE_KEY, "pending").unwrap();

        let reopened = FileStorage::new(&path);
        assert_eq!(reopened.get(TOKEN_STORAGE_KEY).unwrap().as_deref(), Some("blob"));
        assert_eq!(reopened.get(VERIFIER_STORAGE_KEY).unwrap().as_deref(), Some("pending"));

        reopened.remove(TOKEN_STORAGE_KEY).unwrap();
        assert_eq!(FileStorage::new(&path).get(TOKEN_STORAGE_KEY).unwrap(), None);
        assert!(FileStorage::new(&path).contains(VERIFIER_STORAGE_KEY).unwrap());
    }

    #[test]
    fn file_storage_recovers_from_truncated_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, r#"{"spotify-sdk:verifier": "{\"verifier\":\"abc"#).unwrap();

        let storage = FileStorage::new(&path);
        assert_eq!(storage.get(VERIFIER_STORAGE_KEY).unwrap(), None);

        storage.remove(TOKEN_STORAGE_KEY).unwrap();
        storage.set(VERIFIER_STORAGE_KEY, "pending").unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let values: HashMap<String, String> = serde_json::from_str(&contents).unwrap();
        assert_eq!(values.get(VERIFIER_STORAGE_KEY).map(String::as_str), Some("pending"));
    }

    #[test]
    fn file_storage_leaves_no_temporary_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("session.json"));

        storage.set(TOKEN_STORAGE_KEY, "blob").unwrap();
        storage.set(VERIFIER_STORAGE_KEY, "pending").unwrap();
        storage.remove(VERIFIER_STORAGE_KEY).unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().map(|entry| entry.unwrap().file_name()).collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("session.json")]);
    }

    #[test]
    fn json_values() {
        let storage = MemoryStorage::new();
        let pending = PendingAuthorization {
            verifier: "verifier".to_owned(),
            state: "state".to_owned(),
        };

        storage.set_json(VERIFIER_STORAGE_KEY, &pending).unwrap();
        assert_eq!(
            storage.get_json::<PendingAuthorization>(VERIFIER_STORAGE_KEY).unwrap(),
            Some(pending)
        );
        assert_eq!(storage.get_json::<PendingAuthorization>(TOKEN_STORAGE_KEY).unwrap(), None);
    }
}
