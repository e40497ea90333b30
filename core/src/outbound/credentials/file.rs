//! Credential slot persisted as a JSON file through `cap_std`.
//!
//! Writes go to a uniquely named sibling first and are renamed into place, so
//! a crash never leaves a truncated slot behind.

use std::io;
use std::path::{Path, PathBuf};

use cap_std::{ambient_authority, fs::Dir};
use uuid::Uuid;

use crate::domain::SessionAssertion;
use crate::domain::ports::{CredentialStore, CredentialStoreError};

/// File-backed credential slot.
#[derive(Debug)]
pub struct FileCredentialStore {
    directory: Dir,
    file_name: PathBuf,
    display_path: PathBuf,
}

fn io_error(path: &Path, error: io::Error) -> CredentialStoreError {
    CredentialStoreError::io(format!("{}: {error}", path.display()))
}

impl FileCredentialStore {
    /// Open (creating the parent directory if needed) the slot at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CredentialStoreError> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(PathBuf::from)
            .ok_or_else(|| {
                CredentialStoreError::io(format!("{} has no file name", path.display()))
            })?;
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        Dir::create_ambient_dir_all(parent, ambient_authority())
            .map_err(|error| io_error(parent, error))?;
        let directory = Dir::open_ambient_dir(parent, ambient_authority())
            .map_err(|error| io_error(parent, error))?;

        Ok(Self {
            directory,
            file_name,
            display_path: path.to_path_buf(),
        })
    }

    /// Location of the slot file.
    pub fn path(&self) -> &Path {
        &self.display_path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<SessionAssertion>, CredentialStoreError> {
        let contents = match self.directory.read_to_string(&self.file_name) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(io_error(&self.display_path, error)),
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|error| CredentialStoreError::corrupt(error.to_string()))
    }

    fn store(&self, assertion: &SessionAssertion) -> Result<(), CredentialStoreError> {
        let contents = serde_json::to_vec(assertion)
            .map_err(|error| CredentialStoreError::io(error.to_string()))?;
        let staged = PathBuf::from(format!(
            ".{}.{}.tmp",
            self.file_name.display(),
            Uuid::new_v4().simple()
        ));

        self.directory
            .write(&staged, contents)
            .map_err(|error| io_error(&self.display_path, error))?;
        self.directory
            .rename(&staged, &self.directory, &self.file_name)
            .map_err(|error| {
                let _ = self.directory.remove_file(&staged);
                io_error(&self.display_path, error)
            })
    }

    fn clear(&self) -> Result<(), CredentialStoreError> {
        match self.directory.remove_file(&self.file_name) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(io_error(&self.display_path, error)),
        }
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use chrono::{TimeZone, Utc};
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn temp_dir() -> TempDir {
        tempfile::tempdir().expect("temp dir")
    }

    #[rstest]
    fn missing_slot_loads_as_empty(temp_dir: TempDir) {
        let store = FileCredentialStore::open(temp_dir.path().join("session.json")).expect("open");
        assert_eq!(store.load().expect("load"), None);
        store.clear().expect("clearing a missing slot succeeds");
    }

    #[rstest]
    fn persisted_assertion_survives_reopen(temp_dir: TempDir) {
        let path = temp_dir.path().join("nested").join("session.json");
        let expiry = Utc
            .with_ymd_and_hms(2026, 9, 1, 0, 0, 0)
            .single()
            .expect("valid time");
        let assertion = SessionAssertion::new("tok-file", Some(expiry));

        FileCredentialStore::open(&path)
            .expect("open")
            .store(&assertion)
            .expect("store");

        let reopened = FileCredentialStore::open(&path).expect("reopen");
        assert_eq!(reopened.load().expect("load"), Some(assertion));
    }

    #[rstest]
    fn slot_never_contains_identity_claims(temp_dir: TempDir) {
        let path = temp_dir.path().join("session.json");
        let store = FileCredentialStore::open(&path).expect("open");
        store
            .store(&SessionAssertion::new("tok", None))
            .expect("store");

        let raw = std::fs::read_to_string(&path).expect("read slot");
        let json: serde_json::Value = serde_json::from_str(&raw).expect("json slot");
        assert_eq!(json, serde_json::json!({ "token": "tok" }));
    }

    #[rstest]
    fn corrupt_slot_is_reported(temp_dir: TempDir) {
        let path = temp_dir.path().join("session.json");
        std::fs::write(&path, b"{not json").expect("write garbage");

        let store = FileCredentialStore::open(&path).expect("open");
        let err = store.load().expect_err("corrupt slot");
        assert!(matches!(err, CredentialStoreError::Corrupt { .. }));
    }

    #[rstest]
    fn clear_removes_the_file(temp_dir: TempDir) {
        let path = temp_dir.path().join("session.json");
        let store = FileCredentialStore::open(&path).expect("open");
        store
            .store(&SessionAssertion::new("tok", None))
            .expect("store");
        store.clear().expect("clear");
        assert!(!path.exists());
    }
}
