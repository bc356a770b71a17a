// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Persisted per-user club selection.

use dashmap::DashMap;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::models::Club;

/// Storage key of the selected club for `user_id`.
pub fn selection_key(user_id: &str) -> String {
    format!("selectedClubId:{user_id}")
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Selection store I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Selection store {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Small string key/value store.
pub trait SelectionStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError>;
    /// Store `value`, or remove the key when `None`.
    fn save(&self, key: &str, value: Option<&str>) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemorySelectionStore {
    values: DashMap<String, String>,
}

impl MemorySelectionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SelectionStore for MemorySelectionStore {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.get(key).map(|v| v.clone()))
    }

    fn save(&self, key: &str, value: Option<&str>) -> Result<(), StoreError> {
        match value {
            Some(v) => {
                self.values.insert(key.to_string(), v.to_string());
            }
            None => {
                self.values.remove(key);
            }
        }
        Ok(())
    }
}

/// JSON object on disk, rewritten in full on every save.
#[derive(Debug)]
pub struct FileSelectionStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSelectionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        serde_json::from_str(&data).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn write_all(&self, values: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(values).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        // Readers only ever see a complete file.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)
    }
}

impl SelectionStore for FileSelectionStore {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        Ok(self.read_all()?.remove(key))
    }

    fn save(&self, key: &str, value: Option<&str>) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut values = self.read_all()?;
        match value {
            Some(v) => values.insert(key.to_string(), v.to_string()),
            None => values.remove(key),
        };
        self.write_all(&values)
    }
}

/// The club the dashboard is currently showing for one user.
pub struct ClubSelection {
    user_id: String,
    store: Arc<dyn SelectionStore>,
    selected: Option<String>,
}

impl ClubSelection {
    /// Start from the stored selection. A store that cannot be read starts empty.
    pub fn new(user_id: impl Into<String>, store: Arc<dyn SelectionStore>) -> Self {
        let mut selection = Self {
            user_id: user_id.into(),
            store,
            selected: None,
        };
        selection.selected = selection.stored();
        selection
    }

    fn stored(&self) -> Option<String> {
        match self.store.load(&selection_key(&self.user_id)) {
            Ok(selected) => selected,
            Err(e) => {
                tracing::warn!(user_id = %self.user_id, error = %e, "Failed to load club selection");
                None
            }
        }
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Reconcile with the user's current club list: keep the selection if the
    /// club is still there, else fall back to the first club. An empty list
    /// selects nothing but leaves the stored choice in place, so it comes
    /// back once the clubs do.
    pub fn reconcile(&mut self, clubs: &[Club]) -> Option<&str> {
        if clubs.is_empty() {
            self.selected = None;
            return None;
        }
        if self.selected.is_none() {
            self.selected = self.stored();
        }
        let keep = self
            .selected
            .as_deref()
            .is_some_and(|id| clubs.iter().any(|c| c.id == id));
        if !keep {
            let fallback = clubs.first().map(|c| c.id.clone());
            if let Err(e) = self.select(fallback) {
                tracing::warn!(user_id = %self.user_id, error = %e, "Failed to persist club selection");
            }
        }
        self.selected()
    }

    /// Change the selection and persist it.
    pub fn select(&mut self, club_id: Option<String>) -> Result<(), StoreError> {
        if club_id == self.selected {
            return Ok(());
        }
        tracing::info!(user_id = %self.user_id, club = ?club_id, "Club selected");
        self.selected = club_id;
        self.store
            .save(&selection_key(&self.user_id), self.selected.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn club(id: &str) -> Club {
        Club {
            id: id.into(),
            name: format!("Club {id}"),
            city: "Lisbon".into(),
            address: "Rua 1".into(),
            admins: vec!["u1".into()],
            website: None,
            phone: None,
            email: None,
            description: None,
            logo_url: None,
            background_url: None,
            allow_registration: None,
            coordinates: None,
        }
    }

    #[test]
    fn test_stored_club_is_kept() {
        let store = Arc::new(MemorySelectionStore::new());
        store.save(&selection_key("u1"), Some("b")).unwrap();

        let mut selection = ClubSelection::new("u1", store);
        assert_eq!(selection.reconcile(&[club("a"), club("b")]), Some("b"));
    }

    #[test]
    fn test_falls_back_to_first_club_and_persists() {
        let store = Arc::new(MemorySelectionStore::new());
        store.save(&selection_key("u1"), Some("gone")).unwrap();

        let mut selection = ClubSelection::new("u1", store.clone());
        assert_eq!(selection.reconcile(&[club("a"), club("b")]), Some("a"));
        assert_eq!(store.load(&selection_key("u1")).unwrap(), Some("a".into()));
    }

    #[test]
    fn test_empty_club_list_keeps_stored_choice() {
        let store = Arc::new(MemorySelectionStore::new());
        store.save(&selection_key("u1"), Some("b")).unwrap();

        let mut selection = ClubSelection::new("u1", store.clone());
        assert_eq!(selection.reconcile(&[]), None);
        assert_eq!(selection.selected(), None);
        assert_eq!(store.load(&selection_key("u1")).unwrap(), Some("b".into()));

        assert_eq!(selection.reconcile(&[club("a"), club("b")]), Some("b"));
    }

    #[test]
    fn test_explicit_clear_is_persisted() {
        let store = Arc::new(MemorySelectionStore::new());
        let mut selection = ClubSelection::new("u1", store.clone());
        selection.select(Some("a".into())).unwrap();
        selection.select(None).unwrap();
        assert_eq!(store.load(&selection_key("u1")).unwrap(), None);
    }

    #[test]
    fn test_file_store_round_trip() {
        let path = std::env::temp_dir().join(format!(
            "club-dashboard-selection-{}.json",
            std::process::id()
        ));
        let _ = fs::remove_file(&path);

        let store = FileSelectionStore::new(&path);
        assert_eq!(store.load("selectedClubId:u1").unwrap(), None);
        store.save("selectedClubId:u1", Some("c1")).unwrap();
        store.save("selectedClubId:u2", Some("c2")).unwrap();

        let reopened = FileSelectionStore::new(&path);
        assert_eq!(reopened.load("selectedClubId:u1").unwrap(), Some("c1".into()));
        assert_eq!(reopened.load("selectedClubId:u2").unwrap(), Some("c2".into()));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let path = std::env::temp_dir().join(format!(
            "club-dashboard-corrupt-{}.json",
            std::process::id()
        ));
        fs::write(&path, "not json").unwrap();

        let store = FileSelectionStore::new(&path);
        assert!(matches!(store.load("k"), Err(StoreError::Corrupt { .. })));

        let _ = fs::remove_file(&path);
    }
}
