//! Persistence seam and an in-memory implementation.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::RepositoryError;
use crate::types::{Album, Collection, PublicationRecord, Resolved, Settings};

/// Document storage used by the core.
///
/// Album and collection writes are atomic per document.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Load the settings singleton, `None` if never written.
    async fn load_settings(&self) -> Result<Option<Settings>, RepositoryError>;

    async fn save_settings(&self, settings: &Settings) -> Result<(), RepositoryError>;

    /// Write `defaults` unless settings already exist, as one atomic step.
    ///
    /// Returns true when the defaults were written.
    async fn init_settings_if_absent(&self, defaults: &Settings) -> Result<bool, RepositoryError>;

    async fn list_allowed(&self, destination: i64) -> Result<Vec<i64>, RepositoryError>;

    async fn is_allowed(&self, destination: i64, user: i64) -> Result<bool, RepositoryError>;

    /// Returns false if the user was already allow-listed.
    async fn add_allowed(&self, destination: i64, user: i64) -> Result<bool, RepositoryError>;

    /// Returns false if the user was not allow-listed.
    async fn remove_allowed(&self, destination: i64, user: i64) -> Result<bool, RepositoryError>;

    async fn insert_album(&self, album: &Album) -> Result<(), RepositoryError>;

    /// Child albums must be inserted first.
    async fn insert_collection(&self, collection: &Collection) -> Result<(), RepositoryError>;

    /// Resolve a key to an album or collection in one lookup.
    async fn find_by_key(&self, key: &str) -> Result<Option<Resolved>, RepositoryError>;

    /// Remember posted messages so their deletion survives a restart.
    async fn record_publication(
        &self,
        key: &str,
        destination: i64,
        message_ids: &[i32],
        published_at: DateTime<Utc>,
        delete_at: DateTime<Utc>,
    ) -> Result<i64, RepositoryError>;

    /// Publications whose messages have not been deleted yet.
    async fn pending_publications(&self) -> Result<Vec<PublicationRecord>, RepositoryError>;

    async fn complete_publication(&self, id: i64) -> Result<(), RepositoryError>;
}

#[derive(Debug, Default)]
struct MemoryState {
    settings: Option<Settings>,
    allowed: HashMap<i64, BTreeSet<i64>>,
    albums: HashMap<String, Album>,
    collections: HashMap<String, Collection>,
    publications: Vec<(PublicationRecord, bool)>,
}

/// Repository kept entirely in process memory.
///
/// Used by tests and dry runs. [`MemoryRepository::set_unavailable`] makes
/// every call fail, to exercise error paths.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: Mutex<MemoryState>,
    unavailable: AtomicBool,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored albums, including collection children.
    pub fn album_count(&self) -> usize {
        self.lock().albums.len()
    }

    pub fn collection_count(&self) -> usize {
        self.lock().collections.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check(&self) -> Result<(), RepositoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable(
                "memory repository switched off".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn load_settings(&self) -> Result<Option<Settings>, RepositoryError> {
        self.check()?;
        Ok(self.lock().settings.clone())
    }

    async fn save_settings(&self, settings: &Settings) -> Result<(), RepositoryError> {
        self.check()?;
        self.lock().settings = Some(settings.clone());
        Ok(())
    }

    async fn init_settings_if_absent(&self, defaults: &Settings) -> Result<bool, RepositoryError> {
        self.check()?;
        let mut inner = self.lock();
        if inner.settings.is_some() {
            return Ok(false);
        }
        inner.settings = Some(defaults.clone());
        Ok(true)
    }

    async fn list_allowed(&self, destination: i64) -> Result<Vec<i64>, RepositoryError> {
        self.check()?;
        Ok(self
            .lock()
            .allowed
            .get(&destination)
            .map(|users| users.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn is_allowed(&self, destination: i64, user: i64) -> Result<bool, RepositoryError> {
        self.check()?;
        Ok(self
            .lock()
            .allowed
            .get(&destination)
            .is_some_and(|users| users.contains(&user)))
    }

    async fn add_allowed(&self, destination: i64, user: i64) -> Result<bool, RepositoryError> {
        self.check()?;
        Ok(self
            .lock()
            .allowed
            .entry(destination)
            .or_default()
            .insert(user))
    }

    async fn remove_allowed(&self, destination: i64, user: i64) -> Result<bool, RepositoryError> {
        self.check()?;
        Ok(self
            .lock()
            .allowed
            .get_mut(&destination)
            .is_some_and(|users| users.remove(&user)))
    }

    async fn insert_album(&self, album: &Album) -> Result<(), RepositoryError> {
        self.check()?;
        self.lock().albums.insert(album.key.clone(), album.clone());
        Ok(())
    }

    async fn insert_collection(&self, collection: &Collection) -> Result<(), RepositoryError> {
        self.check()?;
        self.lock()
            .collections
            .insert(collection.key.clone(), collection.clone());
        Ok(())
    }

    async fn find_by_key(&self, key: &str) -> Result<Option<Resolved>, RepositoryError> {
        self.check()?;
        let state = self.lock();
        if let Some(album) = state.albums.get(key) {
            return Ok(Some(Resolved::Album(album.clone())));
        }
        Ok(state
            .collections
            .get(key)
            .map(|collection| Resolved::Collection(collection.clone())))
    }

    async fn record_publication(
        &self,
        key: &str,
        destination: i64,
        message_ids: &[i32],
        _published_at: DateTime<Utc>,
        delete_at: DateTime<Utc>,
    ) -> Result<i64, RepositoryError> {
        self.check()?;
        let mut state = self.lock();
        let id = state.publications.len() as i64 + 1;
        state.publications.push((
            PublicationRecord {
                id,
                key: key.to_string(),
                destination,
                message_ids: message_ids.to_vec(),
                delete_at,
            },
            false,
        ));
        Ok(id)
    }

    async fn pending_publications(&self) -> Result<Vec<PublicationRecord>, RepositoryError> {
        self.check()?;
        let mut pending: Vec<PublicationRecord> = self
            .lock()
            .publications
            .iter()
            .filter(|(_, deleted)| !deleted)
            .map(|(record, _)| record.clone())
            .collect();
        pending.sort_by_key(|record| (record.delete_at, record.id));
        Ok(pending)
    }

    async fn complete_publication(&self, id: i64) -> Result<(), RepositoryError> {
        self.check()?;
        if let Some((_, deleted)) = self
            .lock()
            .publications
            .iter_mut()
            .find(|(record, _)| record.id == id)
        {
            *deleted = true;
        }
        Ok(())
    }
}
