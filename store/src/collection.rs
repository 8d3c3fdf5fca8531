use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;

use crate::error::Error;
use crate::record::HasMeta;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

#[derive(Clone, Debug)]
pub struct ChangeEvent {
    pub id: Uuid,
    pub kind: ChangeKind,
}

const CHANGE_FEED_CAPACITY: usize = 256;

/// A single typed collection: `create`/`get_by_id`/`update`/`delete`/`list`
/// over an in-memory map, guarded by an `RwLock` and emitting a
/// `broadcast` change-feed the reconciler subscribes to in order to wake
/// between ticks. This is the concrete realization of spec §4.1's Record
/// Store contract — the store never caches anything the caller doesn't
/// explicitly hold, and every mutation is conditioned on the record's
/// version.
#[derive(Clone)]
pub struct Collection<T> {
    inner: Arc<RwLock<HashMap<Uuid, T>>>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Collection<T> {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            changes: tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    fn notify(&self, id: Uuid, kind: ChangeKind) {
        // No receivers is not an error: the reconciler may be mid-tick.
        let _ = self.changes.send(ChangeEvent { id, kind });
    }
}

impl<T> Collection<T>
where
    T: HasMeta + Clone + Send + Sync + 'static,
{
    pub async fn create(&self, mut record: T) -> Result<T, Error> {
        let id = record.id();
        record.meta_mut().version = 0;
        let mut guard = self.inner.write().await;
        if guard.contains_key(&id) {
            return Err(Error::Validation(format!("record {id} already exists")));
        }
        guard.insert(id, record.clone());
        drop(guard);
        self.notify(id, ChangeKind::Created);
        Ok(record)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<T, Error> {
        self.inner.read().await.get(&id).cloned().ok_or(Error::NotFound)
    }

    pub async fn list(&self) -> Vec<T> {
        self.inner.read().await.values().cloned().collect()
    }

    pub async fn list_where(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.inner
            .read()
            .await
            .values()
            .filter(|r| pred(r))
            .cloned()
            .collect()
    }

    /// Applies `patch` to the record at `id`, rejecting with
    /// `Error::Conflict` if `expected_version` does not match the record's
    /// current version. `patch`'s return value is threaded back to the
    /// caller alongside the updated record.
    pub async fn update<R>(
        &self,
        id: Uuid,
        expected_version: u64,
        patch: impl FnOnce(&mut T) -> R,
    ) -> Result<(T, R), Error> {
        let mut guard = self.inner.write().await;
        let record = guard.get_mut(&id).ok_or(Error::NotFound)?;
        if record.version() != expected_version {
            return Err(Error::Conflict);
        }
        let result = patch(record);
        record.meta_mut().version += 1;
        record.meta_mut().updated_at = chrono::Utc::now();
        let updated = record.clone();
        drop(guard);
        self.notify(id, ChangeKind::Updated);
        Ok((updated, result))
    }

    pub async fn delete(&self, id: Uuid, expected_version: u64) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        match guard.get(&id) {
            None => return Err(Error::NotFound),
            Some(r) if r.version() != expected_version => return Err(Error::Conflict),
            Some(_) => {}
        }
        guard.remove(&id);
        drop(guard);
        self.notify(id, ChangeKind::Deleted);
        Ok(())
    }
}
