use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::Connection;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::database::{self, Database};
use super::document::{
    CollectionPath, Document, DocumentPath, DocumentStore, FieldWrite, Query, SnapshotStream,
    apply_writes,
};
use super::watch::WatchRegistry;
use crate::config::MessagingConfig;
use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    Create,
    Merge,
    UpdateExisting,
}

/// Document store on top of SQLite.
///
/// Every write is one transaction behind a mutex, so merges and increments on
/// a single document never lose updates. Watches on the written collection
/// are refreshed before the write call returns.
pub struct SqliteDocumentStore {
    db: Mutex<Database>,
    watches: WatchRegistry,
}

impl SqliteDocumentStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Ok(Self::with_database(Database::new(path)?))
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Ok(Self::with_database(Database::in_memory()?))
    }

    pub fn from_config(config: &MessagingConfig) -> Result<Self, StoreError> {
        log::info!("Opening document store at {}", config.database_path);
        Self::open(&config.database_path)
    }

    fn with_database(db: Database) -> Self {
        Self {
            db: Mutex::new(db),
            watches: WatchRegistry::new(),
        }
    }

    /// Reads a single document.
    pub fn get(&self, doc: &DocumentPath) -> Result<Option<Document>, StoreError> {
        let db = self.lock()?;
        let data = database::load_document(db.connection(), doc.collection().as_str(), doc.id())?;
        Ok(data.map(|data| Document {
            id: doc.id().to_string(),
            data,
        }))
    }

    /// Number of live watches.
    pub fn active_watches(&self) -> usize {
        self.watches.active()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Database>, StoreError> {
        self.db.lock().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self, doc: &DocumentPath, writes: &[FieldWrite], mode: WriteMode) -> Result<(), StoreError> {
        let collection = doc.collection().as_str();
        let mut db = self.lock()?;

        let tx = db.connection_mut().transaction()?;
        let existing = database::load_document(&tx, collection, doc.id())?;
        let mut data = match (existing, mode) {
            (Some(data), WriteMode::Merge | WriteMode::UpdateExisting) => data,
            (None, WriteMode::UpdateExisting) => return Err(StoreError::NotFound(doc.to_string())),
            _ => Value::Object(Map::new()),
        };
        apply_writes(&mut data, writes, Utc::now().timestamp_millis());
        database::save_document(&tx, collection, doc.id(), &data)?;
        tx.commit()?;

        log::trace!("Wrote {doc} ({} fields)", writes.len());
        self.notify(db.connection(), doc.collection());
        Ok(())
    }

    fn notify(&self, conn: &Connection, collection: &CollectionPath) {
        for (id, query) in self.watches.watching(collection) {
            self.watches.deliver(id, run_query(conn, &query));
        }
    }
}

fn run_query(conn: &Connection, query: &Query) -> Result<Vec<Document>, StoreError> {
    let docs = database::list_collection(conn, query.collection.as_str())?;
    Ok(query.apply(docs))
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn upsert_merge(&self, doc: &DocumentPath, writes: &[FieldWrite]) -> Result<(), StoreError> {
        self.write(doc, writes, WriteMode::Merge)
    }

    async fn add_record(
        &self,
        collection: &CollectionPath,
        writes: &[FieldWrite],
    ) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        self.write(&collection.doc(id.clone()), writes, WriteMode::Create)?;
        Ok(id)
    }

    async fn update_fields(&self, doc: &DocumentPath, writes: &[FieldWrite]) -> Result<(), StoreError> {
        self.write(doc, writes, WriteMode::UpdateExisting)
    }

    async fn subscribe_query(&self, query: Query) -> Result<SnapshotStream, StoreError> {
        // Registering under the database lock means no write can slip in
        // between the initial snapshot and the first notification.
        let db = self.lock()?;
        let initial = run_query(db.connection(), &query)?;
        Ok(self.watches.register(query, initial))
    }
}
