pub mod database;
pub mod document;
pub mod models;
pub mod object_store;
pub mod sqlite_store;
pub mod watch;

pub use document::{
    CollectionPath, Direction, Document, DocumentPath, DocumentStore, FieldPath, FieldValue,
    FieldWrite, Query, SnapshotStream,
};
pub use object_store::{FsObjectStore, ObjectStore};
pub use sqlite_store::SqliteDocumentStore;
