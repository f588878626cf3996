use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use std::fs;
use std::path::Path;

use super::document::Document;
use crate::error::StoreError;

/// SQLite connection holding every collection in one `documents` table.
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS documents (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                collection TEXT NOT NULL,
                doc_id TEXT NOT NULL,
                data TEXT NOT NULL,
                updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
                UNIQUE (collection, doc_id)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection, seq)",
            [],
        )?;

        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

/// Body of one document, if present.
pub fn load_document(
    conn: &Connection,
    collection: &str,
    doc_id: &str,
) -> Result<Option<Value>, StoreError> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT data FROM documents WHERE collection = ?1 AND doc_id = ?2",
            params![collection, doc_id],
            |row| row.get(0),
        )
        .optional()?;

    match raw {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Inserts or replaces a document body. An existing row keeps its position
/// in the collection's insertion order.
pub fn save_document(
    conn: &Connection,
    collection: &str,
    doc_id: &str,
    data: &Value,
) -> Result<(), StoreError> {
    let raw = serde_json::to_string(data)?;
    conn.execute(
        "INSERT INTO documents (collection, doc_id, data)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(collection, doc_id) DO UPDATE SET
            data = excluded.data,
            updated_at = strftime('%s', 'now')",
        params![collection, doc_id, raw],
    )?;
    Ok(())
}

/// Every document of a collection, in insertion order.
pub fn list_collection(conn: &Connection, collection: &str) -> Result<Vec<Document>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT doc_id, data
         FROM documents
         WHERE collection = ?1
         ORDER BY seq ASC",
    )?;

    let rows = stmt
        .query_map(params![collection], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter()
        .map(|(id, raw)| -> Result<Document, StoreError> {
            Ok(Document {
                id,
                data: serde_json::from_str(&raw)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_crud() {
        let db = Database::in_memory().unwrap();
        let conn = db.connection();

        assert!(load_document(conn, "chats", "a_b").unwrap().is_none());

        save_document(conn, "chats", "a_b", &json!({ "lastMessage": "hi" })).unwrap();
        assert_eq!(
            load_document(conn, "chats", "a_b").unwrap(),
            Some(json!({ "lastMessage": "hi" }))
        );

        save_document(conn, "chats", "a_b", &json!({ "lastMessage": "bye" })).unwrap();
        assert_eq!(
            load_document(conn, "chats", "a_b").unwrap(),
            Some(json!({ "lastMessage": "bye" }))
        );
    }

    #[test]
    fn test_list_keeps_insertion_order_across_updates() {
        let db = Database::in_memory().unwrap();
        let conn = db.connection();

        save_document(conn, "chats", "z", &json!({ "n": 1 })).unwrap();
        save_document(conn, "chats", "a", &json!({ "n": 2 })).unwrap();
        save_document(conn, "other", "m", &json!({ "n": 3 })).unwrap();
        save_document(conn, "chats", "z", &json!({ "n": 4 })).unwrap();

        let docs = list_collection(conn, "chats").unwrap();
        let ids: Vec<_> = docs.iter().map(|doc| doc.id.as_str()).collect();
        assert_eq!(ids, ["z", "a"]);
        assert_eq!(docs[0].data, json!({ "n": 4 }));
    }
}
