use std::sync::Arc;

use super::Collections;
use super::identity::conversation_key;
use super::store::MessageStore;
use super::subscription::Subscription;
use crate::common::{ChatMessage, Timestamp};
use crate::config::MessagingConfig;
use crate::error::Result;
use crate::storage::models::MessageRecord;
use crate::storage::{Direction, Document, DocumentStore, Query};

/// Live message history of one conversation, oldest first.
///
/// Messages whose server timestamp has not been assigned yet carry
/// [`Timestamp::Pending`] and sort after resolved ones until it arrives.
#[derive(Clone)]
pub struct MessageFeed {
    store: Arc<dyn DocumentStore>,
    collections: Collections,
    messages: MessageStore,
}

impl MessageFeed {
    pub fn new(store: Arc<dyn DocumentStore>, config: &MessagingConfig) -> Self {
        Self {
            messages: MessageStore::new(Arc::clone(&store), config),
            collections: Collections::from_config(config),
            store,
        }
    }

    pub async fn subscribe(&self, user_a: &str, user_b: &str) -> Result<Subscription<Vec<ChatMessage>>> {
        let key = conversation_key(user_a, user_b);
        let collection = self.collections.messages(&key);
        let query = Query::collection(collection.clone()).order_by("createdAt", Direction::Ascending);
        let snapshots = self.store.subscribe_query(query).await?;
        log::debug!("Watching messages of {key}");

        let collection = collection.to_string();
        Ok(Subscription::new(snapshots, move |docs| project(&collection, docs)))
    }

    /// Subscribes to the conversation with `other_id`, then marks it read
    /// for `reader_id`.
    pub async fn open(&self, reader_id: &str, other_id: &str) -> Result<Subscription<Vec<ChatMessage>>> {
        let feed = self.subscribe(reader_id, other_id).await?;
        self.messages.mark_read(reader_id, other_id, reader_id).await?;
        Ok(feed)
    }
}

fn project(collection: &str, docs: Vec<Document>) -> Result<Vec<ChatMessage>> {
    docs.into_iter()
        .map(|doc| {
            let record = MessageRecord::decode(collection, &doc)?;
            Ok(ChatMessage {
                id: doc.id,
                sender_id: record.sender_id,
                sender_name: record.sender_name,
                content: record.content,
                attachments: record.attachments,
                created_at: Timestamp::from_server(record.created_at),
                read: record.read,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Attachment, AttachmentKind};
    use crate::error::{MessagingError, StoreError};
    use crate::storage::{CollectionPath, FieldWrite, SqliteDocumentStore};
    use futures::StreamExt;
    use serde_json::{Value, json};

    struct Fixture {
        store: Arc<SqliteDocumentStore>,
        messages: MessageStore,
        feed: MessageFeed,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(SqliteDocumentStore::in_memory().unwrap());
        let config = MessagingConfig::default();
        Fixture {
            messages: MessageStore::new(store.clone(), &config),
            feed: MessageFeed::new(store.clone(), &config),
            store,
        }
    }

    async fn next(sub: &mut Subscription<Vec<ChatMessage>>) -> Vec<ChatMessage> {
        sub.next().await.unwrap().unwrap()
    }

    fn messages_of(key: &str) -> CollectionPath {
        CollectionPath::new("chats").doc(key).subcollection("messages")
    }

    #[tokio::test]
    async fn test_feed_delivers_full_history_in_order() {
        let f = fixture();
        let mut feed = f.feed.subscribe("bob", "alice").await.unwrap();
        assert!(next(&mut feed).await.is_empty());

        f.messages.send("alice", "Alice", "bob", "Bob", "first", vec![]).await.unwrap();
        assert_eq!(next(&mut feed).await.len(), 1);
        f.messages.send("bob", "Bob", "alice", "Alice", "second", vec![]).await.unwrap();

        let history = next(&mut feed).await;
        let contents: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["first", "second"]);
        assert_eq!(history[0].sender_id, "alice");
        assert_eq!(history[1].sender_name, "Bob");
        assert!(history.iter().all(|m| !m.read && m.attachments.is_empty()));
        assert!(history.iter().all(|m| !m.created_at.is_pending()));
        assert!(history[0].created_at.instant() <= history[1].created_at.instant());
    }

    #[tokio::test]
    async fn test_feed_carries_attachments() {
        let f = fixture();
        let attachment = Attachment {
            name: "essay.pdf".to_string(),
            url: "https://files.example/essay.pdf".to_string(),
            kind: AttachmentKind::File,
            size: 4096,
        };
        f.messages
            .send("alice", "Alice", "bob", "Bob", "", vec![attachment.clone()])
            .await
            .unwrap();

        let mut feed = f.feed.subscribe("alice", "bob").await.unwrap();
        let history = next(&mut feed).await;
        assert_eq!(history[0].attachments, vec![attachment]);
        assert!(history[0].content.is_empty());
    }

    #[tokio::test]
    async fn test_pending_timestamp_resolves_on_next_snapshot() {
        let f = fixture();
        let collection = messages_of("alice_bob");
        f.messages.send("alice", "Alice", "bob", "Bob", "resolved", vec![]).await.unwrap();
        let echo = f
            .store
            .add_record(
                &collection,
                &[
                    FieldWrite::set("senderId", "bob"),
                    FieldWrite::set("senderName", "Bob"),
                    FieldWrite::set("content", "local echo"),
                    FieldWrite::set("createdAt", Value::Null),
                ],
            )
            .await
            .unwrap();
        f.messages.send("alice", "Alice", "bob", "Bob", "later", vec![]).await.unwrap();

        let mut feed = f.feed.subscribe("alice", "bob").await.unwrap();
        let history = next(&mut feed).await;
        let contents: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["resolved", "later", "local echo"]);
        assert!(history[2].created_at.is_pending());

        f.store
            .update_fields(&collection.doc(echo), &[FieldWrite::server_timestamp("createdAt")])
            .await
            .unwrap();
        let history = next(&mut feed).await;
        let echoed = history.iter().find(|m| m.content == "local echo").unwrap();
        assert!(!echoed.created_at.is_pending());
        assert!(history.windows(2).all(|w| w[0].created_at.instant() <= w[1].created_at.instant()));
    }

    #[tokio::test]
    async fn test_open_marks_conversation_read() {
        let f = fixture();
        f.messages.send("alice", "Alice", "bob", "Bob", "one", vec![]).await.unwrap();
        f.messages.send("alice", "Alice", "bob", "Bob", "two", vec![]).await.unwrap();

        let mut feed = f.feed.open("bob", "alice").await.unwrap();
        assert_eq!(next(&mut feed).await.len(), 2);

        let summary = f
            .store
            .get(&CollectionPath::new("chats").doc("alice_bob"))
            .unwrap()
            .unwrap();
        assert_eq!(summary.data["unreadCounts"]["bob"], 0);
    }

    #[tokio::test]
    async fn test_open_without_conversation_fails() {
        let f = fixture();
        let err = f.feed.open("bob", "alice").await.err().unwrap();
        assert!(matches!(
            err,
            MessagingError::StoreUnavailable(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_message_surfaces_typed_error() {
        let f = fixture();
        f.store
            .add_record(&messages_of("alice_bob"), &[FieldWrite::set("content", json!(42))])
            .await
            .unwrap();

        let mut feed = f.feed.subscribe("alice", "bob").await.unwrap();
        let err = feed.next().await.unwrap().unwrap_err();
        assert!(matches!(err, MessagingError::MalformedRecord { .. }));
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_updates() {
        let f = fixture();
        let mut feed = f.feed.subscribe("alice", "bob").await.unwrap();
        next(&mut feed).await;

        feed.unsubscribe();
        assert_eq!(f.store.active_watches(), 0);
        f.messages.send("alice", "Alice", "bob", "Bob", "hi", vec![]).await.unwrap();
        assert!(feed.next().await.is_none());
    }
}
