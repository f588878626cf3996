use std::sync::Arc;

use super::Collections;
use super::subscription::Subscription;
use crate::common::{ConversationSummary, Timestamp};
use crate::config::MessagingConfig;
use crate::error::Result;
use crate::storage::models::ConversationRecord;
use crate::storage::{Direction, Document, DocumentStore, Query};

/// Live list of a user's conversations, most recent activity first.
#[derive(Clone)]
pub struct ConversationList {
    store: Arc<dyn DocumentStore>,
    collections: Collections,
    placeholder_name: String,
}

impl ConversationList {
    pub fn new(store: Arc<dyn DocumentStore>, config: &MessagingConfig) -> Self {
        Self {
            store,
            collections: Collections::from_config(config),
            placeholder_name: config.placeholder_name.clone(),
        }
    }

    pub async fn subscribe(&self, user_id: &str) -> Result<Subscription<Vec<ConversationSummary>>> {
        let query = Query::collection(self.collections.conversations.clone())
            .array_contains("participants", user_id)
            .order_by("updatedAt", Direction::Descending);
        let snapshots = self.store.subscribe_query(query).await?;
        log::debug!("Watching conversations of {user_id}");

        let user_id = user_id.to_string();
        let collection = self.collections.conversations.to_string();
        let placeholder = self.placeholder_name.clone();
        Ok(Subscription::new(snapshots, move |docs| {
            project(&collection, &user_id, &placeholder, docs)
        }))
    }
}

fn project(
    collection: &str,
    user_id: &str,
    placeholder: &str,
    docs: Vec<Document>,
) -> Result<Vec<ConversationSummary>> {
    let mut summaries = Vec::with_capacity(docs.len());
    for doc in docs {
        let record = ConversationRecord::decode(collection, &doc)?;
        if !record.includes(user_id) {
            continue;
        }
        let Some(other) = record.other_participant(user_id) else {
            continue;
        };
        let participant_name = record
            .participant_names
            .get(other)
            .cloned()
            .unwrap_or_else(|| placeholder.to_string());

        summaries.push(ConversationSummary {
            participant_id: other.to_string(),
            participant_name,
            unread_count: record.unread_for(user_id),
            last_message_time: Timestamp::from_server(record.updated_at),
            last_message: record.last_message,
            id: doc.id,
        });
    }
    Ok(summaries)
}

/// Conversations whose participant name contains `query`, ignoring case.
/// A blank query keeps everything.
pub fn filter_by_name<'a>(
    conversations: &'a [ConversationSummary],
    query: &str,
) -> Vec<&'a ConversationSummary> {
    let needle = query.trim().to_lowercase();
    conversations
        .iter()
        .filter(|conversation| conversation.participant_name.to_lowercase().contains(&needle))
        .collect()
}
