use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::Error as _;

use super::document::Document;
use crate::common::Attachment;
use crate::error::MessagingError;

/// Persisted conversation summary (`chats/{key}`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    pub participants: Vec<String>,
    #[serde(default)]
    pub participant_names: HashMap<String, String>,
    #[serde(default)]
    pub last_message: String,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub unread_counts: HashMap<String, u64>,
}

impl ConversationRecord {
    /// Decodes a conversation; the participant list must hold two distinct ids.
    pub fn decode(collection: &str, doc: &Document) -> Result<Self, MessagingError> {
        let record: Self = decode_body(collection, doc)?;
        let distinct_pair = matches!(record.participants.as_slice(), [a, b] if a != b);
        if !distinct_pair {
            return Err(MessagingError::MalformedRecord {
                path: format!("{collection}/{}", doc.id),
                source: serde_json::Error::custom(format!(
                    "expected two distinct participants, found {:?}",
                    record.participants
                )),
            });
        }
        Ok(record)
    }

    pub fn includes(&self, user_id: &str) -> bool {
        self.participants.iter().any(|id| id == user_id)
    }

    /// The participant that is not `user_id`.
    pub fn other_participant(&self, user_id: &str) -> Option<&str> {
        self.participants
            .iter()
            .find(|id| id.as_str() != user_id)
            .map(String::as_str)
    }

    pub fn unread_for(&self, user_id: &str) -> u64 {
        self.unread_counts.get(user_id).copied().unwrap_or(0)
    }
}

/// Persisted message (`chats/{key}/messages/{id}`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub sender_id: String,
    pub sender_name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// `None` until the server timestamp has been assigned.
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub read: bool,
}

impl MessageRecord {
    pub fn decode(collection: &str, doc: &Document) -> Result<Self, MessagingError> {
        decode_body(collection, doc)
    }
}

fn decode_body<T>(collection: &str, doc: &Document) -> Result<T, MessagingError>
where
    T: for<'de> Deserialize<'de>,
{
    T::deserialize(&doc.data).map_err(|source| MessagingError::MalformedRecord {
        path: format!("{collection}/{}", doc.id),
        source,
    })
}
