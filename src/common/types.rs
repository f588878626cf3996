use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What an attachment holds, as shown by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    File,
}

/// A file attached to a message. `url` always points at durable storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    pub size: u64,
}

/// Creation or activity time of a record.
///
/// `Pending` carries a local clock reading used until the store has assigned
/// the server time; the next snapshot replaces it with `Resolved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timestamp {
    Pending(DateTime<Utc>),
    Resolved(DateTime<Utc>),
}

impl Timestamp {
    pub fn from_server(server_time: Option<DateTime<Utc>>) -> Self {
        match server_time {
            Some(time) => Timestamp::Resolved(time),
            None => Timestamp::Pending(Utc::now()),
        }
    }

    pub fn instant(&self) -> DateTime<Utc> {
        match self {
            Timestamp::Pending(time) | Timestamp::Resolved(time) => *time,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Timestamp::Pending(_))
    }
}

/// One row of the conversation list, seen from the subscribing user.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationSummary {
    pub id: String,
    pub participant_id: String,
    pub participant_name: String,
    pub last_message: String,
    pub last_message_time: Timestamp,
    pub unread_count: u64,
}

/// One message of a conversation feed.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub content: String,
    pub attachments: Vec<Attachment>,
    pub created_at: Timestamp,
    pub read: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_from_server() {
        let now = Utc::now();
        assert_eq!(Timestamp::from_server(Some(now)), Timestamp::Resolved(now));

        let pending = Timestamp::from_server(None);
        assert!(pending.is_pending());
        assert!(pending.instant() >= now);
    }

    #[test]
    fn test_attachment_wire_shape() {
        let attachment = Attachment {
            name: "notes.pdf".to_string(),
            url: "https://files.example/notes.pdf".to_string(),
            kind: AttachmentKind::File,
            size: 2048,
        };
        let value = serde_json::to_value(&attachment).unwrap();
        assert_eq!(value["type"], "file");
        assert_eq!(value["size"], 2048);

        let decoded: Attachment = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, attachment);
    }
}
