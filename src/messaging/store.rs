use std::sync::Arc;

use serde_json::Value;

use super::Collections;
use super::identity::conversation_key;
use crate::common::Attachment;
use crate::config::MessagingConfig;
use crate::error::{MessagingError, Result, StoreError};
use crate::storage::{DocumentStore, FieldPath, FieldWrite};

/// Preview shown for a message that carries only attachments.
pub fn attachment_preview(count: usize) -> String {
    if count == 1 {
        "📎 1 attachment".to_string()
    } else {
        format!("📎 {count} attachments")
    }
}

/// Write side of direct messaging: appends messages and keeps each
/// conversation summary (names, preview, activity time, unread counts) current.
#[derive(Clone)]
pub struct MessageStore {
    store: Arc<dyn DocumentStore>,
    collections: Collections,
    placeholder_name: String,
}

impl MessageStore {
    pub fn new(store: Arc<dyn DocumentStore>, config: &MessagingConfig) -> Self {
        Self {
            store,
            collections: Collections::from_config(config),
            placeholder_name: config.placeholder_name.clone(),
        }
    }

    /// Sends `text` and `attachments` from sender to recipient.
    ///
    /// The conversation summary is merged first: both display names are
    /// rewritten, the preview and activity time replaced and the recipient's
    /// unread counter incremented by one through the store's atomic increment.
    /// The message itself is appended afterwards. If the append fails the
    /// summary is left as written.
    pub async fn send(
        &self,
        sender_id: &str,
        sender_name: &str,
        recipient_id: &str,
        recipient_name: &str,
        text: &str,
        attachments: Vec<Attachment>,
    ) -> Result<()> {
        validate(sender_id, recipient_id, text, &attachments)?;

        let sender_name = self.display_name(sender_name);
        let recipient_name = self.display_name(recipient_name);
        let key = conversation_key(sender_id, recipient_id);
        let conversation = self.collections.conversation(&key);

        let preview = if text.trim().is_empty() {
            attachment_preview(attachments.len())
        } else {
            text.to_string()
        };
        let names = FieldPath::new("participantNames");
        let summary = [
            FieldWrite::set("participants", vec![sender_id, recipient_id]),
            FieldWrite::set(names.clone().child(sender_id), sender_name.as_str()),
            FieldWrite::set(names.child(recipient_id), recipient_name.as_str()),
            FieldWrite::set("lastMessage", preview),
            FieldWrite::server_timestamp("updatedAt"),
            FieldWrite::increment(FieldPath::new("unreadCounts").child(recipient_id), 1),
        ];
        self.store.upsert_merge(&conversation, &summary).await?;

        let mut message = vec![
            FieldWrite::set("senderId", sender_id),
            FieldWrite::set("senderName", sender_name.as_str()),
            FieldWrite::set("content", text),
            FieldWrite::server_timestamp("createdAt"),
            FieldWrite::set("read", false),
        ];
        if !attachments.is_empty() {
            let encoded = serde_json::to_value(&attachments).map_err(StoreError::from)?;
            message.push(FieldWrite::set("attachments", encoded));
        }
        let id = self
            .store
            .add_record(&self.collections.messages(&key), &message)
            .await?;

        log::debug!(
            "Message {id} sent in {key} ({} attachments)",
            attachments.len()
        );
        Ok(())
    }

    /// Resets `reader_id`'s unread counter in the conversation between
    /// `user_a` and `user_b` to zero. The other participant's counter is
    /// never touched.
    pub async fn mark_read(&self, user_a: &str, user_b: &str, reader_id: &str) -> Result<()> {
        let key = conversation_key(user_a, user_b);
        let counter = FieldPath::new("unreadCounts").child(reader_id);
        self.store
            .update_fields(
                &self.collections.conversation(&key),
                &[FieldWrite::set(counter, Value::from(0))],
            )
            .await?;
        log::debug!("Conversation {key} marked read by {reader_id}");
        Ok(())
    }

    fn display_name(&self, name: &str) -> String {
        if name.trim().is_empty() {
            self.placeholder_name.clone()
        } else {
            name.to_string()
        }
    }
}

fn validate(sender_id: &str, recipient_id: &str, text: &str, attachments: &[Attachment]) -> Result<()> {
    if sender_id.trim().is_empty() || recipient_id.trim().is_empty() {
        return Err(MessagingError::InvalidMessage(
            "sender and recipient ids are required".to_string(),
        ));
    }
    if sender_id == recipient_id {
        return Err(MessagingError::InvalidMessage(
            "sender and recipient must differ".to_string(),
        ));
    }
    if text.trim().is_empty() && attachments.is_empty() {
        return Err(MessagingError::InvalidMessage(
            "message needs text or at least one attachment".to_string(),
        ));
    }
    Ok(())
}
