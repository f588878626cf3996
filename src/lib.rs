//! Real-time one-to-one messaging on top of a document store.
//!
//! Conversations are keyed by their participant pair, carry a denormalized
//! summary with per-participant unread counters, and are read through live
//! [`Subscription`] streams.

pub mod common;
pub mod config;
pub mod error;
pub mod messaging;
pub mod storage;

pub use common::{Attachment, AttachmentKind, ChatMessage, ConversationSummary, Timestamp};
pub use config::MessagingConfig;
pub use error::{MessagingError, Result, StoreError};
pub use messaging::{
    AttachmentUploader, ConversationList, MessageFeed, MessageStore, Messenger, PendingAttachment,
    Subscription, conversation_key,
};
pub use storage::{DocumentStore, FsObjectStore, ObjectStore, SqliteDocumentStore};
