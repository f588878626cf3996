pub mod attachments;
pub mod conversations;
pub mod feed;
pub mod identity;
pub mod store;
pub mod subscription;

use std::sync::Arc;

pub use attachments::{AttachmentUploader, PendingAttachment};
pub use conversations::{ConversationList, filter_by_name};
pub use feed::MessageFeed;
pub use identity::conversation_key;
pub use store::MessageStore;
pub use subscription::Subscription;

use crate::config::MessagingConfig;
use crate::storage::{CollectionPath, DocumentPath, DocumentStore};

/// Where conversations and their messages live in the document store.
#[derive(Debug, Clone)]
pub struct Collections {
    pub conversations: CollectionPath,
    pub messages: String,
}

impl Collections {
    pub fn from_config(config: &MessagingConfig) -> Self {
        Self {
            conversations: CollectionPath::new(config.conversations_collection.clone()),
            messages: config.messages_collection.clone(),
        }
    }

    pub fn conversation(&self, key: &str) -> DocumentPath {
        self.conversations.doc(key)
    }

    pub fn messages(&self, key: &str) -> CollectionPath {
        self.conversation(key).subcollection(&self.messages)
    }
}

/// The messaging operations exposed to the UI, sharing one store handle.
#[derive(Clone)]
pub struct Messenger {
    pub messages: MessageStore,
    pub conversations: ConversationList,
    pub feed: MessageFeed,
}

impl Messenger {
    pub fn new(store: Arc<dyn DocumentStore>, config: &MessagingConfig) -> Self {
        Self {
            messages: MessageStore::new(Arc::clone(&store), config),
            conversations: ConversationList::new(Arc::clone(&store), config),
            feed: MessageFeed::new(store, config),
        }
    }
}
