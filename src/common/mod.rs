pub mod types;

pub use types::{Attachment, AttachmentKind, ChatMessage, ConversationSummary, Timestamp};
