use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use uuid::Uuid;

use crate::common::{Attachment, AttachmentKind};
use crate::storage::ObjectStore;

/// A picked file that has not been uploaded yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAttachment {
    pub name: String,
    pub kind: AttachmentKind,
    pub bytes: Vec<u8>,
}

/// Moves picked files into durable storage before they are sent.
#[derive(Clone)]
pub struct AttachmentUploader {
    objects: Arc<dyn ObjectStore>,
}

impl AttachmentUploader {
    pub fn new(objects: Arc<dyn ObjectStore>) -> Self {
        Self { objects }
    }

    /// Uploads every file concurrently and returns the ones that made it,
    /// in input order. A failed upload is logged and left out.
    pub async fn upload(
        &self,
        sender_id: &str,
        recipient_id: &str,
        pending: Vec<PendingAttachment>,
    ) -> Vec<Attachment> {
        let stamp = Utc::now().timestamp_millis();
        let folder = format!("messages/{}/{}", object_name(sender_id), object_name(recipient_id));
        let uploads = pending.into_iter().map(|file| {
            // Picked files often share a name, so each object gets its own id.
            let path = format!(
                "{folder}/{stamp}_{}_{}",
                Uuid::new_v4().simple(),
                object_name(&file.name)
            );
            async move {
                let size = file.bytes.len() as u64;
                match self.objects.put(&path, file.bytes).await {
                    Ok(url) => Some(Attachment {
                        name: file.name,
                        url,
                        kind: file.kind,
                        size,
                    }),
                    Err(err) => {
                        log::warn!("Skipping attachment {}: upload failed: {err}", file.name);
                        None
                    }
                }
            }
        });

        join_all(uploads).await.into_iter().flatten().collect()
    }
}

/// `name` made safe for use as a single object path segment.
fn object_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    match cleaned.trim() {
        "" | "." | ".." => "file".to_string(),
        trimmed => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Keeps blobs in memory and rejects files named `bad.pdf`.
    #[derive(Default)]
    struct MemoryObjects {
        blobs: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl MemoryObjects {
        fn paths(&self) -> Vec<String> {
            self.blobs.lock().unwrap().keys().cloned().collect()
        }

        fn fetch(&self, url: &str) -> Vec<u8> {
            let path = url.trim_start_matches("https://files.example/");
            self.blobs.lock().unwrap()[path].clone()
        }
    }

    #[async_trait]
    impl ObjectStore for MemoryObjects {
        async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<String, StoreError> {
            if path.ends_with("_bad.pdf") {
                return Err(StoreError::Io(std::io::Error::other("quota exceeded")));
            }
            self.blobs.lock().unwrap().insert(path.to_string(), bytes);
            Ok(format!("https://files.example/{path}"))
        }
    }

    fn pending(name: &str, kind: AttachmentKind, len: usize) -> PendingAttachment {
        PendingAttachment {
            name: name.to_string(),
            kind,
            bytes: vec![7; len],
        }
    }

    #[tokio::test]
    async fn test_upload_returns_durable_attachments_in_order() {
        let objects = Arc::new(MemoryObjects::default());
        let uploader = AttachmentUploader::new(objects.clone());

        let uploaded = uploader
            .upload(
                "alice",
                "bob",
                vec![
                    pending("photo.jpg", AttachmentKind::Image, 3),
                    pending("bad.pdf", AttachmentKind::File, 5),
                    pending("notes.txt", AttachmentKind::File, 8),
                ],
            )
            .await;

        assert_eq!(uploaded.len(), 2);
        assert_eq!(uploaded[0].name, "photo.jpg");
        assert_eq!(uploaded[0].kind, AttachmentKind::Image);
        assert_eq!(uploaded[0].size, 3);
        assert!(uploaded[0].url.starts_with("https://files.example/messages/alice/bob/"));
        assert!(uploaded[0].url.ends_with("_photo.jpg"));
        assert_eq!(uploaded[1].name, "notes.txt");
        assert_eq!(objects.paths().len(), 2);
    }

    #[tokio::test]
    async fn test_same_named_files_keep_their_own_urls() {
        let objects = Arc::new(MemoryObjects::default());
        let uploader = AttachmentUploader::new(objects.clone());
        let file = |bytes: &[u8]| PendingAttachment {
            name: "photo.jpg".to_string(),
            kind: AttachmentKind::Image,
            bytes: bytes.to_vec(),
        };

        let uploaded = uploader
            .upload("alice", "bob", vec![file(b"FIRST"), file(b"SECOND-LONGER")])
            .await;

        assert_eq!(uploaded.len(), 2);
        assert_ne!(uploaded[0].url, uploaded[1].url);
        assert_eq!(objects.fetch(&uploaded[0].url), b"FIRST");
        assert_eq!(objects.fetch(&uploaded[1].url), b"SECOND-LONGER");
        assert_eq!(uploaded[0].size, 5);
    }

    #[tokio::test]
    async fn test_participant_ids_cannot_leave_the_message_folder() {
        let objects = Arc::new(MemoryObjects::default());
        let uploader = AttachmentUploader::new(objects.clone());

        let uploaded = uploader
            .upload(
                "../../escaped",
                "bob",
                vec![pending("x.txt", AttachmentKind::File, 1)],
            )
            .await;

        assert_eq!(uploaded.len(), 1);
        let paths = objects.paths();
        assert!(paths[0].starts_with("messages/.._.._escaped/bob/"), "{}", paths[0]);
        assert!(paths[0].split('/').all(|segment| segment != ".." && segment != "."));
    }

    #[test]
    fn test_object_name_strips_separators() {
        assert_eq!(object_name("a/b\\c.png"), "a_b_c.png");
        assert_eq!(object_name(".."), "file");
        assert_eq!(object_name("  "), "file");
    }
}
