use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use filedock_core::attachment::generate_secure_file_name;
use filedock_store::{task_attachment_key, ObjectStore, StoreError};

/// A file as received from the client.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl UploadFile {
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Where an uploaded file landed and how to fetch it.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub storage_key: String,
    pub file_name: String,
    pub presigned_url: String,
    pub url_expires_at: DateTime<Utc>,
}

/// Attachment-level gateway over an [`ObjectStore`].
#[derive(Clone)]
pub struct AttachmentStorage {
    store: Arc<dyn ObjectStore>,
    url_ttl: Duration,
}

impl AttachmentStorage {
    pub fn new(store: Arc<dyn ObjectStore>, url_ttl: Duration) -> Self {
        Self { store, url_ttl }
    }

    pub fn url_ttl(&self) -> Duration {
        self.url_ttl
    }

    /// Store the bytes under a fresh key and mint the first presigned URL.
    pub async fn upload(
        &self,
        file: &UploadFile,
        task_id: &str,
        user_id: &str,
    ) -> Result<StoredObject, StoreError> {
        let file_name = generate_secure_file_name(&file.file_name, Utc::now().timestamp_millis());
        let object_id = uuid::Uuid::new_v4().to_string();
        let storage_key = task_attachment_key(task_id, &object_id, &file_name);

        self.store
            .put_with_content_type(&storage_key, file.data.clone(), &file.content_type)
            .await?;
        tracing::debug!(key = %storage_key, user_id, bytes = file.size(), "stored attachment object");

        let (presigned_url, url_expires_at) = self.mint_presigned_url(&storage_key).await?;
        Ok(StoredObject {
            storage_key,
            file_name,
            presigned_url,
            url_expires_at,
        })
    }

    pub async fn get_bytes(&self, storage_key: &str) -> Result<Bytes, StoreError> {
        self.store.get(storage_key).await
    }

    /// New presigned URL for `storage_key` and the instant it stops working.
    pub async fn mint_presigned_url(
        &self,
        storage_key: &str,
    ) -> Result<(String, DateTime<Utc>), StoreError> {
        let ttl = chrono::Duration::from_std(self.url_ttl)
            .map_err(|e| StoreError::Internal(format!("url ttl: {e}")))?;
        let expires_at = Utc::now() + ttl;
        let url = self.store.presign_get(storage_key, self.url_ttl).await?;
        Ok((url, expires_at))
    }

    /// Remove the object and confirm it is gone. Backends report success for
    /// absent keys, so a lingering object is only visible through `exists`.
    pub async fn delete(&self, storage_key: &str) -> Result<(), StoreError> {
        self.store.delete(storage_key).await?;
        if self.store.exists(storage_key).await? {
            return Err(StoreError::Internal(format!(
                "object {storage_key} still present after delete"
            )));
        }
        Ok(())
    }
}
