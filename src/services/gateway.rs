use crate::services::error::GatewayError;
use crate::services::staging::{StagedFile, StagingArea};
use crate::services::storage::{ObjectMeta, ObjectStore, filter_by_suffix};
use serde::Serialize;
use std::sync::Arc;
use tokio::io::AsyncRead;
use utoipa::ToSchema;

/// What the client asked for, minus the bytes (those are already staged).
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub original_name: String,
    pub target_folder: Option<String>,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct UploadedFile {
    pub key: String,
    pub location: String,
    pub url: String,
}

/// Object key for an upload: `folder/name`, with exactly one separator added.
pub fn target_key(folder: Option<&str>, original_name: &str) -> String {
    match folder.filter(|f| !f.is_empty()) {
        Some(folder) if folder.ends_with('/') => format!("{}{}", folder, original_name),
        Some(folder) => format!("{}/{}", folder, original_name),
        None => original_name.to_string(),
    }
}

pub struct GatewayService {
    store: Arc<dyn ObjectStore>,
    staging: Arc<StagingArea>,
}

impl GatewayService {
    pub fn new(store: Arc<dyn ObjectStore>, staging: Arc<StagingArea>) -> Self {
        Self { store, staging }
    }

    pub fn store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }

    /// Lists objects under `folder`, keeping only keys ending with `file_type` when given.
    pub async fn list_files(
        &self,
        folder: Option<&str>,
        file_type: Option<&str>,
    ) -> Result<Vec<ObjectMeta>, GatewayError> {
        let prefix = folder.filter(|f| !f.is_empty());
        let objects = self.store.list(prefix).await.map_err(GatewayError::store)?;

        Ok(match file_type.filter(|t| !t.is_empty()) {
            Some(suffix) => filter_by_suffix(objects, suffix),
            None => objects,
        })
    }

    /// The full, unfiltered bucket listing.
    pub async fn retrieve_files(&self) -> Result<Vec<ObjectMeta>, GatewayError> {
        self.list_files(None, None).await
    }

    pub async fn stage_upload<R>(
        &self,
        reader: R,
        original_name: &str,
    ) -> Result<StagedFile, GatewayError>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.staging.stage(reader, original_name).await
    }

    /// Forwards a staged upload to the store. The staged file is released whatever the outcome.
    pub async fn upload(
        &self,
        staged: StagedFile,
        request: UploadRequest,
    ) -> Result<UploadedFile, GatewayError> {
        let key = target_key(request.target_folder.as_deref(), &request.original_name);
        let result = self.forward(&staged, &key, &request.content_type).await;
        self.staging.release(staged);

        let meta = result?;
        tracing::info!("⬆️  Uploaded {} ({} bytes)", meta.key, meta.size);

        Ok(UploadedFile {
            location: self.store.location(&meta.key),
            key: meta.key,
            url: meta.url,
        })
    }

    async fn forward(
        &self,
        staged: &StagedFile,
        key: &str,
        content_type: &str,
    ) -> Result<ObjectMeta, GatewayError> {
        let data = staged.read().await?;
        self.store
            .put(key, data, content_type)
            .await
            .map_err(GatewayError::store)
    }

    /// Deletes `key` without checking that it exists.
    pub async fn delete(&self, key: &str) -> Result<(), GatewayError> {
        self.store.delete(key).await.map_err(GatewayError::store)?;
        tracing::info!("🗑️  Deleted {}", key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_key() {
        assert_eq!(target_key(Some("docs"), "a.txt"), "docs/a.txt");
        assert_eq!(target_key(Some("docs/"), "a.txt"), "docs/a.txt");
        assert_eq!(target_key(Some("a/b"), "c.txt"), "a/b/c.txt");
        assert_eq!(target_key(Some(""), "a.txt"), "a.txt");
        assert_eq!(target_key(None, "a.txt"), "a.txt");
    }
}
