use crate::config::GatewayConfig;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;
use utoipa::ToSchema;

/// Characters escaped in object URLs; `/` stays so folder keys read as paths.
const KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

/// Metadata snapshot of a stored object.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub key: String,
    pub size: i64,
    pub last_modified: DateTime<Utc>,
    pub url: String,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Lists objects whose key starts with `prefix`, or the whole bucket.
    async fn list(&self, prefix: Option<&str>) -> Result<Vec<ObjectMeta>>;

    /// Writes `data` under `key`, replacing any existing object.
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<ObjectMeta>;

    /// Removes `key`. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Checks that the bucket is reachable.
    async fn ping(&self) -> Result<()>;

    /// Store-native location of `key`.
    fn location(&self, key: &str) -> String;
}

/// Keeps the objects whose key ends with `suffix` (case-sensitive).
pub fn filter_by_suffix(objects: Vec<ObjectMeta>, suffix: &str) -> Vec<ObjectMeta> {
    objects
        .into_iter()
        .filter(|object| object.key.ends_with(suffix))
        .collect()
}

/// `https://<bucket>.<storage-domain>/<key>`
pub fn public_url(bucket: &str, storage_domain: &str, key: &str) -> String {
    format!(
        "https://{}.{}/{}",
        bucket,
        storage_domain,
        utf8_percent_encode(key, KEY_ENCODE_SET)
    )
}

fn object_location(bucket: &str, region: &str, endpoint_url: Option<&str>, key: &str) -> String {
    let key = utf8_percent_encode(key, KEY_ENCODE_SET);
    match endpoint_url {
        Some(endpoint) => format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, key),
        None => format!("https://{}.s3.{}.amazonaws.com/{}", bucket, region, key),
    }
}

pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    region: String,
    endpoint_url: Option<String>,
    storage_domain: String,
    follow_pagination: bool,
}

impl S3ObjectStore {
    pub fn new(client: Client, config: &GatewayConfig) -> Self {
        Self {
            client,
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            endpoint_url: config.endpoint_url.clone(),
            storage_domain: config.storage_domain.clone(),
            follow_pagination: config.list_follow_pagination,
        }
    }

    fn to_meta(&self, object: aws_sdk_s3::types::Object) -> Option<ObjectMeta> {
        let key = object.key?;
        let last_modified = object
            .last_modified
            .and_then(|d| DateTime::from_timestamp(d.secs(), d.subsec_nanos()))
            .unwrap_or_default();

        Some(ObjectMeta {
            url: public_url(&self.bucket, &self.storage_domain, &key),
            size: object.size.unwrap_or(0),
            last_modified,
            key,
        })
    }
}

/// What to do after one listing page.
#[derive(Debug, PartialEq, Eq)]
enum NextPage {
    Done,
    Continue(String),
    /// More pages exist but pagination is not followed.
    Truncated,
    /// The store claims more pages but gave nothing to resume from.
    MissingToken,
}

fn next_page(is_truncated: Option<bool>, token: Option<String>, follow: bool) -> NextPage {
    if !is_truncated.unwrap_or(false) {
        return NextPage::Done;
    }
    if !follow {
        return NextPage::Truncated;
    }
    match token {
        Some(token) => NextPage::Continue(token),
        None => NextPage::MissingToken,
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list(&self, prefix: Option<&str>) -> Result<Vec<ObjectMeta>> {
        let mut objects = Vec::new();
        let mut continuation_token = None;

        loop {
            let res = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .set_prefix(prefix.map(str::to_string))
                .set_continuation_token(continuation_token)
                .send()
                .await
                .map_err(|e| anyhow!("{}", DisplayErrorContext(&e)))?;

            if let Some(contents) = res.contents {
                objects.extend(contents.into_iter().filter_map(|o| self.to_meta(o)));
            }

            match next_page(
                res.is_truncated,
                res.next_continuation_token,
                self.follow_pagination,
            ) {
                NextPage::Done => break,
                NextPage::Continue(token) => continuation_token = Some(token),
                NextPage::Truncated => {
                    tracing::warn!(
                        "Listing of bucket {} (prefix {:?}) truncated at {} objects",
                        self.bucket,
                        prefix,
                        objects.len()
                    );
                    break;
                }
                NextPage::MissingToken => {
                    tracing::warn!(
                        "Listing of bucket {} reported truncation without a continuation token",
                        self.bucket
                    );
                    break;
                }
            }
        }

        Ok(objects)
    }

    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<ObjectMeta> {
        let size = data.len() as i64;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("S3 put_object failed: key={}, error={:?}", key, e);
                anyhow!("{}", DisplayErrorContext(&e))
            })?;

        Ok(ObjectMeta {
            key: key.to_string(),
            size,
            last_modified: Utc::now(),
            url: public_url(&self.bucket, &self.storage_domain, key),
        })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let res = self
            .client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match res {
            Ok(_) => Ok(()),
            Err(e) => {
                let code = e.as_service_error().and_then(|se| se.code());
                if matches!(code, Some("NoSuchKey") | Some("NotFound")) {
                    tracing::debug!("Delete of missing key {} treated as success", key);
                    Ok(())
                } else {
                    Err(anyhow!("{}", DisplayErrorContext(&e)))
                }
            }
        }
    }

    async fn ping(&self) -> Result<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| anyhow!("{}", DisplayErrorContext(&e)))?;
        Ok(())
    }

    fn location(&self, key: &str) -> String {
        object_location(&self.bucket, &self.region, self.endpoint_url.as_deref(), key)
    }
}
