//! Object store interface and its S3 implementation.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client;
use tracing::debug;

use crate::error::{Result, UploadError};

use super::task::{ObjectAcl, UploadTask};

/// Destination of uploaded artifacts.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Uploads one file.
    async fn put_file(&self, task: &UploadTask) -> Result<()>;

    /// Returns the bucket name, for messages.
    fn bucket(&self) -> &str;
}

/// S3-backed object store.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    /// S3 client.
    client: Client,
    /// Bucket name.
    bucket: String,
}

impl S3ObjectStore {
    /// Creates a store from the ambient AWS configuration.
    pub async fn new(bucket: &str, region: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region_str) = region {
            loader = loader.region(aws_config::Region::new(region_str.to_string()));
        }
        let config = loader.load().await;

        Self::with_client(Client::new(&config), bucket)
    }

    /// Creates a store around an existing client.
    #[must_use]
    pub fn with_client(client: Client, bucket: &str) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
        }
    }

    /// Returns the underlying client.
    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }
}

fn canned_acl(acl: ObjectAcl) -> ObjectCannedAcl {
    match acl {
        ObjectAcl::Private => ObjectCannedAcl::Private,
        ObjectAcl::PublicRead => ObjectCannedAcl::PublicRead,
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_file(&self, task: &UploadTask) -> Result<()> {
        debug!("Uploading s3://{}/{}", self.bucket, task.remote_key);

        let body = ByteStream::from_path(&task.local_path)
            .await
            .map_err(|e| UploadError::Read {
                path: task.local_path.clone(),
                message: e.to_string(),
            })?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&task.remote_key)
            .body(body)
            .set_acl(task.acl.map(canned_acl))
            .set_cache_control(task.cache_control.clone())
            .send()
            .await
            .map_err(|e| {
                UploadError::put(
                    &self.bucket,
                    &task.remote_key,
                    e.into_service_error().to_string(),
                )
            })?;

        Ok(())
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}
