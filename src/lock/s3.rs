//! S3 storage for the lock object.

use async_trait::async_trait;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::Client;
use tracing::debug;

use crate::error::{LockError, Result, ShipError};

use super::LockStore;

/// Stores the lock object in the artifact bucket.
#[derive(Debug)]
pub struct S3LockStore {
    /// S3 client.
    client: Client,
    /// Bucket name.
    bucket: String,
    /// Full object key.
    key: String,
}

impl S3LockStore {
    /// Creates a lock store for one stack.
    ///
    /// The object lives at `<prefix>/locks/<stack_name>.lock`.
    #[must_use]
    pub fn new(client: Client, bucket: &str, prefix: &str, stack_name: &str) -> Self {
        let prefix = prefix.trim_matches('/');
        let key = if prefix.is_empty() {
            format!("locks/{stack_name}.lock")
        } else {
            format!("{prefix}/locks/{stack_name}.lock")
        };

        Self {
            client,
            bucket: bucket.to_string(),
            key,
        }
    }
}

#[async_trait]
impl LockStore for S3LockStore {
    async fn read(&self) -> Result<Option<String>> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .send()
            .await;

        match result {
            Ok(response) => {
                let bytes = response.body.collect().await.map_err(|e| {
                    ShipError::Lock(LockError::backend(format!("Failed to read lock object: {e}")))
                })?;

                let content = String::from_utf8(bytes.to_vec()).map_err(|e| {
                    ShipError::Lock(LockError::Corrupted {
                        message: format!("Invalid UTF-8 in lock object: {e}"),
                    })
                })?;

                Ok(Some(content))
            }
            Err(sdk_err) => {
                let service_err = sdk_err.into_service_error();
                if service_err.is_no_such_key() {
                    debug!("No lock at {}", self.location());
                    Ok(None)
                } else {
                    Err(ShipError::Lock(LockError::backend(format!(
                        "S3 get error: {service_err}"
                    ))))
                }
            }
        }
    }

    async fn create(&self, content: &str) -> Result<bool> {
        let result = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .body(content.as_bytes().to_vec().into())
            .content_type("application/json")
            .if_none_match("*")
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(sdk_err) => {
                let service_err = sdk_err.into_service_error();
                if is_lost_race(service_err.code()) {
                    debug!("Lock at {} was created concurrently", self.location());
                    Ok(false)
                } else {
                    Err(ShipError::Lock(LockError::backend(format!(
                        "S3 conditional put error: {service_err}"
                    ))))
                }
            }
        }
    }

    async fn write(&self, content: &str) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .body(content.as_bytes().to_vec().into())
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| ShipError::Lock(LockError::backend(format!("S3 put error: {e}"))))?;

        Ok(())
    }

    async fn remove(&self) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .send()
            .await
            .map_err(|e| ShipError::Lock(LockError::backend(format!("S3 delete error: {e}"))))?;

        Ok(())
    }

    fn location(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }
}

/// Error codes S3 returns when a conditional create finds the key taken.
fn is_lost_race(code: Option<&str>) -> bool {
    matches!(
        code,
        Some("PreconditionFailed" | "ConditionalRequestConflict")
    )
}
