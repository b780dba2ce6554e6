//! S3 / MinIO store: one JSON object per tenant, overwritten on every save.

use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;

use crate::config::S3Settings;
use crate::decision::errors::PersistenceError;
use crate::decision::persistence::{EngineSnapshot, SnapshotStore};

pub struct S3SnapshotStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    key: String,
}

pub fn object_key(tenant: &str) -> String {
    format!("decision-engine/{tenant}/snapshot.json")
}

impl S3SnapshotStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>, tenant: &str) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            key: object_key(tenant),
        }
    }

    /// Client configured for MinIO (local) or AWS (production).
    pub async fn connect(settings: &S3Settings, tenant: &str) -> Self {
        let credentials = Credentials::new(
            &settings.access_key_id,
            &settings.secret_access_key,
            None,
            None,
            "candidate-api-static",
        );

        let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(credentials)
            .endpoint_url(&settings.endpoint)
            .load()
            .await;

        Self::new(aws_sdk_s3::Client::new(&s3_config), &settings.bucket, tenant)
    }
}

#[async_trait]
impl SnapshotStore for S3SnapshotStore {
    fn backend(&self) -> &'static str {
        "s3"
    }

    async fn load(&self) -> Result<Option<EngineSnapshot>, PersistenceError> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .send()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(err) => {
                if err.as_service_error().map_or(false, |e| e.is_no_such_key()) {
                    return Ok(None);
                }
                return Err(PersistenceError::S3(format!("get s3://{}/{}: {err}", self.bucket, self.key)));
            }
        };

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| PersistenceError::S3(format!("read s3://{}/{}: {e}", self.bucket, self.key)))?
            .into_bytes();
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn save(&self, snapshot: &EngineSnapshot) -> Result<(), PersistenceError> {
        let body = serde_json::to_vec(snapshot)?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .body(ByteStream::from(body))
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| PersistenceError::S3(format!("put s3://{}/{}: {e}", self.bucket, self.key)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_is_namespaced_by_tenant() {
        assert_eq!(object_key("acme"), "decision-engine/acme/snapshot.json");
    }
}
