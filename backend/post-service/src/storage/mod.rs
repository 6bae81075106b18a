/// Object storage gateway
///
/// Uploads binary attachments under a caller-supplied namespace/object key and
/// returns a durable URL. Stateless per call; failures surface as
/// `AppError::Storage`.
mod s3;

pub use s3::{build_s3_client, health_check, S3ObjectStorage};

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `data` at `{folder}/{object_name}` with the given MIME type and
    /// audit tags, returning the durable URL of the stored object.
    async fn upload(
        &self,
        data: Bytes,
        content_type: &str,
        folder: &str,
        object_name: &str,
        tags: &[(String, String)],
    ) -> Result<String>;
}

#[cfg(test)]
mockall::mock! {
    pub Storage {}

    #[async_trait]
    impl ObjectStorage for Storage {
        async fn upload(
            &self,
            data: Bytes,
            content_type: &str,
            folder: &str,
            object_name: &str,
            tags: &[(String, String)],
        ) -> Result<String>;
    }
}
