//! Inline or offloaded template submission.

use std::sync::Arc;

use stacks_cloud::{retry, BlobStore, RetryPolicy, Sleeper, TemplateSource};
use tracing::{debug, info};

use crate::config::StacksConfig;
use crate::error::{CoreError, CoreResult};
use crate::tags::content_digest;

/// Largest body the stack service accepts inline, in bytes.
pub const INLINE_BODY_LIMIT: usize = 51200;

/// Bucket used for offloaded bodies unless overridden.
pub fn default_bucket(env: &str, region: &str) -> String {
    format!("{}-stacks-{}", env, region)
}

/// Content-addressed key of an offloaded body.
pub fn object_key(env: &str, stack_name: &str, digest: &str) -> String {
    format!("{}/{}/{}", env, stack_name, digest)
}

/// Where offloaded bodies go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffloadSettings {
    pub env: String,
    pub region: Option<String>,
    /// Explicit bucket name, overriding the default.
    pub bucket: Option<String>,
}

impl OffloadSettings {
    pub fn from_config(config: &StacksConfig) -> CoreResult<Self> {
        Ok(Self {
            env: config.require_env()?,
            region: config.region(),
            bucket: config.templates_bucket_name(),
        })
    }

    /// The bucket name; the default name needs a region.
    pub fn bucket(&self) -> CoreResult<String> {
        if let Some(bucket) = &self.bucket {
            return Ok(bucket.clone());
        }
        let region = self.region.as_deref().ok_or(CoreError::MissingRegion)?;
        Ok(default_bucket(&self.env, region))
    }
}

/// Chooses between inline bodies and blob storage purely by size.
pub struct ArtifactTransport {
    store: Arc<dyn BlobStore>,
    sleeper: Arc<dyn Sleeper>,
    policy: RetryPolicy,
}

impl ArtifactTransport {
    pub fn new(store: Arc<dyn BlobStore>, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            store,
            sleeper,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Whether a body of `size` bytes goes through blob storage.
    pub fn needs_offload(size: usize) -> bool {
        size > INLINE_BODY_LIMIT
    }

    /// Turn a rendered body into what the create or update call submits.
    pub async fn prepare(
        &self,
        stack_name: &str,
        body: &str,
        settings: &OffloadSettings,
    ) -> CoreResult<TemplateSource> {
        if !Self::needs_offload(body.len()) {
            debug!("Submitting {} byte template inline", body.len());
            return Ok(TemplateSource::Body(body.to_string()));
        }

        let bucket = settings.bucket()?;
        let key = object_key(&settings.env, stack_name, &content_digest(body));
        info!(
            "Template is {} bytes, uploading to {}/{}",
            body.len(),
            bucket,
            key
        );

        let store = &self.store;
        let (bucket_ref, key_ref) = (&bucket, &key);
        let url = retry(&self.policy, self.sleeper.as_ref(), move || async move {
            store.put(bucket_ref, key_ref, body.as_bytes()).await
        })
        .await?;
        Ok(TemplateSource::Url(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mockall::mock;
    use stacks_cloud::mock::{MockBlobStore, RecordingSleeper};
    use stacks_cloud::{CloudError, CloudResult};

    mock! {
        pub Store {}

        #[async_trait]
        impl BlobStore for Store {
            async fn put(&self, bucket: &str, key: &str, body: &[u8]) -> CloudResult<String>;
        }
    }

    fn settings() -> OffloadSettings {
        OffloadSettings {
            env: "dev".to_string(),
            region: Some("eu-west-1".to_string()),
            bucket: None,
        }
    }

    fn transport(store: Arc<dyn BlobStore>) -> ArtifactTransport {
        ArtifactTransport::new(store, Arc::new(RecordingSleeper::new()))
    }

    #[tokio::test]
    async fn test_boundary_is_inline() {
        let store = MockBlobStore::new();
        let body = "x".repeat(INLINE_BODY_LIMIT);

        let source = transport(Arc::new(store.clone()))
            .prepare("web", &body, &settings())
            .await
            .unwrap();

        assert_eq!(source, TemplateSource::Body(body));
        assert!(store.keys().is_empty());
    }

    #[tokio::test]
    async fn test_one_over_boundary_is_offloaded() {
        let store = MockBlobStore::new();
        let body = "x".repeat(INLINE_BODY_LIMIT + 1);
        let key = object_key("dev", "web", &content_digest(&body));

        let source = transport(Arc::new(store.clone()))
            .prepare("web", &body, &settings())
            .await
            .unwrap();

        assert_eq!(
            source,
            TemplateSource::Url(format!("https://s3.amazonaws.com/dev-stacks-eu-west-1/{}", key))
        );
        assert_eq!(
            store.object("dev-stacks-eu-west-1", &key).unwrap(),
            body.as_bytes()
        );
    }

    #[tokio::test]
    async fn test_bucket_override_and_retry() {
        let mut store = MockStore::new();
        let mut seq = mockall::Sequence::new();
        store
            .expect_put()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Err(CloudError::service("Throttling", "Rate exceeded")));
        store
            .expect_put()
            .withf(|bucket: &str, key: &str, _body: &[u8]| {
                bucket == "my-templates" && key.starts_with("dev/web/")
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|bucket, key, _| Ok(format!("https://blobs/{}/{}", bucket, key)));

        let sleeper = Arc::new(RecordingSleeper::new());
        let transport = ArtifactTransport::new(Arc::new(store), sleeper.clone());
        let settings = OffloadSettings {
            bucket: Some("my-templates".to_string()),
            region: None,
            ..settings()
        };

        let body = "y".repeat(INLINE_BODY_LIMIT * 2);
        let source = transport.prepare("web", &body, &settings).await.unwrap();

        assert!(matches!(source, TemplateSource::Url(url) if url.starts_with("https://blobs/my-templates/dev/web/")));
        assert_eq!(sleeper.sleeps().len(), 1);
    }

    #[tokio::test]
    async fn test_default_bucket_needs_region() {
        let settings = OffloadSettings {
            region: None,
            ..settings()
        };
        let err = transport(Arc::new(MockBlobStore::new()))
            .prepare("web", &"z".repeat(INLINE_BODY_LIMIT + 1), &settings)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::MissingRegion));
    }
}
