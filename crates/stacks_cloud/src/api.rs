//! Remote collaborator traits.

use async_trait::async_trait;

use crate::error::CloudResult;
use crate::models::{EventPage, StackOutput, StackRequest, StackResource, StackSummary, Tag};
use crate::status::StackStatus;

/// Remote stack management service.
#[async_trait]
pub trait StackApi: Send + Sync {
    /// Current status of a stack, or `None` when the service does not know it.
    async fn describe_status(&self, name: &str) -> CloudResult<Option<StackStatus>>;

    /// Create a stack.
    async fn create_stack(&self, request: &StackRequest) -> CloudResult<()>;

    /// Update an existing stack.
    async fn update_stack(&self, request: &StackRequest) -> CloudResult<()>;

    /// Delete a stack.
    async fn delete_stack(&self, name: &str) -> CloudResult<()>;

    /// One page of events, newest first. `None` requests the first page.
    async fn list_events(&self, name: &str, next_token: Option<&str>) -> CloudResult<EventPage>;

    /// Stacks whose status is one of `status_filter`.
    async fn list_stacks(&self, status_filter: &[StackStatus]) -> CloudResult<Vec<StackSummary>>;

    /// Outputs of a stack.
    async fn describe_outputs(&self, name: &str) -> CloudResult<Vec<StackOutput>>;

    /// Tags of a stack.
    async fn describe_tags(&self, name: &str) -> CloudResult<Vec<Tag>>;

    /// Resources of a stack, optionally narrowed to one logical id.
    async fn describe_resources(
        &self,
        name: &str,
        logical_id: Option<&str>,
    ) -> CloudResult<Vec<StackResource>>;
}

/// Content-addressed blob storage for oversized template bodies.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `body` under `bucket`/`key` and return a URL the stack service can read.
    async fn put(&self, bucket: &str, key: &str, body: &[u8]) -> CloudResult<String>;
}

/// One-shot lookups exposed to templates as functions.
///
/// These are blocking: templates are rendered synchronously.
pub trait ResourceLookup: Send + Sync {
    /// First machine image id with the given name.
    fn image_id(&self, name: &str) -> CloudResult<String>;

    /// Id of the single network tagged with the given name.
    fn vpc_id(&self, name: &str) -> CloudResult<String>;

    /// Id of the DNS zone with the given name, without the `/hostedzone/` prefix.
    fn zone_id(&self, name: &str) -> CloudResult<String>;

    fn stack_output(&self, stack: &str, key: &str) -> CloudResult<String>;

    /// Value of a stack tag; empty when the stack has no such tag.
    fn stack_tag(&self, stack: &str, key: &str) -> CloudResult<String>;

    /// Physical id of a stack resource by logical id.
    fn stack_resource(&self, stack: &str, logical_id: &str) -> CloudResult<String>;
}
