//! In-memory remote services for testing.
//!
//! [`MockStackApi`] keeps a table of stacks and behaves like the real
//! service for the cases the engine cares about: duplicate creates, no-op
//! updates, deleting missing stacks and deleted-stack tombstones.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::api::{BlobStore, ResourceLookup, StackApi};
use crate::error::{CloudError, CloudResult};
use crate::models::{
    EventPage, StackOutput, StackRequest, StackResource, StackSummary, Tag, TemplateSource,
};
use crate::retry::Sleeper;
use crate::status::StackStatus;

/// Captured call information for verification.
#[derive(Debug, Clone, PartialEq)]
pub enum CapturedCall {
    DescribeStatus(String),
    Create(StackRequest),
    Update(StackRequest),
    Delete(String),
    ListEvents {
        name: String,
        next_token: Option<String>,
    },
    ListStacks,
    DescribeOutputs(String),
    DescribeTags(String),
    DescribeResources {
        name: String,
        logical_id: Option<String>,
    },
}

/// A stack as the mock service sees it.
#[derive(Debug, Clone)]
pub struct MockStack {
    pub status: StackStatus,
    pub template: Option<TemplateSource>,
    pub tags: Vec<Tag>,
    pub description: Option<String>,
    pub outputs: Vec<StackOutput>,
    pub resources: Vec<StackResource>,
}

impl MockStack {
    pub fn new(status: StackStatus) -> Self {
        Self {
            status,
            template: None,
            tags: Vec::new(),
            description: None,
            outputs: Vec::new(),
            resources: Vec::new(),
        }
    }

    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.tags.push(Tag::new(key, value));
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_output(mut self, key: &str, value: &str) -> Self {
        self.outputs.push(StackOutput {
            key: key.to_string(),
            value: value.to_string(),
            description: None,
        });
        self
    }

    pub fn with_resource(mut self, logical_id: &str, physical_id: &str, resource_type: &str) -> Self {
        self.resources.push(StackResource {
            logical_id: logical_id.to_string(),
            physical_id: Some(physical_id.to_string()),
            resource_type: resource_type.to_string(),
            status: "CREATE_COMPLETE".to_string(),
        });
        self
    }
}

/// Mock stack service.
#[derive(Clone, Default)]
pub struct MockStackApi {
    stacks: Arc<RwLock<HashMap<String, MockStack>>>,
    /// Statuses returned by successive `describe_status` calls, per stack.
    status_script: Arc<RwLock<HashMap<String, VecDeque<Option<StackStatus>>>>>,
    /// Event pages keyed by stack and the token used to request them.
    event_pages: Arc<RwLock<HashMap<(String, Option<String>), VecDeque<EventPage>>>>,
    /// Errors returned, in order, before any call is served.
    errors: Arc<RwLock<VecDeque<CloudError>>>,
    captured_calls: Arc<RwLock<Vec<CapturedCall>>>,
}

impl MockStackApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a stack.
    pub fn with_stack(self, name: &str, stack: MockStack) -> Self {
        self.stacks.write().insert(name.to_string(), stack);
        self
    }

    /// Queue statuses for `describe_status`; the stack table is used once they run out.
    pub fn with_status_script(self, name: &str, statuses: Vec<Option<StackStatus>>) -> Self {
        self.status_script
            .write()
            .entry(name.to_string())
            .or_default()
            .extend(statuses);
        self
    }

    /// Queue an event page for a request with `next_token`.
    ///
    /// Pages queued for the same token are returned in order; the last one
    /// keeps being returned once the queue is down to it.
    pub fn with_event_page(self, name: &str, next_token: Option<&str>, page: EventPage) -> Self {
        self.event_pages
            .write()
            .entry((name.to_string(), next_token.map(str::to_string)))
            .or_default()
            .push_back(page);
        self
    }

    /// Fail the next call with `error`.
    pub fn with_error(self, error: CloudError) -> Self {
        self.errors.write().push_back(error);
        self
    }

    pub fn stack(&self, name: &str) -> Option<MockStack> {
        self.stacks.read().get(name).cloned()
    }

    pub fn set_status(&self, name: &str, status: StackStatus) {
        if let Some(stack) = self.stacks.write().get_mut(name) {
            stack.status = status;
        }
    }

    pub fn captured_calls(&self) -> Vec<CapturedCall> {
        self.captured_calls.read().clone()
    }

    /// Create and update requests that reached the service.
    pub fn submitted_requests(&self) -> Vec<StackRequest> {
        self.captured_calls
            .read()
            .iter()
            .filter_map(|call| match call {
                CapturedCall::Create(r) | CapturedCall::Update(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.captured_calls.read().len()
    }

    fn record(&self, call: CapturedCall) -> CloudResult<()> {
        self.captured_calls.write().push(call);
        match self.errors.write().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn not_found(name: &str) -> CloudError {
        CloudError::service(
            "ValidationError",
            format!("Stack with id {} does not exist", name),
        )
    }

    fn live_stack(&self, name: &str) -> CloudResult<MockStack> {
        match self.stacks.read().get(name) {
            Some(stack) if !stack.status.is_deleted() => Ok(stack.clone()),
            _ => Err(Self::not_found(name)),
        }
    }
}

#[async_trait]
impl StackApi for MockStackApi {
    async fn describe_status(&self, name: &str) -> CloudResult<Option<StackStatus>> {
        self.record(CapturedCall::DescribeStatus(name.to_string()))?;

        if let Some(script) = self.status_script.write().get_mut(name) {
            if let Some(status) = script.pop_front() {
                return Ok(status);
            }
        }
        Ok(self.stacks.read().get(name).map(|s| s.status.clone()))
    }

    async fn create_stack(&self, request: &StackRequest) -> CloudResult<()> {
        self.record(CapturedCall::Create(request.clone()))?;

        let mut stacks = self.stacks.write();
        if let Some(existing) = stacks.get(&request.name) {
            if !existing.status.is_deleted() {
                return Err(CloudError::service(
                    "AlreadyExistsException",
                    format!("Stack [{}] already exists", request.name),
                ));
            }
        }

        let mut stack = MockStack::new(StackStatus::CreateInProgress);
        stack.template = Some(request.template.clone());
        stack.tags = request.tags.clone();
        stacks.insert(request.name.clone(), stack);
        Ok(())
    }

    async fn update_stack(&self, request: &StackRequest) -> CloudResult<()> {
        self.record(CapturedCall::Update(request.clone()))?;

        let mut stacks = self.stacks.write();
        let stack = match stacks.get_mut(&request.name) {
            Some(stack) if !stack.status.is_deleted() => stack,
            _ => return Err(Self::not_found(&request.name)),
        };

        if stack.template.as_ref() == Some(&request.template) && stack.tags == request.tags {
            return Err(CloudError::service(
                "ValidationError",
                "No updates are to be performed.",
            ));
        }

        stack.template = Some(request.template.clone());
        stack.tags = request.tags.clone();
        stack.status = StackStatus::UpdateInProgress;
        Ok(())
    }

    async fn delete_stack(&self, name: &str) -> CloudResult<()> {
        self.record(CapturedCall::Delete(name.to_string()))?;

        let mut stacks = self.stacks.write();
        match stacks.get_mut(name) {
            Some(stack) if !stack.status.is_deleted() => {
                stack.status = StackStatus::DeleteComplete;
                Ok(())
            }
            _ => Err(Self::not_found(name)),
        }
    }

    async fn list_events(&self, name: &str, next_token: Option<&str>) -> CloudResult<EventPage> {
        self.record(CapturedCall::ListEvents {
            name: name.to_string(),
            next_token: next_token.map(str::to_string),
        })?;

        let key = (name.to_string(), next_token.map(str::to_string));
        let mut pages = self.event_pages.write();
        match pages.get_mut(&key) {
            Some(queue) if queue.len() > 1 => Ok(queue.pop_front().unwrap_or_default()),
            Some(queue) => Ok(queue.front().cloned().unwrap_or_default()),
            None if self.stacks.read().contains_key(name) => Ok(EventPage::default()),
            None => Err(Self::not_found(name)),
        }
    }

    async fn list_stacks(&self, status_filter: &[StackStatus]) -> CloudResult<Vec<StackSummary>> {
        self.record(CapturedCall::ListStacks)?;

        let mut summaries: Vec<StackSummary> = self
            .stacks
            .read()
            .iter()
            .filter(|(_, stack)| status_filter.contains(&stack.status))
            .map(|(name, stack)| StackSummary {
                name: name.clone(),
                status: stack.status.clone(),
                description: stack.description.clone(),
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(summaries)
    }

    async fn describe_outputs(&self, name: &str) -> CloudResult<Vec<StackOutput>> {
        self.record(CapturedCall::DescribeOutputs(name.to_string()))?;
        Ok(self.live_stack(name)?.outputs)
    }

    async fn describe_tags(&self, name: &str) -> CloudResult<Vec<Tag>> {
        self.record(CapturedCall::DescribeTags(name.to_string()))?;
        Ok(self.live_stack(name)?.tags)
    }

    async fn describe_resources(
        &self,
        name: &str,
        logical_id: Option<&str>,
    ) -> CloudResult<Vec<StackResource>> {
        self.record(CapturedCall::DescribeResources {
            name: name.to_string(),
            logical_id: logical_id.map(str::to_string),
        })?;
        let resources = self.live_stack(name)?.resources;
        Ok(match logical_id {
            Some(id) => resources.into_iter().filter(|r| r.logical_id == id).collect(),
            None => resources,
        })
    }
}

/// Mock blob store that keeps objects in memory.
#[derive(Clone, Default)]
pub struct MockBlobStore {
    objects: Arc<RwLock<HashMap<(String, String), Vec<u8>>>>,
}

impl MockBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .read()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Stored `(bucket, key)` pairs.
    pub fn keys(&self) -> Vec<(String, String)> {
        let mut keys: Vec<_> = self.objects.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl BlobStore for MockBlobStore {
    async fn put(&self, bucket: &str, key: &str, body: &[u8]) -> CloudResult<String> {
        self.objects
            .write()
            .insert((bucket.to_string(), key.to_string()), body.to_vec());
        Ok(format!("https://s3.amazonaws.com/{}/{}", bucket, key))
    }
}

/// Lookup backed by fixed tables.
#[derive(Clone, Default)]
pub struct StaticLookup {
    values: Arc<RwLock<HashMap<(String, String), String>>>,
    errors: Arc<RwLock<VecDeque<CloudError>>>,
    calls: Arc<RwLock<Vec<(String, String)>>>,
}

impl StaticLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a value for a lookup kind (`image`, `vpc`, `zone`, `output`,
    /// `tag` or `resource`) and key. Two-part keys are joined with `/`.
    pub fn with_value(self, kind: &str, key: &str, value: &str) -> Self {
        self.values
            .write()
            .insert((kind.to_string(), key.to_string()), value.to_string());
        self
    }

    /// Fail the next lookup with `error`.
    pub fn with_error(self, error: CloudError) -> Self {
        self.errors.write().push_back(error);
        self
    }

    /// Lookups performed, as `(kind, key)`.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.read().clone()
    }

    fn get(&self, kind: &str, key: &str) -> CloudResult<Option<String>> {
        self.calls.write().push((kind.to_string(), key.to_string()));
        if let Some(err) = self.errors.write().pop_front() {
            return Err(err);
        }
        Ok(self
            .values
            .read()
            .get(&(kind.to_string(), key.to_string()))
            .cloned())
    }

    fn require(&self, kind: &str, key: &str) -> CloudResult<String> {
        self.get(kind, key)?
            .ok_or_else(|| CloudError::ResourceNotFound(format!("{} {} not found", key, kind)))
    }
}

impl ResourceLookup for StaticLookup {
    fn image_id(&self, name: &str) -> CloudResult<String> {
        self.require("image", name)
    }

    fn vpc_id(&self, name: &str) -> CloudResult<String> {
        self.require("vpc", name)
    }

    fn zone_id(&self, name: &str) -> CloudResult<String> {
        self.require("zone", name)
    }

    fn stack_output(&self, stack: &str, key: &str) -> CloudResult<String> {
        self.require("output", &format!("{}/{}", stack, key))
    }

    fn stack_tag(&self, stack: &str, key: &str) -> CloudResult<String> {
        Ok(self
            .get("tag", &format!("{}/{}", stack, key))?
            .unwrap_or_default())
    }

    fn stack_resource(&self, stack: &str, logical_id: &str) -> CloudResult<String> {
        self.require("resource", &format!("{}/{}", stack, logical_id))
    }
}

/// Sleeper that records requested delays and returns immediately.
#[derive(Clone, Default)]
pub struct RecordingSleeper {
    sleeps: Arc<RwLock<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.read().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.write().push(duration);
    }
}
