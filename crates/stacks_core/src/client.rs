//! Stack service calls with throttling retry applied.

use std::sync::Arc;

use stacks_cloud::{
    retry, CloudResult, EventPage, RetryPolicy, Sleeper, StackApi, StackOutput, StackRequest,
    StackResource, StackStatus, StackSummary, Tag, TokioSleeper,
};

/// Handle to the stack service used by the driver, tailer and queries.
///
/// Every method is one remote call wrapped in the retry policy.
#[derive(Clone)]
pub struct StackClient {
    api: Arc<dyn StackApi>,
    sleeper: Arc<dyn Sleeper>,
    policy: RetryPolicy,
}

impl StackClient {
    pub fn new(api: Arc<dyn StackApi>) -> Self {
        Self {
            api,
            sleeper: Arc::new(TokioSleeper),
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn sleeper(&self) -> Arc<dyn Sleeper> {
        self.sleeper.clone()
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub async fn status(&self, name: &str) -> CloudResult<Option<StackStatus>> {
        let api = self.api.as_ref();
        retry(&self.policy, self.sleeper.as_ref(), move || api.describe_status(name)).await
    }

    /// Whether a live stack with this name exists.
    ///
    /// Deleted stacks linger with `DELETE_COMPLETE` and count as absent.
    pub async fn exists(&self, name: &str) -> CloudResult<bool> {
        Ok(matches!(self.status(name).await?, Some(status) if !status.is_deleted()))
    }

    pub async fn create(&self, request: &StackRequest) -> CloudResult<()> {
        let api = self.api.as_ref();
        retry(&self.policy, self.sleeper.as_ref(), move || api.create_stack(request)).await
    }

    pub async fn update(&self, request: &StackRequest) -> CloudResult<()> {
        let api = self.api.as_ref();
        retry(&self.policy, self.sleeper.as_ref(), move || api.update_stack(request)).await
    }

    pub async fn delete(&self, name: &str) -> CloudResult<()> {
        let api = self.api.as_ref();
        retry(&self.policy, self.sleeper.as_ref(), move || api.delete_stack(name)).await
    }

    pub async fn events(&self, name: &str, next_token: Option<&str>) -> CloudResult<EventPage> {
        let api = self.api.as_ref();
        retry(&self.policy, self.sleeper.as_ref(), move || {
            api.list_events(name, next_token)
        })
        .await
    }

    pub async fn list(&self, status_filter: &[StackStatus]) -> CloudResult<Vec<StackSummary>> {
        let api = self.api.as_ref();
        retry(&self.policy, self.sleeper.as_ref(), move || {
            api.list_stacks(status_filter)
        })
        .await
    }

    pub async fn outputs(&self, name: &str) -> CloudResult<Vec<StackOutput>> {
        let api = self.api.as_ref();
        retry(&self.policy, self.sleeper.as_ref(), move || api.describe_outputs(name)).await
    }

    pub async fn tags(&self, name: &str) -> CloudResult<Vec<Tag>> {
        let api = self.api.as_ref();
        retry(&self.policy, self.sleeper.as_ref(), move || api.describe_tags(name)).await
    }

    pub async fn resources(
        &self,
        name: &str,
        logical_id: Option<&str>,
    ) -> CloudResult<Vec<StackResource>> {
        let api = self.api.as_ref();
        retry(&self.policy, self.sleeper.as_ref(), move || {
            api.describe_resources(name, logical_id)
        })
        .await
    }
}
