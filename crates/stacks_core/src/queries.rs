//! Read-only stack queries: listing, outputs and resources.

use glob::Pattern;
use stacks_cloud::{StackOutput, StackResource, StackStatus};

use crate::client::StackClient;
use crate::error::{CoreError, CoreResult};
use crate::tags::ENV_TAG;

/// A row of the stack listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackListing {
    pub name: String,
    pub status: StackStatus,
    /// `Env` tag value, only filled in verbose listings.
    pub env: Option<String>,
    /// Template description, only filled in verbose listings.
    pub description: Option<String>,
}

pub struct StackQueries {
    client: StackClient,
}

impl StackQueries {
    pub fn new(client: StackClient) -> Self {
        Self { client }
    }

    /// Stacks that are not deleted and whose name matches the glob `pattern`.
    pub async fn list(&self, pattern: &str, verbose: bool) -> CoreResult<Vec<StackListing>> {
        let pattern = Pattern::new(pattern)?;
        let summaries = self.client.list(&StackStatus::active()).await?;

        let mut listings = Vec::new();
        for summary in summaries.into_iter().filter(|s| pattern.matches(&s.name)) {
            let (env, description) = if verbose {
                let env = self
                    .client
                    .tags(&summary.name)
                    .await?
                    .into_iter()
                    .find(|tag| tag.key == ENV_TAG)
                    .map(|tag| tag.value)
                    .unwrap_or_default();
                (Some(env), Some(summary.description.unwrap_or_default()))
            } else {
                (None, None)
            };

            listings.push(StackListing {
                name: summary.name,
                status: summary.status,
                env,
                description,
            });
        }
        Ok(listings)
    }

    /// All outputs of a stack, or only the one named `output`.
    pub async fn outputs(&self, name: &str, output: Option<&str>) -> CoreResult<Vec<StackOutput>> {
        let outputs = self.client.outputs(name).await?;
        match output {
            None => Ok(outputs),
            Some(key) => {
                let matching: Vec<StackOutput> =
                    outputs.into_iter().filter(|o| o.key == key).collect();
                if matching.is_empty() {
                    return Err(CoreError::OutputNotFound {
                        stack: name.to_string(),
                        output: key.to_string(),
                    });
                }
                Ok(matching)
            }
        }
    }

    /// Resources of a stack, optionally only the one with `logical_id`.
    pub async fn resources(
        &self,
        name: &str,
        logical_id: Option<&str>,
    ) -> CoreResult<Vec<StackResource>> {
        Ok(self.client.resources(name, logical_id).await?)
    }
}
