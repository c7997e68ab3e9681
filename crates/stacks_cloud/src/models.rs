//! Data exchanged with the remote stack service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::status::StackStatus;

/// A stack tag as sent on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// How the template body reaches the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    /// Body submitted inline with the request.
    Body(String),
    /// Reference to a body previously stored in blob storage.
    Url(String),
}

/// A create or update request.
#[derive(Debug, Clone, PartialEq)]
pub struct StackRequest {
    pub name: String,
    pub template: TemplateSource,
    pub tags: Vec<Tag>,
    pub capabilities: Vec<String>,
    pub disable_rollback: bool,
}

/// A single entry of a stack's event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackEvent {
    #[serde(rename = "EventId")]
    pub event_id: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "LogicalResourceId", default)]
    pub logical_id: String,
    #[serde(rename = "ResourceType", default)]
    pub resource_type: String,
    #[serde(rename = "ResourceStatus", default)]
    pub status: String,
    #[serde(rename = "ResourceStatusReason", default)]
    pub status_reason: Option<String>,
}

/// One page of events plus the token for the next (older) page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventPage {
    #[serde(rename = "StackEvents", default)]
    pub events: Vec<StackEvent>,
    #[serde(rename = "NextToken", default)]
    pub next_token: Option<String>,
}

/// Entry of a stack listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackSummary {
    #[serde(rename = "StackName")]
    pub name: String,
    #[serde(rename = "StackStatus")]
    pub status: StackStatus,
    #[serde(rename = "TemplateDescription", default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackOutput {
    #[serde(rename = "OutputKey")]
    pub key: String,
    #[serde(rename = "OutputValue")]
    pub value: String,
    #[serde(rename = "Description", default)]
    pub description: Option<String>,
}

/// A resource managed by a stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackResource {
    #[serde(rename = "LogicalResourceId")]
    pub logical_id: String,
    #[serde(rename = "PhysicalResourceId", default)]
    pub physical_id: Option<String>,
    #[serde(rename = "ResourceType")]
    pub resource_type: String,
    #[serde(rename = "ResourceStatus")]
    pub status: String,
}
