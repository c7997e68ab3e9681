//! # stacks_cloud
//!
//! Remote collaborators of the stack engine: the stack service, blob
//! storage for large templates and the lookups templates can call.
//!
//! The production backend drives the `aws` command line tool. The [`mock`]
//! module provides in-memory implementations for tests.

pub mod api;
pub mod aws_cli;
pub mod error;
pub mod mock;
pub mod models;
pub mod retry;
pub mod status;

pub use api::{BlobStore, ResourceLookup, StackApi};
pub use aws_cli::{AwsCli, AwsCliOptions};
pub use error::{CloudError, CloudResult, ErrorKind};
pub use models::{
    EventPage, StackEvent, StackOutput, StackRequest, StackResource, StackSummary, Tag,
    TemplateSource,
};
pub use retry::{retry, retry_blocking, retry_with, RetryPolicy, Sleeper, TokioSleeper};
pub use status::StackStatus;
