//! # stacks_core
//!
//! The stack lifecycle engine.
//!
//! This crate ties rendering, tagging and transport together and drives the
//! remote stack service:
//! - Configuration loading and environment selection
//! - Tag resolution with protected `Env` and `MD5Sum` tags
//! - Inline or offloaded template submission
//! - Create, update and delete decisions with benign outcomes
//! - Bounded and follow-mode event tailing
//! - Listing, outputs and resources queries

pub mod client;
pub mod config;
pub mod driver;
pub mod error;
pub mod events;
pub mod lookups;
pub mod queries;
pub mod tags;
pub mod transport;

pub use client::StackClient;
pub use config::{ConfigSource, OutputFormat, StacksConfig};
pub use driver::{
    confirm_delete, resolve_name, ChangeAction, ChangeMode, DeleteOutcome, DeployOutcome,
    DeployRequest, StackChange, StackDriver,
};
pub use error::{CoreError, CoreResult};
pub use events::{EventSink, EventTailer, TailMode, TailOutcome, DEFAULT_LINES};
pub use lookups::LookupFunctions;
pub use queries::{StackListing, StackQueries};
pub use tags::{content_digest, resolve_tags, TagSet};
pub use transport::{ArtifactTransport, OffloadSettings, INLINE_BODY_LIMIT};
