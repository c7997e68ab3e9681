//! Stack tag resolution.

use std::collections::BTreeMap;

use md5::{Digest, Md5};
use stacks_cloud::Tag;
use stacks_templates::MetadataTag;

/// Tag carrying the environment name.
pub const ENV_TAG: &str = "Env";

/// Tag carrying the digest of the rendered body.
pub const MD5_TAG: &str = "MD5Sum";

/// Keys that are always computed and never taken from template metadata.
pub const PROTECTED_TAGS: [&str; 2] = [ENV_TAG, MD5_TAG];

/// Hex MD5 digest of a rendered body.
pub fn content_digest(body: &str) -> String {
    hex::encode(Md5::digest(body.as_bytes()))
}

/// Stack tags with unique keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet(BTreeMap<String, String>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Wire form, ordered by key.
    pub fn to_tags(&self) -> Vec<Tag> {
        self.iter().map(|(k, v)| Tag::new(k, v)).collect()
    }
}

impl std::fmt::Display for TagSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pairs: Vec<String> = self.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{}", pairs.join(", "))
    }
}

/// Merge metadata tags with the protected `Env` and `MD5Sum` tags.
///
/// Later metadata entries win over earlier ones with the same key; protected
/// keys always win over metadata.
pub fn resolve_tags(metadata_tags: &[MetadataTag], env: &str, body: &str) -> TagSet {
    let mut tags = TagSet::new();
    for tag in metadata_tags {
        tags.insert(&tag.key, &tag.value);
    }
    tags.insert(ENV_TAG, env);
    tags.insert(MD5_TAG, content_digest(body));
    tags
}
