//! Splitting rendered output into an optional metadata document and a template body.

use std::collections::BTreeMap;
use std::io;

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde::Deserialize;
use serde_json::ser::{Formatter, PrettyFormatter};
use serde_yaml::Value;
use tracing::debug;

use crate::error::{TemplateError, TemplateResult};

/// A node of the template body.
///
/// Mappings are ordered by key so that serialization is canonical.
/// Intrinsic function tags (`!Ref`, `!GetAtt`, `!Sub`, ...) are kept as
/// opaque [`TemplateNode::Intrinsic`] nodes and never evaluated.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateNode {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Sequence(Vec<TemplateNode>),
    Mapping(BTreeMap<String, TemplateNode>),
    Intrinsic { tag: String, value: Box<TemplateNode> },
}

impl TemplateNode {
    /// Key under which an intrinsic tag is emitted in the long form.
    pub fn intrinsic_key(tag: &str) -> String {
        match tag {
            "Ref" | "Condition" => tag.to_string(),
            other => format!("Fn::{}", other),
        }
    }

    /// Canonical text form: sorted keys, two-space indentation, ASCII only.
    ///
    /// Byte-identical to `json.dumps(body, indent=2, sort_keys=True)`, so
    /// content hashes match stacks deployed by earlier tooling.
    pub fn to_canonical_string(&self) -> TemplateResult<String> {
        let mut out = Vec::new();
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, AsciiFormatter::new());
        self.serialize(&mut serializer)?;
        String::from_utf8(out).map_err(|e| TemplateError::Parse(e.to_string()))
    }
}

/// Pretty printer that writes every character outside printable ASCII as a
/// `\uXXXX` escape, using surrogate pairs beyond the basic plane.
struct AsciiFormatter<'a> {
    pretty: PrettyFormatter<'a>,
}

impl<'a> AsciiFormatter<'a> {
    fn new() -> Self {
        Self {
            pretty: PrettyFormatter::with_indent(b"  "),
        }
    }
}

impl Formatter for AsciiFormatter<'_> {
    fn begin_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.begin_array(writer)
    }

    fn end_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.end_array(writer)
    }

    fn begin_array_value<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.pretty.begin_array_value(writer, first)
    }

    fn end_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.end_array_value(writer)
    }

    fn begin_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.begin_object(writer)
    }

    fn end_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.end_object(writer)
    }

    fn begin_object_key<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.pretty.begin_object_key(writer, first)
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.begin_object_value(writer)
    }

    fn end_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.end_object_value(writer)
    }

    fn write_string_fragment<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        fragment: &str,
    ) -> io::Result<()> {
        // Control characters, quotes and backslashes never reach this point.
        let mut units = [0u16; 2];
        for c in fragment.chars() {
            if (' '..='~').contains(&c) {
                writer.write_all(&[c as u8])?;
            } else {
                for unit in c.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }
        Ok(())
    }
}

impl TryFrom<Value> for TemplateNode {
    type Error = TemplateError;

    fn try_from(value: Value) -> TemplateResult<Self> {
        Ok(match value {
            Value::Null => TemplateNode::Null,
            Value::Bool(b) => TemplateNode::Bool(b),
            Value::Number(n) => TemplateNode::Number(convert_number(&n)?),
            Value::String(s) => TemplateNode::String(s),
            Value::Sequence(items) => TemplateNode::Sequence(
                items
                    .into_iter()
                    .map(TemplateNode::try_from)
                    .collect::<TemplateResult<_>>()?,
            ),
            Value::Mapping(map) => {
                let mut nodes = BTreeMap::new();
                for (key, value) in map {
                    nodes.insert(key_string(key)?, TemplateNode::try_from(value)?);
                }
                TemplateNode::Mapping(nodes)
            }
            Value::Tagged(tagged) => {
                let tag = tagged.tag.to_string();
                let tag = tag.trim_start_matches('!').to_string();
                let value = TemplateNode::try_from(tagged.value)?;
                let value = match (tag.as_str(), value) {
                    ("GetAtt", TemplateNode::String(s)) => match s.split_once('.') {
                        Some((resource, attribute)) => TemplateNode::Sequence(vec![
                            TemplateNode::String(resource.to_string()),
                            TemplateNode::String(attribute.to_string()),
                        ]),
                        None => TemplateNode::String(s),
                    },
                    (_, value) => value,
                };
                TemplateNode::Intrinsic {
                    tag,
                    value: Box::new(value),
                }
            }
        })
    }
}

impl Serialize for TemplateNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TemplateNode::Null => serializer.serialize_unit(),
            TemplateNode::Bool(b) => serializer.serialize_bool(*b),
            TemplateNode::Number(n) => n.serialize(serializer),
            TemplateNode::String(s) => serializer.serialize_str(s),
            TemplateNode::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            TemplateNode::Mapping(nodes) => {
                let mut map = serializer.serialize_map(Some(nodes.len()))?;
                for (key, value) in nodes {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            TemplateNode::Intrinsic { tag, value } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(&TemplateNode::intrinsic_key(tag), value)?;
                map.end()
            }
        }
    }
}

fn convert_number(n: &serde_yaml::Number) -> TemplateResult<serde_json::Number> {
    if let Some(i) = n.as_i64() {
        return Ok(i.into());
    }
    if let Some(u) = n.as_u64() {
        return Ok(u.into());
    }
    n.as_f64()
        .and_then(serde_json::Number::from_f64)
        .ok_or_else(|| TemplateError::Parse(format!("unsupported number {}", n)))
}

fn key_string(key: Value) -> TemplateResult<String> {
    match key {
        Value::String(s) => Ok(s),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok("null".to_string()),
        other => Err(TemplateError::Parse(format!(
            "unsupported mapping key {:?}",
            other
        ))),
    }
}

/// A key/value tag declared in the metadata document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MetadataTag {
    pub key: String,
    #[serde(deserialize_with = "scalar_string")]
    pub value: String,
}

/// Deployment options declared in the optional first document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub disable_rollback: bool,
    #[serde(default)]
    pub tags: Vec<MetadataTag>,
}

fn scalar_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "tag value must be a scalar, got {:?}",
            other
        ))),
    }
}

/// A rendered template: canonical body plus optional metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedTemplate {
    pub body: String,
    pub metadata: Option<Metadata>,
}

impl RenderedTemplate {
    /// Size of the canonical body in bytes.
    pub fn size(&self) -> usize {
        self.body.len()
    }
}

/// Parse rendered text as a document stream and split metadata from body.
///
/// One document is the body; two documents are metadata followed by body;
/// any other count is an error.
pub fn split_documents(rendered: &str) -> TemplateResult<RenderedTemplate> {
    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_str(rendered) {
        let value = Value::deserialize(document).map_err(|e| TemplateError::Parse(e.to_string()))?;
        documents.push(value);
    }

    debug!("Rendered output contains {} document(s)", documents.len());

    let (metadata, body) = match documents.len() {
        1 => (None, documents.remove(0)),
        2 => {
            let body = documents.remove(1);
            let metadata = documents.remove(0);
            (Some(metadata), body)
        }
        n => {
            return Err(TemplateError::Parse(format!(
                "expected one or two documents, found {}",
                n
            )))
        }
    };

    if body.is_null() {
        return Err(TemplateError::Parse("template body is empty".to_string()));
    }

    let metadata = match metadata {
        Some(Value::Null) | None => None,
        Some(value) => Some(
            serde_yaml::from_value::<Metadata>(value)
                .map_err(|e| TemplateError::InvalidMetadata(e.to_string()))?,
        ),
    };

    let body = TemplateNode::try_from(body)?.to_canonical_string()?;
    Ok(RenderedTemplate { body, metadata })
}
