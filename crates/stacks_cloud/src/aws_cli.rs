//! Remote backend that drives the `aws` command line tool.
//!
//! Every request is passed as `--cli-input-json` and every response is read
//! back with `--output json`, so the wire shapes are the service's own.

use std::io::Write;
use std::process::{Command, Output, Stdio};
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::api::{BlobStore, ResourceLookup, StackApi};
use crate::error::{CloudError, CloudResult, ErrorKind};
use crate::models::{
    EventPage, StackOutput, StackRequest, StackResource, StackSummary, Tag, TemplateSource,
};
use crate::status::StackStatus;

const HOSTED_ZONE_PREFIX: &str = "/hostedzone/";

/// Options for the `aws` CLI backend.
#[derive(Debug, Clone)]
pub struct AwsCliOptions {
    /// Executable to run.
    pub binary: String,
    pub region: Option<String>,
    /// Named credentials profile.
    pub profile: Option<String>,
}

impl Default for AwsCliOptions {
    fn default() -> Self {
        Self {
            binary: "aws".to_string(),
            region: None,
            profile: None,
        }
    }
}

impl AwsCliOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn region(mut self, region: Option<String>) -> Self {
        self.region = region;
        self
    }

    pub fn profile(mut self, profile: Option<String>) -> Self {
        self.profile = profile;
        self
    }

    pub fn binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }
}

/// Remote stack, blob and lookup backend built on the `aws` CLI.
#[derive(Debug, Clone)]
pub struct AwsCli {
    options: AwsCliOptions,
}

impl AwsCli {
    /// Create a backend, failing when the CLI cannot be run.
    pub fn new(options: AwsCliOptions) -> CloudResult<Self> {
        let available = Command::new(&options.binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false);
        if !available {
            return Err(CloudError::CliNotAvailable(format!(
                "'{}' could not be executed",
                options.binary
            )));
        }

        info!(
            "Using AWS CLI (region: {}, profile: {})",
            options.region.as_deref().unwrap_or("default"),
            options.profile.as_deref().unwrap_or("default")
        );
        Ok(Self::with_options(options))
    }

    /// Create a backend without checking the CLI is installed.
    pub fn with_options(options: AwsCliOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &AwsCliOptions {
        &self.options
    }

    /// Arguments for one service operation.
    pub fn build_args(&self, service: &str, operation: &str, input: &Value) -> Vec<String> {
        let mut args = vec![
            service.to_string(),
            operation.to_string(),
            "--output".to_string(),
            "json".to_string(),
        ];
        if let Some(region) = &self.options.region {
            args.push("--region".to_string());
            args.push(region.clone());
        }
        if let Some(profile) = &self.options.profile {
            args.push("--profile".to_string());
            args.push(profile.clone());
        }
        if !input.is_null() {
            args.push("--cli-input-json".to_string());
            args.push(input.to_string());
        }
        args
    }

    /// Public URL of an object in the blob store.
    pub fn object_url(&self, bucket: &str, key: &str) -> String {
        let endpoint = match &self.options.region {
            Some(region) => format!("https://s3.{}.amazonaws.com", region),
            None => "https://s3.amazonaws.com".to_string(),
        };
        format!("{}/{}/{}", endpoint, bucket, key)
    }

    fn call_blocking<T: DeserializeOwned>(
        &self,
        service: &str,
        operation: &str,
        input: Value,
    ) -> CloudResult<T> {
        let args = self.build_args(service, operation, &input);
        debug!("Running: {} {} {}", self.options.binary, service, operation);
        let output = Command::new(&self.options.binary).args(&args).output()?;
        Self::handle_output(output)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        service: &str,
        operation: &str,
        input: Value,
    ) -> CloudResult<T> {
        let args = self.build_args(service, operation, &input);
        Self::handle_output(self.run(args).await?)
    }

    async fn run(&self, args: Vec<String>) -> CloudResult<Output> {
        debug!("Running: {} {}", self.options.binary, args[..2].join(" "));
        Ok(tokio::process::Command::new(&self.options.binary)
            .args(&args)
            .output()
            .await?)
    }

    fn handle_output<T: DeserializeOwned>(output: Output) -> CloudResult<T> {
        if !output.status.success() {
            return Err(parse_error(&String::from_utf8_lossy(&output.stderr)));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            return Ok(serde_json::from_value(Value::Null)?);
        }
        Ok(serde_json::from_str(&stdout)?)
    }

    fn request_input(request: &StackRequest, include_rollback: bool) -> Value {
        let mut input = json!({
            "StackName": request.name,
            "Tags": request.tags,
            "Capabilities": request.capabilities,
        });
        match &request.template {
            TemplateSource::Body(body) => input["TemplateBody"] = json!(body),
            TemplateSource::Url(url) => input["TemplateURL"] = json!(url),
        }
        if include_rollback {
            input["DisableRollback"] = json!(request.disable_rollback);
        }
        input
    }

    fn describe_stack_blocking(&self, name: &str) -> CloudResult<StackDescription> {
        let response: DescribeStacksResponse =
            self.call_blocking("cloudformation", "describe-stacks", json!({ "StackName": name }))?;
        single_stack(name, response)
    }

    async fn describe_stack(&self, name: &str) -> CloudResult<StackDescription> {
        let response: DescribeStacksResponse = self
            .call("cloudformation", "describe-stacks", json!({ "StackName": name }))
            .await?;
        single_stack(name, response)
    }
}

/// Turn the CLI's stderr into a service error when it has the usual shape.
pub fn parse_error(stderr: &str) -> CloudError {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(
            r"An error occurred \(([\w.]+)\) when calling the (\w+) operation(?: \(reached max retries: \d+\))?: (.*)",
        )
        .expect("error pattern is valid")
    });

    match pattern.captures(stderr) {
        Some(caps) => CloudError::service(&caps[1], caps[3].trim()),
        None => CloudError::CommandFailed(stderr.trim().to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct DescribeStacksResponse {
    #[serde(rename = "Stacks", default)]
    stacks: Vec<StackDescription>,
}

#[derive(Debug, Deserialize)]
struct StackDescription {
    #[serde(rename = "StackStatus")]
    status: StackStatus,
    #[serde(rename = "Outputs", default)]
    outputs: Vec<StackOutput>,
    #[serde(rename = "Tags", default)]
    tags: Vec<Tag>,
}

fn single_stack(name: &str, response: DescribeStacksResponse) -> CloudResult<StackDescription> {
    let mut stacks = response.stacks;
    if stacks.len() != 1 {
        return Err(CloudError::ResourceNotFound(format!("{} stack not found", name)));
    }
    Ok(stacks.remove(0))
}

#[derive(Debug, Deserialize)]
struct ListStacksResponse {
    #[serde(rename = "StackSummaries", default)]
    summaries: Vec<StackSummary>,
}

#[derive(Debug, Deserialize)]
struct DescribeResourcesResponse {
    #[serde(rename = "StackResources", default)]
    resources: Vec<StackResource>,
}

#[derive(Debug, Deserialize)]
struct DescribeImagesResponse {
    #[serde(rename = "Images", default)]
    images: Vec<IdHolder>,
}

#[derive(Debug, Deserialize)]
struct DescribeVpcsResponse {
    #[serde(rename = "Vpcs", default)]
    vpcs: Vec<IdHolder>,
}

#[derive(Debug, Deserialize)]
struct IdHolder {
    #[serde(rename = "ImageId", alias = "VpcId")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct HostedZonesResponse {
    #[serde(rename = "HostedZones", default)]
    zones: Vec<HostedZone>,
}

#[derive(Debug, Deserialize)]
struct HostedZone {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Name")]
    name: String,
}

#[async_trait]
impl StackApi for AwsCli {
    async fn describe_status(&self, name: &str) -> CloudResult<Option<StackStatus>> {
        match self.describe_stack(name).await {
            Ok(stack) => Ok(Some(stack.status)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn create_stack(&self, request: &StackRequest) -> CloudResult<()> {
        let _: Value = self
            .call(
                "cloudformation",
                "create-stack",
                Self::request_input(request, true),
            )
            .await?;
        Ok(())
    }

    async fn update_stack(&self, request: &StackRequest) -> CloudResult<()> {
        let _: Value = self
            .call(
                "cloudformation",
                "update-stack",
                Self::request_input(request, false),
            )
            .await?;
        Ok(())
    }

    async fn delete_stack(&self, name: &str) -> CloudResult<()> {
        let _: Value = self
            .call("cloudformation", "delete-stack", json!({ "StackName": name }))
            .await?;
        Ok(())
    }

    async fn list_events(&self, name: &str, next_token: Option<&str>) -> CloudResult<EventPage> {
        let mut input = json!({ "StackName": name });
        if let Some(token) = next_token {
            input["NextToken"] = json!(token);
        }
        // One page per call; the CLI would otherwise follow every token itself.
        let mut args = self.build_args("cloudformation", "describe-stack-events", &input);
        args.push("--no-paginate".to_string());
        let output = self.run(args).await?;
        let page: Option<EventPage> = Self::handle_output(output)?;
        Ok(page.unwrap_or_default())
    }

    async fn list_stacks(&self, status_filter: &[StackStatus]) -> CloudResult<Vec<StackSummary>> {
        let response: ListStacksResponse = self
            .call(
                "cloudformation",
                "list-stacks",
                json!({ "StackStatusFilter": status_filter }),
            )
            .await?;
        Ok(response.summaries)
    }

    async fn describe_outputs(&self, name: &str) -> CloudResult<Vec<StackOutput>> {
        Ok(self.describe_stack(name).await?.outputs)
    }

    async fn describe_tags(&self, name: &str) -> CloudResult<Vec<Tag>> {
        Ok(self.describe_stack(name).await?.tags)
    }

    async fn describe_resources(
        &self,
        name: &str,
        logical_id: Option<&str>,
    ) -> CloudResult<Vec<StackResource>> {
        let mut input = json!({ "StackName": name });
        if let Some(id) = logical_id {
            input["LogicalResourceId"] = json!(id);
        }
        let response: DescribeResourcesResponse = self
            .call("cloudformation", "describe-stack-resources", input)
            .await?;
        Ok(response.resources)
    }
}

#[async_trait]
impl BlobStore for AwsCli {
    async fn put(&self, bucket: &str, key: &str, body: &[u8]) -> CloudResult<String> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(body)?;
        file.flush()?;

        let mut args = self.build_args("s3api", "put-object", &Value::Null);
        args.extend([
            "--bucket".to_string(),
            bucket.to_string(),
            "--key".to_string(),
            key.to_string(),
            "--body".to_string(),
            file.path().to_string_lossy().into_owned(),
        ]);
        let _: Value = Self::handle_output(self.run(args).await?)?;

        let url = self.object_url(bucket, key);
        debug!("Uploaded template to {}", url);
        Ok(url)
    }
}

impl ResourceLookup for AwsCli {
    fn image_id(&self, name: &str) -> CloudResult<String> {
        let response: DescribeImagesResponse = self.call_blocking(
            "ec2",
            "describe-images",
            json!({ "Filters": [{ "Name": "name", "Values": [name] }] }),
        )?;
        response
            .images
            .into_iter()
            .next()
            .map(|image| image.id)
            .ok_or_else(|| CloudError::ResourceNotFound(format!("{} AMI not found", name)))
    }

    fn vpc_id(&self, name: &str) -> CloudResult<String> {
        let response: DescribeVpcsResponse = self.call_blocking(
            "ec2",
            "describe-vpcs",
            json!({ "Filters": [{ "Name": "tag:Name", "Values": [name] }] }),
        )?;
        let mut vpcs = response.vpcs;
        if vpcs.len() != 1 {
            return Err(CloudError::ResourceNotFound(format!("{} VPC not found", name)));
        }
        Ok(vpcs.remove(0).id)
    }

    fn zone_id(&self, name: &str) -> CloudResult<String> {
        let response: HostedZonesResponse = self.call_blocking(
            "route53",
            "list-hosted-zones-by-name",
            json!({ "DNSName": name, "MaxItems": "1" }),
        )?;
        response
            .zones
            .into_iter()
            .find(|zone| zone.name == name)
            .map(|zone| strip_zone_prefix(&zone.id).to_string())
            .ok_or_else(|| CloudError::ResourceNotFound(format!("{} zone not found", name)))
    }

    fn stack_output(&self, stack: &str, key: &str) -> CloudResult<String> {
        self.describe_stack_blocking(stack)?
            .outputs
            .into_iter()
            .find(|output| output.key == key)
            .map(|output| output.value)
            .ok_or_else(|| CloudError::ResourceNotFound(format!("{} output not found", key)))
    }

    fn stack_tag(&self, stack: &str, key: &str) -> CloudResult<String> {
        Ok(self
            .describe_stack_blocking(stack)?
            .tags
            .into_iter()
            .find(|tag| tag.key == key)
            .map(|tag| tag.value)
            .unwrap_or_default())
    }

    fn stack_resource(&self, stack: &str, logical_id: &str) -> CloudResult<String> {
        let response: DescribeResourcesResponse = self.call_blocking(
            "cloudformation",
            "describe-stack-resources",
            json!({ "StackName": stack, "LogicalResourceId": logical_id }),
        )?;
        response
            .resources
            .into_iter()
            .find_map(|resource| resource.physical_id)
            .ok_or_else(|| {
                CloudError::ResourceNotFound(format!("{} resource not found in {}", logical_id, stack))
            })
    }
}

fn strip_zone_prefix(id: &str) -> &str {
    id.strip_prefix(HOSTED_ZONE_PREFIX).unwrap_or(id)
}
