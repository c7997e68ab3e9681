//! End-to-end driver scenarios against the in-memory stack service.

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use stacks_cloud::mock::{
    CapturedCall, MockBlobStore, MockStack, MockStackApi, RecordingSleeper, StaticLookup,
};
use stacks_cloud::{CloudResult, ResourceLookup, StackStatus, Tag, TemplateSource};
use stacks_core::{
    content_digest, ArtifactTransport, ChangeAction, ChangeMode, CoreError, DeleteOutcome,
    DeployOutcome, DeployRequest, LookupFunctions, StackClient, StackDriver, StacksConfig,
    INLINE_BODY_LIMIT,
};
use tempfile::TempDir;

struct Harness {
    api: MockStackApi,
    store: MockBlobStore,
    driver: StackDriver,
    dir: TempDir,
}

impl Harness {
    fn new(api: MockStackApi) -> Self {
        let store = MockBlobStore::new();
        let sleeper = Arc::new(RecordingSleeper::new());
        let client = StackClient::new(Arc::new(api.clone())).with_sleeper(sleeper.clone());
        let transport = ArtifactTransport::new(Arc::new(store.clone()), sleeper);
        Self {
            api,
            store,
            driver: StackDriver::new(client, transport),
            dir: TempDir::new().unwrap(),
        }
    }

    fn with_lookups(mut self, lookups: LookupFunctions) -> Self {
        self.driver = self.driver.with_lookups(lookups);
        self
    }

    fn template(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }
}

fn config(yaml: &str) -> StacksConfig {
    StacksConfig::from_mapping(serde_yaml::from_str(yaml).unwrap())
}

const BUCKET_TEMPLATE: &str = "Resources:\n  Bucket:\n    Type: AWS::S3::Bucket\n    Properties:\n      BucketName: {{ bucket }}\n";

#[tokio::test]
async fn test_create_with_explicit_name_sends_protected_tags() {
    let h = Harness::new(MockStackApi::new());
    let template = h.template("bucket.yaml", BUCKET_TEMPLATE);
    let config = config("env: dev\nbucket: assets\n");

    let request =
        DeployRequest::new(&template, ChangeMode::Create).name(Some("my-stack".to_string()));
    let outcome = h.driver.deploy(&request, &config).await.unwrap();

    assert_eq!(
        outcome,
        DeployOutcome::Submitted {
            name: "my-stack".to_string(),
            action: ChangeAction::Created,
        }
    );

    let submitted = h.api.submitted_requests();
    assert_eq!(submitted.len(), 1);
    let body = match &submitted[0].template {
        TemplateSource::Body(body) => body.clone(),
        other => panic!("expected inline body, got {:?}", other),
    };
    assert!(body.contains("\"BucketName\": \"assets\""));
    assert_eq!(
        submitted[0].tags,
        vec![Tag::new("Env", "dev"), Tag::new("MD5Sum", content_digest(&body))]
    );
    assert_eq!(submitted[0].capabilities, vec!["CAPABILITY_IAM".to_string()]);
}

#[tokio::test]
async fn test_second_identical_update_is_benign() {
    let h = Harness::new(MockStackApi::new());
    let template = h.template("bucket.yaml", BUCKET_TEMPLATE);
    let config = config("env: dev\nbucket: assets\n");
    let create = DeployRequest::new(&template, ChangeMode::Create).name(Some("web".to_string()));
    let update = DeployRequest::new(&template, ChangeMode::Update).name(Some("web".to_string()));

    h.driver.deploy(&create, &config).await.unwrap();
    h.api.set_status("web", StackStatus::CreateComplete);

    let again = h.driver.deploy(&update, &config).await.unwrap();
    assert_eq!(
        again,
        DeployOutcome::Benign {
            name: "web".to_string(),
            message: "No updates are to be performed.".to_string(),
        }
    );
}

#[tokio::test]
async fn test_create_of_existing_stack_is_benign() {
    let api = MockStackApi::new().with_stack("web", MockStack::new(StackStatus::CreateComplete));
    let h = Harness::new(api);
    let template = h.template("bucket.yaml", BUCKET_TEMPLATE);

    let request = DeployRequest::new(&template, ChangeMode::Create).name(Some("web".to_string()));
    let outcome = h
        .driver
        .deploy(&request, &config("env: dev\nbucket: b\n"))
        .await
        .unwrap();

    assert!(
        matches!(outcome, DeployOutcome::Benign { ref message, .. } if message.contains("already exists"))
    );
}

#[tokio::test]
async fn test_update_missing_stack() {
    let config = config("env: dev\nbucket: b\n");

    // Without create-on-update the update is sent and its error is fatal.
    let h = Harness::new(MockStackApi::new());
    let template = h.template("bucket.yaml", BUCKET_TEMPLATE);
    let request = DeployRequest::new(&template, ChangeMode::Update).name(Some("web".to_string()));
    let err = h.driver.deploy(&request, &config).await.unwrap_err();
    assert!(err.to_string().contains("does not exist"));
    assert!(matches!(h.api.captured_calls()[0], CapturedCall::Update(_)));

    // With it, a tombstoned name is created afresh.
    let api = MockStackApi::new().with_stack("web", MockStack::new(StackStatus::DeleteComplete));
    let h = Harness::new(api);
    let template = h.template("bucket.yaml", BUCKET_TEMPLATE);
    let request = DeployRequest::new(&template, ChangeMode::Update)
        .name(Some("web".to_string()))
        .create_on_update(true);
    let outcome = h.driver.deploy(&request, &config).await.unwrap();
    assert_eq!(
        outcome,
        DeployOutcome::Submitted {
            name: "web".to_string(),
            action: ChangeAction::Created,
        }
    );
}

#[tokio::test]
async fn test_update_existing_with_create_on_update() {
    let api = MockStackApi::new().with_stack("web", MockStack::new(StackStatus::CreateComplete));
    let h = Harness::new(api);
    let template = h.template("bucket.yaml", BUCKET_TEMPLATE);
    let request = DeployRequest::new(&template, ChangeMode::Update)
        .name(Some("web".to_string()))
        .create_on_update(true);

    let outcome = h
        .driver
        .deploy(&request, &config("env: dev\nbucket: b\n"))
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        DeployOutcome::Submitted {
            action: ChangeAction::Updated,
            ..
        }
    ));
}

#[tokio::test]
async fn test_metadata_name_and_rollback() {
    let h = Harness::new(MockStackApi::new());
    let template = h.template(
        "meta.yaml",
        "name: {{ env }}-assets\ndisable_rollback: true\ntags:\n  - key: MD5Sum\n    value: forged\n  - key: Team\n    value: web\n---\nResources: {}\n",
    );

    let request = DeployRequest::new(&template, ChangeMode::Create);
    let outcome = h.driver.deploy(&request, &config("env: qa\n")).await.unwrap();
    assert_eq!(outcome.stack_name(), "qa-assets");

    let sent = &h.api.submitted_requests()[0];
    assert!(sent.disable_rollback);
    let md5 = sent.tags.iter().find(|t| t.key == "MD5Sum").unwrap();
    assert_ne!(md5.value, "forged");
    assert!(sent.tags.contains(&Tag::new("Team", "web")));
}

#[tokio::test]
async fn test_missing_name_fails_before_remote_calls() {
    let h = Harness::new(MockStackApi::new());
    let template = h.template("bucket.yaml", BUCKET_TEMPLATE);

    let request = DeployRequest::new(&template, ChangeMode::Create);
    let err = h
        .driver
        .deploy(&request, &config("env: dev\nbucket: b\n"))
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::MissingStackName));
    assert_eq!(h.api.call_count(), 0);
}

#[tokio::test]
async fn test_missing_variables_fail_before_remote_calls() {
    let h = Harness::new(MockStackApi::new());
    let template = h.template("bucket.yaml", BUCKET_TEMPLATE);

    let request = DeployRequest::new(&template, ChangeMode::Create).name(Some("web".to_string()));
    let err = h.driver.deploy(&request, &config("env: dev\n")).await.unwrap_err();

    assert_eq!(err.to_string(), "Required properties not set: bucket");
    assert_eq!(h.api.call_count(), 0);
}

#[tokio::test]
async fn test_dry_run_makes_no_remote_calls() {
    let h = Harness::new(MockStackApi::new());
    let template = h.template("bucket.yaml", BUCKET_TEMPLATE);
    let request = DeployRequest::new(&template, ChangeMode::Update)
        .name(Some("web".to_string()))
        .create_on_update(true)
        .dry_run(true);

    let outcome = h
        .driver
        .deploy(&request, &config("env: dev\nbucket: b\n"))
        .await
        .unwrap();

    let change = match outcome {
        DeployOutcome::DryRun(change) => change,
        other => panic!("unexpected outcome {:?}", other),
    };
    assert_eq!(change.name, "web");
    assert_eq!(change.size(), change.body.len());
    assert_eq!(change.tags.get("Env"), Some("dev"));
    assert_eq!(h.api.call_count(), 0);
    assert!(h.store.keys().is_empty());
}

#[tokio::test]
async fn test_rendering_is_deterministic() {
    let h = Harness::new(MockStackApi::new());
    let template = h.template("bucket.yaml", BUCKET_TEMPLATE);
    let request = DeployRequest::new(&template, ChangeMode::Create).name(Some("web".to_string()));
    let config = config("env: dev\nbucket: b\n");

    let first = h.driver.plan(&request, &config).unwrap();
    let second = h.driver.plan(&request, &config).unwrap();

    assert_eq!(first.body, second.body);
    assert_eq!(first.tags.get("MD5Sum"), second.tags.get("MD5Sum"));
}

/// Canonical body of `{"k": <n x's>}` is 13 bytes plus the value.
fn sized_template(size: usize) -> String {
    format!("k: {}\n", "x".repeat(size - 13))
}

#[tokio::test]
async fn test_size_boundary_through_driver() {
    let config = config("env: dev\nregion: eu-west-1\n");

    let h = Harness::new(MockStackApi::new());
    let inline = h.template("inline.yaml", &sized_template(INLINE_BODY_LIMIT));
    let request = DeployRequest::new(&inline, ChangeMode::Create).name(Some("inline".to_string()));
    h.driver.deploy(&request, &config).await.unwrap();
    match &h.api.submitted_requests()[0].template {
        TemplateSource::Body(body) => assert_eq!(body.len(), INLINE_BODY_LIMIT),
        other => panic!("expected inline body, got {:?}", other),
    }

    let offload = h.template("offload.yaml", &sized_template(INLINE_BODY_LIMIT + 1));
    let request = DeployRequest::new(&offload, ChangeMode::Create).name(Some("big".to_string()));
    h.driver.deploy(&request, &config).await.unwrap();

    let keys = h.store.keys();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0].0, "dev-stacks-eu-west-1");
    assert!(keys[0].1.starts_with("dev/big/"));
    match &h.api.submitted_requests()[1].template {
        TemplateSource::Url(url) => assert!(url.ends_with(&keys[0].1)),
        other => panic!("expected url, got {:?}", other),
    }
}

#[tokio::test]
async fn test_delete() {
    let api = MockStackApi::new().with_stack("web", MockStack::new(StackStatus::CreateComplete));
    let h = Harness::new(api);

    assert_eq!(h.driver.delete("web").await.unwrap(), DeleteOutcome::Deleted);
    assert!(matches!(
        h.driver.delete("web").await.unwrap(),
        DeleteOutcome::NotFound(message) if message.contains("does not exist")
    ));
}

#[tokio::test]
async fn test_delete_other_errors_are_fatal() {
    let api = MockStackApi::new()
        .with_stack("web", MockStack::new(StackStatus::CreateComplete))
        .with_error(stacks_cloud::CloudError::service("AccessDenied", "not authorized"));
    let h = Harness::new(api);

    let err = h.driver.delete("web").await.unwrap_err();
    assert_eq!(err.to_string(), "not authorized");
}

/// Static lookups that remember which thread served them.
struct ThreadRecordingLookup {
    inner: StaticLookup,
    threads: Mutex<Vec<ThreadId>>,
}

impl ThreadRecordingLookup {
    fn record(&self) {
        self.threads.lock().unwrap().push(thread::current().id());
    }
}

impl ResourceLookup for ThreadRecordingLookup {
    fn image_id(&self, name: &str) -> CloudResult<String> {
        self.record();
        self.inner.image_id(name)
    }

    fn vpc_id(&self, name: &str) -> CloudResult<String> {
        self.record();
        self.inner.vpc_id(name)
    }

    fn zone_id(&self, name: &str) -> CloudResult<String> {
        self.record();
        self.inner.zone_id(name)
    }

    fn stack_output(&self, stack: &str, key: &str) -> CloudResult<String> {
        self.record();
        self.inner.stack_output(stack, key)
    }

    fn stack_tag(&self, stack: &str, key: &str) -> CloudResult<String> {
        self.record();
        self.inner.stack_tag(stack, key)
    }

    fn stack_resource(&self, stack: &str, logical_id: &str) -> CloudResult<String> {
        self.record();
        self.inner.stack_resource(stack, logical_id)
    }
}

#[tokio::test]
async fn test_lookups_run_off_the_async_executor() {
    let lookup = Arc::new(ThreadRecordingLookup {
        inner: StaticLookup::new().with_value("vpc", "main", "vpc-123"),
        threads: Mutex::new(Vec::new()),
    });
    let h = Harness::new(MockStackApi::new()).with_lookups(LookupFunctions::new(lookup.clone()));
    let template = h.template(
        "net.yaml",
        "Resources:\n  Sg:\n    Type: AWS::EC2::SecurityGroup\n    Properties:\n      VpcId: {{ get_vpc_id(vpc) }}\n",
    );
    let config = config("env: dev\nvpc: main\n");

    let request = DeployRequest::new(&template, ChangeMode::Create).name(Some("net".to_string()));
    let outcome = h.driver.deploy(&request, &config).await.unwrap();
    assert!(matches!(outcome, DeployOutcome::Submitted { .. }));

    match &h.api.submitted_requests()[0].template {
        TemplateSource::Body(body) => assert!(body.contains("\"VpcId\": \"vpc-123\"")),
        other => panic!("expected inline body, got {:?}", other),
    }

    let threads = lookup.threads.lock().unwrap().clone();
    assert_eq!(threads.len(), 1);
    assert_ne!(threads[0], thread::current().id());
}
