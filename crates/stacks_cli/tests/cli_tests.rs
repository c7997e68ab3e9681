//! Command line behavior that needs no remote service.

use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

use tempfile::TempDir;

fn stacks_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_stacks"))
}

/// Run the binary inside `dir` with a clean environment.
fn run(dir: &TempDir, args: &[&str]) -> Output {
    Command::new(stacks_bin())
        .args(args)
        .current_dir(dir.path())
        .env_remove("STACKS_ENV")
        .env_remove("AWS_DEFAULT_REGION")
        .env_remove("AWS_DEFAULT_PROFILE")
        .env_remove("RUST_LOG")
        .output()
        .expect("run stacks")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

const CONFIG: &str = "\
region: eu-west-1
bucket: base-assets
environments:
  prod:
    bucket: prod-assets
";

const BUCKET_TEMPLATE: &str = "\
Resources:
  Bucket:
    Type: AWS::S3::Bucket
    Properties:
      BucketName: {{ bucket }}
";

fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("config.yaml"), CONFIG).unwrap();
    fs::write(dir.path().join("bucket.yaml"), BUCKET_TEMPLATE).unwrap();
    dir
}

#[test]
fn test_config_applies_environment_overlay() {
    let dir = workspace();

    let output = run(&dir, &["--env", "prod", "config", "bucket"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output).trim(), "prod-assets");

    let output = run(&dir, &["--env", "dev", "config", "bucket"]);
    assert_eq!(stdout(&output).trim(), "base-assets");
}

#[test]
fn test_config_as_json() {
    let dir = workspace();

    let output = run(&dir, &["--env", "prod", "config", "--output", "json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let config: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(config["env"], "prod");
    assert_eq!(config["region"], "eu-west-1");
    assert!(config.get("environments").is_none());
}

#[test]
fn test_create_dry_run() {
    let dir = workspace();

    let output = run(
        &dir,
        &["--env", "dev", "create", "-t", "bucket.yaml", "web", "--dry-run"],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    assert!(stdout(&output).contains("\"BucketName\": \"base-assets\""));
    let err = stderr(&output);
    assert!(err.contains("Name: web"));
    assert!(err.contains("Tags: Env=dev, MD5Sum="));
    assert!(err.contains("Template size: "));
}

#[test]
fn test_property_overrides_config() {
    let dir = workspace();

    let output = run(
        &dir,
        &[
            "--env", "dev", "update", "-t", "bucket.yaml", "web", "--dry-run", "-p",
            "bucket=from-cli",
        ],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("\"BucketName\": \"from-cli\""));
}

#[test]
fn test_missing_variables_fail() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("bucket.yaml"), BUCKET_TEMPLATE).unwrap();

    let output = run(
        &dir,
        &["--env", "dev", "create", "-t", "bucket.yaml", "web", "--dry-run"],
    );
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Required properties not set: bucket"));
    assert!(stdout(&output).is_empty());
}

#[test]
fn test_missing_stack_name_fails() {
    let dir = workspace();

    let output = run(&dir, &["--env", "dev", "create", "-t", "bucket.yaml", "--dry-run"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output)
        .contains("Stack name must be specified via command line argument or stack metadata."));
}

#[test]
fn test_invalid_property_fails() {
    let dir = workspace();

    let output = run(
        &dir,
        &["--env", "dev", "create", "-t", "bucket.yaml", "web", "--dry-run", "-p", "novalue"],
    );
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Invalid property 'novalue'"));
}

#[test]
fn test_create_requires_environment() {
    let dir = workspace();

    let output = run(&dir, &["create", "-t", "bucket.yaml", "web", "--dry-run"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Environment is not set"));
}

#[test]
fn test_remote_commands_require_region() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("bucket.yaml"), BUCKET_TEMPLATE).unwrap();

    let output = run(
        &dir,
        &["--env", "dev", "create", "-t", "bucket.yaml", "web", "-p", "bucket=b"],
    );
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Region is not set"));
}
