mod common;

use common::FakeEngine;
use fleet_docker::docker::{endpoint_architecture, endpoint_ncpus};
use fleet_docker::error::FleetError;
use fleet_docker::image::{build_if_not_exist, pull_if_not_exist, pull_image, push_image};
use fleet_docker::logging::Logger;
use fleet_docker::progress::LayerEvent;

fn pull_events() -> Vec<LayerEvent> {
    [
        r#"{"status":"Pulling from duckietown/dt-core","id":"daffy-amd64"}"#,
        r#"{"status":"Already exists","id":"1a2b"}"#,
        r#"{"status":"Pulling fs layer","id":"3c4d"}"#,
        r#"{"status":"Downloading","progressDetail":{"current":10,"total":100},"id":"3c4d"}"#,
        r#"{"status":"Pull complete","id":"3c4d"}"#,
        r#"{"status":"Digest: sha256:abc"}"#,
        r#"{"status":"Status: Downloaded newer image for duckietown/dt-core:daffy-amd64"}"#,
    ]
    .iter()
    .map(|line| LayerEvent::from_json_line(line).unwrap())
    .collect()
}

#[tokio::test]
async fn test_pull_consumes_whole_stream() {
    let engine = FakeEngine::with_arch("x86_64").with_transfer_events(pull_events());
    pull_image(&engine, "duckietown/dt-core:daffy-amd64", true, &Logger::new_quiet())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_stream_error_is_a_distinct_failure() {
    let engine = FakeEngine::with_arch("x86_64")
        .with_transfer_events(pull_events())
        .with_transfer_error("unauthorized: authentication required");
    let result = push_image(&engine, "duckietown/dt-core:daffy-amd64", true, &Logger::new_quiet()).await;
    match result {
        Err(FleetError::Transfer { image, message }) => {
            assert_eq!(image, "duckietown/dt-core:daffy-amd64");
            assert!(message.contains("unauthorized"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_pull_if_not_exist_skips_present_image() {
    let engine = FakeEngine::with_arch("x86_64").with_images(&["app:latest"]);
    let logger = Logger::new_quiet();
    assert!(!pull_if_not_exist(&engine, "app:latest", &logger).await.unwrap());
    assert!(pull_if_not_exist(&engine, "other:latest", &logger).await.unwrap());
}

#[tokio::test]
async fn test_endpoint_architecture_lookup() {
    let logger = Logger::new_quiet();
    let engine = FakeEngine::with_arch("x86_64");
    assert_eq!(endpoint_architecture(&engine, &logger).await.unwrap(), "amd64");

    let engine = FakeEngine::with_arch("armv7l");
    assert_eq!(endpoint_architecture(&engine, &logger).await.unwrap(), "arm32v7");

    let engine = FakeEngine::with_arch("sparc");
    assert!(matches!(
        endpoint_architecture(&engine, &logger).await,
        Err(FleetError::UnsupportedArchitecture(_))
    ));
}

#[tokio::test]
async fn test_endpoint_ncpus_defaults_to_one() {
    let logger = Logger::new_quiet();
    assert_eq!(endpoint_ncpus(&FakeEngine::with_arch("x86_64"), &logger).await, 4);
    assert_eq!(endpoint_ncpus(&FakeEngine::default(), &logger).await, 1);
}

fn build_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("Dockerfile"), "FROM alpine\nCOPY run.sh /run.sh\n").unwrap();
    std::fs::write(dir.path().join("run.sh"), "#!/bin/sh\necho hi\n").unwrap();
    dir
}

#[tokio::test]
async fn test_build_runs_when_image_missing() {
    let dir = build_dir();
    let engine = FakeEngine::default().with_build_logs(&["Step 1/2 : FROM alpine\n", "\u{1b}[1mSuccessfully built 42\u{1b}[0m\n"]);

    let built = build_if_not_exist(&engine, dir.path(), "camera:dev", &Logger::new_quiet())
        .await
        .unwrap();

    assert!(built);
    let builds = engine.builds.lock().unwrap();
    assert_eq!(builds.len(), 1);
    assert_eq!(builds[0].0, "camera:dev");
    assert_eq!(builds[0].1, "Dockerfile");
    assert!(builds[0].2 > 0);
}

#[tokio::test]
async fn test_build_skipped_when_image_present() {
    let dir = build_dir();
    let engine = FakeEngine::default().with_images(&["camera:dev"]);

    let built = build_if_not_exist(&engine, dir.path(), "camera:dev", &Logger::new_quiet())
        .await
        .unwrap();

    assert!(!built);
    assert!(engine.builds.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_build_error_is_returned() {
    let dir = build_dir();
    let engine = FakeEngine::default().with_build_error("The command '/bin/sh -c make' returned a non-zero code: 2");

    let result = build_if_not_exist(&engine, dir.path(), "camera:dev", &Logger::new_quiet()).await;
    assert!(matches!(result, Err(FleetError::Build { ref tag, .. }) if tag == "camera:dev"));
}

#[tokio::test]
async fn test_build_requires_dockerfile() {
    let dir = tempfile::tempdir().unwrap();
    let engine = FakeEngine::default();

    let result = build_if_not_exist(&engine, dir.path(), "camera:dev", &Logger::new_quiet()).await;
    assert!(matches!(result, Err(FleetError::Build { .. })));
    assert!(engine.builds.lock().unwrap().is_empty());
}
