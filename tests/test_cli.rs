mod common;

use common::daemon;
use tokio::process::Command;

async fn git_workdir() -> tempfile::TempDir {
    let workdir = tempfile::tempdir().unwrap();
    let status = Command::new("git")
        .args(["init", "-q"])
        .arg(workdir.path())
        .status()
        .await
        .unwrap();
    assert!(status.success());
    workdir
}

#[tokio::test]
async fn test_clean_exits_on_unsupported_architecture() {
    let daemon = daemon::start(vec![
        ("/_ping", "OK".to_string()),
        ("/info", r#"{"Name":"robot1","Architecture":"sparc64","NCPU":2}"#.to_string()),
    ])
    .await;
    let workdir = git_workdir().await;

    let output = Command::new(env!("CARGO_BIN_EXE_fleet-docker"))
        .args(["clean", "-H", &daemon.address, "-C"])
        .arg(workdir.path())
        .env_remove("DOCKER_REGISTRY")
        .output()
        .await
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Architecture sparc64 not supported!"), "{stderr}");
    assert!(daemon.request_for("/images").is_none());
}

#[tokio::test]
async fn test_clean_with_known_architecture_succeeds() {
    let daemon = daemon::start(vec![
        ("/_ping", "OK".to_string()),
        ("/info", r#"{"Name":"robot1","Architecture":"aarch64","NCPU":4}"#.to_string()),
        ("/images/json", "[]".to_string()),
    ])
    .await;
    let workdir = git_workdir().await;

    let output = Command::new(env!("CARGO_BIN_EXE_fleet-docker"))
        .args(["clean", "-H", &daemon.address, "-C"])
        .arg(workdir.path())
        .env_remove("DOCKER_REGISTRY")
        .output()
        .await
        .unwrap();

    assert_eq!(output.status.code(), Some(0), "{}", String::from_utf8_lossy(&output.stderr));
    let lookup = daemon.request_for("/images/json").unwrap();
    assert!(lookup.lines().next().unwrap().contains("arm64v8"));
}
