//! Drives the `sentinel` binary against a mock service and a temp ledger.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::json;
use tempfile::{TempDir, tempdir};
use wiremock::MockServer;

use crate::common::{SIGNER, mount_prediction, predict_url, warning_diagnosis};

struct Workspace {
    dir: TempDir,
    config: PathBuf,
}

impl Workspace {
    fn new(server: &MockServer) -> Self {
        Self::with_backend(server, "sqlite")
    }

    fn with_backend(server: &MockServer, backend: &str) -> Self {
        let dir = tempdir().unwrap();
        let config = dir.path().join("config.toml");
        let ledger = dir.path().join("ledger.db");
        std::fs::write(
            &config,
            format!(
                "[prediction]\nendpoint = \"{}\"\n\n\
                 [ledger]\nbackend = \"{backend}\"\npath = \"{}\"\n\n\
                 [signer]\naccount = \"{SIGNER}\"\nrequire_approval = false\n",
                predict_url(server),
                ledger.display(),
            ),
        )
        .unwrap();
        Self { dir, config }
    }

    async fn run(&self, args: &[&str]) -> Output {
        let home = self.dir.path().to_path_buf();
        let config = self.config.clone();
        let args: Vec<String> = args.iter().map(ToString::to_string).collect();
        tokio::task::spawn_blocking(move || sentinel(&home, &config, &args))
            .await
            .unwrap()
    }
}

fn sentinel(home: &Path, config: &Path, args: &[String]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sentinel"))
        .args(args)
        .arg("--config")
        .arg(config)
        .current_dir(home)
        .env("HOME", home)
        .env_remove("SENTINEL_PREDICT_URL")
        .env_remove("SENTINEL_SIGNER")
        .env_remove("SENTINEL_LEDGER_PATH")
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[tokio::test(flavor = "multi_thread")]
async fn predict_commit_then_list_records() {
    let server = MockServer::start().await;
    mount_prediction(&server, 200, warning_diagnosis()).await;
    let workspace = Workspace::new(&server);

    let predicted = workspace.run(&["predict", "--commit"]).await;
    assert!(predicted.status.success(), "{predicted:?}");
    let out = stdout(&predicted);
    assert!(out.contains("Condition:  Warning"), "{out}");
    assert!(out.contains("  - replace tool"), "{out}");
    assert!(out.contains("Requesting signer authorization..."), "{out}");
    assert!(out.contains(&format!("Connected as {SIGNER}")), "{out}");
    assert!(out.contains("Confirmed: "), "{out}");

    let listed = workspace.run(&["records"]).await;
    assert!(listed.status.success(), "{listed:?}");
    let out = stdout(&listed);
    assert!(out.starts_with("#0"), "{out}");
    assert!(out.contains("MACH-001"), "{out}");
    assert!(out.contains("Warning"), "{out}");
    assert!(out.contains("replace tool"), "{out}");
}

#[tokio::test(flavor = "multi_thread")]
async fn predict_without_commit_leaves_ledger_empty() {
    let server = MockServer::start().await;
    mount_prediction(&server, 200, warning_diagnosis()).await;
    let workspace = Workspace::new(&server);

    let predicted = workspace.run(&["predict"]).await;
    assert!(predicted.status.success(), "{predicted:?}");
    assert!(!stdout(&predicted).contains("Confirmed"));

    let listed = workspace.run(&["records"]).await;
    assert_eq!(stdout(&listed), "No records on the ledger.\n");
}

#[tokio::test(flavor = "multi_thread")]
async fn service_rejection_exits_with_detail() {
    let server = MockServer::start().await;
    mount_prediction(&server, 422, json!({"detail": "torque out of range"})).await;
    let workspace = Workspace::new(&server);

    let output = workspace.run(&["predict", "--commit", "--torque", "900"]).await;

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error: torque out of range"), "{stderr}");
    assert!(!stdout(&output).contains("Requesting signer authorization"));
}

#[tokio::test(flavor = "multi_thread")]
async fn records_from_memory_ledger_is_an_error_not_an_empty_list() {
    let server = MockServer::start().await;
    let workspace = Workspace::with_backend(&server, "memory");

    let listed = workspace.run(&["records"]).await;

    assert!(!listed.status.success());
    assert!(!stdout(&listed).contains("No records on the ledger"));
    let stderr = String::from_utf8_lossy(&listed.stderr);
    assert!(stderr.contains("Error: ledger reader unavailable"), "{stderr}");
}
