//! Workflow commands driven through the server's `workspace/executeCommand`
//! entry point, with a recording host and an in-memory release source.

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};
use tower_lsp::lsp_types::*;
use tower_lsp::LanguageServer;

use aelys_ls::backend::Backend;
use aelys_ls::commands;
use aelys_ls::compiler::storage::binary_file_name;
use aelys_ls::compiler::TargetPlatform;
use aelys_ls::host::{OUTPUT_TERMINAL, REPL_TERMINAL};
use aelys_ls::test_utils::{release, FakeReleases, HostEvent, RecordingHost};

async fn start(storage: &Path, host: Arc<RecordingHost>, asset: &str) -> Backend {
    let releases = Arc::new(FakeReleases::new(vec![
        release("v0.4.0", &[asset]),
        release("v0.3.2", &[asset]),
    ]));
    let backend = Backend::with_parts(host, releases);
    backend
        .initialize(InitializeParams {
            initialization_options: Some(json!({
                "aelys": {
                    "compiler": { "storageDir": storage.to_string_lossy() },
                    "updates": { "checkOnStartup": false }
                }
            })),
            ..Default::default()
        })
        .await
        .unwrap();
    backend
}

async fn run_command(backend: &Backend, command: &str, arguments: Vec<Value>) -> Option<Value> {
    backend
        .execute_command(ExecuteCommandParams {
            command: command.to_string(),
            arguments,
            work_done_progress_params: Default::default(),
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn declined_install_then_update_then_run() {
    let Some(platform) = TargetPlatform::detect() else {
        return;
    };
    let dir = tempfile::tempdir().unwrap();
    let storage = dir.path().join("store");
    let script = dir.path().join("hello.aelys");
    std::fs::write(&script, "needs std.io\nio.print(\"hi\")\n").unwrap();
    let script_uri = json!(Url::from_file_path(&script).unwrap().to_string());

    let host = Arc::new(RecordingHost::new().with_answers([None]));
    let backend = start(&storage, host.clone(), platform.asset_name()).await;

    // missing binary, install declined: nothing reaches a terminal
    run_command(&backend, commands::RUN, vec![script_uri.clone()]).await;
    assert!(host.terminal_lines(OUTPUT_TERMINAL).is_empty());
    assert!(!storage.join(binary_file_name()).exists());

    let installed = run_command(&backend, commands::UPDATE, vec![]).await;
    assert_eq!(installed, Some(json!("v0.4.0")));
    assert!(host
        .events()
        .contains(&HostEvent::Info("Aelys v0.4.0 installed successfully!".to_string())));

    run_command(&backend, commands::RUN, vec![script_uri]).await;
    let binary = storage.join(binary_file_name());
    let lines = host.terminal_lines(OUTPUT_TERMINAL);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains(&format!("\"{}\"", binary.display())));
    assert!(lines[0].contains("--allow-caps=fs"));
    assert!(lines[0].ends_with(&format!("\"{}\"", script.display())));

    let state: Value =
        serde_json::from_str(&std::fs::read_to_string(storage.join("state.json")).unwrap())
            .unwrap();
    assert_eq!(state["installedVersion"], "v0.4.0");
}

#[tokio::test]
async fn install_specific_version_and_repl() {
    let Some(platform) = TargetPlatform::detect() else {
        return;
    };
    let dir = tempfile::tempdir().unwrap();
    let host = Arc::new(RecordingHost::new());
    let backend = start(dir.path(), host.clone(), platform.asset_name()).await;

    let installed = run_command(&backend, commands::INSTALL_VERSION, vec![json!("v0.3.2")]).await;
    assert_eq!(installed, Some(json!("v0.3.2")));

    run_command(&backend, commands::REFRESH_STATUS, vec![]).await;
    assert_eq!(backend.host_context().status().as_deref(), Some("Aelys v0.3.2"));

    run_command(&backend, commands::OPEN_REPL, vec![]).await;
    run_command(&backend, commands::SEND_TO_REPL, vec![json!("let x = 1")]).await;
    let repl = host.terminal_lines(REPL_TERMINAL);
    assert_eq!(repl.len(), 2);
    assert!(repl[0].ends_with("\" repl"));
    assert_eq!(repl[1], "let x = 1");

    backend.shutdown().await.unwrap();
    assert!(host
        .events()
        .contains(&HostEvent::TerminalDispose(REPL_TERMINAL.to_string())));
}

#[tokio::test]
async fn unknown_version_reports_missing_asset() {
    let Some(platform) = TargetPlatform::detect() else {
        return;
    };
    let dir = tempfile::tempdir().unwrap();
    let storage = dir.path().join("store");
    let host = Arc::new(RecordingHost::new());
    let backend = start(&storage, host.clone(), platform.asset_name()).await;

    let installed = run_command(&backend, commands::INSTALL_VERSION, vec![json!("v0.0.1")]).await;
    assert_eq!(installed, None);
    assert!(host.events().contains(&HostEvent::Error(format!(
        "Failed to install Aelys: Binary {} not found for version v0.0.1.",
        platform.asset_name()
    ))));
    assert!(!storage.exists());
}
