//
// backend.rs
//
// tower-lsp server: document sync, language features and workflow commands
//

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tower_lsp::jsonrpc::{Error, Result};
use tower_lsp::lsp_types::*;
use tower_lsp::Client;
use tower_lsp::LanguageServer;
use tower_lsp::LspService;
use tower_lsp::Server;

use crate::commands::{self, CommandContext};
use crate::compiler::{ReleaseClient, ReleaseSource, Toolchain};
use crate::config::{parse_config, AelysConfig};
use crate::handlers;
use crate::host::{Host, HostContext, LspHost};
use crate::state::{DocumentSnapshot, WorldState};
use crate::stdlib::StandardLibrary;

pub struct Backend {
    state: Arc<RwLock<WorldState>>,
    host: Arc<HostContext>,
    releases: Arc<dyn ReleaseSource>,
    /// Cancelled on shutdown; long-running installs and compiles watch it
    cancel: CancellationToken,
}

fn load_stdlib() -> Arc<StandardLibrary> {
    match StandardLibrary::builtin() {
        Ok(stdlib) => {
            log::info!(
                "Loaded {} standard library signatures",
                stdlib.entries().count()
            );
            Arc::new(stdlib)
        }
        Err(e) => {
            log::warn!("Standard library tables rejected: {}", e);
            Arc::new(StandardLibrary::default())
        }
    }
}

impl Backend {
    pub fn new(client: Client) -> Self {
        Self::with_parts(
            Arc::new(LspHost::new(client)),
            Arc::new(ReleaseClient::new()),
        )
    }

    /// Backend over an arbitrary host and release source.
    pub fn with_parts(host: Arc<dyn Host>, releases: Arc<dyn ReleaseSource>) -> Self {
        Self {
            state: Arc::new(RwLock::new(WorldState::new(load_stdlib()))),
            host: Arc::new(HostContext::new(host)),
            releases,
            cancel: CancellationToken::new(),
        }
    }

    pub fn host_context(&self) -> &HostContext {
        &self.host
    }

    async fn config(&self) -> AelysConfig {
        self.state.read().await.config.clone()
    }

    async fn snapshot(&self, uri: &Url) -> Option<DocumentSnapshot> {
        self.state.read().await.snapshot(uri)
    }

    fn apply_settings(state: &mut WorldState, settings: &Value) {
        match parse_config(settings) {
            Some(config) => state.config = config,
            None => log::trace!("No Aelys settings in configuration payload"),
        }
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        log::info!("Initializing aelys-ls");

        let mut state = self.state.write().await;

        if let Some(folders) = params.workspace_folders {
            for folder in folders {
                log::info!("Adding workspace folder: {}", folder.uri);
                state.workspace_folders.push(folder.uri);
            }
        } else if let Some(root_uri) = params.root_uri {
            log::info!("Adding root URI as workspace folder: {}", root_uri);
            state.workspace_folders.push(root_uri);
        }

        if let Some(options) = params.initialization_options.as_ref() {
            Self::apply_settings(&mut state, options);
        }

        drop(state);

        Ok(InitializeResult {
            capabilities: server_capabilities(),
            server_info: Some(ServerInfo {
                name: String::from("aelys-ls"),
                version: Some(String::from(env!("CARGO_PKG_VERSION"))),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        log::info!("aelys-ls initialized");

        let config = self.config().await;
        let host = Arc::clone(&self.host);
        let releases = Arc::clone(&self.releases);
        let cancel = self.cancel.clone();

        // Prompts block on the user; keep them off the request path
        tokio::spawn(async move {
            let toolchain = Toolchain::from_config(&config, releases);
            toolchain.refresh_status(&host).await;
            if config.check_updates_on_startup {
                toolchain.smart_update_check(&host, &cancel).await;
            }
        });
    }

    async fn shutdown(&self) -> Result<()> {
        log::info!("aelys-ls shutting down");
        self.cancel.cancel();
        self.host.dispose_terminals().await;
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let doc = params.text_document;
        log::trace!("didOpen {}", doc.uri);
        self.state
            .write()
            .await
            .open_document(doc.uri, &doc.text, Some(doc.version));
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let mut state = self.state.write().await;
        for change in params.content_changes {
            state.apply_change(&uri, change);
        }
        if let Some(doc) = state.documents.get_mut(&uri) {
            doc.version = Some(params.text_document.version);
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        log::trace!("didClose {}", params.text_document.uri);
        self.state
            .write()
            .await
            .close_document(&params.text_document.uri);
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        log::trace!("Configuration changed");
        let mut state = self.state.write().await;
        Self::apply_settings(&mut state, &params.settings);
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let pos = params.text_document_position_params;
        let Some(snapshot) = self.snapshot(&pos.text_document.uri).await else {
            return Ok(None);
        };
        Ok(handlers::hover(&snapshot, pos.position).await)
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let pos = params.text_document_position;
        let Some(snapshot) = self.snapshot(&pos.text_document.uri).await else {
            return Ok(None);
        };
        Ok(handlers::completion(&snapshot, pos.position).await)
    }

    async fn signature_help(&self, params: SignatureHelpParams) -> Result<Option<SignatureHelp>> {
        let pos = params.text_document_position_params;
        let Some(snapshot) = self.snapshot(&pos.text_document.uri).await else {
            return Ok(None);
        };
        Ok(handlers::signature_help(&snapshot, pos.position).await)
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let pos = params.text_document_position_params;
        let Some(snapshot) = self.snapshot(&pos.text_document.uri).await else {
            return Ok(None);
        };
        Ok(handlers::goto_definition(&snapshot, pos.position).await)
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> Result<Option<DocumentSymbolResponse>> {
        let Some(snapshot) = self.snapshot(&params.text_document.uri).await else {
            return Ok(None);
        };
        Ok(handlers::document_symbol(&snapshot))
    }

    async fn execute_command(&self, params: ExecuteCommandParams) -> Result<Option<Value>> {
        let config = self.config().await;
        let toolchain = Toolchain::from_config(&config, Arc::clone(&self.releases));
        let ctx = CommandContext {
            host: &self.host,
            toolchain: &toolchain,
            config: &config,
            cancel: &self.cancel,
            windows: cfg!(windows),
        };
        commands::execute(&ctx, &params.command, &params.arguments)
            .await
            .map_err(|e| Error::invalid_params(e.to_string()))
    }
}

pub fn server_capabilities() -> ServerCapabilities {
    ServerCapabilities {
        text_document_sync: Some(TextDocumentSyncCapability::Kind(
            TextDocumentSyncKind::INCREMENTAL,
        )),
        document_symbol_provider: Some(OneOf::Left(true)),
        completion_provider: Some(CompletionOptions {
            trigger_characters: Some(vec![String::from("."), String::from("@")]),
            ..Default::default()
        }),
        hover_provider: Some(HoverProviderCapability::Simple(true)),
        signature_help_provider: Some(SignatureHelpOptions {
            trigger_characters: Some(vec![String::from("("), String::from(",")]),
            ..Default::default()
        }),
        definition_provider: Some(OneOf::Left(true)),
        execute_command_provider: Some(ExecuteCommandOptions {
            commands: commands::ALL_COMMANDS
                .iter()
                .map(|c| c.to_string())
                .collect(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub async fn start_lsp() -> anyhow::Result<()> {
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(Backend::new);
    Server::new(stdin, stdout, socket).serve(service).await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FakeReleases, HostEvent, RecordingHost};
    use serde_json::json;

    fn backend() -> (Backend, Arc<RecordingHost>) {
        let host = Arc::new(RecordingHost::new());
        let backend = Backend::with_parts(host.clone(), Arc::new(FakeReleases::new(vec![])));
        (backend, host)
    }

    fn position(uri: &Url, line: u32, character: u32) -> TextDocumentPositionParams {
        TextDocumentPositionParams {
            text_document: TextDocumentIdentifier { uri: uri.clone() },
            position: Position::new(line, character),
        }
    }

    async fn open(backend: &Backend, uri: &Url, text: &str) {
        backend
            .did_open(DidOpenTextDocumentParams {
                text_document: TextDocumentItem {
                    uri: uri.clone(),
                    language_id: "aelys".to_string(),
                    version: 1,
                    text: text.to_string(),
                },
            })
            .await;
    }

    #[test]
    fn test_capabilities_advertise_commands_and_triggers() {
        let caps = server_capabilities();
        let commands = caps.execute_command_provider.unwrap().commands;
        assert!(commands.contains(&"aelys.run".to_string()));
        assert_eq!(commands.len(), commands::ALL_COMMANDS.len());
        let triggers = caps.completion_provider.unwrap().trigger_characters.unwrap();
        assert_eq!(triggers, vec![".".to_string(), "@".to_string()]);
    }

    #[tokio::test]
    async fn test_initialize_reads_initialization_options() {
        let (backend, _) = backend();
        let params = InitializeParams {
            initialization_options: Some(json!({ "aelys": { "run": { "arguments": "--allow-caps=net" } } })),
            ..Default::default()
        };
        let result = backend.initialize(params).await.unwrap();
        assert_eq!(result.server_info.unwrap().name, "aelys-ls");
        assert_eq!(backend.config().await.run_arguments, "--allow-caps=net");
    }

    #[tokio::test]
    async fn test_signature_help_after_edit() {
        let (backend, _) = backend();
        let uri = Url::parse("file:///work/main.aelys").unwrap();
        open(&backend, &uri, "needs std.math as m\n").await;
        backend
            .did_change(DidChangeTextDocumentParams {
                text_document: VersionedTextDocumentIdentifier {
                    uri: uri.clone(),
                    version: 2,
                },
                content_changes: vec![TextDocumentContentChangeEvent {
                    range: Some(Range::new(Position::new(1, 0), Position::new(1, 0))),
                    range_length: None,
                    text: "m.clamp(x, ".to_string(),
                }],
            })
            .await;

        let help = backend
            .signature_help(SignatureHelpParams {
                context: None,
                text_document_position_params: position(&uri, 1, 11),
                work_done_progress_params: Default::default(),
            })
            .await
            .unwrap()
            .unwrap();
        assert!(help.signatures[0].label.starts_with("m.clamp("));
        assert_eq!(help.active_parameter, Some(1));
    }

    #[tokio::test]
    async fn test_requests_on_closed_document() {
        let (backend, _) = backend();
        let uri = Url::parse("file:///work/main.aelys").unwrap();
        open(&backend, &uri, "fn f() {}").await;
        backend
            .did_close(DidCloseTextDocumentParams {
                text_document: TextDocumentIdentifier { uri: uri.clone() },
            })
            .await;
        let hover = backend
            .hover(HoverParams {
                text_document_position_params: position(&uri, 0, 3),
                work_done_progress_params: Default::default(),
            })
            .await
            .unwrap();
        assert!(hover.is_none());
    }

    #[tokio::test]
    async fn test_configuration_change_and_command() {
        let (backend, host) = backend();
        backend
            .did_change_configuration(DidChangeConfigurationParams {
                settings: json!({ "aelys": { "compiler": { "storageDir": "/nonexistent/aelys-store" } } }),
            })
            .await;
        let result = backend
            .execute_command(ExecuteCommandParams {
                command: commands::REFRESH_STATUS.to_string(),
                arguments: vec![],
                work_done_progress_params: Default::default(),
            })
            .await
            .unwrap();
        assert_eq!(result, None);
        assert_eq!(
            host.events(),
            vec![HostEvent::Status("Aelys: not installed".to_string())]
        );

        let err = backend
            .execute_command(ExecuteCommandParams {
                command: "aelys.unknown".to_string(),
                arguments: vec![],
                work_done_progress_params: Default::default(),
            })
            .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_shutdown_disposes_terminals() {
        let (backend, host) = backend();
        backend
            .host_context()
            .send_to_terminal(crate::host::REPL_TERMINAL, "1", true)
            .await;
        backend.shutdown().await.unwrap();
        assert!(backend.cancel.is_cancelled());
        assert!(host
            .events()
            .contains(&HostEvent::TerminalDispose(crate::host::REPL_TERMINAL.to_string())));
    }
}
