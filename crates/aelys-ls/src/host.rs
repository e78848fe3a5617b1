//
// host.rs
//
// Editor UI reached over the LSP connection: messages, prompts, terminals,
// progress and the status item
//

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tower_lsp::lsp_types::notification::Notification;
use tower_lsp::lsp_types::request::Request;
use tower_lsp::lsp_types::{
    MessageActionItem, MessageType, NumberOrString, ProgressParams, ProgressParamsValue,
    WorkDoneProgress, WorkDoneProgressBegin, WorkDoneProgressCreateParams, WorkDoneProgressEnd,
    WorkDoneProgressReport,
};
use tower_lsp::Client;

pub const OUTPUT_TERMINAL: &str = "Aelys Output";
pub const REPL_TERMINAL: &str = "Aelys REPL";

/// Handle for one work-done progress sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressId(pub String);

#[async_trait]
pub trait Host: Send + Sync {
    async fn show_info(&self, message: &str);
    async fn show_warning(&self, message: &str);
    async fn show_error(&self, message: &str);

    /// Ask the user to choose one of `choices`. `None` when dismissed.
    async fn prompt(&self, message: &str, choices: &[&str]) -> Option<String>;

    /// Pick one of `items`. `None` when dismissed.
    async fn pick(&self, title: &str, items: &[String]) -> Option<String>;

    /// Free-text input prefilled with `default`. `None` when cancelled.
    async fn input(&self, prompt: &str, default: &str) -> Option<String>;

    async fn show_read_only(&self, content: &str, language: &str);

    /// Send a line to the named terminal, creating it if needed.
    async fn terminal_send(&self, name: &str, text: &str, focus: bool);
    async fn terminal_dispose(&self, name: &str);

    async fn progress_begin(&self, title: &str) -> ProgressId;
    async fn progress_report(&self, id: &ProgressId, message: &str);
    async fn progress_end(&self, id: &ProgressId, message: Option<&str>);

    async fn set_status(&self, text: &str);
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputParams {
    pub prompt: String,
    pub value: String,
}

pub enum InputRequest {}

impl Request for InputRequest {
    type Params = InputParams;
    type Result = Option<String>;
    const METHOD: &'static str = "aelys/input";
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowReadOnlyParams {
    pub content: String,
    pub language: String,
}

pub enum ShowReadOnly {}

impl Notification for ShowReadOnly {
    type Params = ShowReadOnlyParams;
    const METHOD: &'static str = "aelys/showReadOnly";
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalSendParams {
    pub name: String,
    pub text: String,
    /// `false` keeps keyboard focus in the editor
    pub focus: bool,
}

pub enum TerminalSend {}

impl Notification for TerminalSend {
    type Params = TerminalSendParams;
    const METHOD: &'static str = "aelys/terminalSend";
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TerminalDisposeParams {
    pub name: String,
}

pub enum TerminalDispose {}

impl Notification for TerminalDispose {
    type Params = TerminalDisposeParams;
    const METHOD: &'static str = "aelys/terminalDispose";
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusParams {
    pub text: String,
}

pub enum StatusNotification {}

impl Notification for StatusNotification {
    type Params = StatusParams;
    const METHOD: &'static str = "aelys/status";
}

/// [`Host`] over a tower-lsp client.
pub struct LspHost {
    client: Client,
    next_progress: AtomicU64,
}

impl LspHost {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            next_progress: AtomicU64::new(0),
        }
    }

    async fn send_progress(&self, id: &ProgressId, progress: WorkDoneProgress) {
        self.client
            .send_notification::<tower_lsp::lsp_types::notification::Progress>(ProgressParams {
                token: NumberOrString::String(id.0.clone()),
                value: ProgressParamsValue::WorkDone(progress),
            })
            .await;
    }
}

#[async_trait]
impl Host for LspHost {
    async fn show_info(&self, message: &str) {
        self.client.show_message(MessageType::INFO, message).await;
    }

    async fn show_warning(&self, message: &str) {
        self.client.show_message(MessageType::WARNING, message).await;
    }

    async fn show_error(&self, message: &str) {
        self.client.show_message(MessageType::ERROR, message).await;
    }

    async fn prompt(&self, message: &str, choices: &[&str]) -> Option<String> {
        let actions = choices
            .iter()
            .map(|c| MessageActionItem {
                title: c.to_string(),
                properties: Default::default(),
            })
            .collect();
        match self
            .client
            .show_message_request(MessageType::INFO, message, Some(actions))
            .await
        {
            Ok(choice) => choice.map(|item| item.title),
            Err(err) => {
                log::warn!("showMessageRequest failed: {}", err);
                None
            }
        }
    }

    async fn pick(&self, title: &str, items: &[String]) -> Option<String> {
        let choices: Vec<&str> = items.iter().map(String::as_str).collect();
        self.prompt(title, &choices).await
    }

    async fn input(&self, prompt: &str, default: &str) -> Option<String> {
        let params = InputParams {
            prompt: prompt.to_string(),
            value: default.to_string(),
        };
        match self.client.send_request::<InputRequest>(params).await {
            Ok(value) => value,
            Err(err) => {
                log::warn!("{} failed: {}", InputRequest::METHOD, err);
                None
            }
        }
    }

    async fn show_read_only(&self, content: &str, language: &str) {
        self.client
            .send_notification::<ShowReadOnly>(ShowReadOnlyParams {
                content: content.to_string(),
                language: language.to_string(),
            })
            .await;
    }

    async fn terminal_send(&self, name: &str, text: &str, focus: bool) {
        self.client
            .send_notification::<TerminalSend>(TerminalSendParams {
                name: name.to_string(),
                text: text.to_string(),
                focus,
            })
            .await;
    }

    async fn terminal_dispose(&self, name: &str) {
        self.client
            .send_notification::<TerminalDispose>(TerminalDisposeParams {
                name: name.to_string(),
            })
            .await;
    }

    async fn progress_begin(&self, title: &str) -> ProgressId {
        let n = self.next_progress.fetch_add(1, Ordering::Relaxed);
        let id = ProgressId(format!("aelys-progress-{}", n));
        let create = WorkDoneProgressCreateParams {
            token: NumberOrString::String(id.0.clone()),
        };
        if let Err(err) = self
            .client
            .send_request::<tower_lsp::lsp_types::request::WorkDoneProgressCreate>(create)
            .await
        {
            log::warn!("Client refused progress token: {}", err);
        }
        self.send_progress(
            &id,
            WorkDoneProgress::Begin(WorkDoneProgressBegin {
                title: title.to_string(),
                cancellable: Some(false),
                message: None,
                percentage: None,
            }),
        )
        .await;
        id
    }

    async fn progress_report(&self, id: &ProgressId, message: &str) {
        self.send_progress(
            id,
            WorkDoneProgress::Report(WorkDoneProgressReport {
                cancellable: Some(false),
                message: Some(message.to_string()),
                percentage: None,
            }),
        )
        .await;
    }

    async fn progress_end(&self, id: &ProgressId, message: Option<&str>) {
        self.send_progress(
            id,
            WorkDoneProgress::End(WorkDoneProgressEnd {
                message: message.map(str::to_string),
            }),
        )
        .await;
    }

    async fn set_status(&self, text: &str) {
        self.client
            .send_notification::<StatusNotification>(StatusParams {
                text: text.to_string(),
            })
            .await;
    }
}

/// Server-side view of the widgets the host owns: which terminals exist and
/// what the status item shows.
pub struct HostContext {
    host: Arc<dyn Host>,
    terminals: Mutex<BTreeSet<String>>,
    status: Mutex<Option<String>>,
}

impl HostContext {
    pub fn new(host: Arc<dyn Host>) -> Self {
        Self {
            host,
            terminals: Mutex::new(BTreeSet::new()),
            status: Mutex::new(None),
        }
    }

    pub fn host(&self) -> &dyn Host {
        self.host.as_ref()
    }

    pub async fn send_to_terminal(&self, name: &str, text: &str, focus: bool) {
        if let Ok(mut terminals) = self.terminals.lock() {
            if terminals.insert(name.to_string()) {
                log::info!("Creating terminal '{}'", name);
            }
        }
        self.host.terminal_send(name, text, focus).await;
    }

    pub fn has_terminal(&self, name: &str) -> bool {
        self.terminals
            .lock()
            .map(|t| t.contains(name))
            .unwrap_or(false)
    }

    /// Dispose every terminal created through this context.
    pub async fn dispose_terminals(&self) {
        let names: Vec<String> = match self.terminals.lock() {
            Ok(mut terminals) => std::mem::take(&mut *terminals).into_iter().collect(),
            Err(_) => Vec::new(),
        };
        for name in names {
            self.host.terminal_dispose(&name).await;
        }
    }

    pub async fn set_status(&self, text: &str) {
        if let Ok(mut status) = self.status.lock() {
            *status = Some(text.to_string());
        }
        self.host.set_status(text).await;
    }

    pub fn status(&self) -> Option<String> {
        self.status.lock().ok().and_then(|s| s.clone())
    }
}
