//
// test_utils/recording_host.rs
//
// A Host that records every call and replays scripted answers
//

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::host::{Host, ProgressId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Info(String),
    Warning(String),
    Error(String),
    Prompt(String),
    Pick(String),
    Input(String),
    ReadOnly { content: String, language: String },
    TerminalSend { name: String, text: String, focus: bool },
    TerminalDispose(String),
    ProgressBegin(String),
    ProgressReport(String),
    ProgressEnd,
    Status(String),
}

/// Answers to `prompt`, `pick` and `input` are taken in order from the
/// scripted queue; an exhausted queue behaves like a dismissed dialog.
#[derive(Default)]
pub struct RecordingHost {
    events: Mutex<Vec<HostEvent>>,
    answers: Mutex<VecDeque<Option<String>>>,
    next_progress: AtomicU64,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_answers<'a>(self, answers: impl IntoIterator<Item = Option<&'a str>>) -> Self {
        if let Ok(mut queue) = self.answers.lock() {
            queue.extend(answers.into_iter().map(|a| a.map(str::to_string)));
        }
        self
    }

    pub fn events(&self) -> Vec<HostEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn terminal_lines(&self, terminal: &str) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                HostEvent::TerminalSend { name, text, .. } if name == terminal => Some(text),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: HostEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn next_answer(&self) -> Option<String> {
        self.answers.lock().unwrap().pop_front().flatten()
    }
}

#[async_trait]
impl Host for RecordingHost {
    async fn show_info(&self, message: &str) {
        self.record(HostEvent::Info(message.to_string()));
    }

    async fn show_warning(&self, message: &str) {
        self.record(HostEvent::Warning(message.to_string()));
    }

    async fn show_error(&self, message: &str) {
        self.record(HostEvent::Error(message.to_string()));
    }

    async fn prompt(&self, message: &str, _choices: &[&str]) -> Option<String> {
        self.record(HostEvent::Prompt(message.to_string()));
        self.next_answer()
    }

    async fn pick(&self, title: &str, _items: &[String]) -> Option<String> {
        self.record(HostEvent::Pick(title.to_string()));
        self.next_answer()
    }

    async fn input(&self, prompt: &str, _default: &str) -> Option<String> {
        self.record(HostEvent::Input(prompt.to_string()));
        self.next_answer()
    }

    async fn show_read_only(&self, content: &str, language: &str) {
        self.record(HostEvent::ReadOnly {
            content: content.to_string(),
            language: language.to_string(),
        });
    }

    async fn terminal_send(&self, name: &str, text: &str, focus: bool) {
        self.record(HostEvent::TerminalSend {
            name: name.to_string(),
            text: text.to_string(),
            focus,
        });
    }

    async fn terminal_dispose(&self, name: &str) {
        self.record(HostEvent::TerminalDispose(name.to_string()));
    }

    async fn progress_begin(&self, title: &str) -> ProgressId {
        self.record(HostEvent::ProgressBegin(title.to_string()));
        ProgressId(self.next_progress.fetch_add(1, Ordering::Relaxed).to_string())
    }

    async fn progress_report(&self, _id: &ProgressId, message: &str) {
        self.record(HostEvent::ProgressReport(message.to_string()));
    }

    async fn progress_end(&self, _id: &ProgressId, _message: Option<&str>) {
        self.record(HostEvent::ProgressEnd);
    }

    async fn set_status(&self, text: &str) {
        self.record(HostEvent::Status(text.to_string()));
    }
}
