//! Messages delivered to the UI task.
//!
//! Background tasks never touch component state. They report through a
//! [`UiSender`] and the event loop applies what they send, in order.

use tokio::sync::mpsc;

use lc_core::{InstalledModel, PullStatus};

pub type UiSender = mpsc::UnboundedSender<UiEvent>;
pub type UiReceiver = mpsc::UnboundedReceiver<UiEvent>;

pub fn channel() -> (UiSender, UiReceiver) {
    mpsc::unbounded_channel()
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    /// The prompt input submitted trimmed, non-empty text.
    PromptSubmitted(String),
    /// Result of the startup reachability probe.
    Probed(Result<Vec<InstalledModel>, String>),
    /// A fresh installed-model listing.
    ModelsListed(Result<Vec<InstalledModel>, String>),
    /// Progress of one chat turn.
    Chat { turn: u64, event: ChatEvent },
    Install(InstallEvent),
    /// A delete finished. The error carries the alert text.
    Deleted {
        name: String,
        result: Result<(), String>,
    },
    /// Progress of one dictation session.
    Voice { session: u64, event: VoiceEvent },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// Response headers arrived.
    Opened,
    Delta(String),
    Done,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum InstallEvent {
    Status(PullStatus),
    Failed { alert: String, status: String },
    Succeeded(String),
    /// Always the last event of an install.
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceEvent {
    /// The cumulative transcript so far.
    Partial(String),
    Ended,
    Failed(String),
}
