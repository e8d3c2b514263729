//! Dictation through an external recognizer program.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use lc_core::Error;

use crate::config::VoiceConfig;
use crate::events::{UiEvent, UiSender, VoiceEvent};

pub const SPEECH_UNAVAILABLE: &str = "Speech recognition is not available on this system.";

/// Starts recognition sessions that report [`VoiceEvent`]s tagged with
/// their session id.
pub trait SpeechRecognizer: Send + Sync {
    fn name(&self) -> &str;

    fn start(&self, session: u64, tx: UiSender) -> Result<RecognitionHandle, Error>;
}

/// A running session. Stopping or dropping it ends the session.
#[derive(Debug)]
pub struct RecognitionHandle {
    session: u64,
    cancel: CancellationToken,
}

impl RecognitionHandle {
    pub fn new(session: u64, cancel: CancellationToken) -> Self {
        Self { session, cancel }
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for RecognitionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Runs a program whose stdout lines are cumulative transcripts.
pub struct CommandRecognizer {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandRecognizer {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl SpeechRecognizer for CommandRecognizer {
    fn name(&self) -> &str {
        self.program
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("recognizer")
    }

    fn start(&self, session: u64, tx: UiSender) -> Result<RecognitionHandle, Error> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::speech(format!("{}: {}", self.program.display(), e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::speech("recognizer stdout not captured"))?;

        info!(session, program = %self.program.display(), "Dictation started");

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let send = move |event| {
            let _ = tx.send(UiEvent::Voice { session, event });
        };

        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        let _ = child.kill().await;
                        debug!(session, "Dictation stopped");
                        send(VoiceEvent::Ended);
                        return;
                    }
                    line = lines.next_line() => match line {
                        Ok(Some(text)) => {
                            let text = text.trim();
                            if !text.is_empty() {
                                send(VoiceEvent::Partial(text.to_string()));
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            let _ = child.kill().await;
                            send(VoiceEvent::Failed(e.to_string()));
                            return;
                        }
                    }
                }
            }

            match child.wait().await {
                Ok(status) if status.success() => send(VoiceEvent::Ended),
                Ok(status) => send(VoiceEvent::Failed(format!("recognizer exited with {}", status))),
                Err(e) => send(VoiceEvent::Failed(e.to_string())),
            }
        });

        Ok(RecognitionHandle::new(session, cancel))
    }
}

/// The configured recognizer, if its program can be found.
pub fn detect(config: &VoiceConfig) -> Option<Arc<dyn SpeechRecognizer>> {
    let command = config.command.as_deref().map(str::trim).filter(|c| !c.is_empty())?;
    match find_program(command) {
        Some(program) => {
            debug!(program = %program.display(), "Speech recognizer found");
            Some(Arc::new(CommandRecognizer::new(program, config.args.clone())))
        }
        None => {
            warn!(command, "Speech recognizer not found on PATH");
            None
        }
    }
}

fn find_program(command: &str) -> Option<PathBuf> {
    let path = Path::new(command);
    if path.components().count() > 1 {
        return path.is_file().then(|| path.to_path_buf());
    }

    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(command))
        .find(|candidate| candidate.is_file())
}
