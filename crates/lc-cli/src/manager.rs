//! Model management: listing, installing and deleting models.
//!
//! Network work runs in spawned tasks that report [`UiEvent::ModelsListed`],
//! [`UiEvent::Install`] and [`UiEvent::Deleted`]. Operations that raise an
//! alert return its text; the shell shows it.

use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, info, warn};
use tui_input::{Input, InputRequest};

use lc_core::{format_size, InferenceServer, InstallProgress, InstalledModel, PullEvent, PullStatus, Store};

use crate::events::{InstallEvent, UiEvent, UiSender};

pub const INVALID_NAME: &str = "Please enter a valid model name.";
pub const STARTING_DOWNLOAD: &str = "Starting download...";
pub const INSTALL_FAILED: &str = "Installation failed.";
pub const INSTALL_NETWORK_FAILED: &str = "Installation failed due to a network issue.";
pub const INSTALL_IN_PROGRESS: &str = "An installation is already in progress.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ManagerFocus {
    #[default]
    Installed,
    NameInput,
}

#[derive(Debug, Clone, Default)]
pub struct ManagerState {
    pub visible: bool,
    pub installed: Vec<InstalledModel>,
    pub selected_row: usize,
    pub focus: ManagerFocus,
    pub name_input: Input,
    /// 0 to 100
    pub progress: f64,
    pub status_message: Option<String>,
    /// Name of the model being installed.
    pub installing: Option<String>,
    pub pending_delete: Option<String>,
    pub deleting: bool,
}

impl ManagerState {
    pub fn selected_model(&self) -> Option<&InstalledModel> {
        self.installed.get(self.selected_row)
    }
}

pub struct ModelManager {
    state: Store<ManagerState>,
    progress: InstallProgress,
    inference: Arc<dyn InferenceServer>,
    tx: UiSender,
}

impl ModelManager {
    pub fn new(inference: Arc<dyn InferenceServer>, tx: UiSender) -> Self {
        Self {
            state: Store::new(ManagerState::default()),
            progress: InstallProgress::new(),
            inference,
            tx,
        }
    }

    pub fn state(&self) -> &ManagerState {
        &self.state
    }

    pub fn take_dirty(&mut self) -> bool {
        self.state.take_dirty()
    }

    pub fn is_visible(&self) -> bool {
        self.state.visible
    }

    pub fn open(&mut self) {
        self.state.write().visible = true;
        self.refresh();
    }

    pub fn close(&mut self) {
        let state = self.state.write();
        state.visible = false;
        state.pending_delete = None;
    }

    /// Fetch the installed list in the background.
    pub fn refresh(&self) {
        let inference = Arc::clone(&self.inference);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = inference.list_models().await.map_err(|e| e.user_message());
            let _ = tx.send(UiEvent::ModelsListed(result));
        });
    }

    /// A failed listing keeps the previous one.
    pub fn apply_listed(&mut self, result: &Result<Vec<InstalledModel>, String>) {
        match result {
            Ok(models) => {
                let state = self.state.write();
                state.installed = models.clone();
                state.selected_row = state.selected_row.min(models.len().saturating_sub(1));
            }
            Err(e) => warn!(error = %e, "Failed to fetch installed models"),
        }
    }

    pub fn switch_focus(&mut self) {
        let state = self.state.write();
        state.focus = match state.focus {
            ManagerFocus::Installed => ManagerFocus::NameInput,
            ManagerFocus::NameInput => ManagerFocus::Installed,
        };
    }

    pub fn select_previous(&mut self) {
        if self.state.selected_row > 0 {
            self.state.write().selected_row -= 1;
        }
    }

    pub fn select_next(&mut self) {
        if self.state.selected_row + 1 < self.state.installed.len() {
            self.state.write().selected_row += 1;
        }
    }

    pub fn edit_name(&mut self, request: InputRequest) {
        self.state.write().name_input.handle(request);
    }

    /// Install whatever is in the name field.
    pub fn install_from_input(&mut self) -> Option<String> {
        let name = self.state.name_input.value().to_string();
        self.install(&name)
    }

    /// Start downloading `name`. Returns an alert if the name is empty.
    pub fn install(&mut self, name: &str) -> Option<String> {
        let name = name.trim();
        if name.is_empty() {
            return Some(INVALID_NAME.to_string());
        }
        if self.state.installing.is_some() {
            self.state.write().status_message = Some(INSTALL_IN_PROGRESS.to_string());
            return None;
        }

        self.progress = InstallProgress::new();
        let state = self.state.write();
        state.progress = 0.0;
        state.status_message = Some(STARTING_DOWNLOAD.to_string());
        state.installing = Some(name.to_string());

        info!(model = name, "Installing model");
        tokio::spawn(run_install(
            Arc::clone(&self.inference),
            name.to_string(),
            self.tx.clone(),
        ));
        None
    }

    pub fn apply_install(&mut self, event: InstallEvent) -> Option<String> {
        match event {
            InstallEvent::Status(status) => {
                self.progress.apply(&status.status);
                let state = self.state.write();
                state.progress = self.progress.percent();
                state.status_message = Some(describe_status(&status));
                None
            }
            InstallEvent::Failed { alert, status } => {
                self.state.write().status_message = Some(status);
                Some(alert)
            }
            InstallEvent::Succeeded(name) => {
                info!(model = %name, "Model installed");
                self.refresh();
                Some(format!("Model \"{}\" has been successfully installed.", name))
            }
            InstallEvent::Finished => {
                self.state.write().installing = None;
                None
            }
        }
    }

    /// Remember `name` as the delete target. No network traffic.
    pub fn request_delete(&mut self, name: &str) {
        self.state.write().pending_delete = Some(name.to_string());
    }

    pub fn request_delete_selected(&mut self) {
        if let Some(name) = self.state.selected_model().map(|m| m.name.clone()) {
            self.request_delete(&name);
        }
    }

    /// Delete the pending target. Ignored while a delete is in flight.
    pub fn confirm_delete(&mut self) -> bool {
        if self.state.deleting {
            debug!("Delete already in flight");
            return false;
        }
        let Some(name) = self.state.pending_delete.clone() else {
            return false;
        };
        self.state.write().deleting = true;

        let inference = Arc::clone(&self.inference);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = inference.delete(&name).await.map_err(|e| {
                if e.is_connectivity() {
                    format!("Network error: {}", e.user_message())
                } else {
                    format!("Failed to remove model: {}", e.user_message())
                }
            });
            let _ = tx.send(UiEvent::Deleted { name, result });
        });
        true
    }

    pub fn cancel_delete(&mut self) {
        self.state.write().pending_delete = None;
    }

    pub fn apply_deleted(&mut self, name: &str, result: Result<(), String>) -> Option<String> {
        let state = self.state.write();
        state.deleting = false;
        state.pending_delete = None;

        match result {
            Ok(()) => {
                info!(model = name, "Model removed");
                self.refresh();
                None
            }
            Err(alert) => {
                warn!(model = name, error = %alert, "Failed to remove model");
                Some(alert)
            }
        }
    }
}

/// Status line for a download step, with byte counts when known.
fn describe_status(status: &PullStatus) -> String {
    match (status.completed, status.total) {
        (Some(completed), Some(total)) if total > 0 => format!(
            "{} ({} / {})",
            status.status,
            format_size(completed),
            format_size(total)
        ),
        _ => status.status.clone(),
    }
}

async fn run_install(inference: Arc<dyn InferenceServer>, name: String, tx: UiSender) {
    let send = |event| {
        let _ = tx.send(UiEvent::Install(event));
    };
    let network_failure = |message: String| InstallEvent::Failed {
        alert: format!("Network error: {}", message),
        status: INSTALL_NETWORK_FAILED.to_string(),
    };
    let install_failure = |message: String| InstallEvent::Failed {
        alert: format!("Failed to install model: {}", message),
        status: INSTALL_FAILED.to_string(),
    };

    match inference.pull(&name).await {
        Ok(mut stream) => {
            while let Some(item) = stream.next().await {
                match item {
                    Ok(PullEvent::Status(status)) => {
                        let success = status.is_success();
                        send(InstallEvent::Status(status));
                        if success {
                            send(InstallEvent::Succeeded(name.clone()));
                            break;
                        }
                    }
                    Ok(PullEvent::Error { message }) => {
                        warn!(model = %name, error = %message, "Install failed");
                        send(install_failure(message));
                        break;
                    }
                    Err(e) => {
                        warn!(model = %name, error = %e, "Install stream broke");
                        send(network_failure(e.user_message()));
                        break;
                    }
                }
            }
        }
        Err(e) if e.is_connectivity() => {
            warn!(model = %name, error = %e, "Install request failed");
            send(network_failure(e.user_message()));
        }
        Err(e) => {
            warn!(model = %name, error = %e, "Install rejected");
            send(install_failure(e.user_message()));
        }
    }

    send(InstallEvent::Finished);
}
