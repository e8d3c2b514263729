//! Mapping of model download statuses to a progress percentage.

/// A named step of a model download, in the order the server reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum InstallStage {
    Pulling,
    Verifying,
    WritingManifest,
    Success,
}

impl InstallStage {
    pub const ALL: [InstallStage; 4] = [
        InstallStage::Pulling,
        InstallStage::Verifying,
        InstallStage::WritingManifest,
        InstallStage::Success,
    ];

    /// Recognize a status string. Layer downloads report `pulling <digest>`,
    /// so every `pulling` status belongs to the first stage.
    pub fn from_status(status: &str) -> Option<Self> {
        match status {
            "verifying sha256 digest" => Some(InstallStage::Verifying),
            "writing manifest" => Some(InstallStage::WritingManifest),
            "success" => Some(InstallStage::Success),
            s if s == "pulling" || s.starts_with("pulling ") => Some(InstallStage::Pulling),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        match self {
            InstallStage::Pulling => 0,
            InstallStage::Verifying => 1,
            InstallStage::WritingManifest => 2,
            InstallStage::Success => 3,
        }
    }

    pub fn percent(self) -> f64 {
        (self.index() + 1) as f64 / Self::ALL.len() as f64 * 100.0
    }
}

impl std::fmt::Display for InstallStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstallStage::Pulling => write!(f, "pulling"),
            InstallStage::Verifying => write!(f, "verifying sha256 digest"),
            InstallStage::WritingManifest => write!(f, "writing manifest"),
            InstallStage::Success => write!(f, "success"),
        }
    }
}

/// Progress of one install. Never moves backwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstallProgress {
    percent: f64,
    stage: Option<InstallStage>,
}

impl InstallProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a status string. Unrecognized statuses change nothing.
    pub fn apply(&mut self, status: &str) -> Option<InstallStage> {
        let Some(stage) = InstallStage::from_status(status) else {
            tracing::trace!(status, "Status does not map to an install stage");
            return None;
        };
        if self.stage.map_or(true, |current| stage > current) {
            self.stage = Some(stage);
            self.percent = stage.percent();
        }
        Some(stage)
    }

    pub fn percent(&self) -> f64 {
        self.percent
    }

    pub fn is_complete(&self) -> bool {
        self.stage == Some(InstallStage::Success)
    }
}
