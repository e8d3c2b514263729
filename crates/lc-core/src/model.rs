//! Model records reported by the inference server.

use serde::{Deserialize, Serialize};

const MIB: f64 = 1024.0 * 1024.0;
const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Response body of `GET /api/tags`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagsResponse {
    #[serde(default)]
    pub models: Vec<InstalledModel>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelDetails {
    #[serde(default)]
    pub families: Option<Vec<String>>,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub parameter_size: String,
    #[serde(default)]
    pub quantization_level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstalledModel {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub details: ModelDetails,
}

impl InstalledModel {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            details: ModelDetails::default(),
        }
    }

    pub fn with_details(mut self, details: ModelDetails) -> Self {
        self.details = details;
        self
    }

    /// Families joined for display, `N/A` when the server reported none.
    pub fn families_label(&self) -> String {
        match &self.details.families {
            Some(families) if !families.is_empty() => families.join(", "),
            _ => "N/A".to_string(),
        }
    }

    pub fn size_label(&self) -> String {
        format_size(self.size)
    }

    pub fn summary(&self) -> ModelSummary {
        ModelSummary {
            value: self.name.clone(),
            label: format!("{} | {}", self.name, format_size(self.size)),
        }
    }
}

/// An entry of the model selection control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSummary {
    pub value: String,
    pub label: String,
}

impl From<&InstalledModel> for ModelSummary {
    fn from(model: &InstalledModel) -> Self {
        model.summary()
    }
}

/// Humanize a byte count in binary units with two decimals.
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes = bytes as f64;
    if bytes >= GIB {
        format!("{:.2} GB", bytes / GIB)
    } else {
        format!("{:.2} MB", bytes / MIB)
    }
}
