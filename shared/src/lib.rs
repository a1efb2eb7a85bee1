use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter, AsRefStr,
)]
pub enum WasteLabel {
    Organic,
    Inorganic,
}

impl WasteLabel {
    /// Maps a model output index onto its class, in the order the classifier was trained with.
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(WasteLabel::Organic),
            1 => Some(WasteLabel::Inorganic),
            _ => None,
        }
    }
}

/// Pre-filter statistics keyed by name, attached to results in debug mode.
pub type Diagnostics = BTreeMap<String, f64>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub timestamp: DateTime<Utc>,
    pub label: WasteLabel,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Classified {
        label: WasteLabel,
        confidence: f64,
    },
    Inconclusive {
        label: WasteLabel,
        confidence: f64,
    },
    Rejected {
        reason: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    Failed {
        error: String,
    },
    Unreadable {
        error: String,
    },
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileResult {
    pub file_name: String,
    #[serde(flatten)]
    pub outcome: FileOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Diagnostics>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResponse {
    pub session_id: Uuid,
    pub results: Vec<FileResult>,
    pub history: Vec<PredictionRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCreated {
    pub session_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub path: String,
    pub input_shape: Vec<usize>,
    pub class_labels: Vec<String>,
    pub confidence_threshold: f64,
}
