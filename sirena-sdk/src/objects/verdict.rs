//! Classifier verdicts.

use serde::{Deserialize, Serialize};

const UNKNOWN_ATTACKER: &str = "UNKNOWN";
const NO_TEXT: &str = "<No text>";
const NO_ORIGINAL_TEXT: &str = "<No original text>";

/// Verdict JSON exactly as the classifier returns it.
///
/// Every field except `alert` is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerdictPayload {
    #[serde(default)]
    pub alert: bool,
    #[serde(default)]
    pub attacker: Option<String>,
    #[serde(default)]
    pub trigger: Option<String>,
    #[serde(default)]
    pub risk: Option<f64>,
}

/// Normalized verdict handed to the notification sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisVerdict {
    pub alert: bool,
    pub attacker: String,
    pub text: String,
    pub confidence: f64,
    pub original_text: String,
}

impl From<VerdictPayload> for AnalysisVerdict {
    fn from(payload: VerdictPayload) -> Self {
        Self {
            alert: payload.alert,
            attacker: payload
                .attacker
                .unwrap_or_else(|| UNKNOWN_ATTACKER.to_string()),
            text: payload
                .trigger
                .clone()
                .unwrap_or_else(|| NO_TEXT.to_string()),
            confidence: payload.risk.unwrap_or(0.0),
            original_text: payload
                .trigger
                .unwrap_or_else(|| NO_ORIGINAL_TEXT.to_string()),
        }
    }
}
