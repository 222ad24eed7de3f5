//! Push notification payload derived from a verdict.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::AnalysisVerdict;

/// Device-agnostic push message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    pub data: BTreeMap<String, String>,
}

impl From<&AnalysisVerdict> for PushMessage {
    fn from(verdict: &AnalysisVerdict) -> Self {
        let data = BTreeMap::from([
            ("alert".to_string(), verdict.alert.to_string()),
            ("attacker".to_string(), verdict.attacker.clone()),
            ("text".to_string(), verdict.text.clone()),
            ("confidence".to_string(), format!("{:.2}", verdict.confidence)),
            ("original_text".to_string(), verdict.original_text.clone()),
        ]);
        Self {
            title: format!("Alert: {}", verdict.attacker),
            body: verdict.text.clone(),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_message_from_verdict() {
        let verdict = AnalysisVerdict {
            alert: true,
            attacker: "missile".to_string(),
            text: "launch detected".to_string(),
            confidence: 0.9,
            original_text: "launch detected".to_string(),
        };
        let message = PushMessage::from(&verdict);
        assert_eq!(message.title, "Alert: missile");
        assert_eq!(message.body, "launch detected");
        assert_eq!(message.data["confidence"], "0.90");
        assert_eq!(message.data["alert"], "true");
        assert_eq!(message.data.len(), 5);
    }
}
