//! Context configuration.

use serde::{Deserialize, Serialize};

/// Options for a [`Context`](crate::reactive::Context).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Label attached to every pass log line.
    pub label: String,

    /// Emit a `debug!` summary after every update pass.
    pub trace_passes: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            label: "context".to_string(),
            trace_passes: false,
        }
    }
}

impl ContextConfig {
    /// Parse configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_trace_passes(mut self, enabled: bool) -> Self {
        self.trace_passes = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config = ContextConfig::from_json(r#"{"trace_passes": true}"#).unwrap();
        assert_eq!(config.label, "context");
        assert!(config.trace_passes);
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(ContextConfig::from_json("{label:").is_err());
    }

    #[test]
    fn builder_methods() {
        let config = ContextConfig::default()
            .with_label("inbox")
            .with_trace_passes(true);
        assert_eq!(config.label, "inbox");
        assert!(config.trace_passes);
    }
}
