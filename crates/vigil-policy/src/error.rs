#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("invalid rule document: {reason}")]
    InvalidRuleDocument { reason: String },

    #[error("invalid pattern in group '{group}': {pattern}: {source}")]
    InvalidPattern {
        group: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to read rule document from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<serde_json::Error> for PolicyError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidRuleDocument {
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_error_maps_to_invalid_document() {
        let err = serde_json::from_str::<serde_json::Value>("{nope").unwrap_err();
        let policy_err: PolicyError = err.into();
        assert!(matches!(
            policy_err,
            PolicyError::InvalidRuleDocument { .. }
        ));
    }

    #[test]
    fn invalid_pattern_display_names_group() {
        let source = regex::Regex::new("(").unwrap_err();
        let err = PolicyError::InvalidPattern {
            group: "absolute_blocked",
            pattern: "(".into(),
            source,
        };
        assert!(err.to_string().contains("absolute_blocked"));
    }
}
