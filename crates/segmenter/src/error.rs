use thiserror::Error;

/// Result type for segmentation operations
pub type Result<T> = std::result::Result<T, SegmenterError>;

/// Errors that can occur while segmenting source code
#[derive(Error, Debug)]
pub enum SegmenterError {
    /// Empty content was handed to the façade
    #[error("Empty content provided")]
    EmptyContent,

    /// Invalid configuration (options, priorities, orchestrator settings)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to parse the source code into a syntax tree
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Unsupported language
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// No strategy registered under this name
    #[error("Strategy '{0}' not found")]
    StrategyNotFound(String),

    /// A strategy failed while segmenting
    #[error("Strategy '{name}' failed: {reason}")]
    StrategyFailed { name: String, reason: String },

    /// A strategy produced chunks that failed validation
    #[error("Strategy '{0}' produced invalid chunks")]
    InvalidOutput(String),

    /// TOML configuration could not be decoded
    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// JSON configuration could not be decoded
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl SegmenterError {
    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create an unsupported language error
    pub fn unsupported_language(lang: impl Into<String>) -> Self {
        Self::UnsupportedLanguage(lang.into())
    }

    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a strategy failure
    pub fn strategy(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StrategyFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// True when the failure stems from a missing or broken syntax tree
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        matches!(self, Self::ParseError(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_mentions_not_found() {
        let err = SegmenterError::StrategyNotFound("nonexistent".to_string());
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn parse_errors_are_structural() {
        assert!(SegmenterError::parse("tree missing").is_structural());
        assert!(!SegmenterError::strategy("line_count", "boom").is_structural());
    }
}
