//! Error types for the `amp_content` crate.

/// All errors that can occur while converting content to AMP.
#[derive(Debug, thiserror::Error)]
pub enum AmpError {
    /// The input could not be parsed at all (it is not valid UTF-8).
    ///
    /// Malformed markup is never a parse error: the HTML5 parser recovers
    /// from unclosed and misnested tags.
    #[error("Parse error: {0}")]
    Parse(String),

    /// An identifier could not be extracted from otherwise matching markup.
    ///
    /// Never fatal: callers leave the subtree untouched and register no script.
    #[error("Could not extract {provider} identifier: {reason}")]
    Extraction {
        provider: &'static str,
        reason: String,
    },

    /// A sanitizer pass hit an inconsistent document and aborted the run.
    #[error("Sanitizer pass `{sanitizer}` failed: {message}")]
    Pass {
        sanitizer: &'static str,
        message: String,
    },

    /// The builder configuration is invalid.
    #[error("Config error: {0}")]
    Config(String),

    /// A detector pattern failed to compile.
    #[error("Invalid pattern: {0}")]
    Regex(#[from] regex::Error),
}

impl AmpError {
    pub(crate) fn pass(sanitizer: &'static str, message: impl Into<String>) -> Self {
        Self::Pass {
            sanitizer,
            message: message.into(),
        }
    }

    pub(crate) fn extraction(provider: &'static str, reason: impl Into<String>) -> Self {
        Self::Extraction {
            provider,
            reason: reason.into(),
        }
    }
}

/// A type alias for `Result<T, AmpError>`.
pub type Result<T> = std::result::Result<T, AmpError>;
