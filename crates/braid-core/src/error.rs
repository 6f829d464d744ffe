use std::fmt;

use thiserror::Error;

/// Machine-readable error codes for operator and agent decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NoSourceConfigured,
    ConfigParseError,
    InvalidPolicy,
    SourceUnavailable,
    StoreUnavailable,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NoSourceConfigured => "E1001",
            Self::ConfigParseError => "E1002",
            Self::InvalidPolicy => "E1003",
            Self::SourceUnavailable => "E2001",
            Self::StoreUnavailable => "E3001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NoSourceConfigured => "No retrieval source configured",
            Self::ConfigParseError => "Config file parse error",
            Self::InvalidPolicy => "Unknown merge method",
            Self::SourceUnavailable => "Retrieval source unavailable",
            Self::StoreUnavailable => "Content store unavailable",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NoSourceConfigured => {
                Some("Configure [sources].vector and/or [sources].graph in .braid/config.toml.")
            }
            Self::ConfigParseError => Some("Fix syntax in .braid/config.toml and retry."),
            Self::InvalidPolicy => Some("Use one of: weighted, interleave, separate."),
            Self::SourceUnavailable => {
                Some("Use `braid status` to see which sources are configured.")
            }
            Self::StoreUnavailable => Some("Check the [sources].store path and permissions."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Typed failures that callers may want to branch on.
///
/// Inside the hybrid pipeline none of these reach the caller: a failing
/// source degrades to an empty candidate list and a failing store lookup
/// skips enrichment. They surface from startup wiring, strict parsing, and
/// the single-source entry points.
#[derive(Debug, Error)]
pub enum BraidError {
    #[error("neither vector search nor knowledge graph search is configured")]
    NoSourceConfigured,

    #[error("failed to parse config {path}: {reason}")]
    ConfigParse { path: String, reason: String },

    #[error("unknown merge method '{0}'")]
    InvalidPolicy(String),

    #[error("{0} search is not available")]
    SourceUnavailable(&'static str),

    #[error("content store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl BraidError {
    /// The stable code for this error.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NoSourceConfigured => ErrorCode::NoSourceConfigured,
            Self::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Self::InvalidPolicy(_) => ErrorCode::InvalidPolicy,
            Self::SourceUnavailable(_) => ErrorCode::SourceUnavailable,
            Self::StoreUnavailable(_) => ErrorCode::StoreUnavailable,
            Self::Internal(_) => ErrorCode::InternalUnexpected,
        }
    }

    /// Remediation text for terminal output; falls back to the code summary.
    #[must_use]
    pub fn suggestion(&self) -> String {
        let code = self.error_code();
        code.hint().unwrap_or(code.message()).to_string()
    }
}
