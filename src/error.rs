use thiserror::Error;

// ─── Config errors ───────────────────────────────────────────────────────────

/// Startup configuration problems. Any of these aborts `linkrelay run`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required settings: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("invalid setting: {0}")]
    Invalid(String),

    #[error("failed to load config: {0}")]
    Load(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Fetch errors ────────────────────────────────────────────────────────────

/// Why a linked page could not be retrieved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("not a fetchable http(s) url: {0}")]
    InvalidUrl(String),

    #[error("server responded with HTTP {status}")]
    Status { status: u16 },

    #[error("request failed: {0}")]
    Transport(String),
}

// ─── Completion errors ───────────────────────────────────────────────────────

/// Why the language model did not produce a usable summary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompletionError {
    #[error("language model API key is not configured")]
    MissingApiKey,

    #[error("completion request failed: {0}")]
    Transport(String),

    #[error("completion API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("completion response could not be decoded: {0}")]
    Decode(String),

    #[error("completion response contained no text")]
    EmptyResponse,
}
