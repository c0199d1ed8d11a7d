use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_AI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_AI_MODEL: &str = "gpt-3.5-turbo";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Path the config was loaded from, if any - not serialized
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    #[serde(default)]
    pub matrix: MatrixConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub links: LinkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatrixConfig {
    pub homeserver_url: String,
    pub access_token: String,
    /// The bot's own user id; events it authored are never relayed.
    pub user_id: String,
    pub monitored_room_id: String,
    /// Destination for notifications. `None` turns the pipeline into a no-op.
    pub forwarding_room_id: Option<String>,
    pub sync_timeout_ms: u64,
    pub request_timeout_secs: u64,
    pub initial_backoff_secs: u64,
    pub max_backoff_secs: u64,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            homeserver_url: String::new(),
            access_token: String::new(),
            user_id: String::new(),
            monitored_room_id: String::new(),
            forwarding_room_id: None,
            sync_timeout_ms: 30_000,
            request_timeout_secs: 60,
            initial_backoff_secs: 2,
            max_backoff_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: DEFAULT_AI_API_URL.to_string(),
            model: DEFAULT_AI_MODEL.to_string(),
            max_tokens: 300,
            temperature: 0.5,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// How long a (link, room) pair is suppressed after first sighting.
    pub dedup_window_secs: u64,
    /// Extracted text is cut to this many characters before summarizing.
    pub max_content_chars: usize,
    pub fetch_timeout_secs: u64,
    pub max_body_bytes: usize,
    pub user_agent: String,
    /// Upper bound on one link's fetch + summarize.
    pub link_timeout_secs: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            dedup_window_secs: 60 * 60,
            max_content_chars: 10_000,
            fetch_timeout_secs: 20,
            max_body_bytes: 5 * 1024 * 1024,
            user_agent: "Mozilla/5.0 (compatible; linkrelay/0.1; +matrix link summarizer)"
                .to_string(),
            link_timeout_secs: 180,
        }
    }
}

impl Config {
    /// Copy of the config that is safe to print: secrets are masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.matrix.access_token.is_empty() {
            copy.matrix.access_token = "***".to_string();
        }
        if copy.llm.api_key.is_some() {
            copy.llm.api_key = Some("***".to_string());
        }
        copy
    }
}
