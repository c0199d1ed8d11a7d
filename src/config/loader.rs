use super::Config;
use crate::error::ConfigError;
use anyhow::{Context, Result};
use directories::UserDirs;
use std::fs;
use std::path::{Path, PathBuf};

fn default_config_path() -> Option<PathBuf> {
    UserDirs::new().map(|u| u.home_dir().join(".linkrelay").join("config.toml"))
}

impl Config {
    /// Load `path` (which must exist) or, when `None`, the default
    /// `~/.linkrelay/config.toml` if present. Environment overrides are
    /// applied last. Nothing is validated here; see `validate_for_relay`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(explicit) => Self::from_file(explicit)?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(found) => Self::from_file(&found)?,
                None => Self::default(),
            },
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(ConfigError::Io)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::Load(e.to_string()))
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.config_path = Some(path.to_path_buf());
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Everything `linkrelay run` needs. Reports all missing settings at once,
    /// named by their environment variable.
    pub fn validate_for_relay(&self) -> Result<(), ConfigError> {
        let mut missing = Vec::new();
        if self.matrix.homeserver_url.trim().is_empty() {
            missing.push("MATRIX_HOMESERVER_URL");
        }
        if self.matrix.access_token.trim().is_empty() {
            missing.push("MATRIX_ACCESS_TOKEN");
        }
        if self.matrix.user_id.trim().is_empty() {
            missing.push("MATRIX_USER_ID");
        }
        if self.matrix.monitored_room_id.trim().is_empty() {
            missing.push("MONITORED_ROOM_ID");
        }
        if self
            .matrix
            .forwarding_room_id
            .as_deref()
            .is_none_or(|room| room.trim().is_empty())
        {
            missing.push("FORWARDING_ROOM_ID");
        }
        if self.llm.api_key.is_none() {
            missing.push("AI_API_KEY");
        }
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        url::Url::parse(&self.matrix.homeserver_url).map_err(|e| {
            ConfigError::Invalid(format!(
                "MATRIX_HOMESERVER_URL {:?}: {e}",
                self.matrix.homeserver_url
            ))
        })?;
        self.validate_llm()
    }

    /// One-shot summarization only talks to the page and the model.
    pub fn validate_for_summarize(&self) -> Result<(), ConfigError> {
        if self.llm.api_key.is_none() {
            return Err(ConfigError::Missing(vec!["AI_API_KEY"]));
        }
        self.validate_llm()
    }

    fn validate_llm(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.llm.api_url).map_err(|e| {
            ConfigError::Invalid(format!("AI_API_URL {:?}: {e}", self.llm.api_url))
        })?;
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::Invalid(format!(
                "llm.temperature must be within 0.0..=2.0, got {}",
                self.llm.temperature
            )));
        }
        let zero_limits = [
            ("links.dedup_window_secs", self.links.dedup_window_secs == 0),
            ("links.fetch_timeout_secs", self.links.fetch_timeout_secs == 0),
            ("llm.timeout_secs", self.llm.timeout_secs == 0),
            ("links.max_body_bytes", self.links.max_body_bytes == 0),
            ("links.max_content_chars", self.links.max_content_chars == 0),
        ];
        if let Some((name, _)) = zero_limits.iter().find(|(_, is_zero)| *is_zero) {
            return Err(ConfigError::Invalid(format!("{name} must be positive")));
        }
        Ok(())
    }
}
