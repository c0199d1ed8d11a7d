use super::html::extract_text_from_html;
use crate::config::LinkConfig;
use crate::error::FetchError;
use anyhow::Context;
use reqwest::Client;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use url::Url;

/// What a successful fetch produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Plain text extracted from an HTML page. May be empty.
    Text(String),
    /// Anything that is not `text/html`; not downloaded.
    Unsupported { content_type: String },
}

impl FetchOutcome {
    /// The text handed to the summarizer. Unsupported content becomes a
    /// placeholder sentence naming the content type.
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Unsupported { content_type } => {
                format!("[This content is in format: {content_type} and cannot be summarized]")
            }
        }
    }
}

pub trait ContentFetcher: Send + Sync {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<FetchOutcome, FetchError>> + Send + 'a>>;
}

/// Single-shot HTTP fetcher: no retries, bounded time, bounded body.
pub struct HttpFetcher {
    client: Client,
    max_body_bytes: usize,
}

impl HttpFetcher {
    pub fn new(config: &LinkConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("build HTTP client for link fetching")?;

        Ok(Self {
            client,
            max_body_bytes: config.max_body_bytes,
        })
    }

    async fn fetch_url(&self, raw: &str) -> Result<FetchOutcome, FetchError> {
        let url = Url::parse(raw).map_err(|_| FetchError::InvalidUrl(raw.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(raw.to_string()));
        }

        tracing::debug!(url = %url, "fetching link");
        let mut response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(url = %url, status = status.as_u16(), "link fetch returned error status");
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if !content_type.contains("text/html") {
            tracing::info!(url = %url, content_type = %content_type, "skipping non-HTML content");
            let content_type = if content_type.is_empty() {
                "unknown".to_string()
            } else {
                content_type
            };
            return Ok(FetchOutcome::Unsupported { content_type });
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?
        {
            let room = self.max_body_bytes.saturating_sub(body.len());
            if chunk.len() >= room {
                body.extend_from_slice(&chunk[..room]);
                body.truncate(complete_utf8_len(&body));
                tracing::debug!(url = %url, limit = self.max_body_bytes, "body truncated at size limit");
                break;
            }
            body.extend_from_slice(&chunk);
        }

        let html = String::from_utf8_lossy(&body);
        Ok(FetchOutcome::Text(extract_text_from_html(&html)))
    }
}

/// Length of `bytes` without a multi-byte UTF-8 sequence cut off at the end.
fn complete_utf8_len(bytes: &[u8]) -> usize {
    let tail_start = bytes.len().saturating_sub(3);
    for start in (tail_start..bytes.len()).rev() {
        let needed = match bytes[start] {
            0x80..=0xBF => continue,
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        };
        return if bytes.len() - start < needed {
            start
        } else {
            bytes.len()
        };
    }
    bytes.len()
}

impl ContentFetcher for HttpFetcher {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<FetchOutcome, FetchError>> + Send + 'a>> {
        Box::pin(async move {
            let result = self.fetch_url(url).await;
            if let Err(e) = &result {
                tracing::warn!(url, error = %e, "link fetch failed");
            }
            result
        })
    }
}
