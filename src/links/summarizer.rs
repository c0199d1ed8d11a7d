use super::fetcher::ContentFetcher;
use super::types::SummaryResult;
use crate::error::{CompletionError, FetchError};
use crate::llm::ChatCompletionClient;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub const MAX_CONTENT_CHARS: usize = 10_000;

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant that summarizes web content. \
Provide a concise summary highlighting the key points.";

/// Why no summary could be produced. Expected, non-exceptional outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unavailable {
    Fetch(FetchError),
    EmptyContent,
    Completion(CompletionError),
}

impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch(FetchError::Status { status }) => {
                write!(f, "the page returned HTTP {status}")
            }
            Self::Fetch(e) => write!(f, "the page could not be retrieved: {e}"),
            Self::EmptyContent => f.write_str("the page has no readable text"),
            Self::Completion(e) => write!(f, "the language model gave no summary: {e}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryOutcome {
    Summarized(SummaryResult),
    Unavailable(Unavailable),
}

/// Produces a summary for a URL. `Err` is reserved for unexpected failures;
/// everything anticipated is reported through `SummaryOutcome::Unavailable`.
pub trait Summarize: Send + Sync {
    fn summarize<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<SummaryOutcome>> + Send + 'a>>;
}

pub fn truncate_content(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

pub fn build_user_prompt(url: &str, content: &str) -> String {
    format!("Please summarize the following content from {url}:\n\n{content}")
}

/// Fetches the page, trims it to the character budget and asks the model for
/// a summary. Never returns `Err`.
pub struct UrlSummarizer {
    fetcher: Arc<dyn ContentFetcher>,
    completions: ChatCompletionClient,
    max_content_chars: usize,
}

impl UrlSummarizer {
    pub fn new(
        fetcher: Arc<dyn ContentFetcher>,
        completions: ChatCompletionClient,
        max_content_chars: usize,
    ) -> Self {
        Self {
            fetcher,
            completions,
            max_content_chars,
        }
    }

    pub async fn summarize_url(&self, url: &str) -> SummaryOutcome {
        let content = match self.fetcher.fetch(url).await {
            Ok(outcome) => outcome.into_text(),
            Err(e) => {
                tracing::warn!(url, error = %e, "failed to scrape content");
                return SummaryOutcome::Unavailable(Unavailable::Fetch(e));
            }
        };

        if content.trim().is_empty() {
            tracing::info!(url, "page has no readable text");
            return SummaryOutcome::Unavailable(Unavailable::EmptyContent);
        }

        let content = truncate_content(&content, self.max_content_chars);
        let prompt = build_user_prompt(url, &content);

        match self
            .completions
            .chat_with_system(SYSTEM_PROMPT, &prompt)
            .await
        {
            Ok(summary) => {
                tracing::debug!(url, chars = summary.chars().count(), "summary generated");
                SummaryOutcome::Summarized(SummaryResult {
                    summary,
                    original_url: url.to_string(),
                })
            }
            Err(e) => {
                tracing::warn!(url, model = self.completions.model(), error = %e, "failed to generate summary");
                SummaryOutcome::Unavailable(Unavailable::Completion(e))
            }
        }
    }
}

impl Summarize for UrlSummarizer {
    fn summarize<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<SummaryOutcome>> + Send + 'a>> {
        Box::pin(async move { Ok(self.summarize_url(url).await) })
    }
}
