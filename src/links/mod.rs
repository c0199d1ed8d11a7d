pub mod cache;
pub mod detector;
pub mod fetcher;
pub mod html;
pub mod pipeline;
pub mod summarizer;
pub mod types;

pub use cache::DedupCache;
pub use detector::detect_links;
pub use fetcher::{ContentFetcher, FetchOutcome, HttpFetcher};
pub use html::extract_text_from_html;
pub use pipeline::{LinkPipeline, ProcessReport};
pub use summarizer::{Summarize, SummaryOutcome, Unavailable, UrlSummarizer};
pub use types::{DedupKey, Notification, NotificationKind, SummaryResult};
