//! Link pipeline: detect links in a room message, suppress recent repeats,
//! summarize each new link and report progress to the forwarding room.
//!
//! Every accepted link produces a "processing" notice followed by exactly one
//! terminal notice (summary, no-summary, or error). Failures are contained per
//! link; the pipeline never returns an error to its caller.

use super::cache::DedupCache;
use super::detector::detect_links;
use super::summarizer::{Summarize, SummaryOutcome};
use super::types::{DedupKey, Notification};
use crate::llm::scrub_secret_patterns;
use crate::transport::traits::DeliveryGateway;
use std::sync::Arc;
use std::time::Duration;

/// What one `process` call did, for logging and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessReport {
    pub accepted: Vec<String>,
    pub skipped: Vec<String>,
}

pub struct LinkPipeline {
    forwarding_room: Option<String>,
    cache: DedupCache,
    summarizer: Arc<dyn Summarize>,
    gateway: Arc<dyn DeliveryGateway>,
    link_timeout: Option<Duration>,
}

impl LinkPipeline {
    pub fn new(
        forwarding_room: Option<String>,
        cache: DedupCache,
        summarizer: Arc<dyn Summarize>,
        gateway: Arc<dyn DeliveryGateway>,
    ) -> Self {
        Self {
            forwarding_room: forwarding_room.filter(|room| !room.trim().is_empty()),
            cache,
            summarizer,
            gateway,
            link_timeout: None,
        }
    }

    /// Bound each link's summarization. Elapsed links get an error notice.
    pub fn with_link_timeout(mut self, timeout: Duration) -> Self {
        self.link_timeout = Some(timeout);
        self
    }

    pub fn link_timeout(&self) -> Option<Duration> {
        self.link_timeout
    }

    pub fn cache(&self) -> &DedupCache {
        &self.cache
    }

    pub async fn process(&self, message: &str, sender: &str, source_room: &str) -> ProcessReport {
        let mut report = ProcessReport::default();

        let Some(forwarding_room) = self.forwarding_room.as_deref() else {
            tracing::error!("forwarding room is not configured; not relaying links");
            return report;
        };

        for link in detect_links(message) {
            if !self
                .cache
                .check_and_insert(DedupKey::new(link.as_str(), source_room))
            {
                tracing::debug!(link = %link, room_id = %source_room, "skipping recently seen link");
                report.skipped.push(link);
                continue;
            }

            self.process_link(forwarding_room, &link, sender).await;
            report.accepted.push(link);
        }

        report
    }

    async fn process_link(&self, forwarding_room: &str, link: &str, sender: &str) {
        self.deliver(Notification::processing(forwarding_room, sender, link))
            .await;

        let terminal = match self.summarize_bounded(link).await {
            Ok(SummaryOutcome::Summarized(result)) => {
                tracing::info!(link, "forwarded link summary");
                Notification::summary(forwarding_room, &result)
            }
            Ok(SummaryOutcome::Unavailable(reason)) => {
                tracing::warn!(link, reason = %reason, "no summary available");
                Notification::no_summary(forwarding_room, link, &reason.to_string())
            }
            Err(e) => {
                tracing::error!(link, error = %e, "link processing failed");
                let description = format!("{e:#}");
                Notification::error(forwarding_room, link, &scrub_secret_patterns(&description))
            }
        };

        self.deliver(terminal).await;
    }

    async fn summarize_bounded(&self, link: &str) -> anyhow::Result<SummaryOutcome> {
        let summarize = self.summarizer.summarize(link);
        match self.link_timeout {
            Some(limit) => tokio::time::timeout(limit, summarize)
                .await
                .unwrap_or_else(|_| {
                    Err(anyhow::anyhow!("summarization timed out after {limit:?}"))
                }),
            None => summarize.await,
        }
    }

    async fn deliver(&self, notification: Notification) {
        if let Err(e) = self
            .gateway
            .send(&notification.room_id, &notification.body)
            .await
        {
            tracing::warn!(
                room_id = %notification.room_id,
                kind = ?notification.kind,
                error = %e,
                "failed to deliver notification"
            );
        }
    }
}
