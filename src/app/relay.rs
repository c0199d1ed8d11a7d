use crate::config::Config;
use crate::links::{DedupCache, HttpFetcher, LinkPipeline, Summarize, UrlSummarizer};
use crate::llm::ChatCompletionClient;
use crate::transport::runtime::{listener_backoff_settings, spawn_supervised_listener};
use crate::transport::{Channel, DeliveryGateway, InboundEvent, MatrixChannel};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

const INBOUND_QUEUE_CAPACITY: usize = 100;

/// Fetcher + completion client from `config`, ready to summarize URLs.
pub fn build_summarizer(config: &Config) -> Result<UrlSummarizer> {
    let fetcher = HttpFetcher::new(&config.links)?;
    let completions = ChatCompletionClient::new(&config.llm);
    Ok(UrlSummarizer::new(
        Arc::new(fetcher),
        completions,
        config.links.max_content_chars,
    ))
}

pub fn build_pipeline(
    config: &Config,
    summarizer: Arc<dyn Summarize>,
    gateway: Arc<dyn DeliveryGateway>,
) -> LinkPipeline {
    let cache = DedupCache::new(Duration::from_secs(config.links.dedup_window_secs));
    let pipeline = LinkPipeline::new(
        config.matrix.forwarding_room_id.clone(),
        cache,
        summarizer,
        gateway,
    );
    match config.links.link_timeout_secs {
        0 => pipeline,
        secs => pipeline.with_link_timeout(Duration::from_secs(secs)),
    }
}

/// Validate the config, connect to the homeserver and relay links until
/// `shutdown` is cancelled.
pub async fn run_relay(config: Arc<Config>, shutdown: CancellationToken) -> Result<()> {
    config.validate_for_relay()?;

    let channel = Arc::new(MatrixChannel::new(&config.matrix)?);
    if !channel.health_check().await {
        tracing::warn!(
            homeserver = %config.matrix.homeserver_url,
            "homeserver health check failed; the listener will keep retrying"
        );
    }

    let summarizer = Arc::new(build_summarizer(&config)?);
    let pipeline = Arc::new(build_pipeline(&config, summarizer, channel.clone()));

    tracing::info!(
        monitored_room = %config.matrix.monitored_room_id,
        forwarding_room = config.matrix.forwarding_room_id.as_deref().unwrap_or("<unset>"),
        model = %config.llm.model,
        dedup_window_secs = config.links.dedup_window_secs,
        "link relay starting"
    );

    relay_events(
        pipeline,
        channel,
        listener_backoff_settings(&config.matrix),
        shutdown,
    )
    .await;

    tracing::info!("link relay stopped");
    Ok(())
}

/// Feed inbound events from `channel` into `pipeline`, one task per message.
/// On shutdown the listener is stopped and in-flight messages are drained.
pub async fn relay_events(
    pipeline: Arc<LinkPipeline>,
    channel: Arc<dyn Channel>,
    (initial_backoff_secs, max_backoff_secs): (u64, u64),
    shutdown: CancellationToken,
) {
    let (tx, mut rx) = tokio::sync::mpsc::channel::<InboundEvent>(INBOUND_QUEUE_CAPACITY);
    let listener = spawn_supervised_listener(channel, tx, initial_backoff_secs, max_backoff_secs);
    let tracker = TaskTracker::new();

    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                tracing::info!(in_flight = tracker.len(), "shutdown requested");
                break;
            }
            event = rx.recv() => {
                match event {
                    Some(InboundEvent::Message(message)) => {
                        let pipeline = Arc::clone(&pipeline);
                        tracker.spawn(async move {
                            let report = pipeline
                                .process(&message.body, &message.sender_display_name, &message.room_id)
                                .await;
                            if !report.accepted.is_empty() || !report.skipped.is_empty() {
                                tracing::info!(
                                    room_id = %message.room_id,
                                    sender = %message.sender,
                                    accepted = report.accepted.len(),
                                    skipped = report.skipped.len(),
                                    "message processed"
                                );
                            }
                        });
                    }
                    Some(InboundEvent::Reaction { room_id, sender, relates_to, key }) => {
                        tracing::debug!(
                            room_id = %room_id,
                            sender = %sender,
                            relates_to = relates_to.as_deref().unwrap_or_default(),
                            key = key.as_deref().unwrap_or_default(),
                            "reaction ignored"
                        );
                    }
                    None => {
                        tracing::warn!("listener channel closed");
                        break;
                    }
                }
            }
        }
    }

    drop(rx);
    listener.abort();
    let _ = listener.await;

    tracker.close();
    tracker.wait().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::links::{SummaryOutcome, SummaryResult};
    use crate::transport::InboundMessage;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingGateway {
        sent: Mutex<Vec<(String, String)>>,
    }

    impl RecordingGateway {
        fn bodies(&self) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|(_, body)| body.clone())
                .collect()
        }
    }

    impl DeliveryGateway for RecordingGateway {
        fn send<'a>(
            &'a self,
            room_id: &'a str,
            body: &'a str,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
            Box::pin(async move {
                self.sent
                    .lock()
                    .unwrap()
                    .push((room_id.to_string(), body.to_string()));
                Ok(())
            })
        }
    }

    /// Emits a fixed batch of events once, then idles.
    struct ScriptedChannel {
        events: Mutex<Vec<InboundEvent>>,
    }

    impl DeliveryGateway for ScriptedChannel {
        fn send<'a>(
            &'a self,
            _room_id: &'a str,
            _body: &'a str,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
            Box::pin(async move { Ok(()) })
        }
    }

    impl Channel for ScriptedChannel {
        fn name(&self) -> &str {
            "scripted"
        }

        fn listen<'a>(
            &'a self,
            tx: tokio::sync::mpsc::Sender<InboundEvent>,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
            Box::pin(async move {
                let events = std::mem::take(&mut *self.events.lock().unwrap());
                for event in events {
                    if tx.send(event).await.is_err() {
                        return Ok(());
                    }
                }
                std::future::pending::<()>().await;
                Ok(())
            })
        }
    }

    struct SlowSummarizer {
        delay: Duration,
    }

    impl Summarize for SlowSummarizer {
        fn summarize<'a>(
            &'a self,
            url: &'a str,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<SummaryOutcome>> + Send + 'a>> {
            Box::pin(async move {
                tokio::time::sleep(self.delay).await;
                Ok(SummaryOutcome::Summarized(SummaryResult {
                    summary: format!("about {url}"),
                    original_url: url.to_string(),
                }))
            })
        }
    }

    fn message(room: &str, body: &str) -> InboundEvent {
        InboundEvent::Message(InboundMessage {
            room_id: room.to_string(),
            sender: "@alice:m".to_string(),
            sender_display_name: "Alice".to_string(),
            body: body.to_string(),
            origin_server_ts: 0,
        })
    }

    fn relay_config() -> Config {
        let mut config = Config::default();
        config.matrix.forwarding_room_id = Some("!forward:m".to_string());
        config
    }

    async fn wait_for(gateway: &RecordingGateway, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while gateway.bodies().len() < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn relays_messages_and_ignores_reactions() {
        let gateway = Arc::new(RecordingGateway::default());
        let summarizer = Arc::new(SlowSummarizer {
            delay: Duration::ZERO,
        });
        let pipeline = Arc::new(build_pipeline(&relay_config(), summarizer, gateway.clone()));
        let channel = Arc::new(ScriptedChannel {
            events: Mutex::new(vec![
                message("!watched:m", "Look at https://example.com"),
                InboundEvent::Reaction {
                    room_id: "!watched:m".to_string(),
                    sender: "@alice:m".to_string(),
                    relates_to: Some("$e".to_string()),
                    key: Some("👍".to_string()),
                },
                message("!watched:m", "again https://example.com"),
            ]),
        });
        let shutdown = CancellationToken::new();

        let relay = tokio::spawn(relay_events(pipeline, channel, (1, 1), shutdown.clone()));
        wait_for(&gateway, 2).await;
        // Give the duplicate a chance to be (wrongly) processed.
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();
        relay.await.unwrap();

        let bodies = gateway.bodies();
        assert_eq!(bodies.len(), 2);
        assert!(bodies[0].starts_with("Link shared by Alice in another room:"));
        assert_eq!(bodies[1], "Summary of https://example.com:\n\nabout https://example.com");
    }

    #[tokio::test]
    async fn shutdown_drains_in_flight_messages() {
        let gateway = Arc::new(RecordingGateway::default());
        let summarizer = Arc::new(SlowSummarizer {
            delay: Duration::from_millis(200),
        });
        let pipeline = Arc::new(build_pipeline(&relay_config(), summarizer, gateway.clone()));
        let channel = Arc::new(ScriptedChannel {
            events: Mutex::new(vec![message("!watched:m", "https://slow.example")]),
        });
        let shutdown = CancellationToken::new();

        let relay = tokio::spawn(relay_events(pipeline, channel, (1, 1), shutdown.clone()));
        wait_for(&gateway, 1).await;
        shutdown.cancel();
        relay.await.unwrap();

        assert_eq!(gateway.bodies().len(), 2);
    }

    #[test]
    fn zero_link_timeout_disables_bound() {
        let mut config = relay_config();
        config.links.link_timeout_secs = 0;
        let gateway = Arc::new(RecordingGateway::default());
        let summarizer = Arc::new(SlowSummarizer {
            delay: Duration::ZERO,
        });
        let pipeline = build_pipeline(&config, summarizer.clone(), gateway.clone());
        assert_eq!(pipeline.link_timeout(), None);
        assert_eq!(pipeline.cache().window(), Duration::from_secs(3600));

        let pipeline = build_pipeline(&relay_config(), summarizer, gateway);
        assert_eq!(pipeline.link_timeout(), Some(Duration::from_secs(180)));
    }
}
