use std::sync::Arc;
use std::time::Duration;

use linkrelay::Config;
use linkrelay::app::relay::{build_pipeline, build_summarizer, relay_events};
use linkrelay::transport::MatrixChannel;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, path_regex, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const ARTICLE: &str = "<html><head><title>Example</title><style>p{color:red}</style></head>\
<body><h1>Example Domain</h1><p>This domain is for use in illustrative examples.</p>\
<script>track()</script></body></html>";

struct Fixture {
    pages: MockServer,
    llm: MockServer,
    homeserver: MockServer,
}

impl Fixture {
    async fn start() -> Self {
        let pages = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/article"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(ARTICLE, "text/html; charset=utf-8"),
            )
            .mount(&pages)
            .await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&pages)
            .await;

        let llm = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "A domain for examples."}}]
            })))
            .mount(&llm)
            .await;

        let homeserver = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path_regex(r"^/_matrix/client/v3/rooms/[^/]+/send/m\.room\.message/[^/]+$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"event_id": "$sent"})))
            .mount(&homeserver)
            .await;

        Self {
            pages,
            llm,
            homeserver,
        }
    }

    fn config(&self) -> Config {
        let mut config = Config::default();
        config.matrix.homeserver_url = self.homeserver.uri();
        config.matrix.access_token = "syt_integration".to_string();
        config.matrix.user_id = "@relay:test".to_string();
        config.matrix.monitored_room_id = "!source:test".to_string();
        config.matrix.forwarding_room_id = Some("!forward:test".to_string());
        config.matrix.sync_timeout_ms = 0;
        config.llm.api_key = Some("sk-integration".to_string());
        config.llm.api_url = format!("{}/v1/chat/completions", self.llm.uri());
        config
    }

    /// Bodies of messages posted to the homeserver, in arrival order.
    async fn posted(&self) -> Vec<(String, String)> {
        self.homeserver
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.method.as_str() == "PUT")
            .map(|r: &Request| {
                let body: serde_json::Value = serde_json::from_slice(&r.body).unwrap();
                (
                    r.url.path().to_string(),
                    body["body"].as_str().unwrap_or_default().to_string(),
                )
            })
            .collect()
    }

    async fn wait_for_posts(&self, count: usize) -> Vec<(String, String)> {
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let posted = self.posted().await;
                if posted.len() >= count {
                    return posted;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap()
    }
}

#[tokio::test]
async fn shared_link_is_summarized_into_forwarding_room() {
    let fx = Fixture::start().await;
    let config = fx.config();
    let channel = Arc::new(MatrixChannel::new(&config.matrix).unwrap());
    let pipeline = build_pipeline(
        &config,
        Arc::new(build_summarizer(&config).unwrap()),
        channel,
    );

    let link = format!("{}/article", fx.pages.uri());
    let report = pipeline
        .process(&format!("Look at {link}"), "Alice", "!source:test")
        .await;
    assert_eq!(report.accepted, vec![link.clone()]);

    let posted = fx.posted().await;
    assert_eq!(posted.len(), 2);
    assert!(posted[0].0.starts_with("/_matrix/client/v3/rooms/!forward:test/send/"));
    assert_eq!(
        posted[0].1,
        format!("Link shared by Alice in another room:\n{link}\n\nGenerating summary...")
    );
    assert_eq!(
        posted[1].1,
        format!("Summary of {link}:\n\nA domain for examples.")
    );

    let prompts = fx.llm.received_requests().await.unwrap();
    assert_eq!(prompts.len(), 1);
    let request: serde_json::Value = serde_json::from_slice(&prompts[0].body).unwrap();
    let user_prompt = request["messages"][1]["content"].as_str().unwrap();
    assert!(user_prompt.contains("Example Domain This domain is for use in illustrative examples."));
    assert!(!user_prompt.contains("track()"));
    assert!(!user_prompt.contains("color:red"));

    // A repeat inside the window is silent.
    pipeline
        .process(&format!("again {link}"), "Bob", "!source:test")
        .await;
    assert_eq!(fx.posted().await.len(), 2);
}

#[tokio::test]
async fn unreachable_page_reports_no_summary() {
    let fx = Fixture::start().await;
    let config = fx.config();
    let channel = Arc::new(MatrixChannel::new(&config.matrix).unwrap());
    let pipeline = build_pipeline(
        &config,
        Arc::new(build_summarizer(&config).unwrap()),
        channel,
    );

    let link = format!("{}/missing", fx.pages.uri());
    pipeline.process(&link, "Alice", "!source:test").await;

    let posted = fx.posted().await;
    assert_eq!(posted.len(), 2);
    assert_eq!(
        posted[1].1,
        format!("Could not generate a summary for {link} (the page returned HTTP 404).")
    );
    assert!(fx.llm.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn relay_runtime_forwards_links_from_sync() {
    let fx = Fixture::start().await;
    let config = fx.config();
    let link = format!("{}/article", fx.pages.uri());

    Mock::given(method("GET"))
        .and(path("/_matrix/client/v3/account/whoami"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"user_id": "@relay:test"})))
        .mount(&fx.homeserver)
        .await;
    Mock::given(method("GET"))
        .and(path("/_matrix/client/v3/sync"))
        .and(query_param_is_missing("since"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"next_batch": "b1"})))
        .mount(&fx.homeserver)
        .await;
    Mock::given(method("GET"))
        .and(path("/_matrix/client/v3/sync"))
        .and(query_param("since", "b1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "next_batch": "b2",
            "rooms": {"join": {"!source:test": {
                "state": {"events": [{
                    "type": "m.room.member",
                    "sender": "@alice:test",
                    "state_key": "@alice:test",
                    "content": {"membership": "join", "displayname": "Alice"}
                }]},
                "timeline": {"events": [
                    {"type": "m.room.message", "sender": "@alice:test", "origin_server_ts": 5,
                     "content": {"msgtype": "m.text", "body": format!("Look at {link}")}},
                    {"type": "m.room.message", "sender": "@relay:test", "origin_server_ts": 6,
                     "content": {"msgtype": "m.text", "body": format!("Summary of {link}")}}
                ]}
            }}}
        })))
        .mount(&fx.homeserver)
        .await;
    Mock::given(method("GET"))
        .and(path("/_matrix/client/v3/sync"))
        .and(query_param("since", "b2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"next_batch": "b2"}))
                .set_delay(Duration::from_millis(100)),
        )
        .mount(&fx.homeserver)
        .await;

    let channel = Arc::new(
        MatrixChannel::new(&config.matrix)
            .unwrap()
            .with_started_at_ms(0),
    );
    let pipeline = Arc::new(build_pipeline(
        &config,
        Arc::new(build_summarizer(&config).unwrap()),
        channel.clone(),
    ));
    let shutdown = CancellationToken::new();
    let relay = tokio::spawn(relay_events(pipeline, channel, (1, 1), shutdown.clone()));

    let posted = fx.wait_for_posts(2).await;
    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(10), relay)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(posted.len(), 2);
    assert!(posted[0].1.starts_with("Link shared by Alice in another room:"));
    assert_eq!(
        posted[1].1,
        format!("Summary of {link}:\n\nA domain for examples.")
    );
}
