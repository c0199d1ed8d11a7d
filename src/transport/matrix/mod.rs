mod events;
mod models;


use crate::config::MatrixConfig;
use crate::transport::traits::{Channel, DeliveryGateway, InboundEvent, InboundMessage};
use anyhow::Context;
use reqwest::{Client, RequestBuilder};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use url::Url;

use self::events::{Classified, EventFilter, classify, member_update};
use self::models::{DisplayNameResponse, JoinedRoom, SyncResponse, WhoAmIResponse};

/// Only the newest event per room is needed to obtain a `since` token.
const INITIAL_SYNC_FILTER: &str = r#"{"room":{"timeline":{"limit":1}}}"#;
const SYNC_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Matrix channel using the Client-Server API (no SDK needed).
/// Watches a single room and can post into any room the bot has joined.
pub struct MatrixChannel {
    homeserver: Url,
    access_token: String,
    user_id: String,
    room_id: String,
    sync_timeout_ms: u64,
    request_timeout: Duration,
    started_at_ms: u64,
    display_names: Mutex<HashMap<String, String>>,
    client: Client,
}

impl MatrixChannel {
    pub fn new(config: &MatrixConfig) -> anyhow::Result<Self> {
        let homeserver = Url::parse(config.homeserver_url.trim())
            .with_context(|| format!("invalid homeserver URL `{}`", config.homeserver_url))?;
        if homeserver.cannot_be_a_base() {
            anyhow::bail!("homeserver URL `{homeserver}` cannot carry API paths");
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("build Matrix HTTP client")?;

        Ok(Self {
            homeserver,
            access_token: config.access_token.clone(),
            user_id: config.user_id.clone(),
            room_id: config.monitored_room_id.clone(),
            sync_timeout_ms: config.sync_timeout_ms,
            request_timeout: Duration::from_secs(config.request_timeout_secs.max(1)),
            started_at_ms: now_ms(),
            display_names: Mutex::new(HashMap::new()),
            client,
        })
    }

    /// Override the instant before which events are treated as history.
    pub fn with_started_at_ms(mut self, started_at_ms: u64) -> Self {
        self.started_at_ms = started_at_ms;
        self
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// `{homeserver}/{segments...}`, each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> anyhow::Result<Url> {
        let mut url = self.homeserver.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow::anyhow!("homeserver URL cannot carry API paths"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("Authorization", format!("Bearer {}", self.access_token))
    }

    async fn whoami(&self) -> anyhow::Result<String> {
        let url = self.endpoint(&["_matrix", "client", "v3", "account", "whoami"])?;
        let resp = self
            .authorized(self.client.get(url))
            .timeout(self.request_timeout)
            .send()
            .await
            .context("send Matrix whoami request")?;

        if !resp.status().is_success() {
            let err = resp.text().await?;
            anyhow::bail!("Matrix whoami failed: {err}");
        }

        let who: WhoAmIResponse = resp.json().await.context("parse Matrix whoami response")?;
        Ok(who.user_id)
    }

    /// Post a plain-text message into `room_id`.
    pub async fn send_text(&self, room_id: &str, body: &str) -> anyhow::Result<()> {
        let txn_id = format!("lr_{}", uuid::Uuid::new_v4().simple());
        let url = self.endpoint(&[
            "_matrix",
            "client",
            "v3",
            "rooms",
            room_id,
            "send",
            "m.room.message",
            &txn_id,
        ])?;

        let payload = serde_json::json!({
            "msgtype": "m.text",
            "body": body,
            "context": {}
        });

        let resp = self
            .authorized(self.client.put(url))
            .timeout(self.request_timeout)
            .json(&payload)
            .send()
            .await
            .context("send Matrix room message")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let err = resp.text().await.unwrap_or_default();
            anyhow::bail!(
                "Matrix send failed ({status}): {}",
                crate::llm::sanitize_api_error(&err)
            );
        }

        tracing::debug!(room_id, txn_id = %txn_id, "message sent");
        Ok(())
    }

    async fn sync(&self, since: Option<&str>) -> anyhow::Result<SyncResponse> {
        let mut url = self.endpoint(&["_matrix", "client", "v3", "sync"])?;
        {
            let mut query = url.query_pairs_mut();
            match since {
                Some(token) => {
                    query.append_pair("since", token);
                }
                None => {
                    query.append_pair("filter", INITIAL_SYNC_FILTER);
                }
            }
            query.append_pair("timeout", &self.sync_timeout_ms.to_string());
        }

        let resp = self
            .authorized(self.client.get(url))
            .timeout(Duration::from_millis(self.sync_timeout_ms) + self.request_timeout)
            .send()
            .await
            .context("send Matrix sync request")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let err = resp.text().await.unwrap_or_default();
            anyhow::bail!("Matrix sync failed ({status}): {err}");
        }

        resp.json().await.context("parse Matrix sync response")
    }

    fn remember_members(&self, room: &JoinedRoom) {
        let mut names = self
            .display_names
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for event in room.state.events.iter().chain(&room.timeline.events) {
            match member_update(event) {
                Some((user_id, Some(name))) => {
                    names.insert(user_id.to_string(), name.to_string());
                }
                Some((user_id, None)) => {
                    names.remove(user_id);
                }
                None => {}
            }
        }
    }

    fn cached_display_name(&self, user_id: &str) -> Option<String> {
        self.display_names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .cloned()
    }

    async fn fetch_display_name(&self, user_id: &str) -> anyhow::Result<Option<String>> {
        let url = self.endpoint(&["_matrix", "client", "v3", "profile", user_id, "displayname"])?;
        let resp = self
            .authorized(self.client.get(url))
            .timeout(self.request_timeout)
            .send()
            .await
            .context("send Matrix profile request")?;

        if !resp.status().is_success() {
            return Ok(None);
        }

        let profile: DisplayNameResponse =
            resp.json().await.context("parse Matrix profile response")?;
        Ok(profile
            .displayname
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty()))
    }

    /// Display name from room membership, then the profile API, then the bare
    /// user id.
    async fn display_name(&self, user_id: &str) -> String {
        if let Some(name) = self.cached_display_name(user_id) {
            return name;
        }

        match self.fetch_display_name(user_id).await {
            Ok(Some(name)) => {
                self.display_names
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(user_id.to_string(), name.clone());
                name
            }
            Ok(None) => user_id.to_string(),
            Err(e) => {
                tracing::debug!(user_id, error = %e, "display name lookup failed");
                user_id.to_string()
            }
        }
    }

    async fn inbound_events(&self, own_user_id: &str, sync: &SyncResponse) -> Vec<InboundEvent> {
        let filter = EventFilter {
            own_user_id,
            monitored_room: &self.room_id,
            started_at_ms: self.started_at_ms,
        };

        let mut inbound = Vec::new();
        for (room_id, room) in &sync.rooms.join {
            if room_id == &self.room_id {
                self.remember_members(room);
            }

            for event in &room.timeline.events {
                let classified = match classify(&filter, room_id, event) {
                    Ok(classified) => classified,
                    Err(skip) => {
                        tracing::trace!(room_id = %room_id, event_type = %event.event_type, ?skip, "event filtered");
                        continue;
                    }
                };

                match classified {
                    Classified::Message {
                        sender,
                        body,
                        origin_server_ts,
                    } => inbound.push(InboundEvent::Message(InboundMessage {
                        room_id: room_id.clone(),
                        sender: sender.to_string(),
                        sender_display_name: self.display_name(sender).await,
                        body: body.to_string(),
                        origin_server_ts,
                    })),
                    Classified::Reaction {
                        sender,
                        relates_to,
                        key,
                    } => inbound.push(InboundEvent::Reaction {
                        room_id: room_id.clone(),
                        sender: sender.to_string(),
                        relates_to: relates_to.map(str::to_string),
                        key: key.map(str::to_string),
                    }),
                }
            }
        }
        inbound
    }

    async fn listen_loop(&self, tx: mpsc::Sender<InboundEvent>) -> anyhow::Result<()> {
        tracing::info!(room_id = %self.room_id, "Matrix channel listening");

        let own_user_id = self
            .whoami()
            .await
            .context("get Matrix user identity")?;
        if own_user_id != self.user_id {
            tracing::warn!(
                configured = %self.user_id,
                actual = %own_user_id,
                "configured user id does not match the access token; using the token's identity"
            );
        }

        let initial = self
            .sync(None)
            .await
            .context("Matrix initial sync")?;
        if let Some(room) = initial.rooms.join.get(&self.room_id) {
            self.remember_members(room);
        }
        let mut since = initial.next_batch;

        // Long-poll loop
        loop {
            if tx.is_closed() {
                return Ok(());
            }

            let sync = match self.sync(Some(&since)).await {
                Ok(sync) => sync,
                Err(e) => {
                    tracing::warn!(error = %format!("{e:#}"), "Matrix sync error, retrying");
                    tokio::time::sleep(SYNC_RETRY_DELAY).await;
                    continue;
                }
            };

            for event in self.inbound_events(&own_user_id, &sync).await {
                if tx.send(event).await.is_err() {
                    return Ok(());
                }
            }
            since = sync.next_batch;
        }
    }
}

fn now_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
}

impl DeliveryGateway for MatrixChannel {
    fn send<'a>(
        &'a self,
        room_id: &'a str,
        body: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(self.send_text(room_id, body))
    }
}

impl Channel for MatrixChannel {
    fn name(&self) -> &str {
        "matrix"
    }

    fn listen<'a>(
        &'a self,
        tx: mpsc::Sender<InboundEvent>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(self.listen_loop(tx))
    }

    fn health_check<'a>(&'a self) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
        Box::pin(async move { self.whoami().await.is_ok() })
    }
}
