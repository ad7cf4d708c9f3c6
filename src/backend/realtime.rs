//! Realtime record events over Server-Sent Events.
//!
//! The server opens the stream with a `PB_CONNECT` event carrying a client
//! id; the client then posts the list of topics it wants. Every other event
//! is named after the topic it belongs to.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{ACCEPT, HeaderValue};
use reqwest::Url;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use super::subscriptions::{RecordEvent, SubscriptionRegistry};
use crate::error::{Result, ScheduleError};

pub const CONNECT_EVENT: &str = "PB_CONNECT";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

/// One dispatched SSE event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub id: Option<String>,
    pub event: String,
    pub data: String,
}

/// Incremental SSE frame parser. Feed it raw bytes as they arrive.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    current: SseEvent,
    has_data: bool,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }
        events
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            if !self.has_data && self.current.event.is_empty() {
                return None;
            }
            self.has_data = false;
            let mut event = std::mem::take(&mut self.current);
            if event.event.is_empty() {
                event.event = "message".to_string();
            }
            return Some(event);
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.current.event = value.to_string(),
            "data" => {
                if self.has_data {
                    self.current.data.push('\n');
                }
                self.current.data.push_str(value);
                self.has_data = true;
            }
            "id" => self.current.id = Some(value.to_string()),
            _ => {}
        }
        None
    }
}

#[derive(Debug, Deserialize)]
struct ConnectPayload {
    #[serde(rename = "clientId")]
    client_id: String,
}

#[derive(Debug, Deserialize)]
struct EventPayload {
    #[serde(default)]
    action: String,
    #[serde(default)]
    record: Value,
}

/// Converts a topic event into a [`RecordEvent`].
pub fn record_event(topic: &str, data: &str) -> RecordEvent {
    let collection = topic.split('/').next().unwrap_or(topic).to_string();
    match serde_json::from_str::<EventPayload>(data) {
        Ok(payload) => RecordEvent {
            collection,
            action: payload.action,
            record: payload.record,
        },
        Err(_) => RecordEvent {
            collection,
            action: String::new(),
            record: Value::Null,
        },
    }
}

/// Owns the SSE stream and keeps the server's topic list in sync with the registry.
pub struct RealtimeConnection {
    client: reqwest::Client,
    endpoint: Url,
    registry: Arc<SubscriptionRegistry>,
    client_id: watch::Sender<Option<String>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RealtimeConnection {
    pub fn new(client: reqwest::Client, endpoint: Url, registry: Arc<SubscriptionRegistry>) -> Self {
        let (client_id, _) = watch::channel(None);
        Self {
            client,
            endpoint,
            registry,
            client_id,
            task: Mutex::new(None),
        }
    }

    /// Starts the stream if needed and waits for the server's client id.
    pub async fn ensure_connected(self: &Arc<Self>) -> Result<String> {
        {
            let mut task = self.task.lock().await;
            if task.as_ref().map_or(true, JoinHandle::is_finished) {
                let this = Arc::clone(self);
                *task = Some(tokio::spawn(async move { this.run().await }));
            }
        }

        let mut rx = self.client_id.subscribe();
        let wait = rx.wait_for(Option::is_some);
        let waited = match tokio::time::timeout(CONNECT_TIMEOUT, wait).await {
            Ok(Ok(id)) => Ok(id.clone().unwrap_or_default()),
            Ok(Err(_)) => Err(ScheduleError::Subscription("realtime connection closed".to_string())),
            Err(_) => Err(ScheduleError::Subscription(
                "timed out waiting for the realtime connection".to_string(),
            )),
        };
        waited
    }

    /// Posts the registry's current topics for this client.
    pub async fn sync_topics(&self) -> Result<()> {
        let Some(client_id) = self.client_id.borrow().clone() else {
            return Ok(());
        };
        self.post_topics(&client_id).await
    }

    async fn post_topics(&self, client_id: &str) -> Result<()> {
        let topics = self.registry.topics();
        tracing::debug!(client_id, ?topics, "submitting realtime subscriptions");
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&json!({ "clientId": client_id, "subscriptions": topics }))
            .send()
            .await
            .map_err(|e| ScheduleError::Subscription(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScheduleError::Subscription(format!(
                "realtime subscription rejected ({status}): {body}"
            )));
        }
        Ok(())
    }

    /// Stops the stream; a later subscribe reconnects.
    pub async fn shutdown(&self) {
        if let Some(task) = self.task.lock().await.take() {
            task.abort();
        }
        self.client_id.send_replace(None);
    }

    async fn run(self: Arc<Self>) {
        let mut delay = Duration::from_secs(1);
        loop {
            match self.stream_once().await {
                Ok(()) => tracing::info!("realtime stream closed by server, reconnecting"),
                Err(e) => tracing::warn!("realtime stream failed: {e}"),
            }
            self.client_id.send_replace(None);
            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(MAX_RECONNECT_DELAY);
        }
    }

    async fn stream_once(&self) -> Result<()> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .header(ACCEPT, HeaderValue::from_static("text/event-stream"))
            .send()
            .await?
            .error_for_status()?;

        let mut parser = SseParser::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            for event in parser.feed(&chunk) {
                self.handle_event(event).await;
            }
        }
        Ok(())
    }

    async fn handle_event(&self, event: SseEvent) {
        if event.event == CONNECT_EVENT {
            let client_id = match serde_json::from_str::<ConnectPayload>(&event.data) {
                Ok(payload) => payload.client_id,
                Err(_) => event.id.clone().unwrap_or_default(),
            };
            tracing::debug!(client_id, "realtime connected");
            // Topics must be posted before waiters see the id.
            if let Err(e) = self.post_topics(&client_id).await {
                tracing::warn!("could not restore realtime subscriptions: {e}");
            }
            self.client_id.send_replace(Some(client_id));
            return;
        }

        let record = record_event(&event.event, &event.data);
        let delivered = self.registry.dispatch(&event.event, &record);
        tracing::trace!(topic = %event.event, action = %record.action, delivered, "realtime event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_events_split_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"id:abc\nevent:PB_CON").is_empty());
        let events = parser.feed(b"NECT\ndata:{\"clientId\":\"abc\"}\n\n");
        assert_eq!(
            events,
            vec![SseEvent {
                id: Some("abc".to_string()),
                event: "PB_CONNECT".to_string(),
                data: "{\"clientId\":\"abc\"}".to_string(),
            }]
        );
    }

    #[test]
    fn joins_multiline_data_and_skips_comments() {
        let mut parser = SseParser::new();
        let events = parser.feed(b": keep-alive\r\nevent: lessonSchedule/*\r\ndata: a\r\ndata: b\r\n\r\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "lessonSchedule/*");
        assert_eq!(events[0].data, "a\nb");
    }

    #[test]
    fn unnamed_event_defaults_to_message() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"data: hi\n\n");
        assert_eq!(events[0].event, "message");
    }

    #[test]
    fn record_event_reads_action_and_collection() {
        let event = record_event(
            "groupLessonSchedule/*",
            r#"{"action":"delete","record":{"id":"g1"}}"#,
        );
        assert_eq!(event.collection, "groupLessonSchedule");
        assert_eq!(event.action, "delete");
        assert_eq!(event.record["id"], "g1");

        let garbled = record_event("lessonSchedule/*", "not json");
        assert_eq!(garbled.collection, "lessonSchedule");
        assert!(garbled.action.is_empty());
    }

    fn offline_connection() -> Arc<RealtimeConnection> {
        let endpoint = Url::parse("http://127.0.0.1:1/api/realtime").unwrap();
        Arc::new(RealtimeConnection::new(
            reqwest::Client::new(),
            endpoint,
            Arc::new(SubscriptionRegistry::new()),
        ))
    }

    #[tokio::test]
    async fn ensure_connected_returns_the_known_client_id() {
        let connection = offline_connection();
        connection.client_id.send_replace(Some("abc".to_string()));

        assert_eq!(connection.ensure_connected().await.unwrap(), "abc");

        connection.shutdown().await;
        assert!(connection.client_id.borrow().is_none());
    }
}
