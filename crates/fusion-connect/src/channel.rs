//! Live Update Channel: server-pushed named events over SSE
//!
//! The channel keeps one long-lived `text/event-stream` connection open and
//! reconnects on its own after transport failures, waiting for the server's
//! `retry:` hint between attempts. Consumers see a transport-independent
//! stream of `ChannelSignal`s:
//!
//! ```text
//!            Opened / Event
//! Connecting ──────────────► Connected
//!     ▲                         │
//!     │ Connecting              │ Error
//!     │ (auto-reconnect)        ▼
//!     └──────────────────────  Down
//! ```
//!
//! Payloads are decoded as JSON; anything else is handed over as raw text
//! and left to the consumer.

use crate::client::ApiClient;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Reconnect delay used until the server sends a `retry:` hint
pub const DEFAULT_RETRY: Duration = Duration::from_millis(2000);

/// Signals buffered between the transport task and the consumer
const SIGNAL_BUFFER: usize = 256;

/// Connection health as reflected from the transport lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelState {
    #[default]
    Connecting,
    Connected,
    Down,
}

impl ChannelState {
    /// Next state after observing `signal`
    pub fn on_signal(self, signal: &ChannelSignal) -> ChannelState {
        match signal {
            ChannelSignal::Connecting => ChannelState::Connecting,
            ChannelSignal::Opened | ChannelSignal::Event(_) => ChannelState::Connected,
            ChannelSignal::Error(_) => ChannelState::Down,
        }
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelState::Connecting => write!(f, "connecting"),
            ChannelState::Connected => write!(f, "connected"),
            ChannelState::Down => write!(f, "down"),
        }
    }
}

/// Decoded event data
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    /// Data that did not parse as JSON, delivered verbatim
    Raw(String),
}

impl Payload {
    pub fn decode(data: &str) -> Self {
        match serde_json::from_str(data) {
            Ok(value) => Payload::Json(value),
            Err(_) => Payload::Raw(data.to_string()),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(value) => Some(value),
            Payload::Raw(_) => None,
        }
    }
}

/// One named event received on the channel
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelEvent {
    pub name: String,
    pub payload: Payload,
    pub id: Option<String>,
}

impl ChannelEvent {
    pub fn new(name: impl Into<String>, data: &str) -> Self {
        Self {
            name: name.into(),
            payload: Payload::decode(data),
            id: None,
        }
    }

    /// Map the event name onto the known vocabulary
    pub fn route(self) -> LiveEvent {
        match self.name.as_str() {
            "hello" => LiveEvent::Hello(self.payload),
            "heartbeat" => LiveEvent::Heartbeat,
            "event_created" => LiveEvent::EventCreated(self.payload),
            "asset_updated" => LiveEvent::AssetUpdated(self.payload),
            "alert_raised" => LiveEvent::AlertRaised(self.payload),
            "admin_notice" => LiveEvent::AdminNotice(self.payload),
            _ => LiveEvent::Other {
                name: self.name,
                payload: self.payload,
            },
        }
    }
}

/// Channel events by meaning
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    Hello(Payload),
    Heartbeat,
    EventCreated(Payload),
    AssetUpdated(Payload),
    AlertRaised(Payload),
    AdminNotice(Payload),
    Other { name: String, payload: Payload },
}

/// What the transport reports to the consumer
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelSignal {
    /// A (re)connect attempt has started
    Connecting,
    /// The stream is open
    Opened,
    Event(ChannelEvent),
    /// Transport-level failure; a reconnect follows
    Error(String),
}

/// Consumer side of an open channel
///
/// `close()` is idempotent and dropping the subscription closes it too.
#[derive(Debug)]
pub struct ChannelSubscription {
    rx: mpsc::Receiver<ChannelSignal>,
    cancel: CancellationToken,
    closed: bool,
}

impl ChannelSubscription {
    /// Wrap a signal receiver; cancelling `cancel` stops the producer
    pub fn new(rx: mpsc::Receiver<ChannelSignal>, cancel: CancellationToken) -> Self {
        Self {
            rx,
            cancel,
            closed: false,
        }
    }

    /// Next signal, or `None` once closed or the producer is gone
    pub async fn next(&mut self) -> Option<ChannelSignal> {
        if self.closed {
            return None;
        }
        self.rx.recv().await
    }

    /// Close the channel. Returns `true` only for the call that closed it.
    pub fn close(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.closed = true;
        self.cancel.cancel();
        self.rx.close();
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for ChannelSubscription {
    fn drop(&mut self) {
        self.close();
    }
}

/// A push channel that can be opened repeatedly
pub trait LiveChannel: Send + Sync {
    fn open(&self) -> ChannelSubscription;
}

/// Server-sent-events implementation of `LiveChannel`
#[derive(Debug, Clone)]
pub struct SseChannel {
    client: ApiClient,
    path: String,
    default_retry: Duration,
}

impl SseChannel {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            path: "api/stream".to_string(),
            default_retry: DEFAULT_RETRY,
        }
    }

    /// Override the reconnect delay used before any server hint
    pub fn with_retry(mut self, retry: Duration) -> Self {
        self.default_retry = retry;
        self
    }
}

impl LiveChannel for SseChannel {
    fn open(&self) -> ChannelSubscription {
        let (tx, rx) = mpsc::channel(SIGNAL_BUFFER);
        let cancel = CancellationToken::new();

        tokio::spawn(pump(
            self.client.clone(),
            self.path.clone(),
            tx,
            cancel.clone(),
            self.default_retry,
        ));

        ChannelSubscription::new(rx, cancel)
    }
}

/// Transport loop: connect, forward events, back off, reconnect
async fn pump(
    client: ApiClient,
    path: String,
    tx: mpsc::Sender<ChannelSignal>,
    cancel: CancellationToken,
    mut retry: Duration,
) {
    let mut attempt: u64 = 0;

    loop {
        if attempt > 0 && tx.send(ChannelSignal::Connecting).await.is_err() {
            return;
        }
        attempt += 1;

        let request = match client.stream_request(&path) {
            Ok(request) => request,
            Err(e) => {
                let _ = tx.send(ChannelSignal::Error(e.to_string())).await;
                return;
            }
        };

        let response = tokio::select! {
            _ = cancel.cancelled() => return,
            response = request.send() => response,
        };

        let failure = match response {
            Ok(response) if response.status().is_success() => {
                info!("📡 Live channel open (attempt {})", attempt);
                if tx.send(ChannelSignal::Opened).await.is_err() {
                    return;
                }

                let mut events = response.bytes_stream().eventsource();
                loop {
                    let next = tokio::select! {
                        _ = cancel.cancelled() => return,
                        next = events.next() => next,
                    };

                    match next {
                        Some(Ok(event)) => {
                            if let Some(hint) = event.retry {
                                retry = hint;
                            }
                            // retry-only blocks carry no event
                            if event.data.is_empty()
                                && (event.event.is_empty() || event.event == "message")
                            {
                                continue;
                            }

                            let name = if event.event.is_empty() {
                                "message".to_string()
                            } else {
                                event.event
                            };
                            let mut channel_event = ChannelEvent::new(name, &event.data);
                            channel_event.id = (!event.id.is_empty()).then_some(event.id);

                            debug!("Live event: {}", channel_event.name);
                            if tx.send(ChannelSignal::Event(channel_event)).await.is_err() {
                                return;
                            }
                        }
                        Some(Err(e)) => break e.to_string(),
                        None => break "stream closed by server".to_string(),
                    }
                }
            }
            Ok(response) => format!("unexpected status {}", response.status()),
            Err(e) => e.to_string(),
        };

        warn!(
            "Live channel down: {} (reconnecting in {}ms)",
            failure,
            retry.as_millis()
        );
        if tx.send(ChannelSignal::Error(failure)).await.is_err() {
            return;
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(retry) => {}
        }
    }
}
