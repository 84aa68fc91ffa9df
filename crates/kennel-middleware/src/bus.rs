//! Headless, topic-based publish/subscribe bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every payload without any single subscriber blocking
//! the others. Topics are plain strings created lazily on first use; the two
//! the controller cares about are configured at startup:
//!
//! | Topic | Typical traffic |
//! |---|---|
//! | `robot_upload` | Camera-derived control requests sent by robots |
//! | `control` | Control envelopes addressed to robots |

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use tokio::sync::broadcast;
use tracing::warn;

use kennel_types::EdgeError;

use crate::transport::Transport;

/// Default channel capacity (number of buffered payloads before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// In-process message bus. Share it behind an [`Arc`][std::sync::Arc] – all
/// handles use the same underlying broadcast channels.
///
/// The bus exposes two APIs:
///
/// * The [`Transport`] impl (`publish` / `subscribe`) – what the controller
///   itself runs on. Broker semantics: publishing with no subscribers drops
///   the payload and succeeds.
/// * **Inherent** (`publish_to` / `subscribe_to`) – used by the WebSocket
///   gateway and by tests that want delivery counts and raw receivers.
pub struct LocalBus {
    capacity: usize,
    topics: Mutex<HashMap<String, broadcast::Sender<String>>>,
}

impl LocalBus {
    /// Create a new bus whose topic channels each buffer `capacity` payloads.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            topics: Mutex::new(HashMap::new()),
        }
    }

    /// Publish `payload` to `topic`.
    ///
    /// Returns the number of active subscribers that were handed the payload,
    /// or [`EdgeError::Channel`] when nobody is listening on the topic.
    pub fn publish_to(&self, topic: &str, payload: impl Into<String>) -> Result<usize, EdgeError> {
        self.topic_sender(topic)
            .send(payload.into())
            .map_err(|_| EdgeError::Channel(format!("no subscribers on topic {topic}")))
    }

    /// Subscribe to `topic`, receiving every payload published from now on.
    pub fn subscribe_to(&self, topic: &str) -> broadcast::Receiver<String> {
        self.topic_sender(topic).subscribe()
    }

    /// Channel for `topic`, created on first use. Returns a clone so the
    /// topic map lock is never held across a send.
    fn topic_sender(&self, topic: &str) -> broadcast::Sender<String> {
        let mut topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl Transport for LocalBus {
    async fn publish(&self, topic: &str, payload: String) -> Result<(), EdgeError> {
        // Broker semantics: a topic with no listeners swallows the payload.
        if self.topic_sender(topic).send(payload).is_err() {
            warn!(topic = %topic, "published with no subscribers, payload dropped");
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<BoxStream<'static, String>, EdgeError> {
        Ok(payload_stream(self.subscribe_to(topic), topic.to_string()))
    }
}

/// Adapt a broadcast receiver into a payload stream. Lagged gaps are logged
/// and skipped; the stream ends when the bus is dropped.
fn payload_stream(rx: broadcast::Receiver<String>, topic: String) -> BoxStream<'static, String> {
    stream::unfold(rx, move |mut rx| {
        let topic = topic.clone();
        async move {
            loop {
                match rx.recv().await {
                    Ok(payload) => return Some((payload, rx)),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(topic = %topic, lagged_by = n, "bus subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        }
    })
    .boxed()
}
