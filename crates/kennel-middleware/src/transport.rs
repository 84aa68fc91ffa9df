//! The transport seam.
//!
//! The edge controller never speaks a broker protocol directly. It publishes
//! and subscribes through [`Transport`], and the deployment decides what sits
//! behind it.
//!
//! # Overview
//!
//! - [`Transport`] – the trait every message carrier must implement.
//! - [`LocalBus`][crate::bus::LocalBus] – in-process broadcast channels, the
//!   default carrier.
//! - [`WsBridge`][crate::ws_bridge::WsBridge] – extends the local bus to
//!   remote robots over WebSocket.

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use kennel_types::EdgeError;

/// A topic-addressed message carrier.
///
/// # Contract
///
/// * `publish` – hand `payload` to every current subscriber of `topic`.
///   Publishing to a topic nobody listens on succeeds; the payload is
///   dropped, as a broker would drop it.
///
/// * `subscribe` – return a live stream of raw payloads published to
///   `topic` from this point on. Earlier traffic is not replayed.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Publish `payload` on `topic`.
    async fn publish(&self, topic: &str, payload: String) -> Result<(), EdgeError>;

    /// Subscribe to `topic`, returning the stream of future payloads.
    async fn subscribe(&self, topic: &str) -> Result<BoxStream<'static, String>, EdgeError>;
}
