//! [`EdgeService`] – the long-running edge controller.
//!
//! Owns the full path from an inbound robot upload to an outbound control
//! frame:
//!
//! 1. **Intake** – subscribe to the upload topic on the [`Transport`] and
//!    hand every raw payload to a [`Dispatcher`] on its own task, so one
//!    slow classification never stalls the intake loop.
//! 2. **Fail-safe** – a shared [`WatchdogRegistry`], re-armed on every
//!    dispatched command, parks silent robots upright once per window.
//! 3. **Emission** – gesture commands and watchdog stands funnel through a
//!    single outbox channel and leave through one publisher task, so control
//!    frames reach the wire in the order they were produced.
//!
//! # Shutdown
//!
//! [`EdgeService::run`] listens on a `watch` channel. When the flag flips to
//! `true`, or the sender is dropped, the service stops intake, aborts every
//! watchdog countdown, drains frames already queued in the outbox, and
//! returns.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use kennel_kernel::WatchdogRegistry;
use kennel_middleware::Transport;
use kennel_perception::GestureClassifier;
use kennel_types::{EdgeError, Envelope};

use crate::dispatcher::Dispatcher;

// ────────────────────────────────────────────────────────────────────────────
// Constants
// ────────────────────────────────────────────────────────────────────────────

/// Bound on control frames queued for publication before dispatch tasks and
/// watchdogs start waiting on the outbox.
const OUTBOX_CAPACITY: usize = 64;

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Configuration bundle for [`EdgeService`].
#[derive(Debug, Clone)]
pub struct EdgeServiceConfig {
    /// Topic carrying inbound camera uploads from the robots.
    pub upload_topic: String,
    /// Topic on which control envelopes are published.
    pub control_topic: String,
    /// Fail-safe window length, in ticks.
    pub watchdog_window_ticks: u32,
    /// Length of one watchdog tick.
    pub watchdog_tick: Duration,
}

impl Default for EdgeServiceConfig {
    fn default() -> Self {
        Self {
            upload_topic: "robot_upload".to_string(),
            control_topic: "control".to_string(),
            watchdog_window_ticks: 4,
            watchdog_tick: Duration::from_secs(1),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// EdgeService
// ────────────────────────────────────────────────────────────────────────────

/// The edge controller.
///
/// Generic over its [`Transport`] and [`GestureClassifier`], so the same
/// service runs against the in-process bus with a scripted classifier in
/// tests and against the deployment transport and vision service in
/// production.
pub struct EdgeService {
    transport: Arc<dyn Transport>,
    classifier: Arc<dyn GestureClassifier>,
    config: EdgeServiceConfig,
}

impl EdgeService {
    /// Assemble a service around the given transport and classifier.
    pub fn new(
        transport: Arc<dyn Transport>,
        classifier: Arc<dyn GestureClassifier>,
        config: EdgeServiceConfig,
    ) -> Self {
        Self {
            transport,
            classifier,
            config,
        }
    }

    /// Run the controller until `shutdown` flips to `true` (or its sender is
    /// dropped) or the upload stream ends.
    ///
    /// Consumes the service: intake, fail-safe countdowns, and the publisher
    /// all stop before this returns, so a fresh service must be built to run
    /// again.
    ///
    /// # Errors
    ///
    /// Returns [`EdgeError::Channel`] if the upload topic cannot be
    /// subscribed.
    ///
    /// # Panics
    ///
    /// Panics if `watchdog_window_ticks` is zero.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), EdgeError> {
        let EdgeService {
            transport,
            classifier,
            config,
        } = self;

        let (outbox_tx, outbox_rx) = mpsc::channel(OUTBOX_CAPACITY);
        let watchdogs = Arc::new(WatchdogRegistry::new(
            config.watchdog_window_ticks,
            config.watchdog_tick,
            outbox_tx.clone(),
        ));
        let dispatcher = Arc::new(Dispatcher::new(classifier, Arc::clone(&watchdogs)));

        let mut uploads = transport.subscribe(&config.upload_topic).await?;

        let publisher = tokio::spawn(publish_loop(
            Arc::clone(&transport),
            config.control_topic.clone(),
            outbox_rx,
        ));

        info!(
            upload_topic = %config.upload_topic,
            control_topic = %config.control_topic,
            window_ticks = config.watchdog_window_ticks,
            tick_ms = config.watchdog_tick.as_millis() as u64,
            "edge service running"
        );

        loop {
            tokio::select! {
                maybe = uploads.next() => match maybe {
                    Some(payload) => {
                        debug!(topic = %config.upload_topic, bytes = payload.len(), "upload received");
                        let dispatcher = Arc::clone(&dispatcher);
                        let outbox = outbox_tx.clone();
                        tokio::spawn(async move {
                            match dispatcher.dispatch(&payload).await {
                                Ok(Some(envelope)) => {
                                    if outbox.send(envelope).await.is_err() {
                                        debug!("control outbox closed; command dropped");
                                    }
                                }
                                Ok(None) => {}
                                Err(e) => warn!(error = %e, "inbound event dropped"),
                            }
                        });
                    }
                    None => {
                        info!("upload stream ended; stopping edge service");
                        break;
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("shutdown requested; stopping edge service");
                        break;
                    }
                }
            }
        }

        // Stop the countdowns first so no further stands are queued. The
        // registry holds an outbox sender of its own, so every handle this
        // task owns must go before the publisher can see the channel close;
        // dispatch tasks still in flight keep their clones until they finish,
        // and their envelopes drain normally.
        info!(robots = watchdogs.tracked().len(), "stopping fail-safe countdowns");
        watchdogs.shutdown();
        drop(dispatcher);
        drop(watchdogs);
        drop(outbox_tx);
        if let Err(e) = publisher.await {
            warn!(error = %e, "control publisher task failed");
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Publisher task
// ────────────────────────────────────────────────────────────────────────────

/// Forwards queued control envelopes to the control topic until the outbox
/// closes. The single consumer keeps emission ordered across dispatch tasks
/// and watchdog countdowns.
async fn publish_loop(
    transport: Arc<dyn Transport>,
    topic: String,
    mut outbox: mpsc::Receiver<Envelope>,
) {
    while let Some(envelope) = outbox.recv().await {
        let payload = match serde_json::to_string(&envelope) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, robot = %envelope.dog_id, "failed to encode control frame");
                continue;
            }
        };
        match transport.publish(&topic, payload).await {
            Ok(()) => debug!(topic = %topic, robot = %envelope.dog_id, "control frame published"),
            Err(e) => warn!(error = %e, robot = %envelope.dog_id, "control publish failed"),
        }
    }
    debug!("control outbox closed; publisher stopping");
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
