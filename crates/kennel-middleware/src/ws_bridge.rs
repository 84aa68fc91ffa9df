//! WebSocket gateway for remote robots.
//!
//! Robots (or the camera relays speaking for them) connect to this endpoint
//! as WebSocket clients. The bridge is a dumb pipe between the socket and
//! the [`LocalBus`]:
//!
//! 1. **Inbound** – every text frame a client sends is published verbatim on
//!    the upload topic. Parsing and validation are the dispatcher's job.
//!
//! 2. **Outbound** – every payload published on the control topic is
//!    forwarded verbatim to all connected clients.
//!
//! The bridge is intentionally agnostic about the *meaning* of the traffic
//! it routes; it only handles framing and fan-out.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{error, info, warn};

use kennel_types::EdgeError;

use crate::bus::LocalBus;

/// Bridge between remote WebSocket robots and the internal [`LocalBus`].
#[derive(Clone)]
pub struct WsBridge {
    bus: Arc<LocalBus>,
    upload_topic: String,
    control_topic: String,
}

impl WsBridge {
    /// Create a bridge that publishes client frames on `upload_topic` and
    /// forwards `control_topic` payloads back to clients.
    pub fn new(
        bus: Arc<LocalBus>,
        upload_topic: impl Into<String>,
        control_topic: impl Into<String>,
    ) -> Self {
        Self {
            bus,
            upload_topic: upload_topic.into(),
            control_topic: control_topic.into(),
        }
    }

    /// Bind `addr` and serve clients until a fatal bind error.
    ///
    /// # Errors
    ///
    /// Returns [`EdgeError::Channel`] if the TCP listener cannot be bound.
    pub async fn run(self, addr: SocketAddr) -> Result<(), EdgeError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| EdgeError::Channel(format!("ws bind error on {addr}: {e}")))?;
        info!(%addr, "robot gateway listening");
        self.serve(listener).await
    }

    /// Serve clients from an already-bound listener. Used directly by tests
    /// that bind to an ephemeral port.
    pub async fn serve(self, listener: TcpListener) -> Result<(), EdgeError> {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let bridge = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = bridge.handle_client(stream, peer).await {
                            error!(peer = %peer, error = %e, "ws client error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "ws accept error");
                }
            }
        }
    }

    async fn handle_client(&self, stream: TcpStream, peer: SocketAddr) -> Result<(), EdgeError> {
        let ws_stream = accept_async(stream)
            .await
            .map_err(|e| EdgeError::Channel(format!("ws handshake from {peer}: {e}")))?;
        info!(peer = %peer, "robot connected");

        let (mut ws_tx, mut ws_rx) = ws_stream.split();
        let mut control = self.bus.subscribe_to(&self.control_topic);

        loop {
            tokio::select! {
                // Forward control envelopes to the connected robot.
                result = control.recv() => {
                    match result {
                        Ok(payload) => {
                            if ws_tx.send(Message::Text(payload.into())).await.is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(peer = %peer, lagged_by = n, "ws client lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                // Publish robot uploads onto the bus.
                msg = ws_rx.next() => {
                    match msg {
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Err(_)) => break,
                        Some(Ok(Message::Text(text))) => {
                            // Dropped when the dispatcher is not up yet.
                            let _ = self.bus.publish_to(&self.upload_topic, text.as_str());
                        }
                        _ => {}
                    }
                }
            }
        }

        info!(peer = %peer, "robot disconnected");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;
    use tokio_tungstenite::connect_async;

    async fn spawn_gateway() -> (Arc<LocalBus>, SocketAddr) {
        let bus = Arc::new(LocalBus::default());
        let bridge = WsBridge::new(Arc::clone(&bus), "robot_upload", "control");
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(bridge.serve(listener));
        (bus, addr)
    }

    #[tokio::test]
    async fn round_trip_through_the_gateway() {
        let (bus, addr) = spawn_gateway().await;
        let mut uploads = bus.subscribe_to("robot_upload");

        let (mut client, _) = connect_async(format!("ws://{addr}")).await.unwrap();

        // Robot → bus.
        client
            .send(Message::Text(r#"{"type":"getControlByCam","dog_id":7}"#.into()))
            .await
            .unwrap();
        let upload = timeout(Duration::from_secs(5), uploads.recv())
            .await
            .expect("upload within deadline")
            .unwrap();
        assert!(upload.contains("getControlByCam"));

        // Bus → robot. The received upload proves the client loop is live,
        // so its control subscription exists.
        bus.publish_to("control", r#"{"type":"ControlData"}"#).unwrap();
        let frame = timeout(Duration::from_secs(5), client.next())
            .await
            .expect("control frame within deadline")
            .unwrap()
            .unwrap();
        assert_eq!(
            frame.into_text().unwrap().as_str(),
            r#"{"type":"ControlData"}"#
        );
    }

    #[tokio::test]
    async fn control_frames_fan_out_to_every_client() {
        let (bus, addr) = spawn_gateway().await;
        let mut uploads = bus.subscribe_to("robot_upload");

        let (mut client_a, _) = connect_async(format!("ws://{addr}")).await.unwrap();
        let (mut client_b, _) = connect_async(format!("ws://{addr}")).await.unwrap();

        // Prove both client loops are live before publishing.
        client_a.send(Message::Text("a".into())).await.unwrap();
        client_b.send(Message::Text("b".into())).await.unwrap();
        for _ in 0..2 {
            timeout(Duration::from_secs(5), uploads.recv())
                .await
                .expect("upload within deadline")
                .unwrap();
        }

        bus.publish_to("control", "stand everyone").unwrap();

        for client in [&mut client_a, &mut client_b] {
            let frame = timeout(Duration::from_secs(5), client.next())
                .await
                .expect("control frame within deadline")
                .unwrap()
                .unwrap();
            assert_eq!(frame.into_text().unwrap().as_str(), "stand everyone");
        }
    }

    #[tokio::test]
    async fn binary_frames_are_ignored() {
        let (bus, addr) = spawn_gateway().await;
        let mut uploads = bus.subscribe_to("robot_upload");

        let (mut client, _) = connect_async(format!("ws://{addr}")).await.unwrap();

        client
            .send(Message::Binary(vec![0xde, 0xad].into()))
            .await
            .unwrap();
        client.send(Message::Text("after binary".into())).await.unwrap();

        // Frames are ordered per connection, so if the binary frame had been
        // published it would have arrived first.
        let upload = timeout(Duration::from_secs(5), uploads.recv())
            .await
            .expect("upload within deadline")
            .unwrap();
        assert_eq!(upload, "after binary");
        assert!(uploads.try_recv().is_err());
    }
}
