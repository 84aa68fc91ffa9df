//! [`Dispatcher`] – one inbound event in, at most one control command out.
//!
//! Each call to [`Dispatcher::dispatch`] walks a single camera event through
//! the full pipeline:
//!
//! 1. **Probe** – cheap `type`-tag check. Foreign traffic on a shared topic
//!    is dropped silently; only payloads claiming to be control requests are
//!    held to the full schema.
//! 2. **Decode** – parse the [`ControlRequest`] and base64-decode its frame.
//! 3. **Classify** – hand the frame bytes to the [`GestureClassifier`]. No
//!    lock is held across this await, so a slow classification for one robot
//!    never stalls another robot's dispatch.
//! 4. **Map** – look the gesture up in the command [`catalog`];
//!    [`Gesture::Unknown`] ends the pipeline with no command and no watchdog
//!    touch.
//! 5. **Arm** – reset the robot's fail-safe countdown to the full window.
//!
//! The dispatcher never publishes: it returns the [`Envelope`] and the
//! service forwards it to the control topic, keeping state transitions and
//! emission decoupled.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use tracing::{debug, info};

use kennel_kernel::WatchdogRegistry;
use kennel_kernel::catalog;
use kennel_perception::GestureClassifier;
use kennel_types::{CONTROL_BY_CAM_TYPE, ControlRequest, EdgeError, Envelope, Gesture};

/// Stateless event processor shared by every in-flight dispatch task.
pub struct Dispatcher {
    classifier: Arc<dyn GestureClassifier>,
    watchdogs: Arc<WatchdogRegistry>,
}

impl Dispatcher {
    /// Build a dispatcher over a classifier backend and the watchdog
    /// registry it arms.
    pub fn new(classifier: Arc<dyn GestureClassifier>, watchdogs: Arc<WatchdogRegistry>) -> Self {
        Self {
            classifier,
            watchdogs,
        }
    }

    /// Process one raw upload-topic payload.
    ///
    /// Returns `Ok(Some(envelope))` when the event maps to a control
    /// command, and `Ok(None)` when the payload is not a control request or
    /// the frame shows no actionable gesture.
    ///
    /// # Errors
    ///
    /// - [`EdgeError::MalformedRequest`] – the payload claims the control
    ///   request type but fails the schema, or its image is not valid base64.
    /// - [`EdgeError::Classifier`] – the classifier backend failed.
    pub async fn dispatch(&self, payload: &str) -> Result<Option<Envelope>, EdgeError> {
        // Probe the type tag before deserializing the whole request.
        let Ok(probe) = serde_json::from_str::<serde_json::Value>(payload) else {
            debug!("ignoring non-JSON payload on upload topic");
            return Ok(None);
        };
        if probe.get("type").and_then(|t| t.as_str()) != Some(CONTROL_BY_CAM_TYPE) {
            debug!("ignoring payload without the control-request type tag");
            return Ok(None);
        }

        let request: ControlRequest = serde_json::from_str(payload)
            .map_err(|e| EdgeError::MalformedRequest(format!("control request: {e}")))?;

        let frame = STANDARD
            .decode(&request.data.image)
            .map_err(|e| EdgeError::MalformedRequest(format!("image for {}: {e}", request.dog_id)))?;

        let gesture = self
            .classifier
            .classify(&frame)
            .await
            .map_err(|e| EdgeError::Classifier(e.to_string()))?;

        if !gesture.is_actionable() {
            debug!(robot = %request.dog_id, "frame shows no actionable gesture");
            return Ok(None);
        }

        let command = catalog::command_for(gesture)?;
        self.watchdogs.arm(request.dog_id);

        let envelope = Envelope::control(request.dog_id, command);
        // Age of the frame we acted on: capture stamp to command emission.
        let spend_ms = Utc::now()
            .timestamp_millis()
            .saturating_sub(request.timestamp.saturating_mul(1_000));
        info!(
            robot = %request.dog_id,
            dog_name = %request.dog_name,
            gesture = ?gesture,
            spend_ms,
            "control command dispatched"
        );
        Ok(Some(envelope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    use kennel_perception::ScriptedClassifier;
    use kennel_types::RobotId;

    fn make_dispatcher(script: Vec<Gesture>) -> (Dispatcher, Arc<WatchdogRegistry>) {
        let (tx, _rx) = mpsc::channel(8);
        // A window far longer than any test so countdowns never fire.
        let watchdogs = Arc::new(WatchdogRegistry::new(1_000, Duration::from_secs(1), tx));
        let classifier = Arc::new(ScriptedClassifier::new(script, Gesture::Unknown));
        (
            Dispatcher::new(classifier, Arc::clone(&watchdogs)),
            watchdogs,
        )
    }

    fn make_request(dog_id: i64) -> String {
        serde_json::json!({
            "type": "getControlByCam",
            "dog_id": dog_id,
            "dog_name": "rex",
            "timestamp": 1_600_000_000,
            "data": { "image": STANDARD.encode(b"frame") },
        })
        .to_string()
    }

    // ------ happy path

    #[tokio::test]
    async fn forward_request_produces_forward_command() {
        let (dispatcher, watchdogs) = make_dispatcher(vec![Gesture::Forward]);

        let envelope = dispatcher
            .dispatch(&make_request(7))
            .await
            .unwrap()
            .expect("actionable gesture must produce a command");

        assert_eq!(envelope.dog_id, RobotId(7));
        assert_eq!(envelope.kind, "ControlData");
        assert_eq!(envelope.data.v_des, [0.6, 0.0, 0.0]);
        assert_eq!(envelope.data.step_height, 0.1);
        assert!(watchdogs.is_tracked(RobotId(7)));
    }

    #[tokio::test]
    async fn dispatch_refreshes_an_existing_watchdog() {
        let (dispatcher, watchdogs) =
            make_dispatcher(vec![Gesture::Forward, Gesture::Back]);

        dispatcher.dispatch(&make_request(7)).await.unwrap();
        assert_eq!(watchdogs.remaining(RobotId(7)), Some(1_000));

        dispatcher.dispatch(&make_request(7)).await.unwrap();
        assert_eq!(watchdogs.remaining(RobotId(7)), Some(1_000));
        assert!(watchdogs.is_tracked(RobotId(7)));
    }

    // ------ silent ignores

    #[tokio::test]
    async fn non_json_payload_is_ignored() {
        let (dispatcher, watchdogs) = make_dispatcher(vec![Gesture::Forward]);

        let result = dispatcher.dispatch("not json at all").await.unwrap();
        assert!(result.is_none());
        assert!(!watchdogs.is_tracked(RobotId(7)));
    }

    #[tokio::test]
    async fn foreign_type_tag_is_ignored() {
        let (dispatcher, _watchdogs) = make_dispatcher(vec![Gesture::Forward]);

        let payload = r#"{"type":"Telemetry","dog_id":7,"battery":88}"#;
        let result = dispatcher.dispatch(payload).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn unknown_gesture_produces_nothing_and_does_not_arm() {
        let (dispatcher, watchdogs) = make_dispatcher(vec![Gesture::Unknown]);

        let result = dispatcher.dispatch(&make_request(7)).await.unwrap();
        assert!(result.is_none());
        assert!(
            !watchdogs.is_tracked(RobotId(7)),
            "an unknown gesture must not arm the watchdog"
        );
    }

    // ------ malformed requests

    #[tokio::test]
    async fn missing_fields_are_rejected() {
        let (dispatcher, _watchdogs) = make_dispatcher(vec![Gesture::Forward]);

        // Claims the right type but has no dog_id.
        let payload = r#"{"type":"getControlByCam","dog_name":"rex"}"#;
        let result = dispatcher.dispatch(payload).await;
        assert!(matches!(result, Err(EdgeError::MalformedRequest(_))));
    }

    #[tokio::test]
    async fn invalid_base64_is_rejected() {
        let (dispatcher, watchdogs) = make_dispatcher(vec![Gesture::Forward]);

        let payload = serde_json::json!({
            "type": "getControlByCam",
            "dog_id": 7,
            "dog_name": "rex",
            "timestamp": 1_600_000_000,
            "data": { "image": "%%% not base64 %%%" },
        })
        .to_string();

        let result = dispatcher.dispatch(&payload).await;
        assert!(matches!(result, Err(EdgeError::MalformedRequest(_))));
        assert!(!watchdogs.is_tracked(RobotId(7)));
    }

    // ------ classifier failures

    #[tokio::test]
    async fn classifier_failure_surfaces_as_classifier_error() {
        use async_trait::async_trait;
        use kennel_perception::ClassifierError;

        struct FailingClassifier;

        #[async_trait]
        impl GestureClassifier for FailingClassifier {
            async fn classify(&self, _frame: &[u8]) -> Result<Gesture, ClassifierError> {
                Err(ClassifierError::BadResponse("boom".to_string()))
            }
        }

        let (tx, _rx) = mpsc::channel(8);
        let watchdogs = Arc::new(WatchdogRegistry::new(1_000, Duration::from_secs(1), tx));
        let dispatcher = Dispatcher::new(Arc::new(FailingClassifier), Arc::clone(&watchdogs));

        let result = dispatcher.dispatch(&make_request(7)).await;
        assert!(matches!(result, Err(EdgeError::Classifier(_))));
        assert!(!watchdogs.is_tracked(RobotId(7)));
    }
}
