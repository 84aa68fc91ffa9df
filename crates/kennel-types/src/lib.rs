use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message type tag carried by inbound camera-derived control requests.
pub const CONTROL_BY_CAM_TYPE: &str = "getControlByCam";

/// Message type tag carried by outbound control envelopes.
pub const CONTROL_DATA_TYPE: &str = "ControlData";

/// Opaque identifier for an addressed robot.
///
/// Stable for the lifetime of a session; the value is whatever the bus
/// supplied, no uniqueness is enforced beyond that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RobotId(pub i64);

impl std::fmt::Display for RobotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RobotId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Discrete human-motion label produced by the external vision classifier.
///
/// [`Gesture::Unknown`] is a sentinel meaning "no actionable command"; the
/// dispatcher drops it before it can reach the command catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gesture {
    Unknown,
    Forward,
    Back,
    Stand,
    Down,
    Left,
    Right,
}

impl Gesture {
    /// Map the classifier's discrete class index onto a gesture.
    ///
    /// | Label | Gesture |
    /// |---|---|
    /// | 1 | Forward |
    /// | 2 | Back |
    /// | 3 | Stand |
    /// | 4 | Down |
    /// | 5 | Left |
    /// | 6 | Right |
    /// | 0 or anything else | Unknown |
    pub fn from_label(label: u8) -> Self {
        match label {
            1 => Gesture::Forward,
            2 => Gesture::Back,
            3 => Gesture::Stand,
            4 => Gesture::Down,
            5 => Gesture::Left,
            6 => Gesture::Right,
            _ => Gesture::Unknown,
        }
    }

    /// `true` for every gesture that maps to a control command.
    pub fn is_actionable(self) -> bool {
        !matches!(self, Gesture::Unknown)
    }
}

/// Motion-control command understood by the robot's locomotion controller.
///
/// `v_des` is the desired velocity vector (forward, lateral, yaw), each
/// component in `[-1, 1]`; `rpy_des` is the desired roll/pitch/yaw
/// orientation. Values are produced fresh from [`ControlCommand::template`]
/// on every dispatch so one command is never aliased by another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlCommand {
    pub control_mode: i32,
    pub gait_type: Option<i32>,
    pub v_des: [f32; 3],
    pub step_height: f32,
    pub rpy_des: [f32; 3],
}

impl ControlCommand {
    /// Control mode expected by the locomotion firmware for velocity commands.
    pub const CONTROL_MODE: i32 = 11;

    /// The shared immutable base every command is built from: fixed control
    /// mode, no gait override, zero velocity, zero step height, level
    /// orientation. Returns an independent value on each call.
    pub fn template() -> Self {
        Self {
            control_mode: Self::CONTROL_MODE,
            gait_type: None,
            v_des: [0.0, 0.0, 0.0],
            step_height: 0.0,
            rpy_des: [0.0, 0.0, 0.0],
        }
    }
}

/// Outbound wrapper carrying a [`ControlCommand`] plus addressing and status
/// metadata, serialized exactly as the control topic expects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub dog_id: RobotId,
    /// Unix seconds at the moment of emission.
    pub timestamp: i64,
    /// 0 = OK.
    pub return_code: i32,
    pub return_msg: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: ControlCommand,
}

impl Envelope {
    /// Wrap `command` for `dog_id`, stamped with the current unix time and an
    /// OK status.
    pub fn control(dog_id: RobotId, command: ControlCommand) -> Self {
        Self {
            dog_id,
            timestamp: Utc::now().timestamp(),
            return_code: 0,
            return_msg: "OK".to_string(),
            kind: CONTROL_DATA_TYPE.to_string(),
            data: command,
        }
    }
}

/// Inbound camera-derived control request (`type == "getControlByCam"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub dog_id: RobotId,
    pub dog_name: String,
    /// Unix seconds at which the robot captured the frame.
    pub timestamp: i64,
    pub data: ImagePayload,
}

/// Image payload of a [`ControlRequest`]; `image` is base64-encoded bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagePayload {
    pub image: String,
}

/// Error type spanning request decoding, classification, and bus plumbing.
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum EdgeError {
    /// Inbound payload missing required fields or carrying undecodable data.
    #[error("malformed control request: {0}")]
    MalformedRequest(String),

    /// The command catalog was asked for a gesture it does not map
    /// (only [`Gesture::Unknown`] falls in this category).
    #[error("no control command is mapped for gesture {0:?}")]
    UnmappedGesture(Gesture),

    /// The external gesture classifier failed for this event.
    #[error("gesture classifier failed: {0}")]
    Classifier(String),

    /// An internal channel or transport operation failed.
    #[error("bus channel error: {0}")]
    Channel(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn robot_id_serializes_transparently() {
        let id = RobotId(7);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "7");
        let back: RobotId = serde_json::from_str("42").unwrap();
        assert_eq!(back, RobotId(42));
    }

    #[test]
    fn gesture_from_label_covers_full_set() {
        assert_eq!(Gesture::from_label(1), Gesture::Forward);
        assert_eq!(Gesture::from_label(2), Gesture::Back);
        assert_eq!(Gesture::from_label(3), Gesture::Stand);
        assert_eq!(Gesture::from_label(4), Gesture::Down);
        assert_eq!(Gesture::from_label(5), Gesture::Left);
        assert_eq!(Gesture::from_label(6), Gesture::Right);
    }

    #[test]
    fn gesture_from_label_out_of_range_is_unknown() {
        assert_eq!(Gesture::from_label(0), Gesture::Unknown);
        assert_eq!(Gesture::from_label(7), Gesture::Unknown);
        assert_eq!(Gesture::from_label(255), Gesture::Unknown);
    }

    #[test]
    fn only_unknown_is_not_actionable() {
        assert!(!Gesture::Unknown.is_actionable());
        for g in [
            Gesture::Forward,
            Gesture::Back,
            Gesture::Stand,
            Gesture::Down,
            Gesture::Left,
            Gesture::Right,
        ] {
            assert!(g.is_actionable(), "{g:?} must be actionable");
        }
    }

    #[test]
    fn template_is_zeroed_with_fixed_mode() {
        let t = ControlCommand::template();
        assert_eq!(t.control_mode, 11);
        assert_eq!(t.gait_type, None);
        assert_eq!(t.v_des, [0.0, 0.0, 0.0]);
        assert_eq!(t.step_height, 0.0);
        assert_eq!(t.rpy_des, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn template_calls_return_independent_values() {
        let mut a = ControlCommand::template();
        let b = ControlCommand::template();
        a.v_des = [0.6, 0.0, 0.0];
        a.step_height = 0.1;
        // Mutating one command must not leak into the next template value.
        assert_eq!(b.v_des, [0.0, 0.0, 0.0]);
        assert_eq!(b.step_height, 0.0);
    }

    #[test]
    fn envelope_wire_shape_matches_control_topic() {
        let env = Envelope::control(RobotId(7), ControlCommand::template());
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["dog_id"], 7);
        assert_eq!(json["type"], "ControlData");
        assert_eq!(json["return_code"], 0);
        assert_eq!(json["return_msg"], "OK");
        assert_eq!(json["data"]["control_mode"], 11);
        assert!(json["data"]["gait_type"].is_null());
        assert_eq!(json["data"]["v_des"][0], 0.0);
        assert!(json["timestamp"].as_i64().unwrap() > 1_600_000_000);
    }

    #[test]
    fn envelope_roundtrip() {
        let env = Envelope::control(RobotId(3), ControlCommand::template());
        let json = serde_json::to_string(&env).unwrap();
        let back: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back, env);
    }

    #[test]
    fn control_request_parses_upload_topic_shape() {
        let raw = r#"{
            "type": "getControlByCam",
            "dog_id": 7,
            "dog_name": "rex",
            "timestamp": 1600000000,
            "data": { "image": "aGVsbG8=" }
        }"#;
        let req: ControlRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(req.kind, CONTROL_BY_CAM_TYPE);
        assert_eq!(req.dog_id, RobotId(7));
        assert_eq!(req.dog_name, "rex");
        assert_eq!(req.timestamp, 1_600_000_000);
        assert_eq!(req.data.image, "aGVsbG8=");
    }

    #[test]
    fn control_request_missing_field_is_rejected() {
        // No dog_id.
        let raw = r#"{"type":"getControlByCam","dog_name":"rex","timestamp":0,"data":{"image":""}}"#;
        assert!(serde_json::from_str::<ControlRequest>(raw).is_err());
    }

    #[test]
    fn edge_error_display() {
        let err = EdgeError::UnmappedGesture(Gesture::Unknown);
        assert!(err.to_string().contains("Unknown"));

        let err2 = EdgeError::MalformedRequest("bad base64".to_string());
        assert!(err2.to_string().contains("bad base64"));
    }
}
