//! Gesture-to-command catalog.
//!
//! A fixed table mapping each actionable [`Gesture`] to the locomotion
//! command the robot should execute. Every lookup builds its command from
//! [`ControlCommand::template`], so callers always receive an independent
//! value and can never corrupt the table for the next dispatch.

use kennel_types::{ControlCommand, EdgeError, Gesture};

/// Return the control command for `gesture`.
///
/// Total for every actionable gesture; [`Gesture::Unknown`] has no mapping
/// and is rejected with [`EdgeError::UnmappedGesture`].
///
/// | Gesture | `v_des` | `step_height` |
/// |---------|---------|---------------|
/// | Forward | `[0.6, 0.0, 0.0]` | 0.1 |
/// | Back    | `[-0.6, 0.0, 0.0]` | 0.1 |
/// | Stand   | `[0.0, 0.0, 0.0]` | 0.1 |
/// | Down    | `[0.0, 0.0, 0.0]` | 0.04 |
/// | Left    | `[0.0, 0.2, 0.0]` | 0.1 |
/// | Right   | `[0.0, -0.2, 0.0]` | 0.1 |
///
/// # Example
///
/// ```
/// use kennel_kernel::catalog;
/// use kennel_types::Gesture;
///
/// let cmd = catalog::command_for(Gesture::Forward).unwrap();
/// assert_eq!(cmd.v_des, [0.6, 0.0, 0.0]);
///
/// assert!(catalog::command_for(Gesture::Unknown).is_err());
/// ```
pub fn command_for(gesture: Gesture) -> Result<ControlCommand, EdgeError> {
    let (v_des, step_height) = match gesture {
        Gesture::Forward => ([0.6, 0.0, 0.0], 0.1),
        Gesture::Back => ([-0.6, 0.0, 0.0], 0.1),
        Gesture::Stand => ([0.0, 0.0, 0.0], 0.1),
        Gesture::Down => ([0.0, 0.0, 0.0], 0.04),
        Gesture::Left => ([0.0, 0.2, 0.0], 0.1),
        Gesture::Right => ([0.0, -0.2, 0.0], 0.1),
        Gesture::Unknown => return Err(EdgeError::UnmappedGesture(gesture)),
    };
    Ok(ControlCommand {
        v_des,
        step_height,
        ..ControlCommand::template()
    })
}

/// The fail-safe command emitted on watchdog expiry: zero velocity, normal
/// step height. Identical to the command mapped for [`Gesture::Stand`].
pub fn stand() -> ControlCommand {
    ControlCommand {
        step_height: 0.1,
        ..ControlCommand::template()
    }
}
