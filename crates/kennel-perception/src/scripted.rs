//! [`ScriptedClassifier`] – canned gesture sequence for offline runs.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use kennel_types::Gesture;

use crate::classifier::{ClassifierError, GestureClassifier};

/// Replays a fixed gesture sequence, then keeps returning a fallback label.
///
/// Lets the whole pipeline run without a vision service: dispatch, catalog
/// lookup, and watchdog behavior are exercised with deterministic labels.
pub struct ScriptedClassifier {
    script: Mutex<VecDeque<Gesture>>,
    fallback: Gesture,
}

impl ScriptedClassifier {
    /// Replay `script` in order, then return `fallback` forever.
    pub fn new(script: impl IntoIterator<Item = Gesture>, fallback: Gesture) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback,
        }
    }

    /// One forward command, then unknowns: moves the robot once and lets the
    /// watchdog take over.
    pub fn smoke_test() -> Self {
        Self::new([Gesture::Forward], Gesture::Unknown)
    }
}

#[async_trait]
impl GestureClassifier for ScriptedClassifier {
    async fn classify(&self, _frame: &[u8]) -> Result<Gesture, ClassifierError> {
        let mut script = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(script.pop_front().unwrap_or(self.fallback))
    }
}
