//! [`WatchdogRegistry`] – per-robot fail-safe countdowns.
//!
//! Every robot that has received at least one command owns exactly one
//! countdown task. Each dispatched command re-arms that robot's countdown to
//! the full window; when a window elapses with no traffic the registry emits
//! a stand command for the robot and immediately re-arms the same countdown,
//! so a robot that stays silent is parked upright once per window until it is
//! retired.
//!
//! The decrement, the zero check, and the reset all happen under the robot's
//! counter lock; the stand envelope is sent only after the lock is released.
//! A dispatcher refresh therefore observes the counter either before the
//! decrement or after the reset, never a dead value in between.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use kennel_types::{Envelope, RobotId};

use crate::catalog;

// ────────────────────────────────────────────────────────────────────────────
// Public types
// ────────────────────────────────────────────────────────────────────────────

/// Outcome of [`WatchdogRegistry::arm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmOutcome {
    /// First command for this robot; a new countdown task was spawned.
    Created,
    /// The robot already had a countdown; its counter was reset to the full
    /// window.
    Refreshed,
}

// ────────────────────────────────────────────────────────────────────────────
// Internal entry
// ────────────────────────────────────────────────────────────────────────────

struct WatchdogEntry {
    remaining: Arc<Mutex<u32>>,
    task: JoinHandle<()>,
}

/// A counter guards plain integers that are valid in every state, so a
/// poisoned lock just hands back the inner value.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ────────────────────────────────────────────────────────────────────────────
// Registry
// ────────────────────────────────────────────────────────────────────────────

/// Owns one self-re-arming countdown per robot and the channel on which
/// expired countdowns emit their fail-safe stand command.
pub struct WatchdogRegistry {
    window_ticks: u32,
    tick: Duration,
    outbox: mpsc::Sender<Envelope>,
    entries: Mutex<HashMap<RobotId, WatchdogEntry>>,
}

impl WatchdogRegistry {
    /// Create a registry whose countdowns expire after `window_ticks` ticks
    /// of `tick` each, emitting stand envelopes into `outbox`.
    ///
    /// # Panics
    ///
    /// Panics if `window_ticks` is zero.
    pub fn new(window_ticks: u32, tick: Duration, outbox: mpsc::Sender<Envelope>) -> Self {
        assert!(window_ticks >= 1, "watchdog window must be at least one tick");
        Self {
            window_ticks,
            tick,
            outbox,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Arm the countdown for `robot`: reset an existing counter to the full
    /// window, or spawn a fresh countdown task for a robot seen for the first
    /// time.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime, since new countdowns are
    /// spawned onto it.
    pub fn arm(&self, robot: RobotId) -> ArmOutcome {
        let mut entries = lock(&self.entries);

        if let Some(entry) = entries.get(&robot)
            && !entry.task.is_finished()
        {
            *lock(&entry.remaining) = self.window_ticks;
            debug!(robot = %robot, "watchdog refreshed");
            return ArmOutcome::Refreshed;
        }

        let remaining = Arc::new(Mutex::new(self.window_ticks));
        let task = tokio::spawn(countdown(
            robot,
            Arc::clone(&remaining),
            self.window_ticks,
            self.tick,
            self.outbox.clone(),
        ));
        entries.insert(robot, WatchdogEntry { remaining, task });
        debug!(robot = %robot, window = self.window_ticks, "watchdog armed");
        ArmOutcome::Created
    }

    /// Stop tracking `robot`, aborting its countdown task. Returns `false`
    /// if the robot was not tracked. No stand command is emitted for a
    /// retired robot, though one already queued may still drain.
    pub fn retire(&self, robot: RobotId) -> bool {
        let mut entries = lock(&self.entries);
        match entries.remove(&robot) {
            Some(entry) => {
                entry.task.abort();
                debug!(robot = %robot, "watchdog retired");
                true
            }
            None => false,
        }
    }

    /// Abort every countdown and clear the registry.
    pub fn shutdown(&self) {
        let mut entries = lock(&self.entries);
        for (robot, entry) in entries.drain() {
            entry.task.abort();
            debug!(robot = %robot, "watchdog stopped");
        }
    }

    /// Whether `robot` currently has a countdown.
    pub fn is_tracked(&self, robot: RobotId) -> bool {
        lock(&self.entries).contains_key(&robot)
    }

    /// Ticks left before `robot`'s countdown expires, or `None` if the robot
    /// is not tracked.
    pub fn remaining(&self, robot: RobotId) -> Option<u32> {
        let entries = lock(&self.entries);
        entries.get(&robot).map(|entry| *lock(&entry.remaining))
    }

    /// Ids of every robot with a live countdown, in no particular order.
    pub fn tracked(&self) -> Vec<RobotId> {
        lock(&self.entries).keys().copied().collect()
    }
}

impl Drop for WatchdogRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Countdown task
// ────────────────────────────────────────────────────────────────────────────

/// One robot's countdown loop. Decrements once per tick; on reaching zero it
/// re-arms itself to the full window and emits a stand envelope.
async fn countdown(
    robot: RobotId,
    remaining: Arc<Mutex<u32>>,
    window_ticks: u32,
    tick: Duration,
    outbox: mpsc::Sender<Envelope>,
) {
    loop {
        tokio::time::sleep(tick).await;

        let expired = {
            let mut remaining = lock(&remaining);
            // Between ticks the counter sits in 1..=window (arm sets the
            // full window, expiry resets it), so this never underflows.
            *remaining -= 1;
            if *remaining == 0 {
                *remaining = window_ticks;
                true
            } else {
                false
            }
        };

        if expired {
            info!(robot = %robot, "watchdog expired, emitting fail-safe stand");
            let envelope = Envelope::control(robot, catalog::stand());
            if outbox.send(envelope).await.is_err() {
                warn!(robot = %robot, "control outbox closed, stopping watchdog");
                return;
            }
        }
    }
}
