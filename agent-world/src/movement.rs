//! Movement monitor: velocity derivation, falling/teleport detection, and
//! the interrupt flag the action executor consumes (C10).

use agent_core::position::Position;
use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

const FALL_SPEED_THRESHOLD: f64 = -13.0;
const TELEPORT_SPEED_THRESHOLD: f64 = 30.0;
const SUPERVISOR_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DerivedVelocity {
    pub horizontal_speed: f64,
    pub vertical_speed: f64,
}

struct Sample {
    position: Position,
    at: Instant,
}

#[derive(Default)]
struct State {
    last_sample: Option<Sample>,
    falling: bool,
    teleported: bool,
    interrupted: bool,
    interrupt_reason: Option<String>,
}

/// Tracks position samples across environment refreshes and raises
/// interrupts for a separate 500 ms supervisory tick to consume.
pub struct MovementMonitor {
    state: Mutex<State>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl Default for MovementMonitor {
    fn default() -> Self {
        Self {
            state: Mutex::new(State::default()),
            supervisor: Mutex::new(None),
        }
    }
}

impl MovementMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new position sample (called at each environment update).
    /// The very first sample after construction only stores the position
    /// and resets the clock; there is nothing to derive a delta against.
    pub fn observe_position(&self, position: Position) -> Option<DerivedVelocity> {
        let mut state = self.state.lock();
        let now = Instant::now();
        let Some(prev) = state.last_sample.take() else {
            state.last_sample = Some(Sample { position, at: now });
            return None;
        };

        let dt = now.duration_since(prev.at).as_secs_f64();
        state.last_sample = Some(Sample { position, at: now });
        if dt <= 0.0 {
            return None;
        }

        let delta = position - prev.position;
        let velocity = delta / dt;
        let horizontal_speed = (velocity.x * velocity.x + velocity.z * velocity.z).sqrt();
        let vertical_speed = velocity.y;
        let total_speed = (horizontal_speed * horizontal_speed + vertical_speed * vertical_speed).sqrt();

        if vertical_speed < FALL_SPEED_THRESHOLD {
            state.falling = true;
        }
        if total_speed > TELEPORT_SPEED_THRESHOLD {
            state.teleported = true;
        }

        Some(DerivedVelocity {
            horizontal_speed,
            vertical_speed,
        })
    }

    /// One supervisory tick (§4.10). Given the current `on_ground` flag,
    /// resolves the falling/teleported flags into interrupts.
    pub fn tick(&self, on_ground: bool) {
        let mut state = self.state.lock();
        if state.falling && on_ground {
            state.falling = false;
            raise_interrupt(&mut state, "recently fell");
        } else if state.falling && !on_ground {
            log::debug!("movement monitor: ongoing fall");
        }
        if state.teleported {
            state.teleported = false;
            raise_interrupt(&mut state, "recently teleported");
        }
    }

    /// Raises an interrupt directly, bypassing fall/teleport detection.
    /// Used by the hurt-response pipeline, which knows its own reason
    /// ("damage", "critical_health_interrupt") independent of movement
    /// samples.
    pub fn force_interrupt(&self, reason: &str) {
        let mut state = self.state.lock();
        raise_interrupt(&mut state, reason);
    }

    pub fn interrupted(&self) -> Option<String> {
        let state = self.state.lock();
        if state.interrupted {
            state.interrupt_reason.clone()
        } else {
            None
        }
    }

    /// Consumes (clears) the interrupt flag, returning its reason if one was
    /// set.
    pub fn take_interrupt(&self) -> Option<String> {
        let mut state = self.state.lock();
        if state.interrupted {
            state.interrupted = false;
            state.interrupt_reason.take()
        } else {
            None
        }
    }

    /// Spawns the 500 ms supervisory task against `on_ground` sampled via
    /// `on_ground_probe`. Replaces (aborting) any previously running task.
    pub fn spawn_supervisor<F>(self: &std::sync::Arc<Self>, on_ground_probe: F)
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        let monitor = self.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(SUPERVISOR_INTERVAL);
            loop {
                interval.tick().await;
                monitor.tick(on_ground_probe());
            }
        });
        if let Some(previous) = self.supervisor.lock().replace(handle) {
            previous.abort();
        }
    }

    pub fn stop_supervisor(&self) {
        if let Some(handle) = self.supervisor.lock().take() {
            handle.abort();
        }
    }
}

fn raise_interrupt(state: &mut State, reason: &str) {
    state.interrupted = true;
    state.interrupt_reason = Some(reason.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_derives_nothing() {
        let monitor = MovementMonitor::new();
        let result = monitor.observe_position(Position::new(0.0, 64.0, 0.0));
        assert!(result.is_none());
    }

    #[test]
    fn large_drop_marks_falling_and_tick_raises_interrupt_on_landing() {
        let monitor = MovementMonitor::new();
        monitor.observe_position(Position::new(0.0, 100.0, 0.0));
        {
            let mut state = monitor.state.lock();
            state.last_sample.as_mut().unwrap().at = Instant::now() - Duration::from_millis(100);
        }
        monitor.observe_position(Position::new(0.0, 98.0, 0.0));
        assert!(monitor.state.lock().falling);

        monitor.tick(false);
        assert!(monitor.interrupted().is_none(), "still airborne, no interrupt yet");

        monitor.tick(true);
        assert_eq!(monitor.take_interrupt().as_deref(), Some("recently fell"));
    }

    #[test]
    fn huge_displacement_marks_teleported() {
        let monitor = MovementMonitor::new();
        monitor.observe_position(Position::new(0.0, 64.0, 0.0));
        {
            let mut state = monitor.state.lock();
            state.last_sample.as_mut().unwrap().at = Instant::now() - Duration::from_millis(100);
        }
        monitor.observe_position(Position::new(500.0, 64.0, 0.0));
        assert!(monitor.state.lock().teleported);
        monitor.tick(true);
        assert_eq!(monitor.take_interrupt().as_deref(), Some("recently teleported"));
    }

    #[test]
    fn force_interrupt_sets_a_custom_reason() {
        let monitor = MovementMonitor::new();
        monitor.force_interrupt("damage");
        assert_eq!(monitor.take_interrupt().as_deref(), Some("damage"));
    }

    #[test]
    fn take_interrupt_clears_the_flag() {
        let monitor = MovementMonitor::new();
        monitor.observe_position(Position::new(0.0, 100.0, 0.0));
        {
            let mut state = monitor.state.lock();
            state.last_sample.as_mut().unwrap().at = Instant::now() - Duration::from_millis(100);
        }
        monitor.observe_position(Position::new(0.0, 98.0, 0.0));
        monitor.tick(true);
        assert!(monitor.take_interrupt().is_some());
        assert!(monitor.take_interrupt().is_none());
    }
}
