//! Time system for the simulation
//!
//! Handles simulation time, delta time, deadlines, and the deferred-action
//! queue. Every "wait N seconds" in the simulation is a deadline checked on
//! later ticks; nothing ever sleeps.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration for simulation time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeConfig {
    /// How many simulated seconds pass per real second
    pub time_scale: f32,
    /// Fixed timestep for simulation ticks (in seconds)
    pub fixed_timestep: f32,
    /// Maximum delta time to prevent spiral of death
    pub max_delta_time: f32,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            time_scale: 1.0,
            fixed_timestep: 1.0 / 30.0,
            max_delta_time: 0.25,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum TimeConfigError {
    #[error("fixed timestep must be a positive number of seconds, got {0}")]
    FixedTimestep(f32),
    #[error("max delta time must be a positive number of seconds, got {0}")]
    MaxDeltaTime(f32),
    #[error("time scale must be zero or more, got {0}")]
    TimeScale(f32),
}

impl TimeConfig {
    /// Check the values a clock can run with
    pub fn validate(&self) -> Result<(), TimeConfigError> {
        if !(self.fixed_timestep.is_finite() && self.fixed_timestep > 0.0) {
            return Err(TimeConfigError::FixedTimestep(self.fixed_timestep));
        }
        if !(self.max_delta_time.is_finite() && self.max_delta_time > 0.0) {
            return Err(TimeConfigError::MaxDeltaTime(self.max_delta_time));
        }
        if !(self.time_scale.is_finite() && self.time_scale >= 0.0) {
            return Err(TimeConfigError::TimeScale(self.time_scale));
        }
        Ok(())
    }
}

/// Simulation clock, advanced once per frame by the host
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    /// Configuration
    pub config: TimeConfig,
    /// Time since the shift started in seconds
    pub total_time: f64,
    /// Delta time for this tick (clamped and scaled)
    pub delta_time: f32,
    /// Tick counter
    pub tick_count: u64,
    /// Whether the simulation is paused
    pub paused: bool,
    fixed_accumulator: f32,
}

impl SimClock {
    /// Create a clock with custom config
    pub fn new(config: TimeConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Advance the clock by the raw delta of the previous frame
    pub fn update(&mut self, raw_delta: f32) {
        let clamped = raw_delta.max(0.0).min(self.config.max_delta_time);
        self.tick_count += 1;

        if self.paused {
            self.delta_time = 0.0;
            return;
        }

        self.delta_time = clamped * self.config.time_scale;
        self.total_time += self.delta_time as f64;
        self.fixed_accumulator += self.delta_time;
    }

    /// Number of fixed timesteps to process this frame. A timestep that is
    /// not a positive number runs nothing and discards the accrued time.
    pub fn fixed_steps(&mut self) -> u32 {
        let step = self.config.fixed_timestep;
        if !(step.is_finite() && step > 0.0) {
            self.fixed_accumulator = 0.0;
            return 0;
        }
        let mut steps = 0;
        while self.fixed_accumulator >= self.config.fixed_timestep {
            self.fixed_accumulator -= self.config.fixed_timestep;
            steps += 1;
        }
        steps
    }

    /// Current simulated time in seconds
    pub fn now(&self) -> f64 {
        self.total_time
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Set the time scale (0.0 = frozen, 1.0 = normal, 2.0 = double speed)
    pub fn set_time_scale(&mut self, scale: f32) {
        self.config.time_scale = scale.max(0.0);
    }

    /// Restart the clock at zero (new shift), keeping the configuration
    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }
}

/// A point in simulated time after which something becomes due
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Deadline {
    at: f64,
}

impl Deadline {
    /// A deadline at an absolute time
    pub fn at(at: f64) -> Self {
        Self { at }
    }

    /// A deadline `duration` seconds after `now`
    pub fn after(now: f64, duration: f32) -> Self {
        Self {
            at: now + duration.max(0.0) as f64,
        }
    }

    pub fn is_due(&self, now: f64) -> bool {
        now >= self.at
    }

    /// Seconds left until due (zero once due)
    pub fn remaining(&self, now: f64) -> f64 {
        (self.at - now).max(0.0)
    }

    pub fn time(&self) -> f64 {
        self.at
    }
}

/// Deferred actions polled once per tick.
///
/// Items come out of [`DeferredQueue::drain_due`] ordered by deadline, then by
/// scheduling order for equal deadlines.
#[derive(Debug, Clone)]
pub struct DeferredQueue<T> {
    entries: Vec<(Deadline, u64, T)>,
    next_seq: u64,
}

impl<T> Default for DeferredQueue<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_seq: 0,
        }
    }
}

impl<T> DeferredQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule an item to become due at `deadline`
    pub fn schedule(&mut self, deadline: Deadline, item: T) {
        self.entries.push((deadline, self.next_seq, item));
        self.next_seq += 1;
    }

    /// Remove and return every item whose deadline has passed
    pub fn drain_due(&mut self, now: f64) -> Vec<T> {
        let mut due = Vec::new();
        let mut pending = Vec::with_capacity(self.entries.len());
        for entry in self.entries.drain(..) {
            if entry.0.is_due(now) {
                due.push(entry);
            } else {
                pending.push(entry);
            }
        }
        self.entries = pending;
        due.sort_by(|a, b| {
            a.0.time()
                .partial_cmp(&b.0.time())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });
        due.into_iter().map(|(_, _, item)| item).collect()
    }

    /// Drop every scheduled item matching the predicate
    pub fn cancel_where(&mut self, mut predicate: impl FnMut(&T) -> bool) {
        self.entries.retain(|(_, _, item)| !predicate(item));
    }

    /// Whether any scheduled item matches the predicate
    pub fn contains_where(&self, mut predicate: impl FnMut(&T) -> bool) -> bool {
        self.entries.iter().any(|(_, _, item)| predicate(item))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_update() {
        let mut clock = SimClock::default();
        clock.update(0.1);
        assert!((clock.now() - 0.1).abs() < 1e-6);
        assert_eq!(clock.tick_count, 1);

        clock.pause();
        clock.update(0.1);
        assert_eq!(clock.delta_time, 0.0);
        assert!((clock.now() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_timestep_runs_no_steps() {
        for bad in [0.0, -0.1, f32::NAN] {
            let config = TimeConfig {
                fixed_timestep: bad,
                ..Default::default()
            };
            assert!(matches!(
                config.validate(),
                Err(TimeConfigError::FixedTimestep(_))
            ));
            let mut clock = SimClock::new(config);
            clock.update(0.1);
            assert_eq!(clock.fixed_steps(), 0);
        }
        assert!(TimeConfig::default().validate().is_ok());
        let frozen = TimeConfig {
            time_scale: 0.0,
            ..Default::default()
        };
        assert!(frozen.validate().is_ok());
        let backwards = TimeConfig {
            time_scale: -1.0,
            ..Default::default()
        };
        assert_eq!(backwards.validate(), Err(TimeConfigError::TimeScale(-1.0)));
    }

    #[test]
    fn test_clock_clamps_large_delta() {
        let mut clock = SimClock::default();
        clock.update(10.0);
        assert!((clock.delta_time - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_fixed_steps() {
        let mut clock = SimClock::new(TimeConfig {
            time_scale: 1.0,
            fixed_timestep: 0.1,
            max_delta_time: 1.0,
        });
        clock.update(0.25);
        assert_eq!(clock.fixed_steps(), 2);
        clock.update(0.05);
        assert_eq!(clock.fixed_steps(), 1);
    }

    #[test]
    fn test_deadline() {
        let deadline = Deadline::after(10.0, 2.5);
        assert!(!deadline.is_due(12.0));
        assert!(deadline.is_due(12.5));
        assert_eq!(deadline.remaining(13.0), 0.0);
    }

    #[test]
    fn test_deferred_queue_orders_due_items() {
        let mut queue = DeferredQueue::new();
        queue.schedule(Deadline::at(3.0), "late");
        queue.schedule(Deadline::at(1.0), "early");
        queue.schedule(Deadline::at(1.0), "early-second");
        queue.schedule(Deadline::at(9.0), "pending");

        assert!(queue.drain_due(0.5).is_empty());
        assert_eq!(queue.drain_due(5.0), vec!["early", "early-second", "late"]);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_deferred_queue_cancel() {
        let mut queue = DeferredQueue::new();
        queue.schedule(Deadline::at(1.0), 1);
        queue.schedule(Deadline::at(1.0), 2);
        queue.cancel_where(|item| *item == 1);
        assert!(!queue.contains_where(|item| *item == 1));
        assert_eq!(queue.drain_due(2.0), vec![2]);
    }
}
