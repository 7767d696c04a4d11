//! Movement proxy over an opaque path-following agent
//!
//! The simulation never plans paths itself. A [`PathAgent`] walks toward a
//! destination and reports arrival; [`MovementProxy`] turns that report into a
//! sticky `arrived` flag that states read on the following `execute`.

use glam::Vec3;
use tracing::trace;

/// Distance on the ground plane below which a walker counts as arrived
pub const ARRIVAL_RADIUS: f32 = 0.5;

/// Navigation collaborator. Setting a destination it cannot reach is a no-op.
pub trait PathAgent: Send {
    fn set_destination(&mut self, point: Vec3);

    /// Drop the current destination and stand still
    fn clear_destination(&mut self);

    fn has_arrived(&self) -> bool;

    fn set_enabled(&mut self, enabled: bool);

    fn is_enabled(&self) -> bool;

    fn position(&self) -> Vec3;

    /// Advance motion by `delta` seconds
    fn advance(&mut self, delta: f32);
}

/// Per-agent movement handle used by states
pub struct MovementProxy {
    agent: Box<dyn PathAgent>,
    destination: Option<Vec3>,
    arrived: bool,
}

impl std::fmt::Debug for MovementProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MovementProxy")
            .field("position", &self.agent.position())
            .field("destination", &self.destination)
            .field("arrived", &self.arrived)
            .finish()
    }
}

impl MovementProxy {
    pub fn new(agent: Box<dyn PathAgent>) -> Self {
        Self {
            agent,
            destination: None,
            arrived: false,
        }
    }

    /// Start walking toward `point`. Clears the arrival flag.
    pub fn move_to(&mut self, point: Vec3) {
        self.destination = Some(point);
        self.arrived = false;
        self.agent.set_destination(point);
    }

    pub fn stop(&mut self) {
        self.destination = None;
        self.arrived = false;
        self.agent.clear_destination();
    }

    pub fn enable(&mut self) {
        self.agent.set_enabled(true);
    }

    pub fn disable(&mut self) {
        self.agent.set_enabled(false);
    }

    pub fn is_enabled(&self) -> bool {
        self.agent.is_enabled()
    }

    /// Advance the walker and latch arrival. Runs before the agent's FSM tick.
    pub fn resolve(&mut self, delta: f32) {
        self.agent.advance(delta);
        if !self.arrived && self.destination.is_some() && self.agent.has_arrived() {
            trace!(position = ?self.agent.position(), "arrived at destination");
            self.arrived = true;
        }
    }

    /// Whether the current destination has been reached
    pub fn arrived(&self) -> bool {
        self.arrived
    }

    pub fn destination(&self) -> Option<Vec3> {
        self.destination
    }

    pub fn position(&self) -> Vec3 {
        self.agent.position()
    }
}

/// Kinematic walker for headless runs: straight line on the ground plane,
/// constant speed, optional walkable bounds.
#[derive(Debug, Clone)]
pub struct StraightLineAgent {
    position: Vec3,
    target: Option<Vec3>,
    speed: f32,
    enabled: bool,
    bounds: Option<(Vec3, Vec3)>,
}

impl StraightLineAgent {
    pub fn new(position: Vec3, speed: f32) -> Self {
        Self {
            position,
            target: None,
            speed,
            enabled: true,
            bounds: None,
        }
    }

    /// Restrict destinations to the box spanned by `min` and `max` (ground plane)
    pub fn with_bounds(mut self, min: Vec3, max: Vec3) -> Self {
        self.bounds = Some((min.min(max), min.max(max)));
        self
    }

    fn walkable(&self, point: Vec3) -> bool {
        match self.bounds {
            Some((min, max)) => {
                point.x >= min.x && point.x <= max.x && point.z >= min.z && point.z <= max.z
            }
            None => point.is_finite(),
        }
    }

    fn horizontal_distance(&self, target: Vec3) -> f32 {
        let to_target = target - self.position;
        Vec3::new(to_target.x, 0.0, to_target.z).length()
    }
}

impl PathAgent for StraightLineAgent {
    fn set_destination(&mut self, point: Vec3) {
        if self.walkable(point) {
            self.target = Some(point);
        } else {
            trace!(?point, "destination off the walkable surface ignored");
        }
    }

    fn clear_destination(&mut self) {
        self.target = None;
    }

    fn has_arrived(&self) -> bool {
        self.target
            .map(|t| self.horizontal_distance(t) < ARRIVAL_RADIUS)
            .unwrap_or(false)
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn position(&self) -> Vec3 {
        self.position
    }

    fn advance(&mut self, delta: f32) {
        if !self.enabled {
            return;
        }
        let Some(target) = self.target else {
            return;
        };
        let to_target = target - self.position;
        let horizontal = Vec3::new(to_target.x, 0.0, to_target.z);
        let distance = horizontal.length();
        if distance < ARRIVAL_RADIUS {
            return;
        }
        let step = self.speed * delta;
        if step >= distance {
            self.position.x = target.x;
            self.position.z = target.z;
        } else {
            self.position += horizontal.normalize_or_zero() * step;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walker_reaches_target() {
        let mut proxy = MovementProxy::new(Box::new(StraightLineAgent::new(Vec3::ZERO, 2.0)));
        proxy.move_to(Vec3::new(4.0, 0.0, 0.0));
        proxy.resolve(1.0);
        assert!(!proxy.arrived());
        assert!((proxy.position().x - 2.0).abs() < 1e-5);
        proxy.resolve(1.0);
        assert!(proxy.arrived());

        // New destination clears the flag
        proxy.move_to(Vec3::new(0.0, 0.0, 3.0));
        assert!(!proxy.arrived());
    }

    #[test]
    fn test_disabled_walker_does_not_move() {
        let mut proxy = MovementProxy::new(Box::new(StraightLineAgent::new(Vec3::ZERO, 2.0)));
        proxy.move_to(Vec3::new(4.0, 0.0, 0.0));
        proxy.disable();
        proxy.resolve(1.0);
        assert_eq!(proxy.position(), Vec3::ZERO);
        proxy.enable();
        proxy.resolve(1.0);
        assert!(proxy.position().x > 0.0);
    }

    #[test]
    fn test_unwalkable_destination_is_noop() {
        let walker = StraightLineAgent::new(Vec3::ZERO, 2.0)
            .with_bounds(Vec3::new(-5.0, 0.0, -5.0), Vec3::new(5.0, 0.0, 5.0));
        let mut proxy = MovementProxy::new(Box::new(walker));
        proxy.move_to(Vec3::new(50.0, 0.0, 0.0));
        for _ in 0..10 {
            proxy.resolve(1.0);
        }
        assert_eq!(proxy.position(), Vec3::ZERO);
        assert!(!proxy.arrived());
    }

    #[test]
    fn test_stop_clears_arrival() {
        let mut proxy = MovementProxy::new(Box::new(StraightLineAgent::new(Vec3::ZERO, 10.0)));
        proxy.move_to(Vec3::new(1.0, 0.0, 0.0));
        proxy.resolve(1.0);
        assert!(proxy.arrived());
        proxy.stop();
        assert!(!proxy.arrived());
        assert_eq!(proxy.destination(), None);
    }
}
