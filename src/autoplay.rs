//! Scripted stand-in for the player
//!
//! Tackles fleeing thieves and works through side tasks from its post at
//! the checkout. Good enough to exercise every player-facing entry point of
//! the simulation without a human at the keyboard.

use glam::Vec3;
use market_core::SubtaskId;
use market_sim::states::names;
use market_sim::{Condition, Simulation, TaskKind};
use tracing::debug;

use crate::settings::PlayerSettings;

/// Next thing to do for the first unfinished subtask
#[derive(Debug, Clone, Copy, PartialEq)]
enum Chore {
    Grab(SubtaskId),
    Hold(SubtaskId),
    Place(market_core::ShelfId),
}

#[derive(Debug)]
pub struct AutoPlayer {
    settings: PlayerSettings,
    position: Vec3,
    post: Vec3,
    holding: Option<SubtaskId>,
    place_cooldown: f32,
}

impl AutoPlayer {
    pub fn new(settings: PlayerSettings, post: Vec3) -> Self {
        Self {
            settings,
            position: post,
            post,
            holding: None,
            place_cooldown: 0.0,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Act for one frame of `delta` simulated seconds
    pub fn update(&mut self, sim: &mut Simulation, delta: f32) {
        self.place_cooldown = (self.place_cooldown - delta).max(0.0);

        let thief = self.fleeing_thief(sim);
        match thief {
            Some((id, at)) => {
                // Chasing means letting go of whatever is being held
                self.release(sim);
                self.walk_towards(at, delta);
                if self.position.distance(at) <= self.settings.reach && sim.hit_agent(id) {
                    debug!(agent = %id, "tackled thief");
                }
            }
            None => {
                self.walk_towards(self.post, delta);
                self.work(sim);
            }
        }

        sim.set_player_position(self.position);
    }

    fn fleeing_thief(&self, sim: &Simulation) -> Option<(market_core::AgentId, Vec3)> {
        if !self.settings.stop_thieves {
            return None;
        }
        sim.population()
            .agents()
            .filter(|a| !a.is_retiring() && a.current_state() == names::RUN)
            .map(|a| (a.id, a.body.position()))
            .min_by(|a, b| {
                let da = a.1.distance_squared(self.position);
                let db = b.1.distance_squared(self.position);
                da.total_cmp(&db)
            })
    }

    fn next_chore(sim: &Simulation) -> Option<Chore> {
        sim.tasks()
            .active_tasks()
            .filter(|t| !t.is_complete())
            .find_map(|task| {
                let subtask = task.subtasks().iter().find(|s| !s.is_done())?;
                match (&subtask.condition, task.kind) {
                    (Condition::Grab, _) => Some(Chore::Grab(subtask.id)),
                    (Condition::Hold { .. }, _) => Some(Chore::Hold(subtask.id)),
                    (Condition::Place { .. }, TaskKind::Restock { shelf }) => {
                        Some(Chore::Place(shelf))
                    }
                    (Condition::Place { .. }, _) => None,
                }
            })
    }

    fn work(&mut self, sim: &mut Simulation) {
        let chore = Self::next_chore(sim);

        // Stop holding anything that is no longer the current chore
        if let Some(held) = self.holding {
            if chore != Some(Chore::Hold(held)) {
                self.release(sim);
            }
        }

        match chore {
            Some(Chore::Grab(subtask)) => {
                if sim.grab_item(subtask) {
                    debug!(%subtask, "grabbed item");
                }
            }
            Some(Chore::Hold(subtask)) => {
                if self.holding.is_none() && sim.begin_interaction(subtask) {
                    debug!(%subtask, "holding interaction");
                    self.holding = Some(subtask);
                }
            }
            Some(Chore::Place(shelf)) => {
                if self.place_cooldown <= 0.0 && sim.place_stock(shelf) {
                    debug!(%shelf, "placed item");
                    self.place_cooldown = self.settings.place_interval;
                }
            }
            None => {}
        }
    }

    fn release(&mut self, sim: &mut Simulation) {
        if let Some(subtask) = self.holding.take() {
            sim.end_interaction(subtask);
        }
    }

    fn walk_towards(&mut self, target: Vec3, delta: f32) {
        let offset = target - self.position;
        let distance = offset.length();
        let step = self.settings.speed * delta;
        if distance <= step {
            self.position = target;
        } else {
            self.position += offset / distance * step;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_core::TimeConfig;
    use market_sim::SimulationSetup;

    fn sim() -> Simulation {
        Simulation::new(SimulationSetup {
            seed: 3,
            time: TimeConfig {
                time_scale: 1.0,
                fixed_timestep: 0.1,
                max_delta_time: 0.25,
            },
            staff: Vec::new(),
            ..Default::default()
        })
    }

    #[test]
    fn test_walks_at_most_speed_per_second() {
        let mut player = AutoPlayer::new(PlayerSettings::default(), Vec3::ZERO);
        player.walk_towards(Vec3::new(10.0, 0.0, 0.0), 0.5);
        assert!((player.position().x - 2.0).abs() < 1e-5);
        player.walk_towards(Vec3::new(2.5, 0.0, 0.0), 1.0);
        assert_eq!(player.position(), Vec3::new(2.5, 0.0, 0.0));
    }

    #[test]
    fn test_idle_player_stays_at_post() {
        let mut sim = sim();
        let post = Vec3::new(1.0, 0.0, 1.0);
        let mut player = AutoPlayer::new(PlayerSettings::default(), post);
        player.update(&mut sim, 0.1);
        assert_eq!(sim.player_position(), post);
    }
}
