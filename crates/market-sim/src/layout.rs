//! Fixed points of the store floor

use glam::Vec3;
use market_core::SimRng;
use serde::{Deserialize, Serialize};

use crate::stock::ShelfSpec;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreLayout {
    /// Where customers appear
    pub entrance: Vec3,
    pub exit: Vec3,
    pub checkouts: Vec<Vec3>,
    pub office: Vec3,
    /// Manager patrol route; empty means random points on the floor
    pub patrol_points: Vec<Vec3>,
    pub floor_min: Vec3,
    pub floor_max: Vec3,
    pub shelves: Vec<ShelfSpec>,
}

impl Default for StoreLayout {
    fn default() -> Self {
        let shelf = |name: &str, product: u32, x: f32, z: f32| ShelfSpec {
            name: name.to_string(),
            product,
            position: Vec3::new(x, 0.0, z),
            capacity: 8,
        };
        Self {
            entrance: Vec3::new(0.0, 0.0, -10.0),
            exit: Vec3::new(2.0, 0.0, -10.0),
            checkouts: vec![Vec3::new(-4.0, 0.0, -6.0), Vec3::new(-1.0, 0.0, -6.0)],
            office: Vec3::new(9.0, 0.0, 9.0),
            patrol_points: vec![
                Vec3::new(-8.0, 0.0, 0.0),
                Vec3::new(0.0, 0.0, 6.0),
                Vec3::new(8.0, 0.0, 0.0),
                Vec3::new(0.0, 0.0, -4.0),
            ],
            floor_min: Vec3::new(-10.0, 0.0, -10.0),
            floor_max: Vec3::new(10.0, 0.0, 10.0),
            shelves: vec![
                shelf("Dairy", 1, -6.0, 4.0),
                shelf("Bakery", 2, -2.0, 4.0),
                shelf("Produce", 3, 2.0, 4.0),
                shelf("Snacks", 4, 6.0, 4.0),
            ],
        }
    }
}

impl StoreLayout {
    /// A random checkout, or the exit when the store has none
    pub fn pick_checkout(&self, rng: &mut SimRng) -> Vec3 {
        rng.index(self.checkouts.len())
            .map(|i| self.checkouts[i])
            .unwrap_or(self.exit)
    }

    /// Uniform point on the floor, at floor height
    pub fn random_floor_point(&self, rng: &mut SimRng) -> Vec3 {
        let mut point = rng.point_in(self.floor_min, self.floor_max);
        point.y = self.floor_min.y;
        point
    }

    pub fn pick_patrol_point(&self, rng: &mut SimRng) -> Vec3 {
        match rng.index(self.patrol_points.len()) {
            Some(i) => self.patrol_points[i],
            None => self.random_floor_point(rng),
        }
    }
}
