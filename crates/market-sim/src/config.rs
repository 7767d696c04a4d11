//! Day-indexed tunables
//!
//! Values live in per-day tables. Reading a key that the active day does not
//! define yields 0; use [`ProbabilityConfig::lookup_float`] when "unset" must
//! be told apart from an explicit zero.
//!
//! ```toml
//! [days.1.floats]
//! "spawn.normal" = 0.7
//! [days.1.ints]
//! "customers.capacity" = 6
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Well-known configuration keys
pub mod keys {
    // Population
    pub const CUSTOMER_CAPACITY: &str = "customers.capacity";
    pub const SPAWN_NORMAL: &str = "spawn.normal";
    pub const SPAWN_KID: &str = "spawn.kid";
    pub const SPAWN_KAREN: &str = "spawn.karen";

    // Customers
    pub const THIEF_PROBABILITY: &str = "customer.thief";
    pub const BROWSE_MIN: &str = "customer.browse_min";
    pub const BROWSE_MAX: &str = "customer.browse_max";
    pub const PAY_MIN: &str = "customer.pay_min";
    pub const PAY_MAX: &str = "customer.pay_max";
    pub const KNOCKED_MIN: &str = "knocked.min";
    pub const KNOCKED_MAX: &str = "knocked.max";

    // Kid
    pub const ROAM_MIN: &str = "kid.roam_min";
    pub const ROAM_MAX: &str = "kid.roam_max";

    // Karen
    pub const COMPLAIN_MIN: &str = "karen.complain_min";
    pub const COMPLAIN_MAX: &str = "karen.complain_max";
    pub const MAX_COMPLAINING: &str = "karen.max_complaining";
    pub const MAX_ATTACKS: &str = "karen.max_attacks";
    pub const ATTACK_INTERVAL: &str = "karen.attack_interval";
    pub const REACH: &str = "karen.reach";
    pub const CHASE_TIMEOUT: &str = "karen.chase_timeout";

    // Manager
    pub const PATROL_MIN: &str = "manager.patrol_min";
    pub const PATROL_MAX: &str = "manager.patrol_max";
    pub const OFFICE_MIN: &str = "manager.office_min";
    pub const OFFICE_MAX: &str = "manager.office_max";

    // Tasks
    pub const TASK_INTERVAL: &str = "tasks.interval";
    pub const TASK_FUSE_BOX: &str = "tasks.fix_fuse_box";
    pub const TASK_CLEAN_FLOOR: &str = "tasks.clean_floor";
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("day key '{0}' is not a day number")]
    InvalidDay(String),
}

/// Result of a lookup that distinguishes a missing key from a stored value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigLookup<T> {
    Unset,
    Value(T),
}

impl<T: Default> ConfigLookup<T> {
    /// The stored value, or the type's zero
    pub fn or_zero(self) -> T {
        match self {
            ConfigLookup::Unset => T::default(),
            ConfigLookup::Value(v) => v,
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, ConfigLookup::Unset)
    }
}

/// Values for one day
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DayValues {
    #[serde(default)]
    pub floats: HashMap<String, f32>,
    #[serde(default)]
    pub ints: HashMap<String, i32>,
}

/// On-disk shape. TOML table keys are strings, so day numbers are parsed
/// after deserialization.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    days: BTreeMap<String, DayValues>,
}

/// Read-only bag of tunable probabilities and durations keyed by day
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityConfig {
    days: BTreeMap<u32, DayValues>,
    day: u32,
}

impl Default for ProbabilityConfig {
    fn default() -> Self {
        Self {
            days: BTreeMap::new(),
            day: 1,
        }
    }
}

impl ProbabilityConfig {
    /// Empty config: every key reads as zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(source)?;
        let mut days = BTreeMap::new();
        for (key, values) in file.days {
            let day = key
                .trim()
                .parse::<u32>()
                .map_err(|_| ConfigError::InvalidDay(key.clone()))?;
            days.insert(day, values);
        }
        Ok(Self { days, day: 1 })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&source)?;
        debug!(?path, days = config.days.len(), "loaded probability config");
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        let file = ConfigFile {
            days: self
                .days
                .iter()
                .map(|(day, values)| (day.to_string(), values.clone()))
                .collect(),
        };
        toml::to_string_pretty(&file)
    }

    /// Select the active day
    pub fn set_day(&mut self, day: u32) {
        self.day = day;
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    /// Table for the active day, falling back to the nearest lower day
    fn active(&self) -> Option<&DayValues> {
        self.days.range(..=self.day).next_back().map(|(_, v)| v)
    }

    pub fn lookup_float(&self, key: &str) -> ConfigLookup<f32> {
        match self.active().and_then(|d| d.floats.get(key)) {
            Some(v) => ConfigLookup::Value(*v),
            None => ConfigLookup::Unset,
        }
    }

    pub fn lookup_int(&self, key: &str) -> ConfigLookup<i32> {
        match self.active().and_then(|d| d.ints.get(key)) {
            Some(v) => ConfigLookup::Value(*v),
            None => ConfigLookup::Unset,
        }
    }

    /// Float value for the active day; missing reads as 0
    pub fn get_float(&self, key: &str) -> f32 {
        self.lookup_float(key).or_zero()
    }

    /// Integer value for the active day; missing reads as 0
    pub fn get_int(&self, key: &str) -> i32 {
        self.lookup_int(key).or_zero()
    }

    /// Pair of floats read as a (min, max) duration range
    pub fn range(&self, min_key: &str, max_key: &str) -> (f32, f32) {
        (self.get_float(min_key), self.get_float(max_key))
    }

    pub fn set_float(&mut self, day: u32, key: &str, value: f32) {
        self.days
            .entry(day)
            .or_default()
            .floats
            .insert(key.to_string(), value);
    }

    pub fn set_int(&mut self, day: u32, key: &str, value: i32) {
        self.days
            .entry(day)
            .or_default()
            .ints
            .insert(key.to_string(), value);
    }

    /// Days that carry their own table
    pub fn days(&self) -> impl Iterator<Item = u32> + '_ {
        self.days.keys().copied()
    }

    /// A playable first day used when no config file is supplied
    pub fn with_defaults() -> Self {
        use keys::*;

        let mut config = Self::new();
        let floats = [
            (SPAWN_NORMAL, 0.7),
            (SPAWN_KID, 0.15),
            (SPAWN_KAREN, 0.15),
            (THIEF_PROBABILITY, 0.1),
            (BROWSE_MIN, 2.0),
            (BROWSE_MAX, 5.0),
            (PAY_MIN, 1.0),
            (PAY_MAX, 3.0),
            (KNOCKED_MIN, 2.0),
            (KNOCKED_MAX, 4.0),
            (ROAM_MIN, 10.0),
            (ROAM_MAX, 25.0),
            (COMPLAIN_MIN, 2.0),
            (COMPLAIN_MAX, 4.0),
            (ATTACK_INTERVAL, 1.5),
            (REACH, 2.0),
            (CHASE_TIMEOUT, 8.0),
            (PATROL_MIN, 15.0),
            (PATROL_MAX, 30.0),
            (OFFICE_MIN, 10.0),
            (OFFICE_MAX, 20.0),
            (TASK_INTERVAL, 45.0),
            (TASK_FUSE_BOX, 0.4),
            (TASK_CLEAN_FLOOR, 0.6),
        ];
        for (key, value) in floats {
            config.set_float(1, key, value);
        }
        config.set_int(1, CUSTOMER_CAPACITY, 6);
        config.set_int(1, MAX_COMPLAINING, 3);
        config.set_int(1, MAX_ATTACKS, 3);

        // Busier second day
        config.set_int(2, CUSTOMER_CAPACITY, 10);
        for (key, value) in floats {
            config.set_float(2, key, value);
        }
        config.set_float(2, SPAWN_NORMAL, 0.5);
        config.set_float(2, SPAWN_KAREN, 0.3);
        config.set_float(2, SPAWN_KID, 0.2);
        config.set_int(2, MAX_COMPLAINING, 4);
        config.set_int(2, MAX_ATTACKS, 4);

        config
    }
}
