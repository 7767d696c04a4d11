//! Market Core - Core types and utilities for the supermarket simulation
//!
//! This crate provides the foundational pieces shared by every other crate:
//! - Generational agent handles and the allocator that recycles them
//! - Plain identifiers for tasks, shelves, and product types
//! - Simulation clock, deadlines, and a deadline-polled deferred queue
//! - A single seeded random stream with per-agent forks
//! - Weighted selection with highest-probability fallback

pub mod handle;
pub mod rng;
pub mod time;
pub mod types;
pub mod weighted;

pub use glam::Vec3;
pub use handle::{AgentAllocator, AgentId};
pub use rng::SimRng;
pub use time::{Deadline, DeferredQueue, SimClock, TimeConfig, TimeConfigError};
pub use types::{ProductType, ShelfId, SubtaskId, TaskId};
pub use weighted::{select_weighted, select_with_roll};
