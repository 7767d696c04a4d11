//! Market Sim - NPC behavior simulation for the supermarket
//!
//! Provides:
//! - A generic finite state machine engine with a first-match transition table
//! - The state library (shopping, stealing, paying, patrolling, chasing, ...)
//! - Per-archetype behavior graphs
//! - Population control under a capacity bound
//! - Side tasks built from subtasks, tracked over the event bus
//! - Day-indexed probability config and a [`Simulation`] façade tying it together

pub mod agent;
pub mod archetypes;
pub mod config;
pub mod error;
pub mod fsm;
pub mod layout;
pub mod movement;
pub mod population;
pub mod simulation;
pub mod states;
pub mod stock;
pub mod tasks;

#[cfg(test)]
mod test_support;

pub use agent::{
    Agent, AgentBody, AgentContext, Archetype, AreaRole, Attacker, ItemClaim, Mood, SimEnv,
};
pub use archetypes::build_fsm;
pub use config::{keys, ConfigError, ConfigLookup, ProbabilityConfig};
pub use error::{SimError, SimResult};
pub use fsm::{
    ConfigurationError, ContextKind, FiniteStateMachine, FsmError, State, StateChange, StateId,
    StateLoopError, Transition, TransitionFrom,
};
pub use layout::StoreLayout;
pub use movement::{MovementProxy, PathAgent, StraightLineAgent};
pub use population::{PathAgentFactory, PopulationController, StraightLineFactory};
pub use simulation::{Simulation, SimulationSetup};
pub use stock::{ProductHandle, ShelfSpec, Stock, StockService};
pub use tasks::{Condition, Subtask, Task, TaskCoordinator, TaskKind};
