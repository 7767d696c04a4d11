//! Market Events - publish/subscribe coordination for the simulation
//!
//! Agents, the population controller, the task coordinator, and presentation
//! hooks talk to each other only through an [`EventBus`] handle injected at
//! construction time. Delivery is synchronous: every listener of a topic runs
//! before `publish` returns.

mod bus;
mod event;
mod mailbox;

pub use bus::{Callback, EventBus, ListenerId};
pub use event::{Cue, Event, Topic};
pub use mailbox::Mailbox;
