//! State library shared by every archetype
//!
//! A state's `execute` checks, in order: the attacked flag, its own completion
//! conditions, then re-issues movement if the walker lost its destination.

mod customer;
mod karen;
mod knocked;
mod manager;
mod roam;

pub use customer::{GoHome, Pay, Run, Shopping, ShoppingMode, Steal};
pub use karen::{AttackPlayer, ChasePlayer, Complain};
pub use knocked::{Knocked, Recovery};
pub use manager::{Office, Patrol};
pub use roam::Roam;

use crate::agent::{AgentContext, ItemClaim};

/// State names
pub mod names {
    pub const SHOPPING: &str = "Shopping";
    pub const STEAL: &str = "Steal";
    pub const PAY: &str = "Pay";
    pub const GO_HOME: &str = "GoHome";
    pub const KNOCKED: &str = "Knocked";
    pub const RUN: &str = "Run";
    pub const COMPLAIN: &str = "Complain";
    pub const CHASE_PLAYER: &str = "ChasePlayer";
    pub const ATTACK_PLAYER: &str = "AttackPlayer";
    pub const PATROL: &str = "Patrol";
    pub const OFFICE: &str = "Office";
    pub const ROAM: &str = "Roam";
}

/// Transition names
pub mod transitions {
    pub const ATTACKED: &str = "Attacked";
    pub const STORE_CLOSING: &str = "StoreClosing";
    pub const BECAME_THIEF: &str = "BecameThief";
    pub const PICKED: &str = "Picked";
    pub const NOTHING_TO_BUY: &str = "NothingToBuy";
    pub const GRABBED: &str = "Grabbed";
    pub const PAID: &str = "Paid";
    pub const STAND_UP: &str = "StandUp";
    pub const REACHED_PRODUCT: &str = "ReachedProduct";
    pub const PLAYER_IN_RANGE: &str = "PlayerInRange";
    pub const PLAYER_NOT_IN_RANGE: &str = "PlayerNotInRange";
    pub const LOST_PLAYER: &str = "LostPlayer";
    pub const COMPLAINED_TOO_MUCH: &str = "ComplainedTooMuch";
    pub const ATTACKED_TOO_MANY_TIMES: &str = "AttackedToManyTimes";
    pub const GO_TO_OFFICE: &str = "GoToOffice";
    pub const START_PATROL: &str = "StartPatrol";
    pub const RESUME_PATROL: &str = "ResumePatrol";
    pub const RESUME_OFFICE: &str = "ResumeOffice";
    pub const BORED: &str = "Bored";
}

/// First check of every `execute` outside Knocked
pub(crate) fn attacked(ctx: &AgentContext<'_>) -> Option<&'static str> {
    ctx.body.attacked.then_some(transitions::ATTACKED)
}

/// Re-issue a move if the walker has no destination
pub(crate) fn keep_moving(ctx: &mut AgentContext<'_>, point: glam::Vec3) {
    if ctx.body.movement.destination().is_none() {
        ctx.body.movement.move_to(point);
    }
}

/// Where an agent stands in getting an item off its target shelf
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pick {
    /// Claim filed; settled once every agent has ticked
    Waiting,
    Holding,
    SoldOut,
}

/// Claim one item of the target product, or report how the claim went
pub(crate) fn pick_item(ctx: &mut AgentContext<'_>) -> Pick {
    if ctx.body.held_item.is_some() {
        return Pick::Holding;
    }
    match ctx.body.claim {
        None => {
            ctx.body.claim = Some(ItemClaim::Pending);
            Pick::Waiting
        }
        Some(ItemClaim::Pending) => Pick::Waiting,
        Some(ItemClaim::Refused) => {
            ctx.body.claim = None;
            Pick::SoldOut
        }
    }
}
