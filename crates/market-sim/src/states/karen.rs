//! Karen: complain at the shelf, chase the player, swing when in reach.
//! Tallies live in the agent's [`Mood`](crate::agent::Mood) so they keep
//! counting across the loop.

use glam::Vec3;
use market_core::Deadline;
use market_events::{Cue, Event};
use tracing::debug;

use super::{attacked, names, transitions};
use crate::agent::{AgentContext, AgentKind};
use crate::config::keys;
use crate::fsm::{State, StateId};

/// Distance the player must move before the chase path is re-issued
const RETARGET_DISTANCE: f32 = 0.5;

fn cap(ctx: &AgentContext<'_>, key: &str) -> u32 {
    ctx.config.get_int(key).max(0) as u32
}

fn complain(ctx: &mut AgentContext<'_>) {
    if ctx.body.mood.complaints >= cap(ctx, keys::MAX_COMPLAINING) {
        return;
    }
    ctx.body.mood.complaints += 1;
    debug!(agent = %ctx.id, complaints = ctx.body.mood.complaints, "complaint");
    ctx.cue(Cue::Complaint);
}

#[derive(Debug, Default)]
pub struct Complain {
    next_complaint: Option<Deadline>,
}

impl State<AgentKind> for Complain {
    fn name(&self) -> StateId {
        names::COMPLAIN
    }

    fn enter(&mut self, ctx: &mut AgentContext<'_>) -> Option<&'static str> {
        ctx.body.movement.stop();
        // Every return to the shelf is another complaint, heard or not
        complain(ctx);
        self.next_complaint = Some(ctx.wait(keys::COMPLAIN_MIN, keys::COMPLAIN_MAX));
        None
    }

    fn execute(&mut self, ctx: &mut AgentContext<'_>) -> Option<&'static str> {
        if let Some(t) = attacked(ctx) {
            return Some(t);
        }
        if ctx.body.mood.complaints >= cap(ctx, keys::MAX_COMPLAINING) {
            return Some(transitions::COMPLAINED_TOO_MUCH);
        }
        if !ctx.player_in_reach() {
            return Some(transitions::PLAYER_NOT_IN_RANGE);
        }
        if self.next_complaint.map(|d| d.is_due(ctx.now)).unwrap_or(true) {
            complain(ctx);
            self.next_complaint = Some(ctx.wait(keys::COMPLAIN_MIN, keys::COMPLAIN_MAX));
        }
        None
    }

    fn exit(&mut self, _ctx: &mut AgentContext<'_>) {
        self.next_complaint = None;
    }
}

#[derive(Debug, Default)]
pub struct ChasePlayer {
    give_up_at: Option<Deadline>,
    last_target: Option<Vec3>,
}

impl ChasePlayer {
    fn retarget(&mut self, ctx: &mut AgentContext<'_>) {
        self.last_target = Some(ctx.player);
        ctx.body.movement.move_to(ctx.player);
    }
}

impl State<AgentKind> for ChasePlayer {
    fn name(&self) -> StateId {
        names::CHASE_PLAYER
    }

    fn enter(&mut self, ctx: &mut AgentContext<'_>) -> Option<&'static str> {
        let timeout = ctx.config.get_float(keys::CHASE_TIMEOUT);
        self.give_up_at = Some(Deadline::after(ctx.now, timeout));
        self.retarget(ctx);
        None
    }

    fn execute(&mut self, ctx: &mut AgentContext<'_>) -> Option<&'static str> {
        if let Some(t) = attacked(ctx) {
            return Some(t);
        }
        if ctx.player_in_reach() {
            return Some(transitions::PLAYER_IN_RANGE);
        }
        if self.give_up_at.map(|d| d.is_due(ctx.now)).unwrap_or(false) {
            return Some(transitions::LOST_PLAYER);
        }
        let moved = self
            .last_target
            .map(|t| t.distance(ctx.player) > RETARGET_DISTANCE)
            .unwrap_or(true);
        if moved || ctx.body.movement.arrived() || ctx.body.movement.destination().is_none() {
            self.retarget(ctx);
        }
        None
    }

    fn exit(&mut self, _ctx: &mut AgentContext<'_>) {
        self.give_up_at = None;
        self.last_target = None;
    }
}

#[derive(Debug, Default)]
pub struct AttackPlayer {
    next_swing: Option<Deadline>,
}

impl State<AgentKind> for AttackPlayer {
    fn name(&self) -> StateId {
        names::ATTACK_PLAYER
    }

    fn enter(&mut self, ctx: &mut AgentContext<'_>) -> Option<&'static str> {
        ctx.body.movement.stop();
        let interval = ctx.config.get_float(keys::ATTACK_INTERVAL);
        self.next_swing = Some(Deadline::after(ctx.now, interval));
        None
    }

    fn execute(&mut self, ctx: &mut AgentContext<'_>) -> Option<&'static str> {
        if let Some(t) = attacked(ctx) {
            return Some(t);
        }
        if ctx.body.mood.attacks >= cap(ctx, keys::MAX_ATTACKS) {
            return Some(transitions::ATTACKED_TOO_MANY_TIMES);
        }
        if !ctx.player_in_reach() {
            return Some(transitions::PLAYER_NOT_IN_RANGE);
        }
        if self.next_swing.map(|d| d.is_due(ctx.now)).unwrap_or(true) {
            ctx.body.mood.attacks += 1;
            ctx.cue(Cue::Swing);
            ctx.publish(Event::PlayerAttacked { agent: ctx.id });
            let interval = ctx.config.get_float(keys::ATTACK_INTERVAL);
            self.next_swing = Some(Deadline::after(ctx.now, interval));
        }
        None
    }

    fn exit(&mut self, _ctx: &mut AgentContext<'_>) {
        self.next_swing = None;
    }
}
