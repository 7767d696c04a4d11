use market_core::Deadline;

use super::{attacked, names, transitions};
use crate::agent::{AgentContext, AgentKind, AreaRole};
use crate::config::keys;
use crate::fsm::{State, StateId};

/// Walk the patrol route until the shift timer runs out
#[derive(Debug, Default)]
pub struct Patrol {
    shift_end: Option<Deadline>,
}

impl Patrol {
    fn next_waypoint(ctx: &mut AgentContext<'_>) {
        let point = ctx.layout.pick_patrol_point(&mut ctx.body.rng);
        ctx.body.movement.move_to(point);
    }
}

impl State<AgentKind> for Patrol {
    fn name(&self) -> StateId {
        names::PATROL
    }

    fn enter(&mut self, ctx: &mut AgentContext<'_>) -> Option<&'static str> {
        ctx.body.is_patrolling = true;
        self.shift_end = Some(ctx.wait(keys::PATROL_MIN, keys::PATROL_MAX));
        Self::next_waypoint(ctx);
        None
    }

    fn execute(&mut self, ctx: &mut AgentContext<'_>) -> Option<&'static str> {
        if let Some(t) = attacked(ctx) {
            return Some(t);
        }
        if self.shift_end.map(|d| d.is_due(ctx.now)).unwrap_or(true) {
            return Some(transitions::GO_TO_OFFICE);
        }
        if ctx.body.movement.arrived() || ctx.body.movement.destination().is_none() {
            Self::next_waypoint(ctx);
        }
        None
    }

    fn exit(&mut self, _ctx: &mut AgentContext<'_>) {
        self.shift_end = None;
    }
}

/// Sit in the office for a while, then go back out
#[derive(Debug, Default)]
pub struct Office {
    until: Option<Deadline>,
}

impl State<AgentKind> for Office {
    fn name(&self) -> StateId {
        names::OFFICE
    }

    fn enter(&mut self, ctx: &mut AgentContext<'_>) -> Option<&'static str> {
        ctx.body.is_patrolling = false;
        ctx.move_to_area(AreaRole::Office);
        None
    }

    fn execute(&mut self, ctx: &mut AgentContext<'_>) -> Option<&'static str> {
        if let Some(t) = attacked(ctx) {
            return Some(t);
        }
        if !ctx.body.movement.arrived() {
            let office = ctx.area(AreaRole::Office);
            super::keep_moving(ctx, office);
            return None;
        }
        let until = match self.until {
            Some(deadline) => deadline,
            None => {
                let deadline = ctx.wait(keys::OFFICE_MIN, keys::OFFICE_MAX);
                self.until = Some(deadline);
                deadline
            }
        };
        until.is_due(ctx.now).then_some(transitions::START_PATROL)
    }

    fn exit(&mut self, _ctx: &mut AgentContext<'_>) {
        self.until = None;
    }
}
