use market_core::Deadline;

use super::{attacked, names, transitions};
use crate::agent::{AgentContext, AgentKind};
use crate::config::keys;
use crate::fsm::{State, StateId};

/// Kid wandering between random floor points until bored
#[derive(Debug, Default)]
pub struct Roam {
    bored_at: Option<Deadline>,
}

impl Roam {
    fn wander(ctx: &mut AgentContext<'_>) {
        let point = ctx.layout.random_floor_point(&mut ctx.body.rng);
        ctx.body.movement.move_to(point);
    }
}

impl State<AgentKind> for Roam {
    fn name(&self) -> StateId {
        names::ROAM
    }

    fn enter(&mut self, ctx: &mut AgentContext<'_>) -> Option<&'static str> {
        self.bored_at = Some(ctx.wait(keys::ROAM_MIN, keys::ROAM_MAX));
        Self::wander(ctx);
        None
    }

    fn execute(&mut self, ctx: &mut AgentContext<'_>) -> Option<&'static str> {
        if let Some(t) = attacked(ctx) {
            return Some(t);
        }
        if self.bored_at.map(|d| d.is_due(ctx.now)).unwrap_or(true) {
            return Some(transitions::BORED);
        }
        if ctx.body.movement.arrived() || ctx.body.movement.destination().is_none() {
            Self::wander(ctx);
        }
        None
    }

    fn exit(&mut self, _ctx: &mut AgentContext<'_>) {
        self.bored_at = None;
    }
}
