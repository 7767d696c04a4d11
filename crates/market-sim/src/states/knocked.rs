use market_core::Deadline;
use market_events::Cue;

use super::{names, transitions};
use crate::agent::{AgentContext, AgentKind};
use crate::config::keys;
use crate::fsm::{State, StateId};

/// Where an agent goes once it gets back up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Customers leave the store
    GoHome,
    /// Staff resume patrol or office duty, whichever they were doing
    ResumeDuty,
}

/// Lying on the floor after being hit. Movement is disabled and any held
/// item goes back to stock.
#[derive(Debug)]
pub struct Knocked {
    recovery: Recovery,
    until: Option<Deadline>,
}

impl Knocked {
    pub fn new(recovery: Recovery) -> Self {
        Self {
            recovery,
            until: None,
        }
    }
}

impl State<AgentKind> for Knocked {
    fn name(&self) -> StateId {
        names::KNOCKED
    }

    fn enter(&mut self, ctx: &mut AgentContext<'_>) -> Option<&'static str> {
        ctx.cue(Cue::Impact);
        ctx.body.movement.stop();
        ctx.body.movement.disable();
        ctx.drop_held_item();
        self.until = Some(ctx.wait(keys::KNOCKED_MIN, keys::KNOCKED_MAX));
        None
    }

    fn execute(&mut self, ctx: &mut AgentContext<'_>) -> Option<&'static str> {
        let due = self.until.map(|d| d.is_due(ctx.now)).unwrap_or(true);
        if !due {
            return None;
        }
        match self.recovery {
            Recovery::GoHome => Some(transitions::STAND_UP),
            Recovery::ResumeDuty if ctx.body.is_patrolling => Some(transitions::RESUME_PATROL),
            Recovery::ResumeDuty => Some(transitions::RESUME_OFFICE),
        }
    }

    fn exit(&mut self, ctx: &mut AgentContext<'_>) {
        self.until = None;
        ctx.body.attacked = false;
        ctx.body.attacker = None;
        ctx.body.movement.enable();
    }
}
