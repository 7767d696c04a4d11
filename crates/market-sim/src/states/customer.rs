use market_core::{select_weighted, Deadline};
use market_events::{Cue, Event};
use tracing::debug;

use super::{attacked, keep_moving, names, pick_item, transitions, Pick};
use crate::agent::{AgentContext, AgentKind, Archetype, AreaRole};
use crate::config::keys;
use crate::fsm::{State, StateId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShoppingMode {
    /// Browse, take an item, then pay (or turn thief)
    Customer,
    /// Walk to the product and start complaining
    Karen,
}

/// Walk to the target product's shelf and pick an item
#[derive(Debug)]
pub struct Shopping {
    mode: ShoppingMode,
    browse_until: Option<Deadline>,
}

impl Shopping {
    pub fn new(mode: ShoppingMode) -> Self {
        Self {
            mode,
            browse_until: None,
        }
    }
}

impl State<AgentKind> for Shopping {
    fn name(&self) -> StateId {
        names::SHOPPING
    }

    fn enter(&mut self, ctx: &mut AgentContext<'_>) -> Option<&'static str> {
        if self.mode == ShoppingMode::Customer {
            let p = ctx.config.get_float(keys::THIEF_PROBABILITY);
            let roll = select_weighted(&[(true, p), (false, 1.0 - p)], &mut ctx.body.rng);
            if roll == Some(true) {
                return Some(transitions::BECAME_THIEF);
            }
        }
        ctx.move_to_area(AreaRole::Product);
        None
    }

    fn execute(&mut self, ctx: &mut AgentContext<'_>) -> Option<&'static str> {
        if let Some(t) = attacked(ctx) {
            return Some(t);
        }

        if ctx.body.movement.arrived() {
            if self.mode == ShoppingMode::Karen {
                return Some(transitions::REACHED_PRODUCT);
            }

            let Some(until) = self.browse_until else {
                match pick_item(ctx) {
                    Pick::Waiting => {}
                    Pick::Holding => {
                        self.browse_until = Some(ctx.wait(keys::BROWSE_MIN, keys::BROWSE_MAX));
                    }
                    Pick::SoldOut => {
                        debug!(agent = %ctx.id, product = %ctx.body.target_product, "sold out");
                        return Some(transitions::NOTHING_TO_BUY);
                    }
                }
                return None;
            };
            if until.is_due(ctx.now) {
                return Some(transitions::PICKED);
            }
            return None;
        }

        let shelf = ctx.area(AreaRole::Product);
        keep_moving(ctx, shelf);
        None
    }

    fn exit(&mut self, ctx: &mut AgentContext<'_>) {
        self.browse_until = None;
        ctx.body.claim = None;
    }
}

/// Queue at a checkout and pay for the held item
#[derive(Debug, Default)]
pub struct Pay {
    done_at: Option<Deadline>,
}

impl State<AgentKind> for Pay {
    fn name(&self) -> StateId {
        names::PAY
    }

    fn enter(&mut self, ctx: &mut AgentContext<'_>) -> Option<&'static str> {
        ctx.move_to_area(AreaRole::Payment);
        None
    }

    fn execute(&mut self, ctx: &mut AgentContext<'_>) -> Option<&'static str> {
        if let Some(t) = attacked(ctx) {
            return Some(t);
        }
        if !ctx.body.movement.arrived() {
            let checkout = ctx.area(AreaRole::Payment);
            keep_moving(ctx, checkout);
            return None;
        }

        let done_at = match self.done_at {
            Some(deadline) => deadline,
            None => {
                let deadline = ctx.wait(keys::PAY_MIN, keys::PAY_MAX);
                self.done_at = Some(deadline);
                deadline
            }
        };
        if !done_at.is_due(ctx.now) {
            return None;
        }

        if let Some(item) = ctx.body.held_item.take() {
            ctx.cue(Cue::RegisterBeep);
            ctx.publish(Event::ItemPurchased {
                agent: ctx.id,
                product: item.product,
            });
        }
        Some(transitions::PAID)
    }

    fn exit(&mut self, _ctx: &mut AgentContext<'_>) {
        self.done_at = None;
    }
}

/// Walk to the exit and retire
#[derive(Debug, Default)]
pub struct GoHome;

impl State<AgentKind> for GoHome {
    fn name(&self) -> StateId {
        names::GO_HOME
    }

    fn enter(&mut self, ctx: &mut AgentContext<'_>) -> Option<&'static str> {
        // Unpaid goods stay in the store
        ctx.drop_held_item();
        ctx.move_to_area(AreaRole::MarketExit);
        None
    }

    fn execute(&mut self, ctx: &mut AgentContext<'_>) -> Option<&'static str> {
        if let Some(t) = attacked(ctx) {
            return Some(t);
        }
        if ctx.body.movement.arrived() {
            ctx.retire();
            return None;
        }
        let exit = ctx.area(AreaRole::MarketExit);
        keep_moving(ctx, exit);
        None
    }
}

/// Go for the shelf and grab without paying
#[derive(Debug, Default)]
pub struct Steal;

impl State<AgentKind> for Steal {
    fn name(&self) -> StateId {
        names::STEAL
    }

    fn enter(&mut self, ctx: &mut AgentContext<'_>) -> Option<&'static str> {
        ctx.body.archetype = Archetype::Thief;
        ctx.move_to_area(AreaRole::Product);
        None
    }

    fn execute(&mut self, ctx: &mut AgentContext<'_>) -> Option<&'static str> {
        if let Some(t) = attacked(ctx) {
            return Some(t);
        }
        if ctx.body.movement.arrived() {
            return match pick_item(ctx) {
                Pick::Waiting => None,
                Pick::Holding => Some(transitions::GRABBED),
                Pick::SoldOut => {
                    debug!(agent = %ctx.id, product = %ctx.body.target_product, "nothing to steal");
                    Some(transitions::NOTHING_TO_BUY)
                }
            };
        }
        let shelf = ctx.area(AreaRole::Product);
        keep_moving(ctx, shelf);
        None
    }

    fn exit(&mut self, ctx: &mut AgentContext<'_>) {
        ctx.body.claim = None;
    }
}

/// Flee to the exit with whatever was grabbed
#[derive(Debug, Default)]
pub struct Run;

impl State<AgentKind> for Run {
    fn name(&self) -> StateId {
        names::RUN
    }

    fn enter(&mut self, ctx: &mut AgentContext<'_>) -> Option<&'static str> {
        ctx.move_to_area(AreaRole::MarketExit);
        None
    }

    fn execute(&mut self, ctx: &mut AgentContext<'_>) -> Option<&'static str> {
        if let Some(t) = attacked(ctx) {
            return Some(t);
        }
        if ctx.body.movement.arrived() {
            if let Some(item) = ctx.body.held_item.take() {
                ctx.cue(Cue::TheftAlarm);
                ctx.publish(Event::ItemStolen {
                    agent: ctx.id,
                    product: item.product,
                });
            }
            ctx.retire();
            return None;
        }
        let exit = ctx.area(AreaRole::MarketExit);
        keep_moving(ctx, exit);
        None
    }
}
