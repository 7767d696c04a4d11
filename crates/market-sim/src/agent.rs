//! Agents: the per-NPC blackboard, its FSM, and the context states run in

use std::collections::HashMap;
use std::fmt;

use glam::Vec3;
use market_core::{AgentId, Deadline, ProductType, SimRng};
use market_events::{Cue, Event, EventBus, ListenerId, Mailbox, Topic};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{keys, ProbabilityConfig};
use crate::fsm::{ContextKind, FiniteStateMachine, StateId, StateLoopError};
use crate::layout::StoreLayout;
use crate::movement::MovementProxy;
use crate::stock::{ProductHandle, StockService};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Archetype {
    NormalCustomer,
    Thief,
    AnnoyingKid,
    Karen,
    Manager,
}

impl Archetype {
    pub fn name(&self) -> &'static str {
        match self {
            Archetype::NormalCustomer => "NormalCustomer",
            Archetype::Thief => "Thief",
            Archetype::AnnoyingKid => "AnnoyingKid",
            Archetype::Karen => "Karen",
            Archetype::Manager => "Manager",
        }
    }

    /// Customers count against capacity and leave when the store closes
    pub fn is_customer(&self) -> bool {
        !matches!(self, Archetype::Manager)
    }

    /// Walking speed in meters per second
    pub fn walk_speed(&self) -> f32 {
        match self {
            Archetype::AnnoyingKid => 3.0,
            Archetype::Thief => 3.5,
            Archetype::Karen => 2.2,
            Archetype::NormalCustomer | Archetype::Manager => 2.0,
        }
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Named destinations assigned to an agent at spawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AreaRole {
    Product,
    Payment,
    MarketExit,
    Office,
}

/// Who knocked an agent down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attacker {
    Player,
    Agent(AgentId),
    Unknown,
}

/// Karen's running tallies; survive the Complain/Chase/Attack loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Mood {
    pub complaints: u32,
    pub attacks: u32,
}

/// An agent's request for one item of its target product. Requests made
/// during a tick are settled after every agent has ticked, in id order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemClaim {
    Pending,
    /// The shelf ran dry before this agent's turn
    Refused,
}

/// Everything about an agent that its states read and write
#[derive(Debug)]
pub struct AgentBody {
    pub archetype: Archetype,
    pub movement: MovementProxy,
    pub areas: HashMap<AreaRole, Vec3>,
    pub target_product: ProductType,
    pub held_item: Option<ProductHandle>,
    pub claim: Option<ItemClaim>,
    pub attacked: bool,
    pub attacker: Option<Attacker>,
    pub mood: Mood,
    pub is_patrolling: bool,
    pub rng: SimRng,
    retiring: bool,
}

impl AgentBody {
    pub fn new(
        archetype: Archetype,
        movement: MovementProxy,
        target_product: ProductType,
        rng: SimRng,
    ) -> Self {
        Self {
            archetype,
            movement,
            areas: HashMap::new(),
            target_product,
            held_item: None,
            claim: None,
            attacked: false,
            attacker: None,
            mood: Mood::default(),
            is_patrolling: false,
            rng,
            retiring: false,
        }
    }

    pub fn with_area(mut self, role: AreaRole, point: Vec3) -> Self {
        self.areas.insert(role, point);
        self
    }

    pub fn is_retiring(&self) -> bool {
        self.retiring
    }

    pub fn position(&self) -> Vec3 {
        self.movement.position()
    }
}

/// Shared world state handed to agents for one tick
pub struct SimEnv<'a> {
    pub now: f64,
    pub delta: f32,
    pub config: &'a ProbabilityConfig,
    pub stock: &'a mut dyn StockService,
    pub layout: &'a StoreLayout,
    pub bus: &'a EventBus,
    pub player: Vec3,
}

/// What a state sees while it runs
pub struct AgentContext<'a> {
    pub id: AgentId,
    pub body: &'a mut AgentBody,
    pub now: f64,
    pub config: &'a ProbabilityConfig,
    pub stock: &'a mut dyn StockService,
    pub layout: &'a StoreLayout,
    pub bus: &'a EventBus,
    pub player: Vec3,
}

impl AgentContext<'_> {
    /// Deadline for a wait whose duration is drawn from a configured range
    pub fn wait(&mut self, min_key: &str, max_key: &str) -> Deadline {
        let (min, max) = self.config.range(min_key, max_key);
        let duration = self.body.rng.uniform(min, max);
        Deadline::after(self.now, duration)
    }

    /// Point for a role, falling back to the exit
    pub fn area(&self, role: AreaRole) -> Vec3 {
        self.body
            .areas
            .get(&role)
            .copied()
            .unwrap_or(self.layout.exit)
    }

    pub fn move_to_area(&mut self, role: AreaRole) {
        let point = self.area(role);
        self.body.movement.move_to(point);
    }

    pub fn player_in_reach(&self) -> bool {
        self.body.position().distance(self.player) <= self.config.get_float(keys::REACH)
    }

    pub fn cue(&self, cue: Cue) {
        self.bus.publish(Event::Cue {
            cue,
            position: self.body.position(),
        });
    }

    pub fn publish(&self, event: Event) {
        self.bus.publish(event);
    }

    /// Put a held item back on its shelf and drop any open claim
    pub fn drop_held_item(&mut self) {
        self.body.claim = None;
        if let Some(item) = self.body.held_item.take() {
            self.stock.return_item(item);
        }
    }

    /// The agent is done; the population controller removes it after a delay
    pub fn retire(&mut self) {
        if self.body.retiring {
            return;
        }
        self.body.retiring = true;
        self.body.movement.stop();
        debug!(agent = %self.id, "agent retiring");
        self.bus.publish(Event::AgentRetired { agent: self.id });
    }
}

pub struct AgentKind;

impl ContextKind for AgentKind {
    type Ctx<'a> = AgentContext<'a>;
}

pub type AgentFsm = FiniteStateMachine<AgentKind>;

/// A live NPC: body, behavior graph, and its bus inbox
#[derive(Debug)]
pub struct Agent {
    pub id: AgentId,
    pub body: AgentBody,
    fsm: AgentFsm,
    listener: ListenerId,
    inbox: Mailbox,
    counted: bool,
}

impl Agent {
    pub(crate) fn new(id: AgentId, body: AgentBody, fsm: AgentFsm, bus: &EventBus) -> Self {
        let listener = bus.register_listener();
        let inbox = Mailbox::new();
        let counted = body.archetype.is_customer();
        if counted {
            inbox.subscribe(bus, Topic::StoreClosing, listener);
        }
        Self {
            id,
            body,
            fsm,
            listener,
            inbox,
            counted,
        }
    }

    pub fn archetype(&self) -> Archetype {
        self.body.archetype
    }

    pub fn current_state(&self) -> StateId {
        self.fsm.current()
    }

    pub fn is_retiring(&self) -> bool {
        self.body.retiring
    }

    /// Whether this agent occupies a customer slot
    pub(crate) fn counted(&self) -> bool {
        self.counted
    }

    pub(crate) fn listener(&self) -> ListenerId {
        self.listener
    }

    pub(crate) fn start(&mut self, env: &mut SimEnv<'_>) -> Result<(), StateLoopError> {
        let Agent { id, body, fsm, .. } = self;
        let mut ctx = context(*id, body, env);
        let result = fsm.start(&mut ctx);
        publish_changes(*id, fsm, env.bus);
        result
    }

    pub(crate) fn tick(&mut self, env: &mut SimEnv<'_>) -> Result<(), StateLoopError> {
        let closing = self
            .inbox
            .drain()
            .iter()
            .any(|e| matches!(e, Event::StoreClosing));

        let Agent { id, body, fsm, .. } = self;
        let mut ctx = context(*id, body, env);
        let mut result = Ok(());
        if closing {
            result = fsm.change_state("StoreClosing", &mut ctx).map(|_| ());
        }
        if result.is_ok() && !ctx.body.retiring {
            result = fsm.tick(&mut ctx);
        }
        publish_changes(*id, fsm, env.bus);
        result
    }

    /// Request a named transition from outside the agent's own states
    pub(crate) fn change_state(
        &mut self,
        transition: &str,
        env: &mut SimEnv<'_>,
    ) -> Result<bool, StateLoopError> {
        let Agent { id, body, fsm, .. } = self;
        let mut ctx = context(*id, body, env);
        let result = fsm.change_state(transition, &mut ctx);
        publish_changes(*id, fsm, env.bus);
        result
    }

    /// Grant or refuse a pending item claim
    pub(crate) fn settle_claim(&mut self, stock: &mut dyn StockService) {
        if self.body.claim != Some(ItemClaim::Pending) {
            return;
        }
        match stock.take_one(self.body.target_product) {
            Some(item) => {
                self.body.held_item = Some(item);
                self.body.claim = None;
            }
            None => self.body.claim = Some(ItemClaim::Refused),
        }
    }

    /// Mark as retiring without running any state code
    pub(crate) fn force_retire(&mut self, bus: &EventBus) {
        if self.body.retiring {
            return;
        }
        self.body.retiring = true;
        self.body.movement.stop();
        bus.publish(Event::AgentRetired { agent: self.id });
    }
}

fn context<'a>(id: AgentId, body: &'a mut AgentBody, env: &'a mut SimEnv<'_>) -> AgentContext<'a> {
    AgentContext {
        id,
        body,
        now: env.now,
        config: env.config,
        stock: &mut *env.stock,
        layout: env.layout,
        bus: env.bus,
        player: env.player,
    }
}

fn publish_changes(agent: AgentId, fsm: &mut AgentFsm, bus: &EventBus) {
    for change in fsm.drain_changes() {
        bus.publish(Event::StateChanged {
            agent,
            from: change.from,
            to: change.to,
            transition: change.transition,
        });
    }
}
