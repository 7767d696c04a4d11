//! Population controller: keeps the store filled up to capacity, hands out
//! agent ids, and removes agents some time after they retire.

use std::collections::BTreeMap;

use glam::Vec3;
use market_core::{
    select_weighted, AgentAllocator, AgentId, Deadline, DeferredQueue, ProductType, SimRng,
};
use market_events::{Event, EventBus, ListenerId, Mailbox, Topic};
use tracing::{debug, info, warn};

use crate::agent::{Agent, AgentBody, AgentFsm, Archetype, AreaRole, Attacker, SimEnv};
use crate::archetypes::build_fsm;
use crate::config::keys;
use crate::error::{SimError, SimResult};
use crate::fsm::StateId;
use crate::movement::{MovementProxy, PathAgent, StraightLineAgent};

/// Seconds between an agent retiring and being removed, drawn per agent
pub const RETIREMENT_DELAY: (f32, f32) = (1.0, 5.0);

/// Creates the navigation agent for a freshly spawned NPC
pub trait PathAgentFactory: Send {
    fn create(&mut self, archetype: Archetype, spawn_point: Vec3) -> Box<dyn PathAgent>;
}

/// Straight-line walkers confined to the store floor
#[derive(Debug, Clone, Default)]
pub struct StraightLineFactory {
    pub bounds: Option<(Vec3, Vec3)>,
}

impl PathAgentFactory for StraightLineFactory {
    fn create(&mut self, archetype: Archetype, spawn_point: Vec3) -> Box<dyn PathAgent> {
        let walker = StraightLineAgent::new(spawn_point, archetype.walk_speed());
        match self.bounds {
            Some((min, max)) => Box::new(walker.with_bounds(min, max)),
            None => Box::new(walker),
        }
    }
}

pub struct PopulationController {
    agents: BTreeMap<AgentId, Agent>,
    allocator: AgentAllocator,
    live_count: usize,
    retirements: DeferredQueue<AgentId>,
    inbox: Mailbox,
    listener: ListenerId,
    bus: EventBus,
    rng: SimRng,
    factory: Box<dyn PathAgentFactory>,
    accepting: bool,
}

impl std::fmt::Debug for PopulationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PopulationController")
            .field("agents", &self.agents.len())
            .field("live_count", &self.live_count)
            .field("pending_retirements", &self.retirements.len())
            .finish_non_exhaustive()
    }
}

impl PopulationController {
    pub fn new(bus: EventBus, rng: SimRng, factory: Box<dyn PathAgentFactory>) -> Self {
        let listener = bus.register_listener();
        let inbox = Mailbox::new();
        inbox.subscribe(&bus, Topic::AgentRetired, listener);
        Self {
            agents: BTreeMap::new(),
            allocator: AgentAllocator::new(),
            live_count: 0,
            retirements: DeferredQueue::new(),
            inbox,
            listener,
            bus,
            rng,
            factory,
            accepting: true,
        }
    }

    /// Stop or resume spawning customers (store closed / open)
    pub fn set_accepting(&mut self, accepting: bool) {
        self.accepting = accepting;
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting
    }

    /// One simulation step: agents, then retirements, then at most one spawn
    pub fn tick(&mut self, env: &mut SimEnv<'_>) -> SimResult<()> {
        let order: Vec<AgentId> = self.agents.keys().copied().collect();
        self.update_agents(&order, env);
        self.process_retirements(env.now);
        if self.accepting && self.live_count < capacity(env) {
            self.spawn_one(env)?;
        }
        Ok(())
    }

    /// Resolve arrival for every agent, run each FSM once, then settle the
    /// item claims filed during the tick
    pub(crate) fn update_agents(&mut self, order: &[AgentId], env: &mut SimEnv<'_>) {
        for id in order {
            if let Some(agent) = self.agents.get_mut(id) {
                if !agent.is_retiring() {
                    agent.body.movement.resolve(env.delta);
                }
            }
        }

        for id in order {
            let Some(agent) = self.agents.get_mut(id) else {
                continue;
            };
            if agent.is_retiring() {
                continue;
            }
            if let Err(e) = agent.tick(env) {
                warn!(agent = %id, error = %e, "behavior loop detected; retiring agent");
                agent.force_retire(&self.bus);
            }
        }

        // Contested items go to the lowest id, whatever order agents ticked in
        for agent in self.agents.values_mut() {
            agent.settle_claim(&mut *env.stock);
        }
    }

    pub(crate) fn process_retirements(&mut self, now: f64) {
        for event in self.inbox.drain() {
            let Event::AgentRetired { agent: id } = event else {
                continue;
            };
            let Some(agent) = self.agents.get_mut(&id) else {
                continue;
            };
            if self.retirements.contains_where(|pending| *pending == id) {
                continue;
            }
            let delay = agent
                .body
                .rng
                .uniform(RETIREMENT_DELAY.0, RETIREMENT_DELAY.1);
            debug!(agent = %id, delay, "retirement scheduled");
            self.retirements.schedule(Deadline::after(now, delay), id);
        }

        for id in self.retirements.drain_due(now) {
            self.remove(id);
        }
    }

    /// Try to add one customer. Returns `None` when at capacity or when the
    /// chosen product is sold out; the next tick tries again.
    pub fn spawn_one(&mut self, env: &mut SimEnv<'_>) -> SimResult<Option<AgentId>> {
        if self.live_count >= capacity(env) {
            return Ok(None);
        }

        let candidates = [
            (Archetype::NormalCustomer, env.config.get_float(keys::SPAWN_NORMAL)),
            (Archetype::AnnoyingKid, env.config.get_float(keys::SPAWN_KID)),
            (Archetype::Karen, env.config.get_float(keys::SPAWN_KAREN)),
        ];
        let Some(archetype) = select_weighted(&candidates, &mut self.rng) else {
            return Ok(None);
        };

        let products = env.stock.product_types();
        let Some(product) = self.rng.index(products.len()).map(|i| products[i]) else {
            debug!("store sells nothing; spawn skipped");
            return Ok(None);
        };
        if env.stock.is_out_of_stock(product) {
            debug!(%product, %archetype, "target product out of stock; spawn skipped");
            return Ok(None);
        }

        self.spawn(archetype, product, env).map(Some)
    }

    /// Spawn a staff member; staff do not count against customer capacity
    pub fn spawn_staff(&mut self, archetype: Archetype, env: &mut SimEnv<'_>) -> SimResult<AgentId> {
        let product = env
            .stock
            .product_types()
            .first()
            .copied()
            .unwrap_or(ProductType(0));
        self.spawn(archetype, product, env)
    }

    fn spawn(
        &mut self,
        archetype: Archetype,
        product: ProductType,
        env: &mut SimEnv<'_>,
    ) -> SimResult<AgentId> {
        let fsm = build_fsm(archetype)?;
        Ok(self.spawn_with(archetype, product, fsm, env))
    }

    pub(crate) fn spawn_with(
        &mut self,
        archetype: Archetype,
        product: ProductType,
        fsm: AgentFsm,
        env: &mut SimEnv<'_>,
    ) -> AgentId {
        let id = self.allocator.allocate();

        let spawn_point = if archetype.is_customer() {
            env.layout.entrance
        } else {
            env.layout.office
        };
        let movement = MovementProxy::new(self.factory.create(archetype, spawn_point));
        let mut rng = self.rng.fork();
        let checkout = env.layout.pick_checkout(&mut rng);
        let shelf = env
            .stock
            .product_position(product)
            .unwrap_or(env.layout.entrance);

        let body = AgentBody::new(archetype, movement, product, rng)
            .with_area(AreaRole::Product, shelf)
            .with_area(AreaRole::Payment, checkout)
            .with_area(AreaRole::MarketExit, env.layout.exit)
            .with_area(AreaRole::Office, env.layout.office);

        let mut agent = Agent::new(id, body, fsm, &self.bus);
        if agent.counted() {
            self.live_count += 1;
        }
        info!(agent = %id, %archetype, %product, live = self.live_count, "agent spawned");
        self.bus.publish(Event::AgentSpawned {
            agent: id,
            archetype: archetype.name(),
        });

        if let Err(e) = agent.start(env) {
            warn!(agent = %id, error = %e, "behavior loop on spawn; retiring agent");
            agent.force_retire(&self.bus);
        }
        self.agents.insert(id, agent);
        id
    }

    /// Mark an agent as hit. Its current state reacts on the next tick.
    pub fn notify_attacked(&mut self, id: AgentId, attacker: Attacker) -> bool {
        match self.agents.get_mut(&id) {
            Some(agent) if !agent.is_retiring() => {
                agent.body.attacked = true;
                agent.body.attacker = Some(attacker);
                true
            }
            _ => false,
        }
    }

    /// Ask an agent's FSM to take a named transition right away
    pub fn request_transition(
        &mut self,
        id: AgentId,
        transition: &str,
        env: &mut SimEnv<'_>,
    ) -> SimResult<bool> {
        let agent = match self.agents.get_mut(&id) {
            Some(agent) if !agent.is_retiring() => agent,
            _ => return Err(SimError::UnknownAgent(id)),
        };
        match agent.change_state(transition, env) {
            Ok(changed) => Ok(changed),
            Err(e) => {
                warn!(agent = %id, error = %e, "behavior loop detected; retiring agent");
                agent.force_retire(&self.bus);
                Ok(false)
            }
        }
    }

    /// Remove an agent immediately. Its current state's `exit` does not run.
    pub fn terminate(&mut self, id: AgentId) -> bool {
        self.retirements.cancel_where(|pending| *pending == id);
        self.remove(id)
    }

    /// Terminate every agent (end of day)
    pub fn reset(&mut self) {
        let ids: Vec<AgentId> = self.agents.keys().copied().collect();
        for id in ids {
            self.terminate(id);
        }
        self.inbox.drain();
        self.retirements.clear();
        self.live_count = 0;
    }

    /// Reset and drop the controller's own subscription
    pub fn shutdown(&mut self) {
        self.reset();
        self.bus.unsubscribe_all(self.listener);
    }

    fn remove(&mut self, id: AgentId) -> bool {
        let Some(agent) = self.agents.remove(&id) else {
            return false;
        };
        self.bus.unsubscribe_all(agent.listener());
        self.allocator.deallocate(id);
        if agent.counted() {
            self.live_count = self.live_count.saturating_sub(1);
        }
        info!(agent = %id, archetype = %agent.archetype(), live = self.live_count, "agent despawned");
        self.bus.publish(Event::AgentDespawned { agent: id });
        true
    }

    /// Agents currently in the table, staff and retiring agents included
    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Customers counted against capacity
    pub fn live_count(&self) -> usize {
        self.live_count
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(&id)
    }

    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    pub fn archetype_of(&self, id: AgentId) -> Option<Archetype> {
        self.agents.get(&id).map(|a| a.archetype())
    }

    pub fn current_state_of(&self, id: AgentId) -> Option<StateId> {
        self.agents.get(&id).map(|a| a.current_state())
    }

    pub fn is_alive(&self, id: AgentId) -> bool {
        self.allocator.is_alive(id)
    }

    /// Nearest agent within `radius` of `point`
    pub fn agent_at(&self, point: Vec3, radius: f32) -> Option<AgentId> {
        self.agents
            .values()
            .filter(|a| !a.is_retiring())
            .map(|a| (a.id, a.body.position().distance(point)))
            .filter(|(_, d)| *d <= radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }
}

fn capacity(env: &SimEnv<'_>) -> usize {
    env.config.get_int(keys::CUSTOMER_CAPACITY).max(0) as usize
}
