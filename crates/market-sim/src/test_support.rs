//! Fixtures for driving agents by hand in unit tests

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use glam::Vec3;
use market_core::{AgentAllocator, ProductType, SimRng};
use market_events::EventBus;

use crate::agent::{Agent, AgentBody, AreaRole, Archetype, SimEnv};
use crate::archetypes::build_fsm;
use crate::config::ProbabilityConfig;
use crate::layout::StoreLayout;
use crate::movement::{MovementProxy, PathAgent, ARRIVAL_RADIUS};
use crate::population::PathAgentFactory;
use crate::stock::{Stock, StockService};

/// Shared switch deciding whether gated walkers reach their destination
#[derive(Debug, Clone)]
pub(crate) struct Gate(Arc<AtomicBool>);

impl Gate {
    pub fn open() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn closed() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn open_now(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn close_now(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    fn is_open(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Walker that jumps straight to its destination whenever the gate is open
pub(crate) struct GatedWalker {
    position: Vec3,
    target: Option<Vec3>,
    enabled: bool,
    gate: Gate,
}

impl GatedWalker {
    pub fn new(position: Vec3, gate: Gate) -> Self {
        Self {
            position,
            target: None,
            enabled: true,
            gate,
        }
    }
}

impl PathAgent for GatedWalker {
    fn set_destination(&mut self, point: Vec3) {
        self.target = Some(point);
    }

    fn clear_destination(&mut self) {
        self.target = None;
    }

    fn has_arrived(&self) -> bool {
        self.target
            .map(|t| t.distance(self.position) < ARRIVAL_RADIUS)
            .unwrap_or(false)
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn position(&self) -> Vec3 {
        self.position
    }

    fn advance(&mut self, _delta: f32) {
        if let (true, true, Some(target)) = (self.enabled, self.gate.is_open(), self.target) {
            self.position = target;
        }
    }
}

/// Factory handing out gated walkers that all share one gate
pub(crate) struct GatedFactory(pub Gate);

impl PathAgentFactory for GatedFactory {
    fn create(&mut self, _archetype: Archetype, spawn_point: Vec3) -> Box<dyn PathAgent> {
        Box::new(GatedWalker::new(spawn_point, self.0.clone()))
    }
}

pub(crate) struct Fixture {
    pub bus: EventBus,
    pub config: ProbabilityConfig,
    pub stock: Stock,
    pub layout: StoreLayout,
    pub player: Vec3,
    pub now: f64,
    rng: SimRng,
    allocator: AgentAllocator,
}

impl Fixture {
    pub fn new() -> Self {
        let bus = EventBus::new();
        let layout = StoreLayout::default();
        let stock = Stock::from_specs(bus.clone(), &layout.shelves);
        Self {
            bus,
            config: ProbabilityConfig::with_defaults(),
            stock,
            layout,
            player: Vec3::ZERO,
            now: 0.0,
            rng: SimRng::seeded(11),
            allocator: AgentAllocator::new(),
        }
    }

    pub fn env(&mut self) -> SimEnv<'_> {
        SimEnv {
            now: self.now,
            delta: 0.0,
            config: &self.config,
            stock: &mut self.stock,
            layout: &self.layout,
            bus: &self.bus,
            player: self.player,
        }
    }

    /// Build an agent shopping for the first product, walking from the entrance
    pub fn agent(&mut self, archetype: Archetype, gate: &Gate) -> Agent {
        let id = self.allocator.allocate();
        let product = self
            .stock
            .product_types()
            .first()
            .copied()
            .unwrap_or(ProductType(0));
        let walker = GatedWalker::new(self.layout.entrance, gate.clone());
        let body = AgentBody::new(
            archetype,
            MovementProxy::new(Box::new(walker)),
            product,
            self.rng.fork(),
        )
        .with_area(
            AreaRole::Product,
            self.stock.product_position(product).unwrap_or(Vec3::ZERO),
        )
        .with_area(AreaRole::Payment, self.layout.checkouts[0])
        .with_area(AreaRole::MarketExit, self.layout.exit)
        .with_area(AreaRole::Office, self.layout.office);
        Agent::new(id, body, build_fsm(archetype).unwrap(), &self.bus)
    }

    pub fn start(&mut self, agent: &mut Agent) {
        agent.start(&mut self.env()).unwrap();
    }

    /// Advance time, resolve arrival, tick the agent's FSM, settle its claim
    pub fn step(&mut self, agent: &mut Agent, delta: f32) {
        self.now += delta as f64;
        agent.body.movement.resolve(delta);
        agent.tick(&mut self.env()).unwrap();
        agent.settle_claim(&mut self.stock);
    }

    /// Step in 0.1s increments until `done` holds; panics after `limit` seconds
    pub fn run_until(&mut self, agent: &mut Agent, limit: f64, done: impl Fn(&Agent) -> bool) {
        let deadline = self.now + limit;
        while !done(agent) {
            assert!(
                self.now < deadline,
                "condition not reached within {limit}s; agent in {}",
                agent.current_state()
            );
            self.step(agent, 0.1);
        }
    }

    pub fn stock_take(&mut self, product: ProductType) -> bool {
        self.stock.take_one(product).is_some()
    }

    pub fn available(&self, product: ProductType) -> u32 {
        self.stock.available(product)
    }
}
