//! Behavior graphs per archetype
//!
//! Table order is priority: the `Any` transitions come first so being hit or
//! the store closing wins over anything a state would do on the same tick.

use crate::agent::{AgentFsm, AgentKind, Archetype};
use crate::fsm::{ConfigurationError, FiniteStateMachine, State, StateId, Transition};
use crate::states::{
    names::*, transitions::*, AttackPlayer, ChasePlayer, Complain, GoHome, Knocked, Office, Patrol,
    Pay, Recovery, Roam, Run, Shopping, ShoppingMode, Steal,
};

type Boxed = Box<dyn State<AgentKind>>;

/// Build a fresh machine for one agent. Never shared between agents.
pub fn build_fsm(archetype: Archetype) -> Result<AgentFsm, ConfigurationError> {
    let (states, transitions, start) = match archetype {
        Archetype::NormalCustomer => customer_graph(SHOPPING),
        Archetype::Thief => customer_graph(STEAL),
        Archetype::Karen => karen_graph(),
        Archetype::AnnoyingKid => kid_graph(),
        Archetype::Manager => manager_graph(),
    };
    FiniteStateMachine::initialize(states, transitions, start)
}

fn customer_graph(start: StateId) -> (Vec<Boxed>, Vec<Transition>, StateId) {
    let states: Vec<Boxed> = vec![
        Box::new(Shopping::new(ShoppingMode::Customer)),
        Box::new(Steal),
        Box::new(Run),
        Box::new(Pay::default()),
        Box::new(GoHome),
        Box::new(Knocked::new(Recovery::GoHome)),
    ];
    let transitions = vec![
        Transition::from_any(ATTACKED, KNOCKED),
        Transition::from_any(STORE_CLOSING, GO_HOME),
        Transition::new(BECAME_THIEF, SHOPPING, STEAL),
        Transition::new(PICKED, SHOPPING, PAY),
        Transition::new(NOTHING_TO_BUY, SHOPPING, GO_HOME),
        Transition::new(NOTHING_TO_BUY, STEAL, GO_HOME),
        Transition::new(GRABBED, STEAL, RUN),
        Transition::new(PAID, PAY, GO_HOME),
        Transition::new(STAND_UP, KNOCKED, GO_HOME),
    ];
    (states, transitions, start)
}

fn karen_graph() -> (Vec<Boxed>, Vec<Transition>, StateId) {
    let states: Vec<Boxed> = vec![
        Box::new(Shopping::new(ShoppingMode::Karen)),
        Box::new(Complain::default()),
        Box::new(ChasePlayer::default()),
        Box::new(AttackPlayer::default()),
        Box::new(GoHome),
        Box::new(Knocked::new(Recovery::GoHome)),
    ];
    let transitions = vec![
        Transition::from_any(ATTACKED, KNOCKED),
        Transition::from_any(STORE_CLOSING, GO_HOME),
        Transition::new(REACHED_PRODUCT, SHOPPING, COMPLAIN),
        Transition::new(PLAYER_NOT_IN_RANGE, COMPLAIN, CHASE_PLAYER),
        Transition::new(PLAYER_IN_RANGE, CHASE_PLAYER, ATTACK_PLAYER),
        Transition::new(PLAYER_NOT_IN_RANGE, ATTACK_PLAYER, CHASE_PLAYER),
        Transition::new(LOST_PLAYER, CHASE_PLAYER, COMPLAIN),
        Transition::new(COMPLAINED_TOO_MUCH, COMPLAIN, GO_HOME),
        Transition::new(ATTACKED_TOO_MANY_TIMES, ATTACK_PLAYER, GO_HOME),
        Transition::new(STAND_UP, KNOCKED, GO_HOME),
    ];
    (states, transitions, SHOPPING)
}

fn kid_graph() -> (Vec<Boxed>, Vec<Transition>, StateId) {
    let states: Vec<Boxed> = vec![
        Box::new(Roam::default()),
        Box::new(GoHome),
        Box::new(Knocked::new(Recovery::GoHome)),
    ];
    let transitions = vec![
        Transition::from_any(ATTACKED, KNOCKED),
        Transition::from_any(STORE_CLOSING, GO_HOME),
        Transition::new(BORED, ROAM, GO_HOME),
        Transition::new(STAND_UP, KNOCKED, GO_HOME),
    ];
    (states, transitions, ROAM)
}

fn manager_graph() -> (Vec<Boxed>, Vec<Transition>, StateId) {
    let states: Vec<Boxed> = vec![
        Box::new(Patrol::default()),
        Box::new(Office::default()),
        Box::new(Knocked::new(Recovery::ResumeDuty)),
    ];
    let transitions = vec![
        Transition::from_any(ATTACKED, KNOCKED),
        Transition::new(GO_TO_OFFICE, PATROL, OFFICE),
        Transition::new(START_PATROL, OFFICE, PATROL),
        Transition::new(RESUME_PATROL, KNOCKED, PATROL),
        Transition::new(RESUME_OFFICE, KNOCKED, OFFICE),
    ];
    (states, transitions, PATROL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AreaRole;
    use crate::test_support::{Fixture, Gate};
    use glam::Vec3;
    use market_events::{Event, Mailbox, Topic};

    #[test]
    fn test_every_archetype_builds() {
        for archetype in [
            Archetype::NormalCustomer,
            Archetype::Thief,
            Archetype::AnnoyingKid,
            Archetype::Karen,
            Archetype::Manager,
        ] {
            let fsm = build_fsm(archetype).unwrap();
            assert!(!fsm.has_started());
        }
    }

    #[test]
    fn test_customer_buys_and_leaves() {
        let mut fx = Fixture::new();
        fx.config.set_float(1, crate::config::keys::THIEF_PROBABILITY, 0.0);
        let purchases = Mailbox::new();
        purchases.subscribe(&fx.bus, Topic::ItemPurchased, fx.bus.register_listener());

        let gate = Gate::open();
        let mut agent = fx.agent(Archetype::NormalCustomer, &gate);
        fx.start(&mut agent);
        assert_eq!(agent.current_state(), SHOPPING);

        // Arrive, take item, browse
        fx.step(&mut agent, 0.1);
        assert!(agent.body.held_item.is_some());
        fx.run_until(&mut agent, 10.0, |a| a.current_state() == PAY);
        fx.run_until(&mut agent, 10.0, |a| a.current_state() == GO_HOME);
        assert_eq!(purchases.len(), 1);
        assert!(agent.body.held_item.is_none());

        fx.step(&mut agent, 0.1);
        assert!(agent.is_retiring());
    }

    #[test]
    fn test_sold_out_customer_goes_home() {
        let mut fx = Fixture::new();
        fx.config.set_float(1, crate::config::keys::THIEF_PROBABILITY, 0.0);
        let gate = Gate::closed();
        let mut agent = fx.agent(Archetype::NormalCustomer, &gate);
        fx.start(&mut agent);

        // Shelf empties while the customer walks
        let product = agent.body.target_product;
        while fx.stock_take(product) {}

        gate.open_now();
        fx.step(&mut agent, 0.1);
        fx.step(&mut agent, 0.1);
        assert_eq!(agent.current_state(), GO_HOME);
    }

    #[test]
    fn test_certain_thief_steals_and_runs() {
        let mut fx = Fixture::new();
        fx.config.set_float(1, crate::config::keys::THIEF_PROBABILITY, 1.0);
        let thefts = Mailbox::new();
        thefts.subscribe(&fx.bus, Topic::ItemStolen, fx.bus.register_listener());

        let gate = Gate::open();
        let mut agent = fx.agent(Archetype::NormalCustomer, &gate);
        fx.start(&mut agent);
        assert_eq!(agent.current_state(), STEAL);
        assert_eq!(agent.archetype(), Archetype::Thief);

        // Arrive and claim, then grab
        fx.step(&mut agent, 0.1);
        assert!(agent.body.held_item.is_some());
        fx.step(&mut agent, 0.1);
        assert_eq!(agent.current_state(), RUN);
        fx.step(&mut agent, 0.1);
        assert!(agent.is_retiring());
        assert_eq!(thefts.len(), 1);
    }

    #[test]
    fn test_thief_at_empty_shelf_leaves_empty_handed() {
        let mut fx = Fixture::new();
        fx.config.set_float(1, crate::config::keys::THIEF_PROBABILITY, 1.0);
        let thefts = Mailbox::new();
        thefts.subscribe(&fx.bus, Topic::ItemStolen, fx.bus.register_listener());

        let gate = Gate::closed();
        let mut agent = fx.agent(Archetype::NormalCustomer, &gate);
        fx.start(&mut agent);
        assert_eq!(agent.current_state(), STEAL);

        let product = agent.body.target_product;
        while fx.stock_take(product) {}

        gate.open_now();
        fx.step(&mut agent, 0.1);
        fx.step(&mut agent, 0.1);
        assert_eq!(agent.current_state(), GO_HOME);
        assert!(agent.body.held_item.is_none());

        fx.step(&mut agent, 0.1);
        assert!(agent.is_retiring());
        assert!(thefts.is_empty());
    }

    #[test]
    fn test_zero_thief_probability_never_steals() {
        let mut fx = Fixture::new();
        fx.config.set_float(1, crate::config::keys::THIEF_PROBABILITY, 0.0);
        let gate = Gate::closed();

        for _ in 0..1000 {
            let mut agent = fx.agent(Archetype::NormalCustomer, &gate);
            fx.start(&mut agent);
            assert_eq!(agent.current_state(), SHOPPING);
            assert_eq!(agent.archetype(), Archetype::NormalCustomer);
        }
    }

    #[test]
    fn test_knocked_customer_returns_item_and_leaves() {
        let mut fx = Fixture::new();
        fx.config.set_float(1, crate::config::keys::THIEF_PROBABILITY, 0.0);
        let gate = Gate::open();
        let mut agent = fx.agent(Archetype::NormalCustomer, &gate);
        fx.start(&mut agent);
        fx.step(&mut agent, 0.1);
        let product = agent.body.target_product;
        let before = fx.available(product);

        agent.body.attacked = true;
        fx.step(&mut agent, 0.1);
        assert_eq!(agent.current_state(), KNOCKED);
        assert!(!agent.body.movement.is_enabled());
        assert_eq!(fx.available(product), before + 1);

        fx.run_until(&mut agent, 10.0, |a| a.current_state() == GO_HOME);
        assert!(!agent.body.attacked);
        assert!(agent.body.movement.is_enabled());
    }

    #[test]
    fn test_store_closing_sends_customer_home() {
        let mut fx = Fixture::new();
        fx.config.set_float(1, crate::config::keys::THIEF_PROBABILITY, 0.0);
        let gate = Gate::closed();
        let mut agent = fx.agent(Archetype::AnnoyingKid, &gate);
        fx.start(&mut agent);
        assert_eq!(agent.current_state(), ROAM);

        fx.bus.publish(Event::StoreClosing);
        fx.step(&mut agent, 0.1);
        assert_eq!(agent.current_state(), GO_HOME);
    }

    #[test]
    fn test_karen_loop_ends_after_max_attacks() {
        let mut fx = Fixture::new();
        fx.config.set_int(1, crate::config::keys::MAX_ATTACKS, 3);
        fx.config.set_int(1, crate::config::keys::MAX_COMPLAINING, 10);
        fx.config.set_float(1, crate::config::keys::REACH, 2.0);
        fx.config.set_float(1, crate::config::keys::ATTACK_INTERVAL, 1.0);
        fx.config.set_float(1, crate::config::keys::CHASE_TIMEOUT, 100.0);

        let attacks = Mailbox::new();
        attacks.subscribe(&fx.bus, Topic::PlayerAttacked, fx.bus.register_listener());

        let gate = Gate::open();
        let mut agent = fx.agent(Archetype::Karen, &gate);
        fx.player = Vec3::new(50.0, 0.0, 50.0);
        fx.start(&mut agent);

        fx.step(&mut agent, 0.1);
        assert_eq!(agent.current_state(), COMPLAIN);
        fx.step(&mut agent, 0.1);
        assert_eq!(agent.current_state(), CHASE_PLAYER);

        // Player walks up to her and stays put
        gate.close_now();
        fx.player = agent.body.position();
        fx.step(&mut agent, 0.1);
        assert_eq!(agent.current_state(), ATTACK_PLAYER);

        fx.run_until(&mut agent, 20.0, |a| a.current_state() == GO_HOME);
        assert_eq!(attacks.len(), 3);
        assert_eq!(agent.body.mood.attacks, 3);
    }

    #[test]
    fn test_karen_leaves_after_max_complaints() {
        let mut fx = Fixture::new();
        fx.config.set_int(1, crate::config::keys::MAX_COMPLAINING, 2);
        fx.config.set_float(1, crate::config::keys::REACH, 100.0);

        let gate = Gate::open();
        let mut agent = fx.agent(Archetype::Karen, &gate);
        fx.start(&mut agent);
        fx.run_until(&mut agent, 30.0, |a| a.current_state() == GO_HOME);
        assert_eq!(agent.body.mood.complaints, 2);
    }

    #[test]
    fn test_karen_gives_up_when_player_out_of_reach() {
        let mut fx = Fixture::new();
        fx.config.set_int(1, crate::config::keys::MAX_COMPLAINING, 3);
        fx.config.set_float(1, crate::config::keys::REACH, 2.0);
        fx.config.set_float(1, crate::config::keys::CHASE_TIMEOUT, 2.0);

        let gate = Gate::open();
        let mut agent = fx.agent(Archetype::Karen, &gate);
        fx.player = Vec3::new(500.0, 0.0, 500.0);
        fx.start(&mut agent);
        fx.step(&mut agent, 0.1);
        assert_eq!(agent.current_state(), COMPLAIN);

        // She never gets anywhere near the player
        gate.close_now();
        fx.run_until(&mut agent, 60.0, |a| a.current_state() == GO_HOME);
        assert_eq!(agent.body.mood.complaints, 3);
        assert_eq!(agent.body.mood.attacks, 0);
    }

    #[test]
    fn test_manager_resumes_duty_after_knock() {
        let mut fx = Fixture::new();
        let gate = Gate::open();
        let mut agent = fx.agent(Archetype::Manager, &gate);
        fx.start(&mut agent);
        assert_eq!(agent.current_state(), PATROL);
        assert!(agent.body.is_patrolling);

        agent.body.attacked = true;
        fx.step(&mut agent, 0.1);
        assert_eq!(agent.current_state(), KNOCKED);
        fx.run_until(&mut agent, 10.0, |a| a.current_state() == PATROL);

        fx.run_until(&mut agent, 60.0, |a| a.current_state() == OFFICE);
        assert!(!agent.body.is_patrolling);
        assert_eq!(agent.body.areas.get(&AreaRole::Office), Some(&fx.layout.office));

        agent.body.attacked = true;
        fx.step(&mut agent, 0.1);
        fx.run_until(&mut agent, 10.0, |a| a.current_state() != KNOCKED);
        assert_eq!(agent.current_state(), OFFICE);
    }
}
