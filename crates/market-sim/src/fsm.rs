//! Generic finite state machine driving one agent per tick
//!
//! A machine owns its states and an ordered transition table. Transitions are
//! looked up by name (case-insensitive) and the **first** entry whose `from`
//! is either [`TransitionFrom::Any`] or the current state wins, so table order
//! is priority. An unknown transition is logged and ignored.
//!
//! States may request a follow-up transition from `enter`. Those chained
//! requests are followed iteratively inside one `change_state` call and capped
//! at [`MAX_CHAINED_TRANSITIONS`].

use tracing::{debug, warn};

/// Name of a state; unique within one machine.
pub type StateId = &'static str;

/// Maximum number of transitions one `change_state` call may chain through.
pub const MAX_CHAINED_TRANSITIONS: usize = 16;

/// Family of context types a machine's states operate on. The context may
/// borrow from the world for the duration of one call, hence the lifetime.
pub trait ContextKind: 'static {
    type Ctx<'a>;
}

/// One node in an agent's behavior graph.
///
/// `enter` and `execute` return the name of a transition to request, if any.
pub trait State<K: ContextKind>: Send {
    fn name(&self) -> StateId;

    fn enter(&mut self, _ctx: &mut K::Ctx<'_>) -> Option<&'static str> {
        None
    }

    fn execute(&mut self, ctx: &mut K::Ctx<'_>) -> Option<&'static str>;

    fn exit(&mut self, _ctx: &mut K::Ctx<'_>) {}
}

/// Source side of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionFrom {
    /// Matches whatever state is current
    Any,
    State(StateId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub name: String,
    pub from: TransitionFrom,
    pub to: StateId,
}

impl Transition {
    pub fn new(name: impl Into<String>, from: StateId, to: StateId) -> Self {
        Self {
            name: name.into(),
            from: TransitionFrom::State(from),
            to,
        }
    }

    /// A transition that fires from any current state
    pub fn from_any(name: impl Into<String>, to: StateId) -> Self {
        Self {
            name: name.into(),
            from: TransitionFrom::Any,
            to,
        }
    }
}

/// A completed transition, kept until the owner drains it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    pub from: StateId,
    pub to: StateId,
    pub transition: String,
}

/// Errors raised while building a machine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("state machine has no states")]
    NoStates,

    #[error("start state '{0}' is not one of the machine's states")]
    UnknownStartState(StateId),

    #[error("state '{0}' is declared twice")]
    DuplicateState(StateId),

    #[error("transition '{transition}' refers to unknown state '{state}'")]
    UnknownTransitionState { transition: String, state: StateId },

    #[error("machine with {states} states has an empty transition table")]
    EmptyTransitionTable { states: usize },
}

/// Chained transitions did not settle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("transition '{transition}' chained more than {limit} times (stuck in '{state}')")]
pub struct StateLoopError {
    pub transition: String,
    pub state: StateId,
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FsmError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Loop(#[from] StateLoopError),
}

pub struct FiniteStateMachine<K: ContextKind> {
    states: Vec<Box<dyn State<K>>>,
    transitions: Vec<Transition>,
    start: usize,
    current: usize,
    started: bool,
    changes: Vec<StateChange>,
}

impl<K: ContextKind> std::fmt::Debug for FiniteStateMachine<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FiniteStateMachine")
            .field("states", &self.state_names())
            .field("current", &self.current())
            .field("transitions", &self.transitions.len())
            .finish()
    }
}

impl<K: ContextKind> FiniteStateMachine<K> {
    /// Build a machine. The start state becomes current but is not entered
    /// until [`FiniteStateMachine::start`].
    pub fn initialize(
        states: Vec<Box<dyn State<K>>>,
        transitions: Vec<Transition>,
        start: StateId,
    ) -> Result<Self, ConfigurationError> {
        if states.is_empty() {
            return Err(ConfigurationError::NoStates);
        }
        for (i, state) in states.iter().enumerate() {
            if states[..i].iter().any(|s| s.name() == state.name()) {
                return Err(ConfigurationError::DuplicateState(state.name()));
            }
        }
        if transitions.is_empty() && states.len() > 1 {
            return Err(ConfigurationError::EmptyTransitionTable {
                states: states.len(),
            });
        }

        let index_of = |name: StateId| states.iter().position(|s| s.name() == name);
        for transition in &transitions {
            if let TransitionFrom::State(from) = transition.from {
                if index_of(from).is_none() {
                    return Err(ConfigurationError::UnknownTransitionState {
                        transition: transition.name.clone(),
                        state: from,
                    });
                }
            }
            if index_of(transition.to).is_none() {
                return Err(ConfigurationError::UnknownTransitionState {
                    transition: transition.name.clone(),
                    state: transition.to,
                });
            }
        }
        let start_index = index_of(start).ok_or(ConfigurationError::UnknownStartState(start))?;

        Ok(Self {
            states,
            transitions,
            start: start_index,
            current: start_index,
            started: false,
            changes: Vec::new(),
        })
    }

    /// Enter the start state. Calling it again has no effect.
    pub fn start(&mut self, ctx: &mut K::Ctx<'_>) -> Result<(), StateLoopError> {
        if self.started {
            return Ok(());
        }
        self.started = true;
        self.current = self.start;
        match self.states[self.current].enter(ctx) {
            Some(request) => self.follow(request, ctx).map(|_| ()),
            None => Ok(()),
        }
    }

    /// Run the current state's `execute` once, following any requested transition.
    pub fn tick(&mut self, ctx: &mut K::Ctx<'_>) -> Result<(), StateLoopError> {
        if !self.started {
            self.start(ctx)?;
        }
        match self.states[self.current].execute(ctx) {
            Some(request) => self.follow(request, ctx).map(|_| ()),
            None => Ok(()),
        }
    }

    /// Request a transition by name. Returns whether the current state changed.
    pub fn change_state(
        &mut self,
        transition: &str,
        ctx: &mut K::Ctx<'_>,
    ) -> Result<bool, StateLoopError> {
        if !self.started {
            self.start(ctx)?;
        }
        self.follow(transition, ctx)
    }

    fn follow(&mut self, first: &str, ctx: &mut K::Ctx<'_>) -> Result<bool, StateLoopError> {
        let mut request = first.to_string();
        let mut hops = 0;

        loop {
            let Some(target) = self.lookup(&request) else {
                warn!(
                    transition = %request,
                    state = self.current(),
                    "no transition matches; staying in current state"
                );
                return Ok(hops > 0);
            };

            hops += 1;
            if hops > MAX_CHAINED_TRANSITIONS {
                return Err(StateLoopError {
                    transition: request,
                    state: self.current(),
                    limit: MAX_CHAINED_TRANSITIONS,
                });
            }

            let from = self.current();
            self.states[self.current].exit(ctx);
            self.current = target;
            let to = self.current();
            debug!(from, to, transition = %request, "state change");
            self.changes.push(StateChange {
                from,
                to,
                transition: request.clone(),
            });

            match self.states[self.current].enter(ctx) {
                Some(next) => request = next.to_string(),
                None => return Ok(true),
            }
        }
    }

    fn lookup(&self, name: &str) -> Option<usize> {
        let current = self.current();
        self.transitions
            .iter()
            .find(|t| {
                t.name.eq_ignore_ascii_case(name)
                    && match t.from {
                        TransitionFrom::Any => true,
                        TransitionFrom::State(from) => from == current,
                    }
            })
            .and_then(|t| self.states.iter().position(|s| s.name() == t.to))
    }

    /// Name of the current state
    pub fn current(&self) -> StateId {
        self.states[self.current].name()
    }

    pub fn is_in(&self, state: StateId) -> bool {
        self.current() == state
    }

    pub fn has_started(&self) -> bool {
        self.started
    }

    pub fn state_names(&self) -> Vec<StateId> {
        self.states.iter().map(|s| s.name()).collect()
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Take the transitions recorded since the last drain, oldest first.
    pub fn drain_changes(&mut self) -> Vec<StateChange> {
        std::mem::take(&mut self.changes)
    }
}
