use glam::Vec3;
use market_core::{AgentId, ProductType, ShelfId, SubtaskId, TaskId};

/// Fire-and-forget presentation cue (sound, bark, flash)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cue {
    /// Something hit an agent
    Impact,
    /// A Karen started complaining
    Complaint,
    /// Checkout scanned an item
    RegisterBeep,
    /// An agent swung at the player
    Swing,
    /// Shoplifter left with an item
    TheftAlarm,
}

/// A simulation event. Each event belongs to exactly one [`Topic`].
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    // -- Agent lifecycle --
    AgentSpawned {
        agent: AgentId,
        archetype: &'static str,
    },
    /// The agent finished its behavior (reached the exit) and wants to leave
    AgentRetired {
        agent: AgentId,
    },
    AgentDespawned {
        agent: AgentId,
    },
    StateChanged {
        agent: AgentId,
        from: &'static str,
        to: &'static str,
        transition: String,
    },

    // -- Shopping outcomes --
    ItemPurchased {
        agent: AgentId,
        product: ProductType,
    },
    ItemStolen {
        agent: AgentId,
        product: ProductType,
    },
    PlayerAttacked {
        agent: AgentId,
    },
    StoreClosing,

    // -- Stock --
    ShelfDepleted {
        shelf: ShelfId,
        product: ProductType,
    },
    StockPlaced {
        shelf: ShelfId,
    },

    // -- Tasks --
    TaskActivated {
        task: TaskId,
        name: String,
    },
    TaskProgress {
        task: TaskId,
        completed: usize,
        total: usize,
    },
    SubtaskCompleted {
        task: TaskId,
        subtask: SubtaskId,
    },
    TaskCompleted {
        task: TaskId,
    },
    TaskRetired {
        task: TaskId,
    },

    // -- Presentation --
    Cue {
        cue: Cue,
        position: Vec3,
    },
}

/// Discriminant tag for events, used as the subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    AgentSpawned,
    AgentRetired,
    AgentDespawned,
    StateChanged,
    ItemPurchased,
    ItemStolen,
    PlayerAttacked,
    StoreClosing,
    ShelfDepleted,
    StockPlaced,
    TaskActivated,
    TaskProgress,
    SubtaskCompleted,
    TaskCompleted,
    TaskRetired,
    Cue,
}

impl Event {
    /// Get the topic this event is delivered on.
    pub fn topic(&self) -> Topic {
        match self {
            Event::AgentSpawned { .. } => Topic::AgentSpawned,
            Event::AgentRetired { .. } => Topic::AgentRetired,
            Event::AgentDespawned { .. } => Topic::AgentDespawned,
            Event::StateChanged { .. } => Topic::StateChanged,
            Event::ItemPurchased { .. } => Topic::ItemPurchased,
            Event::ItemStolen { .. } => Topic::ItemStolen,
            Event::PlayerAttacked { .. } => Topic::PlayerAttacked,
            Event::StoreClosing => Topic::StoreClosing,
            Event::ShelfDepleted { .. } => Topic::ShelfDepleted,
            Event::StockPlaced { .. } => Topic::StockPlaced,
            Event::TaskActivated { .. } => Topic::TaskActivated,
            Event::TaskProgress { .. } => Topic::TaskProgress,
            Event::SubtaskCompleted { .. } => Topic::SubtaskCompleted,
            Event::TaskCompleted { .. } => Topic::TaskCompleted,
            Event::TaskRetired { .. } => Topic::TaskRetired,
            Event::Cue { .. } => Topic::Cue,
        }
    }

    /// The agent this event is about, if any.
    pub fn agent(&self) -> Option<AgentId> {
        match self {
            Event::AgentSpawned { agent, .. }
            | Event::AgentRetired { agent }
            | Event::AgentDespawned { agent }
            | Event::StateChanged { agent, .. }
            | Event::ItemPurchased { agent, .. }
            | Event::ItemStolen { agent, .. }
            | Event::PlayerAttacked { agent } => Some(*agent),
            _ => None,
        }
    }

    /// The task this event is about, if any.
    pub fn task(&self) -> Option<TaskId> {
        match self {
            Event::TaskActivated { task, .. }
            | Event::TaskProgress { task, .. }
            | Event::SubtaskCompleted { task, .. }
            | Event::TaskCompleted { task }
            | Event::TaskRetired { task } => Some(*task),
            _ => None,
        }
    }
}
