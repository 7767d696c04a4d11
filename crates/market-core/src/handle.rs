use std::fmt;

use serde::{Deserialize, Serialize};

/// A generational agent handle. The index addresses a slot in the agent table;
/// the generation makes handles to retired agents stale once the slot is reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl AgentId {
    /// Create a handle from raw parts (mainly for testing).
    pub fn from_raw(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// The slot index of this agent.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The generation of this agent (incremented on reuse).
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Agent({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Allocates and recycles agent slots with generational tracking.
#[derive(Debug, Default)]
pub struct AgentAllocator {
    generations: Vec<u32>,
    alive: Vec<bool>,
    free_list: Vec<u32>,
    len: usize,
}

impl AgentAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new handle, reusing a freed slot if available.
    pub fn allocate(&mut self) -> AgentId {
        self.len += 1;
        if let Some(index) = self.free_list.pop() {
            self.alive[index as usize] = true;
            AgentId {
                index,
                generation: self.generations[index as usize],
            }
        } else {
            let index = self.generations.len() as u32;
            self.generations.push(0);
            self.alive.push(true);
            AgentId {
                index,
                generation: 0,
            }
        }
    }

    /// Release a handle. Returns `true` if it was alive.
    pub fn deallocate(&mut self, id: AgentId) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        let idx = id.index as usize;
        self.alive[idx] = false;
        self.generations[idx] += 1;
        self.free_list.push(id.index);
        self.len -= 1;
        true
    }

    /// Check if a handle still refers to a live agent.
    pub fn is_alive(&self, id: AgentId) -> bool {
        let idx = id.index as usize;
        idx < self.alive.len() && self.alive[idx] && self.generations[idx] == id.generation
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
