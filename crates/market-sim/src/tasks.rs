//! Side tasks for the player: fix the fuse box, clean the floor, restock
//! shelves. Each task is a set of subtasks; the coordinator hears about
//! subtask completion over the bus and reports the task done exactly once.

use std::collections::BTreeMap;

use market_core::{select_weighted, Deadline, DeferredQueue, ShelfId, SimRng, SubtaskId, TaskId};
use market_events::{Event, EventBus, ListenerId, Mailbox, Topic};
use tracing::{debug, info};

use crate::agent::SimEnv;
use crate::config::keys;

/// Seconds between a shelf running empty and its restock task appearing
pub const RESTOCK_DELAY: f32 = 5.0;

/// Seconds a completed task lingers before it is retired
pub const COMPLETION_GRACE: f32 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    FixFuseBox,
    CleanFloor,
    Restock { shelf: ShelfId },
}

impl TaskKind {
    /// Tasks the periodic scheduler picks from
    pub const CATALOG: [TaskKind; 2] = [TaskKind::FixFuseBox, TaskKind::CleanFloor];

    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::FixFuseBox => "FixFuseBox",
            TaskKind::CleanFloor => "CleanFloor",
            TaskKind::Restock { .. } => "Restock",
        }
    }

    fn probability_key(&self) -> Option<&'static str> {
        match self {
            TaskKind::FixFuseBox => Some(keys::TASK_FUSE_BOX),
            TaskKind::CleanFloor => Some(keys::TASK_CLEAN_FLOOR),
            TaskKind::Restock { .. } => None,
        }
    }
}

/// What finishes a subtask
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Interaction held continuously for `required` seconds
    Hold {
        required: f32,
        held: f32,
        holding: bool,
    },
    /// A tool or item picked up
    Grab,
    /// Items still to be placed on a shelf
    Place { remaining: u32 },
}

#[derive(Debug, Clone)]
pub struct Subtask {
    pub id: SubtaskId,
    pub label: &'static str,
    pub condition: Condition,
    done: bool,
}

impl Subtask {
    pub fn is_done(&self) -> bool {
        self.done
    }
}

#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    pub kind: TaskKind,
    subtasks: Vec<Subtask>,
    /// Completions heard back over the bus
    reported: usize,
    enabled: bool,
    completed: bool,
}

impl Task {
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn subtasks(&self) -> &[Subtask] {
        &self.subtasks
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    pub fn completed_count(&self) -> usize {
        self.reported
    }

    pub fn total(&self) -> usize {
        self.subtasks.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Restock(ShelfId),
    Retire(TaskId),
}

pub struct TaskCoordinator {
    tasks: BTreeMap<TaskId, Task>,
    next_task: u64,
    next_subtask: u64,
    next_activation: Option<Deadline>,
    pending: DeferredQueue<Pending>,
    inbox: Mailbox,
    listener: ListenerId,
    bus: EventBus,
    rng: SimRng,
}

impl std::fmt::Debug for TaskCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskCoordinator")
            .field("tasks", &self.tasks.len())
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl TaskCoordinator {
    pub fn new(bus: EventBus, rng: SimRng) -> Self {
        let listener = bus.register_listener();
        let inbox = Mailbox::new();
        for topic in [Topic::ShelfDepleted, Topic::StockPlaced, Topic::SubtaskCompleted] {
            inbox.subscribe(&bus, topic, listener);
        }
        Self {
            tasks: BTreeMap::new(),
            next_task: 0,
            next_subtask: 0,
            next_activation: None,
            pending: DeferredQueue::new(),
            inbox,
            listener,
            bus,
            rng,
        }
    }

    pub fn tick(&mut self, env: &mut SimEnv<'_>) {
        self.advance_holds(env.delta);
        self.process_inbox(env);

        for due in self.pending.drain_due(env.now) {
            match due {
                Pending::Restock(shelf) => self.open_restock(shelf, env),
                Pending::Retire(task) => self.retire(task),
            }
        }

        let interval = env.config.get_float(keys::TASK_INTERVAL);
        match self.next_activation {
            None => self.next_activation = Some(Deadline::after(env.now, interval)),
            Some(deadline) if deadline.is_due(env.now) => {
                self.activate_random(env);
                self.next_activation = Some(Deadline::after(env.now, interval));
            }
            Some(_) => {}
        }
    }

    fn advance_holds(&mut self, delta: f32) {
        let mut finished = Vec::new();
        for task in self.tasks.values_mut().filter(|t| t.enabled) {
            for (index, subtask) in task.subtasks.iter_mut().enumerate() {
                if subtask.done {
                    continue;
                }
                if let Condition::Hold {
                    required,
                    held,
                    holding: true,
                } = &mut subtask.condition
                {
                    *held += delta;
                    if *held >= *required {
                        finished.push((task.id, index));
                    }
                }
            }
        }
        for (task, index) in finished {
            self.complete_subtask(task, index);
        }
    }

    /// Handle bus events until none are left; completing a subtask here
    /// queues another event that must be seen in the same tick.
    fn process_inbox(&mut self, env: &mut SimEnv<'_>) {
        loop {
            let events = self.inbox.drain();
            if events.is_empty() {
                break;
            }
            for event in events {
                self.handle(event, env);
            }
        }
    }

    fn handle(&mut self, event: Event, env: &mut SimEnv<'_>) {
        match event {
            Event::ShelfDepleted { shelf, .. } => {
                let queued = self
                    .pending
                    .contains_where(|p| *p == Pending::Restock(shelf));
                if !queued && self.restock_task(shelf).is_none() {
                    debug!(%shelf, "restock queued");
                    self.pending.schedule(
                        Deadline::after(env.now, RESTOCK_DELAY),
                        Pending::Restock(shelf),
                    );
                }
            }
            Event::StockPlaced { shelf } => self.on_stock_placed(shelf),
            Event::SubtaskCompleted { task, .. } => self.on_subtask_completed(task, env),
            _ => {}
        }
    }

    fn on_stock_placed(&mut self, shelf: ShelfId) {
        let Some(id) = self.restock_task(shelf) else {
            return;
        };
        let Some(task) = self.tasks.get_mut(&id) else {
            return;
        };
        let mut finished = None;
        for (index, subtask) in task.subtasks.iter_mut().enumerate() {
            if let (false, Condition::Place { remaining }) = (subtask.done, &mut subtask.condition) {
                *remaining = remaining.saturating_sub(1);
                if *remaining == 0 {
                    finished = Some(index);
                }
                break;
            }
        }
        if let Some(index) = finished {
            self.complete_subtask(id, index);
        }
    }

    fn on_subtask_completed(&mut self, id: TaskId, env: &mut SimEnv<'_>) {
        let Some(task) = self.tasks.get_mut(&id) else {
            return;
        };
        task.reported += 1;
        self.bus.publish(Event::TaskProgress {
            task: id,
            completed: task.reported,
            total: task.subtasks.len(),
        });
        if task.completed || task.reported < task.subtasks.len() {
            return;
        }

        task.completed = true;
        info!(task = %id, name = task.name(), "task completed");
        if let TaskKind::Restock { shelf } = task.kind {
            env.stock.set_placeholders(shelf, false);
        }
        self.bus.publish(Event::TaskCompleted { task: id });
        self.pending
            .schedule(Deadline::after(env.now, COMPLETION_GRACE), Pending::Retire(id));
    }

    fn complete_subtask(&mut self, task: TaskId, index: usize) {
        let Some(subtask) = self
            .tasks
            .get_mut(&task)
            .and_then(|t| t.subtasks.get_mut(index))
        else {
            return;
        };
        if subtask.done {
            return;
        }
        subtask.done = true;
        if let Condition::Hold { holding, .. } = &mut subtask.condition {
            *holding = false;
        }
        debug!(%task, subtask = subtask.label, "subtask done");
        self.bus.publish(Event::SubtaskCompleted {
            task,
            subtask: subtask.id,
        });
    }

    fn activate_random(&mut self, env: &SimEnv<'_>) {
        let candidates: Vec<(TaskKind, f32)> = TaskKind::CATALOG
            .iter()
            .filter(|kind| !self.tasks.values().any(|t| t.kind == **kind))
            .filter_map(|kind| {
                kind.probability_key()
                    .map(|key| (*kind, env.config.get_float(key)))
            })
            .collect();
        match select_weighted(&candidates, &mut self.rng) {
            Some(kind) => {
                self.activate(kind);
            }
            None => debug!("every catalog task already active"),
        }
    }

    /// Create a task and enable it
    pub fn activate(&mut self, kind: TaskKind) -> TaskId {
        let subtasks = match kind {
            TaskKind::FixFuseBox => vec![
                self.subtask("open panel", hold(1.5)),
                self.subtask("grab fuse", Condition::Grab),
                self.subtask("replace fuse", hold(3.0)),
            ],
            TaskKind::CleanFloor => vec![
                self.subtask("grab mop", Condition::Grab),
                self.subtask("mop spill", hold(4.0)),
            ],
            TaskKind::Restock { .. } => {
                vec![self.subtask("place items", Condition::Place { remaining: 1 })]
            }
        };
        self.insert(kind, subtasks)
    }

    fn open_restock(&mut self, shelf: ShelfId, env: &mut SimEnv<'_>) {
        let missing = env.stock.missing(shelf);
        if missing == 0 || self.restock_task(shelf).is_some() {
            return;
        }
        env.stock.set_placeholders(shelf, true);
        let subtask = self.subtask("place items", Condition::Place { remaining: missing });
        self.insert(TaskKind::Restock { shelf }, vec![subtask]);
    }

    fn insert(&mut self, kind: TaskKind, subtasks: Vec<Subtask>) -> TaskId {
        let id = TaskId(self.next_task);
        self.next_task += 1;
        self.tasks.insert(
            id,
            Task {
                id,
                kind,
                subtasks,
                reported: 0,
                enabled: false,
                completed: false,
            },
        );
        self.enable(id);
        id
    }

    fn enable(&mut self, id: TaskId) {
        if let Some(task) = self.tasks.get_mut(&id) {
            task.enabled = true;
            info!(task = %id, name = task.name(), "task activated");
            self.bus.publish(Event::TaskActivated {
                task: id,
                name: task.name().to_string(),
            });
        }
    }

    fn subtask(&mut self, label: &'static str, condition: Condition) -> Subtask {
        let id = SubtaskId(self.next_subtask);
        self.next_subtask += 1;
        Subtask {
            id,
            label,
            condition,
            done: false,
        }
    }

    fn retire(&mut self, id: TaskId) {
        if self.tasks.remove(&id).is_some() {
            info!(task = %id, "task retired");
            self.bus.publish(Event::TaskRetired { task: id });
        }
    }

    fn restock_task(&self, shelf: ShelfId) -> Option<TaskId> {
        self.tasks
            .values()
            .find(|t| t.kind == TaskKind::Restock { shelf } && !t.completed)
            .map(|t| t.id)
    }

    fn locate(&self, subtask: SubtaskId) -> Option<(TaskId, usize)> {
        self.tasks.values().filter(|t| t.enabled).find_map(|t| {
            t.subtasks
                .iter()
                .position(|s| s.id == subtask)
                .map(|index| (t.id, index))
        })
    }

    fn subtask_mut(&mut self, subtask: SubtaskId) -> Option<&mut Subtask> {
        let (task, index) = self.locate(subtask)?;
        self.tasks.get_mut(&task)?.subtasks.get_mut(index)
    }

    /// Player starts holding an interaction on a hold subtask
    pub fn begin_interaction(&mut self, subtask: SubtaskId) -> bool {
        match self.subtask_mut(subtask) {
            Some(Subtask {
                done: false,
                condition: Condition::Hold { holding, .. },
                ..
            }) => {
                *holding = true;
                true
            }
            _ => false,
        }
    }

    /// Player lets go. Progress on an unfinished hold is lost.
    pub fn end_interaction(&mut self, subtask: SubtaskId) -> bool {
        match self.subtask_mut(subtask) {
            Some(Subtask {
                done,
                condition: Condition::Hold { held, holding, .. },
                ..
            }) => {
                *holding = false;
                if !*done {
                    *held = 0.0;
                }
                true
            }
            _ => false,
        }
    }

    /// Player picks up the item a grab subtask asks for
    pub fn grab_item(&mut self, subtask: SubtaskId) -> bool {
        let Some((task, index)) = self.locate(subtask) else {
            return false;
        };
        let grabbable = self
            .tasks
            .get(&task)
            .and_then(|t| t.subtasks.get(index))
            .map(|s| !s.done && s.condition == Condition::Grab)
            .unwrap_or(false);
        if grabbable {
            self.complete_subtask(task, index);
        }
        grabbable
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    /// Enabled tasks, completed ones in their grace period included
    pub fn active_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values().filter(|t| t.enabled)
    }

    /// Drop every task and pending action (end of day)
    pub fn reset(&mut self) {
        self.tasks.clear();
        self.pending.clear();
        self.inbox.drain();
        self.next_activation = None;
    }

    pub fn shutdown(&mut self) {
        self.reset();
        self.bus.unsubscribe_all(self.listener);
    }
}

fn hold(required: f32) -> Condition {
    Condition::Hold {
        required,
        held: 0.0,
        holding: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stock::StockService;
    use crate::test_support::Fixture;
    use market_core::ProductType;

    fn step(fx: &mut Fixture, tasks: &mut TaskCoordinator, delta: f32) {
        fx.now += delta as f64;
        let mut env = fx.env();
        env.delta = delta;
        tasks.tick(&mut env);
    }

    fn quiet(fx: &mut Fixture) {
        // Keep the periodic scheduler out of the way
        fx.config.set_float(1, keys::TASK_INTERVAL, 1_000.0);
    }

    #[test]
    fn test_completion_reported_once() {
        let mut fx = Fixture::new();
        quiet(&mut fx);
        let mut tasks = TaskCoordinator::new(fx.bus.clone(), SimRng::seeded(1));
        let completed = Mailbox::new();
        completed.subscribe(&fx.bus, Topic::TaskCompleted, fx.bus.register_listener());
        let retired = Mailbox::new();
        retired.subscribe(&fx.bus, Topic::TaskRetired, fx.bus.register_listener());

        let id = tasks.activate(TaskKind::CleanFloor);
        let mop = tasks.task(id).unwrap().subtasks()[0].id;
        let spill = tasks.task(id).unwrap().subtasks()[1].id;

        assert!(tasks.grab_item(mop));
        assert!(!tasks.grab_item(mop));
        step(&mut fx, &mut tasks, 0.1);
        assert!(completed.is_empty());
        assert_eq!(tasks.task(id).unwrap().completed_count(), 1);

        assert!(tasks.begin_interaction(spill));
        for _ in 0..5 {
            step(&mut fx, &mut tasks, 1.0);
        }
        assert_eq!(completed.drain(), vec![Event::TaskCompleted { task: id }]);
        assert!(tasks.task(id).unwrap().is_complete());

        // Still listed during the grace period, then retired
        assert_eq!(tasks.active_tasks().count(), 1);
        for _ in 0..4 {
            step(&mut fx, &mut tasks, 1.0);
        }
        assert!(completed.is_empty());
        assert_eq!(retired.drain(), vec![Event::TaskRetired { task: id }]);
        assert!(tasks.task(id).is_none());
    }

    #[test]
    fn test_early_release_resets_hold() {
        let mut fx = Fixture::new();
        quiet(&mut fx);
        let mut tasks = TaskCoordinator::new(fx.bus.clone(), SimRng::seeded(2));
        let id = tasks.activate(TaskKind::FixFuseBox);
        let panel = tasks.task(id).unwrap().subtasks()[0].id;

        tasks.begin_interaction(panel);
        step(&mut fx, &mut tasks, 1.0);
        assert!(tasks.end_interaction(panel));
        match &tasks.task(id).unwrap().subtasks()[0].condition {
            Condition::Hold { held, holding, .. } => {
                assert_eq!(*held, 0.0);
                assert!(!holding);
            }
            other => panic!("unexpected condition {other:?}"),
        }

        tasks.begin_interaction(panel);
        step(&mut fx, &mut tasks, 1.0);
        step(&mut fx, &mut tasks, 1.0);
        assert!(tasks.task(id).unwrap().subtasks()[0].is_done());
        // Grab subtasks are not holds
        let fuse = tasks.task(id).unwrap().subtasks()[1].id;
        assert!(!tasks.begin_interaction(fuse));
    }

    #[test]
    fn test_scheduler_activates_each_catalog_task_once() {
        let mut fx = Fixture::new();
        fx.config.set_float(1, keys::TASK_INTERVAL, 1.0);
        fx.config.set_float(1, keys::TASK_FUSE_BOX, 0.0);
        fx.config.set_float(1, keys::TASK_CLEAN_FLOOR, 0.0);
        let mut tasks = TaskCoordinator::new(fx.bus.clone(), SimRng::seeded(3));
        let activated = Mailbox::new();
        activated.subscribe(&fx.bus, Topic::TaskActivated, fx.bus.register_listener());

        for _ in 0..10 {
            step(&mut fx, &mut tasks, 0.5);
        }
        let names: Vec<String> = activated
            .drain()
            .into_iter()
            .filter_map(|e| match e {
                Event::TaskActivated { name, .. } => Some(name),
                _ => None,
            })
            .collect();
        // All-zero weights fall back to the last candidate, then the other one
        assert_eq!(names, vec!["CleanFloor".to_string(), "FixFuseBox".to_string()]);
        assert_eq!(tasks.active_tasks().count(), 2);
    }

    #[test]
    fn test_restock_flow() {
        let mut fx = Fixture::new();
        quiet(&mut fx);
        let mut tasks = TaskCoordinator::new(fx.bus.clone(), SimRng::seeded(4));
        let product = ProductType(1);
        let shelf = fx.stock.shelves().find(|s| s.product == product).unwrap().id;

        let taken = std::iter::from_fn(|| fx.stock.take_one(product)).count() as u32;
        assert!(taken > 0);
        step(&mut fx, &mut tasks, 0.1);
        assert_eq!(tasks.active_tasks().count(), 0);

        step(&mut fx, &mut tasks, RESTOCK_DELAY);
        let id = tasks.active_tasks().next().map(|t| t.id).unwrap();
        assert_eq!(tasks.task(id).unwrap().kind, TaskKind::Restock { shelf });
        assert!(fx.stock.shelf(shelf).unwrap().placeholders_active());

        for _ in 0..taken {
            assert!(fx.stock.place_item(shelf));
            step(&mut fx, &mut tasks, 0.1);
        }
        assert!(tasks.task(id).unwrap().is_complete());
        assert!(!fx.stock.shelf(shelf).unwrap().placeholders_active());
        assert_eq!(fx.stock.missing(shelf), 0);
    }
}
