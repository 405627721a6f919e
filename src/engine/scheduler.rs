use crate::conditions::{Condition, ConditionSubject, ConditionType};
use crate::config::EngineConfig;
use crate::engine::context::{ExecutionContext, SchedulerCommand, Services};
use crate::engine::error::EngineError;
use crate::engine::event::{Event, EventBody, EventId, PartitionKey};
use crate::engine::expedite::{ExpediteRegistry, ExpediteRule};
use crate::engine::outcome::{EventReport, Outcome};
use crate::entities::creature::CreatureId;
use crate::operations::OperationType;
use crate::telemetry::logging;
use crate::world::state::World;
use crate::world::time::{Clock, GameTick};
use std::any::Any;
use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Heap slot for a queued event. Only the slot whose `(due, sequence)`
/// matches the event's pending state is live; older slots are skipped.
#[derive(Debug, Clone, Copy)]
struct SchedulerEntry {
    due: GameTick,
    sequence: u64,
    event: EventId,
}

/// Min-heap by due time, then by sequence (first scheduled first).
impl Ord for SchedulerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for SchedulerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SchedulerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.sequence == other.sequence
    }
}

impl Eq for SchedulerEntry {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingState {
    Queued { due: GameTick, sequence: u64 },
    /// Waiting on an expedite rule; not in the heap.
    Parked { since: GameTick },
}

#[derive(Debug)]
struct Pending {
    event: Event,
    state: PendingState,
}

/// Work handed over from other threads.
#[derive(Debug)]
pub enum ScheduleRequest {
    Schedule { event: Event, delay: Duration },
    CancelAllFor(PartitionKey),
}

/// Cloneable sender side of the scheduler inbox. Requests are picked up at
/// the start of the next step.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    sender: Sender<ScheduleRequest>,
}

impl SchedulerHandle {
    pub fn schedule(&self, event: Event, delay: Duration) -> Result<EventId, EngineError> {
        let id = event.id();
        self.sender
            .send(ScheduleRequest::Schedule { event, delay })
            .map_err(|_| EngineError::Disconnected)?;
        Ok(id)
    }

    pub fn cancel_all_for(
        &self,
        requestor: CreatureId,
        operation_type: OperationType,
    ) -> Result<(), EngineError> {
        self.sender
            .send(ScheduleRequest::CancelAllFor(PartitionKey::new(
                requestor,
                operation_type,
            )))
            .map_err(|_| EngineError::Disconnected)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StepReport {
    pub now: GameTick,
    pub executed: usize,
    pub faulted: usize,
    /// Stale or cancelled heap slots thrown away.
    pub skipped: usize,
    pub deferred: usize,
    pub expedited: usize,
    pub expired_rules: usize,
    pub reports: Vec<EventReport>,
}

/// Time-ordered queue of events and the loop that runs them. The only
/// place world state is mutated from.
pub struct Scheduler {
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    heap: BinaryHeap<SchedulerEntry>,
    pending: HashMap<EventId, Pending>,
    partitions: HashMap<PartitionKey, BTreeSet<EventId>>,
    conditions: HashMap<(ConditionType, ConditionSubject), EventId>,
    expedite: ExpediteRegistry,
    next_sequence: u64,
    inbox: Receiver<ScheduleRequest>,
    sender: Sender<ScheduleRequest>,
}

impl Scheduler {
    pub fn new(clock: Arc<dyn Clock>, config: EngineConfig) -> Self {
        let (sender, inbox) = mpsc::channel();
        Self {
            clock,
            config,
            heap: BinaryHeap::new(),
            pending: HashMap::new(),
            partitions: HashMap::new(),
            conditions: HashMap::new(),
            expedite: ExpediteRegistry::new(),
            next_sequence: 0,
            inbox,
            sender,
        }
    }

    pub fn current_time(&self) -> GameTick {
        self.clock.now()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            sender: self.sender.clone(),
        }
    }

    /// Events queued or parked.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn contains(&self, id: EventId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn is_parked(&self, id: EventId) -> bool {
        matches!(
            self.pending.get(&id).map(|pending| pending.state),
            Some(PendingState::Parked { .. })
        )
    }

    pub fn due_time(&self, id: EventId) -> Option<GameTick> {
        match self.pending.get(&id)?.state {
            PendingState::Queued { due, .. } => Some(due),
            PendingState::Parked { .. } => None,
        }
    }

    pub fn expedite_rules(&self) -> &[ExpediteRule] {
        self.expedite.rules()
    }

    /// The tracked condition for this type and subject, if any.
    pub fn condition(&self, condition_type: ConditionType, subject: ConditionSubject) -> Option<&Condition> {
        let id = self.conditions.get(&(condition_type, subject))?;
        self.pending.get(id)?.event.as_condition()
    }

    /// Due time of the earliest live entry. Drops stale slots on the way.
    pub fn next_due(&mut self) -> Option<GameTick> {
        loop {
            let entry = *self.heap.peek()?;
            if self.is_live(&entry) {
                return Some(entry.due);
            }
            self.heap.pop();
        }
    }

    pub fn schedule(&mut self, event: Event, delay: Duration) -> EventId {
        let now = self.current_time();
        self.schedule_at(event, now, now.after(delay))
    }

    pub fn cancel_all_for(&mut self, requestor: CreatureId, operation_type: OperationType) -> usize {
        self.cancel_key(PartitionKey::new(requestor, operation_type))
    }

    pub fn cancel(&mut self, id: EventId) -> bool {
        let Some(pending) = self.pending.get_mut(&id) else {
            return false;
        };
        if !pending.event.cancel() {
            return false;
        }
        self.discard(id);
        true
    }

    /// Folds the condition into the tracked one with the same key, or
    /// starts tracking it at its end time.
    pub fn raise_condition(&mut self, condition: Condition) -> EventId {
        let now = self.current_time();
        self.raise_condition_at(condition, now)
    }

    /// Runs everything due at the current time, in `(due, sequence)` order.
    pub fn step(&mut self, world: &mut World, services: &mut Services) -> StepReport {
        let now = self.current_time();
        let mut report = StepReport {
            now,
            ..StepReport::default()
        };
        self.drain_inbox(now);
        report.expired_rules = self.sweep_expedite_rules(now);

        let budget = self.config.max_events_per_step.max(1);
        while report.executed + report.faulted < budget {
            let Some(id) = self.pop_ready(now, &mut report.skipped) else {
                break;
            };
            let Some(pending) = self.pending.remove(&id) else {
                continue;
            };
            if pending.event.is_cancelled() {
                self.untrack(id, &pending.event);
                report.skipped += 1;
                continue;
            }
            self.run(pending.event, now, world, services, &mut report);
        }
        report
    }

    fn run(
        &mut self,
        mut event: Event,
        now: GameTick,
        world: &mut World,
        services: &mut Services,
        report: &mut StepReport,
    ) {
        let id = event.id();
        let requestor = event.requestor();
        let tag = event.tag();
        let started = Instant::now();
        let mut ctx = ExecutionContext::new(
            world,
            services.pathfinder.as_mut(),
            services.rng.as_mut(),
            &self.config,
            now,
        );
        let result = panic::catch_unwind(AssertUnwindSafe(|| event.execute(&mut ctx)));
        let effects = ctx.finish();
        let elapsed = started.elapsed();

        let outcome = match result {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => Outcome::Faulted(err.to_string()),
            Err(payload) => Outcome::Faulted(panic_message(payload)),
        };

        if let Outcome::Faulted(reason) = &outcome {
            logging::log_error(&format!(
                "{} {} of creature {} dropped: {}",
                tag, id, requestor.0, reason
            ));
            report.faulted += 1;
            self.untrack(id, &event);
            let entry = EventReport {
                event_id: id,
                requestor,
                tag,
                outcome,
                executed_at: now,
                rescheduled_at: None,
            };
            event.notify_completion(&entry);
            report.reports.push(entry);
            return;
        }

        report.executed += 1;
        if !event.header.exclude_from_telemetry && elapsed >= self.config.lag_threshold() {
            logging::log_lag(&format!(
                "{} {} of creature {} took {} ms",
                tag,
                id,
                requestor.0,
                elapsed.as_millis()
            ));
        }

        let repeat = event
            .header
            .repeat_after
            .filter(|delay| !delay.is_zero())
            .filter(|_| !matches!(outcome, Outcome::Deferred(_)));
        let entry = EventReport {
            event_id: id,
            requestor,
            tag,
            outcome: outcome.clone(),
            executed_at: now,
            rescheduled_at: repeat.map(|delay| now.after(delay)),
        };
        event.notify_completion(&entry);
        report.reports.push(entry);

        match (outcome, event.partition_key()) {
            (Outcome::Deferred(trigger), Some(key)) => {
                self.expedite.register(ExpediteRule {
                    key,
                    waiting: id,
                    trigger,
                    expires_at: now.after(self.config.expedite_timeout()),
                });
                self.park(event, now);
                report.deferred += 1;
            }
            _ => match repeat {
                Some(delay) => self.enqueue(event, now.after(delay)),
                None => self.untrack(id, &event),
            },
        }

        for notification in effects.notifications {
            services.notifications.dispatch(notification);
        }
        for command in effects.commands {
            self.apply(command, now);
        }
        for woken in self.expedite.take_satisfied(&effects.facts) {
            if self.unpark(woken, now) {
                report.expedited += 1;
            }
        }
    }

    fn apply(&mut self, command: SchedulerCommand, now: GameTick) {
        match command {
            SchedulerCommand::Schedule { event, delay } => {
                self.schedule_at(event, now, now.after(delay));
            }
            SchedulerCommand::CancelAllFor(key) => {
                self.cancel_key(key);
            }
            SchedulerCommand::RaiseCondition(condition) => {
                self.raise_condition_at(condition, now);
            }
        }
    }

    fn drain_inbox(&mut self, now: GameTick) {
        while let Ok(request) = self.inbox.try_recv() {
            match request {
                ScheduleRequest::Schedule { event, delay } => {
                    self.schedule_at(event, now, now.after(delay));
                }
                ScheduleRequest::CancelAllFor(key) => {
                    self.cancel_key(key);
                }
            }
        }
    }

    /// Conditions always go through tracking so a key never has two.
    fn schedule_at(&mut self, event: Event, now: GameTick, due: GameTick) -> EventId {
        if let Some(condition) = event.as_condition() {
            if let Some(&tracked) = self.conditions.get(&condition.key()) {
                if self.pending.contains_key(&tracked) {
                    if let Some(condition) = into_condition(event) {
                        return self.raise_condition_at(condition, now);
                    }
                    return tracked;
                }
            }
        }
        let id = event.id();
        self.enqueue(event, due);
        id
    }

    fn raise_condition_at(&mut self, condition: Condition, now: GameTick) -> EventId {
        if let Some(&id) = self.conditions.get(&condition.key()) {
            if let Some(tracked) = self
                .pending
                .get_mut(&id)
                .and_then(|pending| pending.event.as_condition_mut())
            {
                tracked.aggregate_with(condition);
                let due = tracked.end_time.max(now);
                self.requeue(id, due);
                return id;
            }
        }
        let due = condition.end_time.max(now);
        let event = Event::condition(condition);
        let id = event.id();
        self.enqueue(event, due);
        id
    }

    fn next_sequence(&mut self) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }

    fn enqueue(&mut self, event: Event, due: GameTick) {
        let id = event.id();
        let sequence = self.next_sequence();
        if let Some(key) = event.partition_key() {
            self.partitions.entry(key).or_default().insert(id);
        }
        if let Some(condition) = event.as_condition() {
            self.conditions.insert(condition.key(), id);
        }
        self.heap.push(SchedulerEntry {
            due,
            sequence,
            event: id,
        });
        self.pending.insert(
            id,
            Pending {
                event,
                state: PendingState::Queued { due, sequence },
            },
        );
    }

    /// Moves a queued event to a new due time with a fresh sequence.
    fn requeue(&mut self, id: EventId, due: GameTick) {
        let sequence = self.next_sequence();
        let Some(pending) = self.pending.get_mut(&id) else {
            return;
        };
        match pending.state {
            PendingState::Queued { due: current, .. } if current == due => return,
            PendingState::Queued { .. } => {
                pending.state = PendingState::Queued { due, sequence };
            }
            PendingState::Parked { .. } => return,
        }
        self.heap.push(SchedulerEntry {
            due,
            sequence,
            event: id,
        });
    }

    fn park(&mut self, event: Event, now: GameTick) {
        let id = event.id();
        if let Some(key) = event.partition_key() {
            self.partitions.entry(key).or_default().insert(id);
        }
        self.pending.insert(
            id,
            Pending {
                event,
                state: PendingState::Parked { since: now },
            },
        );
    }

    fn unpark(&mut self, id: EventId, now: GameTick) -> bool {
        let sequence = self.next_sequence();
        let Some(pending) = self.pending.get_mut(&id) else {
            return false;
        };
        if !matches!(pending.state, PendingState::Parked { .. }) {
            return false;
        }
        pending.state = PendingState::Queued { due: now, sequence };
        self.heap.push(SchedulerEntry {
            due: now,
            sequence,
            event: id,
        });
        true
    }

    fn cancel_key(&mut self, key: PartitionKey) -> usize {
        let Some(ids) = self.partitions.get(&key).cloned() else {
            return 0;
        };
        let mut cancelled = 0;
        for id in ids {
            let Some(pending) = self.pending.get_mut(&id) else {
                continue;
            };
            if pending.event.cancel() {
                self.discard(id);
                cancelled += 1;
            }
        }
        cancelled
    }

    /// Forgets a pending event; its heap slot goes stale.
    fn discard(&mut self, id: EventId) {
        if let Some(pending) = self.pending.remove(&id) {
            self.expedite.remove_event(id);
            self.untrack(id, &pending.event);
        }
    }

    fn untrack(&mut self, id: EventId, event: &Event) {
        if let Some(key) = event.partition_key() {
            if let Some(ids) = self.partitions.get_mut(&key) {
                ids.remove(&id);
                if ids.is_empty() {
                    self.partitions.remove(&key);
                }
            }
        }
        if let Some(condition) = event.as_condition() {
            let key = condition.key();
            if self.conditions.get(&key) == Some(&id) {
                self.conditions.remove(&key);
            }
        }
    }

    fn sweep_expedite_rules(&mut self, now: GameTick) -> usize {
        let expired = self.expedite.expire(now);
        for rule in &expired {
            let since = match self.pending.get(&rule.waiting).map(|pending| pending.state) {
                Some(PendingState::Parked { since }) => since,
                _ => continue,
            };
            if let Some(pending) = self.pending.remove(&rule.waiting) {
                self.untrack(rule.waiting, &pending.event);
            }
            logging::log_game(&format!(
                "{:?} {} of creature {} gave up waiting after {} ms",
                rule.key.operation_type,
                rule.waiting,
                rule.key.requestor.0,
                since.until(now).as_millis()
            ));
        }
        expired.len()
    }

    fn is_live(&self, entry: &SchedulerEntry) -> bool {
        matches!(
            self.pending.get(&entry.event).map(|pending| pending.state),
            Some(PendingState::Queued { due, sequence })
                if due == entry.due && sequence == entry.sequence
        )
    }

    fn pop_ready(&mut self, now: GameTick, skipped: &mut usize) -> Option<EventId> {
        loop {
            let entry = *self.heap.peek()?;
            if !self.is_live(&entry) {
                self.heap.pop();
                *skipped += 1;
                continue;
            }
            if entry.due > now {
                return None;
            }
            self.heap.pop();
            return Some(entry.event);
        }
    }
}

fn into_condition(event: Event) -> Option<Condition> {
    match event.body {
        EventBody::Condition(condition) => Some(condition),
        EventBody::Operation(_) => None,
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "panic without message".to_string()
    }
}
