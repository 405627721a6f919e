use crate::conditions::{Condition, ConditionType};
use crate::engine::context::ExecutionContext;
use crate::engine::error::EngineError;
use crate::engine::outcome::{EventReport, Outcome};
use crate::entities::creature::CreatureId;
use crate::operations::{Operation, OperationType};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

static NEXT_EVENT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(pub u64);

impl EventId {
    pub fn next() -> Self {
        EventId(NEXT_EVENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Bulk-cancellation key: one actor's queued operations of one type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey {
    pub requestor: CreatureId,
    pub operation_type: OperationType,
}

impl PartitionKey {
    pub fn new(requestor: CreatureId, operation_type: OperationType) -> Self {
        Self {
            requestor,
            operation_type,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTag {
    Operation(OperationType),
    Condition(ConditionType),
}

impl std::fmt::Display for EventTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventTag::Operation(kind) => write!(f, "operation {:?}", kind),
            EventTag::Condition(kind) => write!(f, "condition {:?}", kind),
        }
    }
}

pub type CompletionCallback = Box<dyn FnMut(&EventReport) + Send>;

/// Bookkeeping shared by every event kind.
pub struct EventHeader {
    pub id: EventId,
    /// `CreatureId::SYSTEM` for server-raised events.
    pub requestor: CreatureId,
    /// Set during execution to ask for another pass after this long.
    pub repeat_after: Option<Duration>,
    pub cancelled: bool,
    pub can_be_cancelled: bool,
    pub exclude_from_telemetry: bool,
    callbacks: Vec<CompletionCallback>,
}

impl EventHeader {
    fn new(requestor: CreatureId) -> Self {
        Self {
            id: EventId::next(),
            requestor,
            repeat_after: None,
            cancelled: false,
            can_be_cancelled: true,
            exclude_from_telemetry: false,
            callbacks: Vec::new(),
        }
    }
}

impl std::fmt::Debug for EventHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHeader")
            .field("id", &self.id)
            .field("requestor", &self.requestor)
            .field("repeat_after", &self.repeat_after)
            .field("cancelled", &self.cancelled)
            .field("can_be_cancelled", &self.can_be_cancelled)
            .field("exclude_from_telemetry", &self.exclude_from_telemetry)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

#[derive(Debug)]
pub enum EventBody {
    Operation(Operation),
    Condition(Condition),
}

/// A unit of deferred work. The body decides what running it means; the
/// header carries what the scheduler needs to order, cancel and repeat it.
#[derive(Debug)]
pub struct Event {
    pub header: EventHeader,
    pub body: EventBody,
}

impl Event {
    pub fn operation(requestor: CreatureId, operation: Operation) -> Self {
        Self {
            header: EventHeader::new(requestor),
            body: EventBody::Operation(operation),
        }
    }

    pub fn condition(condition: Condition) -> Self {
        Self {
            header: EventHeader::new(CreatureId::SYSTEM),
            body: EventBody::Condition(condition),
        }
    }

    pub fn non_cancellable(mut self) -> Self {
        self.header.can_be_cancelled = false;
        self
    }

    pub fn excluded_from_telemetry(mut self) -> Self {
        self.header.exclude_from_telemetry = true;
        self
    }

    pub fn on_complete(mut self, callback: impl FnMut(&EventReport) + Send + 'static) -> Self {
        self.header.callbacks.push(Box::new(callback));
        self
    }

    pub fn id(&self) -> EventId {
        self.header.id
    }

    pub fn requestor(&self) -> CreatureId {
        self.header.requestor
    }

    pub fn is_cancelled(&self) -> bool {
        self.header.cancelled
    }

    /// Marks the event cancelled unless it opted out. Returns whether it is
    /// cancelled now.
    pub fn cancel(&mut self) -> bool {
        if self.header.can_be_cancelled {
            self.header.cancelled = true;
        }
        self.header.cancelled
    }

    pub fn tag(&self) -> EventTag {
        match &self.body {
            EventBody::Operation(operation) => EventTag::Operation(operation.operation_type()),
            EventBody::Condition(condition) => EventTag::Condition(condition.condition_type()),
        }
    }

    /// Conditions belong to no partition.
    pub fn partition_key(&self) -> Option<PartitionKey> {
        match &self.body {
            EventBody::Operation(operation) => Some(PartitionKey::new(
                self.header.requestor,
                operation.operation_type(),
            )),
            EventBody::Condition(_) => None,
        }
    }

    pub fn as_condition(&self) -> Option<&Condition> {
        match &self.body {
            EventBody::Condition(condition) => Some(condition),
            EventBody::Operation(_) => None,
        }
    }

    pub fn as_condition_mut(&mut self) -> Option<&mut Condition> {
        match &mut self.body {
            EventBody::Condition(condition) => Some(condition),
            EventBody::Operation(_) => None,
        }
    }

    pub fn as_operation(&self) -> Option<&Operation> {
        match &self.body {
            EventBody::Operation(operation) => Some(operation),
            EventBody::Condition(_) => None,
        }
    }

    /// Runs one pass. `repeat_after` is cleared first so only this pass can
    /// ask for a repeat.
    pub fn execute(&mut self, ctx: &mut ExecutionContext<'_>) -> Result<Outcome, EngineError> {
        self.header.repeat_after = None;
        let requestor = self.header.requestor;
        match &mut self.body {
            EventBody::Operation(operation) => {
                operation.execute(requestor, &mut self.header.repeat_after, ctx)
            }
            EventBody::Condition(condition) => condition.execute(&mut self.header.repeat_after, ctx),
        }
    }

    pub(crate) fn notify_completion(&mut self, report: &EventReport) {
        for callback in self.header.callbacks.iter_mut() {
            callback(report);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::Operation;
    use crate::world::position::Direction;

    #[test]
    fn ids_are_unique_and_increasing() {
        let first = Event::operation(CreatureId(1), Operation::turn(Direction::North));
        let second = Event::operation(CreatureId(1), Operation::turn(Direction::North));
        assert!(second.id() > first.id());
    }

    #[test]
    fn operations_carry_partition_keys() {
        let event = Event::operation(CreatureId(4), Operation::walk(Direction::East));
        assert_eq!(
            event.partition_key(),
            Some(PartitionKey::new(CreatureId(4), OperationType::Walk))
        );
        assert_eq!(event.tag(), EventTag::Operation(OperationType::Walk));
    }

    #[test]
    fn non_cancellable_events_ignore_cancel() {
        let mut event =
            Event::operation(CreatureId(4), Operation::walk(Direction::East)).non_cancellable();
        assert!(!event.cancel());
        assert!(!event.is_cancelled());
        let mut event = Event::operation(CreatureId(4), Operation::walk(Direction::East));
        assert!(event.cancel());
    }
}
