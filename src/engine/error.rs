use crate::world::state::WorldError;

/// Failures surfaced by the engine. Precondition misses and transient
/// blocks are not errors; they are ordinary outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Malformed request, rejected before anything is scheduled.
    Validation(String),
    /// Unexpected failure while executing an event.
    Fault(String),
    World(WorldError),
    /// The scheduler side of a handle has gone away.
    Disconnected,
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Validation(msg) => write!(f, "validation failed: {}", msg),
            EngineError::Fault(msg) => write!(f, "internal fault: {}", msg),
            EngineError::World(err) => write!(f, "world: {}", err),
            EngineError::Disconnected => write!(f, "scheduler disconnected"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<WorldError> for EngineError {
    fn from(err: WorldError) -> Self {
        EngineError::World(err)
    }
}
