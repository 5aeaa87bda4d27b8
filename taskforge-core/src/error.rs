//! Error types for TASKFORGE operations

use crate::{AgentId, TaskId};
use thiserror::Error;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Unknown filter operator: {operator}")]
    UnknownOperator { operator: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Agent coordination errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AgentError {
    #[error("Agent not registered: {agent_id}")]
    NotRegistered { agent_id: AgentId },

    #[error("Agent {agent_id} is busy")]
    AgentBusy { agent_id: AgentId },

    #[error("Task not found: {task_id}")]
    TaskNotFound { task_id: TaskId },

    #[error("Task {task_id} already has an active assignment to {agent_id}")]
    AlreadyAssigned { task_id: TaskId, agent_id: AgentId },

    #[error("Task {task_id} has no active assignment")]
    NoActiveAssignment { task_id: TaskId },
}

/// Master error type for all TASKFORGE errors.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),
}

/// Result type alias for TASKFORGE operations.
pub type EngineResult<T> = Result<T, EngineError>;

// =============================================================================
// TESTS
// =============================================================================
