//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`ClimateError`] via `#[from]` (or an explicit `From` impl for boxed
//! adapter errors).

use std::error::Error as StdError;

use crate::id::{BindingId, SlotId};

/// Boxed error coming from an adapter (device transport, calendar, storage).
pub type BoxedError = Box<dyn StdError + Send + Sync>;

/// Top-level error for every fallible operation in climacal.
#[derive(Debug, thiserror::Error)]
pub enum ClimateError {
    /// A value violated a domain invariant.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// A referenced record does not exist.
    #[error("not found")]
    NotFound(#[from] NotFoundError),

    /// A binding or slot is unusable for the current cycle.
    #[error("configuration error")]
    Configuration(#[from] ConfigurationError),

    /// A device call failed. Recoverable: the executor retries it.
    #[error("device transport error")]
    Transport(#[source] BoxedError),

    /// The calendar source could not be queried. Fatal for the whole cycle.
    #[error("event source unavailable")]
    EventSource(#[source] BoxedError),

    /// Persistence of operator state failed.
    #[error("storage error")]
    Storage(#[source] BoxedError),
}

/// Domain invariant violations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{kind} must not be empty")]
    EmptyIdentifier { kind: &'static str },

    #[error("label must not be empty")]
    EmptyLabel,

    #[error("match value must not be empty")]
    EmptyMatchValue,

    #[error("unsupported match type `{0}`")]
    UnsupportedMatchType(String),

    #[error("invalid regex pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("payload must set at least one field")]
    EmptyPayload,

    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("temperature and target_temp_low/target_temp_high are mutually exclusive")]
    ConflictingTemperatureFields,

    #[error("target_temp_low and target_temp_high must be set together with low <= high")]
    InvalidTemperatureRange,

    #[error("force_slot requires a target slot")]
    MissingForceTarget,

    #[error("unknown flag type `{0}`")]
    UnknownFlagKind(String),

    #[error("duplicate {kind} id `{id}`")]
    DuplicateId { kind: &'static str, id: String },

    #[error("binding `{binding_id}` references unknown slot `{slot_id}`")]
    UnknownSlotReference { binding_id: BindingId, slot_id: SlotId },

    #[error("slot `{slot_id}` is still referenced by binding `{binding_id}`")]
    SlotInUse { slot_id: SlotId, binding_id: BindingId },

    #[error("{kind} id `{body}` does not match `{path}`")]
    IdMismatch {
        kind: &'static str,
        path: String,
        body: String,
    },
}

/// A record that was looked up but does not exist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} `{id}` not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// Problems detected while evaluating a cycle. Logged, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("binding `{binding_id}` has an invalid regex `{pattern}`: {reason}")]
    InvalidPattern {
        binding_id: BindingId,
        pattern: String,
        reason: String,
    },

    #[error("binding `{binding_id}` uses unsupported match type `{match_type}`")]
    UnsupportedMatchType {
        binding_id: BindingId,
        match_type: String,
    },

    #[error("binding `{binding_id}` has an unusable match rule: {reason}")]
    InvalidRule { binding_id: BindingId, reason: String },

    #[error("binding `{binding_id}` references missing slot `{slot_id}`")]
    DanglingSlot {
        binding_id: BindingId,
        slot_id: SlotId,
    },

    #[error("forced slot `{slot_id}` does not exist")]
    MissingForcedSlot { slot_id: SlotId },
}
