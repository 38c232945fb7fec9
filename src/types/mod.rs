// Types layer - All data structures
pub mod db;
pub mod dto;
pub mod internal;

use crate::errors::InternalError;
use internal::action_outcome::ActionOutcome;

/// Result type returned by coordinators: the primary value plus best-effort side effect reports
pub type CoordinatorResult<T> = Result<ActionOutcome<T>, InternalError>;
