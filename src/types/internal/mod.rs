pub mod action_outcome;
pub mod audit;
pub mod auth;
pub mod context;
pub mod notification;
pub mod permission;
pub mod role;

pub use context::{ContextResult, RequestContext, RequestId, RequestSource};
pub use role::Role;
