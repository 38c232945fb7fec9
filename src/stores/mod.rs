// Stores layer - Data access and repository pattern
pub mod audit_store;
pub mod credential_store;
pub mod permission_request_store;

pub use audit_store::AuditStore;
pub use credential_store::{CredentialStore, NewUser, UserUpdate};
pub use permission_request_store::{PermissionRequestFilter, PermissionRequestStore};
