use thiserror::Error;

use crate::types::internal::permission::RequestStatus;

#[derive(Error, Debug)]
pub enum PermissionRequestError {
    #[error("Permission request not found: {0}")]
    NotFound(String),

    #[error("Permission request {id} was already reviewed ({status:?})")]
    AlreadyReviewed { id: String, status: RequestStatus },

    #[error("Target user not found: {0}")]
    TargetUserNotFound(String),
}
