use service_core::error::AppError;
use thiserror::Error;

use crate::repository::RepositoryError;

#[derive(Error, Debug)]
pub enum RbacError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Role not found")]
    RoleNotFound,

    #[error("Organization not found")]
    OrganizationNotFound,

    #[error("Access denied: '{action}' on '{resource}'")]
    AccessDenied { resource: String, action: String },

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    ExpiredToken,

    #[error("Token not found")]
    TokenNotFound,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("System default roles cannot be modified")]
    SystemRoleModification,

    #[error("Role name already exists")]
    DuplicateRoleName,

    #[error("Invalid permissions: {0}")]
    InvalidPermissions(String),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for RbacError {
    fn from(err: validator::ValidationErrors) -> Self {
        RbacError::InvalidInput(err.to_string())
    }
}

impl From<RbacError> for AppError {
    fn from(err: RbacError) -> Self {
        match err {
            RbacError::InvalidInput(e) => AppError::BadRequest(anyhow::anyhow!(e)),
            RbacError::UserNotFound => AppError::NotFound(anyhow::anyhow!("User not found")),
            RbacError::RoleNotFound => AppError::NotFound(anyhow::anyhow!("Role not found")),
            RbacError::OrganizationNotFound => {
                AppError::NotFound(anyhow::anyhow!("Organization not found"))
            }
            RbacError::AccessDenied { resource, action } => AppError::Forbidden(anyhow::anyhow!(
                "Access denied: '{}' on '{}'",
                action,
                resource
            )),
            RbacError::ExpiredToken => AppError::AuthError(anyhow::anyhow!("Token expired")),
            // Reused, revoked and never-issued tokens share one message.
            RbacError::InvalidToken | RbacError::TokenNotFound | RbacError::InvalidSignature => {
                AppError::AuthError(anyhow::anyhow!("Invalid token"))
            }
            RbacError::SystemRoleModification => AppError::Conflict(anyhow::anyhow!(
                "System default roles cannot be modified"
            )),
            RbacError::DuplicateRoleName => {
                AppError::Conflict(anyhow::anyhow!("Role name already exists"))
            }
            RbacError::InvalidPermissions(e) => {
                AppError::BadRequest(anyhow::anyhow!("Invalid permissions: {}", e))
            }
            RbacError::Repository(e) => AppError::DatabaseError(anyhow::anyhow!(e)),
            RbacError::Internal(e) => AppError::InternalError(e),
        }
    }
}
