//! Services layer for rbac-service.
//!
//! Access decisions, role administration and token lifecycle, all written
//! against the repository capability traits.

mod access_control;
mod catalog;
pub mod error;
mod resolver;
mod role_admin;
mod token;

pub use access_control::AccessControlService;
pub use catalog::{Catalog, StaticCatalog};
pub use error::RbacError;
pub use resolver::PermissionResolver;
pub use role_admin::RoleAdminService;
pub use token::{TokenClaims, TokenService, TokenSettings};
