pub mod access;
pub mod permission;
pub mod role;
pub mod token;
pub mod user;

pub use access::{AccessRequest, AccessResponse};
pub use permission::{CreatePermissionRequest, MatchKind, Permission, WILDCARD};
pub use role::{CreateRoleRequest, Role, UpdateRoleRequest};
pub use token::{Token, TokenType};
pub use user::User;
