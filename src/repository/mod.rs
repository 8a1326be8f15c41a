//! Database repository layer

pub mod audit_repo;
pub mod role_repo;
pub mod session_repo;
pub mod user_repo;

pub use audit_repo::*;
pub use role_repo::*;
pub use session_repo::*;
pub use user_repo::*;
