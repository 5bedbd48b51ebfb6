//! Local-first authentication: password hashing, credential checks and the
//! explicit session context permission checks consume.

pub mod context;
pub mod service;

pub use context::AuthContext;
pub use service::AuthService;
