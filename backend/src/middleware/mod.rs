//! HTTP middleware for the Repair Shop Management backend

pub mod auth;

pub use auth::{auth_middleware, AuthUser, CurrentUser};
