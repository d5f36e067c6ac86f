//! Client-side session management for the PractiCheck platform.
//!
//! - `auth`: token persistence
//! - `api`: authenticated request wrapper and endpoint sets
//! - `session`: idle timer and the `AuthContext` that ties it together
//! - `config`: on-disk settings and wiring

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod session;

#[cfg(test)]
mod test_support;

pub use api::ApiError;
pub use config::Config;
pub use session::{AuthContext, AuthError, Session, SessionEvent};
