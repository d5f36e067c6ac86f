//! REST API client module for the PractiCheck services.
//!
//! `ApiClient` is the request wrapper: it attaches the bearer token from the
//! token store, sends JSON, and turns non-2xx answers into `ApiError`.
//! `AuthApi` and `DashboardApi` are typed endpoint sets on top of it.

pub mod auth;
pub mod client;
pub mod dashboard;
pub mod error;

pub use auth::{AuthApi, LoginResult, PasswordChange, StudentRegistration};
pub use client::{ApiClient, RequestOptions};
pub use dashboard::DashboardApi;
pub use error::ApiError;
