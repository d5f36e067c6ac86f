//! Data models shared by the session manager, API client and UI.
//!
//! - `User`, `Role`: the authenticated identity returned at login
//! - `Route`: navigation targets (landing, login, role dashboards)
//! - `LoginCredentials`: login form payloads
//! - Dashboard/auth-service response shapes

pub mod credentials;
pub mod dashboard;
pub mod route;
pub mod user;

pub use credentials::LoginCredentials;
pub use dashboard::{
    DashboardOverview, DashboardStats, EmailCheck, EmailCheckOutcome, LoginResponse,
    MonthlyGrowth, UniversityInfo,
};
pub use route::Route;
pub use user::{Role, User};
