//! Navigation targets the auth context can send the user to.

use std::fmt;

use super::Role;

/// Where the user is in the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Public landing page, the destination after any logout
    Landing,
    RoleSelection,
    Login(Role),
    Dashboard(Role),
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Route::Landing => "/".to_string(),
            Route::RoleSelection => "/auth/role-selection".to_string(),
            Route::Login(role) => match role.slug() {
                Some(slug) => format!("/auth/{}/login", slug),
                None => "/auth/login".to_string(),
            },
            Route::Dashboard(role) => match role.slug() {
                Some(slug) => format!("/{}/dashboard", slug),
                None => "/dashboard".to_string(),
            },
        }
    }

    /// Routes that need no session
    pub fn is_public(&self) -> bool {
        !matches!(self, Route::Dashboard(_))
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}
