//! Authenticated user and role types.
//!
//! The backend issues a `user` object alongside the access token. Only a few
//! fields are interpreted here; everything else is kept in `extra` so that a
//! stored user serializes back exactly as it arrived.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Platform role attached to every user.
///
/// Unknown role strings are preserved in `Other` rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Student,
    Lecturer,
    Supervisor,
    FacultyAdmin,
    UniversityAdmin,
    /// Company-side administrators (`admin` / `super_admin`)
    CompanyAdmin(String),
    Other(String),
}

impl Role {
    /// Roles offered on the role selection screen, in display order.
    pub const SELECTABLE: [Role; 5] = [
        Role::Student,
        Role::Lecturer,
        Role::Supervisor,
        Role::FacultyAdmin,
        Role::UniversityAdmin,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Role::Student => "student",
            Role::Lecturer => "lecturer",
            Role::Supervisor => "supervisor",
            Role::FacultyAdmin => "faculty_admin",
            Role::UniversityAdmin => "university_admin",
            Role::CompanyAdmin(s) | Role::Other(s) => s,
        }
    }

    /// URL segment used by login endpoints and dashboard routes.
    pub fn slug(&self) -> Option<&'static str> {
        match self {
            Role::Student => Some("student"),
            Role::Lecturer => Some("lecturer"),
            Role::Supervisor => Some("supervisor"),
            Role::FacultyAdmin => Some("faculty-admin"),
            Role::UniversityAdmin => Some("university-admin"),
            Role::CompanyAdmin(_) | Role::Other(_) => None,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Role::Student => "Student",
            Role::Lecturer => "Lecturer",
            Role::Supervisor => "Industry Supervisor",
            Role::FacultyAdmin => "Faculty Admin",
            Role::UniversityAdmin => "University Admin",
            Role::CompanyAdmin(_) => "Company Admin",
            Role::Other(s) => s,
        }
    }

    pub fn company_admin() -> Self {
        Role::CompanyAdmin("admin".to_string())
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        match s.as_str() {
            "student" => Role::Student,
            "lecturer" => Role::Lecturer,
            "supervisor" => Role::Supervisor,
            "faculty_admin" => Role::FacultyAdmin,
            "university_admin" => Role::UniversityAdmin,
            "admin" | "super_admin" => Role::CompanyAdmin(s),
            _ => Role::Other(s),
        }
    }
}

impl From<&str> for Role {
    fn from(s: &str) -> Self {
        Role::from(s.to_string())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `user` blob returned by every login endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Value>,
    /// Tenant and display fields the client passes through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    /// First letter of the name for avatar-style display
    pub fn initial(&self) -> char {
        self.name
            .chars()
            .next()
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or('?')
    }

    pub fn university_name(&self) -> Option<&str> {
        self.extra.get("university_name").and_then(Value::as_str)
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.extra.get("tenant_id").and_then(Value::as_str)
    }
}
