//! Login form payloads.

use serde::Serialize;

use super::Role;

/// Credentials for one login attempt.
///
/// Students sign in with a student ID and university, lecturers with a staff
/// ID, everyone else with an email. The serialized form is the JSON body the
/// auth service expects; `role` only selects the endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoginCredentials {
    #[serde(skip)]
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staff_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub university_id: Option<String>,
    pub password: String,
}

impl LoginCredentials {
    pub fn email(role: Role, email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            role,
            email: Some(email.into()),
            student_id: None,
            staff_id: None,
            university_id: None,
            password: password.into(),
        }
    }

    pub fn student(
        student_id: impl Into<String>,
        university_id: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            role: Role::Student,
            email: None,
            student_id: Some(student_id.into()),
            staff_id: None,
            university_id: Some(university_id.into()),
            password: password.into(),
        }
    }

    pub fn lecturer(
        staff_id: impl Into<String>,
        university_id: Option<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            role: Role::Lecturer,
            email: None,
            student_id: None,
            staff_id: Some(staff_id.into()),
            university_id,
            password: password.into(),
        }
    }

    /// Client-side form checks, run before any request is sent.
    pub fn validate(&self) -> Result<(), String> {
        let present = |v: &Option<String>| v.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false);

        if let Some(ref email) = self.email {
            if email.trim().is_empty() {
                return Err("Email is required".to_string());
            }
            if !is_plausible_email(email) {
                return Err("Please enter a valid email address".to_string());
            }
        } else if self.student_id.is_some() {
            if !present(&self.student_id) || !present(&self.university_id) {
                return Err("Student ID and University selection are required".to_string());
            }
        } else if self.staff_id.is_some() {
            if !present(&self.staff_id) {
                return Err("Staff ID is required".to_string());
            }
        } else {
            return Err("Email is required".to_string());
        }

        if self.password.is_empty() {
            return Err("Password is required".to_string());
        }
        Ok(())
    }
}

/// Minimal shape check: one `@` with text on both sides and a dot in the domain.
fn is_plausible_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}
