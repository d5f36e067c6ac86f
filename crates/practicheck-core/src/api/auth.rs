//! Auth service endpoints.
//!
//! Role logins live on the auth service under `/auth/<role>/login`; company
//! administrators authenticate against the dashboard service's `/auth/login`.

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{ApiClient, ApiError};
use crate::models::{EmailCheck, LoginCredentials, LoginResponse, UniversityInfo, User};

/// Minimum password length accepted by the registration endpoints
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// What a login endpoint answered with.
#[derive(Debug, Clone)]
pub enum LoginResult {
    Authenticated(LoginResponse),
    /// First lecturer login; a new password must be set before a token is issued
    PasswordChangeRequired,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentRegistration {
    pub email: String,
    pub university_id: String,
    pub faculty_id: String,
    pub course_id: String,
    pub student_id: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PasswordChange {
    pub staff_id: String,
    pub current_password: String,
    pub new_password: String,
    pub university_id: String,
}

#[derive(Clone)]
pub struct AuthApi {
    auth: ApiClient,
    admin: ApiClient,
}

impl AuthApi {
    /// `auth` points at the auth service, `admin` at the dashboard service.
    pub fn new(auth: ApiClient, admin: ApiClient) -> Self {
        Self { auth, admin }
    }

    fn login_target(&self, creds: &LoginCredentials) -> (&ApiClient, String) {
        match creds.role.slug() {
            Some(slug) => (&self.auth, format!("/auth/{}/login", slug)),
            None => (&self.admin, "/auth/login".to_string()),
        }
    }

    pub async fn login(&self, creds: &LoginCredentials) -> Result<LoginResult, ApiError> {
        let (client, path) = self.login_target(creds);
        debug!(role = %creds.role, path = %path, "Sending login request");

        let body = serde_json::to_value(creds).map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        let value = client.request(&path, super::RequestOptions::post(body)).await?;

        if value
            .get("requiresPasswordChange")
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            info!(role = %creds.role, "Login requires a password change");
            return Ok(LoginResult::PasswordChangeRequired);
        }

        let response: LoginResponse =
            serde_json::from_value(value).map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        Ok(LoginResult::Authenticated(response))
    }

    pub async fn check_email(&self, email: &str) -> Result<EmailCheck, ApiError> {
        if email.trim().is_empty() {
            return Err(ApiError::InvalidRequest("Email is required".to_string()));
        }
        self.auth
            .post("/auth/student/check-email", &json!({ "email": email.trim() }))
            .await
    }

    pub async fn universities(&self) -> Result<Vec<UniversityInfo>, ApiError> {
        self.auth.get("/universities").await
    }

    pub async fn faculties(&self, university_id: &str) -> Result<Value, ApiError> {
        self.auth
            .get(&format!("/universities/{}/faculties", university_id))
            .await
    }

    pub async fn courses(&self, faculty_id: &str) -> Result<Value, ApiError> {
        self.auth.get(&format!("/faculties/{}/courses", faculty_id)).await
    }

    pub async fn register_student(&self, registration: &StudentRegistration) -> Result<Value, ApiError> {
        check_password_length(&registration.password)?;
        self.auth.post("/auth/student/register", registration).await
    }

    pub async fn change_password(&self, change: &PasswordChange) -> Result<Value, ApiError> {
        check_password_length(&change.new_password)?;
        if change.new_password == change.current_password {
            return Err(ApiError::InvalidRequest(
                "New password must differ from the current password".to_string(),
            ));
        }
        self.auth.post("/auth/lecturer/change-password", change).await
    }

    /// Current company-admin user, as the dashboard service sees the token.
    pub async fn me(&self) -> Result<User, ApiError> {
        self.admin.get("/auth/me").await
    }
}

fn check_password_length(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::InvalidRequest(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{MemoryStorage, StorageNamespace, TokenStore};
    use crate::models::Role;
    use crate::test_support::{spawn_routes, spawn_stub, StubResponse};
    use std::sync::Arc;

    fn api(base_url: &str) -> AuthApi {
        let store = TokenStore::new(Arc::new(MemoryStorage::new()), StorageNamespace::Default);
        let client = ApiClient::new(base_url, store, None).unwrap();
        AuthApi::new(client.clone(), client)
    }

    #[tokio::test]
    async fn test_login_uses_role_endpoint() {
        let stub = spawn_routes(vec![(
            "/auth/faculty-admin/login",
            StubResponse::json(
                200,
                json!({"access_token": "t", "token_type": "bearer",
                       "user": {"id": "9", "name": "F", "role": "faculty_admin"}}),
            ),
        )])
        .await;

        let creds = LoginCredentials::email(Role::FacultyAdmin, "f@uni.ac.ke", "pw");
        let result = api(&stub.base_url).login(&creds).await.unwrap();

        match result {
            LoginResult::Authenticated(resp) => {
                assert_eq!(resp.access_token, "t");
                assert_eq!(resp.user.role, Role::FacultyAdmin);
            }
            other => panic!("unexpected {:?}", other),
        }
        let seen = stub.last_request().unwrap();
        assert_eq!(seen.body, json!({"email": "f@uni.ac.ke", "password": "pw"}));
    }

    #[tokio::test]
    async fn test_company_admin_login_path() {
        let stub = spawn_routes(vec![(
            "/auth/login",
            StubResponse::json(
                200,
                json!({"access_token": "a", "user": {"id": "1", "name": "Root", "role": "super_admin"}}),
            ),
        )])
        .await;

        let creds = LoginCredentials::email(Role::company_admin(), "root@practicheck.com", "pw");
        let result = api(&stub.base_url).login(&creds).await.unwrap();
        assert!(matches!(result, LoginResult::Authenticated(_)));
        assert_eq!(stub.last_request().unwrap().path, "/auth/login");
    }

    #[tokio::test]
    async fn test_lecturer_password_change_required() {
        let stub = spawn_routes(vec![(
            "/auth/lecturer/login",
            StubResponse::json(200, json!({"requiresPasswordChange": true})),
        )])
        .await;

        let creds = LoginCredentials::lecturer("L7", Some("u1".into()), "temp-pass");
        let result = api(&stub.base_url).login(&creds).await.unwrap();
        assert!(matches!(result, LoginResult::PasswordChangeRequired));
    }

    #[tokio::test]
    async fn test_check_email() {
        let stub = spawn_routes(vec![(
            "/auth/student/check-email",
            StubResponse::json(200, json!({"exists": true, "hasPassword": false, "message": "sent"})),
        )])
        .await;

        let check = api(&stub.base_url).check_email(" jo@uni.ac.ke ").await.unwrap();
        assert!(check.exists);
        assert!(!check.has_password);
        assert_eq!(stub.last_request().unwrap().body, json!({"email": "jo@uni.ac.ke"}));
    }

    #[tokio::test]
    async fn test_short_password_rejected_before_request() {
        let stub = spawn_routes(vec![]).await;
        let change = PasswordChange {
            staff_id: "L7".into(),
            current_password: "temp-pass".into(),
            new_password: "short".into(),
            university_id: "u1".into(),
        };

        let err = api(&stub.base_url).change_password(&change).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid request: Password must be at least 8 characters long"
        );
        assert!(stub.requests().is_empty());
    }

    #[tokio::test]
    async fn test_registration_lookups() {
        let stub = spawn_routes(vec![
            (
                "/universities",
                StubResponse::json(
                    200,
                    json!([{"id": "u1", "name": "Moi University", "location": "Eldoret"}]),
                ),
            ),
            ("/universities/u1/faculties", StubResponse::json(200, json!([{"id": "f1"}]))),
            ("/faculties/f1/courses", StubResponse::json(200, json!([{"id": "c1"}]))),
        ])
        .await;
        let api = api(&stub.base_url);

        let universities = api.universities().await.unwrap();
        assert_eq!(universities.len(), 1);
        assert_eq!(universities[0].name, "Moi University");
        assert_eq!(universities[0].location.as_deref(), Some("Eldoret"));

        assert_eq!(api.faculties("u1").await.unwrap()[0]["id"], "f1");
        assert_eq!(api.courses("f1").await.unwrap()[0]["id"], "c1");

        let paths: Vec<String> = stub.requests().into_iter().map(|r| r.path).collect();
        assert_eq!(paths, ["/universities", "/universities/u1/faculties", "/faculties/f1/courses"]);
        assert!(stub.requests().iter().all(|r| r.method == "GET"));
    }

    #[tokio::test]
    async fn test_register_student_posts_form() {
        let stub = spawn_stub(StubResponse::json(201, json!({"message": "Registered"}))).await;
        let registration = StudentRegistration {
            email: "jo@uni.ac.ke".into(),
            university_id: "u1".into(),
            faculty_id: "f1".into(),
            course_id: "c1".into(),
            student_id: "S100".into(),
            password: "long-enough".into(),
        };

        api(&stub.base_url).register_student(&registration).await.unwrap();

        let seen = stub.last_request().unwrap();
        assert_eq!(seen.method, "POST");
        assert_eq!(seen.path, "/auth/student/register");
        assert_eq!(
            seen.body,
            json!({"email": "jo@uni.ac.ke", "university_id": "u1", "faculty_id": "f1",
                   "course_id": "c1", "student_id": "S100", "password": "long-enough"})
        );
    }

    #[tokio::test]
    async fn test_change_password_posts_to_lecturer_endpoint() {
        let stub = spawn_routes(vec![(
            "/auth/lecturer/change-password",
            StubResponse::json(200, json!({"message": "Password updated successfully"})),
        )])
        .await;
        let change = PasswordChange {
            staff_id: "L7".into(),
            current_password: "temp-pass".into(),
            new_password: "permanent-pass".into(),
            university_id: "u1".into(),
        };

        let answer = api(&stub.base_url).change_password(&change).await.unwrap();
        assert_eq!(answer["message"], "Password updated successfully");

        let seen = stub.last_request().unwrap();
        assert_eq!(seen.method, "POST");
        assert_eq!(
            seen.body,
            json!({"staff_id": "L7", "current_password": "temp-pass",
                   "new_password": "permanent-pass", "university_id": "u1"})
        );
    }

    #[tokio::test]
    async fn test_change_password_rejects_same_password() {
        let stub = spawn_routes(vec![]).await;
        let change = PasswordChange {
            staff_id: "L7".into(),
            current_password: "same-password".into(),
            new_password: "same-password".into(),
            university_id: "u1".into(),
        };

        assert!(api(&stub.base_url).change_password(&change).await.is_err());
        assert!(stub.requests().is_empty());
    }
}
