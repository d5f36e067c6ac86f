//! Dashboard and auth-service response shapes.
//!
//! Most dashboard resources are passed to the UI as opaque JSON. The stats
//! payload is typed because the company dashboard reads individual counters,
//! and the service has shipped it in both camelCase and snake_case.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::User;

/// Successful response from any login endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    pub user: User,
}

/// Answer from `POST /auth/student/check-email`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EmailCheck {
    pub exists: bool,
    #[serde(rename = "hasPassword")]
    pub has_password: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Next step of the two-phase student login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailCheckOutcome {
    /// Account exists with a password: show the login form
    ProceedToLogin,
    /// Account exists but a password setup link was emailed
    SetupLinkSent,
    NoAccount,
}

impl EmailCheck {
    pub fn outcome(&self) -> EmailCheckOutcome {
        match (self.exists, self.has_password) {
            (true, true) => EmailCheckOutcome::ProceedToLogin,
            (true, false) => EmailCheckOutcome::SetupLinkSent,
            (false, _) => EmailCheckOutcome::NoAccount,
        }
    }
}

/// Entry from `GET /universities` on the auth service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniversityInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlyGrowth {
    #[serde(default)]
    pub universities: f64,
    #[serde(default)]
    pub students: f64,
    #[serde(default)]
    pub attachments: f64,
    #[serde(default)]
    pub revenue: f64,
}

/// Company-wide counters from `GET /dashboard/stats`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    #[serde(default, alias = "totalUniversities")]
    pub total_universities: u64,
    #[serde(default, alias = "activeStudents")]
    pub active_students: u64,
    #[serde(default, alias = "activeAttachments")]
    pub active_attachments: u64,
    #[serde(default, alias = "monthlyRevenue")]
    pub monthly_revenue: f64,
    #[serde(default = "full_health", alias = "systemHealth")]
    pub system_health: f64,
    #[serde(default, alias = "monthlyGrowth")]
    pub monthly_growth: MonthlyGrowth,
}

fn full_health() -> f64 {
    100.0
}

impl Default for DashboardStats {
    fn default() -> Self {
        Self {
            total_universities: 0,
            active_students: 0,
            active_attachments: 0,
            monthly_revenue: 0.0,
            system_health: full_health(),
            monthly_growth: MonthlyGrowth::default(),
        }
    }
}

/// Everything the company dashboard loads on open.
#[derive(Debug, Clone, Default)]
pub struct DashboardOverview {
    pub stats: DashboardStats,
    pub universities: Value,
    pub alerts: Value,
    pub metrics: Value,
}

impl DashboardOverview {
    pub fn university_count(&self) -> usize {
        self.universities.as_array().map(Vec::len).unwrap_or(0)
    }

    /// Alerts not yet dismissed
    pub fn open_alerts(&self) -> Vec<&Value> {
        self.alerts
            .as_array()
            .map(|alerts| {
                alerts
                    .iter()
                    .filter(|a| !a.get("is_dismissed").and_then(Value::as_bool).unwrap_or(false))
                    .collect()
            })
            .unwrap_or_default()
    }
}
