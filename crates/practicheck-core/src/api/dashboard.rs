//! Company dashboard and billing endpoints.
//!
//! Apart from the stats counters these resources are handed to the UI as
//! plain JSON; the client does not own their shape.

use serde_json::{json, Value};

use super::{ApiClient, ApiError, RequestOptions};
use crate::models::{DashboardOverview, DashboardStats};

#[derive(Clone)]
pub struct DashboardApi {
    client: ApiClient,
}

impl DashboardApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn stats(&self) -> Result<DashboardStats, ApiError> {
        self.client.get("/dashboard/stats").await
    }

    pub async fn universities(&self) -> Result<Value, ApiError> {
        self.client.get("/dashboard/universities").await
    }

    pub async fn alerts(&self) -> Result<Value, ApiError> {
        self.client.get("/dashboard/alerts").await
    }

    pub async fn dismiss_alert(&self, alert_id: &str) -> Result<Value, ApiError> {
        self.client.delete(&format!("/dashboard/alerts/{}", alert_id)).await
    }

    pub async fn metrics(&self) -> Result<Value, ApiError> {
        self.client.get("/dashboard/metrics").await
    }

    pub async fn create_university(&self, university: &Value) -> Result<Value, ApiError> {
        self.client.post("/dashboard/universities", university).await
    }

    pub async fn set_university_status(&self, university_id: &str, status: &str) -> Result<Value, ApiError> {
        self.client
            .request(
                &format!("/dashboard/universities/{}/status", university_id),
                RequestOptions::put(json!({ "status": status })),
            )
            .await
    }

    /// Stats, universities, alerts and metrics, fetched concurrently.
    /// Fails as a whole if any one of them fails.
    pub async fn overview(&self) -> Result<DashboardOverview, ApiError> {
        let (stats, universities, alerts, metrics) = futures::try_join!(
            self.stats(),
            self.universities(),
            self.alerts(),
            self.metrics()
        )?;
        Ok(DashboardOverview {
            stats,
            universities,
            alerts,
            metrics,
        })
    }

    // ===== Billing =====

    pub async fn billing_universities(&self) -> Result<Value, ApiError> {
        self.client.get("/billing/universities").await
    }

    pub async fn generate_invoice(&self, university_id: &str) -> Result<Value, ApiError> {
        self.client
            .request(
                &format!("/billing/invoice/{}", university_id),
                RequestOptions::post(json!({})),
            )
            .await
    }

    pub async fn send_invoice(&self, university_id: &str) -> Result<Value, ApiError> {
        self.client
            .request(
                &format!("/billing/send-invoice/{}", university_id),
                RequestOptions::post(json!({})),
            )
            .await
    }

    pub async fn bulk_invoices(&self) -> Result<Value, ApiError> {
        self.client
            .request("/billing/bulk-invoices", RequestOptions::post(json!({})))
            .await
    }

    pub async fn send_payment_reminders(&self) -> Result<Value, ApiError> {
        self.client
            .request("/billing/payment-reminders", RequestOptions::post(json!({})))
            .await
    }
}
