use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: i64,
    pub booking_id: i64,
    pub amount: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub status: PaymentStatus,
    /// Reference issued by the external checkout provider, if any.
    #[serde(default)]
    pub provider_ref: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_currency() -> String {
    "USD".to_string()
}

impl Payment {
    pub fn amount_display(&self) -> String {
        format!("{:.2} {}", self.amount, self.currency)
    }
}

/// Response of the payment-session-creation endpoint. The URL is opaque to
/// this layer and only forwarded to the browser for redirection.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub url: String,
}
