//! Client for the hosted payment gateway's order API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info, instrument};
use utoipa::ToSchema;

use crate::config::GatewayCredentials;
use crate::errors::ServiceError;

/// Payment session created by the gateway. The client completes checkout
/// against `id` and later posts the signed result to `/payments/verify`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GatewayOrder {
    #[schema(example = "order_NfL1AbCdEf1234")]
    pub id: String,
    /// Amount in the currency's minor unit
    #[schema(example = 34000)]
    pub amount: i64,
    #[schema(example = "INR")]
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "created")]
    pub status: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens a payment session for `amount_minor` keyed by `receipt`.
    async fn create_order(
        &self,
        amount_minor: i64,
        receipt: &str,
    ) -> Result<GatewayOrder, ServiceError>;
}

#[derive(Serialize)]
struct CreateOrderBody<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

/// Gateway over HTTPS with basic auth (key id / key secret)
#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    credentials: GatewayCredentials,
}

impl std::fmt::Debug for HttpPaymentGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPaymentGateway")
            .field("key_id", &self.credentials.key_id)
            .field("base_url", &self.credentials.base_url)
            .finish()
    }
}

impl HttpPaymentGateway {
    pub fn new(credentials: GatewayCredentials) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| ServiceError::InternalError(format!("gateway client: {}", e)))?;
        Ok(Self {
            client,
            credentials,
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[instrument(skip(self), fields(currency = %self.credentials.currency))]
    async fn create_order(
        &self,
        amount_minor: i64,
        receipt: &str,
    ) -> Result<GatewayOrder, ServiceError> {
        let url = format!("{}/v1/orders", self.credentials.base_url);
        let body = CreateOrderBody {
            amount: amount_minor,
            currency: &self.credentials.currency,
            receipt,
        };

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.credentials.key_id, Some(&self.credentials.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "payment gateway unreachable");
                ServiceError::ExternalServiceError(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), body = %text, "payment gateway rejected order");
            return Err(ServiceError::ExternalServiceError(format!(
                "gateway responded with status {}",
                status.as_u16()
            )));
        }

        let order: GatewayOrder = response.json().await.map_err(|e| {
            ServiceError::ExternalServiceError(format!("malformed gateway response: {}", e))
        })?;

        info!(gateway_order_id = %order.id, "gateway payment session created");
        Ok(order)
    }
}
