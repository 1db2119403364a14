//! Online payments: opening gateway sessions and verifying the signed
//! callback before an order is marked paid.

use hmac::{Hmac, Mac};
use metrics::counter;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sha2::Sha256;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::GatewayCredentials;
use crate::entities::order::Model as OrderModel;
use crate::errors::{FieldError, ServiceError};
use crate::services::orders::{GatewayPayment, OrderService};
use crate::services::payment_gateway::{GatewayOrder, HttpPaymentGateway, PaymentGateway};

type HmacSha256 = Hmac<Sha256>;

/// Longest receipt the gateway accepts
const MAX_RECEIPT_LEN: usize = 40;

/// Signed payment result posted back by the checkout client
#[derive(Debug, Clone, Default)]
pub struct PaymentConfirmation {
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
    pub signature: String,
    pub order_reference: String,
}

/// Hex HMAC-SHA256 of `"{gateway_order_id}|{gateway_payment_id}"`, as the
/// gateway computes it.
pub fn sign_payment(secret: &str, gateway_order_id: &str, gateway_payment_id: &str) -> String {
    let mac = keyed_mac(secret, gateway_order_id, gateway_payment_id);
    hex::encode(mac.finalize().into_bytes())
}

fn keyed_mac(secret: &str, gateway_order_id: &str, gateway_payment_id: &str) -> HmacSha256 {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC accepts keys of any length"),
    };
    mac.update(gateway_order_id.as_bytes());
    mac.update(b"|");
    mac.update(gateway_payment_id.as_bytes());
    mac
}

/// Constant-time check of a hex signature.
pub fn signature_matches(
    secret: &str,
    gateway_order_id: &str,
    gateway_payment_id: &str,
    signature: &str,
) -> bool {
    let Ok(provided) = hex::decode(signature.trim()) else {
        return false;
    };
    keyed_mac(secret, gateway_order_id, gateway_payment_id)
        .verify_slice(&provided)
        .is_ok()
}

/// Gateway access. Built once at startup; without credentials it is
/// explicitly disabled and every call fails with `GatewayUnavailable`.
#[derive(Clone)]
pub struct PaymentService {
    gateway: Option<Arc<dyn PaymentGateway>>,
    key_secret: Option<String>,
    orders: Arc<OrderService>,
}

impl PaymentService {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        key_secret: impl Into<String>,
        orders: Arc<OrderService>,
    ) -> Self {
        Self {
            gateway: Some(gateway),
            key_secret: Some(key_secret.into()),
            orders,
        }
    }

    pub fn disabled(orders: Arc<OrderService>) -> Self {
        Self {
            gateway: None,
            key_secret: None,
            orders,
        }
    }

    /// HTTP gateway from configured credentials, or a disabled service.
    pub fn from_credentials(
        credentials: Option<GatewayCredentials>,
        orders: Arc<OrderService>,
    ) -> Result<Self, ServiceError> {
        match credentials {
            Some(credentials) => {
                let secret = credentials.key_secret.clone();
                let gateway = HttpPaymentGateway::new(credentials)?;
                info!("Payment gateway configured");
                Ok(Self::new(Arc::new(gateway), secret, orders))
            }
            None => {
                warn!("Payment gateway credentials missing; online payments disabled");
                Ok(Self::disabled(orders))
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.gateway.is_some() && self.key_secret.is_some()
    }

    /// Opens a gateway payment session for `amount` (major units) with the
    /// order reference as receipt.
    #[instrument(skip(self), fields(amount = %amount))]
    pub async fn create_payment_intent(
        &self,
        amount: Decimal,
        order_reference: &str,
    ) -> Result<GatewayOrder, ServiceError> {
        let gateway = self.gateway.as_ref().ok_or_else(unavailable)?;

        let mut errors = Vec::new();
        let amount_minor = to_minor_units(amount);
        match amount_minor {
            Some(minor) if minor > 0 => {}
            _ => errors.push(FieldError::new("amount", "Amount must be greater than zero")),
        }
        let receipt = order_reference.trim();
        if receipt.is_empty() {
            errors.push(FieldError::new("orderReference", "Order reference is required"));
        } else if receipt.len() > MAX_RECEIPT_LEN {
            errors.push(FieldError::new(
                "orderReference",
                format!("Order reference must be at most {} characters", MAX_RECEIPT_LEN),
            ));
        }
        if !errors.is_empty() {
            return Err(ServiceError::ValidationError(errors));
        }

        gateway
            .create_order(amount_minor.unwrap_or_default(), receipt)
            .await
    }

    /// Checks the gateway signature and, only when it matches, marks the
    /// referenced order paid with the gateway identifiers.
    #[instrument(skip(self, confirmation), fields(gateway_order_id = %confirmation.gateway_order_id, order_reference = %confirmation.order_reference))]
    pub async fn verify_payment(
        &self,
        confirmation: PaymentConfirmation,
    ) -> Result<OrderModel, ServiceError> {
        let missing: Vec<FieldError> = [
            ("gatewayOrderId", &confirmation.gateway_order_id),
            ("gatewayPaymentId", &confirmation.gateway_payment_id),
            ("signature", &confirmation.signature),
            ("orderReference", &confirmation.order_reference),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| FieldError::new(field, format!("{} is required", field)))
        .collect();
        if !missing.is_empty() {
            return Err(ServiceError::ValidationError(missing));
        }

        let secret = self.key_secret.as_deref().ok_or_else(unavailable)?;

        if !signature_matches(
            secret,
            &confirmation.gateway_order_id,
            &confirmation.gateway_payment_id,
            &confirmation.signature,
        ) {
            counter!("storefront_payments.verifications", 1, "outcome" => "rejected");
            warn!("Payment signature mismatch");
            return Err(ServiceError::SignatureInvalid);
        }

        let order_id = Uuid::parse_str(confirmation.order_reference.trim())
            .map_err(|_| ServiceError::InvalidInput("Invalid order reference".to_string()))?;

        let order = self
            .orders
            .mark_paid(
                order_id,
                Some(GatewayPayment {
                    gateway_order_id: confirmation.gateway_order_id,
                    gateway_payment_id: confirmation.gateway_payment_id,
                }),
            )
            .await?;

        counter!("storefront_payments.verifications", 1, "outcome" => "accepted");
        info!(order_id = %order.id, "Payment verified");
        Ok(order)
    }
}

fn unavailable() -> ServiceError {
    ServiceError::GatewayUnavailable("Payment gateway is not configured".to_string())
}

fn to_minor_units(amount: Decimal) -> Option<i64> {
    amount.checked_mul(Decimal::ONE_HUNDRED)?.round().to_i64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn signature_round_trip_and_tamper() {
        let sig = sign_payment("secret", "order_1", "pay_1");
        assert_eq!(sig.len(), 64);
        assert!(signature_matches("secret", "order_1", "pay_1", &sig));
        assert!(!signature_matches("secret", "order_1", "pay_2", &sig));
        assert!(!signature_matches("other", "order_1", "pay_1", &sig));
        assert!(!signature_matches("secret", "order_1", "pay_1", "not-hex"));
        assert!(!signature_matches("secret", "order_1", "pay_1", &sig[..62]));
    }

    #[test]
    fn signature_matches_known_vector() {
        let expected = {
            let mut mac = HmacSha256::new_from_slice(b"secret").unwrap();
            mac.update(b"order_1|pay_1");
            hex::encode(mac.finalize().into_bytes())
        };
        assert_eq!(sign_payment("secret", "order_1", "pay_1"), expected);
        assert!(signature_matches("secret", "order_1", "pay_1", &expected.to_uppercase()));
    }

    #[test]
    fn amounts_convert_to_minor_units() {
        assert_eq!(to_minor_units(dec!(340)), Some(34000));
        assert_eq!(to_minor_units(dec!(12.345)), Some(1234));
        assert_eq!(to_minor_units(dec!(0.01)), Some(1));
    }
}
