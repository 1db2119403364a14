use crate::entities::order::Model as OrderModel;
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::payment_gateway::GatewayOrder;
use crate::services::payments::PaymentConfirmation;
use crate::ApiResponse;
use axum::{
    extract::{rejection::JsonRejection, Json, State},
    routing::post,
    Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "amount": 340,
    "orderReference": "7f9c24e8-3b12-4fef-91e0-a5bd3f1a2c11"
}))]
pub struct CreatePaymentRequest {
    /// Amount in major currency units
    #[schema(value_type = Option<f64>, example = 340.0)]
    pub amount: Option<Decimal>,
    /// Merchant reference for the session, normally the order id
    pub order_reference: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentResponse {
    pub success: bool,
    pub gateway_order: GatewayOrder,
}

/// Signed checkout result. The gateway's own field names are accepted too.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentRequest {
    #[serde(alias = "razorpay_order_id")]
    pub gateway_order_id: Option<String>,
    #[serde(alias = "razorpay_payment_id")]
    pub gateway_payment_id: Option<String>,
    #[serde(alias = "razorpay_signature")]
    pub signature: Option<String>,
    #[serde(alias = "orderId")]
    pub order_reference: Option<String>,
}

impl From<VerifyPaymentRequest> for PaymentConfirmation {
    fn from(req: VerifyPaymentRequest) -> Self {
        Self {
            gateway_order_id: req.gateway_order_id.unwrap_or_default(),
            gateway_payment_id: req.gateway_payment_id.unwrap_or_default(),
            signature: req.signature.unwrap_or_default(),
            order_reference: req.order_reference.unwrap_or_default(),
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/payments/create",
    summary = "Create payment session",
    description = "Open a payment session with the gateway for an order. Fails with 400 when the gateway is not configured.",
    request_body = CreatePaymentRequest,
    responses(
        (status = 200, description = "Gateway session created", body = CreatePaymentResponse),
        (status = 400, description = "Gateway not configured or invalid request", body = crate::errors::ErrorResponse),
        (status = 502, description = "Gateway request failed", body = crate::errors::ErrorResponse),
    ),
    tag = "payments"
)]
pub async fn create_payment(
    State(state): State<AppState>,
    payload: Result<Json<CreatePaymentRequest>, JsonRejection>,
) -> Result<Json<CreatePaymentResponse>, ServiceError> {
    let Json(payload) = payload?;
    let gateway_order = state
        .services
        .payments
        .create_payment_intent(
            payload.amount.unwrap_or_default(),
            payload.order_reference.as_deref().unwrap_or_default(),
        )
        .await?;

    Ok(Json(CreatePaymentResponse {
        success: true,
        gateway_order,
    }))
}

#[utoipa::path(
    post,
    path = "/api/payments/verify",
    summary = "Verify payment",
    description = "Check the gateway signature over `gatewayOrderId|gatewayPaymentId` and mark the referenced order paid. Nothing is written when the signature does not match.",
    request_body = VerifyPaymentRequest,
    responses(
        (status = 200, description = "Payment verified and order marked paid", body = ApiResponse<OrderModel>),
        (status = 400, description = "Invalid signature, missing fields or gateway not configured", body = crate::errors::ErrorResponse),
        (status = 404, description = "Referenced order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "payments"
)]
pub async fn verify_payment(
    State(state): State<AppState>,
    payload: Result<Json<VerifyPaymentRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<OrderModel>>, ServiceError> {
    let Json(payload) = payload?;
    let order = state
        .services
        .payments
        .verify_payment(payload.into())
        .await?;
    Ok(Json(ApiResponse::with_message(order, "Payment verified")))
}

pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/create", post(create_payment))
        .route("/verify", post(verify_payment))
}
