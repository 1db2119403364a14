use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront Orders API",
        version = "0.1.0",
        description = r#"
# Storefront Orders API

Order intake and lifecycle tracking for a food-delivery storefront.

## Orders

- Order numbers (`ORD-<millis>-<nnn>`) are assigned by the server; a client-sent `orderNumber` is ignored.
- Status: `placed`, `confirmed`, `shipped`, `delivered`, `cancelled` (`paid` is accepted as `confirmed`).
- Payment status: `pending`, `paid`, `failed`.

## Online payments

`POST /api/payments/create` opens a gateway session. After checkout the client posts the
gateway's signed result to `POST /api/payments/verify`; the order is only marked paid when the
HMAC-SHA256 signature over `gatewayOrderId|gatewayPaymentId` matches.

## Error Handling

```json
{
  "success": false,
  "error": "Bad Request",
  "message": "Validation failed",
  "errors": [{ "field": "items", "message": "Order must contain at least one item" }],
  "timestamp": "2024-01-01T00:00:00Z"
}
```
        "#,
    ),
    servers(
        (url = "http://localhost:5000", description = "Local development")
    ),
    tags(
        (name = "orders", description = "Order management endpoints"),
        (name = "payments", description = "Gateway payment sessions and verification"),
        (name = "health", description = "Service health"),
    ),
    paths(
        crate::handlers::orders::create_order,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::get_order_by_number,
        crate::handlers::orders::update_order_status,
        crate::handlers::orders::mark_payment_success,
        crate::handlers::orders::mark_payment_failed,
        crate::handlers::orders::delete_order,
        crate::handlers::payments::create_payment,
        crate::handlers::payments::verify_payment,
        crate::handlers::health::health_check,
    ),
    components(
        schemas(
            crate::entities::order::Model,
            crate::entities::order::Customer,
            crate::entities::order::OrderItem,
            crate::entities::order::PaymentMethod,
            crate::entities::order::PaymentStatus,
            crate::entities::order::OrderStatus,
            crate::models::order_request::CreateOrderRequest,
            crate::models::order_request::CustomerInput,
            crate::models::order_request::OrderItemInput,
            crate::models::order_request::UpdateStatusRequest,
            crate::handlers::orders::OrderCreatedResponse,
            crate::handlers::orders::OrderListResponse,
            crate::handlers::common::PaginationMeta,
            crate::handlers::payments::CreatePaymentRequest,
            crate::handlers::payments::CreatePaymentResponse,
            crate::handlers::payments::VerifyPaymentRequest,
            crate::services::payment_gateway::GatewayOrder,
            crate::handlers::health::HealthResponse,
            crate::errors::ErrorResponse,
            crate::errors::FieldError,
        )
    )
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
