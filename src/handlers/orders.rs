use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::entities::order::{Model as OrderModel, OrderStatus};
use crate::handlers::common::{parse_order_id, parse_query_number, PaginationMeta};
use crate::models::order_request::{CreateOrderRequest, UpdateStatusRequest};
use crate::{errors::ServiceError, ApiResponse, ApiResult, AppState};

/// Query parameters for `GET /orders`
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListOrdersQuery {
    /// Only orders in this status
    pub status: Option<String>,
    /// Page size (default 50, capped at the configured maximum)
    pub limit: Option<String>,
    /// 1-based page number
    pub page: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreatedResponse {
    pub success: bool,
    pub order_id: Uuid,
    #[schema(example = "ORD-1707556201923-482")]
    pub order_number: String,
    pub data: OrderModel,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderListResponse {
    pub success: bool,
    pub data: Vec<OrderModel>,
    pub pagination: PaginationMeta,
}

fn parse_status_filter(raw: Option<&str>) -> Result<Option<OrderStatus>, ServiceError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(label) => label.parse::<OrderStatus>().map(Some).map_err(|_| {
            ServiceError::invalid_field("status", format!("Unknown order status '{}'", label))
        }),
    }
}

#[utoipa::path(
    post,
    path = "/api/orders",
    summary = "Create order",
    description = "Validate and persist a new order. The order number is assigned by the server; any client-supplied value is ignored.",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = OrderCreatedResponse,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Validation failed", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order number could not be assigned", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderCreatedResponse>), ServiceError> {
    let Json(payload) = payload?;
    let new_order = payload.into_new_order()?;
    let order = state.services.orders.create_order(new_order).await?;

    Ok((
        StatusCode::CREATED,
        Json(OrderCreatedResponse {
            success: true,
            order_id: order.id,
            order_number: order.order_number.clone(),
            data: order,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/orders",
    summary = "List orders",
    description = "Newest orders first, optionally filtered by status",
    params(ListOrdersQuery),
    responses(
        (status = 200, description = "Orders retrieved", body = OrderListResponse),
        (status = 400, description = "Invalid filter or paging parameters", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<OrderListResponse>, ServiceError> {
    let status = parse_status_filter(query.status.as_deref())?;
    let limit = parse_query_number("limit", query.limit.as_deref())?;
    let page = parse_query_number("page", query.page.as_deref())?;

    let result = state.services.orders.list_orders(status, page, limit).await?;

    Ok(Json(OrderListResponse {
        success: true,
        pagination: PaginationMeta::new(result.total, result.page, result.limit),
        data: result.orders,
    }))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    summary = "Get order",
    params(("id" = String, Path, description = "Order id (UUID)")),
    responses(
        (status = 200, description = "Order retrieved", body = ApiResponse<OrderModel>),
        (status = 400, description = "Malformed order id", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<OrderModel> {
    let order_id = parse_order_id(&id)?;
    let order = state.services.orders.get_order(order_id).await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    get,
    path = "/api/orders/number/{order_number}",
    summary = "Get order by number",
    description = "Retrieve an order by its public order number (e.g. ORD-1707556201923-482)",
    params(("order_number" = String, Path, description = "Public order number")),
    responses(
        (status = 200, description = "Order retrieved", body = ApiResponse<OrderModel>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn get_order_by_number(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
) -> ApiResult<OrderModel> {
    let order = state
        .services
        .orders
        .get_order_by_number(order_number.trim())
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    patch,
    path = "/api/orders/{id}/status",
    summary = "Update order status",
    description = "Set the fulfilment status. A paid order cannot be moved back to placed.",
    params(("id" = String, Path, description = "Order id (UUID)")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<OrderModel>),
        (status = 400, description = "Missing or unknown status, malformed id, or forbidden transition", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> ApiResult<OrderModel> {
    let order_id = parse_order_id(&id)?;
    let Json(payload) = payload?;
    let status = payload.parse()?;

    let order = state.services.orders.update_status(order_id, status).await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    patch,
    path = "/api/orders/{id}/payment-success",
    summary = "Mark order paid",
    description = "Administrative mark-paid without a gateway signature. Repeating the call on a paid order changes nothing.",
    params(("id" = String, Path, description = "Order id (UUID)")),
    responses(
        (status = 200, description = "Order marked paid", body = ApiResponse<OrderModel>),
        (status = 400, description = "Malformed order id", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn mark_payment_success(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<OrderModel> {
    let order_id = parse_order_id(&id)?;
    let order = state.services.orders.mark_paid(order_id, None).await?;
    Ok(Json(ApiResponse::with_message(order, "Payment recorded")))
}

#[utoipa::path(
    patch,
    path = "/api/orders/{id}/payment-failed",
    summary = "Mark payment failed",
    params(("id" = String, Path, description = "Order id (UUID)")),
    responses(
        (status = 200, description = "Payment failure recorded", body = ApiResponse<OrderModel>),
        (status = 400, description = "Malformed order id or order already paid", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn mark_payment_failed(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<OrderModel> {
    let order_id = parse_order_id(&id)?;
    let order = state.services.orders.mark_payment_failed(order_id).await?;
    Ok(Json(ApiResponse::with_message(order, "Payment failure recorded")))
}

#[utoipa::path(
    delete,
    path = "/api/orders/{id}",
    summary = "Delete order",
    description = "Permanently remove an order",
    params(("id" = String, Path, description = "Order id (UUID)")),
    responses(
        (status = 200, description = "Order deleted", body = ApiResponse<String>),
        (status = 400, description = "Malformed order id", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let order_id = parse_order_id(&id)?;
    state.services.orders.delete_order(order_id).await?;
    Ok(Json(ApiResponse::message("Order deleted successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn status_filter_accepts_aliases_and_rejects_unknown() {
        assert_eq!(parse_status_filter(None).unwrap(), None);
        assert_eq!(parse_status_filter(Some(" ")).unwrap(), None);
        assert_eq!(
            parse_status_filter(Some("paid")).unwrap(),
            Some(OrderStatus::Confirmed)
        );
        assert_matches!(
            parse_status_filter(Some("lost")),
            Err(ServiceError::ValidationError(_))
        );
    }
}
