use crate::{
    entities::order::{
        ActiveModel as OrderActiveModel, Model as OrderModel, OrderStatus, PaymentStatus,
    },
    errors::ServiceError,
    models::order_request::NewOrder,
    repositories::{is_unique_violation, OrderRepository},
    services::{
        notifications::{NotificationDispatcher, OrderEvent},
        order_number::OrderNumberGenerator,
    },
};
use metrics::counter;
use sea_orm::{ActiveValue::NotSet, Set};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Insert attempts per order: the first try plus one retry on an
/// order-number collision.
const MAX_INSERT_ATTEMPTS: u32 = 2;

/// Identifiers the gateway issued for a captured payment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayPayment {
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
}

/// Page size bounds for listings
#[derive(Debug, Clone, Copy)]
pub struct PageSettings {
    pub default_size: u64,
    pub max_size: u64,
}

impl Default for PageSettings {
    fn default() -> Self {
        Self {
            default_size: 50,
            max_size: 100,
        }
    }
}

impl PageSettings {
    /// Resolves the requested page (1-based) and page size.
    pub fn resolve(&self, page: Option<u64>, limit: Option<u64>) -> (u64, u64) {
        let page = page.unwrap_or(1).max(1);
        let limit = limit
            .unwrap_or(self.default_size)
            .clamp(1, self.max_size.max(1));
        (page, limit)
    }
}

#[derive(Debug, Clone)]
pub struct OrderPage {
    pub orders: Vec<OrderModel>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub pages: u64,
}

/// Order lifecycle: creation with server-assigned numbers, lookups, status
/// and payment transitions, deletion.
#[derive(Clone)]
pub struct OrderService {
    repository: OrderRepository,
    numbers: Arc<dyn OrderNumberGenerator>,
    notifications: NotificationDispatcher,
    pages: PageSettings,
}

impl OrderService {
    pub fn new(
        repository: OrderRepository,
        numbers: Arc<dyn OrderNumberGenerator>,
        notifications: NotificationDispatcher,
        pages: PageSettings,
    ) -> Self {
        Self {
            repository,
            numbers,
            notifications,
            pages,
        }
    }

    /// Persists a validated order under a fresh order number. A collision on
    /// the number is retried once with a new number before giving up with
    /// `Conflict`. The notification is sent after the write and its outcome
    /// never reaches the caller.
    #[instrument(skip(self, new_order), fields(items = new_order.items.len(), total = %new_order.total_amount))]
    pub async fn create_order(&self, new_order: NewOrder) -> Result<OrderModel, ServiceError> {
        let order_id = Uuid::new_v4();

        for attempt in 1..=MAX_INSERT_ATTEMPTS {
            let order_number = self.numbers.generate();
            let model = OrderActiveModel {
                id: Set(order_id),
                order_number: Set(order_number.clone()),
                customer: Set(new_order.customer.clone()),
                items: Set(new_order.items.clone()),
                total_amount: Set(new_order.total_amount),
                payment_method: Set(new_order.payment_method),
                payment_status: Set(PaymentStatus::Pending),
                status: Set(OrderStatus::Placed),
                notes: Set(new_order.notes.clone()),
                gateway_order_id: Set(None),
                gateway_payment_id: Set(None),
                created_at: NotSet,
                updated_at: NotSet,
            };

            match self.repository.insert(model).await {
                Ok(order) => {
                    counter!("storefront_orders.created", 1);
                    info!(order_id = %order.id, order_number = %order.order_number, attempt, "Order created successfully");
                    self.notifications.dispatch(order.clone(), OrderEvent::Placed);
                    return Ok(order);
                }
                Err(e) if is_unique_violation(&e) => {
                    counter!("storefront_orders.number_collisions", 1);
                    warn!(%order_number, attempt, "Order number already taken");
                }
                Err(e) => {
                    error!(error = %e, order_id = %order_id, "Failed to create order in database");
                    return Err(e.into());
                }
            }
        }

        Err(ServiceError::Conflict(
            "Could not assign a unique order number, please retry".to_string(),
        ))
    }

    /// Newest first, optionally filtered by status.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        status: Option<OrderStatus>,
        page: Option<u64>,
        limit: Option<u64>,
    ) -> Result<OrderPage, ServiceError> {
        let (page, limit) = self.pages.resolve(page, limit);
        let (orders, total) = self.repository.list(status, page, limit).await?;

        Ok(OrderPage {
            orders,
            total,
            page,
            limit,
            pages: total.div_ceil(limit),
        })
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderModel, ServiceError> {
        self.repository
            .find_by_id(order_id)
            .await?
            .ok_or_else(not_found)
    }

    #[instrument(skip(self))]
    pub async fn get_order_by_number(&self, order_number: &str) -> Result<OrderModel, ServiceError> {
        self.repository
            .find_by_order_number(order_number)
            .await?
            .ok_or_else(not_found)
    }

    /// Sets the fulfilment status. Any status may follow any other, except
    /// that a paid order cannot go back to `placed` and a delivered order
    /// cannot be cancelled.
    #[instrument(skip(self), fields(order_id = %order_id, new_status = %status))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<OrderModel, ServiceError> {
        let order = self.get_order(order_id).await?;

        if order.payment_status == PaymentStatus::Paid && status == OrderStatus::Placed {
            return Err(ServiceError::InvalidOperation(
                "A paid order cannot be moved back to placed".to_string(),
            ));
        }
        if order.status == status {
            return Ok(order);
        }
        if status == OrderStatus::Cancelled && order.status.is_terminal() {
            return Err(ServiceError::InvalidOperation(format!(
                "A {} order cannot be cancelled",
                order.status
            )));
        }

        let old_status = order.status;
        let mut active: OrderActiveModel = order.into();
        active.status = Set(status);
        let updated = self.repository.update(active).await?;

        info!(order_id = %order_id, old_status = %old_status, new_status = %status, "Order status updated successfully");
        Ok(updated)
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn delete_order(&self, order_id: Uuid) -> Result<(), ServiceError> {
        if !self.repository.delete(order_id).await? {
            return Err(not_found());
        }
        info!(order_id = %order_id, "Order deleted");
        Ok(())
    }

    /// Records a captured payment. A placed order advances to `confirmed`;
    /// later statuses are kept. Marking an order that is already paid with
    /// the same (or no) gateway payment is a no-op without notification.
    #[instrument(skip(self, payment), fields(order_id = %order_id))]
    pub async fn mark_paid(
        &self,
        order_id: Uuid,
        payment: Option<GatewayPayment>,
    ) -> Result<OrderModel, ServiceError> {
        let order = self.get_order(order_id).await?;

        if order.payment_status == PaymentStatus::Paid {
            let same_payment = match &payment {
                None => true,
                Some(p) => order.gateway_payment_id.as_deref() == Some(p.gateway_payment_id.as_str()),
            };
            if same_payment {
                info!(order_id = %order_id, "Order already paid");
                return Ok(order);
            }
            return Err(ServiceError::InvalidOperation(
                "Order has already been paid with a different payment".to_string(),
            ));
        }

        let mut active: OrderActiveModel = order.clone().into();
        active.payment_status = Set(PaymentStatus::Paid);
        if order.status == OrderStatus::Placed {
            active.status = Set(OrderStatus::Confirmed);
        }
        if let Some(payment) = payment {
            active.gateway_order_id = Set(Some(payment.gateway_order_id));
            active.gateway_payment_id = Set(Some(payment.gateway_payment_id));
        }

        let updated = self.repository.update(active).await?;
        counter!("storefront_orders.paid", 1);
        info!(order_id = %order_id, order_number = %updated.order_number, status = %updated.status, "Order marked paid");

        self.notifications
            .dispatch(updated.clone(), OrderEvent::PaymentReceived);
        Ok(updated)
    }

    /// Records a declined payment. Rejected once the order is paid.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn mark_payment_failed(&self, order_id: Uuid) -> Result<OrderModel, ServiceError> {
        let order = self.get_order(order_id).await?;

        match order.payment_status {
            PaymentStatus::Paid => Err(ServiceError::InvalidOperation(
                "A paid order cannot be marked as payment failed".to_string(),
            )),
            PaymentStatus::Failed => Ok(order),
            PaymentStatus::Pending => {
                let mut active: OrderActiveModel = order.into();
                active.payment_status = Set(PaymentStatus::Failed);
                let updated = self.repository.update(active).await?;
                warn!(order_id = %order_id, "Payment failed for order");
                Ok(updated)
            }
        }
    }
}

fn not_found() -> ServiceError {
    ServiceError::NotFound("Order not found".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{establish_connection_with_config, run_migrations, DbConfig};
    use crate::entities::order::{Customer, OrderItem, OrderItems, PaymentMethod};
    use crate::services::notifications::LogOnlyNotifier;
    use crate::services::order_number::TimestampOrderNumbers;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct Scripted(Mutex<VecDeque<String>>);

    impl Scripted {
        fn new(numbers: &[&str]) -> Self {
            Self(Mutex::new(numbers.iter().map(|n| n.to_string()).collect()))
        }
    }

    impl OrderNumberGenerator for Scripted {
        fn generate(&self) -> String {
            self.0.lock().unwrap().pop_front().expect("scripted number")
        }
    }

    async fn service_with(numbers: Arc<dyn OrderNumberGenerator>) -> OrderService {
        let cfg = DbConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            ..Default::default()
        };
        let db = establish_connection_with_config(&cfg).await.unwrap();
        run_migrations(&db).await.unwrap();

        OrderService::new(
            OrderRepository::new(Arc::new(db)),
            numbers,
            NotificationDispatcher::new(Arc::new(LogOnlyNotifier::new("INR"))),
            PageSettings::default(),
        )
    }

    fn new_order() -> NewOrder {
        NewOrder {
            customer: Customer {
                name: "Ravi".into(),
                phone: "9000000000".into(),
                address: "4 Lake View".into(),
                email: None,
                landmark: None,
                pincode: None,
                instructions: None,
            },
            items: OrderItems(vec![OrderItem {
                product_id: None,
                name: "Veg Biryani".into(),
                price: dec!(180),
                quantity: 2,
            }]),
            total_amount: dec!(360),
            payment_method: PaymentMethod::Online,
            notes: None,
        }
    }

    #[test]
    fn page_settings_clamp_requests() {
        let pages = PageSettings::default();
        assert_eq!(pages.resolve(None, None), (1, 50));
        assert_eq!(pages.resolve(Some(0), Some(0)), (1, 1));
        assert_eq!(pages.resolve(Some(3), Some(1000)), (3, 100));
    }

    #[tokio::test]
    async fn collision_is_retried_once_with_a_new_number() {
        let service = service_with(Arc::new(Scripted::new(&["ORD-1-100", "ORD-1-100", "ORD-1-101"]))).await;

        let first = service.create_order(new_order()).await.unwrap();
        let second = service.create_order(new_order()).await.unwrap();

        assert_eq!(first.order_number, "ORD-1-100");
        assert_eq!(second.order_number, "ORD-1-101");
    }

    #[tokio::test]
    async fn second_collision_surfaces_conflict() {
        let service = service_with(Arc::new(Scripted::new(&["ORD-1-100", "ORD-1-100", "ORD-1-100"]))).await;

        service.create_order(new_order()).await.unwrap();
        let err = service.create_order(new_order()).await.unwrap_err();
        assert_matches!(err, ServiceError::Conflict(_));

        let page = service.list_orders(None, None, None).await.unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn mark_paid_confirms_placed_order_and_is_idempotent() {
        let service = service_with(Arc::new(TimestampOrderNumbers::new("ORD"))).await;
        let order = service.create_order(new_order()).await.unwrap();
        let payment = GatewayPayment {
            gateway_order_id: "order_1".into(),
            gateway_payment_id: "pay_1".into(),
        };

        let paid = service.mark_paid(order.id, Some(payment.clone())).await.unwrap();
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
        assert_eq!(paid.status, OrderStatus::Confirmed);
        assert_eq!(paid.gateway_payment_id.as_deref(), Some("pay_1"));

        let again = service.mark_paid(order.id, Some(payment)).await.unwrap();
        assert_eq!(again.updated_at, paid.updated_at);

        let other = GatewayPayment {
            gateway_order_id: "order_1".into(),
            gateway_payment_id: "pay_2".into(),
        };
        assert_matches!(
            service.mark_paid(order.id, Some(other)).await,
            Err(ServiceError::InvalidOperation(_))
        );
    }

    #[tokio::test]
    async fn mark_paid_keeps_later_statuses() {
        let service = service_with(Arc::new(TimestampOrderNumbers::new("ORD"))).await;
        let order = service.create_order(new_order()).await.unwrap();
        service.update_status(order.id, OrderStatus::Shipped).await.unwrap();

        let paid = service.mark_paid(order.id, None).await.unwrap();
        assert_eq!(paid.status, OrderStatus::Shipped);
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn paid_orders_cannot_be_unpaid() {
        let service = service_with(Arc::new(TimestampOrderNumbers::new("ORD"))).await;
        let order = service.create_order(new_order()).await.unwrap();
        service.mark_paid(order.id, None).await.unwrap();

        assert_matches!(
            service.update_status(order.id, OrderStatus::Placed).await,
            Err(ServiceError::InvalidOperation(_))
        );
        assert_matches!(
            service.mark_payment_failed(order.id).await,
            Err(ServiceError::InvalidOperation(_))
        );

        let cancelled = service
            .update_status(order.id, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn delivered_orders_cannot_be_cancelled() {
        let service = service_with(Arc::new(TimestampOrderNumbers::new("ORD"))).await;
        let order = service.create_order(new_order()).await.unwrap();
        service.update_status(order.id, OrderStatus::Delivered).await.unwrap();

        assert_matches!(
            service.update_status(order.id, OrderStatus::Cancelled).await,
            Err(ServiceError::InvalidOperation(_))
        );
        let stored = service.get_order(order.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Delivered);
    }

    #[tokio::test]
    async fn payment_failure_is_recorded_for_pending_orders() {
        let service = service_with(Arc::new(TimestampOrderNumbers::new("ORD"))).await;
        let order = service.create_order(new_order()).await.unwrap();

        let failed = service.mark_payment_failed(order.id).await.unwrap();
        assert_eq!(failed.payment_status, PaymentStatus::Failed);
        assert_eq!(failed.status, OrderStatus::Placed);

        let paid = service.mark_paid(order.id, None).await.unwrap();
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn missing_orders_are_not_found() {
        let service = service_with(Arc::new(TimestampOrderNumbers::new("ORD"))).await;
        let id = Uuid::new_v4();

        assert_matches!(service.get_order(id).await, Err(ServiceError::NotFound(_)));
        assert_matches!(service.delete_order(id).await, Err(ServiceError::NotFound(_)));
        assert_matches!(service.mark_paid(id, None).await, Err(ServiceError::NotFound(_)));
        assert_matches!(
            service.get_order_by_number("ORD-0-000").await,
            Err(ServiceError::NotFound(_))
        );
    }
}
