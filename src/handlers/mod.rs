pub mod common;
pub mod health;
pub mod orders;
pub mod payments;

use std::sync::Arc;
use tracing::info;

use crate::{
    config::AppConfig,
    db::DbPool,
    errors::ServiceError,
    repositories::OrderRepository,
    services::{
        notifications::{HttpMailer, LogOnlyNotifier, NotificationDispatcher, OrderNotifier},
        order_number::TimestampOrderNumbers,
        orders::{OrderService, PageSettings},
        payments::PaymentService,
    },
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<OrderService>,
    pub payments: Arc<PaymentService>,
}

impl AppServices {
    pub fn new(orders: Arc<OrderService>, payments: Arc<PaymentService>) -> Self {
        Self { orders, payments }
    }

    /// Wires the production collaborators from configuration. Missing mail or
    /// gateway settings select the disabled variants up front.
    pub fn from_config(db_pool: Arc<DbPool>, cfg: &AppConfig) -> Result<Self, ServiceError> {
        let notifier: Arc<dyn OrderNotifier> = match cfg.mail_relay() {
            Some(relay) => {
                info!(relay = %relay.url, "Order emails delivered through mail relay");
                Arc::new(HttpMailer::new(relay, cfg.currency.clone()).map_err(|e| {
                    ServiceError::InternalError(format!("mail client: {}", e))
                })?)
            }
            None => {
                info!("Mail relay not configured; order emails will only be logged");
                Arc::new(LogOnlyNotifier::new(cfg.currency.clone()))
            }
        };

        let orders = Arc::new(OrderService::new(
            OrderRepository::new(db_pool),
            Arc::new(TimestampOrderNumbers::new(cfg.order_number_prefix.clone())),
            NotificationDispatcher::new(notifier),
            PageSettings {
                default_size: cfg.api_default_page_size,
                max_size: cfg.api_max_page_size,
            },
        ));

        let payments = Arc::new(PaymentService::from_credentials(
            cfg.gateway_credentials(),
            orders.clone(),
        )?);

        Ok(Self::new(orders, payments))
    }
}
