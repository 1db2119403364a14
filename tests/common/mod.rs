#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use storefront_orders::{
    config::AppConfig,
    db,
    entities::order::Model as OrderModel,
    errors::ServiceError,
    handlers::AppServices,
    repositories::OrderRepository,
    services::{
        notifications::{NotificationDispatcher, NotificationError, OrderEvent, OrderNotifier},
        order_number::{OrderNumberGenerator, TimestampOrderNumbers},
        orders::{OrderService, PageSettings},
        payment_gateway::{GatewayOrder, PaymentGateway},
        payments::PaymentService,
    },
    AppState,
};
use tower::ServiceExt;

pub const GATEWAY_SECRET: &str = "test_gateway_secret";

/// Records every notification attempt; optionally fails them all.
#[derive(Default)]
pub struct RecordingNotifier {
    pub fail: bool,
    pub sent: Mutex<Vec<(String, OrderEvent, &'static str)>>,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn events_for(&self, order_number: &str) -> Vec<(OrderEvent, &'static str)> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(number, _, _)| number == order_number)
            .map(|(_, event, recipient)| (*event, *recipient))
            .collect()
    }

    fn record(
        &self,
        order: &OrderModel,
        event: OrderEvent,
        recipient: &'static str,
    ) -> Result<(), NotificationError> {
        self.sent
            .lock()
            .unwrap()
            .push((order.order_number.clone(), event, recipient));
        if self.fail {
            Err(NotificationError::Rejected(500))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl OrderNotifier for RecordingNotifier {
    async fn send_customer_confirmation(
        &self,
        order: &OrderModel,
        event: OrderEvent,
    ) -> Result<(), NotificationError> {
        self.record(order, event, "customer")
    }

    async fn send_admin_notification(
        &self,
        order: &OrderModel,
        event: OrderEvent,
    ) -> Result<(), NotificationError> {
        self.record(order, event, "admin")
    }
}

/// Gateway double that echoes the request back as a session
#[derive(Default)]
pub struct StubGateway {
    pub calls: AtomicUsize,
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_order(
        &self,
        amount_minor: i64,
        receipt: &str,
    ) -> Result<GatewayOrder, ServiceError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(GatewayOrder {
            id: format!("order_stub_{}", n),
            amount: amount_minor,
            currency: "INR".to_string(),
            receipt: Some(receipt.to_string()),
            status: Some("created".to_string()),
        })
    }
}

/// Hands out a fixed sequence of order numbers, then falls back to the
/// timestamp generator.
pub struct ScriptedNumbers {
    script: Mutex<Vec<String>>,
    fallback: TimestampOrderNumbers,
}

impl ScriptedNumbers {
    pub fn new(numbers: &[&str]) -> Self {
        let mut script: Vec<String> = numbers.iter().map(|n| n.to_string()).collect();
        script.reverse();
        Self {
            script: Mutex::new(script),
            fallback: TimestampOrderNumbers::new("ORD"),
        }
    }
}

impl OrderNumberGenerator for ScriptedNumbers {
    fn generate(&self) -> String {
        self.script
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| self.fallback.generate())
    }
}

pub struct TestOptions {
    pub notifier: Arc<RecordingNotifier>,
    pub numbers: Arc<dyn OrderNumberGenerator>,
    pub payments_enabled: bool,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            notifier: Arc::new(RecordingNotifier::default()),
            numbers: Arc::new(TimestampOrderNumbers::new("ORD")),
            payments_enabled: true,
        }
    }
}

/// Application router over a migrated in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub notifier: Arc<RecordingNotifier>,
    pub gateway: Arc<StubGateway>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_options(TestOptions::default()).await
    }

    pub async fn with_options(options: TestOptions) -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db_arc = Arc::new(pool);

        let orders = Arc::new(OrderService::new(
            OrderRepository::new(db_arc.clone()),
            options.numbers,
            NotificationDispatcher::new(options.notifier.clone()),
            PageSettings {
                default_size: cfg.api_default_page_size,
                max_size: cfg.api_max_page_size,
            },
        ));

        let gateway = Arc::new(StubGateway::default());
        let payments = if options.payments_enabled {
            PaymentService::new(gateway.clone(), GATEWAY_SECRET, orders.clone())
        } else {
            PaymentService::disabled(orders.clone())
        };

        let state = AppState {
            db: db_arc,
            config: cfg,
            services: AppServices::new(orders, Arc::new(payments)),
        };

        Self {
            router: storefront_orders::app(state.clone()),
            state,
            notifier: options.notifier,
            gateway,
        }
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&json).expect("serialize request body"))
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).expect("build request")).await
    }

    /// Sends `raw` verbatim as a JSON body.
    pub async fn request_raw(&self, method: Method, uri: &str, raw: &str) -> Response {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(raw.to_string()))
            .expect("build request");
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Creates an order through the API and returns the response body.
    pub async fn create_order(&self, payload: Value) -> Value {
        let response = self.request(Method::POST, "/api/orders", Some(payload)).await;
        assert_eq!(response.status(), 201, "order creation should succeed");
        response_json(response).await
    }

    pub async fn order_count(&self) -> u64 {
        OrderRepository::new(self.state.db.clone())
            .count(None)
            .await
            .expect("count orders")
    }

    /// Lets detached notification tasks run.
    pub async fn settle(&self) {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

pub fn order_payload() -> Value {
    json!({
        "customer": {
            "name": "Meera Iyer",
            "phone": "9988776655",
            "address": "221 Residency Road, Bengaluru",
            "email": "meera@example.com"
        },
        "items": [
            { "name": "Masala Dosa", "price": 90, "quantity": 2 },
            { "name": "Filter Coffee", "price": 30, "quantity": 1 }
        ],
        "totalAmount": 210,
        "paymentMethod": "cash-on-delivery"
    })
}
