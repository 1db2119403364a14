//! Best-effort customer and admin emails for order events.
//!
//! Delivery never affects the outcome of the operation that triggered it:
//! [`NotificationDispatcher::dispatch`] runs the sends on a detached task and
//! only logs (and counts) failures.

use async_trait::async_trait;
use metrics::counter;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::MailRelaySettings;
use crate::entities::order::Model as OrderModel;

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("mail relay request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("mail relay rejected message with status {0}")]
    Rejected(u16),

    #[error("no recipient address available")]
    NoRecipient,
}

/// What happened to the order
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum OrderEvent {
    Placed,
    PaymentReceived,
}

/// Sends order emails. Implementations report failures; callers decide
/// whether they matter.
#[async_trait]
pub trait OrderNotifier: Send + Sync {
    async fn send_customer_confirmation(
        &self,
        order: &OrderModel,
        event: OrderEvent,
    ) -> Result<(), NotificationError>;

    async fn send_admin_notification(
        &self,
        order: &OrderModel,
        event: OrderEvent,
    ) -> Result<(), NotificationError>;
}

/// A rendered plain-text email
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
}

pub fn currency_symbol(currency: &str) -> String {
    match currency.to_ascii_uppercase().as_str() {
        "INR" => "₹".to_string(),
        "USD" => "$".to_string(),
        "EUR" => "€".to_string(),
        "GBP" => "£".to_string(),
        other => format!("{} ", other),
    }
}

fn money(symbol: &str, amount: Decimal) -> String {
    format!("{}{}", symbol, amount.normalize())
}

fn item_lines(order: &OrderModel, symbol: &str) -> String {
    order
        .items
        .iter()
        .map(|item| match item.line_total() {
            Some(total) => format!("{} x{} - {}", item.name, item.quantity, money(symbol, total)),
            None => format!("{} x{} @ {}", item.name, item.quantity, money(symbol, item.price)),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Customer-facing email, or `None` when the customer left no address.
pub fn render_customer_email(
    order: &OrderModel,
    event: OrderEvent,
    currency: &str,
) -> Option<EmailMessage> {
    let to = order.customer.email.clone()?;
    let symbol = currency_symbol(currency);

    let (subject, headline) = match event {
        OrderEvent::Placed => (
            format!("Order Confirmation - {}", order.order_number),
            "Your order has been successfully placed.",
        ),
        OrderEvent::PaymentReceived => (
            format!("Payment Received - {}", order.order_number),
            "We have received your payment and your order is confirmed.",
        ),
    };

    let text = format!(
        "Hi {name},\n\n{headline}\n\nOrder Number: {number}\n\nItems:\n{items}\n\nTotal Amount: {total}\n\nThank you for ordering!\n",
        name = order.customer.name,
        headline = headline,
        number = order.order_number,
        items = item_lines(order, &symbol),
        total = money(&symbol, order.total_amount),
    );

    Some(EmailMessage { to, subject, text })
}

pub fn render_admin_email(
    order: &OrderModel,
    event: OrderEvent,
    currency: &str,
    admin_email: &str,
) -> EmailMessage {
    let symbol = currency_symbol(currency);

    let (subject, headline) = match event {
        OrderEvent::Placed => (
            format!("New Order Received - {}", order.order_number),
            "New order received.",
        ),
        OrderEvent::PaymentReceived => (
            format!("Payment Captured - {}", order.order_number),
            "Online payment captured for order.",
        ),
    };

    let text = format!(
        "{headline}\n\nOrder Number: {number}\nPayment: {method} ({payment_status})\n\nCustomer: {name}\nPhone: {phone}\nAddress: {address}\n\nItems:\n{items}\n\nTotal Amount: {total}\n",
        headline = headline,
        number = order.order_number,
        method = order.payment_method,
        payment_status = order.payment_status,
        name = order.customer.name,
        phone = order.customer.phone,
        address = order.customer.address,
        items = item_lines(order, &symbol),
        total = money(&symbol, order.total_amount),
    );

    EmailMessage {
        to: admin_email.to_string(),
        subject,
        text,
    }
}

#[derive(Serialize)]
struct RelayPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

/// Delivers emails through an HTTP mail relay
#[derive(Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    settings: MailRelaySettings,
    currency: String,
}

impl HttpMailer {
    pub fn new(settings: MailRelaySettings, currency: impl Into<String>) -> Result<Self, NotificationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            settings,
            currency: currency.into(),
        })
    }

    async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        let payload = RelayPayload {
            from: &self.settings.from,
            to: &message.to,
            subject: &message.subject,
            text: &message.text,
        };

        let mut request = self.client.post(&self.settings.url).json(&payload);
        if let Some(token) = &self.settings.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(NotificationError::Rejected(response.status().as_u16()));
        }

        debug!(to = %message.to, subject = %message.subject, "email accepted by relay");
        Ok(())
    }
}

#[async_trait]
impl OrderNotifier for HttpMailer {
    async fn send_customer_confirmation(
        &self,
        order: &OrderModel,
        event: OrderEvent,
    ) -> Result<(), NotificationError> {
        let message = render_customer_email(order, event, &self.currency)
            .ok_or(NotificationError::NoRecipient)?;
        self.send(&message).await
    }

    async fn send_admin_notification(
        &self,
        order: &OrderModel,
        event: OrderEvent,
    ) -> Result<(), NotificationError> {
        let admin = self
            .settings
            .admin_email
            .as_deref()
            .ok_or(NotificationError::NoRecipient)?;
        let message = render_admin_email(order, event, &self.currency, admin);
        self.send(&message).await
    }
}

/// Used when no mail relay is configured; writes the subject lines to the log.
#[derive(Debug, Clone)]
pub struct LogOnlyNotifier {
    currency: String,
}

impl LogOnlyNotifier {
    pub fn new(currency: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
        }
    }
}

#[async_trait]
impl OrderNotifier for LogOnlyNotifier {
    async fn send_customer_confirmation(
        &self,
        order: &OrderModel,
        event: OrderEvent,
    ) -> Result<(), NotificationError> {
        let message = render_customer_email(order, event, &self.currency)
            .ok_or(NotificationError::NoRecipient)?;
        info!(to = %message.to, subject = %message.subject, "mail relay disabled; customer email not sent");
        Ok(())
    }

    async fn send_admin_notification(
        &self,
        order: &OrderModel,
        event: OrderEvent,
    ) -> Result<(), NotificationError> {
        info!(
            order_number = %order.order_number,
            %event,
            "mail relay disabled; admin email not sent"
        );
        Ok(())
    }
}

/// Fans an order event out to the customer and the admin on a detached task.
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn OrderNotifier>,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn OrderNotifier>) -> Self {
        Self { notifier }
    }

    /// Returns the task handle; callers normally drop it.
    pub fn dispatch(&self, order: OrderModel, event: OrderEvent) -> JoinHandle<()> {
        let notifier = Arc::clone(&self.notifier);
        let span = info_span!(
            "order.notify",
            order_id = %order.id,
            order_number = %order.order_number,
            %event
        );

        tokio::spawn(
            async move {
                if order.customer.email.is_some() {
                    let result = notifier.send_customer_confirmation(&order, event).await;
                    record_outcome("customer", result);
                } else {
                    debug!("customer has no email address; skipping confirmation");
                }

                let result = notifier.send_admin_notification(&order, event).await;
                record_outcome("admin", result);
            }
            .instrument(span),
        )
    }
}

fn record_outcome(recipient: &'static str, result: Result<(), NotificationError>) {
    match result {
        Ok(()) => {
            counter!("storefront_notifications.sent", 1, "recipient" => recipient);
        }
        Err(NotificationError::NoRecipient) => {
            debug!(recipient, "no address configured; email skipped");
        }
        Err(e) => {
            warn!(recipient, error = %e, "order notification failed");
            counter!("storefront_notifications.failures", 1, "recipient" => recipient);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::order::{
        Customer, OrderItem, OrderItems, OrderStatus, PaymentMethod, PaymentStatus,
    };
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;
    use uuid::Uuid;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_order(email: Option<&str>) -> OrderModel {
        OrderModel {
            id: Uuid::new_v4(),
            order_number: "ORD-1707556201923-482".into(),
            customer: Customer {
                name: "Asha Rao".into(),
                phone: "9876543210".into(),
                address: "12 MG Road".into(),
                email: email.map(str::to_string),
                landmark: None,
                pincode: None,
                instructions: None,
            },
            items: OrderItems(vec![
                OrderItem {
                    product_id: None,
                    name: "Paneer Tikka".into(),
                    price: dec!(220),
                    quantity: 1,
                },
                OrderItem {
                    product_id: None,
                    name: "Butter Naan".into(),
                    price: dec!(40.00),
                    quantity: 3,
                },
            ]),
            total_amount: dec!(340.00),
            payment_method: PaymentMethod::CashOnDelivery,
            payment_status: PaymentStatus::Pending,
            status: OrderStatus::Placed,
            notes: None,
            gateway_order_id: None,
            gateway_payment_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn relay_settings(url: String, admin: Option<&str>) -> MailRelaySettings {
        MailRelaySettings {
            url,
            token: Some("relay-token".into()),
            from: "orders@example.com".into(),
            admin_email: admin.map(str::to_string),
        }
    }

    #[test]
    fn customer_email_lists_items_and_total() {
        let order = sample_order(Some("asha@example.com"));
        let message = render_customer_email(&order, OrderEvent::Placed, "INR").unwrap();
        assert_eq!(message.to, "asha@example.com");
        assert_eq!(message.subject, "Order Confirmation - ORD-1707556201923-482");
        assert!(message.text.contains("Hi Asha Rao,"));
        assert!(message.text.contains("Paneer Tikka x1 - ₹220"));
        assert!(message.text.contains("Butter Naan x3 - ₹120"));
        assert!(message.text.contains("Total Amount: ₹340"));
    }

    #[test]
    fn overflowing_line_falls_back_to_unit_price() {
        let mut order = sample_order(Some("asha@example.com"));
        order.items.0[1].price = rust_decimal::Decimal::MAX;
        order.items.0[1].quantity = 2;

        let message = render_customer_email(&order, OrderEvent::Placed, "INR").unwrap();
        assert!(message.text.contains("Paneer Tikka x1 - ₹220"));
        assert!(message.text.contains("Butter Naan x2 @ ₹79228162514264337593543950335"));
    }

    #[test]
    fn customer_email_requires_an_address() {
        let order = sample_order(None);
        assert!(render_customer_email(&order, OrderEvent::Placed, "INR").is_none());
    }

    #[test]
    fn admin_email_includes_contact_details() {
        let order = sample_order(None);
        let message = render_admin_email(&order, OrderEvent::Placed, "INR", "admin@example.com");
        assert_eq!(message.subject, "New Order Received - ORD-1707556201923-482");
        assert!(message.text.contains("Customer: Asha Rao"));
        assert!(message.text.contains("Phone: 9876543210"));
        assert!(message.text.contains("Address: 12 MG Road"));
    }

    #[tokio::test]
    async fn http_mailer_posts_to_relay_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send"))
            .and(header("authorization", "Bearer relay-token"))
            .and(body_partial_json(serde_json::json!({
                "from": "orders@example.com",
                "to": "admin@example.com",
                "subject": "New Order Received - ORD-1707556201923-482"
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let mailer = HttpMailer::new(
            relay_settings(format!("{}/send", server.uri()), Some("admin@example.com")),
            "INR",
        )
        .unwrap();
        mailer
            .send_admin_notification(&sample_order(None), OrderEvent::Placed)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn http_mailer_reports_relay_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let mailer = HttpMailer::new(relay_settings(server.uri(), None), "INR").unwrap();
        let err = mailer
            .send_customer_confirmation(&sample_order(Some("a@example.com")), OrderEvent::Placed)
            .await
            .unwrap_err();
        assert!(matches!(err, NotificationError::Rejected(503)));

        let err = mailer
            .send_admin_notification(&sample_order(None), OrderEvent::Placed)
            .await
            .unwrap_err();
        assert!(matches!(err, NotificationError::NoRecipient));
    }

    #[derive(Default)]
    struct Recording {
        calls: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl OrderNotifier for Recording {
        async fn send_customer_confirmation(
            &self,
            _order: &OrderModel,
            _event: OrderEvent,
        ) -> Result<(), NotificationError> {
            self.calls.lock().unwrap().push("customer");
            Err(NotificationError::Rejected(500))
        }

        async fn send_admin_notification(
            &self,
            _order: &OrderModel,
            _event: OrderEvent,
        ) -> Result<(), NotificationError> {
            self.calls.lock().unwrap().push("admin");
            Ok(())
        }
    }

    #[tokio::test]
    async fn dispatcher_skips_customer_without_email_and_survives_failures() {
        let recording = Arc::new(Recording::default());
        let dispatcher = NotificationDispatcher::new(recording.clone());

        dispatcher
            .dispatch(sample_order(None), OrderEvent::Placed)
            .await
            .unwrap();
        assert_eq!(*recording.calls.lock().unwrap(), vec!["admin"]);

        dispatcher
            .dispatch(sample_order(Some("a@example.com")), OrderEvent::Placed)
            .await
            .unwrap();
        assert_eq!(
            *recording.calls.lock().unwrap(),
            vec!["admin", "customer", "admin"]
        );
    }
}
