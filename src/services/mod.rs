// Order lifecycle
pub mod order_number;
pub mod orders;

// Online payments
pub mod payment_gateway;
pub mod payments;

// Customer and admin emails
pub mod notifications;
