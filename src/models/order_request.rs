//! Inbound order payloads and their validation.
//!
//! Every field is optional at the deserialization layer so that a missing
//! field surfaces as a [`FieldError`] in a 400 response instead of a body
//! rejection. [`CreateOrderRequest::into_new_order`] produces the fully
//! checked [`NewOrder`] and needs no database.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::entities::order::{Customer, OrderItem, OrderItems, OrderStatus, PaymentMethod};
use crate::errors::{flatten_validation_errors, FieldError, ServiceError};

const MAX_ITEMS: usize = 100;

/// Body of `POST /orders`. A client-sent `orderNumber` is ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub customer: Option<CustomerInput>,
    pub items: Option<Vec<OrderItemInput>>,
    #[schema(value_type = Option<f64>, example = 250.0)]
    pub total_amount: Option<Decimal>,
    pub payment_method: Option<PaymentMethod>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInput {
    #[validate(length(max = 120, message = "Customer name must be at most 120 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 20, message = "Phone number must be at most 20 characters"))]
    pub phone: Option<String>,
    #[validate(length(max = 500, message = "Address must be at most 500 characters"))]
    pub address: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 200, message = "Landmark must be at most 200 characters"))]
    pub landmark: Option<String>,
    #[validate(length(max = 12, message = "Pincode must be at most 12 characters"))]
    pub pincode: Option<String>,
    #[validate(length(max = 500, message = "Instructions must be at most 500 characters"))]
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemInput {
    pub product_id: Option<String>,
    pub name: Option<String>,
    #[schema(value_type = Option<f64>, example = 120.0)]
    pub price: Option<Decimal>,
    pub quantity: Option<i64>,
}

/// Body of `PATCH /orders/:id/status`
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    #[schema(example = "shipped")]
    pub status: Option<String>,
}

/// A creation payload that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub customer: Customer,
    pub items: OrderItems,
    pub total_amount: Decimal,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl CustomerInput {
    fn normalized(self) -> Self {
        Self {
            name: clean(self.name),
            phone: clean(self.phone),
            address: clean(self.address),
            email: clean(self.email).map(|e| e.to_ascii_lowercase()),
            landmark: clean(self.landmark),
            pincode: clean(self.pincode),
            instructions: clean(self.instructions),
        }
    }

    fn into_customer(self, errors: &mut Vec<FieldError>) -> Option<Customer> {
        let input = self.normalized();
        if let Err(e) = input.validate() {
            errors.extend(flatten_validation_errors("customer", &e));
        }

        let name = required(input.name, "customer.name", "Customer name is required", errors);
        let phone = required(input.phone, "customer.phone", "Phone number is required", errors);
        let address = required(input.address, "customer.address", "Address is required", errors);

        Some(Customer {
            name: name?,
            phone: phone?,
            address: address?,
            email: input.email,
            landmark: input.landmark,
            pincode: input.pincode,
            instructions: input.instructions,
        })
    }
}

fn required(
    value: Option<String>,
    field: &str,
    message: &str,
    errors: &mut Vec<FieldError>,
) -> Option<String> {
    if value.is_none() {
        errors.push(FieldError::new(field, message));
    }
    value
}

impl OrderItemInput {
    fn into_item(self, index: usize, errors: &mut Vec<FieldError>) -> Option<OrderItem> {
        let path = |field: &str| format!("items[{}].{}", index, field);
        let before = errors.len();

        let name = clean(self.name);
        if name.is_none() {
            errors.push(FieldError::new(path("name"), "Item name is required"));
        }

        match self.price {
            None => errors.push(FieldError::new(path("price"), "Item price is required")),
            Some(p) if p.is_sign_negative() && !p.is_zero() => {
                errors.push(FieldError::new(path("price"), "Price cannot be negative"))
            }
            Some(_) => {}
        }

        let quantity = match self.quantity {
            None => {
                errors.push(FieldError::new(path("quantity"), "Item quantity is required"));
                None
            }
            Some(q) if q < 1 => {
                errors.push(FieldError::new(path("quantity"), "Quantity must be at least 1"));
                None
            }
            Some(q) => match i32::try_from(q) {
                Ok(q) => Some(q),
                Err(_) => {
                    errors.push(FieldError::new(path("quantity"), "Quantity is too large"));
                    None
                }
            },
        };

        if errors.len() > before {
            return None;
        }

        let item = OrderItem {
            product_id: clean(self.product_id),
            name: name?,
            price: self.price?,
            quantity: quantity?,
        };
        if item.line_total().is_none() {
            errors.push(FieldError::new(path("price"), "Line total is too large"));
            return None;
        }
        Some(item)
    }
}

impl CreateOrderRequest {
    /// Checks every field and collects all failures rather than stopping at
    /// the first one.
    pub fn into_new_order(self) -> Result<NewOrder, ServiceError> {
        let mut errors = Vec::new();

        let customer = match self.customer {
            Some(customer) => customer.into_customer(&mut errors),
            None => {
                errors.push(FieldError::new("customer", "Customer information is required"));
                None
            }
        };

        let items = match self.items {
            Some(items) if !items.is_empty() => {
                if items.len() > MAX_ITEMS {
                    errors.push(FieldError::new(
                        "items",
                        format!("Order cannot contain more than {} items", MAX_ITEMS),
                    ));
                }
                // Every line is checked so all failures are reported together.
                let checked: Vec<_> = items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| item.into_item(i, &mut errors))
                    .collect();
                checked.into_iter().collect::<Option<Vec<_>>>()
            }
            _ => {
                errors.push(FieldError::new("items", "Order must contain at least one item"));
                None
            }
        };

        match self.total_amount {
            None => errors.push(FieldError::new("totalAmount", "Total amount is required")),
            Some(t) if t.is_sign_negative() && !t.is_zero() => errors.push(FieldError::new(
                "totalAmount",
                "Total amount cannot be negative",
            )),
            Some(_) => {}
        }

        match (customer, items, self.total_amount) {
            (Some(customer), Some(items), Some(total_amount)) if errors.is_empty() => Ok(NewOrder {
                customer,
                items: OrderItems(items),
                total_amount,
                payment_method: self.payment_method.unwrap_or_default(),
                notes: clean(self.notes),
            }),
            _ => Err(ServiceError::ValidationError(errors)),
        }
    }
}

impl UpdateStatusRequest {
    /// Resolves the requested status label. A missing or blank label is an
    /// invalid argument; an unknown one is a validation failure.
    pub fn parse(&self) -> Result<OrderStatus, ServiceError> {
        let raw = self
            .status
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ServiceError::InvalidInput("Status is required".to_string()))?;

        raw.parse::<OrderStatus>().map_err(|_| {
            ServiceError::invalid_field(
                "status",
                format!(
                    "Unknown order status '{}'; expected one of placed, confirmed, shipped, delivered, cancelled",
                    raw
                ),
            )
        })
    }
}
