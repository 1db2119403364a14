use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, FromJsonQueryResult, Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Persisted order. Customer and line items are embedded documents so a
/// single row carries every field a lifecycle transition touches.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "orders")]
#[serde(rename_all = "camelCase")]
#[schema(as = Order)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Human-readable business key, assigned once at creation
    #[sea_orm(unique)]
    #[schema(example = "ORD-1707556201923-482")]
    pub order_number: String,

    #[sea_orm(column_type = "Json")]
    pub customer: Customer,

    #[sea_orm(column_type = "Json")]
    pub items: OrderItems,

    /// Client-supplied total; not recomputed from `items`
    #[schema(value_type = String, example = "250.00")]
    pub total_amount: Decimal,

    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub status: OrderStatus,

    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,

    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(now);
            }
        }
        active_model.updated_at = Set(now);

        Ok(active_model)
    }
}

/// Delivery contact embedded in an order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub name: String,
    pub phone: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landmark: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pincode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// One line of an order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    pub name: String,
    #[schema(value_type = String, example = "120.00")]
    pub price: Decimal,
    pub quantity: i32,
}

impl OrderItem {
    /// Price times quantity, or `None` when the product overflows `Decimal`.
    pub fn line_total(&self) -> Option<Decimal> {
        self.price.checked_mul(Decimal::from(self.quantity))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult, ToSchema)]
#[serde(transparent)]
pub struct OrderItems(pub Vec<OrderItem>);

impl std::ops::Deref for OrderItems {
    type Target = [OrderItem];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "kebab-case")]
#[strum(ascii_case_insensitive)]
pub enum PaymentMethod {
    #[default]
    #[sea_orm(string_value = "cash-on-delivery")]
    #[serde(alias = "COD", alias = "cod")]
    #[strum(to_string = "cash-on-delivery", serialize = "cod")]
    CashOnDelivery,
    #[sea_orm(string_value = "online")]
    #[serde(alias = "ONLINE")]
    #[strum(to_string = "online")]
    Online,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PaymentStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "failed")]
    Failed,
}

/// Fulfilment status. `Confirmed` is the milestone reached once payment is
/// captured; `paid` is accepted as an input alias for it.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OrderStatus {
    #[sea_orm(string_value = "placed")]
    #[serde(alias = "pending")]
    #[strum(to_string = "placed", serialize = "pending")]
    Placed,
    #[sea_orm(string_value = "confirmed")]
    #[serde(alias = "paid")]
    #[strum(to_string = "confirmed", serialize = "paid")]
    Confirmed,
    #[sea_orm(string_value = "shipped")]
    Shipped,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "cancelled")]
    #[serde(alias = "canceled")]
    #[strum(to_string = "cancelled", serialize = "canceled")]
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::str::FromStr;

    #[test]
    fn status_parses_aliases_case_insensitively() {
        assert_eq!(OrderStatus::from_str("PAID").unwrap(), OrderStatus::Confirmed);
        assert_eq!(OrderStatus::from_str("Delivered").unwrap(), OrderStatus::Delivered);
        assert_eq!(OrderStatus::from_str("canceled").unwrap(), OrderStatus::Cancelled);
        assert!(OrderStatus::from_str("teleported").is_err());
        assert_eq!(OrderStatus::Confirmed.to_string(), "confirmed");
    }

    #[test]
    fn payment_method_accepts_legacy_spellings() {
        let cod: PaymentMethod = serde_json::from_str("\"COD\"").unwrap();
        assert_eq!(cod, PaymentMethod::CashOnDelivery);
        assert_eq!(PaymentMethod::default(), PaymentMethod::CashOnDelivery);
        let online: PaymentMethod = serde_json::from_str("\"ONLINE\"").unwrap();
        assert_eq!(online, PaymentMethod::Online);
        assert_eq!(
            serde_json::to_string(&PaymentMethod::CashOnDelivery).unwrap(),
            "\"cash-on-delivery\""
        );
    }

    #[test]
    fn line_total_multiplies_price_by_quantity() {
        let item = OrderItem {
            product_id: None,
            name: "Masala Dosa".into(),
            price: dec!(85.50),
            quantity: 2,
        };
        assert_eq!(item.line_total(), Some(dec!(171.00)));
    }

    #[test]
    fn line_total_overflow_is_none() {
        let item = OrderItem {
            product_id: None,
            name: "Banquet".into(),
            price: Decimal::MAX,
            quantity: 2,
        };
        assert_eq!(item.line_total(), None);
    }
}
