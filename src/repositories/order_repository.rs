use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Select, SqlErr,
};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::entities::order::{
    ActiveModel as OrderActiveModel, Column, Entity as Order, Model as OrderModel, OrderStatus,
};
use crate::errors::ServiceError;
use crate::repositories::Repository;

use super::BaseRepository;

/// True when `err` is the store rejecting a duplicate unique key.
pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Persistence for order documents
#[derive(Debug, Clone)]
pub struct OrderRepository {
    base: BaseRepository,
}

impl OrderRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Inserts a new order. The raw `DbErr` is returned so callers can tell a
    /// unique-key collision apart from other failures.
    pub async fn insert(&self, order: OrderActiveModel) -> Result<OrderModel, DbErr> {
        order.insert(self.base.get_db()).await
    }

    /// Find an order by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<OrderModel>, ServiceError> {
        Ok(Order::find_by_id(id).one(self.base.get_db()).await?)
    }

    /// Find an order by its human-readable number
    pub async fn find_by_order_number(
        &self,
        order_number: &str,
    ) -> Result<Option<OrderModel>, ServiceError> {
        Ok(Order::find()
            .filter(Column::OrderNumber.eq(order_number))
            .one(self.base.get_db())
            .await?)
    }

    /// Newest-first page of orders, optionally restricted to one status.
    /// `page` is 1-based. Returns the page and the total matching count.
    pub async fn list(
        &self,
        status: Option<OrderStatus>,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<OrderModel>, u64), ServiceError> {
        let paginator = Self::filtered(status)
            .order_by_desc(Column::CreatedAt)
            .order_by_desc(Column::Id)
            .paginate(self.base.get_db(), page_size);

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;

        debug!(
            total,
            page,
            page_size,
            returned = orders.len(),
            "fetched order page"
        );
        Ok((orders, total))
    }

    /// Number of orders, optionally restricted to one status
    pub async fn count(&self, status: Option<OrderStatus>) -> Result<u64, ServiceError> {
        Ok(Self::filtered(status).count(self.base.get_db()).await?)
    }

    /// Persists the changed fields of an existing order
    pub async fn update(&self, order: OrderActiveModel) -> Result<OrderModel, ServiceError> {
        Ok(order.update(self.base.get_db()).await?)
    }

    /// Deletes an order. Returns false when no row matched.
    pub async fn delete(&self, id: Uuid) -> Result<bool, ServiceError> {
        let result = Order::delete_by_id(id).exec(self.base.get_db()).await?;
        Ok(result.rows_affected > 0)
    }

    fn filtered(status: Option<OrderStatus>) -> Select<Order> {
        match status {
            Some(status) => Order::find().filter(Column::Status.eq(status)),
            None => Order::find(),
        }
    }
}

impl Repository for OrderRepository {
    fn get_db(&self) -> &DatabaseConnection {
        self.base.get_db()
    }
}
