use crate::errors::ServiceError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Pagination metadata attached to list responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaginationMeta {
    /// Items matching the filter across all pages
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    /// Number of pages at this limit
    pub pages: u64,
}

impl PaginationMeta {
    pub fn new(total: u64, page: u64, limit: u64) -> Self {
        let pages = if limit == 0 { 0 } else { total.div_ceil(limit) };
        Self {
            total,
            page,
            limit,
            pages,
        }
    }
}

/// Parses a path identifier before any store access, so a malformed id is a
/// bad request rather than a missing order.
pub fn parse_order_id(raw: &str) -> Result<Uuid, ServiceError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| ServiceError::InvalidInput("Invalid order ID format".to_string()))
}

/// Parses an optional numeric query parameter.
pub fn parse_query_number(name: &str, raw: Option<&str>) -> Result<Option<u64>, ServiceError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(value) => value.parse::<u64>().map(Some).map_err(|_| {
            ServiceError::invalid_field(name, format!("{} must be a positive integer", name))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn pagination_meta_rounds_pages_up() {
        assert_eq!(PaginationMeta::new(0, 1, 50).pages, 0);
        assert_eq!(PaginationMeta::new(10, 1, 10).pages, 1);
        assert_eq!(PaginationMeta::new(11, 2, 10).pages, 2);
    }

    #[test]
    fn order_ids_must_be_uuids() {
        assert!(parse_order_id("7f9c24e8-3b12-4fef-91e0-a5bd3f1a2c11").is_ok());
        assert_matches!(parse_order_id("not-an-id"), Err(ServiceError::InvalidInput(_)));
        assert_matches!(parse_order_id("64b7f0c2e1"), Err(ServiceError::InvalidInput(_)));
    }

    #[test]
    fn query_numbers() {
        assert_eq!(parse_query_number("limit", None).unwrap(), None);
        assert_eq!(parse_query_number("limit", Some("")).unwrap(), None);
        assert_eq!(parse_query_number("limit", Some("10")).unwrap(), Some(10));
        assert_matches!(
            parse_query_number("limit", Some("ten")),
            Err(ServiceError::ValidationError(_))
        );
    }
}
