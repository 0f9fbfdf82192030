//! HTTP handlers, grouped by resource.

pub mod bookmarks;
pub mod configuration;
pub mod entities;
pub mod health;
pub mod notes;
pub mod observations;
pub mod search;

use serde::{Deserialize, Serialize};

use garden_core::defaults;

use crate::ApiError;

/// Pagination metadata for list responses.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct PaginationMeta {
    /// Total number of items matching the query (across all pages)
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
    /// True if more items are available after this page
    pub has_more: bool,
}

/// List response wrapper with pagination metadata.
///
/// ```json
/// {
///   "data": [...],
///   "pagination": { "total": 100, "limit": 20, "offset": 0, "has_more": true }
/// }
/// ```
#[derive(Serialize, Deserialize, Debug)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

impl<T: Serialize> ListResponse<T> {
    pub fn new(data: Vec<T>, total: usize, limit: usize, offset: usize) -> Self {
        let has_more = offset + data.len() < total;
        Self {
            data,
            pagination: PaginationMeta {
                total,
                limit,
                offset,
                has_more,
            },
        }
    }
}

/// `?limit=&offset=` query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PageQuery {
    /// `(limit, offset)` with defaults applied and the limit capped.
    pub fn resolve(&self) -> Result<(i64, i64), ApiError> {
        let limit = match self.limit {
            None => defaults::PAGE_LIMIT,
            Some(l) if l <= 0 => return Err(ApiError::BadRequest("limit must be >= 1".into())),
            Some(l) => l.min(defaults::PAGE_LIMIT_MAX),
        };
        let offset = match self.offset {
            None => defaults::PAGE_OFFSET,
            Some(o) if o < 0 => return Err(ApiError::BadRequest("offset must be >= 0".into())),
            Some(o) => o,
        };
        Ok((limit, offset))
    }
}

pub(crate) fn list_response<T: Serialize>(
    data: Vec<T>,
    total: i64,
    limit: i64,
    offset: i64,
) -> ListResponse<T> {
    ListResponse::new(data, total.max(0) as usize, limit as usize, offset as usize)
}
