//! Delete filters and paged listings

use serde::{Deserialize, Serialize};

use crate::{Result, TimekeepError};

/// Filter accepted by DAO deletes.
///
/// A delete must name the row it removes; a filter without `id` is rejected
/// before the store is touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFilter {
    pub id: Option<i64>,
}

impl RecordFilter {
    pub fn by_id(id: i64) -> Self {
        Self { id: Some(id) }
    }

    /// The row id, or a validation error naming `entity`.
    pub fn require_id(&self, entity: &str) -> Result<i64> {
        self.id.ok_or_else(|| {
            TimekeepError::validation(format!("{entity} delete requires an id"))
        })
    }
}

/// One page of a listing plus the total row count for the filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    /// 1-based page number actually served
    pub page: usize,
    pub limit: usize,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        if self.limit == 0 {
            return 0;
        }
        self.total.div_ceil(self.limit as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_id_rejects_empty_filter() {
        let err = RecordFilter::default().require_id("screenshot").unwrap_err();
        assert_eq!(err, TimekeepError::Validation("screenshot delete requires an id".into()));
        assert_eq!(RecordFilter::by_id(9).require_id("screenshot").unwrap(), 9);
    }

    #[test]
    fn total_pages_rounds_up() {
        let page: Page<()> = Page { items: vec![], total: 41, page: 1, limit: 20 };
        assert_eq!(page.total_pages(), 3);
    }
}
