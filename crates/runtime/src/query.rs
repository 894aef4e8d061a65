//! Query engine - turns raw list parameters into a validated query
//!
//! Validation is complete before the store is touched. Column names come
//! from the static [`Column`] allow-list; keywords are parsed according to
//! the column's type class and only ever reach SQL as bound values.

use dex_core::config::QueryConfig;
use dex_core::{
    Column, ColumnKind, Filter, Pagination, QueryError, Record, RecordQuery, ServiceError,
    SortDirection, SortSpec,
};
use dex_storage::RecordStore;
use serde::Deserialize;
use tracing::debug;

/// Raw list query parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ListParams {
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub search_column: Option<String>,
    pub keyword: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Builds and runs list queries
#[derive(Debug, Clone, Copy)]
pub struct QueryEngine {
    default_limit: u32,
    max_limit: u32,
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::new(&QueryConfig::default())
    }
}

impl QueryEngine {
    pub fn new(config: &QueryConfig) -> Self {
        Self {
            default_limit: config.default_limit,
            max_limit: config.max_limit,
        }
    }

    /// Validate `params` into a query
    pub fn build(&self, params: &ListParams) -> Result<RecordQuery, QueryError> {
        let filter = match (
            present(&params.search_column),
            params.keyword.as_deref(),
        ) {
            (Some(column), Some(keyword)) => Some(parse_filter(column, keyword)?),
            (Some(_), None) => return Err(QueryError::MissingSearchTerm),
            // A blank column with a blank keyword is the same as leaving both out
            (None, Some(keyword)) if !keyword.is_empty() => {
                return Err(QueryError::MissingSearchTerm);
            }
            (None, _) => None,
        };

        let column = match present(&params.sort_by) {
            Some(name) => name
                .parse::<Column>()
                .map_err(|_| QueryError::InvalidSortSpec(format!("unknown sort field '{name}'")))?,
            None => Column::Number,
        };
        let direction = match present(&params.sort_order) {
            Some(order) => order.parse::<SortDirection>()?,
            None => SortDirection::Asc,
        };

        let pagination = Pagination::new(
            params.page.unwrap_or(1),
            params.limit.unwrap_or(i64::from(self.default_limit)),
            self.max_limit,
        )?;

        Ok(RecordQuery {
            filter,
            sort: SortSpec { column, direction },
            pagination,
        })
    }

    /// Validate `params` and run the query against `store`
    pub async fn execute(
        &self,
        store: &dyn RecordStore,
        params: &ListParams,
    ) -> Result<Vec<Record>, ServiceError> {
        let query = self.build(params)?;
        debug!(?query, "Running list query");
        Ok(store.query(&query).await?)
    }
}

// Blank parameters count as absent.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Parse `keyword` according to the type class of `column`
pub fn parse_filter(column: &str, keyword: &str) -> Result<Filter, QueryError> {
    let column: Column = column.parse()?;
    if !column.is_searchable() {
        return Err(QueryError::InvalidColumn(column.to_string()));
    }

    let invalid = || QueryError::InvalidKeywordType {
        column,
        kind: column.kind(),
        keyword: keyword.to_string(),
    };

    match column.kind() {
        ColumnKind::Integer => {
            if keyword.is_empty() || !keyword.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            let value = keyword.parse::<i64>().map_err(|_| invalid())?;
            Ok(Filter::IntegerEquals(column, value))
        }
        ColumnKind::Boolean => match keyword.to_ascii_lowercase().as_str() {
            "true" => Ok(Filter::BooleanEquals(column, true)),
            "false" => Ok(Filter::BooleanEquals(column, false)),
            _ => Err(invalid()),
        },
        ColumnKind::Text => Ok(Filter::TextContains(column, keyword.to_string())),
    }
}
