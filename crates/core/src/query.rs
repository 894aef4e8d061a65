//! Query types
//!
//! Static column metadata and the validated query shape shared by the
//! QueryEngine (which builds it) and the record stores (which execute it).
//! Column names only ever reach SQL through [`Column::sql_name`].

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::record::Record;

/// Query validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("Invalid search column: {0}")]
    InvalidColumn(String),

    #[error("Invalid keyword '{keyword}' for {kind} column '{column}'")]
    InvalidKeywordType {
        column: Column,
        kind: ColumnKind,
        keyword: String,
    },

    #[error("Invalid sort specification: {0}")]
    InvalidSortSpec(String),

    #[error("Invalid pagination: {0}")]
    InvalidPagination(String),

    #[error("search_column and keyword must be given together")]
    MissingSearchTerm,
}

/// Type class of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Integer,
    Boolean,
    Text,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnKind::Integer => "integer",
            ColumnKind::Boolean => "boolean",
            ColumnKind::Text => "text",
        };
        f.write_str(name)
    }
}

/// Every column of the records table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Id,
    Number,
    Name,
    CategoryPrimary,
    CategorySecondary,
    Total,
    Hp,
    Attack,
    Defense,
    SpAtk,
    SpDef,
    Speed,
    Generation,
    Legendary,
}

impl Column {
    pub const ALL: [Column; 14] = [
        Column::Id,
        Column::Number,
        Column::Name,
        Column::CategoryPrimary,
        Column::CategorySecondary,
        Column::Total,
        Column::Hp,
        Column::Attack,
        Column::Defense,
        Column::SpAtk,
        Column::SpDef,
        Column::Speed,
        Column::Generation,
        Column::Legendary,
    ];

    /// Column name, identical in the API and in SQL
    pub fn sql_name(self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::Number => "number",
            Column::Name => "name",
            Column::CategoryPrimary => "category_primary",
            Column::CategorySecondary => "category_secondary",
            Column::Total => "total",
            Column::Hp => "hp",
            Column::Attack => "attack",
            Column::Defense => "defense",
            Column::SpAtk => "sp_atk",
            Column::SpDef => "sp_def",
            Column::Speed => "speed",
            Column::Generation => "generation",
            Column::Legendary => "legendary",
        }
    }

    pub fn kind(self) -> ColumnKind {
        match self {
            Column::Name | Column::CategoryPrimary | Column::CategorySecondary => ColumnKind::Text,
            Column::Legendary => ColumnKind::Boolean,
            _ => ColumnKind::Integer,
        }
    }

    /// The surrogate id can be sorted on but not searched
    pub fn is_searchable(self) -> bool {
        self != Column::Id
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_name())
    }
}

impl FromStr for Column {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Column::ALL
            .into_iter()
            .find(|column| column.sql_name() == s)
            .ok_or_else(|| QueryError::InvalidColumn(s.to_string()))
    }
}

/// Borrowed, typed view of a single field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Integer(i64),
    Boolean(bool),
    Text(Option<&'a str>),
}

impl FieldValue<'_> {
    /// Ordering used for sorting; nulls sort first, like SQLite
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (FieldValue::Integer(a), FieldValue::Integer(b)) => a.cmp(b),
            (FieldValue::Boolean(a), FieldValue::Boolean(b)) => a.cmp(b),
            (FieldValue::Text(a), FieldValue::Text(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

/// A typed match condition on one column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    IntegerEquals(Column, i64),
    BooleanEquals(Column, bool),
    /// Case-insensitive substring match
    TextContains(Column, String),
}

impl Filter {
    pub fn column(&self) -> Column {
        match self {
            Filter::IntegerEquals(column, _)
            | Filter::BooleanEquals(column, _)
            | Filter::TextContains(column, _) => *column,
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        match (self, record.value(self.column())) {
            (Filter::IntegerEquals(_, expected), FieldValue::Integer(actual)) => actual == *expected,
            (Filter::BooleanEquals(_, expected), FieldValue::Boolean(actual)) => actual == *expected,
            (Filter::TextContains(_, keyword), FieldValue::Text(Some(actual))) => actual
                .to_lowercase()
                .contains(&keyword.to_lowercase()),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn sql_keyword(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            _ => Err(QueryError::InvalidSortSpec(format!(
                "sort_order must be 'asc' or 'desc', got '{s}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub column: Column,
    pub direction: SortDirection,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            column: Column::Number,
            direction: SortDirection::Asc,
        }
    }
}

impl SortSpec {
    /// Sort order with `id` ascending as the tie breaker
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        let primary = a.value(self.column).compare(&b.value(self.column));
        let primary = match self.direction {
            SortDirection::Asc => primary,
            SortDirection::Desc => primary.reverse(),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

/// A validated page window; both values are at least 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: u32,
    limit: u32,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, max_limit: u32) -> Result<Self, QueryError> {
        if page < 1 {
            return Err(QueryError::InvalidPagination(format!(
                "page must be at least 1, got {page}"
            )));
        }
        if limit < 1 || limit > i64::from(max_limit) {
            return Err(QueryError::InvalidPagination(format!(
                "limit must be between 1 and {max_limit}, got {limit}"
            )));
        }
        let page = u32::try_from(page).map_err(|_| {
            QueryError::InvalidPagination(format!("page {page} is out of range"))
        })?;
        Ok(Self {
            page,
            limit: limit as u32,
        })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

/// A fully validated list query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    pub filter: Option<Filter>,
    pub sort: SortSpec,
    pub pagination: Pagination,
}
