//! Query DSL construction for the search bar: rule filters, KQL
//! conversion, chart queries and response reshaping.

pub mod composite;
pub mod config;
pub mod es_client;
pub mod filters;
pub mod interval;
pub mod kql;
pub mod reshape;
pub mod series;
pub mod terms;

use searchbar_core::BackendError;
use searchbar_core::parser::ParseError;
use thiserror::Error;

pub use composite::{
    CompositeBucket, build_grouped_query, build_ungrouped_query, get_grouped_results,
};
pub use config::{Comparator, Criterion, RuleConfig, load_config};
pub use es_client::ElasticsearchClient;
pub use filters::{FilterSet, build_criterion_query, build_filters};
pub use interval::{Interval, IntervalError, TimeUnit, parse_interval};
pub use kql::{build_query_from_kql, kql_to_query};
pub use reshape::{Series, SeriesPoint, group_series, reshape_aggregation_response};
pub use series::{
    GroupBy, LogsTarget, Metric, MetricKind, SeriesTarget, SortOrder, build_logs_query,
    build_series_query,
};

#[derive(Error, Debug)]
pub enum DslError {
    #[error(transparent)]
    Interval(#[from] IntervalError),

    #[error("invalid query: {0}")]
    Parse(#[from] ParseError),

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("invalid query body: {0}")]
    InvalidQuery(String),

    #[error("time range starts after it ends ({gte} > {lte})")]
    InvalidTimeRange { gte: i64, lte: i64 },

    #[error("stopped paging grouped results after {pages} pages")]
    PaginationLimit { pages: usize },
}
