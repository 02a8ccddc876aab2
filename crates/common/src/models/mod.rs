//! Domain model for Fundscope
//!
//! Source records, the immutable data context built from them, and the
//! transient query/result types of the question pipeline.

mod analysis;
mod data_context;
mod entities;
mod fiscal_year;
mod query;

pub use analysis::{
    AnalysisRecord, AnalysisResult, ContributionRecord, FunderSummary, MetricValue,
    ProspectRecord, StatePerformance, TargetStatus, YearTrend, ATTENTION_THRESHOLD,
    ON_TRACK_THRESHOLD,
};
pub use data_context::{CollectionSizes, Collections, DataContext};
pub use entities::{Contribution, Funder, Prospect, School, State, StateTarget};
pub use fiscal_year::{FiscalYear, FiscalYearParseError, FISCAL_YEAR_START_MONTH};
pub use query::{
    CoarseIntent, DataQuery, QueryFilters, QueryParameters, QueryType, SortDirection,
};
