//! Structured form of a user's question

use super::FiscalYear;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Analysis category a question is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    FunderAnalysis,
    StatePerformance,
    ContributionHistory,
    PipelineAnalysis,
    TrendAnalysis,
    GeneralQuery,
}

impl QueryType {
    pub const ALL: [QueryType; 6] = [
        QueryType::FunderAnalysis,
        QueryType::StatePerformance,
        QueryType::ContributionHistory,
        QueryType::PipelineAnalysis,
        QueryType::TrendAnalysis,
        QueryType::GeneralQuery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::FunderAnalysis => "funder_analysis",
            QueryType::StatePerformance => "state_performance",
            QueryType::ContributionHistory => "contribution_history",
            QueryType::PipelineAnalysis => "pipeline_analysis",
            QueryType::TrendAnalysis => "trend_analysis",
            QueryType::GeneralQuery => "general_query",
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        QueryType::ALL
            .into_iter()
            .find(|t| t.as_str() == needle)
            .ok_or_else(|| format!("unknown query type '{}'", s))
    }
}

/// Coarse intent of a question, independent of its category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoarseIntent {
    GetTotalAmount,
    ListEntities,
    CompareEntities,
    AnalyzeTrends,
    FindTopPerformers,
    FindUnderperformers,
    GeneralInquiry,
}

impl CoarseIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoarseIntent::GetTotalAmount => "get_total_amount",
            CoarseIntent::ListEntities => "list_entities",
            CoarseIntent::CompareEntities => "compare_entities",
            CoarseIntent::AnalyzeTrends => "analyze_trends",
            CoarseIntent::FindTopPerformers => "find_top_performers",
            CoarseIntent::FindUnderperformers => "find_underperformers",
            CoarseIntent::GeneralInquiry => "general_inquiry",
        }
    }
}

impl fmt::Display for CoarseIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Filters narrowing which records an analyzer looks at.
/// An unset filter means "no restriction".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fiscal_year: Option<FiscalYear>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub funder_id: Option<String>,
}

impl QueryFilters {
    pub fn is_empty(&self) -> bool {
        self.state_code.is_none() && self.fiscal_year.is_none() && self.funder_id.is_none()
    }
}

/// Category-specific knobs extracted from the question text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryParameters {
    /// "top 5", "last 20"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortDirection>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub above_target: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub below_target: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_probability: Option<f64>,
    /// "last 3 years"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub years: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataQuery {
    #[serde(rename = "type")]
    pub query_type: QueryType,
    #[serde(default)]
    pub filters: QueryFilters,
    #[serde(default)]
    pub parameters: QueryParameters,
}

impl DataQuery {
    pub fn new(query_type: QueryType) -> Self {
        Self {
            query_type,
            filters: QueryFilters::default(),
            parameters: QueryParameters::default(),
        }
    }

    pub fn with_fiscal_year(mut self, fiscal_year: FiscalYear) -> Self {
        self.filters.fiscal_year = Some(fiscal_year);
        self
    }

    pub fn with_state(mut self, state_code: impl Into<String>) -> Self {
        self.filters.state_code = Some(state_code.into());
        self
    }

    pub fn with_funder(mut self, funder_id: impl Into<String>) -> Self {
        self.filters.funder_id = Some(funder_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_type_names_round_trip() {
        for query_type in QueryType::ALL {
            assert_eq!(query_type.as_str().parse::<QueryType>().unwrap(), query_type);
            let json = serde_json::to_string(&query_type).unwrap();
            assert_eq!(json, format!("\"{}\"", query_type.as_str()));
        }
        assert!("sales_report".parse::<QueryType>().is_err());
    }

    #[test]
    fn test_query_serialization_skips_unset() {
        let query = DataQuery::new(QueryType::StatePerformance)
            .with_state("KA")
            .with_fiscal_year("FY24-25".parse().unwrap());
        let value = serde_json::to_value(&query).unwrap();
        assert_eq!(value["type"], "state_performance");
        assert_eq!(value["filters"]["stateCode"], "KA");
        assert_eq!(value["filters"]["fiscalYear"], "FY24-25");
        assert!(value["filters"].get("funderId").is_none());
        assert!(value["parameters"].get("aboveTarget").is_none());
    }
}
