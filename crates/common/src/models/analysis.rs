//! Normalized analyzer output

use super::{FiscalYear, QueryType};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Achievement below this percentage flags a state for attention
pub const ATTENTION_THRESHOLD: f64 = 50.0;

/// Achievement at or above this percentage counts as on track
pub const ON_TRACK_THRESHOLD: f64 = 80.0;

/// A named metric: a single number or a labelled breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Breakdown(BTreeMap<String, f64>),
}

impl MetricValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            MetricValue::Number(n) => Some(*n),
            MetricValue::Breakdown(_) => None,
        }
    }

    pub fn as_breakdown(&self) -> Option<&BTreeMap<String, f64>> {
        match self {
            MetricValue::Breakdown(map) => Some(map),
            MetricValue::Number(_) => None,
        }
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        MetricValue::Number(value)
    }
}

impl From<u64> for MetricValue {
    fn from(value: u64) -> Self {
        MetricValue::Number(value as f64)
    }
}

impl From<usize> for MetricValue {
    fn from(value: usize) -> Self {
        MetricValue::Number(value as f64)
    }
}

impl From<BTreeMap<String, f64>> for MetricValue {
    fn from(value: BTreeMap<String, f64>) -> Self {
        MetricValue::Breakdown(value)
    }
}

/// Where a state stands against its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    Exceeded,
    OnTrack,
    Behind,
    Critical,
    NoTarget,
}

impl TargetStatus {
    pub fn classify(achievement_rate: f64, target: u64) -> Self {
        if target == 0 {
            TargetStatus::NoTarget
        } else if achievement_rate >= 100.0 {
            TargetStatus::Exceeded
        } else if achievement_rate >= ON_TRACK_THRESHOLD {
            TargetStatus::OnTrack
        } else if achievement_rate >= ATTENTION_THRESHOLD {
            TargetStatus::Behind
        } else {
            TargetStatus::Critical
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunderSummary {
    pub funder_id: String,
    pub funder_name: String,
    pub total_amount: u64,
    pub contribution_count: usize,
    pub state_count: usize,
    pub average_contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatePerformance {
    pub state_code: String,
    pub state_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinator: Option<String>,
    pub secured: u64,
    pub target: u64,
    pub achievement_rate: f64,
    pub shortfall: u64,
    pub funder_count: usize,
    pub status: TargetStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionRecord {
    pub id: String,
    pub funder_id: String,
    pub funder_name: String,
    pub state_code: String,
    pub fiscal_year: String,
    pub amount: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initiative: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProspectRecord {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_code: Option<String>,
    pub stage: String,
    pub estimated_amount: u64,
    pub probability: f64,
    pub weighted_value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearTrend {
    pub fiscal_year: FiscalYear,
    pub contribution_count: usize,
    pub total_amount: u64,
    /// Percent change in amount against the previous year in the series
    pub amount_growth_rate: f64,
    pub count_growth_rate: f64,
}

/// One enriched row of an analysis, typed per analyzer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnalysisRecord {
    Funder(FunderSummary),
    State(StatePerformance),
    Contribution(ContributionRecord),
    Prospect(ProspectRecord),
    Year(YearTrend),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    #[serde(rename = "type")]
    pub query_type: QueryType,
    pub summary: String,
    pub data: Vec<AnalysisRecord>,
    pub insights: Vec<String>,
    pub metrics: BTreeMap<String, MetricValue>,
}

impl AnalysisResult {
    pub fn new(query_type: QueryType, summary: impl Into<String>) -> Self {
        Self {
            query_type,
            summary: summary.into(),
            data: Vec::new(),
            insights: Vec::new(),
            metrics: BTreeMap::new(),
        }
    }

    pub fn set_metric(&mut self, name: &str, value: impl Into<MetricValue>) {
        self.metrics.insert(name.to_string(), value.into());
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).and_then(MetricValue::as_number)
    }

    pub fn breakdown(&self, name: &str) -> Option<&BTreeMap<String, f64>> {
        self.metrics.get(name).and_then(MetricValue::as_breakdown)
    }

    /// Insights joined as a bullet list, used when no prose is available
    pub fn insights_text(&self) -> String {
        let mut text = self.summary.clone();
        for insight in &self.insights {
            text.push_str("\n- ");
            text.push_str(insight);
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_buckets() {
        assert_eq!(TargetStatus::classify(25.0, 40), TargetStatus::Critical);
        assert_eq!(TargetStatus::classify(50.0, 40), TargetStatus::Behind);
        assert_eq!(TargetStatus::classify(80.0, 40), TargetStatus::OnTrack);
        assert_eq!(TargetStatus::classify(100.0, 40), TargetStatus::Exceeded);
        assert_eq!(TargetStatus::classify(0.0, 0), TargetStatus::NoTarget);
    }

    #[test]
    fn test_metric_accessors() {
        let mut result = AnalysisResult::new(QueryType::GeneralQuery, "Overview");
        result.set_metric("total", 12u64);
        let mut months = BTreeMap::new();
        months.insert("2024-05".to_string(), 10.0);
        result.set_metric("monthly", months);

        assert_eq!(result.metric("total"), Some(12.0));
        assert_eq!(result.metric("monthly"), None);
        assert_eq!(result.breakdown("monthly").unwrap()["2024-05"], 10.0);
        assert!(result.breakdown("total").is_none());
    }

    #[test]
    fn test_insights_text() {
        let mut result = AnalysisResult::new(QueryType::GeneralQuery, "Overview");
        result.insights.push("First".into());
        result.insights.push("Second".into());
        assert_eq!(result.insights_text(), "Overview\n- First\n- Second");
    }
}
