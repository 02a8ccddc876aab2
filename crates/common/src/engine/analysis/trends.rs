//! Year-over-year contribution trends

use super::{format_amount, format_rate};
use crate::models::{
    AnalysisRecord, AnalysisResult, DataContext, DataQuery, FiscalYear, QueryType, YearTrend,
};
use std::collections::BTreeMap;

/// Percent change from `previous`, or 0 when `previous` is 0
fn growth(previous: f64, current: f64) -> f64 {
    if previous == 0.0 {
        0.0
    } else {
        100.0 * (current - previous) / previous
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Cross-year comparison over every contribution. State, fiscal year and
/// funder filters are not applied.
pub(super) fn analyze(context: &DataContext, query: &DataQuery) -> AnalysisResult {
    let mut by_year: BTreeMap<FiscalYear, (usize, u64)> = BTreeMap::new();
    let mut unlabelled = 0usize;
    for contribution in context.contributions() {
        match contribution.fiscal_year() {
            Some(fy) => {
                let entry = by_year.entry(fy).or_default();
                entry.0 += 1;
                entry.1 += contribution.amount;
            }
            None => unlabelled += 1,
        }
    }

    let mut years: Vec<(FiscalYear, usize, u64)> = by_year
        .into_iter()
        .map(|(fy, (count, amount))| (fy, count, amount))
        .collect();
    if let Some(keep) = query.parameters.years {
        let skip = years.len().saturating_sub(keep);
        years.drain(..skip);
    }

    let mut rows: Vec<YearTrend> = Vec::with_capacity(years.len());
    for (i, &(fiscal_year, count, amount)) in years.iter().enumerate() {
        let (amount_growth_rate, count_growth_rate) = match i.checked_sub(1).map(|p| years[p]) {
            Some((_, prev_count, prev_amount)) => (
                growth(prev_amount as f64, amount as f64),
                growth(prev_count as f64, count as f64),
            ),
            None => (0.0, 0.0),
        };
        rows.push(YearTrend {
            fiscal_year,
            contribution_count: count,
            total_amount: amount,
            amount_growth_rate,
            count_growth_rate,
        });
    }

    // Transitions only; the first year has no predecessor
    let amount_growths: Vec<f64> = rows.iter().skip(1).map(|r| r.amount_growth_rate).collect();
    let count_growths: Vec<f64> = rows.iter().skip(1).map(|r| r.count_growth_rate).collect();
    let mean_amount_growth = mean(&amount_growths);
    let mean_count_growth = mean(&count_growths);

    // Highest amount; earliest year among ties
    let peak = rows.iter().fold(None::<&YearTrend>, |best, row| match best {
        Some(b) if b.total_amount >= row.total_amount => best,
        _ => Some(row),
    });

    let summary = match (rows.first(), rows.last()) {
        (Some(first), Some(last)) => format!(
            "Contributions across {} fiscal years, {} to {}",
            rows.len(),
            first.fiscal_year,
            last.fiscal_year
        ),
        _ => "No fiscal-year contributions to compare".to_string(),
    };
    let mut result = AnalysisResult::new(QueryType::TrendAnalysis, summary);

    if let (Some(first), Some(latest)) = (rows.first(), rows.last()) {
        result.insights.push(format!(
            "Data spans {} fiscal years ({} to {})",
            rows.len(),
            first.fiscal_year,
            latest.fiscal_year
        ));
        result.insights.push(format!(
            "Latest year {}: {} from {} contributions",
            latest.fiscal_year,
            format_amount(latest.total_amount),
            latest.contribution_count
        ));
    }
    if let Some(peak) = peak {
        result.insights.push(format!(
            "Peak year: {} with {}",
            peak.fiscal_year,
            format_amount(peak.total_amount)
        ));
    }
    if !amount_growths.is_empty() {
        result.insights.push(format!(
            "Average year-over-year growth in amount: {}{}",
            if mean_amount_growth >= 0.0 { "+" } else { "" },
            format_rate(mean_amount_growth)
        ));
    }

    result.set_metric("year_count", rows.len());
    result.set_metric("mean_amount_growth_rate", mean_amount_growth);
    result.set_metric("mean_count_growth_rate", mean_count_growth);
    result.set_metric("unlabelled_contributions", unlabelled);
    result.set_metric(
        "yearly_amounts",
        rows.iter()
            .map(|r| (r.fiscal_year.to_string(), r.total_amount as f64))
            .collect::<BTreeMap<_, _>>(),
    );

    result.data = rows.into_iter().map(AnalysisRecord::Year).collect();
    result
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use crate::models::Collections;

    fn trend_rows(result: &AnalysisResult) -> Vec<&YearTrend> {
        result
            .data
            .iter()
            .filter_map(|r| match r {
                AnalysisRecord::Year(y) => Some(y),
                _ => None,
            })
            .collect()
    }

    fn history() -> Collections {
        Collections {
            contributions: vec![
                contribution("C1", "F1", "KA", "FY24-25", 300, None),
                contribution("C2", "F1", "KA", "FY22-23", 100, None),
                contribution("C3", "F2", "MH", "2023-24", 150, None),
                contribution("C4", "F2", "MH", "FY23-24", 50, None),
                contribution("C5", "F2", "MH", "someday", 999, None),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_years_ascending_with_growth() {
        let context = context(history());
        let result = analyze(&context, &DataQuery::new(QueryType::TrendAnalysis));

        let rows = trend_rows(&result);
        let labels: Vec<String> = rows.iter().map(|r| r.fiscal_year.to_string()).collect();
        assert_eq!(labels, vec!["FY22-23", "FY23-24", "FY24-25"]);
        assert_eq!(rows[0].amount_growth_rate, 0.0);
        assert_eq!(rows[1].amount_growth_rate, 100.0);
        assert_eq!(rows[1].count_growth_rate, 100.0);
        assert_eq!(rows[2].amount_growth_rate, 50.0);
        assert_eq!(rows[2].count_growth_rate, -50.0);
        assert_eq!(result.metric("mean_amount_growth_rate"), Some(75.0));
        assert_eq!(result.metric("unlabelled_contributions"), Some(1.0));
        assert!(result.insights.contains(&"Peak year: FY24-25 with 300".to_string()));
    }

    #[test]
    fn test_filters_are_ignored() {
        let context = context(history());
        let query = DataQuery::new(QueryType::TrendAnalysis)
            .with_state("KA")
            .with_fiscal_year("FY24-25".parse().unwrap());
        let result = analyze(&context, &query);
        assert_eq!(result.metric("year_count"), Some(3.0));
    }

    #[test]
    fn test_growth_from_zero_is_zero() {
        assert_eq!(growth(0.0, 500.0), 0.0);
        assert_eq!(growth(200.0, 100.0), -50.0);
    }

    #[test]
    fn test_years_parameter_keeps_latest() {
        let context = context(history());
        let mut query = DataQuery::new(QueryType::TrendAnalysis);
        query.parameters.years = Some(2);
        let result = analyze(&context, &query);

        let rows = trend_rows(&result);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].fiscal_year.to_string(), "FY23-24");
        // growth is measured within the kept window
        assert_eq!(rows[0].amount_growth_rate, 0.0);
    }

    #[test]
    fn test_single_year_has_no_mean_growth() {
        let context = context(Collections {
            contributions: vec![contribution("C1", "F1", "KA", "FY24-25", 300, None)],
            ..Default::default()
        });
        let result = analyze(&context, &DataQuery::new(QueryType::TrendAnalysis));
        assert_eq!(result.metric("mean_amount_growth_rate"), Some(0.0));
        assert_eq!(result.insights.len(), 3);
    }
}
