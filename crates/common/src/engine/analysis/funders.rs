//! Funder ranking for a fiscal year

use super::{format_amount, funder_name};
use crate::models::{
    AnalysisRecord, AnalysisResult, DataContext, DataQuery, FunderSummary, QueryType,
    SortDirection,
};
use std::collections::{BTreeMap, BTreeSet};

const DEFAULT_LIMIT: usize = 10;

#[derive(Default)]
struct FunderTotals<'a> {
    total: u64,
    count: usize,
    states: BTreeSet<&'a str>,
}

pub(super) fn analyze(context: &DataContext, query: &DataQuery) -> AnalysisResult {
    let fiscal_year = query
        .filters
        .fiscal_year
        .unwrap_or_else(|| context.current_fiscal_year());
    let state = query.filters.state_code.as_deref();
    let only_funder = query.filters.funder_id.as_deref();

    let mut by_funder: BTreeMap<&str, FunderTotals> = BTreeMap::new();
    for contribution in context.contributions().iter().filter(|c| {
        c.in_fiscal_year(fiscal_year)
            && state.map_or(true, |s| c.state_code == s)
            && only_funder.map_or(true, |f| c.funder_id == f)
    }) {
        let totals = by_funder.entry(contribution.funder_id.as_str()).or_default();
        totals.total += contribution.amount;
        totals.count += 1;
        totals.states.insert(contribution.state_code.as_str());
    }

    let mut rows: Vec<FunderSummary> = by_funder
        .iter()
        .map(|(funder_id, totals)| FunderSummary {
            funder_id: funder_id.to_string(),
            funder_name: funder_name(context, funder_id),
            total_amount: totals.total,
            contribution_count: totals.count,
            state_count: totals.states.len(),
            average_contribution: totals.total as f64 / totals.count as f64,
        })
        .collect();

    let ascending = query.parameters.sort == Some(SortDirection::Asc);
    rows.sort_by(|a, b| {
        let by_total = if ascending {
            a.total_amount.cmp(&b.total_amount)
        } else {
            b.total_amount.cmp(&a.total_amount)
        };
        by_total.then_with(|| a.funder_id.cmp(&b.funder_id))
    });

    let active_funders = rows.len();
    let total_amount: u64 = rows.iter().map(|r| r.total_amount).sum();
    let contribution_count: usize = rows.iter().map(|r| r.contribution_count).sum();
    let multi_state = rows.iter().filter(|r| r.state_count > 1).count();
    let average_per_funder = if active_funders == 0 {
        0.0
    } else {
        total_amount as f64 / active_funders as f64
    };

    let scope = match state {
        Some(code) => format!("{} in {}", fiscal_year, code),
        None => fiscal_year.to_string(),
    };
    let summary = if active_funders == 0 {
        format!("No funder contributions recorded for {}", scope)
    } else {
        format!(
            "{} active funders contributed {} in {}",
            active_funders,
            format_amount(total_amount),
            scope
        )
    };

    let mut result = AnalysisResult::new(QueryType::FunderAnalysis, summary);

    if let Some(top) = rows.first() {
        let label = if ascending { "Smallest funder" } else { "Top funder" };
        result.insights.push(format!(
            "{}: {} with {}",
            label,
            top.funder_name,
            format_amount(top.total_amount)
        ));
        result
            .insights
            .push(format!("{} funders active in {}", active_funders, scope));
        result.insights.push(format!(
            "Average per active funder: {}",
            format_amount(average_per_funder.round() as u64)
        ));
        result
            .insights
            .push(format!("{} funders support more than one state", multi_state));
    }

    result.set_metric("active_funders", active_funders);
    result.set_metric("total_amount", total_amount);
    result.set_metric("contribution_count", contribution_count);
    result.set_metric("average_per_funder", average_per_funder);
    result.set_metric("multi_state_funders", multi_state);

    let limit = query.parameters.limit.unwrap_or(DEFAULT_LIMIT);
    result.data = rows
        .into_iter()
        .take(limit)
        .map(AnalysisRecord::Funder)
        .collect();

    result
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use crate::models::{Collections, FiscalYear};

    fn fy(label: &str) -> FiscalYear {
        label.parse().unwrap()
    }

    fn rows(result: &AnalysisResult) -> Vec<&FunderSummary> {
        result
            .data
            .iter()
            .filter_map(|r| match r {
                AnalysisRecord::Funder(f) => Some(f),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_ranks_by_total_descending() {
        let context = context(Collections {
            funders: vec![funder("F1", "Alpha"), funder("F2", "Beta")],
            contributions: vec![
                contribution("C1", "F1", "KA", "FY24-25", 8_000_000, None),
                contribution("C2", "F2", "KA", "FY24-25", 12_000_000, None),
            ],
            ..Default::default()
        });
        let query = DataQuery::new(QueryType::FunderAnalysis).with_fiscal_year(fy("FY24-25"));
        let result = analyze(&context, &query);

        let ranked = rows(&result);
        assert_eq!(ranked[0].funder_name, "Beta");
        assert_eq!(ranked[0].total_amount, 12_000_000);
        assert_eq!(ranked[1].funder_name, "Alpha");
        assert_eq!(ranked[1].total_amount, 8_000_000);
        assert_eq!(result.metric("active_funders"), Some(2.0));
        assert_eq!(result.insights[0], "Top funder: Beta with 12,000,000");
    }

    #[test]
    fn test_groups_per_funder_and_counts_states() {
        let context = context(Collections {
            funders: vec![funder("F1", "Alpha")],
            contributions: vec![
                contribution("C1", "F1", "KA", "FY24-25", 100, None),
                contribution("C2", "F1", "MH", "2024-25", 300, None),
                contribution("C3", "F1", "MH", "FY23-24", 999, None),
                contribution("C4", "F9", "KA", "FY24-25", 50, None),
            ],
            ..Default::default()
        });
        // defaults to the current fiscal year of the context
        let result = analyze(&context, &DataQuery::new(QueryType::FunderAnalysis));

        let ranked = rows(&result);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].total_amount, 400);
        assert_eq!(ranked[0].contribution_count, 2);
        assert_eq!(ranked[0].state_count, 2);
        assert_eq!(ranked[0].average_contribution, 200.0);
        assert_eq!(ranked[1].funder_name, "Unknown Funder");
        assert_eq!(result.metric("multi_state_funders"), Some(1.0));
    }

    #[test]
    fn test_limit_sort_and_ties() {
        let funders: Vec<_> = (1..=12)
            .map(|i| funder(&format!("F{:02}", i), &format!("Funder {}", i)))
            .collect();
        let contributions: Vec<_> = (1..=12)
            .map(|i| {
                contribution(
                    &format!("C{}", i),
                    &format!("F{:02}", i),
                    "KA",
                    "FY24-25",
                    if i <= 2 { 500 } else { i as u64 * 10 },
                    None,
                )
            })
            .collect();
        let context = context(Collections {
            funders,
            contributions,
            ..Default::default()
        });

        let result = analyze(&context, &DataQuery::new(QueryType::FunderAnalysis));
        let ranked = rows(&result);
        assert_eq!(ranked.len(), 10);
        // equal totals keep id order
        assert_eq!(ranked[0].funder_id, "F01");
        assert_eq!(ranked[1].funder_id, "F02");

        let mut query = DataQuery::new(QueryType::FunderAnalysis);
        query.parameters.limit = Some(3);
        query.parameters.sort = Some(SortDirection::Asc);
        let result = analyze(&context, &query);
        let ranked = rows(&result);
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].funder_id, "F03");
        assert_eq!(result.metric("active_funders"), Some(12.0));
    }

    #[test]
    fn test_empty_year_yields_zeroes() {
        let context = context(Collections {
            funders: vec![funder("F1", "Alpha")],
            ..Default::default()
        });
        let result = analyze(&context, &DataQuery::new(QueryType::FunderAnalysis));
        assert!(result.data.is_empty());
        assert!(result.insights.is_empty());
        assert_eq!(result.metric("average_per_funder"), Some(0.0));
        assert!(result.summary.contains("FY24-25"));
    }
}
