//! Contribution history with filters and a monthly breakdown

use super::{format_amount, funder_name};
use crate::models::{
    AnalysisRecord, AnalysisResult, Contribution, ContributionRecord, DataContext, DataQuery,
    QueryType,
};
use std::cmp::Ordering;
use std::collections::BTreeMap;

const DEFAULT_LIMIT: usize = 50;

pub(super) fn analyze(context: &DataContext, query: &DataQuery) -> AnalysisResult {
    let filters = &query.filters;

    let mut matched: Vec<&Contribution> = context
        .contributions()
        .iter()
        .filter(|c| filters.fiscal_year.map_or(true, |fy| c.in_fiscal_year(fy)))
        .filter(|c| {
            filters
                .state_code
                .as_deref()
                .map_or(true, |s| c.state_code == s)
        })
        .filter(|c| {
            filters
                .funder_id
                .as_deref()
                .map_or(true, |f| c.funder_id == f)
        })
        .collect();

    // Newest first, undated last
    matched.sort_by(|a, b| {
        let by_date = match (a.date, b.date) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_date.then_with(|| a.id.cmp(&b.id))
    });

    let total: u64 = matched.iter().map(|c| c.amount).sum();
    let count = matched.len();
    let average = if count == 0 {
        0.0
    } else {
        total as f64 / count as f64
    };

    let mut monthly_amounts: BTreeMap<String, f64> = BTreeMap::new();
    let mut monthly_counts: BTreeMap<String, f64> = BTreeMap::new();
    for contribution in &matched {
        if let Some(date) = contribution.date {
            let month = date.format("%Y-%m").to_string();
            *monthly_amounts.entry(month.clone()).or_default() += contribution.amount as f64;
            *monthly_counts.entry(month).or_default() += 1.0;
        }
    }

    // Most contributions, then larger amount, then earliest month
    let busiest = monthly_counts
        .iter()
        .max_by(|(month_a, count_a), (month_b, count_b)| {
            count_a
                .total_cmp(count_b)
                .then_with(|| monthly_amounts[*month_a].total_cmp(&monthly_amounts[*month_b]))
                .then_with(|| month_b.cmp(month_a))
        })
        .map(|(month, count)| (month.clone(), *count as usize));

    let mut scope = Vec::new();
    if let Some(fy) = filters.fiscal_year {
        scope.push(fy.to_string());
    }
    if let Some(code) = &filters.state_code {
        scope.push(match context.state(code) {
            Some(state) => format!("{} ({})", state.name, code),
            None => format!("state {}", code),
        });
    }
    if let Some(funder) = &filters.funder_id {
        scope.push(funder_name(context, funder));
    }
    let scope = if scope.is_empty() {
        String::new()
    } else {
        format!(" for {}", scope.join(", "))
    };

    let summary = if count == 0 {
        format!("No contributions found{}", scope)
    } else {
        format!(
            "{} contributions totalling {}{}",
            count,
            format_amount(total),
            scope
        )
    };
    let mut result = AnalysisResult::new(QueryType::ContributionHistory, summary);

    if count > 0 {
        result
            .insights
            .push(format!("{} contributions recorded{}", count, scope));
        result
            .insights
            .push(format!("Total received: {}", format_amount(total)));
        result.insights.push(format!(
            "Average contribution: {}",
            format_amount(average.round() as u64)
        ));
        if let Some((month, month_count)) = &busiest {
            result.insights.push(format!(
                "Busiest month: {} with {} contributions ({})",
                month,
                month_count,
                format_amount(monthly_amounts[month] as u64)
            ));
        }
    }

    let limit = query.parameters.limit.unwrap_or(DEFAULT_LIMIT);
    result.data = matched
        .iter()
        .take(limit)
        .map(|c| {
            AnalysisRecord::Contribution(ContributionRecord {
                id: c.id.clone(),
                funder_id: c.funder_id.clone(),
                funder_name: funder_name(context, &c.funder_id),
                state_code: c.state_code.clone(),
                fiscal_year: c
                    .fiscal_year()
                    .map(|fy| fy.to_string())
                    .unwrap_or_else(|| c.fiscal_year_label.clone()),
                amount: c.amount,
                date: c.date,
                initiative: c.initiative.clone(),
            })
        })
        .collect();

    result.set_metric("contribution_count", count);
    result.set_metric("returned_count", result.data.len());
    result.set_metric("total_amount", total);
    result.set_metric("average_amount", average);
    result.set_metric("monthly_amounts", monthly_amounts);
    result.set_metric("monthly_counts", monthly_counts);

    result
}
