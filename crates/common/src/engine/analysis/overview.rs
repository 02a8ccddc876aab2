//! Headline figures for general or unrouted questions

use super::pipeline::{canonical_order, totals};
use super::{format_amount, format_rate, percentage};
use crate::models::{AnalysisResult, DataContext, DataQuery, Prospect, QueryType};
use std::collections::BTreeSet;

pub(super) fn analyze(context: &DataContext, query: &DataQuery) -> AnalysisResult {
    let fiscal_year = query
        .filters
        .fiscal_year
        .unwrap_or_else(|| context.current_fiscal_year());

    let mut secured: u64 = 0;
    let mut active: BTreeSet<&str> = BTreeSet::new();
    for contribution in context
        .contributions()
        .iter()
        .filter(|c| c.in_fiscal_year(fiscal_year))
    {
        secured += contribution.amount;
        active.insert(contribution.funder_id.as_str());
    }

    let target: u64 = context
        .state_targets()
        .iter()
        .filter(|t| t.fiscal_year() == Some(fiscal_year))
        .map(|t| t.target_amount)
        .sum();
    let achievement_rate = percentage(secured, target);

    let mut prospects: Vec<&Prospect> = context.prospects().iter().collect();
    canonical_order(&mut prospects);
    let (pipeline_value, weighted_pipeline) = totals(&prospects);

    let summary = format!(
        "{}: {} secured of {} targeted ({}), pipeline {}",
        fiscal_year,
        format_amount(secured),
        format_amount(target),
        format_rate(achievement_rate),
        format_amount(pipeline_value)
    );
    let mut result = AnalysisResult::new(QueryType::GeneralQuery, summary);

    result.insights.push(format!(
        "Secured {} against a target of {} in {} ({})",
        format_amount(secured),
        format_amount(target),
        fiscal_year,
        format_rate(achievement_rate)
    ));
    result.insights.push(format!(
        "Pipeline: {} prospects worth {} ({} weighted)",
        prospects.len(),
        format_amount(pipeline_value),
        format_amount(weighted_pipeline.round() as u64)
    ));
    result.insights.push(format!(
        "{} of {} funders contributed in {}",
        active.len(),
        context.funders().len(),
        fiscal_year
    ));

    result.set_metric("secured_total", secured);
    result.set_metric("target_total", target);
    result.set_metric("achievement_rate", achievement_rate);
    result.set_metric("total_pipeline_value", pipeline_value);
    result.set_metric("weighted_pipeline_value", weighted_pipeline);
    result.set_metric("active_funders", active.len());
    result.set_metric("prospect_count", prospects.len());
    result.set_metric("funder_count", context.funders().len());
    result.set_metric("state_count", context.states().len());
    result.set_metric("school_count", context.schools().len());

    result
}
