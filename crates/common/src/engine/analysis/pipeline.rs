//! Fundraising pipeline by stage and state

use super::format_amount;
use crate::models::{
    AnalysisRecord, AnalysisResult, DataContext, DataQuery, Prospect, ProspectRecord, QueryType,
};
use std::collections::BTreeMap;

const UNASSIGNED_STATE: &str = "Unassigned";

#[derive(Default)]
struct StageTotals {
    count: usize,
    value: u64,
    weighted: f64,
}

/// Largest estimated amount first; the order every aggregate is summed in,
/// so results do not depend on the input order.
pub(super) fn canonical_order(prospects: &mut [&Prospect]) {
    prospects.sort_by(|a, b| {
        b.estimated_amount
            .cmp(&a.estimated_amount)
            .then_with(|| a.id.cmp(&b.id))
            .then_with(|| a.stage.cmp(&b.stage))
            .then_with(|| a.probability.total_cmp(&b.probability))
    });
}

/// Raw and probability-weighted value of prospects already in canonical order
pub(super) fn totals(prospects: &[&Prospect]) -> (u64, f64) {
    prospects.iter().fold((0, 0.0), |(value, weighted), p| {
        (value + p.estimated_amount, weighted + p.weighted_value())
    })
}

pub(super) fn analyze(context: &DataContext, query: &DataQuery) -> AnalysisResult {
    let only_state = query.filters.state_code.as_deref();
    let min_probability = query.parameters.min_probability;

    let mut prospects: Vec<&Prospect> = context
        .prospects()
        .iter()
        .filter(|p| only_state.map_or(true, |s| p.state_code.as_deref() == Some(s)))
        .filter(|p| min_probability.map_or(true, |min| p.clamped_probability() >= min))
        .collect();
    canonical_order(&mut prospects);

    let (total_value, weighted_value) = totals(&prospects);
    let out_of_range = prospects
        .iter()
        .filter(|p| !p.has_valid_probability())
        .count();

    let mut stages: BTreeMap<&str, StageTotals> = BTreeMap::new();
    let mut by_state: BTreeMap<String, f64> = BTreeMap::new();
    for prospect in &prospects {
        let stage = stages.entry(prospect.stage.as_str()).or_default();
        stage.count += 1;
        stage.value += prospect.estimated_amount;
        stage.weighted += prospect.weighted_value();

        let state = prospect
            .state_code
            .clone()
            .unwrap_or_else(|| UNASSIGNED_STATE.to_string());
        *by_state.entry(state).or_default() += prospect.weighted_value();
    }

    // Highest count; alphabetical among ties
    let busiest_stage = stages
        .iter()
        .fold(None::<(&str, usize)>, |best, (stage, t)| match best {
            Some((_, count)) if count >= t.count => best,
            _ => Some((*stage, t.count)),
        });

    let scope = only_state
        .map(|s| format!(" in {}", s))
        .unwrap_or_default();
    let summary = if prospects.is_empty() {
        format!("No prospects in the pipeline{}", scope)
    } else {
        format!(
            "{} prospects worth {} ({} weighted){}",
            prospects.len(),
            format_amount(total_value),
            format_amount(weighted_value.round() as u64),
            scope
        )
    };
    let mut result = AnalysisResult::new(QueryType::PipelineAnalysis, summary);

    if !prospects.is_empty() {
        result
            .insights
            .push(format!("{} prospects in the pipeline{}", prospects.len(), scope));
        result.insights.push(format!(
            "Total pipeline value: {}; weighted by probability: {}",
            format_amount(total_value),
            format_amount(weighted_value.round() as u64)
        ));
        if let Some((stage, count)) = busiest_stage {
            result
                .insights
                .push(format!("Most prospects are at the {} stage ({})", stage, count));
        }
    }
    if out_of_range > 0 {
        result.insights.push(format!(
            "{} prospects have a probability outside 0-1 and were clamped",
            out_of_range
        ));
    }

    result.set_metric("prospect_count", prospects.len());
    result.set_metric("total_pipeline_value", total_value);
    result.set_metric("weighted_pipeline_value", weighted_value);
    result.set_metric("out_of_range_probabilities", out_of_range);
    result.set_metric(
        "stage_counts",
        stages
            .iter()
            .map(|(stage, t)| (stage.to_string(), t.count as f64))
            .collect::<BTreeMap<_, _>>(),
    );
    result.set_metric(
        "stage_values",
        stages
            .iter()
            .map(|(stage, t)| (stage.to_string(), t.value as f64))
            .collect::<BTreeMap<_, _>>(),
    );
    result.set_metric(
        "stage_weighted_values",
        stages
            .iter()
            .map(|(stage, t)| (stage.to_string(), t.weighted))
            .collect::<BTreeMap<_, _>>(),
    );
    result.set_metric("weighted_by_state", by_state);

    result.data = prospects
        .iter()
        .take(query.parameters.limit.unwrap_or(usize::MAX))
        .map(|p| {
            AnalysisRecord::Prospect(ProspectRecord {
                id: p.id.clone(),
                name: p.name.clone(),
                state_code: p.state_code.clone(),
                stage: p.stage.clone(),
                estimated_amount: p.estimated_amount,
                probability: p.clamped_probability(),
                weighted_value: p.weighted_value(),
                next_action: p.next_action.clone(),
                owner: p.owner.clone(),
            })
        })
        .collect();

    result
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use crate::models::Collections;
    use rand::seq::SliceRandom;

    fn two_prospects() -> Collections {
        Collections {
            prospects: vec![
                prospect("P1", Some("KA"), "Lead", 10_000_000, 0.5),
                prospect("P2", None, "Proposal", 20_000_000, 0.25),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_pipeline_totals() {
        let context = context(two_prospects());
        let result = analyze(&context, &DataQuery::new(QueryType::PipelineAnalysis));

        assert_eq!(result.metric("total_pipeline_value"), Some(30_000_000.0));
        assert_eq!(result.metric("weighted_pipeline_value"), Some(10_000_000.0));
        assert_eq!(result.breakdown("stage_counts").unwrap()["Lead"], 1.0);
        assert_eq!(
            result.breakdown("stage_weighted_values").unwrap()["Proposal"],
            5_000_000.0
        );
        assert_eq!(
            result.breakdown("weighted_by_state").unwrap()["Unassigned"],
            5_000_000.0
        );
        match &result.data[0] {
            AnalysisRecord::Prospect(p) => assert_eq!(p.id, "P2"),
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[test]
    fn test_summary_metrics_ignore_input_order() {
        let mut prospects: Vec<_> = (0..40)
            .map(|i| {
                prospect(
                    &format!("P{:02}", i),
                    if i % 3 == 0 { None } else { Some("KA") },
                    ["Lead", "Proposal", "Negotiation"][i % 3],
                    1_000 + (i as u64 * 7_919) % 5_000,
                    (i as f64 * 0.037) % 1.0,
                )
            })
            .collect();
        let baseline = analyze(
            &context(Collections {
                prospects: prospects.clone(),
                ..Default::default()
            }),
            &DataQuery::new(QueryType::PipelineAnalysis),
        );

        let mut rng = rand::thread_rng();
        for _ in 0..20 {
            prospects.shuffle(&mut rng);
            let shuffled = analyze(
                &context(Collections {
                    prospects: prospects.clone(),
                    ..Default::default()
                }),
                &DataQuery::new(QueryType::PipelineAnalysis),
            );
            assert_eq!(shuffled.metrics, baseline.metrics);
            assert_eq!(shuffled.insights, baseline.insights);
        }
    }

    #[test]
    fn test_state_and_probability_filters() {
        let context = context(Collections {
            prospects: vec![
                prospect("P1", Some("KA"), "Lead", 100, 0.9),
                prospect("P2", Some("KA"), "Lead", 100, 0.2),
                prospect("P3", Some("MH"), "Lead", 100, 0.95),
            ],
            ..Default::default()
        });

        let mut query = DataQuery::new(QueryType::PipelineAnalysis).with_state("KA");
        query.parameters.min_probability = Some(0.7);
        let result = analyze(&context, &query);
        assert_eq!(result.metric("prospect_count"), Some(1.0));
        assert_eq!(result.metric("total_pipeline_value"), Some(100.0));
    }

    #[test]
    fn test_out_of_range_probability_is_clamped() {
        let context = context(Collections {
            prospects: vec![
                prospect("P1", None, "Lead", 100, 1.5),
                prospect("P2", None, "Lead", 100, -0.5),
            ],
            ..Default::default()
        });
        let result = analyze(&context, &DataQuery::new(QueryType::PipelineAnalysis));
        assert_eq!(result.metric("weighted_pipeline_value"), Some(100.0));
        assert_eq!(result.metric("out_of_range_probabilities"), Some(2.0));
    }

    #[test]
    fn test_busiest_stage_ties_break_alphabetically() {
        let context = context(Collections {
            prospects: vec![
                prospect("P1", None, "Proposal", 100, 0.5),
                prospect("P2", None, "Lead", 100, 0.5),
                prospect("P3", None, "Negotiation", 50, 0.5),
                prospect("P4", None, "Proposal", 10, 0.5),
                prospect("P5", None, "Lead", 10, 0.5),
            ],
            ..Default::default()
        });
        let result = analyze(&context, &DataQuery::new(QueryType::PipelineAnalysis));
        assert!(result
            .insights
            .contains(&"Most prospects are at the Lead stage (2)".to_string()));
    }
}
