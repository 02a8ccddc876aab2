//! State performance against fundraising targets

use super::{format_amount, format_rate, percentage};
use crate::models::{
    AnalysisRecord, AnalysisResult, DataContext, DataQuery, QueryType, StatePerformance,
    TargetStatus, ATTENTION_THRESHOLD,
};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Default)]
struct Secured<'a> {
    amount: u64,
    funders: BTreeSet<&'a str>,
}

pub(super) fn analyze(context: &DataContext, query: &DataQuery) -> AnalysisResult {
    let fiscal_year = query
        .filters
        .fiscal_year
        .unwrap_or_else(|| context.current_fiscal_year());
    let only_state = query.filters.state_code.as_deref();

    let mut secured: BTreeMap<&str, Secured> = BTreeMap::new();
    for contribution in context
        .contributions()
        .iter()
        .filter(|c| c.in_fiscal_year(fiscal_year))
    {
        let entry = secured.entry(contribution.state_code.as_str()).or_default();
        entry.amount += contribution.amount;
        entry.funders.insert(contribution.funder_id.as_str());
    }

    // Duplicate (state, year) targets are summed and counted
    let mut targets: BTreeMap<&str, (u64, usize)> = BTreeMap::new();
    for target in context
        .state_targets()
        .iter()
        .filter(|t| t.fiscal_year() == Some(fiscal_year))
    {
        let entry = targets.entry(target.state_code.as_str()).or_default();
        entry.0 += target.target_amount;
        entry.1 += 1;
    }

    let mut rows: Vec<StatePerformance> = context
        .states()
        .iter()
        .filter(|state| only_state.map_or(true, |code| state.code == code))
        .map(|state| {
            let (amount, funder_count) = secured
                .get(state.code.as_str())
                .map_or((0, 0), |s| (s.amount, s.funders.len()));
            let target = targets.get(state.code.as_str()).map_or(0, |t| t.0);
            let achievement_rate = percentage(amount, target);

            StatePerformance {
                state_code: state.code.clone(),
                state_name: state.name.clone(),
                coordinator: state.coordinator.clone(),
                secured: amount,
                target,
                achievement_rate,
                shortfall: target.saturating_sub(amount),
                funder_count,
                status: TargetStatus::classify(achievement_rate, target),
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.achievement_rate
            .total_cmp(&a.achievement_rate)
            .then_with(|| a.state_code.cmp(&b.state_code))
    });

    let total_secured: u64 = rows.iter().map(|r| r.secured).sum();
    let total_target: u64 = rows.iter().map(|r| r.target).sum();
    let total_shortfall: u64 = rows.iter().map(|r| r.shortfall).sum();
    let overall_rate = percentage(total_secured, total_target);
    let at_or_above = rows
        .iter()
        .filter(|r| r.target > 0 && r.achievement_rate >= 100.0)
        .count();
    let duplicate_targets = targets
        .iter()
        .filter(|&(code, &(_, seen))| seen > 1 && only_state.map_or(true, |s| s == *code))
        .count();

    let mut needing_attention: Vec<&StatePerformance> = rows
        .iter()
        .filter(|r| r.target > 0 && r.achievement_rate < ATTENTION_THRESHOLD)
        .collect();
    needing_attention.sort_by(|a, b| {
        a.achievement_rate
            .total_cmp(&b.achievement_rate)
            .then_with(|| a.state_code.cmp(&b.state_code))
    });

    let summary = if rows.is_empty() {
        format!("No state data available for {}", fiscal_year)
    } else {
        format!(
            "{} states secured {} of {} targeted in {} ({})",
            rows.len(),
            format_amount(total_secured),
            format_amount(total_target),
            fiscal_year,
            format_rate(overall_rate)
        )
    };
    let mut result = AnalysisResult::new(QueryType::StatePerformance, summary);

    if let Some(best) = rows.first() {
        result.insights.push(format!(
            "Best performer: {} at {} of target",
            best.state_name,
            format_rate(best.achievement_rate)
        ));
        result.insights.push(format!(
            "Overall achievement: {} ({} of {})",
            format_rate(overall_rate),
            format_amount(total_secured),
            format_amount(total_target)
        ));
        result
            .insights
            .push(format!("{} states at or above target", at_or_above));
        result.insights.push(format!(
            "Total shortfall across states: {}",
            format_amount(total_shortfall)
        ));
    }
    if !needing_attention.is_empty() {
        let listed: Vec<String> = needing_attention
            .iter()
            .map(|r| format!("{} ({})", r.state_name, format_rate(r.achievement_rate)))
            .collect();
        result.insights.push(format!(
            "Needs attention (below {:.0}%): {}",
            ATTENTION_THRESHOLD,
            listed.join(", ")
        ));
    }
    if duplicate_targets > 0 {
        result.insights.push(format!(
            "{} states have more than one target row for {}; amounts were summed",
            duplicate_targets, fiscal_year
        ));
    }

    result.set_metric("state_count", rows.len());
    result.set_metric("total_secured", total_secured);
    result.set_metric("total_target", total_target);
    result.set_metric("overall_achievement_rate", overall_rate);
    result.set_metric("total_shortfall", total_shortfall);
    result.set_metric("states_at_or_above_target", at_or_above);
    result.set_metric("states_needing_attention", needing_attention.len());
    result.set_metric("duplicate_targets", duplicate_targets);
    result.set_metric(
        "attention_rates",
        needing_attention
            .iter()
            .map(|r| (r.state_code.clone(), r.achievement_rate))
            .collect::<BTreeMap<_, _>>(),
    );

    // Row filters narrow the listing only; the totals above cover every state in scope
    let above = query.parameters.above_target;
    let below = query.parameters.below_target;
    result.data = rows
        .into_iter()
        .filter(|r| !above || (r.target > 0 && r.achievement_rate >= 100.0))
        .filter(|r| !below || (r.target > 0 && r.achievement_rate < 100.0))
        .take(query.parameters.limit.unwrap_or(usize::MAX))
        .map(AnalysisRecord::State)
        .collect();

    result
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use crate::models::Collections;

    fn rows(result: &AnalysisResult) -> Vec<&StatePerformance> {
        result
            .data
            .iter()
            .filter_map(|r| match r {
                AnalysisRecord::State(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    fn query() -> DataQuery {
        DataQuery::new(QueryType::StatePerformance).with_fiscal_year("FY24-25".parse().unwrap())
    }

    #[test]
    fn test_karnataka_at_quarter_of_target() {
        let context = context(Collections {
            states: vec![state("KA", "Karnataka")],
            state_targets: vec![target("KA", "FY24-25", 40_000_000)],
            contributions: vec![
                contribution("C1", "F1", "KA", "FY24-25", 6_000_000, None),
                contribution("C2", "F2", "KA", "FY24-25", 4_000_000, None),
            ],
            ..Default::default()
        });
        let result = analyze(&context, &query());

        let ka = rows(&result)[0];
        assert_eq!(ka.achievement_rate, 25.0);
        assert_eq!(ka.shortfall, 30_000_000);
        assert_eq!(ka.status, TargetStatus::Critical);
        assert_eq!(ka.funder_count, 2);
        assert_eq!(result.metric("states_needing_attention"), Some(1.0));
        assert!(result
            .insights
            .iter()
            .any(|i| i == "Needs attention (below 50%): Karnataka (25.0%)"));
    }

    #[test]
    fn test_zero_target_rate_is_zero() {
        let context = context(Collections {
            states: vec![state("GA", "Goa")],
            contributions: vec![contribution("C1", "F1", "GA", "FY24-25", 5_000, None)],
            ..Default::default()
        });
        let result = analyze(&context, &query());

        let goa = rows(&result)[0];
        assert_eq!(goa.achievement_rate, 0.0);
        assert!(goa.achievement_rate.is_finite());
        assert_eq!(goa.status, TargetStatus::NoTarget);
        assert_eq!(result.metric("overall_achievement_rate"), Some(0.0));
        assert_eq!(result.metric("states_needing_attention"), Some(0.0));
    }

    #[test]
    fn test_sorting_totals_and_duplicate_targets() {
        let context = context(Collections {
            states: vec![
                state("KA", "Karnataka"),
                state("MH", "Maharashtra"),
                state("TN", "Tamil Nadu"),
            ],
            state_targets: vec![
                target("KA", "FY24-25", 100),
                target("MH", "FY24-25", 100),
                target("MH", "2024-25", 100),
                target("TN", "FY24-25", 100),
                target("TN", "FY23-24", 5_000),
            ],
            contributions: vec![
                contribution("C1", "F1", "KA", "FY24-25", 120, None),
                contribution("C2", "F1", "MH", "FY24-25", 100, None),
                contribution("C3", "F2", "TN", "FY24-25", 90, None),
            ],
            ..Default::default()
        });
        let result = analyze(&context, &query());

        let ranked = rows(&result);
        let codes: Vec<_> = ranked.iter().map(|r| r.state_code.as_str()).collect();
        assert_eq!(codes, vec!["KA", "TN", "MH"]);
        assert_eq!(ranked[2].target, 200);
        assert_eq!(ranked[0].status, TargetStatus::Exceeded);
        assert_eq!(ranked[1].status, TargetStatus::OnTrack);
        assert_eq!(ranked[2].status, TargetStatus::Behind);

        assert_eq!(result.metric("duplicate_targets"), Some(1.0));
        assert_eq!(result.metric("states_at_or_above_target"), Some(1.0));
        // 110 shortfall from MH (100) and TN (10); KA overshoot does not offset
        assert_eq!(result.metric("total_shortfall"), Some(110.0));
        assert_eq!(result.metric("total_target"), Some(400.0));
    }

    #[test]
    fn test_state_filter_and_row_filters() {
        let context = context(Collections {
            states: vec![state("KA", "Karnataka"), state("KL", "Kerala")],
            state_targets: vec![target("KA", "FY24-25", 100), target("KL", "FY24-25", 100)],
            contributions: vec![
                contribution("C1", "F1", "KA", "FY24-25", 150, None),
                contribution("C2", "F1", "KL", "FY24-25", 40, None),
            ],
            ..Default::default()
        });

        let result = analyze(&context, &query().with_state("KL"));
        assert_eq!(rows(&result).len(), 1);
        assert_eq!(result.metric("total_secured"), Some(40.0));

        let mut below = query();
        below.parameters.below_target = true;
        let result = analyze(&context, &below);
        assert_eq!(rows(&result)[0].state_code, "KL");
        assert_eq!(rows(&result).len(), 1);
        assert_eq!(result.metric("state_count"), Some(2.0));

        let mut above = query();
        above.parameters.above_target = true;
        let result = analyze(&context, &above);
        assert_eq!(rows(&result)[0].state_code, "KA");
    }

    #[test]
    fn test_repeated_analysis_is_identical() {
        let context = context(Collections {
            states: vec![state("KA", "Karnataka"), state("MH", "Maharashtra")],
            state_targets: vec![target("KA", "FY24-25", 100), target("MH", "FY24-25", 100)],
            contributions: vec![
                contribution("C1", "F1", "KA", "FY24-25", 50, None),
                contribution("C2", "F1", "MH", "FY24-25", 50, None),
            ],
            ..Default::default()
        });
        let first = analyze(&context, &query());
        let second = analyze(&context, &query());
        assert_eq!(first, second);
        assert_eq!(rows(&first)[0].state_code, "KA");
    }
}
