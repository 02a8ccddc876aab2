//! Analysis Engine - Pure aggregations over a data context
//!
//! One analyzer per query type. Every analyzer is a function of
//! `(&DataContext, &DataQuery)` only: no I/O, no mutation, deterministic
//! ordering (ties broken by id or code), and zero values on empty input.

mod contributions;
mod funders;
mod overview;
mod pipeline;
mod states;
mod trends;

use crate::models::{AnalysisResult, DataContext, DataQuery, QueryType};

/// Display name used when a contribution references an unknown funder
pub const UNKNOWN_FUNDER: &str = "Unknown Funder";

/// Route a query to its analyzer
pub fn analyze(context: &DataContext, query: &DataQuery) -> AnalysisResult {
    match query.query_type {
        QueryType::FunderAnalysis => funders::analyze(context, query),
        QueryType::StatePerformance => states::analyze(context, query),
        QueryType::ContributionHistory => contributions::analyze(context, query),
        QueryType::PipelineAnalysis => pipeline::analyze(context, query),
        QueryType::TrendAnalysis => trends::analyze(context, query),
        QueryType::GeneralQuery => overview::analyze(context, query),
    }
}

/// Find the funder whose display name appears in the text.
///
/// Case-insensitive; the longest matching name wins, then the lowest id.
/// Names shorter than three characters are ignored.
pub fn resolve_funder_mention(context: &DataContext, text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    context
        .funders()
        .iter()
        .filter(|funder| {
            let name = funder.name.trim();
            name.chars().count() >= 3 && lower.contains(&name.to_lowercase())
        })
        .max_by(|a, b| {
            a.name
                .trim()
                .chars()
                .count()
                .cmp(&b.name.trim().chars().count())
                .then_with(|| b.id.cmp(&a.id))
        })
        .map(|funder| funder.id.clone())
}

/// Funder display name, or [`UNKNOWN_FUNDER`]
pub(crate) fn funder_name(context: &DataContext, funder_id: &str) -> String {
    context
        .funder(funder_id)
        .map(|funder| funder.name.clone())
        .unwrap_or_else(|| UNKNOWN_FUNDER.to_string())
}

/// `12000000` -> `12,000,000`
pub(crate) fn format_amount(amount: u64) -> String {
    let digits = amount.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub(crate) fn format_rate(rate: f64) -> String {
    format!("{:.1}%", rate)
}

/// `100 * part / whole`, or 0 when `whole` is 0
pub(crate) fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        100.0 * part as f64 / whole as f64
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::models::Collections;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0), "0");
        assert_eq!(format_amount(999), "999");
        assert_eq!(format_amount(1_000), "1,000");
        assert_eq!(format_amount(12_000_000), "12,000,000");
    }

    #[test]
    fn test_percentage_never_divides_by_zero() {
        assert_eq!(percentage(10, 0), 0.0);
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(10, 40), 25.0);
    }

    #[test]
    fn test_funder_mention_prefers_longest_name() {
        let context = context(Collections {
            funders: vec![
                funder("F1", "Tata"),
                funder("F2", "Tata Trusts"),
                funder("F3", "AB"),
            ],
            ..Default::default()
        });

        assert_eq!(
            resolve_funder_mention(&context, "How much has tata trusts given?").as_deref(),
            Some("F2")
        );
        assert_eq!(
            resolve_funder_mention(&context, "What about Tata?").as_deref(),
            Some("F1")
        );
        // too short to match reliably
        assert_eq!(resolve_funder_mention(&context, "about AB"), None);
    }

    #[test]
    fn test_dispatch_is_exhaustive_over_empty_context() {
        let context = context(Collections::default());
        for query_type in QueryType::ALL {
            let result = analyze(&context, &DataQuery::new(query_type));
            assert_eq!(result.query_type, query_type);
            assert!(result.data.is_empty());
            assert!(result
                .metrics
                .values()
                .filter_map(|m| m.as_number())
                .all(|n| n == 0.0));
        }
    }
}
