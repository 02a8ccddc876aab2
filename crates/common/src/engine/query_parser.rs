//! Query Parser - Routes a question and extracts structured filters
//!
//! Provides:
//! - Category routing through an ordered keyword table
//! - State, fiscal year and funder id extraction
//! - Category-specific parameters ("top 5", "above target", ...)
//! - A coarse intent label, independent of routing

use crate::errors::{AppError, Result};
use crate::models::{
    CoarseIntent, DataQuery, FiscalYear, QueryFilters, QueryParameters, QueryType, SortDirection,
};
use regex_lite::{Captures, Regex};
use tracing::debug;

/// Routing table, checked top to bottom; the first category with a keyword
/// present in the lower-cased question wins.
const CATEGORY_KEYWORDS: &[(QueryType, &[&str])] = &[
    (
        QueryType::FunderAnalysis,
        &[
            "funder",
            "donor",
            "sponsor",
            "who gave",
            "who contributed",
        ],
    ),
    (
        QueryType::StatePerformance,
        &[
            "state",
            "performance",
            "performing",
            "target",
            "achievement",
            "doing",
            "progress",
            "shortfall",
        ],
    ),
    (
        QueryType::ContributionHistory,
        &[
            "contribution",
            "transaction",
            "donation",
            "payment",
            "gift",
            "received",
            "history",
            "recent",
        ],
    ),
    (
        QueryType::PipelineAnalysis,
        &[
            "pipeline",
            "prospect",
            "opportunit",
            "lead",
            "proposal",
            "negotiation",
            "stage",
            "forecast",
        ],
    ),
    (
        QueryType::TrendAnalysis,
        &[
            "trend",
            "growth",
            "historical",
            "over time",
            "year over year",
            "yoy",
            "increase",
            "decline",
        ],
    ),
];

/// Known state names and their codes. Matched as substrings; the first
/// entry found wins.
const STATE_NAMES: &[(&str, &str)] = &[
    ("andhra pradesh", "AP"),
    ("arunachal pradesh", "AR"),
    ("assam", "AS"),
    ("bihar", "BR"),
    ("chhattisgarh", "CG"),
    ("goa", "GA"),
    ("gujarat", "GJ"),
    ("haryana", "HR"),
    ("himachal pradesh", "HP"),
    ("jharkhand", "JH"),
    ("karnataka", "KA"),
    ("kerala", "KL"),
    ("madhya pradesh", "MP"),
    ("maharashtra", "MH"),
    ("manipur", "MN"),
    ("meghalaya", "ML"),
    ("mizoram", "MZ"),
    ("nagaland", "NL"),
    ("odisha", "OD"),
    ("punjab", "PB"),
    ("rajasthan", "RJ"),
    ("sikkim", "SK"),
    ("tamil nadu", "TN"),
    ("telangana", "TS"),
    ("tripura", "TR"),
    ("uttar pradesh", "UP"),
    ("uttarakhand", "UK"),
    ("west bengal", "WB"),
    ("delhi", "DL"),
    ("jammu and kashmir", "JK"),
    ("puducherry", "PY"),
    ("chandigarh", "CH"),
];

/// "FY" is the fiscal-year marker, never a state code
const RESERVED_TOKENS: &[&str] = &["FY"];

const INTENT_KEYWORDS: &[(CoarseIntent, &[&str])] = &[
    (
        CoarseIntent::CompareEntities,
        &["compare", " vs ", " vs. ", "versus", "difference between", "compared"],
    ),
    (
        CoarseIntent::AnalyzeTrends,
        &["trend", "growth", "over time", "year over year", "historical"],
    ),
    (
        CoarseIntent::FindUnderperformers,
        &[
            "underperform",
            "below target",
            "lowest",
            "worst",
            "behind",
            "lagging",
            "bottom",
        ],
    ),
    (
        CoarseIntent::FindTopPerformers,
        &["top", "best", "highest", "leading", "largest", "biggest"],
    ),
    (
        CoarseIntent::GetTotalAmount,
        &["total", "how much", "sum of", "overall"],
    ),
    (
        CoarseIntent::ListEntities,
        &["list", "show", "which", "what are", "all "],
    ),
];

/// Query parser configuration
#[derive(Debug, Clone)]
pub struct QueryParserConfig {
    /// Minimum probability implied by "high probability" / "likely"
    pub high_probability: f64,
}

impl Default for QueryParserConfig {
    fn default() -> Self {
        Self {
            high_probability: 0.7,
        }
    }
}

/// Keyword and pattern based parser. Pure: no I/O, deterministic.
pub struct QueryParser {
    config: QueryParserConfig,
    state_token: Regex,
    fiscal_year_patterns: [(FiscalYearForm, Regex); 5],
    funder_code: Regex,
    funder_label: Regex,
    limit: Regex,
    years: Regex,
    probability: Regex,
}

#[derive(Debug, Clone, Copy)]
enum FiscalYearForm {
    /// Both halves captured (`FY24-25`, `FY2024-25`, `2024-25`)
    Span,
    /// Four-digit start year (`fiscal year 2024`)
    StartYear,
    /// Two-digit start year (`fy 24`)
    ShortStartYear,
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| AppError::Internal {
        message: format!("Invalid parser pattern '{}': {}", pattern, e),
    })
}

impl QueryParser {
    pub fn new(config: QueryParserConfig) -> Result<Self> {
        Ok(Self {
            config,
            state_token: compile(r"\b[A-Z]{2}\b")?,
            fiscal_year_patterns: [
                (FiscalYearForm::Span, compile(r"(?i)\bFY\s?(\d{2})-(\d{2})\b")?),
                (FiscalYearForm::Span, compile(r"(?i)\bFY\s?(\d{4})-(\d{2})\b")?),
                (FiscalYearForm::Span, compile(r"\b(\d{4})-(\d{2})\b")?),
                (
                    FiscalYearForm::StartYear,
                    compile(r"(?i)\bfiscal\s+year\s+(\d{4})\b")?,
                ),
                (FiscalYearForm::ShortStartYear, compile(r"(?i)\bfy\s?(\d{2})\b")?),
            ],
            funder_code: compile(r"\bF\d+\b")?,
            funder_label: compile(r"(?i)\bfunder\s+id\s*[:#]?\s*([A-Za-z0-9_-]+)")?,
            limit: compile(
                r"(?i)\b(?:top|bottom|first|last|best|worst|highest|lowest|latest|recent)\s+(\d+)\b",
            )?,
            years: compile(r"(?i)\b(?:last|past)\s+(\d+)\s+(?:fiscal\s+)?years?\b")?,
            probability: compile(
                r"(?i)probability\s+(?:of\s+)?(?:above|over|at\s+least|>=?)\s*(\d+(?:\.\d+)?)\s*(%?)",
            )?,
        })
    }

    /// Parse a question into a routed, filtered query
    pub fn parse(&self, text: &str) -> DataQuery {
        let lower = text.to_lowercase();
        let query_type = self.classify(&lower);

        let filters = QueryFilters {
            state_code: self.extract_state(text),
            fiscal_year: self.extract_fiscal_year(text),
            funder_id: self.extract_funder_id(text),
        };
        let parameters = self.extract_parameters(query_type, &lower);

        debug!(
            query_type = %query_type,
            state = ?filters.state_code,
            fiscal_year = ?filters.fiscal_year.map(|fy| fy.to_string()),
            funder = ?filters.funder_id,
            "Parsed question"
        );

        DataQuery {
            query_type,
            filters,
            parameters,
        }
    }

    /// First category whose keyword set matches, else `general_query`
    pub fn classify(&self, lower: &str) -> QueryType {
        CATEGORY_KEYWORDS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
            .map(|(query_type, _)| *query_type)
            .unwrap_or_else(|| {
                debug!("No category keyword matched, routing to general query");
                QueryType::GeneralQuery
            })
    }

    /// A literal two-letter uppercase token wins; otherwise the first known
    /// state name contained in the text.
    pub fn extract_state(&self, text: &str) -> Option<String> {
        if let Some(token) = self
            .state_token
            .find_iter(text)
            .map(|m| m.as_str())
            .find(|token| !RESERVED_TOKENS.contains(token))
        {
            return Some(token.to_string());
        }

        let lower = text.to_lowercase();
        STATE_NAMES
            .iter()
            .find(|(name, _)| lower.contains(name))
            .map(|(_, code)| code.to_string())
    }

    /// Patterns are tried in a fixed order; only the first matching one is used.
    /// A span must cover consecutive years and must not continue as a date
    /// (`2024-06-15`), otherwise it is not a match.
    pub fn extract_fiscal_year(&self, text: &str) -> Option<FiscalYear> {
        let start_year = |caps: Captures<'_>| caps.get(1)?.as_str().parse::<i32>().ok();

        self.fiscal_year_patterns.iter().find_map(|(form, pattern)| match form {
            FiscalYearForm::Span => pattern
                .captures_iter(text)
                .find_map(|caps| fiscal_year_span(text, &caps)),
            FiscalYearForm::StartYear => pattern
                .captures(text)
                .and_then(start_year)
                .map(FiscalYear::from_start_year),
            FiscalYearForm::ShortStartYear => pattern
                .captures(text)
                .and_then(start_year)
                .map(|yy| FiscalYear::from_start_year(2000 + yy)),
        })
    }

    pub fn extract_funder_id(&self, text: &str) -> Option<String> {
        if let Some(m) = self.funder_code.find(text) {
            return Some(m.as_str().to_string());
        }
        self.funder_label
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// Coarse intent, computed independently of the routed category
    pub fn extract_intent(&self, text: &str) -> CoarseIntent {
        let lower = format!(" {} ", text.to_lowercase());
        INTENT_KEYWORDS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
            .map(|(intent, _)| *intent)
            .unwrap_or(CoarseIntent::GeneralInquiry)
    }

    /// Only the chosen category's parameters are computed
    fn extract_parameters(&self, query_type: QueryType, lower: &str) -> QueryParameters {
        let mut params = QueryParameters::default();

        match query_type {
            QueryType::FunderAnalysis => {
                params.limit = self.extract_limit(lower);
                if ["bottom", "lowest", "smallest", "least"]
                    .iter()
                    .any(|k| lower.contains(k))
                {
                    params.sort = Some(SortDirection::Asc);
                }
            }
            QueryType::StatePerformance => {
                params.limit = self.extract_limit(lower);
                params.above_target = [
                    "above target",
                    "over target",
                    "exceeded",
                    "exceeding",
                    "met target",
                    "met their target",
                ]
                .iter()
                .any(|k| lower.contains(k));
                params.below_target = [
                    "below target",
                    "under target",
                    "behind target",
                    "missed target",
                    "missing target",
                    "not met",
                ]
                .iter()
                .any(|k| lower.contains(k));
            }
            QueryType::ContributionHistory => {
                params.limit = self.extract_limit(lower);
            }
            QueryType::PipelineAnalysis => {
                params.limit = self.extract_limit(lower);
                params.min_probability = self.extract_min_probability(lower);
            }
            QueryType::TrendAnalysis => {
                params.years = self
                    .years
                    .captures(lower)
                    .and_then(|caps| caps.get(1))
                    .and_then(|m| m.as_str().parse().ok())
                    .filter(|&n: &usize| n > 0);
            }
            QueryType::GeneralQuery => {}
        }

        params
    }

    fn extract_limit(&self, lower: &str) -> Option<usize> {
        self.limit
            .captures(lower)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .filter(|&n: &usize| n > 0)
    }

    fn extract_min_probability(&self, lower: &str) -> Option<f64> {
        if let Some(caps) = self.probability.captures(lower) {
            let value: f64 = caps.get(1)?.as_str().parse().ok()?;
            let percent = caps.get(2).map_or(false, |m| !m.as_str().is_empty());
            let value = if percent || value > 1.0 {
                value / 100.0
            } else {
                value
            };
            return Some(value.clamp(0.0, 1.0));
        }

        ["high probability", "high-probability", "likely", "hot "]
            .iter()
            .any(|k| lower.contains(k))
            .then_some(self.config.high_probability)
    }
}

fn two_digit_suffix(digits: &str) -> Option<u8> {
    digits.get(digits.len().checked_sub(2)?..)?.parse().ok()
}

fn fiscal_year_span(text: &str, caps: &Captures<'_>) -> Option<FiscalYear> {
    let rest = text.get(caps.get(0)?.end()..)?;
    let mut chars = rest.chars();
    if chars.next() == Some('-') && chars.next().is_some_and(|c| c.is_ascii_digit()) {
        return None;
    }

    let start = two_digit_suffix(caps.get(1)?.as_str())?;
    let end = two_digit_suffix(caps.get(2)?.as_str())?;
    if end != (start + 1) % 100 {
        return None;
    }
    FiscalYear::new(start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> QueryParser {
        QueryParser::new(QueryParserConfig::default()).unwrap()
    }

    #[test]
    fn test_karnataka_question() {
        let query = parser().parse("How is Karnataka doing in FY24-25?");
        assert_eq!(query.query_type, QueryType::StatePerformance);
        assert_eq!(query.filters.state_code.as_deref(), Some("KA"));
        assert_eq!(query.filters.fiscal_year.unwrap().to_string(), "FY24-25");
        assert!(query.filters.funder_id.is_none());
    }

    #[test]
    fn test_category_priority() {
        let parser = parser();
        // funder beats state
        assert_eq!(
            parser.classify("which donors are behind target?"),
            QueryType::FunderAnalysis
        );
        // state beats contribution
        assert_eq!(
            parser.classify("contribution progress by state"),
            QueryType::StatePerformance
        );
        // contribution beats pipeline
        assert_eq!(
            parser.classify("recent payments from prospects"),
            QueryType::ContributionHistory
        );
        assert_eq!(
            parser.classify("what does the pipeline look like"),
            QueryType::PipelineAnalysis
        );
        assert_eq!(parser.classify("yoy growth"), QueryType::TrendAnalysis);
        assert_eq!(parser.classify("hello there"), QueryType::GeneralQuery);
    }

    #[test]
    fn test_funder_names_do_not_route() {
        let parser = parser();
        assert_eq!(
            parser.classify("show recent contributions from beta foundation"),
            QueryType::ContributionHistory
        );
        assert_eq!(
            parser.classify("pipeline with the csr trust"),
            QueryType::PipelineAnalysis
        );
    }

    #[test]
    fn test_every_uppercase_pair_is_taken_verbatim() {
        let parser = parser();
        for a in b'A'..=b'Z' {
            for b in b'A'..=b'Z' {
                let token = format!("{}{}", a as char, b as char);
                if RESERVED_TOKENS.contains(&token.as_str()) {
                    continue;
                }
                let text = format!("How are we doing in {} this year?", token);
                assert_eq!(parser.extract_state(&text), Some(token));
            }
        }
    }

    #[test]
    fn test_state_names_resolve_case_insensitively() {
        let parser = parser();
        for (name, code) in STATE_NAMES {
            let title: String = name
                .split(' ')
                .map(|word| {
                    let mut chars = word.chars();
                    match chars.next() {
                        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                        None => String::new(),
                    }
                })
                .collect::<Vec<_>>()
                .join(" ");

            for form in [name.to_string(), title, name.to_uppercase()] {
                let text = format!("achievement for {} please", form);
                assert_eq!(parser.extract_state(&text).as_deref(), Some(*code), "{}", form);
            }
        }
    }

    #[test]
    fn test_state_unset_without_code_or_name() {
        let parser = parser();
        assert_eq!(parser.extract_state("how is atlantis doing?"), None);
        assert_eq!(parser.extract_state("how are we doing in FY 24-25?"), None);
    }

    #[test]
    fn test_fiscal_year_forms() {
        let parser = parser();
        let label = |text: &str| parser.extract_fiscal_year(text).map(|fy| fy.to_string());

        assert_eq!(label("totals for FY24-25").as_deref(), Some("FY24-25"));
        assert_eq!(label("totals for fy23-24").as_deref(), Some("FY23-24"));
        assert_eq!(label("totals for FY2024-25").as_deref(), Some("FY24-25"));
        assert_eq!(label("totals for 2022-23").as_deref(), Some("FY22-23"));
        assert_eq!(label("fiscal year 2023 results").as_deref(), Some("FY23-24"));
        assert_eq!(label("how did fy 24 go").as_deref(), Some("FY24-25"));
        assert_eq!(label("how did we do last year"), None);
    }

    #[test]
    fn test_calendar_dates_are_not_fiscal_years() {
        let parser = parser();
        let query = parser.parse("Show contributions received since 2024-06-15");
        assert_eq!(query.query_type, QueryType::ContributionHistory);
        assert!(query.filters.fiscal_year.is_none());

        let label = |text: &str| parser.extract_fiscal_year(text).map(|fy| fy.to_string());
        assert_eq!(label("totals for 2024-06"), None);
        assert_eq!(label("totals for FY2024-27"), None);
        // a later valid span still counts
        assert_eq!(
            label("since 2024-06-15, how is 2024-25 going").as_deref(),
            Some("FY24-25")
        );
        assert_eq!(label("year end FY99-00").as_deref(), Some("FY99-00"));
    }

    #[test]
    fn test_fiscal_year_pattern_order_wins_over_position() {
        let parser = parser();
        let fy = parser
            .extract_fiscal_year("compare 2022-23 with FY24-25")
            .unwrap();
        assert_eq!(fy.to_string(), "FY24-25");
    }

    #[test]
    fn test_canonical_labels_round_trip() {
        let parser = parser();
        for start in 0u8..100 {
            let label = format!("FY{:02}-{:02}", start, (start + 1) % 100);
            let parsed = parser
                .extract_fiscal_year(&format!("targets in {}", label))
                .unwrap();
            assert_eq!(parsed.to_string(), label);
        }
    }

    #[test]
    fn test_funder_id_extraction() {
        let parser = parser();
        assert_eq!(
            parser.extract_funder_id("history for F12 please").as_deref(),
            Some("F12")
        );
        assert_eq!(
            parser.extract_funder_id("show funder id ACME-7").as_deref(),
            Some("ACME-7")
        );
        assert_eq!(parser.extract_funder_id("FY24-25 totals"), None);
    }

    #[test]
    fn test_parameters_follow_chosen_category() {
        let parser = parser();

        let query = parser.parse("Top 5 funders this year");
        assert_eq!(query.parameters.limit, Some(5));
        assert_eq!(query.parameters.sort, None);

        let query = parser.parse("Lowest donors in FY24-25");
        assert_eq!(query.parameters.sort, Some(SortDirection::Asc));

        let query = parser.parse("Which states are above target?");
        assert_eq!(query.query_type, QueryType::StatePerformance);
        assert!(query.parameters.above_target);
        assert!(!query.parameters.below_target);

        let query = parser.parse("High probability pipeline in Kerala");
        assert_eq!(query.parameters.min_probability, Some(0.7));
        assert_eq!(query.filters.state_code.as_deref(), Some("KL"));

        let query = parser.parse("prospects with probability above 60%");
        assert_eq!(query.parameters.min_probability, Some(0.6));

        let query = parser.parse("Growth over the last 3 years");
        assert_eq!(query.query_type, QueryType::TrendAnalysis);
        assert_eq!(query.parameters.years, Some(3));
        assert_eq!(query.parameters.limit, None);

        // Pipeline vocabulary under a funder question is not interpreted
        let query = parser.parse("high probability donors");
        assert_eq!(query.query_type, QueryType::FunderAnalysis);
        assert_eq!(query.parameters.min_probability, None);
    }

    #[test]
    fn test_coarse_intent() {
        let parser = parser();
        assert_eq!(
            parser.extract_intent("Compare Karnataka vs Kerala"),
            CoarseIntent::CompareEntities
        );
        assert_eq!(
            parser.extract_intent("growth in contributions"),
            CoarseIntent::AnalyzeTrends
        );
        assert_eq!(
            parser.extract_intent("which states are lagging"),
            CoarseIntent::FindUnderperformers
        );
        assert_eq!(
            parser.extract_intent("top funders"),
            CoarseIntent::FindTopPerformers
        );
        assert_eq!(
            parser.extract_intent("how much did we raise"),
            CoarseIntent::GetTotalAmount
        );
        assert_eq!(
            parser.extract_intent("list prospects"),
            CoarseIntent::ListEntities
        );
        assert_eq!(parser.extract_intent("hello"), CoarseIntent::GeneralInquiry);
    }

    #[test]
    fn test_parse_is_deterministic() {
        let parser = parser();
        let text = "Top 3 donors in Maharashtra for FY2023-24";
        assert_eq!(parser.parse(text), parser.parse(text));
    }
}
