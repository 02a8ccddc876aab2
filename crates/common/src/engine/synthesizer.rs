//! Synthesizer - Turns analysis results into prose
//!
//! Provides:
//! - Narrative answers grounded in an `AnalysisResult`
//! - Model-backed question classification as a secondary signal
//! - Supplementary insight bullets with fallback to the analyzer's own

use crate::errors::{AppError, Result};
use crate::llm::{GenerationOptions, LlmError, TextGenerator};
use crate::models::{AnalysisResult, DataContext, MetricValue, QueryType};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Records rendered into the prompt
const DATA_SAMPLE_SIZE: usize = 10;

/// Prior turns rendered into the prompt
const MAX_HISTORY_TURNS: usize = 6;

/// A prior message in the conversation. Used only as context for the prose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: String,
    pub content: String,
}

/// Model-backed classification of a question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub intent: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default, alias = "suggested_type")]
    pub suggested_type: Option<QueryType>,
}

/// Renders analysis results through a text generator
pub struct Synthesizer {
    generator: Arc<dyn TextGenerator>,
    options: GenerationOptions,
    timeout: Duration,
}

impl Synthesizer {
    pub fn new(generator: Arc<dyn TextGenerator>, options: GenerationOptions, timeout: Duration) -> Self {
        Self {
            generator,
            options,
            timeout,
        }
    }

    pub fn model_name(&self) -> &str {
        self.generator.model_name()
    }

    /// Compose a natural-language answer for an analysis result
    pub async fn compose(
        &self,
        question: &str,
        history: &[ConversationTurn],
        result: &AnalysisResult,
        context: &DataContext,
    ) -> Result<String> {
        let prompt = self.build_prompt(question, history, result, context)?;
        let answer = self.call(&prompt, &self.options).await?;
        debug!(
            model = self.model_name(),
            chars = answer.len(),
            "Narrative composed"
        );
        Ok(answer.trim().to_string())
    }

    /// Classify a question through the model; never used for routing
    pub async fn classify(&self, question: &str) -> Result<Classification> {
        let types: Vec<&str> = QueryType::ALL.iter().map(QueryType::as_str).collect();
        let prompt = format!(
            "Classify this fundraising question.\n\
            Question: {}\n\n\
            Reply with JSON: {{\"intent\": one of get_total_amount, list_entities, \
            compare_entities, analyze_trends, find_top_performers, find_underperformers, \
            general_inquiry; \"confidence\": number between 0 and 1; \
            \"suggestedType\": one of {}}}",
            question,
            types.join(", ")
        );

        let value = tokio::time::timeout(self.timeout, self.generator.classify(&prompt))
            .await
            .map_err(|_| LlmError::Timeout(self.timeout))
            .and_then(|reply| reply)
            .map_err(narrative_error)?;

        let mut classification: Classification = serde_json::from_value(value).map_err(|e| {
            AppError::NarrativeGenerationFailed {
                message: format!("Unparsable classification: {}", e),
            }
        })?;
        classification.confidence = classification.confidence.clamp(0.0, 1.0);
        Ok(classification)
    }

    /// Ask the model for extra insight bullets from the metrics.
    /// Falls back to the analyzer's own insights on any failure.
    pub async fn enhance_insights(&self, result: &AnalysisResult) -> Vec<String> {
        let mut prompt = String::from(
            "Suggest up to three short, concrete insights for a fundraising team \
            based only on these figures. One per line, each starting with \"- \".\n\n",
        );
        let _ = writeln!(prompt, "Summary: {}", result.summary);
        render_metrics(&mut prompt, result);

        match self.call(&prompt, &self.options).await {
            Ok(reply) => {
                let bullets: Vec<String> = reply
                    .lines()
                    .filter_map(|line| {
                        line.trim()
                            .strip_prefix("- ")
                            .or_else(|| line.trim().strip_prefix("• "))
                    })
                    .map(|line| line.trim().to_string())
                    .filter(|line| !line.is_empty())
                    .take(3)
                    .collect();
                if bullets.is_empty() {
                    result.insights.clone()
                } else {
                    bullets
                }
            }
            Err(e) => {
                warn!(error = %e, "Insight enhancement failed, keeping analyzer insights");
                result.insights.clone()
            }
        }
    }

    /// Fixed-structure prompt: preamble, conversation, question, results
    pub fn build_prompt(
        &self,
        question: &str,
        history: &[ConversationTurn],
        result: &AnalysisResult,
        context: &DataContext,
    ) -> Result<String> {
        let sizes = context.sizes();
        let mut prompt = format!(
            "You answer questions about an education nonprofit's fundraising. \
            Fiscal years run April to March; the current fiscal year is {}.\n\
            Data on hand: {} funders, {} contributions, {} state targets, \
            {} prospects, {} states, {} schools.\n\
            Use only the figures below. If they do not answer the question, say so.\n",
            context.current_fiscal_year(),
            sizes.funders,
            sizes.contributions,
            sizes.state_targets,
            sizes.prospects,
            sizes.states,
            sizes.schools,
        );

        let recent = &history[history.len().saturating_sub(MAX_HISTORY_TURNS)..];
        if !recent.is_empty() {
            prompt.push_str("\nConversation so far:\n");
            for turn in recent {
                let _ = writeln!(prompt, "{}: {}", turn.role, turn.content);
            }
        }

        let _ = write!(
            prompt,
            "\nQuestion: {}\n\nAnalysis ({}):\nSummary: {}\n",
            question, result.query_type, result.summary
        );

        if !result.insights.is_empty() {
            prompt.push_str("Insights:\n");
            for insight in &result.insights {
                let _ = writeln!(prompt, "- {}", insight);
            }
        }

        render_metrics(&mut prompt, result);

        if !result.data.is_empty() {
            let sample = &result.data[..result.data.len().min(DATA_SAMPLE_SIZE)];
            let _ = writeln!(
                prompt,
                "Records (first {} of {}):\n{}",
                sample.len(),
                result.data.len(),
                serde_json::to_string(sample)?
            );
        }

        prompt.push_str("\nAnswer:");
        Ok(prompt)
    }

    async fn call(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        let reply = tokio::time::timeout(self.timeout, self.generator.generate(prompt, options))
            .await
            .map_err(|_| LlmError::Timeout(self.timeout))
            .and_then(|reply| reply)
            .map_err(narrative_error)?;

        if reply.trim().is_empty() {
            return Err(narrative_error(LlmError::EmptyResponse));
        }
        Ok(reply)
    }
}

fn narrative_error(error: LlmError) -> AppError {
    AppError::NarrativeGenerationFailed {
        message: error.to_string(),
    }
}

fn render_metrics(prompt: &mut String, result: &AnalysisResult) {
    if result.metrics.is_empty() {
        return;
    }
    prompt.push_str("Metrics:\n");
    for (name, value) in &result.metrics {
        match value {
            MetricValue::Number(n) => {
                let _ = writeln!(prompt, "- {}: {}", name, n);
            }
            MetricValue::Breakdown(parts) => {
                let rendered: Vec<String> =
                    parts.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                let _ = writeln!(prompt, "- {}: {}", name, rendered.join(", "));
            }
        }
    }
}
