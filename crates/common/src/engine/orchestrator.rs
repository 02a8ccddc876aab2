//! Query orchestrator
//!
//! Sequences a question through extraction, context fetch, analysis and
//! narrative composition, tracking each stage of the request.

use super::analysis::{self, resolve_funder_mention};
use super::query_parser::{QueryParser, QueryParserConfig};
use super::synthesizer::{ConversationTurn, Synthesizer};
use crate::cache::{CacheStatus, DataContextCache};
use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use crate::llm::{create_text_generator, GenerationOptions};
use crate::metrics;
use crate::models::{AnalysisResult, CoarseIntent, CollectionSizes, DataQuery};
use crate::source::create_data_source;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

/// Stage of a single request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Idle,
    Extracting,
    Fetching,
    Analyzing,
    Composing,
    Done,
    Failed,
}

/// Where the answer text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeSource {
    /// Prose from the text generator
    Llm,
    /// Analyzer summary and insights, used when generation failed
    Insights,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOutcome {
    pub answer: String,
    pub narrative_source: NarrativeSource,
    pub intent: CoarseIntent,
    pub query: DataQuery,
    pub result: AnalysisResult,
    pub stages: Vec<PipelineStage>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub initialized: bool,
    pub model: String,
    pub cross_check_classification: bool,
    pub enhance_insights: bool,
    pub cache: CacheStatus,
}

struct StageTracker<'a> {
    session_id: &'a str,
    stages: Vec<PipelineStage>,
}

impl<'a> StageTracker<'a> {
    fn new(session_id: &'a str) -> Self {
        Self {
            session_id,
            stages: vec![PipelineStage::Idle],
        }
    }

    fn advance(&mut self, stage: PipelineStage) {
        debug!(session_id = self.session_id, from = ?self.current(), to = ?stage, "Pipeline stage");
        self.stages.push(stage);
    }

    fn current(&self) -> PipelineStage {
        self.stages.last().copied().unwrap_or(PipelineStage::Idle)
    }

    fn fail(&mut self, err: &AppError) {
        error!(
            session_id = self.session_id,
            stage = ?self.current(),
            error = %err,
            code = ?err.code(),
            "Question failed"
        );
        self.advance(PipelineStage::Failed);
    }
}

/// Facade over the question pipeline
pub struct QueryOrchestrator {
    parser: QueryParser,
    cache: Arc<DataContextCache>,
    synthesizer: Synthesizer,
    initialized: OnceCell<()>,
    cross_check: bool,
    enhance_insights: bool,
}

impl QueryOrchestrator {
    pub fn new(parser: QueryParser, cache: Arc<DataContextCache>, synthesizer: Synthesizer) -> Self {
        Self {
            parser,
            cache,
            synthesizer,
            initialized: OnceCell::new(),
            cross_check: false,
            enhance_insights: false,
        }
    }

    /// Ask the model to classify every question and log disagreements
    pub fn with_cross_check(mut self, enabled: bool) -> Self {
        self.cross_check = enabled;
        self
    }

    /// Replace analyzer insights with model-suggested ones before composing
    pub fn with_insight_enhancement(mut self, enabled: bool) -> Self {
        self.enhance_insights = enabled;
        self
    }

    /// Wire the pipeline from configuration
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let source = create_data_source(&config.data_source)?;
        let generator = create_text_generator(&config.llm)?;

        let cache = Arc::new(DataContextCache::new(source, config.cache_ttl()));
        let synthesizer = Synthesizer::new(
            generator,
            GenerationOptions::from_config(&config.llm),
            config.llm.timeout(),
        );
        let parser = QueryParser::new(QueryParserConfig::default())?;

        Ok(Self::new(parser, cache, synthesizer)
            .with_cross_check(config.llm.cross_check_classification)
            .with_insight_enhancement(config.llm.enhance_insights))
    }

    pub fn cache(&self) -> &Arc<DataContextCache> {
        &self.cache
    }

    /// Warm the data context once per process; later calls are no-ops.
    /// A failed warm-up is retried on the next call.
    pub async fn initialize(&self) -> Result<()> {
        self.initialized
            .get_or_try_init(|| async {
                let context = self.cache.get_context().await?;
                info!(
                    fiscal_year = %context.current_fiscal_year(),
                    "Query engine initialized"
                );
                Ok::<(), AppError>(())
            })
            .await?;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.initialized()
    }

    /// Answer a question.
    ///
    /// Data and configuration failures abort the request. A failed narrative
    /// degrades to the analyzer's own summary and insights.
    pub async fn ask(
        &self,
        question: &str,
        history: &[ConversationTurn],
        session_id: &str,
    ) -> Result<QueryOutcome> {
        let started = Instant::now();
        let mut tracker = StageTracker::new(session_id);

        tracker.advance(PipelineStage::Extracting);
        let mut query = self.parser.parse(question);
        let intent = self.parser.extract_intent(question);
        if self.cross_check {
            self.cross_check_classification(question, &query, session_id)
                .await;
        }

        tracker.advance(PipelineStage::Fetching);
        let context = match self.cache.get_context().await {
            Ok(context) => context,
            Err(e) => {
                tracker.fail(&e);
                metrics::record_query(
                    started.elapsed().as_secs_f64(),
                    query.query_type.as_str(),
                    "failed",
                );
                return Err(e);
            }
        };
        let _ = self.initialized.set(());

        if query.filters.funder_id.is_none() {
            if let Some(funder_id) = resolve_funder_mention(&context, question) {
                debug!(session_id, funder_id = %funder_id, "Resolved funder from question text");
                query.filters.funder_id = Some(funder_id);
            }
        }

        tracker.advance(PipelineStage::Analyzing);
        let mut result = analysis::analyze(&context, &query);

        tracker.advance(PipelineStage::Composing);
        if self.enhance_insights {
            result.insights = self.synthesizer.enhance_insights(&result).await;
        }
        let (answer, narrative_source) = match self
            .synthesizer
            .compose(question, history, &result, &context)
            .await
        {
            Ok(answer) => (answer, NarrativeSource::Llm),
            Err(e) => {
                warn!(session_id, error = %e, "Narrative failed, answering with analyzer insights");
                metrics::record_narrative_failure("compose");
                (result.insights_text(), NarrativeSource::Insights)
            }
        };

        tracker.advance(PipelineStage::Done);
        let outcome = match narrative_source {
            NarrativeSource::Llm => "success",
            NarrativeSource::Insights => "degraded",
        };
        metrics::record_query(
            started.elapsed().as_secs_f64(),
            query.query_type.as_str(),
            outcome,
        );
        info!(
            session_id,
            query_type = %query.query_type,
            intent = %intent,
            records = result.data.len(),
            narrative = outcome,
            duration_ms = started.elapsed().as_millis() as u64,
            "Question answered"
        );

        Ok(QueryOutcome {
            answer,
            narrative_source,
            intent,
            query,
            result,
            stages: tracker.stages,
        })
    }

    /// Discard the cached context and fetch a new one
    pub async fn refresh(&self) -> Result<CollectionSizes> {
        let context = self.cache.reload().await?;
        let _ = self.initialized.set(());
        Ok(context.sizes())
    }

    pub async fn status(&self) -> ServiceStatus {
        ServiceStatus {
            initialized: self.is_initialized(),
            model: self.synthesizer.model_name().to_string(),
            cross_check_classification: self.cross_check,
            enhance_insights: self.enhance_insights,
            cache: self.cache.status().await,
        }
    }

    async fn cross_check_classification(&self, question: &str, query: &DataQuery, session_id: &str) {
        match self.synthesizer.classify(question).await {
            Ok(classification) if classification.suggested_type != Some(query.query_type) => {
                info!(
                    session_id,
                    routed = %query.query_type,
                    suggested = ?classification.suggested_type,
                    confidence = classification.confidence,
                    "Model classification disagrees with keyword routing"
                );
            }
            Ok(_) => debug!(session_id, "Model classification agrees with keyword routing"),
            Err(e) => debug!(session_id, error = %e, "Classification cross-check unavailable"),
        }
    }
}
