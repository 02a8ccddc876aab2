//! Question-answering engine
//!
//! The intelligence layer that turns a free-text question into an answer:
//! - Keyword routing and filter extraction
//! - Pure aggregations over the cached data context
//! - Narrative composition through a text generator
//! - Request orchestration

pub mod analysis;
mod orchestrator;
mod query_parser;
mod synthesizer;

pub use analysis::{analyze, resolve_funder_mention, UNKNOWN_FUNDER};
pub use orchestrator::{
    NarrativeSource, PipelineStage, QueryOrchestrator, QueryOutcome, ServiceStatus,
};
pub use query_parser::{QueryParser, QueryParserConfig};
pub use synthesizer::{Classification, ConversationTurn, Synthesizer};
