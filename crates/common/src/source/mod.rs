//! Tabular data source abstraction
//!
//! The fundraising records live in an external spreadsheet-backed store that
//! exposes one idempotent read per collection. This module provides:
//! - The `DataSource` trait consumed by the data context cache
//! - An HTTP/JSON client for the store
//! - An in-memory source with failure injection for tests and local runs

use crate::config::DataSourceConfig;
use crate::errors::{AppError, Result};
use crate::models::{Collections, Contribution, Funder, Prospect, School, State, StateTarget};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use thiserror::Error;

/// The six collections held by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Funders,
    Contributions,
    StateTargets,
    Prospects,
    States,
    Schools,
}

impl CollectionKind {
    pub const ALL: [CollectionKind; 6] = [
        CollectionKind::Funders,
        CollectionKind::Contributions,
        CollectionKind::StateTargets,
        CollectionKind::Prospects,
        CollectionKind::States,
        CollectionKind::Schools,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionKind::Funders => "funders",
            CollectionKind::Contributions => "contributions",
            CollectionKind::StateTargets => "state_targets",
            CollectionKind::Prospects => "prospects",
            CollectionKind::States => "states",
            CollectionKind::Schools => "schools",
        }
    }

    /// URL path segment under the store's base URL
    pub fn path(&self) -> &'static str {
        match self {
            CollectionKind::StateTargets => "state-targets",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reading one collection from the store
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("store returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Records did not match the expected shape (including negative amounts)
    #[error("invalid records: {0}")]
    Decode(String),
}

impl SourceError {
    /// Translate into the application taxonomy for the given collection
    pub fn into_app_error(self, collection: CollectionKind) -> AppError {
        match self {
            SourceError::Decode(message) => AppError::DataIntegrity {
                message: format!("{}: {}", collection, message),
            },
            other => AppError::DataUnavailable {
                collection: collection.to_string(),
                message: other.to_string(),
            },
        }
    }
}

pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Read access to the six collections
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn funders(&self) -> SourceResult<Vec<Funder>>;

    async fn contributions(&self) -> SourceResult<Vec<Contribution>>;

    async fn state_targets(&self) -> SourceResult<Vec<StateTarget>>;

    async fn prospects(&self) -> SourceResult<Vec<Prospect>>;

    async fn states(&self) -> SourceResult<Vec<State>>;

    async fn schools(&self) -> SourceResult<Vec<School>>;

    /// Name used in logs
    fn name(&self) -> &str;
}

/// The store answers either with a bare array or with `{ "data": [...] }`
#[derive(Deserialize)]
#[serde(untagged)]
enum RecordsEnvelope<T> {
    Bare(Vec<T>),
    Wrapped { data: Vec<T> },
}

impl<T> RecordsEnvelope<T> {
    fn into_records(self) -> Vec<T> {
        match self {
            RecordsEnvelope::Bare(records) => records,
            RecordsEnvelope::Wrapped { data } => data,
        }
    }
}

/// HTTP client for the spreadsheet-backed store
pub struct HttpDataSource {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpDataSource {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn fetch<T: DeserializeOwned>(&self, kind: CollectionKind) -> SourceResult<Vec<T>> {
        let url = format!("{}/{}", self.base_url, kind.path());

        let mut request = self.client.get(&url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SourceError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status { status, body });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SourceError::Request(e.to_string()))?;

        let envelope: RecordsEnvelope<T> =
            serde_json::from_slice(&bytes).map_err(|e| SourceError::Decode(e.to_string()))?;
        let records = envelope.into_records();

        tracing::debug!(collection = %kind, count = records.len(), "Fetched collection");
        Ok(records)
    }
}

#[async_trait]
impl DataSource for HttpDataSource {
    async fn funders(&self) -> SourceResult<Vec<Funder>> {
        self.fetch(CollectionKind::Funders).await
    }

    async fn contributions(&self) -> SourceResult<Vec<Contribution>> {
        self.fetch(CollectionKind::Contributions).await
    }

    async fn state_targets(&self) -> SourceResult<Vec<StateTarget>> {
        self.fetch(CollectionKind::StateTargets).await
    }

    async fn prospects(&self) -> SourceResult<Vec<Prospect>> {
        self.fetch(CollectionKind::Prospects).await
    }

    async fn states(&self) -> SourceResult<Vec<State>> {
        self.fetch(CollectionKind::States).await
    }

    async fn schools(&self) -> SourceResult<Vec<School>> {
        self.fetch(CollectionKind::Schools).await
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// In-memory source for tests and local runs.
///
/// Collections can be swapped between fetches, individual collections can be
/// made to fail, and every read is counted.
#[derive(Default)]
pub struct StaticDataSource {
    collections: RwLock<Collections>,
    failing: Mutex<HashSet<CollectionKind>>,
    calls: Mutex<HashMap<CollectionKind, usize>>,
    latency: Option<Duration>,
}

impl StaticDataSource {
    pub fn new(collections: Collections) -> Self {
        Self {
            collections: RwLock::new(collections),
            ..Default::default()
        }
    }

    /// Delay every read, to exercise concurrent callers
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn set_collections(&self, collections: Collections) {
        if let Ok(mut guard) = self.collections.write() {
            *guard = collections;
        }
    }

    pub fn fail(&self, kind: CollectionKind) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(kind);
        }
    }

    pub fn recover(&self, kind: CollectionKind) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.remove(&kind);
        }
    }

    /// Number of reads issued for a collection
    pub fn calls(&self, kind: CollectionKind) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.get(&kind).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    async fn read<T: Clone>(
        &self,
        kind: CollectionKind,
        select: impl Fn(&Collections) -> &Vec<T>,
    ) -> SourceResult<Vec<T>> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry(kind).or_insert(0) += 1;
        }

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let failing = self
            .failing
            .lock()
            .map(|failing| failing.contains(&kind))
            .unwrap_or(false);
        if failing {
            return Err(SourceError::Request(format!("{} is unreachable", kind)));
        }

        let collections = self
            .collections
            .read()
            .map_err(|_| SourceError::Request("collections lock poisoned".to_string()))?;
        Ok(select(&collections).clone())
    }
}

#[async_trait]
impl DataSource for StaticDataSource {
    async fn funders(&self) -> SourceResult<Vec<Funder>> {
        self.read(CollectionKind::Funders, |c| &c.funders).await
    }

    async fn contributions(&self) -> SourceResult<Vec<Contribution>> {
        self.read(CollectionKind::Contributions, |c| &c.contributions).await
    }

    async fn state_targets(&self) -> SourceResult<Vec<StateTarget>> {
        self.read(CollectionKind::StateTargets, |c| &c.state_targets).await
    }

    async fn prospects(&self) -> SourceResult<Vec<Prospect>> {
        self.read(CollectionKind::Prospects, |c| &c.prospects).await
    }

    async fn states(&self) -> SourceResult<Vec<State>> {
        self.read(CollectionKind::States, |c| &c.states).await
    }

    async fn schools(&self) -> SourceResult<Vec<School>> {
        self.read(CollectionKind::Schools, |c| &c.schools).await
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Create the data source described by configuration
pub fn create_data_source(config: &DataSourceConfig) -> Result<Arc<dyn DataSource>> {
    let base_url = config
        .base_url
        .as_deref()
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| AppError::ConfigurationMissing {
            key: "data_source.base_url".to_string(),
        })?;

    let source = HttpDataSource::new(base_url, config.api_key.clone(), config.timeout())?;
    Ok(Arc::new(source))
}
