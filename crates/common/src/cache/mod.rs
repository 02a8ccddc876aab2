//! Data context cache
//!
//! Provides:
//! - A time-to-live snapshot of the six source collections
//! - Single-flight refresh: concurrent callers share one fetch
//! - Atomic replacement, so readers never observe a partial context
//! - Retention of the last good snapshot when a refresh fails

use crate::errors::{AppError, Result};
use crate::metrics;
use crate::models::{CollectionSizes, Collections, DataContext};
use crate::source::{CollectionKind, DataSource};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

const CACHE_NAME: &str = "data_context";

struct CacheEntry {
    context: Arc<DataContext>,
    loaded_at: Instant,
    /// Set by an explicit refresh; the snapshot stays readable as last good
    invalidated: bool,
}

impl CacheEntry {
    fn is_fresh(&self, ttl: Duration) -> bool {
        !self.invalidated && self.loaded_at.elapsed() < ttl
    }
}

/// Snapshot of cache state for status reporting
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    pub loaded: bool,
    pub fresh: bool,
    pub ttl_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sizes: Option<CollectionSizes>,
}

/// Outcome of the most recent fetch attempt, kept under the refresh lock
#[derive(Default)]
struct RefreshState {
    last_failure: Option<AppError>,
}

/// TTL cache holding the current [`DataContext`]
pub struct DataContextCache {
    source: Arc<dyn DataSource>,
    ttl: Duration,
    entry: RwLock<Option<CacheEntry>>,
    refresh_lock: Mutex<RefreshState>,
    /// Completed fetch attempts, successful or not
    attempts: AtomicU64,
}

impl DataContextCache {
    pub fn new(source: Arc<dyn DataSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            entry: RwLock::new(None),
            refresh_lock: Mutex::new(RefreshState::default()),
            attempts: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached context, fetching a new one if it is missing,
    /// expired or invalidated.
    ///
    /// A failed fetch is reported as an error and the previous snapshot is
    /// kept. Callers that queued behind a failed attempt receive the same
    /// error; the next caller to arrive afterwards tries again.
    pub async fn get_context(&self) -> Result<Arc<DataContext>> {
        if let Some(context) = self.fresh_context().await {
            metrics::record_cache(true, CACHE_NAME);
            debug!(cache = CACHE_NAME, "Cache hit");
            return Ok(context);
        }

        let seen_attempts = self.attempts.load(Ordering::Acquire);
        let mut state = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited
        if let Some(context) = self.fresh_context().await {
            metrics::record_cache(true, CACHE_NAME);
            debug!(cache = CACHE_NAME, "Cache hit after waiting on refresh");
            return Ok(context);
        }
        if self.attempts.load(Ordering::Acquire) != seen_attempts {
            if let Some(failure) = &state.last_failure {
                debug!(cache = CACHE_NAME, "Sharing failure of the fetch we waited on");
                return Err(shared_failure(failure));
            }
        }

        metrics::record_cache(false, CACHE_NAME);
        debug!(cache = CACHE_NAME, "Cache miss");

        let fetched = self.fetch().await;
        self.attempts.fetch_add(1, Ordering::Release);

        let context = match fetched {
            Ok(context) => Arc::new(context),
            Err(e) => {
                state.last_failure = Some(shared_failure(&e));
                return Err(e);
            }
        };
        state.last_failure = None;

        let mut entry = self.entry.write().await;
        *entry = Some(CacheEntry {
            context: Arc::clone(&context),
            loaded_at: Instant::now(),
            invalidated: false,
        });

        Ok(context)
    }

    /// Invalidate the cached context; the next read fetches
    pub async fn refresh(&self) {
        let mut entry = self.entry.write().await;
        if let Some(entry) = entry.as_mut() {
            entry.invalidated = true;
        }
        info!(cache = CACHE_NAME, "Data context invalidated");
    }

    /// Invalidate and fetch immediately
    pub async fn reload(&self) -> Result<Arc<DataContext>> {
        self.refresh().await;
        self.get_context().await
    }

    /// The most recent successfully fetched context, fresh or not
    #[cfg(test)]
    pub(crate) async fn last_good(&self) -> Option<Arc<DataContext>> {
        self.entry
            .read()
            .await
            .as_ref()
            .map(|entry| Arc::clone(&entry.context))
    }

    pub async fn status(&self) -> CacheStatus {
        let entry = self.entry.read().await;
        match entry.as_ref() {
            Some(entry) => CacheStatus {
                loaded: true,
                fresh: entry.is_fresh(self.ttl),
                ttl_secs: self.ttl.as_secs(),
                age_secs: Some(entry.loaded_at.elapsed().as_secs()),
                fetched_at: Some(entry.context.fetched_at()),
                sizes: Some(entry.context.sizes()),
            },
            None => CacheStatus {
                loaded: false,
                fresh: false,
                ttl_secs: self.ttl.as_secs(),
                age_secs: None,
                fetched_at: None,
                sizes: None,
            },
        }
    }

    async fn fresh_context(&self) -> Option<Arc<DataContext>> {
        self.entry
            .read()
            .await
            .as_ref()
            .filter(|entry| entry.is_fresh(self.ttl))
            .map(|entry| Arc::clone(&entry.context))
    }

    /// Fetch all six collections concurrently; any failure aborts the build
    async fn fetch(&self) -> Result<DataContext> {
        let started = std::time::Instant::now();
        let source = self.source.as_ref();

        let fetched = tokio::try_join!(
            async {
                source
                    .funders()
                    .await
                    .map_err(|e| e.into_app_error(CollectionKind::Funders))
            },
            async {
                source
                    .contributions()
                    .await
                    .map_err(|e| e.into_app_error(CollectionKind::Contributions))
            },
            async {
                source
                    .state_targets()
                    .await
                    .map_err(|e| e.into_app_error(CollectionKind::StateTargets))
            },
            async {
                source
                    .prospects()
                    .await
                    .map_err(|e| e.into_app_error(CollectionKind::Prospects))
            },
            async {
                source
                    .states()
                    .await
                    .map_err(|e| e.into_app_error(CollectionKind::States))
            },
            async {
                source
                    .schools()
                    .await
                    .map_err(|e| e.into_app_error(CollectionKind::Schools))
            },
        );

        let elapsed = started.elapsed().as_secs_f64();
        let (funders, contributions, state_targets, prospects, states, schools) = match fetched {
            Ok(collections) => collections,
            Err(e) => {
                metrics::record_context_fetch(elapsed, false);
                warn!(source = self.source.name(), error = %e, "Data context fetch failed");
                return Err(e);
            }
        };

        let context = DataContext::new(
            Collections {
                funders,
                contributions,
                state_targets,
                prospects,
                states,
                schools,
            },
            Utc::now(),
        );

        let sizes = context.sizes();
        metrics::record_context_fetch(elapsed, true);
        metrics::record_context_sizes(&sizes.as_pairs());
        info!(
            source = self.source.name(),
            funders = sizes.funders,
            contributions = sizes.contributions,
            prospects = sizes.prospects,
            duration_ms = (elapsed * 1000.0) as u64,
            "Data context loaded"
        );

        Ok(context)
    }
}

/// Copy of a fetch error for the callers that waited on the same attempt.
/// Fetches only fail with data errors; anything else keeps its message.
fn shared_failure(error: &AppError) -> AppError {
    match error {
        AppError::DataUnavailable {
            collection,
            message,
        } => AppError::DataUnavailable {
            collection: collection.clone(),
            message: message.clone(),
        },
        AppError::DataIntegrity { message } => AppError::DataIntegrity {
            message: message.clone(),
        },
        other => AppError::Internal {
            message: other.to_string(),
        },
    }
}
