//! Immutable snapshot of all source collections

use super::{Contribution, FiscalYear, Funder, Prospect, School, State, StateTarget};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// The six collections as fetched from the store
#[derive(Debug, Clone, Default)]
pub struct Collections {
    pub funders: Vec<Funder>,
    pub contributions: Vec<Contribution>,
    pub state_targets: Vec<StateTarget>,
    pub prospects: Vec<Prospect>,
    pub states: Vec<State>,
    pub schools: Vec<School>,
}

/// Record counts per collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSizes {
    pub funders: usize,
    pub contributions: usize,
    pub state_targets: usize,
    pub prospects: usize,
    pub states: usize,
    pub schools: usize,
}

impl CollectionSizes {
    pub fn as_pairs(&self) -> [(&'static str, usize); 6] {
        [
            ("funders", self.funders),
            ("contributions", self.contributions),
            ("state_targets", self.state_targets),
            ("prospects", self.prospects),
            ("states", self.states),
            ("schools", self.schools),
        ]
    }
}

/// Read-only snapshot consumed by every analyzer.
///
/// There are no mutating methods: a refresh builds a new `DataContext` and
/// the cache swaps the shared pointer.
#[derive(Debug, Clone)]
pub struct DataContext {
    collections: Collections,
    fetched_at: DateTime<Utc>,
    funder_index: HashMap<String, usize>,
    state_index: HashMap<String, usize>,
}

impl DataContext {
    pub fn new(collections: Collections, fetched_at: DateTime<Utc>) -> Self {
        // First occurrence wins for duplicated ids
        let mut funder_index = HashMap::with_capacity(collections.funders.len());
        for (i, funder) in collections.funders.iter().enumerate() {
            funder_index.entry(funder.id.clone()).or_insert(i);
        }
        let mut state_index = HashMap::with_capacity(collections.states.len());
        for (i, state) in collections.states.iter().enumerate() {
            state_index.entry(state.code.clone()).or_insert(i);
        }

        Self {
            collections,
            fetched_at,
            funder_index,
            state_index,
        }
    }

    pub fn funders(&self) -> &[Funder] {
        &self.collections.funders
    }

    pub fn contributions(&self) -> &[Contribution] {
        &self.collections.contributions
    }

    pub fn state_targets(&self) -> &[StateTarget] {
        &self.collections.state_targets
    }

    pub fn prospects(&self) -> &[Prospect] {
        &self.collections.prospects
    }

    pub fn states(&self) -> &[State] {
        &self.collections.states
    }

    pub fn schools(&self) -> &[School] {
        &self.collections.schools
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// Fiscal year containing the retrieval timestamp; analyzers default to it
    pub fn current_fiscal_year(&self) -> FiscalYear {
        FiscalYear::containing(self.fetched_at.date_naive())
    }

    pub fn funder(&self, id: &str) -> Option<&Funder> {
        self.funder_index
            .get(id)
            .map(|&i| &self.collections.funders[i])
    }

    pub fn state(&self, code: &str) -> Option<&State> {
        self.state_index
            .get(code)
            .map(|&i| &self.collections.states[i])
    }

    pub fn sizes(&self) -> CollectionSizes {
        CollectionSizes {
            funders: self.collections.funders.len(),
            contributions: self.collections.contributions.len(),
            state_targets: self.collections.state_targets.len(),
            prospects: self.collections.prospects.len(),
            states: self.collections.states.len(),
            schools: self.collections.schools.len(),
        }
    }
}
