//! Locally persisted synchronization status records.
//!
//! # Design
//! `StatusRepository` is the storage contract; `InMemoryStatusRepository`
//! is the bundled implementation. Lookups that miss raise
//! `StatusError::NotFound`; any failure of the backing store is wrapped in
//! `CouldNotLoad`, `CouldNotSave` or `CouldNotDelete` with a contextual message.

use std::collections::BTreeMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::StatusError;

/// Sync state of one provider resource, keyed by `status_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub status_id: String,
    pub handle: String,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Status {
    pub fn new(status_id: &str, handle: &str, state: &str) -> Self {
        Self {
            status_id: status_id.to_string(),
            handle: handle.to_string(),
            state: state.to_string(),
            message: None,
        }
    }
}

/// Fields `StatusCriteria` can filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusField {
    Handle,
    State,
}

/// Equality filters (all must match) plus optional 1-based paging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusCriteria {
    pub filters: Vec<(StatusField, String)>,
    pub page_size: Option<usize>,
    pub current_page: usize,
}

impl StatusCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: StatusField, value: &str) -> Self {
        self.filters.push((field, value.to_string()));
        self
    }

    pub fn page(mut self, page_size: usize, current_page: usize) -> Self {
        self.page_size = Some(page_size);
        self.current_page = current_page;
        self
    }

    fn matches(&self, status: &Status) -> bool {
        self.filters.iter().all(|(field, value)| match field {
            StatusField::Handle => &status.handle == value,
            StatusField::State => &status.state == value,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSearchResults {
    pub items: Vec<Status>,
    /// Matches before paging.
    pub total_count: usize,
    pub criteria: StatusCriteria,
}

pub trait StatusRepository {
    /// Insert or replace the record with the same `status_id`.
    fn save(&self, status: Status) -> Result<Status, StatusError>;

    fn get(&self, status_id: &str) -> Result<Status, StatusError>;

    fn get_list(&self, criteria: &StatusCriteria) -> Result<StatusSearchResults, StatusError>;

    /// Remove `status`. Removing a record that is already gone succeeds.
    fn delete(&self, status: &Status) -> Result<bool, StatusError>;

    fn delete_by_id(&self, status_id: &str) -> Result<bool, StatusError> {
        let status = self.get(status_id)?;
        self.delete(&status)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStatusRepository {
    records: RwLock<BTreeMap<String, Status>>,
}

impl InMemoryStatusRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatusRepository for InMemoryStatusRepository {
    fn save(&self, status: Status) -> Result<Status, StatusError> {
        if status.status_id.trim().is_empty() {
            return Err(StatusError::CouldNotSave("status_id must not be empty".to_string()));
        }
        let mut records = self
            .records
            .write()
            .map_err(|e| StatusError::CouldNotSave(e.to_string()))?;
        records.insert(status.status_id.clone(), status.clone());
        tracing::debug!(status_id = %status.status_id, state = %status.state, "status saved");
        Ok(status)
    }

    fn get(&self, status_id: &str) -> Result<Status, StatusError> {
        let records = self
            .records
            .read()
            .map_err(|e| StatusError::CouldNotLoad(e.to_string()))?;
        records.get(status_id).cloned().ok_or_else(|| StatusError::NotFound {
            status_id: status_id.to_string(),
        })
    }

    fn get_list(&self, criteria: &StatusCriteria) -> Result<StatusSearchResults, StatusError> {
        let records = self
            .records
            .read()
            .map_err(|e| StatusError::CouldNotLoad(e.to_string()))?;
        let matched: Vec<&Status> = records.values().filter(|s| criteria.matches(s)).collect();
        let total_count = matched.len();

        let items = match criteria.page_size {
            Some(size) if size > 0 => {
                let page = criteria.current_page.max(1);
                match (page - 1).checked_mul(size) {
                    Some(offset) => matched.into_iter().skip(offset).take(size).cloned().collect(),
                    None => Vec::new(),
                }
            }
            _ => matched.into_iter().cloned().collect(),
        };

        Ok(StatusSearchResults {
            items,
            total_count,
            criteria: criteria.clone(),
        })
    }

    fn delete(&self, status: &Status) -> Result<bool, StatusError> {
        let mut records = self
            .records
            .write()
            .map_err(|e| StatusError::CouldNotDelete(e.to_string()))?;
        records.remove(&status.status_id);
        tracing::debug!(status_id = %status.status_id, "status deleted");
        Ok(true)
    }
}
