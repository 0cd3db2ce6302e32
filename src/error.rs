use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Input data that cannot be turned into trustworthy features or metrics.
///
/// Carries the offending column names and match ids so the caller can go
/// straight to the broken rows.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} (columns: {columns:?}, rows: {rows:?})")]
pub struct DataQualityError {
    pub message: String,
    pub columns: Vec<String>,
    pub rows: Vec<i64>,
}

impl DataQualityError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_rows(mut self, rows: Vec<i64>) -> Self {
        self.rows = rows;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CategoryKind {
    Team,
    Venue,
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryKind::Team => f.write_str("team"),
            CategoryKind::Venue => f.write_str("venue"),
        }
    }
}

/// A team or venue that was not part of the encoder's fitted set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}' (not seen when the encoder was fitted)")]
pub struct UnknownCategoryError {
    pub kind: CategoryKind,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    #[error(transparent)]
    UnknownCategory(#[from] UnknownCategoryError),
    #[error(transparent)]
    DataQuality(#[from] DataQualityError),
}

/// Why a cached batch cannot be served. Triggers a full recompute, never a
/// user-facing failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaleOrMissing {
    pub missing: Vec<i64>,
    pub expired: Vec<i64>,
}

impl fmt::Display for StaleOrMissing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} missing, {} expired",
            self.missing.len(),
            self.expired.len()
        )
    }
}
