//! Roster store contract and outcome taxonomy.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::query::RosterQuery;
use crate::models::CrewRecord;

/// One page of query results.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RosterPage {
    pub rows: Vec<CrewRecord>,
    /// Advisory count of all matching rows, when the backend reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u64>,
}

/// Recoverable failures. The same query may simply be retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransientError {
    /// Connection or transport failure.
    Network(String),
    /// No answer within the request budget.
    Timeout(Duration),
    /// The backend answered with a payload that does not decode.
    Malformed(String),
    /// The backend reported an error unrelated to access control.
    Backend(String),
}

impl fmt::Display for TransientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransientError::Network(msg) => write!(f, "network error: {}", msg),
            TransientError::Timeout(after) => {
                write!(f, "request timed out after {} ms", after.as_millis())
            }
            TransientError::Malformed(msg) => write!(f, "malformed response: {}", msg),
            TransientError::Backend(msg) => write!(f, "backend error: {}", msg),
        }
    }
}

/// Failure reported by a [`RosterStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store's access-control layer refused or failed to evaluate the query.
    AccessControl(String),
    Transient(TransientError),
}

impl StoreError {
    pub fn is_access_control(&self) -> bool {
        matches!(self, StoreError::AccessControl(_))
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::AccessControl(msg) => write!(f, "access control failure: {}", msg),
            StoreError::Transient(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<TransientError> for StoreError {
    fn from(err: TransientError) -> Self {
        StoreError::Transient(err)
    }
}

/// Message fragments that identify a policy evaluation or permission failure.
const ACCESS_CONTROL_SIGNATURES: &[&str] = &[
    "infinite recursion",
    "policy for relation",
    "permission denied",
    "row-level security",
    "not authorized",
    "access denied",
    "insufficient privilege",
    "42501",
    "42p17",
];

/// Sort a backend error message into access-control or transient.
pub fn classify_backend_message(message: &str) -> StoreError {
    let lowered = message.to_lowercase();
    if ACCESS_CONTROL_SIGNATURES
        .iter()
        .any(|sig| lowered.contains(sig))
    {
        StoreError::AccessControl(message.to_string())
    } else {
        StoreError::Transient(TransientError::Backend(message.to_string()))
    }
}

/// The remote roster store the engine queries.
#[async_trait]
pub trait RosterStore: Send + Sync {
    async fn query_roster(&self, query: &RosterQuery) -> Result<RosterPage, StoreError>;
}
