//! Request coordination for the roster stream.
//!
//! Exactly one request token is live at a time. Issuing a new request
//! supersedes the previous token before the new call starts, and a response
//! carrying anything but the live token is dropped on arrival.

use std::time::Duration;

use super::query::RosterQuery;
use super::store::{RosterPage, RosterStore, StoreError, TransientError};

/// Opaque handle identifying one issued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Classified result of a settled request.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success(RosterPage),
    AccessControl(String),
    Transient(TransientError),
    /// The token was superseded or cancelled before the response arrived.
    Stale,
}

#[derive(Debug)]
pub struct RequestCoordinator {
    issued: u64,
    live: Option<RequestToken>,
    timeout: Duration,
}

impl RequestCoordinator {
    pub fn new(timeout: Duration) -> Self {
        Self {
            issued: 0,
            live: None,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn live(&self) -> Option<RequestToken> {
        self.live
    }

    pub fn is_live(&self, token: RequestToken) -> bool {
        self.live == Some(token)
    }

    /// Cancel the live token, then mint and store its successor.
    pub fn issue(&mut self) -> RequestToken {
        if let Some(previous) = self.cancel() {
            tracing::debug!(token = previous.0, "superseded in-flight roster request");
        }
        self.issued += 1;
        let token = RequestToken(self.issued);
        self.live = Some(token);
        token
    }

    /// Cancel the live token, if any, returning it.
    pub fn cancel(&mut self) -> Option<RequestToken> {
        self.live.take()
    }

    /// Settle a response. Only the live token's response is classified.
    pub fn settle(
        &mut self,
        token: RequestToken,
        result: Result<RosterPage, StoreError>,
    ) -> FetchOutcome {
        if !self.is_live(token) {
            tracing::debug!(token = token.0, "discarding stale roster response");
            return FetchOutcome::Stale;
        }
        self.live = None;

        match result {
            Ok(page) => FetchOutcome::Success(page),
            Err(StoreError::AccessControl(msg)) => FetchOutcome::AccessControl(msg),
            Err(StoreError::Transient(err)) => FetchOutcome::Transient(err),
        }
    }
}

/// Run one query with an upper bound on the wait.
pub async fn execute(
    store: &dyn RosterStore,
    query: &RosterQuery,
    timeout: Duration,
) -> Result<RosterPage, StoreError> {
    match tokio::time::timeout(timeout, store.query_roster(query)).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Transient(TransientError::Timeout(timeout))),
    }
}
