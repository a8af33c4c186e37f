//! HTTP roster store.
//!
//! Talks to the roster API with reqwest and validates every row at the
//! boundary, so the engine only ever sees well-formed [`CrewRecord`]s.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::auth::API_KEY_HEADER;
use crate::errors::ErrorDetails;
use crate::models::{CrewRecord, RawCrewRow};
use crate::roster::{
    classify_backend_message, RosterPage, RosterQuery, RosterStore, StoreError, TransientError,
};

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Option<WirePage>,
    #[serde(default)]
    error: Option<ErrorDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePage {
    rows: Vec<RawCrewRow>,
    #[serde(default)]
    total_count: Option<u64>,
}

/// [`RosterStore`] reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRosterStore {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpRosterStore {
    /// `base_url` is the service root, e.g. `http://127.0.0.1:8080`.
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/api/crew/query", base_url.trim_end_matches('/')),
            api_key,
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn transport_error(&self, err: reqwest::Error) -> StoreError {
        let transient = if err.is_timeout() {
            TransientError::Timeout(self.timeout)
        } else if err.is_decode() {
            TransientError::Malformed(err.to_string())
        } else {
            TransientError::Network(err.to_string())
        };
        StoreError::Transient(transient)
    }
}

#[async_trait]
impl RosterStore for HttpRosterStore {
    async fn query_roster(&self, query: &RosterQuery) -> Result<RosterPage, StoreError> {
        let mut request = self.client.post(&self.endpoint).json(query);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if status.is_success() {
            return parse_page(&body);
        }
        Err(status_error(status, &body))
    }
}

/// Classify a non-success response.
fn status_error(status: StatusCode, body: &str) -> StoreError {
    let message = serde_json::from_str::<Envelope>(body)
        .ok()
        .and_then(|envelope| envelope.error)
        .map(|error| format!("{}: {}", error.code, error.message))
        .unwrap_or_else(|| status.to_string());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::AccessControl(message),
        _ => classify_backend_message(&message),
    }
}

/// Decode a success body, rejecting the page if any row is malformed.
fn parse_page(body: &str) -> Result<RosterPage, StoreError> {
    let malformed = |msg: String| StoreError::Transient(TransientError::Malformed(msg));

    let envelope: Envelope = serde_json::from_str(body).map_err(|e| malformed(e.to_string()))?;
    let page = envelope
        .data
        .ok_or_else(|| malformed("response without data".to_string()))?;

    let rows = page
        .rows
        .into_iter()
        .map(CrewRecord::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(malformed)?;

    Ok(RosterPage {
        rows,
        total_count: page.total_count,
    })
}
