//! Visitor counter backed by a remote tracking endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sodium::{Cell, Listener, SodiumCtx, Stream};
use tracing::{debug, error, instrument};

use crate::Error;

pub const VISITOR_COUNT_ERROR: &str = "Failed to load visitor count";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    pub unique_visitors: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VisitRequest<'a> {
    project_name: &'a str,
}

#[async_trait]
pub trait VisitTracker: Send + Sync {
    /// Records one visit for `project` and returns the updated tally.
    async fn report_visit(&self, project: &str) -> Result<Visit, Error>;
}

#[derive(Debug, Clone)]
pub struct HttpVisitTracker {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpVisitTracker {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(HttpVisitTracker {
            endpoint: endpoint.into(),
            client,
        })
    }
}

#[async_trait]
impl VisitTracker for HttpVisitTracker {
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn report_visit(&self, project: &str) -> Result<Visit, Error> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&VisitRequest {
                project_name: project,
            })
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?
            .error_for_status()
            .map_err(|e| Error::Network(e.to_string()))?;

        let visit: Visit = response
            .json()
            .await
            .map_err(|e| Error::Network(format!("malformed response: {e}")))?;
        debug!(unique_visitors = visit.unique_visitors, "visit recorded");

        Ok(visit)
    }
}

/// Loading, success and failure state of the one visit report made per
/// run.
pub struct VisitCounter {
    pub count: Cell<u64>,
    pub loading: Cell<bool>,
    pub error: Cell<Option<String>>,
    _failure_log: Listener,
}

impl VisitCounter {
    pub fn new(
        ctx: &SodiumCtx,
        started: &Stream<()>,
        outcomes: &Stream<Result<Visit, Error>>,
    ) -> VisitCounter {
        ctx.transaction(|| {
            let (visits, failures) = outcomes.split_res();

            let count = visits
                .map(|visit: &Visit| visit.unique_visitors)
                .hold(0);
            let loading = started
                .map_to(true)
                .or_else(&outcomes.map(|_: &Result<Visit, Error>| false))
                .hold(false);
            let error = started
                .map_to(None)
                .or_else(&failures.map_to(Some(VISITOR_COUNT_ERROR.to_string())))
                .hold(None);

            let failure_log = failures.listen(|err: &Error| {
                error!(%err, "failed to track visit");
            });

            VisitCounter {
                count,
                loading,
                error,
                _failure_log: failure_log,
            }
        })
    }

    pub fn display_line(&self) -> String {
        if self.loading.sample() {
            "Loading visitors...".to_string()
        } else if let Some(message) = self.error.sample() {
            message
        } else {
            format!("Visitors: {}", self.count.sample())
        }
    }
}
