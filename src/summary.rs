//! Daily rider summary: REST client and poll cadence.
//!
//! Polling is independent of stream connectivity, and every request is
//! stamped with an increasing sequence number so the dispatcher can
//! discard completions that resolve out of order.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::dashboard::CoreEvent;
use crate::models::RiderSummary;

/// Client for the aggregate summary endpoint.
#[derive(Clone)]
pub struct SummaryClient {
    client: Client,
    base_url: String,
}

impl SummaryClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build summary HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn fetch_daily_summary(&self) -> Result<Vec<RiderSummary>> {
        let url = format!("{}/metrics/daily-summary", self.base_url);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("GET /metrics/daily-summary failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "GET /metrics/daily-summary {}: {}",
                status,
                text
            ));
        }

        resp.json::<Vec<RiderSummary>>()
            .await
            .context("Failed to parse daily summary response")
    }
}

/// Drive the poll cadence: one immediate fetch, then a fixed interval.
///
/// Fetches run detached so a slow poll never delays the next tick; the
/// sequence number lets the dispatcher drop whichever completion is stale.
/// Aborting this task stops the cadence; a fetch already in flight still
/// completes, but its result lands in a closed channel and is dropped.
pub(crate) async fn run_poller(
    client: SummaryClient,
    poll_interval: Duration,
    tx: mpsc::Sender<CoreEvent>,
) {
    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut seq: u64 = 0;

    loop {
        // First tick fires immediately.
        ticker.tick().await;
        seq += 1;

        let client = client.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let riders = match client.fetch_daily_summary().await {
                Ok(riders) => {
                    debug!(seq, riders = riders.len(), "daily summary refreshed");
                    Some(riders)
                }
                Err(e) => {
                    warn!(seq, error = %e, "daily summary fetch failed; emptying view");
                    None
                }
            };
            let _ = tx.send(CoreEvent::PollCompleted { seq, riders }).await;
        });
    }
}
