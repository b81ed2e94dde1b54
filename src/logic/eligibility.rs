use crate::error::{PlannerError, Result};
use crate::models::{LatLng, RainVerdict, Zone, ZoneId};
use chrono::NaiveDate;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Source of per-coordinate rain verdicts
pub trait ForecastProvider: Send + Sync + 'static {
    fn rain_verdict(
        &self,
        at: LatLng,
        date: NaiveDate,
    ) -> impl Future<Output = Result<RainVerdict>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(500),
        }
    }
}

/// Ask the provider, retrying transient failures a bounded number of times.
pub async fn fetch_with_retry<P: ForecastProvider>(
    provider: &P,
    at: LatLng,
    date: NaiveDate,
    policy: &RetryPolicy,
) -> Result<RainVerdict> {
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        {
            let err = match provider.rain_verdict(at, date).await {
                Ok(verdict) => return Ok(verdict),
                Err(e) => e,
            };
            if !err.is_forecast_failure() || attempt >= attempts {
                tracing::warn!(%date, attempts = attempt, error = %err, "Forecast request failed");
                return Err(err);
            }
            tracing::warn!(
                attempt,
                max_attempts = attempts,
                %date,
                error = %err,
                "Forecast request failed, retrying"
            );
        }
        tokio::time::sleep(policy.delay * attempt).await;
        attempt += 1;
    }
}

/// Result of one zone refresh, tagged with the date it was requested for
#[derive(Debug)]
pub struct ForecastOutcome {
    pub zone_id: ZoneId,
    pub date: NaiveDate,
    pub result: Result<RainVerdict>,
}

/// Runs zone forecast lookups as independent tasks and hands back tagged results.
pub struct EligibilityRefresher<P: ForecastProvider> {
    provider: Arc<P>,
    retry: RetryPolicy,
    tasks: JoinSet<()>,
    tx: mpsc::UnboundedSender<ForecastOutcome>,
    rx: mpsc::UnboundedReceiver<ForecastOutcome>,
    pending: usize,
}

impl<P: ForecastProvider> EligibilityRefresher<P> {
    pub fn new(provider: P, retry: RetryPolicy) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            provider: Arc::new(provider),
            retry,
            tasks: JoinSet::new(),
            tx,
            rx,
            pending: 0,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Start a lookup for `zone` on `date`. Must be called inside a tokio runtime.
    pub fn request(&mut self, zone: &Zone, date: NaiveDate) {
        let provider = Arc::clone(&self.provider);
        let tx = self.tx.clone();
        let retry = self.retry;
        let zone_id = zone.id;
        let at = zone.centroid();

        tracing::debug!(zone = %zone.label, %date, "Requesting eligibility");
        self.pending += 1;
        self.tasks.spawn(async move {
            let result = fetch_with_retry(provider.as_ref(), at, date, &retry).await;
            // Receiver gone means the refresher was dropped
            let _ = tx.send(ForecastOutcome {
                zone_id,
                date,
                result,
            });
        });
    }

    pub fn request_all<'a>(&mut self, zones: impl IntoIterator<Item = &'a Zone>, date: NaiveDate) {
        for zone in zones {
            self.request(zone, date);
        }
    }

    /// Abort every in-flight lookup and drop results that are queued but not
    /// yet taken. Lookups requested afterwards start from a fresh channel.
    pub fn cancel_all(&mut self) {
        if self.pending > 0 {
            tracing::debug!(pending = self.pending, "Cancelling in-flight forecast requests");
        }
        self.tasks.abort_all();
        let (tx, rx) = mpsc::unbounded_channel();
        self.tx = tx;
        self.rx = rx;
        self.pending = 0;
    }

    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Next finished lookup without waiting
    pub fn try_next(&mut self) -> Option<ForecastOutcome> {
        while let Some(joined) = self.tasks.try_join_next() {
            self.note_panic(joined);
        }
        let outcome = self.rx.try_recv().ok()?;
        self.pending = self.pending.saturating_sub(1);
        Some(outcome)
    }

    /// Wait for the next finished lookup; `None` when nothing is in flight.
    pub async fn next(&mut self) -> Option<ForecastOutcome> {
        while self.pending > 0 {
            tokio::select! {
                Some(outcome) = self.rx.recv() => {
                    self.pending = self.pending.saturating_sub(1);
                    return Some(outcome);
                }
                Some(joined) = self.tasks.join_next() => self.note_panic(joined),
                else => break,
            }
        }
        self.try_next()
    }

    fn note_panic(&mut self, joined: std::result::Result<(), tokio::task::JoinError>) {
        if let Err(e) = joined {
            if e.is_panic() {
                tracing::error!(error = %e, "Forecast task panicked");
                self.pending = self.pending.saturating_sub(1);
            }
        }
    }
}

/// Provider used when no forecast source is configured
pub struct NoForecast;

impl ForecastProvider for NoForecast {
    fn rain_verdict(
        &self,
        _at: LatLng,
        _date: NaiveDate,
    ) -> impl Future<Output = Result<RainVerdict>> + Send {
        async {
            Err(PlannerError::ForecastUnavailable(
                "no forecast provider configured".into(),
            ))
        }
    }
}
