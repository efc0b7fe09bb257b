//! Export of the Strava account into the local mirror
//!
//! Two passes, each idempotent:
//! - **summaries**: page through `GET /athlete/activities` (100 per page)
//!   and store every payload whose checksum changed
//! - **details**: for the activities already in the mirror, fetch
//!   `GET /activities/{id}` and store the payload the same way
//!
//! Quota hits are handed to a [`RateLimitHandler`], which either waits for
//! the quarter-hour reset or gives up.

use std::fmt;
use std::future::Future;
use std::io::{self, BufRead, Write};
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::client::rate_limit::RateLimitExceeded;
use crate::client::strava::{ListActivitiesQuery, StravaClient};
use crate::error::{Result, SportError};
use crate::storage::{MirrorDb, UpsertOutcome};

/// Page size used when listing summaries
pub const SUMMARY_PAGE_SIZE: u32 = 100;

/// How often a waiting export reports the time left
const WAIT_STEP: Duration = Duration::from_secs(30);

/// Which activities an export pass looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Fetch everything, rewrite rows whose checksum changed
    OverwriteIfChanged,
    /// Only fetch details for activities that have none stored yet
    OnlyMissing,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OverwriteIfChanged => "OVERWRITE_IF_CHANGED",
            Self::OnlyMissing => "ONLY_MISSING",
        }
    }
}

impl FromStr for Strategy {
    type Err = SportError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "OVERWRITE_IF_CHANGED" => Ok(Self::OverwriteIfChanged),
            "ONLY_MISSING" => Ok(Self::OnlyMissing),
            other => Err(SportError::InvalidStrategy(other.to_string())),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decides what happens when Strava answers 429
pub trait RateLimitHandler {
    /// Resolve once the request may be retried, or fail to abort the export
    fn on_rate_limited(&mut self, limit: &RateLimitExceeded) -> impl Future<Output = Result<()>>;
}

/// Give up on the first quota hit
#[derive(Debug, Default, Clone, Copy)]
pub struct FailFast;

impl RateLimitHandler for FailFast {
    async fn on_rate_limited(&mut self, limit: &RateLimitExceeded) -> Result<()> {
        Err(SportError::RateLimited(*limit))
    }
}

/// Ask on the terminal whether to wait, then sleep until the reset
#[derive(Debug, Clone, Copy)]
pub struct InteractiveWait {
    assume_yes: bool,
}

impl InteractiveWait {
    /// With `assume_yes`, wait without asking
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }

    fn confirm(&self, limit: &RateLimitExceeded) -> Result<bool> {
        if self.assume_yes {
            return Ok(true);
        }
        eprintln!("{}", limit);
        eprint!("Do you want me to wait until {}? [y/n] ", limit.reset_at().to_rfc3339());
        io::stderr().flush()?;

        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        Ok(is_yes(&answer))
    }
}

impl RateLimitHandler for InteractiveWait {
    async fn on_rate_limited(&mut self, limit: &RateLimitExceeded) -> Result<()> {
        if !self.confirm(limit)? {
            eprintln!("Ok, then you can retry at {}", limit.reset_at().to_rfc3339());
            return Err(SportError::RateLimited(*limit));
        }

        loop {
            let left = limit.wait_duration(Utc::now());
            if left.is_zero() {
                return Ok(());
            }
            let minutes = left.as_secs() / 60 + 1;
            println!(
                "Sleeping until {}, {} mins to go...",
                limit.reset_at().to_rfc3339(),
                minutes
            );
            tokio::time::sleep(left.min(WAIT_STEP)).await;
        }
    }
}

/// Accepted answers to the wait prompt: yes, y, true, t (any case)
pub fn is_yes(answer: &str) -> bool {
    matches!(
        answer.trim().to_lowercase().as_str(),
        "yes" | "y" | "true" | "t"
    )
}

/// Run `op`, handing every quota hit to `handler` and retrying after it
pub async fn retry_on_rate_limit<H, T, F, Fut>(handler: &mut H, mut op: F) -> Result<T>
where
    H: RateLimitHandler,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    loop {
        match op().await {
            Err(SportError::RateLimited(limit)) => {
                info!(reset_at = %limit.reset_at(), "Strava rate limit hit");
                handler.on_rate_limited(&limit).await?;
            }
            other => return other,
        }
    }
}

/// Counters for one export pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExportStats {
    pub created: u32,
    pub updated: u32,
    pub unchanged: u32,
}

impl ExportStats {
    fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Created => self.created += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Unchanged => self.unchanged += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.created + self.updated + self.unchanged
    }
}

impl fmt::Display for ExportStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Created: {}, Updated: {}, Unchanged: {}",
            self.created, self.updated, self.unchanged
        )
    }
}

/// Copies Strava activities into a [`MirrorDb`]
pub struct Exporter<'a, H> {
    client: &'a StravaClient,
    db: &'a MirrorDb,
    handler: H,
    strategy: Strategy,
    after: Option<DateTime<Utc>>,
    before: Option<DateTime<Utc>>,
}

impl<'a, H: RateLimitHandler> Exporter<'a, H> {
    pub fn new(client: &'a StravaClient, db: &'a MirrorDb, strategy: Strategy, handler: H) -> Self {
        Self {
            client,
            db,
            handler,
            strategy,
            after: None,
            before: None,
        }
    }

    /// Only consider activities started at or after `after`
    pub fn after(mut self, after: Option<DateTime<Utc>>) -> Self {
        self.after = after;
        self
    }

    /// Only consider activities started at or before `before`
    pub fn before(mut self, before: Option<DateTime<Utc>>) -> Self {
        self.before = before;
        self
    }

    /// Store every listed activity summary and refresh its `activity` row
    pub async fn export_summaries(&mut self) -> Result<ExportStats> {
        if self.strategy == Strategy::OnlyMissing {
            return Err(SportError::InvalidStrategy(format!(
                "{} is not supported for summaries",
                self.strategy
            )));
        }

        let mut stats = ExportStats::default();
        let mut page = 1;
        loop {
            let query = ListActivitiesQuery {
                after: self.after,
                before: self.before,
                per_page: Some(SUMMARY_PAGE_SIZE),
                page,
            };
            let client = self.client;
            let batch =
                match retry_on_rate_limit(&mut self.handler, || client.list_activities_raw(&query))
                    .await
                {
                    Ok(batch) => batch,
                    Err(SportError::RequestedPageDoesNotExist(_)) => break,
                    Err(e) => return Err(e),
                };
            if batch.is_empty() {
                break;
            }

            for data in &batch {
                let outcome = self.db.store_summary(data)?;
                log_outcome("summary", data, outcome);
                stats.record(outcome);
            }
            page += 1;
        }

        info!(%stats, "Summaries exported");
        Ok(stats)
    }

    /// Fetch and store the details of the mirrored activities in range
    pub async fn export_details(&mut self) -> Result<ExportStats> {
        let ids = self.db.activity_ids_in_range(
            self.after,
            self.before,
            self.strategy == Strategy::OnlyMissing,
        )?;
        info!(count = ids.len(), strategy = %self.strategy, "Exporting activity details");

        let mut stats = ExportStats::default();
        for strava_id in ids {
            let client = self.client;
            let details =
                retry_on_rate_limit(&mut self.handler, || client.get_activity_details(strava_id))
                    .await?;
            let outcome = self.db.store_details(details.raw())?;
            log_outcome("details", details.raw(), outcome);
            stats.record(outcome);
        }

        info!(%stats, "Details exported");
        Ok(stats)
    }
}

fn log_outcome(kind: &str, data: &serde_json::Value, outcome: UpsertOutcome) {
    let strava_id = data.get("id").and_then(|v| v.as_u64()).unwrap_or_default();
    let start_date = data.get("start_date").and_then(|v| v.as_str()).unwrap_or("");
    match outcome {
        UpsertOutcome::Unchanged => debug!(kind, strava_id, "Unchanged"),
        _ => info!(kind, strava_id, start_date, ?outcome, "Stored activity"),
    }
}
