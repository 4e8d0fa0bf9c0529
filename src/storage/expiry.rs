//! Scheduled Expiry Sweeper
//!
//! Expired records are already invisible to readers (the store checks
//! `expires` on every `get`), but a record that is never read again would
//! stay on disk forever. The sweeper reclaims those rows.
//!
//! ## Design
//!
//! The sweeper runs as a job on a `tokio-cron-scheduler` [`JobScheduler`]:
//! 1. Fires on a cron trigger (default `0 0 4 * * *`, daily at 04:00 UTC)
//! 2. Opens a dedicated connection through its own [`SweepConnector`]
//! 3. Deletes every expired record across all namespaces in one statement
//! 4. Logs the count and releases the connection, success or not
//!
//! The connection is never the one serving requests, so a long sweep does
//! not hold up request traffic. A failed run is not retried; the next
//! trigger is the retry.

use crate::error::Result;
use crate::storage::adapter::SqlParam;
use crate::storage::clock::{Clock, SystemClock};
use crate::storage::sqlite::DELETE_EXPIRED_SQL;
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tracing::{debug, error, info};

/// A connection owned by a single sweep run.
#[async_trait]
pub trait SweepConnection: Send {
    /// Executes a statement and returns the number of affected rows.
    async fn execute(&mut self, sql: &str, params: &[SqlParam]) -> Result<u64>;

    /// Releases the connection.
    async fn close(&mut self) -> Result<()>;
}

/// Factory for per-run sweep connections.
#[async_trait]
pub trait SweepConnector: Send + Sync + 'static {
    async fn connect(&self) -> Result<Box<dyn SweepConnection>>;
}

/// Deletes expired records through a dedicated connection.
#[derive(Clone)]
pub struct TtlSweeper {
    connector: Arc<dyn SweepConnector>,
    clock: Arc<dyn Clock>,
}

impl TtlSweeper {
    pub fn new(connector: Arc<dyn SweepConnector>) -> Self {
        Self::with_clock(connector, Arc::new(SystemClock))
    }

    pub fn with_clock(connector: Arc<dyn SweepConnector>, clock: Arc<dyn Clock>) -> Self {
        Self { connector, clock }
    }

    /// Deletes every record whose expiry has passed, in every namespace.
    ///
    /// Returns the number of rows removed. Failures are logged and reported
    /// as `0`; nothing is propagated to the caller.
    pub async fn delete_expired_items(&self) -> u64 {
        let mut conn = match self.connector.connect().await {
            Ok(conn) => conn,
            Err(e) => {
                error!(error = %e, "Could not open sweep connection");
                return 0;
            }
        };

        let now_secs = self.clock.now_millis().div_euclid(1000);
        let deleted = match conn
            .execute(DELETE_EXPIRED_SQL, &[SqlParam::Integer(now_secs)])
            .await
        {
            Ok(rows) => {
                info!(rows, "Deleted expired items");
                rows
            }
            Err(e) => {
                error!(error = %e, "Error executing expiry sweep");
                0
            }
        };

        // Always release the connection afterwards
        if let Err(e) = conn.close().await {
            error!(error = %e, "Error closing sweep connection");
        }

        deleted
    }
}

/// When the sweeper fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepSchedule {
    /// Once a day at `hour:minute` UTC.
    Daily { hour: u32, minute: u32 },
    /// At a fixed interval from the previous run.
    Every(Duration),
}

impl Default for SweepSchedule {
    fn default() -> Self {
        SweepSchedule::Daily { hour: 4, minute: 0 }
    }
}

impl SweepSchedule {
    /// Cron expression (`sec min hour day month weekday`) for a daily
    /// schedule. Interval schedules have none.
    pub fn cron_expression(&self) -> Option<String> {
        match *self {
            SweepSchedule::Daily { hour, minute } => Some(daily_cron(hour, minute)),
            SweepSchedule::Every(_) => None,
        }
    }

    /// Builds the scheduler job that sweeps on this schedule.
    fn job(&self, sweeper: TtlSweeper) -> std::result::Result<Job, JobSchedulerError> {
        match *self {
            SweepSchedule::Daily { hour, minute } => Job::new_async(
                daily_cron(hour, minute).as_str(),
                move |_id, _scheduler| scheduled_sweep(&sweeper),
            ),
            SweepSchedule::Every(interval) => {
                Job::new_repeated_async(interval, move |_id, _scheduler| scheduled_sweep(&sweeper))
            }
        }
    }
}

fn daily_cron(hour: u32, minute: u32) -> String {
    format!("0 {minute} {hour} * * *")
}

fn scheduled_sweep(sweeper: &TtlSweeper) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    let sweeper = sweeper.clone();
    Box::pin(async move {
        info!("Starting expiry sweep");
        let deleted = sweeper.delete_expired_items().await;
        info!(deleted, "Finished expiry sweep");
    })
}

/// A handle to the running expiry sweeper.
///
/// When this handle is dropped, the sweeper task will be stopped.
#[derive(Debug)]
pub struct ExpirySweeper {
    /// Sender to signal shutdown
    shutdown_tx: watch::Sender<bool>,
}

impl ExpirySweeper {
    /// Starts the expiry sweeper as a background task.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use stashkv::storage::{ExpirySweeper, SqliteConnector, SqliteTarget, SweepSchedule, TtlSweeper};
    /// use std::sync::Arc;
    ///
    /// let target = SqliteTarget::parse("sqlite://data/stash.db")?;
    /// let sweeper = ExpirySweeper::start(
    ///     TtlSweeper::new(Arc::new(SqliteConnector::new(target))),
    ///     SweepSchedule::default(),
    /// );
    ///
    /// // Dropping the handle stops the task
    /// drop(sweeper);
    /// ```
    pub fn start(sweeper: TtlSweeper, schedule: SweepSchedule) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(sweeper_task(sweeper, schedule, shutdown_rx));

        info!(?schedule, cron = ?schedule.cron_expression(), "Expiry sweeper scheduled");

        Self { shutdown_tx }
    }

    /// Stops the expiry sweeper.
    ///
    /// A run already in progress finishes; no further runs start.
    pub fn stop(&self) {
        if self.shutdown_tx.send(true).is_ok() {
            info!("Expiry sweeper stopped");
        }
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn start_scheduler(
    sweeper: TtlSweeper,
    schedule: SweepSchedule,
) -> std::result::Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;
    scheduler.add(schedule.job(sweeper)?).await?;
    scheduler.start().await?;
    Ok(scheduler)
}

/// Owns the job scheduler until the handle signals shutdown.
async fn sweeper_task(
    sweeper: TtlSweeper,
    schedule: SweepSchedule,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut scheduler = match start_scheduler(sweeper, schedule).await {
        Ok(scheduler) => scheduler,
        Err(e) => {
            error!(error = %e, ?schedule, "Could not start expiry sweeper");
            return;
        }
    };

    // A dropped sender counts as shutdown too
    while shutdown_rx.changed().await.is_ok() {
        if *shutdown_rx.borrow() {
            break;
        }
    }
    debug!("Expiry sweeper received shutdown signal");

    if let Err(e) = scheduler.shutdown().await {
        error!(error = %e, "Error shutting down expiry sweeper");
    }
}
