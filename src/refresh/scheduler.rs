use crate::error::ScrapeError;
use crate::refresh::{RefreshOutcome, RefreshState, Refresher, Trigger};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

type Reply = oneshot::Sender<Result<RefreshOutcome, ScrapeError>>;

/// Manual-trigger side of the scheduler, shared with the HTTP layer
#[derive(Clone)]
pub struct SchedulerHandle {
    requests: mpsc::Sender<Reply>,
    state: Arc<RefreshState>,
}

impl SchedulerHandle {
    pub fn state(&self) -> &Arc<RefreshState> {
        &self.state
    }

    /// Ask for an immediate refresh and wait for its result.
    ///
    /// Reports [`RefreshOutcome::AlreadyRunning`] without queueing when a
    /// refresh is in flight or another manual request is already waiting.
    ///
    /// # Errors
    ///
    /// Returns the refresh error, or [`ScrapeError::SchedulerStopped`] if the
    /// scheduler task is gone.
    pub async fn trigger(&self) -> Result<RefreshOutcome, ScrapeError> {
        if self.state.is_running() {
            return Ok(RefreshOutcome::AlreadyRunning);
        }

        let (reply, response) = oneshot::channel();
        match self.requests.try_send(reply) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => return Ok(RefreshOutcome::AlreadyRunning),
            Err(TrySendError::Closed(_)) => return Err(ScrapeError::SchedulerStopped),
        }

        response.await.map_err(|_| ScrapeError::SchedulerStopped)?
    }
}

/// Start the refresh loop: one refresh right away when `run_at_startup`,
/// then every `period`, plus manual requests from [`SchedulerHandle`].
///
/// All refreshes execute on this one task, so they never overlap.
pub fn spawn_scheduler(
    refresher: Arc<Refresher>,
    period: Duration,
    run_at_startup: bool,
) -> (SchedulerHandle, JoinHandle<()>) {
    let (requests, mut inbox) = mpsc::channel::<Reply>(1);
    let handle = SchedulerHandle {
        requests,
        state: Arc::clone(refresher.state()),
    };

    let task = tokio::spawn(async move {
        let first_tick = if run_at_startup {
            Instant::now()
        } else {
            Instant::now() + period
        };
        let mut ticker = interval_at(first_tick, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut startup = run_at_startup;

        info!("Scheduler started, refreshing every {:?}", period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let trigger = if startup { Trigger::Startup } else { Trigger::Scheduled };
                    startup = false;
                    // Failures are logged by the refresher; the next tick retries
                    let _ = refresher.run(trigger).await;
                }
                request = inbox.recv() => {
                    let Some(reply) = request else {
                        debug!("All scheduler handles dropped");
                        break;
                    };
                    let result = refresher.run(Trigger::Manual).await;
                    if reply.send(result).is_err() {
                        debug!("Manual refresh requester went away before the result");
                    }
                }
            }
        }
    });

    (handle, task)
}
