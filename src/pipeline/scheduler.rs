//! Periodic ingestion scheduler
//!
//! Two states: idle and running. While running, a timer task fires the job
//! once per period (first firing one period after start). Every firing is
//! spawned as its own task, so `stop()` cancels the pending timer without
//! waiting for a run in progress; such a run finishes on its own and its
//! result only reaches the log.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

/// Work fired on every tick
#[async_trait]
pub trait IngestionJob: Send + Sync {
    async fn run_once(&self);
}

enum SchedulerState {
    Idle,
    Running {
        shutdown: oneshot::Sender<()>,
        timer: JoinHandle<()>,
    },
}

pub struct IngestionScheduler {
    job: Arc<dyn IngestionJob>,
    period: Duration,
    state: SchedulerState,
}

impl IngestionScheduler {
    pub fn new(job: Arc<dyn IngestionJob>, period: Duration) -> Self {
        Self {
            job,
            period,
            state: SchedulerState::Idle,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, SchedulerState::Running { .. })
    }

    /// idle -> running. No-op when already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) {
        if self.is_running() {
            log::debug!("Scheduler already running");
            return;
        }

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let timer = tokio::spawn(timer_task(self.job.clone(), self.period, shutdown_rx));

        self.state = SchedulerState::Running {
            shutdown: shutdown_tx,
            timer,
        };
        log::info!("⏰ Scheduler started (interval: {}s)", self.period.as_secs());
    }

    /// running -> idle. No-op when idle.
    pub fn stop(&mut self) {
        match std::mem::replace(&mut self.state, SchedulerState::Idle) {
            SchedulerState::Running { shutdown, timer } => {
                // Receiver is gone only if the timer task already ended
                let _ = shutdown.send(());
                timer.abort();
                log::info!("🛑 Scheduler stopped");
            }
            SchedulerState::Idle => {}
        }
    }
}

impl Drop for IngestionScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn timer_task(job: Arc<dyn IngestionJob>, period: Duration, mut shutdown: oneshot::Receiver<()>) {
    let mut timer = interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                log::debug!("Scheduler timer cancelled");
                break;
            }
            _ = timer.tick() => {
                let job = job.clone();
                tokio::spawn(async move {
                    job.run_once().await;
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingJob {
        started: AtomicUsize,
        finished: AtomicUsize,
        run_time: Duration,
    }

    #[async_trait]
    impl IngestionJob for CountingJob {
        async fn run_once(&self) {
            self.started.fetch_add(1, Ordering::SeqCst);
            if !self.run_time.is_zero() {
                tokio::time::sleep(self.run_time).await;
            }
            self.finished.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_at_interval() {
        let job = Arc::new(CountingJob::default());
        let mut scheduler = IngestionScheduler::new(job.clone(), Duration::from_secs(300));

        scheduler.start();
        assert!(scheduler.is_running());

        // Nothing fires before the first period has elapsed
        tokio::time::sleep(Duration::from_secs(299)).await;
        assert_eq!(job.started.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(job.started.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(job.started.load(Ordering::SeqCst), 3);

        scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_firings_after_stop() {
        let job = Arc::new(CountingJob::default());
        let mut scheduler = IngestionScheduler::new(job.clone(), Duration::from_secs(60));

        scheduler.start();
        tokio::time::sleep(Duration::from_secs(121)).await;
        assert_eq!(job.started.load(Ordering::SeqCst), 2);

        scheduler.stop();
        assert!(!scheduler.is_running());

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(job.started.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_does_not_wait_for_in_flight_run() {
        let job = Arc::new(CountingJob {
            run_time: Duration::from_secs(30),
            ..CountingJob::default()
        });
        let mut scheduler = IngestionScheduler::new(job.clone(), Duration::from_secs(10));

        scheduler.start();
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(job.started.load(Ordering::SeqCst), 1);
        assert_eq!(job.finished.load(Ordering::SeqCst), 0);

        scheduler.stop();

        // The in-flight run completes on its own; nothing new starts
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(job.started.load(Ordering::SeqCst), 1);
        assert_eq!(job.finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_and_idempotent_transitions() {
        let job = Arc::new(CountingJob::default());
        let mut scheduler = IngestionScheduler::new(job.clone(), Duration::from_secs(5));

        scheduler.stop(); // idle: no-op
        scheduler.start();
        scheduler.start(); // running: no-op, still a single timer
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(job.started.load(Ordering::SeqCst), 1);

        scheduler.stop();
        scheduler.start();
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(job.started.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_timer() {
        let job = Arc::new(CountingJob::default());
        {
            let mut scheduler = IngestionScheduler::new(job.clone(), Duration::from_secs(5));
            scheduler.start();
        }

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(job.started.load(Ordering::SeqCst), 0);
    }
}
