//! Wires the orchestrator's entry points to their configured cadences.
//!
//! Primary delivery (and retry delivery, when enabled) run on the morning and
//! day cron expressions; ingestion runs on a fixed interval after an initial
//! delay. Each entry point is guarded so a tick that arrives while the
//! previous run of the same entry point is still going is skipped.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::config::ScheduleConfig;
use crate::convert::Converter;
use crate::error::RelayError;
use crate::ingest::Ingestor;
use crate::orchestrator::JobOrchestrator;
use crate::relay::Deliverer;
use crate::state_machine::{RunReport, Workflow};
use crate::store::RecordStore;

/// Mutual exclusion for one entry point across all of its triggers.
#[derive(Clone)]
pub struct EntryGuard {
    name: &'static str,
    lock: Arc<Mutex<()>>,
}

impl EntryGuard {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Run `f` unless this entry point is already running. Returns whether it ran.
    pub async fn run_exclusive<F: Future<Output = ()>>(&self, f: F) -> bool {
        match self.lock.try_lock() {
            Ok(_running) => {
                f.await;
                true
            }
            Err(_) => {
                warn!(entry = self.name, "previous run still in progress, skipping tick");
                false
            }
        }
    }
}

fn log_run(result: Result<RunReport, RelayError>) {
    match result {
        Ok(report) => info!(
            workflow = %report.workflow,
            selected = report.selected,
            filtered_out = report.filtered_out,
            sent = report.sent,
            conversion_failed = report.conversion_failed,
            delivery_failed = report.delivery_failed,
            committed = report.committed(),
            duration_ms = report.duration_ms,
            "run finished"
        ),
        Err(e) => error!(error = %e, "run aborted"),
    }
}

/// Cron triggers to register: primary delivery on both cadences, and retry
/// delivery on the same cadences when enabled.
fn cron_plan(config: &ScheduleConfig) -> Vec<(Workflow, &str)> {
    let cadences = [config.morning.as_str(), config.day.as_str()];
    let mut plan: Vec<(Workflow, &str)> = cadences.iter().map(|c| (Workflow::Primary, *c)).collect();
    if config.retry_enabled {
        plan.extend(cadences.iter().map(|c| (Workflow::Retry, *c)));
    }
    plan
}

/// Handle to the running schedule. Dropping it does not stop the jobs; call
/// [`Scheduler::shutdown`].
pub struct Scheduler {
    jobs: JobScheduler,
    ingest_task: JoinHandle<()>,
}

impl Scheduler {
    pub async fn start<S, C, D, I>(
        orchestrator: Arc<JobOrchestrator<S, C, D, I>>,
        config: &ScheduleConfig,
    ) -> Result<Self, RelayError>
    where
        S: RecordStore + 'static,
        C: Converter + 'static,
        D: Deliverer + 'static,
        I: Ingestor + 'static,
    {
        if config.ingest_interval_ms == 0 {
            return Err(RelayError::Config("schedule.ingest_interval_ms must be positive".into()));
        }

        let jobs = JobScheduler::new().await?;
        let primary = EntryGuard::new("primary_delivery");
        let retry = EntryGuard::new("retry_delivery");

        for (workflow, cron) in cron_plan(config) {
            let orch = orchestrator.clone();
            let guard = match workflow {
                Workflow::Primary => primary.clone(),
                Workflow::Retry => retry.clone(),
            };
            jobs.add(Job::new_async_tz(cron, Local, move |_id, _jobs| {
                let orch = orch.clone();
                let guard = guard.clone();
                Box::pin(async move {
                    guard
                        .run_exclusive(async {
                            let result = match workflow {
                                Workflow::Primary => orch.run_primary_delivery().await,
                                Workflow::Retry => orch.run_retry_delivery().await,
                            };
                            log_run(result)
                        })
                        .await;
                })
            })?)
            .await?;
            info!(%workflow, cron, "delivery scheduled");
        }
        if !config.retry_enabled {
            info!("retry delivery not scheduled; run `reportrelay resend` to trigger it");
        }

        let ingest_task = spawn_ingestion(
            orchestrator,
            Duration::from_millis(config.ingest_initial_delay_ms),
            Duration::from_millis(config.ingest_interval_ms),
        );

        jobs.start().await?;
        Ok(Self { jobs, ingest_task })
    }

    pub async fn shutdown(mut self) -> Result<(), RelayError> {
        self.ingest_task.abort();
        self.jobs.shutdown().await?;
        Ok(())
    }
}

/// Fixed-rate ingestion. Runs sequentially, so it never overlaps itself.
fn spawn_ingestion<S, C, D, I>(
    orchestrator: Arc<JobOrchestrator<S, C, D, I>>,
    initial_delay: Duration,
    every: Duration,
) -> JoinHandle<()>
where
    S: RecordStore + 'static,
    C: Converter + 'static,
    D: Deliverer + 'static,
    I: Ingestor + 'static,
{
    info!(
        initial_delay_ms = initial_delay.as_millis() as u64,
        interval_ms = every.as_millis() as u64,
        "ingestion scheduled"
    );
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + initial_delay, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            orchestrator.run_ingestion().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::Notify;

    use crate::convert::{PdfAttachment, PdfRenderer};
    use crate::relay::DeliveryError;
    use crate::store::InMemoryStore;

    struct NullDeliverer;

    impl Deliverer for NullDeliverer {
        async fn send(&self, _attachments: &[PdfAttachment], _date_token: &str) -> Result<(), DeliveryError> {
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct CountingIngestor {
        calls: Arc<AtomicUsize>,
    }

    impl Ingestor for CountingIngestor {
        async fn ingest(&self) -> Result<usize, RelayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(0)
        }
    }

    type TestOrchestrator = JobOrchestrator<InMemoryStore, PdfRenderer, NullDeliverer, CountingIngestor>;

    fn orchestrator(ingestor: CountingIngestor) -> Arc<TestOrchestrator> {
        Arc::new(JobOrchestrator::new(
            Arc::new(InMemoryStore::new()),
            PdfRenderer::new(),
            NullDeliverer,
            ingestor,
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn ingestion_waits_initial_delay_then_repeats() {
        let ingestor = CountingIngestor::default();
        let task = spawn_ingestion(
            orchestrator(ingestor.clone()),
            Duration::from_millis(1000),
            Duration::from_millis(500),
        );

        tokio::time::sleep(Duration::from_millis(999)).await;
        assert_eq!(ingestor.calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(ingestor.calls.load(Ordering::SeqCst), 1);

        // Ticks at 1500 and 2000.
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(ingestor.calls.load(Ordering::SeqCst), 3);

        task.abort();
    }

    #[tokio::test]
    async fn zero_ingest_interval_is_rejected() {
        let config = ScheduleConfig {
            ingest_interval_ms: 0,
            ..ScheduleConfig::default()
        };
        let err = Scheduler::start(orchestrator(CountingIngestor::default()), &config)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RelayError::Config(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn invalid_cron_is_rejected() {
        let ingestor = CountingIngestor::default();
        let config = ScheduleConfig {
            morning: "every morning please".into(),
            ..ScheduleConfig::default()
        };
        let err = Scheduler::start(orchestrator(ingestor.clone()), &config)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RelayError::Scheduler(_)));
        assert_eq!(ingestor.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn retry_is_planned_only_when_enabled() {
        let mut config = ScheduleConfig::default();
        let plan = cron_plan(&config);
        assert_eq!(
            plan,
            vec![
                (Workflow::Primary, "0 0 7 * * *"),
                (Workflow::Primary, "0 0 13 * * *"),
            ]
        );

        config.retry_enabled = true;
        let plan = cron_plan(&config);
        assert_eq!(plan.len(), 4);
        assert_eq!(plan.iter().filter(|(w, _)| *w == Workflow::Retry).count(), 2);
        assert!(plan.contains(&(Workflow::Retry, "0 0 7 * * *")));
        assert!(plan.contains(&(Workflow::Retry, "0 0 13 * * *")));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn scheduler_starts_and_shuts_down() {
        let config = ScheduleConfig {
            retry_enabled: true,
            ..ScheduleConfig::default()
        };
        let scheduler = Scheduler::start(orchestrator(CountingIngestor::default()), &config)
            .await
            .unwrap();
        scheduler.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn guard_skips_overlapping_run() {
        let guard = EntryGuard::new("test");
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let first = {
            let (guard, started, release, runs) =
                (guard.clone(), started.clone(), release.clone(), runs.clone());
            tokio::spawn(async move {
                guard
                    .run_exclusive(async {
                        runs.fetch_add(1, Ordering::SeqCst);
                        started.notify_one();
                        release.notified().await;
                    })
                    .await
            })
        };

        started.notified().await;
        let overlapped = guard.run_exclusive(async { runs.fetch_add(1, Ordering::SeqCst); }).await;
        assert!(!overlapped);

        release.notify_one();
        assert!(first.await.unwrap());
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        // Free again once the first run is done.
        assert!(guard.run_exclusive(async {}).await);
    }

    #[tokio::test]
    async fn separate_entry_points_do_not_block_each_other() {
        let primary = EntryGuard::new("primary");
        let retry = EntryGuard::new("retry");

        let ran = primary
            .run_exclusive(async { assert!(retry.run_exclusive(async {}).await) })
            .await;
        assert!(ran);
    }
}
