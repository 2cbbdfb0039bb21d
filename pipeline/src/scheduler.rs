//! Interval scheduler.
//!
//! Each registered job gets its own task and ticks on its own interval.
//! A run is awaited before the next tick is honored, so a job never
//! overlaps itself; distinct jobs run concurrently. The first tick fires
//! immediately after spawn.

use crate::job::Job;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Collects jobs and their intervals before spawning.
#[derive(Default)]
pub struct Scheduler {
    entries: Vec<(Arc<dyn Job>, Duration)>,
}

impl Scheduler {
    /// An empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a job to run every `every`.
    pub fn register(&mut self, job: Arc<dyn Job>, every: Duration) {
        self.entries.push((job, every));
    }

    /// Spawns one task per job and returns the handle that stops them.
    #[must_use]
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown, rx) = watch::channel(false);
        let tasks = self
            .entries
            .into_iter()
            .map(|(job, every)| {
                let mut rx = rx.clone();
                tokio::spawn(async move {
                    let mut ticker = tokio::time::interval(every);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    loop {
                        tokio::select! {
                            _ = ticker.tick() => {
                                metrics::counter!("bookings_job_runs_total", "job" => job.name())
                                    .increment(1);
                                match job.run().await {
                                    Ok(summary) => tracing::info!(
                                        job = job.name(),
                                        %summary,
                                        "job pass finished"
                                    ),
                                    Err(e) => {
                                        metrics::counter!(
                                            "bookings_job_errors_total",
                                            "job" => job.name()
                                        )
                                        .increment(1);
                                        tracing::error!(
                                            job = job.name(),
                                            error = %e,
                                            "job pass failed"
                                        );
                                    }
                                }
                            }
                            changed = rx.changed() => {
                                if changed.is_err() || *rx.borrow() {
                                    break;
                                }
                            }
                        }
                    }
                })
            })
            .collect();

        SchedulerHandle { shutdown, tasks }
    }
}

/// Handle over the spawned job tasks.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Signals every job task to stop and waits for in-flight runs to
    /// finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
    }
}
