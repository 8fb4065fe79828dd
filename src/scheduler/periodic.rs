//! Runs registered tasks immediately and then on their interval.

use super::spec::Schedule;
use super::task::{Overlap, ScheduledTask};
use crate::error::ScheduleError;
use std::future::Future;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub struct Scheduler {
    tasks: Vec<ScheduledTask>,
    drivers: Vec<JoinHandle<()>>,
    shutdown: CancellationToken,
    started: bool,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self::with_cancellation_token(CancellationToken::new())
    }

    pub fn with_cancellation_token(shutdown: CancellationToken) -> Self {
        Self {
            tasks: Vec::new(),
            drivers: Vec::new(),
            shutdown,
            started: false,
        }
    }

    /// Registers `task` under `name` on the schedule described by `spec`.
    ///
    /// Tasks registered after [`Scheduler::start`] begin running right away.
    pub fn register<F, Fut>(
        &mut self,
        spec: &str,
        name: impl Into<String>,
        task: F,
    ) -> Result<(), ScheduleError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.register_with(spec, name, Overlap::Allow, task)
    }

    pub fn register_with<F, Fut>(
        &mut self,
        spec: &str,
        name: impl Into<String>,
        overlap: Overlap,
        task: F,
    ) -> Result<(), ScheduleError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let schedule = Schedule::parse(spec)?;
        let name: String = name.into();
        let task = ScheduledTask::new(name, schedule, task).with_overlap(overlap);
        tracing::info!(task = task.name(), schedule = %schedule, "registered scheduled task");
        self.add(task);
        Ok(())
    }

    pub fn add(&mut self, task: ScheduledTask) {
        if self.started {
            self.drivers.push(self.spawn_driver(task.clone()));
        }
        self.tasks.push(task);
    }

    /// Starts every registered task. Each runs once immediately and then on
    /// every tick of its schedule. Calling `start` twice is a no-op.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;

        let drivers: Vec<_> = self
            .tasks
            .iter()
            .map(|task| self.spawn_driver(task.clone()))
            .collect();
        self.drivers.extend(drivers);
        tracing::info!(tasks = self.tasks.len(), "scheduler started");
    }

    pub fn tasks(&self) -> &[ScheduledTask] {
        &self.tasks
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stops all tick loops. Invocations already running are left to finish on their own.
    pub async fn shutdown(&mut self) {
        self.shutdown.cancel();
        for handle in self.drivers.drain(..) {
            if let Err(err) = handle.await {
                tracing::warn!(error = %err, "scheduler driver task panicked");
            }
        }
        self.started = false;
        tracing::info!("scheduler stopped");
    }

    fn spawn_driver(&self, task: ScheduledTask) -> JoinHandle<()> {
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            let mut ticker = interval(task.schedule().interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => {
                        break;
                    }
                    _ = ticker.tick() => {
                        task.launch();
                    }
                }
            }

            tracing::debug!(task = task.name(), "scheduled task loop stopped");
        })
    }
}
