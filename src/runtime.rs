//! Fixed-interval job scheduler.
//!
//! One control thread waits on a control channel with a poll timeout; every
//! timeout is a tick that collects due jobs and runs each on its own
//! short-lived worker thread. A job that comes due while the process was
//! stalled fires once, not once per missed interval.

use crate::common::time::{Clock, SystemClock};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub type JobId = Uuid;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

type JobFn = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler is already running")]
    AlreadyRunning,
    #[error("scheduler is not running")]
    NotRunning,
    #[error("job interval {interval:?} must be longer than the poll interval {poll:?}")]
    IntervalTooShort { interval: Duration, poll: Duration },
    #[error("failed to spawn scheduler thread: {0}")]
    Spawn(#[from] std::io::Error),
}

#[derive(Clone, Debug)]
pub enum ControlMessage {
    Stop,
}

struct ScheduledJob {
    id: JobId,
    name: String,
    interval: Duration,
    next_run: Instant,
    job: JobFn,
    in_flight: Arc<AtomicUsize>,
}

/// A job picked for the current tick.
pub struct DueJob {
    pub id: JobId,
    pub name: String,
    job: JobFn,
    in_flight: Arc<AtomicUsize>,
}

#[derive(Default)]
pub struct JobTable {
    jobs: Vec<ScheduledJob>,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first run is due one interval after `now`.
    pub fn register(
        &mut self,
        name: &str,
        interval: Duration,
        job: impl Fn() + Send + Sync + 'static,
        now: Instant,
    ) -> JobId {
        let id = Uuid::new_v4();
        self.jobs.push(ScheduledJob {
            id,
            name: name.to_string(),
            interval,
            next_run: now + interval,
            job: Arc::new(job),
            in_flight: Arc::new(AtomicUsize::new(0)),
        });
        id
    }

    /// Returns every job due at `now` and reschedules it one interval from
    /// `now`, so missed intervals collapse into this single run.
    pub fn take_due(&mut self, now: Instant) -> Vec<DueJob> {
        let mut due = Vec::new();
        for job in self.jobs.iter_mut().filter(|job| job.next_run <= now) {
            job.next_run = now + job.interval;
            due.push(DueJob {
                id: job.id,
                name: job.name.clone(),
                job: Arc::clone(&job.job),
                in_flight: Arc::clone(&job.in_flight),
            });
        }
        due
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

struct ControlHandle {
    sender: Sender<ControlMessage>,
    join: Option<JoinHandle<()>>,
}

pub struct Scheduler {
    table: Arc<Mutex<JobTable>>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    control: Option<ControlHandle>,
}

impl Scheduler {
    pub fn new(poll_interval: Duration) -> Self {
        Self::with_clock(poll_interval, Arc::new(SystemClock))
    }

    pub fn with_clock(poll_interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            table: Arc::new(Mutex::new(JobTable::new())),
            clock,
            poll_interval,
            control: None,
        }
    }

    /// Registers `job` to run every `interval`. Jobs may be added while running.
    pub fn every(
        &self,
        name: &str,
        interval: Duration,
        job: impl Fn() + Send + Sync + 'static,
    ) -> Result<JobId, SchedulerError> {
        if interval <= self.poll_interval {
            return Err(SchedulerError::IntervalTooShort {
                interval,
                poll: self.poll_interval,
            });
        }
        let id = lock_table(&self.table).register(name, interval, job, self.clock.now());
        debug!(job = name, interval_secs = interval.as_secs_f64(), "job registered");
        Ok(id)
    }

    pub fn job_count(&self) -> usize {
        lock_table(&self.table).len()
    }

    pub fn is_running(&self) -> bool {
        self.control.is_some()
    }

    pub fn start(&mut self) -> Result<(), SchedulerError> {
        if self.control.is_some() {
            return Err(SchedulerError::AlreadyRunning);
        }

        let (sender, receiver) = crossbeam_channel::unbounded();
        let table = Arc::clone(&self.table);
        let clock = Arc::clone(&self.clock);
        let poll_interval = self.poll_interval;
        let join = thread::Builder::new()
            .name("scheduler".to_string())
            .spawn(move || control_loop(table, clock, poll_interval, receiver))?;

        info!(jobs = self.job_count(), "scheduler started");
        self.control = Some(ControlHandle {
            sender,
            join: Some(join),
        });
        Ok(())
    }

    /// Ends the tick loop. Workers already dispatched keep running.
    pub fn stop(&mut self) -> Result<(), SchedulerError> {
        let Some(mut control) = self.control.take() else {
            return Err(SchedulerError::NotRunning);
        };
        let _ = control.sender.send(ControlMessage::Stop);
        if let Some(join) = control.join.take()
            && join.join().is_err()
        {
            error!("scheduler control thread panicked");
        }
        info!("scheduler stopped");
        Ok(())
    }

    /// Runs one tick against the scheduler's clock. Returns the number of
    /// jobs dispatched.
    #[cfg(test)]
    pub fn run_pending(&self) -> usize {
        dispatch_due(&self.table, self.clock.now())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if self.control.is_some() {
            let _ = self.stop();
        }
    }
}

fn lock_table(table: &Mutex<JobTable>) -> MutexGuard<'_, JobTable> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

fn control_loop(
    table: Arc<Mutex<JobTable>>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    control_rx: Receiver<ControlMessage>,
) {
    loop {
        match control_rx.recv_timeout(poll_interval) {
            Ok(ControlMessage::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                dispatch_due(&table, clock.now());
            }
        }
    }
}

fn dispatch_due(table: &Mutex<JobTable>, now: Instant) -> usize {
    let due = lock_table(table).take_due(now);
    let count = due.len();
    for job in due {
        spawn_worker(job);
    }
    count
}

fn spawn_worker(due: DueJob) {
    let previous = due.in_flight.fetch_add(1, Ordering::SeqCst);
    if previous > 0 {
        warn!(
            job = %due.name,
            in_flight = previous,
            "previous run still in progress, dispatching anyway"
        );
    }

    let name = due.name.clone();
    let in_flight = Arc::clone(&due.in_flight);
    let spawned = thread::Builder::new()
        .name(format!("job-{name}"))
        .spawn(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| (due.job)()));
            due.in_flight.fetch_sub(1, Ordering::SeqCst);
            if let Err(payload) = outcome {
                error!(
                    job = %due.name,
                    id = %due.id,
                    panic = panic_message(payload.as_ref()),
                    "scheduled job panicked"
                );
            }
        });

    if let Err(err) = spawned {
        in_flight.fetch_sub(1, Ordering::SeqCst);
        error!(job = %name, error = %err, "failed to spawn job worker");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
