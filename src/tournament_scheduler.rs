//! Runs every job of a tournament on a bounded pool of worker threads.
//!
//! # Cancellation
//!
//! When a job exceeds its budget, the scheduler records a synthetic [`FailureKind::Timeout`]
//! outcome, frees the slot and cancels the job's [`CancelToken`]. The worker stops before its next
//! request to the game server; a call already in flight is bounded by the request timeout, agent
//! code is not. Whatever the worker sends afterwards is dropped: the outcome table is write-once.
//!
//! Outcomes are keyed by the position of the job in the list given to [`JobScheduler::run`], so
//! job ids need not be contiguous or even unique.

use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Instant;

use tracing::{debug, error, info, instrument, trace, warn};

use crate::configuration::Configuration;
use crate::game_interface::GameService;
use crate::match_runner::{run_match, CancelToken};
use crate::move_client::MoveClient;
use crate::outcome::{FailureKind, JobOutcome};
use crate::tournament_strategy::PairingJob;

/// One slot per job, each filled at most once.
#[derive(Debug)]
pub struct OutcomeTable {
    slots: Vec<OnceLock<JobOutcome>>,
}

impl OutcomeTable {
    pub fn new(num_jobs: usize) -> Self {
        Self {
            slots: (0..num_jobs).map(|_| OnceLock::new()).collect(),
        }
    }

    /// Store `outcome` in `slot`. Returns `false` (and drops it) if the slot is taken or unknown.
    pub fn record(&self, slot: usize, outcome: JobOutcome) -> bool {
        let Some(cell) = self.slots.get(slot) else {
            error!("outcome for unknown slot {slot}: {outcome}");
            return false;
        };
        match cell.set(outcome) {
            Ok(()) => true,
            Err(dropped) => {
                warn!("slot {slot} already recorded, dropping {dropped}");
                false
            }
        }
    }

    pub fn get(&self, slot: usize) -> Option<&JobOutcome> {
        self.slots.get(slot)?.get()
    }

    pub fn is_recorded(&self, slot: usize) -> bool {
        self.get(slot).is_some()
    }

    pub fn recorded(&self) -> usize {
        self.slots.iter().filter(|cell| cell.get().is_some()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.recorded() == self.slots.len()
    }

    /// All outcomes in slot order.
    ///
    /// # Panics
    /// If a slot has no outcome yet.
    pub fn into_outcomes(self) -> Vec<JobOutcome> {
        self.slots
            .into_iter()
            .enumerate()
            .map(|(slot, cell)| {
                cell.into_inner()
                    .unwrap_or_else(|| panic!("slot {slot} has no outcome"))
            })
            .collect()
    }
}

struct Running {
    job: PairingJob,
    deadline: Instant,
    cancel: CancelToken,
}

/// Executes jobs with bounded concurrency, a per-job deadline and crash isolation.
pub struct JobScheduler<S: GameService + ?Sized + 'static> {
    client: MoveClient<S>,
    config: Arc<Configuration>,
    on_outcome: Option<Box<dyn Fn(&JobOutcome)>>,
}

impl<S: GameService + ?Sized + 'static> JobScheduler<S> {
    pub fn new(service: Arc<S>, config: Configuration) -> Self {
        Self {
            client: MoveClient::new(service),
            config: Arc::new(config),
            on_outcome: None,
        }
    }

    /// Called on the scheduler thread each time an outcome is recorded.
    pub fn with_outcome_callback(mut self, callback: impl Fn(&JobOutcome) + 'static) -> Self {
        self.on_outcome = Some(Box::new(callback));
        self
    }

    /// Run every job and return exactly one outcome per job, in the order of `jobs`.
    ///
    /// Returns once every job has an outcome, real or synthetic; a stuck or crashed job never
    /// blocks the others.
    #[instrument(skip_all, fields(jobs = jobs.len()))]
    pub fn run(&self, jobs: Vec<PairingJob>) -> Vec<JobOutcome> {
        let table = OutcomeTable::new(jobs.len());
        let max_workers = self.config.max_workers.max(1);
        let (tx_result, rx_result) = mpsc::channel();

        let mut pending: VecDeque<(usize, PairingJob)> = jobs.into_iter().enumerate().collect();
        let mut running: HashMap<usize, Running> = HashMap::new();

        info!(
            "running {} jobs on at most {max_workers} workers",
            pending.len()
        );

        loop {
            // 1. fill free worker slots
            while running.len() < max_workers {
                let Some((slot, job)) = pending.pop_front() else {
                    break;
                };
                let cancel = CancelToken::new();
                match self.launch_job(slot, job.clone(), cancel.clone(), tx_result.clone()) {
                    Ok(()) => {
                        let deadline = Instant::now() + self.config.job_timeout;
                        running.insert(
                            slot,
                            Running {
                                job,
                                deadline,
                                cancel,
                            },
                        );
                    }
                    Err(e) => {
                        error!("could not start worker for {job}: {e}");
                        let outcome = JobOutcome::failed(
                            &job,
                            FailureKind::WorkerCrash,
                            None,
                            format!("worker could not start: {e}"),
                        );
                        self.store(&table, slot, outcome);
                    }
                }
            }

            if running.is_empty() {
                // nothing running and nothing left to start
                break;
            }

            // 2. wait for a result or the nearest deadline
            let next_deadline = running
                .values()
                .map(|r| r.deadline)
                .min()
                .unwrap_or_else(Instant::now);
            let wait = next_deadline.saturating_duration_since(Instant::now());

            match rx_result.recv_timeout(wait) {
                Ok((slot, outcome)) => {
                    if running.remove(&slot).is_some() {
                        self.store(&table, slot, outcome);
                    } else {
                        debug!("discarding late result of {outcome}");
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    unreachable!("the scheduler keeps a sender alive")
                }
            }

            // 3. expire jobs past their deadline
            let now = Instant::now();
            let expired: Vec<usize> = running
                .iter()
                .filter(|(_, r)| r.deadline <= now)
                .map(|(&slot, _)| slot)
                .collect();
            for slot in expired {
                if let Some(Running { job, cancel, .. }) = running.remove(&slot) {
                    warn!("{job} timed out after {:?}, abandoning worker", self.config.job_timeout);
                    cancel.cancel();
                    let outcome = JobOutcome::failed(
                        &job,
                        FailureKind::Timeout,
                        None,
                        format!("no result within {:?}", self.config.job_timeout),
                    );
                    self.store(&table, slot, outcome);
                }
            }
        }

        debug_assert!(table.is_complete());
        info!("all {} jobs have an outcome", table.recorded());
        table.into_outcomes()
    }

    fn store(&self, table: &OutcomeTable, slot: usize, outcome: JobOutcome) {
        trace!(slot, %outcome);
        if table.record(slot, outcome) {
            if let (Some(callback), Some(outcome)) = (&self.on_outcome, table.get(slot)) {
                callback(outcome);
            }
        }
    }

    fn launch_job(
        &self,
        slot: usize,
        job: PairingJob,
        cancel: CancelToken,
        tx_result: Sender<(usize, JobOutcome)>,
    ) -> std::io::Result<()> {
        let client = self.client.clone();
        let config = self.config.clone();

        thread::Builder::new()
            .name(format!("job-{}", job.job_id))
            .spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    run_match(&job, &client, &config, &cancel)
                }));
                let outcome = match result {
                    Ok(Ok(report)) => report.into_outcome(&job),
                    Ok(Err(e)) => {
                        warn!("{job} failed: {e}");
                        e.into_outcome(&job)
                    }
                    Err(panic) => {
                        let message = panic_message(&*panic);
                        error!("{job} crashed: {message}");
                        JobOutcome::failed(&job, FailureKind::WorkerCrash, None, message)
                    }
                };
                // the scheduler may be gone if this job was abandoned at the very end
                let _ = tx_result.send((slot, outcome));
            })
            .map(|_handle| ())
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_owned()
    }
}
