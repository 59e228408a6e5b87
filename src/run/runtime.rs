//! Bounded worker pool for parallel batches.
//!
//! Scenarios are independent once the nominal run and its checkpoints exist,
//! so each job runs on its own model copy. Workers pull jobs from a bounded
//! queue and reply with the job index; the caller puts results back in
//! scenario order.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::config::RuntimeConfig;
use crate::error::{ExecutionError, FaultPropError, FaultPropResult};
use crate::scenario::Scenario;

use super::simulator::{BatchContext, ScenarioOutcome};

struct Job {
    index: usize,
    scenario: Scenario,
}

type Reply = (usize, FaultPropResult<ScenarioOutcome>);

struct WorkerPool {
    tx: Sender<Job>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    fn start(
        config: &RuntimeConfig,
        context: &Arc<BatchContext>,
        replies: &Sender<Reply>,
    ) -> Result<Self, ExecutionError> {
        let (tx, rx) = bounded::<Job>(config.queue_capacity.max(1));
        let mut pool = Self {
            tx,
            workers: Vec::with_capacity(config.workers),
        };

        for idx in 0..config.workers.max(1) {
            let rx: Receiver<Job> = rx.clone();
            let reply = replies.clone();
            let context = Arc::clone(context);
            let spawned = thread::Builder::new()
                .name(format!("faultprop-batch-{idx}"))
                .spawn(move || {
                    // Reuse mode keeps one model per worker.
                    let mut working = None;
                    while let Ok(Job { index, scenario }) = rx.recv() {
                        let outcome = context.execute(&mut working, &scenario);
                        if reply.send((index, outcome)).is_err() {
                            break;
                        }
                    }
                });
            match spawned {
                Ok(handle) => pool.workers.push(handle),
                Err(e) => {
                    pool.shutdown();
                    return Err(ExecutionError::WorkerSpawn { message: e.to_string() });
                }
            }
        }
        Ok(pool)
    }

    fn submit(&self, job: Job) -> Result<(), ExecutionError> {
        self.tx.send(job).map_err(|_| ExecutionError::Disconnected)
    }

    /// Closes the queue; workers drain what is queued and exit.
    fn shutdown(self) -> bool {
        drop(self.tx);
        let mut clean = true;
        for handle in self.workers {
            clean &= handle.join().is_ok();
        }
        clean
    }
}

/// Runs `scenarios` on a worker pool and returns their outcomes in input
/// order. The first failing scenario (in input order) decides the error.
pub(super) fn run_parallel(
    context: Arc<BatchContext>,
    scenarios: Vec<Scenario>,
    config: &RuntimeConfig,
) -> FaultPropResult<Vec<ScenarioOutcome>> {
    let count = scenarios.len();
    let (reply_tx, reply_rx) = bounded::<Reply>(count.max(1));
    let pool = WorkerPool::start(config, &context, &reply_tx)?;
    drop(reply_tx);

    let mut submitted = Ok(());
    for (index, scenario) in scenarios.into_iter().enumerate() {
        if let Err(e) = pool.submit(Job { index, scenario }) {
            submitted = Err(e);
            break;
        }
    }
    if !pool.shutdown() {
        return Err(FaultPropError::internal("a batch worker panicked"));
    }
    submitted?;

    let mut slots: Vec<Option<FaultPropResult<ScenarioOutcome>>> = (0..count).map(|_| None).collect();
    for (index, outcome) in reply_rx.try_iter() {
        slots[index] = Some(outcome);
    }
    slots
        .into_iter()
        .map(|slot| slot.unwrap_or_else(|| Err(ExecutionError::Disconnected.into())))
        .collect()
}
