use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use crate::config::{Config, OnError, Schedule};
use crate::consumer::{consume, ConsumerReport};
use crate::error::{Error, Result};
use crate::job::Job;
use crate::journal::JobLog;
use crate::producer::{produce, ProducerReport};
use crate::stats::{MemStats, StatsReporter};
use crate::sync::sync;

/// The outcome of one producer/consumer pair.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CycleReport {
    pub cycle: u64,
    pub sent: u32,
    pub received: u32,
}

/// Totals for a whole `Orchestrator::run`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RunSummary {
    /// Cycles started.
    pub cycles: u64,
    pub completed: u64,
    /// Cycles that failed and were skipped.
    pub failed: u64,
    pub jobs_delivered: u64,
    pub last_stats: Option<MemStats>,
}

/// A running producer/consumer pair sharing one fresh channel.
pub struct Cycle {
    id: u64,
    channel: u64,
    consumer: JoinHandle<Result<ConsumerReport>>,
    producer: JoinHandle<Result<ProducerReport>>,
}

impl Cycle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_finished(&self) -> bool {
        self.consumer.is_finished() && self.producer.is_finished()
    }

    /// Wait for both tasks.
    ///
    /// When both fail, the consumer's error wins over the producer's
    /// `ConsumerGone`, since that is only a consequence of the consumer
    /// giving up.
    pub fn join(self) -> Result<CycleReport> {
        let consumed = self
            .consumer
            .join()
            .map_err(|_| Error::TaskPanicked("consumer"))
            .and_then(|r| r);
        let produced = self
            .producer
            .join()
            .map_err(|_| Error::TaskPanicked("producer"))
            .and_then(|r| r);
        match (produced, consumed) {
            (Ok(p), Ok(c)) => {
                debug!(cycle = self.id, channel = self.channel, sent = p.sent, "cycle done");
                Ok(CycleReport {
                    cycle: self.id,
                    sent: p.sent,
                    received: c.received,
                })
            }
            (Err(Error::ConsumerGone(_)), Err(err)) => Err(err),
            (Err(err), _) | (Ok(_), Err(err)) => Err(err),
        }
    }
}

impl fmt::Debug for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Cycle")
            .field("id", &self.id)
            .field("channel", &self.channel)
            .field("finished", &self.is_finished())
            .finish()
    }
}

// Keep the first error of an aborting run; later ones are only logged.
fn note_failure(first: &mut Option<Error>, err: Error) {
    match *first {
        None => *first = Some(err),
        Some(_) => warn!(error = %err, "another cycle failed while aborting"),
    }
}

fn spawn<F, T>(name: String, f: F) -> Result<JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    thread::Builder::new()
        .name(name.clone())
        .spawn(f)
        .map_err(|source| Error::Spawn { name, source })
}

/// Runs producer/consumer cycles and reports memory use between them.
pub struct Orchestrator {
    config: Config,
    log: Arc<dyn JobLog>,
    stats: StatsReporter,
}

impl Orchestrator {
    pub fn new(config: Config, log: Arc<dyn JobLog>) -> Result<Orchestrator> {
        config.validate()?;
        Ok(Orchestrator {
            config,
            log,
            stats: StatsReporter::new()?,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Start cycle `id`: a fresh channel, with a consumer and a producer
    /// on their own threads. Returns without waiting for either.
    pub fn run_cycle(&self, id: u64) -> Result<Cycle> {
        let (send, recv) = sync::<Job>(self.config.capacity);
        let channel = send.id();
        let jobs = self.config.jobs;

        let log = Arc::clone(&self.log);
        let consumer = spawn(format!("consumer-{}", id), move || consume(recv, &*log))?;
        // If this spawn fails the sender is dropped with the closure, which
        // closes the channel and lets the consumer finish.
        let log = Arc::clone(&self.log);
        let producer = spawn(format!("producer-{}", id), move || {
            produce(send, jobs, &*log)
        })?;
        debug!(cycle = id, channel, jobs, "cycle started");
        Ok(Cycle {
            id,
            channel,
            consumer,
            producer,
        })
    }

    /// Run cycles until `iterations` is reached, forever if it is unset, or
    /// until a failure aborts the run.
    ///
    /// Every cycle that was started has been joined by the time this
    /// returns, on the error path too.
    pub fn run(&mut self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        let mut in_flight: VecDeque<Cycle> = VecDeque::new();

        let mut first_err = self.drive(&mut in_flight, &mut summary).err();
        for cycle in in_flight {
            if let Err(err) = self.settle(cycle.join(), &mut summary) {
                note_failure(&mut first_err, err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(summary),
        }
    }

    // Starts cycles. Unfinished overlapping cycles are left in `in_flight`
    // for `run` to join, whether this succeeds or not.
    fn drive(&mut self, in_flight: &mut VecDeque<Cycle>, summary: &mut RunSummary) -> Result<()> {
        let mut next = 0;
        while self.config.iterations.map_or(true, |n| next < n) {
            if let Schedule::Overlap { max_in_flight } = self.config.schedule {
                self.reap(in_flight, max_in_flight, summary)?;
            }

            let started = self.run_cycle(next);
            next += 1;
            summary.cycles += 1;
            match (started, self.config.schedule) {
                (Ok(cycle), Schedule::Barrier) => self.settle(cycle.join(), summary)?,
                (Ok(cycle), Schedule::Overlap { .. }) => in_flight.push_back(cycle),
                (Err(err), _) => self.settle(Err(err), summary)?,
            }

            match self.stats.snapshot() {
                Ok(stats) => {
                    info!(in_flight = in_flight.len(), "{}", stats);
                    summary.last_stats = Some(stats);
                }
                Err(err) => warn!(error = %err, "could not read memory statistics"),
            }
        }
        Ok(())
    }

    // Join whatever has finished, then the oldest cycles until there is room
    // for one more. Cycles not joined stay in `in_flight`.
    fn reap(
        &self,
        in_flight: &mut VecDeque<Cycle>,
        max_in_flight: usize,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let mut first_err = None;
        let mut running = VecDeque::with_capacity(in_flight.len());
        for cycle in in_flight.drain(..) {
            if !cycle.is_finished() {
                running.push_back(cycle);
            } else if let Err(err) = self.settle(cycle.join(), summary) {
                note_failure(&mut first_err, err);
            }
        }
        *in_flight = running;
        if let Some(err) = first_err {
            return Err(err);
        }

        while in_flight.len() >= max_in_flight {
            match in_flight.pop_front() {
                Some(oldest) => self.settle(oldest.join(), summary)?,
                None => break,
            }
        }
        Ok(())
    }

    fn settle(&self, outcome: Result<CycleReport>, summary: &mut RunSummary) -> Result<()> {
        match outcome {
            Ok(report) => {
                summary.completed += 1;
                summary.jobs_delivered += u64::from(report.received);
                Ok(())
            }
            Err(err) => match self.config.on_error {
                OnError::Abort => Err(err),
                OnError::Skip => {
                    warn!(error = %err, "cycle failed, skipping it");
                    summary.failed += 1;
                    Ok(())
                }
            },
        }
    }
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("log", &self.log.destination())
            .field("stats", &self.stats)
            .finish()
    }
}
