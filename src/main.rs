//! Runs producer/consumer cycles over a closable channel.
//!
//! Each cycle the producer sends jobs `1..=N` over a fresh channel and closes
//! it; the consumer drains it. Both append a line per job to the job log.
//! Memory statistics are printed after every cycle. Without `--iterations`
//! this runs until it is killed or a cycle fails.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use jobchan::{init_logging, Config, FileJobLog, OnError, Orchestrator, Schedule, JOB_COUNT};

/// Closable channel job runner
#[derive(Parser, Debug)]
#[command(name = "jobchan")]
#[command(about = "Run producer/consumer cycles over a closable channel", long_about = None)]
#[command(version)]
struct Cli {
    /// Jobs sent per cycle
    #[arg(short, long, default_value_t = JOB_COUNT)]
    jobs: u32,

    /// File the job events are appended to
    #[arg(short, long, default_value = "testLogs")]
    log_file: PathBuf,

    /// Channel buffer size (0 = unbuffered)
    #[arg(short, long, default_value_t = 0)]
    capacity: usize,

    /// Number of cycles to run (runs forever when omitted)
    #[arg(short = 'n', long)]
    iterations: Option<u64>,

    /// Start each cycle without waiting for the previous one
    #[arg(long)]
    overlap: bool,

    /// With --overlap, the most cycles left unfinished at once
    #[arg(long, default_value_t = 64)]
    max_in_flight: usize,

    /// What to do when a cycle fails
    #[arg(long, value_enum, default_value_t = OnError::Abort)]
    on_error: OnError,

    /// Diagnostic log level (RUST_LOG overrides). The "sent all jobs",
    /// "received all jobs" and memory statistics lines are info events, so
    /// any level above info hides them
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn config(&self) -> Config {
        let schedule = if self.overlap {
            Schedule::Overlap {
                max_in_flight: self.max_in_flight,
            }
        } else {
            Schedule::Barrier
        };
        Config {
            jobs: self.jobs,
            capacity: self.capacity,
            iterations: self.iterations,
            schedule,
            on_error: self.on_error,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    let log = Arc::new(FileJobLog::new(&cli.log_file));
    let mut orchestrator =
        Orchestrator::new(cli.config(), log).context("Failed to set up the job runner")?;
    info!(
        log_file = %cli.log_file.display(),
        config = ?orchestrator.config(),
        "starting"
    );

    let summary = orchestrator.run().context("Job run aborted")?;
    info!(
        cycles = summary.cycles,
        completed = summary.completed,
        failed = summary.failed,
        jobs = summary.jobs_delivered,
        "finished"
    );
    Ok(())
}
