use clap::ValueEnum;

use crate::error::{Error, Result};
use crate::job::JOB_COUNT;

/// What the orchestrator does when a cycle fails.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum OnError {
    /// Stop the run and hand the error back.
    #[default]
    Abort,
    /// Count the failed cycle and carry on with the next one.
    Skip,
}

/// How successive cycles relate in time.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Schedule {
    /// Each cycle's producer and consumer finish before the next cycle starts.
    #[default]
    Barrier,
    /// Cycles are started without waiting for earlier ones, with at most
    /// `max_in_flight` unfinished at any time.
    Overlap { max_in_flight: usize },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    /// Jobs sent per cycle.
    pub jobs: u32,
    /// Channel buffer size; `0` is a rendezvous channel.
    pub capacity: usize,
    /// Number of cycles to run, or `None` to run until an error aborts.
    pub iterations: Option<u64>,
    pub schedule: Schedule,
    pub on_error: OnError,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            jobs: JOB_COUNT,
            capacity: 0,
            iterations: None,
            schedule: Schedule::Barrier,
            on_error: OnError::Abort,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if let Schedule::Overlap { max_in_flight: 0 } = self.schedule {
            return Err(Error::Config(
                "overlapping cycles need max_in_flight of at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, OnError, Schedule};
    use crate::error::Error;

    #[test]
    fn defaults_match_the_plain_loop() {
        let config = Config::default();
        assert_eq!(config.jobs, 3);
        assert_eq!(config.capacity, 0);
        assert_eq!(config.iterations, None);
        assert_eq!(config.schedule, Schedule::Barrier);
        assert_eq!(config.on_error, OnError::Abort);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn overlap_needs_room() {
        let config = Config {
            schedule: Schedule::Overlap { max_in_flight: 0 },
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
