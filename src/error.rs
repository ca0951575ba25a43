use std::error;
use std::fmt;
use std::io;

use thiserror::Error;

use crate::job::Job;

/// Errors produced by the job tasks and the orchestrator.
#[derive(Debug, Error)]
pub enum Error {
    /// The job log could not be opened or written.
    #[error("log sink unavailable at {destination}: {source}")]
    LogSinkUnavailable {
        destination: String,
        #[source]
        source: io::Error,
    },

    /// The consumer went away before it took this job.
    #[error("consumer hung up before job {0} was delivered")]
    ConsumerGone(Job),

    /// A producer or consumer thread panicked.
    #[error("{0} task panicked")]
    TaskPanicked(&'static str),

    /// A task thread could not be started.
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to read memory statistics: {0}")]
    Stats(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Returned by `send` when the receiving half is gone. Carries the value that
/// could not be delivered.
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct SendError<T>(pub T);

impl<T> SendError<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for SendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SendError").finish_non_exhaustive()
    }
}

impl<T> fmt::Display for SendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("sending on a channel with no receiver")
    }
}

impl<T> error::Error for SendError<T> {}

#[derive(Clone, Copy, Eq, PartialEq)]
pub enum TrySendError<T> {
    /// The send would have blocked.
    Full(T),
    /// The receiving half is gone.
    Disconnected(T),
}

impl<T> TrySendError<T> {
    pub fn into_inner(self) -> T {
        match self {
            TrySendError::Full(val) | TrySendError::Disconnected(val) => val,
        }
    }
}

impl<T> From<SendError<T>> for TrySendError<T> {
    fn from(err: SendError<T>) -> TrySendError<T> {
        TrySendError::Disconnected(err.0)
    }
}

impl<T> fmt::Debug for TrySendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            TrySendError::Full(..) => f.write_str("Full(..)"),
            TrySendError::Disconnected(..) => f.write_str("Disconnected(..)"),
        }
    }
}

impl<T> fmt::Display for TrySendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            TrySendError::Full(..) => f.write_str("sending on a full channel"),
            TrySendError::Disconnected(..) => {
                f.write_str("sending on a channel with no receiver")
            }
        }
    }
}

impl<T> error::Error for TrySendError<T> {}

/// Returned by `try_recv` when no value is ready and the channel is still
/// open.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
#[error("receiving on an empty channel")]
pub struct TryRecvError;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_sink_error_names_destination() {
        let err = Error::LogSinkUnavailable {
            destination: "/nope/testLogs".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "missing"),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("log sink unavailable at /nope/testLogs"));
        assert!(error::Error::source(&err).is_some());
    }

    #[test]
    fn send_errors_give_back_the_value() {
        assert_eq!(SendError(7).into_inner(), 7);
        assert_eq!(TrySendError::Full(8).into_inner(), 8);
        let err: TrySendError<i32> = SendError(9).into();
        assert_eq!(err, TrySendError::Disconnected(9));
        assert_eq!(format!("{:?}", err), "Disconnected(..)");
        assert_eq!(format!("{:?}", TrySendError::Full(1)), "Full(..)");
        assert_eq!(format!("{:?}", SendError(1)), "SendError { .. }");
        assert_eq!(TrySendError::Full(1).to_string(), "sending on a full channel");
    }
}
