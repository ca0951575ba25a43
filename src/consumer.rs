use tracing::{debug, info};

use crate::error::Result;
use crate::job::Job;
use crate::journal::JobLog;
use crate::{Receiver, Recv};

/// What a consumer saw before the channel reported `Closed`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ConsumerReport {
    pub received: u32,
    pub last: Option<Job>,
}

/// Receive and log jobs until the channel is closed and drained.
///
/// If the log fails this returns immediately and receives nothing more;
/// dropping `jobs` then unblocks a producer waiting on a hand-off.
pub fn consume<R, L>(jobs: R, log: &L) -> Result<ConsumerReport>
where
    R: Receiver<Item = Job>,
    L: JobLog + ?Sized,
{
    let mut report = ConsumerReport {
        received: 0,
        last: None,
    };
    loop {
        match jobs.recv() {
            Recv::Value(job) => {
                debug!(%job, "received job");
                log.append(&format!("received job {}", job))?;
                report.received += 1;
                report.last = Some(job);
            }
            Recv::Closed => {
                info!(received = report.received, "received all jobs");
                return Ok(report);
            }
        }
    }
}
