use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::job::Job;
use crate::journal::JobLog;
use crate::stats::reclaim_hint;
use crate::Sender;

/// What a producer did before it closed its channel.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ProducerReport {
    pub sent: u32,
}

/// Send jobs `1..=count` in order, logging each one after it is handed over,
/// then close the channel.
///
/// A job is logged only once `send` has returned, so with an unbuffered
/// channel every "sent job" line follows the matching receive. If the log
/// fails, or the receiver goes away, this returns at once without sending
/// anything else; dropping `jobs` on the way out closes the channel.
pub fn produce<S, L>(jobs: S, count: u32, log: &L) -> Result<ProducerReport>
where
    S: Sender<Item = Job>,
    L: JobLog + ?Sized,
{
    let mut sent = 0;
    for job in Job::sequence(count) {
        jobs.send(job).map_err(|err| Error::ConsumerGone(err.into_inner()))?;
        debug!(%job, "sent job");
        log.append(&format!("sent job {}", job))?;
        sent += 1;
    }
    jobs.close();
    reclaim_hint();
    info!(sent, "sent all jobs");
    Ok(ProducerReport { sent })
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use rand::Rng;

    use super::produce;
    use crate::error::Error;
    use crate::job::Job;
    use crate::journal::MemoryJobLog;
    use crate::sync::sync;
    use crate::{Receiver, Recv};

    #[test]
    fn sends_in_increasing_order_then_closes() {
        let (send, recv) = sync(0);
        let log = MemoryJobLog::new("mem");
        let producer = thread::spawn(move || {
            let report = produce(send, 3, &log);
            (report, log.messages())
        });
        let got: Vec<Job> = recv.iter().collect();
        assert_eq!(got, vec![Job::new(1), Job::new(2), Job::new(3)]);

        let (report, messages) = producer.join().unwrap();
        assert_eq!(report.unwrap().sent, 3);
        assert_eq!(messages, vec!["sent job 1", "sent job 2", "sent job 3"]);
    }

    #[test]
    fn order_holds_under_jitter() {
        for _ in 0..20 {
            let (send, recv) = sync(0);
            let log = MemoryJobLog::new("mem");
            let producer = thread::spawn(move || {
                thread::sleep(Duration::from_micros(rand::thread_rng().gen_range(0..500)));
                produce(send, 3, &log)
            });
            let mut got = Vec::new();
            while let Recv::Value(job) = recv.recv() {
                thread::sleep(Duration::from_micros(rand::thread_rng().gen_range(0..200)));
                got.push(job.id());
            }
            assert_eq!(got, vec![1, 2, 3]);
            assert_eq!(producer.join().unwrap().unwrap().sent, 3);
        }
    }

    #[test]
    fn zero_jobs_just_closes() {
        let (send, recv) = sync(0);
        let log = MemoryJobLog::new("mem");
        let report = produce(send, 0, &log).unwrap();
        assert_eq!(report.sent, 0);
        assert!(log.is_empty());
        assert_eq!(recv.recv(), Recv::Closed);
    }

    #[test]
    fn log_failure_stops_sending() {
        let (send, recv) = sync(3);
        let log = MemoryJobLog::failing_after("mem", 1);
        let err = produce(send, 3, &log).unwrap_err();
        assert!(matches!(err, Error::LogSinkUnavailable { .. }));
        // Job 1 was logged, job 2 was sent and then the log refused it.
        assert_eq!(recv.recv(), Recv::Value(Job::new(1)));
        assert_eq!(recv.recv(), Recv::Value(Job::new(2)));
        assert_eq!(recv.recv(), Recv::Closed);
        assert_eq!(log.messages(), vec!["sent job 1"]);
    }

    #[test]
    fn missing_consumer_is_reported() {
        let (send, recv) = sync(0);
        drop(recv);
        let log = MemoryJobLog::new("mem");
        match produce(send, 3, &log) {
            Err(Error::ConsumerGone(job)) => assert_eq!(job, Job::new(1)),
            other => panic!("expected ConsumerGone, got {:?}", other),
        }
        assert!(log.is_empty());
    }
}
