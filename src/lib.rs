/*!
A closable, single-producer, single-consumer channel with drain-to-completion
receive, and a small job pipeline built on top of it.

The channel comes from `sync`. With a size of `0` every send is a rendezvous
with the receiver; with a larger size sends only block while the buffer is
full. The sender closes the channel exactly once, by calling `close` or by
being dropped. The receiver sees every value sent before the close, in order,
and then `Recv::Closed` on every receive after that.

```
use std::thread;

use jobchan::{sync, Receiver, Recv, Sender};

let (send, recv) = sync(0);
thread::spawn(move || {
    for i in 1..=3 {
        send.send(i).unwrap();
    }
    send.close();
});
assert_eq!(recv.recv(), Recv::Value(1));
assert_eq!(recv.recv(), Recv::Value(2));
assert_eq!(recv.recv(), Recv::Value(3));
assert_eq!(recv.recv(), Recv::Closed);
```

On top of the channel sit a producer (`produce`) that sends jobs `1..=n` and
closes, a consumer (`consume`) that drains until closed, both writing to an
explicit `JobLog`, and an `Orchestrator` that runs the pair repeatedly and
reports memory statistics between cycles.
*/

pub use crate::config::{Config, OnError, Schedule};
pub use crate::consumer::{consume, ConsumerReport};
pub use crate::error::{Error, Result, SendError, TryRecvError, TrySendError};
pub use crate::job::{Job, JOB_COUNT};
pub use crate::journal::{FileJobLog, JobLog, MemoryJobLog};
pub use crate::logging::init_logging;
pub use crate::orchestrator::{Cycle, CycleReport, Orchestrator, RunSummary};
pub use crate::producer::{produce, ProducerReport};
pub use crate::stats::{reclaim_hint, MemStats, StatsReporter};
pub use crate::sync::{sync, SyncReceiver, SyncSender};

mod config;
mod consumer;
mod error;
mod job;
mod journal;
mod logging;
mod orchestrator;
mod producer;
mod stats;
mod sync;

/// The sending half of a closable channel.
///
/// There is one sender per channel. Closing consumes it, so a value can never
/// be sent after the close and the close cannot happen twice.
pub trait Sender {
    type Item;

    /// Send a value, blocking until the channel accepts it.
    ///
    /// Fails, handing the value back, if the receiver is gone.
    fn send(&self, val: Self::Item) -> std::result::Result<(), SendError<Self::Item>>;

    /// Send a value only if that would not block.
    fn try_send(&self, val: Self::Item) -> std::result::Result<(), TrySendError<Self::Item>>;

    /// Mark the channel closed. Values already sent are still delivered.
    fn close(self)
    where
        Self: Sized;
}

/// The receiving half of a closable channel.
pub trait Receiver {
    type Item;

    /// Block until a value arrives or the channel is closed and drained.
    fn recv(&self) -> Recv<Self::Item>;

    /// Like `recv`, but fails with `TryRecvError` instead of blocking.
    fn try_recv(&self) -> std::result::Result<Recv<Self::Item>, TryRecvError>;

    fn iter(self) -> Iter<Self>
    where
        Self: Sized,
    {
        Iter::new(self)
    }
}

impl<'a, T: Receiver> Receiver for &'a T {
    type Item = T::Item;

    fn recv(&self) -> Recv<Self::Item> {
        (*self).recv()
    }

    fn try_recv(&self) -> std::result::Result<Recv<Self::Item>, TryRecvError> {
        (*self).try_recv()
    }
}

/// The outcome of a receive.
///
/// `Closed` means the channel was closed and every value sent before the close
/// has already been received. It is terminal: all later receives return it
/// too.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Recv<T> {
    Value(T),
    Closed,
}

impl<T> Recv<T> {
    pub fn into_value(self) -> Option<T> {
        match self {
            Recv::Value(val) => Some(val),
            Recv::Closed => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(*self, Recv::Closed)
    }
}

/// Where a channel is in its lifecycle.
///
/// `Open -> Closed -> Exhausted`. A channel closed with nothing pending goes
/// straight to `Exhausted`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ChannelState {
    Open,
    /// Closed, with values still waiting to be received.
    Closed,
    /// Closed and drained.
    Exhausted,
}

impl ChannelState {
    fn from_parts(closed: bool, pending: bool) -> ChannelState {
        match (closed, pending) {
            (false, _) => ChannelState::Open,
            (true, true) => ChannelState::Closed,
            (true, false) => ChannelState::Exhausted,
        }
    }
}

/// Yields received values until the channel is closed and drained.
pub struct Iter<C> {
    chan: C,
}

impl<C: Receiver> Iter<C> {
    pub fn new(c: C) -> Iter<C> {
        Iter { chan: c }
    }
}

impl<C: Receiver> Iterator for Iter<C> {
    type Item = C::Item;

    fn next(&mut self) -> Option<C::Item> {
        self.chan.recv().into_value()
    }
}
