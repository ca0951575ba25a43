use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use crate::error::{SendError, TryRecvError, TrySendError};
use crate::{ChannelState, Iter, Receiver, Recv, Sender};

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(0);

/// Create a closable channel with room for `size` values.
///
/// A `size` of `0` gives an unbuffered channel: every `send` is a rendezvous
/// and returns only after the receiver has taken the value. Any other size
/// gives a bounded FIFO buffer where `send` blocks only while it is full.
///
/// There is exactly one sender and one receiver. The sender closes the
/// channel, either with `close` or by being dropped; the receiver keeps
/// getting values that were sent before the close, and only then sees
/// `Recv::Closed`.
pub fn sync<T>(size: usize) -> (SyncSender<T>, SyncReceiver<T>) {
    let chan = SyncChannel::new(size);
    (SyncSender(chan.clone()), SyncReceiver(chan))
}

/// The sending half of a channel created with `sync`.
#[derive(Debug)]
pub struct SyncSender<T>(SyncChannel<T>);

/// The receiving half of a channel created with `sync`.
#[derive(Debug)]
pub struct SyncReceiver<T>(SyncChannel<T>);

#[derive(Debug)]
struct SyncChannel<T>(Arc<SyncInner<T>>);

#[derive(Debug)]
enum SyncInner<T> {
    Unbuffered(Unbuffered<T>),
    Buffered(Buffered<T>),
}

struct Unbuffered<T> {
    id: u64,
    cond: Condvar,
    sender: Mutex<()>,
    slot: Mutex<Slot<T>>,
}

#[derive(Debug)]
struct Slot<T> {
    val: Option<T>,
    nwaiting: usize,
    closed: bool,
    disconnected: bool,
}

struct Buffered<T> {
    id: u64,
    cap: usize,
    cond: Condvar,
    ring: Mutex<Ring<T>>,
}

// `cap` on `Buffered` bounds the queue; it is not allocated up front, so a
// huge capacity costs nothing until values actually pile up.
#[derive(Debug)]
struct Ring<T> {
    queue: VecDeque<T>,
    closed: bool,
    disconnected: bool,
}

// The channel never leaves its state half-updated while a lock is held, so a
// panic elsewhere must not stop the other side from seeing a close.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn wait<'a, T>(cond: &Condvar, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
    cond.wait(guard).unwrap_or_else(PoisonError::into_inner)
}

impl<T> SyncChannel<T> {
    fn new(size: usize) -> SyncChannel<T> {
        let id = NEXT_CHANNEL_ID.fetch_add(1, Ordering::SeqCst);
        let inner = if size == 0 {
            SyncInner::Unbuffered(Unbuffered {
                id,
                cond: Condvar::new(),
                sender: Mutex::new(()),
                slot: Mutex::new(Slot {
                    val: None,
                    nwaiting: 0,
                    closed: false,
                    disconnected: false,
                }),
            })
        } else {
            SyncInner::Buffered(Buffered {
                id,
                cap: size,
                cond: Condvar::new(),
                ring: Mutex::new(Ring {
                    queue: VecDeque::new(),
                    closed: false,
                    disconnected: false,
                }),
            })
        };
        SyncChannel(Arc::new(inner))
    }

    fn id(&self) -> u64 {
        match *self.0 {
            SyncInner::Unbuffered(ref i) => i.id,
            SyncInner::Buffered(ref i) => i.id,
        }
    }

    fn capacity(&self) -> usize {
        match *self.0 {
            SyncInner::Unbuffered(_) => 0,
            SyncInner::Buffered(ref i) => i.cap,
        }
    }

    fn state(&self) -> ChannelState {
        match *self.0 {
            SyncInner::Unbuffered(ref i) => i.state(),
            SyncInner::Buffered(ref i) => i.state(),
        }
    }

    fn send(&self, val: T, block: bool) -> Result<(), TrySendError<T>> {
        match *self.0 {
            SyncInner::Unbuffered(ref i) => i.send(val, block),
            SyncInner::Buffered(ref i) => i.send(val, block),
        }
    }

    fn recv(&self, block: bool) -> Result<Recv<T>, TryRecvError> {
        match *self.0 {
            SyncInner::Unbuffered(ref i) => i.recv(block),
            SyncInner::Buffered(ref i) => i.recv(block),
        }
    }

    fn close(&self) {
        match *self.0 {
            SyncInner::Unbuffered(ref i) => i.close(),
            SyncInner::Buffered(ref i) => i.close(),
        }
    }

    fn disconnect(&self) {
        match *self.0 {
            SyncInner::Unbuffered(ref i) => i.disconnect(),
            SyncInner::Buffered(ref i) => i.disconnect(),
        }
    }
}

impl<T> Clone for SyncChannel<T> {
    fn clone(&self) -> SyncChannel<T> {
        SyncChannel(self.0.clone())
    }
}

impl<T> SyncSender<T> {
    /// A process-unique identifier for this channel.
    pub fn id(&self) -> u64 {
        self.0.id()
    }

    pub fn capacity(&self) -> usize {
        self.0.capacity()
    }

    pub fn state(&self) -> ChannelState {
        self.0.state()
    }
}

impl<T> SyncReceiver<T> {
    /// A process-unique identifier for this channel.
    pub fn id(&self) -> u64 {
        self.0.id()
    }

    pub fn capacity(&self) -> usize {
        self.0.capacity()
    }

    pub fn state(&self) -> ChannelState {
        self.0.state()
    }
}

impl<T> Drop for SyncSender<T> {
    fn drop(&mut self) {
        self.0.close();
    }
}

impl<T> Drop for SyncReceiver<T> {
    fn drop(&mut self) {
        self.0.disconnect();
    }
}

impl<T> Sender for SyncSender<T> {
    type Item = T;

    fn send(&self, val: T) -> Result<(), SendError<T>> {
        self.0.send(val, true).map_err(|err| SendError(err.into_inner()))
    }

    fn try_send(&self, val: T) -> Result<(), TrySendError<T>> {
        self.0.send(val, false)
    }

    fn close(self) {
        // The `Drop` impl performs the actual transition.
        drop(self);
    }
}

impl<T> Receiver for SyncReceiver<T> {
    type Item = T;

    fn recv(&self) -> Recv<T> {
        match self.0.recv(true) {
            Ok(recv) => recv,
            Err(TryRecvError) => unreachable!("blocking receive came back empty"),
        }
    }

    fn try_recv(&self) -> Result<Recv<T>, TryRecvError> {
        self.0.recv(false)
    }
}

impl<T> IntoIterator for SyncReceiver<T> {
    type Item = T;
    type IntoIter = Iter<SyncReceiver<T>>;

    fn into_iter(self) -> Iter<SyncReceiver<T>> {
        Iter::new(self)
    }
}

impl<'a, T> IntoIterator for &'a SyncReceiver<T> {
    type Item = T;
    type IntoIter = Iter<&'a SyncReceiver<T>>;

    fn into_iter(self) -> Iter<&'a SyncReceiver<T>> {
        Iter::new(self)
    }
}

impl<T> Buffered<T> {
    fn send(&self, val: T, block: bool) -> Result<(), TrySendError<T>> {
        let mut ring = lock(&self.ring);
        // Checked on every wake up: the receiver may go away while we wait
        // for room, and nobody would ever make room again.
        loop {
            if ring.disconnected {
                return Err(TrySendError::Disconnected(val));
            }
            if ring.queue.len() < self.cap {
                break;
            }
            if !block {
                return Err(TrySendError::Full(val));
            }
            ring = wait(&self.cond, ring);
        }
        debug_assert!(!ring.closed, "send on a closed channel");
        ring.queue.push_back(val);
        self.cond.notify_all();
        Ok(())
    }

    fn recv(&self, block: bool) -> Result<Recv<T>, TryRecvError> {
        let mut ring = lock(&self.ring);
        loop {
            if let Some(val) = ring.queue.pop_front() {
                self.cond.notify_all();
                return Ok(Recv::Value(val));
            }
            if ring.closed {
                return Ok(Recv::Closed);
            }
            if !block {
                return Err(TryRecvError);
            }
            ring = wait(&self.cond, ring);
        }
    }

    fn state(&self) -> ChannelState {
        let ring = lock(&self.ring);
        ChannelState::from_parts(ring.closed, !ring.queue.is_empty())
    }

    fn close(&self) {
        let mut ring = lock(&self.ring);
        ring.closed = true;
        self.cond.notify_all();
    }

    fn disconnect(&self) {
        let mut ring = lock(&self.ring);
        ring.disconnected = true;
        self.cond.notify_all();
    }
}

impl<T: fmt::Debug> fmt::Debug for Buffered<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let ring = lock(&self.ring);
        writeln!(f, "Buffered {{")?;
        writeln!(f, "    id: {:?}", self.id)?;
        writeln!(f, "    cap: {:?}", self.cap)?;
        writeln!(f, "    ring: {:?}", *ring)?;
        writeln!(f, "}}")?;
        Ok(())
    }
}

impl<T> Unbuffered<T> {
    fn send(&self, send_val: T, block: bool) -> Result<(), TrySendError<T>> {
        let _sender_lock = lock(&self.sender);
        let mut slot = lock(&self.slot);
        if slot.disconnected {
            return Err(TrySendError::Disconnected(send_val));
        }
        if !block && slot.nwaiting == 0 {
            return Err(TrySendError::Full(send_val));
        }
        // Holding the sender lock means any previous hand-off has finished,
        // so the slot must be empty.
        debug_assert!(slot.val.is_none());
        debug_assert!(!slot.closed, "send on a closed channel");
        slot.val = Some(send_val);
        self.cond.notify_all();
        // Keep blocking until a receiver has taken the value. If the
        // receiver goes away first, hand the value back instead.
        while slot.val.is_some() {
            if slot.disconnected {
                if let Some(val) = slot.val.take() {
                    return Err(TrySendError::Disconnected(val));
                }
            }
            slot = wait(&self.cond, slot);
        }
        Ok(())
    }

    fn recv(&self, block: bool) -> Result<Recv<T>, TryRecvError> {
        let mut slot = lock(&self.slot);
        loop {
            // A value put in the slot before `close` still gets delivered.
            if let Some(val) = slot.val.take() {
                self.cond.notify_all();
                return Ok(Recv::Value(val));
            }
            if slot.closed {
                return Ok(Recv::Closed);
            }
            if !block {
                return Err(TryRecvError);
            }
            slot.nwaiting += 1;
            slot = wait(&self.cond, slot);
            slot.nwaiting -= 1;
        }
    }

    fn state(&self) -> ChannelState {
        let slot = lock(&self.slot);
        ChannelState::from_parts(slot.closed, slot.val.is_some())
    }

    fn close(&self) {
        let mut slot = lock(&self.slot);
        slot.closed = true;
        // Wakes any blocked receiver so it can observe the close.
        self.cond.notify_all();
    }

    fn disconnect(&self) {
        let mut slot = lock(&self.slot);
        slot.disconnected = true;
        // Wakes a sender blocked in the middle of a hand-off.
        self.cond.notify_all();
    }
}

impl<T: fmt::Debug> fmt::Debug for Unbuffered<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let slot = lock(&self.slot);
        writeln!(f, "Unbuffered {{")?;
        writeln!(f, "    id: {:?}", self.id)?;
        writeln!(f, "    slot: {:?}", *slot)?;
        writeln!(f, "}}")?;
        Ok(())
    }
}
