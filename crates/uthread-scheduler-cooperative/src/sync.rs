//! Wait queues and join, built on the scheduler core.
//!
//! A wait queue is a FIFO of blocked threads with no condition attached:
//! callers pair it with their own state the way a condition variable pairs
//! with a lock, re-checking after every wake-up.

use core::marker::PhantomData;

use interrupts::InterruptGuard;

use crate::error::{Result, ThreadError};
use crate::ops::{fatal, reschedule};
use crate::scheduler::{JoinStart, Scheduler};
use crate::thread::{Tid, WaitChannel};

/// Handle to a wait queue owned by the calling OS thread's runtime.
///
/// Stale handles (queue destroyed, slot reused) are rejected with
/// [`ThreadError::InvalidQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaitQueueId {
    index: usize,
    generation: u32,
    _local: PhantomData<*const ()>,
}

impl WaitQueueId {
    fn resolve(self, s: &Scheduler) -> Result<usize> {
        s.wait_queue_index(self.index, self.generation)
    }
}

pub fn wait_queue_create() -> WaitQueueId {
    let _guard = InterruptGuard::new();
    let (index, generation) = Scheduler::with_mut_or_init(Scheduler::wait_queue_create);
    WaitQueueId {
        index,
        generation,
        _local: PhantomData,
    }
}

/// Fails with [`ThreadError::QueueNotEmpty`] while any thread sleeps on `wq`.
pub fn wait_queue_destroy(wq: WaitQueueId) -> Result<()> {
    let _guard = InterruptGuard::new();
    Scheduler::with_mut_or_init(|s| {
        let index = wq.resolve(s)?;
        s.wait_queue_destroy(index)
    })
}

/// Number of threads currently asleep on `wq`.
pub fn wait_queue_len(wq: WaitQueueId) -> Result<usize> {
    let _guard = InterruptGuard::new();
    Scheduler::with_mut_or_init(|s| wq.resolve(s).map(|index| s.wait_queue_len(index)))
}

/// Blocks the caller on `wq` until a wake call picks it. Returns the thread
/// that ran when the caller blocked.
pub fn sleep(wq: WaitQueueId) -> Result<Tid> {
    let _guard = InterruptGuard::new();
    Scheduler::with_mut_or_init(|s| {
        let index = wq.resolve(s)?;
        s.block_current(WaitChannel::Queue(index))
    })?;

    match reschedule() {
        Some(next) => Ok(next),
        None => fatal("blocked with an empty ready queue"),
    }
}

/// Wakes the longest sleeper on `wq`. Returns how many were woken (0 or 1).
pub fn wake_next(wq: WaitQueueId) -> Result<usize> {
    let _guard = InterruptGuard::new();
    Scheduler::with_mut_or_init(|s| {
        let index = wq.resolve(s)?;
        Ok(s.wake_one(index).map_or(0, |_| 1))
    })
}

/// Wakes every thread asleep on `wq` at the time of the call, in sleep order.
pub fn wake_all(wq: WaitQueueId) -> Result<usize> {
    let _guard = InterruptGuard::new();
    Scheduler::with_mut_or_init(|s| {
        let index = wq.resolve(s)?;
        let sleepers = s.wait_queue_len(index);
        Ok((0..sleepers).filter_map(|_| s.wake_one(index)).count())
    })
}

/// Waits for `tid` to exit and returns `(tid, exit_code)`.
///
/// Every thread that joins during the target's lifetime gets the same code.
/// The target's slot is held until the last of them has read it; after that
/// the tid is no longer joinable.
pub fn join(tid: Tid) -> Result<(Tid, i32)> {
    let _guard = InterruptGuard::new();
    match Scheduler::with_mut_or_init(|s| s.begin_join(tid))? {
        JoinStart::Exited(code) => return Ok((tid, code)),
        JoinStart::Blocked => {}
    }

    if reschedule().is_none() {
        fatal("blocked with an empty ready queue");
    }

    match Scheduler::with_mut(|s| s.finish_join(tid)).flatten() {
        Some(code) => Ok((tid, code)),
        None => Err(ThreadError::ThreadNotJoinable(tid)),
    }
}
