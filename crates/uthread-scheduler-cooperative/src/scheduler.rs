use std::{mem, ptr};

use arch::Stack;
use foundation::utils::GlobalOption;

use crate::context::{make_context, Context};
use crate::error::{Result, ThreadError};
use crate::queue::TidQueue;
use crate::thread::{
    ThreadControlBlock, ThreadEntry, ThreadState, Tid, WaitChannel, EXIT_CODE_KILLED, MAIN_TID,
};
use crate::trampoline::thread_start;

pub const MAX_THREADS: usize = 256;
pub const THREAD_STACK_SIZE: usize = 128 * 1024;

thread_local! {
    static SCHEDULER: GlobalOption<Scheduler> = const { GlobalOption::none() };
}

struct WaitQueueSlot {
    generation: u32,
    queue: Option<TidQueue>,
}

/// Saved-context pointers for one transfer, valid until the slots they point
/// into are reclaimed.
pub(crate) struct Switch {
    pub from: *mut Context,
    pub to: *const Context,
}

/// Outcome of starting a join.
pub(crate) enum JoinStart {
    /// The target had already exited.
    Exited(i32),
    /// The caller is now blocked on the target's joiners.
    Blocked,
}

pub struct Scheduler {
    pub(crate) threads: Box<[ThreadControlBlock]>,
    links: Box<[Option<Tid>]>,
    pub(crate) running: Tid,
    ready: TidQueue,
    zombies: TidQueue,
    wait_queues: Vec<WaitQueueSlot>,
    free_wait_queues: Vec<usize>,
    live: usize,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        let mut threads: Box<[ThreadControlBlock]> =
            (0..MAX_THREADS).map(ThreadControlBlock::free).collect();
        threads[MAIN_TID] = ThreadControlBlock::main();

        Self {
            threads,
            links: vec![None; MAX_THREADS].into_boxed_slice(),
            running: MAIN_TID,
            ready: TidQueue::new(),
            zombies: TidQueue::new(),
            wait_queues: Vec::new(),
            free_wait_queues: Vec::new(),
            live: 1,
        }
    }

    pub fn init() -> Result<()> {
        SCHEDULER.with(|slot| {
            if slot.is_some() {
                return Err(ThreadError::AlreadyInitialized);
            }
            slot.set(Scheduler::new());
            log::debug!("thread runtime initialized");
            Ok(())
        })
    }

    /// Runs `f` on this OS thread's scheduler. `None` before initialization
    /// or during thread-local teardown.
    #[inline(always)]
    pub fn with_mut<R>(f: impl FnOnce(&mut Scheduler) -> R) -> Option<R> {
        SCHEDULER.try_with(|slot| slot.with_some_mut(f)).ok().flatten()
    }

    /// Like `with_mut`, initializing the scheduler on first use.
    #[inline(always)]
    pub fn with_mut_or_init<R>(f: impl FnOnce(&mut Scheduler) -> R) -> R {
        SCHEDULER.with(|slot| slot.with_or_init_mut(Scheduler::new, f))
    }

    /// True when the scheduler exists and nothing on this OS thread is
    /// currently borrowing it.
    pub(crate) fn is_available() -> bool {
        SCHEDULER.try_with(GlobalOption::is_available).unwrap_or(false)
    }

    pub fn running(&self) -> Tid {
        self.running
    }

    pub fn thread_count(&self) -> usize {
        self.live
    }

    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    pub fn state_of(&self, tid: Tid) -> Option<ThreadState> {
        self.threads.get(tid).map(|t| t.state)
    }

    pub fn thread(&self, tid: Tid) -> Option<&ThreadControlBlock> {
        self.threads.get(tid)
    }

    fn check_tid(&self, tid: Tid) -> Result<()> {
        if tid < MAX_THREADS {
            Ok(())
        } else {
            Err(ThreadError::InvalidTid(tid))
        }
    }

    /// Queues a new thread running `entry`. On failure the body is handed
    /// back so the caller can drop it once the scheduler is released.
    pub(crate) fn spawn(
        &mut self,
        entry: ThreadEntry,
    ) -> core::result::Result<Tid, (ThreadError, ThreadEntry)> {
        let Some(tid) = self.threads.iter().position(|t| t.state == ThreadState::Free) else {
            return Err((ThreadError::OutOfThreads, entry));
        };

        let stack = match Stack::new(THREAD_STACK_SIZE) {
            Ok(stack) => stack,
            Err(e) => {
                log::warn!("stack allocation for thread {} failed: {}", tid, e);
                return Err((ThreadError::OutOfMemory, entry));
            }
        };
        let Some(context) = make_context(&stack, thread_start) else {
            return Err((ThreadError::OutOfMemory, entry));
        };

        let tcb = &mut self.threads[tid];
        tcb.state = ThreadState::Ready;
        tcb.context = context;
        tcb.stack = Some(stack);
        tcb.entry = Some(entry);
        self.ready.enqueue(&mut self.links, tid);
        self.live += 1;

        log::debug!("created thread {}", tid);
        Ok(tid)
    }

    /// Detaches the running thread's stack from its slot without unmapping
    /// it. Used only when the process is about to exit on that stack.
    pub(crate) fn leak_running_stack(&mut self) {
        let current = self.running;
        if let Some(stack) = self.threads[current].stack.take() {
            mem::forget(stack);
        }
    }

    pub(crate) fn take_entry(&mut self) -> Option<ThreadEntry> {
        let current = self.running;
        self.threads[current].entry.take()
    }

    pub(crate) fn next_ready(&mut self) -> Option<Tid> {
        self.ready.dequeue(&mut self.links)
    }

    /// Pulls `tid` out of the ready queue so it can be switched to directly.
    pub(crate) fn unlink_ready(&mut self, tid: Tid) -> Result<()> {
        self.check_tid(tid)?;
        if self.threads[tid].state != ThreadState::Ready {
            return Err(ThreadError::ThreadNotReady(tid));
        }
        if !self.ready.remove(&mut self.links, tid) {
            return Err(ThreadError::ThreadNotReady(tid));
        }
        Ok(())
    }

    /// Makes `target` (already unlinked) the running thread. The caller goes
    /// back on the ready queue unless it has blocked or exited.
    pub(crate) fn dispatch(&mut self, target: Tid) -> Switch {
        let current = self.running;
        debug_assert_ne!(current, target, "dispatch to the running thread");

        if self.threads[current].state == ThreadState::Running {
            self.threads[current].state = ThreadState::Ready;
            self.ready.enqueue(&mut self.links, current);
        }
        self.threads[target].state = ThreadState::Running;
        self.running = target;

        // Derived from one base pointer; no reference outlives this call.
        let base = self.threads.as_mut_ptr();
        unsafe {
            Switch {
                from: ptr::addr_of_mut!((*base.add(current)).context),
                to: ptr::addr_of!((*base.add(target)).context),
            }
        }
    }

    /// Frees every zombie that is neither running nor pinned by a joiner.
    pub(crate) fn reap_zombies(&mut self) {
        let mut retained = TidQueue::new();
        while let Some(tid) = self.zombies.dequeue(&mut self.links) {
            if tid != self.running && self.threads[tid].pending_joiners == 0 {
                self.reclaim(tid);
            } else {
                retained.enqueue(&mut self.links, tid);
            }
        }
        self.zombies = retained;
    }

    fn reclaim(&mut self, tid: Tid) {
        debug_assert_eq!(self.threads[tid].state, ThreadState::Zombie);
        debug_assert_eq!(self.threads[tid].pending_joiners, 0);
        self.threads[tid].reset();
        self.live -= 1;
        log::debug!("reclaimed thread {}", tid);
    }

    /// Records `code`, moves every joiner to the ready queue and marks `tid`
    /// a zombie. The caller decides where the zombie goes next.
    fn zombify(&mut self, tid: Tid, code: i32) {
        let tcb = &mut self.threads[tid];
        tcb.state = ThreadState::Zombie;
        tcb.exit_code = Some(code);

        while let Some(joiner) = self.threads[tid].joiners.dequeue(&mut self.links) {
            self.make_ready(joiner);
        }
    }

    /// Turns the running thread into a zombie parked on the zombie queue.
    /// Whoever runs next frees it.
    pub(crate) fn exit_current(&mut self, code: i32) {
        let tid = self.running;
        self.zombify(tid, code);
        self.zombies.enqueue(&mut self.links, tid);
        log::debug!("thread {} exited with {}", tid, code);
    }

    /// Terminates `tid` on behalf of the running thread. Returns the body of
    /// a thread that never ran so the caller can drop it outside the borrow.
    pub(crate) fn kill(&mut self, tid: Tid) -> Result<Option<ThreadEntry>> {
        if tid == self.running {
            return Err(ThreadError::ThreadIsSelf(tid));
        }
        self.check_tid(tid)?;

        match self.threads[tid].state {
            ThreadState::Ready => {
                self.ready.remove(&mut self.links, tid);
            }
            ThreadState::Blocked => self.unlink_blocked(tid),
            _ => return Err(ThreadError::ThreadNotAlive(tid)),
        }

        if let Some(target) = self.threads[tid].joining.take() {
            self.release_join(target);
        }
        let entry = self.threads[tid].entry.take();

        self.zombify(tid, EXIT_CODE_KILLED);
        log::debug!("killed thread {}", tid);

        if self.threads[tid].pending_joiners == 0 {
            self.reclaim(tid);
        } else {
            self.zombies.enqueue(&mut self.links, tid);
        }
        Ok(entry)
    }

    fn unlink_blocked(&mut self, tid: Tid) {
        let removed = match self.threads[tid].wait_channel.take() {
            Some(WaitChannel::Queue(index)) => self.wait_queues[index]
                .queue
                .as_mut()
                .is_some_and(|q| q.remove(&mut self.links, tid)),
            Some(WaitChannel::Joiners(target)) => {
                self.threads[target].joiners.remove(&mut self.links, tid)
            }
            None => false,
        };
        debug_assert!(removed, "blocked thread {} was not on its wait channel", tid);
    }

    fn make_ready(&mut self, tid: Tid) {
        let tcb = &mut self.threads[tid];
        tcb.state = ThreadState::Ready;
        tcb.wait_channel = None;
        self.ready.enqueue(&mut self.links, tid);
    }

    /// Blocks the running thread on `channel`. The caller must switch away
    /// before doing anything else.
    pub(crate) fn block_current(&mut self, channel: WaitChannel) -> Result<()> {
        if self.ready.is_empty() {
            return Err(ThreadError::NoOtherRunnableThread);
        }

        let current = self.running;
        match channel {
            WaitChannel::Queue(index) => {
                let queue = self.wait_queues[index]
                    .queue
                    .as_mut()
                    .ok_or(ThreadError::InvalidQueue)?;
                queue.enqueue(&mut self.links, current);
            }
            WaitChannel::Joiners(target) => {
                self.threads[target].joiners.enqueue(&mut self.links, current);
            }
        }

        let tcb = &mut self.threads[current];
        tcb.state = ThreadState::Blocked;
        tcb.wait_channel = Some(channel);
        Ok(())
    }

    pub(crate) fn begin_join(&mut self, target: Tid) -> Result<JoinStart> {
        if target == self.running {
            return Err(ThreadError::ThreadIsSelf(target));
        }
        self.check_tid(target)?;

        match self.threads[target].state {
            ThreadState::Free => Err(ThreadError::ThreadNotJoinable(target)),
            ThreadState::Zombie => match self.threads[target].exit_code {
                Some(code) => Ok(JoinStart::Exited(code)),
                None => Err(ThreadError::ThreadNotJoinable(target)),
            },
            _ => {
                self.block_current(WaitChannel::Joiners(target))?;
                let current = self.running;
                self.threads[target].pending_joiners += 1;
                self.threads[current].joining = Some(target);
                Ok(JoinStart::Blocked)
            }
        }
    }

    /// Called by a joiner once woken: reads the exit code and drops the
    /// joiner's reference on `target`.
    pub(crate) fn finish_join(&mut self, target: Tid) -> Option<i32> {
        let current = self.running;
        if self.threads[current].joining.take() != Some(target) {
            return None;
        }
        let code = self.threads[target].exit_code;
        self.release_join(target);
        code
    }

    fn release_join(&mut self, target: Tid) {
        let tcb = &mut self.threads[target];
        debug_assert!(tcb.pending_joiners > 0);
        tcb.pending_joiners -= 1;

        if tcb.pending_joiners == 0 && tcb.state == ThreadState::Zombie && target != self.running {
            self.zombies.remove(&mut self.links, target);
            self.reclaim(target);
        }
    }

    pub(crate) fn wait_queue_create(&mut self) -> (usize, u32) {
        match self.free_wait_queues.pop() {
            Some(index) => {
                let slot = &mut self.wait_queues[index];
                slot.queue = Some(TidQueue::new());
                (index, slot.generation)
            }
            None => {
                self.wait_queues.push(WaitQueueSlot {
                    generation: 0,
                    queue: Some(TidQueue::new()),
                });
                (self.wait_queues.len() - 1, 0)
            }
        }
    }

    /// Resolves a handle to its registry index.
    pub(crate) fn wait_queue_index(&self, index: usize, generation: u32) -> Result<usize> {
        match self.wait_queues.get(index) {
            Some(slot) if slot.generation == generation && slot.queue.is_some() => Ok(index),
            _ => Err(ThreadError::InvalidQueue),
        }
    }

    pub(crate) fn wait_queue_len(&self, index: usize) -> usize {
        self.wait_queues[index].queue.map_or(0, |q| q.len())
    }

    pub(crate) fn wait_queue_destroy(&mut self, index: usize) -> Result<()> {
        let slot = &mut self.wait_queues[index];
        if slot.queue.is_some_and(|q| !q.is_empty()) {
            return Err(ThreadError::QueueNotEmpty);
        }
        slot.queue = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_wait_queues.push(index);
        Ok(())
    }

    /// Moves the longest sleeper on queue `index` to the ready queue.
    pub(crate) fn wake_one(&mut self, index: usize) -> Option<Tid> {
        let tid = self.wait_queues[index]
            .queue
            .as_mut()?
            .dequeue(&mut self.links)?;
        self.make_ready(tid);
        Some(tid)
    }
}
