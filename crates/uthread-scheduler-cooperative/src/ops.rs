use std::time::{Duration, Instant};

use arch::ArchContext;
use interrupts::InterruptGuard;

use crate::context::Context;
use crate::error::Result;
use crate::scheduler::Scheduler;
use crate::thread::{ThreadEntry, ThreadState, Tid, MAIN_TID};

/// Starts the runtime on the calling OS thread, which becomes [`MAIN_TID`].
///
/// Every other operation initializes lazily, so calling this is only needed
/// to detect double initialization.
pub fn init() -> Result<()> {
    let _guard = InterruptGuard::new();
    Scheduler::init()
}

pub fn current_id() -> Tid {
    Scheduler::with_mut(|s| s.running()).unwrap_or(MAIN_TID)
}

/// Number of threads that have not been reclaimed, including the caller.
#[inline(always)]
pub fn thread_count() -> usize {
    Scheduler::with_mut(|s| s.thread_count()).unwrap_or(1)
}

pub fn thread_state(tid: Tid) -> Option<ThreadState> {
    Scheduler::with_mut(|s| s.state_of(tid))
        .unwrap_or_else(|| (tid == MAIN_TID).then_some(ThreadState::Running))
}

/// Creates a thread that runs `f` and then exits with
/// [`EXIT_CODE_NORMAL`](crate::EXIT_CODE_NORMAL). It is queued behind every
/// thread that is already ready.
pub fn create<F>(f: F) -> Result<Tid>
where
    F: FnOnce() + 'static,
{
    let _guard = InterruptGuard::new();
    let entry: ThreadEntry = Box::new(f);
    Scheduler::with_mut_or_init(|s| s.spawn(entry)).map_err(|(e, entry)| {
        // Captured values may have destructors that call back into the
        // runtime, so the body is dropped outside the borrow.
        drop(entry);
        e
    })
}

/// Gives up the processor to the head of the ready queue. Returns the thread
/// that was switched to, or the caller's own tid if nothing else was ready.
pub fn yield_now() -> Tid {
    let _guard = InterruptGuard::new();
    match Scheduler::with_mut_or_init(|s| s.next_ready().ok_or(s.running())) {
        Ok(next) => {
            switch_to(next);
            next
        }
        Err(current) => {
            Scheduler::with_mut(Scheduler::reap_zombies);
            current
        }
    }
}

/// Runs `tid` next, ahead of the ready queue. Yielding to oneself does
/// nothing.
pub fn yield_to(tid: Tid) -> Result<Tid> {
    let _guard = InterruptGuard::new();
    let is_self = Scheduler::with_mut_or_init(|s| {
        if tid == s.running() {
            return Ok(true);
        }
        s.unlink_ready(tid).map(|()| false)
    })?;

    if !is_self {
        switch_to(tid);
    }
    Ok(tid)
}

/// Ends the calling thread with `code`.
///
/// Joiners are woken first. If that leaves nothing runnable the whole process
/// exits with `code`.
pub fn exit(code: i32) -> ! {
    let _guard = InterruptGuard::new();
    let next = Scheduler::with_mut(|s| {
        s.exit_current(code);
        let next = s.next_ready();
        if next.is_none() {
            // Process exit runs thread-local destructors, which would unmap
            // the stack this thread is still running on.
            s.leak_running_stack();
        }
        next
    });

    match next {
        Some(Some(next)) => {
            switch_to(next);
            fatal("zombie thread was resumed")
        }
        Some(None) => {
            log::debug!("no runnable threads left, exiting process with {}", code);
            std::process::exit(code)
        }
        None => std::process::exit(code),
    }
}

/// Terminates another thread with [`EXIT_CODE_KILLED`](crate::EXIT_CODE_KILLED).
/// It never runs again; its joiners are woken.
pub fn kill(tid: Tid) -> Result<Tid> {
    let _guard = InterruptGuard::new();
    let entry = Scheduler::with_mut_or_init(|s| s.kill(tid))?;
    // The body of a thread that never ran may own values with destructors
    // that call back into the runtime.
    drop(entry);
    Ok(tid)
}

/// Busy-waits for `duration` without yielding.
pub fn spin(duration: Duration) {
    let start = Instant::now();
    while start.elapsed() < duration {
        core::hint::spin_loop();
    }
}

/// Transfers control to `target`, which must already be off every queue, and
/// frees whatever zombies are left once this thread is resumed.
///
/// Must run inside an atomic section. The scheduler is not borrowed across
/// the switch.
pub(crate) fn switch_to(target: Tid) {
    let Some(switch) = Scheduler::with_mut(|s| s.dispatch(target)) else {
        fatal("switch requested with no scheduler");
    };
    log::trace!("switching to thread {}", target);

    unsafe { Context::switch(switch.from, switch.to) };

    Scheduler::with_mut(Scheduler::reap_zombies);
}

/// Switches to the head of the ready queue, if any. Used after the caller has
/// blocked itself.
pub(crate) fn reschedule() -> Option<Tid> {
    let next = Scheduler::with_mut(|s| s.next_ready()).flatten()?;
    switch_to(next);
    Some(next)
}

#[cold]
pub(crate) fn fatal(msg: &str) -> ! {
    log::error!("fatal: {} (thread {})", msg, current_id());
    std::process::abort()
}
