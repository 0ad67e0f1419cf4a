use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::ptr;

use libc::c_int;

/// Signal whose delivery forces a yield.
pub const PREEMPT_SIGNAL: c_int = libc::SIGALRM;

fn preempt_set() -> libc::sigset_t {
    let mut set = MaybeUninit::<libc::sigset_t>::uninit();
    unsafe {
        libc::sigemptyset(set.as_mut_ptr());
        libc::sigaddset(set.as_mut_ptr(), PREEMPT_SIGNAL);
        set.assume_init()
    }
}

/// Applies `how` to the preemption signal and reports whether it was
/// deliverable beforehand.
fn update_mask(how: c_int, set: *const libc::sigset_t) -> bool {
    let mut old = MaybeUninit::<libc::sigset_t>::uninit();
    let rc = unsafe { libc::pthread_sigmask(how, set, old.as_mut_ptr()) };
    debug_assert_eq!(rc, 0, "pthread_sigmask rejected its arguments");
    unsafe { libc::sigismember(old.as_ptr(), PREEMPT_SIGNAL) == 0 }
}

/// Blocks forced yields. Returns the prior state.
#[inline]
pub fn disable() -> bool {
    let set = preempt_set();
    update_mask(libc::SIG_BLOCK, &set)
}

/// Allows forced yields. Returns the prior state.
#[inline]
pub fn enable() -> bool {
    let set = preempt_set();
    update_mask(libc::SIG_UNBLOCK, &set)
}

/// Restores a state previously returned by `disable` or `enable`.
#[inline]
pub fn set_state(enabled: bool) -> bool {
    if enabled {
        enable()
    } else {
        disable()
    }
}

pub fn are_enabled() -> bool {
    update_mask(libc::SIG_BLOCK, ptr::null())
}

/// An atomic section. Forced yields are blocked from construction until drop,
/// after which the state found at construction is restored, so sections nest.
#[must_use = "dropping the guard ends the atomic section"]
pub struct InterruptGuard {
    prior: bool,
    // The mask belongs to the OS thread that built the guard.
    _not_send: PhantomData<*const ()>,
}

impl InterruptGuard {
    #[inline]
    pub fn new() -> Self {
        Self {
            prior: disable(),
            _not_send: PhantomData,
        }
    }

    /// Whether interrupts were enabled when the section began.
    pub fn prior(&self) -> bool {
        self.prior
    }
}

impl Default for InterruptGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InterruptGuard {
    #[inline]
    fn drop(&mut self) {
        set_state(self.prior);
    }
}
