use std::io;
use std::mem;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::time::Duration;

use derive_builder::Builder;
use libc::c_int;

use crate::mask::{self, PREEMPT_SIGNAL};

/// Periodic preemption timer settings.
#[derive(Clone, Debug, Builder)]
#[builder(default)]
pub struct TimerConfig {
    /// Time between forced yields.
    pub interval: Duration,
    /// Restart system calls interrupted by the timer instead of failing them
    /// with `EINTR`.
    pub restart_syscalls: bool,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(10),
            restart_syscalls: true,
        }
    }
}

static TICK_HOOK: AtomicPtr<()> = AtomicPtr::new(ptr::null_mut());

extern "C" fn on_preempt_signal(_signo: c_int) {
    let hook = TICK_HOOK.load(Ordering::Acquire);
    if hook.is_null() {
        return;
    }
    let hook = unsafe { mem::transmute::<*mut (), fn()>(hook) };
    hook();
}

fn to_timeval(d: Duration) -> libc::timeval {
    libc::timeval {
        tv_sec: d.as_secs() as libc::time_t,
        tv_usec: d.subsec_micros() as libc::suseconds_t,
    }
}

fn arm(interval: Duration) -> io::Result<()> {
    let value = libc::itimerval {
        it_interval: to_timeval(interval),
        it_value: to_timeval(interval),
    };
    if unsafe { libc::setitimer(libc::ITIMER_REAL, &value, ptr::null_mut()) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Installs the preemption handler, arms the timer and enables interrupts in
/// the calling OS thread. `on_tick` runs inside the signal handler with
/// further ticks blocked.
///
/// The timer signal is process-directed: programs that use preemption should
/// keep the runtime on the process's only signal-accepting thread.
pub fn init(config: &TimerConfig, on_tick: fn()) -> io::Result<()> {
    if config.interval < Duration::from_micros(1) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "preemption interval must be at least one microsecond",
        ));
    }

    let prior = mask::disable();
    TICK_HOOK.store(on_tick as *mut (), Ordering::Release);

    let mut action: libc::sigaction = unsafe { mem::zeroed() };
    action.sa_sigaction = on_preempt_signal as extern "C" fn(c_int) as libc::sighandler_t;
    action.sa_flags = if config.restart_syscalls { libc::SA_RESTART } else { 0 };
    unsafe { libc::sigemptyset(&mut action.sa_mask) };

    if unsafe { libc::sigaction(PREEMPT_SIGNAL, &action, ptr::null_mut()) } != 0 {
        let err = io::Error::last_os_error();
        mask::set_state(prior);
        return Err(err);
    }

    if let Err(err) = arm(config.interval) {
        mask::set_state(prior);
        return Err(err);
    }

    log::debug!("preemption timer armed every {:?}", config.interval);
    mask::enable();
    Ok(())
}

/// Disarms the timer. The handler stays installed so a tick already in
/// flight is still absorbed.
pub fn stop() -> io::Result<()> {
    let value = libc::itimerval {
        it_interval: to_timeval(Duration::ZERO),
        it_value: to_timeval(Duration::ZERO),
    };
    if unsafe { libc::setitimer(libc::ITIMER_REAL, &value, ptr::null_mut()) } != 0 {
        return Err(io::Error::last_os_error());
    }
    TICK_HOOK.store(ptr::null_mut(), Ordering::Release);
    Ok(())
}
