use std::io;

use interrupts::TimerConfig;

use crate::ops::yield_now;
use crate::scheduler::Scheduler;

/// Arms the preemption timer: from now on the running thread is forced to
/// yield once per `config.interval` unless it is inside an atomic section.
pub fn enable_preemption(config: &TimerConfig) -> io::Result<()> {
    Scheduler::with_mut_or_init(|_| ());
    interrupts::init(config, forced_yield)
}

pub fn disable_preemption() -> io::Result<()> {
    interrupts::stop()
}

/// Timer tick hook. Runs in signal context with further ticks blocked.
fn forced_yield() {
    if !Scheduler::is_available() {
        return;
    }
    yield_now();
}
