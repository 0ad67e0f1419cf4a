use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::ops::{current_id, exit, fatal};
use crate::scheduler::Scheduler;
use crate::thread::{ThreadEntry, EXIT_CODE_NORMAL, EXIT_CODE_PANICKED};

/// First code every created thread runs. Entered by the first switch into
/// the thread, inside the switching thread's atomic section.
pub(crate) extern "C" fn thread_start() -> ! {
    Scheduler::with_mut(Scheduler::reap_zombies);

    let Some(entry) = Scheduler::with_mut(Scheduler::take_entry).flatten() else {
        fatal("thread started without a body");
    };

    interrupts::enable();
    let code = run(entry);
    exit(code)
}

fn run(entry: ThreadEntry) -> i32 {
    match panic::catch_unwind(AssertUnwindSafe(entry)) {
        Ok(()) => EXIT_CODE_NORMAL,
        Err(payload) => {
            log::error!("thread {} panicked: {}", current_id(), panic_message(&*payload));
            EXIT_CODE_PANICKED
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string payload"
    }
}
