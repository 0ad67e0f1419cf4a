//! Cooperative user-level threads.
//!
//! Every OS thread that touches this crate gets its own runtime. The OS
//! thread itself becomes thread [`MAIN_TID`]; threads made with [`create`]
//! run on their own stacks and take turns on that one OS thread, switching
//! only at [`yield_now`], [`yield_to`], [`sleep`], [`join`], [`exit`] or a
//! forced yield from the preemption timer.

pub mod context;
pub mod error;
pub mod ops;
pub mod preempt;
pub mod queue;
pub mod scheduler;
pub mod sync;
pub mod thread;
mod trampoline;

pub use context::Context;
pub use error::ThreadError;
pub use interrupts::{TimerConfig, TimerConfigBuilder};
pub use ops::{
    create, current_id, exit, init, kill, spin, thread_count, thread_state, yield_now, yield_to,
};
pub use preempt::{disable_preemption, enable_preemption};
pub use scheduler::{Scheduler, MAX_THREADS, THREAD_STACK_SIZE};
pub use sync::{
    join, sleep, wait_queue_create, wait_queue_destroy, wait_queue_len, wake_all, wake_next,
    WaitQueueId,
};
pub use thread::{
    ThreadControlBlock, ThreadState, Tid, EXIT_CODE_KILLED, EXIT_CODE_NORMAL, EXIT_CODE_PANICKED,
    MAIN_TID,
};
