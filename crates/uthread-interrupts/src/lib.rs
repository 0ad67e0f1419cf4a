//! Interrupt facility for the thread runtime.
//!
//! "Interrupts" are deliveries of [`PREEMPT_SIGNAL`] to the calling OS thread.
//! Disabling them blocks the signal in that thread's mask, which is what makes
//! a region atomic with respect to a forced yield.

pub mod mask;
pub mod timer;

pub use mask::{are_enabled, disable, enable, set_state, InterruptGuard, PREEMPT_SIGNAL};
pub use timer::{init, stop, TimerConfig, TimerConfigBuilder};

#[cfg(test)]
mod tests;
