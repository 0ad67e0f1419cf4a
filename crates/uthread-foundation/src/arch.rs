/// Saved execution state of one logical thread.
///
/// Implemented once per architecture by the arch crate. The scheduler only
/// sees this trait; register layout stays behind it.
pub trait ArchContext: Sized {
    /// A context that has never been captured. Used for the thread that is
    /// already running when the runtime starts, and for free slots.
    fn empty() -> Self;

    /// A context whose first resumption enters `entry` with the stack pointer
    /// just below `stack_top`, aligned for the platform ABI. `None` if the
    /// initial frame does not fit above `stack_bottom`.
    fn with_entry(stack_bottom: usize, stack_top: usize, entry: extern "C" fn() -> !) -> Option<Self>;

    fn sp(&self) -> usize;

    /// Saves the caller into `from` and resumes `to`. Returns when some other
    /// thread later switches back into `from`.
    ///
    /// # Safety
    /// Both pointers must be valid for the whole call. `to` must hold a
    /// context produced by `with_entry` or by a previous `switch`, and the
    /// stack it refers to must still be mapped.
    unsafe fn switch(from: *mut Self, to: *const Self);
}
