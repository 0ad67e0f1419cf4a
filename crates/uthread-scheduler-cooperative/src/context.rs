use arch::{ArchContext, Stack};

pub type Context = arch::Context;

/// Builds the first context of a new thread: resuming it runs `entry` on
/// `stack`. `None` if the stack cannot hold the initial frame.
pub(crate) fn make_context(stack: &Stack, entry: extern "C" fn() -> !) -> Option<Context> {
    Context::with_entry(stack.bottom(), stack.top(), entry)
}
