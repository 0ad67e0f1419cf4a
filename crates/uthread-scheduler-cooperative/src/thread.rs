use arch::{ArchContext, Stack};

use crate::context::Context;
use crate::queue::TidQueue;

pub type Tid = usize;

/// The thread that was running when the runtime started. It keeps the OS
/// thread's own stack.
pub const MAIN_TID: Tid = 0;

pub const EXIT_CODE_NORMAL: i32 = 0;
pub const EXIT_CODE_KILLED: i32 = -9;
pub const EXIT_CODE_PANICKED: i32 = -6;

pub(crate) type ThreadEntry = Box<dyn FnOnce() + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    Free,
    Ready,
    Running,
    Blocked,
    Zombie,
}

impl ThreadState {
    pub fn is_alive(self) -> bool {
        matches!(self, Self::Ready | Self::Running | Self::Blocked)
    }
}

/// The queue a blocked thread is linked into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WaitChannel {
    /// A user wait queue, by registry index.
    Queue(usize),
    /// The joiners of another thread.
    Joiners(Tid),
}

pub struct ThreadControlBlock {
    pub tid: Tid,
    pub state: ThreadState,

    pub(crate) context: Context,
    pub(crate) stack: Option<Stack>,
    pub(crate) entry: Option<ThreadEntry>,

    /// Set once, when the thread becomes a zombie.
    pub exit_code: Option<i32>,

    pub(crate) joiners: TidQueue,
    /// Threads inside `join` on this one. The slot is not reclaimed while
    /// this is nonzero.
    pub pending_joiners: usize,

    pub(crate) wait_channel: Option<WaitChannel>,
    /// The thread whose `pending_joiners` this one is counted in.
    pub(crate) joining: Option<Tid>,
}

impl ThreadControlBlock {
    pub fn free(tid: Tid) -> Self {
        Self {
            tid,
            state: ThreadState::Free,
            context: Context::empty(),
            stack: None,
            entry: None,
            exit_code: None,
            joiners: TidQueue::new(),
            pending_joiners: 0,
            wait_channel: None,
            joining: None,
        }
    }

    /// The thread that is already executing when the runtime starts.
    pub(crate) fn main() -> Self {
        Self {
            state: ThreadState::Running,
            ..Self::free(MAIN_TID)
        }
    }

    /// Returns the slot to `Free`, unmapping its stack.
    pub(crate) fn reset(&mut self) {
        *self = Self::free(self.tid);
    }

    pub fn stack_size(&self) -> Option<usize> {
        self.stack.as_ref().map(Stack::size)
    }
}

impl core::fmt::Debug for ThreadControlBlock {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ThreadControlBlock")
            .field("tid", &self.tid)
            .field("state", &self.state)
            .field("sp", &self.context.sp())
            .field("exit_code", &self.exit_code)
            .field("pending_joiners", &self.pending_joiners)
            .field("wait_channel", &self.wait_channel)
            .finish_non_exhaustive()
    }
}
