use thiserror::Error;

use crate::scheduler::MAX_THREADS;
use crate::thread::Tid;

pub type Result<T> = std::result::Result<T, ThreadError>;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadError {
    #[error("all {} thread slots are in use", MAX_THREADS)]
    OutOfThreads,

    #[error("could not allocate a thread stack")]
    OutOfMemory,

    #[error("thread id {0} is out of range")]
    InvalidTid(Tid),

    #[error("thread {0} is not alive")]
    ThreadNotAlive(Tid),

    #[error("thread {0} cannot be joined")]
    ThreadNotJoinable(Tid),

    #[error("thread {0} is not ready to run")]
    ThreadNotReady(Tid),

    #[error("thread {0} cannot target itself")]
    ThreadIsSelf(Tid),

    #[error("no other thread is runnable")]
    NoOtherRunnableThread,

    #[error("wait queue still has blocked threads")]
    QueueNotEmpty,

    #[error("wait queue handle is stale or unknown")]
    InvalidQueue,

    #[error("thread runtime is already initialized on this OS thread")]
    AlreadyInitialized,
}
