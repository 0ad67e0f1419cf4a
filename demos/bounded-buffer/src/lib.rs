//! Bounded producer/consumer buffer on cooperative threads.
//!
//! Producers sleep on `not_full` while the buffer is at capacity; consumers
//! sleep on `not_empty` while it is drained. Every transfer wakes one thread
//! on the opposite side.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use derive_builder::Builder;
use interrupts::InterruptGuard;
use scheduler_cooperative::{
    create, current_id, sleep, wait_queue_create, wait_queue_destroy, wake_all, wake_next,
    ThreadError, Tid, WaitQueueId,
};

#[derive(Clone, Debug, Builder)]
#[builder(default)]
pub struct DemoConfig {
    pub producers: usize,
    pub consumers: usize,
    pub items_per_producer: usize,
    /// Buffer slots. Zero is treated as one.
    pub capacity: usize,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            producers: 3,
            consumers: 2,
            items_per_producer: 20,
            capacity: 4,
        }
    }
}

struct Inner<T> {
    buf: RefCell<VecDeque<T>>,
    capacity: usize,
    closed: Cell<bool>,
    high_water: Cell<usize>,
    not_full: WaitQueueId,
    not_empty: WaitQueueId,
}

/// A FIFO of at most `capacity` values shared by the threads of one runtime.
pub struct Channel<T> {
    inner: Rc<Inner<T>>,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Channel<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Rc::new(Inner {
                buf: RefCell::new(VecDeque::with_capacity(capacity)),
                capacity,
                closed: Cell::new(false),
                high_water: Cell::new(0),
                not_full: wait_queue_create(),
                not_empty: wait_queue_create(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.buf.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Most values the buffer ever held at once.
    pub fn high_water(&self) -> usize {
        self.inner.high_water.get()
    }

    /// Appends `value`, sleeping while the buffer is full.
    pub fn send(&self, value: T) -> Result<(), ThreadError> {
        let _guard = InterruptGuard::new();
        let inner = &*self.inner;

        while inner.buf.borrow().len() >= inner.capacity {
            sleep(inner.not_full)?;
        }

        let depth = {
            let mut buf = inner.buf.borrow_mut();
            buf.push_back(value);
            buf.len()
        };
        inner.high_water.set(inner.high_water.get().max(depth));
        wake_next(inner.not_empty)?;
        Ok(())
    }

    /// Takes the oldest value, sleeping while the buffer is empty. `None`
    /// once the channel is closed and drained.
    pub fn recv(&self) -> Result<Option<T>, ThreadError> {
        let _guard = InterruptGuard::new();
        let inner = &*self.inner;

        loop {
            let next = inner.buf.borrow_mut().pop_front();
            if let Some(value) = next {
                wake_next(inner.not_full)?;
                return Ok(Some(value));
            }
            if inner.closed.get() {
                return Ok(None);
            }
            sleep(inner.not_empty)?;
        }
    }

    /// Lets consumers drain what is left and then see the end of the stream.
    pub fn close(&self) -> Result<usize, ThreadError> {
        let _guard = InterruptGuard::new();
        self.inner.closed.set(true);
        wake_all(self.inner.not_empty)
    }

    /// Releases both wait queues. Fails while any thread still sleeps on one.
    pub fn destroy(self) -> Result<(), ThreadError> {
        wait_queue_destroy(self.inner.not_full)?;
        wait_queue_destroy(self.inner.not_empty)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub produced: usize,
    pub consumed: usize,
    pub expected_sum: u64,
    pub sum: u64,
    /// Values taken by each consumer, in creation order.
    pub per_consumer: Vec<(Tid, usize)>,
    pub high_water: usize,
    pub capacity: usize,
    /// Threads that exited with anything but the normal code.
    pub failed_threads: usize,
}

impl Summary {
    pub fn is_consistent(&self) -> bool {
        self.consumed == self.produced
            && self.sum == self.expected_sum
            && self.high_water <= self.capacity
            && self.failed_threads == 0
    }
}

/// Counts a group of threads down to zero. Finished threads may be reclaimed
/// at any time, so the waiter learns their outcome here rather than by
/// joining each one.
pub struct Completion {
    remaining: Cell<usize>,
    failed: Cell<usize>,
    done: WaitQueueId,
}

impl Completion {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            remaining: Cell::new(0),
            failed: Cell::new(0),
            done: wait_queue_create(),
        })
    }

    /// Creates a thread running `body` that is counted until it returns or
    /// panics. An `Err` or a panic counts as a failure.
    pub fn spawn<F>(self: &Rc<Self>, body: F) -> Result<Tid, ThreadError>
    where
        F: FnOnce() -> Result<(), ThreadError> + 'static,
    {
        let finish = Finish {
            completion: Rc::clone(self),
            ok: true,
        };
        self.remaining.set(self.remaining.get() + 1);
        create(move || {
            let mut finish = finish;
            if let Err(e) = body() {
                log::error!("thread {} failed: {}", current_id(), e);
                finish.ok = false;
            }
        })
    }

    fn finish(&self, ok: bool) {
        let _guard = InterruptGuard::new();
        if !ok {
            self.failed.set(self.failed.get() + 1);
        }
        self.remaining.set(self.remaining.get() - 1);
        if self.remaining.get() == 0 {
            let _ = wake_next(self.done);
        }
    }

    /// Sleeps until every counted thread has finished. Returns how many
    /// failed.
    pub fn wait(&self) -> Result<usize, ThreadError> {
        let _guard = InterruptGuard::new();
        while self.remaining.get() > 0 {
            sleep(self.done)?;
        }
        Ok(self.failed.get())
    }

    pub fn destroy(&self) -> Result<(), ThreadError> {
        wait_queue_destroy(self.done)
    }
}

/// Reports one thread's outcome when dropped, including during unwinding
/// and when the thread body is dropped without ever running.
struct Finish {
    completion: Rc<Completion>,
    ok: bool,
}

impl Drop for Finish {
    fn drop(&mut self) {
        self.completion.finish(self.ok && !std::thread::panicking());
    }
}

/// Runs one producer/consumer round on the calling OS thread's runtime.
pub fn run(config: &DemoConfig) -> Result<Summary, ThreadError> {
    let channel: Channel<u64> = Channel::new(config.capacity);
    let received: Rc<RefCell<Vec<(Tid, u64)>>> = Rc::new(RefCell::new(Vec::new()));
    let items = config.items_per_producer;

    let producers_done = Completion::new();
    let producers = (0..config.producers)
        .map(|p| {
            let channel = channel.clone();
            producers_done.spawn(move || {
                for i in 0..items {
                    channel.send((p * items + i) as u64)?;
                }
                Ok(())
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let consumers_done = Completion::new();
    let consumers = (0..config.consumers)
        .map(|_| {
            let channel = channel.clone();
            let received = received.clone();
            consumers_done.spawn(move || {
                while let Some(value) = channel.recv()? {
                    received.borrow_mut().push((current_id(), value));
                }
                Ok(())
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    log::info!(
        "started {} producers and {} consumers over {} slots",
        producers.len(),
        consumers.len(),
        channel.inner.capacity
    );

    let mut failed_threads = producers_done.wait()?;
    channel.close()?;
    failed_threads += consumers_done.wait()?;
    producers_done.destroy()?;
    consumers_done.destroy()?;

    let produced = config.producers * items;
    let received = received.borrow();
    let per_consumer = consumers
        .iter()
        .map(|&tid| (tid, received.iter().filter(|(t, _)| *t == tid).count()))
        .collect();

    let summary = Summary {
        produced,
        consumed: received.len(),
        expected_sum: (0..produced as u64).sum(),
        sum: received.iter().map(|&(_, v)| v).sum(),
        per_consumer,
        high_water: channel.high_water(),
        capacity: channel.inner.capacity,
        failed_threads,
    };
    channel.destroy()?;
    Ok(summary)
}
