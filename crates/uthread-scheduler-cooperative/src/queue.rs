//! FIFO queues of tids, linked through one `next` slot per tid.
//!
//! The links live in a table owned by the scheduler, so a thread can sit in at
//! most one queue at a time: there is only one link to thread it through.

use crate::thread::Tid;

/// `links[tid]` is the successor of `tid` in whichever queue holds it.
pub type Links = [Option<Tid>];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TidQueue {
    head: Option<Tid>,
    tail: Option<Tid>,
    len: usize,
}

impl TidQueue {
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn peek(&self) -> Option<Tid> {
        self.head
    }

    pub fn enqueue(&mut self, links: &mut Links, tid: Tid) {
        links[tid] = None;
        match self.tail {
            Some(tail) => links[tail] = Some(tid),
            None => self.head = Some(tid),
        }
        self.tail = Some(tid);
        self.len += 1;
    }

    pub fn dequeue(&mut self, links: &mut Links) -> Option<Tid> {
        let head = self.head?;
        self.head = links[head].take();
        if self.head.is_none() {
            self.tail = None;
        }
        self.len -= 1;
        Some(head)
    }

    /// Unlinks `tid` from anywhere in the queue. Returns false if it was not
    /// a member.
    pub fn remove(&mut self, links: &mut Links, tid: Tid) -> bool {
        let mut prev: Option<Tid> = None;
        let mut cursor = self.head;

        while let Some(current) = cursor {
            if current == tid {
                let next = links[current].take();
                match prev {
                    Some(p) => links[p] = next,
                    None => self.head = next,
                }
                if self.tail == Some(tid) {
                    self.tail = prev;
                }
                self.len -= 1;
                return true;
            }
            prev = cursor;
            cursor = links[current];
        }
        false
    }

    pub fn contains(&self, links: &Links, tid: Tid) -> bool {
        self.iter(links).any(|t| t == tid)
    }

    pub fn iter<'a>(&self, links: &'a Links) -> impl Iterator<Item = Tid> + 'a {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let current = cursor?;
            cursor = links[current];
            Some(current)
        })
    }
}
