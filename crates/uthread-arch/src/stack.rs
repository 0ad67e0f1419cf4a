use std::io;
use std::ptr::{self, NonNull};

/// An anonymous mapping used as one thread's call stack, with an inaccessible
/// guard page below it so an overflow faults instead of running into a
/// neighbouring allocation.
#[derive(Debug)]
pub struct Stack {
    base: NonNull<u8>,
    mapped: usize,
    guard: usize,
}

fn page_size() -> usize {
    match unsafe { libc::sysconf(libc::_SC_PAGESIZE) } {
        n if n > 0 => n as usize,
        _ => 4096,
    }
}

impl Stack {
    /// Maps at least `size` usable bytes, rounded up to whole pages.
    pub fn new(size: usize) -> io::Result<Self> {
        let page = page_size();
        let usable = size
            .checked_next_multiple_of(page)
            .filter(|&n| n > 0)
            .ok_or_else(|| io::Error::from(io::ErrorKind::InvalidInput))?;
        let mapped = usable
            .checked_add(page)
            .ok_or_else(|| io::Error::from(io::ErrorKind::InvalidInput))?;

        let addr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                mapped,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }

        if unsafe { libc::mprotect(addr, page, libc::PROT_NONE) } != 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::munmap(addr, mapped) };
            return Err(err);
        }

        log::trace!("mapped {} byte stack at {:p}", usable, addr);

        Ok(Self {
            base: unsafe { NonNull::new_unchecked(addr.cast()) },
            mapped,
            guard: page,
        })
    }

    /// Lowest usable address.
    pub fn bottom(&self) -> usize {
        self.base.as_ptr() as usize + self.guard
    }

    /// One past the highest usable address.
    pub fn top(&self) -> usize {
        self.base.as_ptr() as usize + self.mapped
    }

    pub fn size(&self) -> usize {
        self.mapped - self.guard
    }

    pub fn contains(&self, addr: usize) -> bool {
        (self.bottom()..self.top()).contains(&addr)
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.base.as_ptr().cast(), self.mapped);
        }
    }
}
