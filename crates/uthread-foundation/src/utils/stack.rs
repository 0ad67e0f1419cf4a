use core::marker::PhantomData;
use core::mem;
use core::ptr;

/// Builds the initial frame of a thread stack, growing toward lower addresses.
///
/// The starting pointer is aligned down to the ABI stack alignment of the
/// target, so whatever is pushed first sits directly below an aligned boundary.
pub struct DownwardStack<T> {
    sp: usize,
    limit: usize,
    _marker: PhantomData<T>,
}

cfg_if::cfg_if! {
    if #[cfg(any(
        target_arch = "x86_64",
        target_arch = "aarch64",
        target_arch = "riscv64",
        target_arch = "x86",
    ))] {
        /// Stack alignment required at a call boundary.
        pub const ABI_STACK_ALIGN: usize = 16;
    } else {
        /// Stack alignment required at a call boundary.
        pub const ABI_STACK_ALIGN: usize = 2 * mem::size_of::<usize>();
    }
}

impl<T> DownwardStack<T> {
    /// `top` is one past the highest usable byte, `limit` the lowest usable byte.
    #[inline]
    pub fn new(top: usize, limit: usize) -> Self {
        let align = mem::align_of::<T>().max(ABI_STACK_ALIGN);
        Self {
            sp: top & !(align - 1),
            limit,
            _marker: PhantomData,
        }
    }

    /// Returns false, leaving the stack untouched, if `value` would cross `limit`.
    ///
    /// # Safety
    /// The range `[limit, top)` given to `new` must be writable.
    #[inline]
    pub unsafe fn push(&mut self, value: T) -> bool {
        let Some(next) = self.sp.checked_sub(mem::size_of::<T>()) else {
            return false;
        };
        if next < self.limit {
            return false;
        }
        self.sp = next;
        unsafe {
            ptr::write(self.sp as *mut T, value);
        }
        true
    }

    #[inline]
    pub fn sp(&self) -> usize {
        self.sp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(align(16))]
    struct Buf([usize; 16]);

    #[test]
    fn test_initial_sp_is_aligned() {
        let mut buf = Buf([0; 16]);
        let base = buf.0.as_mut_ptr() as usize;
        let top = base + mem::size_of::<Buf>() - 8;
        let stack = DownwardStack::<usize>::new(top, base);
        assert_eq!(stack.sp() % ABI_STACK_ALIGN, 0);
        assert!(stack.sp() <= top);
    }

    #[test]
    fn test_push_writes_downward() {
        let mut buf = Buf([0; 16]);
        let base = buf.0.as_mut_ptr() as usize;
        let top = base + mem::size_of::<Buf>();
        let mut stack = DownwardStack::<usize>::new(top, base);

        unsafe {
            assert!(stack.push(0xAA));
            assert!(stack.push(0xBB));
        }
        assert_eq!(stack.sp(), top - 2 * mem::size_of::<usize>());
        assert_eq!(buf.0[15], 0xAA);
        assert_eq!(buf.0[14], 0xBB);
    }

    #[test]
    fn test_push_stops_at_limit() {
        let mut buf = Buf([0; 16]);
        let base = buf.0.as_mut_ptr() as usize;
        let top = base + mem::size_of::<Buf>();
        let mut stack = DownwardStack::<usize>::new(top, top - 2 * mem::size_of::<usize>());

        unsafe {
            assert!(stack.push(1));
            assert!(stack.push(2));
            assert!(!stack.push(3));
        }
        assert_eq!(buf.0[13], 0);
    }
}
