use core::cell::RefCell;

/// Lazily populated global slot, meant to live inside a `thread_local!`.
///
/// Access is closure-scoped so a borrow can never outlive a context switch:
/// callers copy out what they need, release the slot, then switch.
pub struct GlobalOption<T> {
    inner: RefCell<Option<T>>,
}

impl<T> GlobalOption<T> {
    pub const fn none() -> Self {
        Self {
            inner: RefCell::new(None),
        }
    }

    /// Stores `value`, returning whatever was there before.
    pub fn set(&self, value: T) -> Option<T> {
        self.inner.borrow_mut().replace(value)
    }

    pub fn take(&self) -> Option<T> {
        self.inner.borrow_mut().take()
    }

    pub fn is_some(&self) -> bool {
        self.inner.borrow().is_some()
    }

    /// True when populated and not currently borrowed. Safe to call from a
    /// context that may have interrupted a borrow holder.
    pub fn is_available(&self) -> bool {
        matches!(self.inner.try_borrow_mut(), Ok(slot) if slot.is_some())
    }

    /// # Panics
    /// If the slot is already borrowed (re-entrant access).
    #[inline(always)]
    pub fn with_some_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.inner.borrow_mut().as_mut().map(f)
    }

    /// Like `with_some_mut`, populating the slot with `init()` first if empty.
    ///
    /// # Panics
    /// If the slot is already borrowed (re-entrant access).
    #[inline(always)]
    pub fn with_or_init_mut<R>(&self, init: impl FnOnce() -> T, f: impl FnOnce(&mut T) -> R) -> R {
        let mut slot = self.inner.borrow_mut();
        f(slot.get_or_insert_with(init))
    }
}

impl<T> Default for GlobalOption<T> {
    fn default() -> Self {
        Self::none()
    }
}
