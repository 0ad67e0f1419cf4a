use core::arch::naked_asm;

use foundation::utils::DownwardStack;
use foundation::ArchContext;

/// Number of 8-byte slots in a saved frame: x19-x28, x29, x30, d8-d15.
const FRAME_SLOTS: usize = 20;

/// Frame at `sp`, low to high:
///   x19 .. x28, x29 (fp), x30 (lr), d8 .. d15
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Context {
    sp: usize,
}

impl ArchContext for Context {
    fn empty() -> Self {
        Self { sp: 0 }
    }

    fn with_entry(stack_bottom: usize, stack_top: usize, entry: extern "C" fn() -> !) -> Option<Self> {
        let mut frame = DownwardStack::<usize>::new(stack_top, stack_bottom);
        let mut built = true;

        for slot in (0..FRAME_SLOTS).rev() {
            // slot 11 is x30: `ret` jumps there on first resumption.
            let value = if slot == 11 { entry as usize } else { 0 };
            built &= unsafe { frame.push(value) };
        }

        built.then(|| Self { sp: frame.sp() })
    }

    fn sp(&self) -> usize {
        self.sp
    }

    unsafe fn switch(from: *mut Self, to: *const Self) {
        unsafe { switch_context(from, to) }
    }
}

/// # Safety
/// See `ArchContext::switch`.
#[unsafe(naked)]
pub unsafe extern "C" fn switch_context(_from: *mut Context, _to: *const Context) {
    naked_asm!(
        "sub sp, sp, #0xa0",
        "stp x19, x20, [sp, #0x00]",
        "stp x21, x22, [sp, #0x10]",
        "stp x23, x24, [sp, #0x20]",
        "stp x25, x26, [sp, #0x30]",
        "stp x27, x28, [sp, #0x40]",
        "stp x29, x30, [sp, #0x50]",
        "stp d8, d9, [sp, #0x60]",
        "stp d10, d11, [sp, #0x70]",
        "stp d12, d13, [sp, #0x80]",
        "stp d14, d15, [sp, #0x90]",

        "mov x9, sp",
        "str x9, [x0]",
        "ldr x9, [x1]",
        "mov sp, x9",

        "ldp x19, x20, [sp, #0x00]",
        "ldp x21, x22, [sp, #0x10]",
        "ldp x23, x24, [sp, #0x20]",
        "ldp x25, x26, [sp, #0x30]",
        "ldp x27, x28, [sp, #0x40]",
        "ldp x29, x30, [sp, #0x50]",
        "ldp d8, d9, [sp, #0x60]",
        "ldp d10, d11, [sp, #0x70]",
        "ldp d12, d13, [sp, #0x80]",
        "ldp d14, d15, [sp, #0x90]",
        "add sp, sp, #0xa0",
        "ret",
    )
}
