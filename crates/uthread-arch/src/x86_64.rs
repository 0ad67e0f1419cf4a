use core::arch::naked_asm;

use foundation::utils::DownwardStack;
use foundation::ArchContext;

/// MXCSR in the low half, x87 control word above it: the power-on defaults.
const DEFAULT_FP_CONTROL: usize = (0x037F << 32) | 0x1F80;

/// Callee-saved state lives on the thread's own stack; the context is only
/// the stack pointer that finds it.
///
/// Frame at `rsp`, low to high:
///   mxcsr | fpcw, r15, r14, r13, r12, rbx, rbp, return address
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Context {
    rsp: usize,
}

impl ArchContext for Context {
    fn empty() -> Self {
        Self { rsp: 0 }
    }

    fn with_entry(stack_bottom: usize, stack_top: usize, entry: extern "C" fn() -> !) -> Option<Self> {
        let mut frame = DownwardStack::<usize>::new(stack_top, stack_bottom);

        // `ret` into `entry` must leave rsp == 8 (mod 16), as if it had been
        // called, so an unused return slot sits above the entry address.
        let built = unsafe {
            frame.push(0)
                && frame.push(entry as usize)
                && frame.push(0) // rbp
                && frame.push(0) // rbx
                && frame.push(0) // r12
                && frame.push(0) // r13
                && frame.push(0) // r14
                && frame.push(0) // r15
                && frame.push(DEFAULT_FP_CONTROL)
        };

        built.then(|| Self { rsp: frame.sp() })
    }

    fn sp(&self) -> usize {
        self.rsp
    }

    unsafe fn switch(from: *mut Self, to: *const Self) {
        unsafe { switch_context(from, to) }
    }
}

/// Saves the callee-saved registers of the caller on its stack, stores the
/// resulting stack pointer in `from`, and resumes the frame recorded in `to`.
///
/// # Safety
/// See `ArchContext::switch`.
#[unsafe(naked)]
pub unsafe extern "C" fn switch_context(_from: *mut Context, _to: *const Context) {
    naked_asm!(
        "push rbp",
        "push rbx",
        "push r12",
        "push r13",
        "push r14",
        "push r15",
        "sub rsp, 8",
        "stmxcsr [rsp]",
        "fnstcw [rsp + 4]",

        "mov [rdi], rsp",
        "mov rsp, [rsi]",

        "ldmxcsr [rsp]",
        "fldcw [rsp + 4]",
        "add rsp, 8",
        "pop r15",
        "pop r14",
        "pop r13",
        "pop r12",
        "pop rbx",
        "pop rbp",
        "ret",
    )
}
