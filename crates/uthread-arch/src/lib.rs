//! Architecture layer: one `Context` type per supported target, implementing
//! `foundation::ArchContext`, plus the guarded `Stack` new threads run on.

use cfg_if::cfg_if;

pub mod stack;

cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        mod x86_64;
        pub use crate::x86_64::{switch_context, Context};
    } else if #[cfg(target_arch = "aarch64")] {
        mod aarch64;
        pub use crate::aarch64::{switch_context, Context};
    } else {
        compile_error!("uthread-arch supports x86_64 and aarch64 only");
    }
}

pub use foundation::ArchContext;
pub use stack::Stack;
