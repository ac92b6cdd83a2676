//! The kernel/user ABI boundary.
//!
//! Everything here is shared, byte-for-byte, between the kernel crate and any user-space program
//! linking against it (in this codebase, the `userland` crate's `CowFork` library) — the Rust
//! equivalent of the single `inc/memlayout.h`/`inc/trap.h` header a C microkernel and its user
//! library both `#include`. Keeping it in one place means the two sides can never drift apart: a
//! change to the virtual memory map, the PTE bit assignment, or the syscall numbering only needs
//! to happen once.

pub mod layout;
pub mod pte;
pub mod syscall;
pub mod trapframe;
