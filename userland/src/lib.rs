//! `CowFork`: a user-space `fork()` built entirely over the syscall surface, plus the page-fault
//! upcall trampoline it lazily materializes private page copies through.
//!
//! Nothing in this crate runs in ring 0. It is a library a user program links against (the way
//! `lib/fork.c` and `lib/pfentry.S` are linked into every JOS user binary); producing an actual
//! bootable user ELF — its own entry trampoline, its own linker script — is loader territory and
//! stays out of this crate, matching the core's Non-goals around bootstrap assembly and the ELF
//! loader.
//!
//! Pure-logic pieces that don't need a live address space (the `duppage` permission decision
//! table) are additionally covered by ordinary host-runnable `#[cfg(test)]` unit tests, following
//! this codebase's own split between architecture-dependent and pure-logic code.

#![cfg_attr(not(test), no_std)]

pub mod fork;
pub mod pgfault;
pub mod selfmap;
pub mod syscall;

pub use fork::fork;
