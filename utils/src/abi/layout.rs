//! The fixed virtual memory map, to the extent it is visible from user space.
//!
//! These are the constants `CowFork`'s self-map walk needs to enumerate its own address space
//! (`UVPT`, `UTOP`) and the ones its exception-stack setup needs (`UXSTACKTOP`, `UXSTACKSIZE`).
//! Kernel-only constants that never cross the ABI boundary (`NENV`, the per-CPU kernel stack
//! region, the physical direct map base) stay in `kernel::memory::layout`, which re-exports this
//! module's constants alongside its own so kernel code has a single `layout` module to import
//! from.

/// The size of a page, in bytes.
pub const PAGE_SIZE: usize = 4096;
/// `log2(PAGE_SIZE)`.
pub const PAGE_SHIFT: usize = 12;

/// The number of entries in a page table or a page directory.
pub const NPTENTRIES: usize = 1024;
/// The span of a single page table page (equivalently, of a single page directory entry).
pub const PTSIZE: usize = PAGE_SIZE * NPTENTRIES;

/// The upper limit of user-reachable (read-only above `UTOP`) address space.
///
/// Derived the same way the kernel derives it (below [`MMIOBASE`]), but user space never
/// computes `MMIOBASE`/`MMIOLIM` itself — it only ever needs the result.
pub const ULIM: usize = 0xDF80_0000;

/// The virtual base of the self-map: each PDE here reads back that env's own page table.
pub const UVPT: usize = ULIM - PTSIZE;
/// The read-only projection of the physical page metadata table.
pub const UPAGES: usize = UVPT - PTSIZE;
/// The read-only projection of the environment table.
pub const UENVS: usize = UPAGES - PTSIZE;
/// The virtual-syscall page, read-only and updated by the kernel without a trap.
pub const UVSYS: usize = UENVS - PTSIZE;

/// The split between the identical upper mapping and the environment-private lower mapping.
pub const UTOP: usize = UVSYS;
/// The top of the one-page user exception stack, used by the page-fault upcall.
pub const UXSTACKTOP: usize = UTOP;
/// The size of the user exception stack.
pub const UXSTACKSIZE: usize = PAGE_SIZE;

/// The size of the normal user stack.
pub const USTACKSIZE: usize = 2 * PAGE_SIZE;
/// The top of the normal user stack. One guard page separates it from the exception stack.
pub const USTACKTOP: usize = UTOP - USTACKSIZE - UXSTACKSIZE - PAGE_SIZE;

/// The conventional load address for the first loadable segment of a user binary.
pub const UTEXT: usize = 2 * PTSIZE;
/// Scratch virtual address range reserved for transient kernel-on-behalf-of-user mappings.
pub const UTEMP: usize = PTSIZE;
/// The page-fault scratch page used by the copy-on-write handler, the last page of [`UTEMP`]'s
/// span.
pub const PFTEMP: usize = UTEMP + PTSIZE - PAGE_SIZE;

const _: () = assert!(USTACKTOP + USTACKSIZE + UXSTACKSIZE + PAGE_SIZE == UTOP);
const _: () = assert!(UXSTACKTOP + UXSTACKSIZE - PAGE_SIZE == UTOP);
const _: () = assert!(PFTEMP + PAGE_SIZE == UTEMP + PTSIZE);
const _: () = assert!(NPTENTRIES.is_power_of_two());
