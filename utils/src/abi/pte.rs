//! Page-table entry flag bits, shared between the kernel's page-table code and any syscall
//! caller that needs to build or inspect a permission word (in this codebase, `CowFork`'s
//! `duppage`, which reads its own PTEs straight out of the self-map).

/// Present.
pub const PTE_P: u32 = 0x001;
/// Writable.
pub const PTE_W: u32 = 0x002;
/// Accessible from user mode.
pub const PTE_U: u32 = 0x004;
/// Explicitly shared: never promoted to copy-on-write by `duppage`.
pub const PTE_SHARE: u32 = 0x400;
/// Copy-on-write: present but read-only, materialized privately on the next write fault.
pub const PTE_COW: u32 = 0x800;
/// The mask of bits a user syscall is permitted to set on a fresh mapping.
pub const PTE_SYSCALL: u32 = PTE_P | PTE_U | PTE_W | PTE_SHARE | PTE_COW;
