/*
 * Copyright 2024 Luc Lenôtre
 *
 * This file is part of Maestro.
 *
 * Maestro is free software: you can redistribute it and/or modify it under the
 * terms of the GNU General Public License as published by the Free Software
 * Foundation, either version 3 of the License, or (at your option) any later
 * version.
 *
 * Maestro is distributed in the hope that it will be useful, but WITHOUT ANY
 * WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR
 * A PARTICULAR PURPOSE. See the GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License along with
 * Maestro. If not, see <https://www.gnu.org/licenses/>.
 */

//! The fixed virtual memory map, expressed as a ladder of constants derived from one another.
//!
//! Everything above `UTOP` is identical across every environment's page directory, save for the
//! self-map slot which always points back at that environment's own page directory. Everything
//! below is private to the environment and demand-built by [`crate::memory::vmem`].
//!
//! The part of this map that a user-space program (in this codebase, `userland`'s `CowFork`) can
//! see or rely on lives in [`utils::abi::layout`] instead, re-exported here so kernel code has a
//! single `layout` module to import from. Only the purely kernel-side constants (per-CPU stack
//! placement, the env table's capacity) are defined in this file.

pub use utils::abi::layout::*;

/// The maximum number of live environments.
pub const NENV: usize = 1024;
/// `log2(NENV)`: the width of the index portion of an environment id.
pub const LOGNENV: u32 = 10;

/// The base of the kernel's virtual address space; also the direct map of all physical memory.
pub const KERNBASE: usize = 0xE000_0000;

/// The top of the per-CPU kernel stacks, immediately below [`KERNBASE`].
pub const KSTACKTOP: usize = KERNBASE;
/// The size of a single CPU's kernel stack.
pub const KSTKSIZE: usize = 8 * PAGE_SIZE;
/// The size of the unmapped guard region below each CPU's kernel stack.
pub const KSTKGAP: usize = 8 * PAGE_SIZE;

/// The upper limit of the memory-mapped I/O window.
pub const MMIOLIM: usize = KSTACKTOP - PTSIZE;
/// The base of the memory-mapped I/O window.
pub const MMIOBASE: usize = MMIOLIM - PTSIZE;

const _: () = assert!(MMIOBASE == ULIM);
const _: () = assert!(NENV.is_power_of_two());
const _: () = assert!(1usize << LOGNENV == NENV);
