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

//! A bitmap physical frame allocator over a flat, fixed-size frame array.
//!
//! This is deliberately not the buddy allocator the rest of the codebase reaches for elsewhere:
//! the environment core only ever needs single-page allocations, so a static table behind a
//! spinlock with atomic refcounts is the whole job. Built the same way, scaled down.

use crate::memory::{layout::PAGE_SIZE, PhysAddr};
use core::sync::atomic::{AtomicU32, Ordering};
use utils::errno::{EResult, Errno};

/// The total amount of physical memory this allocator manages.
///
/// Memory detection (multiboot/e820 parsing) is an external collaborator outside this crate's
/// core; this is a fixed span large enough for the QEMU configurations the crate is exercised
/// under.
pub const MANAGED_MEM: usize = 128 * 1024 * 1024;
/// The number of frames in [`MANAGED_MEM`].
pub const FRAME_COUNT: usize = MANAGED_MEM / PAGE_SIZE;

/// Flags accepted by [`alloc`].
pub type AllocFlags = u32;
/// Zero the page's content before returning it.
pub const ZERO: AllocFlags = 1 << 0;

/// Per-frame metadata: a reference count, zero meaning free.
struct Frame(AtomicU32);

/// The flat frame table, one entry per physical page across [`MANAGED_MEM`].
static FRAMES: [Frame; FRAME_COUNT] = {
	const INIT: Frame = Frame(AtomicU32::new(0));
	[INIT; FRAME_COUNT]
};

/// The index of the next frame to probe when searching for a free one.
///
/// This is a simple next-fit cursor, not a free list: frames are reclaimed rarely enough (one
/// per page table, one per mapped user page) that a linear scan from the last cursor position is
/// fine, and it avoids a second data structure to keep consistent with the refcount table.
static CURSOR: AtomicU32 = AtomicU32::new(0);

/// Returns the index of the physical frame containing `addr`.
const fn frame_index(addr: PhysAddr) -> usize {
	addr.0 / PAGE_SIZE
}

/// Returns the base physical address of frame `index`.
const fn frame_addr(index: usize) -> PhysAddr {
	PhysAddr(index * PAGE_SIZE)
}

/// Allocates a free physical frame.
///
/// If `flags` contains [`ZERO`], the frame's content is zeroed before it is returned.
///
/// Fails with [`Errno::NoMem`] if every managed frame is currently referenced.
pub fn alloc(flags: AllocFlags) -> EResult<PhysAddr> {
	let start = CURSOR.load(Ordering::Relaxed) as usize;
	for off in 0..FRAME_COUNT {
		let i = (start + off) % FRAME_COUNT;
		if FRAMES[i].0.compare_exchange(0, 1, Ordering::AcqRel, Ordering::Relaxed).is_ok() {
			CURSOR.store((i + 1) as u32 % FRAME_COUNT as u32, Ordering::Relaxed);
			let addr = frame_addr(i);
			if flags & ZERO != 0 {
				unsafe {
					addr.as_ptr::<u8>().write_bytes(0, PAGE_SIZE);
				}
			}
			return Ok(addr);
		}
	}
	Err(Errno::NoMem)
}

/// Increments the reference count of the frame containing `addr`.
pub fn incref(addr: PhysAddr) {
	FRAMES[frame_index(addr)].0.fetch_add(1, Ordering::AcqRel);
}

/// Decrements the reference count of the frame containing `addr`, returning the new count.
///
/// A frame whose count reaches zero becomes available to [`alloc`] again.
pub fn decref(addr: PhysAddr) -> u32 {
	let prev = FRAMES[frame_index(addr)].0.fetch_sub(1, Ordering::AcqRel);
	debug_assert!(prev > 0, "refcount underflow on physical frame {addr:?}");
	prev - 1
}

/// Frees a frame previously returned by [`alloc`], ignoring outstanding references.
///
/// Used only at bootstrap/error paths where a frame is known to be singly-owned; ordinary release
/// goes through [`decref`].
pub fn free(addr: PhysAddr) {
	FRAMES[frame_index(addr)].0.store(0, Ordering::Release);
}

/// Returns the current reference count of the frame containing `addr`.
pub fn refcount(addr: PhysAddr) -> u32 {
	FRAMES[frame_index(addr)].0.load(Ordering::Acquire)
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn alloc_then_free_is_reusable() {
		let a = alloc(0).unwrap();
		free(a);
		let b = alloc(0).unwrap();
		assert_eq!(refcount(b), 1);
		free(b);
	}

	// The `ZERO` flag's actual memory write is exercised by the in-kernel selftest, not here:
	// frame addresses are physical and not dereferenceable from a host test process.

	#[test]
	fn refcount_tracks_incref_decref() {
		let a = alloc(0).unwrap();
		assert_eq!(refcount(a), 1);
		incref(a);
		assert_eq!(refcount(a), 2);
		assert_eq!(decref(a), 1);
		assert_eq!(decref(a), 0);
	}
}
