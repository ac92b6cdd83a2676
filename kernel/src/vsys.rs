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

//! The virtual-syscall page: a single physical frame mapped read-only at `UVSYS` in every
//! environment's address space (the mapping is cloned, not copied, by
//! [`crate::memory::vmem::setup_vm`], since `UVSYS` sits in the shared region above `UTOP`).
//!
//! The kernel updates it through its own direct physical map, bypassing the read-only user
//! mapping entirely, so reading it from user space never traps.

use crate::memory::{kern_to_virt, layout::UVSYS, phys, vmem, PhysAddr, VirtAddr};
use core::sync::atomic::{AtomicU32, Ordering};
use utils::errno::EResult;

/// The layout of the page as user space (and the kernel, through its direct map) sees it.
#[repr(C)]
struct VsysPage {
	/// Seconds elapsed since boot, mirroring [`crate::time::seconds`].
	gettime: AtomicU32,
}

/// The physical frame backing the page, set once at boot by [`init`].
static FRAME: crate::sync::once::OnceInit<PhysAddr> = unsafe { crate::sync::once::OnceInit::new() };

/// Allocates the virtual-syscall page and maps it read-only at [`UVSYS`] in the kernel's own page
/// directory, so every environment inherits the mapping for free.
///
/// # Safety
///
/// Must be called exactly once at boot, before the first environment is created.
pub unsafe fn init(kernel_pgdir: &mut vmem::Table) -> EResult<()> {
	let frame = phys::alloc(phys::ZERO)?;
	vmem::insert(kernel_pgdir, frame, VirtAddr(UVSYS), vmem::PTE_U)?;
	crate::sync::once::OnceInit::init(&FRAME, frame);
	Ok(())
}

/// Returns a pointer to the page through the kernel's direct physical map.
fn page() -> *mut VsysPage {
	kern_to_virt((*FRAME).as_ptr::<core::ffi::c_void>()) as *mut VsysPage
}

/// Publishes `seconds` into the page, for user space to read without a trap.
pub fn publish_seconds(seconds: u32) {
	unsafe { (*page()).gettime.store(seconds, Ordering::Relaxed) };
}
