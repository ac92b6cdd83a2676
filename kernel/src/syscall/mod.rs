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

//! The fixed syscall surface `CowFork` (and any other user-space runtime) is built over.
//!
//! Marshalling convention (an Open Question resolution, see `DESIGN.md`): `eax` carries the
//! syscall number, `edx, ecx, ebx, edi, esi` carry up to five further machine-word arguments, and
//! the signed return value is written back into the trap frame's `eax`. [`crate::trap`] is the
//! only caller; it owns translating the raw register values out of the trap frame into the `u32`s
//! this module expects.

use crate::memory::{
	layout::{PAGE_SIZE, UTOP},
	vmem, VirtAddr,
};
use crate::process::{regs::TrapFrame, sched, Status, ENVS};
use utils::errno::{EResult, Errno};
// The syscall numbers are part of the kernel/user ABI `userland`'s stubs are built against, so
// they live in `utils::abi::syscall` and are re-exported here.
pub use utils::abi::syscall::*;

/// Dispatches one syscall, reading its number and arguments out of `tf` and writing the return
/// value back into `tf.regs.eax`.
///
/// Diverges (never returns to its caller) for [`SYS_YIELD`] and for [`SYS_ENV_DESTROY`] on the
/// calling environment's own id, in both cases by tail-calling into [`sched::yield_now`]: there is
/// no longer a "this environment" to return a value to.
pub fn dispatch(tf: &mut TrapFrame, current_index: usize) {
	let num = tf.regs.eax;
	let a1 = tf.regs.edx;
	let a2 = tf.regs.ecx;
	let a3 = tf.regs.ebx;
	let a4 = tf.regs.edi;
	let a5 = tf.regs.esi;
	if num == SYS_YIELD {
		sched::yield_now(Some(current_index));
	}
	if num == SYS_ENV_DESTROY {
		let destroying_self = ENVS
			.lock()
			.lookup(a1, true)
			.map(|i| i == current_index)
			.unwrap_or(false);
		let ret = sys_env_destroy(a1);
		if destroying_self && ret.is_ok() {
			sched::yield_now(Some(current_index));
		}
		tf.regs.eax = ret.map(|v| v as u32).unwrap_or_else(|e| e.to_retval() as u32);
		return;
	}
	let ret = match num {
		SYS_GETENVID => Ok(sys_getenvid(current_index) as i32),
		SYS_EXOFORK => sys_exofork(current_index),
		SYS_ENV_SET_STATUS => sys_env_set_status(a1, a2),
		SYS_ENV_SET_PGFAULT_UPCALL => sys_env_set_pgfault_upcall(a1, a2),
		SYS_PAGE_ALLOC => sys_page_alloc(a1, a2, a3),
		SYS_PAGE_MAP => sys_page_map(a1, a2, a3, a4, a5),
		SYS_PAGE_UNMAP => sys_page_unmap(a1, a2),
		_ => Err(Errno::Inval),
	};
	tf.regs.eax = ret.map(|v| v as u32).unwrap_or_else(|e| e.to_retval() as u32);
}

/// Returns the calling environment's id.
fn sys_getenvid(current_index: usize) -> u32 {
	ENVS.lock().get(current_index).id
}

/// Allocates a suspended child of the calling environment.
///
/// The child's saved registers mirror the parent's trap frame except `eax`, which is zeroed: that
/// is how the child tells itself apart from the parent once resumed (the parent's own `eax` is
/// set to the child's id by the [`dispatch`] return-value path).
fn sys_exofork(current_index: usize) -> EResult<i32> {
	let mut table = ENVS.lock();
	let parent_id = table.get(current_index).id;
	let parent_tf = table.get(current_index).trap_frame;
	let child_index = table.alloc(parent_id)?;
	let child = table.get_mut(child_index);
	child.trap_frame = parent_tf;
	child.trap_frame.regs.eax = 0;
	child.status = Status::NotRunnable;
	Ok(child.id as i32)
}

/// Validates that `perm` only sets bits a user syscall is allowed to set, and always includes
/// present+user.
fn check_perm(perm: u32) -> EResult<u32> {
	if perm & !vmem::PTE_SYSCALL != 0 {
		return Err(Errno::Inval);
	}
	Ok(perm | vmem::PTE_P | vmem::PTE_U)
}

/// Validates that `va` is page-aligned and below [`UTOP`].
fn check_va(va: u32) -> EResult<VirtAddr> {
	let va = VirtAddr(va as usize);
	if va.0 >= UTOP || !va.is_aligned_to(PAGE_SIZE) {
		return Err(Errno::Inval);
	}
	Ok(va)
}

fn sys_page_alloc(envid: u32, va: u32, perm: u32) -> EResult<i32> {
	let va = check_va(va)?;
	let perm = check_perm(perm)?;
	let mut table = ENVS.lock();
	let index = table.lookup(envid, true)?;
	let frame = crate::memory::phys::alloc(crate::memory::phys::ZERO)?;
	let pgdir_phys = table.get(index).page_directory.ok_or(Errno::BadEnv)?;
	let pgdir = unsafe { vmem::Table::at(pgdir_phys) };
	let result = vmem::insert(pgdir, frame, va, perm);
	if result.is_err() {
		crate::memory::phys::free(frame);
	}
	result.map(|_| 0)
}

fn sys_page_map(srcenvid: u32, srcva: u32, dstenvid: u32, dstva: u32, perm: u32) -> EResult<i32> {
	let srcva = check_va(srcva)?;
	let dstva = check_va(dstva)?;
	let perm = check_perm(perm)?;
	let mut table = ENVS.lock();
	let src_index = table.lookup(srcenvid, true)?;
	let dst_index = table.lookup(dstenvid, true)?;
	let src_pgdir_phys = table.get(src_index).page_directory.ok_or(Errno::BadEnv)?;
	let src_pgdir = unsafe { vmem::Table::at(src_pgdir_phys) };
	let pte = vmem::lookup(src_pgdir, srcva).ok_or(Errno::Fault)?;
	let (page, _) = vmem::split_entry(pte);
	let dst_pgdir_phys = table.get(dst_index).page_directory.ok_or(Errno::BadEnv)?;
	let dst_pgdir = unsafe { vmem::Table::at(dst_pgdir_phys) };
	vmem::insert(dst_pgdir, page, dstva, perm).map(|_| 0)
}

fn sys_page_unmap(envid: u32, va: u32) -> EResult<i32> {
	let va = check_va(va)?;
	let mut table = ENVS.lock();
	let index = table.lookup(envid, true)?;
	let pgdir_phys = table.get(index).page_directory.ok_or(Errno::BadEnv)?;
	let pgdir = unsafe { vmem::Table::at(pgdir_phys) };
	vmem::remove(pgdir, va);
	Ok(0)
}

fn sys_env_set_status(envid: u32, status: u32) -> EResult<i32> {
	let status = match status {
		0 => Status::NotRunnable,
		1 => Status::Runnable,
		_ => return Err(Errno::Inval),
	};
	let mut table = ENVS.lock();
	let index = table.lookup(envid, true)?;
	table.get_mut(index).status = status;
	Ok(0)
}

fn sys_env_set_pgfault_upcall(envid: u32, upcall: u32) -> EResult<i32> {
	let mut table = ENVS.lock();
	let index = table.lookup(envid, true)?;
	table.get_mut(index).pgfault_upcall = upcall;
	Ok(0)
}

/// Tears down environment `envid` (permission-checked against the calling environment).
fn sys_env_destroy(envid: u32) -> EResult<i32> {
	let mut table = ENVS.lock();
	let index = table.lookup(envid, true)?;
	table.destroy(index);
	Ok(0)
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn check_perm_rejects_bits_outside_syscall_mask() {
		assert_eq!(check_perm(0x8000_0000).unwrap_err(), Errno::Inval);
	}

	#[test]
	fn check_perm_adds_present_and_user() {
		let perm = check_perm(vmem::PTE_W).unwrap();
		assert_eq!(perm, vmem::PTE_W | vmem::PTE_P | vmem::PTE_U);
	}

	#[test]
	fn check_va_rejects_unaligned() {
		assert_eq!(check_va(1).unwrap_err(), Errno::Inval);
	}

	#[test]
	fn check_va_rejects_above_utop() {
		assert_eq!(check_va(UTOP as u32).unwrap_err(), Errno::Inval);
	}

	#[test]
	fn check_va_accepts_page_aligned_user_address() {
		assert_eq!(check_va(PAGE_SIZE as u32).unwrap().0, PAGE_SIZE);
	}
}
