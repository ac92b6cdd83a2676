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

//! The environment table: a fixed-size array of environment slots plus a free list.
//!
//! Owns slot allocation, generation-tagged identifiers, and slot recycling. Every other
//! subsystem addresses an environment through its tagged id, never through a raw index or
//! reference, so a stale handle is always detectable (see [`EnvTable::lookup`]).

pub mod regs;
pub mod sched;

use crate::{
	elf,
	gdt::{GD_UD, GD_UT},
	memory::{layout::NENV, vmem, PhysAddr, VirtAddr},
	sync::spin::IntSpin,
};
use regs::TrapFrame;
use utils::errno::{EResult, Errno};

/// The width of the index portion of an environment id (`G` in `id = generation << G | index`).
pub const LOGNENV: u32 = crate::memory::layout::LOGNENV;

/// An environment's run state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
	/// The slot is unused and linked into the free list.
	Free,
	/// Eligible for dispatch but not currently running.
	Runnable,
	/// Currently loaded and executing.
	Running,
	/// Not eligible for dispatch (blocked on something external to this core).
	NotRunnable,
	/// Marked for teardown at its next dispatch.
	Dying,
}

/// The privilege class of an environment.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EnvType {
	User,
	Kernel,
	/// Grants I/O privilege in the saved flags (`FL_IOPL`), for a filesystem-server-style env.
	Fs,
}

/// One environment slot.
pub struct Env {
	/// The tagged identifier: `(generation << LOGNENV) | index`. Zero means the slot has never
	/// been allocated.
	pub id: u32,
	/// The creating environment's id at allocation time; 0 for kernel-created roots.
	pub parent_id: u32,
	pub status: Status,
	pub kind: EnvType,
	/// Monotonic count of dispatch events.
	pub runs: u32,
	/// The complete saved CPU context, the only record of register state between traps.
	pub trap_frame: TrapFrame,
	/// The physical address of the owning page directory; `None` while on the free list.
	pub page_directory: Option<PhysAddr>,
	/// The user virtual address to jump to on page fault; 0 if unset.
	pub pgfault_upcall: u32,
	/// Next-free-slot index, meaningful only while `status == Free`.
	link: Option<usize>,
}

impl Env {
	const fn empty() -> Self {
		Self {
			id: 0,
			parent_id: 0,
			status: Status::Free,
			kind: EnvType::User,
			runs: 0,
			trap_frame: unsafe { core::mem::zeroed() },
			page_directory: None,
			pgfault_upcall: 0,
			link: None,
		}
	}
}

/// The index of an environment, decoded from its tagged id.
fn index_of(id: u32) -> usize {
	(id as usize) & (NENV - 1)
}

/// The fixed-size environment table and its free list.
pub struct EnvTable {
	slots: [Env; NENV],
	free_head: Option<usize>,
	current: Option<usize>,
}

/// The single, global environment table.
pub static ENVS: IntSpin<EnvTable> = IntSpin::new(EnvTable::empty());

impl EnvTable {
	const fn empty() -> Self {
		const EMPTY: Env = Env::empty();
		Self {
			slots: [EMPTY; NENV],
			free_head: None,
			current: None,
		}
	}

	/// Clears every slot and links them into a free list in ascending index order, so the first
	/// allocation returns index 0.
	pub fn init(&mut self) {
		for i in (0..NENV).rev() {
			self.slots[i] = Env::empty();
			self.slots[i].link = self.free_head;
			self.free_head = Some(i);
		}
		self.current = None;
	}

	/// Returns the currently running environment, if any.
	pub fn current(&self) -> Option<&Env> {
		self.current.map(|i| &self.slots[i])
	}

	/// Returns a mutable reference to the currently running environment, if any.
	pub fn current_mut(&mut self) -> Option<&mut Env> {
		self.current.map(|i| &mut self.slots[i])
	}

	/// Sets the currently running environment by index.
	pub fn set_current(&mut self, index: Option<usize>) {
		self.current = index;
	}

	/// Returns the index of the currently running environment, if any.
	pub fn current_index(&self) -> Option<usize> {
		self.current
	}

	/// Allocates a slot for a new environment whose creator is `parent_id` (0 for kernel-created
	/// roots).
	///
	/// Installs a fresh address space via [`vmem::setup_vm`]. On any failure after popping the
	/// free list, the slot is returned to the free list before the error propagates.
	pub fn alloc(&mut self, parent_id: u32) -> EResult<usize> {
		let index = self.free_head.ok_or(Errno::NoFreeEnv)?;
		let next_free = self.slots[index].link;
		let pgdir = match vmem::setup_vm() {
			Ok(pgdir) => pgdir,
			Err(e) => {
				// slot was never removed from the list's head pointer; nothing to undo.
				return Err(e);
			}
		};
		self.free_head = next_free;
		let generation = self.next_generation(index);
		let env = &mut self.slots[index];
		*env = Env::empty();
		env.id = generation | index as u32;
		env.parent_id = parent_id;
		env.status = Status::Runnable;
		env.kind = EnvType::User;
		env.page_directory = Some(pgdir);
		env.trap_frame = TrapFrame::default();
		env.trap_frame.es = GD_UD as u16 | 3;
		env.trap_frame.ds = GD_UD as u16 | 3;
		env.trap_frame.ss = GD_UD as u16 | 3;
		env.trap_frame.cs = GD_UT as u16 | 3;
		env.trap_frame.eflags = 1 << 9; // FL_IF: interrupts enabled on first entry
		Ok(index)
	}

	/// Computes the next non-zero generation tag for the slot being (re)allocated at `index`.
	fn next_generation(&self, index: usize) -> u32 {
		let prev = self.slots[index].id & !(NENV as u32 - 1);
		let mut generation = prev.wrapping_add(1 << LOGNENV);
        if generation == 0 {
			generation = 1 << LOGNENV;
		}
		generation
	}

	/// Resolves a tagged id to a slot index.
	///
	/// `id == 0` means "the current environment". If `check_perm`, the target must be the
	/// current environment or one of its direct children.
	pub fn lookup(&self, id: u32, check_perm: bool) -> EResult<usize> {
		if id == 0 {
			return self.current.ok_or(Errno::BadEnv);
		}
		let index = index_of(id);
		let env = &self.slots[index];
		if env.status == Status::Free || env.id != id {
			return Err(Errno::BadEnv);
		}
		if check_perm {
			let current_id = self.current().map(|e| e.id).unwrap_or(0);
			if env.id != current_id && env.parent_id != current_id {
				return Err(Errno::BadEnv);
			}
		}
		Ok(index)
	}

	/// Returns a reference to the slot at `index`.
	pub fn get(&self, index: usize) -> &Env {
		&self.slots[index]
	}

	/// Returns a mutable reference to the slot at `index`.
	pub fn get_mut(&mut self, index: usize) -> &mut Env {
		&mut self.slots[index]
	}

	/// Tears down environment `index`'s address space and returns its slot to the free list.
	///
	/// Walks the page directory below `UTOP`, dropping a reference on every present user
	/// mapping (freeing the backing frame once its count hits zero), then frees each page-table
	/// page and finally the directory page itself. If the environment being freed is the one
	/// currently loaded, the CPU is switched to the kernel page directory first.
	pub fn free(&mut self, index: usize) {
		use crate::memory::layout::{NPTENTRIES, UTOP};
		let Some(pgdir_phys) = self.slots[index].page_directory.take() else {
			return;
		};
		if self.current == Some(index) {
			unsafe { vmem::load_pgdir(*KERNEL_PGDIR_FOR_FREE.get_or_init()) };
			self.current = None;
		}
		let pgdir = unsafe { vmem::Table::at(pgdir_phys) };
		let utop_pde = vmem::pdx(VirtAddr(UTOP));
		for pdx in 0..utop_pde {
			let pde = pgdir.entry(pdx);
			if pde & vmem::PTE_P == 0 {
				continue;
			}
			let (pt_phys, _) = vmem::split_entry(pde);
			let pt = unsafe { vmem::Table::at(pt_phys) };
			for ptx in 0..NPTENTRIES {
				let pte = pt.entry(ptx);
				if pte & vmem::PTE_P == 0 {
					continue;
				}
				let (page, _) = vmem::split_entry(pte);
				if crate::memory::phys::decref(page) == 0 {
					crate::memory::phys::free(page);
				}
			}
			crate::memory::phys::free(pt_phys);
		}
		crate::memory::phys::free(pgdir_phys);
		self.slots[index].status = Status::Free;
		self.slots[index].link = self.free_head;
		self.free_head = Some(index);
	}

	/// Frees environment `index` and, if it was the current one, clears current (the caller is
	/// expected to yield afterwards; this never runs from inside the scheduler hook itself).
	pub fn destroy(&mut self, index: usize) {
		let was_current = self.current == Some(index);
		self.free(index);
		if was_current {
			self.current = None;
		}
	}
}

/// Holds the kernel's own page directory so [`EnvTable::free`] can switch back to it without
/// threading the value through every call site. Set once at boot.
mod kernel_pgdir_cache {
	use crate::{memory::PhysAddr, sync::once::OnceInit};

	pub struct Cache(OnceInit<PhysAddr>);

	impl Cache {
		pub const fn new() -> Self {
			Self(unsafe { OnceInit::new() })
		}

		pub fn set(&self, addr: PhysAddr) {
			unsafe {
				OnceInit::init(&self.0, addr);
			}
		}

		pub fn get_or_init(&self) -> &PhysAddr {
			&self.0
		}
	}
}
use kernel_pgdir_cache::Cache as KernelPgdirCache;

/// See [`kernel_pgdir_cache`].
static KERNEL_PGDIR_FOR_FREE: KernelPgdirCache = KernelPgdirCache::new();

/// Records the kernel's own page directory so later `free()` calls can restore it.
///
/// # Safety
///
/// Must be called exactly once, at boot, with the same value passed to [`vmem::init`].
pub unsafe fn init(kernel_pgdir: PhysAddr) {
	KERNEL_PGDIR_FOR_FREE.set(kernel_pgdir);
	ENVS.lock().init();
}

/// Bootstrap wrapper: allocates a root environment (parent id 0), loads `elf_bytes` into it, and
/// sets its type. `Fs` environments are granted I/O privilege in the saved flags.
pub fn create(elf_bytes: &[u8], kind: EnvType) -> EResult<u32> {
	let mut table = ENVS.lock();
	let index = table.alloc(0)?;
	let pgdir = table.get(index).page_directory.unwrap();
	let (entry, esp) = vmem::load_icode(pgdir, elf_bytes)?;
	let env = table.get_mut(index);
	env.kind = kind;
	env.trap_frame.eip = entry.0 as u32;
	env.trap_frame.esp = esp.0 as u32;
	if kind == EnvType::Fs {
		env.trap_frame.eflags |= 3 << 12; // FL_IOPL_MASK: ring-3 I/O privilege
	}
	Ok(env.id)
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn fresh_table_hands_out_index_zero_first() {
		let mut t = EnvTable::empty();
		t.init();
		assert_eq!(t.free_head, Some(0));
	}

	#[test]
	fn generation_skips_zero_and_wraps() {
		let mut t = EnvTable::empty();
		t.init();
		t.slots[5].id = (!0u32 & !(NENV as u32 - 1)).wrapping_add(0); // near-max generation
		let g = t.next_generation(5);
		assert_ne!(g, 0);
	}

	#[test]
	fn lookup_zero_is_current() {
		let mut t = EnvTable::empty();
		t.init();
		t.slots[3].id = (1 << LOGNENV) | 3;
		t.slots[3].status = Status::Runnable;
		t.set_current(Some(3));
		assert_eq!(t.lookup(0, false).unwrap(), 3);
	}

	#[test]
	fn lookup_rejects_stale_id() {
		let mut t = EnvTable::empty();
		t.init();
		let stale = (1 << LOGNENV) | 7;
		t.slots[7].id = (2 << LOGNENV) | 7;
		t.slots[7].status = Status::Runnable;
		assert_eq!(t.lookup(stale, false).unwrap_err(), Errno::BadEnv);
	}

	#[test]
	fn lookup_rejects_unrelated_env_when_checking_perm() {
		let mut t = EnvTable::empty();
		t.init();
		t.slots[1].id = (1 << LOGNENV) | 1;
		t.slots[1].status = Status::Runnable;
		t.slots[1].parent_id = 0;
		t.slots[2].id = (1 << LOGNENV) | 2;
		t.slots[2].status = Status::Runnable;
		t.set_current(Some(2));
		assert_eq!(t.lookup(t.slots[1].id, true).unwrap_err(), Errno::BadEnv);
	}
}
