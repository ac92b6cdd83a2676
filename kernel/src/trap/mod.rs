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

//! `TrapDispatcher` and `PageFaultUpcall`: what happens after the entry stub has pushed a
//! [`crate::process::regs::TrapFrame`] and jumped into Rust.
//!
//! `trap` is the single entry point the assembly tail calls into, `int` is read straight out of
//! the pushed frame, and the dispatch order mirrors this codebase's original trap-routing logic
//! one-for-one: page fault, syscall, breakpoint, the three IRQs this core drives, then a fallback
//! that panics on a kernel-mode fault or tears down the faulting environment.

use crate::{
	idt::{self, pic},
	memory::{
		layout::{PAGE_SIZE, UXSTACKSIZE, UXSTACKTOP},
		vmem, VirtAddr,
	},
	process::{regs::TrapFrame, regs::UTrapFrame, sched, Status, ENVS},
	syscall, time, vsys,
};
use core::{arch::asm, mem::size_of, ptr};

/// Reads the faulting address out of `cr2`, valid only when handling a page fault.
fn read_cr2() -> VirtAddr {
	#[cfg(target_arch = "x86")]
	unsafe {
		let cr2: u32;
		asm!("mov {0}, cr2", out(reg) cr2, options(nomem, nostack, preserves_flags));
		return VirtAddr(cr2 as usize);
	}
	#[cfg(not(target_arch = "x86"))]
	VirtAddr(0)
}

extern "C" {
	/// See [`crate::process::sched`]: the assembly tail this module also resumes into directly
	/// (bypassing the scheduler) when a trap is handled and the same environment keeps running.
	fn context_restore(tf: *const TrapFrame) -> !;
}

/// Tells whether `tf` was taken while running in ring 0.
fn from_kernel_mode(tf: &TrapFrame) -> bool {
	(tf.cs as usize & 3) == 0
}

/// The single entry point the assembly trap/interrupt stubs call into, with interrupts disabled
/// and `tf` pointing at the frame they just pushed.
///
/// # Safety
///
/// Must only be called by the entry stubs, with a valid, fully-populated trap frame.
#[no_mangle]
pub unsafe extern "C" fn trap(tf: *mut TrapFrame) -> ! {
	debug_assert!(!utils::interrupt::is_interrupt_enabled());
	let mut tf = *tf;

	let current_index = ENVS
		.lock()
		.current_index()
		.expect("trap with no current environment");

	{
		let mut table = ENVS.lock();
		if table.get(current_index).status == Status::Dying {
			table.destroy(current_index);
			sched::yield_now(Some(current_index));
		}
		table.get_mut(current_index).trap_frame = tf;
	}

	match tf.int as usize {
		14 => page_fault(&mut tf, current_index),
		n if n == idt::SYSCALL_ENTRY => {
			syscall::dispatch(&mut tf, current_index);
		}
		n if n == idt::T_BRKPT => {
			crate::println!("{tf}");
		}
		n if n == idt::IRQ_CLOCK => {
			time::acknowledge();
			let seconds = time::tick();
			vsys::publish_seconds(seconds);
			pic::send_eoi((idt::IRQ_CLOCK - 0x20) as u8);
			resume_or_yield(&mut tf, current_index);
		}
		n if n == idt::IRQ_KBD => {
			pic::send_eoi((idt::IRQ_KBD - 0x20) as u8);
			resume_or_yield(&mut tf, current_index);
		}
		n if n == idt::IRQ_SERIAL => {
			pic::send_eoi((idt::IRQ_SERIAL - 0x20) as u8);
			resume_or_yield(&mut tf, current_index);
		}
		0x27 => {
			// IRQ_SPURIOUS: no device actually interrupted, no EOI owed. Fall through to the
			// default resume below with the frame untouched.
		}
		_ => {
			if from_kernel_mode(&tf) {
				crate::panic::with_frame(&tf);
			}
			ENVS.lock().destroy(current_index);
			sched::yield_now(Some(current_index));
		}
	}
	resume_or_yield(&mut tf, current_index)
}

/// After a branch that doesn't explicitly diverge: resumes the same environment if it is still
/// marked running, otherwise hands off to the scheduler.
fn resume_or_yield(tf: &mut TrapFrame, current_index: usize) -> ! {
	let still_running = {
		let mut table = ENVS.lock();
		table.get_mut(current_index).trap_frame = *tf;
		table.get(current_index).status == Status::Running
	};
	if still_running {
		unsafe { context_restore(tf) };
	}
	sched::yield_now(Some(current_index))
}

/// `PageFaultUpcall`: builds the user-facing [`UTrapFrame`] on the environment's exception stack
/// and resumes execution at its registered page-fault upcall.
///
/// A fault with no registered upcall, or one whose delivery would itself fault (exception stack
/// exhausted, upcall missing), destroys the environment instead — matching this codebase's
/// original `page_fault_handler` fallback.
fn page_fault(tf: &mut TrapFrame, current_index: usize) -> ! {
	let fault_va = read_cr2();
	if from_kernel_mode(tf) {
		crate::panic::with_frame(tf);
	}
	let upcall = ENVS.lock().get(current_index).pgfault_upcall;
	if upcall == 0 {
		crate::println!("unhandled page fault at {:#010x}, no upcall installed", fault_va.0);
		ENVS.lock().destroy(current_index);
		sched::yield_now(Some(current_index));
	}
	// Recursive fault on the exception stack itself: leave a one-word gap instead of restarting
	// from UXSTACKTOP, so the nested UTrapFrame doesn't alias the one already there.
	let esp = tf.esp as usize;
	let stacktop = if (UXSTACKTOP - PAGE_SIZE..UXSTACKTOP).contains(&esp) {
		esp - size_of::<u32>()
	} else {
		UXSTACKTOP
	};
	let new_esp = stacktop - size_of::<UTrapFrame>();
	if new_esp < UXSTACKTOP - UXSTACKSIZE {
		crate::println!("exception stack overflow while delivering page fault");
		ENVS.lock().destroy(current_index);
		sched::yield_now(Some(current_index));
	}
	let utf = UTrapFrame {
		fault_va: fault_va.0 as u32,
		err: tf.err,
		regs: tf.regs,
		eip: tf.eip,
		eflags: tf.eflags,
		esp: tf.esp,
	};
	{
		let pgdir_phys = ENVS.lock().get(current_index).page_directory.unwrap();
		let pgdir = unsafe { vmem::Table::at(pgdir_phys) };
		let writable = vmem::lookup(pgdir, VirtAddr(new_esp))
			.map(|pte| pte & vmem::PTE_W != 0)
			.unwrap_or(false);
		if !writable {
			crate::println!("page-fault upcall stack at {new_esp:#010x} is not user-writable");
			ENVS.lock().destroy(current_index);
			sched::yield_now(Some(current_index));
		}
	}
	unsafe { ptr::with_exposed_provenance_mut::<UTrapFrame>(new_esp).write_unaligned(utf) };
	tf.esp = new_esp as u32;
	tf.eip = upcall;
	resume_or_yield(tf, current_index)
}
