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

//! Round-robin dispatch: scans the environment table for the next runnable slot after the one
//! that just gave up the CPU, wrapping around, and resumes it. Halts (with interrupts re-enabled,
//! so the next IRQ wakes it up) when nothing is runnable.
//!
//! This never returns to its caller: either it resumes an environment through
//! [`context_restore`], which does not return either, or it loops forever alternating
//! `sti(); hlt()` with a fresh scan.

use super::{Status, ENVS};
use crate::memory::layout::NENV;
use utils::interrupt::{cli, sti};

extern "C" {
	/// The assembly tail that pops a [`super::regs::TrapFrame`] back into the CPU's registers and
	/// segment selectors and `iret`s into it. Lives alongside the entry stubs, outside this
	/// crate's portable core (see `kernel/build/compile.rs`).
	fn context_restore(tf: *const super::regs::TrapFrame) -> !;
}

/// Picks the next runnable environment strictly after `after` (wrapping), and resumes it.
///
/// Never returns: on success it tail-calls into [`context_restore`]; if nothing is runnable it
/// parks the CPU with interrupts enabled and retries once woken.
pub fn yield_now(after: Option<usize>) -> ! {
	let start = after.map(|i| (i + 1) % NENV).unwrap_or(0);
	loop {
		{
			let mut table = ENVS.lock();
			for offset in 0..NENV {
				let index = (start + offset) % NENV;
				if table.get(index).status == Status::Runnable {
					table.get_mut(index).status = Status::Running;
					table.get_mut(index).runs += 1;
					table.set_current(Some(index));
					let tf = table.get(index).trap_frame;
					drop(table);
					unsafe { context_restore(&tf) };
				}
			}
		}
		// No runnable environment: wait for the next interrupt to re-evaluate.
		sti();
		unsafe { core::arch::asm!("hlt", options(nomem, nostack)) };
		cli();
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn start_index_wraps_after_last_slot() {
		let start = Some(NENV - 1).map(|i| (i + 1) % NENV).unwrap();
		assert_eq!(start, 0);
	}

	#[test]
	fn start_index_with_no_current_is_zero() {
		let after: Option<usize> = None;
		let start = after.map(|i| (i + 1) % NENV).unwrap_or(0);
		assert_eq!(start, 0);
	}
}
