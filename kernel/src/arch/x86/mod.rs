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

//! x86-specific re-exports, gathered under one path so call sites can write
//! `crate::arch::x86::{cli, sti}` regardless of which freestanding crate actually implements
//! them.

pub use crate::io;
pub use utils::interrupt::{cli, is_interrupt_enabled, sti};

/// The interrupt-frame ABI, named the way the rest of the crate's trap-handling code expects to
/// find it.
pub mod idt {
	pub use crate::process::regs::TrapFrame as IntFrame;
}
