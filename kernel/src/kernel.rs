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

//! An educational x86 protected-mode microkernel core: isolated environments, a per-environment
//! address space built around a self-referential page directory, trap and interrupt dispatch, and
//! the page-fault upcall `CowFork` builds its user-space `fork` on top of.
//!
//! The bootstrap assembly (GDT load, paging bring-up, the entry stubs this crate's `extern "C"`
//! blocks declare, the `iret` tail) lives outside this crate entirely; [`kernel_main`] is the
//! first Rust code that runs, called once protected mode, paging and a stack are already live.

#![no_std]
#![no_main]
#![feature(allow_internal_unstable)]
#![feature(custom_test_frameworks)]
#![feature(lang_items)]
#![feature(strict_provenance_lints)]
#![deny(fuzzy_provenance_casts)]
#![allow(clippy::tabs_in_doc_comments)]
#![allow(dead_code)]
#![allow(internal_features)]
#![allow(unsafe_op_in_unsafe_fn)]
#![test_runner(crate::selftest::runner)]
#![reexport_test_harness_main = "kernel_selftest"]

pub mod arch;
#[macro_use]
pub mod config;
pub mod debug;
pub mod elf;
pub mod gdt;
pub mod idt;
pub mod io;
pub mod logger;
pub mod memory;
pub mod panic;
pub mod power;
#[macro_use]
pub mod print;
pub mod process;
pub mod selftest;
pub mod sync;
pub mod syscall;
pub mod time;
pub mod trap;
pub mod tty;
pub mod vsys;

use memory::vmem;
use process::EnvType;

/// The crate's package name, as seen by `Cargo.toml`.
pub const NAME: &str = env!("CARGO_PKG_NAME");
/// The crate's package version, as seen by `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// An ELF image for the first environment.
///
/// Producing and embedding one is file-system-server and ELF-loader territory (see the crate's
/// Non-goals): this core stops at handing a byte slice to [`process::create`]. Empty here, so
/// [`kernel_main`] logs the fact and idles instead of creating a root environment.
const ROOT_ENV: &[u8] = &[];

/// Runs the one-time subsystem bring-up shared by [`kernel_main`] and the selftest entry point.
///
/// Order matters: the TTY and logger must work before anything can report a failure; the IDT must
/// be loaded (and its TSS installed) before interrupts are unmasked; the kernel's own page
/// directory must be captured before the first environment clones it; the RTC must not be
/// programmed until the PIC line feeding it is unmasked.
fn setup() {
	tty::init();
	idt::init();
	time::init();
	let kernel_pgdir = vmem::current_pgdir();
	unsafe {
		vmem::init(kernel_pgdir);
		process::init(kernel_pgdir);
		let pgdir = vmem::Table::at(kernel_pgdir);
		vsys::init(pgdir).unwrap_or_else(|e| panic!("failed to map virtual-syscall page: {e}"));
	}
}

/// The kernel's entry point, called by the bootstrap assembly once protected mode, paging and an
/// initial stack are live.
///
/// # Safety
///
/// Must be called exactly once, with interrupts disabled and no environment yet running.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn kernel_main() -> ! {
	setup();
	if !ROOT_ENV.is_empty() {
		match process::create(ROOT_ENV, EnvType::User) {
			Ok(id) => crate::println!("{NAME} {VERSION}: root environment {id:#010x} created"),
			Err(e) => crate::println!("{NAME} {VERSION}: failed to create root environment: {e}"),
		}
	} else {
		crate::println!("{NAME} {VERSION}: no root environment embedded, idling");
	}
	process::sched::yield_now(None)
}
