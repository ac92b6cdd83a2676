//! Maskable-interrupt control.
//!
//! These wrap the `cli`/`sti`/`pushfd` instructions directly. They are kept in this crate
//! (instead of the kernel's `arch` module) so that freestanding primitives such as spinlocks can
//! depend on them without creating a dependency cycle with the kernel crate.

#[cfg(target_arch = "x86")]
use core::arch::asm;

/// The bit of `eflags` telling whether maskable interrupts are enabled.
const FLAG_IF: u32 = 1 << 9;

/// Disables maskable interrupts.
#[inline(always)]
pub fn cli() {
	#[cfg(target_arch = "x86")]
	unsafe {
		asm!("cli", options(nomem, nostack));
	}
}

/// Enables maskable interrupts.
#[inline(always)]
pub fn sti() {
	#[cfg(target_arch = "x86")]
	unsafe {
		asm!("sti", options(nomem, nostack));
	}
}

/// Tells whether maskable interrupts are currently enabled.
#[inline(always)]
pub fn is_interrupt_enabled() -> bool {
	#[cfg(target_arch = "x86")]
	{
		let flags: u32;
		unsafe {
			asm!("pushfd", "pop {0}", out(reg) flags, options(nomem, preserves_flags));
		}
		flags & FLAG_IF != 0
	}
	#[cfg(not(target_arch = "x86"))]
	{
		false
	}
}
