//! The page-fault upcall entry point: the trampoline the kernel jumps to on the user exception
//! stack, and the registry of the user-installed handler it dispatches to.
//!
//! `CowFork`'s own [`crate::fork::pgfault`] is the default handler `fork()` installs, but nothing
//! here is fork-specific — a program can call [`set_pgfault_handler`] with any handler before or
//! after forking.

use core::sync::atomic::{AtomicUsize, Ordering};
use utils::abi::trapframe::UTrapFrame;

/// The currently installed handler, stored as a function pointer cast to `usize` (there is no
/// atomic function-pointer type). `0` means "none installed".
static HANDLER: AtomicUsize = AtomicUsize::new(0);

/// A page-fault handler: given the trap frame the fault occurred in, either repairs the mapping
/// and returns (the trampoline then resumes the faulting instruction) or does not return at all.
pub type Handler = fn(&UTrapFrame);

extern "C" {
	/// The assembly trampoline defined below, installed with the kernel as this environment's
	/// upcall entry point.
	fn _pgfault_upcall();
}

/// Installs `handler` as the page-fault handler and, the first time this is called, registers
/// [`_pgfault_upcall`] with the kernel as this environment's upcall entry point.
pub fn set_pgfault_handler(handler: Handler) -> Result<(), utils::errno::Errno> {
	let first_install = HANDLER.swap(handler as usize, Ordering::SeqCst) == 0;
	if first_install {
		let envid = crate::syscall::sys_getenvid();
		crate::syscall::sys_env_set_pgfault_upcall(envid, _pgfault_upcall as usize as u32)?;
	}
	Ok(())
}

/// Returns whether a handler has been installed via [`set_pgfault_handler`].
pub fn has_pgfault_handler() -> bool {
	HANDLER.load(Ordering::SeqCst) != 0
}

/// Returns the trampoline's entry address, the value a child environment's own upcall must be
/// set to in order to run the same dispatch this environment already installed.
pub fn upcall_entry_point() -> u32 {
	_pgfault_upcall as usize as u32
}

/// Called by [`_pgfault_upcall`] with the trap frame the kernel built on the exception stack.
///
/// Panics (taking the environment down with it, as no further upcall can run once this one has
/// already faulted while resolving a fault) if no handler is installed.
#[no_mangle]
extern "C" fn rust_pgfault_dispatch(utf: *mut UTrapFrame) {
	let handler_addr = HANDLER.load(Ordering::SeqCst);
	assert_ne!(handler_addr, 0, "page fault with no handler installed");
	let handler: Handler = unsafe { core::mem::transmute(handler_addr) };
	handler(unsafe { &*utf });
}

#[cfg(target_arch = "x86")]
core::arch::global_asm!(
	r#"
.text
.global _pgfault_upcall
_pgfault_upcall:
	push esp
	call rust_pgfault_dispatch
	add esp, 4

	mov eax, [esp+48]
	sub eax, 4
	mov [esp+48], eax
	mov ebx, [esp+40]
	mov [eax], ebx

	add esp, 8
	popad
	add esp, 4
	popfd
	pop esp
	ret
"#,
);
