//! Typed wrappers around the eight `sys_*` handlers `CowFork` calls, plus the raw `int 0x30`
//! stub they're all built on.
//!
//! Marshalling matches [`utils::abi::syscall`] exactly: `eax` is the syscall number, `edx, ecx,
//! ebx, edi, esi` carry up to five further arguments, and the kernel writes its signed return
//! value back into `eax`.

use utils::{
	abi::syscall::{
		SetStatus, SYSCALL_ENTRY, SYS_ENV_DESTROY, SYS_ENV_SET_PGFAULT_UPCALL,
		SYS_ENV_SET_STATUS, SYS_EXOFORK, SYS_GETENVID, SYS_PAGE_ALLOC, SYS_PAGE_MAP,
		SYS_PAGE_UNMAP, SYS_YIELD,
	},
	errno::{EResult, Errno},
};

/// Traps into the kernel with syscall number `num` and up to five arguments, returning the raw
/// signed value the kernel wrote back into `eax`.
///
/// # Safety
///
/// Only sound to call with a syscall number and arguments the kernel's dispatcher actually
/// understands; passing address-valued arguments the calling environment isn't permitted to name
/// is caught by the kernel (`FAULT`/`INVAL`), not by this function.
#[inline(always)]
unsafe fn raw_syscall(num: u32, a1: u32, a2: u32, a3: u32, a4: u32, a5: u32) -> i32 {
	#[cfg(target_arch = "x86")]
	{
		let ret: u32;
		core::arch::asm!(
			"int {vec}",
			vec = const SYSCALL_ENTRY,
			inout("eax") num => ret,
			in("edx") a1,
			in("ecx") a2,
			in("ebx") a3,
			in("edi") a4,
			in("esi") a5,
		);
		ret as i32
	}
	#[cfg(not(target_arch = "x86"))]
	{
		let _ = (num, a1, a2, a3, a4, a5);
		unimplemented!("the syscall trap is only defined for the x86 target this core ships for")
	}
}

/// Decodes a raw syscall return value into [`EResult<u32>`].
fn decode(ret: i32) -> EResult<u32> {
	Errno::from_retval(ret)
}

/// Returns the calling environment's own id.
pub fn sys_getenvid() -> u32 {
	// Cannot fail: the kernel always has a current environment when a syscall runs.
	unsafe { raw_syscall(SYS_GETENVID, 0, 0, 0, 0, 0) as u32 }
}

/// Gives up the remainder of the calling environment's time slice. Never returns an error because
/// the kernel never returns from it at all until the environment is rescheduled.
pub fn sys_yield() {
	unsafe { raw_syscall(SYS_YIELD, 0, 0, 0, 0, 0) };
}

/// Creates a suspended child whose register state mirrors the caller's.
///
/// Returns the child's id to the parent and `0` to the child (the two sides tell themselves
/// apart by what this function returns, exactly once, on both sides of the same underlying trap).
pub fn sys_exofork() -> EResult<u32> {
	decode(unsafe { raw_syscall(SYS_EXOFORK, 0, 0, 0, 0, 0) })
}

/// Tears down environment `envid` (permission-checked against the caller: must be itself or a
/// direct child).
pub fn sys_env_destroy(envid: u32) -> EResult<()> {
	decode(unsafe { raw_syscall(SYS_ENV_DESTROY, envid, 0, 0, 0, 0) }).map(|_| ())
}

/// Changes `envid`'s run state.
pub fn sys_env_set_status(envid: u32, status: SetStatus) -> EResult<()> {
	decode(unsafe { raw_syscall(SYS_ENV_SET_STATUS, envid, status as u32, 0, 0, 0) }).map(|_| ())
}

/// Installs `envid`'s page-fault upcall entry point.
pub fn sys_env_set_pgfault_upcall(envid: u32, upcall: u32) -> EResult<()> {
	decode(unsafe { raw_syscall(SYS_ENV_SET_PGFAULT_UPCALL, envid, upcall, 0, 0, 0) }).map(|_| ())
}

/// Allocates and maps a fresh, zeroed page at `va` in `envid`'s address space with permission
/// bits `perm` (a subset of `utils::abi::pte::PTE_SYSCALL`).
pub fn sys_page_alloc(envid: u32, va: u32, perm: u32) -> EResult<()> {
	decode(unsafe { raw_syscall(SYS_PAGE_ALLOC, envid, va, perm, 0, 0) }).map(|_| ())
}

/// Maps the page currently at `srcva` in `srcenvid`'s address space into `dstenvid` at `dstva`
/// with permission bits `perm`.
pub fn sys_page_map(srcenvid: u32, srcva: u32, dstenvid: u32, dstva: u32, perm: u32) -> EResult<()> {
	decode(unsafe { raw_syscall(SYS_PAGE_MAP, srcenvid, srcva, dstenvid, dstva, perm) }).map(|_| ())
}

/// Removes the mapping at `va` in `envid`'s address space.
pub fn sys_page_unmap(envid: u32, va: u32) -> EResult<()> {
	decode(unsafe { raw_syscall(SYS_PAGE_UNMAP, envid, va, 0, 0, 0) }).map(|_| ())
}
