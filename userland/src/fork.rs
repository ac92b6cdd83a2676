//! User-space `fork()`: a child whose address space starts out as a copy-on-write mirror of the
//! parent's, built entirely from syscalls and the self-map.

use crate::{
	selfmap::{page_round_down, pde_present, pte},
	syscall,
};
use utils::abi::{
	layout::{PAGE_SIZE, UTOP, UXSTACKTOP},
	pte::{PTE_COW, PTE_P, PTE_SHARE, PTE_SYSCALL, PTE_U, PTE_W},
	syscall::SetStatus,
	trapframe::UTrapFrame,
};
use utils::errno::EResult;

/// The three ways [`duppage`] can replicate one of the parent's pages into the child, decided
/// purely from the page's current PTE flags.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum DupKind {
	/// `PTE_SHARE` is set: map the same page into the child with its existing permissions,
	/// unchanged. Used for pages the parent has explicitly opted out of COW for (for example, a
	/// page both sides are meant to keep writing through to each other).
	Share,
	/// The page is writable or already copy-on-write: map it into the child copy-on-write, then
	/// re-map the parent's own mapping copy-on-write too, so a write by either side faults and
	/// gets its own private copy.
	Cow,
	/// Neither of the above: the page is read-only and not shared. Map it into the child with
	/// its existing permission bits; a page that was never writable can never diverge, so no COW
	/// bookkeeping is needed.
	Plain,
}

/// Decides how [`duppage`] should replicate a page, from its raw PTE bits alone.
///
/// Pulled out of `duppage` as a pure function so this decision table — the heart of what makes
/// `fork` copy-on-write rather than a full copy — is covered by ordinary host-runnable tests
/// rather than only ever exercised by booting the kernel.
fn classify(pte_flags: u32) -> DupKind {
	if pte_flags & PTE_SHARE != 0 {
		DupKind::Share
	} else if pte_flags & (PTE_W | PTE_COW) != 0 {
		DupKind::Cow
	} else {
		DupKind::Plain
	}
}

/// Replicates the parent's mapping at page number `pn` (i.e. virtual address `pn * PAGE_SIZE`)
/// into `child`, choosing [`Share`](DupKind::Share), [`Cow`](DupKind::Cow), or
/// [`Plain`](DupKind::Plain) treatment from the page's current permission bits.
fn duppage(child: u32, pn: u32) -> EResult<()> {
	let va = pn * PAGE_SIZE as u32;
	let flags = pte(va);
	match classify(flags) {
		DupKind::Share => syscall::sys_page_map(0, va, child, va, flags & PTE_SYSCALL),
		DupKind::Cow => {
			let cow = PTE_U | PTE_P | PTE_COW;
			syscall::sys_page_map(0, va, child, va, cow)?;
			// Re-map our own copy COW too: a write on either side must fault and get its own
			// private page, not silently overwrite the other's.
			syscall::sys_page_map(0, va, 0, va, cow)
		}
		DupKind::Plain => syscall::sys_page_map(0, va, child, va, flags & PTE_SYSCALL),
	}
}

/// The default page-fault handler `fork` installs: resolves a copy-on-write fault by giving the
/// faulting environment a private, writable copy of the page.
///
/// Panics if the fault is not a write to a copy-on-write page — any other fault reaching here is
/// a bug in the caller, not a condition this handler can repair.
pub fn pgfault(utf: &UTrapFrame) {
	const FEC_WR: u32 = 0x2;
	let addr = utf.fault_va;
	let err = utf.err;
	let writable_cow = pde_present(addr) && pte(addr) & PTE_COW != 0;
	assert!(err & FEC_WR != 0 && writable_cow, "page fault at {addr:#x} is not a writable COW fault");

	let page = page_round_down(addr);
	let scratch = utils::abi::layout::PFTEMP as u32;
	syscall::sys_page_alloc(0, scratch, PTE_W | PTE_U).expect("pgfault: sys_page_alloc");
	unsafe {
		core::ptr::copy_nonoverlapping(page as *const u8, scratch as *mut u8, PAGE_SIZE);
	}
	syscall::sys_page_map(0, scratch, 0, page, PTE_U | PTE_P | PTE_W).expect("pgfault: sys_page_map");
	syscall::sys_page_unmap(0, scratch).expect("pgfault: sys_page_unmap");
}

/// Forks the calling environment.
///
/// Installs [`pgfault`] as the page-fault handler (a no-op if one is already installed), creates
/// a child with [`sys_exofork`](syscall::sys_exofork), and walks the parent's own mappings below
/// [`UTOP`] through the self-map, replicating each into the child with [`duppage`] — except the
/// exception stack, which the child gets a fresh private page for rather than ever sharing or
/// COW-mapping (two environments must never fault into each other's exception stack).
///
/// Returns the child's id to the parent and `0` to the child, mirroring the underlying
/// `sys_exofork` convention.
pub fn fork() -> EResult<u32> {
	if !crate::pgfault::has_pgfault_handler() {
		crate::pgfault::set_pgfault_handler(pgfault)?;
	}

	let child = syscall::sys_exofork()?;
	if child == 0 {
		// Child: nothing left to do here. `thisenv`-style bookkeeping has no counterpart in this
		// core (no user env table is projected beyond the self-map this crate already reads
		// through), so control just returns.
		return Ok(0);
	}

	for pn in 0..(UTOP / PAGE_SIZE) as u32 {
		let va = pn * PAGE_SIZE as u32;
		if va as usize == UXSTACKTOP - PAGE_SIZE {
			continue;
		}
		if !pde_present(va) {
			continue;
		}
		if pte(va) & PTE_P == 0 {
			continue;
		}
		duppage(child, pn)?;
	}

	let upcall = crate::pgfault::upcall_entry_point();
	syscall::sys_env_set_pgfault_upcall(child, upcall)?;
	syscall::sys_page_alloc(child, (UXSTACKTOP - PAGE_SIZE) as u32, PTE_W | PTE_U)?;
	syscall::sys_env_set_status(child, SetStatus::Runnable)?;
	Ok(child)
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn classify_prefers_share_over_cow_markers() {
		assert_eq!(classify(PTE_SHARE | PTE_W | PTE_COW), DupKind::Share);
	}

	#[test]
	fn classify_picks_cow_for_writable_page() {
		assert_eq!(classify(PTE_W), DupKind::Cow);
	}

	#[test]
	fn classify_picks_cow_for_already_cow_page() {
		assert_eq!(classify(PTE_COW), DupKind::Cow);
	}

	#[test]
	fn classify_picks_plain_for_readonly_page() {
		assert_eq!(classify(PTE_U | PTE_P), DupKind::Plain);
	}

	#[test]
	fn classify_picks_plain_for_no_flags() {
		assert_eq!(classify(0), DupKind::Plain);
	}
}
