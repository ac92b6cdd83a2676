//! Read-only views of the calling environment's own address space via the self-map at
//! [`UVPT`](utils::abi::layout::UVPT).
//!
//! The kernel wires `pgdir[PDX(UVPT)]` to point at the page directory itself, so the directory
//! reads back as an ordinary page table spanning the full 4 GiB range: `UVPT` as a `u32` array
//! indexed by page number yields that page's PTE, and a second level of indirection at
//! `UVPT + (UVPT >> PAGE_SHIFT)` yields the PDE. `duppage` and `pgfault` use these to find out,
//! without a syscall, whether a faulting page is already `PTE_COW`/writable.

use utils::abi::layout::{PAGE_SHIFT, PAGE_SIZE, UVPT};

/// Returns the page-directory index of `va`.
pub fn pdx(va: u32) -> usize {
	(va as usize >> 22) & 0x3ff
}

/// Returns the page-table index of `va`.
pub fn ptx(va: u32) -> usize {
	(va as usize >> 12) & 0x3ff
}

/// Rounds `va` down to the start of its containing page.
pub fn page_round_down(va: u32) -> u32 {
	va & !(PAGE_SIZE as u32 - 1)
}

/// The base of the self-map's page-directory view: `vpd[pdx]` reads back `pdx`'s raw PDE.
const VPD: usize = UVPT + (UVPT >> PAGE_SHIFT);

/// Returns whether a page table is present for the page directory entry covering `va`.
///
/// A page's PTE is only safe to read through [`pte`] once this holds: the self-map only turns a
/// page table that actually exists into readable memory.
pub fn pde_present(va: u32) -> bool {
	let pde = unsafe { core::ptr::read_volatile((VPD as *const u32).add(pdx(va))) };
	pde & utils::abi::pte::PTE_P != 0
}

/// Returns the raw PTE currently mapping `va` in the calling environment's own address space, or
/// `0` if no mapping exists.
///
/// # Safety
///
/// The caller must have already confirmed [`pde_present`] for `va`; reading the self-map through
/// an absent page directory entry for some `va` ranges is not itself unsafe (the directory's own
/// page table slot is always present), but this function does not re-check it.
pub fn pte(va: u32) -> u32 {
	if !pde_present(va) {
		return 0;
	}
	unsafe { core::ptr::read_volatile((UVPT as *const u32).add(va as usize >> PAGE_SHIFT)) }
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn pdx_ptx_decompose_round_tripped_address() {
		let va = 7 * 0x0040_0000 + 3 * PAGE_SIZE as u32;
		assert_eq!(pdx(va) * 0x0040_0000 + ptx(va) * PAGE_SIZE, va as usize);
	}

	#[test]
	fn page_round_down_clears_offset_bits() {
		assert_eq!(page_round_down(0x1000), 0x1000);
		assert_eq!(page_round_down(0x1fff), 0x1000);
		assert_eq!(page_round_down(0x2000), 0x2000);
	}
}
