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

//! A minimal ELF32 reader: magic/class validation and program-header iteration, nothing more.
//!
//! No relocation, no dynamic linking, no section-header processing beyond what the kernel symbol
//! lookup in [`kernel`] needs: those are explicitly out of scope (Non-goals: dynamic linking in
//! user space).

use crate::memory::VirtAddr;
use core::mem::size_of;
use utils::errno::{EResult, Errno};

/// The four magic bytes at the start of every ELF file.
const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];

/// 32-bit class marker (`e_ident[EI_CLASS]`).
const ELFCLASS32: u8 = 1;

/// Program header type: loadable segment.
const PT_LOAD: u32 = 1;

/// The fixed-size ELF32 file header, as laid out on disk.
#[repr(C)]
#[derive(Clone, Copy)]
struct Ehdr {
	e_ident: [u8; 16],
	e_type: u16,
	e_machine: u16,
	e_version: u32,
	e_entry: u32,
	e_phoff: u32,
	e_shoff: u32,
	e_flags: u32,
	e_ehsize: u16,
	e_phentsize: u16,
	e_phnum: u16,
	e_shentsize: u16,
	e_shnum: u16,
	e_shstrndx: u16,
}

/// The fixed-size ELF32 program header, as laid out on disk.
#[repr(C)]
#[derive(Clone, Copy)]
struct Phdr {
	p_type: u32,
	p_offset: u32,
	p_vaddr: u32,
	p_paddr: u32,
	p_filesz: u32,
	p_memsz: u32,
	p_flags: u32,
	p_align: u32,
}

/// One loadable (or not) program header, decoded into the contract the address-space builder
/// consumes: `{type, va, file_size, mem_size, offset}`.
#[derive(Clone, Copy, Debug)]
pub struct ProgramHeader {
	/// The raw segment type (`PT_*`).
	pub kind: u32,
	/// The virtual address the segment is to be loaded at.
	pub va: VirtAddr,
	/// The number of bytes to copy from the file image.
	pub file_size: usize,
	/// The total size of the segment in memory; the tail beyond `file_size` is BSS.
	pub mem_size: usize,
	/// The byte offset of the segment's content within the file image.
	pub offset: usize,
}

impl ProgramHeader {
	/// Tells whether this segment must be mapped and loaded (`PT_LOAD`).
	pub fn loadable(&self) -> bool {
		self.kind == PT_LOAD
	}
}

/// A parsed, validated ELF32 image borrowing its bytes from the caller.
pub struct Image<'b> {
	bytes: &'b [u8],
	ehdr: Ehdr,
}

impl<'b> Image<'b> {
	/// Validates the ELF magic and class, and returns a handle for program-header iteration.
	///
	/// Fails with [`Errno::Inval`] if the image is too short, its magic does not match, or it is
	/// not a 32-bit image.
	pub fn parse(bytes: &'b [u8]) -> EResult<Self> {
		if bytes.len() < size_of::<Ehdr>() {
			return Err(Errno::Inval);
		}
		if bytes[0..4] != ELF_MAGIC {
			return Err(Errno::Inval);
		}
		if bytes[4] != ELFCLASS32 {
			return Err(Errno::Inval);
		}
		let ehdr = unsafe { (bytes.as_ptr() as *const Ehdr).read_unaligned() };
		let phend = (ehdr.e_phoff as usize)
			.checked_add(ehdr.e_phnum as usize * size_of::<Phdr>())
			.ok_or(Errno::Inval)?;
		if phend > bytes.len() {
			return Err(Errno::Inval);
		}
		Ok(Self { bytes, ehdr })
	}

	/// Returns the image's entry point.
	pub fn entry(&self) -> VirtAddr {
		VirtAddr(self.ehdr.e_entry as usize)
	}

	/// Returns an iterator over the image's program headers.
	pub fn program_headers(&self) -> impl Iterator<Item = ProgramHeader> + '_ {
		let base = self.ehdr.e_phoff as usize;
		let count = self.ehdr.e_phnum as usize;
		(0..count).map(move |i| {
			let off = base + i * size_of::<Phdr>();
			let phdr = unsafe { (self.bytes.as_ptr().add(off) as *const Phdr).read_unaligned() };
			ProgramHeader {
				kind: phdr.p_type,
				va: VirtAddr(phdr.p_vaddr as usize),
				file_size: phdr.p_filesz as usize,
				mem_size: phdr.p_memsz as usize,
				offset: phdr.p_offset as usize,
			}
		})
	}
}

/// Symbol lookup over the kernel's own ELF image, used by [`crate::debug::print_callstack`].
pub mod kernel {
	use crate::memory::VirtAddr;

	/// Looks up the name of the function containing `pc` in the kernel's own symbol table.
	///
	/// The kernel image does not carry its symbol table at runtime in this design (no loader
	/// re-reads `/boot/kernel` once booted), so this always reports unknown; call stacks still
	/// print addresses.
	pub fn get_function_name(_pc: VirtAddr) -> Option<&'static [u8]> {
		None
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn rejects_short_buffer() {
		assert_eq!(Image::parse(&[0u8; 4]).unwrap_err(), Errno::Inval);
	}

	#[test]
	fn rejects_bad_magic() {
		let mut buf = [0u8; size_of::<Ehdr>()];
		buf[0..4].copy_from_slice(b"\0ELF");
		buf[4] = ELFCLASS32;
		assert_eq!(Image::parse(&buf).unwrap_err(), Errno::Inval);
	}

	#[test]
	fn accepts_valid_header_with_no_segments() {
		let mut buf = [0u8; size_of::<Ehdr>()];
		buf[0..4].copy_from_slice(&ELF_MAGIC);
		buf[4] = ELFCLASS32;
		let img = Image::parse(&buf).unwrap();
		assert_eq!(img.program_headers().count(), 0);
	}
}
