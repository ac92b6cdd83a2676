//! Small freestanding utility crate shared between the kernel, its build tooling, and the
//! `userland` crate that links against the syscall surface [`abi`] describes.
//!
//! Everything here is either architecture glue (the [`interrupt`] module), the kernel/user ABI
//! boundary ([`abi`]), or a handful of primitives ([`errno`], [`bit_size_of`],
//! [`DisplayableStr`]) that are too small to deserve their own crate but too widely used to
//! duplicate across kernel modules.

#![cfg_attr(not(test), no_std)]
#![deny(warnings)]

pub mod abi;
pub mod errno;
pub mod interrupt;

use core::{fmt, mem::size_of, str};

/// Returns the size of the given type in bits.
pub const fn bit_size_of<T>() -> usize {
	size_of::<T>() * 8
}

/// Wrapper allowing to print a byte slice as a string, replacing invalid UTF-8 sequences with the
/// Unicode replacement character.
pub struct DisplayableStr<'s>(pub &'s [u8]);

impl fmt::Display for DisplayableStr<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut buf = self.0;
		loop {
			match str::from_utf8(buf) {
				Ok(s) => return f.write_str(s),
				Err(e) => {
					let (valid, rest) = buf.split_at(e.valid_up_to());
					// Safe because `valid` has just been validated by `from_utf8`.
					f.write_str(unsafe { str::from_utf8_unchecked(valid) })?;
					f.write_char(char::REPLACEMENT_CHARACTER)?;
					let Some(len) = e.error_len() else {
						return Ok(());
					};
					buf = &rest[len..];
					if buf.is_empty() {
						return Ok(());
					}
				}
			}
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn bit_size_of_primitives() {
		assert_eq!(bit_size_of::<u8>(), 8);
		assert_eq!(bit_size_of::<u16>(), 16);
		assert_eq!(bit_size_of::<u32>(), 32);
	}

	#[test]
	fn displayable_str_valid() {
		assert_eq!(format!("{}", DisplayableStr(b"hello")), "hello");
	}
}
