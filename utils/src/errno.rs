//! The crate-wide error type returned across the syscall boundary.
//!
//! Every `sys_*` handler returns a non-negative success value or one of these kinds, encoded as
//! a negative machine word. Kernel-internal invariant violations are never represented here: they
//! panic instead (see the module-level discussion in `kernel::trap`).

use core::fmt;

/// Crate-wide error kind, stable across the syscall ABI boundary.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Errno {
	/// Unknown, stale, or unauthorized environment handle.
	BadEnv,
	/// The environment table is exhausted.
	NoFreeEnv,
	/// A physical page allocation failed.
	NoMem,
	/// A malformed argument was passed (bad virtual address, permission bits, alignment...).
	Inval,
	/// A user memory access check failed inside a syscall.
	Fault,
}

impl Errno {
	/// Returns the negative machine-word value used to report this error across the syscall
	/// ABI.
	pub const fn to_retval(self) -> isize {
		-(match self {
			Self::BadEnv => 1,
			Self::NoFreeEnv => 2,
			Self::NoMem => 3,
			Self::Inval => 4,
			Self::Fault => 5,
		})
	}

	/// The inverse of [`Self::to_retval`]: decodes a syscall's raw return value.
	///
	/// Used on the calling side of the syscall boundary (in this codebase, `userland`'s syscall
	/// stubs) to turn the raw machine word the kernel wrote into `eax` back into a typed result,
	/// rather than every caller re-deriving the encoding by hand.
	pub const fn from_retval(v: i32) -> EResult<u32> {
		match v {
			v if v >= 0 => Ok(v as u32),
			-1 => Err(Self::BadEnv),
			-2 => Err(Self::NoFreeEnv),
			-3 => Err(Self::NoMem),
			-4 => Err(Self::Inval),
			-5 => Err(Self::Fault),
			// An out-of-range negative value from a conforming kernel should not happen; treat
			// it as a malformed argument rather than panicking here, over the syscall ABI.
			_ => Err(Self::Inval),
		}
	}
}

impl fmt::Display for Errno {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			Self::BadEnv => "bad environment id",
			Self::NoFreeEnv => "no free environment slot",
			Self::NoMem => "out of physical memory",
			Self::Inval => "invalid argument",
			Self::Fault => "user memory access fault",
		};
		f.write_str(s)
	}
}

/// Shorthand for a [`Result`] whose error type is [`Errno`].
pub type EResult<T> = Result<T, Errno>;

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn retval_is_negative_and_stable() {
		assert_eq!(Errno::BadEnv.to_retval(), -1);
		assert_eq!(Errno::NoFreeEnv.to_retval(), -2);
		assert_eq!(Errno::NoMem.to_retval(), -3);
		assert_eq!(Errno::Inval.to_retval(), -4);
		assert_eq!(Errno::Fault.to_retval(), -5);
	}

	#[test]
	fn from_retval_roundtrips_through_to_retval() {
		for e in [
			Errno::BadEnv,
			Errno::NoFreeEnv,
			Errno::NoMem,
			Errno::Inval,
			Errno::Fault,
		] {
			assert_eq!(Errno::from_retval(e.to_retval() as i32), Err(e));
		}
	}

	#[test]
	fn from_retval_accepts_non_negative_success_values() {
		assert_eq!(Errno::from_retval(0), Ok(0));
		assert_eq!(Errno::from_retval(42), Ok(42));
	}
}
