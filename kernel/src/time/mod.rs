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

//! Wall-clock time, reduced to exactly what the core needs: a monotonic seconds counter published
//! to user space through the virtual-syscall page on every clock tick.
//!
//! PIT/RTC calibration, hardware clock abstraction, and POSIX itimers are external-collaborator
//! territory (see the crate's Non-goals); the RTC periodic-interrupt rate assumed here is fixed,
//! not calibrated.

mod rtc;

use core::sync::atomic::{AtomicU32, Ordering};

/// The periodic RTC interrupt rate this kernel configures the hardware to, in Hz.
const TICKS_PER_SECOND: u32 = 2;

/// Ticks seen since boot.
static TICKS: AtomicU32 = AtomicU32::new(0);

/// Seconds elapsed since boot, as published to `vsys[VSYS_gettime]`.
static SECONDS: AtomicU32 = AtomicU32::new(0);

/// Advances the tick counter by one RTC period; called from the clock IRQ handler.
///
/// Returns the updated seconds-since-boot count, which the caller publishes to the
/// virtual-syscall page.
pub fn tick() -> u32 {
	let ticks = TICKS.fetch_add(1, Ordering::Relaxed) + 1;
	if ticks % TICKS_PER_SECOND == 0 {
		SECONDS.fetch_add(1, Ordering::Relaxed) + 1
	} else {
		SECONDS.load(Ordering::Relaxed)
	}
}

/// Returns the current seconds-since-boot count.
pub fn seconds() -> u32 {
	SECONDS.load(Ordering::Relaxed)
}

/// Programs the RTC hardware and enables its periodic interrupt.
///
/// Must be called once at boot, after [`crate::idt::init`] has unmasked `IRQ_CLOCK` at the PIC.
pub fn init() {
	rtc::init();
}

/// Acknowledges the pending RTC periodic interrupt; must be called once per `IRQ_CLOCK` dispatch.
pub fn acknowledge() {
	rtc::acknowledge();
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn tick_advances_seconds_at_configured_rate() {
		TICKS.store(0, Ordering::Relaxed);
		SECONDS.store(0, Ordering::Relaxed);
		for _ in 0..TICKS_PER_SECOND - 1 {
			tick();
		}
		assert_eq!(seconds(), 0);
		tick();
		assert_eq!(seconds(), 1);
	}
}
