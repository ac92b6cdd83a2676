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

//! The console: a single VGA text-mode display writer.
//!
//! Line discipline, job control and serial console mirroring are external-collaborator territory
//! (console/keyboard/serial drivers, out of scope); what remains is the minimal surface the
//! logger needs to put text on screen.

pub mod vga;

use crate::sync::spin::IntMutex;
use core::cmp::min;

/// The global console.
pub static TTY: Console = Console {
	display: IntMutex::new(Display::new()),
};

/// Holds the single display the logger writes through.
pub struct Console {
	pub display: IntMutex<Display>,
}

/// A raw VGA text-mode writer: no scrollback history, no escape-sequence parsing, no input.
pub struct Display {
	cursor_x: u16,
	cursor_y: u16,
	color: vga::Color,
}

impl Display {
	/// Creates a writer starting at the top-left corner in the default color.
	const fn new() -> Self {
		Self {
			cursor_x: 0,
			cursor_y: 0,
			color: vga::DEFAULT_COLOR,
		}
	}

	/// Scrolls the screen up by one line, clearing the bottom line.
	fn scroll(&mut self) {
		unsafe {
			let buf = vga::get_buffer_virt();
			let row_len = vga::WIDTH as usize;
			buf.copy_from(buf.add(row_len), row_len * (vga::HEIGHT as usize - 1));
			let blank = (vga::DEFAULT_COLOR as vga::Char) << 8;
			for x in 0..vga::WIDTH {
				buf.add(row_len * (vga::HEIGHT as usize - 1) + x as usize).write(blank);
			}
		}
		self.cursor_y = vga::HEIGHT - 1;
	}

	/// Writes one raw byte (`\n`, `\r`, `\t`, `\x08` handled specially; everything else printed
	/// as a glyph at the cursor).
	fn putchar(&mut self, c: u8) {
		match c {
			b'\n' => {
				self.cursor_x = 0;
				self.cursor_y += 1;
			}
			b'\r' => self.cursor_x = 0,
			b'\t' => self.cursor_x = min(self.cursor_x + 4, vga::WIDTH - 1),
			0x08 => {
				if self.cursor_x > 0 {
					self.cursor_x -= 1;
				}
			}
			_ => {
				let entry = (c as vga::Char) | ((self.color as vga::Char) << 8);
				unsafe {
					vga::get_buffer_virt()
						.add((self.cursor_y as usize) * (vga::WIDTH as usize) + self.cursor_x as usize)
						.write(entry);
				}
				self.cursor_x += 1;
			}
		}
		if self.cursor_x >= vga::WIDTH {
			self.cursor_x = 0;
			self.cursor_y += 1;
		}
		if self.cursor_y >= vga::HEIGHT {
			self.scroll();
		}
		vga::move_cursor(self.cursor_x, self.cursor_y);
	}

	/// Writes `buffer` to the screen.
	pub fn write(&mut self, buffer: &[u8]) {
		for &c in buffer {
			self.putchar(c);
		}
	}
}

/// Initializes the console: enables the hardware cursor at the top-left corner.
pub(crate) fn init() {
	vga::enable_cursor();
	vga::move_cursor(0, 0);
}
