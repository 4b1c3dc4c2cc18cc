//! Kernel message ring.
//!
//! Every record produced by the kernel logger ends up here, similar to the
//! ring behind `dmesg`. Once the ring is full the oldest bytes are dropped.

use alloc::vec::Vec;
use core::fmt;

use heapless::Deque;
use hermit_sync::SpinMutex;

pub(crate) const KMSG_SIZE: usize = 0x10000;

static KMSG: SpinMutex<Deque<u8, KMSG_SIZE>> = SpinMutex::new(Deque::new());

fn push(ring: &mut Deque<u8, KMSG_SIZE>, byte: u8) {
	if ring.is_full() {
		ring.pop_front();
	}
	// cannot fail, a slot was freed above
	let _ = ring.push_back(byte);
}

/// Appends formatted text to the ring while holding the lock, so that a
/// record is never interleaved with another one.
pub(crate) fn write_fmt(args: fmt::Arguments<'_>) {
	struct Writer<'a>(&'a mut Deque<u8, KMSG_SIZE>);

	impl fmt::Write for Writer<'_> {
		fn write_str(&mut self, s: &str) -> fmt::Result {
			for byte in s.bytes() {
				push(self.0, byte);
			}
			Ok(())
		}
	}

	let mut ring = KMSG.lock();
	let _ = fmt::write(&mut Writer(&mut ring), args);
}

/// Returns a copy of the ring contents, oldest byte first.
pub fn read() -> Vec<u8> {
	KMSG.lock().iter().copied().collect()
}

/// Returns `true` if the ring currently holds `needle`.
pub fn contains(needle: &str) -> bool {
	let haystack = read();
	let needle = needle.as_bytes();
	needle.is_empty() || haystack.windows(needle.len()).any(|window| window == needle)
}
