//! Backing memory for message buffers.

use alloc::vec::Vec;
use core::fmt;

use crate::io;

/// Dynamic memory provided by the environment.
///
/// Allocation either hands out the requested number of zeroed bytes or
/// fails, it never returns a shorter buffer. Memory is released by dropping
/// the returned vector.
pub trait BackingAllocator: Send + Sync + fmt::Debug {
	fn allocate(&self, len: usize) -> io::Result<Vec<u8>>;
}

/// Allocates from the global heap.
///
/// An optional limit caps the size of a single allocation, like
/// `KMALLOC_MAX_SIZE` does for `kmalloc`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Heap {
	limit: Option<usize>,
}

impl Heap {
	pub const fn new() -> Self {
		Self { limit: None }
	}

	pub const fn with_limit(limit: usize) -> Self {
		Self { limit: Some(limit) }
	}

	pub fn limit(&self) -> Option<usize> {
		self.limit
	}
}

impl BackingAllocator for Heap {
	fn allocate(&self, len: usize) -> io::Result<Vec<u8>> {
		if self.limit.is_some_and(|limit| len > limit) {
			debug!("Refusing allocation of {len} bytes, limit is {:?}", self.limit);
			return Err(io::Error::Nomem);
		}

		let mut buf = Vec::new();
		buf.try_reserve_exact(len).map_err(|_| io::Error::Nomem)?;
		buf.resize(len, 0);
		trace!("Allocated {len} bytes at {:p}", buf.as_ptr());
		Ok(buf)
	}
}
