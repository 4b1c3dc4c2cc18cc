//! The device's message buffer.

use alloc::borrow::Cow;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::io;
use crate::mm::BackingAllocator;
use crate::uaccess::UserReader;

/// An owned, null-terminated byte run.
///
/// The logical content ends at the first zero byte. A message without any
/// storage is empty, i.e. its terminator is at position 0.
#[derive(Default, Clone, PartialEq, Eq)]
pub struct Message {
	bytes: Vec<u8>,
}

impl Message {
	/// A message with no storage at all.
	pub const fn empty() -> Self {
		Self { bytes: Vec::new() }
	}

	/// Allocates a copy of `content` plus terminator.
	pub fn from_bytes(alloc: &dyn BackingAllocator, content: &[u8]) -> io::Result<Self> {
		let mut bytes = alloc.allocate(content.len() + 1)?;
		bytes[..content.len()].copy_from_slice(content);
		Ok(Self { bytes })
	}

	/// Allocates room for `len` bytes plus terminator and fills it from the
	/// caller.
	///
	/// Returns the message together with the number of bytes that crossed
	/// the boundary. A fault truncates the message at that point.
	pub fn copy_from_user(
		alloc: &dyn BackingAllocator,
		src: &mut dyn UserReader,
		len: usize,
	) -> io::Result<(Self, usize)> {
		let size = len.checked_add(1).ok_or(io::Error::Nomem)?;
		let mut bytes = alloc.allocate(size)?;
		let copied = src.copy_from_user(&mut bytes[..len]);

		// the allocation is zeroed, so this only matters for the bytes a
		// fault left behind
		bytes[copied] = 0;
		Ok((Self { bytes }, copied))
	}

	/// Returns `true` if the byte at `pos` terminates the message.
	pub fn is_terminator(&self, pos: usize) -> bool {
		self.bytes.get(pos).is_none_or(|byte| *byte == 0)
	}

	/// Returns the content from `pos` up to, not including, the terminator.
	pub fn content_from(&self, pos: usize) -> &[u8] {
		let tail = self.bytes.get(pos..).unwrap_or_default();
		let end = tail.iter().position(|byte| *byte == 0).unwrap_or(tail.len());
		&tail[..end]
	}

	pub fn content(&self) -> &[u8] {
		self.content_from(0)
	}

	pub fn len(&self) -> usize {
		self.content().len()
	}

	pub fn is_empty(&self) -> bool {
		self.is_terminator(0)
	}

	/// Size of the backing allocation, terminator included.
	pub fn capacity(&self) -> usize {
		self.bytes.len()
	}

	pub fn to_string_lossy(&self) -> Cow<'_, str> {
		String::from_utf8_lossy(self.content())
	}
}

impl fmt::Debug for Message {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Message")
			.field("content", &self.to_string_lossy())
			.field("capacity", &self.capacity())
			.finish()
	}
}

impl fmt::Display for Message {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.to_string_lossy())
	}
}
