//! Copies across the trust boundary between the device and its caller.
//!
//! Caller memory may become inaccessible at any byte. A copy therefore
//! transfers as much as it can in one go, stops at the first faulting byte
//! and reports how many bytes made it across. Bytes transferred before the
//! fault stay valid.

/// Caller-supplied memory the device reads from (`copy_from_user`).
pub trait UserReader {
	/// Number of bytes the caller offers.
	fn len(&self) -> usize;

	fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Copies the next `dst.len()` bytes into `dst` and returns the number
	/// of bytes copied before a fault.
	fn copy_from_user(&mut self, dst: &mut [u8]) -> usize;
}

/// Caller-supplied memory the device writes into (`copy_to_user`).
pub trait UserWriter {
	/// Number of bytes the caller is willing to receive.
	fn len(&self) -> usize;

	fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Copies `src` to the caller and returns the number of bytes copied
	/// before a fault.
	fn copy_to_user(&mut self, src: &[u8]) -> usize;
}

/// Number of bytes that can be transferred starting at `pos` before the
/// fault boundary is hit.
fn accessible(pos: usize, want: usize, fault_at: Option<usize>) -> usize {
	match fault_at {
		Some(fault) => want.min(fault.saturating_sub(pos)),
		None => want,
	}
}

/// A caller buffer to read from.
#[derive(Debug)]
pub struct UserSlice<'a> {
	data: &'a [u8],
	pos: usize,
	fault_at: Option<usize>,
}

impl<'a> UserSlice<'a> {
	pub fn new(data: &'a [u8]) -> Self {
		Self {
			data,
			pos: 0,
			fault_at: None,
		}
	}

	/// Makes every byte from `offset` on inaccessible, as if the caller's
	/// mapping ended there.
	pub fn faulting_at(mut self, offset: usize) -> Self {
		self.fault_at = Some(offset);
		self
	}
}

impl UserReader for UserSlice<'_> {
	fn len(&self) -> usize {
		self.data.len() - self.pos
	}

	fn copy_from_user(&mut self, dst: &mut [u8]) -> usize {
		let want = dst.len().min(UserReader::len(self));
		let len = accessible(self.pos, want, self.fault_at);

		dst[..len].copy_from_slice(&self.data[self.pos..self.pos + len]);
		self.pos += len;
		len
	}
}

/// A caller buffer to write into.
#[derive(Debug)]
pub struct UserSliceMut<'a> {
	data: &'a mut [u8],
	pos: usize,
	fault_at: Option<usize>,
}

impl<'a> UserSliceMut<'a> {
	pub fn new(data: &'a mut [u8]) -> Self {
		Self {
			data,
			pos: 0,
			fault_at: None,
		}
	}

	/// Makes every byte from `offset` on inaccessible.
	pub fn faulting_at(mut self, offset: usize) -> Self {
		self.fault_at = Some(offset);
		self
	}

	/// Number of bytes written so far.
	pub fn written(&self) -> usize {
		self.pos
	}
}

impl UserWriter for UserSliceMut<'_> {
	fn len(&self) -> usize {
		self.data.len() - self.pos
	}

	fn copy_to_user(&mut self, src: &[u8]) -> usize {
		let want = src.len().min(UserWriter::len(self));
		let len = accessible(self.pos, want, self.fault_at);

		self.data[self.pos..self.pos + len].copy_from_slice(&src[..len]);
		self.pos += len;
		len
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn reader_advances() {
		let mut user = UserSlice::new(b"abcdef");
		let mut dst = [0u8; 4];
		assert_eq!(user.copy_from_user(&mut dst), 4);
		assert_eq!(&dst, b"abcd");
		assert_eq!(UserReader::len(&user), 2);
		assert_eq!(user.copy_from_user(&mut dst), 2);
		assert_eq!(&dst[..2], b"ef");
		assert!(UserReader::is_empty(&user));
	}

	#[test]
	fn reader_stops_at_fault() {
		let mut user = UserSlice::new(b"abcdef").faulting_at(3);
		let mut dst = [0u8; 6];
		assert_eq!(user.copy_from_user(&mut dst), 3);
		assert_eq!(&dst[..3], b"abc");
		assert_eq!(user.copy_from_user(&mut dst), 0);
	}

	#[test]
	fn writer_stops_at_fault() {
		let mut buf = [0u8; 8];
		let mut user = UserSliceMut::new(&mut buf).faulting_at(2);
		assert_eq!(user.copy_to_user(b"xyz"), 2);
		assert_eq!(user.copy_to_user(b"z"), 0);
		assert_eq!(user.written(), 2);
		assert_eq!(&buf[..3], b"xy\0");
	}

	#[test]
	fn writer_is_bounded_by_caller_length() {
		let mut buf = [0u8; 2];
		let mut user = UserSliceMut::new(&mut buf);
		assert_eq!(user.copy_to_user(b"hello"), 2);
		assert!(UserWriter::is_empty(&user));
		assert_eq!(&buf, b"he");
	}
}
