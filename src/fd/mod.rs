use alloc::sync::Arc;
use core::fmt;

use crate::io;
use crate::uaccess::{UserReader, UserSlice, UserSliceMut, UserWriter};

/// The operations a character device offers to whoever dispatches file
/// requests to it.
///
/// Every request is a single synchronous step: nothing blocks and nothing
/// is queued.
pub trait FileOperations: Sync + Send + fmt::Debug {
	/// `open` starts a session
	fn open(&self) -> io::Result<()> {
		Ok(())
	}

	/// `release` ends the session started by `open`
	fn release(&self) {}

	/// `read` copies up to `buf.len()` bytes to the caller
	fn read(&self, _buf: &mut dyn UserWriter) -> io::Result<usize> {
		Err(io::Error::Nosys)
	}

	/// `write` takes up to `buf.len()` bytes from the caller
	fn write(&self, _buf: &mut dyn UserReader) -> io::Result<usize> {
		Err(io::Error::Nosys)
	}
}

/// An open session on a device.
///
/// The session is released when the handle is dropped.
#[derive(Debug)]
pub struct OpenFile {
	ops: Arc<dyn FileOperations>,
}

impl OpenFile {
	pub fn open(ops: Arc<dyn FileOperations>) -> io::Result<Self> {
		ops.open()?;
		Ok(Self { ops })
	}

	/// Reads into caller memory that may fault.
	pub fn read_user(&mut self, buf: &mut dyn UserWriter) -> io::Result<usize> {
		self.ops.read(buf)
	}

	/// Writes from caller memory that may fault.
	pub fn write_user(&mut self, buf: &mut dyn UserReader) -> io::Result<usize> {
		self.ops.write(buf)
	}
}

impl embedded_io::ErrorType for OpenFile {
	type Error = io::Error;
}

impl embedded_io::Read for OpenFile {
	fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
		self.read_user(&mut UserSliceMut::new(buf))
	}
}

impl embedded_io::Write for OpenFile {
	fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
		self.write_user(&mut UserSlice::new(buf))
	}

	fn flush(&mut self) -> Result<(), Self::Error> {
		Ok(())
	}
}

impl Drop for OpenFile {
	fn drop(&mut self) {
		self.ops.release();
	}
}

#[cfg(test)]
mod tests {
	use core::sync::atomic::{AtomicUsize, Ordering};

	use embedded_io::{Read, Write};

	use super::*;

	#[derive(Debug, Default)]
	struct Counting {
		opened: AtomicUsize,
		released: AtomicUsize,
	}

	impl FileOperations for Counting {
		fn open(&self) -> io::Result<()> {
			self.opened.fetch_add(1, Ordering::Relaxed);
			Ok(())
		}

		fn release(&self) {
			self.released.fetch_add(1, Ordering::Relaxed);
		}
	}

	#[derive(Debug)]
	struct Refusing;

	impl FileOperations for Refusing {
		fn open(&self) -> io::Result<()> {
			Err(io::Error::Busy)
		}

		fn release(&self) {
			panic!("release without open");
		}
	}

	#[test]
	fn drop_releases() {
		let ops = Arc::new(Counting::default());
		let file = OpenFile::open(ops.clone()).unwrap();
		assert_eq!(ops.opened.load(Ordering::Relaxed), 1);
		assert_eq!(ops.released.load(Ordering::Relaxed), 0);
		drop(file);
		assert_eq!(ops.released.load(Ordering::Relaxed), 1);
	}

	#[test]
	fn failed_open_is_not_released() {
		assert_eq!(OpenFile::open(Arc::new(Refusing)).unwrap_err(), io::Error::Busy);
	}

	#[test]
	fn missing_operations() {
		let mut file = OpenFile::open(Arc::new(Counting::default())).unwrap();
		let mut buf = [0u8; 4];
		assert_eq!(file.read(&mut buf), Err(io::Error::Nosys));
		assert_eq!(file.write(b"data"), Err(io::Error::Nosys));
	}
}
