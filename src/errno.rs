//! Error numbers reported by the device and its registration layer.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use thiserror::Error;

/// The error type for device operations.
///
/// The values of these error numbers are the same as in Linux, so that a
/// syscall layer can hand them back unchanged (negated) to user space.
#[derive(Error, TryFromPrimitive, IntoPrimitive, PartialEq, Eq, Clone, Copy, Debug)]
#[repr(i32)]
pub enum Errno {
	/// No such file or directory
	#[doc(alias = "ENOENT")]
	#[error("No such file or directory")]
	Noent = 2,

	/// Bad file number
	#[doc(alias = "EBADF")]
	#[error("Bad file number")]
	Badf = 9,

	/// Out of memory
	#[doc(alias = "ENOMEM")]
	#[error("Out of memory")]
	Nomem = 12,

	/// Device or resource busy
	#[doc(alias = "EBUSY")]
	#[error("Device or resource busy")]
	Busy = 16,

	/// File exists
	#[doc(alias = "EEXIST")]
	#[error("File exists")]
	Exist = 17,

	/// No such device
	#[doc(alias = "ENODEV")]
	#[error("No such device")]
	Nodev = 19,

	/// Invalid argument
	#[doc(alias = "EINVAL")]
	#[error("Invalid argument")]
	Inval = 22,

	/// Invalid system call number
	#[doc(alias = "ENOSYS")]
	#[error("Invalid system call number")]
	Nosys = 38,
}

impl embedded_io::Error for Errno {
	fn kind(&self) -> embedded_io::ErrorKind {
		use embedded_io::ErrorKind;

		match self {
			Self::Noent | Self::Nodev => ErrorKind::NotFound,
			Self::Exist => ErrorKind::AlreadyExists,
			Self::Inval | Self::Badf => ErrorKind::InvalidInput,
			Self::Nomem => ErrorKind::OutOfMemory,
			Self::Nosys => ErrorKind::Unsupported,
			Self::Busy => ErrorKind::Other,
		}
	}
}

/// Conversion into the signed return value of a file operation.
///
/// Successful results keep their value, errors are returned as the negated
/// error number (e.g. `-EBUSY`).
pub trait ToErrno {
	fn to_errno(&self) -> Option<i32> {
		None
	}

	fn into_ret(self) -> isize;
}

impl ToErrno for Errno {
	fn to_errno(&self) -> Option<i32> {
		Some(i32::from(*self))
	}

	fn into_ret(self) -> isize {
		-(i32::from(self) as isize)
	}
}

impl ToErrno for crate::io::Result<usize> {
	fn to_errno(&self) -> Option<i32> {
		self.as_ref().err().and_then(ToErrno::to_errno)
	}

	fn into_ret(self) -> isize {
		match self {
			Ok(len) => isize::try_from(len).unwrap_or(isize::MAX),
			Err(errno) => errno.into_ret(),
		}
	}
}

impl ToErrno for crate::io::Result<()> {
	fn to_errno(&self) -> Option<i32> {
		self.as_ref().err().and_then(ToErrno::to_errno)
	}

	fn into_ret(self) -> isize {
		match self {
			Ok(()) => 0,
			Err(errno) => errno.into_ret(),
		}
	}
}
