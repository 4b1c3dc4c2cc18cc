use core::result;

pub use crate::errno::Errno as Error;

pub type Result<T> = result::Result<T, Error>;
