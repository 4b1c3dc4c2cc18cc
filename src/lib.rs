//! A single-client character device exposing an in-memory message buffer.
//!
//! The device holds a null-terminated message, initially `"Hello, world!\n"`.
//! Only one session may be open at a time. Writing replaces the whole
//! message; reading streams it from a cursor and signals end-of-stream with
//! a zero-length read, after which the stream starts over.
//!
//! [`module::HelloModule`] loads the device into a [`fs::Registrar`] and
//! publishes it as `/dev/hello_dev_device`:
//!
//! ```
//! use std::sync::Arc;
//!
//! use embedded_io::{Read, Write};
//! use hello_dev::config::Config;
//! use hello_dev::fs::DevRegistry;
//! use hello_dev::module::HelloModule;
//!
//! let registry = Arc::new(DevRegistry::new());
//! let module = HelloModule::init(Config::default(), registry.clone()).unwrap();
//!
//! let mut file = registry.open("/dev/hello_dev_device").unwrap();
//! let mut buf = [0u8; 32];
//! let n = file.read(&mut buf).unwrap();
//! assert_eq!(&buf[..n], b"Hello, world!\n");
//!
//! file.write_all(b"bye").unwrap();
//! let n = file.read(&mut buf).unwrap();
//! assert_eq!(&buf[..n], b"bye");
//!
//! drop(file);
//! module.exit().unwrap();
//! ```

#![no_std]

#[cfg(test)]
extern crate std;

extern crate alloc;
#[macro_use]
extern crate log;

#[macro_use]
mod logging;

pub mod config;
pub mod device;
pub mod errno;
pub mod fd;
pub mod fs;
pub mod io;
pub mod kmsg;
pub mod message;
pub mod mm;
pub mod module;
pub mod uaccess;

pub use logging::init as init_logging;
