//! The message device.
//!
//! One client at a time may hold a session on the device. Writing replaces
//! the whole message, reading streams it from a cursor. When a read finds
//! the cursor at the terminator it reports end-of-stream by returning 0 and
//! rewinds the cursor, so the next read replays the message from the start.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU8, Ordering};

use hermit_sync::SpinMutex;

use crate::config::ReleasePolicy;
use crate::fd::FileOperations;
use crate::io;
use crate::message::Message;
use crate::mm::{BackingAllocator, Heap};
use crate::module::ThisModule;
use crate::uaccess::{UserReader, UserWriter};

const CLOSED: u8 = 0;
const OPEN: u8 = 1;
/// Released under [`ReleasePolicy::SingleShot`], never opens again.
const RETIRED: u8 = 2;

#[derive(Debug)]
struct State {
	message: Message,
	/// Read position, only meaningful during a session
	cursor: usize,
}

#[derive(Debug)]
pub struct HelloDevice<A: BackingAllocator = Heap> {
	admission: AtomicU8,
	release: ReleasePolicy,
	state: SpinMutex<State>,
	owner: Arc<ThisModule>,
	alloc: A,
}

impl<A: BackingAllocator> HelloDevice<A> {
	pub fn new(owner: Arc<ThisModule>, message: Message, release: ReleasePolicy, alloc: A) -> Self {
		Self {
			admission: AtomicU8::new(CLOSED),
			release,
			state: SpinMutex::new(State { message, cursor: 0 }),
			owner,
			alloc,
		}
	}

	/// Returns `true` while a session is active.
	pub fn is_open(&self) -> bool {
		self.admission.load(Ordering::Acquire) == OPEN
	}

	/// Copy of the current message, without terminator.
	pub fn message(&self) -> Vec<u8> {
		self.state.lock().message.content().to_vec()
	}

	pub fn cursor(&self) -> usize {
		self.state.lock().cursor
	}

	pub fn owner(&self) -> &Arc<ThisModule> {
		&self.owner
	}

	/// Drops the message storage. Used when the module goes away.
	pub(crate) fn free_message(&self) {
		let mut state = self.state.lock();
		debug!("Freeing message buffer of {} bytes", state.message.capacity());
		state.message = Message::empty();
		state.cursor = 0;
	}

	fn ensure_open(&self) -> io::Result<()> {
		if self.is_open() {
			Ok(())
		} else {
			Err(io::Error::Badf)
		}
	}
}

impl<A: BackingAllocator> FileOperations for HelloDevice<A> {
	fn open(&self) -> io::Result<()> {
		if self
			.admission
			.compare_exchange(CLOSED, OPEN, Ordering::AcqRel, Ordering::Acquire)
			.is_err()
		{
			debug!("Device is busy");
			return Err(io::Error::Busy);
		}

		if !self.owner.try_get() {
			self.admission.store(CLOSED, Ordering::Release);
			return Err(io::Error::Nodev);
		}

		let mut state = self.state.lock();
		state.cursor = 0;
		info!(
			"open string: {}",
			state.message.to_string_lossy().trim_end_matches('\n')
		);

		Ok(())
	}

	fn release(&self) {
		let next = match self.release {
			ReleasePolicy::Reopen => CLOSED,
			ReleasePolicy::SingleShot => RETIRED,
		};

		if self
			.admission
			.compare_exchange(OPEN, next, Ordering::AcqRel, Ordering::Acquire)
			.is_err()
		{
			warn!("release without an open session");
			return;
		}

		self.owner.put();
		info!("release");
	}

	fn read(&self, buf: &mut dyn UserWriter) -> io::Result<usize> {
		self.ensure_open()?;
		if buf.is_empty() {
			return Ok(0);
		}

		let mut guard = self.state.lock();
		let State { message, cursor } = &mut *guard;

		if message.is_terminator(*cursor) {
			*cursor = 0;
			return Ok(0);
		}

		let requested = buf.len();
		let pending = message.content_from(*cursor);
		let len = pending.len().min(requested);
		let copied = buf.copy_to_user(&pending[..len]);
		*cursor += copied;

		if copied < len {
			warn!("read faulted after {copied} of {len} bytes");
		}
		info!(
			"read size {} from string: {}",
			requested - copied,
			message.to_string_lossy().trim_end_matches('\n')
		);

		Ok(copied)
	}

	fn write(&self, buf: &mut dyn UserReader) -> io::Result<usize> {
		self.ensure_open()?;

		let len = buf.len();
		info!("write {len} bytes");

		let mut state = self.state.lock();
		// the old buffer is gone even if the new one cannot be allocated
		state.message = Message::empty();
		state.cursor = 0;

		let (message, copied) = Message::copy_from_user(&self.alloc, buf, len)
			.inspect_err(|err| error!("Unable to allocate {} bytes: {err}", len.saturating_add(1)))?;
		if copied < len {
			warn!("write faulted after {copied} of {len} bytes");
		}
		state.message = message;

		Ok(copied)
	}
}
