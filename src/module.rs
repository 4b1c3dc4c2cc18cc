//! Module lifecycle: reference counting and load/unload of the device.

use alloc::sync::Arc;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::config::{
	CLASS_NAME, Config, DEVICE_COUNT, DEVICE_FIRST, DEVICE_NAME, MODULE_NAME, VERSION,
};
use crate::device::HelloDevice;
use crate::fs::{DeviceNumber, Registrar};
use crate::io;
use crate::logging;
use crate::message::Message;
use crate::mm::Heap;

/// Set once the module is going away. The remaining bits count references.
const GOING: usize = 1 << (usize::BITS - 1);

/// Bookkeeping of a loaded module.
///
/// Every open session holds a reference, and the module cannot be unloaded
/// while references exist. Reference count and state share one atomic word,
/// so taking a reference and starting the unload exclude each other.
#[derive(Debug)]
pub struct ThisModule {
	name: &'static str,
	version: &'static str,
	refcnt: AtomicUsize,
}

impl ThisModule {
	pub const fn new(name: &'static str, version: &'static str) -> Self {
		Self {
			name,
			version,
			refcnt: AtomicUsize::new(0),
		}
	}

	pub fn name(&self) -> &'static str {
		self.name
	}

	pub fn version(&self) -> &'static str {
		self.version
	}

	pub fn refcount(&self) -> usize {
		self.refcnt.load(Ordering::SeqCst) & !GOING
	}

	pub fn is_live(&self) -> bool {
		self.refcnt.load(Ordering::SeqCst) & GOING == 0
	}

	/// Takes a reference unless the module is going away.
	pub fn try_get(&self) -> bool {
		self.refcnt
			.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |cnt| {
				if cnt & GOING == 0 {
					cnt.checked_add(1).filter(|cnt| cnt & GOING == 0)
				} else {
					None
				}
			})
			.is_ok()
	}

	pub fn put(&self) {
		let res = self
			.refcnt
			.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |cnt| {
				if cnt & !GOING == 0 {
					None
				} else {
					Some(cnt - 1)
				}
			});
		if res.is_err() {
			warn!("{}: reference count underflow", self.name);
		}
	}

	/// Marks the module as going away.
	///
	/// Fails with `EBUSY` while references are held, and with `ENODEV` if
	/// the module is already going away. A failed unload leaves the module
	/// untouched.
	pub fn try_unload(&self) -> io::Result<()> {
		match self
			.refcnt
			.compare_exchange(0, GOING, Ordering::SeqCst, Ordering::SeqCst)
		{
			Ok(_) => Ok(()),
			Err(cnt) if cnt & GOING != 0 => Err(io::Error::Nodev),
			Err(_) => Err(io::Error::Busy),
		}
	}
}

/// The loaded `hello_dev` module.
#[derive(Debug)]
pub struct HelloModule {
	this: Arc<ThisModule>,
	dev: DeviceNumber,
	device: Arc<HelloDevice>,
	registrar: Arc<dyn Registrar>,
}

impl HelloModule {
	/// Allocates the message buffer, registers the character device and
	/// publishes `/dev/hello_dev_device`.
	///
	/// Steps that already succeeded are undone if a later one fails.
	pub fn init(config: Config, registrar: Arc<dyn Registrar>) -> io::Result<Self> {
		logging::init(config.log_level);

		let this = Arc::new(ThisModule::new(MODULE_NAME, VERSION));
		let alloc = config.max_message.map_or_else(Heap::new, Heap::with_limit);
		let message = Message::from_bytes(&alloc, config.message.as_bytes())
			.inspect_err(|err| error!("Unable to allocate the message buffer: {err}"))?;
		let device = Arc::new(HelloDevice::new(this.clone(), message, config.release, alloc));

		let dev = registrar
			.alloc_chrdev_region(DEVICE_FIRST, DEVICE_COUNT, MODULE_NAME)
			.inspect_err(|err| error!("Registering char device failed with {err}"))?;

		if let Err(err) = registrar.cdev_add(dev, DEVICE_COUNT, device.clone()) {
			registrar.unregister_chrdev_region(dev, DEVICE_COUNT);
			error!("Can not add char device: {err}");
			return Err(err);
		}

		if let Err(err) = registrar.class_create(CLASS_NAME) {
			registrar.cdev_del(dev, DEVICE_COUNT);
			registrar.unregister_chrdev_region(dev, DEVICE_COUNT);
			error!("Can not create device class {CLASS_NAME}: {err}");
			return Err(err);
		}

		if let Err(err) = registrar.device_create(CLASS_NAME, dev, DEVICE_NAME) {
			registrar.class_destroy(CLASS_NAME);
			registrar.cdev_del(dev, DEVICE_COUNT);
			registrar.unregister_chrdev_region(dev, DEVICE_COUNT);
			error!("Can not create /dev/{DEVICE_NAME}: {err}");
			return Err(err);
		}

		infoheader!(" HELLO_DEV ");
		infoentry!("Device node", "/dev/{}", DEVICE_NAME);
		infoentry!("Version", this.version());
		infoentry!("Device class", CLASS_NAME);
		infoentry!("Release policy", "{:?}", config.release);
		infoentry!("Message bytes", config.message.len());
		infofooter!();
		info!("init {dev}");

		Ok(Self {
			this,
			dev,
			device,
			registrar,
		})
	}

	pub fn dev(&self) -> DeviceNumber {
		self.dev
	}

	pub fn device(&self) -> &Arc<HelloDevice> {
		&self.device
	}

	pub fn this(&self) -> &Arc<ThisModule> {
		&self.this
	}

	/// Unloads the module.
	///
	/// Fails with `EBUSY` while a session is open; the module stays fully
	/// functional in that case. Dropping a `HelloModule` does not unload it,
	/// the device stays registered until `exit` succeeds.
	pub fn exit(&self) -> io::Result<()> {
		self.this.try_unload().inspect_err(|err| {
			warn!("Unable to unload {}: {err}", self.this.name());
		})?;

		self.registrar.device_destroy(CLASS_NAME, self.dev);
		self.registrar.class_destroy(CLASS_NAME);
		self.registrar.cdev_del(self.dev, DEVICE_COUNT);
		self.registrar.unregister_chrdev_region(self.dev, DEVICE_COUNT);
		self.device.free_message();
		info!("exit");

		Ok(())
	}
}

impl Drop for HelloModule {
	fn drop(&mut self) {
		if self.this.is_live() {
			warn!(
				"{} dropped without exit, /dev/{DEVICE_NAME} stays registered",
				self.this.name()
			);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn references() {
		let this = ThisModule::new("refs", "01");
		assert!(this.try_get());
		assert!(this.try_get());
		assert_eq!(this.refcount(), 2);
		assert_eq!(this.try_unload(), Err(io::Error::Busy));
		assert!(this.is_live());
		this.put();
		this.put();
		this.put();
		assert_eq!(this.refcount(), 0);
	}

	#[test]
	fn unload_is_final() {
		let this = ThisModule::new("final", "01");
		this.try_unload().unwrap();
		assert!(!this.is_live());
		assert!(!this.try_get());
		assert_eq!(this.refcount(), 0);
		assert_eq!(this.try_unload(), Err(io::Error::Nodev));
	}

	#[test]
	fn busy_unload_keeps_module_live() {
		let this = ThisModule::new("busy", "01");
		assert!(this.try_get());

		std::thread::scope(|s| {
			s.spawn(|| {
				for _ in 0..10_000 {
					assert_eq!(this.try_unload(), Err(io::Error::Busy));
				}
			});
			s.spawn(|| {
				for _ in 0..10_000 {
					assert!(this.try_get());
					this.put();
				}
			});
		});

		assert!(this.is_live());
		assert_eq!(this.refcount(), 1);
		this.put();
		this.try_unload().unwrap();
	}
}
