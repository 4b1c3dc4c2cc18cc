//! Character device registration.
//!
//! The host hands out device numbers, keeps the table of registered
//! character devices and publishes device nodes under `/dev`. [`Registrar`]
//! is that interface, [`DevRegistry`] an in-memory implementation of it.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use core::fmt;
use core::ops::Range;

use hermit_sync::SpinMutex;

use crate::fd::{FileOperations, OpenFile};
use crate::io;

const MINORBITS: u32 = 20;
const MINORMASK: u32 = (1 << MINORBITS) - 1;

/// Dynamically allocated majors are handed out from the top down.
const CHRDEV_MAJOR_DYN_START: u32 = 254;
const CHRDEV_MAJOR_DYN_END: u32 = 234;

/// The minors `first..first + count`, if the range is non-empty and fits
/// into the minor number space.
fn minor_range(first: u32, count: u32) -> io::Result<Range<u32>> {
	match first.checked_add(count) {
		Some(end) if count > 0 && end <= MINORMASK + 1 => Ok(first..end),
		_ => Err(io::Error::Inval),
	}
}

/// A `major:minor` pair, packed like the kernel's `dev_t`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct DeviceNumber(u32);

impl DeviceNumber {
	pub const fn new(major: u32, minor: u32) -> Self {
		Self((major << MINORBITS) | (minor & MINORMASK))
	}

	pub const fn major(self) -> u32 {
		self.0 >> MINORBITS
	}

	pub const fn minor(self) -> u32 {
		self.0 & MINORMASK
	}

	pub const fn from_raw(raw: u32) -> Self {
		Self(raw)
	}

	pub const fn as_raw(self) -> u32 {
		self.0
	}
}

impl fmt::Display for DeviceNumber {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.major(), self.minor())
	}
}

/// Registration services the host offers to a device module.
///
/// Teardown calls never fail; tearing down something that is not
/// registered is ignored.
pub trait Registrar: Send + Sync + fmt::Debug {
	/// Reserves `count` minors starting at `first_minor` under a free major.
	fn alloc_chrdev_region(&self, first_minor: u32, count: u32, name: &str)
	-> io::Result<DeviceNumber>;

	fn unregister_chrdev_region(&self, first: DeviceNumber, count: u32);

	/// Makes `ops` reachable through `count` device numbers starting at `first`.
	fn cdev_add(
		&self,
		first: DeviceNumber,
		count: u32,
		ops: Arc<dyn FileOperations>,
	) -> io::Result<()>;

	fn cdev_del(&self, first: DeviceNumber, count: u32);

	fn class_create(&self, name: &str) -> io::Result<()>;

	fn class_destroy(&self, name: &str);

	/// Publishes the node `/dev/<name>` for `dev`.
	fn device_create(&self, class: &str, dev: DeviceNumber, name: &str) -> io::Result<()>;

	fn device_destroy(&self, class: &str, dev: DeviceNumber);
}

#[derive(Debug)]
struct Region {
	name: String,
	first_minor: u32,
	count: u32,
}

#[derive(Debug)]
struct Node {
	class: String,
	dev: DeviceNumber,
}

#[derive(Debug, Default)]
struct Inner {
	regions: BTreeMap<u32, Region>,
	cdevs: BTreeMap<DeviceNumber, Arc<dyn FileOperations>>,
	classes: BTreeSet<String>,
	nodes: BTreeMap<String, Node>,
}

/// In-memory device registry.
#[derive(Debug, Default)]
pub struct DevRegistry {
	inner: SpinMutex<Inner>,
}

impl DevRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Opens the device behind a node, given as `name` or `/dev/name`.
	pub fn open(&self, path: &str) -> io::Result<OpenFile> {
		let ops = {
			let inner = self.inner.lock();
			let name = path.strip_prefix("/dev/").unwrap_or(path);
			let node = inner.nodes.get(name).ok_or(io::Error::Noent)?;
			inner.cdevs.get(&node.dev).ok_or(io::Error::Nodev)?.clone()
		};

		OpenFile::open(ops)
	}

	/// Device number of the node `name`.
	pub fn lookup(&self, name: &str) -> Option<DeviceNumber> {
		self.inner.lock().nodes.get(name).map(|node| node.dev)
	}

	/// Name under which the region of `dev` was reserved.
	pub fn region_name(&self, dev: DeviceNumber) -> Option<String> {
		let inner = self.inner.lock();
		let region = inner.regions.get(&dev.major())?;
		let minors = region.first_minor..region.first_minor + region.count;
		minors.contains(&dev.minor()).then(|| region.name.clone())
	}

	pub fn has_cdev(&self, dev: DeviceNumber) -> bool {
		self.inner.lock().cdevs.contains_key(&dev)
	}

	pub fn has_class(&self, name: &str) -> bool {
		self.inner.lock().classes.contains(name)
	}

	/// Returns `true` if nothing is registered at all.
	pub fn is_empty(&self) -> bool {
		let inner = self.inner.lock();
		inner.regions.is_empty()
			&& inner.cdevs.is_empty()
			&& inner.classes.is_empty()
			&& inner.nodes.is_empty()
	}
}

impl Registrar for DevRegistry {
	fn alloc_chrdev_region(
		&self,
		first_minor: u32,
		count: u32,
		name: &str,
	) -> io::Result<DeviceNumber> {
		minor_range(first_minor, count)?;

		let mut inner = self.inner.lock();
		let major = (CHRDEV_MAJOR_DYN_END..=CHRDEV_MAJOR_DYN_START)
			.rev()
			.find(|major| !inner.regions.contains_key(major))
			.ok_or(io::Error::Busy)?;

		inner.regions.insert(
			major,
			Region {
				name: name.to_string(),
				first_minor,
				count,
			},
		);
		debug!("Reserved char region {major}:{first_minor}+{count} for {name}");

		Ok(DeviceNumber::new(major, first_minor))
	}

	fn unregister_chrdev_region(&self, first: DeviceNumber, count: u32) {
		let mut inner = self.inner.lock();
		let matches = inner
			.regions
			.get(&first.major())
			.is_some_and(|region| region.first_minor == first.minor() && region.count == count);
		if matches {
			inner.regions.remove(&first.major());
		} else {
			warn!("Trying to unregister unknown char region {first}+{count}");
		}
	}

	fn cdev_add(
		&self,
		first: DeviceNumber,
		count: u32,
		ops: Arc<dyn FileOperations>,
	) -> io::Result<()> {
		let minors = minor_range(first.minor(), count)?;
		let mut inner = self.inner.lock();
		let devs = minors
			.map(|minor| DeviceNumber::new(first.major(), minor));

		if devs.clone().any(|dev| inner.cdevs.contains_key(&dev)) {
			return Err(io::Error::Exist);
		}
		for dev in devs {
			inner.cdevs.insert(dev, ops.clone());
		}

		Ok(())
	}

	fn cdev_del(&self, first: DeviceNumber, count: u32) {
		let Ok(minors) = minor_range(first.minor(), count) else {
			warn!("Trying to delete char devices {first}+{count} outside the minor range");
			return;
		};
		let mut inner = self.inner.lock();
		for minor in minors {
			inner.cdevs.remove(&DeviceNumber::new(first.major(), minor));
		}
	}

	fn class_create(&self, name: &str) -> io::Result<()> {
		if self.inner.lock().classes.insert(name.to_string()) {
			Ok(())
		} else {
			Err(io::Error::Exist)
		}
	}

	fn class_destroy(&self, name: &str) {
		let mut inner = self.inner.lock();
		inner.nodes.retain(|_, node| node.class != name);
		inner.classes.remove(name);
	}

	fn device_create(&self, class: &str, dev: DeviceNumber, name: &str) -> io::Result<()> {
		let mut inner = self.inner.lock();
		if !inner.classes.contains(class) {
			return Err(io::Error::Noent);
		}
		if inner.nodes.contains_key(name) {
			return Err(io::Error::Exist);
		}

		inner.nodes.insert(
			name.to_string(),
			Node {
				class: class.to_string(),
				dev,
			},
		);
		debug!("Created /dev/{name} ({dev})");

		Ok(())
	}

	fn device_destroy(&self, class: &str, dev: DeviceNumber) {
		self.inner
			.lock()
			.nodes
			.retain(|_, node| node.class != class || node.dev != dev);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[derive(Debug)]
	struct Nothing;

	impl FileOperations for Nothing {}

	#[test]
	fn device_number_packing() {
		let dev = DeviceNumber::new(254, 3);
		assert_eq!(dev.major(), 254);
		assert_eq!(dev.minor(), 3);
		assert_eq!(dev.as_raw(), (254 << 20) | 3);
		assert_eq!(DeviceNumber::from_raw(dev.as_raw()), dev);
		assert_eq!(alloc::format!("{dev}"), "254:3");
	}

	#[test]
	fn dynamic_majors_count_down() {
		let registry = DevRegistry::new();
		let a = registry.alloc_chrdev_region(0, 1, "a").unwrap();
		let b = registry.alloc_chrdev_region(0, 2, "b").unwrap();
		assert_eq!(a, DeviceNumber::new(254, 0));
		assert_eq!(b, DeviceNumber::new(253, 0));
		assert_eq!(registry.region_name(b).as_deref(), Some("b"));
		assert_eq!(registry.region_name(DeviceNumber::new(253, 2)), None);

		registry.unregister_chrdev_region(a, 1);
		assert_eq!(registry.region_name(a), None);
		assert_eq!(
			registry.alloc_chrdev_region(0, 1, "c"),
			Ok(DeviceNumber::new(254, 0))
		);
	}

	#[test]
	fn majors_run_out() {
		let registry = DevRegistry::new();
		for _ in CHRDEV_MAJOR_DYN_END..=CHRDEV_MAJOR_DYN_START {
			registry.alloc_chrdev_region(0, 1, "x").unwrap();
		}
		assert_eq!(registry.alloc_chrdev_region(0, 1, "x"), Err(io::Error::Busy));
		assert_eq!(registry.alloc_chrdev_region(0, 0, "x"), Err(io::Error::Inval));
	}

	#[test]
	fn nodes_resolve_to_cdevs() {
		let registry = DevRegistry::new();
		let dev = registry.alloc_chrdev_region(0, 1, "nothing").unwrap();
		registry.class_create("nothing_class").unwrap();
		registry.device_create("nothing_class", dev, "nothing").unwrap();

		assert_eq!(registry.lookup("nothing"), Some(dev));
		assert_eq!(registry.open("/dev/nothing").unwrap_err(), io::Error::Nodev);
		assert_eq!(registry.open("/dev/missing").unwrap_err(), io::Error::Noent);

		registry.cdev_add(dev, 1, Arc::new(Nothing)).unwrap();
		assert!(registry.has_cdev(dev));
		assert!(registry.open("/dev/nothing").is_ok());
		assert!(registry.open("nothing").is_ok());
		assert_eq!(
			registry.cdev_add(dev, 1, Arc::new(Nothing)),
			Err(io::Error::Exist)
		);
	}

	#[test]
	fn cdev_ranges_must_fit_the_minor_space() {
		let registry = DevRegistry::new();
		let dev = DeviceNumber::new(254, 3);
		assert_eq!(
			registry.cdev_add(dev, u32::MAX, Arc::new(Nothing)),
			Err(io::Error::Inval)
		);
		assert_eq!(
			registry.cdev_add(dev, MINORMASK, Arc::new(Nothing)),
			Err(io::Error::Inval)
		);
		assert_eq!(
			registry.cdev_add(dev, 0, Arc::new(Nothing)),
			Err(io::Error::Inval)
		);
		assert!(registry.is_empty());

		registry.cdev_add(dev, 2, Arc::new(Nothing)).unwrap();
		registry.cdev_del(dev, u32::MAX);
		assert!(registry.has_cdev(dev));
		registry.cdev_del(dev, 2);
		assert!(registry.is_empty());
	}

	#[test]
	fn duplicates_are_refused() {
		let registry = DevRegistry::new();
		let dev = DeviceNumber::new(254, 0);
		registry.class_create("c").unwrap();
		assert_eq!(registry.class_create("c"), Err(io::Error::Exist));
		assert_eq!(registry.device_create("d", dev, "n"), Err(io::Error::Noent));
		registry.device_create("c", dev, "n").unwrap();
		assert_eq!(registry.device_create("c", dev, "n"), Err(io::Error::Exist));
	}

	#[test]
	fn teardown_empties_registry() {
		let registry = DevRegistry::new();
		let dev = registry.alloc_chrdev_region(0, 1, "t").unwrap();
		registry.cdev_add(dev, 1, Arc::new(Nothing)).unwrap();
		registry.class_create("t_class").unwrap();
		registry.device_create("t_class", dev, "t").unwrap();

		registry.device_destroy("t_class", dev);
		assert_eq!(registry.lookup("t"), None);
		registry.class_destroy("t_class");
		assert!(!registry.has_class("t_class"));
		registry.cdev_del(dev, 1);
		registry.unregister_chrdev_region(dev, 1);
		assert!(registry.is_empty());
	}
}
