use alloc::string::{String, ToString};

use log::LevelFilter;

use crate::io;

pub const VERSION: &str = "01";

/// Prefix of every kernel record written by this module.
pub(crate) const MODULE_PREFIX: &str = "hello_dev";

pub const MODULE_NAME: &str = "hello_dev_module";
pub const DEVICE_NAME: &str = "hello_dev_device";
pub const CLASS_NAME: &str = "hello_dev_class";

pub const DEVICE_FIRST: u32 = 0;
pub const DEVICE_COUNT: u32 = 1;

/// Payload of the message buffer right after module initialization.
pub const DEFAULT_MESSAGE: &str = "Hello, world!\n";

/// What `release` does with the admission guard.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ReleasePolicy {
	/// Releasing a session frees the device for the next opener.
	#[default]
	Reopen,
	/// The guard is never cleared: after the first session the device
	/// answers every `open` with `EBUSY`.
	SingleShot,
}

/// Runtime parameters of the module, given as an argument line when the
/// module is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
	/// Initial content of the message buffer
	pub message: String,
	pub release: ReleasePolicy,
	/// Upper bound for a single buffer allocation, in bytes
	pub max_message: Option<usize>,
	pub log_level: LevelFilter,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			message: DEFAULT_MESSAGE.to_string(),
			release: ReleasePolicy::default(),
			max_message: None,
			log_level: LevelFilter::Info,
		}
	}
}

impl Config {
	/// Parses an argument line like `message="hi there\n" release=single-shot`.
	///
	/// Quoting follows shell rules. Unknown keys are reported and ignored.
	pub fn from_args(args: &str) -> io::Result<Self> {
		let tokens = shell_words::split(args).map_err(|_| io::Error::Inval)?;
		debug!("Got module arguments as {tokens:?}");

		let mut config = Self::default();
		for token in tokens {
			let Some((key, value)) = token.split_once('=') else {
				warn!("Ignoring module argument without value: {token}");
				continue;
			};

			match key {
				"message" => config.message = value.to_string(),
				"release" => {
					config.release = match value {
						"reopen" => ReleasePolicy::Reopen,
						"single-shot" => ReleasePolicy::SingleShot,
						_ => return Err(io::Error::Inval),
					};
				}
				"max_message" => {
					config.max_message = Some(value.parse().map_err(|_| io::Error::Inval)?);
				}
				"log_level" => {
					config.log_level = value.parse().map_err(|_| io::Error::Inval)?;
				}
				_ => warn!("Unknown module argument: {key} [{args}]"),
			}
		}

		Ok(config)
	}
}
