use log::{LevelFilter, Metadata, Record, set_logger, set_max_level};

use crate::config::{MODULE_PREFIX, VERSION};
use crate::kmsg;

/// Data structure to filter kernel messages
struct KernelLogger;

impl log::Log for KernelLogger {
	fn enabled(&self, _: &Metadata<'_>) -> bool {
		true
	}

	fn flush(&self) {
		// nothing to do
	}

	fn log(&self, record: &Record<'_>) {
		if self.enabled(record.metadata()) {
			kmsg::write_fmt(format_args!(
				"[{MODULE_PREFIX} v{VERSION}][{}] {}\n",
				record.level(),
				record.args()
			));
		}
	}
}

static LOGGER: KernelLogger = KernelLogger;

/// Installs the kernel logger.
///
/// Calling this more than once only adjusts the level filter. The
/// compile-time variable `HELLO_DEV_LOG_LEVEL` takes precedence over
/// `max_level`.
pub fn init(max_level: LevelFilter) {
	if set_logger(&LOGGER).is_err() {
		trace!("kernel logger is already installed");
	}

	let max_level = match option_env!("HELLO_DEV_LOG_LEVEL") {
		Some("Error") => LevelFilter::Error,
		Some("Debug") => LevelFilter::Debug,
		Some("Off") => LevelFilter::Off,
		Some("Trace") => LevelFilter::Trace,
		Some("Warn") => LevelFilter::Warn,
		Some("Info") => LevelFilter::Info,
		_ => max_level,
	};
	set_max_level(max_level);
}

macro_rules! infoheader {
	($str:expr) => {{
		info!("{:=^70}", $str);
	}};
}

macro_rules! infoentry {
	($str:expr, $rhs:expr) => (infoentry!($str, "{}", $rhs));
	($str:expr, $($arg:tt)+) => (info!("{:25}{}", concat!($str, ":"), format_args!($($arg)+)));
}

macro_rules! infofooter {
	() => {{
		info!("{:=^70}", '=');
	}};
}
