//! Common code for integration tests.

use std::sync::Arc;

use embedded_io::Read;
use hello_dev::config::Config;
use hello_dev::fd::OpenFile;
use hello_dev::fs::DevRegistry;
use hello_dev::module::HelloModule;

pub const NODE: &str = "/dev/hello_dev_device";

/// Loads the module into a fresh registry.
pub fn load(config: Config) -> (Arc<DevRegistry>, HelloModule) {
	let registry = Arc::new(DevRegistry::new());
	let module = HelloModule::init(config, registry.clone()).unwrap();
	(registry, module)
}

/// Issues a single read of at most `len` bytes.
pub fn read_chunk(file: &mut OpenFile, len: usize) -> Vec<u8> {
	let mut buf = vec![0u8; len];
	let n = file.read(&mut buf).unwrap();
	buf.truncate(n);
	buf
}

/// Reads until the device signals end-of-stream.
#[allow(dead_code)]
pub fn read_to_end_of_stream(file: &mut OpenFile, chunk: usize) -> Vec<u8> {
	let mut out = Vec::new();
	loop {
		let bytes = read_chunk(file, chunk);
		if bytes.is_empty() {
			return out;
		}
		out.extend_from_slice(&bytes);
	}
}
