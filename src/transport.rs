use std::io::{
	self,
	Read,
	Write,
};
use std::time::Duration;

use serialport::{
	ClearBuffer,
	SerialPort,
};

pub const DEFAULT_PORT: &str = "COM4";
pub const DEFAULT_BAUD_RATE: u32 = 115_200;
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SerialConfig {
	pub port: String,
	pub baud_rate: u32,
	/// a read returning nothing within this time counts as device timeout
	pub read_timeout: Duration,
}

impl Default for SerialConfig {
	fn default() -> Self {
		SerialConfig {
			port: DEFAULT_PORT.to_string(),
			baud_rate: DEFAULT_BAUD_RATE,
			read_timeout: DEFAULT_READ_TIMEOUT,
		}
	}
}

/// Open serial port; discards pending buffers on drop.
pub struct SerialChannel {
	port: Box<dyn SerialPort>,
}

impl io::Read for SerialChannel {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		self.port.read(buf)
	}
}

impl io::Write for SerialChannel {
	fn write(&mut self, data: &[u8]) -> io::Result<usize> {
		self.port.write(data)
	}

	fn flush(&mut self) -> io::Result<()> {
		self.port.flush()
	}
}

impl Drop for SerialChannel {
	fn drop(&mut self) {
		if let Err(e) = self.port.clear(ClearBuffer::All) {
			warn!("Couldn't clear buffers of serial port {:?}: {}", self.port.name(), e);
		}
	}
}

pub fn open(config: &SerialConfig) -> crate::AResult<SerialChannel> {
	with_context!(("Couldn't open serial port {}", config.port), {
		serialport::new(config.port.as_str(), config.baud_rate)
			.timeout(config.read_timeout)
			.open()
			.map(|port| SerialChannel { port })
			.map_err(failure::Error::from)
	}).map(|channel| {
		debug!("Opened serial port {} ({} baud, timeout {:?})", config.port, config.baud_rate, config.read_timeout);
		channel
	})
}
