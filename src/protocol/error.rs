use std::io;

#[derive(Debug, Fail)]
pub enum ProtocolError {
	/// reading from or writing to the channel failed (not a timeout)
	#[fail(display = "transport error: {}", _0)]
	Transport(#[cause] io::Error),

	/// channel returned no data before `expected` bytes were read
	#[fail(display = "read timeout (received {} of {} bytes)", received, expected)]
	ReadTimeout {
		received: usize,
		expected: usize,
	},

	/// handshake byte didn't match; `actual` might be an error code from the device
	#[fail(display = "expected {} but got {}", expected, actual)]
	Handshake {
		expected: u8,
		actual: u8,
	},

	#[fail(display = "short write ({} of {} bytes accepted)", written, expected)]
	ShortWrite {
		written: usize,
		expected: usize,
	},

	#[fail(display = "page length {} doesn't fit into a single byte", length)]
	PayloadTooLong {
		length: usize,
	},
}

impl From<io::Error> for ProtocolError {
	fn from(e: io::Error) -> Self {
		ProtocolError::Transport(e)
	}
}
