use std::io;

/// Bidirectional byte stream to the device.
///
/// `receive` returns `Ok(0)` if nothing arrived within the read timeout
/// configured on the underlying transport; both calls may transfer fewer
/// bytes than requested.
pub trait Channel {
	fn send(&mut self, data: &[u8]) -> io::Result<usize>;
	fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl<T: io::Read + io::Write + ?Sized> Channel for T {
	fn send(&mut self, data: &[u8]) -> io::Result<usize> {
		let written = self.write(data)?;
		self.flush()?;
		Ok(written)
	}

	fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		loop {
			match self.read(buf) {
				Ok(n) => return Ok(n),
				Err(ref e) if e.kind() == io::ErrorKind::Interrupted => (),
				// serial ports report an expired read timeout as error
				Err(ref e) if e.kind() == io::ErrorKind::TimedOut || e.kind() == io::ErrorKind::WouldBlock => {
					return Ok(0);
				},
				Err(e) => return Err(e),
			}
		}
	}
}
