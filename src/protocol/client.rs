use crate::MAX_PAGE_LENGTH;

use super::{
	ACK,
	Channel,
	Command,
	OpCode,
	ProtocolError,
};

/// Progress of the current (or last) exchange.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Phase {
	Idle,
	FrameSent,
	AckReceived,
	PayloadTransferred,
	Done,
	Failed,
}

/// Talks to the programmer over a `Channel`.
///
/// Each operation is a complete request/response cycle; there is no state
/// carried from one to the next. After an error the stream position is
/// unknown, and retrying without resetting the transport will likely fail
/// again.
///
/// The device can't handle interleaved commands: share a client between
/// threads only behind a lock held for a full operation.
pub struct Client<C: Channel> {
	channel: C,
	phase: Phase,
}

impl<C: Channel> Client<C> {
	pub fn new(channel: C) -> Self {
		Client {
			channel,
			phase: Phase::Idle,
		}
	}

	pub fn phase(&self) -> Phase {
		self.phase
	}

	pub fn channel_mut(&mut self) -> &mut C {
		&mut self.channel
	}

	pub fn into_inner(self) -> C {
		self.channel
	}

	/// Send a command frame and wait for ACK.
	pub fn send_command(&mut self, opcode: OpCode, address: u16, operand0: u8) -> Result<(), ProtocolError> {
		self.exchange(|client| client.command(Command::new(opcode, address, operand0)))
	}

	/// Write up to 255 bytes starting at `address`.
	pub fn write_page(&mut self, address: u16, payload: &[u8]) -> Result<(), ProtocolError> {
		let length = page_length(payload.len())?;
		self.exchange(|client| {
			client.command(Command::new(OpCode::WritePage, address, length))?;
			client.send_all(payload)?;
			client.phase = Phase::PayloadTransferred;
			client.wait_on(OpCode::Success.into())
		})
	}

	/// Fill `buf` (up to 255 bytes) with data starting at `address`.
	pub fn read_into(&mut self, address: u16, buf: &mut [u8]) -> Result<(), ProtocolError> {
		let length = page_length(buf.len())?;
		self.exchange(|client| {
			client.command(Command::new(OpCode::Read, address, length))?;
			client.receive_exact(buf)?;
			client.phase = Phase::PayloadTransferred;
			client.wait_on(OpCode::Success.into())
		})
	}

	pub fn read_data(&mut self, address: u16, length: usize) -> Result<Vec<u8>, ProtocolError> {
		page_length(length)?;
		let mut buf = vec![0u8; length];
		self.read_into(address, &mut buf)?;
		Ok(buf)
	}

	fn exchange<T, F>(&mut self, f: F) -> Result<T, ProtocolError>
	where
		F: FnOnce(&mut Self) -> Result<T, ProtocolError>,
	{
		self.phase = Phase::Idle;
		match f(self) {
			Ok(v) => {
				self.phase = Phase::Done;
				Ok(v)
			},
			Err(e) => {
				debug!("exchange failed after {:?}: {}", self.phase, e);
				self.phase = Phase::Failed;
				Err(e)
			},
		}
	}

	fn command(&mut self, cmd: Command) -> Result<(), ProtocolError> {
		trace!("sending {}", cmd);
		self.send_all(&cmd.encode())?;
		self.phase = Phase::FrameSent;
		self.wait_on(ACK)?;
		self.phase = Phase::AckReceived;
		Ok(())
	}

	// read one handshake byte and compare
	fn wait_on(&mut self, expected: u8) -> Result<(), ProtocolError> {
		let mut buf = [0u8];
		self.receive_exact(&mut buf)?;
		if buf[0] != expected {
			return Err(ProtocolError::Handshake {
				expected,
				actual: buf[0],
			});
		}
		trace!("handshake {} received", expected);
		Ok(())
	}

	fn send_all(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
		let written = self.channel.send(data)?;
		if written < data.len() {
			return Err(ProtocolError::ShortWrite {
				written,
				expected: data.len(),
			});
		}
		Ok(())
	}

	// keep reading until `buf` is full; a read returning nothing is a timeout
	fn receive_exact(&mut self, buf: &mut [u8]) -> Result<(), ProtocolError> {
		let mut received = 0;
		while received < buf.len() {
			let n = self.channel.receive(&mut buf[received..])?;
			if n == 0 {
				return Err(ProtocolError::ReadTimeout {
					received,
					expected: buf.len(),
				});
			}
			received += n;
		}
		Ok(())
	}
}

fn page_length(length: usize) -> Result<u8, ProtocolError> {
	if length > MAX_PAGE_LENGTH {
		return Err(ProtocolError::PayloadTooLong { length });
	}
	Ok(length as u8)
}

#[cfg(test)]
mod test {
	use std::collections::VecDeque;
	use std::io;

	use super::{
		Client,
		Phase,
	};
	use crate::protocol::{
		ACK,
		OpCode,
		ProtocolError,
	};

	const SUCCESS: u8 = 0;

	// replays canned read results; an empty chunk (or running out) reads as timeout
	#[derive(Default)]
	struct Scripted {
		replies: VecDeque<Vec<u8>>,
		sent: Vec<u8>,
		reads: usize,
		max_write: Option<usize>,
		broken: bool,
	}

	impl Scripted {
		fn new(replies: Vec<Vec<u8>>) -> Self {
			Scripted {
				replies: replies.into_iter().collect(),
				..Default::default()
			}
		}
	}

	impl io::Read for Scripted {
		fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
			self.reads += 1;
			let mut chunk = match self.replies.pop_front() {
				None => return Ok(0),
				Some(chunk) => chunk,
			};
			if chunk.len() > buf.len() {
				let rest = chunk.split_off(buf.len());
				self.replies.push_front(rest);
			}
			buf[..chunk.len()].copy_from_slice(&chunk);
			Ok(chunk.len())
		}
	}

	impl io::Write for Scripted {
		fn write(&mut self, data: &[u8]) -> io::Result<usize> {
			if self.broken {
				return Err(io::Error::from(io::ErrorKind::BrokenPipe));
			}
			let n = self.max_write.map_or(data.len(), |max| max.min(data.len()));
			self.sent.extend_from_slice(&data[..n]);
			Ok(n)
		}

		fn flush(&mut self) -> io::Result<()> {
			Ok(())
		}
	}

	#[test]
	fn send_command_frame() {
		let mut client = Client::new(Scripted::new(vec![vec![ACK]]));
		client.send_command(OpCode::Write, 0x0102, 0x33).unwrap();
		assert_eq!(client.phase(), Phase::Done);
		assert_eq!(client.channel_mut().sent, vec![1, 0x01, 0x02, 0x33]);
	}

	#[test]
	fn write_page_sends_frame_and_payload() {
		let mut client = Client::new(Scripted::new(vec![vec![ACK], vec![SUCCESS]]));
		client.write_page(0x10, b"hello").unwrap();
		assert_eq!(client.phase(), Phase::Done);

		let ch = client.into_inner();
		assert_eq!(ch.sent, b"\x02\x00\x10\x05hello".to_vec());
		assert!(ch.replies.is_empty());
	}

	#[test]
	fn wrong_ack_stops_before_payload() {
		let mut client = Client::new(Scripted::new(vec![vec![5], vec![SUCCESS]]));
		match client.write_page(0, b"payload") {
			Err(ProtocolError::Handshake { expected, actual }) => {
				assert_eq!(expected, ACK);
				assert_eq!(actual, 5);
			},
			r => panic!("unexpected result: {:?}", r),
		}
		assert_eq!(client.phase(), Phase::Failed);
		// only the frame went out
		assert_eq!(client.channel_mut().sent, vec![2, 0, 0, 7]);
	}

	#[test]
	fn wrong_ack_on_read_skips_payload() {
		let mut client = Client::new(Scripted::new(vec![vec![5], vec![1, 2, 3, 4], vec![SUCCESS]]));
		match client.read_data(0, 4) {
			Err(ProtocolError::Handshake { expected: ACK, actual: 5 }) => (),
			r => panic!("unexpected result: {:?}", r),
		}
		let ch = client.into_inner();
		assert_eq!(ch.reads, 1);
		assert_eq!(ch.replies.len(), 2);
	}

	#[test]
	fn missing_ack_is_timeout() {
		let mut client = Client::new(Scripted::new(vec![]));
		match client.read_data(0, 8) {
			Err(ProtocolError::ReadTimeout { received: 0, expected: 1 }) => (),
			r => panic!("unexpected result: {:?}", r),
		}
		assert_eq!(client.phase(), Phase::Failed);
	}

	#[test]
	fn wrong_completion_byte() {
		let mut client = Client::new(Scripted::new(vec![vec![ACK], vec![7]]));
		match client.write_page(0, b"abc") {
			Err(ProtocolError::Handshake { expected: 0, actual: 7 }) => (),
			r => panic!("unexpected result: {:?}", r),
		}
		// payload was transferred before the device complained
		assert_eq!(client.channel_mut().sent, b"\x02\x00\x00\x03abc".to_vec());
	}

	#[test]
	fn read_accumulates_partial_reads() {
		let mut replies = vec![vec![ACK]];
		replies.extend((0..32u8).map(|b| vec![b]));
		replies.push(vec![SUCCESS]);

		let mut client = Client::new(Scripted::new(replies));
		let data = client.read_data(0, 32).unwrap();
		assert_eq!(data, (0..32u8).collect::<Vec<u8>>());
		// ACK + 32 single bytes + SUCCESS
		assert_eq!(client.channel_mut().reads, 34);
	}

	#[test]
	fn read_split_reply() {
		// ACK, payload and SUCCESS arriving in one chunk
		let mut client = Client::new(Scripted::new(vec![vec![ACK, 9, 8, 7, SUCCESS]]));
		assert_eq!(client.read_data(0x20, 3).unwrap(), vec![9, 8, 7]);
		assert_eq!(client.channel_mut().sent, vec![3, 0, 0x20, 3]);
	}

	#[test]
	fn payload_timeout_reports_progress() {
		let mut client = Client::new(Scripted::new(vec![vec![ACK], vec![1, 2, 3], vec![]]));
		match client.read_data(0, 8) {
			Err(ProtocolError::ReadTimeout { received: 3, expected: 8 }) => (),
			r => panic!("unexpected result: {:?}", r),
		}
	}

	#[test]
	fn short_write_of_frame() {
		let mut ch = Scripted::new(vec![vec![ACK]]);
		ch.max_write = Some(2);
		let mut client = Client::new(ch);
		match client.send_command(OpCode::Read, 0, 1) {
			Err(ProtocolError::ShortWrite { written: 2, expected: 4 }) => (),
			r => panic!("unexpected result: {:?}", r),
		}
		// never waited for ACK
		assert_eq!(client.channel_mut().reads, 0);
	}

	#[test]
	fn short_write_of_payload() {
		let mut ch = Scripted::new(vec![vec![ACK], vec![SUCCESS]]);
		ch.max_write = Some(5);
		let mut client = Client::new(ch);
		match client.write_page(0, &[0xaa; 10]) {
			Err(ProtocolError::ShortWrite { written: 5, expected: 10 }) => (),
			r => panic!("unexpected result: {:?}", r),
		}
	}

	#[test]
	fn transport_error() {
		let mut ch = Scripted::new(vec![vec![ACK]]);
		ch.broken = true;
		let mut client = Client::new(ch);
		match client.send_command(OpCode::Write, 0, 0) {
			Err(ProtocolError::Transport(e)) => assert_eq!(e.kind(), io::ErrorKind::BrokenPipe),
			r => panic!("unexpected result: {:?}", r),
		}
	}

	#[test]
	fn oversized_page_rejected_up_front() {
		let mut client = Client::new(Scripted::new(vec![vec![ACK], vec![SUCCESS]]));
		match client.write_page(0, &[0u8; 256]) {
			Err(ProtocolError::PayloadTooLong { length: 256 }) => (),
			r => panic!("unexpected result: {:?}", r),
		}
		match client.read_data(0, 300) {
			Err(ProtocolError::PayloadTooLong { length: 300 }) => (),
			r => panic!("unexpected result: {:?}", r),
		}
		assert!(client.channel_mut().sent.is_empty());
	}

	#[test]
	fn empty_page() {
		let mut client = Client::new(Scripted::new(vec![vec![ACK], vec![SUCCESS]]));
		client.write_page(0, &[]).unwrap();
		assert_eq!(client.channel_mut().sent, vec![2, 0, 0, 0]);
	}

	#[test]
	fn retry_after_failure_starts_over() {
		let mut client = Client::new(Scripted::new(vec![vec![5], vec![ACK], vec![SUCCESS]]));
		assert!(client.write_page(0, b"x").is_err());
		assert_eq!(client.phase(), Phase::Failed);
		client.write_page(0, b"x").unwrap();
		assert_eq!(client.phase(), Phase::Done);
	}
}
