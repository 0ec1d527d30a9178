//! In-memory stand-in for the programmer, speaking the device side of the
//! protocol through `io::Read`/`io::Write`.

use std::collections::{
	HashMap,
	VecDeque,
};
use std::io;

use crate::protocol::{
	ACK,
	Command,
	FRAME_LENGTH,
	OpCode,
};

/// Value of bytes never written.
pub const ERASED: u8 = 0xff;

struct PendingWrite {
	address: u16,
	length: usize,
	data: Vec<u8>,
}

pub struct Emulator {
	pages: HashMap<u16, Vec<u8>>,
	frame: Vec<u8>,
	pending: Option<PendingWrite>,
	outgoing: VecDeque<u8>,
	read_chunk: usize,
	reads: usize,
	frames: Vec<Command>,
}

impl Emulator {
	pub fn new() -> Self {
		Emulator {
			pages: HashMap::new(),
			frame: Vec::with_capacity(FRAME_LENGTH),
			pending: None,
			outgoing: VecDeque::new(),
			read_chunk: usize::max_value(),
			reads: 0,
			frames: Vec::new(),
		}
	}

	/// Hand out at most `max` bytes per read call (at least 1).
	pub fn with_read_chunk(mut self, max: usize) -> Self {
		self.read_chunk = max.max(1);
		self
	}

	pub fn insert_page(&mut self, address: u16, data: &[u8]) {
		self.pages.insert(address, data.to_vec());
	}

	pub fn page(&self, address: u16) -> Option<&[u8]> {
		self.pages.get(&address).map(|p| &p[..])
	}

	/// Number of read calls so far (including ones that timed out).
	pub fn reads(&self) -> usize {
		self.reads
	}

	/// Well-formed frames received so far.
	pub fn frames(&self) -> &[Command] {
		&self.frames
	}

	fn receive_byte(&mut self, byte: u8) {
		if let Some(mut pending) = self.pending.take() {
			pending.data.push(byte);
			if pending.data.len() < pending.length {
				self.pending = Some(pending);
			} else {
				self.finish_write(pending);
			}
			return;
		}

		self.frame.push(byte);
		if self.frame.len() == FRAME_LENGTH {
			let mut raw = [0u8; FRAME_LENGTH];
			raw.copy_from_slice(&self.frame);
			self.frame.clear();
			self.handle_frame(raw);
		}
	}

	fn handle_frame(&mut self, raw: [u8; FRAME_LENGTH]) {
		let cmd = match Command::decode(&raw) {
			Some(cmd) => cmd,
			None => {
				// no ACK; the client runs into its read timeout
				warn!("emulator: ignoring frame with unknown opcode {:?}", raw);
				return;
			},
		};
		trace!("emulator: received {}", cmd);
		self.frames.push(cmd);
		self.outgoing.push_back(ACK);

		match cmd.opcode {
			OpCode::WritePage => {
				let pending = PendingWrite {
					address: cmd.address,
					length: cmd.operand0 as usize,
					data: Vec::with_capacity(cmd.operand0 as usize),
				};
				if 0 == pending.length {
					self.finish_write(pending);
				} else {
					self.pending = Some(pending);
				}
			},
			OpCode::Read => {
				let length = cmd.operand0 as usize;
				let page = self.pages.get(&cmd.address).map(|p| &p[..]).unwrap_or(&[]);
				let stored = page.len().min(length);
				self.outgoing.extend(&page[..stored]);
				self.outgoing.extend((stored..length).map(|_| ERASED));
				self.outgoing.push_back(OpCode::Success.into());
			},
			OpCode::Write => {
				// single byte in the operand, only ACKed
				self.pages.insert(cmd.address, vec![cmd.operand0]);
			},
			OpCode::Success => (),
		}
	}

	fn finish_write(&mut self, pending: PendingWrite) {
		debug!("emulator: stored {} bytes at 0x{:04x}", pending.data.len(), pending.address);
		self.pages.insert(pending.address, pending.data);
		self.outgoing.push_back(OpCode::Success.into());
	}
}

impl Default for Emulator {
	fn default() -> Self {
		Emulator::new()
	}
}

impl io::Read for Emulator {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		self.reads += 1;
		let n = buf.len().min(self.read_chunk).min(self.outgoing.len());
		for (t, b) in buf.iter_mut().zip(self.outgoing.drain(..n)) {
			*t = b;
		}
		Ok(n)
	}
}

impl io::Write for Emulator {
	fn write(&mut self, data: &[u8]) -> io::Result<usize> {
		for b in data {
			self.receive_byte(*b);
		}
		Ok(data.len())
	}

	fn flush(&mut self) -> io::Result<()> {
		Ok(())
	}
}
