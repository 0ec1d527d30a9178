use std::fmt;

/// Handshake byte sent by the device after it accepted a command frame.
///
/// Not an opcode; never sent as first byte of a frame.
pub const ACK: u8 = 199;

pub const FRAME_LENGTH: usize = 4;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[repr(u8)]
pub enum OpCode {
	/// also the "transfer complete" handshake byte
	Success = 0,
	Write = 1,
	WritePage = 2,
	Read = 3,
}

impl OpCode {
	pub fn from_u8(value: u8) -> Option<Self> {
		match value {
			0 => Some(OpCode::Success),
			1 => Some(OpCode::Write),
			2 => Some(OpCode::WritePage),
			3 => Some(OpCode::Read),
			_ => None,
		}
	}
}

impl From<OpCode> for u8 {
	fn from(opcode: OpCode) -> u8 {
		opcode as u8
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Command {
	pub opcode: OpCode,
	pub address: u16,
	pub operand0: u8,
}

impl Command {
	pub fn new(opcode: OpCode, address: u16, operand0: u8) -> Self {
		Command {
			opcode,
			address,
			operand0,
		}
	}

	pub fn encode(&self) -> [u8; FRAME_LENGTH] {
		let address = self.address.to_be_bytes();
		[
			self.opcode.into(),
			address[0],
			address[1],
			self.operand0,
		]
	}

	// None if the first byte isn't a known opcode
	pub fn decode(frame: &[u8; FRAME_LENGTH]) -> Option<Self> {
		Some(Command {
			opcode: OpCode::from_u8(frame[0])?,
			address: u16::from_be_bytes([frame[1], frame[2]]),
			operand0: frame[3],
		})
	}
}

impl fmt::Display for Command {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{:?} @0x{:04x} (operand 0x{:02x})", self.opcode, self.address, self.operand0)
	}
}
