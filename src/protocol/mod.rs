//! Command/acknowledgment protocol of the serial EEPROM programmer.
//!
//! Every exchange starts with a 4-byte command frame:
//! - opcode (1 byte)
//! - address (2 bytes, big endian)
//! - operand (1 byte; page length for WRITE_PAGE and READ)
//!
//! The device answers each well-formed frame with a single ACK byte (199).
//! Then the payload follows: for WRITE_PAGE the client sends `operand` bytes,
//! for READ the device sends `operand` bytes. Finally the device sends a
//! single SUCCESS byte (0) once the transfer is complete; anything else is an
//! error code.
//!
//! There is no length prefix on the payload and no framing beyond that, so
//! after any failure the byte stream position is unknown: the only safe
//! recovery is to reset the transport.

mod channel;
mod client;
mod command;
mod error;

pub use self::channel::{
	Channel,
};

pub use self::client::{
	Client,
	Phase,
};

pub use self::command::{
	ACK,
	Command,
	FRAME_LENGTH,
	OpCode,
};

pub use self::error::{
	ProtocolError,
};
