//! Firmata wire protocol for mark boards.
//!
//! This crate provides the chip-agnostic half of the Firmata client: the
//! 7-bit value codec, the closed table of inbound commands, encoding of
//! outbound requests and an incremental frame parser. It does no I/O.
//!
//! # Features
//!
//! - 7-bit LSB/MSB packing of integers and strings
//! - Fixed-arity inbound commands resolved by lead byte (channel nibble aware)
//! - SysEx frames for firmware and sonar reports
//! - Outbound requests encoded into fixed-capacity buffers
//! - No heap allocations, works on any platform
//!
//! # Example
//!
//! ```
//! use firmata_proto::{FrameParser, Message};
//!
//! let mut parser = FrameParser::new();
//!
//! // Digital port 0 reports pins 0 and 2 high
//! for byte in [0x90, 0x05, 0x00] {
//!     if let Ok(Some(frame)) = parser.push_byte(byte) {
//!         let msg = Message::try_from(frame).unwrap();
//!         assert_eq!(msg, Message::DigitalPort { port: 0, mask: 0x05 });
//!     }
//! }
//! ```
//!
//! # Serial Configuration
//!
//! Boards running StandardFirmata talk at 57600 baud, 8N1.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod codec;
pub mod command;
pub mod parser;
pub mod request;

pub use codec::{pack16, pack_chars, unpack16, unpack_chars, RangeError, MAX_PACKED};
#[cfg(feature = "std")]
pub use codec::{pack_string, unpack_string};
pub use command::{
    Command, PinMode, SysexCommand, ANALOG_MESSAGE, DIGITAL_MESSAGE, END_SYSEX, REPORT_ANALOG,
    REPORT_DIGITAL, REPORT_FIRMWARE, REPORT_VERSION, SERVO_CONFIG, SET_PIN_MODE, SONAR_CONFIG,
    SONAR_DATA, START_SYSEX, SYSTEM_RESET,
};
pub use parser::{
    DecodeError, Frame, FrameParser, Message, ParseError, SysexPayload, MAX_SYSEX_SIZE,
};
pub use request::{EncodeError, EncodedRequest, Request, MAX_REQUEST_SIZE};

/// Baud rate of StandardFirmata boards.
pub const DEFAULT_BAUDRATE: u32 = 57_600;
