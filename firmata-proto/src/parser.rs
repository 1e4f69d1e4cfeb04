//! Byte-stream parser for inbound Firmata messages.
//!
//! The stream has no resync marker: bytes that do not start a known message
//! are dropped one at a time until a known lead byte shows up.
//!
//! ```text
//! AwaitLead ──(0x90/0xE0 family, 0xF9)──► AwaitData ──(arity reached)──► Frame::Fixed
//!     │
//!     └──(0xF0)──► AwaitSysexCmd ──(known id)──► AwaitSysexData ──(0xF7)──► Frame::Sysex
//!                        │
//!                        └──(unknown id)──► DiscardSysex ──(0xF7)──► AwaitLead
//! ```

use core::fmt;
use heapless::Vec;

use crate::codec::{unpack16, unpack_chars};
use crate::command::{Command, SysexCommand, END_SYSEX, START_SYSEX};

/// Largest SysEx payload the parser buffers.
pub const MAX_SYSEX_SIZE: usize = 64;

/// SysEx payload bytes, START/END markers and command id excluded.
pub type SysexPayload = Vec<u8, MAX_SYSEX_SIZE>;

/// A complete, not yet interpreted, inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Frame {
    /// Fixed-arity command; `data[..command.arity()]` is valid.
    Fixed { command: Command, data: [u8; 3] },
    /// SysEx command with its payload.
    Sysex {
        command: SysexCommand,
        payload: SysexPayload,
    },
}

/// Bytes dropped by the parser. The parser has already recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// Lead byte matches no command.
    Desync(u8),
    /// SysEx id matches no command; the frame is skipped.
    UnknownSysex(u8),
    /// SysEx payload exceeded [`MAX_SYSEX_SIZE`]; the frame is skipped.
    SysexOverflow,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Desync(b) => write!(f, "unexpected byte 0x{b:02X}"),
            Self::UnknownSysex(id) => write!(f, "unknown sysex command 0x{id:02X}"),
            Self::SysexOverflow => write!(f, "sysex payload exceeds {MAX_SYSEX_SIZE} bytes"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ParseError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    AwaitLead,
    AwaitData { command: Command, remaining: usize },
    AwaitSysexCmd,
    AwaitSysexData { command: SysexCommand },
    DiscardSysex,
}

/// Incremental frame parser. Feed it one byte at a time.
pub struct FrameParser {
    state: ParserState,
    data: [u8; 3],
    len: usize,
    sysex: SysexPayload,
}

impl FrameParser {
    /// Create a new parser.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ParserState::AwaitLead,
            data: [0; 3],
            len: 0,
            sysex: SysexPayload::new(),
        }
    }

    /// Drop any partially received message.
    pub fn reset(&mut self) {
        self.state = ParserState::AwaitLead;
        self.data = [0; 3];
        self.len = 0;
        self.sysex.clear();
    }

    /// Whether a message is partially received.
    #[inline]
    #[must_use]
    pub fn is_mid_frame(&self) -> bool {
        self.state != ParserState::AwaitLead
    }

    /// Feed a byte to the parser.
    ///
    /// Returns `Some(frame)` when the byte completes a message.
    pub fn push_byte(&mut self, byte: u8) -> Result<Option<Frame>, ParseError> {
        match self.state {
            ParserState::AwaitLead => self.start(byte),
            ParserState::AwaitData { command, remaining } => {
                self.data[self.len] = byte;
                self.len += 1;
                if remaining > 1 {
                    self.state = ParserState::AwaitData {
                        command,
                        remaining: remaining - 1,
                    };
                    return Ok(None);
                }
                self.state = ParserState::AwaitLead;
                Ok(Some(Frame::Fixed {
                    command,
                    data: self.data,
                }))
            }
            ParserState::AwaitSysexCmd => match SysexCommand::lookup(byte) {
                Some(command) => {
                    self.sysex.clear();
                    self.state = ParserState::AwaitSysexData { command };
                    Ok(None)
                }
                None => {
                    self.state = if byte == END_SYSEX {
                        ParserState::AwaitLead
                    } else {
                        ParserState::DiscardSysex
                    };
                    Err(ParseError::UnknownSysex(byte))
                }
            },
            ParserState::AwaitSysexData { command } => {
                if byte == END_SYSEX {
                    self.state = ParserState::AwaitLead;
                    let payload = core::mem::take(&mut self.sysex);
                    return Ok(Some(Frame::Sysex { command, payload }));
                }
                if self.sysex.push(byte).is_err() {
                    self.sysex.clear();
                    self.state = ParserState::DiscardSysex;
                    return Err(ParseError::SysexOverflow);
                }
                Ok(None)
            }
            ParserState::DiscardSysex => {
                if byte == END_SYSEX {
                    self.state = ParserState::AwaitLead;
                }
                Ok(None)
            }
        }
    }

    fn start(&mut self, lead: u8) -> Result<Option<Frame>, ParseError> {
        if lead == START_SYSEX {
            self.state = ParserState::AwaitSysexCmd;
            return Ok(None);
        }
        let command = Command::lookup(lead).ok_or(ParseError::Desync(lead))?;
        self.data = [0; 3];
        self.len = 0;
        if command.has_channel() {
            self.data[0] = lead & 0x0F;
            self.len = 1;
        }
        self.state = ParserState::AwaitData {
            command,
            remaining: command.trailing_bytes(),
        };
        Ok(None)
    }
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

/// A frame whose payload does not match its command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Payload length is wrong for the command.
    PayloadLength {
        command: SysexCommand,
        expected: usize,
        actual: usize,
    },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PayloadLength {
                command,
                expected,
                actual,
            } => write!(
                f,
                "{command:?} payload has {actual} bytes, expected {expected}"
            ),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DecodeError {}

/// Interpreted inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Message {
    /// Raw 10-bit ADC sample of an analog pin.
    AnalogValue { pin: u8, raw: u16 },
    /// Bitmask of a digital port.
    DigitalPort { port: u8, mask: u16 },
    /// Protocol version.
    ProtocolVersion { major: u8, minor: u8 },
    /// Firmware version; the name is still 7-bit packed.
    Firmware {
        major: u8,
        minor: u8,
        packed_name: SysexPayload,
    },
    /// Distance reported by a sonar slot.
    SonarDistance { pin: u8, distance: u16 },
}

impl Message {
    /// Characters of a firmware name, empty for other messages.
    pub fn firmware_name(&self) -> impl Iterator<Item = char> + '_ {
        let packed: &[u8] = match self {
            Self::Firmware { packed_name, .. } => packed_name.as_slice(),
            _ => &[],
        };
        unpack_chars(packed)
    }
}

impl TryFrom<Frame> for Message {
    type Error = DecodeError;

    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        match frame {
            Frame::Fixed { command, data } => Ok(match command {
                Command::AnalogMessage => Message::AnalogValue {
                    pin: data[0],
                    raw: unpack16(data[1], data[2]),
                },
                Command::DigitalMessage => Message::DigitalPort {
                    port: data[0],
                    mask: unpack16(data[1], data[2]),
                },
                Command::ReportVersion => Message::ProtocolVersion {
                    major: data[0],
                    minor: data[1],
                },
            }),
            Frame::Sysex { command, payload } => match command {
                SysexCommand::SonarData => {
                    if payload.len() != 3 {
                        return Err(DecodeError::PayloadLength {
                            command,
                            expected: 3,
                            actual: payload.len(),
                        });
                    }
                    Ok(Message::SonarDistance {
                        pin: payload[0],
                        distance: unpack16(payload[1], payload[2]),
                    })
                }
                SysexCommand::ReportFirmware => {
                    if payload.len() < 2 {
                        return Err(DecodeError::PayloadLength {
                            command,
                            expected: 2,
                            actual: payload.len(),
                        });
                    }
                    let mut packed_name = SysexPayload::new();
                    // Fits: payload and name share the same capacity.
                    let _ = packed_name.extend_from_slice(&payload[2..]);
                    Ok(Message::Firmware {
                        major: payload[0],
                        minor: payload[1],
                        packed_name,
                    })
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::String;
    use std::vec::Vec;

    fn feed(parser: &mut FrameParser, bytes: &[u8]) -> Vec<Result<Option<Frame>, ParseError>> {
        bytes.iter().map(|&b| parser.push_byte(b)).collect()
    }

    fn frames(parser: &mut FrameParser, bytes: &[u8]) -> Vec<Frame> {
        feed(parser, bytes)
            .into_iter()
            .filter_map(|r| r.ok().flatten())
            .collect()
    }

    #[test]
    fn test_digital_report_with_channel_nibble() {
        let mut parser = FrameParser::new();
        let out = frames(&mut parser, &[0x91, 0x05, 0x00]);
        assert_eq!(
            out,
            [Frame::Fixed {
                command: Command::DigitalMessage,
                data: [1, 0x05, 0x00]
            }]
        );
        assert!(!parser.is_mid_frame());
    }

    #[test]
    fn test_one_frame_per_completed_message() {
        let mut parser = FrameParser::new();
        let results = feed(&mut parser, &[0xE2, 0x7F, 0x07]);
        assert!(matches!(results[0], Ok(None)));
        assert!(matches!(results[1], Ok(None)));
        assert!(matches!(results[2], Ok(Some(_))));
    }

    #[test]
    fn test_report_version_exact_lead() {
        let mut parser = FrameParser::new();
        let out = frames(&mut parser, &[0xF9, 2, 5]);
        let msg = Message::try_from(out[0].clone()).unwrap();
        assert_eq!(msg, Message::ProtocolVersion { major: 2, minor: 5 });
    }

    #[test]
    fn test_unknown_bytes_dropped() {
        let mut parser = FrameParser::new();
        assert_eq!(parser.push_byte(0x05), Err(ParseError::Desync(0x05)));
        assert_eq!(parser.push_byte(0xC3), Err(ParseError::Desync(0xC3)));
        assert_eq!(parser.push_byte(0xFF), Err(ParseError::Desync(0xFF)));
        assert!(!parser.is_mid_frame());
        // Stream recovers on the next known lead
        let out = frames(&mut parser, &[0x90, 0x01, 0x00]);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_firmware_sysex() {
        let mut parser = FrameParser::new();
        let mut bytes = Vec::from([0xF0, 0x79, 2, 3]);
        for c in b"Mark" {
            bytes.push(*c);
            bytes.push(0);
        }
        bytes.push(0xF7);
        let out = frames(&mut parser, &bytes);
        assert_eq!(out.len(), 1);
        let msg = Message::try_from(out[0].clone()).unwrap();
        let name: String = msg.firmware_name().collect();
        assert_eq!(name, "Mark");
        assert!(matches!(msg, Message::Firmware { major: 2, minor: 3, .. }));
    }

    #[test]
    fn test_sonar_sysex() {
        let mut parser = FrameParser::new();
        let out = frames(&mut parser, &[0xF0, 0x63, 14, 0x10, 0x01, 0xF7]);
        let msg = Message::try_from(out[0].clone()).unwrap();
        assert_eq!(
            msg,
            Message::SonarDistance {
                pin: 14,
                distance: 144
            }
        );
    }

    #[test]
    fn test_sonar_bad_length_is_decode_error() {
        let mut parser = FrameParser::new();
        let out = frames(&mut parser, &[0xF0, 0x63, 14, 0x10, 0xF7]);
        assert!(matches!(
            Message::try_from(out[0].clone()),
            Err(DecodeError::PayloadLength { expected: 3, actual: 2, .. })
        ));
    }

    #[test]
    fn test_unknown_sysex_skipped_to_end() {
        let mut parser = FrameParser::new();
        assert_eq!(parser.push_byte(0xF0), Ok(None));
        assert_eq!(parser.push_byte(0x6A), Err(ParseError::UnknownSysex(0x6A)));
        // Payload bytes that look like leads are swallowed
        assert_eq!(parser.push_byte(0x90), Ok(None));
        assert_eq!(parser.push_byte(0x01), Ok(None));
        assert_eq!(parser.push_byte(0xF7), Ok(None));
        assert!(!parser.is_mid_frame());
    }

    #[test]
    fn test_sysex_overflow_recovers() {
        let mut parser = FrameParser::new();
        parser.push_byte(0xF0).unwrap();
        parser.push_byte(0x79).unwrap();
        for _ in 0..MAX_SYSEX_SIZE {
            assert_eq!(parser.push_byte(0x01), Ok(None));
        }
        assert_eq!(parser.push_byte(0x01), Err(ParseError::SysexOverflow));
        assert_eq!(parser.push_byte(0xF7), Ok(None));
        let out = frames(&mut parser, &[0xF9, 2, 5]);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_reset_discards_partial_sysex() {
        let mut parser = FrameParser::new();
        feed(&mut parser, &[0xF0, 0x79, 2, 3, b'M']);
        assert!(parser.is_mid_frame());
        parser.reset();
        assert!(!parser.is_mid_frame());
        // Leftover tail of the old frame is dropped byte by byte
        assert_eq!(parser.push_byte(0x00), Err(ParseError::Desync(0x00)));
        assert_eq!(parser.push_byte(0xF7), Err(ParseError::Desync(0xF7)));
    }

    #[test]
    fn test_empty_firmware_payload_rejected() {
        let mut parser = FrameParser::new();
        let out = frames(&mut parser, &[0xF0, 0x79, 0xF7]);
        assert!(Message::try_from(out[0].clone()).is_err());
    }
}
