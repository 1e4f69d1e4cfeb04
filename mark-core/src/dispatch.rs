//! Inbound message dispatch.
//!
//! The [`Dispatcher`] owns the frame parser and applies each complete
//! message to the pin model. Malformed or out-of-range messages never reach
//! the caller: they are counted in [`Diagnostics`] and dropped.

use firmata_proto::{DecodeError, FrameParser, Message, ParseError};
use thiserror::Error;

use crate::error::Error;
use crate::pin::PinModel;

/// Firmware name and version reported by the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Firmware {
    pub major: u8,
    pub minor: u8,
    pub name: String,
}

/// Board identity learned from inbound reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    firmware: Option<Firmware>,
    firmware_replies: u64,
    protocol_version: Option<(u8, u8)>,
}

impl DeviceInfo {
    pub fn firmware(&self) -> Option<&Firmware> {
        self.firmware.as_ref()
    }

    /// Number of firmware reports received.
    pub fn firmware_replies(&self) -> u64 {
        self.firmware_replies
    }

    pub fn protocol_version(&self) -> Option<(u8, u8)> {
        self.protocol_version
    }
}

/// Counters describing the health of the inbound stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Diagnostics {
    /// Messages applied to the model.
    pub frames_dispatched: u64,
    /// Bytes dropped while looking for a known lead byte.
    pub bytes_discarded: u64,
    /// SysEx frames skipped (unknown id or oversized).
    pub sysex_discarded: u64,
    /// Complete messages that could not be applied.
    pub dispatch_failures: u64,
    /// Transport errors seen while pumping.
    pub transport_errors: u64,
}

/// A complete message that could not be applied.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{0}")]
    Decode(DecodeError),
    #[error(transparent)]
    Handler(#[from] Error),
}

/// Byte-at-a-time reassembly and dispatch of inbound messages.
#[derive(Default)]
pub struct Dispatcher {
    parser: FrameParser,
    diagnostics: Diagnostics,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte. Returns `true` when it completed a message that was
    /// applied to `model` or `info`.
    pub fn feed(&mut self, byte: u8, model: &mut PinModel, info: &mut DeviceInfo) -> bool {
        match self.parser.push_byte(byte) {
            Ok(None) => false,
            Ok(Some(frame)) => {
                let applied = Message::try_from(frame)
                    .map_err(DispatchError::Decode)
                    .and_then(|message| apply(message, model, info));
                match applied {
                    Ok(()) => {
                        self.diagnostics.frames_dispatched += 1;
                        true
                    }
                    Err(err) => {
                        self.diagnostics.dispatch_failures += 1;
                        log::warn!("dropped message: {err}");
                        false
                    }
                }
            }
            Err(ParseError::Desync(b)) => {
                self.diagnostics.bytes_discarded += 1;
                log::trace!("skipping byte 0x{b:02X}");
                false
            }
            Err(err) => {
                self.diagnostics.sysex_discarded += 1;
                log::debug!("{err}");
                false
            }
        }
    }

    /// Drop a partially received message.
    pub fn discard_partial(&mut self) {
        if self.parser.is_mid_frame() {
            log::debug!("discarding partial frame");
        }
        self.parser.reset();
    }

    /// Whether a message is partially received.
    pub fn is_mid_frame(&self) -> bool {
        self.parser.is_mid_frame()
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.diagnostics
    }

    pub fn record_transport_error(&mut self) {
        self.diagnostics.transport_errors += 1;
    }
}

fn apply(message: Message, model: &mut PinModel, info: &mut DeviceInfo) -> Result<(), DispatchError> {
    log::trace!("{message:?}");
    match message {
        Message::AnalogValue { pin, raw } => model.analog_update(pin, raw)?,
        Message::DigitalPort { port, mask } => model.port_update(port, mask)?,
        Message::SonarDistance { pin, distance } => model.sonar_update(pin, distance)?,
        Message::ProtocolVersion { major, minor } => {
            log::debug!("protocol version {major}.{minor}");
            info.protocol_version = Some((major, minor));
        }
        Message::Firmware { major, minor, .. } => {
            let name: String = message.firmware_name().collect();
            log::debug!("firmware {name} {major}.{minor}");
            info.firmware = Some(Firmware { major, minor, name });
            info.firmware_replies += 1;
        }
    }
    Ok(())
}
