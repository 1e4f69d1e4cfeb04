//! Outbound messages from host to board.
//!
//! # Example
//!
//! ```
//! use firmata_proto::{PinMode, Request};
//!
//! let bytes = Request::SetPinMode { pin: 13, mode: PinMode::Output }.encode().unwrap();
//! assert_eq!(&bytes[..], &[0xF4, 13, 1]);
//! ```

use core::fmt;
use heapless::Vec;

use crate::codec::{pack16, RangeError};
use crate::command::{
    PinMode, ANALOG_MESSAGE, DIGITAL_MESSAGE, END_SYSEX, REPORT_ANALOG, REPORT_DIGITAL,
    REPORT_FIRMWARE, REPORT_VERSION, SERVO_CONFIG, SET_PIN_MODE, SONAR_CONFIG, START_SYSEX,
    SYSTEM_RESET,
};

/// Largest encoded request (servo/sonar config SysEx frames).
pub const MAX_REQUEST_SIZE: usize = 8;

/// Encoded request bytes.
pub type EncodedRequest = Vec<u8, MAX_REQUEST_SIZE>;

/// Error type for request encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EncodeError {
    /// A value does not fit its field.
    Range(RangeError),
    /// Pin or port does not fit the 4-bit channel nibble.
    Channel(u8),
    /// Mode has no wire representation.
    Mode(PinMode),
}

impl From<RangeError> for EncodeError {
    fn from(err: RangeError) -> Self {
        EncodeError::Range(err)
    }
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Range(err) => err.fmt(f),
            Self::Channel(ch) => write!(f, "channel {ch} does not fit a command nibble"),
            Self::Mode(mode) => write!(f, "mode {mode:?} cannot be sent"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for EncodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Range(err) => Some(err),
            _ => None,
        }
    }
}

/// A message the host sends to the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Request {
    /// `[0xF4, pin, mode]`
    SetPinMode { pin: u8, mode: PinMode },
    /// `[0xC0 + pin, flag]`
    ReportAnalog { pin: u8, enable: bool },
    /// `[0xD0 + port, flag]`
    ReportDigital { port: u8, enable: bool },
    /// `[0x90 + port, mask lsb, mask msb]`
    DigitalPort { port: u8, mask: u8 },
    /// `[0x90, pin, level]` for a pin outside any port.
    DigitalPin { pin: u8, level: bool },
    /// `[0xE0 + pin, lsb, msb]` for PWM duty or servo angle.
    AnalogWrite { pin: u8, value: u16 },
    /// SysEx SERVO_CONFIG `[pin, min lsb, min msb, max lsb, max msb]`.
    ServoConfig { pin: u8, min_pulse: u16, max_pulse: u16 },
    /// SysEx SONAR_CONFIG `[trigger, echo, interval, max lsb, max msb]`.
    SonarConfig {
        trigger: u8,
        echo: u8,
        ping_interval: u8,
        max_distance: u16,
    },
    /// SysEx REPORT_FIRMWARE with an empty payload.
    QueryFirmware,
    /// Bare REPORT_VERSION.
    QueryVersion,
    /// SYSTEM_RESET.
    SystemReset,
}

impl Request {
    /// Encode the request into wire bytes.
    pub fn encode(&self) -> Result<EncodedRequest, EncodeError> {
        let mut out = EncodedRequest::new();
        match *self {
            Self::SetPinMode { pin, mode } => {
                let code = mode.wire().ok_or(EncodeError::Mode(mode))?;
                push_all(&mut out, &[SET_PIN_MODE, data7(pin)?, code]);
            }
            Self::ReportAnalog { pin, enable } => {
                push_all(&mut out, &[REPORT_ANALOG | channel(pin)?, enable as u8]);
            }
            Self::ReportDigital { port, enable } => {
                push_all(&mut out, &[REPORT_DIGITAL | channel(port)?, enable as u8]);
            }
            Self::DigitalPort { port, mask } => {
                let (lsb, msb) = pack16(mask as u16)?;
                push_all(&mut out, &[DIGITAL_MESSAGE | channel(port)?, lsb, msb]);
            }
            Self::DigitalPin { pin, level } => {
                push_all(&mut out, &[DIGITAL_MESSAGE, data7(pin)?, level as u8]);
            }
            Self::AnalogWrite { pin, value } => {
                let (lsb, msb) = pack16(value)?;
                push_all(&mut out, &[ANALOG_MESSAGE | channel(pin)?, lsb, msb]);
            }
            Self::ServoConfig {
                pin,
                min_pulse,
                max_pulse,
            } => {
                let (min_lsb, min_msb) = pack16(min_pulse)?;
                let (max_lsb, max_msb) = pack16(max_pulse)?;
                push_all(
                    &mut out,
                    &[
                        START_SYSEX,
                        SERVO_CONFIG,
                        data7(pin)?,
                        min_lsb,
                        min_msb,
                        max_lsb,
                        max_msb,
                        END_SYSEX,
                    ],
                );
            }
            Self::SonarConfig {
                trigger,
                echo,
                ping_interval,
                max_distance,
            } => {
                let max_lsb = (max_distance & 0x7F) as u8;
                let max_msb = ((max_distance >> 7) & 0x7F) as u8;
                push_all(
                    &mut out,
                    &[
                        START_SYSEX,
                        SONAR_CONFIG,
                        data7(trigger)?,
                        data7(echo)?,
                        data7(ping_interval)?,
                        max_lsb,
                        max_msb,
                        END_SYSEX,
                    ],
                );
            }
            Self::QueryFirmware => push_all(&mut out, &[START_SYSEX, REPORT_FIRMWARE, END_SYSEX]),
            Self::QueryVersion => push_all(&mut out, &[REPORT_VERSION]),
            Self::SystemReset => push_all(&mut out, &[SYSTEM_RESET]),
        }
        Ok(out)
    }
}

/// Every request fits in [`MAX_REQUEST_SIZE`], so pushes cannot fail.
#[inline]
fn push_all(out: &mut EncodedRequest, bytes: &[u8]) {
    for &b in bytes {
        let _ = out.push(b);
    }
}

#[inline]
fn channel(value: u8) -> Result<u8, EncodeError> {
    if value > 0x0F {
        return Err(EncodeError::Channel(value));
    }
    Ok(value)
}

#[inline]
fn data7(value: u8) -> Result<u8, EncodeError> {
    if value > 0x7F {
        return Err(EncodeError::Range(RangeError {
            value: value as u32,
            max: 0x7F,
        }));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(request: Request) -> EncodedRequest {
        request.encode().unwrap()
    }

    #[test]
    fn test_set_pin_mode() {
        let out = bytes(Request::SetPinMode {
            pin: 3,
            mode: PinMode::Pwm,
        });
        assert_eq!(&out[..], &[0xF4, 3, 3]);

        let out = bytes(Request::SetPinMode {
            pin: 7,
            mode: PinMode::Sonar,
        });
        assert_eq!(&out[..], &[0xF4, 7, 0x0B]);
    }

    #[test]
    fn test_set_pin_mode_unavailable_rejected() {
        let err = Request::SetPinMode {
            pin: 0,
            mode: PinMode::Unavailable,
        }
        .encode();
        assert_eq!(err, Err(EncodeError::Mode(PinMode::Unavailable)));
    }

    #[test]
    fn test_report_toggles() {
        assert_eq!(
            &bytes(Request::ReportAnalog { pin: 2, enable: true })[..],
            &[0xC2, 1]
        );
        assert_eq!(
            &bytes(Request::ReportDigital {
                port: 1,
                enable: false
            })[..],
            &[0xD1, 0]
        );
    }

    #[test]
    fn test_digital_port_mask_split() {
        let out = bytes(Request::DigitalPort {
            port: 0,
            mask: 0b1000_0100,
        });
        assert_eq!(&out[..], &[0x90, 0x04, 0x01]);
    }

    #[test]
    fn test_analog_write() {
        let out = bytes(Request::AnalogWrite { pin: 9, value: 255 });
        assert_eq!(&out[..], &[0xE9, 0x7F, 0x01]);
        assert_eq!(
            Request::AnalogWrite { pin: 16, value: 0 }.encode(),
            Err(EncodeError::Channel(16))
        );
    }

    #[test]
    fn test_servo_config_defaults() {
        let out = bytes(Request::ServoConfig {
            pin: 9,
            min_pulse: 544,
            max_pulse: 2400,
        });
        assert_eq!(
            &out[..],
            &[0xF0, 0x70, 9, 0x20, 0x04, 0x60, 0x12, 0xF7]
        );
    }

    #[test]
    fn test_sonar_config() {
        let out = bytes(Request::SonarConfig {
            trigger: 14,
            echo: 14,
            ping_interval: 50,
            max_distance: 200,
        });
        assert_eq!(&out[..], &[0xF0, 0x62, 14, 14, 50, 0x48, 0x01, 0xF7]);
    }

    #[test]
    fn test_queries_and_reset() {
        assert_eq!(&bytes(Request::QueryFirmware)[..], &[0xF0, 0x79, 0xF7]);
        assert_eq!(&bytes(Request::QueryVersion)[..], &[0xF9]);
        assert_eq!(&bytes(Request::SystemReset)[..], &[0xFF]);
    }
}
