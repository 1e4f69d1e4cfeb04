//! Wire constants, pin modes and the inbound command table.
//!
//! The command table is closed: every inbound command the client understands
//! is a variant, and its arity is fixed here rather than discovered at runtime.

/// Digital port report / write (`0x90 + port`).
pub const DIGITAL_MESSAGE: u8 = 0x90;
/// Analog, PWM or servo value (`0xE0 + pin`).
pub const ANALOG_MESSAGE: u8 = 0xE0;
/// Enable/disable analog reporting (`0xC0 + pin`).
pub const REPORT_ANALOG: u8 = 0xC0;
/// Enable/disable digital port reporting (`0xD0 + port`).
pub const REPORT_DIGITAL: u8 = 0xD0;
/// Start of a SysEx frame.
pub const START_SYSEX: u8 = 0xF0;
/// Set a pin's mode: `[0xF4, pin, mode]`.
pub const SET_PIN_MODE: u8 = 0xF4;
/// End of a SysEx frame.
pub const END_SYSEX: u8 = 0xF7;
/// Protocol version report / request.
pub const REPORT_VERSION: u8 = 0xF9;
/// Reset the firmware.
pub const SYSTEM_RESET: u8 = 0xFF;

/// SysEx: configure a sonar (ping) sensor.
pub const SONAR_CONFIG: u8 = 0x62;
/// SysEx: sonar distance reply.
pub const SONAR_DATA: u8 = 0x63;
/// SysEx: configure a servo.
pub const SERVO_CONFIG: u8 = 0x70;
/// SysEx: firmware name and version.
pub const REPORT_FIRMWARE: u8 = 0x79;

/// Operating mode of a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinMode {
    /// Reserved pin (Rx/Tx, crystal). Terminal: never leaves this mode.
    Unavailable,
    Input,
    Output,
    Analog,
    Pwm,
    Servo,
    Sonar,
}

impl PinMode {
    /// Protocol code of the mode (`-1` for [`PinMode::Unavailable`]).
    #[inline]
    #[must_use]
    pub const fn code(self) -> i8 {
        match self {
            Self::Unavailable => -1,
            Self::Input => 0,
            Self::Output => 1,
            Self::Analog => 2,
            Self::Pwm => 3,
            Self::Servo => 4,
            Self::Sonar => 0x0B,
        }
    }

    /// Byte sent in SET_PIN_MODE, `None` for modes that never go on the wire.
    #[inline]
    #[must_use]
    pub const fn wire(self) -> Option<u8> {
        match self {
            Self::Unavailable => None,
            other => Some(other.code() as u8),
        }
    }

    /// Look a mode up by its protocol code.
    #[must_use]
    pub const fn from_code(code: i8) -> Option<Self> {
        match code {
            -1 => Some(Self::Unavailable),
            0 => Some(Self::Input),
            1 => Some(Self::Output),
            2 => Some(Self::Analog),
            3 => Some(Self::Pwm),
            4 => Some(Self::Servo),
            0x0B => Some(Self::Sonar),
            _ => None,
        }
    }
}

/// Inbound commands with a fixed number of data values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// `0xE0 + pin`, then value lsb/msb.
    AnalogMessage,
    /// `0x90 + port`, then mask lsb/msb.
    DigitalMessage,
    /// `0xF9`, then major/minor.
    ReportVersion,
}

impl Command {
    /// Resolve a lead byte.
    ///
    /// Leads below START_SYSEX are looked up by their high nibble; the low
    /// nibble is the channel. Other leads must match exactly.
    #[must_use]
    pub const fn lookup(lead: u8) -> Option<Self> {
        if lead < START_SYSEX {
            match lead & 0xF0 {
                ANALOG_MESSAGE => Some(Self::AnalogMessage),
                DIGITAL_MESSAGE => Some(Self::DigitalMessage),
                _ => None,
            }
        } else {
            match lead {
                REPORT_VERSION => Some(Self::ReportVersion),
                _ => None,
            }
        }
    }

    /// Number of data values handed to the handler, channel nibble included.
    #[inline]
    #[must_use]
    pub const fn arity(self) -> usize {
        match self {
            Self::AnalogMessage | Self::DigitalMessage => 3,
            Self::ReportVersion => 2,
        }
    }

    /// Whether the lead byte carries a channel nibble.
    #[inline]
    #[must_use]
    pub const fn has_channel(self) -> bool {
        matches!(self, Self::AnalogMessage | Self::DigitalMessage)
    }

    /// Bytes still to read after the lead byte.
    #[inline]
    #[must_use]
    pub const fn trailing_bytes(self) -> usize {
        if self.has_channel() {
            self.arity() - 1
        } else {
            self.arity()
        }
    }
}

/// Inbound SysEx commands. Payload length is variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SysexCommand {
    SonarData,
    ReportFirmware,
}

impl SysexCommand {
    /// Resolve a SysEx command id.
    #[must_use]
    pub const fn lookup(id: u8) -> Option<Self> {
        match id {
            SONAR_DATA => Some(Self::SonarData),
            REPORT_FIRMWARE => Some(Self::ReportFirmware),
            _ => None,
        }
    }

    /// The SysEx command id.
    #[inline]
    #[must_use]
    pub const fn id(self) -> u8 {
        match self {
            Self::SonarData => SONAR_DATA,
            Self::ReportFirmware => REPORT_FIRMWARE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_mode_codes() {
        assert_eq!(PinMode::Unavailable.code(), -1);
        assert_eq!(PinMode::Sonar.code(), 0x0B);
        assert_eq!(PinMode::Unavailable.wire(), None);
        assert_eq!(PinMode::Servo.wire(), Some(4));
        for code in [-1, 0, 1, 2, 3, 4, 0x0B] {
            assert_eq!(PinMode::from_code(code).map(PinMode::code), Some(code));
        }
        assert_eq!(PinMode::from_code(5), None);
    }

    #[test]
    fn test_lookup_by_nibble() {
        assert_eq!(Command::lookup(0x90), Some(Command::DigitalMessage));
        assert_eq!(Command::lookup(0x9F), Some(Command::DigitalMessage));
        assert_eq!(Command::lookup(0xE3), Some(Command::AnalogMessage));
        assert_eq!(Command::lookup(0xC0), None);
        assert_eq!(Command::lookup(0x05), None);
    }

    #[test]
    fn test_lookup_exact_system_bytes() {
        assert_eq!(Command::lookup(REPORT_VERSION), Some(Command::ReportVersion));
        assert_eq!(Command::lookup(SYSTEM_RESET), None);
        assert_eq!(Command::lookup(END_SYSEX), None);
    }

    #[test]
    fn test_trailing_bytes() {
        assert_eq!(Command::AnalogMessage.trailing_bytes(), 2);
        assert_eq!(Command::DigitalMessage.trailing_bytes(), 2);
        assert_eq!(Command::ReportVersion.trailing_bytes(), 2);
    }

    #[test]
    fn test_sysex_lookup() {
        assert_eq!(SysexCommand::lookup(0x63), Some(SysexCommand::SonarData));
        assert_eq!(SysexCommand::lookup(0x79), Some(SysexCommand::ReportFirmware));
        assert_eq!(SysexCommand::lookup(0x70), None);
        assert_eq!(SysexCommand::ReportFirmware.id(), REPORT_FIRMWARE);
    }
}
