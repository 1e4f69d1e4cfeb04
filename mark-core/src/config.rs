//! Board layout and timing configuration.

use std::time::Duration;

/// Static pin layout of a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardLayout {
    /// Number of digital pins, numbered from 0.
    pub digital: u8,
    /// Number of analog channels, numbered from 0.
    pub analog: u8,
    /// Digital pins able to drive PWM.
    pub pwm: &'static [u8],
    /// Reserved digital pins (Rx/Tx, crystal).
    pub disabled: &'static [u8],
    /// Number of sonar slots, indexed in digital pin space.
    pub sonar_slots: u8,
    /// Group digital pins into 8-pin ports for reporting and writes.
    pub use_ports: bool,
}

/// Layout of the reference mark board (ATmega328 based).
pub const REFERENCE_LAYOUT: BoardLayout = BoardLayout {
    digital: 14,
    analog: 6,
    pwm: &[3, 5, 6, 9, 10, 11],
    disabled: &[0, 1], // Rx, Tx
    sonar_slots: 20,
    use_ports: true,
};

impl Default for BoardLayout {
    fn default() -> Self {
        REFERENCE_LAYOUT
    }
}

/// Pins per digital port.
pub const PORT_WIDTH: u8 = 8;

/// Digital index of an analog channel on the reference layout.
///
/// Channels 0-5 sit on digital pins 14-19; other numbers are already
/// digital indices.
#[inline]
#[must_use]
pub const fn digital_index_for_channel(channel: u8) -> u8 {
    if channel < 6 {
        channel + 14
    } else {
        channel
    }
}

/// Board timing and layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardConfig {
    pub layout: BoardLayout,
    /// How long a sampled read waits for a fresh report.
    pub settle_timeout: Duration,
    /// How long [`crate::Board::query_firmware`] waits for the reply.
    pub firmware_timeout: Duration,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            layout: REFERENCE_LAYOUT,
            settle_timeout: Duration::from_millis(50),
            firmware_timeout: Duration::from_secs(1),
        }
    }
}

/// Background poller timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    /// Sleep when no bytes are pending.
    pub idle_sleep: Duration,
    /// Sleep after a transport error.
    pub error_backoff: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            idle_sleep: Duration::from_millis(1),
            error_backoff: Duration::from_millis(100),
        }
    }
}
