//! Actions of the mark robot kit: two DC motors, servos, LEDs, gray-scale
//! and button sensors on analog inputs, and sonar rangers.

use firmata_proto::RangeError;
use mark_core::pin::SERVO_MAX_ANGLE;
use mark_core::{
    digital_index_for_channel, Board, BoardConfig, PinId, PinMode, PinValue, PollerConfig,
};

use crate::transport::{TransportDescriptor, TransportSettings};
use crate::Result;

/// Largest motor power, in percent.
pub const MAX_POWER: u32 = 100;

/// The two motor channels of the kit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motor {
    A,
    B,
}

impl Motor {
    /// `(pwm, direction)` pins of the channel.
    #[inline]
    #[must_use]
    pub const fn pins(self) -> (u8, u8) {
        match self {
            Self::A => (11, 13),
            Self::B => (5, 12),
        }
    }
}

/// A connected mark robot.
pub struct MarkRobot {
    name: String,
    board: Board,
}

impl MarkRobot {
    pub fn new(name: impl Into<String>, board: Board) -> Self {
        Self {
            name: name.into(),
            board,
        }
    }

    /// Open a discovered board and start its poller.
    pub fn connect(
        descriptor: &TransportDescriptor,
        settings: &TransportSettings,
        config: BoardConfig,
    ) -> mark_core::Result<Self> {
        let transport = descriptor.connect(settings)?;
        let board = Board::connect(transport, config)?;
        board.start_polling(PollerConfig::default())?;
        Ok(Self::new(descriptor.display_name(), board))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn disconnect(self) -> Result<()> {
        Ok(self.board.disconnect()?)
    }

    fn ensure_mode(&self, pin: u8, mode: PinMode) -> Result<()> {
        let id = PinId::Digital(pin);
        if self.board.mode(id)? != mode {
            self.board.set_mode(id, mode)?;
        }
        Ok(())
    }

    /// Drive a motor at `power` percent; negative values reverse it.
    pub fn turn_motor(&self, motor: Motor, power: i32) -> Result<()> {
        let magnitude = power.unsigned_abs();
        if magnitude > MAX_POWER {
            return Err(mark_core::Error::Range(RangeError {
                value: magnitude,
                max: MAX_POWER,
            })
            .into());
        }
        let (pwm, direction) = motor.pins();
        self.ensure_mode(pwm, PinMode::Pwm)?;
        self.ensure_mode(direction, PinMode::Output)?;

        let duty = f64::from(magnitude) / f64::from(MAX_POWER);
        self.board.write(PinId::Digital(pwm), PinValue::Analog(duty))?;
        self.board
            .write(PinId::Digital(direction), PinValue::Digital(power < 0))?;
        Ok(())
    }

    pub fn brake(&self, motor: Motor) -> Result<()> {
        self.turn_motor(motor, 0)
    }

    /// Move a servo to `angle` degrees, attaching it first if needed.
    pub fn servo(&self, pin: u8, angle: u8) -> Result<()> {
        if angle > SERVO_MAX_ANGLE {
            return Err(mark_core::Error::Range(RangeError {
                value: u32::from(angle),
                max: u32::from(SERVO_MAX_ANGLE),
            })
            .into());
        }
        let id = PinId::Digital(pin);
        if self.board.mode(id)? != PinMode::Servo {
            self.board.attach_servo(pin)?;
        }
        self.board.write(id, PinValue::Degrees(angle))?;
        Ok(())
    }

    pub fn led(&self, pin: u8, on: bool) -> Result<()> {
        self.ensure_mode(pin, PinMode::Output)?;
        self.board.write(PinId::Digital(pin), PinValue::Digital(on))?;
        Ok(())
    }

    fn sample_analog(&self, channel: u8) -> Result<Option<f64>> {
        let reading = self.board.sample(PinId::Analog(channel))?;
        Ok(reading.fresh_value().and_then(PinValue::as_f64))
    }

    /// Gray-scale sensor level in percent, `None` without a fresh sample.
    pub fn gray(&self, channel: u8) -> Result<Option<u8>> {
        Ok(self
            .sample_analog(channel)?
            .map(|level| (level * 100.0) as u8))
    }

    /// Sonar distance in centimeters on the pin behind an analog channel.
    pub fn distance(&self, channel: u8) -> Result<Option<u16>> {
        let pin = digital_index_for_channel(channel);
        Ok(self.board.sample_distance(pin)?.fresh_value())
    }

    /// `Some(true)` while the button pulls the input to ground.
    pub fn button(&self, channel: u8) -> Result<Option<bool>> {
        Ok(self.sample_analog(channel)?.map(|level| level <= 0.0))
    }

    /// Stop both motors and reset the board.
    ///
    /// The reset is sent even when stopping a motor fails; the first error
    /// is returned.
    pub fn stop(&self) -> Result<()> {
        let motors = self.brake(Motor::A).and(self.brake(Motor::B));
        let reset = self.board.reset().map_err(Into::into);
        motors.and(reset)
    }
}
