//! Pin/port model.
//!
//! Holds mode, cached value and reporting flag for every pin, the reporting
//! flag of every digital port, and the sonar slots. Every mutating operation
//! returns the [`Request`]s that carry the change to the board; the caller
//! sends them while still holding the model, so wire order matches model
//! order.
//!
//! Inbound updates (`*_update`) are applied by the dispatcher only.

use core::fmt;

use firmata_proto::{pack16, PinMode, RangeError, Request};

use crate::config::{BoardLayout, PORT_WIDTH};
use crate::error::{Error, Result};

/// Default servo pulse range in microseconds.
pub const SERVO_MIN_PULSE: u16 = 544;
pub const SERVO_MAX_PULSE: u16 = 2400;
/// Largest servo angle.
pub const SERVO_MAX_ANGLE: u8 = 180;
/// Largest sonar range the firmware accepts.
pub const SONAR_MAX_DISTANCE: u16 = 200;
/// Default sonar ping interval in milliseconds.
pub const SONAR_PING_INTERVAL: u8 = 50;
/// Full-scale value of the 10-bit ADC.
pub const ADC_MAX: u16 = 1023;
/// Full-scale PWM duty.
pub const PWM_MAX: u16 = 255;

/// Address of a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinId {
    Digital(u8),
    /// Analog channel number, not its digital index.
    Analog(u8),
}

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Digital(n) => write!(f, "digital pin {n}"),
            Self::Analog(n) => write!(f, "analog pin {n}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinKind {
    Digital,
    Analog,
}

/// Cached pin value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PinValue {
    /// Digital level.
    Digital(bool),
    /// Analog reading or PWM duty in `0.0..=1.0`.
    Analog(f64),
    /// Servo angle.
    Degrees(u8),
}

impl PinValue {
    /// Level of a digital value.
    #[must_use]
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Self::Digital(level) => Some(level),
            _ => None,
        }
    }

    /// Fraction of an analog value.
    #[must_use]
    pub fn as_f64(self) -> Option<f64> {
        match self {
            Self::Analog(v) => Some(v),
            _ => None,
        }
    }
}

/// How [`PinModel::write`] treats a value equal to the cached one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WritePolicy {
    /// Send nothing when the value is unchanged.
    #[default]
    SkipUnchanged,
    /// Always send.
    Always,
}

/// One pin of the board.
#[derive(Debug, Clone, PartialEq)]
pub struct Pin {
    id: PinId,
    mode: PinMode,
    pwm_capable: bool,
    reporting: bool,
    value: Option<PinValue>,
    updates: u64,
}

impl Pin {
    fn new(id: PinId, mode: PinMode, pwm_capable: bool) -> Self {
        Self {
            id,
            mode,
            pwm_capable,
            reporting: false,
            value: None,
            updates: 0,
        }
    }

    #[inline]
    pub fn id(&self) -> PinId {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> PinKind {
        match self.id {
            PinId::Digital(_) => PinKind::Digital,
            PinId::Analog(_) => PinKind::Analog,
        }
    }

    #[inline]
    pub fn mode(&self) -> PinMode {
        self.mode
    }

    #[inline]
    pub fn pwm_capable(&self) -> bool {
        self.pwm_capable
    }

    #[inline]
    pub fn reporting(&self) -> bool {
        self.reporting
    }

    /// Last value written or reported, `None` before the first one.
    #[inline]
    pub fn value(&self) -> Option<PinValue> {
        self.value
    }

    /// Number of inbound reports applied to this pin.
    #[inline]
    pub fn updates(&self) -> u64 {
        self.updates
    }

    fn mode_error(&self, mode: PinMode, reason: &'static str) -> Error {
        Error::Mode {
            pin: self.id,
            mode,
            reason,
        }
    }

    fn state_error(&self, reason: &'static str) -> Error {
        Error::State {
            pin: self.id,
            mode: self.mode,
            reason,
        }
    }
}

/// A group of up to eight digital pins reported and written together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Port {
    number: u8,
    first: u8,
    len: u8,
    reporting: bool,
}

impl Port {
    #[inline]
    pub fn number(&self) -> u8 {
        self.number
    }

    #[inline]
    pub fn reporting(&self) -> bool {
        self.reporting
    }

    /// Digital indices of the member pins.
    pub fn pins(&self) -> core::ops::Range<usize> {
        self.first as usize..(self.first + self.len) as usize
    }
}

/// A sonar sensor slot, indexed in digital pin space.
///
/// Idle slots are OUTPUT; configuring one turns it into an active INPUT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SonarSlot {
    mode: PinMode,
    active: bool,
    distance: Option<u16>,
    updates: u64,
}

impl Default for SonarSlot {
    fn default() -> Self {
        Self {
            mode: PinMode::Output,
            active: false,
            distance: None,
            updates: 0,
        }
    }
}

impl SonarSlot {
    #[inline]
    pub fn mode(&self) -> PinMode {
        self.mode
    }

    #[inline]
    pub fn active(&self) -> bool {
        self.active
    }

    /// Last reported distance.
    #[inline]
    pub fn distance(&self) -> Option<u16> {
        self.distance
    }

    #[inline]
    pub fn updates(&self) -> u64 {
        self.updates
    }
}

/// Pin, port and sonar state of one board.
#[derive(Debug, Clone)]
pub struct PinModel {
    layout: BoardLayout,
    digital: Vec<Pin>,
    analog: Vec<Pin>,
    ports: Vec<Port>,
    sonar: Vec<SonarSlot>,
}

impl PinModel {
    /// Build the model for `layout`: digital pins start as OUTPUT, analog
    /// pins as INPUT, reserved pins as UNAVAILABLE.
    pub fn new(layout: BoardLayout) -> Self {
        let digital = (0..layout.digital)
            .map(|n| {
                let mode = if layout.disabled.contains(&n) {
                    PinMode::Unavailable
                } else {
                    PinMode::Output
                };
                Pin::new(PinId::Digital(n), mode, layout.pwm.contains(&n))
            })
            .collect();
        let analog = (0..layout.analog)
            .map(|n| Pin::new(PinId::Analog(n), PinMode::Input, false))
            .collect();
        let ports = (0..layout.digital)
            .step_by(PORT_WIDTH as usize)
            .map(|first| Port {
                number: first / PORT_WIDTH,
                first,
                len: (layout.digital - first).min(PORT_WIDTH),
                reporting: false,
            })
            .collect();
        let sonar = vec![SonarSlot::default(); layout.sonar_slots as usize];
        Self {
            layout,
            digital,
            analog,
            ports,
            sonar,
        }
    }

    #[inline]
    pub fn layout(&self) -> &BoardLayout {
        &self.layout
    }

    pub fn digital_pins(&self) -> &[Pin] {
        &self.digital
    }

    pub fn analog_pins(&self) -> &[Pin] {
        &self.analog
    }

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    /// Look a pin up.
    pub fn pin(&self, id: PinId) -> Result<&Pin> {
        let found = match id {
            PinId::Digital(n) => self.digital.get(n as usize),
            PinId::Analog(n) => self.analog.get(n as usize),
        };
        found.ok_or_else(|| Error::Pin(format!("{id} does not exist")))
    }

    fn pin_mut(&mut self, id: PinId) -> Result<&mut Pin> {
        let found = match id {
            PinId::Digital(n) => self.digital.get_mut(n as usize),
            PinId::Analog(n) => self.analog.get_mut(n as usize),
        };
        found.ok_or_else(|| Error::Pin(format!("{id} does not exist")))
    }

    /// Look a sonar slot up.
    pub fn sonar(&self, slot: u8) -> Result<&SonarSlot> {
        self.sonar
            .get(slot as usize)
            .ok_or_else(|| Error::Pin(format!("sonar slot {slot} does not exist")))
    }

    /// Pin number used in SET_PIN_MODE and single-pin digital frames.
    fn wire_index(&self, id: PinId) -> u8 {
        match id {
            PinId::Digital(n) => n,
            PinId::Analog(n) => self.layout.digital + n,
        }
    }

    fn port_of(&self, id: PinId) -> Option<usize> {
        match id {
            PinId::Digital(n) => {
                let port = (n / PORT_WIDTH) as usize;
                (port < self.ports.len()).then_some(port)
            }
            PinId::Analog(_) => None,
        }
    }

    /// Change the mode of a pin.
    ///
    /// SERVO sends SERVO_CONFIG with the default pulse range instead of
    /// SET_PIN_MODE. INPUT also enables reporting. UNAVAILABLE is local
    /// only and terminal.
    pub fn set_mode(&mut self, id: PinId, mode: PinMode) -> Result<Vec<Request>> {
        let pin = self.pin(id)?;
        if pin.mode == PinMode::Unavailable {
            return Err(pin.mode_error(mode, "pin is reserved"));
        }
        match mode {
            PinMode::Unavailable => {
                let pin = self.pin_mut(id)?;
                pin.mode = PinMode::Unavailable;
                pin.reporting = false;
                return Ok(Vec::new());
            }
            PinMode::Pwm if !pin.pwm_capable => {
                return Err(pin.mode_error(mode, "pin has no PWM capability"));
            }
            PinMode::Servo => {
                let PinId::Digital(n) = id else {
                    return Err(pin.mode_error(mode, "only digital pins drive servos"));
                };
                return self.configure_servo(n, SERVO_MIN_PULSE, SERVO_MAX_PULSE, 0);
            }
            _ => {}
        }

        log::debug!("{id} -> {mode:?}");
        let wire_pin = self.wire_index(id);
        self.pin_mut(id)?.mode = mode;
        let mut requests = vec![Request::SetPinMode {
            pin: wire_pin,
            mode,
        }];
        if mode == PinMode::Input {
            requests.extend(self.enable_reporting(id)?);
        }
        Ok(requests)
    }

    /// Enable reporting of an INPUT pin.
    ///
    /// Digital pins enable their whole port, marking every INPUT member as
    /// reporting.
    pub fn enable_reporting(&mut self, id: PinId) -> Result<Vec<Request>> {
        let pin = self.pin(id)?;
        if pin.mode != PinMode::Input {
            return Err(pin.state_error("only inputs report"));
        }
        match (id, self.port_of(id)) {
            (PinId::Digital(_), Some(port)) => {
                let port = &mut self.ports[port];
                port.reporting = true;
                for pin in &mut self.digital[port.pins()] {
                    if pin.mode == PinMode::Input {
                        pin.reporting = true;
                    }
                }
                Ok(vec![Request::ReportDigital {
                    port: port.number,
                    enable: true,
                }])
            }
            (_, _) => {
                let channel = match id {
                    PinId::Digital(n) | PinId::Analog(n) => n,
                };
                self.pin_mut(id)?.reporting = true;
                Ok(vec![Request::ReportAnalog {
                    pin: channel,
                    enable: true,
                }])
            }
        }
    }

    /// Disable reporting of a pin, or of its whole port for digital pins.
    pub fn disable_reporting(&mut self, id: PinId) -> Result<Vec<Request>> {
        self.pin(id)?;
        match (id, self.port_of(id)) {
            (PinId::Digital(_), Some(port)) => {
                let port = &mut self.ports[port];
                port.reporting = false;
                for pin in &mut self.digital[port.pins()] {
                    pin.reporting = false;
                }
                Ok(vec![Request::ReportDigital {
                    port: port.number,
                    enable: false,
                }])
            }
            (_, _) => {
                let channel = match id {
                    PinId::Digital(n) | PinId::Analog(n) => n,
                };
                self.pin_mut(id)?.reporting = false;
                Ok(vec![Request::ReportAnalog {
                    pin: channel,
                    enable: false,
                }])
            }
        }
    }

    /// Write a value to an OUTPUT, PWM or SERVO pin.
    ///
    /// OUTPUT takes [`PinValue::Digital`], PWM takes [`PinValue::Analog`] in
    /// `0.0..=1.0` and SERVO takes [`PinValue::Degrees`] up to 180.
    pub fn write(&mut self, id: PinId, value: PinValue, policy: WritePolicy) -> Result<Vec<Request>> {
        let pin = self.pin(id)?;
        let wire_value = match (pin.mode, value) {
            (PinMode::Unavailable, _) => return Err(pin.state_error("pin is reserved")),
            (PinMode::Input, _) => return Err(pin.state_error("inputs cannot be written")),
            (PinMode::Output, PinValue::Digital(level)) => level as u16,
            (PinMode::Pwm, PinValue::Analog(duty)) => {
                let scaled = (duty * PWM_MAX as f64).round();
                if !(0.0..=1.0).contains(&duty) {
                    return Err(Error::Range(RangeError {
                        value: scaled as u32,
                        max: PWM_MAX as u32,
                    }));
                }
                scaled as u16
            }
            (PinMode::Servo, PinValue::Degrees(angle)) => {
                if angle > SERVO_MAX_ANGLE {
                    return Err(Error::Range(RangeError {
                        value: angle as u32,
                        max: SERVO_MAX_ANGLE as u32,
                    }));
                }
                angle as u16
            }
            (PinMode::Output | PinMode::Pwm | PinMode::Servo, _) => {
                return Err(pin.state_error("value does not match pin mode"))
            }
            _ => return Err(pin.state_error("pin is not writable")),
        };
        if policy == WritePolicy::SkipUnchanged && pin.value == Some(value) {
            return Ok(Vec::new());
        }

        let mode = pin.mode;
        self.pin_mut(id)?.value = Some(value);
        let request = match mode {
            PinMode::Output => match self.port_of(id) {
                Some(port) if self.layout.use_ports => Request::DigitalPort {
                    port: self.ports[port].number,
                    mask: self.port_mask(port),
                },
                _ => Request::DigitalPin {
                    pin: self.wire_index(id),
                    level: wire_value != 0,
                },
            },
            _ => Request::AnalogWrite {
                pin: self.wire_index(id),
                value: wire_value,
            },
        };
        Ok(vec![request])
    }

    /// Bitmask of the OUTPUT pins of a port that are high.
    fn port_mask(&self, port: usize) -> u8 {
        let port = &self.ports[port];
        self.digital[port.pins()]
            .iter()
            .enumerate()
            .filter(|(_, pin)| {
                pin.mode == PinMode::Output && pin.value == Some(PinValue::Digital(true))
            })
            .fold(0u8, |mask, (bit, _)| mask | (1u8 << bit))
    }

    /// Cached value of a pin.
    pub fn read(&self, id: PinId) -> Result<Option<PinValue>> {
        let pin = self.pin(id)?;
        if pin.mode == PinMode::Unavailable {
            return Err(pin.state_error("pin is reserved"));
        }
        Ok(pin.value)
    }

    /// Attach a servo to a digital pin and move it to `angle`.
    pub fn configure_servo(
        &mut self,
        pin: u8,
        min_pulse: u16,
        max_pulse: u16,
        angle: u8,
    ) -> Result<Vec<Request>> {
        let id = PinId::Digital(pin);
        match self.digital.get(pin as usize) {
            None => return Err(Error::Pin(format!("{id} does not exist"))),
            Some(p) if p.mode == PinMode::Unavailable => {
                return Err(Error::Pin(format!("{id} is reserved")))
            }
            Some(_) => {}
        }
        pack16(min_pulse)?;
        pack16(max_pulse)?;
        if angle > SERVO_MAX_ANGLE {
            return Err(Error::Range(RangeError {
                value: angle as u32,
                max: SERVO_MAX_ANGLE as u32,
            }));
        }

        log::debug!("{id} -> Servo ({min_pulse}..{max_pulse} us)");
        let slot = &mut self.digital[pin as usize];
        slot.mode = PinMode::Servo;
        slot.reporting = false;
        let mut requests = vec![Request::ServoConfig {
            pin,
            min_pulse,
            max_pulse,
        }];
        requests.extend(self.write(id, PinValue::Degrees(angle), WritePolicy::Always)?);
        Ok(requests)
    }

    /// Activate a sonar slot. A slot that is already active is left alone.
    ///
    /// `max_distance` is capped at [`SONAR_MAX_DISTANCE`].
    pub fn configure_sonar(
        &mut self,
        pin: u8,
        ping_interval: u8,
        max_distance: u16,
    ) -> Result<Vec<Request>> {
        let slot = self
            .sonar
            .get_mut(pin as usize)
            .ok_or_else(|| Error::Pin(format!("sonar slot {pin} does not exist")))?;
        if slot.active {
            return Ok(Vec::new());
        }
        slot.mode = PinMode::Input;
        slot.active = true;
        log::debug!("sonar slot {pin} active");
        Ok(vec![Request::SonarConfig {
            trigger: pin,
            echo: pin,
            ping_interval,
            max_distance: max_distance.min(SONAR_MAX_DISTANCE),
        }])
    }

    /// Return every pin to its power-on state and request a firmware reset.
    ///
    /// Reserved pins stay reserved. Cached values are cleared so later writes
    /// are never suppressed.
    pub fn reset(&mut self) -> Vec<Request> {
        for slot in &mut self.sonar {
            *slot = SonarSlot::default();
        }
        for pin in &mut self.analog {
            pin.mode = PinMode::Input;
            pin.reporting = false;
            pin.value = None;
        }
        for pin in &mut self.digital {
            if pin.mode != PinMode::Unavailable {
                pin.mode = PinMode::Output;
            }
            pin.reporting = false;
            pin.value = None;
        }
        for port in &mut self.ports {
            port.reporting = false;
        }
        vec![Request::SystemReset]
    }

    /// Apply an inbound digital port report to the port's INPUT pins.
    ///
    /// Ignored while the port is not reporting.
    pub fn port_update(&mut self, port: u8, mask: u16) -> Result<()> {
        let port = self
            .ports
            .get(port as usize)
            .copied()
            .ok_or_else(|| Error::Pin(format!("port {port} does not exist")))?;
        if !port.reporting {
            return Ok(());
        }
        for (bit, pin) in self.digital[port.pins()].iter_mut().enumerate() {
            if pin.mode == PinMode::Input {
                pin.value = Some(PinValue::Digital(mask & (1 << bit) != 0));
                pin.updates += 1;
            }
        }
        Ok(())
    }

    /// Apply an inbound 10-bit ADC sample to a reporting analog pin.
    pub fn analog_update(&mut self, channel: u8, raw: u16) -> Result<()> {
        let pin = self.pin_mut(PinId::Analog(channel))?;
        if pin.reporting {
            let fraction = raw as f64 / ADC_MAX as f64;
            pin.value = Some(PinValue::Analog((fraction * 10_000.0).round() / 10_000.0));
            pin.updates += 1;
        }
        Ok(())
    }

    /// Store an inbound sonar distance.
    pub fn sonar_update(&mut self, slot: u8, distance: u16) -> Result<()> {
        let entry = self
            .sonar
            .get_mut(slot as usize)
            .ok_or_else(|| Error::Pin(format!("sonar slot {slot} does not exist")))?;
        entry.distance = Some(distance);
        entry.updates += 1;
        Ok(())
    }
}
