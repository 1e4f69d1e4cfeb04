//! Board: one transport, one pin model, one dispatcher, at most one poller.
//!
//! # Locking
//!
//! The pin model sits behind a mutex shared by foreground calls and the
//! poller. Locks are always taken in the order
//! `dispatcher -> state -> transport`, and the transport lock is never held
//! while waiting for another lock:
//!
//! - foreground operations lock `state`, mutate the model, then lock
//!   `transport` to send the resulting requests, so wire order matches model
//!   order;
//! - [`Board::iterate`] locks `dispatcher`, reads one byte under `transport`,
//!   releases it, then applies the byte under `state`.
//!
//! Holding `dispatcher` across the read keeps bytes in arrival order when
//! several threads pump the same board.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use firmata_proto::{PinMode, Request};
use parking_lot::{Condvar, Mutex};

use crate::config::{BoardConfig, PollerConfig};
use crate::dispatch::{DeviceInfo, Diagnostics, Dispatcher, Firmware};
use crate::error::{Error, Result};
use crate::pin::{
    Pin, PinId, PinModel, PinValue, WritePolicy, SERVO_MAX_PULSE, SERVO_MIN_PULSE,
    SONAR_MAX_DISTANCE, SONAR_PING_INTERVAL,
};
use crate::poller::{Poller, Pump};
use crate::transport::Transport;

/// Result of a read that waits for the board to report.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading<T> {
    /// Last known value, `None` if the board never reported one.
    pub value: Option<T>,
    /// Whether a report arrived during the wait.
    pub fresh: bool,
}

impl<T> Reading<T> {
    fn stale(value: Option<T>) -> Self {
        Self {
            value,
            fresh: false,
        }
    }

    /// The value if it was reported during the wait.
    pub fn fresh_value(self) -> Option<T> {
        if self.fresh {
            self.value
        } else {
            None
        }
    }
}

struct BoardState {
    model: PinModel,
    info: DeviceInfo,
}

struct Shared {
    identity: String,
    config: BoardConfig,
    state: Mutex<BoardState>,
    updated: Condvar,
    dispatcher: Mutex<Dispatcher>,
    transport: Mutex<Box<dyn Transport>>,
    closed: AtomicBool,
}

impl Shared {
    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Closed);
        }
        Ok(())
    }

    /// Encode and write `requests`. Called with `state` held.
    fn send(&self, requests: &[Request]) -> Result<()> {
        if requests.is_empty() {
            return Ok(());
        }
        let encoded = requests
            .iter()
            .map(Request::encode)
            .collect::<Result<Vec<_>, _>>()?;
        let mut transport = self.transport.lock();
        for bytes in &encoded {
            transport.write_all(bytes)?;
        }
        Ok(())
    }

    /// Run a model operation and send its requests. The model is rolled
    /// back if either step fails.
    fn apply<F>(&self, op: F) -> Result<()>
    where
        F: FnOnce(&mut PinModel) -> Result<Vec<Request>>,
    {
        self.ensure_open()?;
        let result = {
            let mut state = self.state.lock();
            let backup = state.model.clone();
            let result = op(&mut state.model).and_then(|requests| self.send(&requests));
            if result.is_err() {
                state.model = backup;
            }
            result
        };
        // `dispatcher` ranks above `state`, so count after unlocking
        if matches!(result, Err(Error::Transport(_))) {
            self.record_error();
        }
        result
    }
}

impl Pump for Shared {
    fn bytes_available(&self) -> Result<usize> {
        self.ensure_open()?;
        Ok(self.transport.lock().bytes_available()?)
    }

    fn iterate(&self) -> Result<bool> {
        self.ensure_open()?;
        let mut dispatcher = self.dispatcher.lock();
        let byte = self.transport.lock().read_byte()?;
        let Some(byte) = byte else {
            return Ok(false);
        };
        let applied = {
            let mut state = self.state.lock();
            let BoardState { model, info } = &mut *state;
            dispatcher.feed(byte, model, info)
        };
        if applied {
            self.updated.notify_all();
        }
        Ok(applied)
    }

    fn discard_partial(&self) {
        self.dispatcher.lock().discard_partial();
    }

    fn record_error(&self) {
        self.dispatcher.lock().record_transport_error();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// A connected mark board.
///
/// Dropping a board closes it like [`Board::disconnect`], logging any
/// error.
///
/// # Example
///
/// ```ignore
/// use mark_core::{Board, BoardConfig, PinId, PinValue};
/// # use mark_core::mock::LoopbackTransport;
///
/// # fn main() -> mark_core::Result<()> {
/// # let transport = LoopbackTransport::new("/dev/ttyUSB0");
/// let board = Board::connect(transport, BoardConfig::default())?;
/// board.write(PinId::Digital(13), PinValue::Digital(true))?;
/// board.disconnect()?;
/// # Ok(())
/// # }
/// ```
pub struct Board {
    shared: Arc<Shared>,
    poller: Mutex<Option<Poller>>,
}

impl Board {
    /// Wrap an open transport.
    ///
    /// Builds the pin model for `config.layout`. No handshake takes place;
    /// use [`Board::query_firmware`] to learn what is on the other end.
    pub fn connect<T: Transport + 'static>(transport: T, config: BoardConfig) -> Result<Self> {
        let identity = transport.identity().to_string();
        if !transport.is_connected() {
            return Err(Error::Connect {
                target: identity,
                source: std::io::ErrorKind::NotConnected.into(),
            });
        }
        log::info!("connected to {identity}");
        Ok(Self {
            shared: Arc::new(Shared {
                identity,
                config,
                state: Mutex::new(BoardState {
                    model: PinModel::new(config.layout),
                    info: DeviceInfo::default(),
                }),
                updated: Condvar::new(),
                dispatcher: Mutex::new(Dispatcher::new()),
                transport: Mutex::new(Box::new(transport) as Box<dyn Transport>),
                closed: AtomicBool::new(false),
            }),
            poller: Mutex::new(None),
        })
    }

    /// Connect, start polling, run `f`, then disconnect whether `f`
    /// succeeded or not.
    pub fn scoped<T, F, R>(transport: T, config: BoardConfig, f: F) -> Result<R>
    where
        T: Transport + 'static,
        F: FnOnce(&Board) -> Result<R>,
    {
        let board = Self::connect(transport, config)?;
        board.start_polling(PollerConfig::default())?;
        let result = f(&board);
        let closed = board.disconnect();
        let value = result?;
        closed?;
        Ok(value)
    }

    /// Device path or address of the transport.
    pub fn identity(&self) -> &str {
        &self.shared.identity
    }

    pub fn config(&self) -> &BoardConfig {
        &self.shared.config
    }

    pub fn is_connected(&self) -> bool {
        !self.shared.is_closed()
    }

    /// Bytes waiting on the transport.
    pub fn bytes_available(&self) -> Result<usize> {
        self.shared.bytes_available()
    }

    /// Read and process one byte.
    ///
    /// Returns `true` when the byte completed a message. Call repeatedly
    /// while [`Board::bytes_available`] is non-zero to drain a burst.
    pub fn iterate(&self) -> Result<bool> {
        self.shared.iterate()
    }

    /// Change a pin's mode.
    pub fn set_mode(&self, id: PinId, mode: PinMode) -> Result<()> {
        self.shared.apply(|model| model.set_mode(id, mode))
    }

    pub fn mode(&self, id: PinId) -> Result<PinMode> {
        Ok(self.shared.state.lock().model.pin(id)?.mode())
    }

    /// Snapshot of one pin.
    pub fn pin(&self, id: PinId) -> Result<Pin> {
        Ok(self.shared.state.lock().model.pin(id)?.clone())
    }

    /// Snapshot of the whole model.
    pub fn snapshot(&self) -> PinModel {
        self.shared.state.lock().model.clone()
    }

    pub fn enable_reporting(&self, id: PinId) -> Result<()> {
        self.shared.apply(|model| model.enable_reporting(id))
    }

    pub fn disable_reporting(&self, id: PinId) -> Result<()> {
        self.shared.apply(|model| model.disable_reporting(id))
    }

    /// Write a value, skipping the wire if it equals the cached one.
    pub fn write(&self, id: PinId, value: PinValue) -> Result<()> {
        self.shared
            .apply(|model| model.write(id, value, WritePolicy::SkipUnchanged))
    }

    /// Write a value even if it equals the cached one.
    pub fn write_always(&self, id: PinId, value: PinValue) -> Result<()> {
        self.shared
            .apply(|model| model.write(id, value, WritePolicy::Always))
    }

    /// Cached value of a pin.
    pub fn read(&self, id: PinId) -> Result<Option<PinValue>> {
        self.shared.state.lock().model.read(id)
    }

    /// Ask an INPUT pin to report and wait up to the settle timeout for it.
    pub fn sample(&self, id: PinId) -> Result<Reading<PinValue>> {
        self.sample_with_timeout(id, self.shared.config.settle_timeout)
    }

    /// Ask an INPUT pin to report and wait up to `timeout` for it.
    ///
    /// Reporting is switched back off afterwards unless it was already on.
    /// Transport failures yield a stale reading instead of an error.
    pub fn sample_with_timeout(&self, id: PinId, timeout: Duration) -> Result<Reading<PinValue>> {
        let (was_reporting, before) = {
            let state = self.shared.state.lock();
            let pin = state.model.pin(id)?;
            (pin.reporting(), pin.updates())
        };
        match self.enable_reporting(id) {
            Ok(()) => {}
            Err(Error::Transport(err)) => {
                log::warn!("{}: sampling {id} failed: {err}", self.identity());
                return Ok(Reading::stale(self.read(id)?));
            }
            Err(err) => return Err(err),
        }

        let fresh = self.wait_for(timeout, |state| {
            state.model.pin(id).map_or(false, |pin| pin.updates() != before)
        });
        let value = self.read(id)?;

        if !was_reporting {
            if let Err(err) = self.disable_reporting(id) {
                log::warn!("{}: disabling reporting on {id} failed: {err}", self.identity());
            }
        }
        Ok(Reading { value, fresh })
    }

    /// Attach a servo and move it to `angle`.
    pub fn configure_servo(&self, pin: u8, min_pulse: u16, max_pulse: u16, angle: u8) -> Result<()> {
        self.shared
            .apply(|model| model.configure_servo(pin, min_pulse, max_pulse, angle))
    }

    /// Attach a servo with the default pulse range at angle 0.
    pub fn attach_servo(&self, pin: u8) -> Result<()> {
        self.configure_servo(pin, SERVO_MIN_PULSE, SERVO_MAX_PULSE, 0)
    }

    /// Activate a sonar slot. No-op if it is already active.
    pub fn configure_sonar(&self, pin: u8, ping_interval: u8, max_distance: u16) -> Result<()> {
        self.shared
            .apply(|model| model.configure_sonar(pin, ping_interval, max_distance))
    }

    /// Activate a sonar slot with default settings and wait for a distance.
    pub fn sample_distance(&self, pin: u8) -> Result<Reading<u16>> {
        let before = self.shared.state.lock().model.sonar(pin)?.updates();
        match self.configure_sonar(pin, SONAR_PING_INTERVAL, SONAR_MAX_DISTANCE) {
            Ok(()) => {}
            Err(Error::Transport(err)) => {
                log::warn!("{}: sonar {pin} failed: {err}", self.identity());
                return Ok(Reading::stale(self.distance(pin)?));
            }
            Err(err) => return Err(err),
        }
        let fresh = self.wait_for(self.shared.config.settle_timeout, |state| {
            state
                .model
                .sonar(pin)
                .map_or(false, |slot| slot.updates() != before)
        });
        Ok(Reading {
            value: self.distance(pin)?,
            fresh,
        })
    }

    /// Last distance reported by a sonar slot.
    pub fn distance(&self, pin: u8) -> Result<Option<u16>> {
        Ok(self.shared.state.lock().model.sonar(pin)?.distance())
    }

    /// Request the firmware report and wait for the reply.
    pub fn query_firmware(&self) -> Result<Reading<Firmware>> {
        let before = self.shared.state.lock().info.firmware_replies();
        match self.shared.apply(|_| Ok(vec![Request::QueryFirmware])) {
            Ok(()) => {}
            Err(Error::Transport(err)) => {
                log::warn!("{}: firmware query failed: {err}", self.identity());
                return Ok(Reading::stale(self.firmware()));
            }
            Err(err) => return Err(err),
        }
        let fresh = self.wait_for(self.shared.config.firmware_timeout, |state| {
            state.info.firmware_replies() != before
        });
        Ok(Reading {
            value: self.firmware(),
            fresh,
        })
    }

    /// Last firmware report.
    pub fn firmware(&self) -> Option<Firmware> {
        self.shared.state.lock().info.firmware().cloned()
    }

    /// Request the protocol version. The reply lands in
    /// [`Board::protocol_version`].
    pub fn query_version(&self) -> Result<()> {
        self.shared.apply(|_| Ok(vec![Request::QueryVersion]))
    }

    pub fn protocol_version(&self) -> Option<(u8, u8)> {
        self.shared.state.lock().info.protocol_version()
    }

    /// Send SYSTEM_RESET and return the local model to its power-on state.
    pub fn reset(&self) -> Result<()> {
        log::info!("{}: reset", self.identity());
        self.shared.apply(|model| Ok(model.reset()))
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.shared.dispatcher.lock().diagnostics()
    }

    /// Start the background poller.
    pub fn start_polling(&self, config: PollerConfig) -> Result<()> {
        self.shared.ensure_open()?;
        let mut slot = self.poller.lock();
        if slot.as_ref().is_some_and(Poller::is_running) {
            return Err(Error::PollerRunning);
        }
        let name = format!("mark-poller {}", self.identity());
        *slot = Some(Poller::spawn(Arc::clone(&self.shared), config, name)?);
        Ok(())
    }

    /// Stop the poller and wait for it to exit. Any partial message is
    /// discarded.
    pub fn stop_polling(&self) {
        let poller = self.poller.lock().take();
        if let Some(poller) = poller {
            poller.join();
        }
    }

    pub fn is_polling(&self) -> bool {
        self.poller.lock().as_ref().is_some_and(Poller::is_running)
    }

    /// Stop polling, detach servos and close the transport.
    pub fn disconnect(self) -> Result<()> {
        self.close()
    }

    fn close(&self) -> Result<()> {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.stop_polling();

        // Firmwares misbehave when the port closes with servos attached
        let detached = {
            let mut state = self.shared.state.lock();
            let servos: Vec<u8> = state
                .model
                .digital_pins()
                .iter()
                .filter(|pin| pin.mode() == PinMode::Servo)
                .filter_map(|pin| match pin.id() {
                    PinId::Digital(n) => Some(n),
                    PinId::Analog(_) => None,
                })
                .collect();
            let mut requests = Vec::new();
            for n in servos {
                match state.model.set_mode(PinId::Digital(n), PinMode::Output) {
                    Ok(detach) => requests.extend(detach),
                    Err(err) => log::warn!("detaching servo on pin {n}: {err}"),
                }
            }
            self.shared.send(&requests)
        };
        let closed = self.shared.transport.lock().close();
        log::info!("disconnected from {}", self.identity());
        detached?;
        closed?;
        Ok(())
    }

    /// Wait until `done` holds or `timeout` passes. Without a poller the
    /// calling thread pumps the transport itself.
    fn wait_for<F>(&self, timeout: Duration, mut done: F) -> bool
    where
        F: FnMut(&BoardState) -> bool,
    {
        let deadline = Instant::now() + timeout;
        if self.is_polling() {
            let mut state = self.shared.state.lock();
            while !done(&*state) {
                if self.shared.updated.wait_until(&mut state, deadline).timed_out() {
                    return done(&*state);
                }
            }
            return true;
        }
        loop {
            if done(&*self.shared.state.lock()) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            let step = self.shared.bytes_available().and_then(|n| {
                if n == 0 {
                    thread::sleep(PollerConfig::default().idle_sleep);
                    Ok(false)
                } else {
                    self.shared.iterate()
                }
            });
            if let Err(err) = step {
                self.shared.record_error();
                log::warn!("{}: {err}", self.identity());
                return false;
            }
        }
    }
}

impl Drop for Board {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::warn!("closing {}: {err}", self.identity());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BoardLayout, REFERENCE_LAYOUT};
    use crate::mock::LoopbackTransport;
    use firmata_proto::pack_string;

    fn board() -> (Board, LoopbackTransport) {
        let wire = LoopbackTransport::new("/dev/ttyUSB0");
        let board = Board::connect(wire.clone(), BoardConfig::default()).unwrap();
        (board, wire)
    }

    fn wait_drained(wire: &LoopbackTransport) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while wire.pending() > 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_connect_requires_open_transport() {
        let mut wire = LoopbackTransport::new("/dev/ttyACM0");
        wire.close().unwrap();
        assert!(matches!(
            Board::connect(wire, BoardConfig::default()),
            Err(Error::Connect { .. })
        ));
    }

    #[test]
    fn test_write_sends_port_message() {
        let (board, wire) = board();
        board.write(PinId::Digital(13), PinValue::Digital(true)).unwrap();
        board.write(PinId::Digital(13), PinValue::Digital(true)).unwrap();
        assert_eq!(wire.take_written(), vec![0x91, 0x20, 0x00]);

        board.write_always(PinId::Digital(13), PinValue::Digital(true)).unwrap();
        assert_eq!(wire.take_written(), vec![0x91, 0x20, 0x00]);
    }

    #[test]
    fn test_servo_without_set_pin_mode() {
        let (board, wire) = board();
        board.attach_servo(9).unwrap();
        board.write(PinId::Digital(9), PinValue::Degrees(90)).unwrap();
        assert_eq!(board.read(PinId::Digital(9)).unwrap(), Some(PinValue::Degrees(90)));
        assert_eq!(
            wire.take_written(),
            vec![
                0xF0, 0x70, 9, 0x20, 0x04, 0x60, 0x12, 0xF7, // servo config
                0xE9, 0, 0, // angle 0
                0xE9, 90, 0, // angle 90
            ]
        );
    }

    #[test]
    fn test_failed_write_rolls_back() {
        let (board, wire) = board();
        wire.set_fail_writes(true);
        assert!(matches!(
            board.write(PinId::Digital(13), PinValue::Digital(true)),
            Err(Error::Transport(_))
        ));
        assert_eq!(board.read(PinId::Digital(13)).unwrap(), None);
        assert_eq!(board.diagnostics().transport_errors, 1);

        wire.set_fail_writes(false);
        board.write(PinId::Digital(13), PinValue::Digital(true)).unwrap();
        assert_eq!(wire.take_written(), vec![0x91, 0x20, 0x00]);
    }

    #[test]
    fn test_validation_errors_propagate() {
        let (board, wire) = board();
        assert!(matches!(
            board.set_mode(PinId::Analog(0), PinMode::Servo),
            Err(Error::Mode { .. })
        ));
        assert!(matches!(
            board.set_mode(PinId::Digital(4), PinMode::Pwm),
            Err(Error::Mode { .. })
        ));
        assert!(matches!(board.configure_servo(30, 544, 2400, 0), Err(Error::Pin(_))));
        assert!(matches!(
            board.sample(PinId::Digital(7)),
            Err(Error::State { .. })
        ));
        assert!(wire.written().is_empty());
    }

    #[test]
    fn test_digital_report_end_to_end() {
        let wire = LoopbackTransport::new("/dev/ttyUSB0");
        let config = BoardConfig {
            layout: BoardLayout {
                disabled: &[],
                ..REFERENCE_LAYOUT
            },
            ..BoardConfig::default()
        };
        let board = Board::connect(wire.clone(), config).unwrap();
        board.set_mode(PinId::Digital(0), PinMode::Input).unwrap();
        board.set_mode(PinId::Digital(2), PinMode::Input).unwrap();

        wire.feed(&[0x90, 0x05, 0x00]);
        assert!(!board.iterate().unwrap());
        assert!(!board.iterate().unwrap());
        assert!(board.iterate().unwrap());
        assert_eq!(board.read(PinId::Digital(0)).unwrap(), Some(PinValue::Digital(true)));
        assert_eq!(board.read(PinId::Digital(1)).unwrap(), None);
        assert_eq!(board.read(PinId::Digital(2)).unwrap(), Some(PinValue::Digital(true)));
    }

    #[test]
    fn test_sample_pumps_without_poller() {
        let (board, wire) = board();
        wire.feed(&[0xE2, 0x00, 0x04]);
        let reading = board.sample(PinId::Analog(2)).unwrap();
        assert!(reading.fresh);
        assert_eq!(reading.value, Some(PinValue::Analog(0.5005)));
        // Reporting toggled on for the read and off again
        assert_eq!(wire.take_written(), vec![0xC2, 1, 0xC2, 0]);
        assert!(!board.pin(PinId::Analog(2)).unwrap().reporting());
    }

    #[test]
    fn test_sample_times_out_stale() {
        let (board, _wire) = board();
        let reading = board
            .sample_with_timeout(PinId::Analog(1), Duration::from_millis(10))
            .unwrap();
        assert_eq!(reading, Reading { value: None, fresh: false });
    }

    #[test]
    fn test_sample_transport_failure_is_stale() {
        let (board, wire) = board();
        wire.set_fail_writes(true);
        let reading = board.sample(PinId::Analog(0)).unwrap();
        assert!(!reading.fresh);
        assert!(board.diagnostics().transport_errors >= 1);
    }

    #[test]
    fn test_sample_with_poller() {
        let (board, wire) = board();
        board.enable_reporting(PinId::Analog(1)).unwrap();
        board.start_polling(PollerConfig::default()).unwrap();
        assert!(matches!(
            board.start_polling(PollerConfig::default()),
            Err(Error::PollerRunning)
        ));

        let feeder = {
            let wire = wire.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                wire.feed(&[0xE1, 0x7F, 0x07]);
            })
        };
        let reading = board
            .sample_with_timeout(PinId::Analog(1), Duration::from_secs(2))
            .unwrap();
        feeder.join().unwrap();
        assert!(reading.fresh);
        assert_eq!(reading.value, Some(PinValue::Analog(1.0)));
        // Reporting was already on, so it stays on
        assert!(board.pin(PinId::Analog(1)).unwrap().reporting());
        board.stop_polling();
        assert!(!board.is_polling());
    }

    #[test]
    fn test_query_firmware() {
        let (board, wire) = board();
        let mut reply = vec![0xF0, 0x79, 2, 3];
        reply.extend(pack_string("StandardFirmata").unwrap());
        reply.push(0xF7);
        wire.feed(&reply);

        let reading = board.query_firmware().unwrap();
        assert!(reading.fresh);
        let firmware = reading.value.unwrap();
        assert_eq!((firmware.major, firmware.minor), (2, 3));
        assert_eq!(firmware.name, "StandardFirmata");
        assert_eq!(wire.take_written(), vec![0xF0, 0x79, 0xF7]);
    }

    #[test]
    fn test_query_version() {
        let (board, wire) = board();
        wire.feed(&[0xF9, 2, 5]);
        board.query_version().unwrap();
        while board.bytes_available().unwrap() > 0 {
            board.iterate().unwrap();
        }
        assert_eq!(board.protocol_version(), Some((2, 5)));
        assert_eq!(wire.take_written(), vec![0xF9]);
    }

    #[test]
    fn test_sample_distance() {
        let (board, wire) = board();
        wire.feed(&[0xF0, 0x63, 16, 0x20, 0x00, 0xF7]);
        let reading = board.sample_distance(16).unwrap();
        assert_eq!(reading.fresh_value(), Some(32));
        assert_eq!(
            wire.take_written(),
            vec![0xF0, 0x62, 16, 16, 50, 0x48, 0x01, 0xF7]
        );
        // Second call does not reconfigure
        board
            .configure_sonar(16, SONAR_PING_INTERVAL, SONAR_MAX_DISTANCE)
            .unwrap();
        assert!(wire.take_written().is_empty());
    }

    #[test]
    fn test_reset() {
        let (board, wire) = board();
        board.attach_servo(10).unwrap();
        wire.take_written();
        board.reset().unwrap();
        assert_eq!(wire.take_written(), vec![0xFF]);
        assert_eq!(board.mode(PinId::Digital(10)).unwrap(), PinMode::Output);
    }

    #[test]
    fn test_disconnect_detaches_servos() {
        let (board, wire) = board();
        board.attach_servo(9).unwrap();
        board.start_polling(PollerConfig::default()).unwrap();
        wire.take_written();

        board.disconnect().unwrap();
        assert_eq!(wire.take_written(), vec![0xF4, 9, 1]);
        assert_eq!(wire.close_count(), 1);
    }

    #[test]
    fn test_drop_closes_once() {
        let (board, wire) = board();
        drop(board);
        assert_eq!(wire.close_count(), 1);
    }

    #[test]
    fn test_closed_board_rejects_calls() {
        let (board, _wire) = board();
        board.close().unwrap();
        assert!(matches!(
            board.write(PinId::Digital(13), PinValue::Digital(true)),
            Err(Error::Closed)
        ));
        assert!(matches!(board.iterate(), Err(Error::Closed)));
        assert!(matches!(
            board.start_polling(PollerConfig::default()),
            Err(Error::Closed)
        ));
    }

    #[test]
    fn test_stop_mid_sysex_then_restart() {
        let (board, wire) = board();
        board.start_polling(PollerConfig::default()).unwrap();
        wire.feed(&[0xF0, 0x79, 2, 3, b'M']);
        wait_drained(&wire);
        board.stop_polling();
        assert!(!board.is_polling());

        // The stale sysex must not swallow the next message
        wire.feed(&[0xF9, 2, 5]);
        board.start_polling(PollerConfig::default()).unwrap();
        wait_drained(&wire);
        let deadline = Instant::now() + Duration::from_secs(2);
        while board.protocol_version().is_none() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(board.protocol_version(), Some((2, 5)));
        assert!(board.firmware().is_none());
    }

    #[test]
    fn test_scoped_closes_on_error() {
        let wire = LoopbackTransport::new("/dev/ttyUSB0");
        let result: Result<()> = Board::scoped(wire.clone(), BoardConfig::default(), |board| {
            board.set_mode(PinId::Digital(0), PinMode::Output)
        });
        assert!(matches!(result, Err(Error::Mode { .. })));
        assert_eq!(wire.close_count(), 1);
    }
}
