//! Host client for mark boards.
//!
//! Connects the transport-independent [`mark_core::Board`] to real links
//! (USB-serial, CDC-ACM and Bluetooth RFCOMM), finds boards on the host and
//! layers the robot kit's actions and a multi-board fleet on top.
//!
//! # Features
//!
//! - **`defmt`**: forward to `firmata-proto/defmt`
//!
//! # Example
//!
//! ```ignore
//! use markrobot::{find_serial_candidates, MarkRobot, Motor, TransportSettings};
//! use markrobot::mark_core::BoardConfig;
//!
//! let descriptor = find_serial_candidates().into_iter().next().ok_or("no board")?;
//! let robot = MarkRobot::connect(&descriptor, &TransportSettings::default(), BoardConfig::default())?;
//! robot.turn_motor(Motor::A, 60)?;
//! robot.stop()?;
//! robot.disconnect()?;
//! ```

pub mod discovery;
pub mod error;
pub mod fleet;
pub mod robot;
pub mod transport;

pub use firmata_proto;
pub use mark_core;

pub use discovery::{
    find_bluetooth_candidates, find_serial_candidates, find_serial_candidates_in, select_serial_ports,
    BluetoothDevice, BluetoothScanner, Discovery,
};
pub use error::{Error, Result};
pub use fleet::Fleet;
pub use robot::{MarkRobot, Motor};
pub use transport::{
    BluetoothConfig, BluetoothTransport, SerialConfig, SerialTransport, TransportDescriptor,
    TransportSettings,
};
