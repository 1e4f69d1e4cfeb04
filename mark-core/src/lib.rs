//! Host-side model of a mark board.
//!
//! This crate turns a byte [`Transport`] into an addressable [`Board`]: a
//! pin/port model kept in sync with the wire by a [`Dispatcher`], optionally
//! pumped by a background [`Poller`]. It knows nothing about serial ports or
//! Bluetooth; adapters implement [`Transport`].
//!
//! # Overview
//!
//! - [`transport`]: byte link trait ([`Transport`])
//! - [`pin`]: pin, port and sonar state with mode rules ([`PinModel`])
//! - [`dispatch`]: inbound message application and counters ([`Dispatcher`])
//! - [`board`]: the composed device ([`Board`])
//! - [`poller`]: background pump ([`Poller`])
//! - [`config`]: layouts and timings
//!
//! # Features
//!
//! - **`mock`**: expose [`mock::LoopbackTransport`] for tests of dependant
//!   crates

pub mod board;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod pin;
pub mod poller;
pub mod transport;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use board::{Board, Reading};
pub use config::{
    digital_index_for_channel, BoardConfig, BoardLayout, PollerConfig, PORT_WIDTH,
    REFERENCE_LAYOUT,
};
pub use dispatch::{DeviceInfo, Diagnostics, DispatchError, Dispatcher, Firmware};
pub use error::{Error, Result};
pub use firmata_proto::PinMode;
pub use pin::{Pin, PinId, PinKind, PinModel, PinValue, Port, SonarSlot, WritePolicy};
pub use poller::{Poller, Pump};
pub use transport::Transport;
