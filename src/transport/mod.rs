//! Physical links to mark boards.
//!
//! Only opening a link differs between media; everything after that goes
//! through [`mark_core::Transport`].

mod bluetooth;
mod rfcomm;
mod serial;

pub use bluetooth::{parse_address, BluetoothConfig, BluetoothTransport};
pub use serial::{SerialConfig, SerialTransport};

use mark_core::Transport;

/// Settings for every supported medium.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportSettings {
    pub serial: SerialConfig,
    pub bluetooth: BluetoothConfig,
}

/// A discovered board that is not connected yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TransportDescriptor {
    Serial { path: String },
    Bluetooth { address: String, name: String },
}

impl TransportDescriptor {
    /// Device path or Bluetooth address.
    pub fn identity(&self) -> &str {
        match self {
            Self::Serial { path } => path,
            Self::Bluetooth { address, .. } => address,
        }
    }

    /// Name to show to users.
    pub fn display_name(&self) -> &str {
        match self {
            Self::Serial { path } => path,
            Self::Bluetooth { name, .. } => name,
        }
    }

    /// Open the link.
    pub fn connect(&self, settings: &TransportSettings) -> mark_core::Result<Box<dyn Transport>> {
        let transport: Box<dyn Transport> = match self {
            Self::Serial { path } => Box::new(SerialTransport::open(path, &settings.serial)?),
            Self::Bluetooth { address, .. } => {
                Box::new(BluetoothTransport::connect(address, &settings.bluetooth)?)
            }
        };
        Ok(transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_names() {
        let serial = TransportDescriptor::Serial {
            path: "/dev/ttyUSB0".into(),
        };
        assert_eq!(serial.identity(), "/dev/ttyUSB0");
        assert_eq!(serial.display_name(), "/dev/ttyUSB0");

        let bt = TransportDescriptor::Bluetooth {
            address: "00:1A:7D:DA:71:13".into(),
            name: "mark".into(),
        };
        assert_eq!(bt.identity(), "00:1A:7D:DA:71:13");
        assert_eq!(bt.display_name(), "mark");
    }
}
