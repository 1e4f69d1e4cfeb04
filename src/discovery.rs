//! Discovery of connectable boards.
//!
//! Enumeration never fails: an OS that cannot list its serial ports, an
//! unreadable directory or an unavailable Bluetooth stack all mean "no
//! devices found".

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::transport::TransportDescriptor;

/// Device node prefixes of USB-serial and CDC-ACM adapters, in search order.
pub const SERIAL_PREFIXES: [&str; 2] = ["ttyUSB", "ttyACM"];

/// A Bluetooth device seen during an inquiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BluetoothDevice {
    pub address: String,
    pub name: String,
}

/// Bluetooth inquiry with name lookup.
///
/// Pairing and inquiry belong to the host's Bluetooth stack; any closure
/// returning the devices found can serve as a scanner.
pub trait BluetoothScanner: Send + Sync {
    fn scan(&self) -> io::Result<Vec<BluetoothDevice>>;
}

impl<F> BluetoothScanner for F
where
    F: Fn() -> io::Result<Vec<BluetoothDevice>> + Send + Sync,
{
    fn scan(&self) -> io::Result<Vec<BluetoothDevice>> {
        self()
    }
}

/// Keep USB-serial and ACM ports, USB-serial first, in numeric order.
pub fn select_serial_ports<I>(port_names: I) -> Vec<TransportDescriptor>
where
    I: IntoIterator<Item = String>,
{
    let names: Vec<String> = port_names.into_iter().collect();
    let mut found = Vec::new();
    for prefix in SERIAL_PREFIXES {
        let mut matching: Vec<&String> = names
            .iter()
            .filter(|name| device_name(name).starts_with(prefix))
            .collect();
        // ttyUSB2 before ttyUSB10
        matching.sort_by_key(|name| (name.len(), *name));
        found.extend(matching.into_iter().map(|name| TransportDescriptor::Serial {
            path: name.clone(),
        }));
    }
    found
}

fn device_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Serial ports the OS reports, filtered by [`select_serial_ports`].
pub fn find_serial_candidates() -> Vec<TransportDescriptor> {
    match serialport::available_ports() {
        Ok(ports) => select_serial_ports(ports.into_iter().map(|port| port.port_name)),
        Err(err) => {
            log::warn!("cannot list serial ports: {err}");
            Vec::new()
        }
    }
}

/// Device nodes under `dir`, filtered by [`select_serial_ports`].
pub fn find_serial_candidates_in(dir: &Path) -> Vec<TransportDescriptor> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            log::debug!("cannot list {}: {err}", dir.display());
            return Vec::new();
        }
    };
    select_serial_ports(
        entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path().to_string_lossy().into_owned()),
    )
}

/// Bluetooth devices, optionally only those whose name equals `name_filter`.
pub fn find_bluetooth_candidates(
    scanner: &dyn BluetoothScanner,
    name_filter: Option<&str>,
) -> Vec<TransportDescriptor> {
    let devices = match scanner.scan() {
        Ok(devices) => devices,
        Err(err) => {
            log::debug!("bluetooth scan unavailable: {err}");
            return Vec::new();
        }
    };
    devices
        .into_iter()
        .filter(|dev| name_filter.map_or(true, |name| dev.name == name))
        .map(|dev| TransportDescriptor::Bluetooth {
            address: dev.address,
            name: dev.name,
        })
        .collect()
}

/// Where to look for boards.
pub struct Discovery {
    /// `None` asks the OS for its serial ports.
    dev_dir: Option<PathBuf>,
    scanner: Option<Box<dyn BluetoothScanner>>,
}

impl Discovery {
    /// Serial ports from the OS, with no Bluetooth scanner.
    pub fn new() -> Self {
        Self {
            dev_dir: None,
            scanner: None,
        }
    }

    /// List device nodes in `dir` instead of asking the OS.
    pub fn with_dev_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dev_dir = Some(dir.into());
        self
    }

    pub fn with_scanner(mut self, scanner: impl BluetoothScanner + 'static) -> Self {
        self.scanner = Some(Box::new(scanner));
        self
    }

    pub fn find_serial_candidates(&self) -> Vec<TransportDescriptor> {
        match &self.dev_dir {
            Some(dir) => find_serial_candidates_in(dir),
            None => find_serial_candidates(),
        }
    }

    /// Empty without a scanner.
    pub fn find_bluetooth_candidates(&self, name_filter: Option<&str>) -> Vec<TransportDescriptor> {
        match &self.scanner {
            Some(scanner) => find_bluetooth_candidates(scanner.as_ref(), name_filter),
            None => Vec::new(),
        }
    }
}

impl Default for Discovery {
    fn default() -> Self {
        Self::new()
    }
}
