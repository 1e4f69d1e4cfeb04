//! USB-serial / ACM transport.

use std::io::{self, Read, Write};
use std::thread;
use std::time::Duration;

use mark_core::{Error, Transport};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

/// Serial link settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialConfig {
    pub baud_rate: u32,
    /// Read timeout.
    pub timeout: Duration,
    /// Pause after opening; boards with auto-reset reboot when the port opens.
    pub setup_wait: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: firmata_proto::DEFAULT_BAUDRATE,
            timeout: Duration::from_secs(1),
            setup_wait: Duration::from_secs(2),
        }
    }
}

/// A board on a serial device node, 8N1.
pub struct SerialTransport {
    path: String,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialTransport {
    /// Open `path` and wait for the board to come up.
    pub fn open(path: &str, config: &SerialConfig) -> mark_core::Result<Self> {
        let port = serialport::new(path, config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(config.timeout)
            .open()
            .map_err(|err| Error::Connect {
                target: path.to_string(),
                source: err.into(),
            })?;
        log::debug!("{path} open at {} baud", config.baud_rate);
        thread::sleep(config.setup_wait);
        Ok(Self {
            path: path.to_string(),
            port: Some(port),
        })
    }

    fn port(&mut self) -> io::Result<&mut Box<dyn SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| io::ErrorKind::NotConnected.into())
    }
}

impl Transport for SerialTransport {
    fn identity(&self) -> &str {
        &self.path
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    fn bytes_available(&mut self) -> io::Result<usize> {
        let pending = self.port()?.bytes_to_read()?;
        Ok(pending as usize)
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut buf = [0u8; 1];
        match self.read(&mut buf)? {
            0 => Ok(None),
            _ => Ok(Some(buf[0])),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.port()?.read(buf) {
            Ok(n) => Ok(n),
            Err(err) if err.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(err) => Err(err),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let port = self.port()?;
        port.write_all(bytes)?;
        port.flush()
    }

    fn close(&mut self) -> io::Result<()> {
        if self.port.take().is_some() {
            log::debug!("{} closed", self.path);
        }
        Ok(())
    }
}
